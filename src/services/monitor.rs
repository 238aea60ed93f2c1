use crate::accessory::characteristics::{Characteristic, CharacteristicValue};
use crate::accessory::thermostat::ThermostatAccessory;
use crate::status::HapStatus;
use log::{info, warn};
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

const MAX_JITTER_MS: u64 = 500;

pub type Reading = (Characteristic, Result<CharacteristicValue, HapStatus>);

/// Read every characteristic once, the way a host polling the accessory would.
pub async fn poll_once(accessory: &ThermostatAccessory) -> Vec<Reading> {
    let mut readings = Vec::with_capacity(Characteristic::ALL.len());
    for characteristic in Characteristic::ALL {
        readings.push((characteristic, accessory.read(characteristic).await));
    }
    readings
}

pub fn format_readings(readings: &[Reading]) -> String {
    readings
        .iter()
        .map(|(characteristic, result)| match result {
            Ok(value) => format!("{:?}={}", characteristic, value),
            Err(status) => format!("{:?}=<{}>", characteristic, status.code()),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub async fn run_loop(accessory: &ThermostatAccessory, interval: Duration) -> Result<(), String> {
    loop {
        let tick_start = Instant::now();

        let readings = poll_once(accessory).await;
        if readings.iter().all(|(_, r)| r.is_err()) {
            warn!("{}: no characteristic readable: {}", accessory.name(), format_readings(&readings));
        } else {
            let observed = match accessory.observed_at().await {
                Ok(at) => at.format("%H:%M:%S").to_string(),
                Err(status) => format!("<{}>", status.code()),
            };
            info!("{} @ {}: {}", accessory.name(), observed, format_readings(&readings));
        }

        // Maintain steady cadence, jittered so several bridges don't poll in lockstep
        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            let jitter = Duration::from_millis(rand::rng().random_range(0..=MAX_JITTER_MS));
            tokio::time::sleep(interval - elapsed + jitter).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_LOCK_WAIT;
    use crate::testing::{thermostat_document, FakeApi};
    use crate::timeout::AdaptiveTimeout;
    use std::sync::Arc;

    #[tokio::test]
    async fn poll_reads_all_characteristics_from_one_fetch() {
        let api = Arc::new(FakeApi::new(thermostat_document()));
        let accessory = ThermostatAccessory::new(
            "Hallway",
            api.clone(),
            "device-1",
            AdaptiveTimeout::default(),
            DEFAULT_LOCK_WAIT,
        );

        let readings = poll_once(&accessory).await;

        assert_eq!(readings.len(), Characteristic::ALL.len());
        assert!(readings.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(api.reads(), 1);
        let line = format_readings(&readings);
        assert!(line.contains("CurrentTemperature=21.0"));
        assert!(line.contains("EcoMode=false"));

        assert!(accessory.observed_at().await.is_ok());
        assert_eq!(api.reads(), 1);
    }

    #[tokio::test]
    async fn unreachable_device_formats_status_codes() {
        let api = Arc::new(FakeApi::new(thermostat_document()));
        api.set_read_status(503);
        let accessory = ThermostatAccessory::new(
            "Hallway",
            api.clone(),
            "device-1",
            AdaptiveTimeout::default(),
            DEFAULT_LOCK_WAIT,
        );

        let readings = poll_once(&accessory).await;

        assert!(readings.iter().all(|(_, r)| *r == Err(HapStatus::ServiceCommunicationFailure)));
        assert!(format_readings(&readings).contains("TargetTemperature=<-70402>"));
    }
}
