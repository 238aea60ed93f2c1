//! Thermostat accessory: maps characteristic get/set calls onto SDM traits and commands.

use crate::accessor::TraitAccessor;
use crate::accessory::characteristics::{
    Characteristic, CharacteristicValue, CurrentHeatingCoolingState, TargetHeatingCoolingState,
    TemperatureDisplayUnits,
};
use crate::accessory::ranges::{Range, RangeConfig, TemperatureRanges};
use crate::cache::SnapshotCache;
use crate::client::DeviceApi;
use crate::device_traits::Traits;
use crate::executor::CommandExecutor;
use crate::models::sdm::{Command, EcoMode, ThermostatMode};
use crate::status::HapStatus;
use crate::timeout::AdaptiveTimeout;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

fn round_to_step(celsius: f64) -> f64 {
    (celsius * 10.0).round() / 10.0
}

/// Single target temperature for a device that may hold a heat/cool range:
/// the setpoint closest to ambient, heat on a tie or when ambient is unknown.
fn target_setpoint(traits: &Traits) -> Option<f64> {
    let setpoint = traits.temperature_setpoint;
    match (setpoint.heat_c, setpoint.cool_c) {
        (Some(heat), Some(cool)) => match traits.current_temperature_c {
            Some(ambient) if (cool - ambient).abs() < (heat - ambient).abs() => Some(cool),
            _ => Some(heat),
        },
        (heat, cool) => heat.or(cool),
    }
}

fn not_found(what: &str) -> HapStatus {
    debug!("No {} in snapshot", what);
    HapStatus::ResourceDoesNotExist
}

pub struct ThermostatAccessory {
    name: String,
    cache: SnapshotCache,
    executor: CommandExecutor,
    ranges: Arc<RangeConfig>,
}

impl ThermostatAccessory {
    pub fn new(
        name: impl Into<String>,
        api: Arc<dyn DeviceApi>,
        device_id: &str,
        timeout: AdaptiveTimeout,
        lock_wait: Duration,
    ) -> Self {
        let name = name.into();
        let ranges = Arc::new(RangeConfig::new(name.clone()));
        let cache = SnapshotCache::new(Arc::clone(&api), device_id, timeout, lock_wait).with_observer(ranges.clone());
        ThermostatAccessory {
            name,
            cache,
            executor: CommandExecutor::new(api, device_id),
            ranges,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ranges(&self) -> TemperatureRanges {
        self.ranges.current()
    }

    /// Advertised bounds for a temperature characteristic.
    pub fn range_of(&self, characteristic: Characteristic) -> Option<Range> {
        let ranges = self.ranges();
        match characteristic {
            Characteristic::CurrentTemperature => Some(ranges.measurement),
            Characteristic::TargetTemperature
            | Characteristic::CoolingThresholdTemperature
            | Characteristic::HeatingThresholdTemperature => Some(ranges.setpoint),
            _ => None,
        }
    }

    /// When the snapshot currently backing reads was received.
    pub async fn observed_at(&self) -> Result<DateTime<Utc>, HapStatus> {
        Ok(self.accessor().await?.observed_at())
    }

    async fn accessor(&self) -> Result<TraitAccessor, HapStatus> {
        self.cache.get_accessor().await
    }

    async fn send(&self, command: Command) {
        self.executor.execute(&command).await;
        self.cache.invalidate();
    }

    /// Manual mode and temperature writes are refused while eco overrides them.
    fn ensure_not_eco(&self, accessor: &TraitAccessor) -> Result<(), HapStatus> {
        if accessor.snapshot().eco_mode == Some(EcoMode::ManualEco) {
            info!("{}: write refused, eco mode is active", self.name);
            return Err(HapStatus::NotAllowedInCurrentState);
        }
        Ok(())
    }

    pub async fn current_heating_cooling_state(&self) -> Result<CurrentHeatingCoolingState, HapStatus> {
        let accessor = self.accessor().await?;
        Ok(CurrentHeatingCoolingState::from_remote(accessor.hvac_status()?))
    }

    pub async fn target_heating_cooling_state(&self) -> Result<TargetHeatingCoolingState, HapStatus> {
        let accessor = self.accessor().await?;
        Ok(TargetHeatingCoolingState::from_remote(accessor.target_mode()?))
    }

    pub async fn set_target_heating_cooling_state(&self, state: TargetHeatingCoolingState) -> Result<(), HapStatus> {
        let accessor = self.accessor().await?;
        self.ensure_not_eco(&accessor)?;

        let mode = state.to_remote();
        if !accessor.available_target_modes()?.contains(mode.wire_name()) {
            info!("{}: mode {} not supported by device", self.name, mode.wire_name());
            return Err(HapStatus::InvalidValueInRequest);
        }

        self.send(Command::set_mode(mode)).await;
        Ok(())
    }

    pub async fn current_temperature(&self) -> Result<f64, HapStatus> {
        self.accessor().await?.current_temperature_c()
    }

    pub async fn target_temperature(&self) -> Result<f64, HapStatus> {
        let accessor = self.accessor().await?;
        target_setpoint(accessor.snapshot()).ok_or_else(|| not_found("temperature setpoint"))
    }

    /// The device only takes threshold or range commands.
    pub async fn set_target_temperature(&self, _celsius: f64) -> Result<(), HapStatus> {
        Err(HapStatus::ReadOnlyCharacteristic)
    }

    pub async fn cooling_threshold(&self) -> Result<f64, HapStatus> {
        let accessor = self.accessor().await?;
        let setpoint = accessor.snapshot().temperature_setpoint;
        setpoint
            .cool_c
            .or(setpoint.heat_c)
            .ok_or_else(|| not_found("cooling threshold"))
    }

    pub async fn heating_threshold(&self) -> Result<f64, HapStatus> {
        let accessor = self.accessor().await?;
        let setpoint = accessor.snapshot().temperature_setpoint;
        setpoint
            .heat_c
            .or(setpoint.cool_c)
            .ok_or_else(|| not_found("heating threshold"))
    }

    pub async fn set_cooling_threshold(&self, celsius: f64) -> Result<(), HapStatus> {
        let accessor = self.accessor().await?;
        self.ensure_not_eco(&accessor)?;

        let cool = round_to_step(celsius);
        let command = match accessor.target_mode()? {
            ThermostatMode::Cool => Command::set_cool(cool),
            ThermostatMode::HeatCool => Command::set_range(accessor.heat_c()?, cool),
            other => {
                info!("{}: cooling threshold not settable in mode {:?}", self.name, other);
                return Err(HapStatus::NotAllowedInCurrentState);
            }
        };
        self.send(command).await;
        Ok(())
    }

    pub async fn set_heating_threshold(&self, celsius: f64) -> Result<(), HapStatus> {
        let accessor = self.accessor().await?;
        self.ensure_not_eco(&accessor)?;

        let heat = round_to_step(celsius);
        let command = match accessor.target_mode()? {
            ThermostatMode::Heat => Command::set_heat(heat),
            ThermostatMode::HeatCool => Command::set_range(heat, accessor.cool_c()?),
            other => {
                info!("{}: heating threshold not settable in mode {:?}", self.name, other);
                return Err(HapStatus::NotAllowedInCurrentState);
            }
        };
        self.send(command).await;
        Ok(())
    }

    pub async fn temperature_display_units(&self) -> Result<TemperatureDisplayUnits, HapStatus> {
        let accessor = self.accessor().await?;
        Ok(TemperatureDisplayUnits::from_remote(accessor.display_unit()?))
    }

    pub async fn set_temperature_display_units(&self, _units: TemperatureDisplayUnits) -> Result<(), HapStatus> {
        Err(HapStatus::ReadOnlyCharacteristic)
    }

    pub async fn current_relative_humidity(&self) -> Result<f64, HapStatus> {
        self.accessor().await?.relative_humidity_percent()
    }

    pub async fn eco_mode(&self) -> Result<bool, HapStatus> {
        Ok(self.accessor().await?.eco_mode()? == EcoMode::ManualEco)
    }

    pub async fn set_eco_mode(&self, enabled: bool) -> Result<(), HapStatus> {
        self.accessor().await?;
        self.send(Command::set_eco(enabled)).await;
        Ok(())
    }

    /// Read dispatch for host frameworks that register one handler per characteristic.
    pub async fn read(&self, characteristic: Characteristic) -> Result<CharacteristicValue, HapStatus> {
        use CharacteristicValue::{Bool, Float, UInt};

        Ok(match characteristic {
            Characteristic::CurrentHeatingCoolingState => UInt(self.current_heating_cooling_state().await? as u8),
            Characteristic::TargetHeatingCoolingState => UInt(self.target_heating_cooling_state().await? as u8),
            Characteristic::CurrentTemperature => Float(self.current_temperature().await?),
            Characteristic::TargetTemperature => Float(self.target_temperature().await?),
            Characteristic::TemperatureDisplayUnits => UInt(self.temperature_display_units().await? as u8),
            Characteristic::CoolingThresholdTemperature => Float(self.cooling_threshold().await?),
            Characteristic::HeatingThresholdTemperature => Float(self.heating_threshold().await?),
            Characteristic::CurrentRelativeHumidity => Float(self.current_relative_humidity().await?),
            Characteristic::EcoMode => Bool(self.eco_mode().await?),
        })
    }

    pub async fn write(&self, characteristic: Characteristic, value: CharacteristicValue) -> Result<(), HapStatus> {
        use CharacteristicValue::{Bool, Float, UInt};

        match (characteristic, value) {
            (Characteristic::TargetHeatingCoolingState, UInt(v)) => {
                let state = TargetHeatingCoolingState::from_value(v).ok_or(HapStatus::InvalidValueInRequest)?;
                self.set_target_heating_cooling_state(state).await
            }
            (Characteristic::CoolingThresholdTemperature, Float(v)) => self.set_cooling_threshold(v).await,
            (Characteristic::HeatingThresholdTemperature, Float(v)) => self.set_heating_threshold(v).await,
            (Characteristic::EcoMode, Bool(v)) => self.set_eco_mode(v).await,
            (Characteristic::TargetTemperature, Float(v)) => self.set_target_temperature(v).await,
            (
                Characteristic::TemperatureDisplayUnits
                | Characteristic::CurrentHeatingCoolingState
                | Characteristic::CurrentTemperature
                | Characteristic::CurrentRelativeHumidity,
                _,
            ) => Err(HapStatus::ReadOnlyCharacteristic),
            _ => Err(HapStatus::InvalidValueInRequest),
        }
    }
}
