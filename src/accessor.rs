//! Fail-fast field access over a [`Traits`] snapshot.
//!
//! Callers use `?` on every getter instead of null-checking; a missing field
//! becomes [`HapStatus::ResourceDoesNotExist`] for the whole request.

use crate::device_traits::Traits;
use crate::models::sdm::{Connectivity, EcoMode, HvacStatus, TemperatureScale, ThermostatMode};
use crate::status::HapStatus;
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TraitAccessor {
    traits: Arc<Traits>,
    observed_at: DateTime<Utc>,
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, HapStatus> {
    value.ok_or_else(|| {
        debug!("Trait field {} missing from snapshot", field);
        HapStatus::ResourceDoesNotExist
    })
}

impl TraitAccessor {
    pub fn new(traits: Arc<Traits>) -> Self {
        TraitAccessor {
            traits,
            observed_at: Utc::now(),
        }
    }

    /// Wall-clock time the snapshot was received.
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// The snapshot this accessor reads from.
    pub fn snapshot(&self) -> &Arc<Traits> {
        &self.traits
    }

    pub fn connectivity(&self) -> Result<Connectivity, HapStatus> {
        require(self.traits.connectivity, "connectivity")
    }

    pub fn eco_mode(&self) -> Result<EcoMode, HapStatus> {
        require(self.traits.eco_mode, "eco_mode")
    }

    pub fn current_temperature_c(&self) -> Result<f64, HapStatus> {
        require(self.traits.current_temperature_c, "current_temperature_c")
    }

    pub fn hvac_status(&self) -> Result<HvacStatus, HapStatus> {
        require(self.traits.hvac_status, "hvac_status")
    }

    pub fn target_mode(&self) -> Result<ThermostatMode, HapStatus> {
        require(self.traits.target_mode, "target_mode")
    }

    pub fn available_target_modes(&self) -> Result<&BTreeSet<String>, HapStatus> {
        require(self.traits.available_target_modes.as_ref(), "available_target_modes")
    }

    pub fn display_unit(&self) -> Result<TemperatureScale, HapStatus> {
        require(self.traits.display_unit, "display_unit")
    }

    pub fn heat_c(&self) -> Result<f64, HapStatus> {
        require(self.traits.temperature_setpoint.heat_c, "temperature_setpoint.heat_c")
    }

    pub fn cool_c(&self) -> Result<f64, HapStatus> {
        require(self.traits.temperature_setpoint.cool_c, "temperature_setpoint.cool_c")
    }

    pub fn relative_humidity_percent(&self) -> Result<f64, HapStatus> {
        require(self.traits.relative_humidity_percent, "relative_humidity_percent")
    }
}
