//! Canonical thermostat snapshot extracted from a raw SDM device document.

use crate::models::sdm::{trait_keys, Connectivity, EcoMode, HvacStatus, TemperatureScale, ThermostatMode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TemperatureSetpoint {
    pub heat_c: Option<f64>,
    pub cool_c: Option<f64>,
}

/// Immutable view of every trait the bridge understands. Each field is
/// independently optional because the cloud may omit any trait group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Traits {
    pub connectivity: Option<Connectivity>,
    pub eco_mode: Option<EcoMode>,
    pub current_temperature_c: Option<f64>,
    pub hvac_status: Option<HvacStatus>,
    pub target_mode: Option<ThermostatMode>,
    pub available_target_modes: Option<BTreeSet<String>>,
    pub display_unit: Option<TemperatureScale>,
    pub temperature_setpoint: TemperatureSetpoint,
    pub relative_humidity_percent: Option<f64>,
}

impl Traits {
    pub fn is_offline(&self) -> bool {
        self.connectivity == Some(Connectivity::Offline)
    }
}

/// Build a [`Traits`] record from a device document. Never fails: missing or
/// mistyped paths leave the corresponding field empty.
pub fn extract(document: &Value) -> Traits {
    let field = |key: &str, name: &str| trait_field(document, key, name);

    Traits {
        connectivity: field(trait_keys::CONNECTIVITY, "status").and_then(decode),
        eco_mode: field(trait_keys::THERMOSTAT_ECO, "mode").and_then(decode),
        current_temperature_c: field(trait_keys::TEMPERATURE, "ambientTemperatureCelsius").and_then(Value::as_f64),
        hvac_status: field(trait_keys::THERMOSTAT_HVAC, "status").and_then(decode),
        target_mode: field(trait_keys::THERMOSTAT_MODE, "mode").and_then(decode),
        available_target_modes: field(trait_keys::THERMOSTAT_MODE, "availableModes")
            .and_then(Value::as_array)
            .map(|modes| modes.iter().filter_map(Value::as_str).map(str::to_string).collect()),
        display_unit: field(trait_keys::SETTINGS, "temperatureScale").and_then(decode),
        temperature_setpoint: TemperatureSetpoint {
            heat_c: field(trait_keys::THERMOSTAT_TEMPERATURE_SETPOINT, "heatCelsius").and_then(Value::as_f64),
            cool_c: field(trait_keys::THERMOSTAT_TEMPERATURE_SETPOINT, "coolCelsius").and_then(Value::as_f64),
        },
        relative_humidity_percent: field(trait_keys::HUMIDITY, "ambientHumidityPercent").and_then(Value::as_f64),
    }
}

fn trait_field<'a>(document: &'a Value, key: &str, name: &str) -> Option<&'a Value> {
    document.get("traits")?.get(key)?.get(name)
}

fn decode<T: DeserializeOwned>(value: &Value) -> Option<T> {
    // Only strings are accepted; `#[serde(other)]` maps unrecognised names to `Unknown`.
    let name = value.as_str()?;
    serde_json::from_value(Value::String(name.to_string())).ok()
}
