//! Models for the Smart Device Management (SDM) thermostat traits and commands.
//!
//! Wire vocabulary only. The HTTP client lives in `client.rs`.
//!
//! Notes
//! - Trait values are SCREAMING_SNAKE_CASE strings on the wire.
//! - Every enum carries an `Unknown` variant so that new values sent by the
//!   cloud never fail decoding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =====================
// Trait keys
// =====================

pub mod trait_keys {
    pub const CONNECTIVITY: &str = "sdm.devices.traits.Connectivity";
    pub const HUMIDITY: &str = "sdm.devices.traits.Humidity";
    pub const SETTINGS: &str = "sdm.devices.traits.Settings";
    pub const TEMPERATURE: &str = "sdm.devices.traits.Temperature";
    pub const THERMOSTAT_ECO: &str = "sdm.devices.traits.ThermostatEco";
    pub const THERMOSTAT_HVAC: &str = "sdm.devices.traits.ThermostatHvac";
    pub const THERMOSTAT_MODE: &str = "sdm.devices.traits.ThermostatMode";
    pub const THERMOSTAT_TEMPERATURE_SETPOINT: &str = "sdm.devices.traits.ThermostatTemperatureSetpoint";
}

// =====================
// Command names
// =====================

pub mod command_names {
    pub const SET_MODE: &str = "ThermostatMode.SetMode";
    pub const SET_HEAT: &str = "ThermostatTemperatureSetpoint.SetHeat";
    pub const SET_COOL: &str = "ThermostatTemperatureSetpoint.SetCool";
    pub const SET_RANGE: &str = "ThermostatTemperatureSetpoint.SetRange";
    pub const SET_ECO: &str = "ThermostatEco.SetMode";
}

/// Prefix the cloud expects in front of every command name on the wire.
pub const COMMAND_NAMESPACE: &str = "sdm.devices.commands.";

// =====================
// Trait value enums
// =====================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Connectivity {
    Online,
    Offline,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EcoMode {
    ManualEco,
    Off,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HvacStatus {
    Heating,
    Cooling,
    Off,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThermostatMode {
    #[serde(rename = "HEAT")]
    Heat,
    #[serde(rename = "COOL")]
    Cool,
    #[serde(rename = "HEATCOOL")]
    HeatCool,
    #[serde(rename = "OFF")]
    Off,
    #[serde(other)]
    Unknown,
}

impl ThermostatMode {
    /// Name used by the cloud, both in `availableModes` and in `SetMode`.
    pub fn wire_name(self) -> &'static str {
        match self {
            ThermostatMode::Heat => "HEAT",
            ThermostatMode::Cool => "COOL",
            ThermostatMode::HeatCool => "HEATCOOL",
            ThermostatMode::Off => "OFF",
            ThermostatMode::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemperatureScale {
    Celsius,
    Fahrenheit,
    #[serde(other)]
    Unknown,
}

// =====================
// Commands
// =====================

/// A remote mutation. Fire-and-forget: only the immediate HTTP status is observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    #[serde(rename = "command")]
    pub name: String,
    pub params: Map<String, Value>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Command {
            name: name.into(),
            params: Map::new(),
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn set_mode(mode: ThermostatMode) -> Self {
        Command::new(command_names::SET_MODE).param("mode", mode.wire_name())
    }

    pub fn set_heat(heat_c: f64) -> Self {
        Command::new(command_names::SET_HEAT).param("heatCelsius", heat_c)
    }

    pub fn set_cool(cool_c: f64) -> Self {
        Command::new(command_names::SET_COOL).param("coolCelsius", cool_c)
    }

    pub fn set_range(heat_c: f64, cool_c: f64) -> Self {
        Command::new(command_names::SET_RANGE)
            .param("heatCelsius", heat_c)
            .param("coolCelsius", cool_c)
    }

    pub fn set_eco(enabled: bool) -> Self {
        let mode = if enabled { "MANUAL_ECO" } else { "OFF" };
        Command::new(command_names::SET_ECO).param("mode", mode)
    }

    /// Body posted to `:executeCommand`, with the namespaced command name.
    pub fn to_wire(&self) -> Value {
        serde_json::json!({
            "command": format!("{}{}", COMMAND_NAMESPACE, self.name),
            "params": Value::Object(self.params.clone()),
        })
    }
}
