//! Local characteristic vocabulary (HomeKit thermostat service + eco switch).

use crate::models::sdm::{HvacStatus, TemperatureScale, ThermostatMode};
use core::fmt;
use std::fmt::{Display, Formatter};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CurrentHeatingCoolingState {
    Off = 0,
    Heat = 1,
    Cool = 2,
}

impl CurrentHeatingCoolingState {
    pub fn from_remote(status: HvacStatus) -> Self {
        match status {
            HvacStatus::Heating => CurrentHeatingCoolingState::Heat,
            HvacStatus::Cooling => CurrentHeatingCoolingState::Cool,
            HvacStatus::Off | HvacStatus::Unknown => CurrentHeatingCoolingState::Off,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TargetHeatingCoolingState {
    Off = 0,
    Heat = 1,
    Cool = 2,
    Auto = 3,
}

impl TargetHeatingCoolingState {
    pub const ALL: [TargetHeatingCoolingState; 4] = [
        TargetHeatingCoolingState::Off,
        TargetHeatingCoolingState::Heat,
        TargetHeatingCoolingState::Cool,
        TargetHeatingCoolingState::Auto,
    ];

    pub fn to_remote(self) -> ThermostatMode {
        match self {
            TargetHeatingCoolingState::Off => ThermostatMode::Off,
            TargetHeatingCoolingState::Heat => ThermostatMode::Heat,
            TargetHeatingCoolingState::Cool => ThermostatMode::Cool,
            TargetHeatingCoolingState::Auto => ThermostatMode::HeatCool,
        }
    }

    /// Unknown remote modes read as OFF.
    pub fn from_remote(mode: ThermostatMode) -> Self {
        match mode {
            ThermostatMode::Heat => TargetHeatingCoolingState::Heat,
            ThermostatMode::Cool => TargetHeatingCoolingState::Cool,
            ThermostatMode::HeatCool => TargetHeatingCoolingState::Auto,
            ThermostatMode::Off | ThermostatMode::Unknown => TargetHeatingCoolingState::Off,
        }
    }

    pub fn from_value(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| *s as u8 == value)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TemperatureDisplayUnits {
    Celsius = 0,
    Fahrenheit = 1,
}

impl TemperatureDisplayUnits {
    pub fn from_remote(scale: TemperatureScale) -> Self {
        match scale {
            TemperatureScale::Fahrenheit => TemperatureDisplayUnits::Fahrenheit,
            TemperatureScale::Celsius | TemperatureScale::Unknown => TemperatureDisplayUnits::Celsius,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Characteristic {
    CurrentHeatingCoolingState,
    TargetHeatingCoolingState,
    CurrentTemperature,
    TargetTemperature,
    TemperatureDisplayUnits,
    CoolingThresholdTemperature,
    HeatingThresholdTemperature,
    CurrentRelativeHumidity,
    EcoMode,
}

impl Characteristic {
    pub const ALL: [Characteristic; 9] = [
        Characteristic::CurrentHeatingCoolingState,
        Characteristic::TargetHeatingCoolingState,
        Characteristic::CurrentTemperature,
        Characteristic::TargetTemperature,
        Characteristic::TemperatureDisplayUnits,
        Characteristic::CoolingThresholdTemperature,
        Characteristic::HeatingThresholdTemperature,
        Characteristic::CurrentRelativeHumidity,
        Characteristic::EcoMode,
    ];
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CharacteristicValue {
    Bool(bool),
    UInt(u8),
    Float(f64),
}

impl Display for CharacteristicValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CharacteristicValue::Bool(b) => write!(f, "{}", b),
            CharacteristicValue::UInt(v) => write!(f, "{}", v),
            CharacteristicValue::Float(v) => write!(f, "{:.1}", v),
        }
    }
}
