//! Temperature bounds advertised for each temperature characteristic.
//!
//! Celsius devices get fixed Celsius bounds. Fahrenheit devices get bounds that
//! are round numbers in Fahrenheit, converted to the Celsius values every
//! characteristic carries.

use crate::cache::DisplayUnitObserver;
use crate::models::sdm::TemperatureScale;
use log::info;
use std::sync::{PoisonError, RwLock};

pub const STEP_C: f64 = 0.1;

const CELSIUS_SET_MIN: f64 = 10.0;
const CELSIUS_SET_MAX: f64 = 32.0;
const CELSIUS_MEASURE_MIN: f64 = -20.0;
const CELSIUS_MEASURE_MAX: f64 = 60.0;

const FAHRENHEIT_SET_MIN: f64 = 50.0;
const FAHRENHEIT_SET_MAX: f64 = 90.0;
const FAHRENHEIT_MEASURE_MIN: f64 = 0.0;
const FAHRENHEIT_MEASURE_MAX: f64 = 160.0;

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) / 1.8
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureRanges {
    /// Current temperature (measurement) bounds.
    pub measurement: Range,
    /// Target temperature and both thresholds.
    pub setpoint: Range,
}

impl TemperatureRanges {
    pub fn celsius() -> Self {
        TemperatureRanges {
            measurement: Range {
                min: CELSIUS_MEASURE_MIN,
                max: CELSIUS_MEASURE_MAX,
                step: STEP_C,
            },
            setpoint: Range {
                min: CELSIUS_SET_MIN,
                max: CELSIUS_SET_MAX,
                step: STEP_C,
            },
        }
    }

    pub fn fahrenheit() -> Self {
        TemperatureRanges {
            measurement: Range {
                min: fahrenheit_to_celsius(FAHRENHEIT_MEASURE_MIN),
                max: fahrenheit_to_celsius(FAHRENHEIT_MEASURE_MAX),
                step: STEP_C,
            },
            setpoint: Range {
                min: fahrenheit_to_celsius(FAHRENHEIT_SET_MIN),
                max: fahrenheit_to_celsius(FAHRENHEIT_SET_MAX),
                step: STEP_C,
            },
        }
    }

    pub fn for_unit(unit: TemperatureScale) -> Self {
        match unit {
            TemperatureScale::Fahrenheit => TemperatureRanges::fahrenheit(),
            TemperatureScale::Celsius | TemperatureScale::Unknown => TemperatureRanges::celsius(),
        }
    }
}

#[derive(Debug)]
struct RangeState {
    unit: TemperatureScale,
    ranges: TemperatureRanges,
}

/// Live range configuration of one accessory, reconfigured on unit changes.
#[derive(Debug)]
pub struct RangeConfig {
    name: String,
    state: RwLock<RangeState>,
}

impl RangeConfig {
    pub fn new(name: impl Into<String>) -> Self {
        RangeConfig {
            name: name.into(),
            state: RwLock::new(RangeState {
                unit: TemperatureScale::Celsius,
                ranges: TemperatureRanges::celsius(),
            }),
        }
    }

    pub fn current(&self) -> TemperatureRanges {
        self.state.read().unwrap_or_else(PoisonError::into_inner).ranges
    }

    pub fn unit(&self) -> TemperatureScale {
        self.state.read().unwrap_or_else(PoisonError::into_inner).unit
    }

    /// Recompute ranges for `unit`. Returns false when nothing changed.
    pub fn apply(&self, unit: TemperatureScale) -> bool {
        if unit == TemperatureScale::Unknown {
            return false;
        }
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.unit == unit {
            return false;
        }
        state.unit = unit;
        state.ranges = TemperatureRanges::for_unit(unit);
        info!(
            "{}: temperature ranges reconfigured for {:?} (set {:.2}..{:.2}, measured {:.2}..{:.2})",
            self.name,
            unit,
            state.ranges.setpoint.min,
            state.ranges.setpoint.max,
            state.ranges.measurement.min,
            state.ranges.measurement.max
        );
        true
    }
}

impl DisplayUnitObserver for RangeConfig {
    fn display_unit_changed(&self, unit: TemperatureScale) {
        self.apply(unit);
    }
}
