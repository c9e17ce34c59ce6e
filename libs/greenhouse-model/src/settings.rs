//! Per-greenhouse bulk automation thresholds

use serde::{Deserialize, Serialize};

use crate::device::{
    Device, DeviceKind, DEFAULT_DAYLIGHT_HOURS, DEFAULT_SOIL_MOISTURE_TRIGGER,
    DEFAULT_TEMPERATURE_TRIGGER,
};

pub const TEMPERATURE_RANGE: (f64, f64) = (15.0, 40.0);
pub const SOIL_MOISTURE_RANGE: (f64, f64) = (0.0, 100.0);
pub const DAYLIGHT_RANGE: (f64, f64) = (0.0, 24.0);

/// Thresholds applied to the first device of each kind in a greenhouse
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSettings {
    pub temperature_trigger: f64,
    pub soil_moisture_trigger: f64,
    pub daylight_hours: f64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            temperature_trigger: DEFAULT_TEMPERATURE_TRIGGER,
            soil_moisture_trigger: DEFAULT_SOIL_MOISTURE_TRIGGER,
            daylight_hours: f64::from(DEFAULT_DAYLIGHT_HOURS),
        }
    }
}

fn round_clamp(value: f64, (lo, hi): (f64, f64), fallback: f64) -> f64 {
    if value.is_finite() {
        value.round_ties_even().clamp(lo, hi)
    } else {
        fallback
    }
}

impl ControllerSettings {
    /// Current thresholds of a greenhouse, defaults where a kind is absent
    pub fn from_devices<'a>(devices: impl IntoIterator<Item = &'a Device>) -> Self {
        let mut settings = Self::default();
        let mut seen = [false; 3];
        for device in devices {
            match device.kind {
                DeviceKind::Ventilation if !seen[0] => {
                    seen[0] = true;
                    if let Some(t) = device.temperature_trigger {
                        settings.temperature_trigger = t;
                    }
                },
                DeviceKind::Door if !seen[1] => {
                    seen[1] = true;
                    if let Some(s) = device.soil_moisture_trigger {
                        settings.soil_moisture_trigger = s;
                    }
                },
                DeviceKind::Light if !seen[2] => {
                    seen[2] = true;
                    if let Some(h) = device.daylight_hours {
                        settings.daylight_hours = f64::from(h);
                    }
                },
                _ => {},
            }
        }
        settings
    }

    /// Whole numbers within the allowed ranges
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        Self {
            temperature_trigger: round_clamp(
                self.temperature_trigger,
                TEMPERATURE_RANGE,
                defaults.temperature_trigger,
            ),
            soil_moisture_trigger: round_clamp(
                self.soil_moisture_trigger,
                SOIL_MOISTURE_RANGE,
                defaults.soil_moisture_trigger,
            ),
            daylight_hours: round_clamp(self.daylight_hours, DAYLIGHT_RANGE, defaults.daylight_hours),
        }
    }

    pub fn daylight_hours_whole(&self) -> u32 {
        self.normalized().daylight_hours as u32
    }
}
