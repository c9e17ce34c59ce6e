//! Actuator devices and their automation parameters

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::validation::validate_name;

/// Default ventilation trigger, °C
pub const DEFAULT_TEMPERATURE_TRIGGER: f64 = 25.0;
/// Default irrigation door trigger, % soil moisture
pub const DEFAULT_SOIL_MOISTURE_TRIGGER: f64 = 40.0;
/// Default grow light photoperiod, hours
pub const DEFAULT_DAYLIGHT_HOURS: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Irrigation door, driven by soil moisture
    Door,
    /// Vent, driven by temperature
    Ventilation,
    /// Grow light on a daily duty cycle
    #[serde(alias = "NewLight")]
    Light,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 3] = [DeviceKind::Ventilation, DeviceKind::Door, DeviceKind::Light];

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::Door => "Door",
            DeviceKind::Ventilation => "Ventilation",
            DeviceKind::Light => "Light",
        }
    }

    /// Lights are switched by coil, doors and vents by a register angle
    pub fn uses_coil(self) -> bool {
        matches!(self, DeviceKind::Light)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "door" => Ok(DeviceKind::Door),
            "ventilation" => Ok(DeviceKind::Ventilation),
            "light" | "newlight" => Ok(DeviceKind::Light),
            other => Err(ModelError::validation(format!(
                "unknown device type '{}'",
                other
            ))),
        }
    }
}

/// An actuator bound to one greenhouse
///
/// Keyed by `(name, greenhouse_name)`. Only the trigger matching `kind`
/// is meaningful; the others are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub register: u16,
    #[serde(default)]
    pub is_on: bool,
    #[serde(default)]
    pub is_auto: bool,
    pub greenhouse_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_trigger: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soil_moisture_trigger: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daylight_hours: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light_on_time: Option<DateTime<Utc>>,
}

impl Device {
    /// New device, off and manual, with the default trigger for its kind
    pub fn new(
        name: impl Into<String>,
        kind: DeviceKind,
        register: u16,
        greenhouse_name: impl Into<String>,
    ) -> Self {
        let mut device = Self {
            name: name.into(),
            kind,
            register,
            is_on: false,
            is_auto: false,
            greenhouse_name: greenhouse_name.into(),
            temperature_trigger: None,
            soil_moisture_trigger: None,
            daylight_hours: None,
            light_on_time: None,
        };
        match kind {
            DeviceKind::Ventilation => {
                device.temperature_trigger = Some(DEFAULT_TEMPERATURE_TRIGGER)
            },
            DeviceKind::Door => device.soil_moisture_trigger = Some(DEFAULT_SOIL_MOISTURE_TRIGGER),
            DeviceKind::Light => device.daylight_hours = Some(DEFAULT_DAYLIGHT_HOURS),
        }
        device
    }

    pub fn with_auto(mut self, is_auto: bool) -> Self {
        self.is_auto = is_auto;
        self
    }

    pub fn is_key(&self, name: &str, greenhouse_name: &str) -> bool {
        self.name == name && self.greenhouse_name == greenhouse_name
    }

    /// True when the trigger for this kind is set
    pub fn has_trigger(&self) -> bool {
        match self.kind {
            DeviceKind::Ventilation => self.temperature_trigger.is_some(),
            DeviceKind::Door => self.soil_moisture_trigger.is_some(),
            DeviceKind::Light => self.daylight_hours.is_some(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_name(&self.greenhouse_name)?;
        if !self.has_trigger() {
            return Err(ModelError::MissingTrigger(format!(
                "{} '{}' has no trigger",
                self.kind, self.name
            )));
        }
        if let Some(t) = self.temperature_trigger {
            if !t.is_finite() {
                return Err(ModelError::validation("temperature trigger must be finite"));
            }
        }
        if let Some(s) = self.soil_moisture_trigger {
            if !(0.0..=100.0).contains(&s) {
                return Err(ModelError::validation(format!(
                    "soil moisture trigger {} outside 0-100",
                    s
                )));
            }
        }
        if let Some(h) = self.daylight_hours {
            if h > 24 {
                return Err(ModelError::validation(format!(
                    "daylight hours {} outside 0-24",
                    h
                )));
            }
        }
        Ok(())
    }
}

/// How a state change treats `light_on_time`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightStamp {
    #[default]
    Keep,
    Set(DateTime<Utc>),
    Clear,
}

impl LightStamp {
    pub fn apply(self, slot: &mut Option<DateTime<Utc>>) {
        match self {
            LightStamp::Keep => {},
            LightStamp::Set(at) => *slot = Some(at),
            LightStamp::Clear => *slot = None,
        }
    }
}
