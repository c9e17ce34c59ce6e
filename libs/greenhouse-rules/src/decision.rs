//! Pure per-device automation decisions
//!
//! [`decide`] looks at one device, the latest connected sample and the
//! current time, and says whether the device should change state. It never
//! touches the registry or the network.

use chrono::{DateTime, Duration, Utc};
use greenhouse_model::{Device, DeviceKind, LightStamp, SensorSample};

/// Ventilation stays open until the temperature drops this far below the trigger
pub const TEMPERATURE_HYSTERESIS: f64 = 0.5;

/// Length of one grow light cycle
pub const LIGHT_CYCLE_HOURS: i64 = 24;

/// Target state for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actuation {
    pub is_on: bool,
    pub stamp: LightStamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Leave the device as it is
    Hold,
    Actuate(Actuation),
}

impl Decision {
    fn switch(device: &Device, desired: bool) -> Self {
        if desired == device.is_on {
            Decision::Hold
        } else {
            Decision::Actuate(Actuation {
                is_on: desired,
                stamp: LightStamp::Keep,
            })
        }
    }
}

pub fn decide(device: &Device, sample: &SensorSample, now: DateTime<Utc>) -> Decision {
    match device.kind {
        DeviceKind::Door => decide_door(device, sample),
        DeviceKind::Ventilation => decide_ventilation(device, sample),
        DeviceKind::Light => decide_light(device, now),
    }
}

fn decide_door(device: &Device, sample: &SensorSample) -> Decision {
    let Some(trigger) = device.soil_moisture_trigger else {
        return Decision::Hold;
    };
    Decision::switch(device, sample.soil_moisture < trigger)
}

fn decide_ventilation(device: &Device, sample: &SensorSample) -> Decision {
    let Some(trigger) = device.temperature_trigger else {
        return Decision::Hold;
    };
    let threshold = if device.is_on {
        trigger - TEMPERATURE_HYSTERESIS
    } else {
        trigger
    };
    Decision::switch(device, sample.temperature > threshold)
}

fn decide_light(device: &Device, now: DateTime<Utc>) -> Decision {
    let Some(daylight_hours) = device.daylight_hours else {
        return Decision::Hold;
    };

    let elapsed = device.light_on_time.map(|started| now - started);
    match elapsed {
        None => Decision::Actuate(Actuation {
            is_on: true,
            stamp: LightStamp::Set(now),
        }),
        Some(elapsed) if elapsed >= Duration::hours(LIGHT_CYCLE_HOURS) => {
            Decision::Actuate(Actuation {
                is_on: true,
                stamp: LightStamp::Set(now),
            })
        },
        Some(elapsed) if device.is_on && elapsed >= Duration::hours(i64::from(daylight_hours)) => {
            Decision::Actuate(Actuation {
                is_on: false,
                stamp: LightStamp::Keep,
            })
        },
        Some(_) => Decision::Hold,
    }
}
