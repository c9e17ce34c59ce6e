//! Typed actuator command values
//!
//! Anything outside these sets is rejected before a socket is opened.

use std::fmt;

use crate::error::ModbusError;

/// Door/vent position written with FC06
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveAngle {
    Closed,
    Open,
}

impl ValveAngle {
    pub fn from_open(open: bool) -> Self {
        if open {
            ValveAngle::Open
        } else {
            ValveAngle::Closed
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            ValveAngle::Closed => 0,
            ValveAngle::Open => 90,
        }
    }
}

impl TryFrom<u16> for ValveAngle {
    type Error = ModbusError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ValveAngle::Closed),
            90 => Ok(ValveAngle::Open),
            other => Err(ModbusError::InvalidCommandValue(format!(
                "angle {} (allowed: 0, 90)",
                other
            ))),
        }
    }
}

impl fmt::Display for ValveAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Light switch written with FC05
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoilState {
    Off,
    On,
}

impl CoilState {
    pub fn is_on(self) -> bool {
        matches!(self, CoilState::On)
    }
}

impl From<bool> for CoilState {
    fn from(on: bool) -> Self {
        if on {
            CoilState::On
        } else {
            CoilState::Off
        }
    }
}

impl TryFrom<u16> for CoilState {
    type Error = ModbusError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CoilState::Off),
            1 => Ok(CoilState::On),
            other => Err(ModbusError::InvalidCommandValue(format!(
                "coil value {} (allowed: 0, 1)",
                other
            ))),
        }
    }
}

impl fmt::Display for CoilState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_on() { "ON" } else { "OFF" })
    }
}
