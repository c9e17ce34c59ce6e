//! Greenhouse automation rules
//!
//! A rule engine for one attended greenhouse, run once per automation tick:
//! - Door opens while soil moisture is below its trigger
//! - Ventilation opens above its temperature trigger, with hysteresis
//! - Light follows a daily on/off duty cycle
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ SensorStore │────▶│    decide    │────▶│  Registry   │
//! │  (latest)   │     │  (per device)│     │  (persist)  │
//! └─────────────┘     └──────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌──────────────┐     ┌─────────────┐
//!                     │   FieldBus   │     │  Notifier   │
//!                     │ (coil/angle) │     │ (UI/alerts) │
//!                     └──────────────┘     └─────────────┘
//! ```

pub mod actuator;
pub mod decision;
mod engine;
pub mod notify;

pub use actuator::{drive_actuator, endpoint_of};
pub use decision::{decide, Actuation, Decision, TEMPERATURE_HYSTERESIS};
pub use engine::{AppliedChange, AutomationEngine, SkipReason, TickReport};
pub use notify::{Notifier, NotifierEvent, RecordingNotifier, TracingNotifier};
