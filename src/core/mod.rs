//! Core module - Configuration, errors, and common types

mod config;
mod error;
mod types;

pub use config::{Config, HistoryConfig, PricingConfig, SamplingConfig};
pub use error::{Error, Result};
pub use types::{
    AggregatePowerReading, Component, ComponentId, ComponentKind, Method, PowerReading,
    TelemetryReading, TelemetrySnapshot,
};
