//! wattmon library
//!
//! Estimates a PC's electrical power draw from heterogeneous telemetry
//! (direct sensor readings where available, utilization plus TDP constants
//! otherwise), persists the resulting time series, and derives electricity
//! cost projections. The `Monitor` facade is the surface a presentation
//! layer polls.

pub mod catalog;
pub mod core;
pub mod engine;
pub mod history;
pub mod monitor;
pub mod pricing;
pub mod telemetry;
