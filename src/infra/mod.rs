//! Runtime bootstrap for the cachefarm binary.

pub mod error;
pub mod telemetry;
