//! BB84 quantum key distribution over a density-matrix simulator.

pub mod config;
mod core;
pub mod error;
pub mod protocols;

pub use crate::config::ProtocolConfig;
pub use crate::core::{
    Gate, Measurement, MeasurementResult, QuantumChannel, QuantumState, errors, utils,
};
pub use crate::error::{ConfigError, ProtocolError, SessionError};
