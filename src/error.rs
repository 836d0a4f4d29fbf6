//! Protocol and configuration errors.

use std::time::Duration;

use thiserror::Error;

use crate::errors::{ChannelError, StateError};

/// Errors that terminate a BB84 run.
///
/// None of these are retried: once an actor returns one, its run is over and
/// it holds no key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// The peer sent something other than the message the current state requires.
    #[error("protocol violation: expected {expected}, got {got:?}")]
    ProtocolViolation { expected: String, got: String },

    /// Two bit strings that must be compared position by position differ in length.
    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    /// The sifting message could not be parsed.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Fewer retained positions than requested key bits.
    #[error("key too short: {available} retained bits, {required} required")]
    KeyTooShort { available: usize, required: usize },

    /// The estimation sample holds no positions, so QBER is undefined.
    #[error("estimation sample is empty")]
    EmptySample,

    /// An await exceeded its deadline.
    #[error("timed out after {after:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: &'static str,
        after: Duration,
    },

    /// The peer hung up.
    #[error("{0} link closed")]
    ChannelClosed(&'static str),

    /// An entry point was called in a state that does not accept it.
    #[error("cannot {operation} in state {state}")]
    InvalidState {
        state: String,
        operation: &'static str,
    },

    #[error("quantum state error: {0}")]
    Quantum(#[from] StateError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Errors raised while loading or validating a [`ProtocolConfig`](crate::ProtocolConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors that stop a session before it yields a report.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
