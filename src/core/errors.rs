use num_complex::Complex64;
use thiserror::Error;

/// Failures building or placing a gate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateError {
    #[error("gate does not fit the register")]
    InvalidDimensions,

    #[error("qubit {0} is both control and target")]
    ControlTargetOverlap(usize),

    #[error("qubit {0} listed twice")]
    DuplicateQubit(usize),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeasurementError {
    #[error("operators act on {expected} qubit(s), got {got} target(s)")]
    TargetMismatch { expected: usize, got: usize },

    #[error("qubit {0} listed twice")]
    DuplicateQubit(usize),
}

/// Failures evolving or measuring a [`QuantumState`](crate::QuantumState).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("expected a {expected}x{expected} operator, got {got_rows}x{got_cols}")]
    DimensionMismatch {
        expected: usize,
        got_rows: usize,
        got_cols: usize,
    },

    #[error("qubit {index} out of range for a {num_qubits}-qubit register")]
    IndexOutOfBounds { index: usize, num_qubits: usize },

    #[error("selected outcome has zero probability (trace {0})")]
    ZeroProbability(Complex64),

    #[error("measurement: {0}")]
    MeasurementError(#[from] MeasurementError),

    #[error("gate: {0}")]
    GateError(#[from] GateError),

    #[error("channel: {0}")]
    ChannelError(#[from] ChannelError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("Kraus operators are not trace preserving")]
    NotComplete,

    #[error("channel acts on {expected} qubit(s), got {got} target(s)")]
    TargetMismatch { expected: usize, got: usize },

    #[error("probability {0} outside [0, 1]")]
    InvalidProbability(f64),

    #[error("qubit {0} listed twice")]
    DuplicateQubit(usize),
}
