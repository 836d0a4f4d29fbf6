//! Values exchanged between the state machines and whatever drives them.

use std::fmt;

use crate::protocols::bb84::key::EncryptionKey;

/// Side effect requested by a state machine.
///
/// Actions are returned in the order they must be executed.
#[derive(Debug)]
pub enum Action<S> {
    /// Put a symbol on the quantum link.
    Transmit(S),
    /// Put a message on the classical link.
    Send(String),
    /// The run is over.
    Complete(Outcome),
}

/// Link a state machine is currently blocked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    Quantum,
    Classical,
}

/// Final result of a run that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Accepted(EncryptionKey),
    Discarded(DiscardReason),
}

impl Outcome {
    pub fn key(&self) -> Option<&EncryptionKey> {
        match self {
            Outcome::Accepted(key) => Some(key),
            Outcome::Discarded(_) => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }
}

/// Why no key was kept.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscardReason {
    /// Measured QBER failed the acceptance policy.
    QberAboveThreshold(f64),
    /// No basis-matched positions were available for estimation.
    EmptySample,
    /// Too few retained positions for a full-length key.
    KeyTooShort { available: usize, required: usize },
    /// The responder answered `DISCARD`.
    PeerRejected,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::QberAboveThreshold(qber) => write!(f, "QBER {qber:.2}% above threshold"),
            DiscardReason::EmptySample => f.write_str("empty estimation sample"),
            DiscardReason::KeyTooShort { available, required } => {
                write!(f, "only {available} of {required} key bits retained")
            }
            DiscardReason::PeerRejected => f.write_str("rejected by responder"),
        }
    }
}
