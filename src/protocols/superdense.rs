//! Superdense coding over a shared Bell pair.
//!
//! Charlie distributes an entangled pair, Alice encodes two classical bits
//! with a single-qubit Pauli on her half and forwards it, Bob decodes both
//! bits with a Bell measurement. Every qubit hop passes a depolarizing
//! channel.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::errors::{ChannelError, StateError};
use crate::{Gate, Measurement, QuantumChannel, QuantumState};

// Register layout: Alice's half of the pair, then Bob's.
const ALICE: usize = 0;
const BOB: usize = 1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SuperdenseError {
    #[error("invalid message {0:?}: expected two bits")]
    InvalidMessage(String),

    #[error("quantum state error: {0}")]
    Quantum(#[from] StateError),

    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Two classical bits, written most significant first (`"10"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub high: bool,
    pub low: bool,
}

impl FromStr for Message {
    type Err = SuperdenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "00" => Ok(Message { high: false, low: false }),
            "01" => Ok(Message { high: false, low: true }),
            "10" => Ok(Message { high: true, low: false }),
            "11" => Ok(Message { high: true, low: true }),
            other => Err(SuperdenseError::InvalidMessage(other.to_string())),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", u8::from(self.high), u8::from(self.low))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SuperdenseConfig {
    /// Depolarizing probability applied at each qubit reception.
    pub noise_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuperdenseResult {
    pub sent: Message,
    pub decoded: Message,
}

impl SuperdenseResult {
    pub fn is_correct(&self) -> bool {
        self.sent == self.decoded
    }
}

/// Sends `message` from Alice to Bob using one qubit and a pre-shared pair.
pub fn run<R: Rng + ?Sized>(
    message: &str,
    config: &SuperdenseConfig,
    rng: &mut R,
) -> Result<SuperdenseResult, SuperdenseError> {
    let sent: Message = message.parse()?;
    let noise = QuantumChannel::depolarizing(config.noise_rate)?;

    // Charlie prepares (|00> + |11>) / sqrt(2)
    let mut state = QuantumState::new(2);
    state.apply(&Gate::h(), &[BOB])?;
    state.apply_controlled(&Gate::x(), &[ALICE], &[BOB])?;

    // Both halves travel from Charlie
    state.apply_channel(&noise, &[ALICE])?;
    state.apply_channel(&noise, &[BOB])?;

    // Alice: 00 -> I, 01 -> X, 10 -> Z, 11 -> ZX
    if sent.high {
        state.apply(&Gate::z(), &[ALICE])?;
    }
    if sent.low {
        state.apply(&Gate::x(), &[ALICE])?;
    }

    // Alice's qubit travels to Bob
    state.apply_channel(&noise, &[ALICE])?;

    // Bob undoes the entanglement and reads both qubits
    state.apply_controlled(&Gate::x(), &[ALICE], &[BOB])?;
    state.apply(&Gate::h(), &[BOB])?;

    let z = Measurement::z_basis();
    let high = state.measure(&z, &[BOB], rng)?.index == 1;
    let low = state.measure(&z, &[ALICE], rng)?.index == 1;

    let decoded = Message { high, low };
    debug!(%sent, %decoded, "superdense transfer");

    Ok(SuperdenseResult { sent, decoded })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn decodes_every_message_without_noise() {
        let mut rng = StdRng::seed_from_u64(1);
        for msg in ["00", "01", "10", "11"] {
            for _ in 0..10 {
                let result = run(msg, &SuperdenseConfig::default(), &mut rng).unwrap();
                assert!(result.is_correct(), "sent {msg}, decoded {}", result.decoded);
                assert_eq!(result.decoded.to_string(), msg);
            }
        }
    }

    #[test]
    fn rejects_malformed_messages() {
        let mut rng = StdRng::seed_from_u64(0);
        for msg in ["", "1", "012", "2a"] {
            assert_eq!(
                run(msg, &SuperdenseConfig::default(), &mut rng).unwrap_err(),
                SuperdenseError::InvalidMessage(msg.to_string())
            );
        }
    }

    #[test]
    fn full_depolarization_corrupts_messages() {
        let mut rng = StdRng::seed_from_u64(2);
        let config = SuperdenseConfig { noise_rate: 1.0 };
        let wrong = (0..200)
            .filter(|_| !run("10", &config, &mut rng).unwrap().is_correct())
            .count();
        assert!(wrong > 100, "only {wrong} of 200 corrupted");
    }

    #[test]
    fn invalid_noise_rate() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = SuperdenseConfig { noise_rate: -0.1 };
        assert!(matches!(
            run("00", &config, &mut rng),
            Err(SuperdenseError::Channel(ChannelError::InvalidProbability(_)))
        ));
    }
}
