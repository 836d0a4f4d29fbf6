//! Plain-text messages carried over the classical link.
//!
//! | Message        | Format                                         |
//! |----------------|------------------------------------------------|
//! | acknowledgment | `ACK_{n}`, `n` 1-based                         |
//! | sift request   | `None`                                         |
//! | basis list     | `Z X X Z ...`                                  |
//! | sift message   | `{retained}\|{sampled}\|{bits}`                |
//! | decision       | `OK` or `DISCARD`                              |

use std::fmt;

use crate::error::ProtocolError;
use crate::protocols::bb84::symbol::Basis;

/// Placeholder the initiator sends to ask for the responder's bases.
pub const SIFT_REQUEST: &str = "None";

const FIELD_SEPARATOR: char = '|';

/// Acknowledgment for the `sequence`-th symbol (1-based).
pub fn ack(sequence: usize) -> String {
    format!("ACK_{sequence}")
}

/// Checks that `message` acknowledges exactly `sequence`.
pub fn expect_ack(message: &str, sequence: usize) -> Result<(), ProtocolError> {
    let expected = ack(sequence);
    if message == expected {
        Ok(())
    } else {
        Err(ProtocolError::ProtocolViolation {
            expected,
            got: message.to_string(),
        })
    }
}

pub fn encode_bases(bases: &[Basis]) -> String {
    bases
        .iter()
        .map(|b| b.token())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a basis list that must contain exactly `expected_len` tokens.
pub fn decode_bases(message: &str, expected_len: usize) -> Result<Vec<Basis>, ProtocolError> {
    let violation = || ProtocolError::ProtocolViolation {
        expected: format!("{expected_len} basis tokens"),
        got: message.to_string(),
    };

    let bases = message
        .split_whitespace()
        .map(Basis::from_token)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(violation)?;

    if bases.len() != expected_len {
        return Err(violation());
    }
    Ok(bases)
}

/// Initiator's sifting announcement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiftMessage {
    /// Secret positions, ascending.
    pub retained: Vec<usize>,
    /// Disclosed positions, in draw order.
    pub sampled: Vec<usize>,
    /// Initiator's bits at `sampled`, same order.
    pub disclosed_bits: Vec<bool>,
}

impl SiftMessage {
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parses the three `|`-separated fields.
    ///
    /// # Errors
    ///
    /// `MalformedMessage` if the field count is not three, an index is not a
    /// non-negative integer, or a bit is not `0`/`1`.
    pub fn parse(message: &str) -> Result<Self, ProtocolError> {
        let fields: Vec<&str> = message.split(FIELD_SEPARATOR).collect();
        let [retained, sampled, bits] = fields.as_slice() else {
            return Err(ProtocolError::MalformedMessage(format!(
                "expected 3 fields, got {}",
                fields.len()
            )));
        };

        Ok(Self {
            retained: parse_indices(retained)?,
            sampled: parse_indices(sampled)?,
            disclosed_bits: parse_bits(bits)?,
        })
    }
}

impl fmt::Display for SiftMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_indices(f, &self.retained)?;
        write!(f, "{FIELD_SEPARATOR}")?;
        write_indices(f, &self.sampled)?;
        write!(f, "{FIELD_SEPARATOR}")?;
        self.disclosed_bits
            .iter()
            .try_for_each(|&b| f.write_str(if b { "1" } else { "0" }))
    }
}

fn write_indices(f: &mut fmt::Formatter<'_>, indices: &[usize]) -> fmt::Result {
    for (n, i) in indices.iter().enumerate() {
        if n > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{i}")?;
    }
    Ok(())
}

fn parse_indices(field: &str) -> Result<Vec<usize>, ProtocolError> {
    field
        .split_whitespace()
        .map(|token| {
            token
                .parse::<usize>()
                .map_err(|_| ProtocolError::MalformedMessage(format!("invalid index {token:?}")))
        })
        .collect()
}

fn parse_bits(field: &str) -> Result<Vec<bool>, ProtocolError> {
    field
        .trim()
        .chars()
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            other => Err(ProtocolError::MalformedMessage(format!("invalid bit {other:?}"))),
        })
        .collect()
}

/// Responder's verdict on the estimated error rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Discard,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Accept => "OK",
            Decision::Discard => "DISCARD",
        }
    }

    /// Parses a decision token.
    ///
    /// # Errors
    ///
    /// `ProtocolViolation` for anything other than `OK` or `DISCARD`.
    pub fn parse(message: &str) -> Result<Self, ProtocolError> {
        match message {
            "OK" => Ok(Decision::Accept),
            "DISCARD" => Ok(Decision::Discard),
            other => Err(ProtocolError::ProtocolViolation {
                expected: "OK or DISCARD".to_string(),
                got: other.to_string(),
            }),
        }
    }
}
