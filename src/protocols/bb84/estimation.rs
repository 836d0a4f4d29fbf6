//! Quantum bit error rate estimation and the accept/discard rule.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Percentage of positions where `a` and `b` disagree.
///
/// Works on any comparable symbols, so both decoded bits and raw wire digits
/// (`"0110".as_bytes()`) can be compared directly.
///
/// # Errors
///
/// - `LengthMismatch` if the inputs differ in length.
/// - `EmptySample` if both are empty, since the rate is undefined.
pub fn qber<T: PartialEq>(a: &[T], b: &[T]) -> Result<f64, ProtocolError> {
    if a.len() != b.len() {
        return Err(ProtocolError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    if a.is_empty() {
        return Err(ProtocolError::EmptySample);
    }

    let mismatches = a.iter().zip(b).filter(|(x, y)| x != y).count();
    Ok(100.0 * mismatches as f64 / a.len() as f64)
}

/// Rule deciding whether a measured QBER is low enough to keep the key.
///
/// Two variants of the reference behaviour exist: a strict `< 11.1` and an
/// inclusive `<= 11`. Both are expressible here; the strict one is the default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcceptancePolicy {
    /// QBER percentage at the boundary.
    pub threshold: f64,
    /// Whether a QBER equal to `threshold` is accepted.
    #[serde(default)]
    pub inclusive: bool,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            threshold: 11.1,
            inclusive: false,
        }
    }
}

impl AcceptancePolicy {
    /// The `<= 11` variant.
    pub fn inclusive_eleven() -> Self {
        Self {
            threshold: 11.0,
            inclusive: true,
        }
    }

    pub fn accepts(&self, qber: f64) -> bool {
        if self.inclusive {
            qber <= self.threshold
        } else {
            qber < self.threshold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_have_zero_error() {
        assert_eq!(qber(b"010011", b"010011").unwrap(), 0.0);
    }

    #[test]
    fn reference_values() {
        assert_eq!(qber(b"0000", b"1111").unwrap(), 100.0);
        assert_eq!(qber(b"01", b"10").unwrap(), 100.0);
        assert_eq!(qber(b"0110", b"0100").unwrap(), 25.0);
    }

    #[test]
    fn works_on_bits() {
        assert_eq!(qber(&[true, false], &[true, true]).unwrap(), 50.0);
    }

    #[test]
    fn unequal_lengths_fail() {
        assert_eq!(
            qber(b"010", b"01").unwrap_err(),
            ProtocolError::LengthMismatch { left: 3, right: 2 }
        );
    }

    #[test]
    fn empty_sample_is_explicit() {
        let empty: [bool; 0] = [];
        assert_eq!(qber(&empty, &empty).unwrap_err(), ProtocolError::EmptySample);
    }

    #[test]
    fn threshold_variants_disagree_between_eleven_and_eleven_point_one() {
        let strict = AcceptancePolicy::default();
        let inclusive = AcceptancePolicy::inclusive_eleven();

        assert!(strict.accepts(11.0));
        assert!(inclusive.accepts(11.0));
        assert!(strict.accepts(11.05));
        assert!(!inclusive.accepts(11.05));
        assert!(!strict.accepts(11.1));
        assert!(!strict.accepts(12.5));
        assert!(!inclusive.accepts(12.5));
    }
}
