//! Basis reconciliation and estimation-sample selection.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::index;

use crate::error::ProtocolError;
use crate::protocols::bb84::symbol::Basis;

/// Basis-matched positions split into a disclosed and a secret part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamplePartition {
    /// Positions kept secret, ascending.
    pub retained: Vec<usize>,
    /// Positions disclosed for error estimation, in draw order.
    pub sampled: Vec<usize>,
}

/// Returns the ascending positions where both parties chose the same basis.
///
/// # Errors
///
/// `LengthMismatch` if the two basis lists differ in length.
pub fn sift(initiator: &[Basis], responder: &[Basis]) -> Result<Vec<usize>, ProtocolError> {
    if initiator.len() != responder.len() {
        return Err(ProtocolError::LengthMismatch {
            left: initiator.len(),
            right: responder.len(),
        });
    }

    Ok(initiator
        .iter()
        .zip(responder)
        .enumerate()
        .filter_map(|(i, (a, b))| (a == b).then_some(i))
        .collect())
}

/// Number of positions disclosed out of `matched` for a given fraction.
pub fn sample_size(matched: usize, fraction: f64) -> usize {
    ((matched as f64) * fraction).ceil() as usize
}

/// Draws `ceil(fraction * |indices|)` positions uniformly without replacement.
///
/// `fraction` is clamped to `[0, 1]`. An empty `indices` yields an empty
/// partition.
pub fn partition<R: Rng + ?Sized>(
    indices: &[usize],
    fraction: f64,
    rng: &mut R,
) -> SamplePartition {
    let amount = sample_size(indices.len(), fraction.clamp(0.0, 1.0)).min(indices.len());

    let sampled: Vec<usize> = index::sample(rng, indices.len(), amount)
        .into_iter()
        .map(|slot| indices[slot])
        .collect();

    let disclosed: HashSet<usize> = sampled.iter().copied().collect();
    let retained = indices
        .iter()
        .copied()
        .filter(|i| !disclosed.contains(i))
        .collect();

    SamplePartition { retained, sampled }
}
