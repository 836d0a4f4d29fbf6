//! Operator helpers shared by gates, channels and measurements.
//!
//! Qubit `q` of an n-qubit register corresponds to bit `q` of a basis-state
//! index, so `|q1 q0>` for two qubits is index `2*q1 + q0`.

use ndarray::{Array1, Array2};
use num_complex::Complex64;

const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Conjugate transpose of a matrix.
pub fn dagger(matrix: &Array2<Complex64>) -> Array2<Complex64> {
    matrix.t().mapv(|c| c.conj())
}

/// Computes the trace of a matrix (sum of diagonal elements).
pub fn trace(matrix: &Array2<Complex64>) -> Complex64 {
    matrix.diag().sum()
}

/// Computes $M \rho M^\dagger$.
pub fn sandwich(op: &Array2<Complex64>, rho: &Array2<Complex64>) -> Array2<Complex64> {
    op.dot(rho).dot(&dagger(op))
}

/// Lifts a local operator on `targets` to the full `2^n x 2^n` system.
///
/// When `controls` is non-empty the operator only acts on basis states whose
/// control bits are all set; every other basis state is left untouched.
pub fn expand_operator(
    num_total_qubits: usize,
    local: &Array2<Complex64>,
    targets: &[usize],
    controls: &[usize],
) -> Array2<Complex64> {
    let dim = 1 << num_total_qubits;
    let control_mask = controls.iter().fold(0usize, |mask, &c| mask | (1 << c));
    let target_mask = targets.iter().fold(0usize, |mask, &t| mask | (1 << t));

    let mut full = Array2::<Complex64>::zeros((dim, dim));

    for col in 0..dim {
        if col & control_mask != control_mask {
            full[[col, col]] = ONE;
            continue;
        }

        let local_col = extract_bits(col, targets);
        let untouched = col & !target_mask;

        for local_row in 0..local.nrows() {
            let amplitude = local[[local_row, local_col]];
            if amplitude.norm_sqr() < f64::EPSILON {
                continue;
            }
            let row = untouched | deposit_bits(local_row, targets);
            full[[row, col]] = amplitude;
        }
    }

    full
}

/// Gathers the bits of `value` at `positions` into a compact index.
fn extract_bits(value: usize, positions: &[usize]) -> usize {
    positions
        .iter()
        .enumerate()
        .filter(|&(_, &pos)| (value >> pos) & 1 == 1)
        .fold(0, |acc, (i, _)| acc | (1 << i))
}

/// Scatters the bits of a compact index back to `positions`.
fn deposit_bits(compact: usize, positions: &[usize]) -> usize {
    positions
        .iter()
        .enumerate()
        .filter(|&(i, _)| (compact >> i) & 1 == 1)
        .fold(0, |acc, (_, &pos)| acc | (1 << pos))
}

/// Find duplicate in a slice of usize
pub fn find_duplicate(indices: &[usize]) -> Option<usize> {
    let mut seen = std::collections::HashSet::new();
    indices.iter().find(|&&idx| !seen.insert(idx)).copied()
}

/// Checks the completeness relation $\sum K_k^\dagger K_k = I$.
pub fn check_completeness(ops: &[Array2<Complex64>], dim: usize) -> bool {
    let sum = ops
        .iter()
        .fold(Array2::<Complex64>::zeros((dim, dim)), |acc, op| {
            acc + dagger(op).dot(op)
        });
    let eye = Array2::<Complex64>::eye(dim);
    sum.iter()
        .zip(eye.iter())
        .all(|(a, b)| (a - b).norm() < 1e-9)
}

/// Computes the projector $|v\rangle\langle v|$.
pub fn projector(v: &Array1<Complex64>) -> Array2<Complex64> {
    let n = v.len();
    Array2::from_shape_fn((n, n), |(i, j)| v[i] * v[j].conj())
}

/// Builds a 2x2 complex matrix from real entries.
pub fn real_2x2(entries: [[f64; 2]; 2]) -> Array2<Complex64> {
    Array2::from_shape_fn((2, 2), |(r, c)| Complex64::new(entries[r][c], 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO: Complex64 = Complex64::new(0.0, 0.0);

    #[test]
    fn bit_gather_and_scatter_are_inverse() {
        let positions = [3, 0, 2];
        for compact in 0..8 {
            let spread = deposit_bits(compact, &positions);
            assert_eq!(extract_bits(spread, &positions), compact);
        }
    }

    #[test]
    fn expanding_identity_yields_identity() {
        let eye = Array2::<Complex64>::eye(2);
        let full = expand_operator(3, &eye, &[1], &[]);
        assert_eq!(full, Array2::<Complex64>::eye(8));
    }

    #[test]
    fn controlled_not_flips_target_only_when_control_set() {
        let x = real_2x2([[0.0, 1.0], [1.0, 0.0]]);
        let cnot = expand_operator(2, &x, &[1], &[0]);
        // |q1 q0> = |01> (index 1) -> |11> (index 3)
        assert_eq!(cnot[[3, 1]], ONE);
        // |00> untouched
        assert_eq!(cnot[[0, 0]], ONE);
    }

    #[test]
    fn duplicate_detection() {
        assert_eq!(find_duplicate(&[0, 1, 2]), None);
        assert_eq!(find_duplicate(&[0, 1, 0]), Some(0));
    }

    #[test]
    fn projector_is_complete_pair() {
        let v0 = ndarray::array![ONE, ZERO];
        let v1 = ndarray::array![ZERO, ONE];
        assert!(check_completeness(&[projector(&v0), projector(&v1)], 2));
    }
}
