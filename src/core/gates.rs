use crate::core::errors::GateError;
use crate::core::utils;
use ndarray::Array2;
use num_complex::Complex64;

/// Represents a quantum gate.
///
/// A gate is defined by its unitary matrix and the number of qubits it acts on.
/// Only the fixed gates needed for state preparation and Bell-pair handling
/// are provided, so construction never has to validate unitarity.
#[derive(Clone, Debug)]
pub struct Gate {
    /// The unitary matrix of the gate.
    pub matrix: Array2<Complex64>,
    /// The number of qubits the gate acts on.
    pub num_qubits: usize,
}

impl Gate {
    fn single(entries: [[f64; 2]; 2]) -> Gate {
        Gate {
            matrix: utils::real_2x2(entries),
            num_qubits: 1,
        }
    }

    /// Expands a gate to act on a larger system of qubits.
    ///
    /// The base `gate` is applied to `targets`, optionally conditioned on
    /// every qubit in `controls` being set, and Identity acts on the rest.
    ///
    /// # Errors
    ///
    /// Returns `GateError` if:
    /// - `targets` does not match the gate width.
    /// - Duplicate indices are found in `targets` or `controls`.
    /// - A qubit is used as both control and target.
    pub fn expand_gate(
        num_total_qubits: usize,
        gate: &Gate,
        targets: &[usize],
        controls: &[usize],
    ) -> Result<Gate, GateError> {
        if targets.len() != gate.num_qubits {
            return Err(GateError::InvalidDimensions);
        }

        if let Some(dup) = utils::find_duplicate(targets) {
            return Err(GateError::DuplicateQubit(dup));
        }

        if let Some(dup) = utils::find_duplicate(controls) {
            return Err(GateError::DuplicateQubit(dup));
        }

        if let Some(&c) = controls.iter().find(|c| targets.contains(c)) {
            return Err(GateError::ControlTargetOverlap(c));
        }

        Ok(Gate {
            matrix: utils::expand_operator(num_total_qubits, &gate.matrix, targets, controls),
            num_qubits: num_total_qubits,
        })
    }

    /// Pauli-X (bit flip).
    pub fn x() -> Gate {
        Self::single([[0.0, 1.0], [1.0, 0.0]])
    }

    /// Pauli-Z (phase flip).
    pub fn z() -> Gate {
        Self::single([[1.0, 0.0], [0.0, -1.0]])
    }

    /// Hadamard, maps the rectilinear basis onto the diagonal one.
    pub fn h() -> Gate {
        let f = std::f64::consts::FRAC_1_SQRT_2;
        Self::single([[f, f], [f, -f]])
    }
}
