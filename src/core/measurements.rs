use crate::core::errors::MeasurementError;
use crate::core::utils;
use ndarray::{Array2, array};
use num_complex::Complex64;

/// A projective measurement given by its outcome operators.
#[derive(Clone, Debug)]
pub struct Measurement {
    /// Measurement operators, one per outcome
    pub operators: Vec<Array2<Complex64>>,
    /// Number of qubits the measurement acts on
    pub num_qubits: usize,
}

impl Measurement {
    /// Z basis (Computational) -> {|0>, |1>}.
    pub fn z_basis() -> Measurement {
        let zero = Complex64::new(0.0, 0.0);
        let one = Complex64::new(1.0, 0.0);

        Measurement {
            operators: vec![
                utils::projector(&array![one, zero]),
                utils::projector(&array![zero, one]),
            ],
            num_qubits: 1,
        }
    }

    /// X basis (Hadamard) -> {|+>, |->}.
    pub fn x_basis() -> Measurement {
        let f = Complex64::new(std::f64::consts::FRAC_1_SQRT_2, 0.0);

        Measurement {
            operators: vec![
                utils::projector(&array![f, f]),
                utils::projector(&array![f, -f]),
            ],
            num_qubits: 1,
        }
    }

    /// Expands measurement operators to a larger system
    pub fn get_expanded_operators(
        &self,
        num_total_qubits: usize,
        targets: &[usize],
    ) -> Result<Vec<Array2<Complex64>>, MeasurementError> {
        if targets.len() != self.num_qubits {
            return Err(MeasurementError::TargetMismatch {
                expected: self.num_qubits,
                got: targets.len(),
            });
        }

        if let Some(dup) = utils::find_duplicate(targets) {
            return Err(MeasurementError::DuplicateQubit(dup));
        }

        Ok(self
            .operators
            .iter()
            .map(|op| utils::expand_operator(num_total_qubits, op, targets, &[]))
            .collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementResult {
    /// Index of the operator that fired. For Z and X, index 1 is bit 1.
    pub index: usize,
}
