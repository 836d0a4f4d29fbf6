use crate::core::channels::QuantumChannel;
use crate::core::errors::StateError;
use crate::core::gates::Gate;
use crate::core::measurements::{Measurement, MeasurementResult};
use crate::core::utils::{sandwich, trace};
use ndarray::Array2;
use num_complex::Complex64;
use rand::Rng;

/// Density-matrix representation of an n-qubit register.
#[derive(Clone, Debug)]
pub struct QuantumState {
    pub density_matrix: Array2<Complex64>,
    pub num_qubits: usize,
}

impl QuantumState {
    /// Creates a new quantum state initialized to |0...0>.
    pub fn new(num_qubits: usize) -> Self {
        let dim = 1 << num_qubits;
        let mut density_matrix = Array2::<Complex64>::zeros((dim, dim));
        density_matrix[[0, 0]] = Complex64::new(1.0, 0.0);

        Self {
            density_matrix,
            num_qubits,
        }
    }

    /// Checks if a given index is within the register
    fn validate_qubit_index(&self, index: usize) -> Result<(), StateError> {
        if index >= self.num_qubits {
            return Err(StateError::IndexOutOfBounds {
                index,
                num_qubits: self.num_qubits,
            });
        }
        Ok(())
    }

    /// Probability of finding the register in basis state `index`.
    pub fn population(&self, index: usize) -> f64 {
        self.density_matrix
            .get([index, index])
            .map(|c| c.re)
            .unwrap_or(0.0)
    }

    /// Applies non controlled quantum gate
    pub fn apply(&mut self, gate: &Gate, target_qubits: &[usize]) -> Result<(), StateError> {
        self.apply_controlled(gate, target_qubits, &[])
    }

    /// Applies a gate on `target_qubits`, conditioned on all `control_qubits`.
    pub fn apply_controlled(
        &mut self,
        gate: &Gate,
        target_qubits: &[usize],
        control_qubits: &[usize],
    ) -> Result<(), StateError> {
        for &q in target_qubits.iter().chain(control_qubits) {
            self.validate_qubit_index(q)?;
        }

        let full = Gate::expand_gate(self.num_qubits, gate, target_qubits, control_qubits)?;

        let dim = 1 << self.num_qubits;
        let (rows, cols) = full.matrix.dim();
        if rows != dim || cols != dim {
            return Err(StateError::DimensionMismatch {
                expected: dim,
                got_rows: rows,
                got_cols: cols,
            });
        }

        self.density_matrix = sandwich(&full.matrix, &self.density_matrix);
        Ok(())
    }

    /// Apply QuantumChannel to QuantumState
    pub fn apply_channel(
        &mut self,
        channel: &QuantumChannel,
        target_qubits: &[usize],
    ) -> Result<(), StateError> {
        for &q in target_qubits {
            self.validate_qubit_index(q)?;
        }

        let ops = channel.get_expanded_operators(self.num_qubits, target_qubits)?;

        let dim = self.density_matrix.nrows();
        let rho = &self.density_matrix;
        let evolved = ops
            .iter()
            .fold(Array2::<Complex64>::zeros((dim, dim)), |acc, k| {
                acc + sandwich(k, rho)
            });
        self.density_matrix = evolved;

        Ok(())
    }

    /// Outcome probabilities and the expanded operators that produce them.
    fn outcome_distribution(
        &self,
        measurement: &Measurement,
        target_qubits: &[usize],
    ) -> Result<(Vec<f64>, Vec<Array2<Complex64>>), StateError> {
        for &q in target_qubits {
            self.validate_qubit_index(q)?;
        }

        let ops = measurement.get_expanded_operators(self.num_qubits, target_qubits)?;

        let mut probs: Vec<f64> = ops
            .iter()
            .map(|op| trace(&sandwich(op, &self.density_matrix)).re.max(0.0))
            .collect();

        // Renormalize against floating point drift
        let total: f64 = probs.iter().sum();
        if total > 0.0 {
            probs.iter_mut().for_each(|p| *p /= total);
        }

        Ok((probs, ops))
    }

    /// Physical measurement which collapses the state.
    ///
    /// The caller supplies the random source so runs are reproducible.
    pub fn measure<R: Rng + ?Sized>(
        &mut self,
        measurement: &Measurement,
        target_qubits: &[usize],
        rng: &mut R,
    ) -> Result<MeasurementResult, StateError> {
        let (probs, ops) = self.outcome_distribution(measurement, target_qubits)?;

        let roll: f64 = rng.random();
        let mut cumulative = 0.0;
        let outcome = probs
            .iter()
            .position(|&p| {
                cumulative += p;
                roll < cumulative
            })
            .unwrap_or(probs.len().saturating_sub(1));

        let p_selected = probs.get(outcome).copied().unwrap_or(0.0);
        if p_selected <= 1e-12 {
            return Err(StateError::ZeroProbability(Complex64::new(p_selected, 0.0)));
        }

        // rho' = (M_k * rho * M_k†) / p_k
        let collapsed = sandwich(&ops[outcome], &self.density_matrix);
        self.density_matrix = collapsed.mapv(|val| val / p_selected);

        Ok(MeasurementResult { index: outcome })
    }
}
