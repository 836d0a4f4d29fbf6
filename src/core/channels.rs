use crate::core::errors::ChannelError;
use crate::core::utils;
use ndarray::Array2;
use num_complex::Complex64;

/// A noise process given by its Kraus operators.
#[derive(Clone, Debug)]
pub struct QuantumChannel {
    pub kraus_ops: Vec<Array2<Complex64>>,
    pub num_qubits: usize,
}

impl QuantumChannel {
    /// Builds a single-qubit channel, checking the trace-preserving condition.
    fn single_qubit(kraus_ops: Vec<Array2<Complex64>>) -> Result<Self, ChannelError> {
        if !utils::check_completeness(&kraus_ops, 2) {
            return Err(ChannelError::NotComplete);
        }

        Ok(Self {
            kraus_ops,
            num_qubits: 1,
        })
    }

    /// Expands Kraus operators to a larger system
    pub fn get_expanded_operators(
        &self,
        num_total_qubits: usize,
        targets: &[usize],
    ) -> Result<Vec<Array2<Complex64>>, ChannelError> {
        if targets.len() != self.num_qubits {
            return Err(ChannelError::TargetMismatch {
                expected: self.num_qubits,
                got: targets.len(),
            });
        }

        if let Some(dup) = utils::find_duplicate(targets) {
            return Err(ChannelError::DuplicateQubit(dup));
        }

        Ok(self
            .kraus_ops
            .iter()
            .map(|op| utils::expand_operator(num_total_qubits, op, targets, &[]))
            .collect())
    }

    /// Depolarizing Channel
    ///
    /// With probability `p` the qubit is replaced by the maximally mixed
    /// state: rho -> (1 - p) rho + p I/2. A qubit measured in the basis it
    /// was prepared in therefore flips with probability p/2.
    pub fn depolarizing(p: f64) -> Result<QuantumChannel, ChannelError> {
        validate_prob(p)?;

        let weight_i = (1.0 - 0.75 * p).sqrt();
        let weight_xyz = (p / 4.0).sqrt();
        let zero = Complex64::new(0.0, 0.0);

        let y = Array2::from_shape_vec(
            (2, 2),
            vec![
                zero,
                Complex64::new(0.0, -weight_xyz),
                Complex64::new(0.0, weight_xyz),
                zero,
            ],
        )
        .map_err(|_| ChannelError::NotComplete)?;

        Self::single_qubit(vec![
            utils::real_2x2([[weight_i, 0.0], [0.0, weight_i]]),
            utils::real_2x2([[0.0, weight_xyz], [weight_xyz, 0.0]]),
            y,
            utils::real_2x2([[weight_xyz, 0.0], [0.0, -weight_xyz]]),
        ])
    }
}

/// Validate probability parameter
fn validate_prob(p: f64) -> Result<(), ChannelError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(ChannelError::InvalidProbability(p));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_probability() {
        assert_eq!(
            QuantumChannel::depolarizing(1.5).unwrap_err(),
            ChannelError::InvalidProbability(1.5)
        );
        assert!(QuantumChannel::depolarizing(-0.1).is_err());
    }

    #[test]
    fn depolarizing_is_trace_preserving_across_range() {
        for p in [0.0, 0.1, 0.5, 1.0] {
            let channel = QuantumChannel::depolarizing(p).unwrap();
            assert_eq!(channel.kraus_ops.len(), 4);
        }
    }

    #[test]
    fn expansion_rejects_wrong_target_count() {
        let channel = QuantumChannel::depolarizing(0.2).unwrap();
        assert!(matches!(
            channel.get_expanded_operators(2, &[0, 1]),
            Err(ChannelError::TargetMismatch { expected: 1, got: 2 })
        ));
    }
}
