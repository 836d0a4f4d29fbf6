//! QBER as a function of channel noise.
//!
//! Runs repeated sessions at each noise rate and averages the error rate the
//! responder measured. With a depolarizing channel the mean tracks
//! `50 * noise_rate` percent.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::ProtocolConfig;
use crate::error::SessionError;
use crate::protocols::bb84::session::{Seeds, run_session};

/// Averaged result for one noise rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    pub noise_rate: f64,
    /// `None` when no run produced an estimate.
    pub mean_qber: Option<f64>,
    /// Runs that contributed to the mean.
    pub runs: usize,
}

/// Evenly spaced rates from 0 to 1 inclusive.
pub fn linear_rates(steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..steps).map(|i| i as f64 / (steps - 1) as f64).collect(),
    }
}

/// Runs `samples` sessions per rate, all derived from `seed`.
///
/// Runs whose estimation sample was empty are left out of the mean.
///
/// # Errors
///
/// Propagates the first fatal protocol error of any run, or a rate the
/// configuration rejects.
pub async fn qber_sweep(
    config: &ProtocolConfig,
    rates: &[f64],
    samples: usize,
    seed: u64,
) -> Result<Vec<SweepPoint>, SessionError> {
    let mut seeder = StdRng::seed_from_u64(seed);
    let mut points = Vec::with_capacity(rates.len());

    for &noise_rate in rates {
        let run_config = config.clone().with_noise_rate(noise_rate);
        let mut total = 0.0;
        let mut runs = 0;

        for _ in 0..samples {
            let report = run_session(&run_config, Seeds::from_base(seeder.random())).await?;
            report.responder?;
            if let Some(qber) = report.qber {
                total += qber;
                runs += 1;
            }
        }

        let mean_qber = (runs > 0).then(|| total / runs as f64);
        debug!(noise_rate, ?mean_qber, runs, "sweep point");
        points.push(SweepPoint {
            noise_rate,
            mean_qber,
            runs,
        });
    }

    info!(points = points.len(), samples, "sweep finished");
    Ok(points)
}
