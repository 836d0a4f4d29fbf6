//! Quantum symbol codec.
//!
//! Maps a classical `(bit, basis)` pair to a prepared quantum symbol and a
//! measurement outcome back to a classical bit. The physics lives behind the
//! [`QuantumMedium`] trait; [`SimulatedMedium`] implements it on top of the
//! density-matrix simulator in [`crate::core`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::core::{Gate, Measurement, QuantumChannel, QuantumState};
use crate::error::ProtocolError;
use crate::protocols::bb84::symbol::Basis;

/// Physical layer used by both parties.
///
/// Transmission and reception are not part of the trait: the session moves
/// `Symbol` values across its quantum link.
pub trait QuantumMedium {
    /// Handle to one prepared quantum symbol.
    type Symbol;

    /// Encodes `bit` in `basis`.
    fn prepare(&mut self, bit: bool, basis: Basis) -> Result<Self::Symbol, ProtocolError>;

    /// Applies the configured channel noise. Calling it twice on the same
    /// symbol has no further effect.
    fn apply_noise(&mut self, symbol: &mut Self::Symbol) -> Result<(), ProtocolError>;

    /// Measures `symbol` in `basis` and returns the classical result bit.
    fn measure(&mut self, symbol: Self::Symbol, basis: Basis) -> Result<bool, ProtocolError>;
}

/// Single photon travelling over the simulated link.
#[derive(Debug, Clone)]
pub struct Photon {
    state: QuantumState,
    disturbed: bool,
}

impl Photon {
    /// Whether noise has already been applied.
    pub fn is_disturbed(&self) -> bool {
        self.disturbed
    }
}

fn measurement_for(basis: Basis) -> Measurement {
    match basis {
        Basis::Rectilinear => Measurement::z_basis(),
        Basis::Diagonal => Measurement::x_basis(),
    }
}

/// Medium backed by the density-matrix simulator.
///
/// Noise is a depolarizing channel of strength `noise_rate`, optionally
/// followed by an intercept-resend eavesdropper who measures a fraction
/// `intercept_rate` of symbols in a random basis.
#[derive(Debug, Clone)]
pub struct SimulatedMedium<R = StdRng> {
    noise: QuantumChannel,
    intercept_rate: f64,
    rng: R,
}

impl SimulatedMedium<StdRng> {
    /// Creates a medium with its own seeded random source.
    pub fn seeded(noise_rate: f64, intercept_rate: f64, seed: u64) -> Result<Self, ProtocolError> {
        Self::with_rng(noise_rate, intercept_rate, StdRng::seed_from_u64(seed))
    }

    /// Noise-free medium, used by the preparing side.
    pub fn noiseless(seed: u64) -> Result<Self, ProtocolError> {
        Self::seeded(0.0, 0.0, seed)
    }
}

impl<R: Rng> SimulatedMedium<R> {
    pub fn with_rng(noise_rate: f64, intercept_rate: f64, rng: R) -> Result<Self, ProtocolError> {
        if !(0.0..=1.0).contains(&intercept_rate) {
            return Err(crate::errors::ChannelError::InvalidProbability(intercept_rate).into());
        }

        Ok(Self {
            noise: QuantumChannel::depolarizing(noise_rate)?,
            intercept_rate,
            rng,
        })
    }
}

impl<R: Rng> QuantumMedium for SimulatedMedium<R> {
    type Symbol = Photon;

    fn prepare(&mut self, bit: bool, basis: Basis) -> Result<Photon, ProtocolError> {
        let mut state = QuantumState::new(1);

        if bit {
            state.apply(&Gate::x(), &[0])?;
        }
        if basis == Basis::Diagonal {
            state.apply(&Gate::h(), &[0])?;
        }

        Ok(Photon {
            state,
            disturbed: false,
        })
    }

    fn apply_noise(&mut self, photon: &mut Photon) -> Result<(), ProtocolError> {
        if photon.disturbed {
            return Ok(());
        }

        photon.state.apply_channel(&self.noise, &[0])?;

        if self.intercept_rate > 0.0 && self.rng.random_bool(self.intercept_rate) {
            let eve_basis = Basis::random(&mut self.rng);
            let res = photon
                .state
                .measure(&measurement_for(eve_basis), &[0], &mut self.rng)?;
            trace!(basis = %eve_basis, outcome = res.index, "photon intercepted");
        }

        photon.disturbed = true;
        Ok(())
    }

    fn measure(&mut self, mut photon: Photon, basis: Basis) -> Result<bool, ProtocolError> {
        let res = photon
            .state
            .measure(&measurement_for(basis), &[0], &mut self.rng)?;
        Ok(res.index == 1)
    }
}
