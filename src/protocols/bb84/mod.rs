//! BB84 Quantum Key Distribution.
//!
//! The initiator encodes random bits in random bases and sends them one at a
//! time, waiting for an acknowledgment after each. The responder measures
//! each symbol in a random basis. Both sides then keep only the positions
//! where their bases agree, disclose a random 20% of those to estimate the
//! error rate, and keep the rest as the key if the rate is low enough.
//!
//! Both parties are sans-IO state machines ([`Initiator`], [`Responder`]);
//! [`session`] connects them over async channels.

mod codec;
mod estimation;
mod initiator;
mod key;
mod outcome;
mod responder;
pub mod session;
mod sifting;
mod sweep;
mod symbol;
pub mod wire;

pub use codec::{Photon, QuantumMedium, SimulatedMedium};
pub use estimation::{AcceptancePolicy, qber};
pub use initiator::{Initiator, InitiatorState};
pub use key::{EncryptionKey, derive_exact_key, derive_key};
pub use outcome::{Action, DiscardReason, Outcome, Port};
pub use responder::{Responder, ResponderState};
pub use session::{Seeds, SessionReport, run_session};
pub use sifting::{SamplePartition, partition, sample_size, sift};
pub use sweep::{SweepPoint, linear_rates, qber_sweep};
pub use symbol::{Basis, RunRecord, Symbol};
pub use wire::{Decision, SiftMessage};
