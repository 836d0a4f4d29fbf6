//! Quantum communication protocols built on the simulator in [`crate::core`].
//!
//! [`bb84`] is the key distribution protocol; [`superdense`] is a small
//! two-bit transfer over an entangled pair.

pub mod bb84;
pub mod superdense;
