//! Initiator ("Alice") state machine.
//!
//! ```text
//! PreparingSymbols -> AwaitingAck(0) -> ... -> AwaitingAck(N-1)
//!     -> AwaitingBases -> Sifting -> AwaitingFinalDecision
//!     -> KeyAccepted | KeyDiscarded
//! ```
//!
//! Any error moves the machine to `Failed`, which accepts no further input.

use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::config::{ESTIMATION_FRACTION, ProtocolConfig};
use crate::error::ProtocolError;
use crate::protocols::bb84::codec::QuantumMedium;
use crate::protocols::bb84::key::{EncryptionKey, derive_exact_key, derive_key};
use crate::protocols::bb84::outcome::{Action, DiscardReason, Outcome};
use crate::protocols::bb84::sifting::{self, SamplePartition};
use crate::protocols::bb84::symbol::{RunRecord, Symbol};
use crate::protocols::bb84::wire::{self, Decision, SiftMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiatorState {
    PreparingSymbols,
    /// Waiting for the acknowledgment of the symbol at this 0-based index.
    AwaitingAck(usize),
    AwaitingBases,
    Sifting,
    AwaitingFinalDecision,
    KeyAccepted,
    KeyDiscarded,
    Failed,
}

impl InitiatorState {
    /// Whether the run is over, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InitiatorState::KeyAccepted | InitiatorState::KeyDiscarded | InitiatorState::Failed
        )
    }
}

/// Sending party. Generates symbols, performs sifting and sample selection.
pub struct Initiator<M: QuantumMedium, R = StdRng> {
    key_length: usize,
    symbol_count: usize,
    strict_key_length: bool,
    medium: M,
    rng: R,
    state: InitiatorState,
    record: RunRecord,
    partition: Option<SamplePartition>,
    key: Option<EncryptionKey>,
}

impl<M: QuantumMedium, R: Rng> Initiator<M, R> {
    pub fn new(config: &ProtocolConfig, medium: M, rng: R) -> Self {
        Self {
            key_length: config.key_length,
            symbol_count: config.symbol_count(),
            strict_key_length: config.strict_key_length,
            medium,
            rng,
            state: InitiatorState::PreparingSymbols,
            record: RunRecord::with_capacity(config.symbol_count()),
            partition: None,
            key: None,
        }
    }

    pub fn state(&self) -> InitiatorState {
        self.state
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Retained and disclosed positions, once sifting has happened.
    pub fn partition(&self) -> Option<&SamplePartition> {
        self.partition.as_ref()
    }

    /// Present only in `KeyAccepted`.
    pub fn key(&self) -> Option<&EncryptionKey> {
        self.key.as_ref()
    }

    /// Transmits the first symbol.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the run has already started. A run still in
    /// progress is failed by this.
    pub fn start(&mut self) -> Result<Vec<Action<M::Symbol>>, ProtocolError> {
        let result = match self.state {
            InitiatorState::PreparingSymbols => {
                info!(symbols = self.symbol_count, "initiator started");
                self.advance(0)
            }
            state if state.is_terminal() => return Err(self.invalid("start")),
            _ => Err(self.invalid("start")),
        };
        self.guard(result)
    }

    /// Feeds one classical message from the responder.
    ///
    /// A message the current state does not wait for ends the run.
    pub fn handle_message(
        &mut self,
        message: &str,
    ) -> Result<Vec<Action<M::Symbol>>, ProtocolError> {
        let result = match self.state {
            InitiatorState::AwaitingAck(index) => self.on_ack(message, index),
            InitiatorState::AwaitingBases => self.on_bases(message),
            InitiatorState::AwaitingFinalDecision => self.on_decision(message),
            state if state.is_terminal() => return Err(self.invalid("handle a message")),
            _ => Err(self.unexpected(message)),
        };
        self.guard(result)
    }

    fn invalid(&self, operation: &'static str) -> ProtocolError {
        ProtocolError::InvalidState {
            state: format!("{:?}", self.state),
            operation,
        }
    }

    fn unexpected(&self, got: &str) -> ProtocolError {
        ProtocolError::ProtocolViolation {
            expected: format!("nothing in {:?}", self.state),
            got: got.to_string(),
        }
    }

    fn guard<T>(&mut self, result: Result<T, ProtocolError>) -> Result<T, ProtocolError> {
        if let Err(err) = &result {
            warn!(state = ?self.state, error = %err, "initiator aborted");
            self.state = InitiatorState::Failed;
            self.key = None;
        }
        result
    }

    /// Sends symbol `index`, or asks for the bases once all are acknowledged.
    fn advance(&mut self, index: usize) -> Result<Vec<Action<M::Symbol>>, ProtocolError> {
        if index >= self.symbol_count {
            debug!("all symbols acknowledged, requesting bases");
            self.state = InitiatorState::AwaitingBases;
            return Ok(vec![Action::Send(wire::SIFT_REQUEST.to_string())]);
        }

        let symbol = Symbol::generate(index, &mut self.rng);
        let prepared = self.medium.prepare(symbol.bit, symbol.basis)?;
        debug!(
            sequence = index + 1,
            bit = u8::from(symbol.bit),
            basis = %symbol.basis,
            "sent symbol"
        );

        self.record.push(symbol);
        self.state = InitiatorState::AwaitingAck(index);
        Ok(vec![Action::Transmit(prepared)])
    }

    fn on_ack(
        &mut self,
        message: &str,
        index: usize,
    ) -> Result<Vec<Action<M::Symbol>>, ProtocolError> {
        wire::expect_ack(message, index + 1)?;
        self.advance(index + 1)
    }

    fn on_bases(&mut self, message: &str) -> Result<Vec<Action<M::Symbol>>, ProtocolError> {
        let theirs = wire::decode_bases(message, self.symbol_count)?;
        self.state = InitiatorState::Sifting;

        let matched = sifting::sift(&self.record.bases(), &theirs)?;
        let partition = sifting::partition(&matched, ESTIMATION_FRACTION, &mut self.rng);

        let bits = self.record.bits();
        let sift = SiftMessage {
            retained: partition.retained.clone(),
            sampled: partition.sampled.clone(),
            disclosed_bits: partition.sampled.iter().map(|&i| bits[i]).collect(),
        };

        info!(
            matched = matched.len(),
            disclosed = partition.sampled.len(),
            retained = partition.retained.len(),
            "sifting complete"
        );

        self.partition = Some(partition);
        self.state = InitiatorState::AwaitingFinalDecision;
        Ok(vec![Action::Send(sift.encode())])
    }

    fn on_decision(&mut self, message: &str) -> Result<Vec<Action<M::Symbol>>, ProtocolError> {
        match Decision::parse(message)? {
            Decision::Accept => {
                let retained = self
                    .partition
                    .as_ref()
                    .map(|p| p.retained.as_slice())
                    .unwrap_or_default();
                let bits = self.record.bits();
                let key = if self.strict_key_length {
                    derive_exact_key(retained, &bits, self.key_length)?
                } else {
                    derive_key(retained, &bits, self.key_length)
                };

                info!(key = %key, "key accepted");
                self.key = Some(key.clone());
                self.state = InitiatorState::KeyAccepted;
                Ok(vec![Action::Complete(Outcome::Accepted(key))])
            }
            Decision::Discard => {
                info!("key discarded by responder");
                self.state = InitiatorState::KeyDiscarded;
                Ok(vec![Action::Complete(Outcome::Discarded(DiscardReason::PeerRejected))])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::bb84::codec::{Photon, SimulatedMedium};
    use rand::SeedableRng;

    fn initiator(key_length: usize) -> Initiator<SimulatedMedium> {
        let config = ProtocolConfig::default().with_key_length(key_length);
        Initiator::new(
            &config,
            SimulatedMedium::noiseless(1).unwrap(),
            StdRng::seed_from_u64(2),
        )
    }

    fn acknowledge_all(alice: &mut Initiator<SimulatedMedium>, n: usize) -> Vec<Action<Photon>> {
        let mut actions = alice.start().unwrap();
        for i in 1..=n {
            assert!(matches!(actions.as_slice(), [Action::Transmit(_)]));
            actions = alice.handle_message(&wire::ack(i)).unwrap();
        }
        actions
    }

    #[test]
    fn lockstep_transmission_then_sift_request() {
        let mut alice = initiator(2);
        let actions = acknowledge_all(&mut alice, 6);
        assert_eq!(alice.record().len(), 6);
        assert_eq!(alice.state(), InitiatorState::AwaitingBases);
        assert!(matches!(actions.as_slice(), [Action::Send(m)] if m == wire::SIFT_REQUEST));
    }

    #[test]
    fn wrong_ack_aborts_without_further_symbols() {
        let mut alice = initiator(2);
        alice.start().unwrap();
        alice.handle_message("ACK_1").unwrap();
        alice.handle_message("ACK_2").unwrap();

        let err = alice.handle_message("ACK_5").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::ProtocolViolation { expected: "ACK_3".into(), got: "ACK_5".into() }
        );
        assert_eq!(alice.state(), InitiatorState::Failed);
        assert_eq!(alice.record().len(), 3);
        assert!(matches!(
            alice.handle_message("ACK_3"),
            Err(ProtocolError::InvalidState { .. })
        ));
    }

    #[test]
    fn cannot_start_twice() {
        let mut alice = initiator(1);
        alice.start().unwrap();
        assert!(matches!(alice.start(), Err(ProtocolError::InvalidState { .. })));
        assert_eq!(alice.state(), InitiatorState::Failed);
    }

    #[test]
    fn message_before_start_ends_run() {
        let mut alice = initiator(1);
        assert!(matches!(
            alice.handle_message("ACK_1"),
            Err(ProtocolError::ProtocolViolation { .. })
        ));
        assert_eq!(alice.state(), InitiatorState::Failed);
        assert!(matches!(alice.start(), Err(ProtocolError::InvalidState { .. })));
        assert!(alice.record().is_empty());
    }

    #[test]
    fn late_message_keeps_accepted_key() {
        let mut alice = initiator(1);
        acknowledge_all(&mut alice, 3);
        let echo = wire::encode_bases(&alice.record().bases());
        alice.handle_message(&echo).unwrap();
        alice.handle_message("OK").unwrap();

        assert!(matches!(
            alice.handle_message("OK"),
            Err(ProtocolError::InvalidState { .. })
        ));
        assert_eq!(alice.state(), InitiatorState::KeyAccepted);
        assert!(alice.key().is_some());
    }

    #[test]
    fn matching_bases_lead_to_disjoint_disclosure_and_key() {
        let mut alice = initiator(4);
        acknowledge_all(&mut alice, 12);

        // Echo back the initiator's own bases so every position matches
        let echo = wire::encode_bases(&alice.record().bases());
        let actions = alice.handle_message(&echo).unwrap();
        let [Action::Send(text)] = actions.as_slice() else {
            panic!("expected sift message");
        };

        let sift = SiftMessage::parse(text).unwrap();
        let partition = alice.partition().unwrap();
        assert_eq!(partition.retained, sift.retained);
        assert_eq!(partition.sampled, sift.sampled);
        assert_eq!(sift.sampled.len(), 3);
        assert_eq!(sift.retained.len(), 9);
        assert!(sift.sampled.iter().all(|i| !sift.retained.contains(i)));
        let bits = alice.record().bits();
        for (i, &b) in sift.sampled.iter().zip(&sift.disclosed_bits) {
            assert_eq!(bits[*i], b);
        }

        let actions = alice.handle_message("OK").unwrap();
        assert_eq!(alice.state(), InitiatorState::KeyAccepted);
        let key = alice.key().unwrap();
        assert_eq!(key.len(), 4);
        let expected: Vec<bool> = sift.retained[..4].iter().map(|&i| bits[i]).collect();
        assert_eq!(key.bits(), expected.as_slice());
        assert!(matches!(actions.as_slice(), [Action::Complete(Outcome::Accepted(_))]));
    }

    #[test]
    fn discard_leaves_no_key() {
        let mut alice = initiator(2);
        acknowledge_all(&mut alice, 6);
        let echo = wire::encode_bases(&alice.record().bases());
        alice.handle_message(&echo).unwrap();

        let actions = alice.handle_message("DISCARD").unwrap();
        assert_eq!(alice.state(), InitiatorState::KeyDiscarded);
        assert!(alice.key().is_none());
        assert!(matches!(
            actions.as_slice(),
            [Action::Complete(Outcome::Discarded(DiscardReason::PeerRejected))]
        ));
    }

    #[test]
    fn unknown_decision_is_a_violation() {
        let mut alice = initiator(2);
        acknowledge_all(&mut alice, 6);
        let echo = wire::encode_bases(&alice.record().bases());
        alice.handle_message(&echo).unwrap();

        assert!(matches!(
            alice.handle_message("MAYBE"),
            Err(ProtocolError::ProtocolViolation { .. })
        ));
        assert!(alice.key().is_none());
    }

    #[test]
    fn short_basis_list_is_rejected() {
        let mut alice = initiator(2);
        acknowledge_all(&mut alice, 6);
        assert!(matches!(
            alice.handle_message("Z X"),
            Err(ProtocolError::ProtocolViolation { .. })
        ));
        assert_eq!(alice.state(), InitiatorState::Failed);
    }
}
