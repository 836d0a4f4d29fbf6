//! Responder ("Bob") state machine.
//!
//! ```text
//! AwaitingSymbol(0) -> ... -> AwaitingSymbol(N-1) -> AwaitingSiftRequest
//!     -> SendingBases -> AwaitingSiftMessage -> Estimating
//!     -> SentOk | SentDiscard
//! ```
//!
//! The responder measures every symbol, estimates the QBER over the disclosed
//! sample and makes the accept/discard decision for both parties.

use std::collections::HashSet;

use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::config::ProtocolConfig;
use crate::error::ProtocolError;
use crate::protocols::bb84::codec::QuantumMedium;
use crate::protocols::bb84::estimation::{AcceptancePolicy, qber};
use crate::protocols::bb84::key::{EncryptionKey, derive_key};
use crate::protocols::bb84::outcome::{Action, DiscardReason, Outcome, Port};
use crate::protocols::bb84::symbol::{Basis, RunRecord, Symbol};
use crate::protocols::bb84::wire::{self, Decision, SiftMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderState {
    /// Waiting for the symbol at this 0-based index.
    AwaitingSymbol(usize),
    AwaitingSiftRequest,
    SendingBases,
    AwaitingSiftMessage,
    Estimating,
    SentOk,
    SentDiscard,
    Failed,
}

impl ResponderState {
    /// Whether the run is over, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResponderState::SentOk | ResponderState::SentDiscard | ResponderState::Failed
        )
    }
}

/// Receiving party. Measures symbols and judges the channel.
pub struct Responder<M: QuantumMedium, R = StdRng> {
    key_length: usize,
    symbol_count: usize,
    strict_key_length: bool,
    acceptance: AcceptancePolicy,
    medium: M,
    rng: R,
    state: ResponderState,
    record: RunRecord,
    qber: Option<f64>,
    key: Option<EncryptionKey>,
}

impl<M: QuantumMedium, R: Rng> Responder<M, R> {
    pub fn new(config: &ProtocolConfig, medium: M, rng: R) -> Self {
        let state = if config.symbol_count() == 0 {
            ResponderState::AwaitingSiftRequest
        } else {
            ResponderState::AwaitingSymbol(0)
        };

        Self {
            key_length: config.key_length,
            symbol_count: config.symbol_count(),
            strict_key_length: config.strict_key_length,
            acceptance: config.acceptance,
            medium,
            rng,
            state,
            record: RunRecord::with_capacity(config.symbol_count()),
            qber: None,
            key: None,
        }
    }

    pub fn state(&self) -> ResponderState {
        self.state
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// QBER measured over the disclosed sample, once estimated.
    pub fn qber(&self) -> Option<f64> {
        self.qber
    }

    /// Present only in `SentOk`.
    pub fn key(&self) -> Option<&EncryptionKey> {
        self.key.as_ref()
    }

    /// The link the responder is blocked on, or `None` once the run is over.
    pub fn expects(&self) -> Option<Port> {
        match self.state {
            ResponderState::AwaitingSymbol(_) => Some(Port::Quantum),
            ResponderState::AwaitingSiftRequest | ResponderState::AwaitingSiftMessage => {
                Some(Port::Classical)
            }
            _ => None,
        }
    }

    /// Measures one received symbol and acknowledges it.
    ///
    /// A symbol arriving while a classical message is due ends the run.
    pub fn handle_symbol(
        &mut self,
        symbol: M::Symbol,
    ) -> Result<Vec<Action<M::Symbol>>, ProtocolError> {
        let result = match self.state {
            ResponderState::AwaitingSymbol(index) => self.on_symbol(symbol, index),
            state if state.is_terminal() => return Err(self.invalid("receive a symbol")),
            _ => Err(self.unexpected("a symbol")),
        };
        self.guard(result)
    }

    /// Feeds one classical message from the initiator.
    pub fn handle_message(
        &mut self,
        message: &str,
    ) -> Result<Vec<Action<M::Symbol>>, ProtocolError> {
        let result = match self.state {
            ResponderState::AwaitingSiftRequest => self.on_sift_request(message),
            ResponderState::AwaitingSiftMessage => self.on_sift_message(message),
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
        let expected = match self.state {
            ResponderState::AwaitingSymbol(index) => format!("symbol {}", index + 1),
            ResponderState::AwaitingSiftRequest => wire::SIFT_REQUEST.to_string(),
            ResponderState::AwaitingSiftMessage => "sift message".to_string(),
            state => format!("nothing in {state:?}"),
        };
        ProtocolError::ProtocolViolation {
            expected,
            got: got.to_string(),
        }
    }

    fn guard<T>(&mut self, result: Result<T, ProtocolError>) -> Result<T, ProtocolError> {
        if let Err(err) = &result {
            warn!(state = ?self.state, error = %err, "responder aborted");
            self.state = ResponderState::Failed;
            self.key = None;
        }
        result
    }

    fn on_symbol(
        &mut self,
        mut symbol: M::Symbol,
        index: usize,
    ) -> Result<Vec<Action<M::Symbol>>, ProtocolError> {
        let basis = Basis::random(&mut self.rng);
        self.medium.apply_noise(&mut symbol)?;
        let bit = self.medium.measure(symbol, basis)?;

        self.record.push(Symbol { index, bit, basis });
        debug!(sequence = index + 1, bit = u8::from(bit), basis = %basis, "measured symbol");

        self.state = if index + 1 < self.symbol_count {
            ResponderState::AwaitingSymbol(index + 1)
        } else {
            ResponderState::AwaitingSiftRequest
        };
        Ok(vec![Action::Send(wire::ack(index + 1))])
    }

    fn on_sift_request(
        &mut self,
        message: &str,
    ) -> Result<Vec<Action<M::Symbol>>, ProtocolError> {
        if message != wire::SIFT_REQUEST {
            return Err(ProtocolError::ProtocolViolation {
                expected: wire::SIFT_REQUEST.to_string(),
                got: message.to_string(),
            });
        }

        self.state = ResponderState::SendingBases;
        let bases = wire::encode_bases(&self.record.bases());
        debug!("sending bases");

        self.state = ResponderState::AwaitingSiftMessage;
        Ok(vec![Action::Send(bases)])
    }

    fn on_sift_message(
        &mut self,
        message: &str,
    ) -> Result<Vec<Action<M::Symbol>>, ProtocolError> {
        let sift = SiftMessage::parse(message)?;
        self.check_positions(&sift)?;
        self.state = ResponderState::Estimating;

        let bits = self.record.bits();
        let own: Vec<bool> = sift.sampled.iter().map(|&i| bits[i]).collect();

        let verdict = match qber(&sift.disclosed_bits, &own) {
            Ok(rate) => {
                self.qber = Some(rate);
                info!(qber = rate, sample = own.len(), "estimated error rate");
                let key = derive_key(&sift.retained, &bits, self.key_length);
                if !self.acceptance.accepts(rate) {
                    Err(DiscardReason::QberAboveThreshold(rate))
                } else if self.strict_key_length && key.len() < self.key_length {
                    Err(DiscardReason::KeyTooShort {
                        available: key.len(),
                        required: self.key_length,
                    })
                } else {
                    Ok(key)
                }
            }
            Err(ProtocolError::EmptySample) => Err(DiscardReason::EmptySample),
            Err(err) => return Err(err),
        };

        match verdict {
            Ok(key) => {
                info!(key = %key, "key accepted");
                self.key = Some(key.clone());
                self.state = ResponderState::SentOk;
                Ok(vec![
                    Action::Send(Decision::Accept.as_str().to_string()),
                    Action::Complete(Outcome::Accepted(key)),
                ])
            }
            Err(reason) => {
                info!(qber = ?self.qber, %reason, "key discarded");
                self.state = ResponderState::SentDiscard;
                Ok(vec![
                    Action::Send(Decision::Discard.as_str().to_string()),
                    Action::Complete(Outcome::Discarded(reason)),
                ])
            }
        }
    }

    /// Every announced position must exist and appear in exactly one field.
    /// Retained positions must be strictly ascending, since the key is read
    /// off in that order.
    fn check_positions(&self, sift: &SiftMessage) -> Result<(), ProtocolError> {
        if let Some(w) = sift.retained.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ProtocolError::MalformedMessage(format!(
                "retained positions not ascending at {} {}",
                w[0], w[1]
            )));
        }

        let mut seen = HashSet::new();
        for &i in sift.retained.iter().chain(&sift.sampled) {
            if i >= self.symbol_count {
                return Err(ProtocolError::MalformedMessage(format!(
                    "position {i} outside run of {}",
                    self.symbol_count
                )));
            }
            if !seen.insert(i) {
                return Err(ProtocolError::MalformedMessage(format!(
                    "position {i} announced twice"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::bb84::codec::SimulatedMedium;
    use rand::SeedableRng;

    struct Harness {
        bob: Responder<SimulatedMedium>,
        source: SimulatedMedium,
        sent: Vec<Symbol>,
    }

    /// Feeds `n` symbols with bit `i % 2` in alternating bases.
    fn after_symbols(config: &ProtocolConfig) -> Harness {
        let mut bob = Responder::new(
            config,
            SimulatedMedium::seeded(config.noise_rate, 0.0, 4).unwrap(),
            StdRng::seed_from_u64(5),
        );
        let mut source = SimulatedMedium::noiseless(6).unwrap();
        let mut sent = Vec::new();

        for index in 0..config.symbol_count() {
            assert_eq!(bob.expects(), Some(Port::Quantum));
            let basis = if index % 3 == 0 { Basis::Diagonal } else { Basis::Rectilinear };
            let symbol = Symbol { index, bit: index % 2 == 1, basis };
            let photon = source.prepare(symbol.bit, symbol.basis).unwrap();
            let actions = bob.handle_symbol(photon).unwrap();
            assert!(matches!(actions.as_slice(), [Action::Send(m)] if *m == wire::ack(index + 1)));
            sent.push(symbol);
        }

        Harness { bob, source, sent }
    }

    fn request_bases(h: &mut Harness) -> Vec<Basis> {
        let actions = h.bob.handle_message(wire::SIFT_REQUEST).unwrap();
        let [Action::Send(text)] = actions.as_slice() else {
            panic!("expected basis list");
        };
        wire::decode_bases(text, h.sent.len()).unwrap()
    }

    fn matched_positions(h: &Harness, bases: &[Basis]) -> Vec<usize> {
        let ours: Vec<Basis> = h.sent.iter().map(|s| s.basis).collect();
        crate::protocols::bb84::sifting::sift(&ours, bases).unwrap()
    }

    #[test]
    fn acknowledges_each_symbol_then_waits_for_request() {
        let config = ProtocolConfig::default().with_key_length(3);
        let h = after_symbols(&config);
        assert_eq!(h.bob.record().len(), 9);
        assert_eq!(h.bob.state(), ResponderState::AwaitingSiftRequest);
        assert_eq!(h.bob.expects(), Some(Port::Classical));
    }

    #[test]
    fn rejects_message_before_symbols_done() {
        let config = ProtocolConfig::default().with_key_length(3);
        let mut bob: Responder<SimulatedMedium> = Responder::new(
            &config,
            SimulatedMedium::noiseless(0).unwrap(),
            StdRng::seed_from_u64(0),
        );
        assert_eq!(
            bob.handle_message(wire::SIFT_REQUEST).unwrap_err(),
            ProtocolError::ProtocolViolation {
                expected: "symbol 1".into(),
                got: "None".into()
            }
        );
        assert_eq!(bob.state(), ResponderState::Failed);
        assert_eq!(bob.expects(), None);

        // The run is over: later symbols are refused, not measured
        let mut source = SimulatedMedium::noiseless(1).unwrap();
        let photon = source.prepare(false, Basis::Rectilinear).unwrap();
        assert!(matches!(
            bob.handle_symbol(photon),
            Err(ProtocolError::InvalidState { .. })
        ));
        assert!(bob.record().is_empty());
    }

    #[test]
    fn symbol_after_last_ack_ends_run() {
        let config = ProtocolConfig::default().with_key_length(1);
        let mut h = after_symbols(&config);
        let photon = h.source.prepare(true, Basis::Diagonal).unwrap();

        assert!(matches!(
            h.bob.handle_symbol(photon),
            Err(ProtocolError::ProtocolViolation { .. })
        ));
        assert_eq!(h.bob.state(), ResponderState::Failed);
        assert_eq!(h.bob.record().len(), 3);
    }

    #[test]
    fn unordered_retained_positions_are_malformed() {
        let config = ProtocolConfig::default()
            .with_key_length(2)
            .with_strict_key_length(false);
        let mut h = after_symbols(&config);
        request_bases(&mut h);
        let bit = u8::from(h.bob.record().bit(0).unwrap());

        let err = h.bob.handle_message(&format!("5 1|0|{bit}")).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage(_)));
        assert_eq!(h.bob.state(), ResponderState::Failed);
        assert!(h.bob.key().is_none());
        assert_eq!(h.bob.qber(), None);
    }

    #[test]
    fn late_message_keeps_completed_key() {
        let config = ProtocolConfig::default()
            .with_key_length(1)
            .with_strict_key_length(false);
        let mut h = after_symbols(&config);
        request_bases(&mut h);
        let bit = u8::from(h.bob.record().bit(0).unwrap());
        h.bob.handle_message(&format!("1 2|0|{bit}")).unwrap();
        assert_eq!(h.bob.state(), ResponderState::SentOk);

        assert!(matches!(
            h.bob.handle_message("OK"),
            Err(ProtocolError::InvalidState { .. })
        ));
        assert_eq!(h.bob.state(), ResponderState::SentOk);
        assert_eq!(h.bob.key().map(|k| k.len()), Some(1));
    }

    #[test]
    fn accepts_clean_sample_and_derives_key() {
        let config = ProtocolConfig::default()
            .with_key_length(2)
            .with_strict_key_length(false);
        let mut h = after_symbols(&config);
        let bases = request_bases(&mut h);
        let matched = matched_positions(&h, &bases);

        // Disclose nothing but one matched position, keep the rest
        let Some((&checked, retained)) = matched.split_first() else {
            return;
        };
        let sift = SiftMessage {
            retained: retained.to_vec(),
            sampled: vec![checked],
            disclosed_bits: vec![h.sent[checked].bit],
        };

        let actions = h.bob.handle_message(&sift.encode()).unwrap();
        assert_eq!(h.bob.qber(), Some(0.0));
        assert_eq!(h.bob.state(), ResponderState::SentOk);
        assert!(matches!(actions.first(), Some(Action::Send(m)) if m == "OK"));

        let expected: Vec<bool> = retained.iter().take(2).map(|&i| h.sent[i].bit).collect();
        assert_eq!(h.bob.key().unwrap().bits(), expected.as_slice());
        assert_eq!(h.bob.expects(), None);
    }

    #[test]
    fn high_error_rate_discards() {
        let config = ProtocolConfig::default().with_key_length(2);
        let mut h = after_symbols(&config);
        let bases = request_bases(&mut h);
        let matched = matched_positions(&h, &bases);
        if matched.is_empty() {
            return;
        }

        // Claim the opposite bits for every matched position
        let sift = SiftMessage {
            retained: vec![],
            sampled: matched.clone(),
            disclosed_bits: matched.iter().map(|&i| !h.sent[i].bit).collect(),
        };
        let actions = h.bob.handle_message(&sift.encode()).unwrap();

        assert_eq!(h.bob.qber(), Some(100.0));
        assert_eq!(h.bob.state(), ResponderState::SentDiscard);
        assert!(h.bob.key().is_none());
        assert!(matches!(&actions[0], Action::Send(m) if m == "DISCARD"));
        assert!(matches!(
            actions[1],
            Action::Complete(Outcome::Discarded(DiscardReason::QberAboveThreshold(_)))
        ));
    }

    #[test]
    fn empty_sample_discards_instead_of_crashing() {
        let config = ProtocolConfig::default().with_key_length(2);
        let mut h = after_symbols(&config);
        request_bases(&mut h);

        let actions = h.bob.handle_message("||").unwrap();
        assert_eq!(h.bob.qber(), None);
        assert!(matches!(
            actions.as_slice(),
            [Action::Send(_), Action::Complete(Outcome::Discarded(DiscardReason::EmptySample))]
        ));
    }

    #[test]
    fn strict_mode_discards_short_key() {
        let config = ProtocolConfig::default().with_key_length(2);
        let mut h = after_symbols(&config);
        request_bases(&mut h);
        let bit = h.bob.record().bit(0).unwrap();

        let sift = SiftMessage {
            retained: vec![1],
            sampled: vec![0],
            disclosed_bits: vec![bit],
        };
        let actions = h.bob.handle_message(&sift.encode()).unwrap();
        let reason = DiscardReason::KeyTooShort {
            available: 1,
            required: 2,
        };
        assert!(matches!(&actions[1], Action::Complete(Outcome::Discarded(r)) if *r == reason));
    }

    #[test]
    fn malformed_sift_message_is_fatal() {
        let config = ProtocolConfig::default().with_key_length(2);
        let mut h = after_symbols(&config);
        request_bases(&mut h);

        let err = h.bob.handle_message("0 1|2").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage(_)));
        assert_eq!(h.bob.state(), ResponderState::Failed);
        assert!(h.bob.key().is_none());
    }

    #[test]
    fn out_of_range_or_repeated_positions_are_malformed() {
        let config = ProtocolConfig::default().with_key_length(2);
        let mut h = after_symbols(&config);
        request_bases(&mut h);
        assert!(matches!(
            h.bob.handle_message("0 99|1|0"),
            Err(ProtocolError::MalformedMessage(_))
        ));

        let mut h = after_symbols(&config);
        request_bases(&mut h);
        assert!(matches!(
            h.bob.handle_message("0 1|1|0"),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn disclosed_bits_must_match_sample_size() {
        let config = ProtocolConfig::default().with_key_length(2);
        let mut h = after_symbols(&config);
        request_bases(&mut h);
        assert!(matches!(
            h.bob.handle_message("0|1 2|1"),
            Err(ProtocolError::LengthMismatch { left: 1, right: 2 })
        ));
    }

    #[test]
    fn noise_still_produces_one_ack_per_symbol() {
        let config = ProtocolConfig::default().with_key_length(2).with_noise_rate(1.0);
        let mut h = after_symbols(&config);
        assert_eq!(h.bob.record().len(), 6);
        // Source is only used to prepare; it stays noise-free
        let photon = h.source.prepare(true, Basis::Rectilinear).unwrap();
        assert!(!photon.is_disturbed());
        request_bases(&mut h);
    }
}
