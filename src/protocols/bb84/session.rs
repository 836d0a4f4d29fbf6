//! Async driver connecting an [`Initiator`] and a [`Responder`].
//!
//! The two actors run as futures joined on the current task. They talk over
//! three unbounded `tokio` channels: one quantum link carrying symbols from
//! initiator to responder, and one classical link in each direction. Every
//! receive is bounded by the configured await timeout.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::ProtocolConfig;
use crate::error::{ProtocolError, SessionError};
use crate::protocols::bb84::codec::{QuantumMedium, SimulatedMedium};
use crate::protocols::bb84::initiator::Initiator;
use crate::protocols::bb84::key::EncryptionKey;
use crate::protocols::bb84::outcome::{Action, Outcome, Port};
use crate::protocols::bb84::responder::Responder;
use crate::protocols::bb84::symbol::RunRecord;

const QUANTUM_LINK: &str = "quantum";
const CLASSICAL_LINK: &str = "classical";

/// Seeds for the three independent random sources of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seeds {
    pub initiator: u64,
    pub responder: u64,
    pub medium: u64,
}

impl Seeds {
    /// Derives all three seeds from one value.
    pub fn from_base(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            initiator: rng.random(),
            responder: rng.random(),
            medium: rng.random(),
        }
    }

    /// Fresh seeds from the thread-local generator.
    pub fn random() -> Self {
        Self::from_base(rand::rng().random())
    }
}

/// Initiator's ends of the three links.
pub struct InitiatorLinks<S> {
    pub quantum: UnboundedSender<S>,
    pub outbound: UnboundedSender<String>,
    pub inbound: UnboundedReceiver<String>,
}

/// Responder's ends of the three links.
pub struct ResponderLinks<S> {
    pub quantum: UnboundedReceiver<S>,
    pub outbound: UnboundedSender<String>,
    pub inbound: UnboundedReceiver<String>,
}

/// Creates a connected pair of link sets.
pub fn links<S>() -> (InitiatorLinks<S>, ResponderLinks<S>) {
    let (quantum_tx, quantum_rx) = mpsc::unbounded_channel();
    let (to_responder, from_initiator) = mpsc::unbounded_channel();
    let (to_initiator, from_responder) = mpsc::unbounded_channel();

    (
        InitiatorLinks {
            quantum: quantum_tx,
            outbound: to_responder,
            inbound: from_responder,
        },
        ResponderLinks {
            quantum: quantum_rx,
            outbound: to_initiator,
            inbound: from_initiator,
        },
    )
}

/// Everything both parties ended up with.
#[derive(Debug)]
pub struct SessionReport {
    pub initiator: Result<Outcome, ProtocolError>,
    pub responder: Result<Outcome, ProtocolError>,
    /// QBER measured by the responder, if estimation happened.
    pub qber: Option<f64>,
    pub initiator_record: RunRecord,
    pub responder_record: RunRecord,
}

impl SessionReport {
    /// The key, if both sides accepted the same one.
    pub fn shared_key(&self) -> Option<&EncryptionKey> {
        let alice = self.initiator.as_ref().ok()?.key()?;
        let bob = self.responder.as_ref().ok()?.key()?;
        (alice == bob).then_some(alice)
    }
}

async fn recv<T>(
    rx: &mut UnboundedReceiver<T>,
    deadline: Duration,
    link: &'static str,
) -> Result<T, ProtocolError> {
    match timeout(deadline, rx.recv()).await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(ProtocolError::ChannelClosed(link)),
        Err(_) => Err(ProtocolError::Timeout {
            waiting_for: link,
            after: deadline,
        }),
    }
}

/// Executes `actions` in order. Returns the outcome if one was reached.
fn perform<S>(
    actions: Vec<Action<S>>,
    quantum: Option<&UnboundedSender<S>>,
    classical: &UnboundedSender<String>,
) -> Result<Option<Outcome>, ProtocolError> {
    for action in actions {
        match action {
            Action::Transmit(symbol) => quantum
                .ok_or(ProtocolError::ChannelClosed(QUANTUM_LINK))?
                .send(symbol)
                .map_err(|_| ProtocolError::ChannelClosed(QUANTUM_LINK))?,
            Action::Send(message) => classical
                .send(message)
                .map_err(|_| ProtocolError::ChannelClosed(CLASSICAL_LINK))?,
            Action::Complete(outcome) => return Ok(Some(outcome)),
        }
    }
    Ok(None)
}

/// Drives `initiator` to completion over `links`.
///
/// The links are dropped on return, so a waiting peer sees the closure
/// instead of waiting for its own deadline.
pub async fn run_initiator<M: QuantumMedium, R: Rng>(
    initiator: &mut Initiator<M, R>,
    mut links: InitiatorLinks<M::Symbol>,
    deadline: Duration,
) -> Result<Outcome, ProtocolError> {
    let mut actions = initiator.start()?;
    loop {
        if let Some(outcome) = perform(actions, Some(&links.quantum), &links.outbound)? {
            return Ok(outcome);
        }
        let message = recv(&mut links.inbound, deadline, CLASSICAL_LINK).await?;
        actions = initiator.handle_message(&message)?;
    }
}

/// Drives `responder` to completion over `links`.
pub async fn run_responder<M: QuantumMedium, R: Rng>(
    responder: &mut Responder<M, R>,
    mut links: ResponderLinks<M::Symbol>,
    deadline: Duration,
) -> Result<Outcome, ProtocolError> {
    loop {
        let actions = match responder.expects() {
            Some(Port::Quantum) => {
                let symbol = recv(&mut links.quantum, deadline, QUANTUM_LINK).await?;
                responder.handle_symbol(symbol)?
            }
            Some(Port::Classical) => {
                let message = recv(&mut links.inbound, deadline, CLASSICAL_LINK).await?;
                responder.handle_message(&message)?
            }
            None => {
                return Err(ProtocolError::InvalidState {
                    state: format!("{:?}", responder.state()),
                    operation: "wait for input",
                });
            }
        };
        if let Some(outcome) = perform(actions, None, &links.outbound)? {
            return Ok(outcome);
        }
    }
}

/// Runs both parties against each other and collects the results.
pub async fn drive<M, R>(
    mut initiator: Initiator<M, R>,
    mut responder: Responder<M, R>,
    deadline: Duration,
) -> SessionReport
where
    M: QuantumMedium,
    R: Rng,
{
    let (alice_links, bob_links) = links();
    let (alice, bob) = tokio::join!(
        run_initiator(&mut initiator, alice_links, deadline),
        run_responder(&mut responder, bob_links, deadline),
    );

    match (&alice, &bob) {
        (Ok(Outcome::Accepted(key)), Ok(_)) => {
            info!(key = %key, qber = ?responder.qber(), "session accepted key")
        }
        (Ok(Outcome::Discarded(_)), Ok(Outcome::Discarded(reason))) => {
            info!(qber = ?responder.qber(), %reason, "session discarded key")
        }
        _ => warn!(initiator = ?alice, responder = ?bob, "session ended abnormally"),
    }

    SessionReport {
        initiator: alice,
        responder: bob,
        qber: responder.qber(),
        initiator_record: initiator.record().clone(),
        responder_record: responder.record().clone(),
    }
}

/// Runs one full exchange over a [`SimulatedMedium`].
///
/// # Errors
///
/// Fails before any symbol is sent if the configuration does not validate
/// or the medium rejects the configured noise or intercept rate.
pub async fn run_session(
    config: &ProtocolConfig,
    seeds: Seeds,
) -> Result<SessionReport, SessionError> {
    config.validate()?;

    let initiator = Initiator::new(
        config,
        SimulatedMedium::noiseless(seeds.medium)?,
        StdRng::seed_from_u64(seeds.initiator),
    );
    let responder = Responder::new(
        config,
        SimulatedMedium::seeded(config.noise_rate, config.intercept_rate, seeds.medium)?,
        StdRng::seed_from_u64(seeds.responder),
    );

    Ok(drive(initiator, responder, config.await_timeout()).await)
}
