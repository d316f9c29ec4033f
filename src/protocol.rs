//! The two-party protocol: the garbler and evaluator state machines.
//!
//! The phases are strictly ordered; every phase ends in an acknowledgement
//! barrier before the next one starts:
//!
//! 1. The garbler garbles its circuit and transmits the scheme identifier
//!    and the cleaned circuit (structure and tables only).
//! 2. The parties exchange the input-wire ordering and their ownership
//!    claims and verify that every input wire is claimed by exactly one
//!    side.
//! 3. Input labels flow to the evaluator: the garbler's own wires as plain
//!    labels (they reveal nothing), the evaluator's wires through one
//!    oblivious transfer each.
//! 4. The evaluator reduces the circuit bottom-up to a single output label
//!    and returns it; the garbler maps it back to a plaintext bit and
//!    shares the result.

use std::collections::{HashMap, HashSet};

use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::channel::{self, recv_from, send_ack, send_to, wait_for_ack, Channel, SimpleChannel};
use crate::circuit::{Circuit, ParseError};
use crate::crypto;
use crate::garble::{evaluate, garble, EvalError, Scheme};
use crate::label::Label;
use crate::ot;

/// A failed protocol run. The five classes map one-to-one onto the process
/// exit codes.
#[derive(Debug)]
pub enum Error {
    /// The command line or the supplied inputs were unusable.
    Usage(String),
    /// The circuit file was malformed.
    Parse(ParseError),
    /// The connection to the peer broke down.
    Network(channel::Error),
    /// The peer sent a message out of order or with impossible content.
    Protocol(String),
    /// A garbled row failed to authenticate, or the output label matched
    /// neither label of the output wire.
    Decryption(String),
}

impl Error {
    /// The process exit code for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_) => 1,
            Error::Parse(_) => 2,
            Error::Network(_) => 3,
            Error::Protocol(_) => 4,
            Error::Decryption(_) => 5,
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<channel::Error> for Error {
    fn from(e: channel::Error) -> Self {
        match e.reason {
            channel::ErrorKind::UnexpectedPhase { ref actual } => Self::Protocol(format!(
                "expected a message for phase {:?} but received one for {:?}",
                e.phase, actual
            )),
            _ => Self::Network(e),
        }
    }
}

impl From<ot::Error> for Error {
    fn from(e: ot::Error) -> Self {
        match e {
            ot::Error::Channel(e) => e.into(),
            ot::Error::KeyGeneration(e) => Self::Protocol(format!("OT key generation: {e}")),
            ot::Error::InvalidOtData => {
                Self::Protocol("OT value out of range for the modulus".into())
            }
        }
    }
}

impl From<crypto::Error> for Error {
    fn from(e: crypto::Error) -> Self {
        Self::Decryption(format!("{e:?}"))
    }
}

impl From<EvalError> for Error {
    fn from(e: EvalError) -> Self {
        match e {
            EvalError::Crypto(e) => e.into(),
            EvalError::MissingInputLabel => {
                Self::Protocol("fewer input labels than circuit leaves".into())
            }
        }
    }
}

/// The input-wire ordering and the garbler's ownership claims, opening the
/// second phase.
#[derive(Debug, Serialize, Deserialize)]
struct WireManifest {
    order: Vec<String>,
    garbler_owned: Vec<String>,
}

fn sorted_ids(inputs: &HashMap<String, bool>) -> Vec<String> {
    let mut ids: Vec<String> = inputs.keys().cloned().collect();
    ids.sort();
    ids
}

/// Runs the garbler over an established channel and returns the plaintext
/// output bit.
///
/// `inputs` maps each wire identifier the garbler owns to its input bit; a
/// repeated leaf identifier receives the same bit on every occurrence.
pub async fn garbler<C: Channel, R: CryptoRng + RngCore>(
    channel: &mut C,
    circuit: &mut Circuit,
    scheme: Scheme,
    inputs: &HashMap<String, bool>,
    rng: &mut R,
) -> Result<bool, Error> {
    let order = circuit.input_identifiers();
    let known: HashSet<&String> = order.iter().collect();
    if let Some(id) = inputs.keys().find(|id| !known.contains(id)) {
        return Err(Error::Usage(format!(
            "wire {id} does not occur in the circuit"
        )));
    }

    garble(circuit, scheme, rng)?;
    debug!("garbled circuit:\n{circuit}");

    send_to(channel, "scheme", &scheme).await?;
    send_to(channel, "circuit", &circuit.clean()).await?;
    wait_for_ack(channel, "circuit").await?;
    info!(%scheme, inputs = order.len(), "circuit transmitted");

    send_to(
        channel,
        "input order",
        &WireManifest {
            order: order.clone(),
            garbler_owned: sorted_ids(inputs),
        },
    )
    .await?;
    let theirs: Vec<String> = recv_from(channel, "claimed wires").await?;
    if let Some(id) = theirs.iter().find(|id| !known.contains(*id)) {
        return Err(Error::Protocol(format!(
            "peer claims wire {id} which does not occur in the circuit"
        )));
    }
    if let Some(id) = theirs.iter().find(|id| inputs.contains_key(*id)) {
        return Err(Error::Protocol(format!(
            "wire {id} is claimed by both parties"
        )));
    }
    let theirs: HashSet<String> = theirs.into_iter().collect();
    if let Some(id) = order
        .iter()
        .find(|id| !inputs.contains_key(*id) && !theirs.contains(*id))
    {
        return Err(Error::Protocol(format!("no party claims wire {id}")));
    }
    send_ack(channel, "input order").await?;

    for (id, wire) in circuit.input_wires() {
        match inputs.get(&id) {
            Some(&bit) => {
                send_to(channel, "input label", &wire.label(bit)).await?;
                wait_for_ack(channel, "input label").await?;
            }
            None => {
                debug!(%id, "transferring evaluator label");
                ot::send_labels(
                    channel,
                    wire.label(false),
                    wire.label(true),
                    ot::MODULUS_BITS,
                    rng,
                )
                .await?;
            }
        }
    }

    let output_label: Label = recv_from(channel, "output label").await?;
    let output_wire = circuit.output_wire().expect("circuit was garbled");
    let result = if output_label == output_wire.label(true) {
        true
    } else if output_label == output_wire.label(false) {
        false
    } else {
        return Err(Error::Decryption(
            "output label matches neither label of the output wire".into(),
        ));
    };
    send_to(channel, "result", &result).await?;
    info!(result, "protocol finished");
    Ok(result)
}

/// Runs the evaluator over an established channel and returns the plaintext
/// output bit.
pub async fn evaluator<C: Channel, R: CryptoRng + RngCore>(
    channel: &mut C,
    scheme: Scheme,
    inputs: &HashMap<String, bool>,
    rng: &mut R,
) -> Result<bool, Error> {
    let remote_scheme: Scheme = recv_from(channel, "scheme").await?;
    if remote_scheme != scheme {
        debug!(%remote_scheme, %scheme, "garbler announced a different scheme");
    }
    let circuit: Circuit = recv_from(channel, "circuit").await?;
    send_ack(channel, "circuit").await?;

    let manifest: WireManifest = recv_from(channel, "input order").await?;
    let known: HashSet<&String> = manifest.order.iter().collect();
    if let Some(id) = inputs.keys().find(|id| !known.contains(id)) {
        return Err(Error::Usage(format!(
            "wire {id} does not occur in the circuit"
        )));
    }
    if let Some(id) = manifest
        .garbler_owned
        .iter()
        .find(|id| inputs.contains_key(*id))
    {
        return Err(Error::Protocol(format!(
            "wire {id} is claimed by both parties"
        )));
    }
    send_to(channel, "claimed wires", &sorted_ids(inputs)).await?;
    wait_for_ack(channel, "input order").await?;

    let mut labels = Vec::with_capacity(manifest.order.len());
    for id in &manifest.order {
        match inputs.get(id) {
            Some(&bit) => labels.push(ot::recv_label(channel, bit, rng).await?),
            None => {
                let label: Label = recv_from(channel, "input label").await?;
                send_ack(channel, "input label").await?;
                labels.push(label);
            }
        }
    }
    info!(labels = labels.len(), "input labels collected");

    let output_label = evaluate(&circuit, scheme, &labels)?;
    send_to(channel, "output label", &output_label).await?;
    let result: bool = recv_from(channel, "result").await?;
    info!(result, "protocol finished");
    Ok(result)
}

/// Drives a garbler and an evaluator against each other over an in-memory
/// channel on a fresh runtime and returns both parties' outputs. Intended
/// for tests and experiments; the schemes are passed separately so a
/// mismatch can be simulated.
pub fn simulate(
    circuit_text: &str,
    garbler_scheme: Scheme,
    evaluator_scheme: Scheme,
    garbler_inputs: &HashMap<String, bool>,
    evaluator_inputs: &HashMap<String, bool>,
) -> Result<(bool, bool), Error> {
    let mut circuit = Circuit::parse(circuit_text)?;
    let runtime = tokio::runtime::Runtime::new().expect("could not start tokio runtime");
    runtime.block_on(async {
        let (mut g_channel, mut e_channel) = SimpleChannel::pair();
        let mut g_rng = ChaCha20Rng::from_entropy();
        let mut e_rng = ChaCha20Rng::from_entropy();
        tokio::try_join!(
            garbler(
                &mut g_channel,
                &mut circuit,
                garbler_scheme,
                garbler_inputs,
                &mut g_rng,
            ),
            evaluator(&mut e_channel, evaluator_scheme, evaluator_inputs, &mut e_rng),
        )
    })
}
