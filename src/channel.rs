//! The communication channel between the two parties.
//!
//! The protocol code never touches sockets directly: it speaks to the
//! abstract [`Channel`] trait, so the same drivers run over a real TCP
//! connection and over the in-memory channel the tests use.
//!
//! Every message travels as a bincode-encoded [`Frame`] carrying the name of
//! the protocol phase that produced it. The receiver states which phase it
//! expects; a frame for any other phase is a protocol violation, which is
//! how out-of-order messages are caught. One-byte acknowledgement frames
//! serve as rendezvous barriers between phases.

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tracing::trace;

/// Frames larger than this are rejected on receive.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// The payload byte of an acknowledgement frame.
const ACK: u8 = 0x06;

/// Errors related to sending / receiving / (de-)serializing messages.
#[derive(Debug)]
pub struct Error {
    /// The protocol phase during which the error occurred.
    pub phase: String,
    /// The specific error that was raised.
    pub reason: ErrorKind,
}

/// The specific error that occurred when trying to send / receive a message.
#[derive(Debug)]
pub enum ErrorKind {
    /// The serialized message could not be received over the channel.
    RecvError(String),
    /// The serialized message could not be sent over the channel.
    SendError(String),
    /// The message could not be (de-)serialized.
    SerdeError(String),
    /// A frame arrived for a different phase than the receiver expected.
    UnexpectedPhase {
        /// The phase the received frame was tagged with.
        actual: String,
    },
}

/// One length-framed message: the phase tag plus the serialized payload.
#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    phase: String,
    payload: Vec<u8>,
}

/// A communication channel to the other party.
///
/// Implementations decide how the byte frames physically travel; framing,
/// serialization and phase checking live in the free functions of this
/// module.
pub trait Channel {
    /// The error that can occur sending bytes over the channel.
    type SendError: fmt::Debug;
    /// The error that can occur receiving bytes over the channel.
    type RecvError: fmt::Debug;

    /// Sends one frame to the other party, blocking until it is fully on
    /// its way.
    #[allow(async_fn_in_trait)]
    async fn send_bytes(&mut self, frame: Vec<u8>) -> Result<(), Self::SendError>;

    /// Receives one full frame from the other party.
    #[allow(async_fn_in_trait)]
    async fn recv_bytes(&mut self) -> Result<Vec<u8>, Self::RecvError>;
}

/// Serializes and sends a message tagged with the given phase.
pub async fn send_to<S: Serialize>(
    channel: &mut impl Channel,
    phase: &str,
    msg: &S,
) -> Result<(), Error> {
    let payload = bincode::serialize(msg).map_err(|e| Error {
        phase: phase.to_string(),
        reason: ErrorKind::SerdeError(format!("{e:?}")),
    })?;
    let frame = Frame {
        phase: phase.to_string(),
        payload,
    };
    let bytes = bincode::serialize(&frame).map_err(|e| Error {
        phase: phase.to_string(),
        reason: ErrorKind::SerdeError(format!("{e:?}")),
    })?;
    trace!(phase, len = bytes.len(), "sending frame");
    channel.send_bytes(bytes).await.map_err(|e| Error {
        phase: phase.to_string(),
        reason: ErrorKind::SendError(format!("{e:?}")),
    })
}

/// Receives a message, requiring it to belong to the given phase.
pub async fn recv_from<T: DeserializeOwned>(
    channel: &mut impl Channel,
    phase: &str,
) -> Result<T, Error> {
    let bytes = channel.recv_bytes().await.map_err(|e| Error {
        phase: phase.to_string(),
        reason: ErrorKind::RecvError(format!("{e:?}")),
    })?;
    let frame: Frame = bincode::deserialize(&bytes).map_err(|e| Error {
        phase: phase.to_string(),
        reason: ErrorKind::SerdeError(format!("{e:?}")),
    })?;
    trace!(phase, len = frame.payload.len(), "received frame");
    if frame.phase != phase {
        return Err(Error {
            phase: phase.to_string(),
            reason: ErrorKind::UnexpectedPhase {
                actual: frame.phase,
            },
        });
    }
    bincode::deserialize(&frame.payload).map_err(|e| Error {
        phase: phase.to_string(),
        reason: ErrorKind::SerdeError(format!("{e:?}")),
    })
}

/// Sends the one-byte acknowledgement for the given phase.
pub async fn send_ack(channel: &mut impl Channel, phase: &str) -> Result<(), Error> {
    send_to(channel, phase, &ACK).await
}

/// Waits until the acknowledgement for the given phase arrives.
pub async fn wait_for_ack(channel: &mut impl Channel, phase: &str) -> Result<(), Error> {
    let ack: u8 = recv_from(channel, phase).await?;
    if ack == ACK {
        Ok(())
    } else {
        Err(Error {
            phase: phase.to_string(),
            reason: ErrorKind::UnexpectedPhase {
                actual: format!("malformed ack byte {ack:#04x}"),
            },
        })
    }
}

/// The TCP transport: 4-byte big-endian length prefix followed by the frame
/// bytes. The evaluator listens, the garbler dials.
#[derive(Debug)]
pub struct TcpChannel {
    stream: TcpStream,
}

impl TcpChannel {
    /// Dials the peer, retrying for a while so the two processes may be
    /// started in either order.
    pub async fn connect(addr: &str) -> Result<Self, std::io::Error> {
        const ATTEMPTS: u32 = 20;
        let mut last_err = None;
        for attempt in 0..ATTEMPTS {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    return Ok(Self { stream });
                }
                Err(e) => {
                    trace!(attempt, "connect failed, retrying: {e}");
                    last_err = Some(e);
                    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                }
            }
        }
        Err(last_err.expect("at least one connect attempt"))
    }

    /// Binds the address and waits for the single peer connection.
    pub async fn accept(addr: &str) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        let (stream, peer) = listener.accept().await?;
        trace!(%peer, "accepted connection");
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }
}

impl Channel for TcpChannel {
    type SendError = std::io::Error;
    type RecvError = std::io::Error;

    async fn send_bytes(&mut self, frame: Vec<u8>) -> Result<(), std::io::Error> {
        self.stream.write_u32(frame.len() as u32).await?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await
    }

    async fn recv_bytes(&mut self) -> Result<Vec<u8>, std::io::Error> {
        let len = self.stream.read_u32().await?;
        if len > MAX_FRAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds the limit"),
            ));
        }
        let mut frame = vec![0; len as usize];
        self.stream.read_exact(&mut frame).await?;
        Ok(frame)
    }
}

/// An in-memory duplex channel for tests and simulations.
#[derive(Debug)]
pub struct SimpleChannel {
    s: Sender<Vec<u8>>,
    r: Receiver<Vec<u8>>,
}

impl SimpleChannel {
    /// Creates the two connected endpoints.
    pub fn pair() -> (Self, Self) {
        let buffer_capacity = 1024;
        let (send_a_to_b, recv_a_to_b) = channel(buffer_capacity);
        let (send_b_to_a, recv_b_to_a) = channel(buffer_capacity);
        (
            SimpleChannel {
                s: send_a_to_b,
                r: recv_b_to_a,
            },
            SimpleChannel {
                s: send_b_to_a,
                r: recv_a_to_b,
            },
        )
    }
}

/// The error raised by `recv` calls of a [`SimpleChannel`] whose peer went
/// away.
#[derive(Debug)]
pub struct ChannelClosed;

impl Channel for SimpleChannel {
    type SendError = tokio::sync::mpsc::error::SendError<Vec<u8>>;
    type RecvError = ChannelClosed;

    async fn send_bytes(&mut self, frame: Vec<u8>) -> Result<(), Self::SendError> {
        self.s.send(frame).await
    }

    async fn recv_bytes(&mut self) -> Result<Vec<u8>, ChannelClosed> {
        self.r.recv().await.ok_or(ChannelClosed)
    }
}
