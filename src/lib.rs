//! Two-party secure function evaluation over garbled boolean circuits.
//!
//! The *garbler* parses a boolean circuit, obfuscates it gate by gate under
//! one of six garbling schemes and streams it to the *evaluator*, who
//! reduces it to the output without either party learning the other's
//! input bits. Evaluator input labels are delivered through an RSA-based
//! 1-out-of-2 oblivious transfer.
//!
//! The protocol is semi-honest, synchronous and single-shot: one circuit,
//! one connection, one result.
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod channel;
pub mod circuit;
pub mod crypto;
pub mod garble;
pub mod gate;
pub mod label;
pub mod ot;
pub mod protocol;
pub mod wire;

pub use circuit::Circuit;
pub use garble::Scheme;
pub use protocol::{evaluator, garbler, simulate, Error};
