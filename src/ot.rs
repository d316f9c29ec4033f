//! RSA-based 1-out-of-2 oblivious transfer.
//!
//! The garbler inputs the two labels of an evaluator-owned wire, the
//! evaluator inputs its secret choice bit. The evaluator learns exactly the
//! chosen label; the garbler learns nothing about the bit and the evaluator
//! nothing about the other label (against honest-but-curious peers).
//!
//! Per transfer:
//!
//! 1. The garbler generates a fresh RSA keypair and sends the public part
//!    `(e, N)` plus two random pads `x0, x1 < N`.
//! 2. The evaluator draws a random blind `k < N` and answers with
//!    `v = (x_b + k^e) mod N` for its bit `b`.
//! 3. The garbler unblinds both candidates `k_i = (v - x_i)^d mod N`; only
//!    `k_b` equals `k`, but the two are indistinguishable to the garbler.
//! 4. The garbler sends both labels XOR-masked by their candidate blinds;
//!    the evaluator unmasks the one its own `k` fits.
//!
//! A keypair is never reused across wires; reuse would correlate the pads
//! between transfers. All big integers travel as minimal big-endian bytes.

use num_bigint_dig::{BigUint, RandBigInt};
use rand::{CryptoRng, RngCore};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::channel::{self, recv_from, send_ack, send_to, wait_for_ack, Channel};
use crate::label::{Label, LABEL_BYTES};

/// The RSA modulus size for label transfers.
pub const MODULUS_BITS: usize = 2048;

/// An oblivious-transfer failure.
#[derive(Debug)]
pub enum Error {
    /// A message could not be sent or received.
    Channel(channel::Error),
    /// The RSA keypair could not be generated.
    KeyGeneration(String),
    /// A received integer was out of range for the protocol step.
    InvalidOtData,
}

impl From<channel::Error> for Error {
    fn from(e: channel::Error) -> Self {
        Self::Channel(e)
    }
}

/// The garbler's opening message: public key and the two pads.
#[derive(Debug, Serialize, Deserialize)]
struct Offer {
    e: Vec<u8>,
    n: Vec<u8>,
    x0: Vec<u8>,
    x1: Vec<u8>,
}

/// The two masked labels closing the transfer.
#[derive(Debug, Serialize, Deserialize)]
struct Masked {
    m0: [u8; LABEL_BYTES],
    m1: [u8; LABEL_BYTES],
}

/// The label mask derived from a blind: the first label-width bytes of the
/// blind written big-endian at the fixed modulus width.
fn mask(k: &BigUint, modulus_len: usize) -> Result<[u8; LABEL_BYTES], Error> {
    if modulus_len < LABEL_BYTES {
        return Err(Error::InvalidOtData);
    }
    let bytes = k.to_bytes_be();
    if bytes.len() > modulus_len {
        return Err(Error::InvalidOtData);
    }
    let mut fixed = vec![0; modulus_len];
    fixed[modulus_len - bytes.len()..].copy_from_slice(&bytes);
    let mut out = [0; LABEL_BYTES];
    out.copy_from_slice(&fixed[..LABEL_BYTES]);
    Ok(out)
}

fn xor_mask(label: [u8; LABEL_BYTES], mask: [u8; LABEL_BYTES]) -> [u8; LABEL_BYTES] {
    let mut out = [0; LABEL_BYTES];
    for (o, (l, m)) in out.iter_mut().zip(label.iter().zip(mask.iter())) {
        *o = l ^ m;
    }
    out
}

/// Runs the sender side for one wire, offering `label0` and `label1`.
pub async fn send_labels<C: Channel, R: CryptoRng + RngCore>(
    channel: &mut C,
    label0: Label,
    label1: Label,
    bits: usize,
    rng: &mut R,
) -> Result<(), Error> {
    let key =
        RsaPrivateKey::new(rng, bits).map_err(|e| Error::KeyGeneration(format!("{e:?}")))?;
    let n = key.n().clone();
    let modulus_len = n.to_bytes_be().len();
    let x0 = rng.gen_biguint_below(&n);
    let x1 = rng.gen_biguint_below(&n);
    trace!(bits, "offering fresh keypair");
    send_to(
        channel,
        "ot offer",
        &Offer {
            e: key.e().to_bytes_be(),
            n: n.to_bytes_be(),
            x0: x0.to_bytes_be(),
            x1: x1.to_bytes_be(),
        },
    )
    .await?;
    let v_bytes: Vec<u8> = recv_from(channel, "ot response").await?;
    let v = BigUint::from_bytes_be(&v_bytes);
    if v >= n {
        return Err(Error::InvalidOtData);
    }
    let unblind = |x: &BigUint| (&v + &n - x % &n).modpow(key.d(), &n);
    let k0 = unblind(&x0);
    let k1 = unblind(&x1);
    let masked = Masked {
        m0: xor_mask(label0.to_bytes(), mask(&k0, modulus_len)?),
        m1: xor_mask(label1.to_bytes(), mask(&k1, modulus_len)?),
    };
    send_to(channel, "ot transfer", &masked).await?;
    wait_for_ack(channel, "ot done").await?;
    Ok(())
}

/// Runs the receiver side for one wire, obtaining the label for `bit`.
pub async fn recv_label<C: Channel, R: CryptoRng + RngCore>(
    channel: &mut C,
    bit: bool,
    rng: &mut R,
) -> Result<Label, Error> {
    let offer: Offer = recv_from(channel, "ot offer").await?;
    let n = BigUint::from_bytes_be(&offer.n);
    let e = BigUint::from_bytes_be(&offer.e);
    let modulus_len = offer.n.len();
    let x = BigUint::from_bytes_be(if bit { &offer.x1 } else { &offer.x0 });
    if x >= n {
        return Err(Error::InvalidOtData);
    }
    let k = rng.gen_biguint_below(&n);
    let v = (x + k.modpow(&e, &n)) % &n;
    send_to(channel, "ot response", &v.to_bytes_be()).await?;
    let masked: Masked = recv_from(channel, "ot transfer").await?;
    let m = if bit { masked.m1 } else { masked.m0 };
    let label = Label::from_bytes(&xor_mask(m, mask(&k, modulus_len)?));
    send_ack(channel, "ot done").await?;
    Ok(label)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use crate::channel::SimpleChannel;

    use super::*;

    /// A shorter modulus keeps the keygen-heavy test quick; the protocol
    /// path is identical to the 2048-bit one the drivers use.
    const TEST_BITS: usize = 512;

    #[tokio::test]
    async fn delivers_exactly_the_chosen_label() {
        let mut sender_rng = ChaCha20Rng::seed_from_u64(21);
        let mut receiver_rng = ChaCha20Rng::seed_from_u64(22);
        let label0 = Label::random(&mut sender_rng, false);
        let label1 = Label::random(&mut sender_rng, true);
        for bit in [false, true] {
            let (mut garbler, mut evaluator) = SimpleChannel::pair();
            let (sent, received) = tokio::join!(
                send_labels(&mut garbler, label0, label1, TEST_BITS, &mut sender_rng),
                recv_label(&mut evaluator, bit, &mut receiver_rng),
            );
            sent.unwrap();
            let received = received.unwrap();
            assert_eq!(received, if bit { label1 } else { label0 });
        }
    }

    #[tokio::test]
    async fn full_width_modulus_round_trips() {
        let mut sender_rng = ChaCha20Rng::seed_from_u64(23);
        let mut receiver_rng = ChaCha20Rng::seed_from_u64(24);
        let label0 = Label::random(&mut sender_rng, true);
        let label1 = Label::random(&mut sender_rng, false);
        let (mut garbler, mut evaluator) = SimpleChannel::pair();
        let (sent, received) = tokio::join!(
            send_labels(&mut garbler, label0, label1, MODULUS_BITS, &mut sender_rng),
            recv_label(&mut evaluator, true, &mut receiver_rng),
        );
        sent.unwrap();
        assert_eq!(received.unwrap(), label1);
    }
}
