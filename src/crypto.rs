//! The cryptographic building blocks used to garble and ungarble gate rows.
//!
//! Garbled rows are AES-GCM ciphertexts keyed directly by the 128-bit label
//! values. The authentication tag is what lets the classical scheme detect a
//! wrong row during its trial decryptions. The garbled-row-reduction and
//! FleXOR schemes additionally need values both parties can derive without
//! communication; those come from blake3 derivations over the labels, with
//! the AEAD nonce itself derived from the keys so the result is
//! deterministic.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Key, Nonce};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::label::Label;

/// A row encryption or decryption failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The AEAD rejected the plaintext (only possible on pathological
    /// lengths).
    EncryptionFailed,
    /// The authentication tag did not verify. During the classical row
    /// search this is expected for all but one row; anywhere else it means
    /// the two parties run different schemes or the table was tampered with.
    DecryptionFailed,
    /// A decrypted payload did not deserialize into a label.
    Serde(String),
}

/// Nonce ‖ auth tag ‖ body of a single AEAD encryption. The AEAD emits the
/// tag after the body; `seal` and `open` swap it to the front and back so
/// the stored form is the one the wire format names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    nonce: [u8; 12],
    bytes: Vec<u8>,
}

/// AES-GCM authentication tag length in bytes.
const TAG_LEN: usize = 16;

fn cipher(key: Label) -> Aes128Gcm {
    Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(&key.value.to_be_bytes()))
}

/// Runs the AEAD and moves the trailing tag in front of the body.
fn seal(cipher: &Aes128Gcm, nonce: &[u8; 12], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    let sealed = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| Error::EncryptionFailed)?;
    let body_len = sealed.len() - TAG_LEN;
    let mut bytes = Vec::with_capacity(sealed.len());
    bytes.extend_from_slice(&sealed[body_len..]);
    bytes.extend_from_slice(&sealed[..body_len]);
    Ok(bytes)
}

/// Moves the leading tag back behind the body and runs the AEAD.
fn open(cipher: &Aes128Gcm, nonce: &[u8; 12], bytes: &[u8]) -> Result<Vec<u8>, Error> {
    if bytes.len() < TAG_LEN {
        return Err(Error::DecryptionFailed);
    }
    let (tag, body) = bytes.split_at(TAG_LEN);
    let mut sealed = Vec::with_capacity(bytes.len());
    sealed.extend_from_slice(body);
    sealed.extend_from_slice(tag);
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed.as_slice())
        .map_err(|_| Error::DecryptionFailed)
}

/// Encrypts `plaintext` under the label value with a random nonce.
pub fn encrypt(key: Label, plaintext: &[u8], rng: &mut impl Rng) -> Result<Ciphertext, Error> {
    let nonce: [u8; 12] = rng.gen();
    let bytes = seal(&cipher(key), &nonce, plaintext)?;
    Ok(Ciphertext { nonce, bytes })
}

/// Decrypts a ciphertext under the label value, failing on tag mismatch.
pub fn decrypt(key: Label, ciphertext: &Ciphertext) -> Result<Vec<u8>, Error> {
    open(&cipher(key), &ciphertext.nonce, &ciphertext.bytes)
}

/// Encrypts a label under the pair of input labels, outer key first. This is
/// the row format of the classical, point-and-permute and row-reduction
/// schemes.
pub fn encrypt_label(
    outer: Label,
    inner: Label,
    payload: Label,
    rng: &mut impl Rng,
) -> Result<Ciphertext, Error> {
    let serialized = bincode::serialize(&payload).map_err(|e| Error::Serde(format!("{e:?}")))?;
    let inner_ct = encrypt(inner, &serialized, rng)?;
    let inner_bytes = bincode::serialize(&inner_ct).map_err(|e| Error::Serde(format!("{e:?}")))?;
    encrypt(outer, &inner_bytes, rng)
}

/// Inverse of [`encrypt_label`].
pub fn decrypt_label(outer: Label, inner: Label, row: &Ciphertext) -> Result<Label, Error> {
    let inner_bytes = decrypt(outer, row)?;
    let inner_ct: Ciphertext =
        bincode::deserialize(&inner_bytes).map_err(|_| Error::DecryptionFailed)?;
    let serialized = decrypt(inner, &inner_ct)?;
    bincode::deserialize(&serialized).map_err(|e| Error::Serde(format!("{e:?}")))
}

/// Encrypts a label under a single key: NOT-gate rows and FleXOR
/// translation rows.
pub fn encrypt_single(key: Label, payload: Label, rng: &mut impl Rng) -> Result<Ciphertext, Error> {
    let serialized = bincode::serialize(&payload).map_err(|e| Error::Serde(format!("{e:?}")))?;
    encrypt(key, &serialized, rng)
}

/// Inverse of [`encrypt_single`].
pub fn decrypt_single(key: Label, row: &Ciphertext) -> Result<Label, Error> {
    let serialized = decrypt(key, row)?;
    bincode::deserialize(&serialized).map_err(|e| Error::Serde(format!("{e:?}")))
}

const ZERO_KEY_CONTEXT: &str = "gabes grr3 zero ciphertext key";
const ZERO_NONCE_CONTEXT: &str = "gabes grr3 zero ciphertext nonce";
const REKEY_CONTEXT: &str = "gabes flexor rekey base";
const HALF_GATE_CONTEXT: &str = "gabes half gate hash";

/// The deterministic AEAD encryption of `len` zero bytes under the composite
/// key derived from the two select-bit-0 input labels.
///
/// Both the key and the nonce are blake3 derivations of `(key_a, key_b)`, so
/// garbler and evaluator compute the identical ciphertext locally. The
/// row-reduction scheme reads the first 16 body bytes as the output label it
/// never has to transmit.
pub fn generate_zero_ciphertext(key_a: Label, key_b: Label, len: usize) -> Ciphertext {
    let mut material = [0; 34];
    material[..17].copy_from_slice(&key_a.to_bytes());
    material[17..].copy_from_slice(&key_b.to_bytes());
    let key = blake3::derive_key(ZERO_KEY_CONTEXT, &material);
    let nonce_bytes = blake3::derive_key(ZERO_NONCE_CONTEXT, &material);
    let mut nonce = [0; 12];
    nonce.copy_from_slice(&nonce_bytes[..12]);
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(&key[..16]));
    let bytes = seal(&cipher, &nonce, vec![0; len].as_slice())
        .expect("AES-GCM accepts any short plaintext");
    Ciphertext { nonce, bytes }
}

/// The label the row-reduction scheme assigns to the untransmitted (0,0)
/// row, derived from [`generate_zero_ciphertext`].
pub fn zero_row_label(key_a: Label, key_b: Label) -> Label {
    let ct = generate_zero_ciphertext(key_a, key_b, 16);
    let mut value = [0; 16];
    value.copy_from_slice(&ct.bytes[TAG_LEN..TAG_LEN + 16]);
    Label::from_value(u128::from_be_bytes(value))
}

/// The translated image of a label under the FleXOR one-wire rekey. The
/// evaluator holding the label recomputes this instead of receiving a
/// ciphertext.
pub fn rekey_base(label: Label) -> Label {
    let digest = blake3::derive_key(REKEY_CONTEXT, &label.to_bytes());
    let mut value = [0; 16];
    value.copy_from_slice(&digest[..16]);
    Label::from_value(u128::from_be_bytes(value))
}

/// The hash H of the half-gates construction, mapping a label value to a
/// 128-bit string.
pub fn gate_hash(value: u128) -> u128 {
    let digest = blake3::derive_key(HALF_GATE_CONTEXT, &value.to_be_bytes());
    let mut out = [0; 16];
    out.copy_from_slice(&digest[..16]);
    u128::from_be_bytes(out)
}
