//! Wire labels and the offset `R` used by the XOR-based optimizations.

use std::ops::BitXor;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of bytes in the fixed-width serialization of a [`Label`]:
/// 16 value bytes (big-endian) followed by the select bit.
pub const LABEL_BYTES: usize = 17;

/// A label standing for one of the two truth values of a wire.
///
/// The 128-bit value is secret; only the select bit (also called the
/// point-and-permute bit) is ever observable to the other party. Holding one
/// label of a wire reveals nothing about which truth value it represents.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// The 128-bit secret.
    pub value: u128,
    /// Public bit used to index garbled-table rows.
    pub select: bool,
}

impl Label {
    /// Draws a fresh random label with the given select bit.
    pub fn random(rng: &mut impl Rng, select: bool) -> Self {
        Self {
            value: rng.gen(),
            select,
        }
    }

    /// Builds a label from a computed value, deriving the select bit from the
    /// low bit of the value. This is how every label produced by an
    /// offset-based scheme is formed.
    pub fn from_value(value: u128) -> Self {
        Self {
            value,
            select: value & 1 == 1,
        }
    }

    /// Fixed-width byte serialization, used where XOR-masking requires a
    /// byte-deterministic form (oblivious transfer).
    pub fn to_bytes(self) -> [u8; LABEL_BYTES] {
        let mut bytes = [0; LABEL_BYTES];
        bytes[..16].copy_from_slice(&self.value.to_be_bytes());
        bytes[16] = self.select as u8;
        bytes
    }

    /// Inverse of [`Label::to_bytes`].
    pub fn from_bytes(bytes: &[u8; LABEL_BYTES]) -> Self {
        let mut value = [0; 16];
        value.copy_from_slice(&bytes[..16]);
        Self {
            value: u128::from_be_bytes(value),
            select: bytes[16] != 0,
        }
    }
}

impl BitXor for Label {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Label::from_value(self.value ^ rhs.value)
    }
}

impl BitXor<Offset> for Label {
    type Output = Self;

    fn bitxor(self, rhs: Offset) -> Self::Output {
        Label::from_value(self.value ^ rhs.0)
    }
}

impl std::fmt::Debug for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Label({:032x}/{})", self.value, self.select as u8)
    }
}

/// The offset `R` between the two labels of a wire.
///
/// Free-XOR and Half-Gates use a single circuit-global offset, FleXOR one per
/// wire. The low bit is always 1 so that the two labels of an offset wire
/// carry opposite select bits. Offsets are garbler secrets and are never
/// serialized.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Offset(pub(crate) u128);

impl Offset {
    /// Draws a random offset with the low bit forced to 1.
    pub fn random(rng: &mut impl Rng) -> Self {
        Self(rng.gen::<u128>() | 1)
    }

    /// The offset between two labels.
    pub fn between(a: Label, b: Label) -> Self {
        Self(a.value ^ b.value)
    }

    /// Whether the low bit is set, i.e. whether the offset flips the select
    /// bit of a value-derived label.
    pub fn is_odd(self) -> bool {
        self.0 & 1 == 1
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn xor_round_trips() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let a = Label::random(&mut rng, false);
        let b = Label::random(&mut rng, true);
        assert_eq!((a ^ b) ^ b, Label::from_value(a.value));
    }

    #[test]
    fn offset_flips_select() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        for _ in 0..32 {
            let r = Offset::random(&mut rng);
            let a = Label::from_value(rng.gen());
            assert_ne!(a.select, (a ^ r).select);
        }
    }

    #[test]
    fn byte_serialization_round_trips() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let label = Label::random(&mut rng, true);
        assert_eq!(Label::from_bytes(&label.to_bytes()), label);
    }
}
