//! Wires, each carrying the two labels for its truth values.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::label::{Label, Offset};

/// A wire of the circuit, holding the label for *false* and the label for
/// *true*. The two labels always carry opposite select bits.
///
/// Wires only exist on the garbler's side; the circuit transmitted to the
/// evaluator has been stripped of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    false_label: Label,
    true_label: Label,
}

impl Wire {
    /// A fresh wire with two independent random labels and opposite random
    /// select bits. Used by the schemes without an offset relation.
    pub fn random(rng: &mut impl Rng) -> Self {
        let select = rng.gen();
        Self {
            false_label: Label::random(rng, select),
            true_label: Label::random(rng, !select),
        }
    }

    /// A wire whose true label is the false label shifted by `offset`. The
    /// select bits are the low bits of the values and differ because the
    /// offset is odd.
    pub fn with_offset(rng: &mut impl Rng, offset: Offset) -> Self {
        let false_label = Label::from_value(rng.gen());
        Self {
            false_label,
            true_label: false_label ^ offset,
        }
    }

    /// A wire assembled from a label known to stand for `value` and its
    /// sibling.
    pub fn from_labels(value: bool, label: Label, other: Label) -> Self {
        if value {
            Self {
                false_label: other,
                true_label: label,
            }
        } else {
            Self {
                false_label: label,
                true_label: other,
            }
        }
    }

    /// The label representing `value`.
    pub fn label(&self, value: bool) -> Label {
        if value {
            self.true_label
        } else {
            self.false_label
        }
    }

    /// Both labels together with the truth value each represents.
    pub fn labels(&self) -> [(bool, Label); 2] {
        [(false, self.false_label), (true, self.true_label)]
    }

    /// The label with select bit 0 and the truth value it represents.
    /// This is the row the garbled-row-reduction scheme never transmits.
    pub fn select_zero(&self) -> (bool, Label) {
        if self.false_label.select {
            (true, self.true_label)
        } else {
            (false, self.false_label)
        }
    }

    /// The implicit offset between the two labels.
    pub fn offset(&self) -> Offset {
        Offset::between(self.false_label, self.true_label)
    }

    /// The same wire with the meaning of the two labels exchanged; garbles a
    /// NOT gate for free under the row-reduced and offset schemes.
    pub fn swapped(&self) -> Self {
        Self {
            false_label: self.true_label,
            true_label: self.false_label,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn select_bits_oppose() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for _ in 0..16 {
            let wire = Wire::random(&mut rng);
            assert_ne!(wire.label(false).select, wire.label(true).select);
            let offset = Offset::random(&mut rng);
            let wire = Wire::with_offset(&mut rng, offset);
            assert_ne!(wire.label(false).select, wire.label(true).select);
        }
    }

    #[test]
    fn offset_wire_keeps_relation() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let offset = Offset::random(&mut rng);
        let wire = Wire::with_offset(&mut rng, offset);
        assert_eq!(wire.label(false) ^ offset, wire.label(true));
        assert_eq!(wire.offset(), offset);
    }

    #[test]
    fn swapped_exchanges_meaning() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let wire = Wire::random(&mut rng);
        assert_eq!(wire.swapped().label(true), wire.label(false));
    }
}
