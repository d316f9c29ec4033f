//! The six garbling schemes: per-gate table construction and evaluation.
//!
//! Garbling walks the circuit tree post-order, drawing the wire for every
//! leaf and constructing each gate's output wire and garbled table from the
//! wires of its children. Evaluation walks the same order on the cleaned
//! circuit, consuming one received label per leaf and reducing each gate to
//! a single output label.
//!
//! The schemes differ only in how a single gate is garbled and ungarbled;
//! both traversals dispatch through [`Scheme`].

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::circuit::Circuit;
use crate::crypto::{
    self, decrypt_label, decrypt_single, encrypt_label, encrypt_single, gate_hash, rekey_base,
    zero_row_label, Ciphertext,
};
use crate::gate::{Gate, GateInput, GarbledTable, GateKind};
use crate::label::{Label, Offset};
use crate::wire::Wire;

/// The garbling scheme both parties agreed on out-of-band.
///
/// The choice never travels as anything but an identifier; a disagreement
/// surfaces as a decryption failure at the first garbled row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    /// Four shuffled rows per gate, located by trial decryption.
    Classical,
    /// Four rows indexed by the two select bits.
    PointAndPermute,
    /// Garbled row reduction: the (0,0) row is derived, three rows travel.
    Grr3,
    /// XOR gates are free under a circuit-global offset; everything else
    /// falls back to row reduction.
    FreeXor,
    /// Flexible XORs: per-wire offsets, XOR gates cost 0–2 ciphertexts.
    FleXor,
    /// Two half-gates per AND-family gate, XOR free under a global offset.
    HalfGates,
}

impl Scheme {
    /// Whether the scheme threads a single offset through the whole circuit.
    pub fn uses_global_offset(self) -> bool {
        matches!(self, Scheme::FreeXor | Scheme::HalfGates)
    }

    /// The flag-style name of the scheme.
    pub fn name(self) -> &'static str {
        match self {
            Scheme::Classical => "classical",
            Scheme::PointAndPermute => "point-and-permute",
            Scheme::Grr3 => "grr3",
            Scheme::FreeXor => "free-xor",
            Scheme::FleXor => "flexor",
            Scheme::HalfGates => "half-gates",
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An evaluation failure on the evaluator's side.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A garbled row failed to authenticate or a table had the wrong shape
    /// for the active scheme.
    Crypto(crypto::Error),
    /// Fewer input labels than leaves were supplied.
    MissingInputLabel,
}

impl From<crypto::Error> for EvalError {
    fn from(e: crypto::Error) -> Self {
        Self::Crypto(e)
    }
}

/// Garbles the circuit in place under `scheme`, returning the global offset
/// when the scheme uses one. After this call every wire of the circuit holds
/// its two labels and every gate its garbled table.
pub fn garble(
    circuit: &mut Circuit,
    scheme: Scheme,
    rng: &mut impl Rng,
) -> Result<Option<Offset>, crypto::Error> {
    let offset = scheme.uses_global_offset().then(|| Offset::random(rng));
    garble_gate(&mut circuit.root, scheme, offset, rng)?;
    Ok(offset)
}

fn garble_gate(
    gate: &mut Gate,
    scheme: Scheme,
    offset: Option<Offset>,
    rng: &mut impl Rng,
) -> Result<(), crypto::Error> {
    garble_input(&mut gate.left, scheme, offset, rng)?;
    if let Some(right) = &mut gate.right {
        garble_input(right, scheme, offset, rng)?;
    }
    let left = gate.left.wire().expect("left input garbled");
    let (output, table) = match &gate.right {
        None => garble_not(left, scheme, rng)?,
        Some(right) => {
            let right = right.wire().expect("right input garbled");
            garble_binary(gate.kind, left, right, scheme, offset, rng)?
        }
    };
    gate.output = Some(output);
    gate.table = table;
    Ok(())
}

fn garble_input(
    input: &mut GateInput,
    scheme: Scheme,
    offset: Option<Offset>,
    rng: &mut impl Rng,
) -> Result<(), crypto::Error> {
    match input {
        GateInput::Leaf(leaf) => {
            leaf.wire = Some(match offset {
                Some(r) => Wire::with_offset(rng, r),
                None => Wire::random(rng),
            });
            Ok(())
        }
        GateInput::Gate(gate) => garble_gate(gate, scheme, offset, rng),
    }
}

fn garble_not(
    input: &Wire,
    scheme: Scheme,
    rng: &mut impl Rng,
) -> Result<(Wire, GarbledTable), crypto::Error> {
    match scheme {
        // two single-key rows, shuffled or select-indexed
        Scheme::Classical => {
            let output = Wire::random(rng);
            let mut rows = Vec::with_capacity(2);
            for (value, label) in input.labels() {
                rows.push(encrypt_single(label, output.label(!value), rng)?);
            }
            rows.shuffle(rng);
            Ok((output, GarbledTable::Rows(rows)))
        }
        Scheme::PointAndPermute => {
            let output = Wire::random(rng);
            let mut rows = [None, None];
            for (value, label) in input.labels() {
                rows[label.select as usize] = Some(encrypt_single(label, output.label(!value), rng)?);
            }
            let rows = rows.into_iter().map(|r| r.expect("both select bits set")).collect();
            Ok((output, GarbledTable::Rows(rows)))
        }
        // everywhere else NOT is a passthrough: the output wire is the input
        // wire with the meaning of the labels exchanged
        _ => Ok((input.swapped(), GarbledTable::Empty)),
    }
}

fn garble_binary(
    kind: GateKind,
    left: &Wire,
    right: &Wire,
    scheme: Scheme,
    offset: Option<Offset>,
    rng: &mut impl Rng,
) -> Result<(Wire, GarbledTable), crypto::Error> {
    match scheme {
        Scheme::Classical => classical_garble(kind, left, right, rng),
        Scheme::PointAndPermute => pp_garble(kind, left, right, rng),
        Scheme::Grr3 => grr3_garble(kind, left, right, None, rng),
        Scheme::FreeXor => {
            let r = offset.expect("free-xor garbles under a global offset");
            match kind {
                GateKind::Xor => Ok(free_xor_garble(left, right, r, false)),
                _ => grr3_garble(kind, left, right, Some(r), rng),
            }
        }
        Scheme::FleXor => match kind {
            GateKind::Xor => flexor_garble(left, right, rng),
            _ => grr3_garble(kind, left, right, None, rng),
        },
        Scheme::HalfGates => {
            let r = offset.expect("half-gates garbles under a global offset");
            match kind {
                GateKind::Xor => Ok(free_xor_garble(left, right, r, false)),
                GateKind::Xnor => Ok(free_xor_garble(left, right, r, true)),
                _ => Ok(half_gates_garble(kind, left, right, r)),
            }
        }
    }
}

fn classical_garble(
    kind: GateKind,
    left: &Wire,
    right: &Wire,
    rng: &mut impl Rng,
) -> Result<(Wire, GarbledTable), crypto::Error> {
    let output = Wire::random(rng);
    let mut rows = Vec::with_capacity(4);
    for (lv, llab) in left.labels() {
        for (rv, rlab) in right.labels() {
            let payload = output.label(kind.eval(lv, rv));
            rows.push(encrypt_label(llab, rlab, payload, rng)?);
        }
    }
    rows.shuffle(rng);
    Ok((output, GarbledTable::Rows(rows)))
}

fn pp_garble(
    kind: GateKind,
    left: &Wire,
    right: &Wire,
    rng: &mut impl Rng,
) -> Result<(Wire, GarbledTable), crypto::Error> {
    let output = Wire::random(rng);
    let mut rows = [None, None, None, None];
    for (lv, llab) in left.labels() {
        for (rv, rlab) in right.labels() {
            let payload = output.label(kind.eval(lv, rv));
            let index = 2 * llab.select as usize + rlab.select as usize;
            rows[index] = Some(encrypt_label(llab, rlab, payload, rng)?);
        }
    }
    let rows = rows
        .into_iter()
        .map(|r| r.expect("select bits cover all four rows"))
        .collect();
    Ok((output, GarbledTable::Rows(rows)))
}

/// Garbled row reduction. The (0,0) row never travels: its output label is
/// fixed to the zero-ciphertext derivation over the two select-bit-0 input
/// labels, which the evaluator recomputes locally. Under a global offset the
/// sibling output label keeps the offset relation; otherwise it is drawn
/// fresh with the opposite select bit.
fn grr3_garble(
    kind: GateKind,
    left: &Wire,
    right: &Wire,
    offset: Option<Offset>,
    rng: &mut impl Rng,
) -> Result<(Wire, GarbledTable), crypto::Error> {
    let (lv0, a0) = left.select_zero();
    let (rv0, b0) = right.select_zero();
    let derived = zero_row_label(a0, b0);
    let derived_value = kind.eval(lv0, rv0);
    let sibling = match offset {
        Some(r) => derived ^ r,
        None => Label::random(rng, !derived.select),
    };
    let output = Wire::from_labels(derived_value, derived, sibling);
    let mut rows = [None, None, None];
    for (lv, llab) in left.labels() {
        for (rv, rlab) in right.labels() {
            let index = 2 * llab.select as usize + rlab.select as usize;
            if index == 0 {
                continue;
            }
            let payload = output.label(kind.eval(lv, rv));
            rows[index - 1] = Some(encrypt_label(llab, rlab, payload, rng)?);
        }
    }
    let rows = rows
        .into_iter()
        .map(|r| r.expect("three rows besides (0,0)"))
        .collect();
    Ok((output, GarbledTable::Rows(rows)))
}

/// A free XOR gate: the output labels are the XOR of the input false labels,
/// offset by the global `R`. With `flip` set the output meaning is inverted,
/// which garbles XNOR at the same zero cost.
fn free_xor_garble(left: &Wire, right: &Wire, r: Offset, flip: bool) -> (Wire, GarbledTable) {
    let base = left.label(false) ^ right.label(false);
    (Wire::from_labels(flip, base, base ^ r), GarbledTable::Empty)
}

/// A FleXOR gate. The output offset is taken from the first input whose
/// offset has low bit 1 (that input is consumed raw); any input with a
/// different offset is translated: its select-bit-indexed slot carries the
/// image of one label, the other image is the local rekey derivation.
fn flexor_garble(
    left: &Wire,
    right: &Wire,
    rng: &mut impl Rng,
) -> Result<(Wire, GarbledTable), crypto::Error> {
    let r_l = left.offset();
    let r_r = right.offset();
    if r_l.is_odd() && r_l == r_r {
        return Ok(free_xor_garble(left, right, r_l, false));
    }
    let mut slots: Box<[Option<Ciphertext>; 4]> = Default::default();
    let (out_offset, l0, r0) = if r_l.is_odd() {
        let b0 = rekey_base(right.label(false));
        let hot = right.label(true);
        slots[2 + hot.select as usize] = Some(encrypt_single(hot, b0 ^ r_l, rng)?);
        (r_l, left.label(false), b0)
    } else if r_r.is_odd() {
        let a0 = rekey_base(left.label(false));
        let hot = left.label(true);
        slots[hot.select as usize] = Some(encrypt_single(hot, a0 ^ r_r, rng)?);
        (r_r, a0, right.label(false))
    } else {
        let r = Offset::random(rng);
        let a0 = rekey_base(left.label(false));
        let l_hot = left.label(true);
        slots[l_hot.select as usize] = Some(encrypt_single(l_hot, a0 ^ r, rng)?);
        let b0 = rekey_base(right.label(false));
        let r_hot = right.label(true);
        slots[2 + r_hot.select as usize] = Some(encrypt_single(r_hot, b0 ^ r, rng)?);
        (r, a0, b0)
    };
    let base = l0 ^ r0;
    Ok((
        Wire::from_labels(false, base, base ^ out_offset),
        GarbledTable::Translate(slots),
    ))
}

/// The two half-gates of an AND-family gate under the global offset.
///
/// OR and NAND reduce to AND through the variant encoding
/// `g(a, b) = ((a ⊕ f0) ∧ (b ⊕ f1)) ⊕ f2`: the garbler reinterprets which
/// input label stands for zero and which output label receives the computed
/// half-gate value, while the evaluator's algorithm stays identical for all
/// variants.
fn half_gates_garble(kind: GateKind, left: &Wire, right: &Wire, r: Offset) -> (Wire, GarbledTable) {
    let [f0, f1, f2] = match kind {
        GateKind::And => [false, false, false],
        GateKind::Nand => [false, false, true],
        GateKind::Or => [true, true, true],
        _ => unreachable!("xor family is garbled for free"),
    };
    let a0 = left.label(f0);
    let a1 = left.label(!f0);
    let b0 = right.label(f1);
    let b1 = right.label(!f1);
    let (p_a, p_b) = (a0.select, b0.select);
    let t_g = gate_hash(a0.value) ^ gate_hash(a1.value) ^ if p_b { r.0 } else { 0 };
    let t_e = gate_hash(b0.value) ^ gate_hash(b1.value) ^ a0.value;
    let w_g = gate_hash(a0.value) ^ if p_a { t_g } else { 0 };
    let w_e = gate_hash(b0.value) ^ if p_b { t_e ^ a0.value } else { 0 };
    let c0 = Label::from_value(w_g ^ w_e);
    (
        Wire::from_labels(f2, c0, c0 ^ r),
        GarbledTable::Halves([t_g, t_e]),
    )
}

/// Evaluates the cleaned circuit bottom-up, consuming one label per input
/// leaf in [`Circuit::input_identifiers`] order, and returns the output
/// label of the root gate.
pub fn evaluate(circuit: &Circuit, scheme: Scheme, labels: &[Label]) -> Result<Label, EvalError> {
    let mut labels = labels.iter().copied();
    eval_gate(&circuit.root, scheme, &mut labels)
}

fn eval_gate(
    gate: &Gate,
    scheme: Scheme,
    labels: &mut impl Iterator<Item = Label>,
) -> Result<Label, EvalError> {
    let left = eval_input(&gate.left, scheme, labels)?;
    match &gate.right {
        None => eval_not(&gate.table, scheme, left),
        Some(right) => {
            let right = eval_input(right, scheme, labels)?;
            eval_binary(gate.kind, &gate.table, scheme, left, right)
        }
    }
}

fn eval_input(
    input: &GateInput,
    scheme: Scheme,
    labels: &mut impl Iterator<Item = Label>,
) -> Result<Label, EvalError> {
    match input {
        GateInput::Leaf(_) => labels.next().ok_or(EvalError::MissingInputLabel),
        GateInput::Gate(gate) => eval_gate(gate, scheme, labels),
    }
}

fn eval_not(table: &GarbledTable, scheme: Scheme, label: Label) -> Result<Label, EvalError> {
    match scheme {
        Scheme::Classical => match table {
            GarbledTable::Rows(rows) if rows.len() == 2 => {
                for row in rows {
                    if let Ok(payload) = decrypt_single(label, row) {
                        return Ok(payload);
                    }
                }
                Err(crypto::Error::DecryptionFailed.into())
            }
            _ => Err(crypto::Error::DecryptionFailed.into()),
        },
        Scheme::PointAndPermute => match table {
            GarbledTable::Rows(rows) if rows.len() == 2 => {
                Ok(decrypt_single(label, &rows[label.select as usize])?)
            }
            _ => Err(crypto::Error::DecryptionFailed.into()),
        },
        _ => Ok(label),
    }
}

fn eval_binary(
    kind: GateKind,
    table: &GarbledTable,
    scheme: Scheme,
    g: Label,
    e: Label,
) -> Result<Label, EvalError> {
    match scheme {
        Scheme::Classical => classical_eval(table, g, e),
        Scheme::PointAndPermute => pp_eval(table, g, e),
        Scheme::Grr3 => grr3_eval(table, g, e),
        Scheme::FreeXor => match kind {
            GateKind::Xor => Ok(g ^ e),
            _ => grr3_eval(table, g, e),
        },
        Scheme::FleXor => match kind {
            GateKind::Xor => flexor_eval(table, g, e),
            _ => grr3_eval(table, g, e),
        },
        Scheme::HalfGates => match kind {
            GateKind::Xor | GateKind::Xnor => Ok(g ^ e),
            _ => half_gates_eval(table, g, e),
        },
    }
}

fn classical_eval(table: &GarbledTable, g: Label, e: Label) -> Result<Label, EvalError> {
    match table {
        GarbledTable::Rows(rows) if rows.len() == 4 => {
            for row in rows {
                if let Ok(payload) = decrypt_label(g, e, row) {
                    return Ok(payload);
                }
            }
            Err(crypto::Error::DecryptionFailed.into())
        }
        _ => Err(crypto::Error::DecryptionFailed.into()),
    }
}

fn pp_eval(table: &GarbledTable, g: Label, e: Label) -> Result<Label, EvalError> {
    match table {
        GarbledTable::Rows(rows) if rows.len() == 4 => {
            let index = 2 * g.select as usize + e.select as usize;
            Ok(decrypt_label(g, e, &rows[index])?)
        }
        _ => Err(crypto::Error::DecryptionFailed.into()),
    }
}

fn grr3_eval(table: &GarbledTable, g: Label, e: Label) -> Result<Label, EvalError> {
    match table {
        GarbledTable::Rows(rows) if rows.len() == 3 => {
            let index = 2 * g.select as usize + e.select as usize;
            if index == 0 {
                Ok(zero_row_label(g, e))
            } else {
                Ok(decrypt_label(g, e, &rows[index - 1])?)
            }
        }
        _ => Err(crypto::Error::DecryptionFailed.into()),
    }
}

fn flexor_eval(table: &GarbledTable, g: Label, e: Label) -> Result<Label, EvalError> {
    match table {
        GarbledTable::Empty => Ok(g ^ e),
        GarbledTable::Translate(slots) => {
            let left = translate([&slots[0], &slots[1]], g)?;
            let right = translate([&slots[2], &slots[3]], e)?;
            Ok(left ^ right)
        }
        _ => Err(crypto::Error::DecryptionFailed.into()),
    }
}

/// Maps a held label through a FleXOR translation pair: the slot under the
/// label's select bit decrypts to the image, an empty slot next to a filled
/// sibling means the image is the local rekey derivation, and two empty
/// slots mean the input was consumed raw.
fn translate(slots: [&Option<Ciphertext>; 2], label: Label) -> Result<Label, EvalError> {
    let own = slots[label.select as usize];
    let sibling = slots[!label.select as usize];
    match (own, sibling) {
        (Some(row), _) => Ok(decrypt_single(label, row)?),
        (None, Some(_)) => Ok(rekey_base(label)),
        (None, None) => Ok(label),
    }
}

fn half_gates_eval(table: &GarbledTable, g: Label, e: Label) -> Result<Label, EvalError> {
    match table {
        GarbledTable::Halves([t_g, t_e]) => {
            let w_g = gate_hash(g.value) ^ if g.select { *t_g } else { 0 };
            let w_e = gate_hash(e.value) ^ if e.select { t_e ^ g.value } else { 0 };
            Ok(Label::from_value(w_g ^ w_e))
        }
        _ => Err(crypto::Error::DecryptionFailed.into()),
    }
}
