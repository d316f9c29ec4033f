use std::collections::HashMap;

use gabes::circuit::Circuit;
use gabes::garble::{evaluate, garble, Scheme};
use gabes::gate::{Gate, GateInput, GateKind};
use gabes::label::Label;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

const SCHEMES: [Scheme; 6] = [
    Scheme::Classical,
    Scheme::PointAndPermute,
    Scheme::Grr3,
    Scheme::FreeXor,
    Scheme::FleXor,
    Scheme::HalfGates,
];

const CIRCUITS: [&str; 5] = [
    "GATE(AND, out, A, B)",
    "GATE(XOR, out, GATE(XOR, l, A, B), GATE(XOR, r, C, D))",
    "GATE(NOT, out, GATE(NAND, n, A, B))",
    "GATE(OR, out, GATE(XNOR, x, A, GATE(NOT, na, B)), GATE(AND, a, C, A))",
    "GATE(NAND, out, GATE(OR, o, A, GATE(XOR, x, B, C)), GATE(NOT, n, GATE(AND, a, B, D)))",
];

/// The distinct identifiers of a circuit, in first-occurrence order.
fn distinct_ids(circuit: &Circuit) -> Vec<String> {
    let mut ids = Vec::new();
    for id in circuit.input_identifiers() {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Assignment number `n` over the given identifiers, bit `i` of `n` feeding
/// identifier `i`.
fn assignment(ids: &[String], n: u32) -> HashMap<String, bool> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), n >> i & 1 == 1))
        .collect()
}

/// Plaintext evaluation of the circuit, the reference the garbled runs are
/// checked against.
fn plain(gate: &Gate, inputs: &HashMap<String, bool>) -> bool {
    let l = plain_input(&gate.left, inputs);
    let r = gate
        .right
        .as_ref()
        .map(|right| plain_input(right, inputs))
        .unwrap_or_default();
    gate.kind.eval(l, r)
}

fn plain_input(input: &GateInput, inputs: &HashMap<String, bool>) -> bool {
    match input {
        GateInput::Leaf(leaf) => inputs[&leaf.id],
        GateInput::Gate(gate) => plain(gate, inputs),
    }
}

/// The labels the evaluator would hold for the given assignment, one per
/// leaf occurrence.
fn input_labels(circuit: &Circuit, inputs: &HashMap<String, bool>) -> Vec<Label> {
    circuit
        .input_wires()
        .into_iter()
        .map(|(id, wire)| wire.label(inputs[&id]))
        .collect()
}

#[test]
fn every_scheme_reconstructs_the_chosen_output_label() {
    let mut seed = 0;
    for text in CIRCUITS {
        for scheme in SCHEMES {
            seed += 1;
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let mut circuit = Circuit::parse(text).unwrap();
            garble(&mut circuit, scheme, &mut rng).unwrap();
            let cleaned = circuit.clean();
            let ids = distinct_ids(&circuit);
            for n in 0..1 << ids.len() {
                let inputs = assignment(&ids, n);
                let labels = input_labels(&circuit, &inputs);
                let output = evaluate(&cleaned, scheme, &labels).unwrap();
                let expected = circuit
                    .output_wire()
                    .unwrap()
                    .label(plain(&circuit.root, &inputs));
                assert_eq!(output, expected, "{text} under {scheme}, assignment {n}");
            }
        }
    }
}

fn each_wire(gate: &Gate, f: &mut impl FnMut(&gabes::wire::Wire)) {
    f(gate.output.as_ref().unwrap());
    for input in std::iter::once(&gate.left).chain(gate.right.iter()) {
        match input {
            GateInput::Leaf(leaf) => f(leaf.wire.as_ref().unwrap()),
            GateInput::Gate(gate) => each_wire(gate, f),
        }
    }
}

#[test]
fn labels_of_a_wire_carry_opposite_select_bits() {
    for (i, text) in CIRCUITS.into_iter().enumerate() {
        for scheme in SCHEMES {
            let mut rng = ChaCha20Rng::seed_from_u64(1000 + i as u64);
            let mut circuit = Circuit::parse(text).unwrap();
            garble(&mut circuit, scheme, &mut rng).unwrap();
            each_wire(&circuit.root, &mut |wire| {
                assert_ne!(wire.label(false).select, wire.label(true).select);
            });
        }
    }
}

fn each_gate(gate: &Gate, f: &mut impl FnMut(&Gate)) {
    f(gate);
    for input in std::iter::once(&gate.left).chain(gate.right.iter()) {
        if let GateInput::Gate(gate) = input {
            each_gate(gate, f);
        }
    }
}

#[test]
fn table_sizes_match_the_scheme_on_whole_circuits() {
    for (i, text) in CIRCUITS.into_iter().enumerate() {
        for scheme in SCHEMES {
            let mut rng = ChaCha20Rng::seed_from_u64(2000 + i as u64);
            let mut circuit = Circuit::parse(text).unwrap();
            garble(&mut circuit, scheme, &mut rng).unwrap();
            each_gate(&circuit.root, &mut |gate| {
                let count = gate.table.ciphertext_count();
                let unary = gate.right.is_none();
                match scheme {
                    Scheme::Classical | Scheme::PointAndPermute => {
                        assert_eq!(count, if unary { 2 } else { 4 })
                    }
                    Scheme::Grr3 => assert_eq!(count, if unary { 0 } else { 3 }),
                    Scheme::FreeXor => match gate.kind {
                        GateKind::Xor => assert_eq!(count, 0),
                        GateKind::Not => assert_eq!(count, 0),
                        _ => assert_eq!(count, 3),
                    },
                    Scheme::FleXor => match gate.kind {
                        GateKind::Xor => assert!(count <= 2),
                        GateKind::Not => assert_eq!(count, 0),
                        _ => assert_eq!(count, 3),
                    },
                    Scheme::HalfGates => match gate.kind {
                        GateKind::Xor | GateKind::Xnor | GateKind::Not => assert_eq!(count, 0),
                        _ => assert_eq!(count, 2),
                    },
                }
            });
        }
    }
}

#[test]
fn free_xor_garbles_a_pure_xor_chain_without_ciphertexts() {
    let mut rng = ChaCha20Rng::seed_from_u64(3000);
    let mut circuit =
        Circuit::parse("GATE(XOR, out, GATE(XOR, l, A, B), GATE(XOR, r, C, D))").unwrap();
    garble(&mut circuit, Scheme::FreeXor, &mut rng).unwrap();
    let mut total = 0;
    each_gate(&circuit.root, &mut |gate| {
        total += gate.table.ciphertext_count()
    });
    assert_eq!(total, 0);
}

#[test]
fn parse_and_emit_are_inverse() {
    for text in CIRCUITS {
        let circuit = Circuit::parse(text).unwrap();
        let reparsed = Circuit::parse(&circuit.to_text()).unwrap();
        assert_eq!(reparsed, circuit);
    }
}
