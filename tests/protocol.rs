use std::collections::HashMap;

use gabes::channel::{recv_from, send_ack, send_to, SimpleChannel};
use gabes::{simulate, Circuit, Error, Scheme};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn inputs(pairs: &[(&str, u8)]) -> HashMap<String, bool> {
    pairs
        .iter()
        .map(|(id, bit)| (id.to_string(), *bit == 1))
        .collect()
}

/// A 4-bit millionaire comparator: 1 iff x > y, most significant bit first.
/// The garbler owns X3..X0, the evaluator Y3..Y0.
const MILLIONAIRE: &str = "
GATE(OR, out,
  GATE(AND, g3, X3, GATE(NOT, n3, Y3)),
  GATE(AND, t3,
    GATE(XNOR, e3, X3, Y3),
    GATE(OR, o2,
      GATE(AND, g2, X2, GATE(NOT, n2, Y2)),
      GATE(AND, t2,
        GATE(XNOR, e2, X2, Y2),
        GATE(OR, o1,
          GATE(AND, g1, X1, GATE(NOT, n1, Y1)),
          GATE(AND, t1,
            GATE(XNOR, e1, X1, Y1),
            GATE(AND, g0, X0, GATE(NOT, n0, Y0))))))))";

/// Runs the millionaire circuit with x = 1010 and y = 0101; 10 > 5, so both
/// parties must learn 1.
fn millionaire_under(scheme: Scheme) {
    let x = inputs(&[("X3", 1), ("X2", 0), ("X1", 1), ("X0", 0)]);
    let y = inputs(&[("Y3", 0), ("Y2", 1), ("Y1", 0), ("Y0", 1)]);
    let (garbler_out, evaluator_out) = simulate(MILLIONAIRE, scheme, scheme, &x, &y).unwrap();
    assert!(garbler_out);
    assert!(evaluator_out);
}

#[test]
fn millionaire_classical() {
    millionaire_under(Scheme::Classical);
}

#[test]
fn millionaire_point_and_permute() {
    millionaire_under(Scheme::PointAndPermute);
}

#[test]
fn millionaire_grr3() {
    millionaire_under(Scheme::Grr3);
}

#[test]
fn millionaire_free_xor() {
    millionaire_under(Scheme::FreeXor);
}

#[test]
fn millionaire_flexor() {
    millionaire_under(Scheme::FleXor);
}

#[test]
fn millionaire_half_gates() {
    millionaire_under(Scheme::HalfGates);
}

#[test]
fn and_of_two_singletons() {
    let circuit = "GATE(AND, out, A, B)";
    for (b, expected) in [(1, true), (0, false)] {
        let (garbler_out, evaluator_out) = simulate(
            circuit,
            Scheme::Classical,
            Scheme::Classical,
            &inputs(&[("A", 1)]),
            &inputs(&[("B", b)]),
        )
        .unwrap();
        assert_eq!(garbler_out, expected);
        assert_eq!(evaluator_out, expected);
    }
}

#[test]
fn and_of_two_singletons_under_half_gates() {
    let (garbler_out, evaluator_out) = simulate(
        "GATE(AND, out, A, B)",
        Scheme::HalfGates,
        Scheme::HalfGates,
        &inputs(&[("A", 1)]),
        &inputs(&[("B", 1)]),
    )
    .unwrap();
    assert!(garbler_out);
    assert!(evaluator_out);
}

#[test]
fn xor_chain_of_four_inputs() {
    // 1 ^ 0 ^ 1 ^ 1 == 1; under free-XOR the whole circuit is ciphertext-free
    let (garbler_out, evaluator_out) = simulate(
        "GATE(XOR, out, GATE(XOR, l, A, B), GATE(XOR, r, C, D))",
        Scheme::FreeXor,
        Scheme::FreeXor,
        &inputs(&[("A", 1), ("B", 0)]),
        &inputs(&[("C", 1), ("D", 1)]),
    )
    .unwrap();
    assert!(garbler_out);
    assert!(evaluator_out);
}

#[test]
fn not_of_a_nand() {
    for scheme in [Scheme::Grr3, Scheme::HalfGates] {
        let (garbler_out, evaluator_out) = simulate(
            "GATE(NOT, out, GATE(NAND, n, A, B))",
            scheme,
            scheme,
            &inputs(&[("A", 1)]),
            &inputs(&[("B", 1)]),
        )
        .unwrap();
        assert!(garbler_out, "under {scheme}");
        assert!(evaluator_out, "under {scheme}");
    }
}

#[test]
fn scheme_mismatch_surfaces_as_decryption_failure() {
    let result = simulate(
        "GATE(AND, out, A, B)",
        Scheme::Grr3,
        Scheme::Classical,
        &inputs(&[("A", 1)]),
        &inputs(&[("B", 1)]),
    );
    match result {
        Err(Error::Decryption(_)) => {}
        other => panic!("expected a decryption failure, got {other:?}"),
    }
}

#[test]
fn overlapping_wire_claims_are_a_protocol_error() {
    let result = simulate(
        "GATE(AND, out, A, B)",
        Scheme::Classical,
        Scheme::Classical,
        &inputs(&[("A", 1)]),
        &inputs(&[("A", 1), ("B", 0)]),
    );
    match result {
        Err(Error::Protocol(msg)) => assert!(msg.contains("claimed by both")),
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

#[test]
fn unclaimed_wires_are_a_protocol_error() {
    let result = simulate(
        "GATE(AND, out, A, B)",
        Scheme::Classical,
        Scheme::Classical,
        &inputs(&[("A", 1)]),
        &inputs(&[]),
    );
    match result {
        Err(Error::Protocol(msg)) => assert!(msg.contains("no party claims")),
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

/// A peer that skips the evaluator's own claim validation must still have a
/// bogus identifier in its claims message rejected on the garbler's side.
#[tokio::test]
async fn bogus_wire_claims_from_the_peer_are_rejected() {
    #[derive(Debug, serde::Deserialize)]
    struct Manifest {
        order: Vec<String>,
        garbler_owned: Vec<String>,
    }

    let (mut g_channel, mut e_channel) = SimpleChannel::pair();
    let mut circuit = Circuit::parse("GATE(AND, out, A, B)").unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    let garbler_inputs = inputs(&[("A", 1)]);
    let garbler = gabes::garbler(
        &mut g_channel,
        &mut circuit,
        Scheme::Classical,
        &garbler_inputs,
        &mut rng,
    );
    let peer = async {
        let _: Scheme = recv_from(&mut e_channel, "scheme").await.unwrap();
        let _: Circuit = recv_from(&mut e_channel, "circuit").await.unwrap();
        send_ack(&mut e_channel, "circuit").await.unwrap();
        let manifest: Manifest = recv_from(&mut e_channel, "input order").await.unwrap();
        assert_eq!(manifest.order, vec!["A", "B"]);
        assert_eq!(manifest.garbler_owned, vec!["A"]);
        // claim the remaining wire plus one that does not exist
        send_to(
            &mut e_channel,
            "claimed wires",
            &vec!["B".to_string(), "Z".to_string()],
        )
        .await
        .unwrap();
    };
    let (result, ()) = tokio::join!(garbler, peer);
    match result {
        Err(Error::Protocol(msg)) => assert!(msg.contains("does not occur")),
        other => panic!("expected a protocol error, got {other:?}"),
    }
}

#[test]
fn claiming_an_unknown_wire_is_rejected() {
    let result = simulate(
        "GATE(AND, out, A, B)",
        Scheme::Classical,
        Scheme::Classical,
        &inputs(&[("A", 1), ("Z", 1)]),
        &inputs(&[("B", 1)]),
    );
    match result {
        Err(Error::Usage(msg)) => assert!(msg.contains("does not occur")),
        other => panic!("expected a usage error, got {other:?}"),
    }
}
