//! End-to-end scenarios driven through the public engine API.
use provecore::aig::{Aig, AigAnd, AigLatch, AigReset};
use provecore::engine::Engine;
use provecore::types::ExternalClause;
use provecore::{Error, IvcAlgorithm, MinimizationAlgorithm};

/// Two inputs feeding one AND gate; bad is the gate output.
fn and_gate() -> Aig {
    let mut aig = Aig::new();
    aig.inputs = vec![2, 4];
    aig.ands = vec![AigAnd::new(6, 2, 4)];
    aig.outputs = vec![6];
    aig
}

/// A four-latch chain whose head holds zero; bad = l3 (external 10).
fn hold_chain() -> Aig {
    let mut aig = Aig::new();
    aig.latches = vec![
        AigLatch::new(4, 4, AigReset::Zero),
        AigLatch::new(6, 4, AigReset::Zero),
        AigLatch::new(8, 6, AigReset::Zero),
        AigLatch::new(10, 8, AigReset::Zero),
    ];
    aig.outputs = vec![10];
    aig
}

/// The chain proof: ~l0 through ~l3.
fn hold_chain_proof() -> Vec<ExternalClause> {
    vec![vec![5], vec![7], vec![9], vec![11]]
}

#[test]
fn test_combinational_and_is_unsafe() {
    let mut engine = Engine::new(&and_gate(), &[]).unwrap();
    assert!(!engine.run_ic3());

    let cex = engine.counter_example().unwrap();
    assert_eq!(cex.len(), 1);
    let (inputs, _) = &cex[0];
    // Both inputs are driven high in the single step.
    assert!(inputs.contains(&2));
    assert!(inputs.contains(&4));
}

#[test]
fn test_trivially_unsafe_reset() {
    // A latch resetting to 1 with bad = latch.
    let mut aig = Aig::new();
    aig.latches = vec![AigLatch::new(2, 2, AigReset::One)];
    aig.outputs = vec![2];
    let mut engine = Engine::new(&aig, &[]).unwrap();
    assert!(!engine.run_ic3());
    let cex = engine.counter_example().unwrap();
    assert_eq!(cex.len(), 1);
    assert_eq!(cex[0].1, vec![2]);
}

#[test]
fn test_safe_chain_proves() {
    let mut engine = Engine::new(&hold_chain(), &hold_chain_proof()).unwrap();
    assert!(engine.check_proof());
    assert!(engine.run_ic3());
    assert!(engine.run_bmc(8));
}

#[test]
fn test_minimizers_agree() {
    // Extend the valid proof with a redundant clause over an extra held
    // latch; every algorithm must drop it and keep the support chain.
    let mut aig = hold_chain();
    aig.latches.push(AigLatch::new(12, 12, AigReset::Zero));
    let mut proof = hold_chain_proof();
    proof.push(vec![13]);

    for &algorithm in &[
        MinimizationAlgorithm::Marco,
        MinimizationAlgorithm::Sisi,
        MinimizationAlgorithm::BruteForce,
        MinimizationAlgorithm::Camsis,
    ] {
        let mut engine = Engine::new(&aig, &proof).unwrap();
        assert!(engine.check_proof());
        engine.minimize(algorithm);
        assert!(engine.num_proofs() >= 1, "{:?} found no proof", algorithm);

        let minimum = engine.minimum_proof().unwrap();
        // The support chain survives, the redundant clause and the
        // property are gone.
        let mut sorted: Vec<ExternalClause> = minimum.clone();
        sorted.sort();
        assert_eq!(sorted, vec![vec![5], vec![7], vec![9]], "{:?}", algorithm);
    }
}

#[test]
fn test_ivc_finders_agree() {
    // bad = l & l via gate 6; gate 8 hangs off to the side. The unique
    // MIVC is {6} (external literal 6).
    let mut aig = Aig::new();
    aig.inputs = vec![2];
    aig.latches = vec![AigLatch::new(4, 4, AigReset::Zero)];
    aig.ands = vec![AigAnd::new(6, 4, 4), AigAnd::new(8, 2, 4)];
    aig.outputs = vec![6];

    for &algorithm in &[
        IvcAlgorithm::IvcBf,
        IvcAlgorithm::IvcUcbf,
        IvcAlgorithm::Marco,
        IvcAlgorithm::Caivc,
        IvcAlgorithm::Cbvc,
        IvcAlgorithm::Uivc,
    ] {
        let mut engine = Engine::new(&aig, &[]).unwrap();
        engine.find_ivcs(algorithm);
        assert!(engine.num_ivcs() >= 1, "{:?} found no IVC", algorithm);
        assert_eq!(engine.ivc(0).unwrap(), vec![6], "{:?}", algorithm);
        assert_eq!(engine.minimum_ivc().unwrap(), vec![6], "{:?}", algorithm);
    }
}

#[test]
fn test_multi_literal_clauses_round_trip() {
    // A valid proof with a redundant two-literal clause: the wide clause
    // parses, checks, and is dropped by minimization, and the exported
    // clauses come back in the original external encoding.
    let aig = hold_chain();
    let mut proof = hold_chain_proof();
    proof.push(vec![5, 7]);
    let mut engine = Engine::new(&aig, &proof).unwrap();
    assert!(engine.check_proof());
    engine.minimize(MinimizationAlgorithm::BruteForce);
    let minimum = engine.minimum_proof().unwrap();
    let mut sorted = minimum;
    sorted.sort();
    assert_eq!(sorted, vec![vec![5], vec![7], vec![9]]);
}

#[test]
fn test_malformed_circuit_is_reported() {
    let mut aig = and_gate();
    aig.ands[0].rhs0 = 100;
    assert!(matches!(
        Engine::new(&aig, &[]),
        Err(Error::MalformedCircuit(_))
    ));
}

#[test]
fn test_constraints_restrict_traces() {
    // An input-fed latch with the constraint that the input is always 0:
    // bad = latch never rises.
    let mut aig = Aig::new();
    aig.inputs = vec![2];
    aig.latches = vec![AigLatch::new(4, 2, AigReset::Zero)];
    aig.outputs = vec![4];
    aig.constraints = vec![3];
    let mut engine = Engine::new(&aig, &[]).unwrap();
    assert!(engine.run_bmc(6));
    assert!(engine.run_ic3());

    // Without the constraint the latch loads the input and bad is
    // reachable at depth 1.
    let mut aig = aig;
    aig.constraints.clear();
    let mut engine = Engine::new(&aig, &[]).unwrap();
    assert!(!engine.run_bmc(1));
}
