//! The debug-augmented transition relation: every AND gate gets a debug
//! latch and a debug input. While the debug latch is 0 the gate behaves
//! normally; while it is 1 the gate output is driven by the debug input.
//!
//! Debug latches self-loop and have an unconstrained reset, so a
//! cardinality-bounded set of them can be activated through initial-state
//! restrictions or assumptions. A minimal activated set under a property
//! violation is a correction set.
use std::collections::HashMap;
use std::ops::Deref;

use crate::tr::{tseitin_and, AndGate, TransitionRelation, TransitionSystem};
use crate::types::*;
use crate::vars::VariableManager;

#[derive(Debug, Clone)]
pub struct DebugTransitionRelation {
    base: TransitionRelation,
    debug_latches: Vec<Id>,
    debug_ppis: Vec<Id>,
    gate_to_latch: HashMap<Id, Id>,
    latch_to_gate: HashMap<Id, Id>,
    gate_to_ppi: HashMap<Id, Id>,
}

impl DebugTransitionRelation {
    pub fn new(tr: &TransitionRelation) -> Self {
        let mut dtr = DebugTransitionRelation {
            base: tr.clone(),
            debug_latches: Vec::new(),
            debug_ppis: Vec::new(),
            gate_to_latch: HashMap::new(),
            latch_to_gate: HashMap::new(),
            gate_to_ppi: HashMap::new(),
        };
        for gate in tr.gates().to_vec() {
            dtr.create_debug_for(gate.lhs);
        }
        dtr
    }

    fn create_debug_for(&mut self, gate: Id) {
        let vars: VariableManager = self.base.vars().clone();
        debug_assert!(!self.gate_to_latch.contains_key(&gate));

        let dl = vars.new_internal(&format!("dl_{}", gate));
        self.base.add_internal_latch(dl, dl, ID_NULL);
        let di = vars.new_internal(&format!("di_{}", gate));
        self.base.add_internal_input(di);

        self.debug_latches.push(dl);
        self.debug_ppis.push(di);
        self.gate_to_latch.insert(gate, dl);
        self.latch_to_gate.insert(dl, gate);
        self.gate_to_ppi.insert(gate, di);
    }

    pub fn debug_latches(&self) -> &[Id] {
        &self.debug_latches
    }

    pub fn debug_ppis(&self) -> &[Id] {
        &self.debug_ppis
    }

    pub fn num_suspects(&self) -> usize {
        self.debug_latches.len()
    }

    pub fn debug_latch_for_gate(&self, gate: Id) -> Id {
        self.gate_to_latch[&strip(unprime(gate))]
    }

    pub fn debug_ppi_for_gate(&self, gate: Id) -> Id {
        self.gate_to_ppi[&strip(unprime(gate))]
    }

    pub fn gate_for_debug_latch(&self, dl: Id) -> Id {
        self.latch_to_gate[&strip(unprime(dl))]
    }

    pub fn is_debug_latch(&self, id: Id) -> bool {
        self.latch_to_gate.contains_key(&strip(unprime(id)))
    }
}

impl Deref for DebugTransitionRelation {
    type Target = TransitionRelation;
    fn deref(&self) -> &TransitionRelation {
        &self.base
    }
}

impl TransitionSystem for DebugTransitionRelation {
    fn tr(&self) -> &TransitionRelation {
        &self.base
    }

    fn gate_cnf(&self, gate: &AndGate) -> ClauseVec {
        let dl = self.debug_latch_for_gate(gate.lhs);
        let di = self.debug_ppi_for_gate(gate.lhs);

        let mut clauses = tseitin_and(gate);
        for cls in clauses.iter_mut() {
            cls.push(dl);
        }
        // lhs = di whenever dl = 1.
        clauses.push(vec![gate.lhs, negate(di), negate(dl)]);
        clauses.push(vec![negate(gate.lhs), di, negate(dl)]);
        clauses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptor::SatAdaptor;
    use crate::aig::{Aig, AigAnd};

    fn and_gate_tr() -> (VariableManager, TransitionRelation) {
        let mut aig = Aig::new();
        aig.inputs = vec![2, 4];
        aig.ands = vec![AigAnd::new(6, 2, 4)];
        aig.outputs = vec![6];
        let vars = VariableManager::new();
        let tr = TransitionRelation::new(&vars, &aig).unwrap();
        (vars, tr)
    }

    #[test]
    fn test_debug_elements_registered() {
        let (_, tr) = and_gate_tr();
        let dtr = DebugTransitionRelation::new(&tr);
        assert_eq!(dtr.num_suspects(), 1);
        // Debug latch and input appear in the base model's element lists.
        let dl = dtr.debug_latches()[0];
        let di = dtr.debug_ppis()[0];
        assert!(dtr.latches().contains(&dl));
        assert!(dtr.inputs().contains(&di));
        assert_eq!(dtr.latch_rec(dl).next, dl);
        assert_eq!(dtr.latch_rec(dl).reset, ID_NULL);
        assert_eq!(dtr.gate_for_debug_latch(dl), tr.gates()[0].lhs);
        assert_eq!(dtr.debug_ppi_for_gate(tr.gates()[0].lhs), di);
    }

    #[test]
    fn test_inactive_latch_preserves_gate() {
        let (_, tr) = and_gate_tr();
        let dtr = DebugTransitionRelation::new(&tr);
        let gate = tr.gates()[0];
        let dl = dtr.debug_latch_for_gate(gate.lhs);

        let mut solver = SatAdaptor::default();
        solver.add_clauses(&dtr.unroll(1));
        // dl = 0: gate behaves normally, so lhs & ~rhs0 is inconsistent.
        assert!(!solver.solve(&[negate(dl), gate.lhs, negate(gate.rhs0)]));
    }

    #[test]
    fn test_active_latch_frees_gate() {
        let (_, tr) = and_gate_tr();
        let dtr = DebugTransitionRelation::new(&tr);
        let gate = tr.gates()[0];
        let dl = dtr.debug_latch_for_gate(gate.lhs);
        let di = dtr.debug_ppi_for_gate(gate.lhs);

        let mut solver = SatAdaptor::default();
        solver.add_clauses(&dtr.unroll(1));
        // dl = 1: the output follows the debug input regardless of rhs.
        assert!(solver.solve(&[dl, gate.lhs, negate(gate.rhs0), negate(gate.rhs1)]));
        assert!(!solver.solve(&[dl, gate.lhs, negate(di)]));
    }

    #[test]
    fn test_init_state_leaves_debug_latches_free() {
        let (_, tr) = and_gate_tr();
        let dtr = DebugTransitionRelation::new(&tr);
        let dl = dtr.debug_latches()[0];
        for cls in dtr.init_state() {
            assert!(cls.iter().all(|&l| strip(l) != dl));
        }
    }
}
