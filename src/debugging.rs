//! Cardinality-bounded fault localization over the debug transition
//! relation, driven by IC3, BMC, or both.
//!
//! A debugging solution is a set of gates whose debug latches can be
//! activated (within the cardinality bound) so that the property is
//! violated.
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::bmc::BmcSolver;
use crate::cardinality::{
    CardinalityConstraint, SortingCardinalityConstraint, TotalizerCardinalityConstraint,
};
use crate::debug_tr::DebugTransitionRelation;
use crate::ic3::solver::Ic3Solver;
use crate::ic3::{LemmaId, LEVEL_INF};
use crate::options::Gs;
use crate::safety::SafetyCounterExample;
use crate::types::*;
use crate::vars::VariableManager;

/// `(found, gates)`.
pub type DebugResult = (bool, Vec<Id>);

pub trait Debugger {
    fn set_cardinality(&mut self, n: u32);
    fn clear_cardinality(&mut self);
    fn debug(&mut self) -> DebugResult;
    /// Constrain every debug latch outside `gates` to zero.
    fn debug_over_gates(&mut self, gates: &[Id]) -> DebugResult;
    fn block_solution(&mut self, soln: &[Id]);

    fn debug_and_block(&mut self) -> DebugResult {
        let result = self.debug();
        if result.0 {
            self.block_solution(&result.1);
        }
        result
    }

    fn debug_and_block_over_gates(&mut self, gates: &[Id]) -> DebugResult {
        let result = self.debug_over_gates(gates);
        if result.0 {
            self.block_solution(&result.1);
        }
        result
    }
}

fn extract_solution(tr: &DebugTransitionRelation, cex: &SafetyCounterExample) -> Vec<Id> {
    assert!(!cex.is_empty());
    let mut soln = Vec::new();
    for &latch in &cex[0].state {
        if is_negated(latch) {
            continue;
        }
        if tr.is_debug_latch(latch) {
            soln.push(tr.gate_for_debug_latch(latch));
        }
    }
    soln.sort_unstable();
    soln
}

fn only_these_latches(tr: &DebugTransitionRelation, gates: &[Id]) -> Vec<Id> {
    let allowed: BTreeSet<Id> = gates.iter().map(|&g| tr.debug_latch_for_gate(g)).collect();
    tr.debug_latches()
        .iter()
        .copied()
        .filter(|dl| !allowed.contains(dl))
        .map(negate)
        .collect()
}

//
// IC3-based debugger
//

pub struct Ic3Debugger {
    debug_tr: Rc<DebugTransitionRelation>,
    ic3: Ic3Solver<DebugTransitionRelation>,
    cardinality: Option<u32>,
    constraint: SortingCardinalityConstraint,
    blocking_clauses: ClauseVec,
}

impl Ic3Debugger {
    pub fn new(vars: &VariableManager, tr: Rc<DebugTransitionRelation>, gs: &Gs) -> Self {
        let mut constraint = SortingCardinalityConstraint::new(vars);
        for &dl in tr.debug_latches() {
            constraint.add_input(dl);
        }
        Ic3Debugger {
            ic3: Ic3Solver::new(vars, tr.clone(), gs),
            debug_tr: tr,
            cardinality: None,
            constraint,
            blocking_clauses: ClauseVec::new(),
        }
    }

    fn setup_initial_states(&mut self) {
        self.ic3.clear_restrictions();
        if let Some(n) = self.cardinality {
            self.add_cardinality_cnf(n);
        }
        self.add_blocking_clauses();
    }

    fn add_cardinality_cnf(&mut self, n: u32) {
        // Width n+1 is needed to assume <= n.
        self.constraint.set_cardinality(n + 1);
        self.constraint.clear_incrementality();
        let cnf = self.constraint.cnfize();
        for cls in &cnf {
            self.ic3.restrict_initial_states(cls);
        }
        for lit in self.constraint.assume_leq(n) {
            self.ic3.restrict_initial_states(&vec![lit]);
        }
    }

    fn add_blocking_clauses(&mut self) {
        let clauses = self.blocking_clauses.clone();
        for cls in &clauses {
            self.ic3.restrict_initial_states(cls);
            self.ic3.add_clausal_lemma(cls, LEVEL_INF);
        }
    }

    fn run(&mut self) -> DebugResult {
        let result = self.ic3.prove();
        if result.safe() {
            (false, Vec::new())
        } else {
            debug_assert!(result.is_unsafe());
            (true, extract_solution(&self.debug_tr, &result.cex))
        }
    }

    pub fn add_lemma(&mut self, c: &Cube, level: u32) -> LemmaId {
        self.ic3.add_lemma(c, level)
    }

    pub fn frame_cubes(&self, n: u32) -> Vec<Cube> {
        self.ic3.frame_cubes(n)
    }

    pub fn num_frames(&self) -> usize {
        self.ic3.num_frames()
    }
}

impl Debugger for Ic3Debugger {
    fn set_cardinality(&mut self, n: u32) {
        if self.cardinality == Some(n) {
            return;
        }
        let old = self.cardinality;
        self.cardinality = Some(n);
        self.setup_initial_states();
        match old {
            // More activations allowed than before: lemmas may be invalid.
            Some(o) if o < n => self.ic3.initial_states_expanded(),
            // Tightening (or coming from unlimited) keeps lemmas valid.
            _ => self.ic3.initial_states_restricted(),
        }
    }

    fn clear_cardinality(&mut self) {
        self.ic3.clear_restrictions();
        self.add_blocking_clauses();
        if self.cardinality.is_some() {
            self.ic3.initial_states_expanded();
        }
        self.cardinality = None;
    }

    fn debug(&mut self) -> DebugResult {
        self.run()
    }

    fn debug_over_gates(&mut self, gates: &[Id]) -> DebugResult {
        let restrict: ClauseVec = only_these_latches(&self.debug_tr, gates)
            .into_iter()
            .map(|lit| vec![lit])
            .collect();
        self.ic3.restrict_initial_states_all(&restrict);
        // Valid until the next initial-states expansion takes it away.
        self.ic3.add_clausal_lemmas(&restrict, LEVEL_INF);
        self.ic3.initial_states_restricted();

        let result = self.run();

        self.setup_initial_states();
        self.ic3.initial_states_expanded();

        result
    }

    fn block_solution(&mut self, soln: &[Id]) {
        let block: Clause = soln
            .iter()
            .map(|&g| negate(self.debug_tr.debug_latch_for_gate(g)))
            .collect();
        self.blocking_clauses.push(block.clone());
        self.ic3.restrict_initial_states(&block);
        self.ic3.add_clausal_lemma(&block, LEVEL_INF);
        self.ic3.initial_states_restricted();
    }
}

//
// BMC-based debugger
//

pub struct BmcDebugger {
    debug_tr: Rc<DebugTransitionRelation>,
    solver: BmcSolver<DebugTransitionRelation>,
    k_max: u32,
    cardinality: Option<u32>,
    constraint: TotalizerCardinalityConstraint,
}

impl BmcDebugger {
    pub fn new(vars: &VariableManager, tr: Rc<DebugTransitionRelation>, gs: &Gs) -> Self {
        let mut constraint = TotalizerCardinalityConstraint::new(vars);
        for &dl in tr.debug_latches() {
            constraint.add_input(dl);
        }
        BmcDebugger {
            solver: BmcSolver::new(vars, tr.clone(), gs),
            debug_tr: tr,
            k_max: 4,
            cardinality: None,
            constraint,
        }
    }

    pub fn set_k_max(&mut self, k: u32) {
        self.k_max = k;
    }

    pub fn debug_at_k(&mut self, k: u32) -> DebugResult {
        self.debug_with_assumps(&[], k, k)
    }

    pub fn debug_range(&mut self, k_min: u32, k_max: u32) -> DebugResult {
        self.debug_with_assumps(&[], k_min, k_max)
    }

    pub fn debug_over_gates_at_k(&mut self, gates: &[Id], k: u32) -> DebugResult {
        let assumps = only_these_latches(&self.debug_tr, gates);
        self.debug_with_assumps(&assumps, k, k)
    }

    pub fn debug_over_gates_range(&mut self, gates: &[Id], k_min: u32, k_max: u32) -> DebugResult {
        let assumps = only_these_latches(&self.debug_tr, gates);
        self.debug_with_assumps(&assumps, k_min, k_max)
    }

    pub fn debug_at_k_and_block(&mut self, k: u32) -> DebugResult {
        let result = self.debug_at_k(k);
        if result.0 {
            self.block_solution(&result.1);
        }
        result
    }

    pub fn debug_range_and_block(&mut self, k_min: u32, k_max: u32) -> DebugResult {
        let result = self.debug_range(k_min, k_max);
        if result.0 {
            self.block_solution(&result.1);
        }
        result
    }

    pub fn debug_over_gates_range_and_block(
        &mut self,
        gates: &[Id],
        k_min: u32,
        k_max: u32,
    ) -> DebugResult {
        let result = self.debug_over_gates_range(gates, k_min, k_max);
        if result.0 {
            self.block_solution(&result.1);
        }
        result
    }

    fn debug_with_assumps(&mut self, assumps: &[Id], k_min: u32, k_max: u32) -> DebugResult {
        let mut local = assumps.to_vec();
        if let Some(n) = self.cardinality {
            local.extend(self.constraint.assume_leq(n));
        }

        let bmc = self.solver.solve_range(k_min, k_max, &local);
        if bmc.is_unsafe() {
            (true, extract_solution(&self.debug_tr, &bmc.cex))
        } else {
            (false, Vec::new())
        }
    }
}

impl Debugger for BmcDebugger {
    fn set_cardinality(&mut self, n: u32) {
        self.cardinality = Some(n);
        // Width n+1 so <= n is assumable; only the new clauses are sent.
        self.constraint.set_cardinality(n + 1);
        let cnf = self.constraint.incremental_cnfize();
        self.solver.restrict_initial_states_all(&cnf);
    }

    fn clear_cardinality(&mut self) {
        self.cardinality = None;
    }

    fn debug(&mut self) -> DebugResult {
        self.debug_range(0, self.k_max)
    }

    fn debug_over_gates(&mut self, gates: &[Id]) -> DebugResult {
        let assumps = only_these_latches(&self.debug_tr, gates);
        self.debug_with_assumps(&assumps, 0, self.k_max)
    }

    fn block_solution(&mut self, soln: &[Id]) {
        let block: Clause = soln
            .iter()
            .map(|&g| negate(self.debug_tr.debug_latch_for_gate(g)))
            .collect();
        self.solver.restrict_initial_states(&block);
    }
}

//
// Hybrid debugger
//

pub struct HybridDebugger {
    bmc: BmcDebugger,
    ic3: Ic3Debugger,
    k_max: u32,
}

impl HybridDebugger {
    pub fn new(vars: &VariableManager, tr: Rc<DebugTransitionRelation>, gs: &Gs) -> Self {
        let mut hybrid = HybridDebugger {
            bmc: BmcDebugger::new(vars, tr.clone(), gs),
            ic3: Ic3Debugger::new(vars, tr, gs),
            k_max: 0,
        };
        hybrid.set_k_max(gs.opts.hybrid_debug_bmc_frames);
        hybrid
    }

    pub fn set_k_max(&mut self, k: u32) {
        self.k_max = k;
        self.bmc.set_k_max(k);
    }

    pub fn add_lemma(&mut self, c: &Cube, level: u32) -> LemmaId {
        self.ic3.add_lemma(c, level)
    }

    pub fn frame_cubes(&self, n: u32) -> Vec<Cube> {
        self.ic3.frame_cubes(n)
    }

    pub fn num_frames(&self) -> usize {
        self.ic3.num_frames()
    }
}

impl Debugger for HybridDebugger {
    fn set_cardinality(&mut self, n: u32) {
        self.bmc.set_cardinality(n);
        self.ic3.set_cardinality(n);
    }

    fn clear_cardinality(&mut self) {
        self.bmc.clear_cardinality();
        self.ic3.clear_cardinality();
    }

    fn debug(&mut self) -> DebugResult {
        if self.k_max > 0 {
            let result = self.bmc.debug();
            if result.0 {
                return result;
            }
        }
        self.ic3.debug()
    }

    fn debug_over_gates(&mut self, gates: &[Id]) -> DebugResult {
        if self.k_max > 0 {
            let result = self.bmc.debug_over_gates(gates);
            if result.0 {
                return result;
            }
        }
        self.ic3.debug_over_gates(gates)
    }

    fn block_solution(&mut self, soln: &[Id]) {
        self.bmc.block_solution(soln);
        self.ic3.block_solution(soln);
    }
}
