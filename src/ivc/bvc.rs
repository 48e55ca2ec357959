//! Bounded validity cores: per-depth abstraction solving with
//! correction-set refinement.
//!
//! A BVC frame solver works at a fixed number of abstracted prefix frames:
//! the prefix unrolls the current gate abstraction from the initial
//! states, the final two frames are concrete. The `n = 0` solver finds
//! concrete predecessors; the `n > 0` solver finds cardinality-bounded
//! correction sets over the debug latches.
use std::cmp::Reverse;
use std::collections::{BinaryHeap, BTreeSet};
use std::rc::Rc;

use super::{Bvc, Ivc};
use crate::adaptor::{ClauseDedupSatAdaptor, SatAdaptor};
use crate::cardinality::{CardinalityConstraint, SortingCardinalityConstraint};
use crate::clog;
use crate::debug_tr::DebugTransitionRelation;
use crate::logger::LogChannel;
use crate::maxsat::HittingSetSolver;
use crate::mcs::{ApproximateMcsFinder, CorrectionSet, McsFinder};
use crate::options::Gs;
use crate::safety::{
    HybridSafetyChecker, SafetyAnswer, SafetyCounterExample, SafetyProof, SafetyResult, Step,
};
use crate::sat::SatValue;
use crate::tr::{TransitionRelation, TransitionSystem};
use crate::types::*;
use crate::vars::VariableManager;

pub type BvcSolution = Vec<Id>;
pub type BvcPredecessor = Cube;

const CARDINALITY_INF: u32 = u32::MAX;

#[derive(Debug, Default)]
pub struct BvcBlockResult {
    pub sat: bool,
    pub solution: BvcSolution,
    pub predecessor: BvcPredecessor,
    pub state: Cube,
    pub inputs: Cube,
    pub pinputs: Cube,
}

pub struct BvcFrameSolver {
    vars: VariableManager,
    tr: Rc<TransitionRelation>,
    debug_tr: Rc<DebugTransitionRelation>,
    cardinality_constraint: SortingCardinalityConstraint,
    solver0_inited: bool,
    solver_n_inited: bool,
    solver0: ClauseDedupSatAdaptor,
    solver_n: ClauseDedupSatAdaptor,
    abstraction_gates: BTreeSet<Id>,
    blocked_solutions: Vec<BvcSolution>,
    abstraction_frames: u64,
}

impl BvcFrameSolver {
    pub fn new(
        vars: &VariableManager,
        tr: Rc<TransitionRelation>,
        debug_tr: Rc<DebugTransitionRelation>,
        abstraction_frames: u64,
    ) -> Self {
        let mut cardinality_constraint = SortingCardinalityConstraint::new(vars);
        for &dl in debug_tr.debug_latches() {
            cardinality_constraint.add_input(dl);
        }
        BvcFrameSolver {
            vars: vars.clone(),
            tr,
            debug_tr,
            cardinality_constraint,
            solver0_inited: false,
            solver_n_inited: false,
            solver0: ClauseDedupSatAdaptor::default(),
            solver_n: ClauseDedupSatAdaptor::default(),
            abstraction_gates: BTreeSet::new(),
            blocked_solutions: Vec::new(),
            abstraction_frames,
        }
    }

    pub fn set_abstraction(&mut self, gates: &BTreeSet<Id>) {
        // A growing abstraction can be sent incrementally; anything else
        // restarts the solvers.
        let is_superset = gates.is_superset(&self.abstraction_gates);
        let changed = *gates != self.abstraction_gates;
        self.abstraction_gates = gates.clone();

        if !changed {
            return;
        }
        if is_superset && !gates.is_empty() && self.abstraction_frames > 0 {
            if self.solver0_inited {
                let cnf = self.abstraction_cnf();
                self.solver0.add_clauses(&cnf);
            }
            if self.solver_n_inited {
                let cnf = self.abstraction_cnf();
                self.solver_n.add_clauses(&cnf);
            }
        } else {
            self.solver0_inited = false;
            self.solver_n_inited = false;
        }
    }

    fn abstraction_cnf(&self) -> ClauseVec {
        debug_assert!(!self.abstraction_gates.is_empty());
        let gates: Vec<Id> = self.abstraction_gates.iter().copied().collect();
        let abs_tr = TransitionRelation::abstracted(&self.tr, &gates);
        let mut cnf = ClauseVec::new();
        for i in 0..self.abstraction_frames {
            cnf.extend(abs_tr.unroll_frame(i));
        }
        cnf.extend(abs_tr.init_state());
        cnf
    }

    fn init_solver0(&mut self) {
        self.solver0.reset();

        if self.abstraction_frames == 0 {
            let init = self.tr.init_state();
            self.solver0.add_clauses(&init);
        } else {
            let cnf = self.abstraction_cnf();
            self.solver0.add_clauses(&cnf);
        }

        // The final concrete frame and its successor.
        let f0 = self.tr.unroll_frame(self.abstraction_frames);
        let f1 = self.tr.unroll_frame(self.abstraction_frames + 1);
        self.solver0.add_clauses(&f0);
        self.solver0.add_clauses(&f1);

        self.solver0_inited = true;
    }

    fn init_solver_n(&mut self) {
        self.solver_n.reset();

        if self.abstraction_frames == 0 {
            let init = self.debug_tr.init_state();
            self.solver_n.add_clauses(&init);
        } else {
            let cnf = self.abstraction_cnf();
            self.solver_n.add_clauses(&cnf);

            // The debug latches are constant through the abstract prefix,
            // so the cardinality constraint over their frame-0 values
            // carries to the concrete suffix.
            for &dl in self.debug_tr.debug_latches() {
                for i in 0..self.abstraction_frames {
                    let now = prime_n(dl, i);
                    let next = prime_n(dl, i + 1);
                    self.solver_n.add_clause(&vec![negate(next), now]);
                    self.solver_n.add_clause(&vec![next, negate(now)]);
                }
            }
        }

        let f0 = self.debug_tr.unroll_frame(self.abstraction_frames);
        let f1 = self.debug_tr.unroll_frame(self.abstraction_frames + 1);
        self.solver_n.add_clauses(&f0);
        self.solver_n.add_clauses(&f1);

        // Known solutions only constrain the solution solver; the
        // predecessor solver must still see the blocked behaviors.
        let blocked = self.blocked_solutions.clone();
        for soln in &blocked {
            let cls = self.blocking_clause(soln);
            self.solver_n.add_clause(&cls);
        }

        self.solver_n_inited = true;
    }

    fn init_cardinality(&mut self, n: u32) {
        // Width n+1 so <= n is assumable.
        self.cardinality_constraint.set_cardinality(n + 1);
        let cnf = self.cardinality_constraint.cnfize();
        self.solver_n.add_clauses(&cnf);
    }

    pub fn predecessor_exists(&mut self, target: &Cube) -> bool {
        self.solve(0, target, true).sat
    }

    pub fn solution_exists(&mut self, target: &Cube) -> bool {
        self.solve(CARDINALITY_INF, target, true).sat
    }

    pub fn solution_exists_unprimed(&mut self, target: &Cube) -> bool {
        self.solve(CARDINALITY_INF, target, false).sat
    }

    pub fn solve_primed(&mut self, n: u32, target: &Cube) -> BvcBlockResult {
        self.solve(n, target, true)
    }

    pub fn solve_unprimed(&mut self, n: u32, target: &Cube) -> BvcBlockResult {
        self.solve(n, target, false)
    }

    fn solve(&mut self, n: u32, target: &Cube, primed: bool) -> BvcBlockResult {
        if n == 0 && !self.solver0_inited {
            self.init_solver0();
        }
        if n > 0 && !self.solver_n_inited {
            self.init_solver_n();
        }

        // The target sits at the last frame (primed once beyond it when
        // asked for a predecessor query).
        let shift = if primed {
            self.abstraction_frames + 1
        } else {
            self.abstraction_frames
        };
        let mut assumps = prime_vec_n(target, shift);

        if n > 0 && n != CARDINALITY_INF {
            let c = (n as usize).min(self.debug_tr.num_suspects()) as u32;
            self.init_cardinality(c);
            assumps.extend(self.cardinality_constraint.assume_leq(c));
        }

        let solver = if n == 0 {
            &mut self.solver0
        } else {
            &mut self.solver_n
        };
        let sat = solver.solve(&assumps);

        if sat && n == 0 {
            let pred = self.extract_latches();
            let mut result = BvcBlockResult {
                sat: true,
                predecessor: pred.clone(),
                state: pred,
                ..BvcBlockResult::default()
            };
            result.inputs = self.extract_inputs(0);
            result.pinputs = self.extract_inputs(1);
            result
        } else if sat {
            BvcBlockResult {
                sat: true,
                solution: self.extract_solution(),
                ..BvcBlockResult::default()
            }
        } else {
            BvcBlockResult::default()
        }
    }

    fn extract(&self, solver: &SatAdaptor, vars: &[Id], shift: u64) -> Cube {
        let mut cube = Cube::new();
        for &v in vars {
            match solver.safe_get_assignment_to_var(prime_n(v, shift)) {
                SatValue::True => cube.push(v),
                SatValue::False => cube.push(negate(v)),
                SatValue::Undef => {}
            }
        }
        cube.sort_unstable();
        cube
    }

    fn extract_latches(&self) -> Cube {
        self.extract(&self.solver0, self.tr.latches(), self.abstraction_frames)
    }

    fn extract_inputs(&self, ahead: u64) -> Cube {
        self.extract(
            &self.solver0,
            self.tr.inputs(),
            self.abstraction_frames + ahead,
        )
    }

    fn extract_solution(&self) -> BvcSolution {
        let mut soln = BvcSolution::new();
        for &dl in self.debug_tr.debug_latches() {
            let pdl = prime_n(dl, self.abstraction_frames);
            if self.solver_n.safe_get_assignment_to_var(pdl) == SatValue::True {
                soln.push(self.debug_tr.gate_for_debug_latch(dl));
            }
        }
        soln.sort_unstable();
        soln
    }

    fn blocking_clause(&self, soln: &BvcSolution) -> Clause {
        soln.iter()
            .map(|&g| {
                let dl = self.debug_tr.debug_latch_for_gate(g);
                negate(prime_n(dl, self.abstraction_frames))
            })
            .collect()
    }

    pub fn block_solution(&mut self, soln: &BvcSolution) {
        self.blocked_solutions.push(soln.clone());
        if self.solver_n_inited {
            let cls = self.blocking_clause(soln);
            self.solver_n.add_clause(&cls);
        }
    }
}

//
// BVC solver proper
//

#[derive(Debug, Clone)]
struct BvcObligation {
    cti: Cube,
    level: u32,
    parent: Option<usize>,
    state: Cube,
    inputs: Cube,
}

type ObKey = Reverse<(u32, usize, Cube, usize)>;

fn key_of(obl: &BvcObligation, idx: usize) -> ObKey {
    Reverse((obl.level, obl.cti.len(), obl.cti.clone(), idx))
}

#[derive(Debug, Default)]
pub struct BvcResult {
    pub safety: SafetyResult,
    pub abstraction: Ivc,
}

pub struct BvcSolver {
    vars: VariableManager,
    gs: Gs,
    tr: Rc<TransitionRelation>,
    debug_tr: Rc<DebugTransitionRelation>,
    hs_solver: HittingSetSolver,
    mcs_finder: McsFinder,
    approx_mcs_finder: ApproximateMcsFinder,
    lift: SatAdaptor,
    solvers: Vec<BvcFrameSolver>,
    abstraction_gates: BTreeSet<Id>,
    solutions: Vec<BvcSolution>,
    obls: Vec<BvcObligation>,
    bvcs: Vec<Bvc>,
}

impl BvcSolver {
    pub fn new(vars: &VariableManager, tr: Rc<TransitionRelation>, gs: &Gs) -> Self {
        let debug_tr = Rc::new(DebugTransitionRelation::new(&tr));
        let mut lift = SatAdaptor::default();
        lift.add_clauses(&tr.unroll(2));
        BvcSolver {
            vars: vars.clone(),
            gs: gs.clone(),
            hs_solver: HittingSetSolver::new(vars, &tr.gate_ids()),
            mcs_finder: McsFinder::new(vars, debug_tr.clone(), gs),
            approx_mcs_finder: ApproximateMcsFinder::new(vars, debug_tr.clone(), gs),
            tr,
            debug_tr,
            lift,
            solvers: Vec::new(),
            abstraction_gates: BTreeSet::new(),
            solutions: Vec::new(),
            obls: Vec::new(),
            bvcs: Vec::new(),
        }
    }

    pub fn abstraction(&self) -> Ivc {
        self.abstraction_gates.iter().copied().collect()
    }

    pub fn bvcs(&self) -> &[Bvc] {
        &self.bvcs
    }

    pub fn prove(&mut self) -> BvcResult {
        self.find_upfront();

        let bad = vec![self.tr.bad()];
        let mut level = 0u32;

        loop {
            if let Some(proof) = self.check_abstraction() {
                return self.safe_result(proof);
            }
            if level > self.gs.opts.cbvc_max_level {
                return BvcResult::default();
            }

            clog!(self.gs, LogChannel::Cbvc, 3, "level {}", level);
            self.clear_obligation_pool();
            match self.recursive_block(&bad, level) {
                Some(cex_obl) => {
                    let cex = self.build_cex(cex_obl);
                    return self.counter_example_result(cex);
                }
                None => {
                    let bvc = self.abstraction();
                    clog!(
                        self.gs,
                        LogChannel::Cbvc,
                        2,
                        "BVC of size {} at {}",
                        bvc.len(),
                        level
                    );
                    self.bvcs.push(bvc);
                }
            }
            level += 1;
        }
    }

    fn find_upfront(&mut self) {
        let n_max = self.gs.opts.cbvc_upfront_nmax;
        for n in 1..=n_max {
            loop {
                let (found, corr) = if self.gs.opts.cbvc_upfront_approx_mcs {
                    self.approx_mcs_finder.find_and_block_with_bmc(n)
                } else {
                    self.mcs_finder.set_cardinality(n);
                    self.mcs_finder.find_and_block()
                };
                if !found {
                    break;
                }
                if corr.is_empty() {
                    clog!(self.gs, LogChannel::Cbvc, 3, "found unsafe early");
                    break;
                }
                clog!(self.gs, LogChannel::Cbvc, 3, "upfront MCS of size {}", corr.len());
                self.block_solution(&corr);
                self.refine_abstraction(&corr);
            }
        }
    }

    fn recursive_block(&mut self, target: &Cube, target_level: u32) -> Option<usize> {
        let mut q: BinaryHeap<ObKey> = BinaryHeap::new();
        let root = self.new_obligation(sort_cube(target), target_level, None);
        q.push(key_of(&self.obls[root], root));

        while let Some(Reverse((_, _, _, idx))) = q.pop() {
            let (s, level) = {
                let obl = &self.obls[idx];
                (obl.cti.clone(), obl.level)
            };
            debug_assert!(s.windows(2).all(|w| w[0] <= w[1]));

            let br = self.block(&s, level);

            if br.sat && !br.predecessor.is_empty() {
                self.obls[idx].state = br.state;
                self.obls[idx].inputs = br.inputs.clone();

                if level == 0 {
                    return Some(idx);
                }

                let pred = self.lift_pred(&br.predecessor, &s, &br.inputs, &br.pinputs);
                q.push(key_of(&self.obls[idx], idx));
                let child = self.new_obligation(pred, level - 1, Some(idx));
                q.push(key_of(&self.obls[child], child));
            } else if br.sat {
                // Correction set found: block, refine, retry.
                debug_assert!(!br.solution.is_empty());
                self.block_solution(&br.solution);
                self.refine_abstraction(&br.solution);
                q.push(key_of(&self.obls[idx], idx));
                clog!(
                    self.gs,
                    LogChannel::Cbvc,
                    4,
                    "at {}: correction set of {} gates",
                    level,
                    br.solution.len()
                );
            }
            // Otherwise the obligation is discharged.
        }

        None
    }

    fn block(&mut self, target: &Cube, level: u32) -> BvcBlockResult {
        let num_gates = self.tr.num_gates() as u32;

        // Level 0 asks whether the target is an initial state (n = 0) or
        // can be made one by a correction set (n > 0); the target sits
        // unprimed at the final frame.
        let primed = level != 0;
        let frame_idx = if level == 0 { 0 } else { level - 1 };
        let abstraction = self.abstraction_gates.clone();
        let solutions = self.solutions.clone();
        let solver = Self::frame_solver(
            &mut self.solvers,
            &self.vars,
            &self.tr,
            &self.debug_tr,
            frame_idx as u64,
            &abstraction,
            &solutions,
        );

        let exists = if primed {
            solver.solution_exists(target)
        } else {
            solver.solution_exists_unprimed(target)
        };
        if !exists {
            return BvcBlockResult::default();
        }

        for n in 0..=num_gates {
            let result = if primed {
                solver.solve_primed(n, target)
            } else {
                solver.solve_unprimed(n, target)
            };
            if result.sat {
                return result;
            }
        }

        unreachable!("a solution exists but was not found at any cardinality");
    }

    fn frame_solver<'a>(
        solvers: &'a mut Vec<BvcFrameSolver>,
        vars: &VariableManager,
        tr: &Rc<TransitionRelation>,
        debug_tr: &Rc<DebugTransitionRelation>,
        abstraction_frames: u64,
        abstraction: &BTreeSet<Id>,
        solutions: &[BvcSolution],
    ) -> &'a mut BvcFrameSolver {
        while solvers.len() <= abstraction_frames as usize {
            let mut solver = BvcFrameSolver::new(
                vars,
                tr.clone(),
                debug_tr.clone(),
                solvers.len() as u64,
            );
            for soln in solutions {
                solver.block_solution(soln);
            }
            solvers.push(solver);
        }
        let solver = &mut solvers[abstraction_frames as usize];
        solver.set_abstraction(abstraction);
        solver
    }

    fn lift_pred(&mut self, pred: &Cube, succ: &Cube, inp: &Cube, pinp: &Cube) -> Cube {
        if !self.gs.opts.cbvc_lift || pred.len() == 1 {
            return pred.to_vec();
        }

        let pinp_p = prime_vec(pinp);
        let negsucc_p = negate_vec(&prime_vec(succ));

        let mut assumps = Cube::new();
        assumps.extend_from_slice(pred);
        assumps.extend_from_slice(inp);
        assumps.extend_from_slice(&pinp_p);

        let mut crits = Cube::new();
        let sat = if succ.len() == 1 {
            assumps.push(negsucc_p[0]);
            self.lift.solve_with_crits(&assumps, &mut crits)
        } else {
            let gid = self.lift.create_group();
            self.lift.add_group_clause(gid, &negsucc_p);
            self.lift.group_solve_with_crits(gid, &assumps, &mut crits)
        };
        assert!(!sat, "lift query must be UNSAT");

        crits.sort_unstable();
        let mut lifted: Cube = pred
            .iter()
            .copied()
            .filter(|l| crits.binary_search(l).is_ok())
            .collect();
        if lifted.is_empty() {
            lifted = pred.to_vec();
        }
        lifted
    }

    fn check_abstraction(&mut self) -> Option<SafetyProof> {
        let gates = self.abstraction();
        let abs_tr = Rc::new(TransitionRelation::abstracted(&self.tr, &gates));
        let mut checker = HybridSafetyChecker::new(&self.vars, abs_tr, &self.gs);
        let result = checker.prove();
        debug_assert!(!result.unknown());
        if result.safe() {
            Some(result.proof)
        } else {
            None
        }
    }

    fn refine_abstraction(&mut self, correction_set: &CorrectionSet) {
        self.hs_solver.add_set(correction_set);
        let abstraction = self
            .hs_solver
            .solve()
            .expect("hitting-set instance must stay satisfiable");
        debug_assert!(!abstraction.is_empty());
        self.abstraction_gates = abstraction.into_iter().collect();
    }

    fn block_solution(&mut self, soln: &BvcSolution) {
        self.solutions.push(soln.clone());
        for solver in self.solvers.iter_mut() {
            solver.block_solution(soln);
        }
    }

    fn new_obligation(&mut self, cti: Cube, level: u32, parent: Option<usize>) -> usize {
        self.obls.push(BvcObligation {
            cti,
            level,
            parent,
            state: Cube::new(),
            inputs: Cube::new(),
        });
        self.obls.len() - 1
    }

    fn clear_obligation_pool(&mut self) {
        self.obls.clear();
    }

    fn build_cex(&self, obl: usize) -> SafetyCounterExample {
        let mut cex = SafetyCounterExample::new();
        let mut current = Some(obl);
        while let Some(idx) = current {
            let o = &self.obls[idx];
            cex.push(Step::new(sort_cube(&o.inputs), sort_cube(&o.state)));
            current = o.parent;
        }
        cex
    }

    fn counter_example_result(&self, cex: SafetyCounterExample) -> BvcResult {
        let mut result = BvcResult::default();
        result.safety.result = SafetyAnswer::Unsafe;
        result.safety.cex = cex;
        result
    }

    fn safe_result(&self, proof: SafetyProof) -> BvcResult {
        let mut result = BvcResult::default();
        result.safety.result = SafetyAnswer::Safe;
        result.safety.proof = proof;
        result.abstraction = self.abstraction();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aig::{Aig, AigAnd, AigLatch, AigReset};
    use crate::options::GlobalState;

    #[test]
    fn test_bvc_safe_circuit() {
        // bad = l & l via gate 6; gate 8 dangles. The final abstraction is
        // exactly the needed gate.
        let mut aig = Aig::new();
        aig.inputs = vec![2];
        aig.latches = vec![AigLatch::new(4, 4, AigReset::Zero)];
        aig.ands = vec![AigAnd::new(6, 4, 4), AigAnd::new(8, 2, 4)];
        aig.outputs = vec![6];
        let vars = VariableManager::new();
        let tr = Rc::new(TransitionRelation::new(&vars, &aig).unwrap());
        let gs = GlobalState::shared();

        let mut solver = BvcSolver::new(&vars, tr.clone(), &gs);
        let result = solver.prove();
        assert!(result.safety.safe());
        let needed = tr.vars().to_internal(6).unwrap();
        assert_eq!(result.abstraction, vec![needed]);
    }

    #[test]
    fn test_bvc_unsafe_circuit() {
        // bad = i & l where the latch loads the input: reachable in two
        // steps.
        let mut aig = Aig::new();
        aig.inputs = vec![2];
        aig.latches = vec![AigLatch::new(4, 2, AigReset::Zero)];
        aig.ands = vec![AigAnd::new(6, 2, 4)];
        aig.outputs = vec![6];
        let vars = VariableManager::new();
        let tr = Rc::new(TransitionRelation::new(&vars, &aig).unwrap());
        let gs = GlobalState::shared();

        let mut solver = BvcSolver::new(&vars, tr.clone(), &gs);
        let result = solver.prove();
        assert!(result.safety.is_unsafe());
    }
}
