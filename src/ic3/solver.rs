//! Property directed reachability with priority-queue obligation
//! scheduling.
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;

use super::frame_solver::FrameSolver;
use super::lifter::UnsatCoreLifter;
use super::trace::InductiveTrace;
use super::{level_string, LemmaId, LEVEL_INF};
use crate::logger::LogChannel;
use crate::options::Gs;
use crate::safety::{SafetyAnswer, SafetyCounterExample, SafetyResult, Step};
use crate::tr::TransitionSystem;
use crate::types::*;
use crate::vars::VariableManager;

/// Obligations are arena-allocated; parent links reconstruct
/// counterexamples. The arena only grows while a `prove` call runs, so
/// indices stay stable while the queue holds them.
#[derive(Debug, Clone)]
pub struct ProofObligation {
    pub cti: Cube,
    pub level: u32,
    pub parent: Option<usize>,
    pub concrete_state: Cube,
    pub inputs: Cube,
    pub may_degree: u32,
}

impl ProofObligation {
    pub fn is_must(&self) -> bool {
        self.may_degree == 0
    }
}

/// Queue key: smallest level first, then smallest cube, then may degree,
/// then cube order for deterministic replay.
type ObKey = Reverse<(u32, usize, u32, Cube, usize)>;

fn key_of(obl: &ProofObligation, idx: usize) -> ObKey {
    Reverse((
        obl.level,
        obl.cti.len(),
        obl.may_degree,
        obl.cti.clone(),
        idx,
    ))
}

#[derive(Debug, Default)]
pub struct BlockResult {
    pub blocked: bool,
    pub level: u32,
    pub cti: Cube,
    pub concrete_state: Cube,
    pub inputs: Cube,
    pub primed_inputs: Cube,
}

pub struct Ic3Solver<T: TransitionSystem> {
    vars: VariableManager,
    gs: Gs,
    tr: Rc<T>,
    trace: Rc<RefCell<InductiveTrace>>,
    cons: FrameSolver<T>,
    lift: UnsatCoreLifter<T>,
    obls: Vec<ProofObligation>,
    init_constraints: Vec<Cube>,
}

impl<T: TransitionSystem> Ic3Solver<T> {
    pub fn new(vars: &VariableManager, tr: Rc<T>, gs: &Gs) -> Self {
        let trace = Rc::new(RefCell::new(InductiveTrace::new()));
        let mut solver = Ic3Solver {
            vars: vars.clone(),
            gs: gs.clone(),
            tr: tr.clone(),
            trace: trace.clone(),
            cons: FrameSolver::new(vars, tr.clone(), trace.clone(), gs),
            lift: UnsatCoreLifter::new(vars, tr, trace, gs),
            obls: Vec::new(),
            init_constraints: Vec::new(),
        };
        solver.initialize();
        solver
    }

    fn log(&self, v: i32, args: std::fmt::Arguments) {
        self.gs.logger.borrow().log(LogChannel::Ic3, v, args);
    }

    fn reset_sat(&mut self) {
        self.cons = FrameSolver::new(&self.vars, self.tr.clone(), self.trace.clone(), &self.gs);
        self.lift =
            UnsatCoreLifter::new(&self.vars, self.tr.clone(), self.trace.clone(), &self.gs);
    }

    fn initialize(&mut self) {
        // Initial states from the transition relation feed frame 0.
        let init = self.tr.init_state();
        {
            let mut trace = self.trace.borrow_mut();
            for cls in init {
                let cube = negate_vec(&cls);
                if !trace.lemma_is_active(&cube) {
                    trace.add_lemma(&cube, 0);
                }
            }
            // User-provided restrictions (e.g. blocked debugging solutions).
            for cube in &self.init_constraints {
                if !trace.lemma_is_active(cube) {
                    trace.add_lemma(cube, 0);
                }
            }
        }
        self.reset_sat();
    }

    /// The initial states grew: previously learned lemmas may be invalid.
    pub fn initial_states_expanded(&mut self) {
        self.trace.borrow_mut().clear();
        self.initialize();
    }

    /// The initial states shrank: learned lemmas stay valid.
    pub fn initial_states_restricted(&mut self) {
        self.initialize();
    }

    pub fn restrict_initial_states(&mut self, cls: &Clause) {
        assert!(!cls.is_empty());
        self.init_constraints.push(negate_vec(cls));
    }

    pub fn restrict_initial_states_all(&mut self, vec: &[Clause]) {
        for cls in vec {
            self.restrict_initial_states(cls);
        }
    }

    pub fn clear_restrictions(&mut self) {
        self.init_constraints.clear();
    }

    pub fn num_frames(&self) -> usize {
        self.trace.borrow().num_frames()
    }

    pub fn frame_cubes(&self, n: u32) -> Vec<Cube> {
        let trace = self.trace.borrow();
        if n != LEVEL_INF && n as usize >= trace.num_frames() {
            return Vec::new();
        }
        trace
            .frame(n)
            .iter()
            .map(|&id| trace.cube_of(id).clone())
            .collect()
    }

    pub fn prove(&mut self) -> SafetyResult {
        let target = vec![self.tr.tr().bad()];
        self.prove_target(&target)
    }

    pub fn prove_target(&mut self, target: &Cube) -> SafetyResult {
        let target = sort_cube(target);
        let mut result = SafetyResult::default();

        if let Some(cex) = self.check_initial(&target) {
            self.log(2, format_args!("trivial counterexample"));
            result.result = SafetyAnswer::Unsafe;
            result.cex = cex;
            return result;
        }

        let mut k = 1u32;
        while !self.is_safe(&target) {
            self.log(2, format_args!("level {}", k));
            match self.recursive_block(&target, k) {
                None => {
                    self.clear_obligation_pool();
                    self.push_lemmas();

                    let level = self.trace.borrow().level_of_cube(&target);
                    debug_assert!(level >= k);
                    if level == LEVEL_INF {
                        break;
                    }
                    k = level + 1;
                }
                Some(cex) => {
                    self.log(2, format_args!("counterexample of length {}", cex.len()));
                    result.result = SafetyAnswer::Unsafe;
                    result.cex = cex;
                    return result;
                }
            }
        }

        self.record_proof(&mut result);
        result.result = SafetyAnswer::Safe;
        result
    }

    fn record_proof(&self, result: &mut SafetyResult) {
        let trace = self.trace.borrow();
        for &id in trace.frame(LEVEL_INF) {
            result.proof.push(negate_vec(trace.cube_of(id)));
        }
    }

    fn check_initial(&mut self, target: &Cube) -> Option<SafetyCounterExample> {
        let (is_initial, state, inputs) = self.cons.intersection_full(0, target);
        if is_initial {
            Some(vec![Step::new(inputs, state)])
        } else {
            None
        }
    }

    fn is_safe(&mut self, target: &Cube) -> bool {
        {
            let trace = self.trace.borrow();
            if trace.lemma_is_active(target) && trace.level_of(trace.id_of(target)) == LEVEL_INF {
                return true;
            }
        }
        !self.cons.intersection(LEVEL_INF, target)
    }

    fn build_cex(&self, obl: usize) -> SafetyCounterExample {
        // An obligation's inputs are the ones reaching its parent's concrete
        // state. The root obligation has no parent; its inputs (if any) came
        // from the primed inputs of the query that produced its child, since
        // bad may be a function of inputs.
        let mut cex = SafetyCounterExample::new();
        let mut current = Some(obl);
        while let Some(idx) = current {
            let o = &self.obls[idx];
            cex.push(Step::new(sort_cube(&o.inputs), sort_cube(&o.concrete_state)));
            current = o.parent;
        }
        cex
    }

    fn new_obligation(
        &mut self,
        cti: Cube,
        level: u32,
        parent: Option<usize>,
        concrete_state: Cube,
        inputs: Cube,
    ) -> usize {
        debug_assert!(level < LEVEL_INF);
        self.obls.push(ProofObligation {
            cti,
            level,
            parent,
            concrete_state,
            inputs,
            may_degree: 0,
        });
        self.obls.len() - 1
    }

    fn clear_obligation_pool(&mut self) {
        self.obls.clear();
    }

    fn recursive_block(&mut self, target: &Cube, target_level: u32) -> Option<SafetyCounterExample> {
        let mut q: BinaryHeap<ObKey> = BinaryHeap::new();

        let root = self.new_obligation(target.clone(), target_level, None, Cube::new(), Cube::new());
        q.push(key_of(&self.obls[root], root));

        while let Some(Reverse((_, _, _, _, idx))) = q.pop() {
            let (s, level) = {
                let obl = &self.obls[idx];
                debug_assert!(obl.is_must());
                (obl.cti.clone(), obl.level)
            };
            debug_assert!(s.windows(2).all(|w| w[0] <= w[1]));
            debug_assert!(level < LEVEL_INF);

            if level == 0 {
                return Some(self.build_cex(idx));
            }

            if self.syntactic_block(&s, level) {
                continue;
            }

            let br = self.block(&s, level);
            if br.blocked {
                debug_assert!(br.level >= level);
                let g = br.level;
                self.add_lemma(&br.cti, g);
                if g < target_level {
                    self.obls[idx].level = g + 1;
                    q.push(key_of(&self.obls[idx], idx));
                }
            } else {
                let t = sort_cube(&br.cti);
                let child = self.new_obligation(
                    t,
                    level - 1,
                    Some(idx),
                    br.concrete_state,
                    br.inputs,
                );
                if self.obls[idx].inputs.is_empty() {
                    self.obls[idx].inputs = br.primed_inputs;
                }
                q.push(key_of(&self.obls[idx], idx));
                q.push(key_of(&self.obls[child], child));
            }
        }

        None
    }

    fn frame_blocks(&self, target: &Cube, level: u32) -> bool {
        let trace = self.trace.borrow();
        trace
            .frame(level)
            .iter()
            .any(|&id| subsumes(trace.cube_of(id), target))
    }

    fn syntactic_block(&self, target: &Cube, level: u32) -> bool {
        let num_frames = self.trace.borrow().num_frames() as u32;
        for k in level..num_frames {
            if self.frame_blocks(target, k) {
                return true;
            }
        }
        self.frame_blocks(target, LEVEL_INF)
    }

    fn block(&mut self, target: &Cube, level: u32) -> BlockResult {
        debug_assert!(level < LEVEL_INF);
        if level == 0 {
            return BlockResult::default();
        }

        let result = self.cons.consecution_full(level - 1, target);

        if result.inductive {
            let mut core = sort_cube(&result.core);
            self.initiate(&mut core, target);
            self.generalize(&mut core, level);
            debug_assert!(self.initiation(&core));

            BlockResult {
                blocked: true,
                level,
                cti: core,
                ..BlockResult::default()
            }
        } else {
            debug_assert!(!result.pred.is_empty());
            let lifted = self
                .lift
                .lift(&result.pred, target, &result.inputs, &result.pinputs);
            debug_assert!(!lifted.is_empty());
            BlockResult {
                blocked: false,
                level: 0,
                cti: lifted,
                concrete_state: result.pred,
                inputs: result.inputs,
                primed_inputs: result.pinputs,
            }
        }
    }

    /// Iterative literal dropping, the simpler strategy from PDR.
    fn generalize(&mut self, s: &mut Cube, level: u32) {
        debug_assert!(level > 0);
        s.sort_unstable();
        loop {
            let old_size = s.len();
            self.generalize_iteration(s, level);
            debug_assert!(s.len() <= old_size);
            if s.len() == old_size {
                return;
            }
        }
    }

    fn generalize_iteration(&mut self, s: &mut Cube, level: u32) {
        let k = if level == LEVEL_INF { level } else { level - 1 };

        let mut i = 0;
        while i < s.len() && s.len() > 1 {
            let lit = s[i];
            let mut s_copy = s.clone();
            s_copy.remove(i);

            if !self.initiation(&s_copy) {
                i += 1;
                continue;
            }

            let mut s_core = Cube::new();
            if self.cons.consecution_core(k, &s_copy, &mut s_core) {
                s_core.sort_unstable();
                // The core may have lost initiation; repair it against the
                // pre-drop cube.
                self.initiate(&mut s_core, s);
                *s = s_core;
                debug_assert!(s.windows(2).all(|w| w[0] <= w[1]));
                // Rescan from the first literal after the dropped one.
                i = s.partition_point(|&x| x <= lit);
            } else {
                i += 1;
            }
        }
    }

    fn initiate(&mut self, s: &mut Cube, orig: &Cube) {
        debug_assert!(s.windows(2).all(|w| w[0] <= w[1]));
        if !self.initiation(s) {
            *s = self.reinitiate(s, orig);
        }
        debug_assert!(self.initiation(s));
    }

    /// `s` is a subset of `orig` that intersects the initial states. Grow it
    /// back toward `orig`, keeping exactly the literals whose removal would
    /// make it initial again.
    pub(crate) fn reinitiate(&mut self, s: &Cube, orig: &Cube) -> Cube {
        debug_assert!(s.len() < orig.len());
        debug_assert!(s.windows(2).all(|w| w[0] <= w[1]));
        debug_assert!(orig.windows(2).all(|w| w[0] <= w[1]));
        debug_assert!(self.initiation(orig));

        let mut t = orig.clone();
        let mut s_i = 0usize;
        let mut t_i = 0usize;

        while t_i < t.len() {
            debug_assert!(s_i >= s.len() || t[t_i] <= s[s_i]);
            // Advance both cursors to the first disagreement.
            while s_i < s.len() && t_i < t.len() && s[s_i] == t[t_i] {
                s_i += 1;
                t_i += 1;
            }
            if t_i >= t.len() {
                break;
            }

            let lit = t[t_i];
            let mut t_copy = t.clone();
            t_copy.remove(t_i);

            if self.initiation(&t_copy) {
                t = t_copy;
                t_i = t.partition_point(|&x| x <= lit);
            } else {
                t_i += 1;
            }

            if s_i < s.len() && t_i < t.len() && s[s_i] < t[t_i] {
                s_i = s.partition_point(|&x| x <= lit);
            }
        }

        debug_assert!(self.initiation(&t));
        t
    }

    /// A cube passes initiation when it excludes every initial state.
    fn initiation(&mut self, s: &Cube) -> bool {
        if s.is_empty() {
            return false;
        }
        !self.cons.intersection(0, s)
    }

    fn push_lemmas(&mut self) {
        let num_frames = self.trace.borrow().num_frames() as u32;
        for k in 1..num_frames {
            let frame_copy: Vec<LemmaId> = self.trace.borrow().frame(k).iter().copied().collect();
            let mut pushed = 0;
            for &id in &frame_copy {
                let c = self.trace.borrow().cube_of(id).clone();
                if self.cons.consecution(k, &c) {
                    self.push_lemma(id, k + 1);
                    pushed += 1;
                }
            }

            if pushed == frame_copy.len() {
                // The frame emptied out: everything above is inductive.
                self.push_frame_to_inf(k);
                return;
            }
        }
    }

    fn push_lemma(&mut self, id: LemmaId, level: u32) {
        self.trace.borrow_mut().push_lemma(id, level);
        self.cons.add_lemma(id);
        if self.gs.logger.borrow().enabled(LogChannel::Ic3, 4) {
            let cls = negate_vec(self.trace.borrow().cube_of(id));
            self.log(
                4,
                format_args!(
                    "to {}: {}",
                    level_string(level),
                    DisplayClause(&cls, 'V')
                ),
            );
        }
    }

    fn push_frame_to_inf(&mut self, level: u32) {
        debug_assert!(level > 0 && level < LEVEL_INF);
        let top = self.trace.borrow().num_frames() as u32;
        for i in (level..top).rev() {
            let frame_copy: Vec<LemmaId> = self.trace.borrow().frame(i).iter().copied().collect();
            for id in frame_copy {
                self.push_lemma(id, LEVEL_INF);
            }
        }
        let mut trace = self.trace.borrow_mut();
        trace.clear_unused_frames();
        debug_assert_eq!(trace.num_frames(), level as usize);
    }

    pub fn add_lemma(&mut self, c: &Cube, level: u32) -> LemmaId {
        let id = self.trace.borrow_mut().add_lemma(c, level);
        self.cons.add_lemma(id);
        if self.gs.logger.borrow().enabled(LogChannel::Ic3, 4) {
            let cls = negate_vec(c);
            self.log(
                4,
                format_args!(
                    "at {}: {}",
                    level_string(level),
                    DisplayClause(&cls, 'V')
                ),
            );
        }
        id
    }

    pub fn add_clausal_lemma(&mut self, cls: &Clause, level: u32) -> LemmaId {
        let cube = negate_vec(cls);
        self.add_lemma(&cube, level)
    }

    pub fn add_clausal_lemmas(&mut self, vec: &[Clause], level: u32) {
        for cls in vec {
            self.add_clausal_lemma(cls, level);
        }
    }
}

impl InductiveTrace {
    /// Level of the lemma whose cube is `cube`; the lemma must exist.
    pub fn level_of_cube(&self, cube: &Cube) -> u32 {
        self.level_of(self.id_of(cube))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aig::{Aig, AigAnd, AigLatch, AigReset};
    use crate::options::GlobalState;
    use crate::tr::TransitionRelation;

    fn build(aig: &Aig) -> (VariableManager, Rc<TransitionRelation>, Gs) {
        let vars = VariableManager::new();
        let tr = Rc::new(TransitionRelation::new(&vars, aig).unwrap());
        (vars, tr, GlobalState::shared())
    }

    fn and_gate_aig() -> Aig {
        let mut aig = Aig::new();
        aig.inputs = vec![2, 4];
        aig.ands = vec![AigAnd::new(6, 2, 4)];
        aig.outputs = vec![6];
        aig
    }

    fn shift_chain_aig() -> Aig {
        let mut aig = Aig::new();
        aig.inputs = vec![2];
        aig.latches = vec![
            AigLatch::new(4, 2, AigReset::Zero),
            AigLatch::new(6, 4, AigReset::Zero),
            AigLatch::new(8, 6, AigReset::Zero),
            AigLatch::new(10, 8, AigReset::Zero),
        ];
        // bad = l3 & ~l2
        aig.ands = vec![AigAnd::new(12, 10, 9)];
        aig.outputs = vec![12];
        aig
    }

    #[test]
    fn test_combinational_and_unsafe() {
        let (vars, tr, gs) = build(&and_gate_aig());
        let mut ic3 = Ic3Solver::new(&vars, tr.clone(), &gs);
        let result = ic3.prove();
        assert!(result.is_unsafe());
        assert_eq!(result.cex.len(), 1);
        // The single step drives both inputs high.
        let inputs = &result.cex[0].inputs;
        assert!(inputs.contains(&tr.inputs()[0]));
        assert!(inputs.contains(&tr.inputs()[1]));
    }

    #[test]
    fn test_shift_chain_safe() {
        // Same chain with bad = l3 & ~l3: unreachable through a real gate,
        // so the prover must terminate with an inductive invariant.
        let mut aig = shift_chain_aig();
        aig.ands = vec![AigAnd::new(12, 10, 11)];
        aig.outputs = vec![12];
        let (vars, tr, gs) = build(&aig);
        let mut ic3 = Ic3Solver::new(&vars, tr.clone(), &gs);
        let result = ic3.prove();
        assert!(result.safe());
    }

    #[test]
    fn test_shift_chain_pattern_unsafe() {
        // bad = l3 & ~l2: reachable by shifting in 1 then 0.
        let (vars, tr, gs) = build(&shift_chain_aig());
        let mut ic3 = Ic3Solver::new(&vars, tr.clone(), &gs);
        let result = ic3.prove();
        assert!(result.is_unsafe());
        assert!(result.cex.len() >= 2);
        assert!(crate::safety::check_counter_example(&*tr, &result.cex));
    }

    #[test]
    fn test_counter_safe() {
        // One latch stuck at 0 (l' = l, reset 0), bad = l. Safe, and the
        // proof includes a clause implying ~l.
        let mut aig = Aig::new();
        aig.latches = vec![AigLatch::new(2, 2, AigReset::Zero)];
        aig.outputs = vec![2];
        let (vars, tr, gs) = build(&aig);
        let mut ic3 = Ic3Solver::new(&vars, tr.clone(), &gs);
        let result = ic3.prove();
        assert!(result.safe());
        assert!(!result.proof.is_empty());

        // The recorded proof is closed under the transition relation and
        // excludes bad.
        let mut solver = crate::adaptor::SatAdaptor::default();
        solver.add_clauses(&tr.unroll(2));
        solver.add_clauses(&result.proof);
        assert!(!solver.solve(&[tr.bad()]));
    }

    #[test]
    fn test_trivial_unsafe_reset() {
        // Reset state itself is bad: latch with reset 1, bad = latch.
        let mut aig = Aig::new();
        aig.latches = vec![AigLatch::new(2, 2, AigReset::One)];
        aig.outputs = vec![2];
        let (vars, tr, gs) = build(&aig);
        let mut ic3 = Ic3Solver::new(&vars, tr.clone(), &gs);
        let result = ic3.prove();
        assert!(result.is_unsafe());
        assert_eq!(result.cex.len(), 1);
        assert_eq!(result.cex[0].state, vec![tr.latches()[0]]);
    }

    #[test]
    fn test_reinitiate_restores_initiation() {
        let (vars, tr, gs) = build(&shift_chain_aig());
        let mut ic3 = Ic3Solver::new(&vars, tr.clone(), &gs);

        let l = tr.latches().to_vec();
        // s = {~l1, ~l2, ~l3} intersects the all-zero initial state.
        let s = sort_cube(&vec![negate(l[1]), negate(l[2]), negate(l[3])]);
        // orig additionally has l0, which excludes it.
        let orig = sort_cube(&vec![l[0], negate(l[1]), negate(l[2]), negate(l[3])]);

        let result = ic3.reinitiate(&s, &orig);
        assert!(result.contains(&l[0]));
        assert!(ic3.initiation(&result));
    }

    #[test]
    fn test_restricted_initial_states() {
        // Free-reset latch, bad = l. Unsafe as-is; restricting init with
        // clause ~l makes it safe.
        let mut aig = Aig::new();
        aig.latches = vec![AigLatch::new(2, 2, AigReset::Free)];
        aig.outputs = vec![2];
        let (vars, tr, gs) = build(&aig);
        let mut ic3 = Ic3Solver::new(&vars, tr.clone(), &gs);
        assert!(ic3.prove().is_unsafe());

        let l = tr.latches()[0];
        ic3.restrict_initial_states(&vec![negate(l)]);
        ic3.initial_states_restricted();
        assert!(ic3.prove().safe());

        // Expanding forgets the restriction-derived lemmas.
        ic3.clear_restrictions();
        ic3.initial_states_expanded();
        assert!(ic3.prove().is_unsafe());
    }

    #[test]
    fn test_proof_is_inductive_invariant() {
        let mut aig = shift_chain_aig();
        aig.ands = vec![AigAnd::new(12, 10, 11)];
        aig.outputs = vec![12];
        let (vars, tr, gs) = build(&aig);
        let mut ic3 = Ic3Solver::new(&vars, tr.clone(), &gs);
        let result = ic3.prove();
        assert!(result.safe());

        // init => Inv, Inv & Tr => Inv', Inv => ~bad.
        let mut ind = crate::adaptor::SatAdaptor::default();
        ind.add_clauses(&tr.unroll(2));
        ind.add_clauses(&result.proof);
        assert!(!ind.solve(&[tr.bad()]));
        for cls in &result.proof {
            let negc = negate_vec(cls);
            let assumps = prime_vec(&negc);
            assert!(!ind.solve(&assumps));

            let mut init = crate::adaptor::SatAdaptor::default();
            init.add_clauses(&tr.unroll_with_init(1));
            assert!(!init.solve(&negc));
        }
    }
}
