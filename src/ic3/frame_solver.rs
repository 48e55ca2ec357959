//! Consecution and intersection queries against the inductive trace.
//!
//! The solver holds the simplified two-frame transition relation and every
//! current lemma: finite-level lemmas carry one activation literal per
//! level, infinite ones go in raw. A query at level `k` assumes the negated
//! activation literal of every level `>= k`, which switches on exactly the
//! semantic frame `F_k`.
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use super::trace::InductiveTrace;
use super::{LemmaId, LEVEL_INF};
use crate::adaptor::ClauseDedupSatAdaptor;
use crate::options::Gs;
use crate::tr::{simplify_tr, TransitionSystem};
use crate::types::*;
use crate::vars::VariableManager;

/// Keep the literals of `c` whose `n`-primed form appears among the
/// critical assumptions.
pub fn extract_core_with_primes(c: &Cube, crits: &Cube, n: u64) -> Cube {
    let lits: HashSet<Id> = c.iter().copied().collect();
    let mut core = Cube::new();
    for &lit in crits {
        if nprimes(lit) != n {
            continue;
        }
        let unprimed = unprime(lit);
        if lits.contains(&unprimed) {
            core.push(unprimed);
        }
    }
    core
}

pub fn extract_core(c: &Cube, crits: &Cube) -> Cube {
    extract_core_with_primes(c, crits, 0)
}

/// Result of a full consecution query: either the cube was inductive
/// relative to the frame (with a core), or a predecessor was found.
#[derive(Debug, Default)]
pub struct ConsecutionResult {
    pub inductive: bool,
    pub core: Cube,
    pub pred: Cube,
    pub inputs: Cube,
    pub pinputs: Cube,
}

pub struct FrameSolver<T: TransitionSystem> {
    vars: VariableManager,
    tr: Rc<T>,
    trace: Rc<RefCell<InductiveTrace>>,
    gs: Gs,
    solver: ClauseDedupSatAdaptor,
    unrolled: ClauseVec,
    inited: bool,
    activation: Vec<Id>,
}

impl<T: TransitionSystem> FrameSolver<T> {
    pub fn new(
        vars: &VariableManager,
        tr: Rc<T>,
        trace: Rc<RefCell<InductiveTrace>>,
        gs: &Gs,
    ) -> Self {
        FrameSolver {
            vars: vars.clone(),
            tr,
            trace,
            solver: ClauseDedupSatAdaptor::new(gs.opts.backend),
            gs: gs.clone(),
            unrolled: ClauseVec::new(),
            inited: false,
            activation: Vec::new(),
        }
    }

    /// Rebuild the SAT state from scratch: simplified transition relation
    /// plus every current lemma. Learned clauses are lost; correctness is
    /// unaffected because all lemmas are re-sent.
    pub fn renew_sat(&mut self) {
        if self.unrolled.is_empty() {
            self.compute_simplified_tr();
        }
        self.solver.reset();
        let unrolled = self.unrolled.clone();
        self.solver.add_clauses(&unrolled);

        let ids: Vec<LemmaId> = {
            let trace = self.trace.borrow();
            let mut ids: Vec<LemmaId> = trace.frame(LEVEL_INF).iter().copied().collect();
            for i in 0..trace.num_frames() {
                ids.extend(trace.frame(i as u32).iter().copied());
            }
            ids
        };
        for id in ids {
            self.send_lemma(id);
        }
        self.inited = true;
    }

    /// Newly added lemmas become visible to subsequent queries immediately.
    pub fn add_lemma(&mut self, id: LemmaId) {
        if self.inited {
            self.send_lemma(id);
        }
    }

    fn compute_simplified_tr(&mut self) {
        self.unrolled = if self.gs.opts.simplify {
            simplify_tr(&*self.tr)
        } else {
            self.tr.unroll(2)
        };
    }

    fn send_lemma(&mut self, id: LemmaId) {
        let cls = self.activated_clause_of(id);
        self.solver.add_clause(&cls);
    }

    fn activated_clause_of(&mut self, id: LemmaId) -> Clause {
        let (cube, level) = {
            let trace = self.trace.borrow();
            let lemma = trace.lemma(id);
            (lemma.cube.clone(), lemma.level)
        };
        let mut cls = negate_vec(&cube);
        if level < LEVEL_INF {
            cls.push(self.level_act(level));
        }
        cls
    }

    fn level_act(&mut self, level: u32) -> Id {
        if level == LEVEL_INF {
            return ID_FALSE;
        }
        while (level as usize) >= self.activation.len() {
            let name = format!("act_lvl_{}", self.activation.len());
            self.activation.push(self.vars.new_internal(&name));
        }
        self.activation[level as usize]
    }

    /// Assume `~act_i` for every level `i >= level`. Infinite-frame lemmas
    /// are unconditional, so no assumption is needed for them.
    fn level_assumps(&mut self, level: u32) -> Cube {
        let num_frames = self.trace.borrow().num_frames() as u32;
        let mut assumps = Cube::new();
        let mut i = level;
        while i < num_frames {
            let act = self.level_act(i);
            assumps.push(negate(act));
            i += 1;
        }
        assumps
    }

    /// Check `F_level & ~c & Tr => ~c'`.
    pub fn consecution(&mut self, level: u32, c: &Cube) -> bool {
        self.consecution_query(level, c, false, false).inductive
    }

    /// Consecution with a reduced core of `c` on success.
    pub fn consecution_core(&mut self, level: u32, c: &Cube, core: &mut Cube) -> bool {
        let result = self.consecution_query(level, c, true, false);
        if result.inductive {
            *core = result.core;
        }
        result.inductive
    }

    /// Consecution with a concrete predecessor on failure.
    pub fn consecution_pred(&mut self, level: u32, c: &Cube, pred: &mut Cube) -> bool {
        let result = self.consecution_query(level, c, false, true);
        if !result.inductive {
            *pred = result.pred;
        }
        result.inductive
    }

    /// Consecution with everything: core on success, predecessor plus input
    /// assignments on failure.
    pub fn consecution_full(&mut self, level: u32, c: &Cube) -> ConsecutionResult {
        self.consecution_query(level, c, true, true)
    }

    fn consecution_query(
        &mut self,
        level: u32,
        c: &Cube,
        want_core: bool,
        want_pred: bool,
    ) -> ConsecutionResult {
        if !self.inited {
            self.renew_sat();
        }
        assert!(!c.is_empty());

        let mut assumps = self.level_assumps(level);
        let mut negc = Clause::new();
        for &lit in c {
            debug_assert_eq!(nprimes(lit), 0);
            assumps.push(prime(lit));
            negc.push(negate(lit));
        }

        // ~c is one-shot: activate it through a group so the next query
        // simply omits the group literal.
        let gid = self.solver.create_group();
        self.solver.add_group_clause(gid, &negc);

        let mut result = ConsecutionResult::default();
        let mut crits = Cube::new();
        let sat = if want_core {
            self.solver.group_solve_with_crits(gid, &assumps, &mut crits)
        } else {
            self.solver.group_solve(gid, &assumps)
        };
        result.inductive = !sat;

        if !sat && want_core {
            result.core = extract_core_with_primes(c, &crits, 1);
        }
        if sat && want_pred {
            result.pred = self.extract(self.tr.tr().latches().to_vec(), 0);
            result.inputs = self.extract(self.tr.tr().inputs().to_vec(), 0);
            result.pinputs = self.extract(self.tr.tr().inputs().to_vec(), 1);
        }
        result
    }

    /// SAT check of `F_level & c & Tr`. Tr is included so the invariant
    /// constraints apply.
    pub fn intersection(&mut self, level: u32, c: &Cube) -> bool {
        self.intersection_query(level, c).0
    }

    /// Intersection plus the satisfying state and inputs.
    pub fn intersection_full(&mut self, level: u32, c: &Cube) -> (bool, Cube, Cube) {
        let (sat, state, inputs) = self.intersection_query(level, c);
        (sat, state, inputs)
    }

    fn intersection_query(&mut self, level: u32, c: &Cube) -> (bool, Cube, Cube) {
        assert!(!c.is_empty());
        if !self.inited {
            self.renew_sat();
        }
        let mut assumps = self.level_assumps(level);
        assumps.extend_from_slice(c);

        let sat = self.solver.solve(&assumps);
        if sat {
            let state = self.extract(self.tr.tr().latches().to_vec(), 0);
            let inputs = self.extract(self.tr.tr().inputs().to_vec(), 0);
            (true, state, inputs)
        } else {
            (false, Cube::new(), Cube::new())
        }
    }

    /// Read the assignment of `vars` at prime depth `n`, returned unprimed.
    /// Variables the solver never saw are don't-cares and are skipped.
    fn extract(&self, vars: Vec<Id>, n: u64) -> Cube {
        use crate::sat::SatValue;
        let mut cube = Cube::new();
        for v in vars {
            match self.solver.safe_get_assignment_to_var(prime_n(v, n)) {
                SatValue::True => cube.push(v),
                SatValue::False => cube.push(negate(v)),
                SatValue::Undef => {}
            }
        }
        cube
    }
}
