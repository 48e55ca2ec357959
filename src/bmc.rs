//! Bounded model checking: incrementally unroll the transition relation
//! from the initial states and ask whether bad is reachable at each depth.
use std::rc::Rc;

use crate::adaptor::SatAdaptor;
use crate::clog;
use crate::logger::LogChannel;
use crate::options::Gs;
use crate::safety::{SafetyAnswer, SafetyCounterExample, SafetyResult, Step};
use crate::sat::SatValue;
use crate::tr::TransitionSystem;
use crate::types::*;
use crate::vars::VariableManager;

pub struct BmcSolver<T: TransitionSystem> {
    tr: Rc<T>,
    gs: Gs,
    solver: SatAdaptor,
    frames_loaded: u64,
}

impl<T: TransitionSystem> BmcSolver<T> {
    pub fn new(_vars: &VariableManager, tr: Rc<T>, gs: &Gs) -> Self {
        let mut solver = SatAdaptor::new(gs.opts.backend);
        solver.add_clauses(&tr.init_state());
        BmcSolver {
            tr,
            gs: gs.clone(),
            solver,
            frames_loaded: 0,
        }
    }

    /// Conjoin extra clauses onto the initial states (frame 0). Used to
    /// block debugging solutions and to install cardinality CNF.
    pub fn restrict_initial_states(&mut self, cls: &Clause) {
        assert!(!cls.is_empty());
        self.solver.add_clause(cls);
    }

    pub fn restrict_initial_states_all(&mut self, vec: &[Clause]) {
        for cls in vec {
            self.restrict_initial_states(cls);
        }
    }

    fn ensure_frames(&mut self, upto: u64) {
        while self.frames_loaded <= upto {
            let frame = self.tr.unroll_frame(self.frames_loaded);
            self.solver.add_clauses(&frame);
            self.frames_loaded += 1;
        }
    }

    /// Check reachability of bad at exactly depth `k`.
    pub fn solve(&mut self, k: u32) -> SafetyResult {
        self.solve_range(0, k, &[])
    }

    /// Check depths `k_min..=k_max` in order, under extra assumptions.
    /// Returns UNSAFE with the concrete trace on the first hit, otherwise
    /// UNKNOWN (BMC never proves safety).
    pub fn solve_range(&mut self, k_min: u32, k_max: u32, assumps: &[Id]) -> SafetyResult {
        let mut result = SafetyResult::default();
        for k in k_min..=k_max {
            clog!(self.gs, LogChannel::Bmc, 3, "depth {}", k);
            self.ensure_frames(k as u64);
            let mut all_assumps = assumps.to_vec();
            all_assumps.push(prime_n(self.tr.tr().bad(), k as u64));
            if self.solver.solve(&all_assumps) {
                clog!(self.gs, LogChannel::Bmc, 2, "refuted at depth {}", k);
                result.result = SafetyAnswer::Unsafe;
                result.cex = self.extract_cex(k as u64);
                return result;
            }
        }
        result
    }

    fn extract_cex(&self, depth: u64) -> SafetyCounterExample {
        let mut cex = SafetyCounterExample::new();
        for i in 0..=depth {
            let inputs = self.extract(self.tr.tr().inputs(), i);
            let state = self.extract(self.tr.tr().latches(), i);
            cex.push(Step::new(inputs, state));
        }
        cex
    }

    fn extract(&self, vars: &[Id], n: u64) -> Cube {
        let mut cube = Cube::new();
        for &v in vars {
            match self.solver.safe_get_assignment_to_var(prime_n(v, n)) {
                SatValue::True => cube.push(v),
                SatValue::False => cube.push(negate(v)),
                SatValue::Undef => {}
            }
        }
        cube.sort_unstable();
        cube
    }
}
