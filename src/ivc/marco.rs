//! MARCO-style MIVC enumeration: a maximal MaxSAT seed solver over gate
//! variables, safety checks on the abstraction, UCBF shrinking, and
//! block-up/block-down refinement.
use std::collections::HashMap;
use std::rc::Rc;

use super::bf::IvcBfFinder;
use super::ucbf::IvcUcbfFinder;
use super::{negate_gate_set, IvcFinder, IvcFinderData, Ivc};
use crate::debug_tr::DebugTransitionRelation;
use crate::debugging::{Debugger, HybridDebugger};
use crate::logger::LogChannel;
use crate::map::Seed;
use crate::maxsat::MaxSatSolver;
use crate::mcs::ApproximateMcsFinder;
use crate::options::Gs;
use crate::safety::HybridSafetyChecker;
use crate::sat::SatValue;
use crate::tr::TransitionRelation;
use crate::types::*;
use crate::vars::VariableManager;

pub struct MarcoIvcFinder {
    data: IvcFinderData,
    seed_solver: MaxSatSolver,
    debug_tr: Rc<DebugTransitionRelation>,
    gates: Vec<Id>,
    smallest_ivc: Ivc,
    incr_checker: HybridDebugger,
    mcs: ApproximateMcsFinder,
    seed_var: HashMap<Id, Id>,
}

impl MarcoIvcFinder {
    pub fn new(vars: &VariableManager, tr: Rc<TransitionRelation>, gs: &Gs) -> Self {
        let debug_tr = Rc::new(DebugTransitionRelation::new(&tr));
        let mut finder = MarcoIvcFinder {
            data: IvcFinderData::new(vars, tr.clone(), gs),
            seed_solver: MaxSatSolver::new(vars),
            gates: tr.gate_ids(),
            smallest_ivc: Ivc::new(),
            incr_checker: HybridDebugger::new(vars, debug_tr.clone(), gs),
            mcs: ApproximateMcsFinder::new(vars, debug_tr.clone(), gs),
            debug_tr,
            seed_var: HashMap::new(),
        };
        finder.init_solvers();
        finder
    }

    fn log(&self, v: i32, args: std::fmt::Arguments) {
        self.data
            .gs()
            .logger
            .borrow()
            .log(LogChannel::MarcoIvc, v, args);
    }

    fn init_solvers(&mut self) {
        // The seed variable of a gate is its debug latch.
        for &gate in &self.gates {
            let dv = self.debug_tr.debug_latch_for_gate(gate);
            self.seed_var.insert(gate, dv);
            self.seed_solver.add_for_optimization(dv);
        }

        let gs = self.data.gs().clone();
        if gs.opts.marcoivc_explore_basic_hints || gs.opts.marcoivc_explore_complex_hints {
            self.add_explore_hints();
        }
    }

    /// Fanout implication clauses seeding the map: a gate with every
    /// fanout absent can be dropped too.
    fn add_explore_hints(&mut self) {
        let gs = self.data.gs().clone();
        let mut fanout: HashMap<Id, Vec<Id>> = HashMap::new();
        let tr = self.data.tr().clone();
        for &gate in &self.gates {
            let lhs_dv = self.seed_var[&gate];
            let rec = *tr.get_gate(gate);
            for &rhs in &[rec.rhs0, rec.rhs1] {
                let stripped = strip(rhs);
                if tr.is_gate(stripped) {
                    let rhs_dv = self.seed_var[&stripped];
                    fanout.entry(rhs_dv).or_default().push(lhs_dv);
                }
            }
        }

        for (gate_dv, outs) in fanout {
            debug_assert!(!outs.is_empty());
            let mut cls: Clause = vec![negate(gate_dv)];
            cls.extend(outs.iter().copied());

            if outs.len() == 1 && gs.opts.marcoivc_explore_basic_hints {
                self.seed_solver.add_clause(&cls);
            } else if gs.opts.marcoivc_explore_complex_hints {
                self.seed_solver.add_clause(&cls);
            }
        }
    }

    fn get_unexplored(&mut self) -> (bool, Seed) {
        if !self.seed_solver.solve() {
            return (false, Seed::new());
        }
        let seed = self
            .gates
            .iter()
            .copied()
            .filter(|g| self.seed_solver.get_assignment_to_var(self.seed_var[g]) == SatValue::True)
            .collect();
        (true, seed)
    }

    fn is_safe(&mut self, seed: &Seed) -> bool {
        let gs = self.data.gs().clone();
        if gs.opts.marcoivc_incr_issafe {
            let neg = negate_gate_set(&self.gates, seed);
            let (unsafe_, _) = self.incr_checker.debug_over_gates(&neg);
            !unsafe_
        } else if gs.opts.marcoivc_hybrid_issafe {
            let partial = Rc::new(TransitionRelation::abstracted(self.data.tr(), seed));
            let mut checker = HybridSafetyChecker::new(self.data.vars(), partial, &gs);
            checker.prove().safe()
        } else {
            let partial = Rc::new(TransitionRelation::abstracted(self.data.tr(), seed));
            let mut ic3 =
                crate::ic3::solver::Ic3Solver::new(self.data.vars(), partial, &gs);
            ic3.prove().safe()
        }
    }

    #[allow(dead_code)]
    fn grow(&mut self, seed: &mut Seed) {
        if self.data.gs().opts.marcoivc_debug_grow {
            self.debug_grow(seed);
        } else {
            self.brute_force_grow(seed);
        }
    }

    fn brute_force_grow(&mut self, seed: &mut Seed) {
        let gates = self.gates.clone();
        for gate in gates {
            if seed.contains(&gate) {
                continue;
            }
            seed.push(gate);
            if self.is_safe(seed) {
                seed.pop();
            }
        }
    }

    fn debug_grow(&mut self, seed: &mut Seed) {
        let n_max = 5;
        let neg = negate_gate_set(&self.gates, seed);
        let (found, mcs) = self.mcs.find_and_block_over_gates_with_bmc(&neg, n_max);
        if found {
            debug_assert!(!mcs.is_empty());
            *seed = negate_gate_set(&self.gates, &mcs);
        } else {
            self.brute_force_grow(seed);
        }
    }

    fn shrink(&mut self, seed: &mut Seed) {
        let gs = self.data.gs().clone();
        if gs.opts.marcoivc_use_ivcucbf {
            let mut ucbf = IvcUcbfFinder::new(self.data.vars(), self.data.tr().clone(), &gs);
            ucbf.shrink(seed, None);
        } else {
            let mut bf = IvcBfFinder::new(self.data.vars(), self.data.tr().clone(), &gs);
            bf.shrink(seed, None);
        }
    }

    fn block_up(&mut self, seed: &Seed) {
        assert!(!seed.is_empty());
        let cls: Clause = seed.iter().map(|g| negate(self.seed_var[g])).collect();
        self.seed_solver.add_clause(&cls);
    }

    fn block_down(&mut self, seed: &Seed) {
        let neg = negate_gate_set(&self.gates, seed);
        let cls: Clause = neg.iter().map(|g| self.seed_var[g]).collect();
        // The whole circuit can be the only IVC; block with false then.
        if cls.is_empty() {
            self.seed_solver.add_clause(&vec![ID_FALSE]);
        } else {
            self.seed_solver.add_clause(&cls);
        }
    }

    fn record_mivc(&mut self, mivc: &Seed) {
        if self.smallest_ivc.is_empty() || mivc.len() < self.smallest_ivc.len() {
            self.smallest_ivc = mivc.clone();
        }
        self.data.add_mivc(mivc);
    }
}

impl IvcFinder for MarcoIvcFinder {
    fn find_ivcs(&mut self) {
        // Constant output: nothing is needed to prove it.
        if self.data.tr().bad() == ID_FALSE {
            self.log(3, format_args!("output is a literal 0"));
            let empty = Ivc::new();
            self.data.add_mivc(&empty);
            self.data.set_minimum_ivc(&empty);
            return;
        }

        loop {
            let (sat, mut seed) = self.get_unexplored();
            if !sat {
                break;
            }
            if self.is_safe(&seed) {
                self.log(3, format_args!("found an IVC of size {}", seed.len()));
                self.shrink(&mut seed);
                self.log(1, format_args!("MIVC of size {}", seed.len()));
                if seed.is_empty() {
                    // Provable without any gate: nothing smaller exists.
                    self.record_mivc(&seed);
                    self.data.set_minimum_ivc(&seed);
                    return;
                }
                self.block_up(&seed);
                self.record_mivc(&seed);
            } else {
                // The search is top-down (maximal seeds first), so growing
                // an unsafe seed is unnecessary.
                self.log(1, format_args!("MNVC of size {}", seed.len()));
                self.block_down(&seed);
            }
        }

        debug_assert!(!self.smallest_ivc.is_empty() || self.data.num_mivcs() == 0);
        let smallest = self.smallest_ivc.clone();
        if !smallest.is_empty() {
            self.data.set_minimum_ivc(&smallest);
        }
    }

    fn data(&self) -> &IvcFinderData {
        &self.data
    }
}
