//! CAIVC: enumerate minimal correction sets, compute minimal hitting sets
//! over the gate variables, and verify each candidate MIVC.
use std::collections::BTreeSet;
use std::rc::Rc;

use super::{negate_gate_set, IvcFinder, IvcFinderData, Ivc};
use crate::debug_tr::DebugTransitionRelation;
use crate::debugging::{Debugger, HybridDebugger};
use crate::logger::LogChannel;
use crate::maxsat::MaxSatSolver;
use crate::mcs::{ApproximateMcsFinder, CorrectionSet, McsFinder};
use crate::options::Gs;
use crate::safety::HybridSafetyChecker;
use crate::sat::SatValue;
use crate::tr::TransitionRelation;
use crate::types::*;
use crate::vars::VariableManager;

pub struct CaivcFinder {
    data: IvcFinderData,
    debug_tr: Rc<DebugTransitionRelation>,
    gates: Vec<Id>,
    finder: McsFinder,
    approx_finder: ApproximateMcsFinder,
    /// Hitting-set solver over the gate variables: soft `~g`, one hard
    /// clause per correction set.
    solver: MaxSatSolver,
    ivc_checker: HybridDebugger,
    necessary_gates: BTreeSet<Id>,
}

impl CaivcFinder {
    pub fn new(vars: &VariableManager, tr: Rc<TransitionRelation>, gs: &Gs) -> Self {
        let debug_tr = Rc::new(DebugTransitionRelation::new(&tr));
        let gates = tr.gate_ids();
        let mut solver = MaxSatSolver::new(vars);
        for &gate in &gates {
            solver.add_for_optimization(negate(gate));
        }
        CaivcFinder {
            data: IvcFinderData::new(vars, tr, gs),
            finder: McsFinder::new(vars, debug_tr.clone(), gs),
            approx_finder: ApproximateMcsFinder::new(vars, debug_tr.clone(), gs),
            ivc_checker: HybridDebugger::new(vars, debug_tr.clone(), gs),
            debug_tr,
            gates,
            solver,
            necessary_gates: BTreeSet::new(),
        }
    }

    fn log(&self, v: i32, args: std::fmt::Arguments) {
        self.data
            .gs()
            .logger
            .borrow()
            .log(LogChannel::Caivc, v, args);
    }

    fn find_upfront(&mut self, n: u32) -> (bool, CorrectionSet) {
        if self.data.gs().opts.caivc_approx_mcs {
            self.approx_finder.find_and_block_with_bmc(n)
        } else {
            self.finder.set_cardinality(n);
            self.finder.find_and_block()
        }
    }

    fn abstraction_refinement(&mut self) {
        // Enumerate the low-cardinality correction sets upfront.
        let n_max = self.data.gs().opts.caivc_ar_upfront_nmax;
        for n in 1..=n_max {
            loop {
                let (found, corr) = self.find_upfront(n);
                if !found {
                    break;
                }
                self.log(2, format_args!("correction set of size {}", corr.len()));
                if corr.len() == 1 {
                    self.necessary_gates.insert(corr[0]);
                } else {
                    self.solver.add_clause(&corr);
                }
            }
        }

        // Candidate hitting sets; refine with a fresh correction set over
        // the complement whenever a candidate is unsafe.
        loop {
            let (found, candidate) = self.find_candidate_mivc(false);
            if !found {
                self.log(2, format_args!("no more candidates"));
                break;
            }
            self.log(
                4,
                format_args!("candidate MIVC of size {}", candidate.len()),
            );

            if self.is_ivc(&candidate) {
                if !self.data.minimum_ivc_known() {
                    self.data.set_minimum_ivc(&candidate);
                }
                self.data.add_mivc(&candidate);
                self.block_mivc(&candidate);
            } else {
                let neg = negate_gate_set(&self.gates, &candidate);
                let corr = self.find_correction_set_over_gates(&neg);
                self.log(2, format_args!("correction set of size {}", corr.len()));
                self.solver.add_clause(&corr);
            }
        }
    }

    fn naive(&mut self) {
        // Find every correction set first, then every hitting set is an
        // MIVC with no further checking.
        let mut cardinality = 1;
        let mut count = 0usize;
        loop {
            self.finder.set_cardinality(cardinality);
            loop {
                let (found, corr) = self.finder.find_and_block();
                if !found {
                    break;
                }
                count += 1;
                self.log(2, format_args!("correction set of size {}", corr.len()));
                if corr.len() == 1 {
                    self.necessary_gates.insert(corr[0]);
                } else {
                    self.solver.add_clause(&corr);
                }
            }
            cardinality += 1;
            if !self.finder.more_correction_sets() {
                break;
            }
        }
        self.log(
            2,
            format_args!("done finding correction sets ({} found)", count),
        );

        loop {
            let (found, mivc) = self.find_candidate_mivc(true);
            if !found {
                break;
            }
            if !self.data.minimum_ivc_known() {
                self.data.set_minimum_ivc(&mivc);
            }
            self.data.add_mivc(&mivc);
        }
    }

    fn find_correction_set_over_gates(&mut self, gates: &[Id]) -> CorrectionSet {
        assert!(!gates.is_empty());
        let gs = self.data.gs().clone();

        if gs.opts.caivc_grow_mcs {
            return self.find_mcs_by_grow(gates);
        }
        if gs.opts.caivc_simple_mcs {
            return gates.to_vec();
        }
        if gs.opts.caivc_approx_mcs {
            let (found, corr) = self.approx_finder.find_and_block_over_gates(gates);
            assert!(found, "a correction set must exist over these gates");
            return corr;
        }

        // Cardinality 1 sets were all found upfront.
        for cardinality in 2..=gates.len() as u32 {
            self.finder.set_cardinality(cardinality);
            let (found, corr) = self.finder.find_and_block_over_gates(gates);
            if found {
                return corr;
            }
        }
        unreachable!("a correction set must exist over these gates");
    }

    fn find_mcs_by_grow(&mut self, gates: &[Id]) -> CorrectionSet {
        let mut mss = negate_gate_set(&self.gates, gates);
        let mss_set: BTreeSet<Id> = mss.iter().copied().collect();

        let all = self.gates.clone();
        for gate in all {
            if mss_set.contains(&gate) {
                continue;
            }
            let mut candidate = mss.clone();
            candidate.push(gate);
            if !self.is_ivc(&candidate) {
                mss.push(gate);
            }
        }

        negate_gate_set(&self.gates, &mss)
    }

    fn find_candidate_mivc(&mut self, block: bool) -> (bool, Ivc) {
        if !self.solver.solve() {
            return (false, Ivc::new());
        }
        let mivc = self.extract_ivc();
        if block {
            self.block_mivc(&mivc);
        }
        (true, mivc)
    }

    fn block_mivc(&mut self, mivc: &Ivc) {
        let blockable: Vec<Id> = mivc
            .iter()
            .copied()
            .filter(|g| !self.necessary_gates.contains(g))
            .collect();

        // The whole circuit can be the only MIVC; block with the false
        // clause in that case.
        let block_cls = if blockable.is_empty() {
            vec![ID_FALSE]
        } else {
            negate_vec(&blockable)
        };
        self.solver.add_clause(&block_cls);
    }

    fn is_ivc(&mut self, candidate: &Ivc) -> bool {
        let gs = self.data.gs().clone();
        if gs.opts.caivc_check_with_debug {
            let neg = negate_gate_set(&self.gates, candidate);
            let (unsafe_, _) = self.ivc_checker.debug_over_gates(&neg);
            !unsafe_
        } else {
            let partial = Rc::new(TransitionRelation::abstracted(self.data.tr(), candidate));
            let mut checker = HybridSafetyChecker::new(self.data.vars(), partial, &gs);
            checker.prove().safe()
        }
    }

    fn extract_ivc(&self) -> Ivc {
        debug_assert!(self.solver.is_sat());
        let mut mivc: Ivc = self.necessary_gates.iter().copied().collect();
        for &gate in &self.gates {
            if self.solver.get_assignment_to_var(gate) == SatValue::True {
                debug_assert!(!self.necessary_gates.contains(&gate));
                mivc.push(gate);
            }
        }
        sort_cube(&mivc)
    }
}

impl IvcFinder for CaivcFinder {
    fn find_ivcs(&mut self) {
        self.log(
            2,
            format_args!("starting CAIVC over {} gates", self.gates.len()),
        );

        if self.data.tr().bad() == ID_FALSE {
            self.log(3, format_args!("output is a literal 0"));
            let empty = Ivc::new();
            self.data.add_mivc(&empty);
            return;
        }

        if self.data.gs().opts.caivc_abstraction_refinement {
            self.abstraction_refinement();
        } else {
            self.naive();
        }
    }

    fn data(&self) -> &IvcFinderData {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aig::{Aig, AigAnd, AigLatch, AigReset};
    use crate::options::GlobalState;

    fn run(gs: Gs) {
        // bad = l & l via gate 6; gate 8 dangles. Single MIVC {6}.
        let mut aig = Aig::new();
        aig.inputs = vec![2];
        aig.latches = vec![AigLatch::new(4, 4, AigReset::Zero)];
        aig.ands = vec![AigAnd::new(6, 4, 4), AigAnd::new(8, 2, 4)];
        aig.outputs = vec![6];
        let vars = VariableManager::new();
        let tr = Rc::new(TransitionRelation::new(&vars, &aig).unwrap());

        let needed = tr.vars().to_internal(6).unwrap();
        let mut finder = CaivcFinder::new(&vars, tr, &gs);
        finder.find_ivcs();
        assert_eq!(finder.num_mivcs(), 1);
        assert_eq!(finder.mivc(0), &vec![needed]);
        assert_eq!(finder.minimum_ivc(), &vec![needed]);
    }

    #[test]
    fn test_caivc_abstraction_refinement() {
        run(GlobalState::shared());
    }

    #[test]
    fn test_caivc_naive() {
        let mut opts = crate::options::Options::default();
        opts.caivc_abstraction_refinement = false;
        run(GlobalState::new(opts));
    }
}
