//! Minimal correction set enumeration: debug at increasing cardinality,
//! blocking every solution found.
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::debug_tr::DebugTransitionRelation;
use crate::debugging::{BmcDebugger, Debugger, HybridDebugger, Ic3Debugger};
use crate::options::Gs;
use crate::types::*;
use crate::vars::VariableManager;

pub type CorrectionSet = Vec<Id>;
pub type FindMcsResult = (bool, CorrectionSet);

const CARDINALITY_INF: u32 = u32::MAX;

/// Exact MCS enumeration with a cardinality-free twin solver that answers
/// "are there any more correction sets at all".
pub struct McsFinder {
    cardinality: u32,
    solver: HybridDebugger,
    solver_inf: HybridDebugger,
}

impl McsFinder {
    pub fn new(vars: &VariableManager, tr: Rc<DebugTransitionRelation>, gs: &Gs) -> Self {
        let mut finder = McsFinder {
            cardinality: 0,
            solver: HybridDebugger::new(vars, tr.clone(), gs),
            solver_inf: HybridDebugger::new(vars, tr, gs),
        };
        if !gs.opts.caivc_use_bmc {
            finder.solver.set_k_max(0);
            finder.solver_inf.set_k_max(0);
        }
        finder
    }

    pub fn set_cardinality(&mut self, n: u32) {
        self.cardinality = n;
        self.solver.set_cardinality(n);
    }

    pub fn more_correction_sets(&mut self) -> bool {
        let (more, _) = self.solver_inf.debug();
        more
    }

    pub fn find_and_block(&mut self) -> FindMcsResult {
        let (found, corr) = self.solver.debug_and_block();
        if found {
            self.solver_inf.block_solution(&corr);
        }
        (found, corr)
    }

    pub fn find_and_block_over_gates(&mut self, gates: &[Id]) -> FindMcsResult {
        let (found, corr) = self.solver.debug_and_block_over_gates(gates);
        if found {
            self.solver_inf.block_solution(&corr);
        }
        (found, corr)
    }

    pub fn block_solution(&mut self, corr: &CorrectionSet) {
        self.solver.block_solution(corr);
        self.solver_inf.block_solution(corr);
    }
}

/// BMC-first approximation with an IC3 fallback for completeness.
pub struct ApproximateMcsFinder {
    gs: Gs,
    fallback: Ic3Debugger,
    solver: BmcDebugger,
}

impl ApproximateMcsFinder {
    pub fn new(vars: &VariableManager, tr: Rc<DebugTransitionRelation>, gs: &Gs) -> Self {
        ApproximateMcsFinder {
            gs: gs.clone(),
            fallback: Ic3Debugger::new(vars, tr.clone(), gs),
            solver: BmcDebugger::new(vars, tr, gs),
        }
    }

    pub fn find_and_block_with_bmc(&mut self, n: u32) -> FindMcsResult {
        self.solver.set_cardinality(n);
        let k_max = self.gs.opts.caivc_ar_bmc_kmax;
        self.solver.debug_range_and_block(0, k_max)
    }

    pub fn find_and_block_over_gates_with_bmc(&mut self, gates: &[Id], n: u32) -> FindMcsResult {
        self.solver.set_cardinality(n);
        let k_max = self.gs.opts.caivc_ar_bmc_kmax;
        self.solver.debug_over_gates_range_and_block(gates, 0, k_max)
    }

    pub fn find_and_block_over_gates(&mut self, gates: &[Id]) -> FindMcsResult {
        let k_max = self.gs.opts.caivc_ar_bmc_kmax;
        let n_max = self.gs.opts.caivc_ar_bmc_nmax.min(gates.len() as u32);

        for n in 1..=n_max {
            self.solver.set_cardinality(n);
            let result = self.solver.debug_over_gates_range_and_block(gates, 0, k_max);
            if result.0 {
                return result;
            }
        }

        // Nothing within the BMC depth: fall back to IC3.
        self.find_fallback(gates)
    }

    fn find_fallback(&mut self, gates: &[Id]) -> FindMcsResult {
        // The approximate pass can miss even cardinality-1 sets, so start
        // from scratch.
        for n in 1..=gates.len() as u32 {
            self.fallback.set_cardinality(n);
            let (found, corr) = self.fallback.debug_and_block_over_gates(gates);
            if found {
                self.solver.block_solution(&corr);
                return (true, corr);
            }
        }
        (false, CorrectionSet::new())
    }

    pub fn block_solution(&mut self, corr: &CorrectionSet) {
        self.fallback.block_solution(corr);
        self.solver.block_solution(corr);
    }
}

/// Enumeration interface used by the unified IVC finder.
pub trait CorrectionSetFinder {
    fn find_next_over_gates(&mut self, gates: &[Id], n: u32) -> FindMcsResult;
    fn more_correction_sets_at(&mut self, n: u32) -> bool;
    fn block(&mut self, corr: &CorrectionSet);

    fn num_gates(&self) -> usize;
    fn all_gates(&self) -> Vec<Id>;

    fn find_next_unbounded_over_gates(&mut self, gates: &[Id]) -> FindMcsResult {
        self.find_next_over_gates(gates, CARDINALITY_INF)
    }

    fn find_next(&mut self, n: u32) -> FindMcsResult {
        let gates = self.all_gates();
        self.find_next_over_gates(&gates, n)
    }

    fn more_correction_sets(&mut self) -> bool {
        self.more_correction_sets_at(CARDINALITY_INF)
    }

    /// All correction sets of size `n` or less.
    fn find_all(&mut self, n: u32) -> Vec<CorrectionSet> {
        let mut results = Vec::new();
        loop {
            let (sat, corr) = self.find_next(n);
            if !sat {
                break;
            }
            results.push(corr);
        }
        results
    }

    /// Some correction sets of size `n` or less; finders may trade
    /// completeness for speed here.
    fn find_batch(&mut self, n: u32) -> Vec<CorrectionSet> {
        self.find_all(n)
    }
}

/// Straightforward finder: one hybrid debugger, cardinality swept upward.
pub struct BasicMcsFinder {
    tr: Rc<DebugTransitionRelation>,
    solver: HybridDebugger,
    cardinality: u32,
}

impl BasicMcsFinder {
    pub fn new(vars: &VariableManager, tr: Rc<DebugTransitionRelation>, gs: &Gs) -> Self {
        BasicMcsFinder {
            solver: HybridDebugger::new(vars, tr.clone(), gs),
            tr,
            cardinality: 1,
        }
    }

    fn set_cardinality(&mut self, n: u32) {
        if n as usize >= self.tr.num_gates() {
            // Including the unbounded case.
            self.solver.clear_cardinality();
        } else {
            self.solver.set_cardinality(n);
        }
    }

    fn do_find(&mut self, gates: Option<&[Id]>, n: u32) -> FindMcsResult {
        let start = if gates.is_some() { 1 } else { self.cardinality };
        let mut cardinality = start;
        while cardinality <= n {
            if gates.is_none() {
                self.cardinality = cardinality;
            }
            self.set_cardinality(cardinality);

            let result = match gates {
                Some(g) => self.solver.debug_and_block_over_gates(g),
                None => self.solver.debug_and_block(),
            };
            if result.0 {
                return result;
            }

            if !self.more_correction_sets_at(n) {
                break;
            }
            cardinality += 1;
        }
        (false, CorrectionSet::new())
    }
}

impl CorrectionSetFinder for BasicMcsFinder {
    fn find_next_over_gates(&mut self, gates: &[Id], n: u32) -> FindMcsResult {
        self.do_find(Some(gates), n)
    }

    fn find_next(&mut self, n: u32) -> FindMcsResult {
        self.do_find(None, n)
    }

    fn more_correction_sets_at(&mut self, n: u32) -> bool {
        self.set_cardinality(n);
        let (sat, _) = self.solver.debug();
        sat
    }

    fn block(&mut self, corr: &CorrectionSet) {
        self.solver.block_solution(corr);
    }

    fn num_gates(&self) -> usize {
        self.tr.num_gates()
    }

    fn all_gates(&self) -> Vec<Id> {
        self.tr.gate_ids()
    }
}

/// BMC-driven finder walking the (cardinality, depth) grid, remembering
/// exhausted cells, with IC3 fallback for completeness.
pub struct BmcCorrectionSetFinder {
    tr: Rc<DebugTransitionRelation>,
    gs: Gs,
    bmc: BmcDebugger,
    ic3: Ic3Debugger,
    exhausted_cardinality: u32,
    k_max: u32,
    k_min: u32,
    exhausted: BTreeSet<(u32, u32)>,
}

impl BmcCorrectionSetFinder {
    pub fn new(vars: &VariableManager, tr: Rc<DebugTransitionRelation>, gs: &Gs) -> Self {
        BmcCorrectionSetFinder {
            bmc: BmcDebugger::new(vars, tr.clone(), gs),
            ic3: Ic3Debugger::new(vars, tr.clone(), gs),
            tr,
            gs: gs.clone(),
            exhausted_cardinality: 0,
            k_max: gs.opts.mcs_bmc_kmax,
            k_min: gs.opts.mcs_bmc_kmin,
            exhausted: BTreeSet::new(),
        }
    }

    fn set_bmc_cardinality(&mut self, n: u32) {
        if n as usize >= self.tr.num_gates() {
            self.bmc.clear_cardinality();
        } else {
            self.bmc.set_cardinality(n);
        }
    }

    fn exhaust(&mut self, k: u32, n: u32) {
        self.exhausted.insert((k, n));
    }

    fn is_exhausted(&self, k: u32, n: u32) -> bool {
        n <= self.exhausted_cardinality || self.exhausted.contains(&(k, n))
    }

    fn check_at(&mut self, k: u32, cardinality: u32) -> bool {
        if self.is_exhausted(k, cardinality) {
            return false;
        }
        self.set_bmc_cardinality(cardinality);
        let (sat, _) = self.bmc.debug_at_k(k);
        sat
    }

    fn find_at(&mut self, gates: Option<&[Id]>, k: u32, cardinality: u32) -> FindMcsResult {
        if self.is_exhausted(k, cardinality) {
            return (false, CorrectionSet::new());
        }
        self.set_bmc_cardinality(cardinality);
        let (sat, corr) = match gates {
            Some(g) => self.bmc.debug_over_gates_at_k(g, k),
            None => self.bmc.debug_at_k(k),
        };
        if sat {
            self.block(&corr);
        }
        (sat, corr)
    }

    fn find_fallback(&mut self, gates: Option<&[Id]>, n: u32) -> FindMcsResult {
        let limit = match gates {
            Some(g) => g.len() as u32,
            None => self.tr.num_gates() as u32,
        };
        let n_max = n.min(limit);

        let mut more_checked = false;
        let mut more_exist = false;
        let start = self.exhausted_cardinality + 1;
        for cardinality in start..=n_max {
            self.ic3.set_cardinality(cardinality);

            let (sat, corr) = match gates {
                Some(g) => self.ic3.debug_over_gates(g),
                None => self.ic3.debug(),
            };
            if sat {
                self.block(&corr);
                return (true, corr);
            }

            if gates.is_none() {
                self.exhausted_cardinality = cardinality;
            }

            if !more_checked {
                more_exist = self.more_correction_sets();
                more_checked = true;
            }
            if !more_exist {
                break;
            }
        }
        (false, CorrectionSet::new())
    }

    fn more_correction_sets_bmc(&mut self, n: u32) -> bool {
        self.set_bmc_cardinality(n);
        let (sat, _) = self.bmc.debug_range(0, self.k_max);
        sat
    }

    fn more_correction_sets_ic3(&mut self, n: u32) -> bool {
        if n as usize >= self.tr.num_gates() {
            self.ic3.clear_cardinality();
        } else {
            self.ic3.set_cardinality(n);
        }
        let (sat, _) = self.ic3.debug();
        sat
    }
}

impl CorrectionSetFinder for BmcCorrectionSetFinder {
    fn find_next_over_gates(&mut self, gates: &[Id], n: u32) -> FindMcsResult {
        let n_max = n
            .min(gates.len() as u32)
            .min(self.gs.opts.mcs_bmc_nmax);

        let start = self.exhausted_cardinality + 1;
        for cardinality in start..=n_max {
            for k in 0..=self.k_max {
                let result = self.find_at(Some(gates), k, cardinality);
                if result.0 {
                    return result;
                }
                if self.gs.opts.mcs_try_to_exhaust && !self.check_at(k, cardinality) {
                    self.exhaust(k, cardinality);
                }
            }
        }

        self.find_fallback(Some(gates), n)
    }

    fn find_next(&mut self, n: u32) -> FindMcsResult {
        let n_max = n
            .min(self.tr.num_gates() as u32)
            .min(self.gs.opts.mcs_bmc_nmax);

        let start = self.exhausted_cardinality + 1;
        for cardinality in start..=n_max {
            for k in 0..=self.k_max {
                let result = self.find_at(None, k, cardinality);
                if result.0 {
                    return result;
                }
                self.exhaust(k, cardinality);
            }
        }
        self.find_fallback(None, n)
    }

    fn more_correction_sets_at(&mut self, n: u32) -> bool {
        if self.more_correction_sets_bmc(n) {
            return true;
        }
        self.more_correction_sets_ic3(n)
    }

    fn block(&mut self, corr: &CorrectionSet) {
        self.bmc.block_solution(corr);
        self.ic3.block_solution(corr);
    }

    fn num_gates(&self) -> usize {
        self.tr.num_gates()
    }

    fn all_gates(&self) -> Vec<Id> {
        self.tr.gate_ids()
    }

    /// Walk the grid cardinality-major, giving up on a depth after a few
    /// consecutive dry values of k. Every set found is minimal for its
    /// depth.
    fn find_batch(&mut self, n: u32) -> Vec<CorrectionSet> {
        let mut result = Vec::new();
        let n_max = n
            .min(self.tr.num_gates() as u32)
            .min(self.gs.opts.mcs_bmc_nmax);
        if n_max == 0 {
            return result;
        }

        for cardinality in 1..=n_max {
            let mut last_soln = 0u32;
            let mut k = 0u32;
            while k <= self.k_max {
                let (sat, corr) = self.find_at(None, k, cardinality);
                if sat {
                    result.push(corr);
                    last_soln = k;
                    self.k_min = self.k_min.max(k);
                } else {
                    self.exhaust(k, cardinality);
                    k += 1;
                }

                debug_assert!(self.k_min <= self.k_max);
                if k >= last_soln + 3 && k >= self.k_min {
                    self.k_max = k;
                    break;
                }
            }
        }
        result
    }
}
