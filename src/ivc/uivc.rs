//! The unified IVC finder: upfront correction sets, zigzag map
//! exploration in a chosen direction mix, safety caches checked by
//! counterexample simulation and proof reuse, and UCBF-plus-brute-force
//! shrinking.
use std::collections::VecDeque;
use std::rc::Rc;

use super::ucbf::IvcUcbfFinder;
use super::{negate_gate_set, IvcFinder, IvcFinderData, Ivc};
use crate::cons::proof_witnesses_safety;
use crate::debug_tr::DebugTransitionRelation;
use crate::logger::LogChannel;
use crate::map::{
    MapSolver, MaxSatArbitraryMapSolver, SatArbitraryMapSolver, Seed,
};
use crate::mcs::{BasicMcsFinder, BmcCorrectionSetFinder, CorrectionSetFinder};
use crate::options::{MapSolverType, McsFinderType, Gs};
use crate::safety::{check_counter_example, HybridSafetyChecker, SafetyCounterExample, SafetyProof};
use crate::tr::TransitionRelation;
use crate::types::*;
use crate::vars::VariableManager;

pub struct UnifiedIvcFinder {
    data: IvcFinderData,
    debug_tr: Rc<DebugTransitionRelation>,
    map: Box<dyn MapSolver>,
    /// Companion map without the cone-of-influence hints, for exploration
    /// checks while hints are present in the main map.
    check_map: SatArbitraryMapSolver,
    cs_finder: Box<dyn CorrectionSetFinder>,
    gates: Vec<Id>,
    smallest_ivc: Ivc,
    mivc_lb: usize,
    seed_count: usize,
    proofs: VecDeque<SafetyProof>,
    cexes: VecDeque<SafetyCounterExample>,
}

impl UnifiedIvcFinder {
    pub fn new(vars: &VariableManager, tr: Rc<TransitionRelation>, gs: &Gs) -> Self {
        let debug_tr = Rc::new(DebugTransitionRelation::new(&tr));
        let gates = tr.gate_ids();

        let map: Box<dyn MapSolver> = match gs.opts.uivc_map_solver_type {
            MapSolverType::MaxSat => Box::new(MaxSatArbitraryMapSolver::new(vars, &gates)),
            MapSolverType::Sat => Box::new(SatArbitraryMapSolver::new(vars, &gates)),
        };
        let cs_finder: Box<dyn CorrectionSetFinder> = match gs.opts.uivc_mcs_finder_type {
            McsFinderType::Basic => Box::new(BasicMcsFinder::new(vars, debug_tr.clone(), gs)),
            McsFinderType::Bmc => Box::new(BmcCorrectionSetFinder::new(vars, debug_tr.clone(), gs)),
        };

        let mut finder = UnifiedIvcFinder {
            data: IvcFinderData::new(vars, tr, gs),
            check_map: SatArbitraryMapSolver::new(vars, &gates),
            map,
            cs_finder,
            debug_tr,
            gates,
            smallest_ivc: Ivc::new(),
            mivc_lb: 0,
            seed_count: 0,
            proofs: VecDeque::new(),
            cexes: VecDeque::new(),
        };
        if finder.data.gs().opts.uivc_coi_hints {
            finder.add_coi_to_map();
        }
        finder
    }

    fn log(&self, v: i32, args: std::fmt::Arguments) {
        self.data
            .gs()
            .logger
            .borrow()
            .log(LogChannel::UnifiedIvc, v, args);
    }

    /// Fanout implications: a gate absent from a seed lets its pure fanin
    /// cone go too.
    fn add_coi_to_map(&mut self) {
        use std::collections::HashMap;
        let tr = self.data.tr().clone();
        let mut fanout: HashMap<Id, Vec<Id>> = HashMap::new();
        for &gate in &self.gates {
            let rec = *tr.get_gate(gate);
            for &rhs in &[rec.rhs0, rec.rhs1] {
                let stripped = strip(rhs);
                if tr.is_gate(stripped) {
                    fanout.entry(stripped).or_default().push(gate);
                }
            }
        }
        for (gate, outs) in fanout {
            let mut cls: Clause = vec![negate(gate)];
            cls.extend(outs);
            self.map.add_clause(&cls);
        }
    }

    fn find_mcses_upfront(&mut self) {
        let n_max = self.data.gs().opts.uivc_upfront_nmax;
        if n_max == 0 {
            return;
        }

        let upfront = if n_max == u32::MAX {
            self.cs_finder.find_all(n_max)
        } else {
            self.cs_finder.find_batch(n_max)
        };

        for corr in upfront {
            self.log(
                3,
                format_args!("upfront correction set of size {}", corr.len()),
            );
            debug_assert!(!corr.is_empty());
            let mss = negate_gate_set(&self.gates, &corr);
            self.map.block_down(&mss);
            self.check_map.block_down(&mss);
        }
    }

    fn get_unexplored(&mut self) -> bool {
        let opts = &self.data.gs().opts;
        let (down, up) = (opts.uivc_direction_down, opts.uivc_direction_up);
        let even = self.seed_count % 2 == 0;
        self.seed_count += 1;

        // Even seeds prefer the down direction in zigzag mode.
        let choice = if even {
            if down {
                1
            } else if up {
                0
            } else {
                2
            }
        } else if up {
            0
        } else if down {
            1
        } else {
            2
        };

        match choice {
            0 => {
                let (sat, mut seed) = self.map.find_minimal_seed();
                if sat {
                    self.handle_seed(&mut seed, true, false);
                }
                sat
            }
            1 => {
                let (sat, mut seed) = self.map.find_maximal_seed();
                if sat {
                    self.handle_seed(&mut seed, false, true);
                }
                sat
            }
            _ => {
                let (sat, mut seed) = self.map.find_seed();
                if sat {
                    self.handle_seed(&mut seed, false, false);
                }
                sat
            }
        }
    }

    fn handle_seed(&mut self, seed: &mut Seed, is_minimal: bool, is_maximal: bool) {
        debug_assert!(!(is_minimal && is_maximal));
        debug_assert!(seed.len() >= self.mivc_lb || !is_minimal);

        if is_minimal {
            self.mivc_lb = seed.len();
        }

        let mut proof = SafetyProof::new();
        if self.is_safe(seed, Some(&mut proof)) {
            self.log(3, format_args!("found an IVC of size {}", seed.len()));

            if is_minimal && !self.data.minimum_ivc_known() {
                self.data.set_minimum_ivc(seed);
            }

            // Shrink (unless already minimal), then close off upward.
            if !is_minimal {
                self.shrink(seed, &proof);
            }
            self.map.block_up(seed);
            self.check_map.block_up(seed);

            self.record_mivc(seed);

            debug_assert!(seed.len() >= self.mivc_lb);
            if seed.len() == self.mivc_lb && !self.data.minimum_ivc_known() {
                self.data.set_minimum_ivc(seed);
            }
        } else {
            self.log(3, format_args!("found an unsafe seed of size {}", seed.len()));
            if !is_maximal {
                self.grow(seed);
            }
            self.map.block_down(seed);
            self.check_map.block_down(seed);
            self.log(1, format_args!("MNVC of size {}", seed.len()));
        }
    }

    fn shrink(&mut self, seed: &mut Seed, proof: &SafetyProof) {
        let gs = self.data.gs().clone();
        let check_map = gs.opts.uivc_check_map;

        {
            let mut ucbf = IvcUcbfFinder::new(self.data.vars(), self.data.tr().clone(), &gs);
            let map = if check_map {
                Some(&mut self.check_map)
            } else {
                None
            };
            ucbf.shrink_with_proof(seed, proof, map);
        }

        // A final brute-force pass here reuses the safety caches.
        let mut i = 0;
        while i < seed.len() {
            let mut candidate = seed.clone();
            candidate.remove(i);

            if check_map && !self.check_map.check_seed(&candidate) {
                i += 1;
                continue;
            }
            if self.is_safe(&candidate, None) {
                *seed = candidate;
            } else {
                i += 1;
            }
        }
        self.log(2, format_args!("shrunk down to {} gates", seed.len()));
    }

    fn grow(&mut self, seed: &mut Seed) {
        if self.data.gs().opts.uivc_mcs_grow {
            self.grow_by_mcs(seed);
        } else {
            self.grow_by_brute_force(seed);
        }
    }

    fn grow_by_mcs(&mut self, seed: &mut Seed) {
        let neg_seed = negate_gate_set(&self.gates, seed);
        let (sat, corr) = self.cs_finder.find_next_unbounded_over_gates(&neg_seed);
        assert!(sat, "an unsafe seed must have a correction set outside it");
        debug_assert!(!corr.is_empty());
        *seed = negate_gate_set(&self.gates, &corr);
    }

    fn grow_by_brute_force(&mut self, seed: &mut Seed) {
        let check_map = self.data.gs().opts.uivc_check_map;
        let gates = self.gates.clone();
        for gate in gates {
            if seed.contains(&gate) {
                continue;
            }
            seed.push(gate);
            if check_map && !self.check_map.check_seed(seed) {
                seed.pop();
            } else if self.is_safe(seed, None) {
                seed.pop();
            }
        }
    }

    fn should_check_safety(&self) -> bool {
        // With every correction set enumerated upfront, candidates are
        // hitting sets and therefore already safe (CAMUS-style).
        self.data.gs().opts.uivc_upfront_nmax != u32::MAX
    }

    fn is_safe(&mut self, seed: &Seed, proof_out: Option<&mut SafetyProof>) -> bool {
        if !self.should_check_safety() {
            return true;
        }

        let gs = self.data.gs().clone();
        let partial = Rc::new(TransitionRelation::abstracted(self.data.tr(), seed));

        // Counterexample replay is cheap; try the cache first.
        for i in 0..self.cexes.len() {
            if check_counter_example(&*partial, &self.cexes[i]) {
                let cex = self.cexes.remove(i).unwrap();
                self.cexes.push_front(cex);
                self.log(4, format_args!("found seed unsafe using cache"));
                return false;
            }
        }
        for i in 0..self.proofs.len() {
            if proof_witnesses_safety(self.data.vars(), partial.clone(), &gs, &self.proofs[i]) {
                let proof = self.proofs.remove(i).unwrap();
                self.proofs.push_front(proof);
                self.log(4, format_args!("found seed safe using cache"));
                if let Some(out) = proof_out {
                    *out = self.proofs.front().unwrap().clone();
                }
                return true;
            }
        }

        let mut checker = HybridSafetyChecker::new(self.data.vars(), partial, &gs);
        let result = checker.prove();

        if result.safe() {
            if let Some(out) = proof_out {
                *out = result.proof.clone();
            }
            self.cache_proof(result.proof);
            true
        } else {
            self.cache_counter_example(result.cex);
            false
        }
    }

    fn cache_counter_example(&mut self, cex: SafetyCounterExample) {
        let size = self.data.gs().opts.uivc_cex_cache;
        if size == 0 {
            return;
        }
        self.cexes.push_front(cex);
        if self.cexes.len() > size {
            self.cexes.pop_back();
        }
    }

    fn cache_proof(&mut self, proof: SafetyProof) {
        let size = self.data.gs().opts.uivc_proof_cache;
        if size == 0 {
            return;
        }
        self.proofs.push_front(proof);
        if self.proofs.len() > size {
            self.proofs.pop_back();
        }
    }

    fn record_mivc(&mut self, mivc: &Seed) {
        self.log(1, format_args!("MIVC of size {}", mivc.len()));
        if self.smallest_ivc.is_empty() || mivc.len() < self.smallest_ivc.len() {
            self.smallest_ivc = mivc.clone();
        }
        self.data.add_mivc(mivc);
    }
}

impl IvcFinder for UnifiedIvcFinder {
    fn find_ivcs(&mut self) {
        if self.data.tr().bad() == ID_FALSE {
            self.log(3, format_args!("output is a literal 0"));
            let empty = Ivc::new();
            self.data.add_mivc(&empty);
            return;
        }

        self.find_mcses_upfront();

        while self.get_unexplored() {}

        if !self.data.minimum_ivc_known() && !self.smallest_ivc.is_empty() {
            let smallest = self.smallest_ivc.clone();
            self.data.set_minimum_ivc(&smallest);
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
    use crate::options::{GlobalState, Options};

    fn circuit() -> (VariableManager, Rc<TransitionRelation>) {
        // bad = l & l via gate 6; gate 8 dangles. Single MIVC {6}.
        let mut aig = Aig::new();
        aig.inputs = vec![2];
        aig.latches = vec![AigLatch::new(4, 4, AigReset::Zero)];
        aig.ands = vec![AigAnd::new(6, 4, 4), AigAnd::new(8, 2, 4)];
        aig.outputs = vec![6];
        let vars = VariableManager::new();
        let tr = Rc::new(TransitionRelation::new(&vars, &aig).unwrap());
        (vars, tr)
    }

    fn run(gs: Gs) {
        let (vars, tr) = circuit();
        let needed = tr.vars().to_internal(6).unwrap();
        let mut finder = UnifiedIvcFinder::new(&vars, tr, &gs);
        finder.find_ivcs();
        assert_eq!(finder.num_mivcs(), 1);
        assert_eq!(finder.mivc(0), &vec![needed]);
        assert_eq!(finder.minimum_ivc(), &vec![needed]);
    }

    #[test]
    fn test_uivc_default_zigzag() {
        run(GlobalState::shared());
    }

    #[test]
    fn test_uivc_sat_map_and_basic_finder() {
        let mut opts = Options::default();
        opts.uivc_map_solver_type = MapSolverType::Sat;
        opts.uivc_mcs_finder_type = McsFinderType::Basic;
        run(GlobalState::new(opts));
    }

    #[test]
    fn test_uivc_up_only() {
        let mut opts = Options::default();
        opts.uivc_direction_down = false;
        run(GlobalState::new(opts));
    }
}
