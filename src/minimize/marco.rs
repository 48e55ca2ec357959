//! MARCO-style minimization: enumerate the seed lattice through MaxSAT
//! seed solvers, shrink safe inductive seeds, grow unsafe ones.
//!
//! In zigzag mode minimal and maximal seeds alternate; each direction gets
//! its own seed solver fed identical blocking clauses.
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use super::{MinimizerData, ProofMinimizer};
use crate::cons::{find_safe_mis, ConsecutionChecker};
use crate::logger::LogChannel;
use crate::maxsat::MaxSatSolver;
use crate::options::Gs;
use crate::sat::SatValue;
use crate::tr::TransitionRelation;
use crate::types::*;
use crate::vars::VariableManager;

type Seed = Vec<ClauseId>;

pub struct MarcoMinimizer {
    data: MinimizerData,
    seed_solver_up: MaxSatSolver,
    seed_solver_down: MaxSatSolver,
    ind_solver: ConsecutionChecker<TransitionRelation>,
    clause_to_seed_var: HashMap<ClauseId, Id>,
    seed_count: usize,
    lower_bound: usize,
    smallest_proof: Seed,
}

impl MarcoMinimizer {
    pub fn new(vars: &VariableManager, tr: Rc<TransitionRelation>, proof: &[Clause], gs: &Gs) -> Self {
        let mut minimizer = MarcoMinimizer {
            data: MinimizerData::new(vars, tr.clone(), proof, gs),
            seed_solver_up: MaxSatSolver::new(vars),
            seed_solver_down: MaxSatSolver::new(vars),
            ind_solver: ConsecutionChecker::new(vars, tr, gs),
            clause_to_seed_var: HashMap::new(),
            seed_count: 0,
            lower_bound: 0,
            smallest_proof: Seed::new(),
        };
        minimizer.init_solvers();
        minimizer
    }

    fn opts(&self) -> (bool, bool) {
        let opts = &self.data.gs().opts;
        (opts.marco_direction_up, opts.marco_direction_down)
    }

    fn is_direction_arbitrary(&self) -> bool {
        let (up, down) = self.opts();
        !up && !down
    }

    fn is_next_seed_minimum(&self) -> bool {
        let (up, down) = self.opts();
        if up && !down {
            return true;
        }
        up && down && self.seed_count % 2 == 1
    }

    fn is_next_seed_maximum(&self) -> bool {
        let (up, down) = self.opts();
        if down && !up {
            return true;
        }
        up && down && self.seed_count % 2 == 0
    }

    fn init_solvers(&mut self) {
        let arbitrary = self.is_direction_arbitrary();
        let property_clause = self.data.tr().property_clause();
        for id in 0..self.data.num_clauses() {
            let cls = self.data.clause_of(id).clone();
            self.ind_solver.add_clause(id, &cls);

            let seed_var = self.data.vars().new_internal("seed");
            if !arbitrary {
                self.seed_solver_up.add_for_optimization(negate(seed_var));
                self.seed_solver_down.add_for_optimization(seed_var);
            }
            self.clause_to_seed_var.insert(id, seed_var);

            // The property is always part of every seed.
            if cls == property_clause {
                self.seed_solver_up.add_clause(&vec![seed_var]);
                self.seed_solver_down.add_clause(&vec![seed_var]);
            }
        }
    }

    fn log(&self, v: i32, args: std::fmt::Arguments) {
        self.data.gs().logger.borrow().log(LogChannel::Marco, v, args);
    }

    fn seed_var_of(&self, cls: ClauseId) -> Id {
        self.clause_to_seed_var[&cls]
    }

    fn get_unexplored(&mut self) -> (bool, Seed) {
        let minimum = self.is_next_seed_minimum();
        let use_up = {
            let (up, down) = self.opts();
            if up && down {
                self.is_next_seed_minimum()
            } else {
                up || !down
            }
        };
        self.seed_count += 1;

        let solver = if use_up {
            &mut self.seed_solver_up
        } else {
            &mut self.seed_solver_down
        };
        if !solver.solve() {
            return (false, Seed::new());
        }

        let mut seed = Seed::new();
        for id in 0..self.data.num_clauses() {
            let seed_var = self.clause_to_seed_var[&id];
            match solver.safe_get_assignment_to_var(seed_var) {
                SatValue::True => seed.push(id),
                // A variable the map has never seen is a don't-care;
                // treat it as present (arbitrary mode only).
                SatValue::Undef => seed.push(id),
                SatValue::False => {}
            }
        }

        if minimum {
            debug_assert!(seed.len() >= self.lower_bound);
            self.lower_bound = seed.len();
            if !self.data.minimum_proof_known()
                && !self.smallest_proof.is_empty()
                && self.smallest_proof.len() <= self.lower_bound
            {
                let smallest = self.smallest_proof.clone();
                self.data.set_minimum_proof(&smallest);
            }
        }

        (true, seed)
    }

    fn find_sis(&mut self, seed: &mut Seed) -> bool {
        let property = self.data.property();
        find_safe_mis(&mut self.ind_solver, seed, &[property])
    }

    /// Add non-seed clauses that the seed already implies, to fixpoint.
    fn grow(&mut self, seed: &mut Seed) {
        let seed_set: BTreeSet<ClauseId> = seed.iter().copied().collect();
        let mut notseed: BTreeSet<ClauseId> = (0..self.data.num_clauses())
            .filter(|id| !seed_set.contains(id))
            .collect();

        let mut added = true;
        while added {
            added = false;
            let to_try: Vec<ClauseId> = notseed.iter().copied().collect();
            for id in to_try {
                let seed_now = seed.clone();
                if !self.ind_solver.solve(&seed_now, id) {
                    added = true;
                    seed.push(id);
                    notseed.remove(&id);
                }
            }
        }
    }

    /// Drop clauses one at a time, keeping the result a safe SIS.
    fn shrink(&mut self, seed: &mut Seed) {
        let property = self.data.property();
        let mut seed_copy = seed.clone();
        seed_copy.sort_unstable();
        seed_copy.dedup();

        let mut i = 0;
        while i < seed_copy.len() {
            let id = seed_copy[i];
            if id == property {
                i += 1;
                continue;
            }
            let mut test_seed: Seed = seed_copy
                .iter()
                .copied()
                .filter(|&c| c != id)
                .collect();

            if self.find_sis(&mut test_seed) {
                seed_copy = test_seed;
                seed_copy.sort_unstable();
                i = seed_copy.partition_point(|&c| c <= id);
            } else {
                i += 1;
            }
        }

        if seed_copy.len() < seed.len() {
            *seed = seed_copy;
        }
    }

    fn block_up(&mut self, seed: &Seed) {
        assert!(!seed.is_empty());
        let cls: Clause = seed.iter().map(|&id| negate(self.seed_var_of(id))).collect();
        self.seed_solver_up.add_clause(&cls);
        self.seed_solver_down.add_clause(&cls);
    }

    fn block_down(&mut self, seed: &Seed) {
        assert!(!seed.is_empty());
        let seed_set: BTreeSet<ClauseId> = seed.iter().copied().collect();
        let cls: Clause = (0..self.data.num_clauses())
            .filter(|id| !seed_set.contains(id))
            .map(|id| self.seed_var_of(id))
            .collect();

        // The whole proof can be the only MSIS; block the full lattice with
        // the false clause in that case.
        if cls.is_empty() {
            self.seed_solver_up.add_clause(&vec![ID_FALSE]);
            self.seed_solver_down.add_clause(&vec![ID_FALSE]);
        } else {
            self.seed_solver_up.add_clause(&cls);
            self.seed_solver_down.add_clause(&cls);
        }
    }

    fn update_proofs(&mut self, seed: &Seed) {
        assert!(!seed.is_empty());
        if self.smallest_proof.is_empty() || seed.len() < self.smallest_proof.len() {
            self.smallest_proof = seed.clone();
        }

        self.data.add_minimal_proof(seed);
        if !self.data.minimum_proof_known() && self.smallest_proof.len() <= self.lower_bound {
            let smallest = self.smallest_proof.clone();
            self.data.set_minimum_proof(&smallest);
        }
    }
}

impl ProofMinimizer for MarcoMinimizer {
    fn minimize(&mut self) {
        loop {
            let minimum = self.is_next_seed_minimum();
            let maximum = self.is_next_seed_maximum();
            debug_assert!(!(minimum && maximum));

            let (sat, seed) = self.get_unexplored();
            if !sat {
                break;
            }

            let mut mis = seed.clone();
            if self.find_sis(&mut mis) {
                self.log(
                    3,
                    format_args!("found a SIS seed of size {}", mis.len()),
                );
                if !minimum {
                    self.shrink(&mut mis);
                }
                self.log(2, format_args!("MSIS of size {}", mis.len()));
                self.block_up(&mis);
                self.update_proofs(&mis);
            } else {
                let mut seed = seed;
                self.log(
                    3,
                    format_args!("found a non-SIS seed of size {}", seed.len()),
                );
                if !maximum {
                    self.grow(&mut seed);
                }
                self.log(2, format_args!("MNIS of size {}", seed.len()));
                self.block_down(&seed);
            }
        }

        debug_assert!(!self.smallest_proof.is_empty());
        if !self.data.minimum_proof_known() {
            let smallest = self.smallest_proof.clone();
            self.data.set_minimum_proof(&smallest);
        }
    }

    fn data(&self) -> &MinimizerData {
        &self.data
    }
}
