//! Seed enumeration over the power-set lattice of a fixed ID set.
//!
//! `block_up(seed)` forbids the seed and every superset, `block_down(seed)`
//! the seed and every subset; `find_*_seed` returns a point of the
//! unexplored region, arbitrary, minimal, or maximal.
use std::collections::BTreeSet;

use crate::adaptor::SatAdaptor;
use crate::maxsat::MaxSatSolver;
use crate::sat::SatValue;
use crate::types::*;
use crate::vars::VariableManager;

pub type Seed = Vec<Id>;
pub type UnexploredResult = (bool, Seed);

/// Clause forbidding `seed` and all supersets: `(~c_1 V ... V ~c_n)`.
pub fn up_clause(seed: &Seed) -> Clause {
    assert!(!seed.is_empty());
    seed.iter()
        .map(|&id| {
            debug_assert!(!is_negated(id));
            negate(id)
        })
        .collect()
}

/// Clause forbidding `seed` and all subsets: the disjunction of the IDs not
/// in the seed, degenerating to `{ID_FALSE}` when the seed is the full set.
pub fn down_clause(ids: &BTreeSet<Id>, seed: &Seed) -> Clause {
    assert!(!seed.is_empty());
    let seed_set: BTreeSet<Id> = seed.iter().copied().collect();
    let cls: Clause = ids
        .iter()
        .copied()
        .filter(|id| !seed_set.contains(id))
        .collect();
    if cls.is_empty() {
        vec![ID_FALSE]
    } else {
        cls
    }
}

pub trait MapSolver {
    fn ids(&self) -> &BTreeSet<Id>;
    fn add_clause(&mut self, cls: &Clause);

    fn find_seed(&mut self) -> UnexploredResult;
    fn check_seed(&mut self, seed: &Seed) -> bool;

    fn find_minimal_seed(&mut self) -> UnexploredResult {
        panic!("find_minimal_seed called on a map solver that does not support it");
    }

    fn find_maximal_seed(&mut self) -> UnexploredResult {
        panic!("find_maximal_seed called on a map solver that does not support it");
    }

    fn block_up(&mut self, seed: &Seed) {
        let cls = up_clause(seed);
        self.add_clause(&cls);
    }

    fn block_down(&mut self, seed: &Seed) {
        let cls = down_clause(self.ids(), seed);
        self.add_clause(&cls);
    }

    /// Assumptions fixing the full polarity of a seed.
    fn seed_assumps(&self, seed: &Seed) -> Cube {
        let seed_set: BTreeSet<Id> = seed.iter().copied().collect();
        self.ids()
            .iter()
            .map(|&id| if seed_set.contains(&id) { id } else { negate(id) })
            .collect()
    }
}

/// Plain-SAT map solver returning arbitrary seeds. Variables the map has
/// never constrained are don't-cares and count as present.
pub struct SatArbitraryMapSolver {
    ids: BTreeSet<Id>,
    map: SatAdaptor,
}

impl SatArbitraryMapSolver {
    pub fn new(_vars: &VariableManager, ids: &[Id]) -> Self {
        SatArbitraryMapSolver {
            ids: ids.iter().copied().collect(),
            map: SatAdaptor::default(),
        }
    }

    fn extract_seed(&self) -> Seed {
        self.ids
            .iter()
            .copied()
            .filter(|&id| self.map.safe_get_assignment_to_var(id) != SatValue::False)
            .collect()
    }

    /// Shrink by trial removals under the current blocking clauses.
    fn shrink(&mut self, seed: &mut Seed) {
        let mut i = 0;
        while i < seed.len() {
            let mut test = seed.clone();
            test.remove(i);
            if self.check_seed(&test) {
                *seed = test;
            } else {
                i += 1;
            }
        }
    }

    /// Grow by trial additions under the current blocking clauses.
    fn grow(&mut self, seed: &mut Seed) {
        let ids: Vec<Id> = self.ids.iter().copied().collect();
        for id in ids {
            if seed.contains(&id) {
                continue;
            }
            let mut test = seed.clone();
            test.push(id);
            if self.check_seed(&test) {
                *seed = test;
            }
        }
    }
}

impl MapSolver for SatArbitraryMapSolver {
    fn ids(&self) -> &BTreeSet<Id> {
        &self.ids
    }

    fn add_clause(&mut self, cls: &Clause) {
        self.map.add_clause(cls);
    }

    fn find_seed(&mut self) -> UnexploredResult {
        if self.map.solve(&[]) {
            (true, self.extract_seed())
        } else {
            (false, Seed::new())
        }
    }

    fn find_minimal_seed(&mut self) -> UnexploredResult {
        let (sat, mut seed) = self.find_seed();
        if !sat {
            return (false, seed);
        }
        self.shrink(&mut seed);
        (true, seed)
    }

    fn find_maximal_seed(&mut self) -> UnexploredResult {
        let (sat, mut seed) = self.find_seed();
        if !sat {
            return (false, seed);
        }
        self.grow(&mut seed);
        (true, seed)
    }

    fn check_seed(&mut self, seed: &Seed) -> bool {
        let assumps = self.seed_assumps(seed);
        self.map.solve(&assumps)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Minimal,
    Maximal,
}

/// MaxSAT-backed map solver optimizing seed size in one direction.
struct MaxSatDirectedMap {
    ids: BTreeSet<Id>,
    map: MaxSatSolver,
    inited: bool,
    direction: Direction,
}

impl MaxSatDirectedMap {
    fn new(vars: &VariableManager, ids: &[Id], direction: Direction) -> Self {
        MaxSatDirectedMap {
            ids: ids.iter().copied().collect(),
            map: MaxSatSolver::new(vars),
            inited: false,
            direction,
        }
    }

    fn init_if_necessary(&mut self) {
        if self.inited {
            return;
        }
        for &id in &self.ids {
            match self.direction {
                Direction::Minimal => self.map.add_for_optimization(negate(id)),
                Direction::Maximal => self.map.add_for_optimization(id),
            }
        }
        self.inited = true;
    }

    fn find(&mut self) -> UnexploredResult {
        self.init_if_necessary();
        if !self.map.solve() {
            return (false, Seed::new());
        }
        let seed = self
            .ids
            .iter()
            .copied()
            .filter(|&id| self.map.get_assignment_to_var(id) == SatValue::True)
            .collect();
        (true, seed)
    }

    fn check(&mut self, assumps: &Cube) -> bool {
        self.init_if_necessary();
        self.map.check(assumps)
    }

    fn add_clause(&mut self, cls: &Clause) {
        self.map.add_clause(cls);
    }
}

pub struct MaxSatMinimalMapSolver {
    inner: MaxSatDirectedMap,
}

impl MaxSatMinimalMapSolver {
    pub fn new(vars: &VariableManager, ids: &[Id]) -> Self {
        MaxSatMinimalMapSolver {
            inner: MaxSatDirectedMap::new(vars, ids, Direction::Minimal),
        }
    }
}

impl MapSolver for MaxSatMinimalMapSolver {
    fn ids(&self) -> &BTreeSet<Id> {
        &self.inner.ids
    }

    fn add_clause(&mut self, cls: &Clause) {
        self.inner.add_clause(cls);
    }

    fn find_seed(&mut self) -> UnexploredResult {
        self.inner.find()
    }

    fn find_minimal_seed(&mut self) -> UnexploredResult {
        self.inner.find()
    }

    fn check_seed(&mut self, seed: &Seed) -> bool {
        let assumps = self.seed_assumps(seed);
        self.inner.check(&assumps)
    }
}

pub struct MaxSatMaximalMapSolver {
    inner: MaxSatDirectedMap,
}

impl MaxSatMaximalMapSolver {
    pub fn new(vars: &VariableManager, ids: &[Id]) -> Self {
        MaxSatMaximalMapSolver {
            inner: MaxSatDirectedMap::new(vars, ids, Direction::Maximal),
        }
    }
}

impl MapSolver for MaxSatMaximalMapSolver {
    fn ids(&self) -> &BTreeSet<Id> {
        &self.inner.ids
    }

    fn add_clause(&mut self, cls: &Clause) {
        self.inner.add_clause(cls);
    }

    fn find_seed(&mut self) -> UnexploredResult {
        self.inner.find()
    }

    fn find_maximal_seed(&mut self) -> UnexploredResult {
        self.inner.find()
    }

    fn check_seed(&mut self, seed: &Seed) -> bool {
        let assumps = self.seed_assumps(seed);
        self.inner.check(&assumps)
    }
}

/// Both directions behind one front: every clause goes to both underlying
/// solvers, and each request is routed to the solver optimizing that way.
pub struct MaxSatArbitraryMapSolver {
    min: MaxSatMinimalMapSolver,
    max: MaxSatMaximalMapSolver,
}

impl MaxSatArbitraryMapSolver {
    pub fn new(vars: &VariableManager, ids: &[Id]) -> Self {
        MaxSatArbitraryMapSolver {
            min: MaxSatMinimalMapSolver::new(vars, ids),
            max: MaxSatMaximalMapSolver::new(vars, ids),
        }
    }
}

impl MapSolver for MaxSatArbitraryMapSolver {
    fn ids(&self) -> &BTreeSet<Id> {
        self.min.ids()
    }

    fn add_clause(&mut self, cls: &Clause) {
        self.min.add_clause(cls);
        self.max.add_clause(cls);
    }

    fn find_seed(&mut self) -> UnexploredResult {
        self.min.find_seed()
    }

    fn find_minimal_seed(&mut self) -> UnexploredResult {
        self.min.find_minimal_seed()
    }

    fn find_maximal_seed(&mut self) -> UnexploredResult {
        self.max.find_maximal_seed()
    }

    fn check_seed(&mut self, seed: &Seed) -> bool {
        self.min.check_seed(seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_ids(n: usize) -> (VariableManager, Vec<Id>) {
        let vars = VariableManager::new();
        let ids = (0..n)
            .map(|i| vars.new_internal(&format!("g{}", i)))
            .collect();
        (vars, ids)
    }

    #[test]
    fn test_block_up_forbids_supersets() {
        let (vars, ids) = mk_ids(4);
        let mut map = SatArbitraryMapSolver::new(&vars, &ids);
        let seed = vec![ids[0], ids[1]];
        map.block_up(&seed);
        assert!(!map.check_seed(&seed));
        assert!(!map.check_seed(&vec![ids[0], ids[1], ids[2]]));
        assert!(!map.check_seed(&ids.to_vec()));
        assert!(map.check_seed(&vec![ids[0]]));
        assert!(map.check_seed(&vec![ids[0], ids[2]]));
    }

    #[test]
    fn test_block_down_forbids_subsets() {
        let (vars, ids) = mk_ids(4);
        let mut map = SatArbitraryMapSolver::new(&vars, &ids);
        let seed = vec![ids[0], ids[1]];
        map.block_down(&seed);
        assert!(!map.check_seed(&seed));
        assert!(!map.check_seed(&vec![ids[0]]));
        assert!(!map.check_seed(&Seed::new()));
        assert!(map.check_seed(&vec![ids[0], ids[2]]));
        assert!(map.check_seed(&ids.to_vec()));
    }

    #[test]
    fn test_block_down_full_set_degenerates() {
        let (vars, ids) = mk_ids(3);
        let mut map = SatArbitraryMapSolver::new(&vars, &ids);
        map.block_down(&ids.to_vec());
        let (sat, _) = map.find_seed();
        assert!(!sat);
    }

    #[test]
    fn test_enumeration_covers_power_set() {
        // Repeatedly block the one-element subspace of the first returned
        // literal; after every gate is blocked, only the empty seed is
        // unexplored and every non-empty subset reports blocked.
        let (vars, ids) = mk_ids(4);
        let mut map = SatArbitraryMapSolver::new(&vars, &ids);
        let mut rounds = 0;
        loop {
            let (sat, seed) = map.find_seed();
            assert!(sat);
            if seed.is_empty() {
                break;
            }
            rounds += 1;
            assert!(rounds <= 4, "enumeration failed to converge");
            map.block_up(&vec![seed[0]]);
        }
        assert_eq!(rounds, 4);
        for mask in 1..16u32 {
            let subset: Seed = ids
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, &id)| id)
                .collect();
            assert!(!map.check_seed(&subset));
        }
        assert!(map.check_seed(&Seed::new()));
    }

    #[test]
    fn test_maxsat_directions() {
        let (vars, ids) = mk_ids(3);
        let mut map = MaxSatArbitraryMapSolver::new(&vars, &ids);
        let (sat, seed) = map.find_minimal_seed();
        assert!(sat);
        assert!(seed.is_empty());
        let (sat, seed) = map.find_maximal_seed();
        assert!(sat);
        assert_eq!(seed.len(), 3);

        // Block the top; the next maximal seed moves down one rank.
        map.block_up(&vec![ids[0], ids[1], ids[2]]);
        let (sat, seed) = map.find_maximal_seed();
        assert!(sat);
        assert_eq!(seed.len(), 2);

        // Block every singleton upward: only the empty seed stays open.
        map.block_up(&vec![ids[0]]);
        map.block_up(&vec![ids[1]]);
        map.block_up(&vec![ids[2]]);
        let (sat, seed) = map.find_minimal_seed();
        assert!(sat);
        assert!(seed.is_empty());
        let (sat, _) = map.find_maximal_seed();
        assert!(sat);
    }
}
