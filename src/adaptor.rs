//! The SAT adaptor: translates engine literals to backend literals,
//! auto-introducing backend variables on first use, and layers activation
//! groups and critical-assumption extraction over the narrow backend
//! interface.
//!
//! A primed literal maps to its own backend variable; only the negation flag
//! is stripped before lookup, so frames never collide.
use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};

use crate::sat::{slit, svar, SatBackend, SatLit, SatSolver, SatValue, SatVar};
use crate::types::*;

/// An activation group. Internally a fresh backend variable assumed while
/// the group is active.
pub type GroupId = SatVar;

pub struct SatAdaptor {
    backend: SatBackend,
    solver: Box<dyn SatSolver>,
    id_to_sat: HashMap<Id, SatVar>,
    sat_to_id: HashMap<SatVar, Id>,
    groups: HashSet<SatVar>,
}

impl Default for SatAdaptor {
    fn default() -> Self {
        SatAdaptor::new(SatBackend::Cadical)
    }
}

impl SatAdaptor {
    pub fn new(backend: SatBackend) -> Self {
        let mut adaptor = SatAdaptor {
            backend,
            solver: backend.instantiate(),
            id_to_sat: HashMap::new(),
            sat_to_id: HashMap::new(),
            groups: HashSet::new(),
        };
        adaptor.seed_constants();
        adaptor
    }

    pub fn simplifying() -> Self {
        SatAdaptor::new(SatBackend::CadicalSimp)
    }

    fn seed_constants(&mut self) {
        self.introduce_variable(ID_TRUE);
        self.add_clause(&[ID_TRUE]);
    }

    /// Rebuild the backend, reseed the truth constant, clear groups.
    pub fn reset(&mut self) {
        self.solver = self.backend.instantiate();
        self.id_to_sat.clear();
        self.sat_to_id.clear();
        self.groups.clear();
        self.seed_constants();
    }

    pub fn introduce_variable(&mut self, id: Id) {
        let stripped = strip(id);
        if self.id_to_sat.contains_key(&stripped) {
            return;
        }
        let var = self.solver.new_var();
        self.id_to_sat.insert(stripped, var);
        debug_assert!(!self.sat_to_id.contains_key(&var));
        self.sat_to_id.insert(var, stripped);
    }

    pub fn has_sat(&self, id: Id) -> bool {
        self.id_to_sat.contains_key(&strip(id))
    }

    fn to_sat(&self, id: Id) -> SatLit {
        let var = *self
            .id_to_sat
            .get(&strip(id))
            .expect("literal has no backend variable");
        slit(var, is_negated(id))
    }

    fn to_sat_vec(&mut self, ids: &[Id]) -> Vec<SatLit> {
        ids.iter()
            .map(|&id| {
                self.introduce_variable(id);
                self.to_sat(id)
            })
            .collect()
    }

    fn from_sat(&self, lit: SatLit) -> Id {
        let id = *self
            .sat_to_id
            .get(&svar(lit))
            .expect("backend variable has no engine literal");
        if crate::sat::sneg(lit) {
            negate(id)
        } else {
            id
        }
    }

    pub fn add_clause(&mut self, cls: &[Id]) {
        assert!(!cls.is_empty(), "empty clauses are not accepted");
        let satcls = self.to_sat_vec(cls);
        self.solver.add_clause(&satcls);
    }

    pub fn add_clauses(&mut self, vec: &[Clause]) {
        for cls in vec {
            self.add_clause(cls);
        }
    }

    pub fn solve(&mut self, assumps: &[Id]) -> bool {
        self.group_solve_with(None, assumps, None)
    }

    pub fn solve_with_crits(&mut self, assumps: &[Id], crits: &mut Cube) -> bool {
        self.group_solve_with(None, assumps, Some(crits))
    }

    pub fn group_solve(&mut self, group: GroupId, assumps: &[Id]) -> bool {
        self.group_solve_with(Some(group), assumps, None)
    }

    pub fn group_solve_with_crits(
        &mut self,
        group: GroupId,
        assumps: &[Id],
        crits: &mut Cube,
    ) -> bool {
        self.group_solve_with(Some(group), assumps, Some(crits))
    }

    /// At most one group can be activated per call. Group literals are
    /// filtered out of the reported criticals.
    fn group_solve_with(
        &mut self,
        group: Option<GroupId>,
        assumps: &[Id],
        crits: Option<&mut Cube>,
    ) -> bool {
        let mut satassumps = self.to_sat_vec(assumps);
        if let Some(g) = group {
            debug_assert!(self.groups.contains(&g));
            satassumps.push(slit(g, false));
        }

        let mut satcrits = Vec::new();
        let want = crits.is_some();
        let sat = self
            .solver
            .solve_with(&satassumps, if want { Some(&mut satcrits) } else { None });

        if let Some(out) = crits {
            out.clear();
            if !sat {
                for satlit in satcrits {
                    if self.groups.contains(&svar(satlit)) {
                        continue;
                    }
                    let lit = self.from_sat(satlit);
                    debug_assert!(assumps.contains(&lit));
                    out.push(lit);
                }
            }
        }

        sat
    }

    pub fn is_sat(&self) -> bool {
        self.solver.is_sat()
    }

    /// Assignment of a literal; `Undef` for variables the solver has never
    /// seen.
    pub fn safe_get_assignment(&self, lit: Id) -> SatValue {
        debug_assert!(self.is_sat());
        if !self.has_sat(lit) {
            return SatValue::Undef;
        }
        self.solver.value(self.to_sat(lit))
    }

    pub fn safe_get_assignment_to_var(&self, var: Id) -> SatValue {
        debug_assert!(!is_negated(var));
        self.safe_get_assignment(var)
    }

    /// Assignment of a literal; panics on `Undef`.
    pub fn get_assignment(&self, lit: Id) -> SatValue {
        let asgn = self.safe_get_assignment(lit);
        assert!(asgn != SatValue::Undef, "assignment of unknown literal");
        asgn
    }

    pub fn get_assignment_to_var(&self, var: Id) -> SatValue {
        debug_assert!(!is_negated(var));
        self.get_assignment(var)
    }

    pub fn freeze(&mut self, id: Id) {
        self.introduce_variable(id);
        let var = svar(self.to_sat(id));
        self.solver.freeze(var);
    }

    /// Freeze a set of literals, optionally together with their one-primed
    /// forms.
    pub fn freeze_all<'a, I: IntoIterator<Item = &'a Id>>(&mut self, ids: I, primes: bool) {
        for &id in ids {
            self.freeze(id);
            if primes {
                self.freeze(prime(id));
            }
        }
    }

    /// Run variable elimination on the simplifying backend and return the
    /// residual CNF (clauses plus the unit trail).
    pub fn simplify(&mut self) -> ClauseVec {
        self.solver.eliminate();
        let mut simplified = ClauseVec::new();
        for satcls in self.solver.residual_clauses() {
            simplified.push(satcls.iter().map(|&l| self.from_sat(l)).collect());
        }
        for satlit in self.solver.residual_units() {
            simplified.push(vec![self.from_sat(satlit)]);
        }
        simplified
    }

    pub fn create_group(&mut self) -> GroupId {
        let gid = self.solver.new_var();
        self.groups.insert(gid);
        gid
    }

    /// Store `cls ∨ ¬g`: active only while `g` is assumed.
    pub fn add_group_clause(&mut self, group: GroupId, cls: &[Id]) {
        assert!(!cls.is_empty(), "empty clauses are not accepted");
        let mut satcls = self.to_sat_vec(cls);
        satcls.push(slit(group, true));
        self.solver.add_clause(&satcls);
    }
}

/// Variant that skips clauses already added (compared as sorted literal
/// sets). Group clauses are not deduplicated.
pub struct ClauseDedupSatAdaptor {
    inner: SatAdaptor,
    clauses: HashSet<Clause>,
}

impl Default for ClauseDedupSatAdaptor {
    fn default() -> Self {
        ClauseDedupSatAdaptor::new(SatBackend::Cadical)
    }
}

impl ClauseDedupSatAdaptor {
    pub fn new(backend: SatBackend) -> Self {
        ClauseDedupSatAdaptor {
            inner: SatAdaptor::new(backend),
            clauses: HashSet::new(),
        }
    }

    pub fn add_clause(&mut self, cls: &[Id]) {
        let sorted = sort_cube(cls);
        if self.clauses.insert(sorted.clone()) {
            self.inner.add_clause(&sorted);
        }
    }

    pub fn add_clauses(&mut self, vec: &[Clause]) {
        for cls in vec {
            self.add_clause(cls);
        }
    }

    pub fn reset(&mut self) {
        self.clauses.clear();
        self.inner.reset();
    }
}

impl Deref for ClauseDedupSatAdaptor {
    type Target = SatAdaptor;
    fn deref(&self) -> &SatAdaptor {
        &self.inner
    }
}

impl DerefMut for ClauseDedupSatAdaptor {
    fn deref_mut(&mut self) -> &mut SatAdaptor {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::VariableManager;

    #[test]
    fn test_basic_solving() {
        let vars = VariableManager::new();
        let a = vars.new_internal("a");
        let b = vars.new_internal("b");
        let mut solver = SatAdaptor::default();
        solver.add_clause(&[a, b]);
        solver.add_clause(&[negate(a)]);
        assert!(solver.solve(&[]));
        assert_eq!(solver.get_assignment_to_var(b), SatValue::True);
        assert_eq!(solver.get_assignment(negate(b)), SatValue::False);
        assert!(!solver.solve(&[negate(b)]));
    }

    #[test]
    fn test_constants_are_seeded() {
        let mut solver = SatAdaptor::default();
        assert!(solver.solve(&[]));
        assert_eq!(solver.get_assignment(ID_TRUE), SatValue::True);
        assert_eq!(solver.get_assignment(ID_FALSE), SatValue::False);
        assert!(!solver.solve(&[ID_FALSE]));
    }

    #[test]
    fn test_criticals() {
        let vars = VariableManager::new();
        let a = vars.new_internal("a");
        let b = vars.new_internal("b");
        let c = vars.new_internal("c");
        let mut solver = SatAdaptor::default();
        solver.add_clause(&[negate(a), b]);
        let mut crits = Cube::new();
        assert!(!solver.solve_with_crits(&[a, negate(b), c], &mut crits));
        assert!(crits.contains(&a));
        assert!(crits.contains(&negate(b)));
        assert!(!crits.contains(&c));
    }

    #[test]
    fn test_groups_are_retractable() {
        let vars = VariableManager::new();
        let a = vars.new_internal("a");
        let mut solver = SatAdaptor::default();
        let g = solver.create_group();
        solver.add_group_clause(g, &[negate(a)]);
        // With the group active, a is forced false.
        assert!(solver.group_solve(g, &[]));
        assert_eq!(solver.get_assignment_to_var(a), SatValue::False);
        assert!(!solver.group_solve(g, &[a]));
        // Without the group, a is free again.
        assert!(solver.solve(&[a]));
    }

    #[test]
    fn test_group_not_reported_critical() {
        let vars = VariableManager::new();
        let a = vars.new_internal("a");
        let mut solver = SatAdaptor::default();
        let g = solver.create_group();
        solver.add_group_clause(g, &[negate(a)]);
        let mut crits = Cube::new();
        assert!(!solver.group_solve_with_crits(g, &[a], &mut crits));
        assert_eq!(crits, vec![a]);
    }

    #[test]
    fn test_reset_clears_state() {
        let vars = VariableManager::new();
        let a = vars.new_internal("a");
        let mut solver = SatAdaptor::default();
        solver.add_clause(&[negate(a)]);
        assert!(!solver.solve(&[a]));
        solver.reset();
        assert!(solver.solve(&[a]));
    }

    #[test]
    fn test_primed_literals_are_distinct() {
        let vars = VariableManager::new();
        let a = vars.new_internal("a");
        let mut solver = SatAdaptor::default();
        solver.add_clause(&[a]);
        solver.add_clause(&[negate(prime(a))]);
        assert!(solver.solve(&[]));
        assert_eq!(solver.get_assignment_to_var(a), SatValue::True);
        assert_eq!(solver.get_assignment_to_var(prime(a)), SatValue::False);
    }

    #[test]
    fn test_dedup_variant() {
        let vars = VariableManager::new();
        let a = vars.new_internal("a");
        let b = vars.new_internal("b");
        let mut solver = ClauseDedupSatAdaptor::default();
        solver.add_clause(&[a, b]);
        solver.add_clause(&[b, a]);
        assert_eq!(solver.clauses.len(), 1);
        assert!(solver.solve(&[negate(a)]));
    }

    #[test]
    fn test_simplify_round_trip() {
        let vars = VariableManager::new();
        let x = vars.new_internal("x");
        let y = vars.new_internal("y");
        let z = vars.new_internal("z");
        let mut simp = SatAdaptor::simplifying();
        simp.add_clause(&[x, y]);
        simp.add_clause(&[negate(y), z]);
        simp.freeze(x);
        simp.freeze(z);
        let residual = simp.simplify();
        // y must be gone; a downstream solver fed the residual CNF plus ~x
        // must force z.
        assert!(residual.iter().all(|cls| cls.iter().all(|&l| strip(l) != y)));
        let mut downstream = SatAdaptor::default();
        downstream.add_clauses(&residual);
        assert!(downstream.solve(&[negate(x)]));
        assert_eq!(downstream.get_assignment_to_var(z), SatValue::True);
    }
}
