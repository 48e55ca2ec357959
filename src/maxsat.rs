//! Core-guided MaxSAT over soft unit literals, MSU3-style: unsatisfiable
//! cores relax their soft literals into a shared totalizer whose bound
//! grows by one per core. The first satisfiable call is optimal.
//!
//! Also home of the minimal-hitting-set solver built on top of it.
use std::collections::HashSet;

use crate::adaptor::SatAdaptor;
use crate::cardinality::{CardinalityConstraint, TotalizerCardinalityConstraint};
use crate::sat::SatValue;
use crate::types::*;
use crate::vars::VariableManager;

pub struct MaxSatSolver {
    vars: VariableManager,
    solver: SatAdaptor,
    soft: Vec<Id>,
    relaxed: HashSet<Id>,
    tot: TotalizerCardinalityConstraint,
    bound: u32,
}

impl MaxSatSolver {
    pub fn new(vars: &VariableManager) -> Self {
        MaxSatSolver {
            vars: vars.clone(),
            solver: SatAdaptor::default(),
            soft: Vec::new(),
            relaxed: HashSet::new(),
            tot: TotalizerCardinalityConstraint::new(vars),
            bound: 0,
        }
    }

    /// Add a soft unit: maximize the number of these that hold.
    pub fn add_for_optimization(&mut self, lit: Id) {
        self.soft.push(lit);
    }

    /// Add a hard clause.
    pub fn add_clause(&mut self, cls: &Clause) {
        self.solver.add_clause(cls);
    }

    pub fn add_clauses(&mut self, vec: &[Clause]) {
        self.solver.add_clauses(vec);
    }

    /// Find an assignment satisfying the hard clauses and a maximum number
    /// of soft units. `false` means the hard clauses alone are
    /// unsatisfiable.
    pub fn solve(&mut self) -> bool {
        self.solve_with_assumps(&[])
    }

    /// Optimal solve under extra (hard) assumptions.
    pub fn solve_with_assumps(&mut self, extra: &[Id]) -> bool {
        loop {
            let mut assumps: Cube = extra.to_vec();
            let unrelaxed: Vec<Id> = self
                .soft
                .iter()
                .copied()
                .filter(|l| !self.relaxed.contains(l))
                .collect();
            assumps.extend_from_slice(&unrelaxed);

            let bounded = !self.relaxed.is_empty() && self.bound < self.relaxed.len() as u32;
            if bounded {
                self.tot.set_cardinality(self.bound + 1);
                let cnf = self.tot.incremental_cnfize();
                self.solver.add_clauses(&cnf);
                assumps.extend(self.tot.assume_leq(self.bound));
            }

            let mut crits = Cube::new();
            if self.solver.solve_with_crits(&assumps, &mut crits) {
                return true;
            }

            let core_softs: Vec<Id> = crits
                .iter()
                .copied()
                .filter(|l| unrelaxed.contains(l))
                .collect();

            if core_softs.is_empty() {
                if !bounded {
                    // Nothing left to relax: the hard clauses conflict.
                    return false;
                }
                // The conflict lives in the totalizer bound alone.
                self.bound += 1;
                continue;
            }

            for s in core_softs {
                self.relaxed.insert(s);
                let r = self.vars.new_internal("relax");
                self.solver.add_clause(&[s, r]);
                self.tot.add_input(r);
            }
            self.bound += 1;
        }
    }

    /// Plain satisfiability under assumptions, ignoring the objective.
    pub fn check(&mut self, assumps: &[Id]) -> bool {
        self.solver.solve(assumps)
    }

    pub fn is_sat(&self) -> bool {
        self.solver.is_sat()
    }

    pub fn get_assignment_to_var(&self, var: Id) -> SatValue {
        self.solver.get_assignment_to_var(var)
    }

    pub fn safe_get_assignment_to_var(&self, var: Id) -> SatValue {
        self.solver.safe_get_assignment_to_var(var)
    }
}

/// Minimal hitting sets via MaxSAT: every element is a soft "not selected",
/// every added set a hard "select at least one of these".
pub struct HittingSetSolver {
    maxsat: MaxSatSolver,
    elems: Vec<Id>,
}

impl HittingSetSolver {
    pub fn new(vars: &VariableManager, elems: &[Id]) -> Self {
        let mut maxsat = MaxSatSolver::new(vars);
        for &e in elems {
            debug_assert!(!is_negated(e));
            maxsat.add_for_optimization(negate(e));
        }
        HittingSetSolver {
            maxsat,
            elems: elems.to_vec(),
        }
    }

    pub fn add_set(&mut self, set: &[Id]) {
        assert!(!set.is_empty());
        self.maxsat.add_clause(&set.to_vec());
    }

    /// A minimum-cardinality hitting set of all added sets.
    pub fn solve(&mut self) -> Option<Vec<Id>> {
        if !self.maxsat.solve() {
            return None;
        }
        let selected = self
            .elems
            .iter()
            .copied()
            .filter(|&e| self.maxsat.get_assignment_to_var(e) == SatValue::True)
            .collect();
        Some(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_vars(n: usize) -> (VariableManager, Vec<Id>) {
        let vars = VariableManager::new();
        let ids = (0..n)
            .map(|i| vars.new_internal(&format!("x{}", i)))
            .collect();
        (vars, ids)
    }

    #[test]
    fn test_all_soft_satisfiable() {
        let (vars, x) = mk_vars(3);
        let mut opt = MaxSatSolver::new(&vars);
        for &l in &x {
            opt.add_for_optimization(l);
        }
        assert!(opt.solve());
        for &l in &x {
            assert_eq!(opt.get_assignment_to_var(l), SatValue::True);
        }
    }

    #[test]
    fn test_one_soft_must_fall() {
        let (vars, x) = mk_vars(2);
        let mut opt = MaxSatSolver::new(&vars);
        opt.add_for_optimization(x[0]);
        opt.add_for_optimization(x[1]);
        opt.add_clause(&vec![negate(x[0]), negate(x[1])]);
        assert!(opt.solve());
        let sat = [x[0], x[1]]
            .iter()
            .filter(|&&l| opt.get_assignment_to_var(l) == SatValue::True)
            .count();
        assert_eq!(sat, 1);
    }

    #[test]
    fn test_hard_unsat() {
        let (vars, x) = mk_vars(1);
        let mut opt = MaxSatSolver::new(&vars);
        opt.add_for_optimization(x[0]);
        opt.add_clause(&vec![x[0]]);
        opt.add_clause(&vec![negate(x[0])]);
        assert!(!opt.solve());
    }

    #[test]
    fn test_optimum_counts() {
        // Pairwise exclusion over 4 vars: at most one can hold.
        let (vars, x) = mk_vars(4);
        let mut opt = MaxSatSolver::new(&vars);
        for &l in &x {
            opt.add_for_optimization(l);
        }
        for i in 0..4 {
            for j in i + 1..4 {
                opt.add_clause(&vec![negate(x[i]), negate(x[j])]);
            }
        }
        assert!(opt.solve());
        let sat = x
            .iter()
            .filter(|&&l| opt.get_assignment_to_var(l) == SatValue::True)
            .count();
        assert_eq!(sat, 1);
    }

    #[test]
    fn test_blocking_clauses_resolve() {
        // Maximize {x0, x1}; block the optimum and re-solve.
        let (vars, x) = mk_vars(2);
        let mut opt = MaxSatSolver::new(&vars);
        opt.add_for_optimization(x[0]);
        opt.add_for_optimization(x[1]);
        assert!(opt.solve());
        opt.add_clause(&vec![negate(x[0]), negate(x[1])]);
        assert!(opt.solve());
        let sat = x
            .iter()
            .filter(|&&l| opt.get_assignment_to_var(l) == SatValue::True)
            .count();
        assert_eq!(sat, 1);
    }

    #[test]
    fn test_hitting_sets() {
        let (vars, x) = mk_vars(4);
        let mut hs = HittingSetSolver::new(&vars, &x);
        hs.add_set(&[x[0], x[1]]);
        hs.add_set(&[x[1], x[2]]);
        // {x1} hits both sets.
        let hit = hs.solve().unwrap();
        assert_eq!(hit, vec![x[1]]);
        // Force x1 out: now two elements are needed.
        hs.add_set(&[x[0], x[2], x[3]]);
        hs.maxsat.add_clause(&vec![negate(x[1])]);
        let hit = hs.solve().unwrap();
        assert_eq!(hit.len(), 2);
        assert!(hit.contains(&x[0]) || hit.contains(&x[2]));
    }
}
