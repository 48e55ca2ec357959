//! The simplifying backend: CaDiCaL's preprocessing (subsumption, bounded
//! variable elimination, and friends) behind the narrow interface.
//!
//! Frozen variables are pinned through CaDiCaL's freeze API, so callers can
//! rely on the residual CNF being equivalent over the frozen interface. The
//! residual formula is recovered by dumping the preprocessed clause set in
//! DIMACS form and reading it back; root-level units come along as unit
//! clauses. After `eliminate` the solver is only read back; downstream
//! solvers get the CNF re-sent rather than reusing this instance's state.
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::cadical::{from_dimacs, to_dimacs};
use super::{slit, svar, SatLit, SatSolver, SatValue, SatVar};

static DUMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn dump_path() -> PathBuf {
    let n = DUMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("provecore-simp-{}-{}.cnf", std::process::id(), n))
}

fn parse_dimacs(text: &str) -> Vec<Vec<SatLit>> {
    let mut clauses = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('c') || line.starts_with('p') {
            continue;
        }
        for tok in line.split_whitespace() {
            let lit: i32 = tok
                .parse()
                .expect("malformed literal in the dumped formula");
            if lit == 0 {
                clauses.push(std::mem::take(&mut current));
            } else {
                current.push(from_dimacs(lit));
            }
        }
    }
    debug_assert!(current.is_empty());
    clauses
}

pub struct SimpSolver {
    solver: RefCell<cadical::Solver>,
    nvars: usize,
    frozen: Vec<bool>,
    residual: Option<Vec<Vec<SatLit>>>,
}

impl Default for SimpSolver {
    fn default() -> SimpSolver {
        SimpSolver {
            solver: RefCell::new(cadical::Solver::new()),
            nvars: 0,
            frozen: Vec::new(),
            residual: None,
        }
    }
}

impl SimpSolver {
    pub fn new() -> SimpSolver {
        SimpSolver::default()
    }
}

impl SatSolver for SimpSolver {
    fn new_var(&mut self) -> SatVar {
        let v = self.nvars;
        self.nvars += 1;
        self.frozen.push(false);
        v
    }

    fn add_clause(&mut self, lits: &[SatLit]) {
        debug_assert!(lits.iter().all(|&l| svar(l) < self.nvars));
        self.solver
            .borrow_mut()
            .add_clause(lits.iter().map(|&l| to_dimacs(l)));
    }

    fn solve_with(&mut self, assumps: &[SatLit], crits: Option<&mut Vec<SatLit>>) -> bool {
        let sat = self
            .solver
            .borrow_mut()
            .solve_with(assumps.iter().map(|&l| to_dimacs(l)))
            .expect("SAT backend returned unknown");

        if let Some(out) = crits {
            out.clear();
            if !sat {
                let mut solver = self.solver.borrow_mut();
                for &a in assumps {
                    if solver.failed(to_dimacs(a)) {
                        out.push(a);
                    }
                }
            }
        }

        sat
    }

    fn is_sat(&self) -> bool {
        self.solver.borrow().status() == Some(true)
    }

    fn value(&self, lit: SatLit) -> SatValue {
        debug_assert!(self.is_sat());
        match self.solver.borrow_mut().value(to_dimacs(lit)) {
            Some(true) => SatValue::True,
            Some(false) => SatValue::False,
            None => SatValue::Undef,
        }
    }

    fn freeze(&mut self, var: SatVar) {
        debug_assert!(var < self.nvars);
        if !self.frozen[var] {
            self.frozen[var] = true;
            self.solver.borrow_mut().freeze(var as i32 + 1);
        }
    }

    fn eliminate(&mut self) {
        let verdict = self.solver.borrow_mut().simplify();
        if verdict == Some(false) {
            // Root-level contradiction: an empty clause cannot travel
            // through the interface, so hand back a clashing unit pair.
            self.residual = Some(vec![vec![slit(0, false)], vec![slit(0, true)]]);
            return;
        }

        let path = dump_path();
        self.solver
            .borrow_mut()
            .write_dimacs(&path)
            .expect("failed to dump the preprocessed formula");
        let text = fs::read_to_string(&path).expect("failed to read the preprocessed formula");
        let _ = fs::remove_file(&path);

        self.residual = Some(parse_dimacs(&text));
    }

    fn residual_clauses(&self) -> Vec<Vec<SatLit>> {
        self.residual
            .clone()
            .expect("residual_clauses requires a prior eliminate")
    }

    fn residual_units(&self) -> Vec<SatLit> {
        // Units are recovered from the dump as singleton clauses.
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::sat::CadicalSolver;

    fn downstream(residual: &[Vec<SatLit>], nvars: usize) -> CadicalSolver {
        let mut check = CadicalSolver::new();
        for _ in 0..nvars {
            check.new_var();
        }
        for cls in residual {
            check.add_clause(cls);
        }
        check
    }

    #[test]
    fn test_elimination_preserves_interface() {
        // x frozen, y eliminable: (x V y) & (~y V z), z frozen.
        let mut s = SimpSolver::new();
        let x = s.new_var();
        let y = s.new_var();
        let z = s.new_var();
        s.freeze(x);
        s.freeze(z);
        s.add_clause(&[slit(x, false), slit(y, false)]);
        s.add_clause(&[slit(y, true), slit(z, false)]);
        s.eliminate();

        let residual = s.residual_clauses();
        // y is gone from the residual CNF.
        assert!(residual
            .iter()
            .all(|cls| cls.iter().all(|&l| svar(l) != y)));
        // The residual still forces z once x falls.
        let mut check = downstream(&residual, 3);
        assert!(check.solve_with(&[slit(x, true), slit(z, false)], None));
        assert!(!check.solve_with(&[slit(x, true), slit(z, true)], None));
    }

    #[test]
    fn test_frozen_vars_survive() {
        let mut s = SimpSolver::new();
        let x = s.new_var();
        let y = s.new_var();
        s.freeze(x);
        s.freeze(y);
        s.add_clause(&[slit(x, false), slit(y, false)]);
        s.eliminate();

        // The disjunction over the frozen interface is intact.
        let residual = s.residual_clauses();
        let mut check = downstream(&residual, 2);
        assert!(!check.solve_with(&[slit(x, true), slit(y, true)], None));
        assert!(check.solve_with(&[slit(x, false)], None));
    }

    #[test]
    fn test_units_recovered() {
        let mut s = SimpSolver::new();
        let x = s.new_var();
        let y = s.new_var();
        s.freeze(x);
        s.freeze(y);
        s.add_clause(&[slit(x, false)]);
        s.add_clause(&[slit(x, true), slit(y, false)]);
        s.eliminate();

        // Both forced values come back through the residual CNF.
        let residual = s.residual_clauses();
        let mut check = downstream(&residual, 2);
        assert!(!check.solve_with(&[slit(x, true)], None));
        assert!(!check.solve_with(&[slit(y, true)], None));
        assert!(check.solve_with(&[slit(x, false), slit(y, false)], None));
    }

    #[test]
    fn test_root_contradiction() {
        let mut s = SimpSolver::new();
        let x = s.new_var();
        s.freeze(x);
        s.add_clause(&[slit(x, false)]);
        s.add_clause(&[slit(x, true)]);
        s.eliminate();

        let residual = s.residual_clauses();
        let mut check = downstream(&residual, 1);
        assert!(!check.solve_with(&[], None));
    }
}
