//! Thin wrapper around the CaDiCaL incremental SAT solver.
//!
//! Engine-side literals are packed `var << 1 | negated`; CaDiCaL speaks
//! signed DIMACS literals, so variable `v` maps to DIMACS variable `v + 1`.
//! Critical assumptions come straight from CaDiCaL's `failed` query over
//! the assumptions of an unsatisfiable solve.
use std::cell::RefCell;

use super::{slit, sneg, svar, SatLit, SatSolver, SatValue, SatVar};

#[inline]
pub(super) fn to_dimacs(lit: SatLit) -> i32 {
    let var = svar(lit) as i32 + 1;
    if sneg(lit) {
        -var
    } else {
        var
    }
}

#[inline]
pub(super) fn from_dimacs(lit: i32) -> SatLit {
    debug_assert!(lit != 0);
    slit((lit.abs() - 1) as SatVar, lit < 0)
}

pub struct CadicalSolver {
    // CaDiCaL needs `&mut` even for model queries; the interface reads
    // models through `&self`, hence the cell.
    solver: RefCell<cadical::Solver>,
    nvars: usize,
}

impl Default for CadicalSolver {
    fn default() -> CadicalSolver {
        CadicalSolver {
            solver: RefCell::new(cadical::Solver::new()),
            nvars: 0,
        }
    }
}

impl CadicalSolver {
    pub fn new() -> CadicalSolver {
        CadicalSolver::default()
    }

    pub fn num_vars(&self) -> usize {
        self.nvars
    }
}

impl SatSolver for CadicalSolver {
    fn new_var(&mut self) -> SatVar {
        let v = self.nvars;
        self.nvars += 1;
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
}
