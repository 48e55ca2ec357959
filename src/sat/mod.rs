//! The SAT backends and the narrow interface the rest of the engine sees.
//!
//! Everything above this module speaks [`SatSolver`]; the solvers
//! themselves are third-party (CaDiCaL, linked through the `cadical`
//! crate) and stay opaque behind it. Three backend variants exist: the
//! core solver, the core solver when conflict-set extraction is wanted,
//! and the simplifying solver used for CNF preprocessing.
pub mod cadical;
pub mod simp;

pub use self::cadical::CadicalSolver;
pub use self::simp::SimpSolver;

/// Backend-level variable index.
pub type SatVar = usize;

/// Backend-level literal: `var << 1 | negated`.
pub type SatLit = u32;

#[inline]
pub fn slit(var: SatVar, negated: bool) -> SatLit {
    ((var as SatLit) << 1) | negated as SatLit
}

#[inline]
pub fn svar(lit: SatLit) -> SatVar {
    (lit >> 1) as SatVar
}

#[inline]
pub fn sneg(lit: SatLit) -> bool {
    lit & 1 != 0
}

#[inline]
pub fn snot(lit: SatLit) -> SatLit {
    lit ^ 1
}

/// Model value of a variable or literal after a satisfiable solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatValue {
    True,
    False,
    Undef,
}

impl SatValue {
    pub fn negate(self) -> SatValue {
        match self {
            SatValue::True => SatValue::False,
            SatValue::False => SatValue::True,
            SatValue::Undef => SatValue::Undef,
        }
    }
}

/// The narrow backend interface.
///
/// `solve` is incremental: clauses added between calls stay. When the result
/// is UNSAT and `crits` is supplied, it receives the subset of `assumps`
/// that participate in the final conflict (sufficient for unsatisfiability).
pub trait SatSolver {
    fn new_var(&mut self) -> SatVar;
    fn add_clause(&mut self, lits: &[SatLit]);
    fn solve_with(&mut self, assumps: &[SatLit], crits: Option<&mut Vec<SatLit>>) -> bool;
    fn is_sat(&self) -> bool;
    fn value(&self, lit: SatLit) -> SatValue;

    /// Pin a variable so simplification never eliminates it.
    fn freeze(&mut self, _var: SatVar) {
        panic!("freeze called on a non-simplifying SAT backend");
    }

    /// Run variable elimination. Simplifying backend only.
    fn eliminate(&mut self) {
        panic!("eliminate called on a non-simplifying SAT backend");
    }

    /// Residual clauses after [`eliminate`](Self::eliminate).
    fn residual_clauses(&self) -> Vec<Vec<SatLit>> {
        panic!("residual_clauses called on a non-simplifying SAT backend");
    }

    /// Root-level unit trail after [`eliminate`](Self::eliminate).
    fn residual_units(&self) -> Vec<SatLit> {
        panic!("residual_units called on a non-simplifying SAT backend");
    }
}

/// The compiled-in backend variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatBackend {
    /// CaDiCaL.
    Cadical,
    /// CaDiCaL, used where conflict-set extraction is required.
    CadicalWithCores,
    /// CaDiCaL plus preprocessing (subsumption and bounded variable
    /// elimination) with residual-CNF extraction.
    CadicalSimp,
}

impl SatBackend {
    /// Resolve a backend by name. Unknown names surface as
    /// [`Error::UnsupportedBackend`](crate::types::Error::UnsupportedBackend).
    pub fn from_name(name: &str) -> crate::types::Result<SatBackend> {
        match name {
            "cadical" => Ok(SatBackend::Cadical),
            "cadical-cores" => Ok(SatBackend::CadicalWithCores),
            "cadical-simp" => Ok(SatBackend::CadicalSimp),
            other => Err(crate::types::Error::UnsupportedBackend(other.to_string())),
        }
    }

    pub fn instantiate(self) -> Box<dyn SatSolver> {
        match self {
            SatBackend::Cadical | SatBackend::CadicalWithCores => {
                Box::new(CadicalSolver::default())
            }
            SatBackend::CadicalSimp => Box::new(SimpSolver::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_packing() {
        let l = slit(7, true);
        assert_eq!(svar(l), 7);
        assert!(sneg(l));
        assert_eq!(snot(snot(l)), l);
        assert!(!sneg(snot(l)));
    }

    #[test]
    fn test_backend_names() {
        assert_eq!(
            SatBackend::from_name("cadical").unwrap(),
            SatBackend::Cadical
        );
        assert_eq!(
            SatBackend::from_name("cadical-simp").unwrap(),
            SatBackend::CadicalSimp
        );
        assert!(SatBackend::from_name("lingeling").is_err());
    }
}
