//! In-memory And-Inverter Graph handed over by the parsing collaborator.
//!
//! Literals use the AIGER encoding: an unsigned integer whose low bit is the
//! negation flag and whose remaining bits name the variable (`var = lit / 2`).
//! Literal 0 is constant false, literal 1 constant true. This crate never
//! parses AIGER files; it consumes the already-built graph.
use crate::types::ExternalId;

#[inline]
pub fn aiger_sign(lit: ExternalId) -> bool {
    lit & 1 != 0
}

#[inline]
pub fn aiger_strip(lit: ExternalId) -> ExternalId {
    lit & !1
}

#[inline]
pub fn aiger_not(lit: ExternalId) -> ExternalId {
    lit ^ 1
}

/// Reset value of a latch: constant 0, constant 1, or unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AigReset {
    Zero,
    One,
    Free,
}

#[derive(Debug, Clone)]
pub struct AigLatch {
    /// Current-state literal (non-negated).
    pub lit: ExternalId,
    /// Next-state function literal.
    pub next: ExternalId,
    pub reset: AigReset,
}

impl AigLatch {
    pub fn new(lit: ExternalId, next: ExternalId, reset: AigReset) -> Self {
        AigLatch { lit, next, reset }
    }
}

#[derive(Debug, Clone)]
pub struct AigAnd {
    /// Output literal (non-negated).
    pub lhs: ExternalId,
    pub rhs0: ExternalId,
    pub rhs1: ExternalId,
}

impl AigAnd {
    pub fn new(lhs: ExternalId, rhs0: ExternalId, rhs1: ExternalId) -> Self {
        AigAnd { lhs, rhs0, rhs1 }
    }
}

/// A parsed circuit. The last entry of `outputs` is the bad signal unless a
/// specific property index is requested at engine construction.
#[derive(Debug, Clone, Default)]
pub struct Aig {
    pub inputs: Vec<ExternalId>,
    pub latches: Vec<AigLatch>,
    pub ands: Vec<AigAnd>,
    pub outputs: Vec<ExternalId>,
    pub constraints: Vec<ExternalId>,
}

impl Aig {
    pub fn new() -> Self {
        Aig::default()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_helpers() {
        assert!(!aiger_sign(4));
        assert!(aiger_sign(5));
        assert_eq!(aiger_strip(5), 4);
        assert_eq!(aiger_not(4), 5);
        assert_eq!(aiger_not(aiger_not(7)), 7);
    }
}
