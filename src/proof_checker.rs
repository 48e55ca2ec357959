//! Checks that a candidate proof is an inductive invariant implying
//! safety: initiation, relative induction, and safety (directly or through
//! inductive strengthening).
use crate::adaptor::SatAdaptor;
use crate::tr::{simplify_tr, TransitionSystem};
use crate::types::*;

pub struct ProofChecker<'a, T: TransitionSystem> {
    tr: &'a T,
    proof: &'a [Clause],
    ind_solver: SatAdaptor,
    init_solver: SatAdaptor,
}

impl<'a, T: TransitionSystem> ProofChecker<'a, T> {
    pub fn new(tr: &'a T, proof: &'a [Clause], simplify: bool) -> Self {
        let unrolled = tr.unroll(2);

        let simp = if simplify {
            simplify_tr(tr)
        } else {
            unrolled.clone()
        };

        let mut ind_solver = SatAdaptor::default();
        ind_solver.add_clauses(&simp);
        ind_solver.add_clauses(proof);

        // The initiation solver gets the initial states. When simplifying,
        // primes are frozen only for the constraints, so an initial state
        // that inherently violates a constraint on the next cycle does not
        // count.
        let mut init_solver = SatAdaptor::default();
        if simplify {
            let mut simp_solver = SatAdaptor::simplifying();
            simp_solver.add_clauses(&unrolled);
            simp_solver.add_clauses(&tr.init_state());
            simp_solver.freeze_all(tr.tr().latches().iter(), false);
            simp_solver.freeze_all(tr.tr().constraints().iter(), true);
            simp_solver.freeze(tr.tr().bad());
            init_solver.add_clauses(&simp_solver.simplify());
        } else {
            init_solver.add_clauses(&tr.init_state());
            init_solver.add_clauses(&unrolled);
        }

        ProofChecker {
            tr,
            proof,
            ind_solver,
            init_solver,
        }
    }

    /// Every initial state satisfies every proof clause.
    pub fn check_initiation(&mut self) -> bool {
        for cls in self.proof {
            let negc = negate_vec(cls);
            if self.init_solver.solve(&negc) {
                return false;
            }
        }
        true
    }

    /// `Inv & ~bad & Tr => c'` for every clause `c` of the proof.
    pub fn check_induction(&mut self) -> bool {
        for cls in self.proof {
            let negc = negate_vec(cls);
            let mut assumps = prime_vec(&negc);
            assumps.push(negate(self.tr.tr().bad()));
            if self.ind_solver.solve(&assumps) {
                return false;
            }
        }
        true
    }

    /// `Inv => ~bad`.
    pub fn check_safety(&mut self) -> bool {
        let bad = self.tr.tr().bad();
        !self.ind_solver.solve(&[bad])
    }

    /// `Inv & ~bad & Tr => ~bad'`: the invariant need not exclude bad
    /// syntactically if it is inductively strengthened by `~bad` itself.
    pub fn check_inductive_strengthening(&mut self) -> bool {
        let bad = self.tr.tr().bad();
        let assumps = vec![negate(bad), prime(bad)];
        !self.ind_solver.solve(&assumps)
    }

    pub fn check_proof(&mut self) -> bool {
        self.check_initiation()
            && self.check_induction()
            && (self.check_safety() || self.check_inductive_strengthening())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aig::{Aig, AigAnd, AigLatch, AigReset};
    use crate::tr::TransitionRelation;
    use crate::vars::VariableManager;

    /// Four-bit shift chain, reset zero, bad = l3 & ~l2 & ~l1 & l0.
    fn shift_chain() -> (VariableManager, TransitionRelation) {
        let mut aig = Aig::new();
        aig.inputs = vec![2];
        aig.latches = vec![
            AigLatch::new(4, 2, AigReset::Zero),
            AigLatch::new(6, 4, AigReset::Zero),
            AigLatch::new(8, 6, AigReset::Zero),
            AigLatch::new(10, 8, AigReset::Zero),
        ];
        aig.ands = vec![
            AigAnd::new(12, 10, 9),
            AigAnd::new(14, 12, 7),
            AigAnd::new(16, 14, 4),
        ];
        aig.outputs = vec![16];
        let vars = VariableManager::new();
        let tr = TransitionRelation::new(&vars, &aig).unwrap();
        (vars, tr)
    }

    /// One stuck-at-zero latch, bad = l.
    fn stuck_zero() -> (VariableManager, TransitionRelation) {
        let mut aig = Aig::new();
        aig.latches = vec![AigLatch::new(2, 2, AigReset::Zero)];
        aig.outputs = vec![2];
        let vars = VariableManager::new();
        let tr = TransitionRelation::new(&vars, &aig).unwrap();
        (vars, tr)
    }

    #[test]
    fn test_valid_proof() {
        let (_, tr) = stuck_zero();
        let l = tr.latches()[0];
        let proof: ClauseVec = vec![vec![negate(l)], tr.property_clause()];
        for &simplify in &[false, true] {
            let mut checker = ProofChecker::new(&tr, &proof, simplify);
            assert!(checker.check_initiation());
            assert!(checker.check_induction());
            assert!(checker.check_safety());
            assert!(checker.check_proof());
        }
    }

    #[test]
    fn test_initiation_violation() {
        let (_, tr) = stuck_zero();
        let l = tr.latches()[0];
        // Clause l contradicts the reset.
        let proof: ClauseVec = vec![vec![l], tr.property_clause()];
        let mut checker = ProofChecker::new(&tr, &proof, false);
        assert!(!checker.check_initiation());
        assert!(!checker.check_proof());
    }

    #[test]
    fn test_induction_violation() {
        // Toggling latch: ~l is not inductive.
        let mut aig = Aig::new();
        aig.latches = vec![AigLatch::new(2, 3, AigReset::Zero)];
        aig.outputs = vec![2];
        let vars = VariableManager::new();
        let tr = TransitionRelation::new(&vars, &aig).unwrap();
        let l = tr.latches()[0];
        let proof: ClauseVec = vec![vec![negate(l)]];
        let mut checker = ProofChecker::new(&tr, &proof, false);
        assert!(checker.check_initiation());
        assert!(!checker.check_induction());
        assert!(!checker.check_proof());
    }

    #[test]
    fn test_unsafe_invariant() {
        // An invariant that is inductive but does not exclude bad: the
        // empty proof over a circuit whose bad is reachable.
        let (_, tr) = shift_chain();
        let proof: ClauseVec = vec![];
        let mut checker = ProofChecker::new(&tr, &proof, false);
        assert!(checker.check_initiation());
        assert!(checker.check_induction());
        assert!(!checker.check_safety());
        assert!(!checker.check_inductive_strengthening());
        assert!(!checker.check_proof());
    }

    #[test]
    fn test_shift_chain_proof() {
        let (_, tr) = shift_chain();
        // The bad pattern is reachable by shifting in 1,0,0,1, so ~bad
        // alone cannot be inductive and the check fails.
        let proof: ClauseVec = vec![tr.property_clause()];
        let mut checker = ProofChecker::new(&tr, &proof, false);
        assert!(!checker.check_proof());
    }
}
