//! IVC_UCBF: shrink the safety proof first, then extract a gate core from
//! the unsatisfiability of `Inv & Tr & ~Inv'` with one soft group per
//! gate, and finish with brute force.
use std::rc::Rc;

use super::bf::IvcBfFinder;
use super::{IvcFinder, IvcFinderData, Ivc};
use crate::bmc::BmcSolver;
use crate::cardinality::{CardinalityConstraint, SortingCardinalityConstraint};
use crate::clog;
use crate::debug_tr::DebugTransitionRelation;
use crate::logger::LogChannel;
use crate::map::{Seed, SatArbitraryMapSolver};
use crate::minimize::sisi::SisiMinimizer;
use crate::minimize::ProofMinimizer;
use crate::mus::MusFinderWrapper;
use crate::options::Gs;
use crate::safety::SafetyProof;
use crate::tr::{simplify_tr, TransitionRelation, TransitionSystem};
use crate::types::*;
use crate::vars::VariableManager;

pub struct IvcUcbfFinder {
    data: IvcFinderData,
    ivcbf: IvcBfFinder,
    debug_tr: Rc<DebugTransitionRelation>,
}

impl IvcUcbfFinder {
    pub fn new(vars: &VariableManager, tr: Rc<TransitionRelation>, gs: &Gs) -> Self {
        IvcUcbfFinder {
            data: IvcFinderData::new(vars, tr.clone(), gs),
            ivcbf: IvcBfFinder::new(vars, tr.clone(), gs),
            debug_tr: Rc::new(DebugTransitionRelation::new(&tr)),
        }
    }

    pub fn is_safe(&mut self, seed: &Seed) -> bool {
        self.ivcbf.is_safe(seed)
    }

    pub fn shrink(&mut self, seed: &mut Seed, map: Option<&mut SatArbitraryMapSolver>) {
        let proof = self
            .ivcbf
            .is_safe_with_proof(seed)
            .expect("shrink requires a safe seed");
        self.shrink_with_proof(seed, &proof, map);
    }

    pub fn shrink_with_proof(
        &mut self,
        seed: &mut Seed,
        proof: &SafetyProof,
        map: Option<&mut SatArbitraryMapSolver>,
    ) {
        let gs = self.data.gs().clone();

        // Shrink the proof itself first.
        let mut shrunk_proof = if gs.opts.ivc_ucbf_use_sisi {
            let seed_tr = Rc::new(TransitionRelation::abstracted(self.data.tr(), seed));
            let mut pmin = SisiMinimizer::new(self.data.vars(), seed_tr, proof, &gs);
            pmin.minimize();
            debug_assert_eq!(pmin.num_proofs(), 1);
            pmin.proof(0)
        } else {
            proof.clone()
        };

        // An empty proof means the property is inductive on its own; the
        // MUS pass below still needs a clause to work with.
        if shrunk_proof.is_empty() {
            shrunk_proof.push(self.data.tr().property_clause());
        }

        clog!(
            gs,
            LogChannel::IvcUcbf,
            2,
            "shrunk proof from {} clauses down to {}",
            proof.len(),
            shrunk_proof.len()
        );

        // Inv & Tr & ~Inv' with gate-indexed soft clauses: Inv and ~Inv'
        // are hard; the debug TR stands in for Tr with one soft (~dl) per
        // gate of the seed.
        let mut finder = MusFinderWrapper::new(self.data.vars());
        finder.add_hard_clauses(&shrunk_proof);
        let neg_invp = self.negate_prime_and_cnfize(&shrunk_proof);
        finder.add_hard_clauses(&neg_invp);

        let debug_cnf = if gs.opts.simplify {
            simplify_tr(&*self.debug_tr)
        } else {
            self.debug_tr.unroll(2)
        };
        finder.add_hard_clauses(&debug_cnf);

        for &gate in seed.iter() {
            let dl = self.debug_tr.debug_latch_for_gate(gate);
            finder.add_soft_clause(gate, &vec![negate(dl)]);
        }

        let mut core: Seed = if gs.opts.ivc_ucbf_use_core {
            let core = finder.find_core();
            clog!(
                gs,
                LogChannel::IvcUcbf,
                2,
                "shrunk seed from {} gates down to {} via UNSAT core",
                seed.len(),
                core.len()
            );
            core
        } else if gs.opts.ivc_ucbf_use_mus {
            let mus = finder.find_mus();
            clog!(
                gs,
                LogChannel::IvcUcbf,
                2,
                "shrunk seed from {} gates down to {} via MUS",
                seed.len(),
                mus.len()
            );
            mus
        } else {
            seed.clone()
        };

        // The proof may mention bad itself, so removing gates can make the
        // initial states unsafe in rare cases; fall back to plain IVC_BF.
        if !self.init_states_safe(&core) {
            clog!(
                gs,
                LogChannel::IvcUcbf,
                2,
                "initial states unsafe, falling back to IVC_BF"
            );
            core = seed.clone();
        }

        self.ivcbf.shrink(&mut core, map);
        clog!(
            gs,
            LogChannel::IvcUcbf,
            2,
            "further shrunk down to {} gates",
            core.len()
        );

        *seed = core;
    }

    fn init_states_safe(&mut self, seed: &Seed) -> bool {
        let partial = Rc::new(TransitionRelation::abstracted(self.data.tr(), seed));
        let mut bmc = BmcSolver::new(self.data.vars(), partial, self.data.gs());
        !bmc.solve(0).is_unsafe()
    }

    /// CNFize `~Inv'`: one selector per clause, the selector forcing every
    /// literal of its clause false at the next state, and a cardinality
    /// constraint choosing exactly one selector.
    fn negate_prime_and_cnfize(&mut self, vec: &[Clause]) -> ClauseVec {
        let mut cardinality = SortingCardinalityConstraint::new(self.data.vars());
        // Width 2 is needed to assume = 1.
        cardinality.set_cardinality(2);

        let mut dnf = ClauseVec::new();
        for cls in vec {
            let act = self.data.vars().new_internal("cnfization");
            cardinality.add_input(act);
            for &lit in cls {
                dnf.push(vec![negate(act), negate(prime(lit))]);
            }
        }

        dnf.extend(cardinality.cnfize());
        for lit in cardinality.assume_eq(1) {
            dnf.push(vec![lit]);
        }
        dnf
    }
}

impl IvcFinder for IvcUcbfFinder {
    fn find_ivcs(&mut self) {
        let mut seed: Ivc = self.data.tr().gate_ids();
        self.shrink(&mut seed, None);
        self.data.add_mivc(&seed);
        self.data.set_minimum_ivc(&seed);
    }

    fn data(&self) -> &IvcFinderData {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aig::{Aig, AigAnd, AigLatch, AigReset};
    use crate::options::GlobalState;

    #[test]
    fn test_ucbf_matches_bf_on_small_circuit() {
        let mut aig = Aig::new();
        aig.inputs = vec![2];
        aig.latches = vec![AigLatch::new(4, 4, AigReset::Zero)];
        aig.ands = vec![AigAnd::new(6, 4, 4), AigAnd::new(8, 2, 4)];
        aig.outputs = vec![6];
        let vars = VariableManager::new();
        let tr = Rc::new(TransitionRelation::new(&vars, &aig).unwrap());
        let gs = GlobalState::shared();

        let mut finder = IvcUcbfFinder::new(&vars, tr.clone(), &gs);
        finder.find_ivcs();
        assert_eq!(finder.num_mivcs(), 1);
        let needed = tr.vars().to_internal(6).unwrap();
        assert_eq!(finder.mivc(0), &vec![needed]);
    }
}
