//! Brute-force minimization: delete one clause at a time, keeping the rest
//! a safe inductive subset.
use std::rc::Rc;

use super::{MinimizerData, ProofMinimizer};
use crate::clog;
use crate::cons::{find_safe_mis, ConsecutionChecker};
use crate::logger::LogChannel;
use crate::options::Gs;
use crate::tr::TransitionRelation;
use crate::types::*;
use crate::vars::VariableManager;

pub struct BruteForceMinimizer {
    data: MinimizerData,
    ind_solver: ConsecutionChecker<TransitionRelation>,
}

impl BruteForceMinimizer {
    pub fn new(vars: &VariableManager, tr: Rc<TransitionRelation>, proof: &[Clause], gs: &Gs) -> Self {
        let data = MinimizerData::new(vars, tr.clone(), proof, gs);
        let mut ind_solver = ConsecutionChecker::new(vars, tr, gs);
        for id in 0..data.num_clauses() {
            ind_solver.add_clause(id, data.clause_of(id));
        }
        BruteForceMinimizer { data, ind_solver }
    }

    fn find_sis(&mut self, vec: &mut Vec<ClauseId>) -> bool {
        let property = self.data.property();
        find_safe_mis(&mut self.ind_solver, vec, &[property])
    }
}

impl ProofMinimizer for BruteForceMinimizer {
    fn minimize(&mut self) {
        let gs = self.data.gs().clone();
        let mut proof = self.data.all_clause_ids();

        let is_sis = self.find_sis(&mut proof);
        assert!(is_sis, "the input proof has no safe inductive subset");

        let property = self.data.property();
        let mut i = 0;
        while i < proof.len() {
            let id = proof[i];
            if id == property {
                i += 1;
                continue;
            }

            let mut test: Vec<ClauseId> = proof.iter().copied().filter(|&c| c != id).collect();
            if self.find_sis(&mut test) {
                proof = test;
                i = 0;
            } else {
                i += 1;
            }
        }

        clog!(
            gs,
            LogChannel::BruteForceMin,
            1,
            "minimized proof size: {}",
            proof.len()
        );
        self.data.add_minimal_proof(&proof);
        self.data.set_minimum_proof(&proof);
    }

    fn data(&self) -> &MinimizerData {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aig::{Aig, AigLatch, AigReset};
    use crate::options::GlobalState;

    #[test]
    fn test_brute_force_drops_redundant_clauses() {
        // Held latch with bad = l plus two unrelated held latches.
        let mut aig = Aig::new();
        aig.latches = vec![
            AigLatch::new(2, 2, AigReset::Zero),
            AigLatch::new(4, 4, AigReset::Zero),
            AigLatch::new(6, 6, AigReset::Zero),
        ];
        aig.outputs = vec![2];
        let vars = VariableManager::new();
        let tr = Rc::new(TransitionRelation::new(&vars, &aig).unwrap());
        let gs = GlobalState::shared();

        let l1 = tr.latches()[1];
        let l2 = tr.latches()[2];
        let proof: ClauseVec = vec![vec![negate(l1)], vec![negate(l2)]];

        let mut bf = BruteForceMinimizer::new(&vars, tr.clone(), &proof, &gs);
        bf.minimize();
        assert_eq!(bf.num_proofs(), 1);
        assert_eq!(bf.minimum_proof(), vec![tr.property_clause()]);
    }
}
