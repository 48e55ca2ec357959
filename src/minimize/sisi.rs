//! SISI: minimization through NEC/FEAS fixpoints with minimal supports.
//!
//! NEC holds clauses that every safe inductive subset must contain; FEAS is
//! a feasible over-approximation grown from the supports of NEC members.
//! Alternating refinements converge quickly, and a brute-force tail
//! finishes the minimization.
use std::collections::BTreeSet;
use std::rc::Rc;

use super::{MinimizerData, ProofMinimizer};
use crate::clog;
use crate::cons::{find_minimal_support, find_safe_mis, ConsecutionChecker};
use crate::logger::LogChannel;
use crate::options::Gs;
use crate::tr::TransitionRelation;
use crate::types::*;
use crate::vars::VariableManager;

pub struct Sisi<'a> {
    checker: &'a mut ConsecutionChecker<TransitionRelation>,
    all: Vec<ClauseId>,
    nec: BTreeSet<ClauseId>,
    feas: BTreeSet<ClauseId>,
}

impl<'a> Sisi<'a> {
    pub fn new(checker: &'a mut ConsecutionChecker<TransitionRelation>) -> Self {
        Sisi {
            checker,
            all: Vec::new(),
            nec: BTreeSet::new(),
            feas: BTreeSet::new(),
        }
    }

    pub fn add_clause(&mut self, id: ClauseId) {
        self.all.push(id);
    }

    pub fn add_to_feas(&mut self, id: ClauseId) {
        self.feas.insert(id);
    }

    pub fn add_to_nec(&mut self, id: ClauseId) {
        self.nec.insert(id);
    }

    pub fn size_nec(&self) -> usize {
        self.nec.len()
    }

    pub fn size_feas(&self) -> usize {
        self.feas.len()
    }

    fn find_sis(&mut self, vec: &mut Vec<ClauseId>) -> bool {
        let nec_vec: Vec<ClauseId> = self.nec.iter().copied().collect();
        find_safe_mis(self.checker, vec, &nec_vec)
    }

    /// A FEAS clause whose removal leaves no proof inside FEAS is
    /// necessary.
    pub fn refine_nec(&mut self) {
        assert!(!self.feas.is_empty());
        let candidates: Vec<ClauseId> = self.feas.iter().copied().collect();
        for id in candidates {
            if self.nec.contains(&id) {
                continue;
            }
            let mut test_feas: Vec<ClauseId> = self
                .feas
                .iter()
                .copied()
                .filter(|&c| c != id)
                .collect();
            if !self.find_sis(&mut test_feas) {
                self.nec.insert(id);
            }
        }
    }

    /// FEAS := NEC plus minimal supports, to fixpoint.
    pub fn refine_feas(&mut self) {
        assert!(!self.nec.is_empty());
        self.feas = self.nec.clone();

        let mut known_ind: BTreeSet<ClauseId> = BTreeSet::new();
        'fixpoint: while known_ind.len() < self.feas.len() {
            let feas_vec: Vec<ClauseId> = self.feas.iter().copied().collect();
            for &cls in &feas_vec {
                if known_ind.contains(&cls) {
                    continue;
                }

                if self.checker.solve(&feas_vec, cls) {
                    // Not yet supported inside FEAS: pull in a minimal
                    // support from the full clause set.
                    let support = find_minimal_support(self.checker, &self.all, cls);
                    let old_size = self.feas.len();
                    self.feas.extend(support.iter().copied());
                    debug_assert!(self.feas.len() > old_size);
                    known_ind.insert(cls);
                    continue 'fixpoint;
                }

                known_ind.insert(cls);
            }
        }
    }

    /// Delete-one-at-a-time over FEAS, keeping NEC pinned.
    pub fn brute_force_minimize(&mut self) -> Vec<ClauseId> {
        let mut feas: Vec<ClauseId> = self.feas.iter().copied().collect();
        let mut keep = self.nec.clone();

        let mut i = 0;
        while keep.len() < feas.len() && i < feas.len() {
            let id = feas[i];
            if keep.contains(&id) {
                i += 1;
                continue;
            }

            let mut test_feas: Vec<ClauseId> =
                feas.iter().copied().filter(|&c| c != id).collect();

            if self.find_sis(&mut test_feas) {
                debug_assert!(test_feas.len() < feas.len());
                feas = test_feas;
                i = 0;
            } else {
                keep.insert(id);
                i += 1;
            }
        }

        feas
    }
}

pub struct SisiMinimizer {
    data: MinimizerData,
    ind_solver: ConsecutionChecker<TransitionRelation>,
}

impl SisiMinimizer {
    pub fn new(vars: &VariableManager, tr: Rc<TransitionRelation>, proof: &[Clause], gs: &Gs) -> Self {
        let data = MinimizerData::new(vars, tr.clone(), proof, gs);
        let mut ind_solver = ConsecutionChecker::new(vars, tr, gs);
        for id in 0..data.num_clauses() {
            ind_solver.add_clause(id, data.clause_of(id));
        }
        SisiMinimizer { data, ind_solver }
    }
}

impl ProofMinimizer for SisiMinimizer {
    fn minimize(&mut self) {
        let gs = self.data.gs().clone();
        clog!(gs, LogChannel::Sisi, 1, "proof size: {}", self.data.num_clauses());

        let mut sisi = Sisi::new(&mut self.ind_solver);
        for id in 0..self.data.num_clauses() {
            sisi.add_to_feas(id);
            sisi.add_clause(id);
        }
        sisi.add_to_nec(self.data.property());

        sisi.refine_nec();
        clog!(gs, LogChannel::Sisi, 1, "NEC size: {}", sisi.size_nec());

        sisi.refine_feas();
        clog!(gs, LogChannel::Sisi, 1, "FEAS size: {}", sisi.size_feas());

        sisi.refine_nec();
        clog!(gs, LogChannel::Sisi, 1, "refined NEC size: {}", sisi.size_nec());

        let minimized = sisi.brute_force_minimize();
        clog!(
            gs,
            LogChannel::Sisi,
            1,
            "minimized proof size: {}",
            minimized.len()
        );

        self.data.add_minimal_proof(&minimized);
        self.data.set_minimum_proof(&minimized);
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
    fn test_sisi_minimizes_shift_pair() {
        // l1' = l0, l0' = l0 (held), reset 0. bad = l1.
        // ~l1 needs ~l0 as support; an irrelevant held latch l2 drops out.
        let mut aig = Aig::new();
        aig.latches = vec![
            AigLatch::new(2, 2, AigReset::Zero),
            AigLatch::new(4, 2, AigReset::Zero),
            AigLatch::new(6, 6, AigReset::Zero),
        ];
        aig.outputs = vec![4];
        let vars = VariableManager::new();
        let tr = Rc::new(TransitionRelation::new(&vars, &aig).unwrap());
        let gs = GlobalState::shared();

        let l0 = tr.latches()[0];
        let l2 = tr.latches()[2];
        let proof: ClauseVec = vec![vec![negate(l0)], vec![negate(l2)]];

        let mut sisi = SisiMinimizer::new(&vars, tr.clone(), &proof, &gs);
        sisi.minimize();

        assert_eq!(sisi.num_proofs(), 1);
        let minimized = sisi.proof(0);
        // Property ~l1 plus its support ~l0; the unrelated ~l2 is gone.
        assert_eq!(minimized.len(), 2);
        assert!(minimized.contains(&tr.property_clause()));
        assert!(minimized.contains(&vec![negate(l0)]));
        assert!(!minimized.contains(&vec![negate(l2)]));
    }
}
