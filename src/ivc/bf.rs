//! IVC_BF: brute-force shrinking. Remove a gate, re-prove safety of the
//! abstraction, keep the removal when the proof still goes through.
use std::rc::Rc;

use super::{IvcFinder, IvcFinderData, Ivc};
use crate::clog;
use crate::logger::LogChannel;
use crate::map::{MapSolver, SatArbitraryMapSolver, Seed};
use crate::options::Gs;
use crate::safety::{HybridSafetyChecker, SafetyProof};
use crate::tr::TransitionRelation;
use crate::types::*;
use crate::vars::VariableManager;

pub struct IvcBfFinder {
    data: IvcFinderData,
}

impl IvcBfFinder {
    pub fn new(vars: &VariableManager, tr: Rc<TransitionRelation>, gs: &Gs) -> Self {
        IvcBfFinder {
            data: IvcFinderData::new(vars, tr, gs),
        }
    }

    pub fn is_safe(&mut self, seed: &Seed) -> bool {
        self.is_safe_with_proof(seed).is_some()
    }

    pub fn is_safe_with_proof(&mut self, seed: &Seed) -> Option<SafetyProof> {
        let partial = Rc::new(TransitionRelation::abstracted(self.data.tr(), seed));
        let mut checker =
            HybridSafetyChecker::new(self.data.vars(), partial, self.data.gs());
        let result = checker.prove();
        if result.safe() {
            Some(result.proof)
        } else {
            None
        }
    }

    /// Shrink a safe seed to a minimal one. A map solver, when given,
    /// prunes candidates already known to be explored.
    pub fn shrink(&mut self, seed: &mut Seed, mut map: Option<&mut SatArbitraryMapSolver>) {
        let gs = self.data.gs().clone();
        let mut i = 0;
        while i < seed.len() {
            let mut candidate = seed.clone();
            let gate = candidate.remove(i);

            if let Some(m) = map.as_deref_mut() {
                if !m.check_seed(&candidate) {
                    i += 1;
                    continue;
                }
            }

            if self.is_safe(&candidate) {
                clog!(gs, LogChannel::IvcBf, 2, "removed gate {}", gate);
                *seed = candidate;
            } else {
                clog!(gs, LogChannel::IvcBf, 3, "cannot remove gate {}", gate);
                i += 1;
            }
        }
    }
}

impl IvcFinder for IvcBfFinder {
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

    /// bad = (l & l) through a needed gate, plus a dangling gate that no
    /// property depends on.
    #[test]
    fn test_bf_drops_dangling_gate() {
        let mut aig = Aig::new();
        aig.inputs = vec![2];
        aig.latches = vec![AigLatch::new(4, 4, AigReset::Zero)];
        aig.ands = vec![AigAnd::new(6, 4, 4), AigAnd::new(8, 2, 4)];
        aig.outputs = vec![6];
        let vars = VariableManager::new();
        let tr = Rc::new(TransitionRelation::new(&vars, &aig).unwrap());
        let gs = GlobalState::shared();

        let mut finder = IvcBfFinder::new(&vars, tr.clone(), &gs);
        finder.find_ivcs();
        assert_eq!(finder.num_mivcs(), 1);
        let needed = tr.vars().to_internal(6).unwrap();
        // The dangling gate 8 is dropped; whether gate 6 is needed depends
        // on the abstraction keeping bad tied to the latch, which it is.
        assert_eq!(finder.mivc(0), &vec![needed]);
    }
}
