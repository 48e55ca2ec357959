//! CBVC: drive the BVC solver and record the bounded validity core found
//! at each depth; the abstraction at convergence is an IVC.
use std::rc::Rc;

use super::bvc::BvcSolver;
use super::{IvcFinder, IvcFinderData};
use crate::clog;
use crate::logger::LogChannel;
use crate::options::Gs;
use crate::tr::TransitionRelation;
use crate::vars::VariableManager;

pub struct CbvcFinder {
    data: IvcFinderData,
}

impl CbvcFinder {
    pub fn new(vars: &VariableManager, tr: Rc<TransitionRelation>, gs: &Gs) -> Self {
        CbvcFinder {
            data: IvcFinderData::new(vars, tr, gs),
        }
    }
}

impl IvcFinder for CbvcFinder {
    fn find_ivcs(&mut self) {
        let gs = self.data.gs().clone();
        clog!(
            gs,
            LogChannel::Cbvc,
            2,
            "starting CBVC over {} gates",
            self.data.tr().num_gates()
        );

        let mut solver = BvcSolver::new(self.data.vars(), self.data.tr().clone(), &gs);
        let result = solver.prove();

        for (bound, bvc) in solver.bvcs().iter().enumerate() {
            self.data.add_bvc(bound, bvc);
        }

        if result.safety.safe() {
            clog!(gs, LogChannel::Cbvc, 2, "the instance is safe");
            self.data.add_mivc(&result.abstraction);
            self.data.set_minimum_ivc(&result.abstraction);
        } else if result.safety.is_unsafe() {
            clog!(gs, LogChannel::Cbvc, 2, "the instance is unsafe");
        }
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
    fn test_cbvc_finds_core() {
        let mut aig = Aig::new();
        aig.inputs = vec![2];
        aig.latches = vec![AigLatch::new(4, 4, AigReset::Zero)];
        aig.ands = vec![AigAnd::new(6, 4, 4), AigAnd::new(8, 2, 4)];
        aig.outputs = vec![6];
        let vars = VariableManager::new();
        let tr = Rc::new(TransitionRelation::new(&vars, &aig).unwrap());
        let gs = GlobalState::shared();

        let needed = tr.vars().to_internal(6).unwrap();
        let mut finder = CbvcFinder::new(&vars, tr, &gs);
        finder.find_ivcs();
        assert_eq!(finder.num_mivcs(), 1);
        assert_eq!(finder.mivc(0), &vec![needed]);
    }
}
