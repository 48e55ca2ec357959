//! Generalizes concrete predecessor states using the assumptions conflict
//! of the transition-relation solver.
//!
//! The query `pred & inp & Tr & pinp' & ~succ'` is UNSAT by construction
//! whenever `pred & inp & Tr => succ'`; the critical assumptions intersected
//! with `pred` give a sub-cube whose every state reaches `succ` under the
//! recorded inputs.
use std::cell::RefCell;
use std::rc::Rc;

use super::trace::InductiveTrace;
use super::{LemmaId, LEVEL_INF};
use crate::adaptor::SatAdaptor;
use crate::options::Gs;
use crate::tr::{simplify_tr, TransitionSystem};
use crate::types::*;
use crate::vars::VariableManager;

pub struct UnsatCoreLifter<T: TransitionSystem> {
    tr: Rc<T>,
    trace: Rc<RefCell<InductiveTrace>>,
    gs: Gs,
    solver: SatAdaptor,
    unrolled: ClauseVec,
    inited: bool,
}

impl<T: TransitionSystem> UnsatCoreLifter<T> {
    pub fn new(
        _vars: &VariableManager,
        tr: Rc<T>,
        trace: Rc<RefCell<InductiveTrace>>,
        gs: &Gs,
    ) -> Self {
        UnsatCoreLifter {
            tr,
            trace,
            solver: SatAdaptor::new(gs.opts.backend),
            gs: gs.clone(),
            unrolled: ClauseVec::new(),
            inited: false,
        }
    }

    pub fn renew_sat(&mut self) {
        if self.unrolled.is_empty() {
            self.unrolled = if self.gs.opts.simplify {
                simplify_tr(&*self.tr)
            } else {
                self.tr.unroll(2)
            };
        }
        self.solver.reset();
        let unrolled = self.unrolled.clone();
        self.solver.add_clauses(&unrolled);

        let clauses: Vec<Clause> = {
            let trace = self.trace.borrow();
            trace
                .frame(LEVEL_INF)
                .iter()
                .filter(|&&id| !trace.lemma(id).deleted)
                .map(|&id| negate_vec(trace.cube_of(id)))
                .collect()
        };
        for cls in clauses {
            self.solver.add_clause(&cls);
        }
        self.inited = true;
    }

    pub fn add_lemma(&mut self, id: LemmaId) {
        if self.inited {
            let cls = negate_vec(self.trace.borrow().cube_of(id));
            self.solver.add_clause(&cls);
        }
    }

    /// Lift a concrete predecessor of `succ`. Empty lifts fall back to one
    /// arbitrary literal of `pred`.
    pub fn lift(&mut self, pred: &Cube, succ: &Cube, inp: &Cube, pinp: &Cube) -> Cube {
        assert!(!succ.is_empty());
        if !self.inited {
            self.renew_sat();
        }

        let pinp_p = prime_vec(pinp);
        let negsucc_p = negate_vec(&prime_vec(succ));

        let mut assumps = Cube::with_capacity(pred.len() + inp.len() + pinp_p.len() + 1);
        assumps.extend_from_slice(pred);
        assumps.extend_from_slice(inp);
        assumps.extend_from_slice(&pinp_p);

        let mut crits = Cube::new();
        if succ.len() == 1 {
            // No need for a group when a plain assumption does.
            assumps.push(negsucc_p[0]);
            let sat = self.solver.solve_with_crits(&assumps, &mut crits);
            assert!(!sat, "lift query must be UNSAT");
        } else {
            let gid = self.solver.create_group();
            self.solver.add_group_clause(gid, &negsucc_p);
            let sat = self.solver.group_solve_with_crits(gid, &assumps, &mut crits);
            assert!(!sat, "lift query must be UNSAT");
        }

        let mut lifted = super::frame_solver::extract_core(pred, &crits);

        // Every predecessor literal may be a don't-care; keep one literal so
        // the result still names a state set.
        if lifted.is_empty() {
            lifted.push(pred[0]);
        }
        lifted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aig::{Aig, AigAnd, AigLatch, AigReset};
    use crate::options::GlobalState;
    use crate::tr::TransitionRelation;

    /// Two latches; l1' = l0, l0' = i & l0. Bad unused here.
    fn two_latch() -> (VariableManager, Rc<TransitionRelation>) {
        let mut aig = Aig::new();
        aig.inputs = vec![2];
        aig.latches = vec![
            AigLatch::new(4, 8, AigReset::Zero),
            AigLatch::new(6, 4, AigReset::Zero),
        ];
        aig.ands = vec![AigAnd::new(8, 2, 4)];
        aig.outputs = vec![6];
        let vars = VariableManager::new();
        let tr = Rc::new(TransitionRelation::new(&vars, &aig).unwrap());
        (vars, tr)
    }

    #[test]
    fn test_lift_drops_dont_cares() {
        let (vars, tr) = two_latch();
        let trace = Rc::new(RefCell::new(InductiveTrace::new()));
        let gs = GlobalState::shared();
        let mut lifter = UnsatCoreLifter::new(&vars, tr.clone(), trace, &gs);

        let l0 = tr.latches()[0];
        let l1 = tr.latches()[1];
        let i = tr.inputs()[0];

        // From pred = {l0, ~l1} with input i=1, the successor cube {l1}
        // is forced (l1' = l0). l1 and the input are irrelevant.
        let pred = vec![l0, negate(l1)];
        let succ = vec![l1];
        let inp = vec![i];
        let lifted = lifter.lift(&pred, &succ, &inp, &[]);
        // l0 alone forces the successor; the lift is a sub-cube of pred
        // that still contains it.
        assert!(lifted.contains(&l0));
        assert!(lifted.iter().all(|l| pred.contains(l)));
    }

    #[test]
    fn test_lift_never_empty() {
        let (vars, tr) = two_latch();
        let trace = Rc::new(RefCell::new(InductiveTrace::new()));
        let gs = GlobalState::shared();
        let mut lifter = UnsatCoreLifter::new(&vars, tr.clone(), trace, &gs);

        let l0 = tr.latches()[0];
        let l1 = tr.latches()[1];
        let i = tr.inputs()[0];

        // succ = {l0', ~l1'} might be forced by inputs alone; the lift then
        // keeps an arbitrary predecessor literal.
        let pred = vec![negate(l0), negate(l1)];
        let succ = vec![negate(l0), negate(l1)];
        let inp = vec![negate(i)];
        let lifted = lifter.lift(&pred, &succ, &inp, &[]);
        assert!(!lifted.is_empty());
        assert!(lifted.iter().all(|l| pred.contains(l)));
    }
}
