//! Inductive validity cores: minimal gate subsets sufficient to prove the
//! property on the gate-abstracted transition relation.
pub mod bf;
pub mod bvc;
pub mod caivc;
pub mod cbvc;
pub mod marco;
pub mod ucbf;
pub mod uivc;

use std::rc::Rc;

use crate::clog;
use crate::logger::LogChannel;
use crate::options::Gs;
use crate::tr::TransitionRelation;
use crate::types::*;
use crate::vars::VariableManager;

/// A set of gate IDs (the left-hand sides of AND gates).
pub type Ivc = Vec<Id>;
pub type Bvc = Vec<Id>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IvcAlgorithm {
    IvcBf,
    IvcUcbf,
    Marco,
    Caivc,
    Cbvc,
    Uivc,
}

/// Bookkeeping shared by every IVC finder.
pub struct IvcFinderData {
    vars: VariableManager,
    gs: Gs,
    tr: Rc<TransitionRelation>,
    mivcs: Vec<Ivc>,
    bvcs: Vec<Vec<Bvc>>,
    minimum_ivc: Ivc,
}

impl IvcFinderData {
    pub fn new(vars: &VariableManager, tr: Rc<TransitionRelation>, gs: &Gs) -> Self {
        IvcFinderData {
            vars: vars.clone(),
            gs: gs.clone(),
            tr,
            mivcs: Vec::new(),
            bvcs: Vec::new(),
            minimum_ivc: Ivc::new(),
        }
    }

    pub fn vars(&self) -> &VariableManager {
        &self.vars
    }

    pub fn gs(&self) -> &Gs {
        &self.gs
    }

    pub fn tr(&self) -> &Rc<TransitionRelation> {
        &self.tr
    }

    pub fn num_mivcs(&self) -> usize {
        self.mivcs.len()
    }

    pub fn mivc(&self, i: usize) -> &Ivc {
        &self.mivcs[i]
    }

    pub fn minimum_ivc_known(&self) -> bool {
        !self.minimum_ivc.is_empty()
    }

    pub fn minimum_ivc(&self) -> &Ivc {
        &self.minimum_ivc
    }

    pub fn add_mivc(&mut self, ivc: &Ivc) {
        clog!(
            self.gs,
            LogChannel::Ivc,
            1,
            "IVC #{} found, {} gates",
            self.mivcs.len() + 1,
            ivc.len()
        );
        self.mivcs.push(sort_cube(ivc));
    }

    pub fn set_minimum_ivc(&mut self, ivc: &Ivc) {
        self.minimum_ivc = sort_cube(ivc);
    }

    pub fn add_bvc(&mut self, bound: usize, bvc: &Bvc) {
        if self.bvcs.len() <= bound {
            self.bvcs.resize_with(bound + 1, Vec::new);
        }
        self.bvcs[bound].push(sort_cube(bvc));
    }

    pub fn num_bvc_bounds(&self) -> usize {
        self.bvcs.len()
    }

    pub fn bvcs_at_bound(&self, bound: usize) -> &[Bvc] {
        &self.bvcs[bound]
    }
}

pub trait IvcFinder {
    fn find_ivcs(&mut self);
    fn data(&self) -> &IvcFinderData;

    fn num_mivcs(&self) -> usize {
        self.data().num_mivcs()
    }

    fn mivc(&self, i: usize) -> &Ivc {
        self.data().mivc(i)
    }

    fn minimum_ivc_known(&self) -> bool {
        self.data().minimum_ivc_known()
    }

    fn minimum_ivc(&self) -> &Ivc {
        self.data().minimum_ivc()
    }
}

/// The complement of a gate set within the full gate list.
pub fn negate_gate_set(all_gates: &[Id], set: &[Id]) -> Vec<Id> {
    use std::collections::BTreeSet;
    let in_set: BTreeSet<Id> = set.iter().copied().collect();
    all_gates
        .iter()
        .copied()
        .filter(|g| !in_set.contains(g))
        .collect()
}
