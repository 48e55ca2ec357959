//! Proof minimization: finding minimal safe inductive subsets of a
//! candidate proof.
pub mod brute;
pub mod marco;
pub mod sisi;

use std::rc::Rc;

use crate::clog;
use crate::logger::LogChannel;
use crate::options::Gs;
use crate::tr::TransitionRelation;
use crate::types::*;
use crate::vars::VariableManager;

/// The algorithms the engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimizationAlgorithm {
    Marco,
    /// Deprecated: routed to SISI.
    Camsis,
    Sisi,
    BruteForce,
}

/// Bookkeeping shared by every minimizer: the indexed proof (with the
/// property clause appended when missing) and the recorded minimal proofs.
pub struct MinimizerData {
    vars: VariableManager,
    gs: Gs,
    tr: Rc<TransitionRelation>,
    proof: ClauseVec,
    property: ClauseId,
    minimal_proofs: Vec<Vec<ClauseId>>,
    minimum_proof: Vec<ClauseId>,
}

impl MinimizerData {
    pub fn new(vars: &VariableManager, tr: Rc<TransitionRelation>, proof: &[Clause], gs: &Gs) -> Self {
        let mut data = MinimizerData {
            vars: vars.clone(),
            gs: gs.clone(),
            tr,
            proof: proof.to_vec(),
            property: 0,
            minimal_proofs: Vec::new(),
            minimum_proof: Vec::new(),
        };
        data.add_property_if_missing();
        data
    }

    fn add_property_if_missing(&mut self) {
        let property = self.tr.property_clause();
        for (id, cls) in self.proof.iter().enumerate() {
            if *cls == property {
                clog!(
                    self.gs,
                    LogChannel::Minimization,
                    4,
                    "proof contains the property, not adding it"
                );
                self.property = id;
                return;
            }
        }
        clog!(
            self.gs,
            LogChannel::Minimization,
            3,
            "property not included in the proof, adding it"
        );
        self.property = self.proof.len();
        self.proof.push(property);
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

    pub fn num_clauses(&self) -> usize {
        self.proof.len()
    }

    pub fn clause_of(&self, id: ClauseId) -> &Clause {
        &self.proof[id]
    }

    pub fn proof(&self) -> &ClauseVec {
        &self.proof
    }

    pub fn property(&self) -> ClauseId {
        self.property
    }

    pub fn all_clause_ids(&self) -> Vec<ClauseId> {
        (0..self.num_clauses()).collect()
    }

    pub fn add_minimal_proof(&mut self, proof: &[ClauseId]) {
        let mut copy = proof.to_vec();
        copy.sort_unstable();
        clog!(
            self.gs,
            LogChannel::Minimization,
            2,
            "minimal proof of {} clauses",
            copy.len()
        );
        self.minimal_proofs.push(copy);
    }

    pub fn set_minimum_proof(&mut self, proof: &[ClauseId]) {
        self.minimum_proof = proof.to_vec();
    }

    pub fn minimum_proof_known(&self) -> bool {
        !self.minimum_proof.is_empty()
    }

    pub fn num_proofs(&self) -> usize {
        self.minimal_proofs.len()
    }

    pub fn proof_clauses(&self, i: usize) -> ClauseVec {
        self.minimal_proofs[i]
            .iter()
            .map(|&id| self.proof[id].clone())
            .collect()
    }

    pub fn minimum_proof_clauses(&self) -> ClauseVec {
        self.minimum_proof
            .iter()
            .map(|&id| self.proof[id].clone())
            .collect()
    }
}

pub trait ProofMinimizer {
    fn minimize(&mut self);
    fn data(&self) -> &MinimizerData;

    fn num_proofs(&self) -> usize {
        self.data().num_proofs()
    }

    fn proof(&self, i: usize) -> ClauseVec {
        self.data().proof_clauses(i)
    }

    fn minimum_proof(&self) -> ClauseVec {
        self.data().minimum_proof_clauses()
    }
}
