//! The library-facing engine: owns the variable manager, the transition
//! relation, and the candidate proof, and dispatches checking,
//! minimization, and IVC extraction.
use std::rc::Rc;

use crate::aig::Aig;
use crate::bmc::BmcSolver;
use crate::clog;
use crate::ic3::solver::Ic3Solver;
use crate::ivc::bf::IvcBfFinder;
use crate::ivc::caivc::CaivcFinder;
use crate::ivc::cbvc::CbvcFinder;
use crate::ivc::marco::MarcoIvcFinder;
use crate::ivc::ucbf::IvcUcbfFinder;
use crate::ivc::uivc::UnifiedIvcFinder;
use crate::ivc::{Ivc, IvcAlgorithm, IvcFinder};
use crate::logger::LogChannel;
use crate::minimize::brute::BruteForceMinimizer;
use crate::minimize::marco::MarcoMinimizer;
use crate::minimize::sisi::SisiMinimizer;
use crate::minimize::{MinimizationAlgorithm, ProofMinimizer};
use crate::options::{GlobalState, Gs, Options};
use crate::proof_checker::ProofChecker;
use crate::safety::SafetyCounterExample;
use crate::tr::TransitionRelation;
use crate::types::*;
use crate::vars::VariableManager;

/// One externalized counterexample step: `(inputs, state)` in AIGER
/// literals.
pub type ExternalStep = (Vec<ExternalId>, Vec<ExternalId>);

pub struct Engine {
    vars: VariableManager,
    gs: Gs,
    tr: Rc<TransitionRelation>,
    proof: ClauseVec,
    minimizer: Option<Box<dyn ProofMinimizer>>,
    ivc_finder: Option<Box<dyn IvcFinder>>,
    cex: SafetyCounterExample,
}

impl Engine {
    /// Build an engine for the last output of the circuit.
    pub fn new(aig: &Aig, proof: &[ExternalClause]) -> Result<Engine> {
        Self::build(aig, proof, None, Options::default())
    }

    /// Build an engine proving output number `property`.
    pub fn with_property(aig: &Aig, proof: &[ExternalClause], property: usize) -> Result<Engine> {
        Self::build(aig, proof, Some(property), Options::default())
    }

    pub fn with_options(aig: &Aig, proof: &[ExternalClause], opts: Options) -> Result<Engine> {
        Self::build(aig, proof, None, opts)
    }

    fn build(
        aig: &Aig,
        proof: &[ExternalClause],
        property: Option<usize>,
        opts: Options,
    ) -> Result<Engine> {
        let vars = VariableManager::new();
        let tr = match property {
            Some(p) => TransitionRelation::with_property(&vars, aig, p)?,
            None => TransitionRelation::new(&vars, aig)?,
        };

        for cls in proof {
            if cls.is_empty() {
                return Err(Error::MalformedProof("empty clause".to_string()));
            }
            if cls.contains(&0) {
                return Err(Error::MalformedProof(
                    "literal 0 inside a clause".to_string(),
                ));
            }
        }
        let proof = tr.make_internal(proof)?;

        Ok(Engine {
            vars,
            gs: GlobalState::new(opts),
            tr: Rc::new(tr),
            proof,
            minimizer: None,
            ivc_finder: None,
            cex: SafetyCounterExample::new(),
        })
    }

    pub fn set_verbosity(&mut self, v: i32) {
        self.gs.logger.borrow_mut().set_all_verbosities(v);
    }

    pub fn set_channel_verbosity(&mut self, channel: LogChannel, v: i32) {
        self.gs.logger.borrow_mut().set_verbosity(channel, v);
    }

    /// Is the candidate an inductive invariant implying safety?
    pub fn check_proof(&mut self) -> bool {
        let simplify = self.gs.opts.simplify;
        let mut checker = ProofChecker::new(&*self.tr, &self.proof, simplify);
        checker.check_proof()
    }

    /// Run IC3 from scratch. Stores a counterexample when one is found.
    pub fn run_ic3(&mut self) -> bool {
        let mut ic3 = Ic3Solver::new(&self.vars, self.tr.clone(), &self.gs);
        let result = ic3.prove();
        if result.is_unsafe() {
            self.cex = result.cex;
            return false;
        }
        true
    }

    /// Run BMC up to `k_max`. Stores a counterexample when one is found.
    pub fn run_bmc(&mut self, k_max: u32) -> bool {
        let mut bmc = BmcSolver::new(&self.vars, self.tr.clone(), &self.gs);
        let result = bmc.solve(k_max);
        if result.is_unsafe() {
            self.cex = result.cex;
            return false;
        }
        true
    }

    pub fn minimize(&mut self, algorithm: MinimizationAlgorithm) {
        let mut minimizer: Box<dyn ProofMinimizer> = match algorithm {
            MinimizationAlgorithm::Marco => {
                clog!(self.gs, LogChannel::Engine, 1, "starting MARCO");
                Box::new(MarcoMinimizer::new(
                    &self.vars,
                    self.tr.clone(),
                    &self.proof,
                    &self.gs,
                ))
            }
            MinimizationAlgorithm::Camsis => {
                // Deprecated algorithm selector; SISI computes the same
                // minimal safe inductive subsets.
                clog!(
                    self.gs,
                    LogChannel::Engine,
                    1,
                    "CAMSIS is deprecated, running SISI"
                );
                Box::new(SisiMinimizer::new(
                    &self.vars,
                    self.tr.clone(),
                    &self.proof,
                    &self.gs,
                ))
            }
            MinimizationAlgorithm::Sisi => {
                clog!(self.gs, LogChannel::Engine, 1, "starting SISI");
                Box::new(SisiMinimizer::new(
                    &self.vars,
                    self.tr.clone(),
                    &self.proof,
                    &self.gs,
                ))
            }
            MinimizationAlgorithm::BruteForce => {
                clog!(self.gs, LogChannel::Engine, 1, "starting BFMIN");
                Box::new(BruteForceMinimizer::new(
                    &self.vars,
                    self.tr.clone(),
                    &self.proof,
                    &self.gs,
                ))
            }
        };
        minimizer.minimize();
        self.minimizer = Some(minimizer);
    }

    pub fn find_ivcs(&mut self, algorithm: IvcAlgorithm) {
        let mut finder: Box<dyn IvcFinder> = match algorithm {
            IvcAlgorithm::IvcBf => {
                clog!(self.gs, LogChannel::Engine, 1, "starting IVC_BF");
                Box::new(IvcBfFinder::new(&self.vars, self.tr.clone(), &self.gs))
            }
            IvcAlgorithm::IvcUcbf => {
                clog!(self.gs, LogChannel::Engine, 1, "starting IVC_UCBF");
                Box::new(IvcUcbfFinder::new(&self.vars, self.tr.clone(), &self.gs))
            }
            IvcAlgorithm::Marco => {
                clog!(self.gs, LogChannel::Engine, 1, "starting MARCO-IVC");
                Box::new(MarcoIvcFinder::new(&self.vars, self.tr.clone(), &self.gs))
            }
            IvcAlgorithm::Caivc => {
                clog!(self.gs, LogChannel::Engine, 1, "starting CAIVC");
                Box::new(CaivcFinder::new(&self.vars, self.tr.clone(), &self.gs))
            }
            IvcAlgorithm::Cbvc => {
                clog!(self.gs, LogChannel::Engine, 1, "starting CBVC");
                Box::new(CbvcFinder::new(&self.vars, self.tr.clone(), &self.gs))
            }
            IvcAlgorithm::Uivc => {
                clog!(self.gs, LogChannel::Engine, 1, "starting UIVC");
                Box::new(UnifiedIvcFinder::new(&self.vars, self.tr.clone(), &self.gs))
            }
        };
        finder.find_ivcs();
        self.ivc_finder = Some(finder);
    }

    pub fn num_proofs(&self) -> usize {
        self.minimizer.as_ref().map_or(0, |m| m.num_proofs())
    }

    fn strip_property(&self, proof: &mut ClauseVec) {
        let property = self.tr.property_clause();
        if let Some(pos) = proof.iter().position(|cls| *cls == property) {
            proof.remove(pos);
        }
    }

    pub fn proof(&self, i: usize) -> Result<ExternalClauseVec> {
        let minimizer = match self.minimizer.as_ref() {
            Some(m) => m,
            None => return Ok(ExternalClauseVec::new()),
        };
        let mut proof = minimizer.proof(i);
        self.strip_property(&mut proof);
        self.tr.make_external(&proof)
    }

    pub fn minimum_proof(&self) -> Result<ExternalClauseVec> {
        let minimizer = match self.minimizer.as_ref() {
            Some(m) => m,
            None => return Ok(ExternalClauseVec::new()),
        };
        let mut proof = minimizer.minimum_proof();
        self.strip_property(&mut proof);
        self.tr.make_external(&proof)
    }

    pub fn num_ivcs(&self) -> usize {
        self.ivc_finder.as_ref().map_or(0, |f| f.num_mivcs())
    }

    fn externalize_ivc(&self, ivc: &Ivc) -> Result<Vec<ExternalId>> {
        ivc.iter().map(|&g| self.vars.to_external(g)).collect()
    }

    pub fn ivc(&self, i: usize) -> Result<Vec<ExternalId>> {
        let finder = match self.ivc_finder.as_ref() {
            Some(f) => f,
            None => return Ok(Vec::new()),
        };
        self.externalize_ivc(finder.mivc(i))
    }

    pub fn minimum_ivc(&self) -> Result<Vec<ExternalId>> {
        let finder = match self.ivc_finder.as_ref() {
            Some(f) => f,
            None => return Ok(Vec::new()),
        };
        self.externalize_ivc(finder.minimum_ivc())
    }

    /// The counterexample of the last failed `run_ic3` / `run_bmc`, as
    /// `(inputs, state)` steps in AIGER literals.
    pub fn counter_example(&self) -> Result<Vec<ExternalStep>> {
        let mut steps = Vec::with_capacity(self.cex.len());
        for step in &self.cex {
            let inputs = self.vars.make_external(&step.inputs)?;
            let state = self.vars.make_external(&step.state)?;
            steps.push((inputs, state));
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aig::{AigAnd, AigLatch, AigReset};

    fn shift_chain() -> Aig {
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
        aig
    }

    #[test]
    fn test_malformed_proofs_rejected() {
        let aig = shift_chain();
        assert!(matches!(
            Engine::new(&aig, &[vec![]]),
            Err(Error::MalformedProof(_))
        ));
        assert!(matches!(
            Engine::new(&aig, &[vec![5, 0]]),
            Err(Error::MalformedProof(_))
        ));
        // Duplicates are tolerated.
        assert!(Engine::new(&aig, &[vec![5], vec![5]]).is_ok());
    }

    /// A chain whose head holds zero: l0' = l0, each li copies its
    /// predecessor, bad = l3.
    fn hold_chain() -> Aig {
        let mut aig = Aig::new();
        aig.latches = vec![
            AigLatch::new(4, 4, AigReset::Zero),
            AigLatch::new(6, 4, AigReset::Zero),
            AigLatch::new(8, 6, AigReset::Zero),
            AigLatch::new(10, 8, AigReset::Zero),
        ];
        aig.outputs = vec![10];
        aig
    }

    #[test]
    fn test_check_proof_verdicts() {
        let aig = hold_chain();
        // ~l0..~l3 is a valid inductive invariant; ~l3 is the property.
        let proof: Vec<ExternalClause> = vec![vec![5], vec![7], vec![9], vec![11]];
        let mut engine = Engine::new(&aig, &proof).unwrap();
        assert!(engine.check_proof());

        // Dropping ~l0 leaves ~l1 unsupported.
        let partial: Vec<ExternalClause> = vec![vec![7], vec![9], vec![11]];
        let mut engine = Engine::new(&aig, &partial).unwrap();
        assert!(!engine.check_proof());
    }

    #[test]
    fn test_run_bmc_stores_cex() {
        let aig = shift_chain();
        let mut engine = Engine::new(&aig, &[]).unwrap();
        assert!(engine.run_bmc(3));
        assert!(!engine.run_bmc(4));
        let cex = engine.counter_example().unwrap();
        assert_eq!(cex.len(), 5);
    }

    #[test]
    fn test_minimize_round_trip() {
        let aig = hold_chain();
        let proof: Vec<ExternalClause> = vec![vec![5], vec![7], vec![9], vec![11]];
        let mut engine = Engine::new(&aig, &proof).unwrap();
        assert!(engine.check_proof());
        engine.minimize(MinimizationAlgorithm::BruteForce);
        assert_eq!(engine.num_proofs(), 1);
        // Every clause supports the next one, so nothing can be dropped;
        // the exported proof omits only the property clause ~l3.
        let minimized = engine.minimum_proof().unwrap();
        assert_eq!(minimized.len(), 3);
        for cls in &minimized {
            assert!(proof.contains(cls));
        }
        assert!(!minimized.contains(&vec![11]));
    }
}
