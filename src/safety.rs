//! Safety verdicts, counterexample traces, and the hybrid BMC-then-IC3
//! safety checker.
use std::rc::Rc;

use crate::adaptor::SatAdaptor;
use crate::bmc::BmcSolver;
use crate::ic3::solver::Ic3Solver;
use crate::options::Gs;
use crate::tr::TransitionSystem;
use crate::types::*;
use crate::vars::VariableManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyAnswer {
    Safe,
    Unsafe,
    Unknown,
}

/// One step of a counterexample: the inputs applied and the state reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub inputs: Cube,
    pub state: Cube,
}

impl Step {
    pub fn new(inputs: Cube, state: Cube) -> Step {
        Step { inputs, state }
    }
}

/// Ordered from the initial state to the violating state.
pub type SafetyCounterExample = Vec<Step>;
pub type SafetyProof = ClauseVec;

#[derive(Debug, Clone)]
pub struct SafetyResult {
    pub result: SafetyAnswer,
    pub proof: SafetyProof,
    pub cex: SafetyCounterExample,
}

impl Default for SafetyResult {
    fn default() -> SafetyResult {
        SafetyResult {
            result: SafetyAnswer::Unknown,
            proof: SafetyProof::new(),
            cex: SafetyCounterExample::new(),
        }
    }
}

impl SafetyResult {
    pub fn safe(&self) -> bool {
        self.result == SafetyAnswer::Safe
    }

    pub fn is_unsafe(&self) -> bool {
        self.result == SafetyAnswer::Unsafe
    }

    pub fn unknown(&self) -> bool {
        self.result == SafetyAnswer::Unknown
    }
}

/// Does the recorded trace simulate on the transition relation under the
/// extra assumptions?
pub fn check_simulation<T: TransitionSystem>(
    sys: &T,
    cex: &SafetyCounterExample,
    extra_assumps: &[Id],
) -> bool {
    assert!(!cex.is_empty());

    let mut solver = SatAdaptor::default();
    solver.add_clauses(&sys.unroll_with_init(cex.len() as u64));

    let mut assumps = Cube::new();
    for (i, step) in cex.iter().enumerate() {
        assumps.extend(prime_vec_n(&step.inputs, i as u64));
        assumps.extend(prime_vec_n(&step.state, i as u64));
    }
    assumps.extend_from_slice(extra_assumps);

    solver.solve(&assumps)
}

/// Does the trace simulate and actually reach the bad literal at its final
/// step?
pub fn check_counter_example<T: TransitionSystem>(sys: &T, cex: &SafetyCounterExample) -> bool {
    if cex.is_empty() {
        return false;
    }
    let badp = prime_n(sys.tr().bad(), cex.len() as u64 - 1);
    check_simulation(sys, cex, &[badp])
}

/// Run BMC up to a bound; if it does not refute, hand over to IC3. Used
/// wherever short counterexamples are expected.
pub struct HybridSafetyChecker<T: TransitionSystem> {
    k_max: u32,
    ic3: Ic3Solver<T>,
    bmc: BmcSolver<T>,
}

impl<T: TransitionSystem> HybridSafetyChecker<T> {
    pub fn new(vars: &VariableManager, tr: Rc<T>, gs: &Gs) -> Self {
        HybridSafetyChecker {
            k_max: gs.opts.hybrid_bmc_kmax,
            ic3: Ic3Solver::new(vars, tr.clone(), gs),
            bmc: BmcSolver::new(vars, tr, gs),
        }
    }

    pub fn set_k_max(&mut self, k: u32) {
        self.k_max = k;
    }

    pub fn prove(&mut self) -> SafetyResult {
        if self.k_max > 0 {
            let result = self.bmc.solve(self.k_max);
            if result.is_unsafe() {
                return result;
            }
        }
        self.ic3.prove()
    }
}
