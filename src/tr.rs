//! The transition relation: owns the circuit (inputs, latches with resets,
//! AND gates, invariant constraints, and the bad literal) and lowers it to
//! CNF for k-step unrollings.
//!
//! Gate abstraction builds a copy in which non-kept gates are re-declared as
//! primary inputs; that substrate is what the IVC machinery proves safe.
use std::collections::{HashMap, HashSet};

use crate::adaptor::SatAdaptor;
use crate::aig::{Aig, AigReset};
use crate::types::*;
use crate::vars::VariableManager;

/// A latch: current-state id, next-state function, and reset literal
/// (`ID_FALSE`, `ID_TRUE`, or `ID_NULL` for unconstrained).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatchRec {
    pub id: Id,
    pub next: Id,
    pub reset: Id,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AndGate {
    pub lhs: Id,
    pub rhs0: Id,
    pub rhs1: Id,
}

#[derive(Debug, Clone)]
pub struct TransitionRelation {
    vars: VariableManager,
    inputs: Vec<Id>,
    latches: Vec<Id>,
    latch_recs: HashMap<Id, LatchRec>,
    gates: Vec<AndGate>,
    gate_index: HashMap<Id, usize>,
    constraints: Vec<Id>,
    bad: Id,
}

impl TransitionRelation {
    /// Build from a parsed AIG, proving the last output.
    pub fn new(vars: &VariableManager, aig: &Aig) -> Result<Self> {
        if aig.outputs.is_empty() {
            return Err(Error::MalformedCircuit("circuit has no outputs".into()));
        }
        Self::with_property(vars, aig, aig.outputs.len() - 1)
    }

    /// Build from a parsed AIG, proving output number `property`.
    pub fn with_property(vars: &VariableManager, aig: &Aig, property: usize) -> Result<Self> {
        let bad_ext = *aig.outputs.get(property).ok_or_else(|| {
            Error::MalformedCircuit(format!("no output {} in circuit", property))
        })?;

        let mut tr = TransitionRelation {
            vars: vars.clone(),
            inputs: Vec::new(),
            latches: Vec::new(),
            latch_recs: HashMap::new(),
            gates: Vec::new(),
            gate_index: HashMap::new(),
            constraints: Vec::new(),
            bad: ID_NULL,
        };

        // First pass: declare every node so forward references resolve.
        for &ext in &aig.inputs {
            let id = tr.declare(ext, "i")?;
            tr.inputs.push(id);
        }
        for latch in &aig.latches {
            let id = tr.declare(latch.lit, "l")?;
            tr.latches.push(id);
        }
        for gate in &aig.ands {
            let id = tr.declare(gate.lhs, "g")?;
            tr.gate_index.insert(id, tr.gates.len());
            tr.gates.push(AndGate {
                lhs: id,
                rhs0: ID_NULL,
                rhs1: ID_NULL,
            });
        }

        // Second pass: resolve every reference.
        for (i, latch) in aig.latches.iter().enumerate() {
            let id = tr.latches[i];
            let next = tr.resolve(latch.next)?;
            let reset = match latch.reset {
                AigReset::Zero => ID_FALSE,
                AigReset::One => ID_TRUE,
                AigReset::Free => ID_NULL,
            };
            tr.latch_recs.insert(id, LatchRec { id, next, reset });
        }
        for (i, gate) in aig.ands.iter().enumerate() {
            let rhs0 = tr.resolve(gate.rhs0)?;
            let rhs1 = tr.resolve(gate.rhs1)?;
            tr.gates[i].rhs0 = rhs0;
            tr.gates[i].rhs1 = rhs1;
        }
        for &ext in &aig.constraints {
            let c = tr.resolve(ext)?;
            tr.constraints.push(c);
        }
        tr.bad = tr.resolve(bad_ext)?;

        Ok(tr)
    }

    fn declare(&mut self, ext: ExternalId, prefix: &str) -> Result<Id> {
        if ext & 1 != 0 {
            return Err(Error::MalformedCircuit(format!(
                "negated definition literal {}",
                ext
            )));
        }
        if ext == 0 || self.vars.is_known_external(ext) {
            return Err(Error::MalformedCircuit(format!(
                "duplicate or constant definition literal {}",
                ext
            )));
        }
        Ok(self.vars.new_var(&format!("{}{}", prefix, ext / 2), ext))
    }

    fn resolve(&self, ext: ExternalId) -> Result<Id> {
        self.vars
            .to_internal(ext)
            .map_err(|_| Error::MalformedCircuit(format!("undefined literal {}", ext)))
    }

    /// Gate-abstracted copy: every gate not in `kept` becomes a free primary
    /// input. Latches, constraints, and bad are preserved.
    pub fn abstracted(parent: &TransitionRelation, kept: &[Id]) -> TransitionRelation {
        let keep: HashSet<Id> = kept.iter().copied().collect();
        let mut tr = parent.clone();
        let mut gates = Vec::new();
        tr.gate_index.clear();
        for gate in parent.gates.iter() {
            if keep.contains(&gate.lhs) {
                tr.gate_index.insert(gate.lhs, gates.len());
                gates.push(*gate);
            } else {
                tr.inputs.push(gate.lhs);
            }
        }
        tr.gates = gates;
        tr
    }

    pub fn vars(&self) -> &VariableManager {
        &self.vars
    }

    pub fn bad(&self) -> Id {
        self.bad
    }

    pub fn property_clause(&self) -> Clause {
        vec![negate(self.bad)]
    }

    pub fn inputs(&self) -> &[Id] {
        &self.inputs
    }

    pub fn latches(&self) -> &[Id] {
        &self.latches
    }

    pub fn constraints(&self) -> &[Id] {
        &self.constraints
    }

    pub fn gates(&self) -> &[AndGate] {
        &self.gates
    }

    pub fn gate_ids(&self) -> Vec<Id> {
        self.gates.iter().map(|g| g.lhs).collect()
    }

    pub fn num_gates(&self) -> usize {
        self.gates.len()
    }

    pub fn is_gate(&self, id: Id) -> bool {
        self.gate_index.contains_key(&strip(unprime(id)))
    }

    pub fn get_gate(&self, id: Id) -> &AndGate {
        &self.gates[self.gate_index[&strip(unprime(id))]]
    }

    pub fn latch_rec(&self, id: Id) -> &LatchRec {
        &self.latch_recs[&strip(unprime(id))]
    }

    pub fn is_latch(&self, id: Id) -> bool {
        self.latch_recs.contains_key(&strip(unprime(id)))
    }

    /// Unit clauses fixing every latch with a concrete reset value.
    pub fn init_state_clauses(&self) -> ClauseVec {
        let mut init = ClauseVec::new();
        for &l in &self.latches {
            match self.latch_recs[&l].reset {
                ID_FALSE => init.push(vec![negate(l)]),
                ID_TRUE => init.push(vec![l]),
                ID_NULL => {}
                other => panic!("latch {} has non-constant reset {}", l, other),
            }
        }
        init
    }

    /// Register an internally-minted latch (used by the debug augmentation).
    pub(crate) fn add_internal_latch(&mut self, id: Id, next: Id, reset: Id) {
        debug_assert!(!self.latch_recs.contains_key(&id));
        self.latches.push(id);
        self.latch_recs.insert(id, LatchRec { id, next, reset });
    }

    /// Register an internally-minted primary input.
    pub(crate) fn add_internal_input(&mut self, id: Id) {
        self.inputs.push(id);
    }

    pub fn make_internal(&self, vec: &[ExternalClause]) -> Result<ClauseVec> {
        self.vars.make_internal_vec(vec)
    }

    pub fn make_external(&self, vec: &[Clause]) -> Result<ExternalClauseVec> {
        self.vars.make_external_vec(vec)
    }
}

/// Tseitin lowering of an AND gate: `lhs = rhs0 & rhs1`.
pub fn tseitin_and(gate: &AndGate) -> ClauseVec {
    vec![
        vec![negate(gate.lhs), gate.rhs0],
        vec![negate(gate.lhs), gate.rhs1],
        vec![gate.lhs, negate(gate.rhs0), negate(gate.rhs1)],
    ]
}

/// Anything that can be unrolled frame by frame. The per-gate CNF is the
/// override point; everything else derives from it.
pub trait TransitionSystem {
    fn tr(&self) -> &TransitionRelation;

    fn gate_cnf(&self, gate: &AndGate) -> ClauseVec {
        tseitin_and(gate)
    }

    /// CNF of the transition step at frame `k`: gates at `k`, the equality
    /// `latch@(k+1) = next@k` for every latch, and the constraints at `k`.
    fn unroll_frame(&self, k: u64) -> ClauseVec {
        let tr = self.tr();
        let mut cnf = ClauseVec::new();
        for gate in tr.gates() {
            for cls in self.gate_cnf(gate) {
                cnf.push(prime_vec_n(&cls, k));
            }
        }
        for &l in tr.latches() {
            let rec = tr.latch_rec(l);
            let lp = prime_n(l, k + 1);
            let next = prime_n(rec.next, k);
            cnf.push(vec![negate(lp), next]);
            cnf.push(vec![lp, negate(next)]);
        }
        for &c in tr.constraints() {
            cnf.push(vec![prime_n(c, k)]);
        }
        cnf
    }

    /// Frames `0..n` plus a final copy of the constraints primed to `n`.
    fn unroll(&self, n: u64) -> ClauseVec {
        let mut cnf = ClauseVec::new();
        for k in 0..n {
            cnf.extend(self.unroll_frame(k));
        }
        for &c in self.tr().constraints() {
            cnf.push(vec![prime_n(c, n)]);
        }
        cnf
    }

    fn init_state(&self) -> ClauseVec {
        self.tr().init_state_clauses()
    }

    fn unroll_with_init(&self, n: u64) -> ClauseVec {
        let mut cnf = self.unroll(n);
        cnf.extend(self.init_state());
        cnf
    }
}

impl TransitionSystem for TransitionRelation {
    fn tr(&self) -> &TransitionRelation {
        self
    }
}

/// Two-frame unrolling run through the simplifying backend with the
/// interface (latches, inputs, constraints — current and primed — plus bad
/// and bad') frozen. The common preprocessor for consecution solvers.
pub fn simplify_tr<T: TransitionSystem>(sys: &T) -> ClauseVec {
    let unrolled = sys.unroll(2);
    let tr = sys.tr();

    let mut simp = SatAdaptor::simplifying();
    simp.add_clauses(&unrolled);

    simp.freeze_all(tr.latches().iter(), true);
    simp.freeze_all(tr.constraints().iter(), true);
    simp.freeze_all(tr.inputs().iter(), true);
    simp.freeze(tr.bad());
    simp.freeze(prime(tr.bad()));

    simp.simplify()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aig::{AigAnd, AigLatch};

    /// Two inputs, one AND gate, bad = i0 & i1.
    pub fn and_gate_aig() -> Aig {
        let mut aig = Aig::new();
        aig.inputs = vec![2, 4];
        aig.ands = vec![AigAnd::new(6, 2, 4)];
        aig.outputs = vec![6];
        aig
    }

    /// Four-bit shift chain with all-zero reset; bad = l3 & ~l2 & ~l1 & l0.
    pub fn shift_chain_aig() -> Aig {
        let mut aig = Aig::new();
        aig.inputs = vec![2];
        // Latches 4, 6, 8, 10; l0.next = input, li.next = l(i-1).
        aig.latches = vec![
            AigLatch::new(4, 2, AigReset::Zero),
            AigLatch::new(6, 4, AigReset::Zero),
            AigLatch::new(8, 6, AigReset::Zero),
            AigLatch::new(10, 8, AigReset::Zero),
        ];
        // bad = l3 & ~l2 & ~l1 & l0
        aig.ands = vec![
            AigAnd::new(12, 10, 9),
            AigAnd::new(14, 12, 7),
            AigAnd::new(16, 14, 4),
        ];
        aig.outputs = vec![16];
        aig
    }

    #[test]
    fn test_construction() {
        let vars = VariableManager::new();
        let tr = TransitionRelation::new(&vars, &and_gate_aig()).unwrap();
        assert_eq!(tr.inputs().len(), 2);
        assert_eq!(tr.num_gates(), 1);
        assert!(tr.is_gate(tr.bad()));
        assert_eq!(tr.make_external(&[tr.property_clause()]).unwrap(), vec![
            vec![7]
        ]);
    }

    #[test]
    fn test_malformed_circuits() {
        let vars = VariableManager::new();
        let mut aig = and_gate_aig();
        aig.ands[0].rhs1 = 40; // undefined
        assert!(matches!(
            TransitionRelation::new(&vars, &aig),
            Err(Error::MalformedCircuit(_))
        ));

        let vars = VariableManager::new();
        let mut aig = and_gate_aig();
        aig.ands.push(AigAnd::new(6, 2, 4)); // duplicate lhs
        assert!(matches!(
            TransitionRelation::new(&vars, &aig),
            Err(Error::MalformedCircuit(_))
        ));

        let vars = VariableManager::new();
        let mut aig = and_gate_aig();
        aig.outputs.clear();
        assert!(matches!(
            TransitionRelation::new(&vars, &aig),
            Err(Error::MalformedCircuit(_))
        ));
    }

    #[test]
    fn test_init_state() {
        let vars = VariableManager::new();
        let tr = TransitionRelation::new(&vars, &shift_chain_aig()).unwrap();
        let init = tr.init_state_clauses();
        assert_eq!(init.len(), 4);
        for cls in &init {
            assert_eq!(cls.len(), 1);
            assert!(is_negated(cls[0]));
        }
    }

    #[test]
    fn test_unroll_frame_priming() {
        let vars = VariableManager::new();
        let tr = TransitionRelation::new(&vars, &shift_chain_aig()).unwrap();
        let f0 = tr.unroll_frame(0);
        let f2 = tr.unroll_frame(2);
        assert_eq!(f0.len(), f2.len());
        // Frame 2 literals live at primes 2 and 3 only.
        for cls in &f2 {
            for &lit in cls {
                assert!(nprimes(lit) == 2 || nprimes(lit) == 3);
            }
        }
    }

    #[test]
    fn test_unrolled_trace_exists() {
        // unrollWithInit(N) is SAT iff the circuit has a trace of length N.
        let vars = VariableManager::new();
        let tr = TransitionRelation::new(&vars, &shift_chain_aig()).unwrap();
        for n in 1..4 {
            let mut solver = SatAdaptor::default();
            solver.add_clauses(&tr.unroll_with_init(n));
            assert!(solver.solve(&[]));
        }
    }

    #[test]
    fn test_bad_reachable_at_depth() {
        // The shift chain needs 4 steps to load pattern 1001 into l3..l0.
        let vars = VariableManager::new();
        let tr = TransitionRelation::new(&vars, &shift_chain_aig()).unwrap();
        let mut solver = SatAdaptor::default();
        solver.add_clauses(&tr.unroll_with_init(5));
        assert!(!solver.solve(&[prime_n(tr.bad(), 3)]));
        assert!(solver.solve(&[prime_n(tr.bad(), 4)]));
    }

    #[test]
    fn test_abstraction_frees_gates() {
        let vars = VariableManager::new();
        let tr = TransitionRelation::new(&vars, &and_gate_aig()).unwrap();
        let abs = TransitionRelation::abstracted(&tr, &[]);
        assert_eq!(abs.num_gates(), 0);
        assert_eq!(abs.inputs().len(), 3);
        assert_eq!(abs.bad(), tr.bad());
        // With the gate freed, bad can be 1 with both inputs 0.
        let mut solver = SatAdaptor::default();
        solver.add_clauses(&abs.unroll(1));
        let orig_inputs = &tr.inputs()[..2];
        let mut assumps: Cube = orig_inputs.iter().map(|&i| negate(i)).collect();
        assumps.push(abs.bad());
        assert!(solver.solve(&assumps));
    }

    #[test]
    fn test_simplify_tr_equisatisfiable_interface() {
        let vars = VariableManager::new();
        let tr = TransitionRelation::new(&vars, &shift_chain_aig()).unwrap();
        let simplified = simplify_tr(&tr);

        let mut plain = SatAdaptor::default();
        plain.add_clauses(&tr.unroll(2));
        let mut simp = SatAdaptor::default();
        simp.add_clauses(&simplified);

        // Identical verdicts over latch-interface assumptions.
        let l = tr.latches().to_vec();
        let cases: Vec<Cube> = vec![
            vec![l[0], l[1], l[2], l[3], prime(l[0])],
            vec![negate(l[0]), prime(l[1])],
            vec![l[0], negate(prime(l[1]))],
            vec![tr.bad()],
            vec![negate(l[3]), prime_n(tr.bad(), 1)],
        ];
        for assumps in cases {
            assert_eq!(plain.solve(&assumps), simp.solve(&assumps));
        }
    }
}
