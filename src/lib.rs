/*!
# A proof minimization engine for hardware safety proofs

Given a sequential circuit (an And-Inverter Graph) and a candidate
inductive invariant expressed as clauses over the circuit's latches, this
crate checks that the candidate proves safety and extracts minimal safe
inductive subsets of it, as well as inductive validity cores: minimal gate
subsets sufficient to prove the same property.

The reasoning stack underneath:

- packed literal identifiers with constant-time negation and time-shifting
  ([`types`]);
- a transition-relation engine that internalizes the AIG, unrolls it, and
  simplifies the resulting CNF ([`tr`]);
- an incremental SAT adaptor with assumptions, activation groups, and
  critical-assumption extraction over CaDiCaL backends ([`adaptor`],
  [`sat`]);
- an IC3/PDR engine over an arena-allocated inductive trace ([`ic3`]),
  bounded model checking ([`bmc`]), and hybrid scheduling ([`safety`]);
- a debug-augmented transition relation and cardinality encoders driving
  fault localization and correction-set enumeration ([`debug_tr`],
  [`cardinality`], [`debugging`], [`mcs`]);
- MARCO-style seed enumeration with map and MaxSAT solvers composing the
  minimization and IVC harnesses ([`map`], [`maxsat`], [`minimize`],
  [`ivc`]).

## Usage

```
use provecore::aig::{Aig, AigLatch, AigReset};
use provecore::engine::Engine;
use provecore::minimize::MinimizationAlgorithm;

// A latch stuck at zero; bad is the latch itself.
let mut aig = Aig::new();
aig.latches = vec![AigLatch::new(2, 2, AigReset::Zero)];
aig.outputs = vec![2];

// The candidate proof: the single clause ~l.
let proof = vec![vec![3u32]];

let mut engine = Engine::new(&aig, &proof).expect("well-formed input");
assert!(engine.check_proof());
engine.minimize(MinimizationAlgorithm::Marco);
assert!(engine.num_proofs() >= 1);
```

AIGER file parsing and the command-line front end live in collaborating
crates; this library consumes the parsed circuit.
*/
/// Module `adaptor` wraps the SAT backends behind literal translation,
/// activation groups, and critical-assumption extraction.
pub mod adaptor;
/// Module `aig` holds the in-memory circuit graph handed over by the
/// parser.
pub mod aig;
/// Module `bmc` implements bounded model checking.
pub mod bmc;
/// Module `cardinality` provides totalizer and sorting-network cardinality
/// constraints.
pub mod cardinality;
/// Module `cons` answers relative-induction queries over indexed clause
/// sets.
pub mod cons;
/// Module `debug_tr` augments the circuit with per-gate debug latches and
/// inputs.
pub mod debug_tr;
/// Module `debugging` performs cardinality-bounded fault localization.
pub mod debugging;
/// Module `engine` is the public library API.
pub mod engine;
/// Module `ic3` implements property directed reachability.
pub mod ic3;
/// Module `ivc` extracts inductive validity cores.
pub mod ivc;
/// Module `logger` gates per-channel verbosity onto `tracing`.
pub mod logger;
/// Module `map` enumerates seeds over power-set lattices.
pub mod map;
/// Module `maxsat` is a core-guided MaxSAT solver over soft units.
pub mod maxsat;
/// Module `mcs` enumerates minimal correction sets.
pub mod mcs;
/// Module `minimize` holds the proof minimizers.
pub mod minimize;
/// Module `mus` extracts minimal unsatisfiable subsets by group
/// activation.
pub mod mus;
/// Module `options` carries engine configuration and the shared context.
pub mod options;
/// Module `proof_checker` validates candidate invariants.
pub mod proof_checker;
/// Module `safety` defines verdicts, counterexamples, and the hybrid
/// checker.
pub mod safety;
/// Module `sat` wraps the CaDiCaL backends behind a narrow interface.
pub mod sat;
/// Module `tr` owns the transition relation and its CNF lowerings.
pub mod tr;
/// Module `types` provides the packed literal algebra and basic building
/// blocks.
pub mod types;
/// Module `vars` mints identifiers and maps them to AIGER literals.
pub mod vars;

pub use crate::aig::Aig;
pub use crate::engine::Engine;
pub use crate::ivc::IvcAlgorithm;
pub use crate::minimize::MinimizationAlgorithm;
pub use crate::types::{Error, Result};
