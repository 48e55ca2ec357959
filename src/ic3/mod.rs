//! The IC3 / PDR subsystem: the inductive trace, the frame solver, the
//! UNSAT-core lifter, and the engine built on top of them.
pub mod frame_solver;
pub mod lifter;
pub mod solver;
pub mod trace;

use std::collections::BTreeSet;

/// Frame index of lemmas proven inductive forever.
pub const LEVEL_INF: u32 = u32::MAX;

/// Index into the lemma arena. Never dangles: deletion only marks.
pub type LemmaId = usize;

/// A frame is a set of lemma indices. Ordered for deterministic replay.
pub type Frame = BTreeSet<LemmaId>;

pub fn level_string(level: u32) -> String {
    if level == LEVEL_INF {
        "inf".to_string()
    } else {
        level.to_string()
    }
}
