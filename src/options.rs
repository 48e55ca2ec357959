//! Engine configuration and the shared context threaded through every
//! solver.
//!
//! There is deliberately no process-wide singleton: an [`Rc<GlobalState>`]
//! travels explicitly into each component that needs options or logging.
use std::cell::RefCell;
use std::rc::Rc;

use crate::logger::Logger;
use crate::sat::SatBackend;

/// Map-solver flavour used by the unified IVC finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapSolverType {
    Sat,
    MaxSat,
}

/// Correction-set finder flavour used by the unified IVC finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McsFinderType {
    Basic,
    Bmc,
}

/// Every knob the algorithms consult. Plain data with defaults; nothing in
/// this crate parses command lines.
#[derive(Debug, Clone)]
pub struct Options {
    /// Run CNF simplification (variable elimination) on two-frame
    /// unrollings before loading consecution-style solvers.
    pub simplify: bool,
    /// SAT backend used by non-simplifying adaptors.
    pub backend: SatBackend,

    //
    //## hybrid engines
    //
    /// BMC depth tried before IC3 in the hybrid safety checker. 0 disables
    /// the BMC phase.
    pub hybrid_bmc_kmax: u32,
    /// BMC depth tried before IC3 in the hybrid debugger.
    pub hybrid_debug_bmc_frames: u32,

    //
    //## MARCO proof minimization
    //
    /// Seed solver asks for minimal seeds.
    pub marco_direction_up: bool,
    /// Seed solver asks for maximal seeds. Both flags set means zigzag.
    pub marco_direction_down: bool,

    //
    //## IVC_UCBF
    //
    /// Shrink the proof with SISI before the MUS pass.
    pub ivc_ucbf_use_sisi: bool,
    /// Use a single UNSAT-core pass instead of a full MUS.
    pub ivc_ucbf_use_core: bool,
    /// Use a full deletion-based MUS.
    pub ivc_ucbf_use_mus: bool,

    //
    //## MARCO-IVC
    //
    pub marcoivc_incr_issafe: bool,
    pub marcoivc_hybrid_issafe: bool,
    pub marcoivc_debug_grow: bool,
    pub marcoivc_use_ivcucbf: bool,
    pub marcoivc_explore_basic_hints: bool,
    pub marcoivc_explore_complex_hints: bool,

    //
    //## CAIVC
    //
    pub caivc_abstraction_refinement: bool,
    pub caivc_approx_mcs: bool,
    pub caivc_grow_mcs: bool,
    pub caivc_simple_mcs: bool,
    pub caivc_check_with_debug: bool,
    pub caivc_use_bmc: bool,
    /// Cardinalities enumerated upfront during abstraction refinement.
    pub caivc_ar_upfront_nmax: u32,
    pub caivc_ar_bmc_kmax: u32,
    pub caivc_ar_bmc_nmax: u32,

    //
    //## CBVC
    //
    pub cbvc_upfront_nmax: u32,
    pub cbvc_upfront_approx_mcs: bool,
    pub cbvc_lift: bool,
    /// Iteration ceiling on the BVC level loop; there are no wall-clock
    /// timeouts anywhere in the engine.
    pub cbvc_max_level: u32,

    //
    //## unified IVC
    //
    pub uivc_direction_up: bool,
    pub uivc_direction_down: bool,
    pub uivc_map_solver_type: MapSolverType,
    pub uivc_mcs_finder_type: McsFinderType,
    pub uivc_upfront_nmax: u32,
    pub uivc_mcs_grow: bool,
    pub uivc_check_map: bool,
    pub uivc_coi_hints: bool,
    pub uivc_proof_cache: usize,
    pub uivc_cex_cache: usize,

    //
    //## BMC-based correction-set finding
    //
    pub mcs_bmc_kmax: u32,
    pub mcs_bmc_kmin: u32,
    pub mcs_bmc_nmax: u32,
    pub mcs_try_to_exhaust: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            simplify: true,
            backend: SatBackend::Cadical,

            hybrid_bmc_kmax: 5,
            hybrid_debug_bmc_frames: 3,

            marco_direction_up: true,
            marco_direction_down: true,

            ivc_ucbf_use_sisi: true,
            ivc_ucbf_use_core: false,
            ivc_ucbf_use_mus: true,

            marcoivc_incr_issafe: false,
            marcoivc_hybrid_issafe: true,
            marcoivc_debug_grow: false,
            marcoivc_use_ivcucbf: true,
            marcoivc_explore_basic_hints: false,
            marcoivc_explore_complex_hints: false,

            caivc_abstraction_refinement: true,
            caivc_approx_mcs: true,
            caivc_grow_mcs: false,
            caivc_simple_mcs: false,
            caivc_check_with_debug: false,
            caivc_use_bmc: true,
            caivc_ar_upfront_nmax: 1,
            caivc_ar_bmc_kmax: 4,
            caivc_ar_bmc_nmax: 2,

            cbvc_upfront_nmax: 1,
            cbvc_upfront_approx_mcs: true,
            cbvc_lift: true,
            cbvc_max_level: 1 << 16,

            uivc_direction_up: true,
            uivc_direction_down: true,
            uivc_map_solver_type: MapSolverType::MaxSat,
            uivc_mcs_finder_type: McsFinderType::Bmc,
            uivc_upfront_nmax: 1,
            uivc_mcs_grow: true,
            uivc_check_map: false,
            uivc_coi_hints: false,
            uivc_proof_cache: 8,
            uivc_cex_cache: 8,

            mcs_bmc_kmax: 4,
            mcs_bmc_kmin: 0,
            mcs_bmc_nmax: 2,
            mcs_try_to_exhaust: true,
        }
    }
}

/// Options and logger bundled for explicit threading through every solver.
#[derive(Debug, Default)]
pub struct GlobalState {
    pub opts: Options,
    pub logger: RefCell<Logger>,
}

pub type Gs = Rc<GlobalState>;

impl GlobalState {
    pub fn new(opts: Options) -> Gs {
        Rc::new(GlobalState {
            opts,
            logger: RefCell::new(Logger::new()),
        })
    }

    pub fn shared() -> Gs {
        Rc::new(GlobalState::default())
    }
}
