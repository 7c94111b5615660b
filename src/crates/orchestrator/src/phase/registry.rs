//! Static declarative phase table.
//!
//! `canonical_plan()` builds the table fresh each call — it's cheap, fixed
//! data, and this keeps the registry free of global mutable state.

/// How a phase's instances are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    /// Exactly one instance, index 0.
    Singleton,
    /// One instance per item produced by an upstream phase's output
    /// (e.g. `write` fans out over the scenes the `plan` phase produced).
    Derived { from: &'static str },
}

/// Bounds concurrent use of a provider; Scheduler sizes its semaphores
/// per class, not per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostClass {
    /// Cheap, no external provider call (e.g. assembling the manuscript).
    Cheap,
    /// LLM text generation.
    Llm,
    /// Image generation.
    Image,
    /// Vision/quality-check inspection.
    Vision,
}

/// One row of the phase table.
#[derive(Debug, Clone)]
pub struct PhaseSpec {
    pub name: &'static str,
    pub ordinal: u32,
    pub deps: &'static [&'static str],
    pub fan_out: FanOut,
    pub max_attempts: u32,
    pub cost_class: CostClass,
    /// Whether a phase is required for the Job to reach `complete`.
    /// `cover` is the one phase that is not: a cap-exceeded cover failure
    /// sets `cover_status: failed` but never fails the Job.
    pub required: bool,
    /// Whether outputs may be cached across users (user-scoped otherwise).
    pub cacheable_globally: bool,
}

/// The canonical phase order for the literary pipeline:
/// `concept -> constitution -> plan -> write[ch,s] (fan-out) -> polish
/// (optional) -> cover (compound) -> finalize`.
pub fn canonical_plan() -> Vec<PhaseSpec> {
    vec![
        PhaseSpec {
            name: "concept",
            ordinal: 1,
            deps: &[],
            fan_out: FanOut::Singleton,
            max_attempts: 3,
            cost_class: CostClass::Llm,
            required: true,
            cacheable_globally: true,
        },
        PhaseSpec {
            name: "constitution",
            ordinal: 2,
            deps: &["concept"],
            fan_out: FanOut::Singleton,
            max_attempts: 3,
            cost_class: CostClass::Llm,
            required: true,
            cacheable_globally: false,
        },
        PhaseSpec {
            name: "plan",
            ordinal: 3,
            deps: &["constitution"],
            fan_out: FanOut::Singleton,
            max_attempts: 3,
            cost_class: CostClass::Llm,
            required: true,
            cacheable_globally: false,
        },
        PhaseSpec {
            name: "write",
            ordinal: 4,
            deps: &["plan"],
            fan_out: FanOut::Derived { from: "plan" },
            max_attempts: 5,
            cost_class: CostClass::Llm,
            required: true,
            cacheable_globally: false,
        },
        PhaseSpec {
            name: "polish",
            ordinal: 5,
            deps: &["write"],
            fan_out: FanOut::Derived { from: "write" },
            max_attempts: 3,
            cost_class: CostClass::Llm,
            required: false,
            cacheable_globally: false,
        },
        PhaseSpec {
            name: "cover",
            ordinal: 6,
            deps: &["plan"],
            fan_out: FanOut::Singleton,
            max_attempts: 1,
            cost_class: CostClass::Image,
            required: false,
            cacheable_globally: false,
        },
        PhaseSpec {
            name: "finalize",
            ordinal: 7,
            deps: &["write"],
            fan_out: FanOut::Singleton,
            max_attempts: 3,
            cost_class: CostClass::Cheap,
            required: true,
            cacheable_globally: false,
        },
    ]
}

pub fn phase_by_name(name: &str) -> Option<PhaseSpec> {
    canonical_plan().into_iter().find(|p| p.name == name)
}
