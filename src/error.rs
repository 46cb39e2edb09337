//! Error taxonomy shared by the simulation, dispatch and sizing layers.
//!
//! Errors split into two groups. Abort reasons (`SimError` and the errors it
//! wraps) end a single run and are carried as data in the run outcome.
//! Fatal errors (`EngineError`, `InvalidCapacity`) reject a malformed
//! request before or instead of running it.

use thiserror::Error;

use crate::components::Carrier;

/// A component cannot honour the setpoint it was asked to apply.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("component `{component}` infeasible at step {step}: {detail}")]
pub struct InfeasibleStateError {
    pub component: String,
    pub step: usize,
    pub detail: String,
}

impl InfeasibleStateError {
    pub fn new(component: impl Into<String>, step: usize, detail: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            step,
            detail: detail.into(),
        }
    }
}

/// Failure of an operation optimizer to produce a schedule for a window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("no feasible schedule for window starting at step {window_start}")]
    Infeasible { window_start: usize },

    #[error("solver exceeded {timeout_ms} ms for window starting at step {window_start}")]
    Timeout { window_start: usize, timeout_ms: u64 },

    #[error("solver failed for window starting at step {window_start}: {message}")]
    Solver { window_start: usize, message: String },
}

impl DispatchError {
    /// Step index at which the failing window began.
    pub fn window_start(&self) -> usize {
        match self {
            DispatchError::Infeasible { window_start }
            | DispatchError::Timeout { window_start, .. }
            | DispatchError::Solver { window_start, .. } => *window_start,
        }
    }
}

/// Reason a simulation run was aborted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error(transparent)]
    InfeasibleState(#[from] InfeasibleStateError),

    #[error("{carrier} bus imbalance of {residual_kw:.6} kW at step {step}")]
    Imbalance {
        carrier: Carrier,
        step: usize,
        residual_kw: f64,
    },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl SimError {
    /// Step at which the abort was raised.
    pub fn step(&self) -> usize {
        match self {
            SimError::InfeasibleState(err) => err.step,
            SimError::Imbalance { step, .. } => *step,
            SimError::Dispatch(err) => err.window_start(),
        }
    }
}

/// Misuse of the engine API. These never describe a physical outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("cannot {action} while engine is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("feed provides {available} steps but the timebase needs {required}")]
    FeedTooShort { available: usize, required: usize },

    #[error("dispatch plan for step {step} has {got} setpoints, expected {expected}")]
    PlanShape {
        step: usize,
        got: usize,
        expected: usize,
    },

    #[error("unknown component `{0}`")]
    UnknownComponent(String),

    #[error("component `{0}` has no sizeable capacity")]
    NotSizeable(String),

    #[error(transparent)]
    InvalidCapacity(#[from] InvalidCapacity),
}

/// A capacity vector or search space that cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidCapacity {
    #[error("dimension `{component}` has invalid bounds [{lower}, {upper}]")]
    Bounds {
        component: String,
        lower: f64,
        upper: f64,
    },

    #[error("capacity vector has {got} values, search space has {expected} dimensions")]
    Dimensions { got: usize, expected: usize },

    #[error("capacity {value} for `{component}` lies outside [{lower}, {upper}]")]
    OutOfBounds {
        component: String,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error("capacity {value} for `{component}` must be a finite non-negative number")]
    NotFinite { component: String, value: f64 },

    #[error("search space has no dimensions")]
    Empty,
}

/// Errors that stop a sizing run before it produces an archive.
#[derive(Debug, Error)]
pub enum SizingError {
    #[error(transparent)]
    InvalidCapacity(#[from] InvalidCapacity),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid sizing settings: {0}")]
    Settings(String),
}
