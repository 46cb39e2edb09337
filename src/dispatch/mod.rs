//! Operation optimization: strategies that turn a forecast window and the
//! components' linear models into per-step setpoints.

pub mod milp;
pub mod rule_based;

use crate::components::{CarrierFlows, LinearModel, Setpoint};
use crate::config::{DispatchConfig, DispatchStrategy};
use crate::error::DispatchError;
use crate::feed::ForecastStep;

pub use milp::{MilpDispatcher, MilpSettings};
pub use rule_based::RuleBasedDispatcher;

/// Setpoints for one step, indexed like the cell's components.
///
/// Non-controllable components carry `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDispatch {
    pub step: usize,
    pub setpoints: Vec<Option<Setpoint>>,
}

/// Strategy that schedules controllable components over a window.
///
/// `models[i]` describes component `i` of the cell from its state at the
/// start of the window. Implementations return one `StepDispatch` per
/// window step.
pub trait OperationOptimizer: Send {
    fn name(&self) -> &'static str;

    /// Plans the window.
    ///
    /// # Arguments
    ///
    /// * `window` - Forecast steps, starting at the first step to plan
    /// * `models` - Linear model of every component, in cell order
    ///
    /// # Returns
    ///
    /// One dispatch per window step, or a `DispatchError` when no schedule
    /// can be produced.
    fn solve(
        &mut self,
        window: &[ForecastStep],
        models: &[LinearModel],
    ) -> Result<Vec<StepDispatch>, DispatchError>;
}

impl<O: OperationOptimizer + ?Sized> OperationOptimizer for Box<O> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn solve(
        &mut self,
        window: &[ForecastStep],
        models: &[LinearModel],
    ) -> Result<Vec<StepDispatch>, DispatchError> {
        (**self).solve(window, models)
    }
}

/// Builds the optimizer selected by the dispatch configuration.
pub fn optimizer_from_config(config: &DispatchConfig) -> Box<dyn OperationOptimizer> {
    match config.strategy {
        DispatchStrategy::Milp => Box::new(MilpDispatcher::new(MilpSettings::from(config))),
        DispatchStrategy::RuleBased => Box::new(RuleBasedDispatcher),
    }
}

/// Sum of all fixed (exogenous) flows at window step `t`, bus orientation.
pub(crate) fn fixed_flows(models: &[LinearModel], t: usize) -> CarrierFlows {
    let mut total = CarrierFlows::zero();
    for model in models {
        if let LinearModel::Fixed { flows } = model {
            if let Some(f) = flows.get(t) {
                total += *f;
            }
        }
    }
    total
}
