use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::config::{CellConfig, ConfigError};
use crate::dispatch::optimizer_from_config;
use crate::economics::annualized_cost;
use crate::error::SizingError;
use crate::feed::{ExogenousFeed, synthetic_profile};
use crate::sim::{RunOutcome, SimulationEngine, Timebase};

use super::candidate::DesignMetrics;

/// Result of simulating one capacity vector.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Feasible(DesignMetrics),
    /// The run aborted; `progress` is the completed share of the horizon.
    Infeasible { progress: f64, reason: String },
    /// The token fired before the run finished. Nothing is known about the design.
    Cancelled,
}

/// Scores capacity vectors for the sizing optimizer.
///
/// Evaluations of one generation may run concurrently, so implementations
/// share only read-only state between calls.
pub trait Evaluator: Sync {
    /// Simulates the design given by `capacities`.
    ///
    /// # Arguments
    ///
    /// * `capacities` - `(component id, capacity)` pairs
    /// * `cancel` - Checked between simulation steps
    ///
    /// # Returns
    ///
    /// The evaluation, or a `SizingError` when the request itself is
    /// malformed (unknown component, invalid capacity, broken configuration).
    fn evaluate(
        &self,
        capacities: &[(String, f64)],
        cancel: &CancelToken,
    ) -> Result<Evaluation, SizingError>;
}

impl<F> Evaluator for F
where
    F: Fn(&[(String, f64)], &CancelToken) -> Result<Evaluation, SizingError> + Sync,
{
    fn evaluate(
        &self,
        capacities: &[(String, f64)],
        cancel: &CancelToken,
    ) -> Result<Evaluation, SizingError> {
        self(capacities, cancel)
    }
}

/// Evaluator that builds a fresh cell per candidate and runs it through the
/// simulation engine with the configured dispatch strategy.
pub struct CellEvaluator {
    config: CellConfig,
    feed: Arc<dyn ExogenousFeed>,
    timebase: Timebase,
}

impl CellEvaluator {
    /// Creates an evaluator over a shared feed.
    ///
    /// # Errors
    ///
    /// Returns every validation error of `config`.
    pub fn new(config: CellConfig, feed: Arc<dyn ExogenousFeed>) -> Result<Self, Vec<ConfigError>> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        let timebase = config.timebase().map_err(|e| vec![e])?;
        Ok(Self {
            config,
            feed,
            timebase,
        })
    }

    /// Creates an evaluator over the synthetic profile of `config`.
    pub fn from_config(config: CellConfig) -> Result<Self, Vec<ConfigError>> {
        let timebase = config.timebase().map_err(|e| vec![e])?;
        let feed = synthetic_profile(&timebase, &config.profile);
        Self::new(config, Arc::new(feed))
    }

    pub fn config(&self) -> &CellConfig {
        &self.config
    }

    pub fn timebase(&self) -> &Timebase {
        &self.timebase
    }
}

impl Evaluator for CellEvaluator {
    fn evaluate(
        &self,
        capacities: &[(String, f64)],
        cancel: &CancelToken,
    ) -> Result<Evaluation, SizingError> {
        let cell = self.config.build_cell().map_err(|errors| {
            SizingError::Settings(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        let mut engine = SimulationEngine::new(
            cell,
            self.timebase.clone(),
            Arc::clone(&self.feed),
            optimizer_from_config(&self.config.dispatch),
            self.config.engine_config(),
        );
        engine.initialize(capacities)?;

        let evaluation = match engine.run(cancel)? {
            RunOutcome::Completed(report) => {
                let cost = annualized_cost(
                    &engine.cell().sizes(),
                    &self.config.costs(),
                    &report.kpis,
                    &report.wear,
                    &self.config.economics,
                );
                Evaluation::Feasible(DesignMetrics {
                    cost,
                    unmet_kwh: report.kpis.unmet_kwh(),
                    import_kwh: report.kpis.import_kwh(),
                    export_kwh: report.kpis.export_kwh(),
                    curtailed_kwh: report.kpis.curtailed_kwh(),
                    autarky: report.kpis.autarky,
                })
            }
            RunOutcome::Aborted(report) => Evaluation::Infeasible {
                progress: report.records.len() as f64 / self.timebase.steps() as f64,
                reason: report.error.to_string(),
            },
            RunOutcome::Cancelled { .. } => Evaluation::Cancelled,
        };
        Ok(evaluation)
    }
}
