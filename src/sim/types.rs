//! Core simulation types: engine configuration, lifecycle state, and step
//! records.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::components::{Carrier, CarrierFlows, StateDelta};
use crate::error::SimError;

use super::kpi::KpiReport;

/// How the engine treats a bus residual it cannot curtail away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancePolicy {
    /// Abort the run with an imbalance error.
    #[default]
    Hard,
    /// Record deficits as unmet demand and surpluses as dumped energy.
    Soft,
}

/// Planning horizon used to request dispatch decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStrategy {
    /// One plan for the whole horizon, computed before the first step.
    Full,
    /// A plan of `window_steps` is computed every `commit_steps` steps and
    /// only its first `commit_steps` decisions are applied.
    Rolling {
        window_steps: usize,
        commit_steps: usize,
    },
}

/// Engine settings independent of the cell and the optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Absolute bus residual in kW that still counts as balanced.
    pub balance_tolerance: f64,
    pub balance_policy: BalancePolicy,
    pub window: WindowStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            balance_tolerance: 1e-6,
            balance_policy: BalancePolicy::Hard,
            window: WindowStrategy::Full,
        }
    }
}

impl EngineConfig {
    /// Steps planned per request and steps committed from each plan.
    pub fn window_shape(&self, horizon: usize) -> (usize, usize) {
        match self.window {
            WindowStrategy::Full => (horizon, horizon),
            WindowStrategy::Rolling {
                window_steps,
                commit_steps,
            } => {
                let window = window_steps.max(1);
                (window, commit_steps.clamp(1, window))
            }
        }
    }
}

/// Engine lifecycle.
///
/// `Idle -> Initialized -> Running -> Completed | Aborted`. Terminal states
/// never transition again.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineState {
    Idle,
    Initialized,
    Running {
        next_step: usize,
    },
    Completed,
    Aborted {
        last_valid_step: Option<usize>,
        error: SimError,
    },
}

impl EngineState {
    pub fn name(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Initialized => "initialized",
            EngineState::Running { .. } => "running",
            EngineState::Completed => "completed",
            EngineState::Aborted { .. } => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Completed | EngineState::Aborted { .. })
    }
}

/// Balance of one carrier bus over one step. All values in kW.
///
/// `supply_kw - withdrawal_kw - curtailed_kw - dumped_kw + unmet_kw` equals
/// `residual_kw`, which is within the balance tolerance on every completed
/// step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusRecord {
    pub carrier: Carrier,
    pub supply_kw: f64,
    pub withdrawal_kw: f64,
    /// Inflexible demand on this bus.
    pub demand_kw: f64,
    pub import_kw: f64,
    pub export_kw: f64,
    /// Generation shed on surplus.
    pub curtailed_kw: f64,
    /// Surplus discarded beyond curtailable generation (soft policy only).
    pub dumped_kw: f64,
    /// Demand not served (soft policy only).
    pub unmet_kw: f64,
    pub residual_kw: f64,
}

impl BusRecord {
    pub fn new(carrier: Carrier) -> Self {
        Self {
            carrier,
            supply_kw: 0.0,
            withdrawal_kw: 0.0,
            demand_kw: 0.0,
            import_kw: 0.0,
            export_kw: 0.0,
            curtailed_kw: 0.0,
            dumped_kw: 0.0,
            unmet_kw: 0.0,
            residual_kw: 0.0,
        }
    }
}

/// Complete record of one simulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub step: usize,
    pub start: NaiveDateTime,
    pub duration_hours: f64,
    /// Per-component flows in bus orientation, in cell order.
    pub flows: Vec<CarrierFlows>,
    /// Stored energy after the step (kWh), in cell order.
    pub levels: Vec<Option<f64>>,
    /// Internal state transition reported by each component, in cell order.
    pub states: Vec<Option<StateDelta>>,
    pub buses: Vec<BusRecord>,
    /// Grid cost of the step; export revenue is negative.
    pub operating_cost: f64,
}

impl StepRecord {
    pub fn bus(&self, carrier: Carrier) -> Option<&BusRecord> {
        self.buses.iter().find(|b| b.carrier == carrier)
    }
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={:>4} {}", self.step, self.start.format("%Y-%m-%d %H:%M"))?;
        for bus in &self.buses {
            write!(
                f,
                " | {}: demand={:.2} import={:.2} export={:.2} curtailed={:.2} unmet={:.2}",
                bus.carrier, bus.demand_kw, bus.import_kw, bus.export_kw, bus.curtailed_kw, bus.unmet_kw
            )?;
        }
        write!(f, " | cost={:.3}", self.operating_cost)
    }
}

/// Result of a run that reached the end of the horizon.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub records: Vec<StepRecord>,
    pub kpis: KpiReport,
    /// Wear of each aging component at the end of the run, `(id, wear)`.
    pub wear: Vec<(String, f64)>,
}

/// Result of a run stopped by an abort reason.
#[derive(Debug, Clone)]
pub struct AbortReport {
    /// Last step whose record is complete, if any.
    pub last_valid_step: Option<usize>,
    pub error: SimError,
    pub records: Vec<StepRecord>,
}

/// How a call to `run` ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunReport),
    Aborted(AbortReport),
    /// Cancellation was requested; the engine stays `Running` at `next_step`.
    Cancelled { next_step: usize },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    /// Step records available from the outcome.
    pub fn records(&self) -> &[StepRecord] {
        match self {
            RunOutcome::Completed(report) => &report.records,
            RunOutcome::Aborted(report) => &report.records,
            RunOutcome::Cancelled { .. } => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InfeasibleStateError;

    #[test]
    fn window_shape_for_full_horizon() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.window_shape(24), (24, 24));
    }

    #[test]
    fn window_shape_clamps_commit_to_window() {
        let cfg = EngineConfig {
            window: WindowStrategy::Rolling {
                window_steps: 6,
                commit_steps: 10,
            },
            ..EngineConfig::default()
        };
        assert_eq!(cfg.window_shape(24), (6, 6));

        let cfg = EngineConfig {
            window: WindowStrategy::Rolling {
                window_steps: 6,
                commit_steps: 0,
            },
            ..EngineConfig::default()
        };
        assert_eq!(cfg.window_shape(24), (6, 1));
    }

    #[test]
    fn terminal_states() {
        assert!(!EngineState::Idle.is_terminal());
        assert!(!EngineState::Running { next_step: 3 }.is_terminal());
        assert!(EngineState::Completed.is_terminal());
        let aborted = EngineState::Aborted {
            last_valid_step: None,
            error: InfeasibleStateError::new("battery", 0, "x").into(),
        };
        assert!(aborted.is_terminal());
        assert_eq!(aborted.name(), "aborted");
    }

    #[test]
    fn step_record_display_does_not_panic() {
        let record = StepRecord {
            step: 0,
            start: NaiveDateTime::default(),
            duration_hours: 1.0,
            flows: vec![CarrierFlows::single(Carrier::Electricity, 1.0)],
            levels: vec![None],
            states: vec![None],
            buses: vec![BusRecord::new(Carrier::Electricity)],
            operating_cost: 0.25,
        };
        let s = format!("{record}");
        assert!(s.contains("electricity"));
        assert!(record.bus(Carrier::Heat).is_none());
    }
}
