use std::fmt;

use serde::{Deserialize, Serialize};

use crate::economics::CostBreakdown;

/// One value per search-space dimension, in dimension order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapacityVector {
    values: Vec<f64>,
}

impl CapacityVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// Minimized sizing objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Annualized capex, O&M, operating and unmet-demand cost.
    TotalCost,
    /// Unserved energy over the horizon (kWh).
    Unmet,
    /// Grid import over the horizon (kWh).
    GridImport,
    /// Grid export over the horizon (kWh).
    GridExport,
    /// One minus the autarky ratio.
    OneMinusAutarky,
}

impl Objective {
    pub fn name(self) -> &'static str {
        match self {
            Objective::TotalCost => "total_cost",
            Objective::Unmet => "unmet",
            Objective::GridImport => "grid_import",
            Objective::GridExport => "grid_export",
            Objective::OneMinusAutarky => "one_minus_autarky",
        }
    }

    pub fn value(self, metrics: &DesignMetrics) -> f64 {
        match self {
            Objective::TotalCost => metrics.cost.total(),
            Objective::Unmet => metrics.unmet_kwh,
            Objective::GridImport => metrics.import_kwh,
            Objective::GridExport => metrics.export_kwh,
            Objective::OneMinusAutarky => 1.0 - metrics.autarky,
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome figures of a completed simulation of one design.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DesignMetrics {
    pub cost: CostBreakdown,
    pub unmet_kwh: f64,
    pub import_kwh: f64,
    pub export_kwh: f64,
    pub curtailed_kwh: f64,
    pub autarky: f64,
}

/// How a candidate's simulation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Fitness {
    Feasible(DesignMetrics),
    /// The run aborted after completing `progress` of the horizon.
    Infeasible { progress: f64, reason: String },
}

/// An evaluated capacity vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub capacities: CapacityVector,
    /// Objective values in settings order; penalized when infeasible.
    pub objectives: Vec<f64>,
    pub fitness: Fitness,
    /// Generation in which the candidate was evaluated.
    pub generation: usize,
}

impl Candidate {
    /// Candidate for a completed run.
    pub fn feasible(
        capacities: CapacityVector,
        metrics: DesignMetrics,
        objectives: &[Objective],
        generation: usize,
    ) -> Self {
        Self {
            capacities,
            objectives: objectives.iter().map(|o| o.value(&metrics)).collect(),
            fitness: Fitness::Feasible(metrics),
            generation,
        }
    }

    /// Candidate for an aborted run.
    ///
    /// Every objective is `penalty * (2 - progress)`, so a run that aborts
    /// earlier is dominated by one that got further, and all of them are
    /// dominated by any feasible design below the penalty.
    pub fn infeasible(
        capacities: CapacityVector,
        progress: f64,
        reason: String,
        objective_count: usize,
        penalty: f64,
        generation: usize,
    ) -> Self {
        let progress = progress.clamp(0.0, 1.0);
        Self {
            capacities,
            objectives: vec![penalty * (2.0 - progress); objective_count],
            fitness: Fitness::Infeasible { progress, reason },
            generation,
        }
    }

    pub fn is_feasible(&self) -> bool {
        matches!(self.fitness, Fitness::Feasible(_))
    }

    pub fn metrics(&self) -> Option<&DesignMetrics> {
        match &self.fitness {
            Fitness::Feasible(m) => Some(m),
            Fitness::Infeasible { .. } => None,
        }
    }
}
