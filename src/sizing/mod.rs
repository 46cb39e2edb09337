//! Capacity sizing: a genetic algorithm searching component capacities,
//! each candidate scored by a full simulation run.

pub mod candidate;
pub mod evaluator;
pub mod genetic;
pub mod nsga;
pub mod operators;
pub mod pareto;
pub mod search_space;

pub use candidate::{Candidate, CapacityVector, DesignMetrics, Fitness, Objective};
pub use evaluator::{CellEvaluator, Evaluation, Evaluator};
pub use genetic::{GaSettings, GenerationStats, SizingOptimizer, SizingReport, Termination};
pub use pareto::ParetoSet;
pub use search_space::{Dimension, SearchSpace};
