//! Elitist genetic algorithm (NSGA-II style) over capacity vectors.

use std::fmt;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::SizingConfig;
use crate::error::SizingError;

use super::candidate::{CapacityVector, Candidate, Objective};
use super::evaluator::{Evaluation, Evaluator};
use super::nsga::{rank_and_crowding, select_best};
use super::operators::{polynomial_mutation, sbx, tournament};
use super::pareto::ParetoSet;
use super::search_space::SearchSpace;

/// Tuning of the genetic algorithm. Population size and generation count
/// are passed to [`SizingOptimizer::optimize`].
#[derive(Debug, Clone, PartialEq)]
pub struct GaSettings {
    pub seed: u64,
    pub crossover_rate: f64,
    pub crossover_eta: f64,
    pub mutation_eta: f64,
    /// Per-gene mutation probability; `None` means one over the dimension count.
    pub mutation_rate: Option<f64>,
    /// Stop after this many consecutive generations without archive improvement.
    pub stall_generations: Option<usize>,
    pub infeasible_penalty: f64,
    pub objectives: Vec<Objective>,
    pub parallel: bool,
    /// Wall-clock budget per generation; an overrun cancels the run.
    pub generation_deadline: Option<Duration>,
    pub archive_limit: Option<usize>,
}

impl From<&SizingConfig> for GaSettings {
    fn from(config: &SizingConfig) -> Self {
        Self {
            seed: config.seed,
            crossover_rate: config.crossover_rate,
            crossover_eta: config.crossover_eta,
            mutation_eta: config.mutation_eta,
            mutation_rate: config.mutation_rate,
            stall_generations: config.stall_generations,
            infeasible_penalty: config.infeasible_penalty,
            objectives: config.objectives.clone(),
            parallel: config.parallel,
            generation_deadline: config.generation_deadline_ms.map(Duration::from_millis),
            archive_limit: config.archive_limit,
        }
    }
}

impl Default for GaSettings {
    fn default() -> Self {
        Self::from(&SizingConfig::default())
    }
}

/// Summary of one committed generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationStats {
    pub generation: usize,
    pub evaluated: usize,
    pub feasible: usize,
    /// Per-objective best over the archive after this generation.
    pub best: Option<Vec<f64>>,
    pub archive_size: usize,
    /// Whether the archive admitted a new member.
    pub improved: bool,
}

/// Why the optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// All requested generations were evaluated.
    Generations,
    /// The archive stopped improving.
    Stalled,
    /// Cancellation or a generation deadline interrupted the run.
    Cancelled,
}

impl Termination {
    pub fn name(self) -> &'static str {
        match self {
            Termination::Generations => "generations",
            Termination::Stalled => "stalled",
            Termination::Cancelled => "cancelled",
        }
    }
}

/// Outcome of a sizing run.
///
/// Only fully evaluated generations contribute to the archive and history.
#[derive(Debug, Clone)]
pub struct SizingReport {
    pub archive: ParetoSet,
    pub history: Vec<GenerationStats>,
    pub termination: Termination,
    /// Simulations whose results were committed.
    pub evaluations: usize,
    pub objectives: Vec<Objective>,
}

impl SizingReport {
    /// Best archived candidate on the first objective.
    pub fn best(&self) -> Option<&Candidate> {
        self.archive.best(0)
    }
}

impl fmt::Display for SizingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Sizing Report ---")?;
        writeln!(f, "Generations:           {}", self.history.len())?;
        writeln!(f, "Evaluations:           {}", self.evaluations)?;
        writeln!(f, "Termination:           {}", self.termination.name())?;
        writeln!(f, "Pareto designs:        {}", self.archive.len())?;
        if let Some(ideal) = self.archive.ideal_point() {
            for (objective, value) in self.objectives.iter().zip(ideal) {
                writeln!(f, "Best {:<17} {value:.4}", format!("{objective}:"))?;
            }
        }
        Ok(())
    }
}

/// Multi-objective capacity optimizer.
///
/// Evaluation is the only parallel stage: every random draw happens on the
/// calling thread, so a seed fixes the result regardless of thread count.
pub struct SizingOptimizer<E: Evaluator> {
    evaluator: E,
    settings: GaSettings,
}

impl<E: Evaluator> SizingOptimizer<E> {
    pub fn new(evaluator: E, settings: GaSettings) -> Self {
        Self {
            evaluator,
            settings,
        }
    }

    pub fn settings(&self) -> &GaSettings {
        &self.settings
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Runs the genetic algorithm.
    ///
    /// # Arguments
    ///
    /// * `space` - Bounds of every sizeable capacity
    /// * `population_size` - Candidates per generation (at least 2)
    /// * `generations` - Generations to evaluate, the random initial one included
    /// * `cancel` - Checked between generations and inside every simulation
    ///
    /// # Returns
    ///
    /// The archive of the committed generations. A generation interrupted by
    /// cancellation is discarded whole. Errors are malformed settings or an
    /// evaluation request the engine rejects.
    pub fn optimize(
        &self,
        space: &SearchSpace,
        population_size: usize,
        generations: usize,
        cancel: &CancelToken,
    ) -> Result<SizingReport, SizingError> {
        self.check(population_size, generations)?;

        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let mut archive = ParetoSet::new(self.settings.archive_limit);
        let mut population: Vec<Candidate> = Vec::new();
        let mut history = Vec::new();
        let mut evaluations = 0;
        let mut stalled_for = 0;
        let mut termination = Termination::Generations;

        for generation in 0..generations {
            if cancel.is_cancelled() {
                termination = Termination::Cancelled;
                break;
            }
            let vectors = if generation == 0 {
                (0..population_size).map(|_| space.sample(&mut rng)).collect()
            } else {
                self.offspring(&mut rng, space, &population, population_size)
            };

            let Some(evaluated) = self.evaluate_all(space, vectors, generation, cancel)? else {
                warn!(generation, "generation interrupted, partial results discarded");
                termination = Termination::Cancelled;
                break;
            };

            let evaluated_count = evaluated.len();
            evaluations += evaluated_count;
            let feasible = evaluated.iter().filter(|c| c.is_feasible()).count();
            let mut improved = false;
            for candidate in &evaluated {
                improved |= archive.insert(candidate.clone());
            }
            population.extend(evaluated);
            population = survivors(population, population_size);

            let stats = GenerationStats {
                generation,
                evaluated: evaluated_count,
                feasible,
                best: archive.ideal_point(),
                archive_size: archive.len(),
                improved,
            };
            info!(
                generation,
                feasible,
                archive = stats.archive_size,
                best = ?stats.best,
                "generation complete"
            );
            history.push(stats);

            stalled_for = if improved { 0 } else { stalled_for + 1 };
            if let Some(limit) = self.settings.stall_generations {
                if stalled_for >= limit {
                    info!(generation, stalled_for, "archive stalled, stopping");
                    termination = Termination::Stalled;
                    break;
                }
            }
        }

        Ok(SizingReport {
            archive,
            history,
            termination,
            evaluations,
            objectives: self.settings.objectives.clone(),
        })
    }

    fn check(&self, population_size: usize, generations: usize) -> Result<(), SizingError> {
        let s = &self.settings;
        let problem = if population_size < 2 {
            Some("population_size must be >= 2")
        } else if generations == 0 {
            Some("generations must be >= 1")
        } else if s.objectives.is_empty() {
            Some("at least one objective is required")
        } else if !(0.0..=1.0).contains(&s.crossover_rate) {
            Some("crossover_rate must be in [0, 1]")
        } else if s.mutation_rate.is_some_and(|r| !(0.0..=1.0).contains(&r)) {
            Some("mutation_rate must be in [0, 1]")
        } else if s.crossover_eta < 0.0 || s.mutation_eta < 0.0 {
            Some("distribution indices must be >= 0")
        } else if !(s.infeasible_penalty > 0.0 && s.infeasible_penalty.is_finite()) {
            Some("infeasible_penalty must be a positive number")
        } else {
            None
        };
        match problem {
            Some(message) => Err(SizingError::Settings(message.to_string())),
            None => Ok(()),
        }
    }

    /// Breeds `count` children by tournament, crossover and mutation.
    fn offspring(
        &self,
        rng: &mut StdRng,
        space: &SearchSpace,
        population: &[Candidate],
        count: usize,
    ) -> Vec<CapacityVector> {
        let points: Vec<Vec<f64>> = population.iter().map(|c| c.objectives.clone()).collect();
        let (rank, crowding) = rank_and_crowding(&points);
        let rate = self
            .settings
            .mutation_rate
            .unwrap_or(1.0 / space.len() as f64);

        let mut children = Vec::with_capacity(count);
        while children.len() < count {
            let a = population[tournament(rng, &rank, &crowding)].capacities.values();
            let b = population[tournament(rng, &rank, &crowding)].capacities.values();
            let (mut c1, mut c2) = if rng.random_bool(self.settings.crossover_rate) {
                sbx(rng, space, a, b, self.settings.crossover_eta)
            } else {
                (a.to_vec(), b.to_vec())
            };
            for child in [&mut c1, &mut c2] {
                polynomial_mutation(rng, space, child, self.settings.mutation_eta, rate);
            }
            children.push(CapacityVector::new(c1));
            if children.len() < count {
                children.push(CapacityVector::new(c2));
            }
        }
        children
    }

    /// Evaluates a generation, preserving input order.
    ///
    /// Returns `None` when any evaluation was cancelled.
    fn evaluate_all(
        &self,
        space: &SearchSpace,
        vectors: Vec<CapacityVector>,
        generation: usize,
        cancel: &CancelToken,
    ) -> Result<Option<Vec<Candidate>>, SizingError> {
        let token = match self.settings.generation_deadline {
            Some(budget) => cancel.with_deadline(budget),
            None => cancel.clone(),
        };
        let objective_count = self.settings.objectives.len();

        let evaluate = |vector: CapacityVector| -> Result<Option<Candidate>, SizingError> {
            let capacities = space.capacities(&vector)?;
            let candidate = match self.evaluator.evaluate(&capacities, &token)? {
                Evaluation::Feasible(metrics) => {
                    Candidate::feasible(vector, metrics, &self.settings.objectives, generation)
                }
                Evaluation::Infeasible { progress, reason } => {
                    debug!(generation, progress, %reason, "infeasible design");
                    Candidate::infeasible(
                        vector,
                        progress,
                        reason,
                        objective_count,
                        self.settings.infeasible_penalty,
                        generation,
                    )
                }
                Evaluation::Cancelled => return Ok(None),
            };
            Ok(Some(candidate))
        };

        let results: Vec<Result<Option<Candidate>, SizingError>> = if self.settings.parallel {
            vectors.into_par_iter().map(&evaluate).collect()
        } else {
            vectors.into_iter().map(&evaluate).collect()
        };

        let mut evaluated = Vec::with_capacity(results.len());
        for result in results {
            match result? {
                Some(candidate) => evaluated.push(candidate),
                None => return Ok(None),
            }
        }
        Ok(Some(evaluated))
    }
}

/// Elitist (μ + λ) survival by rank and crowding.
fn survivors(population: Vec<Candidate>, count: usize) -> Vec<Candidate> {
    if population.len() <= count {
        return population;
    }
    let points: Vec<Vec<f64>> = population.iter().map(|c| c.objectives.clone()).collect();
    let keep = select_best(&points, count);
    let mut slots: Vec<Option<Candidate>> = population.into_iter().map(Some).collect();
    keep.into_iter().filter_map(|i| slots[i].take()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economics::CostBreakdown;
    use crate::sizing::candidate::DesignMetrics;
    use crate::sizing::nsga::dominates;
    use crate::sizing::search_space::Dimension;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn space() -> SearchSpace {
        SearchSpace::new(vec![
            Dimension::new("pv", 0.0, 10.0),
            Dimension::new("battery", 0.0, 10.0),
        ])
        .unwrap()
    }

    fn metrics(cost: f64, import: f64, export: f64) -> DesignMetrics {
        DesignMetrics {
            cost: CostBreakdown {
                operating: cost,
                ..CostBreakdown::default()
            },
            unmet_kwh: 0.0,
            import_kwh: import,
            export_kwh: export,
            curtailed_kwh: 0.0,
            autarky: 1.0,
        }
    }

    fn bowl(caps: &[(String, f64)], _: &CancelToken) -> Result<Evaluation, SizingError> {
        let (x, y) = (caps[0].1, caps[1].1);
        Ok(Evaluation::Feasible(metrics((x - 3.0).powi(2) + (y - 1.0).powi(2), 0.0, 0.0)))
    }

    fn settings() -> GaSettings {
        GaSettings {
            parallel: false,
            ..GaSettings::default()
        }
    }

    #[test]
    fn converges_on_a_smooth_bowl() {
        let ga = SizingOptimizer::new(bowl, settings());
        let report = ga.optimize(&space(), 20, 30, &CancelToken::new()).unwrap();
        assert_eq!(report.termination, Termination::Generations);
        assert_eq!(report.history.len(), 30);
        assert_eq!(report.evaluations, 600);
        let best = report.best().unwrap();
        assert!(best.objectives[0] < 1.0, "best {:?}", best.objectives);
    }

    #[test]
    fn best_cost_never_increases() {
        let ga = SizingOptimizer::new(bowl, settings());
        let report = ga.optimize(&space(), 10, 8, &CancelToken::new()).unwrap();
        let bests: Vec<f64> = report
            .history
            .iter()
            .map(|s| s.best.as_ref().unwrap()[0])
            .collect();
        assert!(bests.windows(2).all(|w| w[1] <= w[0]), "{bests:?}");
    }

    #[test]
    fn seed_fixes_the_result_across_thread_modes() {
        let sequential = SizingOptimizer::new(bowl, settings())
            .optimize(&space(), 12, 6, &CancelToken::new())
            .unwrap();
        let parallel = SizingOptimizer::new(
            bowl,
            GaSettings {
                parallel: true,
                ..settings()
            },
        )
        .optimize(&space(), 12, 6, &CancelToken::new())
        .unwrap();
        assert_eq!(sequential.history, parallel.history);
        assert_eq!(
            sequential.archive.candidates(),
            parallel.archive.candidates()
        );
    }

    #[test]
    fn infeasible_designs_never_enter_the_archive() {
        let gated = |caps: &[(String, f64)], _: &CancelToken| -> Result<Evaluation, SizingError> {
            if caps[0].1 < 5.0 {
                Ok(Evaluation::Infeasible {
                    progress: caps[0].1 / 5.0,
                    reason: "imbalance".to_string(),
                })
            } else {
                Ok(Evaluation::Feasible(metrics(caps[0].1 + caps[1].1, 0.0, 0.0)))
            }
        };
        let ga = SizingOptimizer::new(gated, settings());
        let report = ga.optimize(&space(), 16, 10, &CancelToken::new()).unwrap();
        assert!(!report.archive.is_empty());
        for c in report.archive.candidates() {
            assert!(c.is_feasible());
            assert!(c.capacities.values()[0] >= 5.0);
        }
    }

    #[test]
    fn two_objectives_build_a_front() {
        let tradeoff = |caps: &[(String, f64)], _: &CancelToken| -> Result<Evaluation, SizingError> {
            let x = caps[0].1;
            Ok(Evaluation::Feasible(metrics(0.0, x, 10.0 - x + caps[1].1)))
        };
        let ga = SizingOptimizer::new(
            tradeoff,
            GaSettings {
                objectives: vec![Objective::GridImport, Objective::GridExport],
                ..settings()
            },
        );
        let report = ga.optimize(&space(), 20, 10, &CancelToken::new()).unwrap();
        let members = report.archive.candidates();
        assert!(members.len() > 1);
        for a in members {
            for b in members {
                assert!(!dominates(&a.objectives, &b.objectives));
            }
        }
    }

    #[test]
    fn cancellation_discards_the_running_generation() {
        let token = CancelToken::new();
        let calls = AtomicUsize::new(0);
        let trigger = token.clone();
        let cancelling = |caps: &[(String, f64)], cancel: &CancelToken| -> Result<Evaluation, SizingError> {
            if calls.fetch_add(1, Ordering::SeqCst) == 14 {
                trigger.cancel();
            }
            if cancel.is_cancelled() {
                return Ok(Evaluation::Cancelled);
            }
            bowl(caps, cancel)
        };
        let ga = SizingOptimizer::new(cancelling, settings());
        let report = ga.optimize(&space(), 10, 5, &token).unwrap();
        assert_eq!(report.termination, Termination::Cancelled);
        assert_eq!(report.history.len(), 1);
        assert_eq!(report.evaluations, 10);
        assert!(report.archive.candidates().iter().all(|c| c.generation == 0));
    }

    #[test]
    fn expired_generation_deadline_cancels() {
        let slow = |caps: &[(String, f64)], cancel: &CancelToken| -> Result<Evaluation, SizingError> {
            if cancel.is_cancelled() {
                return Ok(Evaluation::Cancelled);
            }
            bowl(caps, cancel)
        };
        let ga = SizingOptimizer::new(
            slow,
            GaSettings {
                generation_deadline: Some(Duration::ZERO),
                ..settings()
            },
        );
        let report = ga.optimize(&space(), 4, 3, &CancelToken::new()).unwrap();
        assert_eq!(report.termination, Termination::Cancelled);
        assert!(report.history.is_empty());
        assert!(report.archive.is_empty());
    }

    #[test]
    fn flat_landscape_stalls() {
        let flat = |_: &[(String, f64)], _: &CancelToken| -> Result<Evaluation, SizingError> {
            Ok(Evaluation::Feasible(metrics(1.0, 0.0, 0.0)))
        };
        let ga = SizingOptimizer::new(
            flat,
            GaSettings {
                stall_generations: Some(2),
                ..settings()
            },
        );
        let report = ga.optimize(&space(), 6, 20, &CancelToken::new()).unwrap();
        assert_eq!(report.termination, Termination::Stalled);
        assert_eq!(report.history.len(), 3);
        assert_eq!(report.archive.len(), 1);
    }

    #[test]
    fn settings_are_checked() {
        let ga = SizingOptimizer::new(bowl, settings());
        let token = CancelToken::new();
        assert!(matches!(ga.optimize(&space(), 1, 3, &token), Err(SizingError::Settings(_))));
        assert!(matches!(ga.optimize(&space(), 4, 0, &token), Err(SizingError::Settings(_))));
        let ga = SizingOptimizer::new(
            bowl,
            GaSettings {
                objectives: vec![],
                ..settings()
            },
        );
        assert!(matches!(ga.optimize(&space(), 4, 3, &token), Err(SizingError::Settings(_))));
    }
}
