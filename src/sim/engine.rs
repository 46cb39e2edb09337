//! Simulation engine that drives a cell through a timebase.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::cancel::CancelToken;
use crate::components::{CarrierFlows, ComponentContext, ComponentKind, LinearModel};
use crate::dispatch::{OperationOptimizer, StepDispatch};
use crate::error::{EngineError, InvalidCapacity, SimError};
use crate::feed::{ExogenousFeed, forecast_window};

use super::bus::CarrierBus;
use super::cell::Cell;
use super::clock::{Clock, Timebase};
use super::kpi::KpiReport;
use super::types::{
    AbortReport, BalancePolicy, BusRecord, EngineConfig, EngineState, RunOutcome, RunReport,
    StepRecord,
};

/// Simulation engine owning a cell, its feed and an operation optimizer.
///
/// Generic over `O: OperationOptimizer` for static dispatch; pass a
/// `Box<dyn OperationOptimizer>` to choose the strategy at runtime.
///
/// Lifecycle: `Idle -> Initialized -> Running -> Completed | Aborted`.
/// Abort reasons are reported as data in [`RunOutcome`]; API misuse is an
/// [`EngineError`].
pub struct SimulationEngine<O: OperationOptimizer> {
    cell: Cell,
    timebase: Timebase,
    clock: Clock,
    feed: Arc<dyn ExogenousFeed>,
    optimizer: O,
    config: EngineConfig,
    state: EngineState,
    order: Vec<usize>,
    buses: Vec<CarrierBus>,
    plan: VecDeque<StepDispatch>,
    records: Vec<StepRecord>,
}

impl<O: OperationOptimizer> SimulationEngine<O> {
    /// Creates an idle engine.
    ///
    /// # Arguments
    ///
    /// * `cell` - Components to simulate
    /// * `timebase` - Horizon and step length
    /// * `feed` - Exogenous data, at least one record per step
    /// * `optimizer` - Operation strategy queried for setpoints
    /// * `config` - Balance tolerance, balance policy and planning window
    pub fn new(
        cell: Cell,
        timebase: Timebase,
        feed: Arc<dyn ExogenousFeed>,
        optimizer: O,
        config: EngineConfig,
    ) -> Self {
        let clock = timebase.clock();
        Self {
            cell,
            timebase,
            clock,
            feed,
            optimizer,
            config,
            state: EngineState::Idle,
            order: Vec::new(),
            buses: Vec::new(),
            plan: VecDeque::new(),
            records: Vec::new(),
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn timebase(&self) -> &Timebase {
        &self.timebase
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Records of the steps completed so far.
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Applies capacities and resets every component.
    ///
    /// # Arguments
    ///
    /// * `capacities` - `(component id, capacity)` overrides; components not
    ///   listed keep their configured size
    ///
    /// # Returns
    ///
    /// An `EngineError` if the engine is not idle, the feed is shorter than
    /// the timebase, or a capacity names an unknown, unsizeable or invalid
    /// target. The engine stays idle on error.
    pub fn initialize(&mut self, capacities: &[(String, f64)]) -> Result<(), EngineError> {
        if self.state != EngineState::Idle {
            return Err(self.invalid("initialize"));
        }
        let required = self.timebase.steps();
        if self.feed.len() < required {
            return Err(EngineError::FeedTooShort {
                available: self.feed.len(),
                required,
            });
        }

        let mut sizes: Vec<Option<f64>> = vec![None; self.cell.len()];
        for (id, value) in capacities {
            let index = self
                .cell
                .index_of(id)
                .ok_or_else(|| EngineError::UnknownComponent(id.clone()))?;
            if self.cell.components()[index].size().is_none() {
                return Err(EngineError::NotSizeable(id.clone()));
            }
            if !value.is_finite() || *value < 0.0 {
                return Err(InvalidCapacity::NotFinite {
                    component: id.clone(),
                    value: *value,
                }
                .into());
            }
            sizes[index] = Some(*value);
        }

        for (component, size) in self.cell.components_mut().iter_mut().zip(sizes) {
            component.initialize(size);
        }
        self.order = self.cell.evaluation_order();
        self.buses = self.cell.buses();
        self.plan.clear();
        self.clock = self.timebase.clock();
        self.records = Vec::with_capacity(required);
        self.state = EngineState::Initialized;
        info!(
            components = self.cell.len(),
            steps = required,
            optimizer = self.optimizer.name(),
            "engine initialized"
        );
        Ok(())
    }

    /// Executes one step.
    ///
    /// Moves the engine to `Running`, `Completed` or `Aborted`. Returns an
    /// error only for misuse: stepping before initialization or after a
    /// terminal state, or a malformed dispatch plan.
    pub fn step(&mut self) -> Result<(), EngineError> {
        if !matches!(
            self.state,
            EngineState::Initialized | EngineState::Running { .. }
        ) {
            return Err(self.invalid("step"));
        }
        let horizon = self.timebase.steps();
        let Some(step) = self.clock.tick() else {
            return Err(self.invalid("step"));
        };
        let t = step.index;
        let exogenous = self.feed.get(t).ok_or(EngineError::FeedTooShort {
            available: self.feed.len(),
            required: horizon,
        })?;

        let dispatch = match self.next_dispatch(t)? {
            Ok(dispatch) => dispatch,
            Err(err) => {
                self.abort(t, err);
                return Ok(());
            }
        };

        let n = self.cell.len();
        for bus in &mut self.buses {
            bus.reset();
        }
        let mut flows = vec![CarrierFlows::zero(); n];
        let mut levels = vec![None; n];
        let mut states = vec![None; n];
        let mut curtailable = CarrierFlows::zero();
        let mut operating_cost = 0.0;
        let mut failure: Option<SimError> = None;

        for &i in &self.order {
            let mut residual = CarrierFlows::zero();
            for bus in &self.buses {
                residual[bus.carrier()] = bus.balance();
            }
            let context = ComponentContext::new(&step, &exogenous)
                .with_setpoint(dispatch.setpoints[i])
                .with_residual(residual);
            let component = &mut self.cell.components_mut()[i];
            let advance = match component.advance(&context) {
                Ok(advance) => advance,
                Err(err) => {
                    failure = Some(err.into());
                    break;
                }
            };
            for bus in &mut self.buses {
                bus.record(i, &advance.flows);
                if let Some(kw) = bus.oriented(i, &advance.flows) {
                    flows[i][bus.carrier()] = kw;
                }
            }
            curtailable += advance.curtailable;
            operating_cost += component.operating_cost(&advance, step.duration_hours);
            states[i] = advance.state;
            levels[i] = advance.state.map(|d| d.after).or_else(|| component.level());
        }
        if let Some(error) = failure {
            self.abort(t, error);
            return Ok(());
        }

        let mut buses = Vec::with_capacity(self.buses.len());
        for bus in &self.buses {
            let carrier = bus.carrier();
            let mut record = self.bus_record(bus, &flows);
            let mut residual = bus.balance();
            if residual > 0.0 {
                let shed = residual.min(curtailable[carrier].max(0.0));
                record.curtailed_kw = shed;
                residual -= shed;
            }
            if residual.abs() > self.config.balance_tolerance {
                match self.config.balance_policy {
                    BalancePolicy::Hard => {
                        failure = Some(SimError::Imbalance {
                            carrier,
                            step: t,
                            residual_kw: residual,
                        });
                        break;
                    }
                    BalancePolicy::Soft if residual > 0.0 => record.dumped_kw = residual,
                    BalancePolicy::Soft => record.unmet_kw = -residual,
                }
                residual = 0.0;
            }
            record.residual_kw = residual;
            buses.push(record);
        }
        if let Some(error) = failure {
            self.abort(t, error);
            return Ok(());
        }

        let record = StepRecord {
            step: t,
            start: step.start,
            duration_hours: step.duration_hours,
            flows,
            levels,
            states,
            buses,
            operating_cost,
        };
        trace!(%record, "step complete");
        self.records.push(record);

        if self.clock.position() >= horizon {
            for component in self.cell.components_mut() {
                component.finalize();
            }
            self.state = EngineState::Completed;
            info!(steps = horizon, "run completed");
        } else {
            self.state = EngineState::Running {
                next_step: self.clock.position(),
            };
        }
        Ok(())
    }

    /// Steps until the run completes, aborts or is cancelled.
    ///
    /// Cancellation is checked between steps; a cancelled engine stays
    /// `Running` and a later call resumes where it stopped. On a terminal
    /// outcome the step records move into the returned report.
    pub fn run(&mut self, cancel: &CancelToken) -> Result<RunOutcome, EngineError> {
        if !matches!(
            self.state,
            EngineState::Initialized | EngineState::Running { .. }
        ) {
            return Err(self.invalid("run"));
        }
        loop {
            match &self.state {
                EngineState::Completed => {
                    let records = std::mem::take(&mut self.records);
                    let kpis = KpiReport::from_records(&records);
                    return Ok(RunOutcome::Completed(RunReport {
                        records,
                        kpis,
                        wear: self.cell.wear(),
                    }));
                }
                EngineState::Aborted {
                    last_valid_step,
                    error,
                } => {
                    return Ok(RunOutcome::Aborted(AbortReport {
                        last_valid_step: *last_valid_step,
                        error: error.clone(),
                        records: std::mem::take(&mut self.records),
                    }));
                }
                EngineState::Running { next_step } if cancel.is_cancelled() => {
                    info!(next_step, "run cancelled");
                    return Ok(RunOutcome::Cancelled {
                        next_step: *next_step,
                    });
                }
                EngineState::Initialized if cancel.is_cancelled() => {
                    return Ok(RunOutcome::Cancelled { next_step: 0 });
                }
                _ => self.step()?,
            }
        }
    }

    /// Pops the decision for step `t`, planning a new window when the
    /// committed plan is exhausted.
    ///
    /// The outer `Result` carries fatal plan-shape errors; the inner one an
    /// optimizer failure that aborts the run.
    fn next_dispatch(&mut self, t: usize) -> Result<Result<StepDispatch, SimError>, EngineError> {
        if self.plan.is_empty() {
            let remaining = self.timebase.steps() - t;
            let (window_len, commit) = self.config.window_shape(remaining);
            let window = forecast_window(self.feed.as_ref(), &self.timebase, t, window_len);
            let models: Vec<LinearModel> = self
                .cell
                .components()
                .iter()
                .map(|c| c.linear_model(&window))
                .collect();
            let decisions = match self.optimizer.solve(&window, &models) {
                Ok(decisions) => decisions,
                Err(err) => return Ok(Err(err.into())),
            };
            let commit = commit.min(window.len());
            debug!(
                window_start = t,
                window = window.len(),
                commit,
                optimizer = self.optimizer.name(),
                "planned window"
            );
            if decisions.len() < commit {
                return Err(EngineError::PlanShape {
                    step: t + decisions.len(),
                    got: 0,
                    expected: self.cell.len(),
                });
            }
            self.plan.extend(decisions.into_iter().take(commit));
        }

        let dispatch = self.plan.pop_front().ok_or(EngineError::PlanShape {
            step: t,
            got: 0,
            expected: self.cell.len(),
        })?;
        if dispatch.setpoints.len() != self.cell.len() {
            return Err(EngineError::PlanShape {
                step: t,
                got: dispatch.setpoints.len(),
                expected: self.cell.len(),
            });
        }
        Ok(Ok(dispatch))
    }

    fn bus_record(&self, bus: &CarrierBus, flows: &[CarrierFlows]) -> BusRecord {
        let carrier = bus.carrier();
        let mut record = BusRecord::new(carrier);
        record.supply_kw = bus.supply_kw();
        record.withdrawal_kw = bus.withdrawal_kw();
        for &(i, _) in bus.members() {
            let kw = flows[i][carrier];
            match self.cell.components()[i].kind() {
                ComponentKind::Demand => record.demand_kw += -kw,
                ComponentKind::Grid if kw > 0.0 => record.import_kw += kw,
                ComponentKind::Grid => record.export_kw += -kw,
                _ => {}
            }
        }
        record
    }

    fn abort(&mut self, t: usize, error: SimError) {
        let last_valid_step = t.checked_sub(1);
        warn!(step = t, %error, "run aborted");
        self.plan.clear();
        self.state = EngineState::Aborted {
            last_valid_step,
            error,
        };
    }

    fn invalid(&self, action: &'static str) -> EngineError {
        EngineError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }
}
