//! Mixed-integer linear dispatch over a planning window.
//!
//! The formulation per window step `t` and carrier `c`:
//! - storage: charge, discharge and level variables with the loss-aware
//!   level recursion and power/energy bounds, plus a charging binary that
//!   forbids charging and discharging in the same step
//! - converters: input variable, optional on/off binary for minimum part
//!   load, ramp limits between consecutive steps
//! - electrolysis and fuel cells: a binary per step so that hydrogen is
//!   never produced and reconverted at once
//! - grids: import and export variables, optionally exclusive via a binary
//! - per-carrier spill (curtailment) and, when a penalty is configured,
//!   unmet demand slack
//! - bus balance: fixed flows + storage + converters + grids - spill + unmet = 0
//!
//! The objective is grid cost minus export revenue plus small penalties on
//! storage cycling and spill, plus the unmet demand penalty.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
    VariableDefinition, constraint, microlp, variable,
};
use tracing::{debug, warn};

use crate::components::{Carrier, ConverterModel, LinearModel, Setpoint};
use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::feed::ForecastStep;

use super::{OperationOptimizer, StepDispatch, fixed_flows};

/// Solver values below this magnitude are treated as zero.
const SNAP: f64 = 1e-7;

/// Timed-out solver threads left running before a new solve waits for the oldest.
pub const MAX_DETACHED_SOLVERS: usize = 2;

/// Tunables of the MILP formulation.
#[derive(Debug, Clone, PartialEq)]
pub struct MilpSettings {
    /// Wall-clock limit per solve attempt.
    pub timeout: Duration,
    /// Balance band (kW) of the relaxed first pass of the retry. The plan
    /// itself always balances exactly.
    pub relaxed_tolerance: f64,
    /// Cost per kWh of unmet demand. `None` makes balance constraints hard.
    pub unmet_penalty: Option<f64>,
    /// Cost per kWh of spilled supply.
    pub curtailment_penalty: f64,
    /// Cost per kWh moved in or out of storage.
    pub storage_cycle_cost: f64,
    /// Forbid simultaneous import and export with a binary per step.
    pub grid_exclusivity: bool,
}

impl Default for MilpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            relaxed_tolerance: 1e-4,
            unmet_penalty: None,
            curtailment_penalty: 1e-4,
            storage_cycle_cost: 1e-3,
            grid_exclusivity: false,
        }
    }
}

impl From<&DispatchConfig> for MilpSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            relaxed_tolerance: config.relaxed_tolerance,
            unmet_penalty: config.unmet_demand_penalty,
            curtailment_penalty: config.curtailment_penalty,
            storage_cycle_cost: config.storage_cycle_cost,
            grid_exclusivity: config.grid_exclusivity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Strict,
    /// Integrality dropped to find the switch pattern, which is then
    /// rounded and fixed for an exact re-solve.
    Relaxed,
}

/// Keeps the count of live solver threads; decremented when the thread ends.
struct LiveSolver(Arc<AtomicUsize>);

impl LiveSolver {
    fn register(count: &Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(count))
    }
}

impl Drop for LiveSolver {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Optimal dispatch via good_lp with the pure-Rust microlp backend.
///
/// Each solve runs on a worker thread bounded by the configured timeout.
/// A timed-out or failed solve is retried once in relaxed form; a second
/// failure is returned to the caller.
///
/// microlp cannot be interrupted, so a timed-out thread keeps running until
/// its solve ends. At most [`MAX_DETACHED_SOLVERS`] such threads are kept;
/// beyond that the next solve first joins the oldest one.
#[derive(Debug, Default)]
pub struct MilpDispatcher {
    settings: MilpSettings,
    live: Arc<AtomicUsize>,
    detached: Vec<JoinHandle<()>>,
}

impl MilpDispatcher {
    pub fn new(settings: MilpSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &MilpSettings {
        &self.settings
    }

    /// Solver threads still running, timed-out ones included.
    pub fn running_solvers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Joins finished detached threads and waits for the oldest ones while
    /// there are too many.
    fn reap(&mut self) {
        let mut running = Vec::with_capacity(self.detached.len());
        for handle in self.detached.drain(..) {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                running.push(handle);
            }
        }
        while running.len() >= MAX_DETACHED_SOLVERS {
            let oldest = running.remove(0);
            debug!("waiting for a timed-out solver thread");
            let _ = oldest.join();
        }
        self.detached = running;
    }

    fn attempt(
        &mut self,
        window: &[ForecastStep],
        models: &[LinearModel],
        attempt: Attempt,
    ) -> Result<Vec<StepDispatch>, DispatchError> {
        self.reap();
        let problem = Problem {
            window: window.to_vec(),
            models: models.to_vec(),
            settings: self.settings.clone(),
            attempt,
        };
        let window_start = problem.window_start();
        let timeout = self.settings.timeout;

        let (tx, rx) = mpsc::channel();
        let live = LiveSolver::register(&self.live);
        let handle = thread::Builder::new()
            .name("milp-solver".into())
            .spawn(move || {
                let _live = live;
                // The receiver is gone after a timeout; the result is dropped.
                let _ = tx.send(problem.solve());
            })
            .map_err(|e| DispatchError::Solver {
                window_start,
                message: format!("cannot spawn solver thread: {e}"),
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => {
                let _ = handle.join();
                result
            }
            Err(RecvTimeoutError::Timeout) => {
                self.detached.push(handle);
                Err(DispatchError::Timeout {
                    window_start,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                Err(DispatchError::Solver {
                    window_start,
                    message: "solver thread terminated without a result".into(),
                })
            }
        }
    }
}

impl OperationOptimizer for MilpDispatcher {
    fn name(&self) -> &'static str {
        "milp"
    }

    fn solve(
        &mut self,
        window: &[ForecastStep],
        models: &[LinearModel],
    ) -> Result<Vec<StepDispatch>, DispatchError> {
        match self.attempt(window, models, Attempt::Strict) {
            Err(err @ (DispatchError::Timeout { .. } | DispatchError::Solver { .. })) => {
                warn!(error = %err, "retrying dispatch with relaxed tolerances");
                self.attempt(window, models, Attempt::Relaxed)
                    .inspect_err(|retry| warn!(error = %retry, "relaxed dispatch failed"))
            }
            other => other,
        }
    }
}

/// Decision variables owned by one component.
enum Handle {
    Passive,
    Storage {
        charge: Vec<Variable>,
        discharge: Vec<Variable>,
    },
    Converter {
        input: Vec<Variable>,
        on: Option<Vec<Variable>>,
    },
}

/// How on/off decisions enter one formulation.
#[derive(Debug, Clone, PartialEq)]
enum Switches {
    Binary,
    /// Continuous in [0, 1].
    Continuous,
    /// Fixed to the given values, in creation order.
    Fixed(Vec<f64>),
}

/// Rounds a relaxed switch from the flows it gates.
enum Rounding {
    /// Eagerly on for any relaxed input; otherwise on only once the input
    /// meets the minimum part load.
    MinLoad { input: Variable, min_input: f64 },
    /// On when the weighted first flow exceeds the second; a tie gives `tie`.
    Larger {
        first: (Variable, f64),
        second: (Variable, f64),
        tie: f64,
    },
}

impl Rounding {
    fn round(&self, solution: &impl Solution, eager: bool) -> f64 {
        match self {
            Rounding::MinLoad { input, min_input } => {
                let v = solution.value(*input);
                if v > SNAP && (eager || v >= min_input - SNAP) { 1.0 } else { 0.0 }
            }
            Rounding::Larger { first, second, tie } => {
                let a = solution.value(first.0) * first.1;
                let b = solution.value(second.0) * second.1;
                if (a - b).abs() <= SNAP {
                    *tie
                } else if a > b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Two roundings of one relaxed solution.
struct RoundedSwitches {
    /// Converters on wherever the relaxed plan used them.
    eager: Vec<f64>,
    /// Converters on only where the relaxed input met the minimum load.
    at_min_load: Vec<f64>,
}

/// Variables of one formulation and the switches created so far.
struct Variables<'a> {
    vars: ProblemVariables,
    switches: &'a Switches,
    rounding: Vec<Rounding>,
}

impl Variables<'_> {
    fn add(&mut self, definition: VariableDefinition) -> Variable {
        self.vars.add(definition)
    }

    fn switch(&mut self, rounding: Rounding) -> Variable {
        let k = self.rounding.len();
        self.rounding.push(rounding);
        match self.switches {
            Switches::Binary => self.vars.add(variable().binary()),
            Switches::Continuous => self.vars.add(variable().min(0.0).max(1.0)),
            Switches::Fixed(values) => {
                let v = values.get(k).copied().unwrap_or(0.0);
                self.vars.add(variable().min(v).max(v))
            }
        }
    }
}

fn max_input(k: &ConverterModel, t: usize) -> f64 {
    k.max_input_kw.get(t).copied().unwrap_or(0.0).max(0.0)
}

fn is_electrolysis(k: &ConverterModel) -> bool {
    k.input == Carrier::Electricity && k.outputs.iter().any(|(c, _)| *c == Carrier::Hydrogen)
}

fn is_reconversion(k: &ConverterModel) -> bool {
    k.input == Carrier::Hydrogen && k.outputs.iter().any(|(c, _)| *c == Carrier::Electricity)
}

/// Converters matching `wanted`, with their input variables.
fn hydrogen_converters<'m>(
    models: &'m [LinearModel],
    handles: &'m [Handle],
    wanted: fn(&ConverterModel) -> bool,
) -> Vec<(&'m ConverterModel, &'m [Variable])> {
    models
        .iter()
        .zip(handles)
        .filter_map(|(m, h)| match (m, h) {
            (LinearModel::Converter(k), Handle::Converter { input, .. }) if wanted(k) => {
                Some((k, input.as_slice()))
            }
            _ => None,
        })
        .collect()
}

/// Owned copy of a window, sent to the solver thread.
struct Problem {
    window: Vec<ForecastStep>,
    models: Vec<LinearModel>,
    settings: MilpSettings,
    attempt: Attempt,
}

impl Problem {
    fn window_start(&self) -> usize {
        self.window.first().map(|f| f.step.index).unwrap_or(0)
    }

    fn carriers_in_use(&self) -> Vec<Carrier> {
        Carrier::ALL
            .into_iter()
            .filter(|&c| {
                self.models.iter().any(|m| match m {
                    LinearModel::Fixed { flows } => flows.iter().any(|f| f.get(c) != 0.0),
                    LinearModel::Storage(s) => s.carrier == c,
                    LinearModel::Converter(k) => {
                        k.input == c || k.outputs.iter().any(|(o, _)| *o == c)
                    }
                    LinearModel::Grid(g) => g.carrier == c,
                })
            })
            .collect()
    }

    fn solve(self) -> Result<Vec<StepDispatch>, DispatchError> {
        if self.window.is_empty() {
            return Ok(Vec::new());
        }
        match self.attempt {
            Attempt::Strict => self.run(&Switches::Binary, 0.0).map(|(plan, _)| plan),
            Attempt::Relaxed => {
                let (_, rounded) = self.run(&Switches::Continuous, self.settings.relaxed_tolerance)?;
                debug!(
                    window_start = self.window_start(),
                    switches = rounded.eager.len(),
                    "re-solving with rounded switches"
                );
                match self.run(&Switches::Fixed(rounded.eager), 0.0) {
                    Ok((plan, _)) => Ok(plan),
                    Err(e) => {
                        debug!(error = %e, "eager rounding failed, switching on at minimum load only");
                        self.run(&Switches::Fixed(rounded.at_min_load), 0.0)
                            .map(|(plan, _)| plan)
                    }
                }
            }
        }
    }

    /// Builds and solves one formulation.
    ///
    /// # Returns
    ///
    /// The plan and every switch rounded to 0 or 1, in creation order.
    fn run(&self, switches: &Switches, band: f64) -> Result<(Vec<StepDispatch>, RoundedSwitches), DispatchError> {
        let n = self.window.len();
        let window_start = self.window_start();

        let mut vars = Variables {
            vars: ProblemVariables::new(),
            switches,
            rounding: Vec::new(),
        };
        let mut constraints: Vec<Constraint> = Vec::new();
        let mut objective = Expression::default();
        // Variable part and constant part of every bus balance.
        let mut balance: Vec<Vec<Expression>> = vec![vec![Expression::default(); Carrier::ALL.len()]; n];
        let mut constant: Vec<[f64; Carrier::ALL.len()]> = vec![[0.0; Carrier::ALL.len()]; n];
        let hours: Vec<f64> = self.window.iter().map(|f| f.step.duration_hours).collect();

        for (t, row) in constant.iter_mut().enumerate() {
            let fixed = fixed_flows(&self.models, t);
            for c in Carrier::ALL {
                row[c.index()] = fixed.get(c);
            }
        }

        let mut handles = Vec::with_capacity(self.models.len());
        for model in &self.models {
            let handle = match model {
                LinearModel::Fixed { .. } => Handle::Passive,
                LinearModel::Storage(s) => {
                    let charge: Vec<Variable> = (0..n)
                        .map(|_| vars.add(variable().min(0.0).max(s.max_charge_kw)))
                        .collect();
                    let discharge: Vec<Variable> = (0..n)
                        .map(|_| vars.add(variable().min(0.0).max(s.max_discharge_kw)))
                        .collect();
                    let level: Vec<Variable> = (0..n)
                        .map(|_| vars.add(variable().min(s.min_level).max(s.max_level)))
                        .collect();

                    for t in 0..n {
                        let dt = hours[t];
                        let keep = 1.0 - s.standing_loss * dt;
                        // level[t] - keep*level[t-1] - eta_c*dt*ch + dt/eta_d*dch == min*(1-keep) [+ keep*initial]
                        let mut lhs: Expression = level[t] * 1.0;
                        let mut rhs = s.min_level * (1.0 - keep);
                        if t == 0 {
                            rhs += keep * s.level;
                        } else {
                            lhs -= level[t - 1] * keep;
                        }
                        lhs -= charge[t] * (s.charge_efficiency * dt);
                        lhs += discharge[t] * (dt / s.discharge_efficiency);
                        constraints.push(constraint!(lhs == rhs));

                        if s.max_charge_kw > 0.0 && s.max_discharge_kw > 0.0 {
                            let charging = vars.switch(Rounding::Larger {
                                first: (charge[t], 1.0),
                                second: (discharge[t], 1.0),
                                tie: 0.0,
                            });
                            constraints.push(constraint!(charge[t] - charging * s.max_charge_kw <= 0.0));
                            constraints.push(constraint!(
                                discharge[t] + charging * s.max_discharge_kw <= s.max_discharge_kw
                            ));
                        }

                        let bus = &mut balance[t][s.carrier.index()];
                        *bus += discharge[t] * 1.0;
                        *bus -= charge[t] * 1.0;
                        objective += (charge[t] + discharge[t]) * (self.settings.storage_cycle_cost * dt);
                    }
                    Handle::Storage { charge, discharge }
                }
                LinearModel::Converter(k) => {
                    let input: Vec<Variable> = (0..n)
                        .map(|t| vars.add(variable().min(0.0).max(max_input(k, t))))
                        .collect();
                    let on = (k.min_load > 0.0).then(|| {
                        (0..n)
                            .map(|t| {
                                vars.switch(Rounding::MinLoad {
                                    input: input[t],
                                    min_input: k.min_load * max_input(k, t),
                                })
                            })
                            .collect::<Vec<Variable>>()
                    });

                    for t in 0..n {
                        let max = max_input(k, t);
                        if let Some(on) = &on {
                            constraints.push(constraint!(input[t] - on[t] * max <= 0.0));
                            constraints.push(constraint!(input[t] - on[t] * (k.min_load * max) >= 0.0));
                        }
                        if let Some(ramp) = k.ramp_kw {
                            if t == 0 {
                                constraints.push(constraint!(input[0] <= k.previous_input_kw + ramp));
                                constraints.push(constraint!(input[0] >= k.previous_input_kw - ramp));
                            } else {
                                constraints.push(constraint!(input[t] - input[t - 1] <= ramp));
                                constraints.push(constraint!(input[t - 1] - input[t] <= ramp));
                            }
                        }
                        balance[t][k.input.index()] -= input[t] * 1.0;
                        for (carrier, eta) in &k.outputs {
                            let eta_t = eta.get(t).copied().unwrap_or(0.0);
                            balance[t][carrier.index()] += input[t] * eta_t;
                        }
                    }
                    Handle::Converter { input, on }
                }
                LinearModel::Grid(g) => {
                    for t in 0..n {
                        let dt = hours[t];
                        let import = vars.add(variable().min(0.0).max(g.max_import_kw));
                        let export = vars.add(variable().min(0.0).max(g.max_export_kw));
                        if self.settings.grid_exclusivity && g.max_import_kw > 0.0 && g.max_export_kw > 0.0 {
                            let importing = vars.switch(Rounding::Larger {
                                first: (import, 1.0),
                                second: (export, 1.0),
                                tie: 1.0,
                            });
                            constraints.push(constraint!(import - importing * g.max_import_kw <= 0.0));
                            constraints.push(constraint!(export + importing * g.max_export_kw <= g.max_export_kw));
                        }
                        let bus = &mut balance[t][g.carrier.index()];
                        *bus += import * 1.0;
                        *bus -= export * 1.0;
                        objective += import * (g.import_price * dt);
                        objective -= export * (g.export_price * dt);
                    }
                    Handle::Passive
                }
            };
            handles.push(handle);
        }

        self.exclude_electrolysis_and_reconversion(&handles, &mut vars, &mut constraints);

        for c in self.carriers_in_use() {
            for t in 0..n {
                let dt = hours[t];
                let spill = vars.add(variable().min(0.0));
                objective += spill * (self.settings.curtailment_penalty * dt);
                let mut bus = balance[t][c.index()].clone() - spill;
                if let Some(penalty) = self.settings.unmet_penalty {
                    let unmet = vars.add(variable().min(0.0));
                    objective += unmet * (penalty * dt);
                    bus += unmet;
                }
                let target = -constant[t][c.index()];
                if band > 0.0 {
                    constraints.push(constraint!(bus.clone() <= target + band));
                    constraints.push(constraint!(bus >= target - band));
                } else {
                    constraints.push(constraint!(bus == target));
                }
            }
        }

        debug!(
            window_start,
            steps = n,
            constraints = constraints.len(),
            switches = vars.rounding.len(),
            relaxed = *switches != Switches::Binary,
            "solving dispatch window"
        );

        let Variables { vars, rounding, .. } = vars;
        let mut model = vars.minimise(objective).using(microlp);
        for c in constraints {
            model = model.with(c);
        }
        let solution = model.solve().map_err(|e| match e {
            ResolutionError::Infeasible => DispatchError::Infeasible { window_start },
            other => DispatchError::Solver {
                window_start,
                message: other.to_string(),
            },
        })?;

        let snap = |v: f64| if v.abs() < SNAP { 0.0 } else { v };
        let plan = (0..n)
            .map(|t| {
                let setpoints = handles
                    .iter()
                    .map(|handle| match handle {
                        Handle::Passive => None,
                        Handle::Storage { charge, discharge } => Some(Setpoint::Storage {
                            power_kw: snap(solution.value(charge[t]) - solution.value(discharge[t])),
                        }),
                        Handle::Converter { input, on } => {
                            let input_kw = snap(solution.value(input[t])).max(0.0);
                            let on = match on {
                                Some(on) => solution.value(on[t]) > 0.5,
                                None => input_kw > 0.0,
                            };
                            Some(Setpoint::Converter { input_kw, on })
                        }
                    })
                    .collect();
                StepDispatch {
                    step: self.window[t].step.index,
                    setpoints,
                }
            })
            .collect();
        let rounded = RoundedSwitches {
            eager: rounding.iter().map(|r| r.round(&solution, true)).collect(),
            at_min_load: rounding.iter().map(|r| r.round(&solution, false)).collect(),
        };
        Ok((plan, rounded))
    }

    /// Adds one binary per step that lets either electrolysis or
    /// reconversion of hydrogen run, never both.
    fn exclude_electrolysis_and_reconversion(
        &self,
        handles: &[Handle],
        vars: &mut Variables<'_>,
        constraints: &mut Vec<Constraint>,
    ) {
        let producers = hydrogen_converters(&self.models, handles, is_electrolysis);
        let consumers = hydrogen_converters(&self.models, handles, is_reconversion);
        let (Some(&(first_p, p_input)), Some(&(first_c, c_input))) = (producers.first(), consumers.first())
        else {
            return;
        };

        let weight = |max: f64| if max > 0.0 { 1.0 / max } else { 0.0 };
        for t in 0..self.window.len() {
            let producing = vars.switch(Rounding::Larger {
                first: (p_input[t], weight(max_input(first_p, t))),
                second: (c_input[t], weight(max_input(first_c, t))),
                tie: 0.0,
            });
            for (k, input) in &producers {
                let max = max_input(k, t);
                constraints.push(constraint!(input[t] - producing * max <= 0.0));
            }
            for (k, input) in &consumers {
                let max = max_input(k, t);
                constraints.push(constraint!(input[t] + producing * max <= max));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::cancel::CancelToken;
    use crate::components::{BoundPolicy, CarrierFlows, ConverterModel, GridModel, StorageModel};
    use crate::config::CellConfig;
    use crate::feed::{Exogenous, synthetic_profile};
    use crate::sim::clock::Timebase;
    use crate::sim::{RunOutcome, SimulationEngine};

    fn window(n: usize) -> Vec<ForecastStep> {
        let timebase = Timebase::hourly(n);
        (0..n)
            .map(|i| ForecastStep {
                step: timebase.step(i),
                exogenous: Exogenous::default(),
            })
            .collect()
    }

    fn fixed(carrier: Carrier, kw: &[f64]) -> LinearModel {
        LinearModel::Fixed {
            flows: kw.iter().map(|&v| CarrierFlows::single(carrier, v)).collect(),
        }
    }

    fn battery(level: f64) -> LinearModel {
        LinearModel::Storage(StorageModel {
            carrier: Carrier::Electricity,
            level,
            min_level: 0.0,
            max_level: 10.0,
            max_charge_kw: 5.0,
            max_discharge_kw: 5.0,
            charge_efficiency: 0.9,
            discharge_efficiency: 0.9,
            standing_loss: 0.0,
        })
    }

    fn grid(import_price: f64, export_price: f64) -> LinearModel {
        LinearModel::Grid(GridModel {
            carrier: Carrier::Electricity,
            max_import_kw: 20.0,
            max_export_kw: 20.0,
            import_price,
            export_price,
        })
    }

    fn storage_power(d: &StepDispatch, i: usize) -> f64 {
        match d.setpoints[i] {
            Some(Setpoint::Storage { power_kw }) => power_kw,
            ref other => panic!("unexpected setpoint {other:?}"),
        }
    }

    fn conversion(input: Carrier, output: Carrier, eta: f64, max: f64, min_load: f64, n: usize) -> LinearModel {
        LinearModel::Converter(ConverterModel {
            input,
            outputs: vec![(output, vec![eta; n])],
            max_input_kw: vec![max; n],
            min_load,
            ramp_kw: None,
            previous_input_kw: 0.0,
        })
    }

    fn converter(d: &StepDispatch, i: usize) -> (f64, bool) {
        match d.setpoints[i] {
            Some(Setpoint::Converter { input_kw, on }) => (input_kw, on),
            ref other => panic!("unexpected setpoint {other:?}"),
        }
    }

    /// Replays a plan through the storage recursion and checks the bounds.
    fn assert_storage_feasible(plan: &[StepDispatch], model: &StorageModel, index: usize) {
        let mut level = model.level;
        for d in plan {
            let p = storage_power(d, index);
            assert!(p <= model.max_charge_kw + 1e-6 && -p <= model.max_discharge_kw + 1e-6);
            level = model.next_level(level, p.max(0.0), (-p).max(0.0), 1.0);
            assert!(level >= model.min_level - 1e-6 && level <= model.max_level + 1e-6);
        }
    }

    #[test]
    fn battery_shifts_surplus_to_deficit_instead_of_importing() {
        let models = vec![
            fixed(Carrier::Electricity, &[4.0, -3.0]),
            battery(0.0),
            grid(0.5, 0.0),
        ];
        let mut milp = MilpDispatcher::default();
        let plan = milp.solve(&window(2), &models).unwrap();
        assert_eq!(plan.len(), 2);
        // charge 4 kW -> 3.6 kWh stored -> 3.24 kW deliverable, enough for 3 kW
        assert!((storage_power(&plan[0], 1) - 3.0 / 0.81).abs() < 1e-4);
        assert!((storage_power(&plan[1], 1) + 3.0).abs() < 1e-4);
        assert!(plan[0].setpoints[0].is_none() && plan[0].setpoints[2].is_none());
        if let LinearModel::Storage(model) = &models[1] {
            assert_storage_feasible(&plan, model, 1);
        }
    }

    #[test]
    fn flat_tariff_leaves_battery_idle() {
        let models = vec![
            fixed(Carrier::Electricity, &[-1.0, -1.0]),
            battery(5.0),
            grid(0.3, 0.3),
        ];
        let plan = MilpDispatcher::default().solve(&window(2), &models).unwrap();
        // Charging from the grid only loses energy on a flat tariff.
        for d in &plan {
            let p = storage_power(d, 1);
            assert!(p <= 1e-6, "battery should not charge on a flat tariff, got {p}");
        }
    }

    #[test]
    fn hard_balance_without_supply_is_infeasible() {
        let models = vec![fixed(Carrier::Electricity, &[-1.0])];
        let err = MilpDispatcher::default().solve(&window(1), &models).unwrap_err();
        assert_eq!(err, DispatchError::Infeasible { window_start: 0 });
    }

    #[test]
    fn unmet_penalty_turns_shortfall_into_slack() {
        let models = vec![fixed(Carrier::Electricity, &[-1.0]), battery(0.0)];
        let settings = MilpSettings {
            unmet_penalty: Some(100.0),
            ..MilpSettings::default()
        };
        let plan = MilpDispatcher::new(settings).solve(&window(1), &models).unwrap();
        assert!(storage_power(&plan[0], 1).abs() < 1e-6);
    }

    #[test]
    fn min_load_switches_converter_off_when_idle() {
        let electrolyzer = LinearModel::Converter(ConverterModel {
            input: Carrier::Electricity,
            outputs: vec![(Carrier::Hydrogen, vec![0.6; 2])],
            max_input_kw: vec![4.0; 2],
            min_load: 0.5,
            ramp_kw: None,
            previous_input_kw: 0.0,
        });
        // 1 kW surplus is below the 2 kW minimum load; the hydrogen demand in
        // the second step forces 3 kW of input.
        let models = vec![
            fixed(Carrier::Electricity, &[1.0, 3.0]),
            fixed(Carrier::Hydrogen, &[0.0, -1.8]),
            electrolyzer,
        ];
        let plan = MilpDispatcher::default().solve(&window(2), &models).unwrap();
        let (input0, on0) = converter(&plan[0], 2);
        let (input1, on1) = converter(&plan[1], 2);
        assert!(!on0 && input0 == 0.0);
        assert!(on1 && (input1 - 3.0).abs() < 1e-4);
    }

    #[test]
    fn zero_timeout_reports_timeout() {
        let n = 96;
        let models = vec![
            fixed(Carrier::Electricity, &vec![-1.0; n]),
            battery(5.0),
            grid(0.3, 0.1),
        ];
        let settings = MilpSettings {
            timeout: Duration::ZERO,
            grid_exclusivity: true,
            ..MilpSettings::default()
        };
        let err = MilpDispatcher::new(settings).solve(&window(n), &models).unwrap_err();
        assert!(matches!(err, DispatchError::Timeout { window_start: 0, .. }));
    }

    #[test]
    fn storage_never_charges_and_discharges_at_once() {
        // a full battery could only swallow the surplus by cycling through its losses
        let models = vec![fixed(Carrier::Electricity, &[2.0]), battery(10.0)];
        let settings = MilpSettings {
            curtailment_penalty: 10.0,
            ..MilpSettings::default()
        };
        let plan = MilpDispatcher::new(settings).solve(&window(1), &models).unwrap();
        let p = storage_power(&plan[0], 1);
        assert!(p.abs() < 1e-6, "battery cycled: {p}");
    }

    #[test]
    fn electrolyzer_and_fuel_cell_never_run_together() {
        let models = vec![
            fixed(Carrier::Electricity, &[2.0, 2.0, 2.0]),
            conversion(Carrier::Electricity, Carrier::Hydrogen, 0.6, 4.0, 0.0, 3),
            conversion(Carrier::Hydrogen, Carrier::Electricity, 0.5, 4.0, 0.0, 3),
        ];
        let settings = MilpSettings {
            curtailment_penalty: 10.0,
            ..MilpSettings::default()
        };
        let plan = MilpDispatcher::new(settings).solve(&window(3), &models).unwrap();
        for d in &plan {
            let (electrolysis, _) = converter(d, 1);
            let (reconversion, _) = converter(d, 2);
            assert!(
                electrolysis < 1e-6 || reconversion < 1e-6,
                "step {}: electrolyzer {electrolysis} kW and fuel cell {reconversion} kW",
                d.step
            );
        }
        // the surplus still goes into hydrogen
        assert!((converter(&plan[0], 1).0 - 2.0).abs() < 1e-4);
    }

    #[test]
    fn relaxed_retry_keeps_min_load_and_exact_balance() {
        let models = vec![
            fixed(Carrier::Electricity, &[1.0, 3.0]),
            fixed(Carrier::Hydrogen, &[0.0, -1.8]),
            conversion(Carrier::Electricity, Carrier::Hydrogen, 0.6, 4.0, 0.5, 2),
        ];
        let mut milp = MilpDispatcher::default();
        let plan = milp.attempt(&window(2), &models, Attempt::Relaxed).unwrap();
        let (input0, on0) = converter(&plan[0], 2);
        let (input1, on1) = converter(&plan[1], 2);
        // 1 kW would be half the minimum load
        assert!(!on0 && input0 == 0.0);
        assert!(on1 && (input1 - 3.0).abs() < 1e-6);
    }

    /// Plans every window with the relaxed retry only.
    struct RelaxedOnly(MilpDispatcher);

    impl OperationOptimizer for RelaxedOnly {
        fn name(&self) -> &'static str {
            "milp_relaxed"
        }

        fn solve(
            &mut self,
            window: &[ForecastStep],
            models: &[LinearModel],
        ) -> Result<Vec<StepDispatch>, DispatchError> {
            self.0.attempt(window, models, Attempt::Relaxed)
        }
    }

    #[test]
    fn relaxed_plans_run_on_the_hydrogen_cell() {
        let mut config = CellConfig::hydrogen();
        // converters reject any input they would have to round
        for policy in [
            config.electrolyzer.as_mut().map(|c| &mut c.bound_policy),
            config.fuel_cell.as_mut().map(|c| &mut c.bound_policy),
            config.heat_pump.as_mut().map(|c| &mut c.bound_policy),
        ]
        .into_iter()
        .flatten()
        {
            *policy = BoundPolicy::Abort;
        }
        let timebase = config.timebase().unwrap();
        let feed = Arc::new(synthetic_profile(&timebase, &config.profile));
        let mut engine = SimulationEngine::new(
            config.build_cell().unwrap(),
            timebase,
            feed,
            RelaxedOnly(MilpDispatcher::new(MilpSettings::from(&config.dispatch))),
            config.engine_config(),
        );
        engine.initialize(&[]).unwrap();
        let outcome = engine.run(&CancelToken::new()).unwrap();
        let RunOutcome::Completed(report) = outcome else {
            panic!("relaxed plan was not executable");
        };
        assert_eq!(report.records.len(), config.simulation.steps);
        for r in &report.records {
            for b in &r.buses {
                assert!(b.residual_kw.abs() <= config.simulation.balance_tolerance);
                assert_eq!(b.unmet_kw, 0.0);
            }
        }
    }

    #[test]
    fn timed_out_solver_threads_are_bounded_and_reaped() {
        let n = 8;
        let models = vec![
            fixed(Carrier::Electricity, &vec![-1.0; n]),
            battery(5.0),
            grid(0.3, 0.1),
        ];
        let settings = MilpSettings {
            timeout: Duration::ZERO,
            ..MilpSettings::default()
        };
        let mut milp = MilpDispatcher::new(settings);
        for _ in 0..6 {
            let _ = milp.solve(&window(n), &models);
            assert!(milp.running_solvers() <= MAX_DETACHED_SOLVERS);
        }
        let deadline = Instant::now() + Duration::from_secs(60);
        while milp.running_solvers() > 0 {
            assert!(Instant::now() < deadline, "solver threads never finished");
            thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn empty_window_yields_empty_plan() {
        let plan = MilpDispatcher::default().solve(&[], &[battery(1.0)]).unwrap();
        assert!(plan.is_empty());
    }
}
