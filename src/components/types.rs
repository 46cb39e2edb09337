//! Common types and traits for cell components.

use std::fmt;
use std::ops::{AddAssign, Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::error::InfeasibleStateError;
use crate::feed::{Exogenous, ForecastStep};
use crate::sim::clock::TimeStep;

/// Energy carrier exchanged over a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Carrier {
    Electricity,
    Heat,
    Hydrogen,
    Cold,
}

impl Carrier {
    pub const ALL: [Carrier; 4] = [
        Carrier::Electricity,
        Carrier::Heat,
        Carrier::Hydrogen,
        Carrier::Cold,
    ];

    pub fn index(self) -> usize {
        match self {
            Carrier::Electricity => 0,
            Carrier::Heat => 1,
            Carrier::Hydrogen => 2,
            Carrier::Cold => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Carrier::Electricity => "electricity",
            Carrier::Heat => "heat",
            Carrier::Hydrogen => "hydrogen",
            Carrier::Cold => "cold",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Power per carrier in kW for one step.
///
/// In bus orientation a positive value is supply into the bus and a negative
/// value is withdrawal from it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarrierFlows([f64; Carrier::ALL.len()]);

impl CarrierFlows {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn single(carrier: Carrier, kw: f64) -> Self {
        let mut flows = Self::zero();
        flows[carrier] = kw;
        flows
    }

    pub fn get(&self, carrier: Carrier) -> f64 {
        self.0[carrier.index()]
    }

    pub fn add(&mut self, carrier: Carrier, kw: f64) {
        self.0[carrier.index()] += kw;
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self(self.0.map(|v| v * factor))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Carrier, f64)> + '_ {
        Carrier::ALL.into_iter().map(|c| (c, self.get(c)))
    }
}

impl Index<Carrier> for CarrierFlows {
    type Output = f64;

    fn index(&self, carrier: Carrier) -> &f64 {
        &self.0[carrier.index()]
    }
}

impl IndexMut<Carrier> for CarrierFlows {
    fn index_mut(&mut self, carrier: Carrier) -> &mut f64 {
        &mut self.0[carrier.index()]
    }
}

impl AddAssign for CarrierFlows {
    fn add_assign(&mut self, rhs: Self) {
        for c in Carrier::ALL {
            self[c] += rhs[c];
        }
    }
}

/// Broad role of a component. Determines the order in which the engine
/// advances components within a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Generation,
    Demand,
    Conversion,
    Storage,
    Grid,
}

impl ComponentKind {
    /// Evaluation stage. Exogenous producers and sinks come first, then
    /// converters, then storage, and the grid last as the bus slack.
    pub fn stage(self) -> u8 {
        match self {
            ComponentKind::Generation | ComponentKind::Demand => 0,
            ComponentKind::Conversion => 1,
            ComponentKind::Storage => 2,
            ComponentKind::Grid => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Generation => "generation",
            ComponentKind::Demand => "demand",
            ComponentKind::Conversion => "conversion",
            ComponentKind::Storage => "storage",
            ComponentKind::Grid => "grid",
        }
    }
}

/// What a component does when a setpoint violates its operating bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundPolicy {
    /// Clamp to the nearest feasible operating point.
    #[default]
    Clamp,
    /// Reject with an `InfeasibleStateError`.
    Abort,
}

/// Decision for a controllable component over one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setpoint {
    /// Storage exchange in kW; positive charges, negative discharges.
    Storage { power_kw: f64 },
    /// Converter input power in kW and its on/off state.
    Converter { input_kw: f64, on: bool },
}

/// Contextual information passed to components while advancing one step.
///
/// # Fields
/// * `step` - Current timestep
/// * `exogenous` - Environmental data and demand for the step
/// * `setpoint` - Dispatch decision for controllable components
/// * `residual` - Bus residuals accumulated by components advanced earlier
///   in the step (bus orientation). The grid uses this as its slack target.
pub struct ComponentContext<'a> {
    pub step: &'a TimeStep,
    pub exogenous: &'a Exogenous,
    pub setpoint: Option<Setpoint>,
    pub residual: CarrierFlows,
}

impl<'a> ComponentContext<'a> {
    pub fn new(step: &'a TimeStep, exogenous: &'a Exogenous) -> Self {
        Self {
            step,
            exogenous,
            setpoint: None,
            residual: CarrierFlows::zero(),
        }
    }

    pub fn with_setpoint(mut self, setpoint: Option<Setpoint>) -> Self {
        self.setpoint = setpoint;
        self
    }

    pub fn with_residual(mut self, residual: CarrierFlows) -> Self {
        self.residual = residual;
        self
    }
}

/// State transition of a component with internal state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateDelta {
    pub before: f64,
    pub after: f64,
}

/// Outcome of advancing a component by one step.
///
/// `flows` are in the component's own orientation; the bus applies the
/// registration sign. `curtailable` is the part of the supply the engine may
/// shed on surplus.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Advance {
    pub flows: CarrierFlows,
    pub curtailable: CarrierFlows,
    pub state: Option<StateDelta>,
}

impl Advance {
    pub fn flows(flows: CarrierFlows) -> Self {
        Self {
            flows,
            ..Self::default()
        }
    }
}

/// Linear storage description for one planning window.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageModel {
    pub carrier: Carrier,
    pub level: f64,
    pub min_level: f64,
    pub max_level: f64,
    pub max_charge_kw: f64,
    pub max_discharge_kw: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    /// Fraction of the usable energy (above `min_level`) lost per hour.
    pub standing_loss: f64,
}

impl StorageModel {
    /// Energy left after one idle step. Self-discharge never crosses `min_level`.
    pub fn retained(&self, level: f64, hours: f64) -> f64 {
        self.min_level + (level - self.min_level) * (1.0 - self.standing_loss * hours)
    }

    /// Stored energy after one step of the given exchange.
    ///
    /// `charge_kw` and `discharge_kw` are both non-negative.
    pub fn next_level(&self, level: f64, charge_kw: f64, discharge_kw: f64, hours: f64) -> f64 {
        self.retained(level, hours)
            + (self.charge_efficiency * charge_kw - discharge_kw / self.discharge_efficiency) * hours
    }

    /// Largest feasible charge power from `level` over `hours`.
    pub fn charge_limit(&self, level: f64, hours: f64) -> f64 {
        let retained = self.retained(level, hours);
        let headroom = (self.max_level - retained).max(0.0);
        self.max_charge_kw
            .min(headroom / (self.charge_efficiency * hours))
            .max(0.0)
    }

    /// Largest feasible discharge power from `level` over `hours`.
    pub fn discharge_limit(&self, level: f64, hours: f64) -> f64 {
        let retained = self.retained(level, hours);
        let available = (retained - self.min_level).max(0.0);
        self.max_discharge_kw
            .min(available * self.discharge_efficiency / hours)
            .max(0.0)
    }
}

/// Linear converter description for one planning window.
#[derive(Debug, Clone, PartialEq)]
pub struct ConverterModel {
    pub input: Carrier,
    /// Output carriers with their per-step efficiency (output per unit input).
    pub outputs: Vec<(Carrier, Vec<f64>)>,
    /// Maximum input power per step in kW.
    pub max_input_kw: Vec<f64>,
    /// Minimum part load as a fraction of the maximum input.
    pub min_load: f64,
    /// Maximum change of input power between consecutive steps in kW.
    pub ramp_kw: Option<f64>,
    pub previous_input_kw: f64,
}

/// Linear grid connection description for one planning window.
#[derive(Debug, Clone, PartialEq)]
pub struct GridModel {
    pub carrier: Carrier,
    pub max_import_kw: f64,
    pub max_export_kw: f64,
    pub import_price: f64,
    pub export_price: f64,
}

/// Linear representation a component hands to the operation optimizer.
///
/// `Fixed` flows are in bus orientation.
#[derive(Debug, Clone, PartialEq)]
pub enum LinearModel {
    Fixed { flows: Vec<CarrierFlows> },
    Storage(StorageModel),
    Converter(ConverterModel),
    Grid(GridModel),
}

/// Trait defining a physical component of an energy cell.
///
/// Implementations own their internal state (state of charge, previous
/// operating point) and mutate it only through `initialize`, `advance` and
/// `finalize`.
pub trait Component: Send + fmt::Debug {
    /// Unique identifier within a cell.
    fn id(&self) -> &str;

    fn kind(&self) -> ComponentKind;

    /// Carriers this component exchanges.
    fn carriers(&self) -> Vec<Carrier>;

    /// Whether the component takes a dispatch setpoint.
    fn controllable(&self) -> bool {
        false
    }

    /// Current sizeable capacity, if the component has one.
    fn size(&self) -> Option<f64> {
        None
    }

    /// Resets internal state, optionally resizing the component first.
    fn initialize(&mut self, size: Option<f64>);

    /// Advances the component by one step.
    ///
    /// # Arguments
    ///
    /// * `context` - Step, exogenous data, setpoint and bus residuals
    ///
    /// # Returns
    ///
    /// The component's flows for the step, or an `InfeasibleStateError` if a
    /// setpoint cannot be honoured under an abort bound policy.
    fn advance(&mut self, context: &ComponentContext) -> Result<Advance, InfeasibleStateError>;

    /// Hook called once when a run completes.
    fn finalize(&mut self) {}

    /// Linear model over the forecast window, built from the current state.
    fn linear_model(&self, window: &[ForecastStep]) -> LinearModel;

    /// Stored energy in kWh for storage components.
    fn level(&self) -> Option<f64> {
        None
    }

    /// Accumulated state of destruction for components that age: one per
    /// replacement so far plus the share of the current unit's life used up.
    fn wear(&self) -> Option<f64> {
        None
    }

    /// Operating cost of a step's flows (grid tariffs). Zero by default.
    fn operating_cost(&self, _advance: &Advance, _hours: f64) -> f64 {
        0.0
    }
}
