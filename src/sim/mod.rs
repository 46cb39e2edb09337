/// Carrier buses aggregating component flows.
pub mod bus;
/// Cell topology and evaluation order.
pub mod cell;
/// Simulation clock for timestep management.
pub mod clock;
pub mod engine;
pub mod kpi;
pub mod types;

pub use bus::{CarrierBus, Sign};
pub use cell::Cell;
pub use clock::{Clock, TimeStep, Timebase};
pub use engine::SimulationEngine;
pub use kpi::{CarrierTotals, KpiReport};
pub use types::{
    AbortReport, BalancePolicy, BusRecord, EngineConfig, EngineState, RunOutcome, RunReport,
    StepRecord, WindowStrategy,
};
