//! Simulation and capacity optimization of multi-energy-carrier cells.
//!
//! A [`sim::Cell`] of technology components exchanges electricity, heat and
//! hydrogen over carrier buses. The [`sim::SimulationEngine`] steps it through
//! a timebase under an [`dispatch::OperationOptimizer`], and the
//! [`sizing::SizingOptimizer`] searches component capacities by simulating
//! every candidate design.

pub mod cancel;
pub mod components;
pub mod config;
pub mod dispatch;
pub mod economics;
pub mod error;
pub mod feed;
pub mod io;
/// Timebase, buses, cell, engine, step records and KPIs.
pub mod sim;
pub mod sizing;
