//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::f64::consts::PI;
use std::sync::Arc;

use cell_sim::components::{Carrier, Demand, Grid, PvArray, Storage};
use cell_sim::config::{CellConfig, DispatchStrategy};
use cell_sim::feed::{Exogenous, ExogenousFeed, ProfileFeed};
use cell_sim::sim::{BalancePolicy, EngineConfig, StepRecord};

/// Absolute tolerance for energy bookkeeping checks.
pub const EPS: f64 = 1e-6;

/// Exogenous record at 25 °C with no wind and no heat demand.
pub fn exo(irradiance_w_m2: f64, electric_load_kw: f64) -> Exogenous {
    Exogenous {
        irradiance_w_m2,
        temperature_c: 25.0,
        electric_load_kw,
        ..Exogenous::default()
    }
}

/// 24 hourly records: one irradiance peak of about 1000 W/m² between
/// hours 6 and 18, and a flat 1 kW electric load. Twelve dark hours leave
/// about 12.7 kWh of load that only storage can serve.
pub fn single_peak_day() -> Vec<Exogenous> {
    (0..24)
        .map(|h| {
            let mid = h as f64 + 0.5;
            let irradiance = if (6.0..18.0).contains(&mid) {
                1000.0 * (PI * (mid - 6.0) / 12.0).sin()
            } else {
                0.0
            };
            exo(irradiance, 1.0)
        })
        .collect()
}

pub fn feed(records: Vec<Exogenous>) -> Arc<dyn ExogenousFeed> {
    Arc::new(ProfileFeed::new(records))
}

/// 25 m² at 20 %: 5 kW at 1000 W/m², no temperature derate.
pub fn pv(area_m2: f64) -> PvArray {
    PvArray::new("pv", area_m2, 0.2, 0.0, 45.0)
}

/// Battery with full SOC window, C-rate 1 and 95 % efficiency both ways.
pub fn battery(capacity_kwh: f64, initial_soc: f64) -> Storage {
    Storage::new(
        "battery",
        Carrier::Electricity,
        capacity_kwh,
        (0.0, 1.0),
        initial_soc,
        (1.0, 1.0),
        (0.95, 0.95),
    )
}

pub fn load() -> Demand {
    Demand::electric(1.0)
}

/// Electricity grid that may export but never import.
pub fn export_only_grid() -> Grid {
    Grid::new("grid", Carrier::Electricity, 0.0, 10.0, 0.3, 0.05)
}

pub fn engine_config(policy: BalancePolicy) -> EngineConfig {
    EngineConfig {
        balance_policy: policy,
        ..EngineConfig::default()
    }
}

/// Preset with the rule-based dispatcher.
pub fn rule_based(preset: &str) -> CellConfig {
    let mut config = CellConfig::from_preset(preset).unwrap();
    config.dispatch.strategy = DispatchStrategy::RuleBased;
    config
}

/// Checks `supply - withdrawal - curtailed - dumped + unmet == residual`
/// and `|residual| <= tolerance` on every bus of every record.
pub fn assert_buses_balanced(records: &[StepRecord], tolerance: f64) {
    for r in records {
        for b in &r.buses {
            let closing = b.supply_kw - b.withdrawal_kw - b.curtailed_kw - b.dumped_kw + b.unmet_kw;
            assert!(
                (closing - b.residual_kw).abs() < EPS,
                "step {} {}: closing {closing} vs residual {}",
                r.step,
                b.carrier,
                b.residual_kw
            );
            assert!(b.residual_kw.abs() <= tolerance + EPS);
            assert!(b.curtailed_kw >= 0.0 && b.dumped_kw >= 0.0 && b.unmet_kw >= 0.0);
        }
    }
}
