mod common;

use cell_sim::cancel::CancelToken;
use cell_sim::components::{Carrier, ids};
use cell_sim::dispatch::{MilpDispatcher, MilpSettings, OperationOptimizer, RuleBasedDispatcher};
use cell_sim::error::SimError;
use cell_sim::sim::{BalancePolicy, Cell, RunOutcome, SimulationEngine, Timebase};
use cell_sim::sizing::{CellEvaluator, GaSettings, Objective, SearchSpace, SizingOptimizer};

use common::*;

/// Starts at 7 kWh, barely enough for the hours before sunrise.
fn pv_battery_cell() -> Cell {
    Cell::new().with(pv(25.0)).with(load()).with(battery(10.0, 0.7))
}

fn run<O: OperationOptimizer>(cell: Cell, optimizer: O, policy: BalancePolicy) -> RunOutcome {
    let mut engine = SimulationEngine::new(
        cell,
        Timebase::hourly(24),
        feed(single_peak_day()),
        optimizer,
        engine_config(policy),
    );
    engine.initialize(&[]).unwrap();
    engine.run(&CancelToken::new()).unwrap()
}

#[test]
fn pv_and_battery_serve_a_flat_load_all_day() {
    let RunOutcome::Completed(report) = run(pv_battery_cell(), RuleBasedDispatcher, BalancePolicy::Hard)
    else {
        panic!("expected the run to complete");
    };
    assert_eq!(report.records.len(), 24);
    assert_eq!(report.kpis.unmet_kwh(), 0.0);
    assert!((report.kpis.demand_kwh() - 24.0).abs() < EPS);
    assert_buses_balanced(&report.records, EPS);

    for r in &report.records {
        let bus = r.bus(Carrier::Electricity).unwrap();
        assert!(bus.curtailed_kw >= 0.0);
        assert_eq!(bus.unmet_kw, 0.0);
    }
    // midday surplus exceeds what the battery can absorb
    let noon = report.records[11].bus(Carrier::Electricity).unwrap();
    assert!(noon.curtailed_kw > 0.0);
    assert!(report.kpis.curtailed_kwh() > 0.0);
    assert_eq!(report.kpis.autarky, 1.0);
    // the battery nearly empties before PV covers the load
    let dawn = report.records[6].levels[2].unwrap();
    assert!(dawn > 0.0 && dawn < 1.0, "level {dawn} at dawn");
}

#[test]
fn dark_hours_go_unserved_without_storage() {
    let cell = Cell::new().with(pv(25.0)).with(load());
    let RunOutcome::Completed(report) = run(cell, RuleBasedDispatcher, BalancePolicy::Soft) else {
        panic!("soft policy completes");
    };
    assert!(report.kpis.unmet_kwh() > 12.0, "unmet {}", report.kpis.unmet_kwh());
    assert!((report.records[0].bus(Carrier::Electricity).unwrap().unmet_kw - 1.0).abs() < EPS);
}

#[test]
fn milp_dispatch_serves_the_same_day() {
    let RunOutcome::Completed(report) = run(
        pv_battery_cell(),
        MilpDispatcher::new(MilpSettings::default()),
        BalancePolicy::Soft,
    ) else {
        panic!("expected the run to complete");
    };
    assert_eq!(report.records.len(), 24);
    assert!(report.kpis.unmet_kwh() < EPS, "unmet {}", report.kpis.unmet_kwh());
    assert!(report.records.iter().all(|r| r.bus(Carrier::Electricity).unwrap().curtailed_kw >= 0.0));
    assert_buses_balanced(&report.records, EPS);
}

#[test]
fn battery_level_stays_inside_its_window() {
    let outcome = run(pv_battery_cell(), RuleBasedDispatcher, BalancePolicy::Hard);
    let battery_index = 2;
    for r in outcome.records() {
        let level = r.levels[battery_index].unwrap();
        assert!((-EPS..=10.0 + EPS).contains(&level), "level {level} at step {}", r.step);
    }
}

fn unsupplied_cell() -> Cell {
    Cell::new().with(pv(10.0)).with(load()).with(export_only_grid())
}

fn run_without_pv<O: OperationOptimizer>(optimizer: O, policy: BalancePolicy) -> RunOutcome {
    let mut engine = SimulationEngine::new(
        unsupplied_cell(),
        Timebase::hourly(24),
        feed(single_peak_day()),
        optimizer,
        engine_config(policy),
    );
    engine.initialize(&[(ids::PV.to_string(), 0.0)]).unwrap();
    engine.run(&CancelToken::new()).unwrap()
}

#[test]
fn zero_pv_without_import_aborts_with_imbalance() {
    let RunOutcome::Aborted(report) = run_without_pv(RuleBasedDispatcher, BalancePolicy::Hard) else {
        panic!("expected an abort");
    };
    assert_eq!(report.last_valid_step, None);
    assert!(report.records.is_empty());
    match report.error {
        SimError::Imbalance {
            carrier,
            step,
            residual_kw,
        } => {
            assert_eq!(carrier, Carrier::Electricity);
            assert_eq!(step, 0);
            assert!((residual_kw + 1.0).abs() < EPS);
        }
        other => panic!("unexpected abort reason {other}"),
    }
}

#[test]
fn zero_pv_without_import_aborts_under_milp() {
    let outcome = run_without_pv(MilpDispatcher::new(MilpSettings::default()), BalancePolicy::Hard);
    let RunOutcome::Aborted(report) = outcome else {
        panic!("expected an abort");
    };
    assert_eq!(report.error.step(), 0);
    assert!(matches!(
        report.error,
        SimError::Imbalance { .. } | SimError::Dispatch(_)
    ));
}

#[test]
fn zero_pv_under_soft_policy_records_every_shortfall() {
    let RunOutcome::Completed(report) = run_without_pv(RuleBasedDispatcher, BalancePolicy::Soft) else {
        panic!("soft policy never aborts on imbalance");
    };
    assert!((report.kpis.unmet_kwh() - 24.0).abs() < EPS);
    for r in &report.records {
        assert!((r.bus(Carrier::Electricity).unwrap().unmet_kw - 1.0).abs() < EPS);
    }
    assert_buses_balanced(&report.records, EPS);
}

#[test]
fn sizing_best_cost_never_increases() {
    let config = rule_based("baseline");
    let space = SearchSpace::from_config(&config.sizing.dimensions).unwrap();
    assert_eq!(space.len(), 2);

    let settings = GaSettings {
        objectives: vec![Objective::TotalCost],
        ..GaSettings::from(&config.sizing)
    };
    let evaluator = CellEvaluator::from_config(config).unwrap();
    let report = SizingOptimizer::new(evaluator, settings)
        .optimize(&space, 10, 5, &CancelToken::new())
        .unwrap();

    assert_eq!(report.history.len(), 5);
    assert_eq!(report.evaluations, 50);
    let bests: Vec<f64> = report
        .history
        .iter()
        .map(|g| g.best.as_ref().expect("grid-connected designs are feasible")[0])
        .collect();
    assert!(bests.windows(2).all(|w| w[1] <= w[0]), "{bests:?}");

    let best = report.best().unwrap();
    assert_eq!(best.objectives[0], *bests.last().unwrap());
    assert!(space.check(&best.capacities).is_ok());
    assert_eq!(report.archive.len(), 1);
}
