//! cell-sim entry point: CLI wiring, a single simulation run or a sizing run.

use std::path::Path;
use std::process;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use cell_sim::cancel::CancelToken;
use cell_sim::config::CellConfig;
use cell_sim::dispatch::optimizer_from_config;
use cell_sim::economics::annualized_cost;
use cell_sim::feed::synthetic_profile;
use cell_sim::io::{CsvSink, ResultSink};
use cell_sim::sim::{RunOutcome, SimulationEngine};
use cell_sim::sizing::{CellEvaluator, GaSettings, SearchSpace, SizingOptimizer};

mod cli;

use cli::CliArgs;

fn load_config(cli: &CliArgs) -> CellConfig {
    let loaded = if let Some(ref path) = cli.scenario_path {
        CellConfig::from_toml_file(Path::new(path))
    } else if let Some(ref name) = cli.preset {
        CellConfig::from_preset(name)
    } else {
        Ok(CellConfig::baseline())
    };
    let mut config = loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    if let Some(seed) = cli.seed_override {
        config.profile.seed = seed;
        config.sizing.seed = seed;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    config
}

/// Simulates the configured cell at its configured sizes.
fn simulate(config: &CellConfig, sink: &mut CsvSink) {
    let timebase = config.timebase().unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });
    let feed = Arc::new(synthetic_profile(&timebase, &config.profile));
    let cell = config.build_cell().unwrap_or_else(|errors| {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    });
    let ids = cell.ids();

    let mut engine = SimulationEngine::new(
        cell,
        timebase,
        feed,
        optimizer_from_config(&config.dispatch),
        config.engine_config(),
    );
    let outcome = engine
        .initialize(&[])
        .and_then(|()| engine.run(&CancelToken::new()))
        .unwrap_or_else(|e| {
            eprintln!("error: {e}");
            process::exit(1);
        });

    match outcome {
        RunOutcome::Completed(report) => {
            for r in &report.records {
                println!("{r}");
            }
            println!("\n{}", report.kpis);
            let cost = annualized_cost(
                &engine.cell().sizes(),
                &config.costs(),
                &report.kpis,
                &report.wear,
                &config.economics,
            );
            println!("\n{cost}");
            if let Err(e) = sink.run_completed(&ids, &report) {
                eprintln!("error: failed to write step records: {e}");
                process::exit(1);
            }
        }
        RunOutcome::Aborted(report) => {
            for r in &report.records {
                println!("{r}");
            }
            match report.last_valid_step {
                Some(step) => eprintln!("run aborted after step {step}: {}", report.error),
                None => eprintln!("run aborted before the first step: {}", report.error),
            }
            process::exit(2);
        }
        RunOutcome::Cancelled { next_step } => {
            eprintln!("run cancelled at step {next_step}");
            process::exit(2);
        }
    }
}

/// Searches component capacities within the configured dimensions.
fn size(config: &CellConfig, sink: &mut CsvSink) {
    let space = SearchSpace::from_config(&config.sizing.dimensions).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });
    let evaluator = CellEvaluator::from_config(config.clone()).unwrap_or_else(|errors| {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    });
    let optimizer = SizingOptimizer::new(evaluator, GaSettings::from(&config.sizing));
    let report = optimizer
        .optimize(
            &space,
            config.sizing.population_size,
            config.sizing.generations,
            &CancelToken::new(),
        )
        .unwrap_or_else(|e| {
            eprintln!("error: {e}");
            process::exit(1);
        });

    println!("{report}");
    if let Some(best) = report.best() {
        println!("Best design:");
        for (d, v) in space.dimensions().iter().zip(best.capacities.values()) {
            println!("  {:<20} {v:.3}", d.component);
        }
        if let Some(m) = best.metrics() {
            println!("\n{}", m.cost);
        }
    }
    if let Err(e) = sink.sizing_completed(&space, &report) {
        eprintln!("error: failed to write sizing results: {e}");
        process::exit(1);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::parse_args().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        cli::print_help();
        process::exit(1);
    });
    if cli.help {
        cli::print_help();
        return;
    }
    let config = load_config(&cli);

    let mut sink = CsvSink::new();
    if let Some(ref path) = cli.steps_out {
        sink = sink.with_steps(path);
    }
    if let Some(ref path) = cli.pareto_out {
        sink = sink.with_pareto(path);
    }

    if cli.size {
        size(&config, &mut sink);
    } else {
        simulate(&config, &mut sink);
    }
}
