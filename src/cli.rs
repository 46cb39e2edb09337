use std::env;

use cell_sim::config::CellConfig;

/// Parsed CLI arguments.
#[derive(Debug, Default, PartialEq)]
pub struct CliArgs {
    pub scenario_path: Option<String>,
    pub preset: Option<String>,
    pub seed_override: Option<u64>,
    pub size: bool,
    pub steps_out: Option<String>,
    pub pareto_out: Option<String>,
    pub help: bool,
}

pub fn print_help() {
    eprintln!("cell-sim - multi-carrier cell simulation and capacity sizing");
    eprintln!();
    eprintln!("Usage: cell-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>      Load the cell from a TOML config file");
    eprintln!("  --preset <name>        Use a built-in preset ({})", CellConfig::PRESETS.join(", "));
    eprintln!("  --seed <u64>           Override the profile and sizing seeds");
    eprintln!("  --size                 Run the capacity sizing optimizer");
    eprintln!("  --steps-out <path>     Export step records of a simulation run to CSV");
    eprintln!("  --pareto-out <path>    Export the sizing archive to CSV (or JSON for .json)");
    eprintln!("  --help                 Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
    eprintln!("Log verbosity follows RUST_LOG (default: info).");
}

/// Parses the process arguments.
pub fn parse_args() -> Result<CliArgs, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(&args)
}

fn value_of<'a>(args: &'a [String], i: usize, flag: &str, expected: &str) -> Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires {expected}"))
}

/// Parses `args` without the program name.
pub fn parse_args_from(args: &[String]) -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => cli.help = true,
            "--scenario" => {
                i += 1;
                let path = value_of(args, i, "--scenario", "a path argument")?;
                if cli.scenario_path.replace(path.to_string()).is_some() {
                    return Err("--scenario provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = value_of(args, i, "--preset", "a name argument")?;
                if cli.preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--seed" => {
                i += 1;
                let raw = value_of(args, i, "--seed", "a u64 argument")?;
                let seed = raw
                    .parse::<u64>()
                    .map_err(|_| format!("--seed value \"{raw}\" is not a valid u64"))?;
                cli.seed_override = Some(seed);
            }
            "--size" => cli.size = true,
            "--steps-out" => {
                i += 1;
                cli.steps_out = Some(value_of(args, i, "--steps-out", "a path argument")?.to_string());
            }
            "--pareto-out" => {
                i += 1;
                cli.pareto_out = Some(value_of(args, i, "--pareto-out", "a path argument")?.to_string());
            }
            other => return Err(format!("unknown argument \"{other}\"")),
        }
        i += 1;
    }

    if cli.scenario_path.is_some() && cli.preset.is_some() {
        return Err("--scenario and --preset are mutually exclusive; choose one source".to_string());
    }
    Ok(cli)
}
