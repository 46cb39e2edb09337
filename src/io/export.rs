//! CSV and JSON export of step records and sizing results.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::sim::{RunReport, StepRecord};
use crate::sizing::{Candidate, SearchSpace, SizingReport};

/// Leading columns of the step CSV.
const STEP_COLUMNS: &[&str] = &["step", "start", "duration_h", "operating_cost"];

/// Columns repeated for every carrier bus, prefixed with the carrier name.
const BUS_COLUMNS: &[&str] = &[
    "supply_kw",
    "withdrawal_kw",
    "demand_kw",
    "import_kw",
    "export_kw",
    "curtailed_kw",
    "dumped_kw",
    "unmet_kw",
    "residual_kw",
];

/// Trailing columns of the Pareto CSV.
const METRIC_COLUMNS: &[&str] = &[
    "annualized_capex",
    "replacement",
    "fixed_om",
    "operating_cost",
    "unmet_cost",
    "residual_value",
    "total_cost",
    "unmet_kwh",
    "import_kwh",
    "export_kwh",
    "curtailed_kwh",
    "autarky",
];

/// Destination for finished runs and sizing results.
pub trait ResultSink {
    /// Receives the report of a completed simulation run.
    ///
    /// `component_ids` names the cell's components in cell order.
    fn run_completed(&mut self, component_ids: &[String], report: &RunReport) -> io::Result<()>;

    /// Receives the final candidate set of a sizing run.
    fn sizing_completed(&mut self, space: &SearchSpace, report: &SizingReport) -> io::Result<()>;
}

/// Sink writing step records and Pareto sets to CSV files.
///
/// Either output may be left unset. A Pareto path ending in `.json` is
/// written as JSON instead.
#[derive(Debug, Clone, Default)]
pub struct CsvSink {
    steps: Option<PathBuf>,
    pareto: Option<PathBuf>,
}

impl CsvSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_steps(mut self, path: impl Into<PathBuf>) -> Self {
        self.steps = Some(path.into());
        self
    }

    pub fn with_pareto(mut self, path: impl Into<PathBuf>) -> Self {
        self.pareto = Some(path.into());
        self
    }
}

impl ResultSink for CsvSink {
    fn run_completed(&mut self, component_ids: &[String], report: &RunReport) -> io::Result<()> {
        match &self.steps {
            Some(path) => export_steps_csv(&report.records, component_ids, path),
            None => Ok(()),
        }
    }

    fn sizing_completed(&mut self, space: &SearchSpace, report: &SizingReport) -> io::Result<()> {
        let Some(path) = &self.pareto else {
            return Ok(());
        };
        let file = io::BufWriter::new(File::create(path)?);
        if path.extension().is_some_and(|e| e == "json") {
            write_pareto_json(report, space, file)
        } else {
            write_pareto_csv(report, space, file)
        }
    }
}

/// Exports step records to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_steps_csv(records: &[StepRecord], component_ids: &[String], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_steps_csv(records, component_ids, io::BufWriter::new(file))
}

/// Writes step records as CSV to any writer.
///
/// Bus columns follow the buses of the first record; every component gets
/// one flow column per bus carrier and, if it stores energy, a level column.
///
/// # Arguments
///
/// * `records` - Step records of one run
/// * `component_ids` - Component ids in cell order
/// * `writer` - Destination implementing `Write`
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_steps_csv(records: &[StepRecord], component_ids: &[String], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    let carriers: Vec<_> = records
        .first()
        .map(|r| r.buses.iter().map(|b| b.carrier).collect())
        .unwrap_or_default();
    let stores: Vec<bool> = records
        .first()
        .map(|r| r.levels.iter().map(Option::is_some).collect())
        .unwrap_or_default();

    let mut header: Vec<String> = STEP_COLUMNS.iter().map(|c| c.to_string()).collect();
    for carrier in &carriers {
        header.extend(BUS_COLUMNS.iter().map(|c| format!("{carrier}_{c}")));
    }
    for (i, id) in component_ids.iter().enumerate() {
        header.extend(carriers.iter().map(|carrier| format!("{id}_{carrier}_kw")));
        if stores.get(i).copied().unwrap_or(false) {
            header.push(format!("{id}_level_kwh"));
        }
    }
    wtr.write_record(&header)?;

    for r in records {
        let mut row = vec![
            r.step.to_string(),
            r.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            format!("{:.4}", r.duration_hours),
            format!("{:.6}", r.operating_cost),
        ];
        for carrier in &carriers {
            match r.bus(*carrier) {
                Some(b) => row.extend(
                    [
                        b.supply_kw,
                        b.withdrawal_kw,
                        b.demand_kw,
                        b.import_kw,
                        b.export_kw,
                        b.curtailed_kw,
                        b.dumped_kw,
                        b.unmet_kw,
                        b.residual_kw,
                    ]
                    .iter()
                    .map(|v| format!("{v:.4}")),
                ),
                None => row.extend(BUS_COLUMNS.iter().map(|_| String::new())),
            }
        }
        for i in 0..component_ids.len() {
            let flows = r.flows.get(i).copied().unwrap_or_default();
            row.extend(carriers.iter().map(|c| format!("{:.4}", flows.get(*c))));
            if stores.get(i).copied().unwrap_or(false) {
                let level = r.levels.get(i).copied().flatten();
                row.push(level.map(|l| format!("{l:.4}")).unwrap_or_default());
            }
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes the archive of a sizing run as CSV, one row per design.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_pareto_csv(report: &SizingReport, space: &SearchSpace, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    let mut header = vec!["generation".to_string()];
    header.extend(space.dimensions().iter().map(|d| d.component.clone()));
    header.extend(report.objectives.iter().map(|o| format!("objective_{o}")));
    header.extend(METRIC_COLUMNS.iter().map(|c| c.to_string()));
    wtr.write_record(&header)?;

    for c in sorted(report.archive.candidates()) {
        let mut row = vec![c.generation.to_string()];
        row.extend(c.capacities.values().iter().map(|v| format!("{v:.4}")));
        row.extend(c.objectives.iter().map(|v| format!("{v:.6}")));
        if let Some(m) = c.metrics() {
            row.extend(
                [
                    m.cost.annualized_capex,
                    m.cost.replacement,
                    m.cost.fixed_om,
                    m.cost.operating,
                    m.cost.unmet,
                    m.cost.residual,
                    m.cost.total(),
                    m.unmet_kwh,
                    m.import_kwh,
                    m.export_kwh,
                    m.curtailed_kwh,
                    m.autarky,
                ]
                .iter()
                .map(|v| format!("{v:.4}")),
            );
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct ParetoDocument<'a> {
    termination: &'static str,
    generations: usize,
    evaluations: usize,
    designs: Vec<DesignEntry<'a>>,
}

#[derive(Serialize)]
struct DesignEntry<'a> {
    generation: usize,
    capacities: BTreeMap<&'a str, f64>,
    objectives: BTreeMap<&'static str, f64>,
    total_cost: Option<f64>,
    autarky: Option<f64>,
}

/// Writes the archive of a sizing run as pretty-printed JSON.
///
/// # Errors
///
/// Returns an `io::Error` if serialization or writing fails.
pub fn write_pareto_json(report: &SizingReport, space: &SearchSpace, mut writer: impl Write) -> io::Result<()> {
    let designs = sorted(report.archive.candidates())
        .into_iter()
        .map(|c| DesignEntry {
            generation: c.generation,
            capacities: space
                .dimensions()
                .iter()
                .map(|d| d.component.as_str())
                .zip(c.capacities.values().iter().copied())
                .collect(),
            objectives: report
                .objectives
                .iter()
                .map(|o| o.name())
                .zip(c.objectives.iter().copied())
                .collect(),
            total_cost: c.metrics().map(|m| m.cost.total()),
            autarky: c.metrics().map(|m| m.autarky),
        })
        .collect();
    let document = ParetoDocument {
        termination: report.termination.name(),
        generations: report.history.len(),
        evaluations: report.evaluations,
        designs,
    };
    serde_json::to_writer_pretty(&mut writer, &document)?;
    writeln!(writer)?;
    writer.flush()
}

/// Candidates ordered by their first objective.
fn sorted(candidates: &[Candidate]) -> Vec<&Candidate> {
    let mut out: Vec<&Candidate> = candidates.iter().collect();
    out.sort_by(|a, b| a.objectives[0].total_cmp(&b.objectives[0]));
    out
}
