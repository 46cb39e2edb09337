//! Post-hoc KPI computation from simulation records.

use std::fmt;

use crate::components::Carrier;

use super::types::StepRecord;

/// Energy totals of one carrier over a run, in kWh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarrierTotals {
    pub carrier: Carrier,
    pub demand_kwh: f64,
    pub import_kwh: f64,
    pub export_kwh: f64,
    pub curtailed_kwh: f64,
    pub dumped_kwh: f64,
    pub unmet_kwh: f64,
}

impl CarrierTotals {
    fn new(carrier: Carrier) -> Self {
        Self {
            carrier,
            demand_kwh: 0.0,
            import_kwh: 0.0,
            export_kwh: 0.0,
            curtailed_kwh: 0.0,
            dumped_kwh: 0.0,
            unmet_kwh: 0.0,
        }
    }
}

/// Aggregate key performance indicators derived from a run.
///
/// Computed post-hoc from the step records so reported metrics always agree
/// with step data.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiReport {
    pub horizon_hours: f64,
    pub carriers: Vec<CarrierTotals>,
    /// Grid cost over the run; export revenue is subtracted.
    pub operating_cost: f64,
    /// Peak grid import over all carriers (kW).
    pub peak_import_kw: f64,
    /// Energy moved in or out of storage (kWh).
    pub storage_throughput_kwh: f64,
    /// Share of demand served without grid import, in [0, 1].
    pub autarky: f64,
}

impl KpiReport {
    /// Computes all KPIs from the step records of a run.
    pub fn from_records(records: &[StepRecord]) -> Self {
        let mut carriers: Vec<CarrierTotals> = Vec::new();
        let mut horizon_hours = 0.0;
        let mut operating_cost = 0.0;
        let mut peak_import_kw: f64 = 0.0;
        let mut storage_throughput_kwh = 0.0;

        for record in records {
            let dt = record.duration_hours;
            horizon_hours += dt;
            operating_cost += record.operating_cost;

            for bus in &record.buses {
                let idx = match carriers.iter().position(|t| t.carrier == bus.carrier) {
                    Some(i) => i,
                    None => {
                        carriers.push(CarrierTotals::new(bus.carrier));
                        carriers.len() - 1
                    }
                };
                let totals = &mut carriers[idx];
                totals.demand_kwh += bus.demand_kw * dt;
                totals.import_kwh += bus.import_kw * dt;
                totals.export_kwh += bus.export_kw * dt;
                totals.curtailed_kwh += bus.curtailed_kw * dt;
                totals.dumped_kwh += bus.dumped_kw * dt;
                totals.unmet_kwh += bus.unmet_kw * dt;
                peak_import_kw = peak_import_kw.max(bus.import_kw);
            }

            for (flows, level) in record.flows.iter().zip(&record.levels) {
                if level.is_some() {
                    storage_throughput_kwh += flows.iter().map(|(_, kw)| kw.abs()).sum::<f64>() * dt;
                }
            }
        }
        carriers.sort_by_key(|t| t.carrier);

        let demand: f64 = carriers.iter().map(|t| t.demand_kwh).sum();
        let external: f64 = carriers.iter().map(|t| t.import_kwh + t.unmet_kwh).sum();
        let autarky = if demand > 0.0 {
            (1.0 - external / demand).clamp(0.0, 1.0)
        } else {
            1.0
        };

        Self {
            horizon_hours,
            carriers,
            operating_cost,
            peak_import_kw,
            storage_throughput_kwh,
            autarky,
        }
    }

    pub fn carrier(&self, carrier: Carrier) -> Option<&CarrierTotals> {
        self.carriers.iter().find(|t| t.carrier == carrier)
    }

    pub fn demand_kwh(&self) -> f64 {
        self.carriers.iter().map(|t| t.demand_kwh).sum()
    }

    pub fn import_kwh(&self) -> f64 {
        self.carriers.iter().map(|t| t.import_kwh).sum()
    }

    pub fn export_kwh(&self) -> f64 {
        self.carriers.iter().map(|t| t.export_kwh).sum()
    }

    pub fn unmet_kwh(&self) -> f64 {
        self.carriers.iter().map(|t| t.unmet_kwh).sum()
    }

    pub fn curtailed_kwh(&self) -> f64 {
        self.carriers.iter().map(|t| t.curtailed_kwh).sum()
    }

    /// Equivalent full cycles of a storage fleet with the given capacity.
    pub fn equivalent_full_cycles(&self, capacity_kwh: f64) -> f64 {
        if capacity_kwh > 0.0 {
            self.storage_throughput_kwh / (2.0 * capacity_kwh)
        } else {
            0.0
        }
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ({:.1} h) ---", self.horizon_hours)?;
        for t in &self.carriers {
            writeln!(
                f,
                "{:<12} demand={:>9.2} kWh  import={:>9.2}  export={:>9.2}  curtailed={:>8.2}  unmet={:>8.2}",
                t.carrier.name(),
                t.demand_kwh,
                t.import_kwh,
                t.export_kwh,
                t.curtailed_kwh,
                t.unmet_kwh
            )?;
        }
        writeln!(f, "Operating cost:        {:.2}", self.operating_cost)?;
        writeln!(f, "Peak import:           {:.2} kW", self.peak_import_kw)?;
        writeln!(f, "Storage throughput:    {:.2} kWh", self.storage_throughput_kwh)?;
        write!(f, "Autarky:               {:.1}%", self.autarky * 100.0)
    }
}
