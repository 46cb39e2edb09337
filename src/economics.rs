//! Annualized cost model.
//!
//! Every payment of the observation period is turned into an annuity:
//! investment with the capital recovery factor, replacements and the
//! residual value of the last installation as discounted lump sums, and
//! recurring cost with the cost escalation levelization factor. Operating
//! cost and unserved energy are scaled from the simulated horizon to one
//! year.

use std::fmt;

use crate::config::{CostConfig, EconomicsConfig};
use crate::sim::KpiReport;

pub const HOURS_PER_YEAR: f64 = 8760.0;

/// Shortest lifetime a worn component is annualized with, in years.
const MIN_LIFETIME_YEARS: f64 = 1e-2;

/// Capital recovery factor: the annuity paying back one unit of capital.
///
/// # Panics
///
/// Panics if `years` is not positive.
pub fn capital_recovery_factor(rate: f64, years: f64) -> f64 {
    assert!(years > 0.0, "lifetime must be positive");
    if rate.abs() < 1e-12 {
        return 1.0 / years;
    }
    let growth = (1.0 + rate).powf(years);
    rate * growth / (growth - 1.0)
}

/// Cost escalation levelization factor: the constant annuity equal in
/// present value to a yearly cost of one that grows by `escalation`.
///
/// # Panics
///
/// Panics if `years` is not positive.
pub fn levelization_factor(rate: f64, escalation: f64, years: f64) -> f64 {
    let crf = capital_recovery_factor(rate, years);
    let k = (1.0 + escalation) / (1.0 + rate);
    if (k - 1.0).abs() < 1e-12 {
        return years * crf;
    }
    k * (1.0 - k.powf(years)) / (1.0 - k) * crf
}

/// Yearly cost split of one cell design.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostBreakdown {
    pub annualized_capex: f64,
    /// Reinvestment in components that wear out within the period.
    pub replacement: f64,
    pub fixed_om: f64,
    /// Grid cost net of export revenue, per year.
    pub operating: f64,
    /// Unserved energy valued at the value of lost load, per year.
    pub unmet: f64,
    /// Remaining value of the last installations at the end of the period.
    pub residual: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.annualized_capex + self.replacement + self.fixed_om + self.operating + self.unmet
            - self.residual
    }
}

impl fmt::Display for CostBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Annual Cost ---")?;
        writeln!(f, "Capex (annualized):    {:.2}", self.annualized_capex)?;
        writeln!(f, "Replacements:          {:.2}", self.replacement)?;
        writeln!(f, "Fixed O&M:             {:.2}", self.fixed_om)?;
        writeln!(f, "Operating:             {:.2}", self.operating)?;
        writeln!(f, "Unmet demand:          {:.2}", self.unmet)?;
        writeln!(f, "Residual value:       -{:.2}", self.residual)?;
        write!(f, "Total:                 {:.2}", self.total())
    }
}

/// Lifetime of a component that wore `wear` units over `horizon_years`.
fn worn_lifetime(configured: f64, wear: f64, horizon_years: f64) -> f64 {
    if wear > 0.0 && horizon_years > 0.0 {
        configured.min(horizon_years / wear).max(MIN_LIFETIME_YEARS)
    } else {
        configured
    }
}

/// Present values of the replacements and of the residual value of one
/// component with capex `capex` and lifetime `lifetime`.
fn reinvestment(capex: f64, lifetime: f64, economics: &EconomicsConfig) -> (f64, f64) {
    let period = economics.period_years;
    let price = |years: f64| {
        capex * ((1.0 + economics.price_escalation) / (1.0 + economics.interest_rate)).powf(years)
    };
    let mut replacements = 0.0;
    let mut installed_at = 0.0;
    let mut k = 1.0;
    while k * lifetime < period {
        installed_at = k * lifetime;
        replacements += price(installed_at);
        k += 1.0;
    }
    let remaining = (installed_at + lifetime - period) / lifetime;
    let residual = remaining
        * capex
        * (1.0 + economics.price_escalation).powf(installed_at)
        / (1.0 + economics.interest_rate).powf(period);
    (replacements, residual)
}

/// Annualized cost of a simulated design.
///
/// # Arguments
///
/// * `sizes` - Sizeable capacities of the cell, `(id, capacity)`
/// * `costs` - Cost table keyed by component id; ids without an entry cost nothing
/// * `kpis` - KPIs of the simulated horizon
/// * `wear` - Wear accumulated over the horizon, `(id, state of destruction)`;
///   shortens the lifetime of the listed components
/// * `economics` - Interest rate, price escalation, period and value of lost load
pub fn annualized_cost(
    sizes: &[(String, f64)],
    costs: &[(&str, CostConfig)],
    kpis: &KpiReport,
    wear: &[(String, f64)],
    economics: &EconomicsConfig,
) -> CostBreakdown {
    let crf = capital_recovery_factor(economics.interest_rate, economics.period_years);
    let celf = levelization_factor(
        economics.interest_rate,
        economics.price_escalation,
        economics.period_years,
    );
    let horizon_years = kpis.horizon_hours / HOURS_PER_YEAR;

    let mut breakdown = CostBreakdown::default();
    for (id, size) in sizes {
        let Some((_, cost)) = costs.iter().find(|(c, _)| *c == id.as_str()) else {
            continue;
        };
        let capex = cost.capex_per_unit * size;
        let worn = wear
            .iter()
            .find(|(w, _)| w == id)
            .map_or(0.0, |(_, w)| *w);
        let lifetime = worn_lifetime(cost.lifetime_years, worn, horizon_years);
        let (replacements, residual) = reinvestment(capex, lifetime, economics);

        breakdown.annualized_capex += capex * crf;
        breakdown.replacement += replacements * crf;
        breakdown.residual += residual * crf;
        breakdown.fixed_om += capex * cost.om_fraction * celf;
    }
    let year_scale = if kpis.horizon_hours > 0.0 {
        HOURS_PER_YEAR / kpis.horizon_hours
    } else {
        0.0
    };
    breakdown.operating = kpis.operating_cost * year_scale * celf;
    breakdown.unmet = kpis.unmet_kwh() * economics.value_of_lost_load * year_scale;
    breakdown
}
