//! TOML-based cell configuration and preset definitions.
//!
//! The configuration is the single source of component parameters: a
//! [`CellConfig`] builds the [`Cell`], the [`Timebase`], the synthetic feed
//! and the engine settings, and it is passed explicitly to every consumer.

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::components::{
    Aging, BoundPolicy, Carrier, Converter, Demand, Grid, Inverter, PvArray, SolarThermal,
    Storage, WindTurbine, ids,
};
use crate::sim::{BalancePolicy, Cell, EngineConfig, Timebase, WindowStrategy};
use crate::sizing::Objective;

/// Timestamp format accepted by `simulation.start`.
pub const START_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Top-level cell configuration parsed from TOML.
///
/// Technology sections are optional: a cell contains exactly the components
/// whose section is present. Load from TOML with
/// [`CellConfig::from_toml_file`] or start from a preset with
/// [`CellConfig::from_preset`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CellConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Synthetic weather and demand profile.
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub economics: EconomicsConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub loads: LoadConfig,
    pub pv: Option<PvConfig>,
    pub wind: Option<WindConfig>,
    pub solar_thermal: Option<SolarThermalConfig>,
    pub battery: Option<StorageConfig>,
    pub heat_storage: Option<StorageConfig>,
    pub hydrogen_storage: Option<StorageConfig>,
    pub cold_storage: Option<StorageConfig>,
    pub heat_pump: Option<HeatPumpConfig>,
    pub chiller: Option<ChillerConfig>,
    pub electrolyzer: Option<ElectrolyzerConfig>,
    pub fuel_cell: Option<FuelCellConfig>,
    pub grid_electricity: Option<GridConfig>,
    pub grid_heat: Option<GridConfig>,
}

/// Simulation timing and balance settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Start of the first step, `YYYY-MM-DDTHH:MM:SS`.
    pub start: String,
    /// Step length in hours (must be > 0).
    pub step_hours: f64,
    /// Number of steps (must be > 0).
    pub steps: usize,
    /// Absolute bus residual in kW still counted as balanced.
    pub balance_tolerance: f64,
    pub balance_policy: BalancePolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: "2024-06-01T00:00:00".to_string(),
            step_hours: 1.0,
            steps: 24,
            balance_tolerance: 1e-6,
            balance_policy: BalancePolicy::Hard,
        }
    }
}

/// Parameters of the seeded synthetic profile.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    pub seed: u64,
    pub sunrise_hour: f64,
    pub sunset_hour: f64,
    /// Clear-sky irradiance at solar noon (W/m²).
    pub peak_irradiance_w_m2: f64,
    /// Relative noise on irradiance and load.
    pub noise_std: f64,
    pub mean_temperature_c: f64,
    pub temperature_amplitude_c: f64,
    pub electric_base_kw: f64,
    pub electric_amplitude_kw: f64,
    pub electric_phase_rad: f64,
    pub heat_base_kw: f64,
    /// Heat demand per kelvin below the heating limit.
    pub heat_per_kelvin_kw: f64,
    pub heating_limit_c: f64,
    pub cold_base_kw: f64,
    /// Cooling demand per kelvin above the cooling limit.
    pub cold_per_kelvin_kw: f64,
    pub cooling_limit_c: f64,
    pub mean_wind_m_s: f64,
    pub wind_std_m_s: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            sunrise_hour: 6.0,
            sunset_hour: 20.0,
            peak_irradiance_w_m2: 850.0,
            noise_std: 0.05,
            mean_temperature_c: 18.0,
            temperature_amplitude_c: 6.0,
            electric_base_kw: 0.8,
            electric_amplitude_kw: 0.4,
            electric_phase_rad: 1.2,
            heat_base_kw: 0.3,
            heat_per_kelvin_kw: 0.25,
            heating_limit_c: 15.0,
            cold_base_kw: 0.0,
            cold_per_kelvin_kw: 0.3,
            cooling_limit_c: 22.0,
            mean_wind_m_s: 5.0,
            wind_std_m_s: 1.0,
        }
    }
}

/// Operation strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStrategy {
    #[default]
    Milp,
    RuleBased,
}

/// Planning window kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizonKind {
    #[default]
    Full,
    Rolling,
}

/// Operation optimizer settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    pub strategy: DispatchStrategy,
    pub horizon: HorizonKind,
    /// Steps per rolling window.
    pub window_steps: usize,
    /// Steps applied from each rolling window.
    pub commit_steps: usize,
    /// Wall-clock budget of one solve attempt.
    pub timeout_ms: u64,
    /// Balance band and integrality relaxation of the retry attempt.
    pub relaxed_tolerance: f64,
    /// Cost per kWh of unserved demand; unset keeps balance hard.
    pub unmet_demand_penalty: Option<f64>,
    pub curtailment_penalty: f64,
    /// Cost per kWh moved through storage.
    pub storage_cycle_cost: f64,
    /// Forbid simultaneous import and export with a binary per step.
    pub grid_exclusivity: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            strategy: DispatchStrategy::Milp,
            horizon: HorizonKind::Full,
            window_steps: 24,
            commit_steps: 12,
            timeout_ms: 10_000,
            relaxed_tolerance: 1e-4,
            unmet_demand_penalty: None,
            curtailment_penalty: 1e-4,
            storage_cycle_cost: 1e-3,
            grid_exclusivity: false,
        }
    }
}

impl DispatchConfig {
    pub fn window(&self) -> WindowStrategy {
        match self.horizon {
            HorizonKind::Full => WindowStrategy::Full,
            HorizonKind::Rolling => WindowStrategy::Rolling {
                window_steps: self.window_steps,
                commit_steps: self.commit_steps,
            },
        }
    }
}

/// Annuity parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EconomicsConfig {
    /// Discount rate per year.
    pub interest_rate: f64,
    /// Yearly price increase of investments and recurring cost.
    pub price_escalation: f64,
    /// Observation period in years all payments are annualized over.
    pub period_years: f64,
    /// Cost per kWh of unserved demand.
    pub value_of_lost_load: f64,
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        Self {
            interest_rate: 0.04,
            price_escalation: 0.0,
            period_years: 20.0,
            value_of_lost_load: 10.0,
        }
    }
}

/// Investment cost of one technology, per unit of its sizeable capacity.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostConfig {
    pub capex_per_unit: f64,
    /// Yearly O&M as a fraction of capex.
    pub om_fraction: f64,
    pub lifetime_years: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            capex_per_unit: 0.0,
            om_fraction: 0.0,
            lifetime_years: 20.0,
        }
    }
}

/// Demand components.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    pub electric_scale: f64,
    /// Include a heat demand.
    pub heat: bool,
    pub heat_scale: f64,
    /// Include a cooling demand.
    pub cold: bool,
    pub cold_scale: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            electric_scale: 1.0,
            heat: false,
            heat_scale: 1.0,
            cold: false,
            cold_scale: 1.0,
        }
    }
}

/// PV array; sized by area.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PvConfig {
    pub area_m2: f64,
    pub efficiency: f64,
    /// Relative power change per kelvin of cell temperature above 25 °C.
    pub temperature_coefficient: f64,
    pub noct_c: f64,
    /// DC/AC stage; unset feeds DC output to the bus unchanged.
    pub inverter: Option<InverterConfig>,
    pub cost: CostConfig,
}

impl Default for PvConfig {
    fn default() -> Self {
        Self {
            area_m2: 25.0,
            efficiency: 0.2,
            temperature_coefficient: -0.004,
            noct_c: 45.0,
            inverter: None,
            cost: CostConfig {
                capex_per_unit: 220.0,
                om_fraction: 0.01,
                lifetime_years: 25.0,
            },
        }
    }
}

/// PV inverter part-load losses, normalised to rated power.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct InverterConfig {
    /// Rated AC power per kW of DC peak.
    pub sizing_ratio: f64,
    pub nominal_efficiency: f64,
    pub voltage_loss: f64,
    pub resistance_loss: f64,
    pub self_consumption: f64,
}

impl Default for InverterConfig {
    fn default() -> Self {
        let i = Inverter::default();
        Self {
            sizing_ratio: i.sizing_ratio,
            nominal_efficiency: i.nominal_efficiency,
            voltage_loss: i.voltage_loss,
            resistance_loss: i.resistance_loss,
            self_consumption: i.self_consumption,
        }
    }
}

impl From<InverterConfig> for Inverter {
    fn from(c: InverterConfig) -> Self {
        Self {
            sizing_ratio: c.sizing_ratio,
            nominal_efficiency: c.nominal_efficiency,
            voltage_loss: c.voltage_loss,
            resistance_loss: c.resistance_loss,
            self_consumption: c.self_consumption,
        }
    }
}

/// Flat-plate solar thermal collectors; sized by aperture area.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarThermalConfig {
    pub area_m2: f64,
    pub optical_efficiency: f64,
    /// Linear heat loss coefficient in W/(m² K).
    pub k0: f64,
    /// Quadratic heat loss coefficient in W/(m² K²).
    pub k1: f64,
    pub mean_fluid_c: f64,
    pub cost: CostConfig,
}

impl Default for SolarThermalConfig {
    fn default() -> Self {
        Self {
            area_m2: 8.0,
            optical_efficiency: 0.75,
            k0: 3.5,
            k1: 0.015,
            mean_fluid_c: 50.0,
            cost: CostConfig {
                capex_per_unit: 400.0,
                om_fraction: 0.015,
                lifetime_years: 20.0,
            },
        }
    }
}

/// Wind turbine; sized by rated power.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindConfig {
    pub rated_kw: f64,
    pub hub_height_m: f64,
    pub measurement_height_m: f64,
    pub roughness_m: f64,
    pub cut_in_m_s: f64,
    pub rated_speed_m_s: f64,
    pub cut_out_m_s: f64,
    pub cost: CostConfig,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            rated_kw: 5.0,
            hub_height_m: 30.0,
            measurement_height_m: 10.0,
            roughness_m: 0.1,
            cut_in_m_s: 3.0,
            rated_speed_m_s: 12.0,
            cut_out_m_s: 25.0,
            cost: CostConfig {
                capex_per_unit: 1500.0,
                om_fraction: 0.03,
                lifetime_years: 20.0,
            },
        }
    }
}

/// Storage of any carrier; sized by energy capacity.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub capacity_kwh: f64,
    pub soc_min: f64,
    pub soc_max: f64,
    pub initial_soc: f64,
    pub c_rate_charge: f64,
    pub c_rate_discharge: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    /// Fraction of usable energy lost per hour.
    pub standing_loss_per_hour: f64,
    pub bound_policy: BoundPolicy,
    /// Capacity fade; unset keeps the capacity constant.
    pub aging: Option<AgingConfig>,
    pub cost: CostConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 10.0,
            soc_min: 0.1,
            soc_max: 0.9,
            initial_soc: 0.5,
            c_rate_charge: 0.5,
            c_rate_discharge: 0.5,
            charge_efficiency: 0.95,
            discharge_efficiency: 0.95,
            standing_loss_per_hour: 0.0,
            bound_policy: BoundPolicy::Clamp,
            aging: None,
            cost: CostConfig {
                capex_per_unit: 400.0,
                om_fraction: 0.01,
                lifetime_years: 12.0,
            },
        }
    }
}

/// Battery calendar and cycle aging.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgingConfig {
    /// Remaining capacity fraction at which the battery is replaced.
    pub end_of_life: f64,
    pub float_life_years: f64,
    /// Full cycles to end of life at 100 % depth of discharge.
    pub cycle_life: f64,
    /// Wöhler curve exponent over depth of discharge.
    pub dod_exponent: f64,
}

impl Default for AgingConfig {
    fn default() -> Self {
        let a = Aging::default();
        Self {
            end_of_life: a.end_of_life,
            float_life_years: a.float_life_years,
            cycle_life: a.cycle_life,
            dod_exponent: a.dod_exponent,
        }
    }
}

impl From<AgingConfig> for Aging {
    fn from(c: AgingConfig) -> Self {
        Self {
            end_of_life: c.end_of_life,
            float_life_years: c.float_life_years,
            cycle_life: c.cycle_life,
            dod_exponent: c.dod_exponent,
        }
    }
}

/// Electric heat pump; sized by thermal output.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeatPumpConfig {
    pub nominal_kw_th: f64,
    pub supply_c: f64,
    /// Share of the Carnot COP reached.
    pub carnot_fraction: f64,
    pub max_cop: f64,
    pub min_load: f64,
    /// Ramp limit as a fraction of nominal power per step.
    pub ramp: Option<f64>,
    pub bound_policy: BoundPolicy,
    pub cost: CostConfig,
}

impl Default for HeatPumpConfig {
    fn default() -> Self {
        Self {
            nominal_kw_th: 6.0,
            supply_c: 45.0,
            carnot_fraction: 0.45,
            max_cop: 6.0,
            min_load: 0.0,
            ramp: None,
            bound_policy: BoundPolicy::Clamp,
            cost: CostConfig {
                capex_per_unit: 900.0,
                om_fraction: 0.02,
                lifetime_years: 18.0,
            },
        }
    }
}

/// Compression chiller; sized by cooling output.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChillerConfig {
    pub nominal_kw_cold: f64,
    /// Chilled water supply temperature.
    pub supply_c: f64,
    pub carnot_fraction: f64,
    pub max_cop: f64,
    pub min_load: f64,
    pub ramp: Option<f64>,
    pub bound_policy: BoundPolicy,
    pub cost: CostConfig,
}

impl Default for ChillerConfig {
    fn default() -> Self {
        Self {
            nominal_kw_cold: 8.0,
            supply_c: 6.0,
            carnot_fraction: 0.4,
            max_cop: 6.0,
            min_load: 0.0,
            ramp: None,
            bound_policy: BoundPolicy::Clamp,
            cost: CostConfig {
                capex_per_unit: 600.0,
                om_fraction: 0.02,
                lifetime_years: 15.0,
            },
        }
    }
}

/// Electrolyzer; sized by electrical input.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElectrolyzerConfig {
    pub nominal_kw_el: f64,
    pub hydrogen_efficiency: f64,
    /// Recoverable heat per unit input; 0 disables the heat output.
    pub heat_efficiency: f64,
    pub min_load: f64,
    pub ramp: Option<f64>,
    pub bound_policy: BoundPolicy,
    pub cost: CostConfig,
}

impl Default for ElectrolyzerConfig {
    fn default() -> Self {
        Self {
            nominal_kw_el: 5.0,
            hydrogen_efficiency: 0.65,
            heat_efficiency: 0.0,
            min_load: 0.1,
            ramp: None,
            bound_policy: BoundPolicy::Clamp,
            cost: CostConfig {
                capex_per_unit: 1800.0,
                om_fraction: 0.03,
                lifetime_years: 15.0,
            },
        }
    }
}

/// Fuel cell; sized by electrical output.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FuelCellConfig {
    pub nominal_kw_el: f64,
    pub electric_efficiency: f64,
    pub heat_efficiency: f64,
    pub min_load: f64,
    pub ramp: Option<f64>,
    pub bound_policy: BoundPolicy,
    pub cost: CostConfig,
}

impl Default for FuelCellConfig {
    fn default() -> Self {
        Self {
            nominal_kw_el: 3.0,
            electric_efficiency: 0.5,
            heat_efficiency: 0.0,
            min_load: 0.1,
            ramp: None,
            bound_policy: BoundPolicy::Clamp,
            cost: CostConfig {
                capex_per_unit: 2500.0,
                om_fraction: 0.03,
                lifetime_years: 15.0,
            },
        }
    }
}

/// Grid connection of one carrier.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub max_import_kw: f64,
    pub max_export_kw: f64,
    /// Price per imported kWh.
    pub import_price: f64,
    /// Revenue per exported kWh.
    pub export_price: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            max_import_kw: 20.0,
            max_export_kw: 20.0,
            import_price: 0.30,
            export_price: 0.08,
        }
    }
}

/// One dimension of the sizing search space.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionConfig {
    /// Id of a sizeable component.
    pub component: String,
    pub lower: f64,
    pub upper: f64,
}

/// Genetic algorithm settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizingConfig {
    pub population_size: usize,
    pub generations: usize,
    pub seed: u64,
    pub crossover_rate: f64,
    /// Distribution index of simulated binary crossover.
    pub crossover_eta: f64,
    /// Distribution index of polynomial mutation.
    pub mutation_eta: f64,
    /// Per-gene mutation probability; defaults to one over the dimension count.
    pub mutation_rate: Option<f64>,
    /// Stop after this many generations without archive improvement.
    pub stall_generations: Option<usize>,
    /// Objective value assigned to candidates whose run aborts.
    pub infeasible_penalty: f64,
    pub objectives: Vec<Objective>,
    /// Evaluate a generation on the rayon pool.
    pub parallel: bool,
    /// Wall-clock budget per generation.
    pub generation_deadline_ms: Option<u64>,
    /// Maximum archive size for multi-objective runs.
    pub archive_limit: Option<usize>,
    pub dimensions: Vec<DimensionConfig>,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            generations: 10,
            seed: 7,
            crossover_rate: 0.9,
            crossover_eta: 15.0,
            mutation_eta: 20.0,
            mutation_rate: None,
            stall_generations: None,
            infeasible_penalty: 1e9,
            objectives: vec![Objective::TotalCost],
            parallel: true,
            generation_deadline_ms: None,
            archive_limit: None,
            dimensions: Vec::new(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.steps"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl CellConfig {
    /// Grid-connected house: PV, battery and an electric load.
    pub fn baseline() -> Self {
        Self {
            pv: Some(PvConfig::default()),
            battery: Some(StorageConfig::default()),
            grid_electricity: Some(GridConfig::default()),
            sizing: SizingConfig {
                dimensions: vec![
                    DimensionConfig {
                        component: ids::PV.to_string(),
                        lower: 0.0,
                        upper: 60.0,
                    },
                    DimensionConfig {
                        component: ids::BATTERY.to_string(),
                        lower: 0.0,
                        upper: 30.0,
                    },
                ],
                ..SizingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Islanded cell: PV, wind and a large battery. Shortfalls are
    /// recorded as unmet demand.
    pub fn off_grid() -> Self {
        Self {
            simulation: SimulationConfig {
                steps: 72,
                balance_policy: BalancePolicy::Soft,
                ..SimulationConfig::default()
            },
            dispatch: DispatchConfig {
                unmet_demand_penalty: Some(10.0),
                ..DispatchConfig::default()
            },
            pv: Some(PvConfig {
                area_m2: 40.0,
                ..PvConfig::default()
            }),
            wind: Some(WindConfig::default()),
            battery: Some(StorageConfig {
                capacity_kwh: 25.0,
                initial_soc: 0.6,
                aging: Some(AgingConfig::default()),
                ..StorageConfig::default()
            }),
            sizing: SizingConfig {
                objectives: vec![Objective::TotalCost, Objective::Unmet],
                dimensions: vec![
                    DimensionConfig {
                        component: ids::PV.to_string(),
                        lower: 10.0,
                        upper: 80.0,
                    },
                    DimensionConfig {
                        component: ids::WIND.to_string(),
                        lower: 0.0,
                        upper: 15.0,
                    },
                    DimensionConfig {
                        component: ids::BATTERY.to_string(),
                        lower: 5.0,
                        upper: 60.0,
                    },
                ],
                ..SizingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Sector-coupled cell: heat pump with heat storage, and a hydrogen
    /// path of electrolyzer, tank and fuel cell. Dispatched on a rolling
    /// window.
    pub fn hydrogen() -> Self {
        Self {
            simulation: SimulationConfig {
                steps: 48,
                ..SimulationConfig::default()
            },
            dispatch: DispatchConfig {
                horizon: HorizonKind::Rolling,
                window_steps: 24,
                commit_steps: 12,
                ..DispatchConfig::default()
            },
            loads: LoadConfig {
                heat: true,
                ..LoadConfig::default()
            },
            pv: Some(PvConfig {
                area_m2: 50.0,
                ..PvConfig::default()
            }),
            battery: Some(StorageConfig::default()),
            heat_storage: Some(StorageConfig {
                capacity_kwh: 20.0,
                soc_min: 0.0,
                soc_max: 1.0,
                c_rate_charge: 0.3,
                c_rate_discharge: 0.3,
                charge_efficiency: 0.98,
                discharge_efficiency: 0.98,
                standing_loss_per_hour: 0.005,
                cost: CostConfig {
                    capex_per_unit: 40.0,
                    om_fraction: 0.01,
                    lifetime_years: 25.0,
                },
                ..StorageConfig::default()
            }),
            hydrogen_storage: Some(StorageConfig {
                capacity_kwh: 60.0,
                soc_min: 0.05,
                soc_max: 1.0,
                initial_soc: 0.2,
                c_rate_charge: 0.2,
                c_rate_discharge: 0.2,
                charge_efficiency: 1.0,
                discharge_efficiency: 1.0,
                cost: CostConfig {
                    capex_per_unit: 30.0,
                    om_fraction: 0.01,
                    lifetime_years: 25.0,
                },
                ..StorageConfig::default()
            }),
            heat_pump: Some(HeatPumpConfig::default()),
            electrolyzer: Some(ElectrolyzerConfig {
                heat_efficiency: 0.15,
                ..ElectrolyzerConfig::default()
            }),
            fuel_cell: Some(FuelCellConfig {
                heat_efficiency: 0.3,
                ..FuelCellConfig::default()
            }),
            grid_electricity: Some(GridConfig::default()),
            sizing: SizingConfig {
                dimensions: vec![
                    DimensionConfig {
                        component: ids::PV.to_string(),
                        lower: 10.0,
                        upper: 80.0,
                    },
                    DimensionConfig {
                        component: ids::ELECTROLYZER.to_string(),
                        lower: 1.0,
                        upper: 10.0,
                    },
                    DimensionConfig {
                        component: ids::HYDROGEN_STORAGE.to_string(),
                        lower: 10.0,
                        upper: 200.0,
                    },
                ],
                ..SizingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Summer cell with heat and cold buses: PV behind an inverter,
    /// solar thermal collectors with a hot water tank and district heat as
    /// backup, and a chiller charging a cold store.
    pub fn cooling() -> Self {
        Self {
            simulation: SimulationConfig {
                start: "2024-07-15T00:00:00".to_string(),
                steps: 48,
                ..SimulationConfig::default()
            },
            profile: ProfileConfig {
                mean_temperature_c: 27.0,
                cold_base_kw: 0.4,
                ..ProfileConfig::default()
            },
            loads: LoadConfig {
                heat: true,
                cold: true,
                ..LoadConfig::default()
            },
            pv: Some(PvConfig {
                area_m2: 35.0,
                inverter: Some(InverterConfig::default()),
                ..PvConfig::default()
            }),
            solar_thermal: Some(SolarThermalConfig::default()),
            battery: Some(StorageConfig::default()),
            heat_storage: Some(StorageConfig {
                capacity_kwh: 12.0,
                soc_min: 0.0,
                soc_max: 1.0,
                c_rate_charge: 0.5,
                c_rate_discharge: 0.5,
                charge_efficiency: 0.98,
                discharge_efficiency: 0.98,
                standing_loss_per_hour: 0.005,
                cost: CostConfig {
                    capex_per_unit: 40.0,
                    om_fraction: 0.01,
                    lifetime_years: 25.0,
                },
                ..StorageConfig::default()
            }),
            cold_storage: Some(StorageConfig {
                capacity_kwh: 15.0,
                soc_min: 0.0,
                soc_max: 1.0,
                c_rate_charge: 0.4,
                c_rate_discharge: 0.4,
                charge_efficiency: 0.97,
                discharge_efficiency: 0.97,
                standing_loss_per_hour: 0.01,
                cost: CostConfig {
                    capex_per_unit: 60.0,
                    om_fraction: 0.01,
                    lifetime_years: 25.0,
                },
                ..StorageConfig::default()
            }),
            chiller: Some(ChillerConfig::default()),
            grid_electricity: Some(GridConfig::default()),
            grid_heat: Some(GridConfig {
                max_import_kw: 10.0,
                max_export_kw: 0.0,
                import_price: 0.12,
                export_price: 0.0,
            }),
            sizing: SizingConfig {
                dimensions: vec![
                    DimensionConfig {
                        component: ids::SOLAR_THERMAL.to_string(),
                        lower: 0.0,
                        upper: 30.0,
                    },
                    DimensionConfig {
                        component: ids::CHILLER.to_string(),
                        lower: 4.0,
                        upper: 15.0,
                    },
                    DimensionConfig {
                        component: ids::COLD_STORAGE.to_string(),
                        lower: 0.0,
                        upper: 40.0,
                    },
                ],
                ..SizingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "off_grid", "hydrogen", "cooling"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "off_grid" => Ok(Self::off_grid()),
            "hydrogen" => Ok(Self::hydrogen()),
            "cooling" => Ok(Self::cooling()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Parsed `simulation.start`.
    pub fn start(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.simulation.start, START_FORMAT).ok()
    }

    /// Timebase of the configured horizon.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for an unparsable start or an empty horizon.
    pub fn timebase(&self) -> Result<Timebase, ConfigError> {
        let start = self.start().ok_or_else(|| {
            ConfigError::new("simulation.start", format!("expected {START_FORMAT}"))
        })?;
        let s = &self.simulation;
        if s.steps == 0 || s.step_hours <= 0.0 || !s.step_hours.is_finite() {
            return Err(ConfigError::new(
                "simulation",
                "steps and step_hours must be > 0",
            ));
        }
        Ok(Timebase::new(start, s.step_hours, s.steps))
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            balance_tolerance: self.simulation.balance_tolerance,
            balance_policy: self.simulation.balance_policy,
            window: self.dispatch.window(),
        }
    }

    /// Ids of the components the configured cell contains, in cell order.
    pub fn component_ids(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        let mut push = |present: bool, id: &'static str| {
            if present {
                out.push(id);
            }
        };
        push(self.pv.is_some(), ids::PV);
        push(self.wind.is_some(), ids::WIND);
        push(self.solar_thermal.is_some(), ids::SOLAR_THERMAL);
        push(true, ids::ELECTRIC_LOAD);
        push(self.loads.heat, ids::HEAT_LOAD);
        push(self.loads.cold, ids::COLD_LOAD);
        push(self.heat_pump.is_some(), ids::HEAT_PUMP);
        push(self.chiller.is_some(), ids::CHILLER);
        push(self.electrolyzer.is_some(), ids::ELECTROLYZER);
        push(self.fuel_cell.is_some(), ids::FUEL_CELL);
        push(self.battery.is_some(), ids::BATTERY);
        push(self.heat_storage.is_some(), ids::HEAT_STORAGE);
        push(self.hydrogen_storage.is_some(), ids::HYDROGEN_STORAGE);
        push(self.cold_storage.is_some(), ids::COLD_STORAGE);
        push(self.grid_electricity.is_some(), ids::GRID_ELECTRICITY);
        push(self.grid_heat.is_some(), ids::GRID_HEAT);
        out
    }

    /// Investment cost table of every sizeable component present.
    pub fn costs(&self) -> Vec<(&'static str, CostConfig)> {
        let entries = [
            (ids::PV, self.pv.map(|c| c.cost)),
            (ids::WIND, self.wind.map(|c| c.cost)),
            (ids::SOLAR_THERMAL, self.solar_thermal.map(|c| c.cost)),
            (ids::HEAT_PUMP, self.heat_pump.map(|c| c.cost)),
            (ids::CHILLER, self.chiller.map(|c| c.cost)),
            (ids::ELECTROLYZER, self.electrolyzer.map(|c| c.cost)),
            (ids::FUEL_CELL, self.fuel_cell.map(|c| c.cost)),
            (ids::BATTERY, self.battery.map(|c| c.cost)),
            (ids::HEAT_STORAGE, self.heat_storage.map(|c| c.cost)),
            (ids::HYDROGEN_STORAGE, self.hydrogen_storage.map(|c| c.cost)),
            (ids::COLD_STORAGE, self.cold_storage.map(|c| c.cost)),
        ];
        entries
            .into_iter()
            .filter_map(|(id, cost)| cost.map(|c| (id, c)))
            .collect()
    }

    /// Builds the cell described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns every validation error if the configuration is invalid, so
    /// that component constructors never see out-of-range parameters.
    pub fn build_cell(&self) -> Result<Cell, Vec<ConfigError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut cell = Cell::new();
        if let Some(pv) = &self.pv {
            let mut array = PvArray::new(
                ids::PV,
                pv.area_m2,
                pv.efficiency,
                pv.temperature_coefficient,
                pv.noct_c,
            );
            if let Some(inverter) = pv.inverter {
                array = array.with_inverter(inverter.into());
            }
            cell = cell.with(array);
        }
        if let Some(w) = &self.wind {
            cell = cell.with(WindTurbine::new(
                ids::WIND,
                w.rated_kw,
                w.hub_height_m,
                w.measurement_height_m,
                w.roughness_m,
                w.cut_in_m_s,
                w.rated_speed_m_s,
                w.cut_out_m_s,
            ));
        }
        if let Some(st) = &self.solar_thermal {
            cell = cell.with(SolarThermal::new(
                ids::SOLAR_THERMAL,
                st.area_m2,
                st.optical_efficiency,
                (st.k0, st.k1),
                st.mean_fluid_c,
            ));
        }
        cell = cell.with(Demand::electric(self.loads.electric_scale));
        if self.loads.heat {
            cell = cell.with(Demand::heat(self.loads.heat_scale));
        }
        if self.loads.cold {
            cell = cell.with(Demand::cold(self.loads.cold_scale));
        }
        if let Some(hp) = &self.heat_pump {
            let mut c = Converter::heat_pump(hp.nominal_kw_th, hp.supply_c, hp.carnot_fraction, hp.max_cop)
                .with_min_load(hp.min_load)
                .with_policy(hp.bound_policy);
            if let Some(r) = hp.ramp {
                c = c.with_ramp(r);
            }
            cell = cell.with(c);
        }
        if let Some(ch) = &self.chiller {
            let mut c = Converter::chiller(ch.nominal_kw_cold, ch.supply_c, ch.carnot_fraction, ch.max_cop)
                .with_min_load(ch.min_load)
                .with_policy(ch.bound_policy);
            if let Some(r) = ch.ramp {
                c = c.with_ramp(r);
            }
            cell = cell.with(c);
        }
        if let Some(e) = &self.electrolyzer {
            let mut c = Converter::electrolyzer(e.nominal_kw_el, e.hydrogen_efficiency, e.heat_efficiency)
                .with_min_load(e.min_load)
                .with_policy(e.bound_policy);
            if let Some(r) = e.ramp {
                c = c.with_ramp(r);
            }
            cell = cell.with(c);
        }
        if let Some(f) = &self.fuel_cell {
            let mut c = Converter::fuel_cell(f.nominal_kw_el, f.electric_efficiency, f.heat_efficiency)
                .with_min_load(f.min_load)
                .with_policy(f.bound_policy);
            if let Some(r) = f.ramp {
                c = c.with_ramp(r);
            }
            cell = cell.with(c);
        }
        let stores = [
            (ids::BATTERY, Carrier::Electricity, &self.battery),
            (ids::HEAT_STORAGE, Carrier::Heat, &self.heat_storage),
            (ids::HYDROGEN_STORAGE, Carrier::Hydrogen, &self.hydrogen_storage),
            (ids::COLD_STORAGE, Carrier::Cold, &self.cold_storage),
        ];
        for (id, carrier, store) in stores {
            if let Some(s) = store {
                let mut storage = Storage::new(
                    id,
                    carrier,
                    s.capacity_kwh,
                    (s.soc_min, s.soc_max),
                    s.initial_soc,
                    (s.c_rate_charge, s.c_rate_discharge),
                    (s.charge_efficiency, s.discharge_efficiency),
                )
                .with_standing_loss(s.standing_loss_per_hour)
                .with_policy(s.bound_policy);
                if let Some(aging) = s.aging {
                    storage = storage.with_aging(aging.into());
                }
                cell = cell.with(storage);
            }
        }
        let grids = [
            (ids::GRID_ELECTRICITY, Carrier::Electricity, &self.grid_electricity),
            (ids::GRID_HEAT, Carrier::Heat, &self.grid_heat),
        ];
        for (id, carrier, grid) in grids {
            if let Some(g) = grid {
                cell = cell.with(Grid::new(
                    id,
                    carrier,
                    g.max_import_kw,
                    g.max_export_kw,
                    g.import_price,
                    g.export_price,
                ));
            }
        }
        Ok(cell)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError::new(field, message));
            }
        };

        let s = &self.simulation;
        check(self.start().is_some(), "simulation.start", "must be YYYY-MM-DDTHH:MM:SS");
        check(s.steps > 0, "simulation.steps", "must be > 0");
        check(s.step_hours > 0.0 && s.step_hours.is_finite(), "simulation.step_hours", "must be > 0");
        check(s.balance_tolerance >= 0.0, "simulation.balance_tolerance", "must be >= 0");

        let p = &self.profile;
        check(
            (0.0..24.0).contains(&p.sunrise_hour) && p.sunrise_hour < p.sunset_hour && p.sunset_hour <= 24.0,
            "profile.sunrise_hour",
            "must satisfy 0 <= sunrise_hour < sunset_hour <= 24",
        );
        check(p.peak_irradiance_w_m2 >= 0.0, "profile.peak_irradiance_w_m2", "must be >= 0");
        check(p.noise_std >= 0.0, "profile.noise_std", "must be >= 0");
        check(p.wind_std_m_s >= 0.0, "profile.wind_std_m_s", "must be >= 0");

        let d = &self.dispatch;
        if d.horizon == HorizonKind::Rolling {
            check(d.window_steps > 0, "dispatch.window_steps", "must be > 0");
            check(
                d.commit_steps > 0 && d.commit_steps <= d.window_steps,
                "dispatch.commit_steps",
                "must be in [1, dispatch.window_steps]",
            );
        }
        check(d.timeout_ms > 0, "dispatch.timeout_ms", "must be > 0");
        check(d.relaxed_tolerance > 0.0, "dispatch.relaxed_tolerance", "must be > 0");
        check(
            d.unmet_demand_penalty.is_none_or(|v| v >= 0.0),
            "dispatch.unmet_demand_penalty",
            "must be >= 0",
        );
        check(d.curtailment_penalty >= 0.0, "dispatch.curtailment_penalty", "must be >= 0");
        check(d.storage_cycle_cost >= 0.0, "dispatch.storage_cycle_cost", "must be >= 0");

        let e = &self.economics;
        check(e.interest_rate > -1.0, "economics.interest_rate", "must be > -1");
        check(e.value_of_lost_load >= 0.0, "economics.value_of_lost_load", "must be >= 0");
        check(e.price_escalation > -1.0, "economics.price_escalation", "must be > -1");
        check(
            e.period_years > 0.0 && e.period_years.is_finite(),
            "economics.period_years",
            "must be > 0",
        );

        check(self.loads.electric_scale >= 0.0, "loads.electric_scale", "must be >= 0");
        check(self.loads.heat_scale >= 0.0, "loads.heat_scale", "must be >= 0");
        check(self.loads.cold_scale >= 0.0, "loads.cold_scale", "must be >= 0");

        if let Some(pv) = &self.pv {
            check(pv.area_m2 >= 0.0, "pv.area_m2", "must be >= 0");
            check(pv.efficiency > 0.0 && pv.efficiency <= 1.0, "pv.efficiency", "must be in (0, 1]");
            if let Some(inv) = &pv.inverter {
                check(inv.sizing_ratio > 0.0, "pv.inverter.sizing_ratio", "must be > 0");
                check(
                    inv.nominal_efficiency > 0.0 && inv.nominal_efficiency <= 1.0,
                    "pv.inverter.nominal_efficiency",
                    "must be in (0, 1]",
                );
                check(
                    inv.voltage_loss >= 0.0 && inv.resistance_loss >= 0.0 && inv.self_consumption >= 0.0,
                    "pv.inverter.voltage_loss",
                    "loss terms must be >= 0",
                );
            }
        }
        if let Some(st) = &self.solar_thermal {
            check(st.area_m2 >= 0.0, "solar_thermal.area_m2", "must be >= 0");
            check(
                st.optical_efficiency > 0.0 && st.optical_efficiency <= 1.0,
                "solar_thermal.optical_efficiency",
                "must be in (0, 1]",
            );
            check(st.k0 >= 0.0 && st.k1 >= 0.0, "solar_thermal.k0", "loss coefficients must be >= 0");
        }
        if let Some(w) = &self.wind {
            check(w.rated_kw >= 0.0, "wind.rated_kw", "must be >= 0");
            check(
                0.0 <= w.cut_in_m_s && w.cut_in_m_s < w.rated_speed_m_s && w.rated_speed_m_s < w.cut_out_m_s,
                "wind.cut_in_m_s",
                "must satisfy 0 <= cut_in < rated_speed < cut_out",
            );
            check(
                w.roughness_m > 0.0 && w.hub_height_m > w.roughness_m && w.measurement_height_m > w.roughness_m,
                "wind.roughness_m",
                "must be > 0 and below both heights",
            );
        }

        let stores = [
            ("battery", &self.battery),
            ("heat_storage", &self.heat_storage),
            ("hydrogen_storage", &self.hydrogen_storage),
            ("cold_storage", &self.cold_storage),
        ];
        for (name, store) in stores {
            let Some(st) = store else { continue };
            if let Some(a) = &st.aging {
                check(
                    a.end_of_life > 0.0 && a.end_of_life < 1.0,
                    &format!("{name}.aging.end_of_life"),
                    "must be in (0, 1)",
                );
                check(
                    a.float_life_years > 0.0 && a.cycle_life > 0.0,
                    &format!("{name}.aging.float_life_years"),
                    "lives must be > 0",
                );
                check(a.dod_exponent >= 0.0, &format!("{name}.aging.dod_exponent"), "must be >= 0");
            }
            check(st.capacity_kwh >= 0.0, &format!("{name}.capacity_kwh"), "must be >= 0");
            check(
                0.0 <= st.soc_min && st.soc_min <= st.soc_max && st.soc_max <= 1.0,
                &format!("{name}.soc_min"),
                "must satisfy 0 <= soc_min <= soc_max <= 1",
            );
            check(
                st.soc_min <= st.initial_soc && st.initial_soc <= st.soc_max,
                &format!("{name}.initial_soc"),
                "must be in [soc_min, soc_max]",
            );
            check(
                st.c_rate_charge >= 0.0 && st.c_rate_discharge >= 0.0,
                &format!("{name}.c_rate_charge"),
                "C-rates must be >= 0",
            );
            check(
                st.charge_efficiency > 0.0
                    && st.charge_efficiency <= 1.0
                    && st.discharge_efficiency > 0.0
                    && st.discharge_efficiency <= 1.0,
                &format!("{name}.charge_efficiency"),
                "efficiencies must be in (0, 1]",
            );
            check(
                (0.0..1.0).contains(&st.standing_loss_per_hour),
                &format!("{name}.standing_loss_per_hour"),
                "must be in [0, 1)",
            );
        }

        let converters = [
            ("heat_pump", self.heat_pump.map(|c| (c.nominal_kw_th, c.min_load, c.ramp))),
            ("chiller", self.chiller.map(|c| (c.nominal_kw_cold, c.min_load, c.ramp))),
            ("electrolyzer", self.electrolyzer.map(|c| (c.nominal_kw_el, c.min_load, c.ramp))),
            ("fuel_cell", self.fuel_cell.map(|c| (c.nominal_kw_el, c.min_load, c.ramp))),
        ];
        for (name, conv) in converters {
            let Some((nominal, min_load, ramp)) = conv else { continue };
            check(nominal >= 0.0, &format!("{name}.nominal"), "must be >= 0");
            check((0.0..1.0).contains(&min_load), &format!("{name}.min_load"), "must be in [0, 1)");
            check(ramp.is_none_or(|r| r > 0.0), &format!("{name}.ramp"), "must be > 0");
        }
        if let Some(hp) = &self.heat_pump {
            check(
                hp.carnot_fraction > 0.0 && hp.carnot_fraction <= 1.0,
                "heat_pump.carnot_fraction",
                "must be in (0, 1]",
            );
            check(hp.max_cop >= 1.0, "heat_pump.max_cop", "must be >= 1");
        }
        if let Some(ch) = &self.chiller {
            check(
                ch.carnot_fraction > 0.0 && ch.carnot_fraction <= 1.0,
                "chiller.carnot_fraction",
                "must be in (0, 1]",
            );
            check(ch.max_cop >= 1.0, "chiller.max_cop", "must be >= 1");
        }
        if let Some(e) = &self.electrolyzer {
            check(e.hydrogen_efficiency > 0.0, "electrolyzer.hydrogen_efficiency", "must be > 0");
            check(e.heat_efficiency >= 0.0, "electrolyzer.heat_efficiency", "must be >= 0");
        }
        if let Some(f) = &self.fuel_cell {
            check(f.electric_efficiency > 0.0, "fuel_cell.electric_efficiency", "must be > 0");
            check(f.heat_efficiency >= 0.0, "fuel_cell.heat_efficiency", "must be >= 0");
        }

        let grids = [("grid_electricity", &self.grid_electricity), ("grid_heat", &self.grid_heat)];
        for (name, grid) in grids {
            let Some(g) = grid else { continue };
            check(
                g.max_import_kw >= 0.0 && g.max_export_kw >= 0.0,
                &format!("{name}.max_import_kw"),
                "limits must be >= 0",
            );
        }

        for (id, cost) in self.costs() {
            check(
                cost.capex_per_unit >= 0.0 && cost.om_fraction >= 0.0,
                &format!("{id}.cost.capex_per_unit"),
                "costs must be >= 0",
            );
            check(cost.lifetime_years > 0.0, &format!("{id}.cost.lifetime_years"), "must be > 0");
        }

        let z = &self.sizing;
        check(z.population_size >= 2, "sizing.population_size", "must be >= 2");
        check(z.generations > 0, "sizing.generations", "must be > 0");
        check((0.0..=1.0).contains(&z.crossover_rate), "sizing.crossover_rate", "must be in [0, 1]");
        check(z.crossover_eta >= 0.0, "sizing.crossover_eta", "must be >= 0");
        check(z.mutation_eta >= 0.0, "sizing.mutation_eta", "must be >= 0");
        check(
            z.mutation_rate.is_none_or(|r| (0.0..=1.0).contains(&r)),
            "sizing.mutation_rate",
            "must be in [0, 1]",
        );
        check(z.infeasible_penalty > 0.0, "sizing.infeasible_penalty", "must be > 0");
        check(!z.objectives.is_empty(), "sizing.objectives", "must not be empty");
        check(z.archive_limit.is_none_or(|n| n > 0), "sizing.archive_limit", "must be > 0");

        let sizeable = self.costs();
        for (i, dim) in z.dimensions.iter().enumerate() {
            check(
                sizeable.iter().any(|(id, _)| *id == dim.component),
                &format!("sizing.dimensions[{i}].component"),
                "must name a configured sizeable component",
            );
            check(
                dim.lower.is_finite() && dim.upper.is_finite() && 0.0 <= dim.lower && dim.lower <= dim.upper,
                &format!("sizing.dimensions[{i}].lower"),
                "must satisfy 0 <= lower <= upper",
            );
        }

        errors
    }
}
