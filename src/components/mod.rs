pub mod converter;
pub mod curves;
pub mod grid;
pub mod load;
pub mod solar;
pub mod solar_thermal;
pub mod storage;
pub mod types;
pub mod wind;

pub use converter::{Converter, Efficiency, RatingBasis};
pub use grid::Grid;
pub use load::Demand;
pub use solar::{Inverter, PvArray};
pub use solar_thermal::SolarThermal;
pub use storage::{Aging, Storage};
pub use types::{
    Advance, BoundPolicy, Carrier, CarrierFlows, Component, ComponentContext, ComponentKind,
    ConverterModel, GridModel, LinearModel, Setpoint, StateDelta, StorageModel,
};
pub use wind::WindTurbine;

/// Identifiers of the components a configured cell can contain.
pub mod ids {
    pub const PV: &str = "pv";
    pub const WIND: &str = "wind";
    pub const ELECTRIC_LOAD: &str = "electric_load";
    pub const HEAT_LOAD: &str = "heat_load";
    pub const COLD_LOAD: &str = "cold_load";
    pub const SOLAR_THERMAL: &str = "solar_thermal";
    pub const HEAT_PUMP: &str = "heat_pump";
    pub const ELECTROLYZER: &str = "electrolyzer";
    pub const FUEL_CELL: &str = "fuel_cell";
    pub const CHILLER: &str = "chiller";
    pub const BATTERY: &str = "battery";
    pub const HEAT_STORAGE: &str = "heat_storage";
    pub const HYDROGEN_STORAGE: &str = "hydrogen_storage";
    pub const COLD_STORAGE: &str = "cold_storage";
    pub const GRID_ELECTRICITY: &str = "grid_electricity";
    pub const GRID_HEAT: &str = "grid_heat";
}
