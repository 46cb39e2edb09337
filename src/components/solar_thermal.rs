use crate::components::curves::collector_efficiency;
use crate::components::types::{
    Advance, Carrier, CarrierFlows, Component, ComponentContext, ComponentKind, LinearModel,
};
use crate::error::InfeasibleStateError;
use crate::feed::{Exogenous, ForecastStep};

/// Solar thermal collector field feeding the heat bus.
///
/// Runs at a fixed mean fluid temperature, so the yield depends only on
/// irradiance and ambient temperature. Output is curtailable: a full heat
/// store simply stops the solar loop.
///
/// # Power Flow Convention (Bus)
/// Returns **positive** heat (supply into the bus).
#[derive(Debug, Clone)]
pub struct SolarThermal {
    id: String,
    /// Aperture area in m². This is the sizeable capacity.
    pub area_m2: f64,
    pub optical_efficiency: f64,
    /// Linear heat loss coefficient in W/(m² K).
    pub k0: f64,
    /// Quadratic heat loss coefficient in W/(m² K²).
    pub k1: f64,
    pub mean_fluid_c: f64,
}

impl SolarThermal {
    /// # Panics
    ///
    /// Panics if the area is negative or the optical efficiency is outside (0, 1].
    pub fn new(
        id: impl Into<String>,
        area_m2: f64,
        optical_efficiency: f64,
        (k0, k1): (f64, f64),
        mean_fluid_c: f64,
    ) -> Self {
        assert!(area_m2 >= 0.0);
        assert!(optical_efficiency > 0.0 && optical_efficiency <= 1.0);
        assert!(k0 >= 0.0 && k1 >= 0.0, "heat loss coefficients must be >= 0");
        Self {
            id: id.into(),
            area_m2,
            optical_efficiency,
            k0,
            k1,
            mean_fluid_c,
        }
    }

    /// Heat yield in kW for the given conditions.
    pub fn output_kw(&self, exogenous: &Exogenous) -> f64 {
        let irradiance = exogenous.irradiance_w_m2.max(0.0);
        let efficiency = collector_efficiency(
            irradiance,
            exogenous.temperature_c,
            self.mean_fluid_c,
            self.optical_efficiency,
            self.k0,
            self.k1,
        );
        self.area_m2 * irradiance * efficiency / 1000.0
    }
}

impl Component for SolarThermal {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Generation
    }

    fn carriers(&self) -> Vec<Carrier> {
        vec![Carrier::Heat]
    }

    fn size(&self) -> Option<f64> {
        Some(self.area_m2)
    }

    fn initialize(&mut self, size: Option<f64>) {
        if let Some(area) = size {
            self.area_m2 = area.max(0.0);
        }
    }

    fn advance(&mut self, context: &ComponentContext) -> Result<Advance, InfeasibleStateError> {
        let flows = CarrierFlows::single(Carrier::Heat, self.output_kw(context.exogenous));
        Ok(Advance {
            flows,
            curtailable: flows,
            state: None,
        })
    }

    fn linear_model(&self, window: &[ForecastStep]) -> LinearModel {
        LinearModel::Fixed {
            flows: window
                .iter()
                .map(|f| CarrierFlows::single(Carrier::Heat, self.output_kw(&f.exogenous)))
                .collect(),
        }
    }
}
