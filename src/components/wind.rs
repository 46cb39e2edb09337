use crate::components::curves::{hub_height_wind_speed, wind_power_fraction};
use crate::components::types::{
    Advance, Carrier, CarrierFlows, Component, ComponentContext, ComponentKind, LinearModel,
};
use crate::error::InfeasibleStateError;
use crate::feed::{Exogenous, ForecastStep};

/// Generic wind turbine with a cubic power curve.
///
/// Wind speed from the feed is measured at `measurement_height_m` and is
/// scaled to hub height with the logarithmic wind profile.
#[derive(Debug, Clone)]
pub struct WindTurbine {
    id: String,
    /// Rated power in kW. This is the sizeable capacity.
    pub rated_kw: f64,
    pub hub_height_m: f64,
    pub measurement_height_m: f64,
    pub roughness_m: f64,
    pub cut_in_m_s: f64,
    pub rated_speed_m_s: f64,
    pub cut_out_m_s: f64,
}

impl WindTurbine {
    /// # Panics
    ///
    /// Panics unless `0 <= cut_in < rated_speed < cut_out` and all heights
    /// exceed the roughness length.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        rated_kw: f64,
        hub_height_m: f64,
        measurement_height_m: f64,
        roughness_m: f64,
        cut_in_m_s: f64,
        rated_speed_m_s: f64,
        cut_out_m_s: f64,
    ) -> Self {
        assert!(rated_kw >= 0.0);
        assert!(0.0 <= cut_in_m_s && cut_in_m_s < rated_speed_m_s && rated_speed_m_s < cut_out_m_s);
        assert!(roughness_m > 0.0 && hub_height_m > roughness_m && measurement_height_m > roughness_m);
        Self {
            id: id.into(),
            rated_kw,
            hub_height_m,
            measurement_height_m,
            roughness_m,
            cut_in_m_s,
            rated_speed_m_s,
            cut_out_m_s,
        }
    }

    pub fn output_kw(&self, exogenous: &Exogenous) -> f64 {
        let v = hub_height_wind_speed(
            exogenous.wind_speed_m_s,
            self.measurement_height_m,
            self.hub_height_m,
            self.roughness_m,
        );
        self.rated_kw * wind_power_fraction(v, self.cut_in_m_s, self.rated_speed_m_s, self.cut_out_m_s)
    }
}

impl Component for WindTurbine {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Generation
    }

    fn carriers(&self) -> Vec<Carrier> {
        vec![Carrier::Electricity]
    }

    fn size(&self) -> Option<f64> {
        Some(self.rated_kw)
    }

    fn initialize(&mut self, size: Option<f64>) {
        if let Some(kw) = size {
            self.rated_kw = kw.max(0.0);
        }
    }

    fn advance(&mut self, context: &ComponentContext) -> Result<Advance, InfeasibleStateError> {
        let flows = CarrierFlows::single(Carrier::Electricity, self.output_kw(context.exogenous));
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
                .map(|f| CarrierFlows::single(Carrier::Electricity, self.output_kw(&f.exogenous)))
                .collect(),
        }
    }
}
