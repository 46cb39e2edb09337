use crate::components::types::{
    Advance, Carrier, CarrierFlows, Component, ComponentContext, ComponentKind, LinearModel,
};
use crate::error::InfeasibleStateError;
use crate::feed::{Exogenous, ForecastStep};

/// An inflexible demand read from the exogenous feed.
///
/// # Power Flow Convention
/// Returns **positive** values (consumption). The cell registers demands on
/// their bus with a withdrawal sign, so the bus sees them as negative.
#[derive(Debug, Clone)]
pub struct Demand {
    id: String,
    carrier: Carrier,
    /// Multiplier applied to the feed profile.
    pub scale: f64,
}

impl Demand {
    /// # Panics
    ///
    /// Panics if `scale` is negative or the carrier has no demand profile.
    pub fn new(id: impl Into<String>, carrier: Carrier, scale: f64) -> Self {
        assert!(scale >= 0.0);
        assert!(carrier != Carrier::Hydrogen, "no hydrogen demand profile in the feed");
        Self {
            id: id.into(),
            carrier,
            scale,
        }
    }

    pub fn electric(scale: f64) -> Self {
        Self::new(super::ids::ELECTRIC_LOAD, Carrier::Electricity, scale)
    }

    pub fn heat(scale: f64) -> Self {
        Self::new(super::ids::HEAT_LOAD, Carrier::Heat, scale)
    }

    pub fn cold(scale: f64) -> Self {
        Self::new(super::ids::COLD_LOAD, Carrier::Cold, scale)
    }

    pub fn carrier(&self) -> Carrier {
        self.carrier
    }

    /// Demand in kW for the given conditions, never negative.
    pub fn demand_kw(&self, exogenous: &Exogenous) -> f64 {
        let raw = match self.carrier {
            Carrier::Heat => exogenous.heat_load_kw,
            Carrier::Cold => exogenous.cold_load_kw,
            _ => exogenous.electric_load_kw,
        };
        (raw * self.scale).max(0.0)
    }
}

impl Component for Demand {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Demand
    }

    fn carriers(&self) -> Vec<Carrier> {
        vec![self.carrier]
    }

    fn initialize(&mut self, _size: Option<f64>) {}

    fn advance(&mut self, context: &ComponentContext) -> Result<Advance, InfeasibleStateError> {
        Ok(Advance::flows(CarrierFlows::single(
            self.carrier,
            self.demand_kw(context.exogenous),
        )))
    }

    fn linear_model(&self, window: &[ForecastStep]) -> LinearModel {
        LinearModel::Fixed {
            flows: window
                .iter()
                .map(|f| CarrierFlows::single(self.carrier, -self.demand_kw(&f.exogenous)))
                .collect(),
        }
    }
}
