use crate::components::curves::{inverter_efficiency, pv_cell_temperature, pv_temperature_derate};
use crate::components::types::{
    Advance, Carrier, CarrierFlows, Component, ComponentContext, ComponentKind, LinearModel,
};
use crate::error::InfeasibleStateError;
use crate::feed::{Exogenous, ForecastStep};

/// DC/AC conversion stage behind a PV array.
///
/// Rated AC power follows the array: `sizing_ratio` times its DC peak at
/// standard test conditions. DC power above the rating is clipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inverter {
    pub sizing_ratio: f64,
    pub nominal_efficiency: f64,
    pub voltage_loss: f64,
    pub resistance_loss: f64,
    pub self_consumption: f64,
}

impl Default for Inverter {
    fn default() -> Self {
        Self {
            sizing_ratio: 1.0,
            nominal_efficiency: 0.951,
            voltage_loss: 0.009737,
            resistance_loss: 0.031432,
            self_consumption: 0.002671,
        }
    }
}

impl Inverter {
    /// AC output in kW for `dc_kw` of input at the given rating.
    pub fn ac_output_kw(&self, dc_kw: f64, rated_kw: f64) -> f64 {
        if rated_kw <= 0.0 || dc_kw <= 0.0 {
            return 0.0;
        }
        let load = (dc_kw / rated_kw).min(1.0);
        let efficiency = inverter_efficiency(
            load,
            self.nominal_efficiency,
            self.voltage_loss,
            self.resistance_loss,
            self.self_consumption,
        );
        load * efficiency * rated_kw
    }
}

/// A photovoltaic array driven by plane-of-array irradiance and ambient
/// temperature.
///
/// DC output is `area * efficiency * irradiance / 1000`, derated linearly
/// with cell temperature above 25 °C. An optional [`Inverter`] turns it into
/// AC. The whole output is curtailable.
///
/// # Power Flow Convention (Bus)
/// Returns **positive** electricity (supply into the bus).
#[derive(Debug, Clone)]
pub struct PvArray {
    id: String,

    /// Module area in m². This is the sizeable capacity.
    pub area_m2: f64,

    /// Module efficiency at standard test conditions (0..1.0).
    pub efficiency: f64,

    /// Relative power change per kelvin of cell temperature, usually negative.
    pub temperature_coefficient: f64,

    /// Nominal operating cell temperature in °C.
    pub noct_c: f64,

    pub inverter: Option<Inverter>,
}

impl PvArray {
    /// Creates a new PV array.
    ///
    /// # Arguments
    ///
    /// * `id` - Component identifier
    /// * `area_m2` - Module area in m² (must be >= 0)
    /// * `efficiency` - Module efficiency (0..1.0)
    /// * `temperature_coefficient` - Power change per kelvin above 25 °C
    /// * `noct_c` - Nominal operating cell temperature in °C
    ///
    /// # Panics
    ///
    /// Panics if the area is negative or the efficiency is out of range.
    pub fn new(
        id: impl Into<String>,
        area_m2: f64,
        efficiency: f64,
        temperature_coefficient: f64,
        noct_c: f64,
    ) -> Self {
        assert!(area_m2 >= 0.0);
        assert!(efficiency > 0.0 && efficiency <= 1.0);
        Self {
            id: id.into(),
            area_m2,
            efficiency,
            temperature_coefficient,
            noct_c,
            inverter: None,
        }
    }

    pub fn with_inverter(mut self, inverter: Inverter) -> Self {
        self.inverter = Some(inverter);
        self
    }

    /// DC peak at 1000 W/m² and 25 °C cell temperature, in kW.
    pub fn peak_kw(&self) -> f64 {
        self.area_m2 * self.efficiency
    }

    /// Available output in kW at the bus: AC behind the inverter when one is
    /// fitted, DC otherwise.
    pub fn output_kw(&self, exogenous: &Exogenous) -> f64 {
        let dc = self.dc_output_kw(exogenous);
        match &self.inverter {
            Some(inverter) => inverter.ac_output_kw(dc, inverter.sizing_ratio * self.peak_kw()),
            None => dc,
        }
    }

    /// Available DC output in kW for the given conditions.
    pub fn dc_output_kw(&self, exogenous: &Exogenous) -> f64 {
        let irradiance = exogenous.irradiance_w_m2.max(0.0);
        if irradiance == 0.0 || self.area_m2 == 0.0 {
            return 0.0;
        }
        let cell_c = pv_cell_temperature(exogenous.temperature_c, irradiance, self.noct_c);
        let derate = pv_temperature_derate(cell_c, self.temperature_coefficient);
        (self.area_m2 * self.efficiency * irradiance / 1000.0 * derate).max(0.0)
    }
}

impl Component for PvArray {
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
        Some(self.area_m2)
    }

    fn initialize(&mut self, size: Option<f64>) {
        if let Some(area) = size {
            self.area_m2 = area.max(0.0);
        }
    }

    fn advance(&mut self, context: &ComponentContext) -> Result<Advance, InfeasibleStateError> {
        let kw = self.output_kw(context.exogenous);
        let flows = CarrierFlows::single(Carrier::Electricity, kw);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::clock::Timebase;

    fn exo(irradiance: f64, temperature: f64) -> Exogenous {
        Exogenous {
            irradiance_w_m2: irradiance,
            temperature_c: temperature,
            ..Exogenous::default()
        }
    }

    #[test]
    fn output_scales_with_area_and_irradiance() {
        let pv = PvArray::new("pv", 10.0, 0.2, 0.0, 45.0);
        assert!((pv.output_kw(&exo(1000.0, 25.0)) - 2.0).abs() < 1e-12);
        assert!((pv.output_kw(&exo(500.0, 25.0)) - 1.0).abs() < 1e-12);
        assert_eq!(pv.output_kw(&exo(0.0, 25.0)), 0.0);
        assert_eq!(pv.output_kw(&exo(-10.0, 25.0)), 0.0);
    }

    #[test]
    fn hot_cells_produce_less() {
        let pv = PvArray::new("pv", 10.0, 0.2, -0.004, 45.0);
        assert!(pv.output_kw(&exo(1000.0, 35.0)) < pv.output_kw(&exo(1000.0, 0.0)));
    }

    #[test]
    fn advance_reports_curtailable_supply() {
        let mut pv = PvArray::new("pv", 10.0, 0.2, 0.0, 45.0);
        let timebase = Timebase::hourly(1);
        let step = timebase.step(0);
        let e = exo(800.0, 20.0);
        let adv = pv.advance(&ComponentContext::new(&step, &e)).unwrap();
        assert!((adv.flows.get(Carrier::Electricity) - 1.6).abs() < 1e-12);
        assert_eq!(adv.curtailable, adv.flows);
        assert!(adv.state.is_none());
    }

    #[test]
    fn initialize_resizes_area() {
        let mut pv = PvArray::new("pv", 10.0, 0.2, 0.0, 45.0);
        pv.initialize(Some(25.0));
        assert_eq!(pv.size(), Some(25.0));
        pv.initialize(None);
        assert_eq!(pv.size(), Some(25.0));
    }

    #[test]
    #[should_panic]
    fn zero_efficiency_panics() {
        PvArray::new("pv", 10.0, 0.0, 0.0, 45.0);
    }

    #[test]
    fn inverter_loses_power_and_clips_at_rating() {
        let pv = PvArray::new("pv", 10.0, 0.2, 0.0, 45.0).with_inverter(Inverter {
            sizing_ratio: 0.8,
            ..Inverter::default()
        });
        // 2 kW DC peak, 1.6 kW AC rating
        let full = exo(1000.0, 25.0);
        assert!((pv.dc_output_kw(&full) - 2.0).abs() < 1e-12);
        let ac = pv.output_kw(&full);
        assert!(ac < 1.6 && ac > 1.5);
        let half = exo(500.0, 25.0);
        assert!(pv.output_kw(&half) < pv.dc_output_kw(&half));
        assert_eq!(pv.output_kw(&exo(0.0, 25.0)), 0.0);
    }

    #[test]
    fn model_and_advance_agree_behind_inverter() {
        let mut pv = PvArray::new("pv", 10.0, 0.2, -0.004, 45.0).with_inverter(Inverter::default());
        let timebase = Timebase::hourly(1);
        let step = timebase.step(0);
        let e = exo(650.0, 18.0);
        let adv = pv.advance(&ComponentContext::new(&step, &e)).unwrap();
        let window = [ForecastStep { step, exogenous: e }];
        match pv.linear_model(&window) {
            LinearModel::Fixed { flows } => assert_eq!(flows[0], adv.flows),
            other => panic!("unexpected model {other:?}"),
        }
    }
}
