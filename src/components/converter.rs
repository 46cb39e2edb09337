use crate::components::curves::{chiller_cop, heat_pump_cop};
use crate::components::types::{
    Advance, BoundPolicy, Carrier, CarrierFlows, Component, ComponentContext, ComponentKind,
    ConverterModel, LinearModel, Setpoint,
};
use crate::error::InfeasibleStateError;
use crate::feed::{Exogenous, ForecastStep};

const BOUND_TOLERANCE: f64 = 1e-6;

/// Conversion factor from input to one output carrier.
#[derive(Debug, Clone, PartialEq)]
pub enum Efficiency {
    Constant(f64),
    /// Air-source heat pump COP from ambient temperature.
    HeatPump {
        supply_c: f64,
        carnot_fraction: f64,
        max_cop: f64,
    },
    /// Compression chiller EER from ambient temperature.
    Chiller {
        supply_c: f64,
        carnot_fraction: f64,
        max_cop: f64,
    },
}

impl Efficiency {
    pub fn at(&self, exogenous: &Exogenous) -> f64 {
        match self {
            Efficiency::Constant(eta) => *eta,
            Efficiency::HeatPump {
                supply_c,
                carnot_fraction,
                max_cop,
            } => heat_pump_cop(exogenous.temperature_c, *supply_c, *carnot_fraction, *max_cop),
            Efficiency::Chiller {
                supply_c,
                carnot_fraction,
                max_cop,
            } => chiller_cop(exogenous.temperature_c, *supply_c, *carnot_fraction, *max_cop),
        }
    }
}

/// Which flow the nominal capacity is rated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingBasis {
    Input,
    PrimaryOutput,
}

/// A converter from one carrier to one or more others: heat pump, chiller,
/// electrolyzer or fuel cell.
///
/// The first output is the primary product. Every output is curtailable
/// (heat can be dumped, hydrogen vented).
///
/// # Power Flow Convention (Bus)
/// The input carrier sees a **negative** flow, outputs **positive** flows.
#[derive(Debug, Clone)]
pub struct Converter {
    id: String,
    input: Carrier,
    outputs: Vec<(Carrier, Efficiency)>,
    basis: RatingBasis,

    /// Nominal capacity in kW on the rating basis. This is the sizeable capacity.
    pub nominal_kw: f64,

    /// Minimum part load as a fraction of maximum input. Zero disables on/off logic.
    pub min_load: f64,

    /// Maximum input change per step as a fraction of the nominal capacity.
    pub ramp_fraction: Option<f64>,

    pub policy: BoundPolicy,

    previous_input_kw: f64,
}

impl Converter {
    /// Creates a converter.
    ///
    /// # Panics
    ///
    /// Panics if there are no outputs, the capacity is negative, or a constant
    /// efficiency is not positive.
    pub fn new(
        id: impl Into<String>,
        input: Carrier,
        outputs: Vec<(Carrier, Efficiency)>,
        basis: RatingBasis,
        nominal_kw: f64,
    ) -> Self {
        assert!(!outputs.is_empty());
        assert!(nominal_kw >= 0.0);
        assert!(
            outputs
                .iter()
                .all(|(_, e)| !matches!(e, Efficiency::Constant(v) if *v <= 0.0))
        );
        Self {
            id: id.into(),
            input,
            outputs,
            basis,
            nominal_kw,
            min_load: 0.0,
            ramp_fraction: None,
            policy: BoundPolicy::Clamp,
            previous_input_kw: 0.0,
        }
    }

    /// Heat pump rated on thermal output.
    pub fn heat_pump(nominal_kw_th: f64, supply_c: f64, carnot_fraction: f64, max_cop: f64) -> Self {
        Self::new(
            super::ids::HEAT_PUMP,
            Carrier::Electricity,
            vec![(
                Carrier::Heat,
                Efficiency::HeatPump {
                    supply_c,
                    carnot_fraction,
                    max_cop,
                },
            )],
            RatingBasis::PrimaryOutput,
            nominal_kw_th,
        )
    }

    /// Compression chiller rated on cooling output.
    pub fn chiller(nominal_kw_cold: f64, supply_c: f64, carnot_fraction: f64, max_cop: f64) -> Self {
        Self::new(
            super::ids::CHILLER,
            Carrier::Electricity,
            vec![(
                Carrier::Cold,
                Efficiency::Chiller {
                    supply_c,
                    carnot_fraction,
                    max_cop,
                },
            )],
            RatingBasis::PrimaryOutput,
            nominal_kw_cold,
        )
    }

    /// Electrolyzer rated on electrical input, with optional waste heat recovery.
    pub fn electrolyzer(nominal_kw_el: f64, hydrogen_efficiency: f64, heat_efficiency: f64) -> Self {
        let mut outputs = vec![(Carrier::Hydrogen, Efficiency::Constant(hydrogen_efficiency))];
        if heat_efficiency > 0.0 {
            outputs.push((Carrier::Heat, Efficiency::Constant(heat_efficiency)));
        }
        Self::new(
            super::ids::ELECTROLYZER,
            Carrier::Electricity,
            outputs,
            RatingBasis::Input,
            nominal_kw_el,
        )
    }

    /// Fuel cell rated on electrical output, with optional heat recovery.
    pub fn fuel_cell(nominal_kw_el: f64, electric_efficiency: f64, heat_efficiency: f64) -> Self {
        let mut outputs = vec![(Carrier::Electricity, Efficiency::Constant(electric_efficiency))];
        if heat_efficiency > 0.0 {
            outputs.push((Carrier::Heat, Efficiency::Constant(heat_efficiency)));
        }
        Self::new(
            super::ids::FUEL_CELL,
            Carrier::Hydrogen,
            outputs,
            RatingBasis::PrimaryOutput,
            nominal_kw_el,
        )
    }

    pub fn with_min_load(mut self, fraction: f64) -> Self {
        assert!((0.0..1.0).contains(&fraction));
        self.min_load = fraction;
        self
    }

    pub fn with_ramp(mut self, fraction_per_step: f64) -> Self {
        assert!(fraction_per_step > 0.0);
        self.ramp_fraction = Some(fraction_per_step);
        self
    }

    pub fn with_policy(mut self, policy: BoundPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn input(&self) -> Carrier {
        self.input
    }

    /// Output carrier and conversion factor for the given conditions.
    pub fn efficiencies(&self, exogenous: &Exogenous) -> Vec<(Carrier, f64)> {
        self.outputs.iter().map(|(c, e)| (*c, e.at(exogenous))).collect()
    }

    /// Maximum input power in kW for the given conditions.
    pub fn max_input_kw(&self, exogenous: &Exogenous) -> f64 {
        match self.basis {
            RatingBasis::Input => self.nominal_kw,
            RatingBasis::PrimaryOutput => {
                let eta = self.outputs[0].1.at(exogenous);
                if eta > 0.0 { self.nominal_kw / eta } else { 0.0 }
            }
        }
    }

    fn ramp_kw(&self) -> Option<f64> {
        self.ramp_fraction.map(|r| r * self.nominal_kw)
    }

    fn violation(&self, step: usize, detail: String) -> InfeasibleStateError {
        InfeasibleStateError::new(&self.id, step, detail)
    }

    /// Brings a requested input into the operating envelope: power limit,
    /// then ramp, then minimum part load.
    fn admissible_input(
        &self,
        step: usize,
        requested: f64,
        max_input: f64,
    ) -> Result<f64, InfeasibleStateError> {
        let abort = self.policy == BoundPolicy::Abort;
        let tol = BOUND_TOLERANCE * max_input.max(1.0);
        let mut input = requested.max(0.0);

        if input > max_input + tol {
            if abort {
                return Err(self.violation(
                    step,
                    format!("input {input:.6} kW exceeds maximum {max_input:.6} kW"),
                ));
            }
            input = max_input;
        }

        if let Some(ramp) = self.ramp_kw() {
            let low = (self.previous_input_kw - ramp).max(0.0);
            let high = self.previous_input_kw + ramp;
            if input < low - tol || input > high + tol {
                if abort {
                    return Err(self.violation(
                        step,
                        format!(
                            "input change {:.6} kW exceeds ramp {ramp:.6} kW",
                            input - self.previous_input_kw
                        ),
                    ));
                }
                input = input.clamp(low, high);
            }
        }

        let min_input = self.min_load * max_input;
        if input > 0.0 && input < min_input - tol {
            if abort {
                return Err(self.violation(
                    step,
                    format!("input {input:.6} kW below minimum part load {min_input:.6} kW"),
                ));
            }
            input = if input >= 0.5 * min_input { min_input } else { 0.0 };
        }

        Ok(input.min(max_input))
    }
}

impl Component for Converter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Conversion
    }

    fn carriers(&self) -> Vec<Carrier> {
        let mut carriers = vec![self.input];
        carriers.extend(self.outputs.iter().map(|(c, _)| *c));
        carriers.sort();
        carriers.dedup();
        carriers
    }

    fn controllable(&self) -> bool {
        true
    }

    fn size(&self) -> Option<f64> {
        Some(self.nominal_kw)
    }

    fn initialize(&mut self, size: Option<f64>) {
        if let Some(kw) = size {
            self.nominal_kw = kw.max(0.0);
        }
        self.previous_input_kw = 0.0;
    }

    fn advance(&mut self, context: &ComponentContext) -> Result<Advance, InfeasibleStateError> {
        let step = context.step.index;
        let requested = match context.setpoint {
            None => 0.0,
            Some(Setpoint::Converter { input_kw, on }) => {
                if on {
                    input_kw
                } else {
                    0.0
                }
            }
            Some(other) => {
                return Err(self.violation(step, format!("converter cannot apply {other:?}")));
            }
        };

        let max_input = self.max_input_kw(context.exogenous);
        let input = self.admissible_input(step, requested, max_input)?;
        self.previous_input_kw = input;

        let mut flows = CarrierFlows::single(self.input, -input);
        let mut curtailable = CarrierFlows::zero();
        for (carrier, eta) in self.efficiencies(context.exogenous) {
            flows.add(carrier, input * eta);
            curtailable.add(carrier, input * eta);
        }

        Ok(Advance {
            flows,
            curtailable,
            state: None,
        })
    }

    fn linear_model(&self, window: &[ForecastStep]) -> LinearModel {
        let max_input_kw: Vec<f64> = window
            .iter()
            .map(|f| self.max_input_kw(&f.exogenous))
            .collect();
        let outputs = self
            .outputs
            .iter()
            .map(|(carrier, eta)| (*carrier, window.iter().map(|f| eta.at(&f.exogenous)).collect()))
            .collect();
        LinearModel::Converter(ConverterModel {
            input: self.input,
            outputs,
            max_input_kw,
            min_load: self.min_load,
            ramp_kw: self.ramp_kw(),
            previous_input_kw: self.previous_input_kw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::clock::Timebase;

    fn run(c: &mut Converter, setpoint: Setpoint, exo: &Exogenous) -> Result<Advance, InfeasibleStateError> {
        let timebase = Timebase::hourly(1);
        let step = timebase.step(0);
        c.advance(&ComponentContext::new(&step, exo).with_setpoint(Some(setpoint)))
    }

    fn on(input_kw: f64) -> Setpoint {
        Setpoint::Converter { input_kw, on: true }
    }

    #[test]
    fn electrolyzer_splits_input_into_products() {
        let mut e = Converter::electrolyzer(10.0, 0.6, 0.2);
        let adv = run(&mut e, on(5.0), &Exogenous::default()).unwrap();
        assert_eq!(adv.flows.get(Carrier::Electricity), -5.0);
        assert!((adv.flows.get(Carrier::Hydrogen) - 3.0).abs() < 1e-12);
        assert!((adv.flows.get(Carrier::Heat) - 1.0).abs() < 1e-12);
        assert_eq!(adv.curtailable.get(Carrier::Electricity), 0.0);
    }

    #[test]
    fn off_setpoint_means_zero_input() {
        let mut e = Converter::electrolyzer(10.0, 0.6, 0.0);
        let adv = run(&mut e, Setpoint::Converter { input_kw: 5.0, on: false }, &Exogenous::default()).unwrap();
        assert_eq!(adv.flows, CarrierFlows::zero());
    }

    #[test]
    fn heat_pump_is_rated_on_heat_output() {
        let hp = Converter::heat_pump(6.0, 45.0, 0.45, 7.0);
        let exo = Exogenous {
            temperature_c: 5.0,
            ..Exogenous::default()
        };
        let cop = heat_pump_cop(5.0, 45.0, 0.45, 7.0);
        assert!((hp.max_input_kw(&exo) * cop - 6.0).abs() < 1e-9);
    }

    #[test]
    fn chiller_turns_electricity_into_cold() {
        let mut ch = Converter::chiller(8.0, 6.0, 0.4, 6.0);
        let exo = Exogenous {
            temperature_c: 32.0,
            ..Exogenous::default()
        };
        let eer = chiller_cop(32.0, 6.0, 0.4, 6.0);
        assert!((ch.max_input_kw(&exo) * eer - 8.0).abs() < 1e-9);
        assert_eq!(ch.carriers(), vec![Carrier::Electricity, Carrier::Cold]);

        let adv = run(&mut ch, on(1.0), &exo).unwrap();
        assert_eq!(adv.flows.get(Carrier::Electricity), -1.0);
        assert!((adv.flows.get(Carrier::Cold) - eer).abs() < 1e-12);
        assert_eq!(adv.flows.get(Carrier::Heat), 0.0);
    }

    #[test]
    fn clamp_policy_respects_min_load() {
        let mut fc = Converter::fuel_cell(2.0, 0.5, 0.0).with_min_load(0.4);
        // max input 4 kW of hydrogen, min load 1.6 kW
        let adv = run(&mut fc, on(1.0), &Exogenous::default()).unwrap();
        assert!((adv.flows.get(Carrier::Hydrogen) + 1.6).abs() < 1e-9);
        let adv = run(&mut fc, on(0.5), &Exogenous::default()).unwrap();
        assert_eq!(adv.flows.get(Carrier::Hydrogen), 0.0);
    }

    #[test]
    fn abort_policy_rejects_overload() {
        let mut e = Converter::electrolyzer(10.0, 0.6, 0.0).with_policy(BoundPolicy::Abort);
        let err = run(&mut e, on(12.0), &Exogenous::default()).unwrap_err();
        assert_eq!(err.component, "electrolyzer");
    }

    #[test]
    fn ramp_limits_input_change() {
        let mut e = Converter::electrolyzer(10.0, 0.6, 0.0).with_ramp(0.2);
        let adv = run(&mut e, on(10.0), &Exogenous::default()).unwrap();
        assert!((adv.flows.get(Carrier::Electricity) + 2.0).abs() < 1e-9);
        let adv = run(&mut e, on(10.0), &Exogenous::default()).unwrap();
        assert!((adv.flows.get(Carrier::Electricity) + 4.0).abs() < 1e-9);
    }

    #[test]
    fn storage_setpoint_is_rejected() {
        let mut e = Converter::electrolyzer(10.0, 0.6, 0.0);
        assert!(run(&mut e, Setpoint::Storage { power_kw: 1.0 }, &Exogenous::default()).is_err());
    }

    #[test]
    #[should_panic]
    fn zero_efficiency_panics() {
        Converter::electrolyzer(10.0, 0.0, 0.0);
    }
}
