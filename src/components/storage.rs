use crate::components::types::{
    Advance, BoundPolicy, Carrier, CarrierFlows, Component, ComponentContext, ComponentKind,
    LinearModel, Setpoint, StateDelta, StorageModel,
};
use crate::error::InfeasibleStateError;
use crate::feed::ForecastStep;

/// Relative slack before a setpoint counts as out of bounds.
const BOUND_TOLERANCE: f64 = 1e-6;

const HOURS_PER_YEAR: f64 = 8760.0;

/// Calendar and cycle degradation of a battery.
///
/// Capacity fades from nominal towards `end_of_life * nominal`. The state of
/// destruction (SoD) is the faded share of that span; at 1 the battery is
/// replaced and starts over at nominal capacity.
///
/// Cycle aging counts micro-cycles: a cycle runs while the store charges or
/// discharges and closes at the first idle step. Its equivalent full cycles
/// are weighed against the Wöhler curve `cycle_life * dod^-dod_exponent` at
/// the cycle's mean depth of discharge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aging {
    /// Remaining capacity fraction at which the battery is worn out.
    pub end_of_life: f64,
    /// Years until end of life from calendar aging alone.
    pub float_life_years: f64,
    /// Full cycles to end of life at 100 % depth of discharge.
    pub cycle_life: f64,
    pub dod_exponent: f64,
}

impl Default for Aging {
    fn default() -> Self {
        Self {
            end_of_life: 0.8,
            float_life_years: 15.0,
            cycle_life: 3000.0,
            dod_exponent: 1.1,
        }
    }
}

impl Aging {
    /// Cycles to end of life at the given depth of discharge.
    pub fn cycles_to_failure(&self, dod: f64) -> f64 {
        self.cycle_life * dod.clamp(1e-3, 1.0).powf(-self.dod_exponent)
    }
}

/// Open micro-cycle accumulators.
#[derive(Debug, Clone, Copy, Default)]
struct MicroCycle {
    throughput_kwh: f64,
    dod_sum: f64,
    steps: usize,
}

#[derive(Debug, Clone, Default)]
struct Wear {
    fade_kwh: f64,
    cycle: MicroCycle,
    replacements: Vec<usize>,
}

/// An energy store for a single carrier: battery, hot water tank or
/// hydrogen tank.
///
/// `Storage` keeps its stored energy in kWh and enforces power limits
/// (C-rates), state-of-charge bounds, round-trip efficiency and a standing
/// loss when given power setpoints.
///
/// # Power Flow Convention (Bus)
/// - Positive setpoint: charging, the bus sees a **negative** flow
/// - Negative setpoint: discharging, the bus sees a **positive** flow
#[derive(Debug, Clone)]
pub struct Storage {
    id: String,
    carrier: Carrier,

    /// Energy capacity in kWh. This is the sizeable capacity.
    pub capacity_kwh: f64,

    /// State of charge bounds as fractions of capacity.
    pub soc_min: f64,
    pub soc_max: f64,

    /// State of charge restored by `initialize`.
    pub initial_soc: f64,

    /// Maximum charge and discharge power per kWh of capacity.
    pub c_rate_charge: f64,
    pub c_rate_discharge: f64,

    /// Charging efficiency (0..1.0).
    pub eta_c: f64,

    /// Discharging efficiency (0..1.0).
    pub eta_d: f64,

    /// Fraction of usable energy lost per hour.
    pub standing_loss: f64,

    pub policy: BoundPolicy,

    pub aging: Option<Aging>,

    level_kwh: f64,
    wear: Wear,
}

impl Storage {
    /// Creates a new storage unit at its initial state of charge.
    ///
    /// # Arguments
    ///
    /// * `id` - Component identifier
    /// * `carrier` - Carrier stored
    /// * `capacity_kwh` - Energy capacity in kWh (must be >= 0)
    /// * `soc_bounds` - `(min, max)` state of charge fractions
    /// * `initial_soc` - Initial state of charge, within the bounds
    /// * `c_rates` - `(charge, discharge)` power per kWh of capacity
    /// * `efficiencies` - `(eta_c, eta_d)`, each in (0, 1]
    ///
    /// # Panics
    ///
    /// Panics if capacity is negative, SOC bounds or initial SOC are out of
    /// range, or efficiencies are invalid.
    pub fn new(
        id: impl Into<String>,
        carrier: Carrier,
        capacity_kwh: f64,
        soc_bounds: (f64, f64),
        initial_soc: f64,
        c_rates: (f64, f64),
        efficiencies: (f64, f64),
    ) -> Self {
        let (soc_min, soc_max) = soc_bounds;
        let (eta_c, eta_d) = efficiencies;
        assert!(capacity_kwh >= 0.0);
        assert!(0.0 <= soc_min && soc_min <= soc_max && soc_max <= 1.0);
        assert!((soc_min..=soc_max).contains(&initial_soc));
        assert!(c_rates.0 >= 0.0 && c_rates.1 >= 0.0);
        assert!(eta_c > 0.0 && eta_c <= 1.0);
        assert!(eta_d > 0.0 && eta_d <= 1.0);

        Self {
            id: id.into(),
            carrier,
            capacity_kwh,
            soc_min,
            soc_max,
            initial_soc,
            c_rate_charge: c_rates.0,
            c_rate_discharge: c_rates.1,
            eta_c,
            eta_d,
            standing_loss: 0.0,
            policy: BoundPolicy::Clamp,
            aging: None,
            level_kwh: initial_soc * capacity_kwh,
            wear: Wear::default(),
        }
    }

    /// # Panics
    ///
    /// Panics if the end-of-life fraction is outside (0, 1) or a life is not positive.
    pub fn with_aging(mut self, aging: Aging) -> Self {
        assert!(aging.end_of_life > 0.0 && aging.end_of_life < 1.0);
        assert!(aging.float_life_years > 0.0 && aging.cycle_life > 0.0);
        assert!(aging.dod_exponent >= 0.0);
        self.aging = Some(aging);
        self
    }

    pub fn with_standing_loss(mut self, fraction_per_hour: f64) -> Self {
        assert!((0.0..1.0).contains(&fraction_per_hour));
        self.standing_loss = fraction_per_hour;
        self
    }

    pub fn with_policy(mut self, policy: BoundPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn carrier(&self) -> Carrier {
        self.carrier
    }

    /// State of charge as a fraction of capacity; zero for an empty store.
    pub fn soc(&self) -> f64 {
        if self.capacity_kwh > 0.0 {
            self.level_kwh / self.capacity_kwh
        } else {
            0.0
        }
    }

    /// Capacity left after degradation. Equals `capacity_kwh` without aging.
    pub fn usable_capacity_kwh(&self) -> f64 {
        (self.capacity_kwh - self.wear.fade_kwh).max(0.0)
    }

    /// Faded share of the span between nominal and end-of-life capacity.
    pub fn state_of_destruction(&self) -> f64 {
        match self.aging {
            Some(aging) if self.capacity_kwh > 0.0 => {
                self.wear.fade_kwh / ((1.0 - aging.end_of_life) * self.capacity_kwh)
            }
            _ => 0.0,
        }
    }

    /// Steps at which the worn-out battery was replaced.
    pub fn replacements(&self) -> &[usize] {
        &self.wear.replacements
    }

    pub fn model(&self) -> StorageModel {
        let capacity = self.usable_capacity_kwh();
        StorageModel {
            carrier: self.carrier,
            level: self.level_kwh,
            min_level: self.soc_min * capacity,
            max_level: self.soc_max * capacity,
            max_charge_kw: self.c_rate_charge * self.capacity_kwh,
            max_discharge_kw: self.c_rate_discharge * self.capacity_kwh,
            charge_efficiency: self.eta_c,
            discharge_efficiency: self.eta_d,
            standing_loss: self.standing_loss,
        }
    }

    fn out_of_bounds(
        &self,
        step: usize,
        requested: f64,
        limit: f64,
        verb: &str,
    ) -> Result<f64, InfeasibleStateError> {
        if requested <= limit + BOUND_TOLERANCE * limit.abs().max(1.0) {
            return Ok(requested.min(limit));
        }
        match self.policy {
            BoundPolicy::Clamp => Ok(limit),
            BoundPolicy::Abort => Err(InfeasibleStateError::new(
                &self.id,
                step,
                format!("{verb} {requested:.6} kW exceeds limit {limit:.6} kW"),
            )),
        }
    }

    /// Updates capacity fade after one step with the given exchange.
    fn age(&mut self, aging: Aging, step: usize, hours: f64, throughput_kwh: f64, level_kwh: f64) {
        let span = (1.0 - aging.end_of_life) * self.capacity_kwh;
        if span <= 0.0 {
            return;
        }
        self.wear.fade_kwh += span * hours / (aging.float_life_years * HOURS_PER_YEAR);

        if throughput_kwh > BOUND_TOLERANCE {
            let capacity = self.usable_capacity_kwh();
            let soc = if capacity > 0.0 { level_kwh / capacity } else { 0.0 };
            let cycle = &mut self.wear.cycle;
            cycle.throughput_kwh += throughput_kwh;
            cycle.dod_sum += (1.0 - soc).clamp(0.0, 1.0);
            cycle.steps += 1;
        } else {
            self.close_cycle(aging);
        }

        if self.wear.fade_kwh >= span {
            self.wear.replacements.push(step);
            self.wear.fade_kwh = 0.0;
        }
    }

    fn close_cycle(&mut self, aging: Aging) {
        let cycle = std::mem::take(&mut self.wear.cycle);
        if cycle.steps == 0 || self.capacity_kwh <= 0.0 {
            return;
        }
        let dod = (cycle.dod_sum / cycle.steps as f64).clamp(1e-3, 1.0);
        let equivalent_cycles = cycle.throughput_kwh / (2.0 * self.capacity_kwh * dod);
        let span = (1.0 - aging.end_of_life) * self.capacity_kwh;
        self.wear.fade_kwh += equivalent_cycles / aging.cycles_to_failure(dod) * span;
    }
}

impl Component for Storage {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Storage
    }

    fn carriers(&self) -> Vec<Carrier> {
        vec![self.carrier]
    }

    fn controllable(&self) -> bool {
        true
    }

    fn size(&self) -> Option<f64> {
        Some(self.capacity_kwh)
    }

    fn initialize(&mut self, size: Option<f64>) {
        if let Some(capacity) = size {
            self.capacity_kwh = capacity.max(0.0);
        }
        self.level_kwh = self.initial_soc * self.capacity_kwh;
        self.wear = Wear::default();
    }

    /// Applies a storage setpoint for one step.
    ///
    /// A missing setpoint leaves the store idle. Requests beyond the power
    /// limit or the energy headroom are clamped or rejected per `policy`.
    fn advance(&mut self, context: &ComponentContext) -> Result<Advance, InfeasibleStateError> {
        let step = context.step.index;
        let hours = context.step.duration_hours;
        let power_kw = match context.setpoint {
            None => 0.0,
            Some(Setpoint::Storage { power_kw }) => power_kw,
            Some(other) => {
                return Err(InfeasibleStateError::new(
                    &self.id,
                    step,
                    format!("storage cannot apply {other:?}"),
                ));
            }
        };

        let model = self.model();
        let before = self.level_kwh;
        let (charge_kw, discharge_kw) = if power_kw > 0.0 {
            let limit = model.charge_limit(before, hours);
            (self.out_of_bounds(step, power_kw, limit, "charge")?, 0.0)
        } else if power_kw < 0.0 {
            let limit = model.discharge_limit(before, hours);
            (0.0, self.out_of_bounds(step, -power_kw, limit, "discharge")?)
        } else {
            (0.0, 0.0)
        };

        let mut after = model
            .next_level(before, charge_kw, discharge_kw, hours)
            .clamp(model.min_level.min(before), model.max_level.max(before));
        if let Some(aging) = self.aging {
            self.age(aging, step, hours, (charge_kw + discharge_kw) * hours, after);
            // faded capacity takes its share of the stored energy with it
            let aged = self.model();
            after = after.min(aged.max_level.max(aged.min_level.min(before)));
        }
        self.level_kwh = after;

        Ok(Advance {
            flows: CarrierFlows::single(self.carrier, discharge_kw - charge_kw),
            curtailable: CarrierFlows::zero(),
            state: Some(StateDelta { before, after }),
        })
    }

    fn linear_model(&self, _window: &[ForecastStep]) -> LinearModel {
        LinearModel::Storage(self.model())
    }

    fn level(&self) -> Option<f64> {
        Some(self.level_kwh)
    }

    fn finalize(&mut self) {
        if let Some(aging) = self.aging {
            self.close_cycle(aging);
        }
    }

    fn wear(&self) -> Option<f64> {
        self.aging
            .map(|_| self.wear.replacements.len() as f64 + self.state_of_destruction())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Exogenous;
    use crate::sim::clock::Timebase;

    fn battery(capacity: f64, soc: f64) -> Storage {
        Storage::new(
            "battery",
            Carrier::Electricity,
            capacity,
            (0.0, 1.0),
            soc,
            (0.5, 0.5),
            (0.9, 0.9),
        )
    }

    fn apply(storage: &mut Storage, power_kw: f64) -> Result<Advance, InfeasibleStateError> {
        let timebase = Timebase::hourly(1);
        let step = timebase.step(0);
        let exo = Exogenous::default();
        let ctx = ComponentContext::new(&step, &exo)
            .with_setpoint(Some(Setpoint::Storage { power_kw }));
        storage.advance(&ctx)
    }

    #[test]
    fn charge_raises_level_with_losses() {
        let mut b = battery(10.0, 0.5);
        let adv = apply(&mut b, 2.0).unwrap();
        assert_eq!(adv.flows.get(Carrier::Electricity), -2.0);
        // 5 + 2 * 0.9
        assert!((b.level().unwrap() - 6.8).abs() < 1e-9);
        let delta = adv.state.unwrap();
        assert_eq!(delta.before, 5.0);
        assert!((delta.after - 6.8).abs() < 1e-9);
    }

    #[test]
    fn discharge_lowers_level_with_losses() {
        let mut b = battery(10.0, 0.5);
        let adv = apply(&mut b, -1.8).unwrap();
        assert_eq!(adv.flows.get(Carrier::Electricity), 1.8);
        // 5 - 1.8 / 0.9
        assert!((b.level().unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn clamp_policy_limits_to_c_rate() {
        let mut b = battery(10.0, 0.5);
        let adv = apply(&mut b, 20.0).unwrap();
        assert!((adv.flows.get(Carrier::Electricity) + 5.0).abs() < 1e-9);
    }

    #[test]
    fn clamp_policy_limits_to_headroom() {
        let mut b = battery(10.0, 0.95);
        let adv = apply(&mut b, 5.0).unwrap();
        // 0.5 kWh of headroom at 0.9 efficiency
        assert!((adv.flows.get(Carrier::Electricity) + 0.5 / 0.9).abs() < 1e-9);
        assert!((b.soc() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn abort_policy_rejects_overdraw() {
        let mut b = battery(10.0, 0.1).with_policy(BoundPolicy::Abort);
        let err = apply(&mut b, -5.0).unwrap_err();
        assert_eq!(err.component, "battery");
        assert_eq!(err.step, 0);
        assert_eq!(b.level(), Some(1.0));
    }

    #[test]
    fn converter_setpoint_is_rejected() {
        let mut b = battery(10.0, 0.5);
        let timebase = Timebase::hourly(1);
        let step = timebase.step(0);
        let exo = Exogenous::default();
        let ctx = ComponentContext::new(&step, &exo).with_setpoint(Some(Setpoint::Converter {
            input_kw: 1.0,
            on: true,
        }));
        assert!(b.advance(&ctx).is_err());
    }

    #[test]
    fn soc_stays_within_bounds_under_random_setpoints() {
        use rand::{Rng, SeedableRng, rngs::StdRng};
        let mut rng = StdRng::seed_from_u64(3);
        let mut b = Storage::new(
            "battery",
            Carrier::Electricity,
            5.0,
            (0.2, 0.9),
            0.5,
            (1.0, 1.0),
            (0.95, 0.95),
        )
        .with_standing_loss(0.01);
        for _ in 0..500 {
            let p = rng.random_range(-10.0..10.0);
            apply(&mut b, p).unwrap();
            let soc = b.soc();
            assert!((0.2 - 1e-9..=0.9 + 1e-9).contains(&soc), "soc {soc} out of bounds");
        }
    }

    #[test]
    fn initialize_resizes_and_resets() {
        let mut b = battery(10.0, 0.5);
        apply(&mut b, 2.0).unwrap();
        b.initialize(Some(4.0));
        assert_eq!(b.size(), Some(4.0));
        assert_eq!(b.level(), Some(2.0));
    }

    fn idle(storage: &mut Storage, steps: usize) {
        for _ in 0..steps {
            apply(storage, 0.0).unwrap();
        }
    }

    #[test]
    fn calendar_aging_fades_capacity_while_idle() {
        let aging = Aging {
            float_life_years: 1.0,
            ..Aging::default()
        };
        let mut b = battery(10.0, 0.5).with_aging(aging);
        idle(&mut b, 876);
        // a tenth of a year of a 2 kWh fade span
        assert!((b.usable_capacity_kwh() - 9.8).abs() < 1e-9);
        assert!((b.state_of_destruction() - 0.1).abs() < 1e-9);
        assert!((b.wear().unwrap() - 0.1).abs() < 1e-9);
        assert!(b.replacements().is_empty());
    }

    #[test]
    fn deep_cycles_wear_faster_than_shallow_ones() {
        let aging = Aging {
            float_life_years: 1e9,
            ..Aging::default()
        };
        let wear_after = |depth: usize| {
            let mut b = battery(10.0, 1.0).with_aging(aging);
            // same energy moved in shallow or deep swings
            for _ in 0..(8 / depth) {
                for _ in 0..depth {
                    apply(&mut b, -0.9).unwrap();
                }
                for _ in 0..depth {
                    apply(&mut b, 1.0).unwrap();
                }
                idle(&mut b, 1);
            }
            b.state_of_destruction()
        };
        let shallow = wear_after(1);
        let deep = wear_after(8);
        assert!(shallow > 0.0);
        assert!(deep > shallow, "deep {deep} <= shallow {shallow}");
    }

    #[test]
    fn open_cycle_is_counted_on_finalize() {
        let aging = Aging {
            float_life_years: 1e9,
            ..Aging::default()
        };
        let mut b = battery(10.0, 1.0).with_aging(aging);
        apply(&mut b, -2.0).unwrap();
        let before = b.state_of_destruction();
        b.finalize();
        assert!(b.state_of_destruction() > before);
    }

    #[test]
    fn worn_out_battery_is_replaced() {
        let aging = Aging {
            float_life_years: 0.01,
            ..Aging::default()
        };
        let mut b = battery(10.0, 0.5).with_aging(aging);
        // 87.6 hours to end of life
        idle(&mut b, 100);
        assert_eq!(b.replacements().len(), 1);
        assert!(b.state_of_destruction() < 0.2);
        assert!(b.wear().unwrap() > 1.0);
        assert!(b.usable_capacity_kwh() > 9.5);
    }

    #[test]
    fn level_never_exceeds_faded_capacity() {
        let aging = Aging {
            float_life_years: 0.05,
            ..Aging::default()
        };
        let mut b = battery(10.0, 1.0).with_aging(aging);
        for _ in 0..200 {
            apply(&mut b, 1.0).unwrap();
            assert!(b.level().unwrap() <= b.usable_capacity_kwh() + 1e-9);
        }
    }

    #[test]
    fn initialize_clears_wear() {
        let aging = Aging {
            float_life_years: 0.01,
            ..Aging::default()
        };
        let mut b = battery(10.0, 0.5).with_aging(aging);
        idle(&mut b, 100);
        b.initialize(None);
        assert_eq!(b.wear(), Some(0.0));
        assert!(b.replacements().is_empty());
        assert_eq!(b.usable_capacity_kwh(), 10.0);
    }

    #[test]
    fn storage_without_aging_reports_no_wear() {
        let mut b = battery(10.0, 0.5);
        apply(&mut b, 2.0).unwrap();
        assert_eq!(b.wear(), None);
        assert_eq!(b.usable_capacity_kwh(), 10.0);
    }

    #[test]
    #[should_panic]
    fn initial_soc_outside_bounds_panics() {
        Storage::new(
            "battery",
            Carrier::Electricity,
            10.0,
            (0.2, 0.8),
            0.1,
            (0.5, 0.5),
            (0.9, 0.9),
        );
    }
}
