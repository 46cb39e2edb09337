use crate::components::{Carrier, CarrierFlows, ConverterModel, LinearModel, Setpoint};
use crate::error::DispatchError;
use crate::feed::ForecastStep;

use super::{OperationOptimizer, StepDispatch, fixed_flows};

const EPS: f64 = 1e-9;

/// Priority-based dispatcher.
///
/// Per step it covers deficits from storage first and converters second
/// (heat and cold before electricity), then soaks up surpluses with storage and
/// storage-backed converters. Whatever is left is for the grid slack.
/// It never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedDispatcher;

/// Storage exchange being decided for one step.
struct Slot {
    index: usize,
    carrier: Carrier,
    power_kw: f64,
    charge_limit: f64,
    discharge_limit: f64,
}

struct StepPlan {
    slots: Vec<Slot>,
}

impl StepPlan {
    fn new(models: &[LinearModel], levels: &[f64], hours: f64) -> Self {
        let slots = models
            .iter()
            .enumerate()
            .filter_map(|(index, m)| match m {
                LinearModel::Storage(s) => Some(Slot {
                    index,
                    carrier: s.carrier,
                    power_kw: 0.0,
                    charge_limit: s.charge_limit(levels[index], hours),
                    discharge_limit: s.discharge_limit(levels[index], hours),
                }),
                _ => None,
            })
            .collect();
        Self { slots }
    }

    fn discharge(&mut self, carrier: Carrier, residual: &mut CarrierFlows) {
        for slot in self.slots.iter_mut().filter(|s| s.carrier == carrier) {
            let need = -residual[carrier];
            if need <= EPS {
                break;
            }
            let d = need.min(slot.power_kw + slot.discharge_limit).max(0.0);
            slot.power_kw -= d;
            residual[carrier] += d;
        }
    }

    fn charge(&mut self, carrier: Carrier, residual: &mut CarrierFlows) {
        for slot in self.slots.iter_mut().filter(|s| s.carrier == carrier) {
            let surplus = residual[carrier];
            if surplus <= EPS {
                break;
            }
            let c = surplus.min(slot.charge_limit - slot.power_kw).max(0.0);
            slot.power_kw += c;
            residual[carrier] -= c;
        }
    }

    fn discharge_room(&self, carrier: Carrier) -> f64 {
        self.slots
            .iter()
            .filter(|s| s.carrier == carrier)
            .map(|s| s.power_kw + s.discharge_limit)
            .sum()
    }

    fn charge_room(&self, carrier: Carrier) -> f64 {
        self.slots
            .iter()
            .filter(|s| s.carrier == carrier)
            .map(|s| s.charge_limit - s.power_kw)
            .sum()
    }
}

/// Nearest input to `wanted` inside the converter's envelope at step `t`.
fn admissible(model: &ConverterModel, t: usize, previous: f64, wanted: f64) -> f64 {
    let max = model.max_input_kw.get(t).copied().unwrap_or(0.0);
    let (low, high) = match model.ramp_kw {
        Some(r) => ((previous - r).max(0.0), (previous + r).min(max)),
        None => (0.0, max),
    };
    let input = wanted.max(low).min(high.max(low));
    let min_input = model.min_load * max;
    if input + EPS < min_input {
        if low > 0.0 { min_input.min(max) } else { 0.0 }
    } else {
        input
    }
}

fn apply_converter(model: &ConverterModel, t: usize, input: f64, residual: &mut CarrierFlows) {
    residual[model.input] -= input;
    for (carrier, eta) in &model.outputs {
        residual[*carrier] += input * eta.get(t).copied().unwrap_or(0.0);
    }
}

fn primary(model: &ConverterModel, t: usize) -> (Carrier, f64) {
    let (carrier, eta) = &model.outputs[0];
    (*carrier, eta.get(t).copied().unwrap_or(0.0))
}

impl OperationOptimizer for RuleBasedDispatcher {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    fn solve(
        &mut self,
        window: &[ForecastStep],
        models: &[LinearModel],
    ) -> Result<Vec<StepDispatch>, DispatchError> {
        let grid_carriers: Vec<Carrier> = models
            .iter()
            .filter_map(|m| match m {
                LinearModel::Grid(g) => Some(g.carrier),
                _ => None,
            })
            .collect();
        let mut levels: Vec<f64> = models
            .iter()
            .map(|m| match m {
                LinearModel::Storage(s) => s.level,
                _ => 0.0,
            })
            .collect();
        let mut previous: Vec<f64> = models
            .iter()
            .map(|m| match m {
                LinearModel::Converter(c) => c.previous_input_kw,
                _ => 0.0,
            })
            .collect();
        let converters: Vec<(usize, &ConverterModel)> = models
            .iter()
            .enumerate()
            .filter_map(|(i, m)| match m {
                LinearModel::Converter(c) => Some((i, c)),
                _ => None,
            })
            .collect();

        let mut plan = Vec::with_capacity(window.len());
        for (t, forecast) in window.iter().enumerate() {
            let hours = forecast.step.duration_hours;
            let mut step = StepPlan::new(models, &levels, hours);
            let mut residual = fixed_flows(models, t);
            let mut inputs: Vec<Option<f64>> = vec![None; models.len()];

            // Deficits: storage of the carrier, then converters producing it.
            for carrier in [Carrier::Heat, Carrier::Cold, Carrier::Electricity] {
                step.discharge(carrier, &mut residual);
                for &(i, model) in &converters {
                    let (product, eta) = primary(model, t);
                    let deficit = -residual[carrier];
                    if product != carrier || inputs[i].is_some() || deficit <= EPS || eta <= 0.0 {
                        continue;
                    }
                    let available = if grid_carriers.contains(&model.input) {
                        f64::INFINITY
                    } else {
                        residual[model.input].max(0.0) + step.discharge_room(model.input)
                    };
                    let input = admissible(model, t, previous[i], (deficit / eta).min(available));
                    apply_converter(model, t, input, &mut residual);
                    inputs[i] = Some(input);
                }
            }
            step.discharge(Carrier::Electricity, &mut residual);

            // Surpluses: electricity storage, then converters whose product
            // can be stored or exported.
            step.charge(Carrier::Electricity, &mut residual);
            for &(i, model) in &converters {
                let (product, eta) = primary(model, t);
                let surplus = residual[model.input];
                if inputs[i].is_some() || surplus <= EPS || eta <= 0.0 {
                    continue;
                }
                let sink = if grid_carriers.contains(&product) {
                    f64::INFINITY
                } else {
                    step.charge_room(product).max(0.0)
                };
                if sink <= EPS {
                    continue;
                }
                let input = admissible(model, t, previous[i], surplus.min(sink / eta));
                apply_converter(model, t, input, &mut residual);
                inputs[i] = Some(input);
            }

            // Idle converters still honour their ramp.
            for &(i, model) in &converters {
                if inputs[i].is_none() {
                    let input = admissible(model, t, previous[i], 0.0);
                    apply_converter(model, t, input, &mut residual);
                    inputs[i] = Some(input);
                }
            }

            for carrier in Carrier::ALL {
                step.discharge(carrier, &mut residual);
                step.charge(carrier, &mut residual);
            }

            let mut setpoints = vec![None; models.len()];
            for slot in &step.slots {
                setpoints[slot.index] = Some(Setpoint::Storage {
                    power_kw: slot.power_kw,
                });
                if let LinearModel::Storage(s) = &models[slot.index] {
                    let level = levels[slot.index];
                    levels[slot.index] = s
                        .next_level(level, slot.power_kw.max(0.0), (-slot.power_kw).max(0.0), hours)
                        .clamp(s.min_level.min(level), s.max_level.max(level));
                }
            }
            for &(i, _) in &converters {
                let input = inputs[i].unwrap_or(0.0);
                previous[i] = input;
                setpoints[i] = Some(Setpoint::Converter {
                    input_kw: input,
                    on: input > EPS,
                });
            }

            plan.push(StepDispatch {
                step: forecast.step.index,
                setpoints,
            });
        }
        Ok(plan)
    }
}
