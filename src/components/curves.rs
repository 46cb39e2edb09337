//! Physical response curves shared by the simulation and the planning models.
//!
//! Every curve is a pure function so a component's `advance` and its
//! `linear_model` evaluate exactly the same numbers.

const KELVIN: f64 = 273.15;

/// Cell temperature from the nominal operating cell temperature model.
///
/// # Arguments
///
/// * `ambient_c` - Ambient temperature in °C
/// * `irradiance_w_m2` - Plane-of-array irradiance in W/m²
/// * `noct_c` - Nominal operating cell temperature in °C (at 800 W/m², 20 °C)
pub fn pv_cell_temperature(ambient_c: f64, irradiance_w_m2: f64, noct_c: f64) -> f64 {
    ambient_c + (noct_c - 20.0) / 800.0 * irradiance_w_m2.max(0.0)
}

/// Multiplicative derate relative to 25 °C cell temperature, never negative.
pub fn pv_temperature_derate(cell_c: f64, temperature_coefficient: f64) -> f64 {
    (1.0 + temperature_coefficient * (cell_c - 25.0)).max(0.0)
}

/// Wind speed scaled from measurement height to hub height with the log law.
pub fn hub_height_wind_speed(
    speed_m_s: f64,
    measurement_height_m: f64,
    hub_height_m: f64,
    roughness_m: f64,
) -> f64 {
    if speed_m_s <= 0.0 {
        return 0.0;
    }
    let scale = (hub_height_m / roughness_m).ln() / (measurement_height_m / roughness_m).ln();
    speed_m_s * scale
}

/// Fraction of rated power produced at hub-height wind speed `v`.
///
/// Cubic between cut-in and rated speed, flat up to cut-out, zero outside.
pub fn wind_power_fraction(v: f64, cut_in: f64, rated: f64, cut_out: f64) -> f64 {
    if v < cut_in || v >= cut_out {
        0.0
    } else if v >= rated {
        1.0
    } else {
        (v.powi(3) - cut_in.powi(3)) / (rated.powi(3) - cut_in.powi(3))
    }
}

/// Coefficient of performance of an air-source heat pump.
///
/// A fixed fraction of the Carnot COP between the ambient source and the
/// supply temperature. The lift is floored at 5 K and the result capped at
/// `max_cop`.
pub fn heat_pump_cop(
    source_c: f64,
    sink_c: f64,
    carnot_fraction: f64,
    max_cop: f64,
) -> f64 {
    let lift = (sink_c - source_c).max(5.0);
    let carnot = (sink_c + KELVIN) / lift;
    (carnot_fraction * carnot).clamp(1.0, max_cop)
}

/// Cooling COP of a compression chiller rejecting heat to ambient air.
///
/// Mirrors [`heat_pump_cop`] with the cold supply as source and ambient air
/// as sink. Floored at 1 and capped at `max_cop`.
pub fn chiller_cop(ambient_c: f64, supply_c: f64, carnot_fraction: f64, max_cop: f64) -> f64 {
    let lift = (ambient_c - supply_c).max(5.0);
    let carnot = (supply_c + KELVIN) / lift;
    (carnot_fraction * carnot).clamp(1.0, max_cop)
}

/// Part-load efficiency of a power electronic converter.
///
/// Loss model with self consumption, a voltage-proportional and a resistive
/// term, all normalised to rated power. `load` is the input power relative to
/// rating and is capped at 1. Returns 0 below the self-consumption threshold.
///
/// # Arguments
///
/// * `load` - Input power divided by rated power
/// * `nominal_efficiency` - Efficiency at rated power used to rescale the loss terms
/// * `voltage_loss` - Loss share proportional to output power
/// * `resistance_loss` - Loss share proportional to the square of output power
/// * `self_consumption` - Constant loss share
pub fn inverter_efficiency(
    load: f64,
    nominal_efficiency: f64,
    voltage_loss: f64,
    resistance_loss: f64,
    self_consumption: f64,
) -> f64 {
    let p = load.min(1.0);
    if p <= 0.0 {
        return 0.0;
    }
    let s = self_consumption * nominal_efficiency;
    if p <= s {
        return 0.0;
    }
    let r = resistance_loss / nominal_efficiency;
    let b = 1.0 + voltage_loss;
    let output = if r > 0.0 {
        (-b + (b * b + 4.0 * r * (p - s)).sqrt()) / (2.0 * r)
    } else {
        (p - s) / b
    };
    (output / p).clamp(0.0, 1.0)
}

/// Thermal efficiency of a flat-plate or tube collector at a fixed mean
/// fluid temperature, never negative.
///
/// # Arguments
///
/// * `irradiance_w_m2` - Irradiance on the aperture in W/m²
/// * `ambient_c` - Ambient temperature in °C
/// * `mean_fluid_c` - Mean collector fluid temperature in °C
/// * `optical` - Optical efficiency
/// * `k0` - Linear heat loss coefficient in W/(m² K)
/// * `k1` - Quadratic heat loss coefficient in W/(m² K²)
pub fn collector_efficiency(
    irradiance_w_m2: f64,
    ambient_c: f64,
    mean_fluid_c: f64,
    optical: f64,
    k0: f64,
    k1: f64,
) -> f64 {
    if irradiance_w_m2 <= 0.0 {
        return 0.0;
    }
    let dt = mean_fluid_c - ambient_c;
    (optical - k0 * dt / irradiance_w_m2 - k1 * dt * dt / irradiance_w_m2).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_temperature_rises_with_irradiance() {
        assert_eq!(pv_cell_temperature(20.0, 0.0, 45.0), 20.0);
        let hot = pv_cell_temperature(20.0, 800.0, 45.0);
        assert!((hot - 45.0).abs() < 1e-12);
    }

    #[test]
    fn derate_is_unity_at_reference_temperature() {
        assert!((pv_temperature_derate(25.0, -0.004) - 1.0).abs() < 1e-12);
        assert!(pv_temperature_derate(45.0, -0.004) < 1.0);
        assert_eq!(pv_temperature_derate(25.0 + 1000.0, -0.004), 0.0);
    }

    #[test]
    fn log_law_increases_speed_with_height() {
        let v = hub_height_wind_speed(5.0, 10.0, 80.0, 0.1);
        assert!(v > 5.0);
        assert_eq!(hub_height_wind_speed(5.0, 10.0, 10.0, 0.1), 5.0);
        assert_eq!(hub_height_wind_speed(-1.0, 10.0, 80.0, 0.1), 0.0);
    }

    #[test]
    fn power_curve_regions() {
        assert_eq!(wind_power_fraction(2.0, 3.0, 12.0, 25.0), 0.0);
        assert_eq!(wind_power_fraction(3.0, 3.0, 12.0, 25.0), 0.0);
        let mid = wind_power_fraction(8.0, 3.0, 12.0, 25.0);
        assert!(mid > 0.0 && mid < 1.0);
        assert_eq!(wind_power_fraction(15.0, 3.0, 12.0, 25.0), 1.0);
        assert_eq!(wind_power_fraction(25.0, 3.0, 12.0, 25.0), 0.0);
    }

    #[test]
    fn cop_falls_as_source_gets_colder() {
        let mild = heat_pump_cop(10.0, 45.0, 0.45, 7.0);
        let cold = heat_pump_cop(-10.0, 45.0, 0.45, 7.0);
        assert!(mild > cold);
        assert!(cold >= 1.0);
        assert!(heat_pump_cop(44.0, 45.0, 0.9, 7.0) <= 7.0);
    }

    #[test]
    fn chiller_cop_falls_in_hot_weather() {
        let mild = chiller_cop(24.0, 7.0, 0.4, 8.0);
        let hot = chiller_cop(38.0, 7.0, 0.4, 8.0);
        assert!(mild > hot);
        assert!(hot >= 1.0);
        assert_eq!(chiller_cop(8.0, 7.0, 0.9, 8.0), 8.0);
    }

    #[test]
    fn inverter_is_least_efficient_at_low_load() {
        let eff = |p| inverter_efficiency(p, 0.951, 0.009737, 0.031432, 0.002671);
        assert_eq!(eff(0.0), 0.0);
        assert_eq!(eff(0.001), 0.0);
        assert!(eff(0.05) < eff(0.3));
        assert!(eff(1.0) > 0.9 && eff(1.0) < 1.0);
        // clipped above rating
        assert_eq!(eff(2.0), eff(1.0));
    }

    #[test]
    fn lossless_inverter_passes_power_through() {
        assert!((inverter_efficiency(0.4, 1.0, 0.0, 0.0, 0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn collector_loses_efficiency_when_fluid_is_hot() {
        assert_eq!(collector_efficiency(0.0, 20.0, 50.0, 0.64, 0.75, 0.005), 0.0);
        let warm = collector_efficiency(800.0, 30.0, 50.0, 0.64, 0.75, 0.005);
        let cold = collector_efficiency(800.0, 0.0, 50.0, 0.64, 0.75, 0.005);
        assert!(warm > cold);
        // 0.64 - 0.75 * 20 / 800 - 0.005 * 400 / 800
        assert!((warm - 0.6187).abs() < 1e-4);
        assert_eq!(collector_efficiency(50.0, -20.0, 80.0, 0.64, 0.75, 0.005), 0.0);
    }
}
