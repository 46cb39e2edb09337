//! Exogenous inputs: weather and demand profiles, forecast windows, and a
//! seeded synthetic profile generator.

use std::f64::consts::PI;
use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::config::ProfileConfig;
use crate::sim::clock::{TimeStep, Timebase};

/// Environmental data and demand for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Exogenous {
    pub irradiance_w_m2: f64,
    pub wind_speed_m_s: f64,
    pub temperature_c: f64,
    pub electric_load_kw: f64,
    pub heat_load_kw: f64,
    pub cold_load_kw: f64,
}

/// Read-only source of exogenous data indexed by step.
///
/// Feeds are shared between parallel evaluations and must not change while a
/// run reads them.
pub trait ExogenousFeed: Send + Sync {
    /// Number of steps available.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Data for step `index`, or `None` past the end.
    fn get(&self, index: usize) -> Option<Exogenous>;
}

/// In-memory profile feed. Cloning shares the underlying records.
#[derive(Debug, Clone)]
pub struct ProfileFeed {
    records: Arc<[Exogenous]>,
}

impl ProfileFeed {
    pub fn new(records: Vec<Exogenous>) -> Self {
        Self {
            records: records.into(),
        }
    }

    /// Repeats or truncates `template` to exactly `horizon` steps.
    ///
    /// An empty template yields all-default records.
    pub fn tiled(template: &[Exogenous], horizon: usize) -> Self {
        if template.is_empty() {
            return Self::new(vec![Exogenous::default(); horizon]);
        }
        Self::new(template.iter().copied().cycle().take(horizon).collect())
    }

    /// Feed restricted to `len` steps starting at `start`.
    pub fn slice(&self, start: usize, len: usize) -> Self {
        let end = (start + len).min(self.records.len());
        let start = start.min(end);
        Self::new(self.records[start..end].to_vec())
    }

    pub fn records(&self) -> &[Exogenous] {
        &self.records
    }
}

impl ExogenousFeed for ProfileFeed {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn get(&self, index: usize) -> Option<Exogenous> {
        self.records.get(index).copied()
    }
}

/// Forecast data for one step of a planning window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastStep {
    pub step: TimeStep,
    pub exogenous: Exogenous,
}

/// Perfect-foresight forecast of up to `len` steps starting at `start`.
///
/// The window is truncated at the end of the timebase or of the feed,
/// whichever comes first.
pub fn forecast_window(
    feed: &dyn ExogenousFeed,
    timebase: &Timebase,
    start: usize,
    len: usize,
) -> Vec<ForecastStep> {
    let end = (start + len).min(timebase.steps()).min(feed.len());
    (start..end)
        .filter_map(|i| {
            feed.get(i).map(|exogenous| ForecastStep {
                step: timebase.step(i),
                exogenous,
            })
        })
        .collect()
}

/// Utility function to generate Gaussian noise using Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// Random value from a Gaussian distribution with mean 0 and specified standard deviation
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

/// Half-sine daylight fraction between sunrise and sunset hours.
///
/// Returns 0.0 outside `[sunrise, sunset)` and peaks at 1.0 at solar noon.
pub fn daylight_frac(hour: f64, sunrise: f64, sunset: f64) -> f64 {
    if sunset <= sunrise || hour < sunrise || hour >= sunset {
        return 0.0;
    }
    (PI * (hour - sunrise) / (sunset - sunrise)).sin().max(0.0)
}

/// Generates a synthetic weather and demand profile over the timebase.
///
/// Irradiance follows the daylight half-sine, temperature and electric load
/// follow daily sinusoids, heat load grows linearly below the heating limit,
/// cold load grows linearly above the cooling limit, and wind speed is an AR(1) process around its mean. All noise is drawn
/// from a single generator seeded by `config.seed`.
pub fn synthetic_profile(timebase: &Timebase, config: &ProfileConfig) -> ProfileFeed {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut wind = config.mean_wind_m_s;
    let records = (0..timebase.steps())
        .map(|i| {
            let hour = timebase.step(i).hour_of_day();
            let day_pos = hour / 24.0;

            let sun = daylight_frac(hour, config.sunrise_hour, config.sunset_hour);
            let irradiance = if sun > 0.0 {
                let cloud = 1.0 + gaussian_noise(&mut rng, config.noise_std);
                (config.peak_irradiance_w_m2 * sun * cloud).max(0.0)
            } else {
                0.0
            };

            let temperature = config.mean_temperature_c
                + config.temperature_amplitude_c * (2.0 * PI * (day_pos - 0.375)).sin()
                + gaussian_noise(&mut rng, config.noise_std * 2.0);

            let electric = config.electric_base_kw
                + config.electric_amplitude_kw * (2.0 * PI * day_pos + config.electric_phase_rad).sin()
                + gaussian_noise(&mut rng, config.noise_std * config.electric_base_kw);

            let heat = config.heat_base_kw
                + config.heat_per_kelvin_kw * (config.heating_limit_c - temperature).max(0.0);
            let cold = config.cold_base_kw
                + config.cold_per_kelvin_kw * (temperature - config.cooling_limit_c).max(0.0);

            wind = config.mean_wind_m_s
                + 0.8 * (wind - config.mean_wind_m_s)
                + gaussian_noise(&mut rng, config.wind_std_m_s);
            wind = wind.max(0.0);

            Exogenous {
                irradiance_w_m2: irradiance,
                wind_speed_m_s: wind,
                temperature_c: temperature,
                electric_load_kw: electric.max(0.0),
                heat_load_kw: heat.max(0.0),
                cold_load_kw: cold.max(0.0),
            }
        })
        .collect();
    ProfileFeed::new(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(kw: f64) -> Exogenous {
        Exogenous {
            electric_load_kw: kw,
            ..Exogenous::default()
        }
    }

    #[test]
    fn tiled_repeats_template_to_horizon() {
        let feed = ProfileFeed::tiled(&[load(1.0), load(2.0), load(3.0)], 7);
        assert_eq!(feed.len(), 7);
        let loads: Vec<f64> = feed.records().iter().map(|e| e.electric_load_kw).collect();
        assert_eq!(loads, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn tiled_truncates_long_template() {
        let feed = ProfileFeed::tiled(&[load(1.0), load(2.0), load(3.0)], 2);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.get(2), None);
    }

    #[test]
    fn slice_is_clamped_to_records() {
        let feed = ProfileFeed::tiled(&[load(1.0), load(2.0)], 4);
        assert_eq!(feed.slice(3, 5).len(), 1);
        assert_eq!(feed.slice(10, 2).len(), 0);
        assert_eq!(feed.slice(1, 1).get(0), Some(load(2.0)));
    }

    #[test]
    fn forecast_window_truncates_at_horizon() {
        let feed = ProfileFeed::tiled(&[load(1.0)], 10);
        let timebase = Timebase::hourly(6);
        let window = forecast_window(&feed, &timebase, 4, 5);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].step.index, 4);
        assert_eq!(window[1].step.index, 5);
    }

    #[test]
    fn daylight_frac_peaks_at_noon() {
        assert_eq!(daylight_frac(3.0, 6.0, 18.0), 0.0);
        assert_eq!(daylight_frac(18.0, 6.0, 18.0), 0.0);
        assert!((daylight_frac(12.0, 6.0, 18.0) - 1.0).abs() < 1e-12);
        assert!((daylight_frac(9.0, 6.0, 18.0) - daylight_frac(15.0, 6.0, 18.0)).abs() < 1e-12);
    }

    #[test]
    fn synthetic_profile_is_seeded_and_physical() {
        let timebase = Timebase::hourly(48);
        let config = ProfileConfig::default();
        let a = synthetic_profile(&timebase, &config);
        let b = synthetic_profile(&timebase, &config);
        assert_eq!(a.records(), b.records());
        assert_eq!(a.len(), 48);
        for e in a.records() {
            assert!(e.irradiance_w_m2 >= 0.0);
            assert!(e.wind_speed_m_s >= 0.0);
            assert!(e.electric_load_kw >= 0.0);
            assert!(e.heat_load_kw >= 0.0);
            assert!(e.cold_load_kw >= 0.0);
        }
        assert_eq!(a.get(0).map(|e| e.irradiance_w_m2), Some(0.0));
        assert!(a.get(12).is_some_and(|e| e.irradiance_w_m2 > 0.0));

        let other = synthetic_profile(
            &timebase,
            &ProfileConfig {
                seed: config.seed + 1,
                ..config
            },
        );
        assert_ne!(a.records(), other.records());
    }

    #[test]
    fn gaussian_noise_is_zero_without_spread() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(gaussian_noise(&mut rng, 0.0), 0.0);
        let sample = gaussian_noise(&mut rng, 1.0);
        assert!(sample.is_finite());
    }

    #[test]
    fn cold_load_follows_temperature_above_cooling_limit() {
        let timebase = Timebase::hourly(24);
        let config = ProfileConfig {
            noise_std: 0.0,
            mean_temperature_c: 24.0,
            temperature_amplitude_c: 6.0,
            cold_base_kw: 0.1,
            cold_per_kelvin_kw: 0.5,
            cooling_limit_c: 24.0,
            ..ProfileConfig::default()
        };
        let feed = synthetic_profile(&timebase, &config);
        for e in feed.records() {
            let expected = 0.1 + 0.5 * (e.temperature_c - 24.0).max(0.0);
            assert!((e.cold_load_kw - expected).abs() < 1e-12);
        }
        let warmest = feed
            .records()
            .iter()
            .max_by(|a, b| a.temperature_c.total_cmp(&b.temperature_c))
            .unwrap();
        assert!(warmest.cold_load_kw > 0.1);
    }
}
