use chrono::{NaiveDateTime, TimeDelta, Timelike};

/// One discrete simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    /// Zero-based position in the horizon.
    pub index: usize,
    /// Wall-clock start of the step.
    pub start: NaiveDateTime,
    /// Step length in hours.
    pub duration_hours: f64,
}

impl TimeStep {
    /// Fractional hour of day at the start of the step, in `[0, 24)`.
    pub fn hour_of_day(&self) -> f64 {
        self.start.hour() as f64 + self.start.minute() as f64 / 60.0
    }
}

/// Uniform discretisation of the simulated horizon.
///
/// # Examples
///
/// ```
/// use cell_sim::sim::clock::Timebase;
///
/// let timebase = Timebase::hourly(24);
/// assert_eq!(timebase.steps(), 24);
/// assert_eq!(timebase.step(3).duration_hours, 1.0);
/// assert!((timebase.horizon_hours() - 24.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Timebase {
    start: NaiveDateTime,
    step_hours: f64,
    steps: usize,
}

impl Timebase {
    /// Creates a new timebase.
    ///
    /// # Arguments
    ///
    /// * `start` - Wall-clock start of the first step
    /// * `step_hours` - Length of each step in hours (must be > 0)
    /// * `steps` - Number of steps in the horizon (must be > 0)
    ///
    /// # Panics
    ///
    /// Panics if `step_hours` is not positive or `steps` is zero.
    pub fn new(start: NaiveDateTime, step_hours: f64, steps: usize) -> Self {
        assert!(step_hours > 0.0 && step_hours.is_finite(), "step_hours must be > 0");
        assert!(steps > 0, "steps must be > 0");
        Self {
            start,
            step_hours,
            steps,
        }
    }

    /// Hourly steps starting at the Unix epoch.
    pub fn hourly(steps: usize) -> Self {
        Self::new(NaiveDateTime::default(), 1.0, steps)
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn step_hours(&self) -> f64 {
        self.step_hours
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn horizon_hours(&self) -> f64 {
        self.step_hours * self.steps as f64
    }

    /// Step `index` of the horizon. Indices past the end are extrapolated.
    pub fn step(&self, index: usize) -> TimeStep {
        let offset_ms = (self.step_hours * 3_600_000.0 * index as f64).round() as i64;
        TimeStep {
            index,
            start: self.start + TimeDelta::milliseconds(offset_ms),
            duration_hours: self.step_hours,
        }
    }

    /// A clock over all steps of this timebase.
    pub fn clock(&self) -> Clock {
        Clock::new(self.clone())
    }
}

/// A simulation clock that hands out the steps of a timebase in order.
///
/// # Examples
///
/// ```
/// use cell_sim::sim::clock::Timebase;
///
/// let mut clock = Timebase::hourly(3).clock();
/// let mut steps = Vec::new();
///
/// clock.run(|step| steps.push(step.index));
/// assert_eq!(steps, vec![0, 1, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    timebase: Timebase,
    /// Index of the next step to hand out.
    current: usize,
}

impl Clock {
    pub fn new(timebase: Timebase) -> Self {
        Self {
            timebase,
            current: 0,
        }
    }

    /// Advances the clock by one step.
    ///
    /// # Returns
    ///
    /// * `Some(step)` - The step to simulate next
    /// * `None` - If the clock has reached the end of the horizon
    pub fn tick(&mut self) -> Option<TimeStep> {
        if self.current < self.timebase.steps {
            let step = self.timebase.step(self.current);
            self.current += 1;
            Some(step)
        } else {
            None
        }
    }

    /// Index of the next step `tick` will return.
    pub fn position(&self) -> usize {
        self.current
    }

    /// Runs a function for each remaining step in the clock.
    pub fn run(&mut self, mut f: impl FnMut(TimeStep)) {
        while let Some(step) = self.tick() {
            f(step);
        }
    }
}
