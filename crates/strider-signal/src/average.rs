//! Exponential moving average over 3-vectors.

use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// ExponentialMovingAverage
// ---------------------------------------------------------------------------

/// First-order low-pass filter (exponential moving average).
///
/// Each call to [`append`](Self::append) updates the state as
///
/// ```text
/// y ← y + (x − y) · (dt / T)
/// ```
///
/// where `T` is the averaging time constant in seconds and `dt` the sampling
/// period. The output is clamped elementwise to `[-saturation, saturation]`
/// when a saturation is set.
///
/// Fed with a tracking error, the saturated output is a windup-safe integral
/// term.
#[derive(Clone, Debug)]
pub struct ExponentialMovingAverage {
    time_constant: f64,
    dt: f64,
    average: Vector3<f64>,
    saturation: f64,
}

impl ExponentialMovingAverage {
    /// Create a new average with time constant `time_constant` (seconds),
    /// updated every `dt` seconds, starting from `initial`.
    ///
    /// The time constant is raised to `dt` if smaller; no saturation is
    /// applied by default.
    pub fn new(time_constant: f64, dt: f64, initial: Vector3<f64>) -> Self {
        Self {
            time_constant: time_constant.max(dt),
            dt,
            average: initial,
            saturation: f64::INFINITY,
        }
    }

    /// Set the elementwise output saturation (symmetric: `[-s, s]`).
    #[must_use]
    pub fn with_saturation(mut self, saturation: f64) -> Self {
        self.set_saturation(saturation);
        self
    }

    /// Update the average with a new sample.
    pub fn append(&mut self, x: &Vector3<f64>) {
        self.average += (x - self.average) * (self.dt / self.time_constant);
        self.saturate();
    }

    /// Current filter output.
    pub const fn eval(&self) -> Vector3<f64> {
        self.average
    }

    /// Reset the state to `initial`.
    pub fn reset(&mut self, initial: Vector3<f64>) {
        self.average = initial;
        self.saturate();
    }

    /// Averaging time constant in seconds.
    pub const fn time_constant(&self) -> f64 {
        self.time_constant
    }

    /// Update the time constant. Values below the sampling period are raised
    /// to it.
    pub fn set_time_constant(&mut self, time_constant: f64) {
        self.time_constant = time_constant.max(self.dt);
    }

    /// Update the elementwise output saturation.
    pub fn set_saturation(&mut self, saturation: f64) {
        self.saturation = saturation.abs();
    }

    fn saturate(&mut self) {
        let s = self.saturation;
        self.average = self.average.map(|v| v.clamp(-s, s));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
