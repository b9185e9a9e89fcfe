//! Leaky integrator over 3-vectors.

use nalgebra::Vector3;

// ---------------------------------------------------------------------------
// LeakyIntegrator
// ---------------------------------------------------------------------------

/// Discrete integrator with exponential forgetting.
///
/// Each call to [`add`](Self::add) updates the state as
///
/// ```text
/// y ← (1 − rate · dt) · y + x · dt
/// ```
///
/// then clamps it elementwise to `[-saturation, saturation]`. The leak rate
/// bounds the DC gain of the integrator to `1 / rate`, which keeps slow
/// biases from winding up the state.
#[derive(Clone, Debug)]
pub struct LeakyIntegrator {
    rate: f64,
    integral: Vector3<f64>,
    saturation: f64,
}

impl LeakyIntegrator {
    /// Create a new integrator with leak rate `rate` (Hz), zero state and no
    /// saturation.
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            integral: Vector3::zeros(),
            saturation: f64::INFINITY,
        }
    }

    /// Set the elementwise output saturation (symmetric: `[-s, s]`).
    #[must_use]
    pub fn with_saturation(mut self, saturation: f64) -> Self {
        self.set_saturation(saturation);
        self
    }

    /// Integrate a new sample over one period of `dt` seconds.
    pub fn add(&mut self, x: &Vector3<f64>, dt: f64) {
        self.integral = (1.0 - self.rate * dt) * self.integral + x * dt;
        let s = self.saturation;
        self.integral = self.integral.map(|v| v.clamp(-s, s));
    }

    /// Current integrator output.
    pub const fn eval(&self) -> Vector3<f64> {
        self.integral
    }

    /// Reset the state to zero.
    pub fn reset(&mut self) {
        self.integral = Vector3::zeros();
    }

    /// Leak rate in Hz.
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Update the leak rate.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    /// Update the elementwise output saturation.
    pub fn set_saturation(&mut self, saturation: f64) {
        self.saturation = saturation.abs();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
