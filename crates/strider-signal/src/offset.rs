//! Stationary-offset removal filter.

use nalgebra::Vector3;

use crate::average::ExponentialMovingAverage;

// ---------------------------------------------------------------------------
// StationaryOffsetFilter
// ---------------------------------------------------------------------------

/// Removes the slowly-varying mean from a signal.
///
/// The filter tracks the low-pass mean `m` of its input with an
/// [`ExponentialMovingAverage`] and outputs `x − m`. Fed with a tracking
/// error, the output is an offset-free transient usable as a derivative
/// proxy without amplifying measurement noise.
#[derive(Clone, Debug)]
pub struct StationaryOffsetFilter {
    average: ExponentialMovingAverage,
    filtered: Vector3<f64>,
}

impl StationaryOffsetFilter {
    /// Create a new filter with mean time constant `time_constant` (seconds)
    /// sampled every `dt` seconds, starting from a zero state.
    pub fn new(time_constant: f64, dt: f64) -> Self {
        Self {
            average: ExponentialMovingAverage::new(time_constant, dt, Vector3::zeros()),
            filtered: Vector3::zeros(),
        }
    }

    /// Update the filter with a new sample.
    pub fn append(&mut self, x: &Vector3<f64>) {
        self.average.append(x);
        self.filtered = x - self.average.eval();
    }

    /// Current filter output `x − mean(x)`.
    pub const fn eval(&self) -> Vector3<f64> {
        self.filtered
    }

    /// Low-pass mean of the input signal.
    pub const fn mean(&self) -> Vector3<f64> {
        self.average.eval()
    }

    /// Reset the internal mean to `initial` and the output to zero.
    pub fn reset(&mut self, initial: Vector3<f64>) {
        self.average.reset(initial);
        self.filtered = Vector3::zeros();
    }

    /// Time constant of the internal mean estimator in seconds.
    pub const fn time_constant(&self) -> f64 {
        self.average.time_constant()
    }

    /// Update the time constant of the internal mean estimator.
    pub fn set_time_constant(&mut self, time_constant: f64) {
        self.average.set_time_constant(time_constant);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f64 = 0.005;

    #[test]
    fn constant_input_decays_to_zero() {
        let mut filter = StationaryOffsetFilter::new(0.1, DT);
        let x = Vector3::new(0.5, -0.5, 1.0);
        for _ in 0..10_000 {
            filter.append(&x);
        }
        assert_relative_eq!(filter.eval(), Vector3::zeros(), epsilon = 1e-9);
        assert_relative_eq!(filter.mean(), x, epsilon = 1e-9);
    }

    #[test]
    fn step_passes_through_initially() {
        let mut filter = StationaryOffsetFilter::new(10.0, DT);
        let x = Vector3::new(1.0, 0.0, 0.0);
        filter.append(&x);
        // Mean has barely moved, output is close to the full step.
        assert!(filter.eval().x > 0.99);
    }

    #[test]
    fn reset_clears_output() {
        let mut filter = StationaryOffsetFilter::new(1.0, DT);
        filter.append(&Vector3::new(1.0, 2.0, 3.0));
        filter.reset(Vector3::zeros());
        assert_relative_eq!(filter.eval(), Vector3::zeros());
        assert_relative_eq!(filter.mean(), Vector3::zeros());
    }

    #[test]
    fn tracks_input_minus_mean() {
        let mut filter = StationaryOffsetFilter::new(1.0, DT);
        let x = Vector3::new(0.2, 0.0, 0.0);
        filter.append(&x);
        filter.append(&x);
        assert_relative_eq!(filter.eval(), x - filter.mean(), epsilon = 1e-12);
    }
}
