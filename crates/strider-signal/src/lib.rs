//! Framework-agnostic signal filters for feedback control loops.
//!
//! Pure Rust library with no control-stack dependencies. Provides the three
//! stateful filters used by the walking stabilizer feedback laws:
//!
//! - [`ExponentialMovingAverage`] — first-order low-pass with optional
//!   output saturation.
//! - [`StationaryOffsetFilter`] — subtracts the slowly-varying mean from a
//!   signal, leaving its transient component.
//! - [`LeakyIntegrator`] — discrete integrator with exponential forgetting
//!   and output saturation.
//!
//! All filters are value types over `Vector3<f64>`: deterministic, driven
//! only by `append`/`add` calls at a fixed period, and independent of wall
//! clock time.

pub mod average;
pub mod integrator;
pub mod offset;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::average::ExponentialMovingAverage;
    pub use crate::integrator::LeakyIntegrator;
    pub use crate::offset::StationaryOffsetFilter;
}

pub use average::ExponentialMovingAverage;
pub use integrator::LeakyIntegrator;
pub use offset::StationaryOffsetFilter;
