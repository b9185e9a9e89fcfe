//! DCM feedback law.
//!
//! The divergent component of motion ξ = c + ċ/ω is the unstable mode of
//! the linear inverted pendulum; stabilizing it is sufficient to stabilize
//! the pendulum. The feedback law turns the DCM tracking error into a
//! corrective resultant force at the CoM:
//!
//! ```text
//! f_xy = m · (c̈*_xy + ω² · (k_p·e + k_i·ē + k_d·ė))
//! f_z  = m · (c̈*_z + g + k_vdc · (h* − h))
//! ```
//!
//! with e = ξ* − ξ restricted to the horizontal plane, ē its saturated
//! moving average and ė its stationary-offset transient. The desired moment
//! places the line of action of the force through the measured CoM.

use nalgebra::Vector3;

use strider_core::config::{StabilizerConfig, MAX_AVERAGE_DCM_ERROR};
use strider_core::pendulum::PendulumRef;
use strider_core::wrench::Wrench;
use strider_core::GRAVITY;
use strider_signal::{ExponentialMovingAverage, StationaryOffsetFilter};

// ---------------------------------------------------------------------------
// DcmFeedback
// ---------------------------------------------------------------------------

/// DCM error filters and feedback computation.
///
/// Owns the only cross-tick state of the feedback law: the error moving
/// average (integral term) and the stationary-offset derivator. Both are
/// zeroed on enable.
#[derive(Clone, Debug)]
pub struct DcmFeedback {
    integrator: ExponentialMovingAverage,
    derivator: StationaryOffsetFilter,
    dcm_error: Vector3<f64>,
    dcm_average_error: Vector3<f64>,
    dcm_vel_error: Vector3<f64>,
}

impl DcmFeedback {
    /// Create the filter bank for a control period of `dt` seconds.
    pub fn new(config: &StabilizerConfig, dt: f64) -> Self {
        Self {
            integrator: ExponentialMovingAverage::new(
                config.dcm_integrator_time_constant,
                dt,
                Vector3::zeros(),
            )
            .with_saturation(MAX_AVERAGE_DCM_ERROR),
            derivator: StationaryOffsetFilter::new(config.dcm_derivator_time_constant, dt),
            dcm_error: Vector3::zeros(),
            dcm_average_error: Vector3::zeros(),
            dcm_vel_error: Vector3::zeros(),
        }
    }

    /// Zero the filter states and stored errors.
    pub fn reset(&mut self) {
        self.integrator.reset(Vector3::zeros());
        self.derivator.reset(Vector3::zeros());
        self.dcm_error = Vector3::zeros();
        self.dcm_average_error = Vector3::zeros();
        self.dcm_vel_error = Vector3::zeros();
    }

    /// Commit the configured filter time constants.
    pub fn apply_time_constants(&mut self, config: &StabilizerConfig) {
        self.integrator
            .set_time_constant(config.dcm_integrator_time_constant);
        self.derivator
            .set_time_constant(config.dcm_derivator_time_constant);
    }

    /// Advance the filters with this tick's DCM error and return the desired
    /// resultant wrench at the world origin.
    pub fn desired_wrench(
        &mut self,
        config: &StabilizerConfig,
        reference: &PendulumRef,
        measured_com: &Vector3<f64>,
        measured_dcm: &Vector3<f64>,
        mass: f64,
    ) -> Wrench {
        let mut error = reference.dcm - measured_dcm;
        error.z = 0.0;
        self.dcm_error = error;

        self.integrator.append(&error);
        self.derivator.append(&error);
        self.dcm_average_error = self.integrator.eval();
        self.dcm_vel_error = self.derivator.eval();

        let omega_sq = reference.omega * reference.omega;
        let feedback = omega_sq
            * (config.dcm_prop_gain * self.dcm_error
                + config.dcm_integral_gain * self.dcm_average_error
                + config.dcm_deriv_gain * self.dcm_vel_error);

        let height_error = reference.com.z - measured_com.z;
        let mut accel = reference.comdd + feedback;
        accel.z = reference.comdd.z + GRAVITY + config.vdc_stiffness * height_error;

        let force = mass * accel;
        Wrench::from_force_at(force, measured_com)
    }

    /// DCM tracking error ξ* − ξ of the last tick.
    pub const fn dcm_error(&self) -> Vector3<f64> {
        self.dcm_error
    }

    /// Saturated moving average of the DCM error.
    pub const fn dcm_average_error(&self) -> Vector3<f64> {
        self.dcm_average_error
    }

    /// Stationary-offset transient of the DCM error.
    pub const fn dcm_vel_error(&self) -> Vector3<f64> {
        self.dcm_vel_error
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
