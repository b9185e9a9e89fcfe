//! Foot force difference control.
//!
//! In double support the two feet form a closed kinematic chain: the
//! whole-body program alone cannot regulate how the vertical load splits
//! between them. Following Kajita et al. (IROS 2010, §III.E), the vertical
//! force difference between the feet is servoed by moving the soles apart
//! vertically, with a damping term on the resulting height difference and a
//! slow vertical drift compensation that keeps the average sole height on
//! its reference.

use strider_core::config::StabilizerConfig;

use crate::task::CopTask;

// ---------------------------------------------------------------------------
// FdcCommand
// ---------------------------------------------------------------------------

/// Vertical foot velocities commanded by the controller, in m/s.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FdcCommand {
    /// Left sole vertical velocity.
    pub left_velocity: f64,
    /// Right sole vertical velocity.
    pub right_velocity: f64,
}

// ---------------------------------------------------------------------------
// FootForceDifference
// ---------------------------------------------------------------------------

/// Double-support foot force difference controller.
#[derive(Clone, Copy, Debug, Default)]
pub struct FootForceDifference {
    force_error: f64,
    height_error: f64,
    vdc_height_error: f64,
}

impl FootForceDifference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero the stored errors (single support, airborne, or disable).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Update the errors from the foot tasks and return the sole velocity
    /// command.
    ///
    /// The overloaded foot is lowered and the unloaded one raised by the
    /// admittance term; the damping term opposes the height difference this
    /// builds up; the drift term moves both feet together to bleed the
    /// accumulated average height offset.
    pub fn update(
        &mut self,
        config: &StabilizerConfig,
        left: &CopTask,
        right: &CopTask,
    ) -> FdcCommand {
        let left_fz_target = left.target_wrench().force.z;
        let right_fz_target = right.target_wrench().force.z;
        let left_fz = left.measured_wrench().force.z;
        let right_fz = right.measured_wrench().force.z;
        self.force_error = (left_fz - right_fz) - (left_fz_target - right_fz_target);

        let left_z_target = left.target_pose().translation.z;
        let right_z_target = right.target_pose().translation.z;
        let left_z = left.measured_pose().translation.z;
        let right_z = right.measured_pose().translation.z;
        self.height_error = (left_z - right_z) - (left_z_target - right_z_target);
        self.vdc_height_error = (left_z + right_z) - (left_z_target + right_z_target);

        let dz_control = config.dfz_admittance * self.force_error
            - config.dfz_damping * self.height_error;
        let dz_vdc = config.vdc_frequency * self.vdc_height_error;

        FdcCommand {
            left_velocity: 0.5 * (dz_vdc - dz_control),
            right_velocity: 0.5 * (dz_vdc + dz_control),
        }
    }

    /// Vertical force difference error of the last update, in N.
    pub const fn force_error(&self) -> f64 {
        self.force_error
    }

    /// Sole height difference error of the last update, in m.
    pub const fn height_error(&self) -> f64 {
        self.height_error
    }

    /// Average sole height error of the last update, in m.
    pub const fn vdc_height_error(&self) -> f64 {
        self.vdc_height_error
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
