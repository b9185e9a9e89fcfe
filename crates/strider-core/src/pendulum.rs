//! Linear-inverted-pendulum reference state.

use nalgebra::Vector3;

use crate::error::StabilizerError;
use crate::GRAVITY;

// ---------------------------------------------------------------------------
// PendulumRef
// ---------------------------------------------------------------------------

/// Feedforward pendulum state produced by the upstream pattern generator.
///
/// Carries the CoM trajectory sample and ZMP reference for one tick, plus
/// the derived natural frequency `ω = √(g / h)` (with `h` the pendulum
/// height above the ZMP plane) and the divergent component of motion
/// `ξ = c + ċ / ω`.
#[derive(Clone, Copy, Debug)]
pub struct PendulumRef {
    /// CoM position in m.
    pub com: Vector3<f64>,
    /// CoM velocity in m/s.
    pub comd: Vector3<f64>,
    /// CoM acceleration in m/s².
    pub comdd: Vector3<f64>,
    /// ZMP in m.
    pub zmp: Vector3<f64>,
    /// Divergent component of motion in m.
    pub dcm: Vector3<f64>,
    /// Natural frequency in Hz.
    pub omega: f64,
}

impl PendulumRef {
    /// Build a dynamic reference from a pattern-generator sample.
    ///
    /// Rejects non-finite inputs and non-positive pendulum heights so a
    /// misbehaving upstream cannot poison the feedback loop.
    pub fn dynamic(
        com: Vector3<f64>,
        comd: Vector3<f64>,
        comdd: Vector3<f64>,
        zmp: Vector3<f64>,
    ) -> Result<Self, StabilizerError> {
        for v in [&com, &comd, &comdd, &zmp] {
            if !v.iter().all(|x| x.is_finite()) {
                return Err(StabilizerError::InvalidInput {
                    what: "non-finite pendulum target",
                });
            }
        }
        let height = com.z - zmp.z;
        if height <= 0.0 {
            return Err(StabilizerError::InvalidInput {
                what: "CoM target at or below the ZMP plane",
            });
        }
        let omega = (GRAVITY / height).sqrt();
        Ok(Self {
            com,
            comd,
            comdd,
            zmp,
            dcm: com + comd / omega,
            omega,
        })
    }

    /// Build a stationary reference: zero velocity and acceleration, ZMP at
    /// the ground projection of the CoM (`ground_height` is the current ZMP
    /// plane height).
    pub fn stationary(com: Vector3<f64>, ground_height: f64) -> Result<Self, StabilizerError> {
        Self::dynamic(
            com,
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::new(com.x, com.y, ground_height),
        )
    }

    /// Pendulum height above the ZMP plane in m.
    pub fn height(&self) -> f64 {
        self.com.z - self.zmp.z
    }
}

impl Default for PendulumRef {
    /// Stationary pendulum at 0.8 m, the fallback before the first target.
    fn default() -> Self {
        Self::stationary(Vector3::new(0.0, 0.0, 0.8), 0.0)
            .expect("default pendulum target is finite")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
