//! 6D contact wrenches and their frame transforms.
//!
//! A [`Wrench`] couples a moment and a force. Unless stated otherwise, a
//! wrench is expressed at the world origin in world axes: the moment is the
//! torque of the contact forces about the origin. [`Wrench::in_frame`]
//! re-expresses it about another frame's origin in that frame's axes, which
//! is how per-contact quantities (wrench cones, center of pressure, ankle
//! torques) are evaluated.
//!
//! Vector packing order is `(mx, my, mz, fx, fy, fz)` throughout.

use nalgebra::{Isometry3, Matrix3, SMatrix, SVector, Vector3};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use crate::error::StabilizerError;

// ---------------------------------------------------------------------------
// Wrench
// ---------------------------------------------------------------------------

/// A 6D wrench: moment and force.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Wrench {
    /// Moment in N·m, taken about the origin of the frame the wrench is
    /// expressed in.
    pub moment: Vector3<f64>,
    /// Force in N.
    pub force: Vector3<f64>,
}

impl Wrench {
    /// Create a wrench from a moment and a force.
    pub const fn new(moment: Vector3<f64>, force: Vector3<f64>) -> Self {
        Self { moment, force }
    }

    /// The zero wrench.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Pure force acting along a line through `point`.
    pub fn from_force_at(force: Vector3<f64>, point: &Vector3<f64>) -> Self {
        Self {
            moment: point.cross(&force),
            force,
        }
    }

    /// Pack into a 6-vector `(mx, my, mz, fx, fy, fz)`.
    pub fn to_vector(&self) -> SVector<f64, 6> {
        SVector::<f64, 6>::new(
            self.moment.x,
            self.moment.y,
            self.moment.z,
            self.force.x,
            self.force.y,
            self.force.z,
        )
    }

    /// Unpack from a 6-vector `(mx, my, mz, fx, fy, fz)`.
    pub fn from_vector(v: &SVector<f64, 6>) -> Self {
        Self {
            moment: Vector3::new(v[0], v[1], v[2]),
            force: Vector3::new(v[3], v[4], v[5]),
        }
    }

    /// Express this world-origin wrench about the origin of `frame`, in the
    /// frame's axes.
    pub fn in_frame(&self, frame: &Isometry3<f64>) -> Self {
        let rt = frame.rotation.to_rotation_matrix().matrix().transpose();
        let p = frame.translation.vector;
        Self {
            moment: rt * (self.moment - p.cross(&self.force)),
            force: rt * self.force,
        }
    }

    /// Express a wrench given about the origin of `frame` (in frame axes)
    /// back at the world origin.
    pub fn to_world(&self, frame: &Isometry3<f64>) -> Self {
        let r = *frame.rotation.to_rotation_matrix().matrix();
        let p = frame.translation.vector;
        let force = r * self.force;
        Self {
            moment: r * self.moment + p.cross(&force),
            force,
        }
    }

    /// 6×6 matrix mapping a world-origin wrench vector to the same wrench
    /// expressed about `frame`'s origin in frame axes:
    ///
    /// ```text
    /// ⎡ Rᵀ  −Rᵀ·[p]× ⎤
    /// ⎣ 0       Rᵀ   ⎦
    /// ```
    pub fn dual_matrix(frame: &Isometry3<f64>) -> SMatrix<f64, 6, 6> {
        let rt = frame.rotation.to_rotation_matrix().matrix().transpose();
        let p = frame.translation.vector;
        let top_right = -rt * skew(&p);

        let mut m = SMatrix::<f64, 6, 6>::zeros();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&rt);
        m.fixed_view_mut::<3, 3>(0, 3).copy_from(&top_right);
        m.fixed_view_mut::<3, 3>(3, 3).copy_from(&rt);
        m
    }
}

impl Add for Wrench {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            moment: self.moment + rhs.moment,
            force: self.force + rhs.force,
        }
    }
}

impl AddAssign for Wrench {
    fn add_assign(&mut self, rhs: Self) {
        self.moment += rhs.moment;
        self.force += rhs.force;
    }
}

impl Sub for Wrench {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            moment: self.moment - rhs.moment,
            force: self.force - rhs.force,
        }
    }
}

impl Neg for Wrench {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            moment: -self.moment,
            force: -self.force,
        }
    }
}

impl Mul<Wrench> for f64 {
    type Output = Wrench;
    fn mul(self, rhs: Wrench) -> Wrench {
        Wrench {
            moment: self * rhs.moment,
            force: self * rhs.force,
        }
    }
}

/// Skew-symmetric cross-product matrix `[v]×`.
fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

// ---------------------------------------------------------------------------
// ZMP
// ---------------------------------------------------------------------------

/// Zero-moment point of a world-origin wrench with respect to a ground
/// frame, in world coordinates.
///
/// The ZMP is the point of the frame's `z = 0` plane about which the
/// tangential moment of the wrench vanishes. Returns
/// [`StabilizerError::MeasurementDegenerate`] when the normal component of
/// the force is below `min_force` (no meaningful contact).
pub fn zmp_from_wrench(
    wrench: &Wrench,
    frame: &Isometry3<f64>,
    min_force: f64,
) -> Result<Vector3<f64>, StabilizerError> {
    let normal = frame.rotation * Vector3::z();
    let normal_force = normal.dot(&wrench.force);
    if normal_force < min_force {
        return Err(StabilizerError::MeasurementDegenerate {
            net_force: normal_force,
        });
    }
    let p = frame.translation.vector;
    let moment_at_p = wrench.moment - p.cross(&wrench.force);
    Ok(p + normal.cross(&moment_at_p) / normal_force)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
