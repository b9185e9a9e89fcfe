//! Linearized contact-wrench-cone face matrix.

use nalgebra::SMatrix;

/// H-representation of the contact wrench cone of a rectangular planar
/// contact.
///
/// Returns the 16×6 matrix `A` such that a surface-frame wrench
/// `w = (mx, my, mz, fx, fy, fz)` is admissible iff `A · w ≤ 0`. Rows
/// combine the linearized friction pyramid (4), center-of-pressure bounds
/// over the sole rectangle (4), and yaw-torque bounds coupling `mz` with the
/// force and tangential moments (8).
///
/// `half_length` bounds the CoP along x, `half_width` along y, `friction`
/// is the Coulomb coefficient.
pub fn wrench_face_matrix(half_length: f64, half_width: f64, friction: f64) -> SMatrix<f64, 16, 6> {
    let x = half_length;
    let y = half_width;
    let mu = friction;
    SMatrix::<f64, 16, 6>::from_row_slice(&[
        // mx,  my,   mz,  fx,   fy,   fz
        0.0, 0.0, 0.0, -1.0, 0.0, -mu,
        0.0, 0.0, 0.0, 1.0, 0.0, -mu,
        0.0, 0.0, 0.0, 0.0, -1.0, -mu,
        0.0, 0.0, 0.0, 0.0, 1.0, -mu,
        -1.0, 0.0, 0.0, 0.0, 0.0, -y,
        1.0, 0.0, 0.0, 0.0, 0.0, -y,
        0.0, -1.0, 0.0, 0.0, 0.0, -x,
        0.0, 1.0, 0.0, 0.0, 0.0, -x,
        mu, mu, -1.0, -y, -x, -(x + y) * mu,
        mu, -mu, -1.0, -y, x, -(x + y) * mu,
        -mu, mu, -1.0, y, -x, -(x + y) * mu,
        -mu, -mu, -1.0, y, x, -(x + y) * mu,
        mu, mu, 1.0, y, x, -(x + y) * mu,
        mu, -mu, 1.0, y, -x, -(x + y) * mu,
        -mu, mu, 1.0, -y, x, -(x + y) * mu,
        -mu, -mu, 1.0, -y, -x, -(x + y) * mu,
    ])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
