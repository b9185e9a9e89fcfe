//! Planar foot contacts.

use nalgebra::{Isometry3, SMatrix, Vector2, Vector3};

use crate::cone::wrench_face_matrix;

// ---------------------------------------------------------------------------
// ContactState
// ---------------------------------------------------------------------------

/// Which foot a contact belongs to.
///
/// The variants double as dense array indices (Left = 0, Right = 1) so the
/// per-tick pipeline can iterate contacts in a fixed order without hashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContactState {
    Left,
    Right,
}

impl ContactState {
    /// All states, in iteration order.
    pub const ALL: [Self; 2] = [Self::Left, Self::Right];

    /// Dense slot index of this state.
    pub const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    /// The other foot.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl std::fmt::Display for ContactState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
        }
    }
}

// ---------------------------------------------------------------------------
// SoleGeometry
// ---------------------------------------------------------------------------

/// Static geometry of a foot sole.
#[derive(Clone, Copy, Debug)]
pub struct SoleGeometry {
    /// Sole half-length along x in m (x points towards the toes).
    pub half_length: f64,
    /// Sole half-width along y in m.
    pub half_width: f64,
    /// Coulomb friction coefficient of the sole.
    pub friction: f64,
    /// Position of the ankle in the surface frame (surface origin at the
    /// sole center, z from the ground up).
    pub ankle_offset: Vector3<f64>,
}

impl SoleGeometry {
    /// Create a sole geometry with the ankle directly above the sole center.
    pub fn new(half_length: f64, half_width: f64, friction: f64) -> Self {
        Self {
            half_length,
            half_width,
            friction,
            ankle_offset: Vector3::zeros(),
        }
    }

    /// Set the ankle position in the surface frame.
    #[must_use]
    pub const fn with_ankle_offset(mut self, offset: Vector3<f64>) -> Self {
        self.ankle_offset = offset;
        self
    }
}

// ---------------------------------------------------------------------------
// Contact
// ---------------------------------------------------------------------------

/// Immutable description of one established foot contact.
///
/// Built by `set_contacts` from an ankle pose and the sole geometry of the
/// corresponding surface; replaced wholesale on the next contact switch,
/// never mutated.
#[derive(Clone, Debug)]
pub struct Contact {
    state: ContactState,
    ankle_pose: Isometry3<f64>,
    surface_pose: Isometry3<f64>,
    half_length: f64,
    half_width: f64,
    friction: f64,
}

impl Contact {
    /// Create a contact at `ankle_pose` (world frame) for a sole of the
    /// given geometry.
    pub fn new(state: ContactState, ankle_pose: Isometry3<f64>, geometry: &SoleGeometry) -> Self {
        let offset = geometry.ankle_offset;
        let surface_pose = ankle_pose * Isometry3::translation(-offset.x, -offset.y, -offset.z);
        Self {
            state,
            ankle_pose,
            surface_pose,
            half_length: geometry.half_length,
            half_width: geometry.half_width,
            friction: geometry.friction,
        }
    }

    /// Which foot this contact belongs to.
    pub const fn state(&self) -> ContactState {
        self.state
    }

    /// Ankle pose in the world frame.
    pub const fn ankle_pose(&self) -> &Isometry3<f64> {
        &self.ankle_pose
    }

    /// Surface (sole-center) pose in the world frame.
    pub const fn surface_pose(&self) -> &Isometry3<f64> {
        &self.surface_pose
    }

    /// Sole half-length along x in m.
    pub const fn half_length(&self) -> f64 {
        self.half_length
    }

    /// Sole half-width along y in m.
    pub const fn half_width(&self) -> f64 {
        self.half_width
    }

    /// Coulomb friction coefficient.
    pub const fn friction(&self) -> f64 {
        self.friction
    }

    /// Contact-wrench-cone face matrix of this contact, in the surface frame.
    pub fn wrench_cone(&self) -> SMatrix<f64, 16, 6> {
        wrench_face_matrix(self.half_length, self.half_width, self.friction)
    }

    /// Clamp a surface-frame CoP to the sole rectangle.
    pub fn clamp_cop(&self, cop: Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            cop.x.clamp(-self.half_length, self.half_length),
            cop.y.clamp(-self.half_width, self.half_width),
        )
    }

    /// Whether a surface-frame CoP lies inside the sole rectangle, up to
    /// `tol`.
    pub fn cop_inside(&self, cop: &Vector2<f64>, tol: f64) -> bool {
        cop.x.abs() <= self.half_length + tol && cop.y.abs() <= self.half_width + tol
    }

    /// Sole corners in world coordinates, counterclockwise.
    pub fn world_corners(&self) -> [Vector3<f64>; 4] {
        let x = self.half_length;
        let y = self.half_width;
        [
            self.surface_pose * nalgebra::Point3::new(x, y, 0.0),
            self.surface_pose * nalgebra::Point3::new(-x, y, 0.0),
            self.surface_pose * nalgebra::Point3::new(-x, -y, 0.0),
            self.surface_pose * nalgebra::Point3::new(x, -y, 0.0),
        ]
        .map(|p| p.coords)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn state_indices_are_dense() {
        assert_eq!(ContactState::Left.index(), 0);
        assert_eq!(ContactState::Right.index(), 1);
        assert_eq!(ContactState::Left.opposite(), ContactState::Right);
    }

    #[test]
    fn surface_pose_accounts_for_ankle_offset() {
        let geometry = SoleGeometry::new(0.11, 0.05, 0.7)
            .with_ankle_offset(Vector3::new(-0.015, 0.0, 0.1));
        let ankle = Isometry3::translation(0.3, 0.1, 0.1);
        let contact = Contact::new(ContactState::Left, ankle, &geometry);
        assert_relative_eq!(
            contact.surface_pose().translation.vector,
            Vector3::new(0.315, 0.1, 0.0),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            contact.ankle_pose().translation.vector,
            Vector3::new(0.3, 0.1, 0.1),
            epsilon = 1e-12
        );
    }

    #[test]
    fn cop_clamping() {
        let geometry = SoleGeometry::new(0.1, 0.05, 0.7);
        let contact = Contact::new(ContactState::Right, Isometry3::identity(), &geometry);
        let clamped = contact.clamp_cop(Vector2::new(0.2, -0.2));
        assert_relative_eq!(clamped, Vector2::new(0.1, -0.05));
        assert!(contact.cop_inside(&clamped, 1e-9));
        assert!(!contact.cop_inside(&Vector2::new(0.11, 0.0), 1e-6));
    }

    #[test]
    fn world_corners_span_the_sole() {
        let geometry = SoleGeometry::new(0.1, 0.05, 0.7);
        let contact =
            Contact::new(ContactState::Left, Isometry3::translation(1.0, 0.0, 0.0), &geometry);
        let corners = contact.world_corners();
        assert_relative_eq!(corners[0], Vector3::new(1.1, 0.05, 0.0), epsilon = 1e-12);
        assert_relative_eq!(corners[2], Vector3::new(0.9, -0.05, 0.0), epsilon = 1e-12);
    }
}
