//! Read-only robot handles.
//!
//! The stabilizer does not own a rigid-body library; it consumes a narrow
//! view of the robot maintained by the host: total mass, the estimated CoM
//! state, named surface frames with their sole geometry and measured contact
//! wrenches, and named body orientations. The host (model update + state
//! estimator) writes these between ticks; the stabilizer only reads them
//! during `run()`.

use std::collections::BTreeMap;

use nalgebra::{Isometry3, UnitQuaternion, Vector3};

use crate::contact::SoleGeometry;
use crate::error::ConfigError;
use crate::wrench::Wrench;

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

/// A named contact surface of the robot.
#[derive(Clone, Debug)]
pub struct Surface {
    /// Surface pose in the world frame (sole center, z up), from forward
    /// kinematics.
    pub pose: Isometry3<f64>,
    /// Sole geometry of this surface.
    pub geometry: SoleGeometry,
    /// Measured contact wrench about the surface origin, in surface axes.
    pub wrench: Wrench,
}

impl Surface {
    /// Create a surface with the given geometry at the identity pose and
    /// zero measured wrench.
    pub fn new(geometry: SoleGeometry) -> Self {
        Self {
            pose: Isometry3::identity(),
            geometry,
            wrench: Wrench::zero(),
        }
    }
}

// ---------------------------------------------------------------------------
// Robot
// ---------------------------------------------------------------------------

/// One robot instance (control model or estimated real state).
#[derive(Clone, Debug)]
pub struct Robot {
    name: String,
    mass: f64,
    base_body: String,
    com: Vector3<f64>,
    com_velocity: Vector3<f64>,
    surfaces: BTreeMap<String, Surface>,
    bodies: BTreeMap<String, UnitQuaternion<f64>>,
}

impl Robot {
    /// Create a robot with the given name and total mass in kg.
    pub fn new(name: impl Into<String>, mass: f64) -> Self {
        Self {
            name: name.into(),
            mass,
            base_body: "base".into(),
            com: Vector3::zeros(),
            com_velocity: Vector3::zeros(),
            surfaces: BTreeMap::new(),
            bodies: BTreeMap::new(),
        }
    }

    /// Register a contact surface.
    #[must_use]
    pub fn with_surface(mut self, name: impl Into<String>, geometry: SoleGeometry) -> Self {
        self.surfaces.insert(name.into(), Surface::new(geometry));
        self
    }

    /// Register a named body whose orientation the host tracks.
    #[must_use]
    pub fn with_body(mut self, name: impl Into<String>) -> Self {
        self.bodies.insert(name.into(), UnitQuaternion::identity());
        self
    }

    /// Name the floating base body (pelvis).
    #[must_use]
    pub fn with_base_body(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.bodies.entry(name.clone()).or_insert_with(UnitQuaternion::identity);
        self.base_body = name;
        self
    }

    /// Robot name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total mass in kg.
    pub const fn mass(&self) -> f64 {
        self.mass
    }

    /// Name of the floating base body.
    pub fn base_body(&self) -> &str {
        &self.base_body
    }

    /// Estimated CoM position in m.
    pub const fn com(&self) -> Vector3<f64> {
        self.com
    }

    /// Estimated CoM velocity in m/s.
    pub const fn com_velocity(&self) -> Vector3<f64> {
        self.com_velocity
    }

    /// Look up a surface by name.
    pub fn surface(&self, name: &str) -> Result<&Surface, ConfigError> {
        self.surfaces
            .get(name)
            .ok_or_else(|| ConfigError::UnknownSurface(name.into()))
    }

    /// Orientation of a named body in the world frame.
    pub fn body_orientation(&self, name: &str) -> Result<UnitQuaternion<f64>, ConfigError> {
        self.bodies
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownBody(name.into()))
    }

    // -- host-side writers -------------------------------------------------

    /// Update the estimated CoM state.
    pub fn set_com_state(&mut self, com: Vector3<f64>, com_velocity: Vector3<f64>) {
        self.com = com;
        self.com_velocity = com_velocity;
    }

    /// Update a surface pose from forward kinematics.
    pub fn set_surface_pose(&mut self, name: &str, pose: Isometry3<f64>) {
        if let Some(surface) = self.surfaces.get_mut(name) {
            surface.pose = pose;
        }
    }

    /// Update a measured surface wrench (surface frame).
    pub fn set_surface_wrench(&mut self, name: &str, wrench: Wrench) {
        if let Some(surface) = self.surfaces.get_mut(name) {
            surface.wrench = wrench;
        }
    }

    /// Update a body orientation.
    pub fn set_body_orientation(&mut self, name: &str, orientation: UnitQuaternion<f64>) {
        if let Some(body) = self.bodies.get_mut(name) {
            *body = orientation;
        }
    }
}

// ---------------------------------------------------------------------------
// Robots
// ---------------------------------------------------------------------------

/// A set of robot instances addressed by index.
#[derive(Clone, Debug, Default)]
pub struct Robots {
    robots: Vec<Robot>,
}

impl Robots {
    /// Create an empty set.
    pub const fn new() -> Self {
        Self { robots: Vec::new() }
    }

    /// Add a robot, returning its index.
    pub fn add(&mut self, robot: Robot) -> usize {
        self.robots.push(robot);
        self.robots.len() - 1
    }

    /// Borrow a robot by index.
    pub fn robot(&self, index: usize) -> Result<&Robot, ConfigError> {
        self.robots.get(index).ok_or(ConfigError::UnknownRobot(index))
    }

    /// Mutably borrow a robot by index (host side).
    pub fn robot_mut(&mut self, index: usize) -> Result<&mut Robot, ConfigError> {
        self.robots
            .get_mut(index)
            .ok_or(ConfigError::UnknownRobot(index))
    }

    /// Number of robots.
    pub fn len(&self) -> usize {
        self.robots.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_robot() -> Robot {
        Robot::new("biped", 38.0)
            .with_surface("LeftFootCenter", SoleGeometry::new(0.11, 0.05, 0.7))
            .with_surface("RightFootCenter", SoleGeometry::new(0.11, 0.05, 0.7))
            .with_base_body("pelvis")
            .with_body("torso")
    }

    #[test]
    fn surface_lookup() {
        let robot = test_robot();
        assert!(robot.surface("LeftFootCenter").is_ok());
        assert!(matches!(
            robot.surface("Hand"),
            Err(ConfigError::UnknownSurface(_))
        ));
    }

    #[test]
    fn host_writers_update_state() {
        let mut robots = Robots::new();
        let index = robots.add(test_robot());
        {
            let robot = robots.robot_mut(index).unwrap();
            robot.set_com_state(Vector3::new(0.0, 0.0, 0.78), Vector3::new(0.1, 0.0, 0.0));
            robot.set_surface_wrench(
                "LeftFootCenter",
                Wrench::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 190.0)),
            );
        }
        let robot = robots.robot(index).unwrap();
        assert_relative_eq!(robot.com().z, 0.78);
        assert_relative_eq!(robot.com_velocity().x, 0.1);
        assert_relative_eq!(
            robot.surface("LeftFootCenter").unwrap().wrench.force.z,
            190.0
        );
    }

    #[test]
    fn base_body_is_registered() {
        let robot = test_robot();
        assert_eq!(robot.base_body(), "pelvis");
        assert!(robot.body_orientation("pelvis").is_ok());
        assert!(robot.body_orientation("torso").is_ok());
        assert!(robot.body_orientation("head").is_err());
    }

    #[test]
    fn unknown_robot_index() {
        let robots = Robots::new();
        assert!(matches!(robots.robot(0), Err(ConfigError::UnknownRobot(0))));
    }
}
