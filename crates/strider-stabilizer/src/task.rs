//! Cartesian tracking tasks emitted to the downstream whole-body program.
//!
//! The stabilizer is a composite objective over five leaves: the CoM, one
//! CoP task per foot, and the pelvis and torso orientations. Leaves expose
//! the [`Task`] capability set; the aggregate `eval`/`speed` vectors are
//! concatenations in the fixed order CoM, left foot, right foot.

use nalgebra::{DVector, Isometry3, UnitQuaternion, Vector2, Vector3};

use strider_core::config::{MAX_FDC_RX_VEL, MAX_FDC_RY_VEL, MAX_FDC_RZ_VEL};
use strider_core::contact::ContactState;
use strider_core::robot::Robots;
use strider_core::wrench::Wrench;

// ---------------------------------------------------------------------------
// SolverSink
// ---------------------------------------------------------------------------

/// Registration surface of the downstream whole-body solver.
///
/// The solver itself is an external collaborator; tasks only declare their
/// objective (name, dimension, weight) to it and withdraw it again.
pub trait SolverSink {
    /// Register an objective.
    fn add_task(&mut self, name: &str, dim: usize, weight: f64);

    /// Withdraw an objective.
    fn remove_task(&mut self, name: &str);
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A leaf tracking objective.
pub trait Task {
    /// Objective name, unique within the solver.
    fn name(&self) -> &str;

    /// Dimension of the task error vector.
    fn dim(&self) -> usize;

    /// Register this task with the downstream solver.
    fn add_to_solver(&self, solver: &mut dyn SolverSink);

    /// Withdraw this task from the downstream solver.
    fn remove_from_solver(&self, solver: &mut dyn SolverSink);

    /// Refresh measured quantities and servo the target, once per tick.
    fn update(&mut self, robots: &Robots, real_robots: &Robots, robot_index: usize);

    /// Task error (target − measured).
    fn eval(&self) -> DVector<f64>;

    /// Task error velocity (reference feedforward minus measured rate where
    /// available).
    fn speed(&self) -> DVector<f64>;
}

// ---------------------------------------------------------------------------
// ComTask
// ---------------------------------------------------------------------------

/// Center-of-mass position tracking.
#[derive(Clone, Debug)]
pub struct ComTask {
    target: Vector3<f64>,
    target_velocity: Vector3<f64>,
    target_accel: Vector3<f64>,
    measured: Vector3<f64>,
    measured_velocity: Vector3<f64>,
    /// Per-axis task stiffness.
    pub stiffness: Vector3<f64>,
    /// Task weight in the downstream program.
    pub weight: f64,
}

impl ComTask {
    pub fn new() -> Self {
        Self {
            target: Vector3::zeros(),
            target_velocity: Vector3::zeros(),
            target_accel: Vector3::zeros(),
            measured: Vector3::zeros(),
            measured_velocity: Vector3::zeros(),
            stiffness: Vector3::new(1000.0, 1000.0, 100.0),
            weight: 1000.0,
        }
    }

    /// Set position, velocity and acceleration targets for this tick.
    pub fn set_targets(
        &mut self,
        com: Vector3<f64>,
        comd: Vector3<f64>,
        comdd: Vector3<f64>,
    ) {
        self.target = com;
        self.target_velocity = comd;
        self.target_accel = comdd;
    }

    /// Current position target.
    pub const fn target(&self) -> Vector3<f64> {
        self.target
    }

    /// Current acceleration target (feedforward for the downstream program).
    pub const fn target_accel(&self) -> Vector3<f64> {
        self.target_accel
    }
}

impl Default for ComTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for ComTask {
    fn name(&self) -> &str {
        "stabilizer_com"
    }

    fn dim(&self) -> usize {
        3
    }

    fn add_to_solver(&self, solver: &mut dyn SolverSink) {
        solver.add_task(self.name(), self.dim(), self.weight);
    }

    fn remove_from_solver(&self, solver: &mut dyn SolverSink) {
        solver.remove_task(self.name());
    }

    fn update(&mut self, _robots: &Robots, real_robots: &Robots, robot_index: usize) {
        if let Ok(robot) = real_robots.robot(robot_index) {
            self.measured = robot.com();
            self.measured_velocity = robot.com_velocity();
        }
    }

    fn eval(&self) -> DVector<f64> {
        DVector::from_column_slice((self.target - self.measured).as_slice())
    }

    fn speed(&self) -> DVector<f64> {
        DVector::from_column_slice((self.target_velocity - self.measured_velocity).as_slice())
    }
}

// ---------------------------------------------------------------------------
// CopTask
// ---------------------------------------------------------------------------

/// Foot pose and center-of-pressure tracking with admittance damping.
///
/// The stabilizer writes a target surface pose, a target CoP/wrench and the
/// 6D admittance each tick; `update` servos the target pose from the wrench
/// error (damping control) and integrates the stabilizer's reference
/// velocity. Angular rates are clamped to the foot damping limits.
#[derive(Clone, Debug)]
pub struct CopTask {
    state: ContactState,
    surface: String,
    dt: f64,
    target_pose: Isometry3<f64>,
    target_cop: Vector2<f64>,
    target_wrench: Wrench,
    /// 6D admittance (moment then force axes).
    pub admittance: Wrench,
    /// Task stiffness.
    pub stiffness: f64,
    /// Task damping.
    pub damping: f64,
    /// Task weight in the downstream program.
    pub weight: f64,
    ref_velocity_angular: Vector3<f64>,
    ref_velocity_linear: Vector3<f64>,
    measured_pose: Isometry3<f64>,
    measured_wrench: Wrench,
    name: String,
}

impl CopTask {
    pub fn new(state: ContactState, surface: impl Into<String>, dt: f64) -> Self {
        Self {
            state,
            surface: surface.into(),
            dt,
            target_pose: Isometry3::identity(),
            target_cop: Vector2::zeros(),
            target_wrench: Wrench::zero(),
            admittance: Wrench::zero(),
            stiffness: 2000.0,
            damping: 2.0 * 2000.0_f64.sqrt(),
            weight: 1000.0,
            ref_velocity_angular: Vector3::zeros(),
            ref_velocity_linear: Vector3::zeros(),
            measured_pose: Isometry3::identity(),
            measured_wrench: Wrench::zero(),
            name: format!("stabilizer_{state}_foot"),
        }
    }

    /// Which foot this task controls.
    pub const fn state(&self) -> ContactState {
        self.state
    }

    /// Name of the robot surface this task tracks.
    pub fn surface(&self) -> &str {
        &self.surface
    }

    /// Target surface pose in the world frame.
    pub const fn target_pose(&self) -> &Isometry3<f64> {
        &self.target_pose
    }

    /// Replace the target surface pose.
    pub fn set_target_pose(&mut self, pose: Isometry3<f64>) {
        self.target_pose = pose;
    }

    /// Target CoP in the sole frame.
    pub const fn target_cop(&self) -> Vector2<f64> {
        self.target_cop
    }

    /// Target contact wrench in the surface frame.
    pub const fn target_wrench(&self) -> &Wrench {
        &self.target_wrench
    }

    /// Set the target wrench and the CoP it implies.
    pub fn set_target_wrench(&mut self, wrench: Wrench, cop: Vector2<f64>) {
        self.target_wrench = wrench;
        self.target_cop = cop;
    }

    /// Set the reference velocity integrated into the target pose on the
    /// next `update` (world-frame axes).
    pub fn set_ref_velocity(&mut self, angular: Vector3<f64>, linear: Vector3<f64>) {
        self.ref_velocity_angular = angular;
        self.ref_velocity_linear = linear;
    }

    /// Re-read the measured surface pose and wrench from the estimator.
    ///
    /// Called by the stabilizer at the top of the tick so the force
    /// difference controller and the airborne check see this tick's
    /// measurements; `update` refreshes them again harmlessly.
    pub fn refresh_measurements(&mut self, real_robots: &Robots, robot_index: usize) {
        if let Ok(robot) = real_robots.robot(robot_index) {
            if let Ok(surface) = robot.surface(&self.surface) {
                self.measured_pose = surface.pose;
                self.measured_wrench = surface.wrench;
            }
        }
    }

    /// Measured surface pose in the world frame.
    pub const fn measured_pose(&self) -> &Isometry3<f64> {
        &self.measured_pose
    }

    /// Measured contact wrench in the surface frame.
    pub const fn measured_wrench(&self) -> &Wrench {
        &self.measured_wrench
    }

    /// Clamped angular damping velocity from the wrench error.
    fn damping_velocity(&self) -> Vector3<f64> {
        let moment_error = self.measured_wrench.moment - self.target_wrench.moment;
        Vector3::new(
            (self.admittance.moment.x * moment_error.x).clamp(-MAX_FDC_RX_VEL, MAX_FDC_RX_VEL),
            (self.admittance.moment.y * moment_error.y).clamp(-MAX_FDC_RY_VEL, MAX_FDC_RY_VEL),
            (self.admittance.moment.z * moment_error.z).clamp(-MAX_FDC_RZ_VEL, MAX_FDC_RZ_VEL),
        )
    }
}

impl Task for CopTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn dim(&self) -> usize {
        6
    }

    fn add_to_solver(&self, solver: &mut dyn SolverSink) {
        solver.add_task(&self.name, self.dim(), self.weight);
    }

    fn remove_from_solver(&self, solver: &mut dyn SolverSink) {
        solver.remove_task(&self.name);
    }

    fn update(&mut self, _robots: &Robots, real_robots: &Robots, robot_index: usize) {
        self.refresh_measurements(real_robots, robot_index);

        // Damping control: rotate the sole towards the target CoP, in the
        // surface frame, clamped per axis.
        let damping_velocity = self.damping_velocity();
        if damping_velocity != Vector3::zeros() {
            let rotation = UnitQuaternion::from_scaled_axis(damping_velocity * self.dt);
            self.target_pose.rotation *= rotation;
        }

        // Integrate the stabilizer's reference velocity (world axes).
        self.target_pose.translation.vector += self.ref_velocity_linear * self.dt;
        if self.ref_velocity_angular != Vector3::zeros() {
            let rotation = UnitQuaternion::from_scaled_axis(self.ref_velocity_angular * self.dt);
            self.target_pose.rotation = rotation * self.target_pose.rotation;
        }
    }

    fn eval(&self) -> DVector<f64> {
        let angular = (self.target_pose.rotation * self.measured_pose.rotation.inverse())
            .scaled_axis();
        let linear = self.target_pose.translation.vector - self.measured_pose.translation.vector;
        let mut error = DVector::zeros(6);
        error.fixed_rows_mut::<3>(0).copy_from(&angular);
        error.fixed_rows_mut::<3>(3).copy_from(&linear);
        error
    }

    fn speed(&self) -> DVector<f64> {
        let mut speed = DVector::zeros(6);
        speed.fixed_rows_mut::<3>(0).copy_from(&self.ref_velocity_angular);
        speed.fixed_rows_mut::<3>(3).copy_from(&self.ref_velocity_linear);
        speed
    }
}

// ---------------------------------------------------------------------------
// OrientationTask
// ---------------------------------------------------------------------------

/// Body orientation tracking (pelvis, torso).
#[derive(Clone, Debug)]
pub struct OrientationTask {
    body: String,
    target: UnitQuaternion<f64>,
    measured: UnitQuaternion<f64>,
    /// Task stiffness.
    pub stiffness: f64,
    /// Task weight in the downstream program.
    pub weight: f64,
    name: String,
}

impl OrientationTask {
    pub fn new(body: impl Into<String>) -> Self {
        let body = body.into();
        let name = format!("stabilizer_{body}_orientation");
        Self {
            body,
            target: UnitQuaternion::identity(),
            measured: UnitQuaternion::identity(),
            stiffness: 10.0,
            weight: 100.0,
            name,
        }
    }

    /// Name of the tracked body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Current orientation target.
    pub const fn target(&self) -> UnitQuaternion<f64> {
        self.target
    }

    /// Replace the orientation target.
    pub fn set_target(&mut self, target: UnitQuaternion<f64>) {
        self.target = target;
    }
}

impl Task for OrientationTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn dim(&self) -> usize {
        3
    }

    fn add_to_solver(&self, solver: &mut dyn SolverSink) {
        solver.add_task(&self.name, self.dim(), self.weight);
    }

    fn remove_from_solver(&self, solver: &mut dyn SolverSink) {
        solver.remove_task(&self.name);
    }

    fn update(&mut self, _robots: &Robots, real_robots: &Robots, robot_index: usize) {
        if let Ok(robot) = real_robots.robot(robot_index) {
            if let Ok(orientation) = robot.body_orientation(&self.body) {
                self.measured = orientation;
            }
        }
    }

    fn eval(&self) -> DVector<f64> {
        let error = (self.target * self.measured.inverse()).scaled_axis();
        DVector::from_column_slice(error.as_slice())
    }

    fn speed(&self) -> DVector<f64> {
        DVector::zeros(3)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
