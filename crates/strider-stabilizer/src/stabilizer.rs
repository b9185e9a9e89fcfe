//! Stabilizer orchestrator.
//!
//! Owns the tracking tasks, the contact map, the DCM filter bank and the
//! wrench distributor, and advances them one control tick per [`run`]
//! call:
//!
//! 1. clamp gains
//! 2. ingest estimator measurements
//! 3. airborne check
//! 4. ZMP frame from the contact set
//! 5. left foot ratio from the reference ZMP
//! 6. support foot admittances
//! 7. desired wrench from DCM feedback
//! 8. wrench distribution (or single-support projection) + foot CoP targets
//! 9. foot force difference control
//! 10. CoM / pelvis / torso targets, task servo
//!
//! [`run`]: StabilizerTask::run
//!
//! Degraded modes (airborne robot, infeasible distribution, degenerate
//! measurements, invalid targets) are absorbed here: outputs keep their
//! shape, feedback is muted, and the host only sees logged warnings.

use log::{debug, warn};
use nalgebra::{DVector, Isometry3, Translation3, UnitQuaternion, Vector2, Vector3};

use strider_core::config::StabilizerConfig;
use strider_core::contact::{Contact, ContactState, SoleGeometry};
use strider_core::error::StabilizerError;
use strider_core::pendulum::PendulumRef;
use strider_core::robot::Robots;
use strider_core::wrench::{zmp_from_wrench, Wrench};
use strider_core::{MIN_DS_PRESSURE, MIN_NET_TOTAL_FORCE_ZMP};
use strider_signal::LeakyIntegrator;

use crate::control::DcmFeedback;
use crate::distribution::WrenchDistributor;
use crate::fdc::FootForceDifference;
use crate::task::{ComTask, CopTask, OrientationTask, SolverSink, Task};

/// Elementwise saturation of the CoM admittance offset in m.
const MAX_COM_OFFSET: f64 = 0.05;

// ---------------------------------------------------------------------------
// StabilizerState
// ---------------------------------------------------------------------------

/// Operating state of the stabilizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StabilizerState {
    /// Feedback gains zeroed; tasks track the reference passively.
    Disabled,
    /// Nominal closed-loop operation.
    Enabled,
    /// No usable contact force; targets frozen, no feedback emitted.
    Airborne,
}

// ---------------------------------------------------------------------------
// StabilizerTask
// ---------------------------------------------------------------------------

/// Walking stabilizer for a biped robot.
///
/// Composite tracking objective over the CoM, the two foot CoP tasks and
/// the pelvis/torso orientations. Aggregate `eval`/`speed` vectors are the
/// concatenation CoM, left foot, right foot.
pub struct StabilizerTask {
    robot_index: usize,
    dt: f64,
    mass: f64,
    sole_geometries: [SoleGeometry; 2],

    default_config: StabilizerConfig,
    config: StabilizerConfig,

    contacts: [Option<Contact>; 2],

    com_task: ComTask,
    foot_tasks: [CopTask; 2],
    pelvis_task: OrientationTask,
    torso_task: OrientationTask,

    reference: PendulumRef,

    measured_com: Vector3<f64>,
    measured_comd: Vector3<f64>,
    measured_zmp: Vector3<f64>,
    measured_dcm: Vector3<f64>,
    measured_net_wrench: Wrench,

    dcm_feedback: DcmFeedback,
    com_offset_integrator: LeakyIntegrator,
    com_offset: Vector3<f64>,

    fdc: FootForceDifference,

    distributor: WrenchDistributor,
    desired_wrench: Wrench,
    foot_wrenches: [Wrench; 2],
    distrib_wrench: Wrench,
    distrib_zmp: Vector3<f64>,

    zmp_frame: Isometry3<f64>,
    left_foot_ratio: f64,
    state: StabilizerState,
    t: f64,
}

impl StabilizerTask {
    /// Build a stabilizer for the robot at `robot_index`.
    ///
    /// Snapshots the mass and sole geometries from the control model and
    /// checks that both models expose the foot surfaces and the torso body.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        robots: &Robots,
        real_robots: &Robots,
        robot_index: usize,
        left_foot_surface: &str,
        right_foot_surface: &str,
        torso_body: &str,
        dt: f64,
    ) -> Result<Self, StabilizerError> {
        let robot = robots.robot(robot_index)?;
        let real = real_robots.robot(robot_index)?;

        let left_geometry = robot.surface(left_foot_surface)?.geometry;
        let right_geometry = robot.surface(right_foot_surface)?.geometry;
        real.surface(left_foot_surface)?;
        real.surface(right_foot_surface)?;
        robot.body_orientation(torso_body)?;
        let pelvis_body = robot.base_body().to_string();

        let config = StabilizerConfig::default();
        let mut stabilizer = Self {
            robot_index,
            dt,
            mass: robot.mass(),
            sole_geometries: [left_geometry, right_geometry],
            default_config: config.clone(),
            config: config.clone(),
            contacts: [None, None],
            com_task: ComTask::new(),
            foot_tasks: [
                CopTask::new(ContactState::Left, left_foot_surface, dt),
                CopTask::new(ContactState::Right, right_foot_surface, dt),
            ],
            pelvis_task: OrientationTask::new(pelvis_body),
            torso_task: OrientationTask::new(torso_body),
            reference: PendulumRef::default(),
            measured_com: Vector3::zeros(),
            measured_comd: Vector3::zeros(),
            measured_zmp: Vector3::zeros(),
            measured_dcm: Vector3::zeros(),
            measured_net_wrench: Wrench::zero(),
            dcm_feedback: DcmFeedback::new(&config, dt),
            com_offset_integrator: LeakyIntegrator::new(config.com_offset_leak_rate)
                .with_saturation(MAX_COM_OFFSET),
            com_offset: Vector3::zeros(),
            fdc: FootForceDifference::new(),
            distributor: WrenchDistributor::new(),
            desired_wrench: Wrench::zero(),
            foot_wrenches: [Wrench::zero(); 2],
            distrib_wrench: Wrench::zero(),
            distrib_zmp: Vector3::zeros(),
            zmp_frame: Isometry3::identity(),
            left_foot_ratio: 0.5,
            state: StabilizerState::Enabled,
            t: 0.0,
        };
        stabilizer.reset(robots);
        Ok(stabilizer)
    }

    // -- lifecycle ---------------------------------------------------------

    /// Reset tasks, filters and errors to their defaults, targeting the
    /// control model's current posture.
    pub fn reset(&mut self, robots: &Robots) {
        let Ok(robot) = robots.robot(self.robot_index) else {
            warn!("stabilizer reset: no robot at index {}", self.robot_index);
            return;
        };

        self.config = self.default_config.clone();
        self.commit_config();

        self.dcm_feedback.reset();
        self.com_offset_integrator.reset();
        self.com_offset = Vector3::zeros();
        self.fdc.reset();

        self.reference = PendulumRef::stationary(robot.com(), self.zmp_frame.translation.z)
            .unwrap_or_default();
        self.measured_com = self.reference.com;
        self.measured_comd = Vector3::zeros();
        self.measured_zmp = self.reference.zmp;
        self.measured_dcm = self.reference.dcm;
        self.measured_net_wrench = Wrench::zero();

        self.com_task
            .set_targets(self.reference.com, Vector3::zeros(), Vector3::zeros());
        for task in &mut self.foot_tasks {
            if let Ok(surface) = robot.surface(task.surface()) {
                task.set_target_pose(surface.pose);
            }
            task.set_target_wrench(Wrench::zero(), Vector2::zeros());
            task.set_ref_velocity(Vector3::zeros(), Vector3::zeros());
        }
        if let Ok(orientation) = robot.body_orientation(self.pelvis_task.body()) {
            self.pelvis_task.set_target(orientation);
        }
        if let Ok(orientation) = robot.body_orientation(self.torso_task.body()) {
            self.torso_task.set_target(orientation);
        }

        self.desired_wrench = Wrench::zero();
        self.foot_wrenches = [Wrench::zero(); 2];
        self.distrib_wrench = Wrench::zero();
        self.distrib_zmp = self.zmp_frame.translation.vector;
        self.left_foot_ratio = 0.5;
        self.state = StabilizerState::Enabled;
        self.t = 0.0;
    }

    /// Re-enable feedback: zero the filters and commit the last configured
    /// gains.
    pub fn enable(&mut self) {
        self.config = self.default_config.clone();
        self.commit_config();
        self.dcm_feedback.reset();
        self.com_offset_integrator.reset();
        self.com_offset = Vector3::zeros();
        self.fdc.reset();
        self.t = 0.0;
        self.state = StabilizerState::Enabled;
    }

    /// Mute all feedback; tasks keep tracking the raw reference.
    pub fn disable(&mut self) {
        self.config = self.default_config.passive();
        self.commit_config();
        self.state = StabilizerState::Disabled;
    }

    /// Replace the stored configuration. Out-of-range gains are clamped with
    /// a warning; non-positive filter time constants are floored to the
    /// control period.
    pub fn configure(&mut self, mut config: StabilizerConfig) {
        config.clamp(true);
        if config.dcm_integrator_time_constant <= 0.0 {
            warn!(
                "dcm_integrator_time_constant = {} must be > 0, flooring to dt",
                config.dcm_integrator_time_constant
            );
            config.dcm_integrator_time_constant = self.dt;
        }
        if config.dcm_derivator_time_constant <= 0.0 {
            warn!(
                "dcm_derivator_time_constant = {} must be > 0, flooring to dt",
                config.dcm_derivator_time_constant
            );
            config.dcm_derivator_time_constant = self.dt;
        }
        self.default_config = config.clone();
        if self.state == StabilizerState::Disabled {
            self.config = config.passive();
        } else {
            self.config = config;
        }
        self.commit_config();
    }

    /// Restore the last configuration passed to [`configure`](Self::configure).
    pub fn reconfigure(&mut self) {
        self.config = if self.state == StabilizerState::Disabled {
            self.default_config.passive()
        } else {
            self.default_config.clone()
        };
        self.commit_config();
    }

    /// Committed configuration.
    pub const fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    fn commit_config(&mut self) {
        self.dcm_feedback.apply_time_constants(&self.config);
        self.com_offset_integrator
            .set_rate(self.config.com_offset_leak_rate);

        self.com_task.stiffness = Vector3::from_column_slice(&self.config.com_stiffness);
        self.com_task.weight = self.config.com_weight;
        for task in &mut self.foot_tasks {
            task.stiffness = self.config.foot_stiffness;
            task.damping = self.config.foot_damping;
            task.weight = self.config.foot_weight;
        }
        self.pelvis_task.stiffness = self.config.pelvis_stiffness;
        self.pelvis_task.weight = self.config.pelvis_weight;
        self.torso_task.stiffness = self.config.torso_stiffness;
        self.torso_task.weight = self.config.torso_weight;
    }

    // -- targets and contacts ----------------------------------------------

    /// Provide the dynamic reference for this tick, as produced by a
    /// pendulum-consistent pattern generator.
    pub fn target(
        &mut self,
        com: Vector3<f64>,
        comd: Vector3<f64>,
        comdd: Vector3<f64>,
        zmp: Vector3<f64>,
    ) {
        match PendulumRef::dynamic(com, comd, comdd, zmp) {
            Ok(reference) => self.reference = reference,
            Err(error) => warn!("stabilizer target rejected: {error}"),
        }
    }

    /// Provide a static reference: zero velocity and acceleration, ZMP at
    /// the ground projection of the CoM.
    pub fn static_target(&mut self, com: Vector3<f64>) {
        match PendulumRef::stationary(com, self.zmp_frame.translation.z) {
            Ok(reference) => self.reference = reference,
            Err(error) => warn!("stabilizer static target rejected: {error}"),
        }
    }

    /// Replace the contact set (1 or 2 contacts; an empty set sends the
    /// stabilizer airborne).
    pub fn set_contacts(&mut self, contacts: &[(ContactState, Isometry3<f64>)]) {
        self.contacts = [None, None];
        for (state, ankle_pose) in contacts {
            let geometry = self.sole_geometries[state.index()];
            let contact = Contact::new(*state, *ankle_pose, &geometry);
            let task = &mut self.foot_tasks[state.index()];
            task.set_target_pose(*contact.surface_pose());
            task.set_target_wrench(Wrench::zero(), Vector2::zeros());
            self.contacts[state.index()] = Some(contact);
        }

        if contacts.is_empty() {
            warn!("stabilizer: {}", StabilizerError::ContactMissing);
            if self.state != StabilizerState::Disabled {
                self.state = StabilizerState::Airborne;
            }
        } else {
            // Recovery from Airborne waits for the force check of the next
            // tick; registering contacts alone is not enough.
            self.update_zmp_frame();
        }
    }

    // -- per-tick pipeline -------------------------------------------------

    /// Advance one control tick. Never panics; degraded measurements mute
    /// the feedback instead.
    pub fn run(&mut self, robots: &Robots, real_robots: &Robots) {
        self.check_gains();

        if real_robots.robot(self.robot_index).is_err() {
            warn!("stabilizer run: no real robot at index {}", self.robot_index);
            return;
        }
        self.update_state(real_robots);
        self.check_in_the_air();

        if self.state == StabilizerState::Airborne {
            // Freeze foot targets: no feedback, no servo.
            self.fdc.reset();
            for task in &mut self.foot_tasks {
                task.set_ref_velocity(Vector3::zeros(), Vector3::zeros());
                task.admittance = Wrench::zero();
            }
        } else {
            self.update_zmp_frame();
            self.compute_left_foot_ratio();
            self.set_support_foot_gains();
            self.desired_wrench = self.dcm_feedback.desired_wrench(
                &self.config,
                &self.reference,
                &self.measured_com,
                &self.measured_dcm,
                self.mass,
            );
            self.distribute_wrench();
            self.update_foot_force_difference_control();
            self.update_com_offset();
        }

        self.update_task_targets();
        self.com_task.update(robots, real_robots, self.robot_index);
        for task in &mut self.foot_tasks {
            task.update(robots, real_robots, self.robot_index);
        }
        self.pelvis_task.update(robots, real_robots, self.robot_index);
        self.torso_task.update(robots, real_robots, self.robot_index);

        self.t += self.dt;
    }

    fn check_gains(&mut self) {
        self.config.clamp(false);
    }

    fn update_state(&mut self, real_robots: &Robots) {
        let Ok(robot) = real_robots.robot(self.robot_index) else {
            return;
        };
        self.measured_com = robot.com();
        self.measured_comd = robot.com_velocity();

        for task in &mut self.foot_tasks {
            task.refresh_measurements(real_robots, self.robot_index);
        }

        let mut net = Wrench::zero();
        for task in &self.foot_tasks {
            net += task.measured_wrench().to_world(task.measured_pose());
        }
        self.measured_net_wrench = net;

        // A degenerate net force keeps the previous ZMP; the airborne check
        // right after mutes the feedback that would have consumed it.
        if let Ok(zmp) = zmp_from_wrench(&net, &self.zmp_frame, MIN_NET_TOTAL_FORCE_ZMP) {
            self.measured_zmp = zmp;
        }

        self.measured_dcm = self.measured_com + self.measured_comd / self.reference.omega;
    }

    fn check_in_the_air(&mut self) {
        let has_contact = self.contacts.iter().any(Option::is_some);
        let grounded = self.measured_net_wrench.force.z >= MIN_NET_TOTAL_FORCE_ZMP;
        match self.state {
            StabilizerState::Disabled => {}
            StabilizerState::Enabled => {
                if !grounded || !has_contact {
                    warn!(
                        "stabilizer: airborne (net vertical force {:.2} N)",
                        self.measured_net_wrench.force.z
                    );
                    self.state = StabilizerState::Airborne;
                }
            }
            StabilizerState::Airborne => {
                if grounded && has_contact {
                    debug!("stabilizer: touchdown, resuming feedback");
                    self.state = StabilizerState::Enabled;
                }
            }
        }
    }

    fn update_zmp_frame(&mut self) {
        match (&self.contacts[0], &self.contacts[1]) {
            (Some(left), Some(right)) => {
                let left_ankle = left.ankle_pose().translation.vector;
                let right_ankle = right.ankle_pose().translation.vector;
                let ground = 0.5
                    * (left.surface_pose().translation.z + right.surface_pose().translation.z);
                self.zmp_frame = Isometry3::from_parts(
                    Translation3::new(
                        0.5 * (left_ankle.x + right_ankle.x),
                        0.5 * (left_ankle.y + right_ankle.y),
                        ground,
                    ),
                    UnitQuaternion::identity(),
                );
            }
            (Some(stance), None) | (None, Some(stance)) => {
                let ankle = stance.ankle_pose().translation.vector;
                self.zmp_frame = Isometry3::from_parts(
                    Translation3::new(ankle.x, ankle.y, stance.surface_pose().translation.z),
                    UnitQuaternion::identity(),
                );
            }
            (None, None) => {}
        }
    }

    fn compute_left_foot_ratio(&mut self) {
        match (&self.contacts[0], &self.contacts[1]) {
            (Some(left), Some(right)) => {
                let left_ankle = left.ankle_pose().translation.vector.xy();
                let right_ankle = right.ankle_pose().translation.vector.xy();
                let axis = left_ankle - right_ankle;
                let len_sq = axis.norm_squared();
                self.left_foot_ratio = if len_sq < 1e-12 {
                    0.5
                } else {
                    ((self.reference.zmp.xy() - right_ankle).dot(&axis) / len_sq).clamp(0.0, 1.0)
                };
            }
            (Some(_), None) => self.left_foot_ratio = 1.0,
            (None, Some(_)) => self.left_foot_ratio = 0.0,
            (None, None) => {}
        }
    }

    fn set_support_foot_gains(&mut self) {
        let cop_admittance = self.config.cop_admittance;
        for state in ContactState::ALL {
            let share = match state {
                ContactState::Left => self.left_foot_ratio,
                ContactState::Right => 1.0 - self.left_foot_ratio,
            };
            let task = &mut self.foot_tasks[state.index()];
            if self.contacts[state.index()].is_some() {
                // CoP admittance acts on the tangential moments; the y CoP
                // axis maps to the x moment axis and vice versa. The foot
                // carrying less load sees a noisier CoP, so its admittance
                // shrinks with its support share.
                task.admittance = Wrench::new(
                    Vector3::new(share * cop_admittance[1], share * cop_admittance[0], 0.0),
                    Vector3::zeros(),
                );
            } else {
                task.admittance = Wrench::zero();
            }
        }
    }

    fn distribute_wrench(&mut self) {
        let result: Result<[Wrench; 2], StabilizerError> =
            match (&self.contacts[0], &self.contacts[1]) {
                (Some(left), Some(right)) => self
                    .distributor
                    .distribute(
                        &self.desired_wrench,
                        left,
                        right,
                        self.left_foot_ratio,
                        &self.config.fdqp_weights,
                        MIN_DS_PRESSURE,
                    )
                    .map(|distribution| [distribution.left, distribution.right]),
                (Some(stance), None) => self
                    .distributor
                    .saturate(&self.desired_wrench, stance)
                    .map(|wrench| [wrench, Wrench::zero()]),
                (None, Some(stance)) => self
                    .distributor
                    .saturate(&self.desired_wrench, stance)
                    .map(|wrench| [Wrench::zero(), wrench]),
                (None, None) => Err(StabilizerError::ContactMissing),
            };

        match result {
            Ok(wrenches) => {
                self.foot_wrenches = wrenches;
                self.distrib_wrench = wrenches[0] + wrenches[1];
            }
            Err(error) => {
                // Keep the previous distribution and mute feedback for one
                // tick.
                warn!("stabilizer: {error}; keeping previous distribution");
                self.state = StabilizerState::Airborne;
                return;
            }
        }

        if let Ok(zmp) =
            zmp_from_wrench(&self.distrib_wrench, &self.zmp_frame, MIN_NET_TOTAL_FORCE_ZMP)
        {
            self.distrib_zmp = zmp;
        }

        // Per-foot CoP and wrench targets in the sole frames.
        for state in ContactState::ALL {
            let slot = state.index();
            let task = &mut self.foot_tasks[slot];
            if let Some(contact) = &self.contacts[slot] {
                let local = self.foot_wrenches[slot].in_frame(contact.surface_pose());
                let cop = if local.force.z > MIN_NET_TOTAL_FORCE_ZMP {
                    Vector2::new(
                        -local.moment.y / local.force.z,
                        local.moment.x / local.force.z,
                    )
                } else {
                    Vector2::zeros()
                };
                task.set_target_wrench(local, contact.clamp_cop(cop));
            } else {
                task.set_target_wrench(Wrench::zero(), Vector2::zeros());
            }
        }
    }

    fn update_foot_force_difference_control(&mut self) {
        if self.in_double_support() && self.state != StabilizerState::Airborne {
            let command = self.fdc.update(
                &self.config,
                &self.foot_tasks[ContactState::Left.index()],
                &self.foot_tasks[ContactState::Right.index()],
            );
            self.foot_tasks[ContactState::Left.index()].set_ref_velocity(
                Vector3::zeros(),
                Vector3::new(0.0, 0.0, command.left_velocity),
            );
            self.foot_tasks[ContactState::Right.index()].set_ref_velocity(
                Vector3::zeros(),
                Vector3::new(0.0, 0.0, command.right_velocity),
            );
        } else {
            self.fdc.reset();
            for task in &mut self.foot_tasks {
                task.set_ref_velocity(Vector3::zeros(), Vector3::zeros());
            }
        }
    }

    fn update_com_offset(&mut self) {
        // A failed distribution flips the state mid-tick; no ZMP feedback
        // may integrate on such a tick.
        if self.state == StabilizerState::Airborne {
            return;
        }
        let admittance = self.config.com_admittance;
        let error = self.measured_zmp - self.reference.zmp;
        let rate = Vector3::new(-admittance[0] * error.x, -admittance[1] * error.y, 0.0);
        self.com_offset_integrator.add(&rate, self.dt);
        self.com_offset = self.com_offset_integrator.eval();
    }

    fn update_task_targets(&mut self) {
        self.com_task.set_targets(
            self.reference.com + self.com_offset,
            self.reference.comd,
            self.reference.comdd,
        );

        let pelvis_target = match (&self.contacts[0], &self.contacts[1]) {
            (Some(left), Some(right)) => Some(
                right
                    .surface_pose()
                    .rotation
                    .slerp(&left.surface_pose().rotation, self.left_foot_ratio),
            ),
            (Some(stance), None) | (None, Some(stance)) => Some(stance.surface_pose().rotation),
            (None, None) => None,
        };
        if let Some(orientation) = pelvis_target {
            self.pelvis_task.set_target(orientation);
            let pitch =
                UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.config.torso_pitch);
            self.torso_task.set_target(orientation * pitch);
        }
    }

    // -- aggregate task surface --------------------------------------------

    /// Register the component tasks with the downstream solver.
    pub fn add_to_solver(&self, solver: &mut dyn SolverSink) {
        self.com_task.add_to_solver(solver);
        for task in &self.foot_tasks {
            task.add_to_solver(solver);
        }
        self.pelvis_task.add_to_solver(solver);
        self.torso_task.add_to_solver(solver);
    }

    /// Withdraw the component tasks from the downstream solver.
    pub fn remove_from_solver(&self, solver: &mut dyn SolverSink) {
        self.com_task.remove_from_solver(solver);
        for task in &self.foot_tasks {
            task.remove_from_solver(solver);
        }
        self.pelvis_task.remove_from_solver(solver);
        self.torso_task.remove_from_solver(solver);
    }

    /// Concatenated task error: CoM, left foot, right foot.
    pub fn eval(&self) -> DVector<f64> {
        concat_tasks(&[
            self.com_task.eval(),
            self.foot_tasks[0].eval(),
            self.foot_tasks[1].eval(),
        ])
    }

    /// Concatenated task error velocity: CoM, left foot, right foot.
    pub fn speed(&self) -> DVector<f64> {
        concat_tasks(&[
            self.com_task.speed(),
            self.foot_tasks[0].speed(),
            self.foot_tasks[1].speed(),
        ])
    }

    // -- accessors ---------------------------------------------------------

    /// Operating state.
    pub const fn state(&self) -> StabilizerState {
        self.state
    }

    /// ZMP of the distributed wrench, in world coordinates.
    pub const fn zmp(&self) -> Vector3<f64> {
        self.distrib_zmp
    }

    /// Measured DCM ξ = c + ċ/ω.
    pub const fn measured_dcm(&self) -> Vector3<f64> {
        self.measured_dcm
    }

    /// Measured ZMP from the aggregated foot wrenches.
    pub const fn measured_zmp(&self) -> Vector3<f64> {
        self.measured_zmp
    }

    /// Measured CoM position.
    pub const fn measured_com(&self) -> Vector3<f64> {
        self.measured_com
    }

    /// Measured CoM velocity.
    pub const fn measured_com_velocity(&self) -> Vector3<f64> {
        self.measured_comd
    }

    /// DCM tracking error of the last tick.
    pub const fn dcm_error(&self) -> Vector3<f64> {
        self.dcm_feedback.dcm_error()
    }

    /// Saturated average DCM error (integral term input).
    pub const fn dcm_average_error(&self) -> Vector3<f64> {
        self.dcm_feedback.dcm_average_error()
    }

    /// Desired resultant wrench of the last tick (world origin).
    pub const fn desired_wrench(&self) -> &Wrench {
        &self.desired_wrench
    }

    /// Distributed net wrench of the last tick (world origin).
    pub const fn distributed_wrench(&self) -> &Wrench {
        &self.distrib_wrench
    }

    /// Distributed wrench of one foot (world origin).
    pub const fn foot_wrench(&self, state: ContactState) -> &Wrench {
        &self.foot_wrenches[state.index()]
    }

    /// Left-foot share of the vertical load, in [0, 1].
    pub const fn left_foot_ratio(&self) -> f64 {
        self.left_foot_ratio
    }

    /// ZMP frame of the current contact set.
    pub const fn zmp_frame(&self) -> &Isometry3<f64> {
        &self.zmp_frame
    }

    /// Anchor frame for kinematic-inertial state observation, interpolated
    /// between the foot targets by the support ratio.
    pub fn anchor_frame(&self) -> Isometry3<f64> {
        interpolate_pose(
            self.foot_tasks[1].target_pose(),
            self.foot_tasks[0].target_pose(),
            self.left_foot_ratio,
        )
    }

    /// Anchor frame computed from the measured foot poses.
    pub fn anchor_frame_real(&self) -> Isometry3<f64> {
        interpolate_pose(
            self.foot_tasks[1].measured_pose(),
            self.foot_tasks[0].measured_pose(),
            self.left_foot_ratio,
        )
    }

    /// Whether a foot currently has a registered contact.
    pub const fn in_contact(&self, state: ContactState) -> bool {
        self.contacts[state.index()].is_some()
    }

    /// Whether both feet have registered contacts.
    pub const fn in_double_support(&self) -> bool {
        self.contacts[0].is_some() && self.contacts[1].is_some()
    }

    /// Ankle pose of a registered contact.
    pub fn contact_ankle_pose(&self, state: ContactState) -> Option<&Isometry3<f64>> {
        self.contacts[state.index()].as_ref().map(Contact::ankle_pose)
    }

    /// Sole corners of the active contacts, for support-area display.
    pub fn support_polygon(&self) -> Vec<Vector3<f64>> {
        let mut polygon = Vec::with_capacity(8);
        for contact in self.contacts.iter().flatten() {
            polygon.extend_from_slice(&contact.world_corners());
        }
        polygon
    }

    /// Borrow a foot task (targets for the downstream program).
    pub const fn foot_task(&self, state: ContactState) -> &CopTask {
        &self.foot_tasks[state.index()]
    }

    /// Borrow the CoM task.
    pub const fn com_task(&self) -> &ComTask {
        &self.com_task
    }

    /// Borrow the pelvis orientation task.
    pub const fn pelvis_task(&self) -> &OrientationTask {
        &self.pelvis_task
    }

    /// Borrow the torso orientation task.
    pub const fn torso_task(&self) -> &OrientationTask {
        &self.torso_task
    }

    /// Time since the last enable, in seconds.
    pub const fn time(&self) -> f64 {
        self.t
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn concat_tasks(parts: &[DVector<f64>]) -> DVector<f64> {
    let dim: usize = parts.iter().map(|part| part.len()).sum();
    let mut out = DVector::zeros(dim);
    let mut offset = 0;
    for part in parts {
        out.rows_mut(offset, part.len()).copy_from(part);
        offset += part.len();
    }
    out
}

/// Interpolate between two poses: `t = 0` gives `from`, `t = 1` gives `to`.
fn interpolate_pose(from: &Isometry3<f64>, to: &Isometry3<f64>, t: f64) -> Isometry3<f64> {
    let translation = from.translation.vector.lerp(&to.translation.vector, t);
    let rotation = from.rotation.slerp(&to.rotation, t);
    Isometry3::from_parts(Translation3::from(translation), rotation)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strider_core::contact::SoleGeometry;
    use strider_core::robot::Robot;

    const DT: f64 = 0.005;

    fn make_robots() -> Robots {
        let mut robots = Robots::new();
        robots.add(
            Robot::new("biped", 38.0)
                .with_surface("LeftFootCenter", SoleGeometry::new(0.1, 0.1, 0.7))
                .with_surface("RightFootCenter", SoleGeometry::new(0.1, 0.1, 0.7))
                .with_base_body("pelvis")
                .with_body("torso"),
        );
        robots
    }

    fn make_stabilizer(robots: &Robots) -> StabilizerTask {
        StabilizerTask::new(
            robots,
            robots,
            0,
            "LeftFootCenter",
            "RightFootCenter",
            "torso",
            DT,
        )
        .unwrap()
    }

    #[test]
    fn construction_validates_surfaces() {
        let robots = make_robots();
        let result = StabilizerTask::new(
            &robots,
            &robots,
            0,
            "NoSuchSurface",
            "RightFootCenter",
            "torso",
            DT,
        );
        assert!(result.is_err());
    }

    #[test]
    fn contacts_drive_support_state() {
        let robots = make_robots();
        let mut stabilizer = make_stabilizer(&robots);

        stabilizer.set_contacts(&[
            (ContactState::Left, Isometry3::translation(0.0, 0.09, 0.0)),
            (ContactState::Right, Isometry3::translation(0.0, -0.09, 0.0)),
        ]);
        assert!(stabilizer.in_double_support());

        stabilizer.set_contacts(&[(ContactState::Left, Isometry3::translation(0.0, 0.09, 0.0))]);
        assert!(stabilizer.in_contact(ContactState::Left));
        assert!(!stabilizer.in_contact(ContactState::Right));
        assert!(!stabilizer.in_double_support());

        stabilizer.set_contacts(&[]);
        assert_eq!(stabilizer.state(), StabilizerState::Airborne);
    }

    #[test]
    fn zmp_frame_follows_contacts() {
        let robots = make_robots();
        let mut stabilizer = make_stabilizer(&robots);

        stabilizer.set_contacts(&[
            (ContactState::Left, Isometry3::translation(0.1, 0.09, 0.0)),
            (ContactState::Right, Isometry3::translation(-0.1, -0.09, 0.0)),
        ]);
        assert_relative_eq!(
            stabilizer.zmp_frame().translation.vector,
            Vector3::zeros(),
            epsilon = 1e-12
        );

        stabilizer.set_contacts(&[(ContactState::Right, Isometry3::translation(-0.1, -0.09, 0.0))]);
        assert_relative_eq!(
            stabilizer.zmp_frame().translation.vector,
            Vector3::new(-0.1, -0.09, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn reset_is_idempotent() {
        let robots = make_robots();
        let mut stabilizer = make_stabilizer(&robots);
        stabilizer.set_contacts(&[
            (ContactState::Left, Isometry3::translation(0.0, 0.09, 0.0)),
            (ContactState::Right, Isometry3::translation(0.0, -0.09, 0.0)),
        ]);
        stabilizer.run(&robots, &robots);

        stabilizer.reset(&robots);
        let eval_once = stabilizer.eval();
        let zmp_once = stabilizer.zmp();
        let ratio_once = stabilizer.left_foot_ratio();

        stabilizer.reset(&robots);
        assert_eq!(stabilizer.eval(), eval_once);
        assert_eq!(stabilizer.zmp(), zmp_once);
        assert_eq!(stabilizer.left_foot_ratio(), ratio_once);
        assert_eq!(stabilizer.time(), 0.0);
    }

    #[test]
    fn invalid_target_keeps_previous_reference() {
        let robots = make_robots();
        let mut stabilizer = make_stabilizer(&robots);
        stabilizer.static_target(Vector3::new(0.0, 0.0, 0.78));
        stabilizer.update_task_targets();
        let before = stabilizer.eval();

        stabilizer.target(
            Vector3::new(f64::NAN, 0.0, 0.8),
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::zeros(),
        );
        stabilizer.update_task_targets();
        assert_eq!(stabilizer.eval(), before);
    }

    #[test]
    fn eval_concatenates_com_and_feet() {
        let robots = make_robots();
        let stabilizer = make_stabilizer(&robots);
        assert_eq!(stabilizer.eval().len(), 15);
        assert_eq!(stabilizer.speed().len(), 15);
    }

    #[test]
    fn anchor_frame_tracks_support_ratio() {
        let robots = make_robots();
        let mut stabilizer = make_stabilizer(&robots);
        stabilizer.set_contacts(&[
            (ContactState::Left, Isometry3::translation(0.0, 0.09, 0.0)),
            (ContactState::Right, Isometry3::translation(0.0, -0.09, 0.0)),
        ]);
        // Ratio 0.5 after reset: anchor in the middle.
        assert_relative_eq!(
            stabilizer.anchor_frame().translation.vector.y,
            0.0,
            epsilon = 1e-12
        );
    }
}
