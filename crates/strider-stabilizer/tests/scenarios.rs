//! End-to-end stabilizer scenarios.
//!
//! Drives the full per-tick pipeline through the public surface: contacts,
//! references, estimator measurements, one or more `run` calls, then checks
//! the distributed wrenches, CoP targets and state transitions.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::{Isometry3, Vector2, Vector3};

use strider_core::prelude::*;
use strider_stabilizer::prelude::*;

const DT: f64 = 0.005;
const MASS: f64 = 38.0;
const COM_HEIGHT: f64 = 0.78;

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    robots: Robots,
    stabilizer: StabilizerTask,
}

fn left_pose() -> Isometry3<f64> {
    Isometry3::translation(0.09, 0.0, 0.0)
}

fn right_pose() -> Isometry3<f64> {
    Isometry3::translation(-0.09, 0.0, 0.0)
}

fn setup() -> Harness {
    let mut robots = Robots::new();
    robots.add(
        Robot::new("biped", MASS)
            .with_surface("LeftFootCenter", SoleGeometry::new(0.1, 0.1, 0.7))
            .with_surface("RightFootCenter", SoleGeometry::new(0.1, 0.1, 0.7))
            .with_base_body("pelvis")
            .with_body("torso"),
    );
    {
        let robot = robots.robot_mut(0).unwrap();
        robot.set_com_state(Vector3::new(0.0, 0.0, COM_HEIGHT), Vector3::zeros());
        robot.set_surface_pose("LeftFootCenter", left_pose());
        robot.set_surface_pose("RightFootCenter", right_pose());
    }

    let mut stabilizer = StabilizerTask::new(
        &robots,
        &robots,
        0,
        "LeftFootCenter",
        "RightFootCenter",
        "torso",
        DT,
    )
    .unwrap();
    stabilizer.set_contacts(&[
        (ContactState::Left, left_pose()),
        (ContactState::Right, right_pose()),
    ]);
    stabilizer.static_target(Vector3::new(0.0, 0.0, COM_HEIGHT));

    let mut harness = Harness { robots, stabilizer };
    set_foot_forces(&mut harness, 0.5 * MASS * GRAVITY, 0.5 * MASS * GRAVITY);
    harness
}

/// Write vertical foot forces (surface frames) into the estimator view.
fn set_foot_forces(harness: &mut Harness, left_fz: f64, right_fz: f64) {
    let robot = harness.robots.robot_mut(0).unwrap();
    robot.set_surface_wrench(
        "LeftFootCenter",
        Wrench::new(Vector3::zeros(), Vector3::new(0.0, 0.0, left_fz)),
    );
    robot.set_surface_wrench(
        "RightFootCenter",
        Wrench::new(Vector3::zeros(), Vector3::new(0.0, 0.0, right_fz)),
    );
}

fn set_measured_com(harness: &mut Harness, com: Vector3<f64>) {
    harness
        .robots
        .robot_mut(0)
        .unwrap()
        .set_com_state(com, Vector3::zeros());
}

fn run_tick(harness: &mut Harness) {
    let robots = harness.robots.clone();
    harness.stabilizer.run(&robots, &harness.robots);
}

fn cone_residual(geometry: &SoleGeometry, pose: &Isometry3<f64>, wrench: &Wrench) -> f64 {
    let local = wrench.in_frame(pose);
    (wrench_face_matrix(geometry.half_length, geometry.half_width, geometry.friction)
        * local.to_vector())
    .iter()
    .fold(f64::NEG_INFINITY, |acc, &r| acc.max(r))
}

fn assert_invariants(harness: &Harness) {
    let stabilizer = &harness.stabilizer;
    let ratio = stabilizer.left_foot_ratio();
    assert!((0.0..=1.0).contains(&ratio), "left foot ratio {ratio} out of [0,1]");

    let geometry = SoleGeometry::new(0.1, 0.1, 0.7);
    for (state, pose) in [
        (ContactState::Left, left_pose()),
        (ContactState::Right, right_pose()),
    ] {
        if !stabilizer.in_contact(state) {
            continue;
        }
        let wrench = stabilizer.foot_wrench(state);
        assert!(
            cone_residual(&geometry, &pose, wrench) <= 1e-6,
            "{state} foot wrench violates its cone"
        );
        let cop = stabilizer.foot_task(state).target_cop();
        assert!(cop.x.abs() <= geometry.half_length + 1e-6);
        assert!(cop.y.abs() <= geometry.half_width + 1e-6);
    }

    if stabilizer.in_double_support()
        && stabilizer.desired_wrench().force.z >= 2.0 * MIN_DS_PRESSURE
        && stabilizer.state() == StabilizerState::Enabled
    {
        for state in [ContactState::Left, ContactState::Right] {
            let pose = if state == ContactState::Left { left_pose() } else { right_pose() };
            let fz = stabilizer.foot_wrench(state).in_frame(&pose).force.z;
            assert!(fz >= MIN_DS_PRESSURE - 1e-6, "{state} normal force {fz} below minimum");
        }
    }
}

// ---------------------------------------------------------------------------
// End-to-end scenarios
// ---------------------------------------------------------------------------

#[test]
fn static_double_support_balances_gravity() {
    let mut harness = setup();
    run_tick(&mut harness);

    let stabilizer = &harness.stabilizer;
    let net = stabilizer.distributed_wrench();
    assert_abs_diff_eq!(net.force.x, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(net.force.y, 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(net.force.z, MASS * GRAVITY, epsilon = 1e-6);
    assert_abs_diff_eq!(net.moment.norm(), 0.0, epsilon = 1e-6);

    for state in [ContactState::Left, ContactState::Right] {
        let cop = stabilizer.foot_task(state).target_cop();
        assert_abs_diff_eq!(cop, Vector2::zeros(), epsilon = 1e-6);
    }
    assert_relative_eq!(stabilizer.left_foot_ratio(), 0.5, epsilon = 1e-12);
    assert_invariants(&harness);
}

#[test]
fn com_step_perturbation_produces_proportional_correction() {
    let mut harness = setup();
    harness.stabilizer.configure(StabilizerConfig {
        dcm_prop_gain: 5.0,
        dcm_integral_gain: 0.0,
        dcm_deriv_gain: 0.0,
        vdc_stiffness: 0.0,
        ..StabilizerConfig::default()
    });

    set_measured_com(&mut harness, Vector3::new(0.01, 0.0, COM_HEIGHT));
    run_tick(&mut harness);

    let omega_sq = GRAVITY / COM_HEIGHT;
    let expected_fx = MASS * omega_sq * 5.0 * (-0.01);
    assert_relative_eq!(
        harness.stabilizer.desired_wrench().force.x,
        expected_fx,
        epsilon = 1e-9
    );

    // The distributed ZMP moves ahead of the CoM to push it back.
    assert!(harness.stabilizer.zmp().x > 0.0);
    assert_invariants(&harness);
}

#[test]
fn single_support_projects_onto_the_stance_cone() {
    let mut harness = setup();
    harness.stabilizer.set_contacts(&[(ContactState::Left, left_pose())]);
    harness.stabilizer.configure(StabilizerConfig {
        dcm_prop_gain: 20.0,
        dcm_integral_gain: 0.0,
        dcm_deriv_gain: 0.0,
        vdc_stiffness: 0.0,
        ..StabilizerConfig::default()
    });
    set_foot_forces(&mut harness, MASS * GRAVITY, 0.0);

    // Large CoM error: the raw desired wrench leaves the friction cone.
    set_measured_com(&mut harness, Vector3::new(0.15, 0.0, COM_HEIGHT));
    run_tick(&mut harness);

    let stabilizer = &harness.stabilizer;
    let geometry = SoleGeometry::new(0.1, 0.1, 0.7);
    let desired_residual =
        cone_residual(&geometry, &left_pose(), stabilizer.desired_wrench());
    assert!(desired_residual > 1e-3, "perturbation too small to saturate");

    let projected = stabilizer.foot_wrench(ContactState::Left);
    assert!(cone_residual(&geometry, &left_pose(), projected) <= 1e-6);
    assert_relative_eq!(stabilizer.left_foot_ratio(), 1.0);
    assert_eq!(
        stabilizer.foot_wrench(ContactState::Right).force,
        Vector3::zeros()
    );
    assert_invariants(&harness);
}

#[test]
fn airborne_freezes_foot_targets() {
    let mut harness = setup();
    run_tick(&mut harness);
    assert_eq!(harness.stabilizer.state(), StabilizerState::Enabled);

    let left_before = *harness.stabilizer.foot_task(ContactState::Left).target_pose();
    let right_before = *harness.stabilizer.foot_task(ContactState::Right).target_pose();

    set_foot_forces(&mut harness, 0.0, 0.0);
    run_tick(&mut harness);

    let stabilizer = &harness.stabilizer;
    assert_eq!(stabilizer.state(), StabilizerState::Airborne);
    assert_eq!(*stabilizer.foot_task(ContactState::Left).target_pose(), left_before);
    assert_eq!(*stabilizer.foot_task(ContactState::Right).target_pose(), right_before);

    // Touchdown restores feedback on the next grounded tick.
    set_foot_forces(&mut harness, 0.5 * MASS * GRAVITY, 0.5 * MASS * GRAVITY);
    run_tick(&mut harness);
    assert_eq!(harness.stabilizer.state(), StabilizerState::Enabled);
}

#[test]
fn configure_clamps_out_of_range_gains() {
    let mut harness = setup();
    harness.stabilizer.configure(StabilizerConfig {
        dcm_prop_gain: 50.0,
        dcm_integral_gain: -1.0,
        ..StabilizerConfig::default()
    });
    assert_eq!(harness.stabilizer.config().dcm_prop_gain, 20.0);
    assert_eq!(harness.stabilizer.config().dcm_integral_gain, 0.0);
}

#[test]
fn force_difference_control_retreats_the_overloaded_foot() {
    let mut harness = setup();
    harness.stabilizer.configure(StabilizerConfig {
        dcm_prop_gain: 0.0,
        dcm_integral_gain: 0.0,
        dcm_deriv_gain: 0.0,
        dfz_admittance: 1e-4,
        dfz_damping: 0.0,
        vdc_frequency: 0.0,
        vdc_stiffness: 0.0,
        cop_admittance: [0.0, 0.0],
        ..StabilizerConfig::default()
    });

    // +10 N difference over a symmetric target split.
    let half = 0.5 * MASS * GRAVITY;
    set_foot_forces(&mut harness, half + 5.0, half - 5.0);
    run_tick(&mut harness);

    let stabilizer = &harness.stabilizer;
    let left_z = stabilizer.foot_task(ContactState::Left).target_pose().translation.z;
    let right_z = stabilizer.foot_task(ContactState::Right).target_pose().translation.z;
    assert_abs_diff_eq!(left_z, -2.5e-6, epsilon = 1e-12);
    assert_abs_diff_eq!(right_z, 2.5e-6, epsilon = 1e-12);
}

// ---------------------------------------------------------------------------
// Laws
// ---------------------------------------------------------------------------

#[test]
fn disabled_stabilizer_passes_the_reference_through() {
    let mut harness = setup();
    harness.stabilizer.disable();

    // Pendulum-consistent dynamic reference: z* = c* − c̈*/ω².
    let omega_sq = GRAVITY / COM_HEIGHT;
    let comdd = Vector3::new(0.3, 0.0, 0.0);
    let com = Vector3::new(0.0, 0.0, COM_HEIGHT);
    let zmp = Vector3::new(-0.3 / omega_sq, 0.0, 0.0);
    harness.stabilizer.target(com, Vector3::new(0.05, 0.0, 0.0), comdd, zmp);
    run_tick(&mut harness);

    let stabilizer = &harness.stabilizer;
    assert_eq!(stabilizer.state(), StabilizerState::Disabled);
    let net = stabilizer.distributed_wrench();
    assert_abs_diff_eq!(net.force.x, MASS * comdd.x, epsilon = 1e-5);
    assert_abs_diff_eq!(net.force.z, MASS * GRAVITY, epsilon = 1e-5);

    // The net ZMP lands on the reference ZMP.
    assert_abs_diff_eq!(stabilizer.zmp().x, zmp.x, epsilon = 1e-5);
    assert_abs_diff_eq!(stabilizer.zmp().y, zmp.y, epsilon = 1e-5);
}

#[test]
fn mirrored_setups_swap_foot_outputs() {
    // Feet along y, CoM pushed towards the left foot...
    let mut forward = setup_lateral(Vector3::new(0.0, 0.01, COM_HEIGHT));
    run_tick(&mut forward);
    // ...and its mirror image, pushed towards the right foot.
    let mut mirrored = setup_lateral(Vector3::new(0.0, -0.01, COM_HEIGHT));
    run_tick(&mut mirrored);

    let left_a = forward
        .stabilizer
        .foot_wrench(ContactState::Left)
        .in_frame(&Isometry3::translation(0.0, 0.09, 0.0));
    let right_b = mirrored
        .stabilizer
        .foot_wrench(ContactState::Right)
        .in_frame(&Isometry3::translation(0.0, -0.09, 0.0));

    assert_relative_eq!(left_a.force.z, right_b.force.z, epsilon = 1e-6);
    assert_relative_eq!(
        forward.stabilizer.left_foot_ratio(),
        1.0 - mirrored.stabilizer.left_foot_ratio(),
        epsilon = 1e-9
    );
}

fn setup_lateral(measured_com: Vector3<f64>) -> Harness {
    let mut harness = setup();
    let left = Isometry3::translation(0.0, 0.09, 0.0);
    let right = Isometry3::translation(0.0, -0.09, 0.0);
    {
        let robot = harness.robots.robot_mut(0).unwrap();
        robot.set_surface_pose("LeftFootCenter", left);
        robot.set_surface_pose("RightFootCenter", right);
    }
    harness.stabilizer.set_contacts(&[
        (ContactState::Left, left),
        (ContactState::Right, right),
    ]);
    harness.stabilizer.configure(StabilizerConfig {
        dcm_prop_gain: 5.0,
        dcm_integral_gain: 0.0,
        dcm_deriv_gain: 0.0,
        vdc_stiffness: 0.0,
        ..StabilizerConfig::default()
    });
    harness.stabilizer.static_target(Vector3::new(0.0, 0.0, COM_HEIGHT));
    set_measured_com(&mut harness, measured_com);
    harness
}

#[test]
fn average_dcm_error_converges_to_a_stationary_offset() {
    let mut harness = setup();
    harness.stabilizer.configure(StabilizerConfig {
        dcm_prop_gain: 1.0,
        dcm_integral_gain: 5.0,
        dcm_integrator_time_constant: 0.1,
        vdc_stiffness: 0.0,
        ..StabilizerConfig::default()
    });

    // Constant −2 cm measurement offset: e = ξ* − ξ = +0.02 x̂.
    set_measured_com(&mut harness, Vector3::new(-0.02, 0.0, COM_HEIGHT));
    for _ in 0..600 {
        run_tick(&mut harness);
    }
    assert_relative_eq!(
        harness.stabilizer.dcm_average_error().x,
        0.02,
        epsilon = 1e-6
    );
    assert_invariants(&harness);
}

#[test]
fn extreme_ratio_keeps_minimum_double_support_pressure() {
    let mut harness = setup();
    // Reference ZMP directly over the left ankle: ratio saturates at 1.
    harness
        .stabilizer
        .static_target(Vector3::new(0.09, 0.0, COM_HEIGHT));
    set_measured_com(&mut harness, Vector3::new(0.09, 0.0, COM_HEIGHT));
    run_tick(&mut harness);

    assert_relative_eq!(harness.stabilizer.left_foot_ratio(), 1.0);
    let right_fz = harness
        .stabilizer
        .foot_wrench(ContactState::Right)
        .in_frame(&right_pose())
        .force
        .z;
    assert!(right_fz >= MIN_DS_PRESSURE - 1e-6);
    assert_invariants(&harness);
}
