// strider-core: wrench algebra, contacts, pendulum references, robot handles,
// configuration and errors for biped walking stabilization.

pub mod config;
pub mod cone;
pub mod contact;
pub mod error;
pub mod pendulum;
pub mod robot;
pub mod wrench;

// ---------------------------------------------------------------------------
// Physical constants
// ---------------------------------------------------------------------------

/// Standard gravity in m/s² (ISO 80000-3).
pub const GRAVITY: f64 = 9.80665;

/// Minimum normal contact force per foot in double support, in N. Keeps the
/// wrench distribution away from low-pressure targets close to contact
/// switches.
pub const MIN_DS_PRESSURE: f64 = 15.0;

/// Minimum net vertical force in N for a valid ZMP computation. Below this
/// the robot is considered airborne.
pub const MIN_NET_TOTAL_FORCE_ZMP: f64 = 1.0;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        // Config
        config::{FdqpWeights, StabilizerConfig},
        // Wrench cone
        cone::wrench_face_matrix,
        // Contacts
        contact::{Contact, ContactState, SoleGeometry},
        // Errors
        error::{ConfigError, StabilizerError},
        // Pendulum
        pendulum::PendulumRef,
        // Robot handles
        robot::{Robot, Robots, Surface},
        // Wrenches
        wrench::{zmp_from_wrench, Wrench},
        GRAVITY,
        MIN_DS_PRESSURE,
        MIN_NET_TOTAL_FORCE_ZMP,
    };
}
