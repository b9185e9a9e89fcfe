//! Walking stabilization for biped robots on the linear inverted pendulum
//! model.
//!
//! The stabilizer closes the loop between a feedforward pendulum reference
//! (CoM trajectory + ZMP from an upstream preview controller) and the state
//! estimated on the real robot. Feedback acts on the divergent component of
//! motion (DCM) of the pendulum and is realized as contact wrenches:
//!
//! ```text
//! reference ──▶ DCM feedback ──▶ desired wrench ──▶ distribution QP
//!                (filters)         (at the CoM)      (per-foot wrenches)
//!                                                         │
//! measurements ──▶ foot force difference ◀────────────────┘
//!                        │
//!                        ▼
//!       CoM + foot CoP + pelvis/torso tracking targets
//!              (consumed by a whole-body program)
//! ```
//!
//! Each call to [`StabilizerTask::run`] advances one control tick: it never
//! blocks, never panics, and degrades to a pass-through of the reference
//! when measurements are unusable (airborne robot, infeasible
//! distribution).

pub mod control;
pub mod distribution;
pub mod fdc;
pub mod stabilizer;
pub mod task;

pub use control::DcmFeedback;
pub use distribution::{Distribution, WrenchDistributor};
pub use fdc::{FdcCommand, FootForceDifference};
pub use stabilizer::{StabilizerState, StabilizerTask};
pub use task::{ComTask, CopTask, OrientationTask, SolverSink, Task};

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::stabilizer::{StabilizerState, StabilizerTask};
    pub use crate::task::{ComTask, CopTask, OrientationTask, SolverSink, Task};
    pub use strider_core::prelude::*;
}
