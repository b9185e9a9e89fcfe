//! Contact wrench distribution.
//!
//! Uses Clarabel (pure Rust interior-point solver) to split the desired
//! resultant wrench across the active foot contacts while respecting the
//! contact wrench cone of each sole.
//!
//! # Double support
//!
//! Decision variables: x = [w_left, w_right], both 6D wrenches in
//! world-origin coordinates.
//!
//! Weighted least-squares objectives:
//! - w_left + w_right == desired wrench  (net contact wrench)
//! - w_c at its ankle == 0 per contact, anisotropic (couple vs force
//!   weights), scaled by the opposite support ratio so the unloaded foot is
//!   driven to zero wrench
//! - (1 − ρ) f_left.z == ρ f_right.z  (pressure ratio, surface frames)
//!
//! Subject to:
//! - CWC · w_c ≤ 0 per contact (16 rows each, surface frame)
//! - f_c.z ≥ min_pressure per contact (surface frame)
//!
//! # Single support
//!
//! [`WrenchDistributor::saturate`] projects the desired wrench onto the
//! stance-foot cone: minimize ‖x − w_desired‖² under the 16 cone rows.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{self, NonnegativeConeT},
};
use log::warn;
use nalgebra::{DMatrix, DVector, SMatrix};

use strider_core::config::FdqpWeights;
use strider_core::contact::Contact;
use strider_core::error::StabilizerError;
use strider_core::wrench::Wrench;

/// Objective rows of the double-support problem: 6 net wrench + 2×6 ankle
/// regularization + 1 pressure ratio.
const DS_OBJECTIVE_ROWS: usize = 19;
/// Constraint rows of the double-support problem: 2×16 cone + 2 pressure.
const DS_CONSTRAINT_ROWS: usize = 34;
/// Decision variables of the double-support problem.
const DS_VARS: usize = 12;

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

/// Per-foot wrenches in world-origin coordinates after distribution.
#[derive(Clone, Copy, Debug)]
pub struct Distribution {
    /// Left foot contact wrench.
    pub left: Wrench,
    /// Right foot contact wrench.
    pub right: Wrench,
}

impl Distribution {
    /// Net contact wrench.
    pub fn net(&self) -> Wrench {
        self.left + self.right
    }
}

// ---------------------------------------------------------------------------
// WrenchDistributor
// ---------------------------------------------------------------------------

/// Solves the wrench distribution problems of the stabilizer.
///
/// The problem shapes are constant, so the dense assembly buffers are owned
/// and reused across ticks; only the solver workspace is rebuilt per solve,
/// the way Clarabel is driven elsewhere in this stack.
#[derive(Clone, Debug)]
pub struct WrenchDistributor {
    max_iterations: u32,
    objective: DMatrix<f64>,
    objective_rhs: DVector<f64>,
    constraints: DMatrix<f64>,
    constraint_rhs: DVector<f64>,
}

impl Default for WrenchDistributor {
    fn default() -> Self {
        Self::new()
    }
}

impl WrenchDistributor {
    /// Create a distributor with the default iteration cap (100).
    pub fn new() -> Self {
        Self {
            max_iterations: 100,
            objective: DMatrix::zeros(DS_OBJECTIVE_ROWS, DS_VARS),
            objective_rhs: DVector::zeros(DS_OBJECTIVE_ROWS),
            constraints: DMatrix::zeros(DS_CONSTRAINT_ROWS, DS_VARS),
            constraint_rhs: DVector::zeros(DS_CONSTRAINT_ROWS),
        }
    }

    /// Split `desired` (world-origin coordinates) across two contacts.
    ///
    /// `ratio` is the left-foot share of the vertical load in [0, 1].
    pub fn distribute(
        &mut self,
        desired: &Wrench,
        left: &Contact,
        right: &Contact,
        ratio: f64,
        weights: &FdqpWeights,
        min_pressure: f64,
    ) -> Result<Distribution, StabilizerError> {
        let left_surface = Wrench::dual_matrix(left.surface_pose());
        let right_surface = Wrench::dual_matrix(right.surface_pose());
        let left_ankle = Wrench::dual_matrix(left.ankle_pose());
        let right_ankle = Wrench::dual_matrix(right.ankle_pose());

        self.objective.fill(0.0);
        self.objective_rhs.fill(0.0);

        // Net wrench: [I I] x == desired.
        let desired_vec = desired.to_vector();
        for i in 0..6 {
            self.objective[(i, i)] = weights.net_wrench_sqrt;
            self.objective[(i, 6 + i)] = weights.net_wrench_sqrt;
            self.objective_rhs[i] = weights.net_wrench_sqrt * desired_vec[i];
        }

        // Ankle wrench regularization, couple and force rows weighted
        // separately. The foot carrying less of the load gets the stronger
        // pull towards zero.
        let scale_left = (1.0 - ratio).sqrt();
        let scale_right = ratio.sqrt();
        for row in 0..6 {
            let axis_weight = if row < 3 {
                weights.ankle_torque_sqrt
            } else {
                weights.wrench_sqrt
            };
            for col in 0..6 {
                self.objective[(6 + row, col)] =
                    scale_left * axis_weight * left_ankle[(row, col)];
                self.objective[(12 + row, 6 + col)] =
                    scale_right * axis_weight * right_ankle[(row, col)];
            }
        }

        // Pressure ratio: (1 − ρ) f_left.z == ρ f_right.z in surface frames.
        for col in 0..6 {
            self.objective[(18, col)] =
                weights.pressure_sqrt * (1.0 - ratio) * left_surface[(5, col)];
            self.objective[(18, 6 + col)] =
                -weights.pressure_sqrt * ratio * right_surface[(5, col)];
        }

        self.constraints.fill(0.0);
        self.constraint_rhs.fill(0.0);

        // Cone rows act on the surface-frame wrenches.
        let left_cone: SMatrix<f64, 16, 6> = left.wrench_cone() * left_surface;
        let right_cone: SMatrix<f64, 16, 6> = right.wrench_cone() * right_surface;
        for row in 0..16 {
            for col in 0..6 {
                self.constraints[(row, col)] = left_cone[(row, col)];
                self.constraints[(16 + row, 6 + col)] = right_cone[(row, col)];
            }
        }

        // Minimum normal force per foot: −f_c.z ≤ −min_pressure.
        for col in 0..6 {
            self.constraints[(32, col)] = -left_surface[(5, col)];
            self.constraints[(33, 6 + col)] = -right_surface[(5, col)];
        }
        self.constraint_rhs[32] = -min_pressure;
        self.constraint_rhs[33] = -min_pressure;

        // Least squares ‖Jx − b‖² as a QP: P = 2JᵀJ, q = −2Jᵀb.
        let p = 2.0 * self.objective.transpose() * &self.objective;
        let q = -2.0 * self.objective.transpose() * &self.objective_rhs;

        let x = solve_qp(
            &p,
            &q,
            &self.constraints,
            &self.constraint_rhs,
            self.max_iterations,
            "double support distribution",
        )?;

        Ok(Distribution {
            left: Wrench::from_vector(&x.fixed_rows::<6>(0).into()),
            right: Wrench::from_vector(&x.fixed_rows::<6>(6).into()),
        })
    }

    /// Project `desired` (world-origin coordinates) onto the wrench cone of
    /// a single stance contact, minimizing ‖x − desired‖².
    pub fn saturate(
        &mut self,
        desired: &Wrench,
        contact: &Contact,
    ) -> Result<Wrench, StabilizerError> {
        let surface = Wrench::dual_matrix(contact.surface_pose());
        let cone: SMatrix<f64, 16, 6> = contact.wrench_cone() * surface;

        let mut p = DMatrix::zeros(6, 6);
        for i in 0..6 {
            p[(i, i)] = 2.0;
        }
        let desired_vec = desired.to_vector();
        let q = DVector::from_fn(6, |i, _| -2.0 * desired_vec[i]);

        let mut g = DMatrix::zeros(16, 6);
        for row in 0..16 {
            for col in 0..6 {
                g[(row, col)] = cone[(row, col)];
            }
        }
        let h = DVector::zeros(16);

        let x = solve_qp(&p, &q, &g, &h, self.max_iterations, "single support projection")?;
        Ok(Wrench::from_vector(&x.fixed_rows::<6>(0).into()))
    }
}

// ---------------------------------------------------------------------------
// Clarabel plumbing
// ---------------------------------------------------------------------------

/// Solve `min ½xᵀPx + qᵀx` s.t. `Gx ≤ h`.
fn solve_qp(
    p: &DMatrix<f64>,
    q: &DVector<f64>,
    g: &DMatrix<f64>,
    h: &DVector<f64>,
    max_iterations: u32,
    context: &'static str,
) -> Result<DVector<f64>, StabilizerError> {
    let p_csc = to_csc(p, true);
    let g_csc = to_csc(g, false);
    let q_slice: Vec<f64> = q.iter().copied().collect();
    let h_slice: Vec<f64> = h.iter().copied().collect();
    let cones: [SupportedConeT<f64>; 1] = [NonnegativeConeT(g.nrows())];

    let Ok(settings) = DefaultSettingsBuilder::default()
        .max_iter(max_iterations)
        .verbose(false)
        .tol_gap_abs(1e-9)
        .tol_gap_rel(1e-9)
        .tol_feas(1e-9)
        .build()
    else {
        return Err(StabilizerError::QpInfeasible { context });
    };

    let mut solver = DefaultSolver::new(&p_csc, &q_slice, &g_csc, &h_slice, &cones, settings);
    solver.solve();
    let solution = &solver.solution;
    if matches!(
        solution.status,
        SolverStatus::Solved | SolverStatus::AlmostSolved
    ) {
        Ok(DVector::from_column_slice(&solution.x))
    } else {
        warn!("{context}: solver stopped with status {:?}", solution.status);
        Err(StabilizerError::QpInfeasible { context })
    }
}

/// Convert a dense matrix to Clarabel's CSC format, keeping only the upper
/// triangle when `upper` is set (cost Hessians are symmetric).
fn to_csc(m: &DMatrix<f64>, upper: bool) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        let row_end = if upper { (j + 1).min(nrows) } else { nrows };
        for i in 0..row_end {
            let v = m[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
