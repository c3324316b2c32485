//! Full resolve with the two-phase primal simplex method.
//!
//! Independent of [`crate::Tableau`]: it builds its own dense tableau with surplus and
//! artificial columns, so it accepts `=` and `>=` rows with any RHS sign. The
//! incremental solver is cross-checked against it.

use log::debug;

use crate::problem::{LpProblem, Relation};
use crate::solver::SolveStatus;
use crate::tableau::DEFAULT_TOLERANCE;

/// Outcome of a from-scratch solve
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct ReferenceSolution {
    pub status: SolveStatus,
    /// Value of each variable, empty unless optimal
    pub values: Vec<f64>,
    /// Objective value in the problem's own sense
    pub objective_value: f64,
    /// Pivots over both phases
    pub iterations: usize,
}

/// Two-phase primal simplex solver for linear programming problems
pub struct ReferenceSolver {
    /// Maximum iterations per phase before giving up
    max_iterations: usize,
    /// Tolerance for floating point comparisons
    tolerance: f64,
}

impl Default for ReferenceSolver {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// Dense tableau with the objective as last row and the RHS as last column
struct Dense {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    /// First artificial column
    art_start: usize,
    iterations: usize,
}

enum PhaseResult {
    Optimal,
    Unbounded,
    IterationLimit,
}

impl ReferenceSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn solve(&self, problem: &LpProblem) -> ReferenceSolution {
        let mut tableau = self.build_tableau(problem);

        if tableau.art_start < tableau.data[0].len() - 1 {
            match self.phase1(&mut tableau) {
                Some(status) => return self.finish(status, &tableau, problem),
                None => debug!("phase 1 found a feasible basis after {} pivots", tableau.iterations),
            }
        }

        let status = match self.phase2(&mut tableau) {
            PhaseResult::Optimal => SolveStatus::Optimal,
            PhaseResult::Unbounded => SolveStatus::Unbounded,
            PhaseResult::IterationLimit => SolveStatus::IterationLimitExceeded,
        };
        self.finish(status, &tableau, problem)
    }

    fn finish(&self, status: SolveStatus, tableau: &Dense, problem: &LpProblem) -> ReferenceSolution {
        let sign = problem.objective.sense.sign();
        debug!("reference solve finished: {:?} after {} pivots", status, tableau.iterations);

        if status != SolveStatus::Optimal {
            let objective_value = match status {
                SolveStatus::Infeasible => -sign * f64::INFINITY,
                SolveStatus::Unbounded => sign * f64::INFINITY,
                _ => f64::NAN,
            };
            return ReferenceSolution {
                status,
                values: Vec::new(),
                objective_value,
                iterations: tableau.iterations,
            };
        }

        let rhs_col = tableau.data[0].len() - 1;
        let mut values = vec![0.0; tableau.n_vars];
        for (i, &basic) in tableau.basic_vars.iter().enumerate() {
            if basic < tableau.n_vars {
                values[basic] = tableau.data[i][rhs_col];
            }
        }

        ReferenceSolution {
            status,
            objective_value: problem.evaluate(&values),
            values,
            iterations: tableau.iterations,
        }
    }

    fn build_tableau(&self, problem: &LpProblem) -> Dense {
        let n_vars = problem.num_variables();
        let n_constraints = problem.num_constraints();

        // After flipping rows to a non-negative RHS, a row keeps a slack basis only when
        // it reads `<=`
        let flipped: Vec<(bool, Relation)> = problem
            .constraints
            .iter()
            .map(|c| {
                let flip = c.rhs < 0.0;
                let relation = match (c.relation, flip) {
                    (Relation::Le, true) => Relation::Ge,
                    (Relation::Ge, true) => Relation::Le,
                    (relation, _) => relation,
                };
                (flip, relation)
            })
            .collect();

        let n_slack = flipped.iter().filter(|(_, r)| *r != Relation::Eq).count();
        let n_artificial = flipped.iter().filter(|(_, r)| *r != Relation::Le).count();

        let total_cols = n_vars + n_slack + n_artificial + 1; // +1 for RHS
        let total_rows = n_constraints + 1; // +1 for objective

        let mut data = vec![vec![0.0; total_cols]; total_rows];
        let mut basic_vars = vec![0; n_constraints];

        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, (c, &(flip, relation))) in problem.constraints.iter().zip(&flipped).enumerate() {
            let sign = if flip { -1.0 } else { 1.0 };
            for (j, &coef) in c.coefficients.iter().enumerate().take(n_vars) {
                data[i][j] = sign * coef;
            }
            data[i][total_cols - 1] = sign * c.rhs;

            match relation {
                Relation::Le => {
                    data[i][slack_idx] = 1.0;
                    basic_vars[i] = slack_idx;
                    slack_idx += 1;
                }
                Relation::Ge => {
                    data[i][slack_idx] = -1.0; // surplus
                    slack_idx += 1;
                    data[i][artificial_idx] = 1.0;
                    basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
                Relation::Eq => {
                    data[i][artificial_idx] = 1.0;
                    basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
            }
        }

        // Objective row holds the reduced costs of the maximization form: -c for
        // maximize, c for minimize
        let sign = problem.objective.sense.sign();
        for (j, &coef) in problem.objective.coefficients.iter().enumerate().take(n_vars) {
            data[n_constraints][j] = -sign * coef;
        }

        Dense {
            data,
            basic_vars,
            n_vars,
            art_start: n_vars + n_slack,
            iterations: 0,
        }
    }

    /// Drive the artificial variables to zero. Returns a terminal status when the
    /// problem turns out infeasible or the budget runs out.
    fn phase1(&self, tableau: &mut Dense) -> Option<SolveStatus> {
        let n_constraints = tableau.data.len() - 1;
        let n_cols = tableau.data[0].len();
        let rhs_col = n_cols - 1;
        let art_start = tableau.art_start;

        let orig_obj = std::mem::replace(&mut tableau.data[n_constraints], vec![0.0; n_cols]);

        // maximize -sum(artificials), priced out against the artificial basis
        for j in art_start..rhs_col {
            tableau.data[n_constraints][j] = 1.0;
        }
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] -= tableau.data[i][j];
                }
            }
        }

        match self.run(tableau, rhs_col) {
            PhaseResult::Optimal => {}
            // the auxiliary objective is bounded by zero
            PhaseResult::Unbounded => return Some(SolveStatus::Infeasible),
            PhaseResult::IterationLimit => return Some(SolveStatus::IterationLimitExceeded),
        }

        if tableau.data[n_constraints][rhs_col] < -self.tolerance {
            return Some(SolveStatus::Infeasible);
        }

        self.drive_out_artificials(tableau);

        // Restore original objective and adjust for basic variables
        let n_constraints = tableau.data.len() - 1;
        tableau.data[n_constraints] = orig_obj;
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            let ratio = tableau.data[n_constraints][basic];
            if ratio != 0.0 {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] -= ratio * tableau.data[i][j];
                }
            }
        }

        None
    }

    /// Pivot zero-level artificials out of the basis; rows where that is impossible
    /// are redundant and get dropped
    fn drive_out_artificials(&self, tableau: &mut Dense) {
        let art_start = tableau.art_start;
        let mut i = 0;
        while i < tableau.basic_vars.len() {
            if tableau.basic_vars[i] < art_start {
                i += 1;
                continue;
            }
            let replacement = (0..art_start).find(|&j| tableau.data[i][j].abs() > self.tolerance);
            match replacement {
                Some(j) => {
                    self.pivot(tableau, i, j);
                    i += 1;
                }
                None => {
                    tableau.data.remove(i);
                    tableau.basic_vars.remove(i);
                }
            }
        }
    }

    fn phase2(&self, tableau: &mut Dense) -> PhaseResult {
        // Artificial columns never re-enter
        let exclude_from = tableau.art_start;
        self.run(tableau, exclude_from)
    }

    fn run(&self, tableau: &mut Dense, exclude_from: usize) -> PhaseResult {
        for _ in 0..self.max_iterations {
            let Some(pivot_col) = self.find_pivot_column(tableau, exclude_from) else {
                return PhaseResult::Optimal;
            };
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col) else {
                return PhaseResult::Unbounded;
            };
            self.pivot(tableau, pivot_row, pivot_col);
        }
        match self.find_pivot_column(tableau, exclude_from) {
            None => PhaseResult::Optimal,
            Some(_) => PhaseResult::IterationLimit,
        }
    }

    /// Bland's rule: the lowest-index column with a negative reduced cost
    fn find_pivot_column(&self, tableau: &Dense, exclude_from: usize) -> Option<usize> {
        let obj_row = tableau.data.len() - 1;
        (0..exclude_from).find(|&j| tableau.data[obj_row][j] < -self.tolerance)
    }

    fn find_pivot_row(&self, tableau: &Dense, col: usize) -> Option<usize> {
        let n_constraints = tableau.data.len() - 1;
        let rhs_col = tableau.data[0].len() - 1;

        let mut min_ratio = f64::INFINITY;
        let mut min_row = None;

        for i in 0..n_constraints {
            let val = tableau.data[i][col];
            if val > self.tolerance {
                let ratio = tableau.data[i][rhs_col].max(0.0) / val;
                // Bland: among ties, the lowest basic variable leaves
                let better = match min_row {
                    None => true,
                    Some(r) => {
                        ratio < min_ratio - self.tolerance
                            || (ratio <= min_ratio + self.tolerance
                                && tableau.basic_vars[i] < tableau.basic_vars[r])
                    }
                };
                if better {
                    min_ratio = ratio;
                    min_row = Some(i);
                }
            }
        }

        min_row
    }

    fn pivot(&self, tableau: &mut Dense, row: usize, col: usize) {
        let n_rows = tableau.data.len();
        let n_cols = tableau.data[0].len();

        tableau.basic_vars[row] = col;
        tableau.iterations += 1;

        // Scale pivot row
        let pivot_val = tableau.data[row][col];
        for j in 0..n_cols {
            tableau.data[row][j] /= pivot_val;
        }

        // Eliminate column in other rows
        for i in 0..n_rows {
            if i != row {
                let factor = tableau.data[i][col];
                if factor != 0.0 {
                    for j in 0..n_cols {
                        tableau.data[i][j] -= factor * tableau.data[row][j];
                    }
                }
            }
        }
    }
}
