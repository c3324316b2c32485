use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::pivot::{PivotSelector, PrimalRule};
use crate::tableau::{Tableau, TableauError};

/// Terminal state of a solve
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Primal and dual feasible
    Optimal,
    /// A row with negative RHS has no negative coefficient: the constraints cannot be met
    Infeasible,
    /// A column with negative reduced cost has no positive coefficient
    Unbounded,
    /// The pivot budget ran out, or no usable pivot element was left
    IterationLimitExceeded,
    /// The deadline passed between two pivots
    TimeLimitExceeded,
}

impl SolveStatus {
    pub fn is_optimal(self) -> bool {
        self == SolveStatus::Optimal
    }
}

/// The row that proved infeasibility, as it stood when the solve stopped
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct InfeasibilityCertificate {
    pub row: usize,
    /// Basic variable of the row
    pub basic_column: usize,
    pub coefficients: Vec<f64>,
    pub rhs: f64,
}

/// A pivot element the solver refused because it was below the pivot tolerance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RejectedPivot {
    pub row: usize,
    pub column: usize,
    pub value: f64,
}

/// Extra information attached to a solve that stopped without an answer
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub rejected_pivots: Vec<RejectedPivot>,
    /// The tableau as it was when the solve stopped
    pub snapshot: Box<Tableau>,
}

#[derive(Debug, Clone)]
pub struct SolveReport {
    pub status: SolveStatus,
    /// Pivots performed by this call
    pub iterations: usize,
    /// Present when `status` is `Infeasible`
    pub certificate: Option<InfeasibilityCertificate>,
    /// Present when `status` is `IterationLimitExceeded` or `TimeLimitExceeded`
    pub diagnostics: Option<Diagnostics>,
}

/// Dual simplex driver.
///
/// Starting from any slack-compatible basis, [`Solver::solve`] pivots until the tableau
/// is both primal and dual feasible:
///
/// * rows with a negative RHS are repaired by dual pivots, which keep the reduced costs
///   non-negative. This is the warm start after [`crate::ConstraintManager::add_constraint`];
/// * while the tableau is primal feasible but has negative reduced costs (a freshly built
///   tableau), primal pivots improve the objective;
/// * when neither holds, the objective row is set aside and dual pivots against a zero
///   objective restore feasibility first.
pub struct Solver {
    /// Maximum pivots per call before giving up
    max_iterations: usize,
    /// Checked between pivots
    time_limit: Option<Duration>,
    selector: PivotSelector,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            time_limit: None,
            selector: PivotSelector::default(),
        }
    }
}

/// Outcome of a single step of the loop
enum Step {
    Pivoted,
    Done(SolveStatus),
}

/// Bookkeeping of one `solve` call
struct Run {
    iterations: usize,
    deadline: Option<Instant>,
    rejected: Vec<RejectedPivot>,
    certificate: Option<InfeasibilityCertificate>,
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_primal_rule(mut self, rule: PrimalRule) -> Self {
        self.selector = self.selector.with_primal_rule(rule);
        self
    }

    pub fn selector(&self) -> &PivotSelector {
        &self.selector
    }

    /// Pivot `tableau` to a terminal state.
    ///
    /// Whatever the status, the tableau keeps a valid basis and can be inspected or
    /// solved again. Solving an optimal tableau performs no pivots.
    pub fn solve(&self, tableau: &mut Tableau) -> SolveReport {
        let mut run = Run {
            iterations: 0,
            deadline: self.time_limit.map(|limit| Instant::now() + limit),
            rejected: Vec::new(),
            certificate: None,
        };

        let mut status = None;
        if !tableau.is_primal_feasible() && !tableau.is_dual_feasible() {
            debug!("tableau is neither primal nor dual feasible, restoring feasibility first");
            let zero = vec![0.0; tableau.column_count() + 1];
            let saved = tableau.replace_objective(zero);
            let feasibility = self.iterate(tableau, &mut run);
            tableau.replace_objective(saved);
            tableau.price_out_basis();

            if feasibility != SolveStatus::Optimal {
                status = Some(feasibility);
            } else {
                debug!("feasible basis found after {} pivots", run.iterations);
            }
        }

        let status = match status {
            Some(status) => status,
            None => self.iterate(tableau, &mut run),
        };

        debug!(
            "solve finished: {:?} after {} pivots, objective {:.6}",
            status,
            run.iterations,
            tableau.objective_value()
        );

        let diagnostics = match status {
            SolveStatus::IterationLimitExceeded | SolveStatus::TimeLimitExceeded => Some(Diagnostics {
                rejected_pivots: run.rejected,
                snapshot: Box::new(tableau.clone()),
            }),
            _ => None,
        };

        SolveReport {
            status,
            iterations: run.iterations,
            certificate: run.certificate,
            diagnostics,
        }
    }

    fn iterate(&self, tableau: &mut Tableau, run: &mut Run) -> SolveStatus {
        loop {
            let step = if let Some(row) = self.selector.select_leaving_row(tableau) {
                self.dual_step(tableau, row, run)
            } else if let Some(column) = self.selector.select_primal_entering(tableau) {
                self.primal_step(tableau, column, run)
            } else {
                Step::Done(SolveStatus::Optimal)
            };

            match step {
                Step::Pivoted => run.iterations += 1,
                Step::Done(status) => return status,
            }
        }
    }

    /// Budget and deadline checks, made before every pivot
    fn exhausted(&self, run: &Run) -> Option<SolveStatus> {
        if run.iterations >= self.max_iterations {
            return Some(SolveStatus::IterationLimitExceeded);
        }
        match run.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(SolveStatus::TimeLimitExceeded),
            _ => None,
        }
    }

    fn dual_step(&self, tableau: &mut Tableau, row: usize, run: &mut Run) -> Step {
        let candidates = self.selector.entering_candidates(tableau, row);
        if candidates.is_empty() {
            debug!("row {} has rhs {:.6} and no negative coefficient", row, tableau.rhs(row));
            run.certificate = Some(InfeasibilityCertificate {
                row,
                basic_column: tableau.basis()[row],
                coefficients: tableau.row(row).to_vec(),
                rhs: tableau.rhs(row),
            });
            return Step::Done(SolveStatus::Infeasible);
        }
        if let Some(status) = self.exhausted(run) {
            return Step::Done(status);
        }

        for candidate in candidates {
            trace!(
                "dual pivot: row {} leaves (rhs {:.6}), column {} enters (ratio {:.6})",
                row,
                tableau.rhs(row),
                candidate.column,
                candidate.ratio
            );
            match tableau.pivot(row, candidate.column) {
                Ok(()) => return Step::Pivoted,
                Err(err) => self.reject(err, run),
            }
        }

        warn!("no usable pivot element left in row {}", row);
        Step::Done(SolveStatus::IterationLimitExceeded)
    }

    fn primal_step(&self, tableau: &mut Tableau, column: usize, run: &mut Run) -> Step {
        let Some(row) = self.selector.select_primal_leaving(tableau, column) else {
            debug!("column {} has reduced cost {:.6} and no leaving row", column, tableau.reduced_cost(column));
            return Step::Done(SolveStatus::Unbounded);
        };
        if let Some(status) = self.exhausted(run) {
            return Step::Done(status);
        }

        trace!(
            "primal pivot: column {} enters (reduced cost {:.6}), row {} leaves",
            column,
            tableau.reduced_cost(column),
            row
        );
        match tableau.pivot(row, column) {
            Ok(()) => Step::Pivoted,
            Err(err) => {
                self.reject(err, run);
                Step::Done(SolveStatus::IterationLimitExceeded)
            }
        }
    }

    fn reject(&self, err: TableauError, run: &mut Run) {
        warn!("{}", err);
        if let TableauError::DegeneratePivot { row, column, value, .. } = err {
            run.rejected.push(RejectedPivot { row, column, value });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Relation;
    use crate::ConstraintManager;
    use approx::assert_abs_diff_eq;

    fn worked_example() -> Tableau {
        Tableau::new(
            &[vec![1.0, 1.0, 0.0], vec![1.0, 2.0, 1.0]],
            &[4.0, 6.0],
            &[100.0, 200.0, 400.0],
        )
        .unwrap()
    }

    fn assert_certified_optimal(t: &Tableau) {
        let tol = t.tolerance();
        for row in 0..t.row_count() {
            assert!(t.rhs(row) >= -tol, "row {} has rhs {}", row, t.rhs(row));
        }
        for (j, &d) in t.reduced_costs().iter().enumerate() {
            assert!(d >= -tol, "column {} has reduced cost {}", j, d);
        }
        // complementary slackness
        for column in 0..t.column_count() {
            let variable = t.variable(column).unwrap();
            if variable.is_basic() {
                assert_abs_diff_eq!(t.reduced_cost(column), 0.0, epsilon = tol);
            } else {
                assert_eq!(t.value(column), 0.0);
            }
        }
        assert!(t.verify_basis());
    }

    #[test]
    fn test_worked_example_initial_optimum() {
        let mut t = worked_example();
        let report = Solver::new().solve(&mut t);

        assert_eq!(report.status, SolveStatus::Optimal);
        assert_eq!(report.iterations, 1);
        assert!(report.certificate.is_none());
        assert!(report.diagnostics.is_none());
        assert_certified_optimal(&t);
        assert_abs_diff_eq!(t.value(0), 0.0);
        assert_abs_diff_eq!(t.value(1), 0.0);
        assert_abs_diff_eq!(t.value(2), 6.0);
        assert_abs_diff_eq!(t.objective_value(), 2400.0);
    }

    #[test]
    fn test_worked_example_warm_start_after_lower_bound() {
        let mut t = worked_example();
        let solver = Solver::new();
        solver.solve(&mut t);

        // x1 >= 3
        ConstraintManager::add_constraint(&mut t, &[1.0, 0.0, 0.0], Relation::Ge, 3.0).unwrap();
        assert!(t.is_dual_feasible());
        assert!(!t.is_primal_feasible());

        let report = solver.solve(&mut t);
        assert_eq!(report.status, SolveStatus::Optimal);
        assert_eq!(report.iterations, 1);
        assert_certified_optimal(&t);
        assert_abs_diff_eq!(t.value(0), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.value(1), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.value(2), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.objective_value(), 1500.0, epsilon = 1e-9);
    }

    #[test]
    fn test_textbook_maximization() {
        // max 3x + 2y, x + y <= 4, x <= 3, y <= 3 -> x = 3, y = 1, obj = 11
        let mut t = Tableau::new(
            &[vec![1.0, 1.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            &[4.0, 3.0, 3.0],
            &[3.0, 2.0],
        )
        .unwrap();
        let report = Solver::new().solve(&mut t);

        assert_eq!(report.status, SolveStatus::Optimal);
        assert_certified_optimal(&t);
        assert_abs_diff_eq!(t.value(0), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.value(1), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.objective_value(), 11.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bland_rule_reaches_same_optimum() {
        let mut t = worked_example();
        let report = Solver::new().with_primal_rule(PrimalRule::Bland).solve(&mut t);

        assert_eq!(report.status, SolveStatus::Optimal);
        assert_certified_optimal(&t);
        assert_abs_diff_eq!(t.objective_value(), 2400.0, epsilon = 1e-9);
    }

    #[test]
    fn test_second_solve_is_idempotent() {
        let mut t = worked_example();
        let solver = Solver::new();
        solver.solve(&mut t);
        ConstraintManager::add_constraint(&mut t, &[1.0], Relation::Ge, 3.0).unwrap();
        solver.solve(&mut t);

        let before = t.clone();
        let report = solver.solve(&mut t);
        assert_eq!(report.status, SolveStatus::Optimal);
        assert_eq!(report.iterations, 0);
        assert_eq!(t.basis(), before.basis());
        assert_eq!(t.objective_value(), before.objective_value());
    }

    #[test]
    fn test_redundant_constraint_keeps_solution() {
        let mut t = worked_example();
        let solver = Solver::new();
        solver.solve(&mut t);
        let objective = t.objective_value();
        let values: Vec<f64> = (0..3).map(|j| t.value(j)).collect();

        // x1 + x2 + x3 <= 10 already holds at (0, 0, 6)
        ConstraintManager::add_constraint(&mut t, &[1.0, 1.0, 1.0], Relation::Le, 10.0).unwrap();
        assert!(t.is_primal_feasible());
        let report = solver.solve(&mut t);

        assert_eq!(report.status, SolveStatus::Optimal);
        assert_eq!(report.iterations, 0);
        assert_abs_diff_eq!(t.objective_value(), objective, epsilon = 1e-9);
        for (j, &v) in values.iter().enumerate() {
            assert_abs_diff_eq!(t.value(j), v, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_infeasible_constraint_reports_certificate() {
        let mut t = worked_example();
        let solver = Solver::new();
        solver.solve(&mut t);

        // x3 >= 7 contradicts x1 + 2x2 + x3 <= 6
        ConstraintManager::add_constraint(&mut t, &[0.0, 0.0, 1.0], Relation::Ge, 7.0).unwrap();
        let report = solver.solve(&mut t);

        assert_eq!(report.status, SolveStatus::Infeasible);
        let certificate = report.certificate.expect("certificate");
        assert_eq!(certificate.row, 2);
        assert!(certificate.rhs < 0.0);
        assert!(certificate.coefficients.iter().all(|&a| a >= -t.tolerance()));
        assert!(t.verify_basis());
    }

    #[test]
    fn test_unbounded() {
        // max x + y with only x - y <= 2
        let mut t = Tableau::new(&[vec![1.0, -1.0]], &[2.0], &[1.0, 1.0]).unwrap();
        let report = Solver::new().solve(&mut t);
        assert_eq!(report.status, SolveStatus::Unbounded);
        assert!(t.verify_basis());
    }

    #[test]
    fn test_iteration_limit_keeps_snapshot() {
        let mut t = worked_example();
        let solver = Solver::new();
        solver.solve(&mut t);
        ConstraintManager::add_constraint(&mut t, &[1.0], Relation::Ge, 3.0).unwrap();

        let report = Solver::new().with_max_iterations(0).solve(&mut t);
        assert_eq!(report.status, SolveStatus::IterationLimitExceeded);
        assert_eq!(report.iterations, 0);
        let diagnostics = report.diagnostics.expect("diagnostics");
        assert!(diagnostics.rejected_pivots.is_empty());
        assert_eq!(diagnostics.snapshot.row_count(), 3);
        assert!(!diagnostics.snapshot.is_primal_feasible());

        // a larger budget finishes the job from where it stopped
        let report = solver.solve(&mut t);
        assert_eq!(report.status, SolveStatus::Optimal);
    }

    #[test]
    fn test_budget_not_needed_when_already_optimal() {
        let mut t = worked_example();
        Solver::new().solve(&mut t);
        let report = Solver::new().with_max_iterations(0).solve(&mut t);
        assert_eq!(report.status, SolveStatus::Optimal);
    }

    #[test]
    fn test_time_limit() {
        let mut t = worked_example();
        let report = Solver::new().with_time_limit(Duration::ZERO).solve(&mut t);
        assert_eq!(report.status, SolveStatus::TimeLimitExceeded);
        assert!(report.diagnostics.is_some());
    }

    #[test]
    fn test_degenerate_pivot_falls_back_to_next_candidate() {
        // max x3 with x1, x2, x3 <= 10: x1 and x2 stay non-basic with zero reduced cost
        let mut t = Tableau::new(
            &[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]],
            &[10.0, 10.0, 10.0],
            &[0.0, 0.0, 1.0],
        )
        .unwrap()
        .with_pivot_tolerance(1e-3);
        let solver = Solver::new();
        solver.solve(&mut t);

        // 1e-4 x1 + x2 >= 2: both ratios are zero, x1 wins the tie but is too small to pivot on
        ConstraintManager::add_constraint(&mut t, &[1e-4, 1.0], Relation::Ge, 2.0).unwrap();
        let report = solver.solve(&mut t);

        assert_eq!(report.status, SolveStatus::Optimal);
        assert_eq!(report.iterations, 1);
        assert_certified_optimal(&t);
        assert_eq!(t.basic_row(1), Some(3));
        assert_abs_diff_eq!(t.value(1), 2.0, epsilon = 1e-9);
        assert_eq!(t.value(0), 0.0);
    }

    #[test]
    fn test_degenerate_pivot_without_alternative() {
        // max x2 with x1, x2 <= 10
        let mut t = Tableau::new(&[vec![1.0, 0.0], vec![0.0, 1.0]], &[10.0, 10.0], &[0.0, 1.0])
            .unwrap()
            .with_pivot_tolerance(1e-3);
        let solver = Solver::new();
        solver.solve(&mut t);

        // -1e-4 x1 <= -10 can only be repaired through a pivot element below 1e-3
        ConstraintManager::add_constraint(&mut t, &[-1e-4], Relation::Le, -10.0).unwrap();
        let report = solver.solve(&mut t);

        assert_eq!(report.status, SolveStatus::IterationLimitExceeded);
        assert_eq!(report.iterations, 0);
        let diagnostics = report.diagnostics.expect("diagnostics");
        assert_eq!(
            diagnostics.rejected_pivots,
            vec![RejectedPivot { row: 2, column: 0, value: -1e-4 }]
        );
        assert!(t.verify_basis());
    }

    #[test]
    fn test_feasibility_phase_from_mixed_start() {
        // constraint appended before the first solve: neither primal nor dual feasible
        let mut t = worked_example();
        ConstraintManager::add_constraint(&mut t, &[1.0], Relation::Ge, 3.0).unwrap();
        assert!(!t.is_primal_feasible());
        assert!(!t.is_dual_feasible());

        let report = Solver::new().solve(&mut t);
        assert_eq!(report.status, SolveStatus::Optimal);
        assert_certified_optimal(&t);
        assert_abs_diff_eq!(t.value(0), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.value(2), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.objective_value(), 1500.0, epsilon = 1e-9);
    }

    #[test]
    fn test_feasibility_phase_detects_infeasibility() {
        let mut t = worked_example();
        ConstraintManager::add_constraint(&mut t, &[1.0, 1.0], Relation::Ge, 5.0).unwrap();

        let report = Solver::new().solve(&mut t);
        assert_eq!(report.status, SolveStatus::Infeasible);
        assert!(report.certificate.is_some());
        // objective row is restored in terms of the final basis
        assert!(t.verify_basis());
    }

    #[test]
    fn test_independent_tableaux_solve_in_parallel() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Tableau>();

        let mut tableaux: Vec<Tableau> = (1..=4)
            .map(|k| {
                Tableau::new(&[vec![1.0, 1.0]], &[k as f64], &[1.0, 2.0]).unwrap()
            })
            .collect();

        std::thread::scope(|scope| {
            for t in tableaux.iter_mut() {
                scope.spawn(move || Solver::new().solve(t));
            }
        });

        for (k, t) in tableaux.iter().enumerate() {
            assert_abs_diff_eq!(t.objective_value(), 2.0 * (k + 1) as f64, epsilon = 1e-9);
        }
    }
}
