//! Randomized cross-validation of the incremental solver against a full resolve.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::{
        ConstraintManager, LpProblem, ReferenceSolver, Relation, ResultReporter, Sense, SolveStatus, Solver,
        Tableau,
    };

    const EPS: f64 = 1e-6;

    #[derive(Debug, Clone)]
    struct Cut {
        coefficients: Vec<f64>,
        relation: Relation,
        rhs: f64,
    }

    /// `max cᵀx, Ax <= b` with every entry of `A` positive, so each variable is
    /// bounded and the origin is feasible
    #[derive(Debug, Clone)]
    struct BoundedLp {
        a: Vec<Vec<f64>>,
        b: Vec<f64>,
        c: Vec<f64>,
    }

    impl BoundedLp {
        fn problem(&self, cuts: &[Cut], sense: Sense) -> LpProblem {
            let names = (1..=self.c.len()).map(|j| format!("x{}", j)).collect();
            let mut problem = LpProblem::new(names);
            problem.set_objective(self.c.clone(), sense);
            for (i, (row, &rhs)) in self.a.iter().zip(&self.b).enumerate() {
                problem.add_constraint(format!("c{}", i + 1), row.clone(), Relation::Le, rhs);
            }
            for (k, cut) in cuts.iter().enumerate() {
                problem.add_constraint(format!("cut{}", k + 1), cut.coefficients.clone(), cut.relation, cut.rhs);
            }
            problem
        }
    }

    fn floats(values: Vec<i32>) -> Vec<f64> {
        values.into_iter().map(f64::from).collect()
    }

    fn cut(n: usize) -> impl Strategy<Value = Cut> {
        (prop::collection::vec(-3i32..=3, n), any::<bool>(), -10i32..=10).prop_map(|(coefficients, ge, rhs)| Cut {
            coefficients: floats(coefficients),
            relation: if ge { Relation::Ge } else { Relation::Le },
            rhs: f64::from(rhs),
        })
    }

    fn bounded_lp_with_cuts() -> impl Strategy<Value = (BoundedLp, Vec<Cut>)> {
        (2usize..=4, 1usize..=4, 1usize..=3).prop_flat_map(|(n, m, k)| {
            (
                prop::collection::vec(prop::collection::vec(1i32..=6, n), m),
                prop::collection::vec(1i32..=20, m),
                prop::collection::vec(0i32..=10, n),
                prop::collection::vec(cut(n), k),
            )
                .prop_map(|(a, b, c, cuts)| {
                    let lp = BoundedLp {
                        a: a.into_iter().map(floats).collect(),
                        b: floats(b),
                        c: floats(c),
                    };
                    (lp, cuts)
                })
        })
    }

    fn check_optimality_certificate(t: &Tableau) -> Result<(), TestCaseError> {
        let tol = t.tolerance();
        for row in 0..t.row_count() {
            prop_assert!(t.rhs(row) >= -tol, "row {} has rhs {}", row, t.rhs(row));
        }
        for (column, &d) in t.reduced_costs().iter().enumerate() {
            prop_assert!(d >= -tol, "column {} has reduced cost {}", column, d);
            if t.basic_row(column).is_some() {
                prop_assert!(d.abs() <= tol, "basic column {} has reduced cost {}", column, d);
            } else {
                prop_assert_eq!(t.value(column), 0.0);
            }
        }
        prop_assert!(t.verify_basis());
        Ok(())
    }

    proptest! {
        #[test]
        fn warm_start_matches_full_resolve((lp, cuts) in bounded_lp_with_cuts()) {
            let solver = Solver::new();
            let mut tableau = Tableau::new(&lp.a, &lp.b, &lp.c).unwrap();

            let report = solver.solve(&mut tableau);
            prop_assert_eq!(report.status, SolveStatus::Optimal);
            check_optimality_certificate(&tableau)?;

            let reference = ReferenceSolver::new().solve(&lp.problem(&[], Sense::Maximize));
            prop_assert_eq!(reference.status, SolveStatus::Optimal);
            prop_assert!((tableau.objective_value() - reference.objective_value).abs() < EPS);

            for (k, cut) in cuts.iter().enumerate() {
                ConstraintManager::add_constraint(&mut tableau, &cut.coefficients, cut.relation, cut.rhs).unwrap();
                prop_assert!(tableau.is_dual_feasible());

                let report = solver.solve(&mut tableau);
                let problem = lp.problem(&cuts[..=k], Sense::Maximize);
                let reference = ReferenceSolver::new().solve(&problem);
                prop_assert_eq!(report.status, reference.status);
                if report.status != SolveStatus::Optimal {
                    break;
                }

                check_optimality_certificate(&tableau)?;
                let solution = ResultReporter::extract(&tableau, &report);
                prop_assert!(
                    (solution.objective_value - reference.objective_value).abs() < EPS,
                    "incremental {} vs full resolve {}",
                    solution.objective_value,
                    reference.objective_value
                );
                prop_assert!(problem.violations(&solution.values, EPS).is_empty());

                // nothing left to do on a second call
                prop_assert_eq!(solver.solve(&mut tableau).iterations, 0);
            }
        }

        #[test]
        fn cold_start_with_cuts_matches_full_resolve(
            (lp, cuts) in bounded_lp_with_cuts(),
            minimize in any::<bool>(),
        ) {
            let sense = if minimize { Sense::Minimize } else { Sense::Maximize };
            let problem = lp.problem(&cuts, sense);

            let mut tableau = problem.to_tableau().unwrap();
            let report = Solver::new().solve(&mut tableau);
            let reference = ReferenceSolver::new().solve(&problem);

            prop_assert_eq!(report.status, reference.status);
            if report.status == SolveStatus::Optimal {
                check_optimality_certificate(&tableau)?;
                let solution = ResultReporter::extract(&tableau, &report);
                prop_assert!((solution.objective_value - reference.objective_value).abs() < EPS);
                prop_assert!(problem.violations(&solution.values, EPS).is_empty());
            } else {
                prop_assert_eq!(report.status, SolveStatus::Infeasible);
                prop_assert!(report.certificate.is_some());
            }
        }

        #[test]
        fn redundant_cut_leaves_solution_unchanged(
            (lp, _) in bounded_lp_with_cuts(),
            slack in 0i32..=5,
        ) {
            let solver = Solver::new();
            let mut tableau = Tableau::new(&lp.a, &lp.b, &lp.c).unwrap();
            solver.solve(&mut tableau);
            let before = ResultReporter::solution(&tableau).unwrap();

            // sum of all variables, bounded by its current value plus some slack
            let n = lp.c.len();
            let total: f64 = before.values.iter().sum();
            ConstraintManager::add_constraint(&mut tableau, &vec![1.0; n], Relation::Le, total + f64::from(slack))
                .unwrap();
            let report = solver.solve(&mut tableau);
            let after = ResultReporter::extract(&tableau, &report);

            prop_assert_eq!(report.status, SolveStatus::Optimal);
            prop_assert_eq!(report.iterations, 0);
            prop_assert!((after.objective_value - before.objective_value).abs() < EPS);
            for (x, y) in after.values.iter().zip(&before.values) {
                prop_assert!((x - y).abs() < EPS);
            }
        }
    }
}
