use std::collections::BTreeMap;

use thiserror::Error;

use crate::problem::{Relation, Sense};
use crate::solver::{InfeasibilityCertificate, SolveReport, SolveStatus};
use crate::tableau::{Tableau, VariableKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    #[error("Tableau is not optimal: {infeasible_rows} rows below zero, {negative_costs} negative reduced costs")]
    NotOptimal {
        infeasible_rows: usize,
        negative_costs: usize,
    },
}

/// The result of solving a tableau
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution status
    pub status: SolveStatus,
    /// Pivots performed by the solve that produced this solution
    pub iterations: usize,
    /// Value of every basic column; non-basic columns are zero
    pub variables: BTreeMap<usize, f64>,
    /// Value of each structural variable
    pub values: Vec<f64>,
    /// Objective value in the problem's own sense
    pub objective_value: f64,
    /// Reduced cost of each constraint's slack column, keyed by constraint index
    pub shadow_prices: BTreeMap<usize, f64>,
    /// Detailed analysis
    pub analysis: Analysis,
    /// The row that proved infeasibility
    pub certificate: Option<InfeasibilityCertificate>,
}

/// Detailed analysis of the optimal solution
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Shadow prices (dual values) for each constraint, signed as the change of the
    /// objective per unit increase of the RHS the caller wrote
    pub shadow_prices: Vec<ShadowPrice>,

    /// Reduced costs for each structural variable
    pub reduced_costs: Vec<ReducedCost>,

    /// Which constraints are binding (tight) at optimum
    pub binding_constraints: Vec<String>,

    /// Ranges of each objective coefficient over which the basis stays optimal
    pub objective_sensitivity: Vec<SensitivityRange>,

    /// Ranges of each constraint RHS over which the basis stays feasible
    pub rhs_sensitivity: Vec<SensitivityRange>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct ShadowPrice {
    /// Constraint name
    pub constraint: String,
    pub relation: Relation,
    /// Shadow price value
    pub value: f64,
    /// Interpretation
    pub interpretation: String,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct ReducedCost {
    /// Variable name
    pub variable: String,
    pub kind: VariableKind,
    /// Current value in solution
    pub value: f64,
    /// Reduced cost
    pub reduced_cost: f64,
    /// Is this variable in the basis?
    pub is_basic: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct SensitivityRange {
    /// Variable or constraint name
    pub name: String,
    /// Current value
    pub current: f64,
    /// Lower bound of range where solution structure stays same
    pub lower_bound: f64,
    /// Upper bound of range where solution structure stays same
    pub upper_bound: f64,
}

/// Reads primal values, dual prices and sensitivity ranges off a terminal tableau
pub struct ResultReporter;

impl ResultReporter {
    /// Build the solution for a finished solve.
    ///
    /// Only an `Optimal` report yields values and analysis; otherwise the solution
    /// carries the status and, for `Infeasible`, the certificate row.
    pub fn extract(tableau: &Tableau, report: &SolveReport) -> Solution {
        if report.status != SolveStatus::Optimal {
            let mut solution = Solution::without_values(report.status, tableau.sense());
            solution.iterations = report.iterations;
            solution.certificate = report.certificate.clone();
            return solution;
        }

        let mut solution = Self::read(tableau);
        solution.iterations = report.iterations;
        solution
    }

    /// Solution of a tableau that is currently optimal
    pub fn solution(tableau: &Tableau) -> Result<Solution, ReportError> {
        if !tableau.is_optimal() {
            let tol = tableau.tolerance();
            return Err(ReportError::NotOptimal {
                infeasible_rows: (0..tableau.row_count()).filter(|&i| tableau.rhs(i) < -tol).count(),
                negative_costs: tableau.reduced_costs().iter().filter(|&&d| d < -tol).count(),
            });
        }
        Ok(Self::read(tableau))
    }

    fn read(tableau: &Tableau) -> Solution {
        let variables: BTreeMap<usize, f64> = tableau
            .basis()
            .iter()
            .enumerate()
            .map(|(row, &column)| (column, tableau.rhs(row)))
            .collect();

        let values = (0..tableau.structural_count())
            .map(|j| variables.get(&j).copied().unwrap_or(0.0))
            .collect();

        let shadow_prices = (0..tableau.row_count())
            .map(|i| (i, tableau.reduced_cost(tableau.slack_column(i))))
            .collect();

        Solution {
            status: SolveStatus::Optimal,
            iterations: 0,
            variables,
            values,
            objective_value: tableau.sense().sign() * tableau.objective_value(),
            shadow_prices,
            analysis: analyze(tableau),
            certificate: None,
        }
    }
}

impl Solution {
    fn without_values(status: SolveStatus, sense: Sense) -> Self {
        // Worst attainable value for an empty feasible set, best for an unbounded one
        let objective_value = match status {
            SolveStatus::Infeasible => -sense.sign() * f64::INFINITY,
            SolveStatus::Unbounded => sense.sign() * f64::INFINITY,
            _ => f64::NAN,
        };
        Self {
            status,
            iterations: 0,
            variables: BTreeMap::new(),
            values: Vec::new(),
            objective_value,
            shadow_prices: BTreeMap::new(),
            analysis: Analysis::default(),
            certificate: None,
        }
    }

    /// Value of any column, zero when non-basic
    pub fn value(&self, column: usize) -> f64 {
        self.variables.get(&column).copied().unwrap_or(0.0)
    }
}

fn analyze(tableau: &Tableau) -> Analysis {
    let tol = tableau.tolerance();
    let sense = tableau.sense().sign();

    // Shadow prices: slack reduced costs, turned into d(objective)/d(rhs as written)
    let mut shadow_prices = Vec::new();
    for i in 0..tableau.row_count() {
        let label = tableau.constraint_label(i);
        let orientation = if label.relation == Relation::Ge { -1.0 } else { 1.0 };
        let value = sense * orientation * tableau.reduced_cost(tableau.slack_column(i));
        let interpretation = if value.abs() < tol {
            "Non-binding constraint".to_string()
        } else if value > 0.0 {
            format!("Increasing RHS by 1 unit would increase the objective by {:.4}", value)
        } else {
            format!("Increasing RHS by 1 unit would decrease the objective by {:.4}", -value)
        };
        shadow_prices.push(ShadowPrice {
            constraint: label.name.clone(),
            relation: label.relation,
            value,
            interpretation,
        });
    }

    let reduced_costs = (0..tableau.structural_count())
        .map(|j| {
            let row = tableau.basic_row(j);
            ReducedCost {
                variable: tableau.variable_name(j),
                kind: VariableKind::Structural,
                value: tableau.value(j),
                reduced_cost: if row.is_some() { 0.0 } else { tableau.reduced_cost(j) },
                is_basic: row.is_some(),
            }
        })
        .collect();

    // A constraint binds when its slack is zero
    let binding_constraints = (0..tableau.row_count())
        .filter(|&i| tableau.value(tableau.slack_column(i)).abs() <= tol)
        .map(|i| tableau.constraint_name(i).to_string())
        .collect();

    let objective_sensitivity = (0..tableau.structural_count())
        .map(|j| objective_range(tableau, j))
        .collect();

    let rhs_sensitivity = (0..tableau.row_count()).map(|i| rhs_range(tableau, i)).collect();

    Analysis {
        shadow_prices,
        reduced_costs,
        binding_constraints,
        objective_sensitivity,
        rhs_sensitivity,
    }
}

/// Range of the objective coefficient of structural column `j` that keeps every
/// reduced cost non-negative
fn objective_range(tableau: &Tableau, j: usize) -> SensitivityRange {
    let tol = tableau.tolerance();
    let sense = tableau.sense();
    let current = tableau.costs()[j];

    // Shift of the maximization-form coefficient
    let (low, high) = match tableau.basic_row(j) {
        None => (f64::NEG_INFINITY, tableau.reduced_cost(j)),
        Some(row) => {
            let mut low = f64::NEG_INFINITY;
            let mut high = f64::INFINITY;
            for (k, &a) in tableau.row(row).iter().enumerate() {
                if k == j || tableau.basic_row(k).is_some() {
                    continue;
                }
                let d = tableau.reduced_cost(k);
                if a > tol {
                    low = low.max(-d / a);
                } else if a < -tol {
                    high = high.min(-d / a);
                }
            }
            (low, high)
        }
    };

    let (lower_bound, upper_bound) = match sense {
        Sense::Maximize => (current + low, current + high),
        Sense::Minimize => (current - high, current - low),
    };
    SensitivityRange {
        name: tableau.variable_name(j),
        current,
        lower_bound,
        upper_bound,
    }
}

/// Range of constraint `i`'s RHS that keeps every basic variable non-negative
fn rhs_range(tableau: &Tableau, i: usize) -> SensitivityRange {
    let tol = tableau.tolerance();
    let label = tableau.constraint_label(i);
    let slack = tableau.slack_column(i);

    // The slack column holds the basis inverse applied to e_i
    let mut low = f64::NEG_INFINITY;
    let mut high = f64::INFINITY;
    for row in 0..tableau.row_count() {
        let d = tableau.coefficient(row, slack);
        let rhs = tableau.rhs(row);
        if d > tol {
            low = low.max(-rhs / d);
        } else if d < -tol {
            high = high.min(-rhs / d);
        }
    }

    let (current, lower_bound, upper_bound) = match label.relation {
        Relation::Ge => (-label.rhs, -(label.rhs + high), -(label.rhs + low)),
        _ => (label.rhs, label.rhs + low, label.rhs + high),
    };
    SensitivityRange {
        name: label.name.clone(),
        current,
        lower_bound,
        upper_bound,
    }
}
