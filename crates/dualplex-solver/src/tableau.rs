use log::trace;
use thiserror::Error;

use crate::problem::{Relation, Sense};

/// Default tolerance for feasibility, optimality and pivot-magnitude checks
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableauError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Degenerate pivot at row {row}, column {column}: |{value:e}| is below {tolerance:e}")]
    DegeneratePivot {
        row: usize,
        column: usize,
        value: f64,
        tolerance: f64,
    },
    #[error("Unsupported relation '{0}': add both the <= and >= forms instead")]
    UnsupportedRelation(Relation),
}

/// Whether a column belongs to an original decision variable or to a constraint's slack
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Structural,
    Slack { constraint: usize },
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableStatus {
    Basic { row: usize },
    NonBasic,
}

/// A column of the tableau, as seen from the outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
    pub column: usize,
    pub kind: VariableKind,
    pub status: VariableStatus,
}

impl Variable {
    pub fn is_basic(&self) -> bool {
        matches!(self.status, VariableStatus::Basic { .. })
    }
}

/// Reporting metadata for one constraint row.
///
/// `rhs` is the right-hand side of the stored `<=` form, so a `>=` constraint keeps
/// the negation of what the caller wrote.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ConstraintLabel {
    pub name: String,
    pub relation: Relation,
    pub rhs: f64,
}

/// Dense simplex tableau for `maximize cᵀx subject to Ax <= b, x >= 0`.
///
/// Columns are laid out as the structural variables followed by one slack per
/// constraint, so the slack of constraint `i` always sits at column
/// `structural_count + i` and constraint `i` always occupies row `i`. Every row
/// stores its coefficients followed by the RHS; the objective row stores the reduced
/// costs followed by the current objective value `Z`.
///
/// Outside of [`Tableau::pivot`] the columns named by the basis form an identity
/// submatrix and carry a zero reduced cost.
#[derive(Debug, Clone)]
pub struct Tableau {
    rows: Vec<Vec<f64>>,
    objective: Vec<f64>,
    basis: Vec<usize>,
    structural_count: usize,
    tolerance: f64,
    pivot_tolerance: f64,
    sense: Sense,
    costs: Vec<f64>,
    variable_names: Vec<String>,
    constraints: Vec<ConstraintLabel>,
}

impl Tableau {
    /// Build the initial tableau with the slack variables as basis.
    ///
    /// Every entry of `b` must be non-negative so that the slack basis is primal
    /// feasible.
    pub fn new(a: &[Vec<f64>], b: &[f64], c: &[f64]) -> Result<Self, TableauError> {
        if let Some(i) = b.iter().position(|&rhs| rhs < 0.0) {
            return Err(TableauError::InvalidInput(format!(
                "right-hand side of row {} is negative ({}); the slack basis would be infeasible",
                i, b[i]
            )));
        }
        Self::build(a, b, c)
    }

    /// Same as [`Tableau::new`] without the `b >= 0` precondition. The solver's
    /// feasibility phase takes care of rows that start out negative.
    pub(crate) fn build(a: &[Vec<f64>], b: &[f64], c: &[f64]) -> Result<Self, TableauError> {
        let n = c.len();
        let m = b.len();

        if n == 0 {
            return Err(TableauError::InvalidInput("objective has no variables".to_string()));
        }
        if a.len() != m {
            return Err(TableauError::InvalidInput(format!(
                "matrix has {} rows but right-hand side has {} entries",
                a.len(),
                m
            )));
        }
        for (i, row) in a.iter().enumerate() {
            if row.len() != n {
                return Err(TableauError::InvalidInput(format!(
                    "row {} has {} coefficients, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            check_finite(row, &format!("row {}", i))?;
        }
        check_finite(b, "right-hand side")?;
        check_finite(c, "objective")?;

        let columns = n + m;
        let rows = a
            .iter()
            .zip(b)
            .enumerate()
            .map(|(i, (coefficients, &rhs))| {
                let mut row = Vec::with_capacity(columns + 1);
                row.extend_from_slice(coefficients);
                row.resize(columns + 1, 0.0);
                row[n + i] = 1.0;
                row[columns] = rhs;
                row
            })
            .collect();

        let mut objective = vec![0.0; columns + 1];
        for (j, &cost) in c.iter().enumerate() {
            objective[j] = -cost;
        }

        Ok(Self {
            rows,
            objective,
            basis: (n..columns).collect(),
            structural_count: n,
            tolerance: DEFAULT_TOLERANCE,
            pivot_tolerance: DEFAULT_TOLERANCE,
            sense: Sense::Maximize,
            costs: c.to_vec(),
            variable_names: (1..=n).map(|j| format!("x{}", j)).collect(),
            constraints: b
                .iter()
                .enumerate()
                .map(|(i, &rhs)| ConstraintLabel {
                    name: format!("c{}", i + 1),
                    relation: Relation::Le,
                    rhs,
                })
                .collect(),
        })
    }

    /// Tolerance used by the feasibility and optimality checks
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Smallest pivot magnitude [`Tableau::pivot`] accepts
    pub fn with_pivot_tolerance(mut self, tol: f64) -> Self {
        self.pivot_tolerance = tol;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn pivot_tolerance(&self) -> f64 {
        self.pivot_tolerance
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.objective.len() - 1
    }

    pub fn structural_count(&self) -> usize {
        self.structural_count
    }

    /// Coefficients of a row, without its RHS
    pub fn row(&self, row: usize) -> &[f64] {
        let row = &self.rows[row];
        &row[..row.len() - 1]
    }

    pub fn coefficient(&self, row: usize, column: usize) -> f64 {
        self.rows[row][column]
    }

    pub fn rhs(&self, row: usize) -> f64 {
        let row = &self.rows[row];
        row[row.len() - 1]
    }

    pub fn reduced_cost(&self, column: usize) -> f64 {
        self.objective[column]
    }

    pub fn reduced_costs(&self) -> &[f64] {
        &self.objective[..self.column_count()]
    }

    /// Current objective value `Z` of the maximization form
    pub fn objective_value(&self) -> f64 {
        self.objective[self.column_count()]
    }

    /// Column of the basic variable occupying each row
    pub fn basis(&self) -> &[usize] {
        &self.basis
    }

    pub fn basic_row(&self, column: usize) -> Option<usize> {
        self.basis.iter().position(|&b| b == column)
    }

    /// Column holding the slack variable of a constraint
    pub fn slack_column(&self, constraint: usize) -> usize {
        self.structural_count + constraint
    }

    pub fn variable(&self, column: usize) -> Option<Variable> {
        if column >= self.column_count() {
            return None;
        }
        let kind = if column < self.structural_count {
            VariableKind::Structural
        } else {
            VariableKind::Slack {
                constraint: column - self.structural_count,
            }
        };
        let status = match self.basic_row(column) {
            Some(row) => VariableStatus::Basic { row },
            None => VariableStatus::NonBasic,
        };
        Some(Variable { column, kind, status })
    }

    /// Current value of a column: its row's RHS when basic, zero otherwise
    pub fn value(&self, column: usize) -> f64 {
        self.basic_row(column).map_or(0.0, |row| self.rhs(row))
    }

    pub fn variable_name(&self, column: usize) -> String {
        if column < self.structural_count {
            self.variable_names[column].clone()
        } else {
            format!("slack_{}", self.constraints[column - self.structural_count].name)
        }
    }

    pub fn constraint_name(&self, constraint: usize) -> &str {
        &self.constraints[constraint].name
    }

    pub fn constraint_relation(&self, constraint: usize) -> Relation {
        self.constraints[constraint].relation
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub(crate) fn constraint_label(&self, constraint: usize) -> &ConstraintLabel {
        &self.constraints[constraint]
    }

    /// Objective coefficients of the structural variables as the caller wrote them
    pub(crate) fn costs(&self) -> &[f64] {
        &self.costs
    }

    pub(crate) fn set_labels(
        &mut self,
        variable_names: Vec<String>,
        constraints: Vec<ConstraintLabel>,
        sense: Sense,
        costs: Vec<f64>,
    ) {
        self.variable_names = variable_names;
        self.constraints = constraints;
        self.sense = sense;
        self.costs = costs;
    }

    /// All RHS values are at least `-tolerance`
    pub fn is_primal_feasible(&self) -> bool {
        (0..self.rows.len()).all(|i| self.rhs(i) >= -self.tolerance)
    }

    /// All reduced costs are at least `-tolerance`
    pub fn is_dual_feasible(&self) -> bool {
        self.reduced_costs().iter().all(|&d| d >= -self.tolerance)
    }

    pub fn is_optimal(&self) -> bool {
        self.is_primal_feasible() && self.is_dual_feasible()
    }

    /// Check that the basis is a bijection onto the rows and that its columns form
    /// an identity submatrix with zero reduced costs.
    pub fn verify_basis(&self) -> bool {
        let columns = self.column_count();
        let mut seen = vec![false; columns];
        for (row, &column) in self.basis.iter().enumerate() {
            if column >= columns || seen[column] {
                return false;
            }
            seen[column] = true;

            for (i, r) in self.rows.iter().enumerate() {
                let expected = if i == row { 1.0 } else { 0.0 };
                if (r[column] - expected).abs() > self.tolerance {
                    return false;
                }
            }
            if self.objective[column].abs() > self.tolerance {
                return false;
            }
        }
        true
    }

    /// Gauss-Jordan pivot on `(row, column)`.
    ///
    /// The pivot row is divided by the pivot element and the column is eliminated
    /// from every other row and from the objective row. The tableau is left untouched
    /// when an error is returned.
    pub fn pivot(&mut self, row: usize, column: usize) -> Result<(), TableauError> {
        if row >= self.rows.len() || column >= self.column_count() {
            return Err(TableauError::InvalidInput(format!(
                "pivot position ({}, {}) is outside the {}x{} tableau",
                row,
                column,
                self.rows.len(),
                self.column_count()
            )));
        }

        let pivot_value = self.rows[row][column];
        if pivot_value.is_nan() || pivot_value.abs() < self.pivot_tolerance {
            return Err(TableauError::DegeneratePivot {
                row,
                column,
                value: pivot_value,
                tolerance: self.pivot_tolerance,
            });
        }

        trace!(
            "pivot on ({}, {}) = {:.6}: column {} leaves, column {} enters",
            row, column, pivot_value, self.basis[row], column
        );

        let mut pivot_row = std::mem::take(&mut self.rows[row]);
        for value in pivot_row.iter_mut() {
            *value /= pivot_value;
        }
        pivot_row[column] = 1.0;

        for (i, target) in self.rows.iter_mut().enumerate() {
            if i != row {
                eliminate(target, &pivot_row, column);
            }
        }
        eliminate(&mut self.objective, &pivot_row, column);

        self.rows[row] = pivot_row;
        self.basis[row] = column;
        Ok(())
    }

    /// Append `coefficients · x + s = rhs` with a fresh slack `s` as its basic variable.
    ///
    /// `coefficients` are given over the current columns (structural first) and may be
    /// shorter than the column count; missing entries are zero. The new row is reduced
    /// against the current basis before insertion so the basis stays an identity
    /// submatrix. Returns the index of the new constraint.
    pub fn append_constraint(&mut self, coefficients: &[f64], rhs: f64) -> Result<usize, TableauError> {
        let label = ConstraintLabel {
            name: format!("c{}", self.rows.len() + 1),
            relation: Relation::Le,
            rhs,
        };
        self.append_labelled(coefficients, label)
    }

    pub(crate) fn append_labelled(
        &mut self,
        coefficients: &[f64],
        label: ConstraintLabel,
    ) -> Result<usize, TableauError> {
        let columns = self.column_count();
        if coefficients.len() > columns {
            return Err(TableauError::InvalidInput(format!(
                "constraint has {} coefficients but the tableau only has {} columns",
                coefficients.len(),
                columns
            )));
        }
        check_finite(coefficients, "constraint")?;
        check_finite(&[label.rhs], "constraint right-hand side")?;

        // [old columns | new slack | rhs]
        let mut new_row = vec![0.0; columns + 2];
        new_row[..coefficients.len()].copy_from_slice(coefficients);
        new_row[columns] = 1.0;
        new_row[columns + 1] = label.rhs;

        for row in self.rows.iter_mut() {
            row.insert(columns, 0.0);
        }
        self.objective.insert(columns, 0.0);

        for (row, &basic) in self.rows.iter().zip(&self.basis) {
            let factor = new_row[basic];
            if factor != 0.0 {
                for (value, &r) in new_row.iter_mut().zip(row) {
                    *value -= factor * r;
                }
                new_row[basic] = 0.0;
            }
        }

        trace!(
            "appended constraint '{}' as row {} with reduced rhs {:.6}",
            label.name,
            self.rows.len(),
            new_row[columns + 1]
        );

        self.rows.push(new_row);
        self.basis.push(columns);
        self.constraints.push(label);
        Ok(self.rows.len() - 1)
    }

    /// Swap in a different objective row, returning the previous one
    pub(crate) fn replace_objective(&mut self, objective: Vec<f64>) -> Vec<f64> {
        std::mem::replace(&mut self.objective, objective)
    }

    /// Re-express the objective row in terms of the current basis
    pub(crate) fn price_out_basis(&mut self) {
        for (row, &basic) in self.rows.iter().zip(&self.basis) {
            let factor = self.objective[basic];
            if factor != 0.0 {
                for (value, &r) in self.objective.iter_mut().zip(row) {
                    *value -= factor * r;
                }
                self.objective[basic] = 0.0;
            }
        }
    }
}

fn eliminate(target: &mut [f64], pivot_row: &[f64], column: usize) {
    let factor = target[column];
    if factor == 0.0 {
        return;
    }
    for (value, &p) in target.iter_mut().zip(pivot_row) {
        *value -= factor * p;
    }
    target[column] = 0.0;
}

fn check_finite(values: &[f64], what: &str) -> Result<(), TableauError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(j) => Err(TableauError::InvalidInput(format!(
            "{} has a non-finite entry at position {} ({})",
            what, j, values[j]
        ))),
        None => Ok(()),
    }
}
