use std::fmt;

use crate::tableau::{ConstraintLabel, Tableau, TableauError};

/// Represents a linear programming problem with named variables and constraints
#[derive(Debug, Clone)]
pub struct LpProblem {
    /// Variable names
    pub variables: Vec<String>,
    /// Objective function
    pub objective: Objective,
    /// Constraints
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone)]
pub struct Objective {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Whether to maximize or minimize
    pub sense: Sense,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sense {
    #[default]
    Maximize,
    Minimize,
}

impl Sense {
    /// Sign that turns an objective of this sense into the maximization form
    pub fn sign(self) -> f64 {
        match self {
            Sense::Maximize => 1.0,
            Sense::Minimize => -1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Comparison operator
    pub relation: Relation,
    /// Right-hand side value
    pub rhs: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Le => "<=",
            Relation::Ge => ">=",
            Relation::Eq => "=",
        })
    }
}

/// Information about a violated constraint
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct ConstraintViolation {
    /// Constraint name
    pub constraint: String,
    /// Required value (from constraint RHS)
    pub required: f64,
    /// Actual value achieved
    pub actual: f64,
    /// How much the constraint is violated by
    pub violation_amount: f64,
    /// Human-readable description of what's wrong
    pub description: String,
}

impl LpProblem {
    pub fn new(variables: Vec<String>) -> Self {
        let n = variables.len();
        Self {
            variables,
            objective: Objective {
                coefficients: vec![0.0; n],
                sense: Sense::Maximize,
            },
            constraints: Vec::new(),
        }
    }

    pub fn set_objective(&mut self, coefficients: Vec<f64>, sense: Sense) {
        self.objective = Objective { coefficients, sense };
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, coefficients: Vec<f64>, relation: Relation, rhs: f64) {
        self.constraints.push(Constraint {
            name: name.into(),
            coefficients,
            relation,
            rhs,
        });
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Objective value of a point, in the problem's own sense
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        dot(&self.objective.coefficients, values)
    }

    /// Build a tableau with the slack variables as initial basis.
    ///
    /// `>=` rows are stored negated. Rows whose stored RHS ends up negative are kept
    /// as they are; [`crate::Solver::solve`] restores feasibility for them. Equality
    /// constraints are rejected, add them as a `<=`/`>=` pair instead.
    pub fn to_tableau(&self) -> Result<Tableau, TableauError> {
        let n = self.num_variables();
        if self.objective.coefficients.len() != n {
            return Err(TableauError::InvalidInput(format!(
                "objective has {} coefficients for {} variables",
                self.objective.coefficients.len(),
                n
            )));
        }

        let mut a = Vec::with_capacity(self.constraints.len());
        let mut b = Vec::with_capacity(self.constraints.len());
        let mut labels = Vec::with_capacity(self.constraints.len());

        for c in &self.constraints {
            if c.coefficients.len() != n {
                return Err(TableauError::InvalidInput(format!(
                    "constraint '{}' has {} coefficients for {} variables",
                    c.name,
                    c.coefficients.len(),
                    n
                )));
            }
            let sign = match c.relation {
                Relation::Le => 1.0,
                Relation::Ge => -1.0,
                Relation::Eq => return Err(TableauError::UnsupportedRelation(Relation::Eq)),
            };
            a.push(c.coefficients.iter().map(|&v| sign * v).collect::<Vec<f64>>());
            b.push(sign * c.rhs);
            labels.push(ConstraintLabel {
                name: c.name.clone(),
                relation: c.relation,
                rhs: sign * c.rhs,
            });
        }

        let sign = self.objective.sense.sign();
        let costs: Vec<f64> = self.objective.coefficients.iter().map(|&v| sign * v).collect();

        let mut tableau = Tableau::build(&a, &b, &costs)?;
        tableau.set_labels(
            self.variables.clone(),
            labels,
            self.objective.sense,
            self.objective.coefficients.clone(),
        );
        Ok(tableau)
    }

    /// Find which constraints are violated by a given point
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<ConstraintViolation> {
        let mut violations = Vec::new();

        for c in &self.constraints {
            let lhs = dot(&c.coefficients, values);

            let (is_violated, violation_amount, description) = match c.relation {
                Relation::Le => {
                    if lhs > c.rhs + tolerance {
                        let amt = lhs - c.rhs;
                        (true, amt, format!("{} exceeds maximum of {:.2} by {:.2}", c.name, c.rhs, amt))
                    } else {
                        (false, 0.0, String::new())
                    }
                }
                Relation::Ge => {
                    if lhs < c.rhs - tolerance {
                        let amt = c.rhs - lhs;
                        (true, amt, format!("{} is below minimum of {:.2} by {:.2}", c.name, c.rhs, amt))
                    } else {
                        (false, 0.0, String::new())
                    }
                }
                Relation::Eq => {
                    let diff = (lhs - c.rhs).abs();
                    if diff > tolerance {
                        (true, diff, format!("{} requires exactly {:.2} but got {:.2}", c.name, c.rhs, lhs))
                    } else {
                        (false, 0.0, String::new())
                    }
                }
            };

            if is_violated {
                violations.push(ConstraintViolation {
                    constraint: c.name.clone(),
                    required: c.rhs,
                    actual: lhs,
                    violation_amount,
                    description,
                });
            }
        }

        for (name, &v) in self.variables.iter().zip(values) {
            if v < -tolerance {
                violations.push(ConstraintViolation {
                    constraint: format!("{} >= 0", name),
                    required: 0.0,
                    actual: v,
                    violation_amount: -v,
                    description: format!("{} is negative ({:.2})", name, v),
                });
            }
        }

        // Worst first
        violations.sort_by(|a, b| b.violation_amount.total_cmp(&a.violation_amount));

        violations
    }
}

fn dot(coefficients: &[f64], values: &[f64]) -> f64 {
    coefficients.iter().zip(values).map(|(a, x)| a * x).sum()
}
