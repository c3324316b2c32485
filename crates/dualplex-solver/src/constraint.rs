use log::debug;

use crate::problem::Relation;
use crate::tableau::{ConstraintLabel, Tableau, TableauError};

/// Appends constraints to a live tableau.
///
/// Each call grows the tableau by exactly one row and one slack column per stored
/// inequality. Existing row and column indices never change, so indices obtained
/// before the call stay valid. The tableau is left for [`crate::Solver::solve`] to
/// re-optimize.
pub struct ConstraintManager;

impl ConstraintManager {
    /// Add `coefficients · x (relation) rhs`, returning the new constraint's index.
    ///
    /// `>=` is stored as the negated `<=` row. `=` is rejected, see
    /// [`ConstraintManager::add_equality`].
    pub fn add_constraint(
        tableau: &mut Tableau,
        coefficients: &[f64],
        relation: Relation,
        rhs: f64,
    ) -> Result<usize, TableauError> {
        let name = format!("c{}", tableau.row_count() + 1);
        Self::add_named_constraint(tableau, name, coefficients, relation, rhs)
    }

    pub fn add_named_constraint(
        tableau: &mut Tableau,
        name: impl Into<String>,
        coefficients: &[f64],
        relation: Relation,
        rhs: f64,
    ) -> Result<usize, TableauError> {
        let sign = match relation {
            Relation::Le => 1.0,
            Relation::Ge => -1.0,
            Relation::Eq => return Err(TableauError::UnsupportedRelation(relation)),
        };
        let row: Vec<f64> = coefficients.iter().map(|&v| sign * v).collect();
        let label = ConstraintLabel {
            name: name.into(),
            relation,
            rhs: sign * rhs,
        };

        debug!("adding constraint '{}' ({} {})", label.name, relation, rhs);
        tableau.append_labelled(&row, label)
    }

    /// Add `coefficients · x = rhs` as a `<=` row followed by a `>=` row.
    ///
    /// Returns both constraint indices. Nothing is appended when the input is invalid.
    pub fn add_equality(
        tableau: &mut Tableau,
        coefficients: &[f64],
        rhs: f64,
    ) -> Result<(usize, usize), TableauError> {
        let name = format!("c{}", tableau.row_count() + 1);
        Self::add_named_equality(tableau, name, coefficients, rhs)
    }

    pub fn add_named_equality(
        tableau: &mut Tableau,
        name: impl Into<String>,
        coefficients: &[f64],
        rhs: f64,
    ) -> Result<(usize, usize), TableauError> {
        // The second row is one column wider than the first
        if coefficients.len() > tableau.column_count() {
            return Err(TableauError::InvalidInput(format!(
                "constraint has {} coefficients but the tableau only has {} columns",
                coefficients.len(),
                tableau.column_count()
            )));
        }
        let name = name.into();
        let upper = Self::add_named_constraint(tableau, format!("{}_le", name), coefficients, Relation::Le, rhs)?;
        let lower = Self::add_named_constraint(tableau, format!("{}_ge", name), coefficients, Relation::Ge, rhs)?;
        Ok((upper, lower))
    }
}
