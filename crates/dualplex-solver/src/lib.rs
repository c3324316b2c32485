mod constraint;
mod pivot;
mod problem;
mod reference;
mod solution;
mod solver;
mod tableau;

#[cfg(test)]
mod proptests;

pub use constraint::ConstraintManager;
pub use pivot::{EnteringCandidate, PivotSelector, PrimalRule};
pub use problem::{Constraint, ConstraintViolation, LpProblem, Objective, Relation, Sense};
pub use reference::{ReferenceSolution, ReferenceSolver};
pub use solution::{Analysis, ReducedCost, ReportError, ResultReporter, SensitivityRange, ShadowPrice, Solution};
pub use solver::{Diagnostics, InfeasibilityCertificate, RejectedPivot, SolveReport, SolveStatus, Solver};
pub use tableau::{Tableau, TableauError, Variable, VariableKind, VariableStatus, DEFAULT_TOLERANCE};
