//! Pivot selection for the dual and primal simplex phases.
//!
//! Every rule breaks ties (values within the tableau tolerance of each other) by the
//! lowest row or column index, so a given tableau always yields the same pivot.

use crate::tableau::Tableau;

/// Rule used to pick the entering column of a primal pivot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimalRule {
    /// Most negative reduced cost
    #[default]
    Dantzig,
    /// Lowest-index column with a negative reduced cost (Bland)
    Bland,
}

/// A column eligible to enter the basis on a dual pivot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnteringCandidate {
    pub column: usize,
    /// `|reduced cost / coefficient|`
    pub ratio: f64,
    /// Coefficient of the column in the leaving row
    pub coefficient: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PivotSelector {
    primal_rule: PrimalRule,
}

impl PivotSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primal_rule(mut self, rule: PrimalRule) -> Self {
        self.primal_rule = rule;
        self
    }

    pub fn primal_rule(&self) -> PrimalRule {
        self.primal_rule
    }

    /// Row with the most negative RHS below `-tolerance`, or `None` when the tableau
    /// is primal feasible
    pub fn select_leaving_row(&self, tableau: &Tableau) -> Option<usize> {
        let tol = tableau.tolerance();
        let mut best: Option<(usize, f64)> = None;

        for row in 0..tableau.row_count() {
            let rhs = tableau.rhs(row);
            if rhs < -tol && best.is_none_or(|(_, min)| rhs < min - tol) {
                best = Some((row, rhs));
            }
        }

        best.map(|(row, _)| row)
    }

    /// Dual ratio test on `row`.
    ///
    /// `None` means no column has a negative coefficient in the row, which proves the
    /// problem infeasible.
    pub fn select_entering_column(&self, tableau: &Tableau, row: usize) -> Option<usize> {
        let candidates = self.dual_candidates(tableau, row);
        best_candidate(&candidates, tableau.tolerance()).map(|i| candidates[i].column)
    }

    /// All columns eligible for a dual pivot on `row`, best first.
    ///
    /// The first entry is the one [`PivotSelector::select_entering_column`] returns;
    /// the rest are the fallbacks when a pivot element turns out too small.
    pub fn entering_candidates(&self, tableau: &Tableau, row: usize) -> Vec<EnteringCandidate> {
        let tol = tableau.tolerance();
        let mut remaining = self.dual_candidates(tableau, row);
        let mut ranked = Vec::with_capacity(remaining.len());

        while let Some(i) = best_candidate(&remaining, tol) {
            ranked.push(remaining.remove(i));
        }
        ranked
    }

    fn dual_candidates(&self, tableau: &Tableau, row: usize) -> Vec<EnteringCandidate> {
        let tol = tableau.tolerance();
        tableau
            .row(row)
            .iter()
            .enumerate()
            .filter(|&(_, &a)| a < -tol)
            .map(|(column, &a)| EnteringCandidate {
                column,
                ratio: (tableau.reduced_cost(column) / a).abs(),
                coefficient: a,
            })
            .collect()
    }

    /// Entering column for a primal pivot, or `None` when the tableau is dual feasible
    pub fn select_primal_entering(&self, tableau: &Tableau) -> Option<usize> {
        let tol = tableau.tolerance();
        let mut costs = tableau
            .reduced_costs()
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, d)| d < -tol);

        match self.primal_rule {
            PrimalRule::Bland => costs.next().map(|(column, _)| column),
            PrimalRule::Dantzig => costs
                .fold(None, |best: Option<(usize, f64)>, (column, d)| match best {
                    Some((_, min)) if d >= min - tol => best,
                    _ => Some((column, d)),
                })
                .map(|(column, _)| column),
        }
    }

    /// Primal ratio test on `column`: the row minimizing `rhs / a` over `a` above the
    /// pivot tolerance. `None` means the column is an unbounded ray.
    pub fn select_primal_leaving(&self, tableau: &Tableau, column: usize) -> Option<usize> {
        let tol = tableau.tolerance();
        let threshold = tol.max(tableau.pivot_tolerance());
        let mut best: Option<(usize, f64)> = None;

        for row in 0..tableau.row_count() {
            let a = tableau.coefficient(row, column);
            if a > threshold {
                let ratio = tableau.rhs(row).max(0.0) / a;
                if best.is_none_or(|(_, min)| ratio < min - tol) {
                    best = Some((row, ratio));
                }
            }
        }

        best.map(|(row, _)| row)
    }
}

/// Index of the lowest-ratio candidate; candidates are in column order so the first
/// of several tied ratios wins
fn best_candidate(candidates: &[EnteringCandidate], tol: f64) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, c) in candidates.iter().enumerate() {
        if best.is_none_or(|b| c.ratio < candidates[b].ratio - tol) {
            best = Some(i);
        }
    }
    best
}
