use xtab_core::Value;

use super::finite;
use crate::domain::Domain;
use crate::matrix::Matrix;

/// z for a 95% confidence interval.
const Z_95: f64 = 1.960;

/// A point estimate with its 95% confidence interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Estimate {
    pub value: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Estimate {
    fn log_normal(value: f64, spread: f64) -> Self {
        let Some(v) = finite(value) else {
            return Self::default();
        };
        Self {
            value: Some(v),
            lower: finite(v * (-Z_95 * spread).exp()),
            upper: finite(v * (Z_95 * spread).exp()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskEstimate {
    pub odds_ratio: Estimate,
    /// Relative risk for membership in the first and second populated
    /// column.
    pub cohorts: [Estimate; 2],
    /// Values of the two populated rows.
    pub row_values: [Value; 2],
    /// Values of the two populated columns.
    pub col_values: [Value; 2],
    pub n_valid: f64,
}

/// Odds ratio and cohort relative risks.  Defined only when exactly two rows
/// and two columns are populated.
pub fn risk(m: &Matrix, rows: &Domain, cols: &Domain) -> Option<RiskEstimate> {
    if m.ns_rows != 2 || m.ns_cols != 2 {
        return None;
    }
    let r: Vec<usize> = m.populated_rows().collect();
    let c: Vec<usize> = m.populated_cols().collect();
    let (f11, f12) = (m.get(r[0], c[0]), m.get(r[0], c[1]));
    let (f21, f22) = (m.get(r[1], c[0]), m.get(r[1], c[1]));

    let value_at = |d: &Domain, i: usize| d.values().get(i).cloned();
    let row_values = [value_at(rows, r[0])?, value_at(rows, r[1])?];
    let col_values = [value_at(cols, c[0])?, value_at(cols, c[1])?];

    let odds_ratio = Estimate::log_normal(
        (f11 * f22) / (f12 * f21),
        (1.0 / f11 + 1.0 / f12 + 1.0 / f21 + 1.0 / f22).sqrt(),
    );
    let first = Estimate::log_normal(
        (f11 * (f21 + f22)) / (f21 * (f11 + f12)),
        (f12 / (f11 * (f11 + f12)) + f22 / (f21 * (f21 + f22))).sqrt(),
    );
    let second = Estimate::log_normal(
        (f12 * (f21 + f22)) / (f22 * (f11 + f12)),
        (f11 / (f12 * (f11 + f12)) + f21 / (f22 * (f21 + f22))).sqrt(),
    );

    Some(RiskEstimate {
        odds_ratio,
        cohorts: [first, second],
        row_values,
        col_values,
        n_valid: f11 + f12 + f21 + f22,
    })
}
