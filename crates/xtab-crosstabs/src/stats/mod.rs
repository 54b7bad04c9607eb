//! Association statistics over a [`Matrix`](crate::matrix::Matrix).
//!
//! Every quantity is an `Option<f64>`: `None` means the statistic is
//! undefined for this table (too few populated rows or columns, a zero
//! denominator, a non-numeric code) and the cell is left out of the report.

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};

pub mod chisq;
pub mod directional;
pub mod risk;
pub mod symmetric;

pub use chisq::{chi_square, ChiSquareTests, Fisher, Test};
pub use directional::{directional, DirectionalMeasures};
pub use risk::{risk, Estimate, RiskEstimate};
pub use symmetric::{symmetric, SymmetricMeasures};

/// A value with its asymptotic standard error, approximate T and
/// significance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Measure {
    pub value: Option<f64>,
    pub ase: Option<f64>,
    pub t: Option<f64>,
    pub sig: Option<f64>,
}

impl Measure {
    pub fn new(value: f64, ase: Option<f64>, t: Option<f64>, sig: Option<f64>) -> Self {
        let value = finite(value);
        if value.is_none() {
            return Self::default();
        }
        Self {
            value,
            ase: ase.and_then(finite),
            t: t.and_then(finite),
            sig: sig.and_then(finite),
        }
    }

    pub fn value_only(value: f64) -> Self {
        Self::new(value, None, None, None)
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    /// `[value, ase, t, sig]`, the column order of the measure tables.
    pub fn columns(&self) -> [Option<f64>; 4] {
        [self.value, self.ase, self.t, self.sig]
    }
}

pub(crate) fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

/// Kahan compensated summation.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct KahanSum {
    sum: f64,
    c: f64,
}

impl KahanSum {
    pub fn add(&mut self, x: f64) {
        let y = x - self.c;
        let t = self.sum + y;
        self.c = (t - self.sum) - y;
        self.sum = t;
    }

    pub fn value(&self) -> f64 {
        self.sum
    }
}

/// Upper tail of the chi-square distribution.
pub(crate) fn chisq_sig(x: f64, df: f64) -> Option<f64> {
    let dist = ChiSquared::new(df).ok()?;
    finite(dist.sf(x))
}

/// Two-tailed normal significance of `z`.
pub(crate) fn normal_sig(z: f64) -> Option<f64> {
    let dist = Normal::new(0.0, 1.0).ok()?;
    finite(2.0 * dist.sf(z.abs()))
}

/// Two-tailed significance of a correlation `r` over `n` weighted cases,
/// from Student's t with `n - 2` degrees of freedom.
pub(crate) fn correlation_sig(r: f64, n: f64) -> Option<f64> {
    let df = n - 2.0;
    if df <= 0.0 {
        return None;
    }
    let t = r * (df / (1.0 - (r * r).min(1.0))).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    finite(2.0 * dist.sf(t.abs()))
}

fn pow2(x: f64) -> f64 {
    x * x
}

#[cfg(test)]
pub(crate) mod testutil {
    use xtab_core::Value;

    use crate::domain::Domain;
    use crate::matrix::Matrix;
    use crate::request::VarRange;

    pub fn make_matrix(n_rows: usize, n_cols: usize, cells: &[f64]) -> Matrix {
        Matrix::from_dense(n_rows, n_cols, cells.to_vec()).unwrap()
    }

    /// Codes 1..=n.
    pub fn codes(n: usize) -> Domain {
        Domain::integer(
            &VarRange {
                min: 1,
                max: n as i64,
            },
            false,
        )
        .unwrap()
    }

    pub fn labels(names: &[&str]) -> Domain {
        let entries: Vec<_> = names
            .iter()
            .map(|n| crate::accumulator::FreqEntry {
                values: vec![Value::string(n, 4)],
                count: 1.0,
            })
            .collect();
        Domain::discover(&entries, 0, false)
    }

    pub fn assert_close(got: Option<f64>, want: f64, tol: f64) {
        let got = got.unwrap_or_else(|| panic!("expected {want}, got undefined"));
        assert!((got - want).abs() <= tol, "expected {want}, got {got}");
    }
}
