use statrs::function::gamma::ln_gamma;

use super::symmetric::pearson_r;
use super::{chisq_sig, finite, pow2};
use crate::domain::Domain;
use crate::matrix::Matrix;

/// A chi-square-distributed statistic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Test {
    pub value: f64,
    pub df: f64,
}

impl Test {
    fn new(value: f64, df: f64) -> Option<Self> {
        finite(value).map(|value| Self { value, df })
    }

    /// Asymptotic significance (upper tail).
    pub fn asymp_sig(&self) -> Option<f64> {
        chisq_sig(self.value, self.df)
    }
}

/// Fisher's exact test significances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fisher {
    pub one_tailed: f64,
    pub two_tailed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChiSquareTests {
    pub pearson: Option<Test>,
    pub likelihood_ratio: Option<Test>,
    pub fisher: Option<Fisher>,
    /// Yates' continuity correction.
    pub continuity: Option<Test>,
    pub linear_by_linear: Option<Test>,
    pub n_valid: f64,
}

pub fn chi_square(m: &Matrix, rows: &Domain, cols: &Domain) -> ChiSquareTests {
    let mut out = ChiSquareTests {
        pearson: None,
        likelihood_ratio: None,
        fisher: None,
        continuity: None,
        linear_by_linear: None,
        n_valid: m.total,
    };
    if m.ns_rows <= 1 || m.ns_cols <= 1 {
        return out;
    }

    let df = ((m.ns_cols - 1) * (m.ns_rows - 1)) as f64;
    let mut pearson = 0.0;
    let mut lr = 0.0;
    for r in m.populated_rows() {
        for c in m.populated_cols() {
            let expected = m.row_tot[r] * m.col_tot[c] / m.total;
            let freq = m.get(r, c);
            pearson += pow2(freq - expected) / expected;
            if freq != 0.0 {
                lr += freq * (expected / freq).ln();
            }
        }
    }
    // An exactly zero Pearson statistic is reported as undefined.
    if pearson != 0.0 {
        out.pearson = Test::new(pearson, df);
    }
    if lr != 0.0 {
        out.likelihood_ratio = Test::new(-2.0 * lr, df);
    }

    if m.ns_rows == 2 && m.ns_cols == 2 {
        let r: Vec<usize> = m.populated_rows().collect();
        let c: Vec<usize> = m.populated_cols().collect();
        let (f11, f12) = (m.get(r[0], c[0]), m.get(r[0], c[1]));
        let (f21, f22) = (m.get(r[1], c[0]), m.get(r[1], c[1]));

        let x = (f11 * f22 - f12 * f21).abs() - 0.5 * m.total;
        let yates = if x > 0.0 {
            m.total * pow2(x) / (f11 + f12) / (f21 + f22) / (f11 + f21) / (f12 + f22)
        } else {
            0.0
        };
        out.continuity = Test::new(yates, 1.0);
        out.fisher = Some(fisher(
            round_count(f11),
            round_count(f12),
            round_count(f21),
            round_count(f22),
        ));
    }

    if let (Some(x), Some(y)) = (rows.numeric_codes(), cols.numeric_codes()) {
        if let Some(r) = pearson_r(m, &x, &y).value {
            out.linear_by_linear = Test::new((m.total - 1.0) * pow2(r), 1.0);
        }
    }
    out
}

fn round_count(f: f64) -> i64 {
    (f + 0.5) as i64
}

/// ln(x - 1)! for integral `x`, 0 below 2.
fn log_factorial_below(x: i64) -> f64 {
    if x < 2 {
        0.0
    } else {
        ln_gamma(x as f64)
    }
}

/// Hypergeometric probability of the 2×2 table `a b; c d`.
fn table_probability(a: i64, b: i64, c: i64, d: i64) -> f64 {
    let l = log_factorial_below;
    (l(a + b + 1) - l(a + 1) + l(c + d + 1) - l(b + 1) + l(a + c + 1) - l(c + 1)
        + l(b + d + 1)
        - l(d + 1)
        - l(a + b + c + d + 1))
        .exp()
}

/// Fisher's exact test.  The table is first rearranged so that `a` is the
/// smallest cell and the one-tailed sum runs toward `a = 0`.
pub(crate) fn fisher(mut a: i64, mut b: i64, mut c: i64, mut d: i64) -> Fisher {
    use std::mem::swap;

    if c.min(d) < a.min(b) {
        swap(&mut a, &mut c);
        swap(&mut b, &mut d);
    }
    if b.min(d) < a.min(c) {
        swap(&mut a, &mut b);
        swap(&mut c, &mut d);
    }
    if b * c < a * d {
        if b < c {
            swap(&mut a, &mut b);
            swap(&mut c, &mut d);
        } else {
            swap(&mut a, &mut c);
            swap(&mut b, &mut d);
        }
    }

    let observed = table_probability(a, b, c, d);
    let mut one_tailed = observed;
    for x in 1..=a {
        one_tailed += table_probability(a - x, b + x, c + x, d - x);
    }

    // Tables as unlikely as the observed one count toward the other tail;
    // the tolerance keeps exact mirror images from being lost to rounding.
    let cutoff = observed * (1.0 + 1e-7);
    let mut two_tailed = one_tailed;
    for x in 1..=b.min(c) {
        let p = table_probability(a + x, b - x, c - x, d + x);
        if p <= cutoff {
            two_tailed += p;
        }
    }
    Fisher {
        one_tailed,
        two_tailed: two_tailed.min(1.0),
    }
}
