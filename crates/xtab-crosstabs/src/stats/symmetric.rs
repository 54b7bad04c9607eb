use super::{correlation_sig, normal_sig, pow2, KahanSum, Measure};
use crate::cells::{Statistic, StatisticSet};
use crate::domain::Domain;
use crate::matrix::Matrix;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymmetricMeasures {
    pub phi: Measure,
    pub cramers_v: Measure,
    pub contingency: Measure,
    pub tau_b: Measure,
    pub tau_c: Measure,
    pub gamma: Measure,
    pub spearman: Measure,
    pub pearson: Measure,
    pub kappa: Measure,
    pub n_valid: f64,
    /// Kappa pairs the k-th populated row with the k-th populated column;
    /// set when those pairs carry different values.
    pub kappa_mismatch: bool,
}

impl SymmetricMeasures {
    /// In report order: phi, V, CC, tau-b, tau-c, gamma, Spearman, r, kappa.
    pub fn in_order(&self) -> [Measure; 9] {
        [
            self.phi,
            self.cramers_v,
            self.contingency,
            self.tau_b,
            self.tau_c,
            self.gamma,
            self.spearman,
            self.pearson,
            self.kappa,
        ]
    }
}

/// Computes the requested symmetric measures.  `None` when fewer than two
/// rows or columns are populated.
pub fn symmetric(
    m: &Matrix,
    rows: &Domain,
    cols: &Domain,
    stats: StatisticSet,
) -> Option<SymmetricMeasures> {
    let q = m.ns_rows.min(m.ns_cols) as f64;
    if q <= 1.0 {
        return None;
    }
    let total = m.total;
    let mut out = SymmetricMeasures {
        n_valid: total,
        ..Default::default()
    };

    if stats.contains_any(&[Statistic::Phi, Statistic::Cc]) {
        let mut xp = 0.0;
        for r in m.populated_rows() {
            for c in m.populated_cols() {
                let expected = m.row_tot[r] * m.col_tot[c] / total;
                xp += pow2(m.get(r, c) - expected) / expected;
            }
        }
        if stats.contains(Statistic::Phi) {
            out.phi = Measure::value_only((xp / total).sqrt());
            out.cramers_v = Measure::value_only((xp / (total * (q - 1.0))).sqrt());
        }
        if stats.contains(Statistic::Cc) {
            out.contingency = Measure::value_only((xp / (xp + total)).sqrt());
        }
    }

    if stats.contains_any(&[Statistic::BTau, Statistic::CTau, Statistic::Gamma]) {
        let k = concordance(m);
        let pq = k.p - k.q;
        let spread = k.ctau_cum - pow2(pq) / total;
        if stats.contains(Statistic::BTau) {
            let v = pq / (k.dr * k.dc).sqrt();
            let var = (k.btau_cum - total * pow2(total * pq / (k.dr * k.dc).sqrt() * (k.dr + k.dc)))
                / pow2(k.dr * k.dc);
            let t = v / (2.0 * (spread / (k.dr * k.dc)).sqrt());
            out.tau_b = Measure::new(v, Some(var.sqrt()), Some(t), None);
        }
        if stats.contains(Statistic::CTau) {
            let v = q * pq / (pow2(total) * (q - 1.0));
            let ase = 2.0 * q / ((q - 1.0) * pow2(total)) * spread.sqrt();
            out.tau_c = Measure::new(v, Some(ase), Some(v / ase), None);
        }
        if stats.contains(Statistic::Gamma) {
            let pq_sum = k.p + k.q;
            let v = pq / pq_sum;
            let ase = 4.0 / pow2(pq_sum) * k.gamma_cum.sqrt();
            let t = v / (2.0 / pq_sum * spread.sqrt());
            out.gamma = Measure::new(v, Some(ase), Some(t), None);
        }
    }

    if stats.contains(Statistic::Corr) {
        out.spearman = pearson_r(m, &ranks(&m.row_tot), &ranks(&m.col_tot));
        if let (Some(x), Some(y)) = (rows.numeric_codes(), cols.numeric_codes()) {
            out.pearson = pearson_r(m, &x, &y);
        }
    }

    if stats.contains(Statistic::Kappa) && m.ns_rows == m.ns_cols {
        let (kappa, mismatch) = kappa(m, rows, cols);
        out.kappa = kappa;
        out.kappa_mismatch = mismatch;
    }

    Some(out)
}

/// Midranks of the categories given their marginal counts.
fn ranks(totals: &[f64]) -> Vec<f64> {
    let mut sum = KahanSum::default();
    totals
        .iter()
        .map(|t| {
            let rank = sum.value() + (t + 1.0) / 2.0;
            sum.add(*t);
            rank
        })
        .collect()
}

/// Pearson's r between row scores `x` and column scores `y`.
pub(crate) fn pearson_r(m: &Matrix, x: &[f64], y: &[f64]) -> Measure {
    if x.len() != m.n_rows || y.len() != m.n_cols {
        return Measure::default();
    }
    let total = m.total;

    let mut sum_xyf = 0.0;
    for (i, xi) in x.iter().enumerate() {
        for (j, yj) in y.iter().enumerate() {
            sum_xyf += m.get(i, j) * (xi * yj);
        }
    }

    let (mut sum_xr, mut sum_x2r) = (0.0, 0.0);
    for (xi, rt) in x.iter().zip(&m.row_tot) {
        sum_xr += xi * rt;
        sum_x2r += pow2(*xi) * rt;
    }
    let x_bar = sum_xr / total;

    let (mut sum_yc, mut sum_y2c) = (0.0, 0.0);
    for (yj, ct) in y.iter().zip(&m.col_tot) {
        sum_yc += yj * ct;
        sum_y2c += yj * yj * ct;
    }
    let y_bar = sum_yc / total;

    let s = sum_xyf - sum_xr * sum_yc / total;
    let sx = sum_x2r - pow2(sum_xr) / total;
    let sy = sum_y2c - pow2(sum_yc) / total;
    let t_xy = (sx * sy).sqrt();
    let r = s / t_xy;
    let t = r / (1.0 - pow2(r)).sqrt() * (total - 2.0).sqrt();

    let mut acc = KahanSum::default();
    for (i, xi) in x.iter().enumerate() {
        for (j, yj) in y.iter().enumerate() {
            let xr = xi - x_bar;
            let yr = yj - y_bar;
            let term = t_xy * xr * yr - (s / (2.0 * t_xy)) * (xr * xr * sy + yr * yr * sx);
            acc.add(m.get(i, j) * term * term);
        }
    }
    let ase = acc.value().sqrt() / (t_xy * t_xy);
    Measure::new(r, Some(ase), Some(t), correlation_sig(r, total))
}

/// Concordant and discordant pair sums plus the variance accumulators that
/// depend on them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Concordance {
    pub p: f64,
    pub q: f64,
    pub dr: f64,
    pub dc: f64,
    pub ctau_cum: f64,
    pub btau_cum: f64,
    pub gamma_cum: f64,
    pub d_yx_cum: f64,
    pub d_xy_cum: f64,
}

pub(crate) fn concordance(m: &Matrix) -> Concordance {
    let total = m.total;
    let dr = pow2(total) - m.row_tot.iter().map(|t| pow2(*t)).sum::<f64>();
    let dc = pow2(total) - m.col_tot.iter().map(|t| pow2(*t)).sum::<f64>();

    // Running column sums down the rows.
    let n = m.n_cols;
    let mut cum = vec![0.0; m.n_rows * n];
    for c in 0..n {
        let mut ct = 0.0;
        for r in 0..m.n_rows {
            ct += m.get(r, c);
            cum[r * n + c] = ct;
        }
    }

    let (mut p, mut q) = (0.0, 0.0);
    for_each_cell_pairs(m, &cum, |_, _, f, c, d| {
        p += f * c;
        q += f * d;
    });

    let tau_b = (p - q) / (dr * dc).sqrt();
    let mut k = Concordance {
        p,
        q,
        dr,
        dc,
        ctau_cum: 0.0,
        btau_cum: 0.0,
        gamma_cum: 0.0,
        d_yx_cum: 0.0,
        d_xy_cum: 0.0,
    };
    let (mut d_yx, mut d_xy) = (KahanSum::default(), KahanSum::default());
    for_each_cell_pairs(m, &cum, |i, j, f, c, d| {
        k.btau_cum += f * pow2(
            2.0 * (dr * dc).sqrt() * (c - d) + tau_b * (m.row_tot[i] * dc + m.col_tot[j] * dr),
        );
        k.ctau_cum += f * pow2(c - d);
        k.gamma_cum += f * pow2(q * c - p * d);
        d_yx.add(f * pow2(dr * (c - d) - (p - q) * (total - m.row_tot[i])));
        d_xy.add(f * pow2(dc * (d - c) - (q - p) * (total - m.col_tot[j])));
    });
    k.d_yx_cum = d_yx.value();
    k.d_xy_cum = d_xy.value();
    k
}

/// Visits every cell with the count of pairs concordant (`c`) and discordant
/// (`d`) with it, updating both incrementally along each row.
fn for_each_cell_pairs(
    m: &Matrix,
    cum: &[f64],
    mut visit: impl FnMut(usize, usize, f64, f64, f64),
) {
    let n = m.n_cols;
    let cum_at = |r: usize, c: usize| cum[r * n + c];
    for i in 0..m.n_rows {
        let mut c: f64 = (1..n).map(|j| m.col_tot[j] - cum_at(i, j)).sum();
        let mut d: f64 = if i > 0 {
            (1..n).map(|j| cum_at(i - 1, j)).sum()
        } else {
            0.0
        };
        let mut j = 0;
        loop {
            visit(i, j, m.get(i, j), c, d);
            j += 1;
            if j >= n {
                break;
            }
            c -= m.col_tot[j] - cum_at(i, j);
            d += m.col_tot[j - 1] - cum_at(i, j - 1);
            if i > 0 {
                c += cum_at(i - 1, j - 1);
                d -= cum_at(i - 1, j);
            }
        }
    }
}

/// Somers' d: symmetric, then with the row and column variable dependent.
pub(crate) fn somers_d(m: &Matrix) -> Option<[Measure; 3]> {
    if m.ns_rows.min(m.ns_cols) <= 1 {
        return None;
    }
    let k = concordance(m);
    let pq = k.p - k.q;
    let spread = (k.ctau_cum - pow2(pq) / m.total).sqrt();

    let sym_v = pq / (0.5 * (k.dc + k.dr));
    let sym_t = sym_v / (4.0 / (k.dc + k.dr) * spread);

    let row_v = pq / k.dc;
    let row_ase = 2.0 / pow2(k.dc) * k.d_xy_cum.sqrt();
    let row_t = row_v / (2.0 / k.dc * spread);

    let col_v = pq / k.dr;
    let col_ase = 2.0 / pow2(k.dr) * k.d_yx_cum.sqrt();
    let col_t = col_v / (2.0 / k.dr * spread);

    Some([
        Measure::new(sym_v, None, Some(sym_t), normal_sig(sym_t)),
        Measure::new(row_v, Some(row_ase), Some(row_t), normal_sig(row_t)),
        Measure::new(col_v, Some(col_ase), Some(col_t), normal_sig(col_t)),
    ])
}

/// Cohen's kappa, pairing populated rows and columns by position.
fn kappa(m: &Matrix, rows: &Domain, cols: &Domain) -> (Measure, bool) {
    let total = m.total;
    let pop_rows: Vec<usize> = m.populated_rows().collect();
    let pop_cols: Vec<usize> = m.populated_cols().collect();

    let mismatch = pop_rows
        .iter()
        .zip(&pop_cols)
        .any(|(r, c)| rows.values().get(*r) != cols.values().get(*c));

    let (mut sum_fii, mut sum_rici, mut sum_fiiri_ci, mut sum_riciri_ci) = (0.0, 0.0, 0.0, 0.0);
    for (&i, &j) in pop_rows.iter().zip(&pop_cols) {
        let prod = m.row_tot[i] * m.col_tot[j];
        let sum = m.row_tot[i] + m.col_tot[j];
        let fii = m.get(i, j);
        sum_fii += fii;
        sum_rici += prod;
        sum_fiiri_ci += fii * sum;
        sum_riciri_ci += prod * sum;
    }

    // Cell (a, b) of the paired square is weighted by column total a plus
    // row total b.
    let mut sum_fij_cirj2 = 0.0;
    for (a, &i) in pop_rows.iter().enumerate() {
        for (b, &j) in pop_cols.iter().enumerate() {
            let weight = m.col_tot[pop_cols[a]] + m.row_tot[pop_rows[b]];
            sum_fij_cirj2 += m.get(i, j) * pow2(weight);
        }
    }

    let t2 = pow2(total);
    let denom = t2 - sum_rici;
    let v = (total * sum_fii - sum_rici) / denom;
    let ase_h0 = ((t2 * sum_rici + sum_rici * sum_rici - total * sum_riciri_ci)
        / (total * denom * denom))
        .sqrt();
    let ase = (total
        * ((sum_fii * (total - sum_fii)) / pow2(denom)
            + (2.0 * (total - sum_fii) * (2.0 * sum_fii * sum_rici - total * sum_fiiri_ci))
                / denom.powi(3)
            + pow2(total - sum_fii) * (total * sum_fij_cirj2 - 4.0 * sum_rici * sum_rici)
                / denom.powi(4)))
    .sqrt();
    let t = v / ase_h0;
    (Measure::new(v, Some(ase), Some(t), None), mismatch)
}
