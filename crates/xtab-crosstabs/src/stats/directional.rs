use super::symmetric::somers_d;
use super::{normal_sig, pow2, Measure};
use crate::cells::{Statistic, StatisticSet};
use crate::domain::Domain;
use crate::matrix::Matrix;

/// Directional measures.  Three-element arrays are ordered symmetric, row
/// variable dependent, column variable dependent; two-element arrays drop
/// the symmetric entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectionalMeasures {
    pub lambda: [Measure; 3],
    pub gk_tau: [Measure; 2],
    pub uncertainty: [Measure; 3],
    pub somers_d: [Measure; 3],
    pub eta: [Measure; 2],
}

impl DirectionalMeasures {
    /// All thirteen entries in report order.
    pub fn in_order(&self) -> Vec<Measure> {
        self.lambda
            .iter()
            .chain(&self.gk_tau)
            .chain(&self.uncertainty)
            .chain(&self.somers_d)
            .chain(&self.eta)
            .copied()
            .collect()
    }
}

pub fn directional(
    m: &Matrix,
    rows: &Domain,
    cols: &Domain,
    stats: StatisticSet,
) -> DirectionalMeasures {
    let mut out = DirectionalMeasures::default();
    if stats.contains(Statistic::Lambda) {
        out.lambda = lambda(m);
        out.gk_tau = goodman_kruskal_tau(m);
    }
    if stats.contains(Statistic::Uc) {
        out.uncertainty = uncertainty(m);
    }
    if stats.contains(Statistic::D) {
        if let Some(d) = somers_d(m) {
            out.somers_d = d;
        }
    }
    if stats.contains(Statistic::Eta) {
        if let Some(x) = rows.numeric_codes() {
            out.eta[0] = Measure::value_only(eta(m, &x, Axis::Row));
        }
        if let Some(y) = cols.numeric_codes() {
            out.eta[1] = Measure::value_only(eta(m, &y, Axis::Col));
        }
    }
    out
}

/// Index and value of the first maximum.
fn arg_max(values: impl Iterator<Item = f64>) -> (usize, f64) {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, v) in values.enumerate() {
        if i == 0 || v > best.1 {
            best = (i, v);
        }
    }
    best
}

fn lambda(m: &Matrix) -> [Measure; 3] {
    let (n_rows, n_cols, total) = (m.n_rows, m.n_cols, m.total);

    // Maximum cell in each row and in each column.
    let row_max: Vec<(usize, f64)> = (0..n_rows)
        .map(|i| arg_max((0..n_cols).map(|j| m.get(i, j))))
        .collect();
    let col_max: Vec<(usize, f64)> = (0..n_cols)
        .map(|j| arg_max((0..n_rows).map(|i| m.get(i, j))))
        .collect();
    let sum_fim: f64 = row_max.iter().map(|(_, v)| v).sum();
    let sum_fmj: f64 = col_max.iter().map(|(_, v)| v).sum();

    let (rm_index, rm) = arg_max(m.row_tot.iter().copied());
    let (cm_index, cm) = arg_max(m.col_tot.iter().copied());

    let v_sym = (sum_fim + sum_fmj - cm - rm) / (2.0 * total - rm - cm);
    let v_row = (sum_fmj - rm) / (total - rm);
    let v_col = (sum_fim - cm) / (total - cm);

    let accum: f64 = row_max
        .iter()
        .filter(|(j, _)| *j == cm_index)
        .map(|(_, v)| v)
        .sum();
    let ase_col =
        ((total - sum_fim) * (sum_fim + cm - 2.0 * accum) / (total - cm).powi(3)).sqrt();
    let accum: f64 = row_max
        .iter()
        .enumerate()
        .filter(|(_, (j, _))| *j != cm_index)
        .map(|(i, (j, _))| m.get(i, *j) + m.get(i, cm_index))
        .sum();
    let t_col = v_col / ((accum - pow2(sum_fim - cm) / total).sqrt() / (total - cm));

    let accum: f64 = col_max
        .iter()
        .filter(|(i, _)| *i == rm_index)
        .map(|(_, v)| v)
        .sum();
    let ase_row =
        ((total - sum_fmj) * (sum_fmj + rm - 2.0 * accum) / (total - rm).powi(3)).sqrt();
    let accum: f64 = col_max
        .iter()
        .enumerate()
        .filter(|(_, (i, _))| *i != rm_index)
        .map(|(j, (i, _))| m.get(*i, j) + m.get(rm_index, j))
        .sum();
    let t_row = v_row / ((accum - pow2(sum_fmj - rm) / total).sqrt() / (total - rm));

    let (mut accum0, mut accum1) = (0.0, 0.0);
    for i in 0..n_rows {
        for j in 0..n_cols {
            let hits = f64::from(u8::from(col_max[j].0 == i) + u8::from(row_max[i].0 == j));
            let modal = f64::from(u8::from(i == rm_index) + u8::from(j == cm_index));
            let f = m.get(i, j);
            accum0 += f * pow2(hits - modal);
            accum1 += f * pow2(hits + (v_sym - 1.0) * modal);
        }
    }
    let denom = 2.0 * total - rm - cm;
    let ase_sym = (accum1 - 4.0 * total * v_sym * v_sym).sqrt() / denom;
    let t_sym = v_sym / ((accum0 - pow2(sum_fim + sum_fmj - cm - rm) / total).sqrt() / denom);

    [
        Measure::new(v_sym, Some(ase_sym), Some(t_sym), normal_sig(t_sym)),
        Measure::new(v_row, Some(ase_row), Some(t_row), normal_sig(t_row)),
        Measure::new(v_col, Some(ase_col), Some(t_col), normal_sig(t_col)),
    ]
}

fn goodman_kruskal_tau(m: &Matrix) -> [Measure; 2] {
    let total = m.total;
    let (mut sum_fij2_ri, mut sum_fij2_ci) = (0.0, 0.0);
    for i in m.populated_rows() {
        for j in m.populated_cols() {
            let f2 = pow2(m.get(i, j));
            sum_fij2_ri += f2 / m.row_tot[i];
            sum_fij2_ci += f2 / m.col_tot[j];
        }
    }
    let sum_ri2: f64 = m.row_tot.iter().map(|r| pow2(*r)).sum();
    let sum_cj2: f64 = m.col_tot.iter().map(|c| pow2(*c)).sum();
    [
        Measure::value_only((total * sum_fij2_ci - sum_ri2) / (pow2(total) - sum_ri2)),
        Measure::value_only((total * sum_fij2_ri - sum_cj2) / (pow2(total) - sum_cj2)),
    ]
}

fn uncertainty(m: &Matrix) -> [Measure; 3] {
    let total = m.total;
    let ux: f64 = m
        .populated_rows()
        .map(|i| {
            let p = m.row_tot[i] / total;
            -p * p.ln()
        })
        .sum();
    let uy: f64 = m
        .populated_cols()
        .map(|j| {
            let p = m.col_tot[j] / total;
            -p * p.ln()
        })
        .sum();

    let (mut uxy, mut p) = (0.0, 0.0);
    for i in 0..m.n_rows {
        for j in 0..m.n_cols {
            let f = m.get(i, j);
            if f <= 0.0 {
                continue;
            }
            p += f * pow2((m.col_tot[j] * m.row_tot[i] / (total * f)).ln());
            uxy -= f / total * (f / total).ln();
        }
    }

    let (mut ase1_yx, mut ase1_xy, mut ase1_sym) = (0.0, 0.0, 0.0);
    for i in 0..m.n_rows {
        for j in 0..m.n_cols {
            let f = m.get(i, j);
            if f <= 0.0 {
                continue;
            }
            let (ri, cj) = (m.row_tot[i], m.col_tot[j]);
            ase1_yx += f * pow2(uy * (f / ri).ln() + (ux - uxy) * (cj / total).ln());
            ase1_xy += f * pow2(ux * (f / cj).ln() + (uy - uxy) * (ri / total).ln());
            ase1_sym += f
                * pow2(uxy * (ri * cj / pow2(total)).ln() - (ux + uy) * (f / total).ln());
        }
    }

    let shared = ux + uy - uxy;
    let spread = (p - total * pow2(shared)).sqrt();
    let v_sym = 2.0 * (shared / (ux + uy));
    let ase_sym = 2.0 / (total * pow2(ux + uy)) * ase1_sym.sqrt();
    let v_row = shared / ux;
    let ase_row = ase1_xy.sqrt() / (total * ux * ux);
    let t_row = v_row / (spread / (total * ux));
    let v_col = shared / uy;
    let ase_col = ase1_yx.sqrt() / (total * uy * uy);
    let t_col = v_col / (spread / (total * uy));

    [
        Measure::new(v_sym, Some(ase_sym), None, None),
        Measure::new(v_row, Some(ase_row), Some(t_row), None),
        Measure::new(v_col, Some(ase_col), Some(t_col), None),
    ]
}

#[derive(Clone, Copy)]
enum Axis {
    Row,
    Col,
}

/// Eta with the variable on `dependent` as the interval-scaled outcome.
fn eta(m: &Matrix, codes: &[f64], dependent: Axis) -> f64 {
    let total = m.total;
    let (n_dep, n_other) = match dependent {
        Axis::Row => (m.n_rows, m.n_cols),
        Axis::Col => (m.n_cols, m.n_rows),
    };
    let cell = |dep: usize, other: usize| match dependent {
        Axis::Row => m.get(dep, other),
        Axis::Col => m.get(other, dep),
    };
    let (dep_tot, other_tot) = match dependent {
        Axis::Row => (&m.row_tot, &m.col_tot),
        Axis::Col => (&m.col_tot, &m.row_tot),
    };
    if codes.len() != n_dep {
        return f64::NAN;
    }

    let (mut sum, mut sum2) = (0.0, 0.0);
    for (x, t) in codes.iter().zip(dep_tot) {
        sum += x * t;
        sum2 += pow2(*x) * t;
    }
    let ss_total = sum2 - pow2(sum) / total;

    let mut ss_within = 0.0;
    for other in (0..n_other).filter(|o| other_tot[*o] != 0.0) {
        let mut cum = 0.0;
        for (dep, x) in codes.iter().enumerate() {
            let f = cell(dep, other);
            ss_within += pow2(*x) * f;
            cum += x * f;
        }
        ss_within -= cum * cum / other_tot[other];
    }
    (1.0 - ss_within / ss_total).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::testutil::{assert_close, codes, labels, make_matrix};

    fn all(m: &Matrix) -> DirectionalMeasures {
        directional(m, &codes(m.n_rows), &codes(m.n_cols), StatisticSet::all())
    }

    #[test]
    fn test_lambda_known_values() {
        // Row maxima 10, 12; column maxima 10, 12; rm = 15, cm = 17.
        let m = make_matrix(2, 2, &[10.0, 5.0, 3.0, 12.0]);
        let d = all(&m);
        assert_close(d.lambda[0].value, (22.0 + 22.0 - 17.0 - 15.0) / (60.0 - 15.0 - 17.0), 1e-12);
        assert_close(d.lambda[1].value, (22.0 - 15.0) / (30.0 - 15.0), 1e-12);
        assert_close(d.lambda[2].value, (22.0 - 17.0) / (30.0 - 17.0), 1e-12);
        assert!(d.lambda[1].sig.is_some());
    }

    #[test]
    fn test_standard_errors_two_by_two() {
        let m = make_matrix(2, 2, &[10.0, 5.0, 3.0, 12.0]);
        let d = all(&m);
        assert_close(d.lambda[0].ase, 0.19360883633683956, 1e-12);
        assert_close(d.lambda[1].ase, 0.2007393740557549, 1e-12);
        assert_close(d.lambda[2].ase, 0.2337090847116154, 1e-12);
        assert_close(d.uncertainty[0].ase, 0.11918734938835715, 1e-10);
        assert_close(d.uncertainty[1].ase, 0.11859691690947127, 1e-10);
        assert_close(d.uncertainty[2].ase, 0.119858523128786, 1e-10);
        assert_close(d.somers_d[1].ase, 0.16083370767632932, 1e-12);
        assert_close(d.somers_d[2].ase, 0.15962919996504862, 1e-12);
    }

    #[test]
    fn test_standard_errors_three_by_three() {
        let m = make_matrix(3, 3, &[8.0, 3.0, 1.0, 2.0, 7.0, 4.0, 1.0, 2.0, 9.0]);
        let d = all(&m);
        assert_close(d.lambda[0].value, 0.44680851063829785, 1e-12);
        assert_close(d.lambda[0].ase, 0.13749368878221577, 1e-12);
        assert_close(d.lambda[1].value, 0.4583333333333333, 1e-12);
        assert_close(d.lambda[1].ase, 0.14706818461491228, 1e-12);
        assert_close(d.lambda[2].value, 0.43478260869565216, 1e-12);
        assert_close(d.lambda[2].ase, 0.14618234350987677, 1e-12);
        assert_close(d.uncertainty[0].ase, 0.09545966877034283, 1e-10);
        assert_close(d.uncertainty[1].ase, 0.09519136490260206, 1e-10);
        assert_close(d.uncertainty[2].ase, 0.09576401464893612, 1e-10);
    }

    #[test]
    fn test_perfect_prediction() {
        let m = make_matrix(3, 3, &[4.0, 0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 6.0]);
        let d = all(&m);
        for l in &d.lambda {
            assert_close(l.value, 1.0, 1e-12);
        }
        for t in &d.gk_tau {
            assert_close(t.value, 1.0, 1e-12);
        }
        for u in &d.uncertainty {
            assert_close(u.value, 1.0, 1e-12);
        }
        assert_close(d.eta[0].value, 1.0, 1e-12);
        assert_close(d.eta[1].value, 1.0, 1e-12);
        assert!(d.uncertainty[0].t.is_none());
    }

    #[test]
    fn test_independence_gives_zero() {
        let m = make_matrix(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        let d = all(&m);
        assert_close(d.gk_tau[0].value, 0.0, 1e-12);
        assert_close(d.uncertainty[1].value, 0.0, 1e-12);
        assert_close(d.eta[0].value, 0.0, 1e-6);
    }

    #[test]
    fn test_eta_needs_numeric_codes() {
        let m = make_matrix(2, 2, &[10.0, 5.0, 3.0, 12.0]);
        let d = directional(&m, &labels(&["a", "b"]), &codes(2), StatisticSet::all());
        assert!(!d.eta[0].is_defined());
        assert!(d.eta[1].is_defined());
    }

    #[test]
    fn test_only_requested_and_order() {
        let m = make_matrix(2, 2, &[10.0, 5.0, 3.0, 12.0]);
        let d = directional(&m, &codes(2), &codes(2), StatisticSet::of(&[Statistic::D]));
        let all = d.in_order();
        assert_eq!(all.len(), 13);
        assert!(all[..8].iter().all(|m| !m.is_defined()));
        assert!(all[8..11].iter().all(Measure::is_defined));
    }

    #[test]
    fn test_single_row_somers_undefined() {
        let m = make_matrix(1, 2, &[1.0, 2.0]);
        let d = all(&m);
        assert!(!d.somers_d[0].is_defined());
        assert!(!d.lambda[1].is_defined());
    }
}
