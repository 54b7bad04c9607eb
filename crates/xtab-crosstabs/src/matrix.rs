//! Dense row-major contingency matrix built from one subtable's sorted
//! entries.

use xtab_core::{MvClass, Variable, XtabError, XtabResult};

use crate::accumulator::FreqEntry;
use crate::domain::Domain;

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub n_rows: usize,
    pub n_cols: usize,
    pub cells: Vec<f64>,
    pub row_tot: Vec<f64>,
    pub col_tot: Vec<f64>,
    pub total: f64,
    /// Rows with at least one nonzero cell.
    pub ns_rows: usize,
    /// Columns with at least one nonzero cell.
    pub ns_cols: usize,
}

impl Matrix {
    /// Walks `entries` and both domains in lockstep, zero-filling every
    /// domain cell without an entry.  The entries must be sorted in the same
    /// direction as the domains and lie inside them.
    pub fn build(entries: &[FreqEntry], rows: &Domain, cols: &Domain) -> XtabResult<Self> {
        let (n_rows, n_cols) = (rows.len(), cols.len());
        let mut cells = vec![0.0; n_rows * n_cols];
        let (mut row, mut col) = (0, 0);
        for e in entries {
            let (Some(rv), Some(cv)) = (e.values.first(), e.values.get(1)) else {
                return Err(XtabError::Internal("entry has fewer than 2 values".into()));
            };
            while row < n_rows && rows.values()[row] != *rv {
                row += 1;
                col = 0;
            }
            while col < n_cols && cols.values()[col] != *cv {
                col += 1;
            }
            if row >= n_rows || col >= n_cols {
                return Err(XtabError::Internal(format!(
                    "entry ({rv}, {cv}) is outside its domain or out of order"
                )));
            }
            cells[row * n_cols + col] = e.count;
            col += 1;
        }
        Self::from_dense(n_rows, n_cols, cells)
    }

    pub fn from_dense(n_rows: usize, n_cols: usize, cells: Vec<f64>) -> XtabResult<Self> {
        if cells.len() != n_rows * n_cols {
            return Err(XtabError::Internal(format!(
                "{} cells for a {n_rows}×{n_cols} matrix",
                cells.len()
            )));
        }
        let mut m = Self {
            n_rows,
            n_cols,
            cells,
            row_tot: vec![0.0; n_rows],
            col_tot: vec![0.0; n_cols],
            total: 0.0,
            ns_rows: 0,
            ns_cols: 0,
        };
        m.compute_marginals();
        Ok(m)
    }

    /// Recomputes totals and populated counts in row-major order.
    fn compute_marginals(&mut self) {
        self.row_tot.iter_mut().for_each(|t| *t = 0.0);
        self.col_tot.iter_mut().for_each(|t| *t = 0.0);
        self.ns_rows = 0;
        for r in 0..self.n_rows {
            let mut empty = true;
            for c in 0..self.n_cols {
                let f = self.cells[r * self.n_cols + c];
                if f != 0.0 {
                    empty = false;
                    self.col_tot[c] += f;
                    self.row_tot[r] += f;
                }
            }
            if !empty {
                self.ns_rows += 1;
            }
        }
        self.ns_cols = (0..self.n_cols)
            .filter(|c| (0..self.n_rows).any(|r| self.get(r, *c) != 0.0))
            .count();
        self.total = self.col_tot.iter().sum();
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.cells[row * self.n_cols + col]
    }

    pub fn populated_rows(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_rows).filter(move |r| self.row_tot[*r] != 0.0)
    }

    pub fn populated_cols(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_cols).filter(move |c| self.col_tot[*c] != 0.0)
    }

    /// Zeroes every row and column whose domain value is user-missing, then
    /// recomputes the marginals.  The zeroed slots stay in the matrix.
    pub fn delete_missing(
        &mut self,
        row_var: &Variable,
        rows: &Domain,
        col_var: &Variable,
        cols: &Domain,
    ) {
        let n_cols = self.n_cols;
        for (r, value) in rows.values().iter().enumerate() {
            if row_var.is_value_missing(value, MvClass::User) {
                self.cells[r * n_cols..(r + 1) * n_cols].fill(0.0);
            }
        }
        for (c, value) in cols.values().iter().enumerate() {
            if col_var.is_value_missing(value, MvClass::User) {
                for r in 0..self.n_rows {
                    self.cells[r * n_cols + c] = 0.0;
                }
            }
        }
        self.compute_marginals();
    }
}
