use std::cmp::Ordering;

use tracing::debug;
use xtab_core::{Case, Variable};

use crate::reader::CaseReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortField {
    pub case_index: usize,
    pub direction: Direction,
}

/// A composite sort key: fields compared in order, each with its own
/// direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortKey {
    fields: Vec<SortField>,
}

impl SortKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_vars(vars: &[&Variable]) -> Self {
        vars.iter()
            .fold(Self::new(), |key, v| key.then(v.case_index(), Direction::Ascending))
    }

    pub fn then(mut self, case_index: usize, direction: Direction) -> Self {
        self.fields.push(SortField {
            case_index,
            direction,
        });
        self
    }

    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    pub fn compare(&self, a: &Case, b: &Case) -> Ordering {
        for f in &self.fields {
            let ord = match (a.get(f.case_index), b.get(f.case_index)) {
                (Some(x), Some(y)) => x.compare_3way(y),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            let ord = match f.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl CaseReader {
    /// Reads the whole stream and returns it ordered by `key`.  Cases that
    /// compare equal keep their input order.
    pub fn sort(self, key: &SortKey) -> CaseReader {
        let proto = self.proto().clone();
        let taint = self.taint();
        let mut cases = self.into_cases();
        cases.sort_by(|a, b| key.compare(a, b));
        debug!(n_cases = cases.len(), n_fields = key.fields().len(), "sorted stream");
        CaseReader::from_cases_tainted(proto, cases, taint)
    }
}
