use std::cmp::Ordering;
use std::collections::HashMap;

use xtab_core::{Case, Value, XtabError, XtabResult};

use crate::request::Rounding;

/// One observed combination of values and its accumulated weight.
#[derive(Debug, Clone, PartialEq)]
pub struct FreqEntry {
    pub values: Vec<Value>,
    pub count: f64,
}

/// Sparse frequency table keyed by the full tuple of tabulated values.
///
/// Keys merge only on tuple equality (`Value`'s width-aware `Eq`); a hash
/// collision between different tuples never merges their counts.
#[derive(Debug, Clone)]
pub struct FreqTable {
    case_indexes: Vec<usize>,
    integer: bool,
    data: HashMap<Vec<Value>, f64>,
    scratch: Vec<Value>,
}

impl FreqTable {
    /// A table over the given case slots.  In integer mode numeric values are
    /// truncated toward zero before they are compared or stored.
    pub fn new(case_indexes: Vec<usize>, integer: bool) -> Self {
        Self {
            scratch: Vec::with_capacity(case_indexes.len()),
            case_indexes,
            integer,
            data: HashMap::new(),
        }
    }

    pub fn accumulate(&mut self, case: &Case, weight: f64) -> XtabResult<()> {
        self.scratch.clear();
        for idx in &self.case_indexes {
            let value = case.get(*idx).ok_or_else(|| {
                XtabError::Internal(format!(
                    "case has {} values, tabulating slot {idx}",
                    case.len()
                ))
            })?;
            self.scratch.push(match value {
                Value::Number(f) if self.integer => Value::Number(f.trunc()),
                other => other.clone(),
            });
        }
        match self.data.get_mut(self.scratch.as_slice()) {
            Some(count) => *count += weight,
            None => {
                self.data.insert(self.scratch.clone(), weight);
            }
        }
        Ok(())
    }

    /// Rounds every accumulated count and deletes entries that become 0.
    pub fn round_cells(&mut self, rounding: Rounding) {
        self.data.retain(|_, count| {
            *count = rounding.apply(*count);
            *count != 0.0
        });
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, values: &[Value]) -> Option<f64> {
        self.data.get(values).copied()
    }

    /// Sum of all accumulated weights.
    pub fn total(&self) -> f64 {
        self.data.values().sum()
    }

    /// Extracts the entries ordered by layer values (last layer first), then
    /// row, then column.  `descending` reverses the whole order.
    pub fn into_sorted_entries(self, descending: bool) -> Vec<FreqEntry> {
        let mut entries: Vec<FreqEntry> = self
            .data
            .into_iter()
            .map(|(values, count)| FreqEntry { values, count })
            .collect();
        entries.sort_by(|a, b| {
            let ord = compare_entries(&a.values, &b.values);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
        entries
    }
}

/// Orders tuples laid out as `[row, col, layer...]`.
pub fn compare_entries(a: &[Value], b: &[Value]) -> Ordering {
    compare_layers(a, b)
        .then_with(|| compare_slot(a, b, 0))
        .then_with(|| compare_slot(a, b, 1))
}

/// Compares only the layer slots, highest index first.
pub fn compare_layers(a: &[Value], b: &[Value]) -> Ordering {
    let n = a.len().max(b.len());
    for i in (2..n).rev() {
        let ord = compare_slot(a, b, i);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_slot(a: &[Value], b: &[Value], i: usize) -> Ordering {
    match (a.get(i), b.get(i)) {
        (Some(x), Some(y)) => x.compare_3way(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
