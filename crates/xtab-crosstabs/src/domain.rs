use std::cmp::Ordering;

use xtab_core::{Value, XtabError, XtabResult};

use crate::accumulator::{compare_layers, FreqEntry};
use crate::request::{VarRange, MAX_RANGE_VALUES};

/// The ordered, duplicate-free values one tabulated variable takes.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    values: Vec<Value>,
    descending: bool,
}

impl Domain {
    /// Every integer in `range`.  Ranges wider than [`MAX_RANGE_VALUES`]
    /// are refused.
    pub fn integer(range: &VarRange, descending: bool) -> XtabResult<Self> {
        let n = range
            .count()
            .filter(|n| *n <= MAX_RANGE_VALUES)
            .ok_or_else(|| {
                XtabError::Internal(format!(
                    "integer range ({}, {}) is empty or too wide",
                    range.min, range.max
                ))
            })?;
        let mut values = Vec::with_capacity(n);
        values.extend((range.min..=range.max).map(|i| Value::Number(i as f64)));
        if descending {
            values.reverse();
        }
        Ok(Self { values, descending })
    }

    /// The distinct values found at `slot` of `entries`.
    pub fn discover(entries: &[FreqEntry], slot: usize, descending: bool) -> Self {
        let mut values: Vec<Value> = entries
            .iter()
            .filter_map(|e| e.values.get(slot).cloned())
            .collect();
        values.sort_by(|a, b| a.compare_3way(b));
        values.dedup();
        if descending {
            values.reverse();
        }
        Self { values, descending }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index_of(&self, value: &Value) -> Option<usize> {
        self.values
            .binary_search_by(|probe| self.order(probe, value))
            .ok()
    }

    /// The values as numeric codes, or `None` if any value is a string.
    pub fn numeric_codes(&self) -> Option<Vec<f64>> {
        self.values.iter().map(Value::as_number).collect()
    }

    fn order(&self, a: &Value, b: &Value) -> Ordering {
        let ord = a.compare_3way(b);
        if self.descending {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// A maximal run of sorted entries sharing their layer values.
#[derive(Debug)]
pub struct Subtable<'a> {
    pub entries: &'a [FreqEntry],
    /// Position of each layer value within its layer's domain.
    pub layer_indexes: Vec<usize>,
}

pub fn subtables<'a>(
    entries: &'a [FreqEntry],
    layer_domains: &[Domain],
) -> XtabResult<Vec<Subtable<'a>>> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < entries.len() {
        let first = &entries[start].values;
        let mut end = start + 1;
        while end < entries.len() && compare_layers(first, &entries[end].values) == Ordering::Equal
        {
            end += 1;
        }
        let layer_indexes = layer_domains
            .iter()
            .enumerate()
            .map(|(i, domain)| {
                first
                    .get(2 + i)
                    .and_then(|v| domain.index_of(v))
                    .ok_or_else(|| {
                        XtabError::Internal(format!("layer value {i} missing from its domain"))
                    })
            })
            .collect::<XtabResult<Vec<_>>>()?;
        out.push(Subtable {
            entries: &entries[start..end],
            layer_indexes,
        });
        start = end;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entries(rows: &[[f64; 3]]) -> Vec<FreqEntry> {
        rows.iter()
            .map(|r| FreqEntry {
                values: r.iter().map(|v| Value::Number(*v)).collect(),
                count: 1.0,
            })
            .collect()
    }

    #[test]
    fn test_integer_domain() {
        let d = Domain::integer(&VarRange { min: 2, max: 4 }, false).unwrap();
        assert_eq!(d.numeric_codes(), Some(vec![2.0, 3.0, 4.0]));
        assert_eq!(d.index_of(&Value::Number(4.0)), Some(2));
        let d = Domain::integer(&VarRange { min: 2, max: 4 }, true).unwrap();
        assert_eq!(d.numeric_codes(), Some(vec![4.0, 3.0, 2.0]));
        assert_eq!(d.index_of(&Value::Number(4.0)), Some(0));
        assert_eq!(d.index_of(&Value::Number(9.0)), None);
    }

    #[test]
    fn test_integer_domain_refuses_unbounded_ranges() {
        let huge = VarRange {
            min: i64::MIN,
            max: i64::MAX,
        };
        assert!(matches!(
            Domain::integer(&huge, false),
            Err(XtabError::Internal(_))
        ));
        let inverted = VarRange { min: 3, max: 1 };
        assert!(Domain::integer(&inverted, false).is_err());
        let widest = VarRange {
            min: 1,
            max: MAX_RANGE_VALUES as i64,
        };
        assert_eq!(Domain::integer(&widest, true).unwrap().len(), MAX_RANGE_VALUES);
    }

    #[test]
    fn test_discover_dedupes_and_sorts() {
        let e = make_entries(&[[3.0, 1.0, 0.0], [1.0, 1.0, 0.0], [3.0, 2.0, 0.0]]);
        let d = Domain::discover(&e, 0, false);
        assert_eq!(d.numeric_codes(), Some(vec![1.0, 3.0]));
        let d = Domain::discover(&e, 1, true);
        assert_eq!(d.numeric_codes(), Some(vec![2.0, 1.0]));
    }

    #[test]
    fn test_string_domain_has_no_codes() {
        let e = vec![FreqEntry {
            values: vec![Value::string("a", 1)],
            count: 1.0,
        }];
        assert_eq!(Domain::discover(&e, 0, false).numeric_codes(), None);
    }

    #[test]
    fn test_subtables_split_on_layers() {
        let e = make_entries(&[
            [1.0, 1.0, 5.0],
            [2.0, 1.0, 5.0],
            [1.0, 2.0, 7.0],
        ]);
        let layers = vec![Domain::discover(&e, 2, false)];
        let subs = subtables(&e, &layers).unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].entries.len(), 2);
        assert_eq!(subs[0].layer_indexes, vec![0]);
        assert_eq!(subs[1].layer_indexes, vec![1]);
    }

    #[test]
    fn test_two_way_is_one_subtable() {
        let e = make_entries(&[[1.0, 1.0, 0.0], [2.0, 2.0, 0.0]]);
        let two_way: Vec<FreqEntry> = e
            .into_iter()
            .map(|mut f| {
                f.values.truncate(2);
                f
            })
            .collect();
        let subs = subtables(&two_way, &[]).unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs[0].layer_indexes.is_empty());
        assert!(subtables(&[], &[]).unwrap().is_empty());
    }
}
