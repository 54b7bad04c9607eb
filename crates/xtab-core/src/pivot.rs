//! In-memory pivot table: labeled dimensions plus a sparse map from leaf
//! index tuples to values.  Rendering is left to whoever consumes the table.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::error::{XtabError, XtabResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Row,
    Column,
    Layer,
}

/// How a number should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultClass {
    Count,
    Percent,
    Residual,
    Significance,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PivotValue {
    Number {
        value: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        rc: Option<ResultClass>,
    },
    Text(String),
}

impl PivotValue {
    pub fn number(value: f64) -> Self {
        Self::Number { value, rc: None }
    }

    pub fn number_rc(value: f64, rc: ResultClass) -> Self {
        Self::Number {
            value,
            rc: Some(rc),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number { value, .. } => Some(*value),
            Self::Text(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Categories & dimensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub label: String,
    /// Leaf index within the dimension; `None` for groups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaf: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rc: Option<ResultClass>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub footnotes: Vec<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Category>,
}

impl Category {
    fn group(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            leaf: None,
            rc: None,
            footnotes: Vec::new(),
            children: Vec::new(),
        }
    }

    fn leaf(label: impl Into<String>, index: usize, rc: Option<ResultClass>) -> Self {
        Self {
            leaf: Some(index),
            rc,
            ..Self::group(label)
        }
    }

    fn find_leaf_mut(&mut self, index: usize) -> Option<&mut Category> {
        if self.leaf == Some(index) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_leaf_mut(index))
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Category>) {
        if self.leaf.is_some() {
            out.push(self);
        }
        for c in &self.children {
            c.collect_leaves(out);
        }
    }
}

/// Path from a dimension's root to a group, as child positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupId(Vec<usize>);

#[derive(Debug, Clone, Serialize)]
pub struct Dimension {
    pub name: String,
    pub axis: Axis,
    pub root: Category,
    n_leaves: usize,
}

impl Dimension {
    fn new(axis: Axis, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            root: Category::group(name.clone()),
            name,
            axis,
            n_leaves: 0,
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.n_leaves
    }

    /// Adds a leaf directly under the root and returns its index.
    pub fn add_leaf(&mut self, label: impl Into<String>) -> usize {
        self.push_leaf(None, label, None)
    }

    pub fn add_leaf_rc(&mut self, label: impl Into<String>, rc: ResultClass) -> usize {
        self.push_leaf(None, label, Some(rc))
    }

    pub fn add_group(&mut self, label: impl Into<String>) -> GroupId {
        self.root.children.push(Category::group(label));
        GroupId(vec![self.root.children.len() - 1])
    }

    /// Adds a group inside `parent`.  An unknown parent puts it at the root.
    pub fn add_subgroup(&mut self, parent: &GroupId, label: impl Into<String>) -> GroupId {
        match self.group_mut(parent) {
            Some(p) => {
                p.children.push(Category::group(label));
                let mut path = parent.0.clone();
                path.push(p.children.len() - 1);
                GroupId(path)
            }
            None => self.add_group(label),
        }
    }

    pub fn add_leaf_to(&mut self, group: &GroupId, label: impl Into<String>) -> usize {
        self.push_leaf(Some(group), label, None)
    }

    /// Adds a group holding `leaves`, returning the leaves' indexes.
    pub fn add_group_of(&mut self, label: impl Into<String>, leaves: &[&str]) -> Vec<usize> {
        let g = self.add_group(label);
        leaves.iter().map(|l| self.add_leaf_to(&g, *l)).collect()
    }

    fn group_mut(&mut self, group: &GroupId) -> Option<&mut Category> {
        let mut cat = &mut self.root;
        for i in &group.0 {
            cat = cat.children.get_mut(*i)?;
        }
        Some(cat)
    }

    fn push_leaf(
        &mut self,
        group: Option<&GroupId>,
        label: impl Into<String>,
        rc: Option<ResultClass>,
    ) -> usize {
        let index = self.n_leaves;
        self.n_leaves += 1;
        let leaf = Category::leaf(label, index, rc);
        match group.and_then(|g| self.group_mut(g)) {
            Some(parent) => parent.children.push(leaf),
            None => self.root.children.push(leaf),
        }
        index
    }

    pub fn attach_footnote(&mut self, leaf: usize, footnote: usize) {
        if let Some(c) = self.root.find_leaf_mut(leaf) {
            c.footnotes.push(footnote);
        }
    }

    /// Leaves in index order.
    pub fn leaves(&self) -> Vec<&Category> {
        let mut out = Vec::with_capacity(self.n_leaves);
        self.root.collect_leaves(&mut out);
        out.sort_by_key(|c| c.leaf);
        out
    }

    pub fn find_leaf(&self, label: &str) -> Option<usize> {
        self.leaves()
            .into_iter()
            .find(|c| c.label == label)
            .and_then(|c| c.leaf)
    }
}

// ---------------------------------------------------------------------------
// PivotTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PivotTable {
    pub title: String,
    pub subtype: String,
    pub dimensions: Vec<Dimension>,
    pub footnotes: Vec<String>,
    #[serde(serialize_with = "serialize_cells")]
    cells: BTreeMap<Vec<usize>, PivotValue>,
}

fn serialize_cells<S: Serializer>(
    cells: &BTreeMap<Vec<usize>, PivotValue>,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_seq(cells.iter())
}

impl PivotTable {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            subtype: title.clone(),
            title,
            dimensions: Vec::new(),
            footnotes: Vec::new(),
            cells: BTreeMap::new(),
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = subtype.into();
        self
    }

    /// Creates a dimension and returns its position in the index tuple.
    pub fn create_dimension(&mut self, axis: Axis, name: impl Into<String>) -> usize {
        self.dimensions.push(Dimension::new(axis, name));
        self.dimensions.len() - 1
    }

    pub fn dimension(&self, idx: usize) -> Option<&Dimension> {
        self.dimensions.get(idx)
    }

    pub fn dimension_mut(&mut self, idx: usize) -> XtabResult<&mut Dimension> {
        self.dimensions
            .get_mut(idx)
            .ok_or_else(|| XtabError::Internal(format!("table has no dimension {idx}")))
    }

    pub fn create_footnote(&mut self, text: impl Into<String>) -> usize {
        self.footnotes.push(text.into());
        self.footnotes.len() - 1
    }

    /// Stores `value` at `indexes`, one leaf index per dimension.
    pub fn put(&mut self, indexes: &[usize], value: PivotValue) -> XtabResult<()> {
        if indexes.len() != self.dimensions.len() {
            return Err(XtabError::Internal(format!(
                "table '{}' has {} dimensions but {} indexes were given",
                self.title,
                self.dimensions.len(),
                indexes.len()
            )));
        }
        for (d, (i, dim)) in indexes.iter().zip(&self.dimensions).enumerate() {
            if *i >= dim.n_leaves() {
                return Err(XtabError::Internal(format!(
                    "index {i} out of range for dimension {d} ('{}')",
                    dim.name
                )));
            }
        }
        self.cells.insert(indexes.to_vec(), value);
        Ok(())
    }

    pub fn put_number(&mut self, indexes: &[usize], value: f64) -> XtabResult<()> {
        self.put(indexes, PivotValue::number(value))
    }

    pub fn get(&self, indexes: &[usize]) -> Option<&PivotValue> {
        self.cells.get(indexes)
    }

    pub fn number(&self, indexes: &[usize]) -> Option<f64> {
        self.get(indexes).and_then(PivotValue::as_number)
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn to_json(&self) -> XtabResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
