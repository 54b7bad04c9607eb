use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{XtabError, XtabResult};
use crate::value::Value;

// ---------------------------------------------------------------------------
// Missing-value classes
// ---------------------------------------------------------------------------

/// Why a value is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MissingKind {
    User,
    System,
}

/// A set of missing-value kinds to test for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MvClass {
    /// Nothing counts as missing.
    Never,
    /// Only user-missing values.
    User,
    /// Only the system-missing value.
    System,
    /// User-missing or system-missing.
    Any,
}

impl MvClass {
    pub fn includes(self, kind: MissingKind) -> bool {
        match self {
            Self::Never => false,
            Self::User => kind == MissingKind::User,
            Self::System => kind == MissingKind::System,
            Self::Any => true,
        }
    }
}

/// User-missing value declarations: up to three discrete values, or a
/// numeric range with at most one extra discrete value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissingValues {
    discrete: Vec<Value>,
    range: Option<(f64, f64)>,
}

impl MissingValues {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn discrete(values: Vec<Value>) -> XtabResult<Self> {
        if values.len() > 3 {
            return Err(XtabError::Config(format!(
                "at most 3 discrete missing values allowed, got {}",
                values.len()
            )));
        }
        Ok(Self {
            discrete: values,
            range: None,
        })
    }

    pub fn range(low: f64, high: f64) -> XtabResult<Self> {
        if low > high {
            return Err(XtabError::Config(format!(
                "missing-value range {low} THRU {high} is empty"
            )));
        }
        Ok(Self {
            discrete: Vec::new(),
            range: Some((low, high)),
        })
    }

    pub fn range_and_value(low: f64, high: f64, value: f64) -> XtabResult<Self> {
        let mut mv = Self::range(low, high)?;
        mv.discrete.push(Value::Number(value));
        Ok(mv)
    }

    pub fn is_empty(&self) -> bool {
        self.discrete.is_empty() && self.range.is_none()
    }

    pub fn is_user_missing(&self, value: &Value) -> bool {
        if self.discrete.iter().any(|d| d == value) {
            return true;
        }
        match (self.range, value) {
            (Some((low, high)), Value::Number(f)) => low <= *f && *f <= high,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Variable
// ---------------------------------------------------------------------------

/// Read-only variable metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    case_index: usize,
    width: usize,
    missing: MissingValues,
    labels: Vec<(Value, String)>,
    decimals: usize,
}

impl Variable {
    pub fn numeric(name: impl Into<String>, case_index: usize) -> Self {
        Self {
            name: name.into(),
            case_index,
            width: 0,
            missing: MissingValues::none(),
            labels: Vec::new(),
            decimals: 2,
        }
    }

    pub fn string(name: impl Into<String>, case_index: usize, width: usize) -> Self {
        Self {
            width,
            decimals: 0,
            ..Self::numeric(name, case_index)
        }
    }

    pub fn with_missing(mut self, missing: MissingValues) -> Self {
        self.missing = missing;
        self
    }

    pub fn with_label(mut self, value: Value, label: impl Into<String>) -> Self {
        self.labels.push((value, label.into()));
        self
    }

    pub fn with_decimals(mut self, decimals: usize) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn case_index(&self) -> usize {
        self.case_index
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_numeric(&self) -> bool {
        self.width == 0
    }

    pub fn missing_values(&self) -> &MissingValues {
        &self.missing
    }

    pub fn decimals(&self) -> usize {
        self.decimals
    }

    /// Classifies `value`: system-missing only applies to numeric variables.
    pub fn missing_kind(&self, value: &Value) -> Option<MissingKind> {
        if self.is_numeric() && value.is_sysmis() {
            Some(MissingKind::System)
        } else if self.missing.is_user_missing(value) {
            Some(MissingKind::User)
        } else {
            None
        }
    }

    pub fn is_value_missing(&self, value: &Value, class: MvClass) -> bool {
        self.missing_kind(value).is_some_and(|k| class.includes(k))
    }

    pub fn is_num_missing(&self, f: f64, class: MvClass) -> bool {
        self.is_value_missing(&Value::Number(f), class)
    }

    pub fn value_label(&self, value: &Value) -> Option<&str> {
        self.labels
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, l)| l.as_str())
    }

    /// The value's label if it has one, otherwise its formatted value.
    pub fn value_name(&self, value: &Value) -> String {
        match self.value_label(value) {
            Some(label) => label.to_string(),
            None => value.format(self.decimals),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
