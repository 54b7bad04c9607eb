//! CROSSTABS requests loaded from TOML, and their validation into a [`Plan`].
//!
//! ```toml
//! missing = "table"            # table | include | report
//! cells = ["count", "row"]     # omitted: count; empty: count, row, column, total
//! statistics = ["chisq"]       # omitted: none; empty: chisq
//!
//! [count]
//! mode = "cell"                # asis | case | cell
//! rounding = "round"           # round | truncate
//!
//! [format]
//! order = "ascending"          # ascending | descending
//! tables = true
//!
//! [[variables]]                # integer mode ranges
//! names = ["a", "b"]
//! min = 1
//! max = 3
//!
//! [[tables]]
//! by = [["a"], ["b", "c"]]     # a BY b c
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;
use xtab_core::{Dictionary, MvClass, Variable, XtabError, XtabResult};

use crate::cells::{Cell, CellSet, Statistic, StatisticSet};

// ---------------------------------------------------------------------------
// Request (as written)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CrosstabsRequest {
    pub tables: Vec<TableRequest>,
    pub variables: Vec<RangeRequest>,
    pub missing: MissingPolicy,
    pub cells: Option<Vec<String>>,
    pub statistics: Option<Vec<String>>,
    pub count: CountRequest,
    pub format: FormatRequest,
}

/// One TABLES clause: variable lists separated by BY.
#[derive(Debug, Clone, Deserialize)]
pub struct TableRequest {
    pub by: Vec<Vec<String>>,
}

/// An integer-mode range shared by `names`, inclusive at both ends.
#[derive(Debug, Clone, Deserialize)]
pub struct RangeRequest {
    pub names: Vec<String>,
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Exclude user- and system-missing values.
    #[default]
    Table,
    /// Exclude only system-missing values.
    Include,
    /// Tabulate everything, then drop user-missing rows and columns from
    /// the statistics.  Integer mode only.
    Report,
}

impl MissingPolicy {
    /// Values excluded while tabulating.
    pub fn exclude(self) -> MvClass {
        match self {
            Self::Table => MvClass::Any,
            Self::Include => MvClass::System,
            Self::Report => MvClass::Never,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountMode {
    #[default]
    Asis,
    Case,
    Cell,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    #[default]
    Round,
    Truncate,
}

impl Rounding {
    pub fn apply(self, weight: f64) -> f64 {
        match self {
            Self::Round => (weight + 0.5).floor(),
            Self::Truncate => weight.floor(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct CountRequest {
    pub mode: CountMode,
    pub rounding: Rounding,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FormatRequest {
    pub order: Order,
    pub tables: bool,
}

impl Default for FormatRequest {
    fn default() -> Self {
        Self {
            order: Order::Ascending,
            tables: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Plan (validated)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    General,
    Integer,
}

/// Widest range a `[[variables]]` entry may declare.
pub const MAX_RANGE_VALUES: usize = 100_000;

/// Inclusive integer domain of a variable in integer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarRange {
    pub min: i64,
    pub max: i64,
}

impl VarRange {
    pub fn contains(&self, x: f64) -> bool {
        x >= self.min as f64 && x < self.max as f64 + 1.0
    }

    /// Number of integers in the range, or `None` if it is inverted or too
    /// wide to count.
    pub fn count(&self) -> Option<usize> {
        let width = self.max.checked_sub(self.min)?.checked_add(1)?;
        usize::try_from(width).ok().filter(|n| *n > 0)
    }
}

/// One crosstabulation: row, column, then layer variables.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub vars: Vec<Variable>,
}

impl TableSpec {
    pub fn row(&self) -> &Variable {
        &self.vars[0]
    }

    pub fn col(&self) -> &Variable {
        &self.vars[1]
    }

    pub fn layers(&self) -> &[Variable] {
        &self.vars[2..]
    }

    /// "a × b × c".
    pub fn name(&self) -> String {
        self.vars
            .iter()
            .map(Variable::name)
            .collect::<Vec<_>>()
            .join(" × ")
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub mode: Mode,
    pub missing: MissingPolicy,
    pub cells: CellSet,
    pub statistics: StatisticSet,
    pub count_mode: CountMode,
    pub rounding: Rounding,
    pub descending: bool,
    pub tables: Vec<TableSpec>,
    /// Integer-mode ranges keyed by case index.
    pub ranges: HashMap<usize, VarRange>,
    /// Non-fatal problems found while planning.
    pub warnings: Vec<String>,
}

impl Plan {
    pub fn exclude(&self) -> MvClass {
        self.missing.exclude()
    }

    pub fn range_of(&self, var: &Variable) -> Option<&VarRange> {
        self.ranges.get(&var.case_index())
    }
}

impl CrosstabsRequest {
    pub fn from_toml(text: &str) -> XtabResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> XtabResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| XtabError::Io(format!("reading {}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Adds a table given its BY-separated variable lists.
    pub fn with_table(mut self, by: &[&[&str]]) -> Self {
        self.tables.push(TableRequest {
            by: by
                .iter()
                .map(|list| list.iter().map(|s| s.to_string()).collect())
                .collect(),
        });
        self
    }

    /// Resolves names against `dict` and checks the request.  Every error
    /// returned here happens before any case is read.
    pub fn plan(&self, dict: &Dictionary) -> XtabResult<Plan> {
        let mut warnings = Vec::new();

        let ranges = self.plan_ranges(dict)?;
        let mode = if self.variables.is_empty() {
            Mode::General
        } else {
            Mode::Integer
        };

        let mut tables = Vec::new();
        for t in &self.tables {
            tables.extend(expand_table(dict, t, &ranges, mode)?);
        }
        if tables.is_empty() {
            return Err(XtabError::Syntax(
                "At least one crosstabulation must be requested (using the TABLES subcommand)."
                    .into(),
            ));
        }

        let mut missing = self.missing;
        if mode == Mode::General && missing == MissingPolicy::Report {
            warnings.push(
                "Missing mode REPORT not allowed in general mode.  Assuming MISSING=TABLE.".into(),
            );
            missing = MissingPolicy::Table;
        }

        let cells = if self.format.tables {
            parse_cells(self.cells.as_deref())?
        } else {
            CellSet::empty()
        };
        let statistics = parse_statistics(self.statistics.as_deref())?;

        debug!(
            n_tables = tables.len(),
            ?mode,
            ?missing,
            "planned crosstabs request"
        );
        Ok(Plan {
            mode,
            missing,
            cells,
            statistics,
            count_mode: self.count.mode,
            rounding: self.count.rounding,
            descending: self.format.order == Order::Descending,
            tables,
            ranges,
            warnings,
        })
    }

    fn plan_ranges(&self, dict: &Dictionary) -> XtabResult<HashMap<usize, VarRange>> {
        let mut ranges = HashMap::new();
        for r in &self.variables {
            if r.max < r.min {
                return Err(XtabError::Syntax(format!(
                    "range ({}, {}) for {} has maximum below minimum",
                    r.min,
                    r.max,
                    r.names.join(" ")
                )));
            }
            let range = VarRange {
                min: r.min,
                max: r.max,
            };
            if !range.count().is_some_and(|n| n <= MAX_RANGE_VALUES) {
                return Err(XtabError::Syntax(format!(
                    "range ({}, {}) for {} spans more than {MAX_RANGE_VALUES} values",
                    r.min,
                    r.max,
                    r.names.join(" ")
                )));
            }
            for name in &r.names {
                let var = lookup(dict, name)?;
                if !var.is_numeric() {
                    return Err(XtabError::Syntax(format!(
                        "{name} is not numeric and cannot be given a range"
                    )));
                }
                if ranges.insert(var.case_index(), range).is_some() {
                    return Err(XtabError::Syntax(format!(
                        "{name} appears more than once in VARIABLES"
                    )));
                }
            }
        }
        Ok(ranges)
    }
}

fn lookup<'a>(dict: &'a Dictionary, name: &str) -> XtabResult<&'a Variable> {
    dict.lookup_var(name)
        .ok_or_else(|| XtabError::UnknownVariable(name.to_string()))
}

/// Expands `a b BY c d` into a×c, a×d, b×c, b×d (last list varies fastest).
fn expand_table(
    dict: &Dictionary,
    table: &TableRequest,
    ranges: &HashMap<usize, VarRange>,
    mode: Mode,
) -> XtabResult<Vec<TableSpec>> {
    if table.by.len() < 2 {
        return Err(XtabError::Syntax(
            "a crosstabulation needs at least two variable lists separated by BY".into(),
        ));
    }
    let mut lists: Vec<Vec<&Variable>> = Vec::with_capacity(table.by.len());
    let mut n_tables: usize = 1;
    for names in &table.by {
        if names.is_empty() {
            return Err(XtabError::Syntax("empty variable list in TABLES".into()));
        }
        let mut list: Vec<&Variable> = Vec::with_capacity(names.len());
        for name in names {
            let var = lookup(dict, name)?;
            if list.iter().any(|v| v.case_index() == var.case_index()) {
                return Err(XtabError::Syntax(format!(
                    "{name} appears more than once in the same variable list"
                )));
            }
            if mode == Mode::Integer && !ranges.contains_key(&var.case_index()) {
                return Err(XtabError::Syntax(format!(
                    "{name} is not in the VARIABLES list"
                )));
            }
            list.push(var);
        }
        n_tables = n_tables.checked_mul(list.len()).ok_or_else(|| {
            XtabError::Syntax("Too many cross-tabulation variables or dimensions.".into())
        })?;
        lists.push(list);
    }

    let mut out = Vec::with_capacity(n_tables);
    let mut iter = vec![0usize; lists.len()];
    for _ in 0..n_tables {
        out.push(TableSpec {
            vars: lists
                .iter()
                .zip(&iter)
                .map(|(list, i)| list[*i].clone())
                .collect(),
        });
        for j in (0..lists.len()).rev() {
            iter[j] += 1;
            if iter[j] < lists[j].len() {
                break;
            }
            iter[j] = 0;
        }
    }
    Ok(out)
}

fn keyword_error(kind: &str, keywords: impl Iterator<Item = &'static str>) -> XtabError {
    let expected: Vec<_> = keywords.map(|k| k.to_uppercase()).collect();
    XtabError::Syntax(format!(
        "unknown {kind} keyword; expecting ALL, NONE, or one of {}",
        expected.join(", ")
    ))
}

fn parse_cells(list: Option<&[String]>) -> XtabResult<CellSet> {
    let Some(list) = list else {
        return Ok(CellSet::of(&[Cell::Count]));
    };
    if list.is_empty() {
        return Ok(CellSet::listed_default());
    }
    let mut set = CellSet::empty();
    for kw in list {
        if kw.eq_ignore_ascii_case("all") {
            return Ok(CellSet::all());
        }
        if kw.eq_ignore_ascii_case("none") {
            return Ok(CellSet::empty());
        }
        let cell = Cell::from_keyword(kw)
            .ok_or_else(|| keyword_error("cell", Cell::ALL.iter().map(|c| c.keyword())))?;
        set.insert(cell);
    }
    Ok(set)
}

fn parse_statistics(list: Option<&[String]>) -> XtabResult<StatisticSet> {
    let Some(list) = list else {
        return Ok(StatisticSet::empty());
    };
    if list.is_empty() {
        return Ok(StatisticSet::of(&[Statistic::Chisq]));
    }
    let mut set = StatisticSet::empty();
    for kw in list {
        if kw.eq_ignore_ascii_case("all") {
            return Ok(StatisticSet::all());
        }
        if kw.eq_ignore_ascii_case("none") {
            return Ok(StatisticSet::empty());
        }
        let stat = Statistic::from_keyword(kw).ok_or_else(|| {
            keyword_error("statistic", Statistic::ALL.iter().map(|s| s.keyword()))
        })?;
        set.insert(stat);
    }
    Ok(set)
}
