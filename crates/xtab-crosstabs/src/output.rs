//! Pivot tables for a finished pass: the case summary, one crosstabulation
//! per table request, and the statistics tables that go with it.

use tracing::{debug, warn};
use xtab_core::{
    Axis, Case, Dimension, GroupId, Message, MvClass, OutputSink, PivotTable, PivotValue,
    ResultClass, Variable, XtabResult,
};

use crate::accumulator::FreqEntry;
use crate::cells::{Cell, StatTable, Statistic};
use crate::domain::{subtables, Domain};
use crate::matrix::Matrix;
use crate::request::{MissingPolicy, Mode, Plan, TableSpec};
use crate::stats::{self, Measure};

pub const SUMMARY_TITLE: &str = "Summary";
pub const SPLIT_TITLE: &str = "Split File";
pub const CHISQ_TITLE: &str = "Chi-Square Tests";
pub const SYMMETRIC_TITLE: &str = "Symmetric Measures";
pub const RISK_TITLE: &str = "Risk Estimate";
pub const DIRECTIONAL_TITLE: &str = "Directional Measures";

const MISSING_FOOTNOTE: &str = "Missing value";
const N_VALID: &str = "N of Valid Cases";

/// Weighted case counts for one table, as reported in the summary.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub name: String,
    pub valid: f64,
    pub missing: f64,
}

pub fn summary_table(rows: &[SummaryRow]) -> XtabResult<PivotTable> {
    let mut table = PivotTable::new(SUMMARY_TITLE);
    let stats = table.create_dimension(Axis::Column, "Statistics");
    let dim = table.dimension_mut(stats)?;
    dim.add_leaf_rc("N", ResultClass::Count);
    dim.add_leaf_rc("Percent", ResultClass::Percent);
    let cases = table.create_dimension(Axis::Column, "Cases");
    let dim = table.dimension_mut(cases)?;
    for label in ["Valid", "Missing", "Total"] {
        dim.add_leaf(label);
    }
    let names = table.create_dimension(Axis::Row, "Crosstabulation");

    for row in rows {
        let r = table.dimension_mut(names)?.add_leaf(row.name.as_str());
        let n = [row.valid, row.missing, row.valid + row.missing];
        for (i, count) in n.iter().enumerate() {
            put_finite(&mut table, &[0, i, r], *count)?;
            put_finite(&mut table, &[1, i, r], count / n[2] * 100.0)?;
        }
    }
    Ok(table)
}

/// The split variables and their values in `case`.
pub fn split_table(splits: &[&Variable], case: &Case) -> XtabResult<PivotTable> {
    let mut table = PivotTable::new(SPLIT_TITLE);
    let vars = table.create_dimension(Axis::Row, "Variables");
    let values = table.create_dimension(Axis::Column, "Value");
    table.dimension_mut(values)?.add_leaf("Value");
    for var in splits {
        let leaf = table.dimension_mut(vars)?.add_leaf(var.name());
        if let Some(value) = case.get(var.case_index()) {
            table.put(&[leaf, 0], PivotValue::Text(var.value_name(value)))?;
        }
    }
    Ok(table)
}

/// Builds and submits every table for one crosstabulation.  `entries` must
/// be sorted the way [`FreqTable::into_sorted_entries`] leaves them.
///
/// [`FreqTable::into_sorted_entries`]: crate::accumulator::FreqTable::into_sorted_entries
pub fn output_crosstabulation(
    plan: &Plan,
    spec: &TableSpec,
    entries: &[FreqEntry],
    sink: &mut dyn OutputSink,
) -> XtabResult<()> {
    let domains: Vec<Domain> = spec
        .vars
        .iter()
        .enumerate()
        .map(|(slot, var)| match plan.range_of(var) {
            Some(range) => Domain::integer(range, plan.descending),
            None => Ok(Domain::discover(entries, slot, plan.descending)),
        })
        .collect::<XtabResult<_>>()?;
    if domains[1].is_empty() {
        let text = format!(
            "Crosstabulation {} contained no non-missing cases.",
            spec.name()
        );
        warn!("{text}");
        sink.message(Message::warning(text));
        return Ok(());
    }
    let (rows, cols, layers) = (&domains[0], &domains[1], &domains[2..]);

    let mut crosstab = if plan.cells.is_empty() {
        None
    } else {
        Some(CrosstabTable::new(plan, spec, &domains)?)
    };
    let wanted = plan.statistics;
    let mut chisq = wanted
        .contains(Statistic::Chisq)
        .then(|| chisq_table(spec, layers))
        .transpose()?;
    let mut sym = wanted
        .wants_table(StatTable::Symmetric)
        .then(|| symmetric_table(spec, layers))
        .transpose()?;
    let mut risk = wanted
        .contains(Statistic::Risk)
        .then(|| risk_table(spec, layers))
        .transpose()?;
    let mut direct = wanted
        .wants_table(StatTable::Directional)
        .then(|| directional_table(spec, layers))
        .transpose()?;

    let subs = subtables(entries, layers)?;
    debug!(table = %spec.name(), n_subtables = subs.len(), "output crosstabulation");
    for sub in &subs {
        let mut m = Matrix::build(sub.entries, rows, cols)?;
        let layer = sub.layer_indexes.as_slice();

        if let Some(t) = crosstab.as_mut() {
            t.display(plan.mode, &m, layer)?;
        }
        if plan.missing == MissingPolicy::Report {
            m.delete_missing(spec.row(), rows, spec.col(), cols);
        }
        if let Some(t) = chisq.as_mut() {
            display_chisq(t, &stats::chi_square(&m, rows, cols), layer)?;
        }
        if let Some(t) = sym.as_mut() {
            if let Some(s) = stats::symmetric(&m, rows, cols, wanted) {
                display_symmetric(t, &s, layer)?;
                if s.kappa_mismatch {
                    let text = format!(
                        "Kappa for {} pairs rows and columns with different values.",
                        spec.name()
                    );
                    warn!("{text}");
                    sink.message(Message::warning(text));
                }
            }
        }
        if let Some(t) = risk.as_mut() {
            if let Some(r) = stats::risk(&m, rows, cols) {
                display_risk(t, spec, &r, layer)?;
            }
        }
        if let Some(t) = direct.as_mut() {
            let d = stats::directional(&m, rows, cols, wanted);
            display_measures(t, &d.in_order(), layer)?;
        }
    }

    if let Some(t) = crosstab {
        sink.submit(t.table);
    }
    for table in [chisq, sym].into_iter().flatten() {
        sink.submit(table);
    }
    if let Some(t) = risk.filter(|t| !t.is_empty()) {
        sink.submit(t);
    }
    if let Some(t) = direct {
        sink.submit(t);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// Adds a dimension listing `domain` under a group named for `var`, with a
/// trailing "Total" leaf when `total` is set.  Missing values are marked with
/// the table's "Missing value" footnote.
fn add_var_dimension(
    table: &mut PivotTable,
    var: &Variable,
    domain: &Domain,
    axis: Axis,
    total: bool,
) -> XtabResult<()> {
    let footnote = domain
        .values()
        .iter()
        .any(|v| var.is_value_missing(v, MvClass::Any))
        .then(|| missing_footnote(table));

    let idx = table.create_dimension(axis, var.name());
    let dim = table.dimension_mut(idx)?;
    let group = dim.add_group(var.name());
    for value in domain.values() {
        let leaf = dim.add_leaf_to(&group, var.value_name(value));
        if let Some(f) = footnote.filter(|_| var.is_value_missing(value, MvClass::Any)) {
            dim.attach_footnote(leaf, f);
        }
    }
    if total {
        dim.add_leaf("Total");
    }
    Ok(())
}

fn missing_footnote(table: &mut PivotTable) -> usize {
    match table.footnotes.iter().position(|f| f == MISSING_FOOTNOTE) {
        Some(i) => i,
        None => table.create_footnote(MISSING_FOOTNOTE),
    }
}

fn add_layer_dimensions(
    table: &mut PivotTable,
    spec: &TableSpec,
    layers: &[Domain],
) -> XtabResult<()> {
    for (var, domain) in spec.layers().iter().zip(layers) {
        add_var_dimension(table, var, domain, Axis::Row, false)?;
    }
    Ok(())
}

/// `[first..., layer...]` as one index tuple.
fn indexes(first: &[usize], layer: &[usize]) -> Vec<usize> {
    first.iter().chain(layer).copied().collect()
}

fn put_finite(table: &mut PivotTable, indexes: &[usize], value: f64) -> XtabResult<()> {
    if value.is_finite() {
        table.put_number(indexes, value)?;
    }
    Ok(())
}

fn put_opt(table: &mut PivotTable, indexes: &[usize], value: Option<f64>) -> XtabResult<()> {
    match value {
        Some(v) => put_finite(table, indexes, v),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Crosstabulation
// ---------------------------------------------------------------------------

struct CrosstabTable {
    table: PivotTable,
    /// Requested cells and their leaf in the statistics dimension.
    cells: Vec<(Cell, usize)>,
}

impl CrosstabTable {
    fn new(plan: &Plan, spec: &TableSpec, domains: &[Domain]) -> XtabResult<Self> {
        let mut table = PivotTable::new(spec.name()).with_subtype("Crosstabulation");
        let stats = table.create_dimension(Axis::Row, "Statistics");
        let dim = table.dimension_mut(stats)?;
        let cells = plan
            .cells
            .iter()
            .map(|cell| (cell, dim.add_leaf_rc(cell.label(), cell.result_class())))
            .collect();
        for (slot, (var, domain)) in spec.vars.iter().zip(domains).enumerate() {
            let axis = if slot == 1 { Axis::Column } else { Axis::Row };
            add_var_dimension(&mut table, var, domain, axis, true)?;
        }
        Ok(Self { table, cells })
    }

    fn put_cells(
        &mut self,
        r: usize,
        c: usize,
        layer: &[usize],
        value: impl Fn(Cell) -> Option<f64>,
    ) -> XtabResult<()> {
        for (cell, leaf) in &self.cells {
            if let Some(v) = value(*cell) {
                put_finite(&mut self.table, &indexes(&[*leaf, r, c], layer), v)?;
            }
        }
        Ok(())
    }

    /// Fills in one subtable.  Outside integer mode, rows and columns with a
    /// zero total are left blank.
    fn display(&mut self, mode: Mode, m: &Matrix, layer: &[usize]) -> XtabResult<()> {
        let total = m.total;
        let keep_empty = mode == Mode::Integer;
        let rows: Vec<usize> = (0..m.n_rows)
            .filter(|r| keep_empty || m.row_tot[*r] != 0.0)
            .collect();
        let cols: Vec<usize> = (0..m.n_cols)
            .filter(|c| keep_empty || m.col_tot[*c] != 0.0)
            .collect();

        for &r in &rows {
            let rt = m.row_tot[r];
            for &c in &cols {
                let ct = m.col_tot[c];
                let f = m.get(r, c);
                let expected = rt * ct / total;
                let residual = f - expected;
                self.put_cells(r, c, layer, |cell| {
                    Some(match cell {
                        Cell::Count => f,
                        Cell::Row => f / rt * 100.0,
                        Cell::Column => f / ct * 100.0,
                        Cell::Total => f / total * 100.0,
                        Cell::Expected => expected,
                        Cell::Residual => residual,
                        Cell::SResidual => residual / expected.sqrt(),
                        Cell::AsResidual => {
                            residual
                                / (expected * (1.0 - rt / total) * (1.0 - ct / total)).sqrt()
                        }
                    })
                })?;
            }
        }

        // Row totals sit in the column "Total" leaf.
        for &r in &rows {
            let rt = m.row_tot[r];
            let share = rt / total;
            self.put_cells(r, m.n_cols, layer, |cell| match cell {
                Cell::Count => Some(rt),
                Cell::Row => Some(100.0),
                Cell::Column | Cell::Total => Some(share * 100.0),
                Cell::Expected => Some(share),
                Cell::Residual | Cell::SResidual | Cell::AsResidual => None,
            })?;
        }

        // Column totals, then the grand total, in the row "Total" leaf.
        for c in cols.into_iter().chain([m.n_cols]) {
            let ct = if c < m.n_cols { m.col_tot[c] } else { total };
            let share = ct / total;
            self.put_cells(m.n_rows, c, layer, |cell| match cell {
                Cell::Count => Some(ct),
                Cell::Row | Cell::Total => Some(share * 100.0),
                Cell::Column => Some(100.0),
                Cell::Expected => Some(share),
                Cell::Residual | Cell::SResidual | Cell::AsResidual => None,
            })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Chi-square tests
// ---------------------------------------------------------------------------

fn chisq_table(spec: &TableSpec, layers: &[Domain]) -> XtabResult<PivotTable> {
    let mut table = PivotTable::new(CHISQ_TITLE);
    let rows = table.create_dimension(Axis::Row, "Statistics");
    let dim = table.dimension_mut(rows)?;
    for label in [
        "Pearson Chi-Square",
        "Likelihood Ratio",
        "Fisher's Exact Test",
        "Continuity Correction",
        "Linear-by-Linear Association",
    ] {
        dim.add_leaf(label);
    }
    dim.add_leaf_rc(N_VALID, ResultClass::Count);

    let cols = table.create_dimension(Axis::Column, "Statistics");
    let dim = table.dimension_mut(cols)?;
    dim.add_leaf_rc("Value", ResultClass::Other);
    dim.add_leaf_rc("df", ResultClass::Count);
    dim.add_leaf_rc("Asymptotic Sig. (2-tailed)", ResultClass::Significance);
    dim.add_leaf_rc("Exact Sig. (2-tailed)", ResultClass::Significance);
    dim.add_leaf_rc("Exact Sig. (1-tailed)", ResultClass::Significance);

    add_layer_dimensions(&mut table, spec, layers)?;
    Ok(table)
}

fn display_chisq(
    table: &mut PivotTable,
    t: &stats::ChiSquareTests,
    layer: &[usize],
) -> XtabResult<()> {
    let tests = [
        (0, t.pearson),
        (1, t.likelihood_ratio),
        (3, t.continuity),
        (4, t.linear_by_linear),
    ];
    for (row, test) in tests {
        if let Some(test) = test {
            put_finite(table, &indexes(&[row, 0], layer), test.value)?;
            put_finite(table, &indexes(&[row, 1], layer), test.df)?;
            put_opt(table, &indexes(&[row, 2], layer), test.asymp_sig())?;
        }
    }
    if let Some(f) = t.fisher {
        put_finite(table, &indexes(&[2, 3], layer), f.two_tailed)?;
        put_finite(table, &indexes(&[2, 4], layer), f.one_tailed)?;
    }
    put_finite(table, &indexes(&[5, 0], layer), t.n_valid)
}

// ---------------------------------------------------------------------------
// Symmetric and directional measures
// ---------------------------------------------------------------------------

fn add_measure_columns(table: &mut PivotTable) -> XtabResult<()> {
    let values = table.create_dimension(Axis::Column, "Values");
    let dim = table.dimension_mut(values)?;
    dim.add_leaf_rc("Value", ResultClass::Other);
    dim.add_leaf_rc("Asymp. Std. Error", ResultClass::Other);
    dim.add_leaf_rc("Approx. T", ResultClass::Other);
    dim.add_leaf_rc("Approx. Sig.", ResultClass::Significance);
    Ok(())
}

fn symmetric_table(spec: &TableSpec, layers: &[Domain]) -> XtabResult<PivotTable> {
    let mut table = PivotTable::new(SYMMETRIC_TITLE);
    add_measure_columns(&mut table)?;
    let stats = table.create_dimension(Axis::Row, "Statistics");
    let dim = table.dimension_mut(stats)?;
    dim.add_group_of(
        "Nominal by Nominal",
        &["Phi", "Cramer's V", "Contingency Coefficient"],
    );
    dim.add_group_of(
        "Ordinal by Ordinal",
        &[
            "Kendall's tau-b",
            "Kendall's tau-c",
            "Gamma",
            "Spearman Correlation",
        ],
    );
    dim.add_group_of("Interval by Interval", &["Pearson's R"]);
    dim.add_group_of("Measure of Agreement", &["Kappa"]);
    dim.add_leaf_rc(N_VALID, ResultClass::Count);
    add_layer_dimensions(&mut table, spec, layers)?;
    Ok(table)
}

/// Puts each defined measure in statistics leaf `i`, one column per
/// component.
fn display_measures(
    table: &mut PivotTable,
    measures: &[Measure],
    layer: &[usize],
) -> XtabResult<()> {
    for (i, m) in measures.iter().enumerate() {
        if !m.is_defined() {
            continue;
        }
        for (j, v) in m.columns().into_iter().enumerate() {
            put_opt(table, &indexes(&[j, i], layer), v)?;
        }
    }
    Ok(())
}

fn display_symmetric(
    table: &mut PivotTable,
    s: &stats::SymmetricMeasures,
    layer: &[usize],
) -> XtabResult<()> {
    let measures = s.in_order();
    display_measures(table, &measures, layer)?;
    if s.n_valid.is_finite() {
        table.put(
            &indexes(&[0, measures.len()], layer),
            PivotValue::number_rc(s.n_valid, ResultClass::Count),
        )?;
    }
    Ok(())
}

fn directional_table(spec: &TableSpec, layers: &[Domain]) -> XtabResult<PivotTable> {
    let mut table = PivotTable::new(DIRECTIONAL_TITLE);
    add_measure_columns(&mut table)?;
    let stats = table.create_dimension(Axis::Row, "Statistics");
    let dim = table.dimension_mut(stats)?;
    let row_dep = format!("{} Dependent", spec.row().name());
    let col_dep = format!("{} Dependent", spec.col().name());

    let deps = [row_dep.as_str(), col_dep.as_str()];

    let nominal = dim.add_group("Nominal by Nominal");
    add_dependent_group(dim, &nominal, "Lambda", true, deps);
    add_dependent_group(dim, &nominal, "Goodman and Kruskal tau", false, deps);
    add_dependent_group(dim, &nominal, "Uncertainty Coefficient", true, deps);
    let ordinal = dim.add_group("Ordinal by Ordinal");
    add_dependent_group(dim, &ordinal, "Somers' d", true, deps);
    let interval = dim.add_group("Nominal by Interval");
    add_dependent_group(dim, &interval, "Eta", false, deps);
    add_layer_dimensions(&mut table, spec, layers)?;
    Ok(table)
}

fn add_dependent_group(
    dim: &mut Dimension,
    parent: &GroupId,
    name: &str,
    symmetric: bool,
    deps: [&str; 2],
) {
    let group = dim.add_subgroup(parent, name);
    if symmetric {
        dim.add_leaf_to(&group, "Symmetric");
    }
    for dep in deps {
        dim.add_leaf_to(&group, dep);
    }
}

// ---------------------------------------------------------------------------
// Risk estimate
// ---------------------------------------------------------------------------

fn risk_table(spec: &TableSpec, layers: &[Domain]) -> XtabResult<PivotTable> {
    let mut table = PivotTable::new(RISK_TITLE);
    let values = table.create_dimension(Axis::Column, "Values");
    let dim = table.dimension_mut(values)?;
    dim.add_leaf_rc("Value", ResultClass::Other);
    let ci = dim.add_group("95% Confidence Interval");
    dim.add_leaf_to(&ci, "Lower");
    dim.add_leaf_to(&ci, "Upper");
    table.create_dimension(Axis::Row, "Statistics");
    add_layer_dimensions(&mut table, spec, layers)?;
    Ok(table)
}

/// Statistics leaves are added as estimates turn up, so each subtable only
/// lists the estimates it defines.
fn display_risk(
    table: &mut PivotTable,
    spec: &TableSpec,
    r: &stats::RiskEstimate,
    layer: &[usize],
) -> XtabResult<()> {
    let (row, col) = (spec.row(), spec.col());
    let estimates = [
        (
            format!(
                "Odds Ratio for {} ({} / {})",
                row.name(),
                row.value_name(&r.row_values[0]),
                row.value_name(&r.row_values[1])
            ),
            r.odds_ratio,
        ),
        (
            format!("For cohort {} = {}", col.name(), col.value_name(&r.col_values[0])),
            r.cohorts[0],
        ),
        (
            format!("For cohort {} = {}", col.name(), col.value_name(&r.col_values[1])),
            r.cohorts[1],
        ),
    ];
    for (label, e) in estimates {
        if e.value.is_none() {
            continue;
        }
        let leaf = table.dimension_mut(1)?.add_leaf(label);
        for (j, v) in [e.value, e.lower, e.upper].into_iter().enumerate() {
            put_opt(table, &indexes(&[j, leaf], layer), v)?;
        }
    }
    let leaf = table.dimension_mut(1)?.add_leaf_rc(N_VALID, ResultClass::Count);
    put_finite(table, &indexes(&[0, leaf], layer), r.n_valid)
}


#[cfg(test)]
mod tests {
    use xtab_core::{CollectingSink, Dictionary, MissingValues, Value};

    use super::*;
    use crate::accumulator::FreqTable;
    use crate::request::CrosstabsRequest;

    fn make_dict() -> Dictionary {
        let mut dict = Dictionary::new();
        dict.add_var(Variable::numeric("a", 0)).unwrap();
        dict.add_var(
            Variable::numeric("b", 1)
                .with_missing(MissingValues::discrete(vec![Value::Number(9.0)]).unwrap()),
        )
        .unwrap();
        dict.add_var(Variable::numeric("c", 2)).unwrap();
        dict
    }

    /// Accumulates one unit-weight case per row; row `i` holds the values of
    /// the table's slots in order.
    fn make_entries(rows: &[&[f64]]) -> Vec<FreqEntry> {
        let n = rows.first().map_or(0, |r| r.len());
        let mut freq = FreqTable::new((0..n).collect(), false);
        for r in rows {
            let case = Case::new(r.iter().map(|v| Value::Number(*v)).collect());
            freq.accumulate(&case, 1.0).unwrap();
        }
        freq.into_sorted_entries(false)
    }

    fn make_plan(request: CrosstabsRequest, dict: &Dictionary) -> Plan {
        request.plan(dict).unwrap()
    }

    #[test]
    fn test_summary_percentages() {
        let t = summary_table(&[SummaryRow {
            name: "a × b".into(),
            valid: 30.0,
            missing: 10.0,
        }])
        .unwrap();
        assert_eq!(t.number(&[0, 0, 0]), Some(30.0));
        assert_eq!(t.number(&[0, 2, 0]), Some(40.0));
        assert_eq!(t.number(&[1, 0, 0]), Some(75.0));
        assert_eq!(t.number(&[1, 1, 0]), Some(25.0));
        assert_eq!(t.number(&[1, 2, 0]), Some(100.0));
    }

    #[test]
    fn test_summary_empty_table_has_no_percent() {
        let t = summary_table(&[SummaryRow {
            name: "a × b".into(),
            valid: 0.0,
            missing: 0.0,
        }])
        .unwrap();
        assert_eq!(t.number(&[0, 2, 0]), Some(0.0));
        assert_eq!(t.number(&[1, 2, 0]), None);
    }

    #[test]
    fn test_split_table_shows_values() {
        let dict = make_dict();
        let case = Case::new(vec![
            Value::Number(1.0),
            Value::Number(2.0),
            Value::Number(3.0),
        ]);
        let t = split_table(&[dict.lookup_var("c").unwrap()], &case).unwrap();
        assert_eq!(t.title, SPLIT_TITLE);
        assert_eq!(t.get(&[0, 0]), Some(&PivotValue::Text("3".into())));
    }

    #[test]
    fn test_crosstab_cells_and_totals() {
        let dict = make_dict();
        let plan = make_plan(
            CrosstabsRequest {
                cells: Some(vec!["count".into(), "row".into(), "expected".into()]),
                ..Default::default()
            }
            .with_table(&[&["a"], &["c"]]),
            &dict,
        );
        let entries = make_entries(&[&[1.0, 1.0], &[1.0, 2.0], &[2.0, 2.0]]);
        let mut sink = CollectingSink::new();
        output_crosstabulation(&plan, &plan.tables[0], &entries, &mut sink).unwrap();

        let t = sink.tables_titled("a × c").next().unwrap();
        assert_eq!(t.subtype, "Crosstabulation");
        let stats = t.dimension(0).unwrap();
        assert_eq!(stats.find_leaf("Count"), Some(0));
        assert_eq!(stats.find_leaf("Expected"), Some(1));
        assert_eq!(stats.find_leaf("Row %"), Some(2));
        // [stat, row, col]; row 2 and column 2 are the totals.
        assert_eq!(t.number(&[0, 0, 0]), Some(1.0));
        assert_eq!(t.number(&[0, 1, 0]), Some(0.0));
        assert_eq!(t.number(&[0, 1, 1]), Some(1.0));
        assert_eq!(t.number(&[2, 0, 1]), Some(50.0));
        assert_eq!(t.number(&[0, 0, 2]), Some(2.0));
        assert_eq!(t.number(&[2, 0, 2]), Some(100.0));
        assert_eq!(t.number(&[0, 2, 1]), Some(2.0));
        assert_eq!(t.number(&[0, 2, 2]), Some(3.0));
        assert_eq!(t.number(&[1, 0, 1]), Some(2.0 * 2.0 / 3.0));
        assert_eq!(t.number(&[1, 2, 2]), Some(1.0));
    }

    #[test]
    fn test_residual_cells() {
        let dict = make_dict();
        let plan = make_plan(
            CrosstabsRequest {
                cells: Some(vec![
                    "residual".into(),
                    "sresidual".into(),
                    "asresidual".into(),
                ]),
                ..Default::default()
            }
            .with_table(&[&["a"], &["c"]]),
            &dict,
        );
        let cells = [[1.0, 1.0], [1.0, 2.0], [2.0, 1.0], [2.0, 2.0]];
        let mut rows: Vec<&[f64]> = Vec::new();
        for (cell, n) in cells.iter().zip([10, 5, 3, 12]) {
            rows.extend(std::iter::repeat(cell.as_slice()).take(n));
        }
        let entries = make_entries(&rows);
        let mut sink = CollectingSink::new();
        output_crosstabulation(&plan, &plan.tables[0], &entries, &mut sink).unwrap();

        let t = sink.tables_titled("a × c").next().unwrap();
        let stats = t.dimension(0).unwrap();
        let res = stats.find_leaf("Residual").unwrap();
        let sres = stats.find_leaf("Std. Residual").unwrap();
        let adj = stats.find_leaf("Adjusted Residual").unwrap();
        // Expected count of the first cell is 15 * 13 / 30 = 6.5.
        let close = |got: Option<f64>, want: f64| {
            let got = got.unwrap();
            assert!((got - want).abs() < 1e-12, "expected {want}, got {got}");
        };
        close(t.number(&[res, 0, 0]), 3.5);
        close(t.number(&[sres, 0, 0]), 3.5 / 6.5_f64.sqrt());
        close(t.number(&[adj, 0, 0]), 2.5790664416426425);
        // On a 2×2 table every adjusted residual squares to Pearson chi-square.
        for (r, c) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            let a = t.number(&[adj, r, c]).unwrap();
            assert!((a * a - 6.651583710407239).abs() < 1e-9, "{a}");
        }
    }

    #[test]
    fn test_missing_values_get_footnote() {
        let dict = make_dict();
        let plan = make_plan(
            CrosstabsRequest {
                missing: MissingPolicy::Include,
                ..Default::default()
            }
            .with_table(&[&["a"], &["b"]]),
            &dict,
        );
        let entries = make_entries(&[&[1.0, 1.0], &[1.0, 9.0]]);
        let mut sink = CollectingSink::new();
        output_crosstabulation(&plan, &plan.tables[0], &entries, &mut sink).unwrap();

        let t = &sink.tables[0];
        assert_eq!(t.footnotes, vec![MISSING_FOOTNOTE.to_string()]);
        let leaves = t.dimension(2).unwrap().leaves();
        assert_eq!(leaves[0].label, "1");
        assert!(leaves[0].footnotes.is_empty());
        assert_eq!(leaves[1].label, "9");
        assert_eq!(leaves[1].footnotes, vec![0]);
        assert_eq!(leaves[2].label, "Total");
    }

    #[test]
    fn test_empty_column_domain_warns() {
        let dict = make_dict();
        let plan = make_plan(
            CrosstabsRequest::default().with_table(&[&["a"], &["b"]]),
            &dict,
        );
        let mut sink = CollectingSink::new();
        output_crosstabulation(&plan, &plan.tables[0], &[], &mut sink).unwrap();
        assert!(sink.tables.is_empty());
        let w: Vec<_> = sink.warnings().collect();
        assert_eq!(w.len(), 1);
        assert_eq!(
            w[0].text,
            "Crosstabulation a × b contained no non-missing cases."
        );
    }

    #[test]
    fn test_layers_split_subtables() {
        let dict = make_dict();
        let plan = make_plan(
            CrosstabsRequest {
                statistics: Some(vec!["chisq".into()]),
                ..Default::default()
            }
            .with_table(&[&["a"], &["b"], &["c"]]),
            &dict,
        );
        let entries = make_entries(&[
            &[1.0, 1.0, 5.0],
            &[1.0, 2.0, 5.0],
            &[1.0, 1.0, 6.0],
            &[1.0, 2.0, 6.0],
            &[2.0, 1.0, 6.0],
        ]);
        let mut sink = CollectingSink::new();
        output_crosstabulation(&plan, &plan.tables[0], &entries, &mut sink).unwrap();

        let t = sink.tables_titled("a × b × c").next().unwrap();
        assert_eq!(t.dimensions.len(), 4);
        // [stat, row, col, layer]
        assert_eq!(t.number(&[0, 0, 0, 0]), Some(1.0));
        // Row a=2 is empty in layer c=5, so general mode leaves it blank.
        assert_eq!(t.number(&[0, 1, 0, 0]), None);
        assert_eq!(t.number(&[0, 1, 0, 1]), Some(1.0));
        assert_eq!(t.number(&[0, 2, 2, 1]), Some(3.0));

        let chisq = sink.tables_titled(CHISQ_TITLE).next().unwrap();
        assert_eq!(chisq.dimensions.len(), 3);
        assert_eq!(chisq.number(&[5, 0, 0]), Some(2.0));
        assert_eq!(chisq.number(&[5, 0, 1]), Some(3.0));
        assert_eq!(chisq.number(&[0, 0, 0]), None);
        assert_eq!(chisq.number(&[0, 1, 1]), Some(1.0));
        let pearson = chisq.number(&[0, 0, 1]).unwrap();
        assert!((pearson - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_statistics_tables_and_risk_labels() {
        let dict = make_dict();
        let plan = make_plan(
            CrosstabsRequest {
                cells: Some(vec!["none".into()]),
                statistics: Some(vec!["all".into()]),
                ..Default::default()
            }
            .with_table(&[&["a"], &["c"]]),
            &dict,
        );
        let mut rows: Vec<[f64; 2]> = Vec::new();
        for (a, c, n) in [(1.0, 1.0, 10), (1.0, 2.0, 5), (2.0, 1.0, 3), (2.0, 2.0, 12)] {
            rows.extend(std::iter::repeat([a, c]).take(n));
        }
        let rows: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        let entries = make_entries(&rows);
        let mut sink = CollectingSink::new();
        output_crosstabulation(&plan, &plan.tables[0], &entries, &mut sink).unwrap();

        let titles: Vec<_> = sink.tables.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![CHISQ_TITLE, SYMMETRIC_TITLE, RISK_TITLE, DIRECTIONAL_TITLE]
        );

        let chisq = &sink.tables[0];
        let pearson = chisq.number(&[0, 0]).unwrap();
        assert!((pearson - 6.651583710407239).abs() < 1e-9);
        assert_eq!(chisq.number(&[0, 1]), Some(1.0));
        assert!(chisq.number(&[2, 3]).is_some());
        assert_eq!(chisq.number(&[2, 0]), None);

        let sym = &sink.tables[1];
        assert_eq!(sym.number(&[0, 9]), Some(30.0));
        let phi = sym.number(&[0, 0]).unwrap();
        assert!((phi - (6.651583710407239f64 / 30.0).sqrt()).abs() < 1e-9);

        let risk = &sink.tables[2];
        let labels: Vec<_> = risk
            .dimension(1)
            .unwrap()
            .leaves()
            .iter()
            .map(|c| c.label.clone())
            .collect();
        assert_eq!(
            labels,
            vec![
                "Odds Ratio for a (1 / 2)",
                "For cohort c = 1",
                "For cohort c = 2",
                N_VALID,
            ]
        );
        assert_eq!(risk.number(&[0, 0]), Some(8.0));
        assert_eq!(risk.number(&[0, 3]), Some(30.0));

        let direct = &sink.tables[3];
        let stats = direct.dimension(1).unwrap();
        assert_eq!(stats.n_leaves(), 13);
        assert_eq!(stats.find_leaf("a Dependent"), Some(1));
        assert_eq!(stats.root.children.len(), 3);
        assert_eq!(stats.root.children[0].children.len(), 3);
        assert!(sink.warnings().next().is_none());
    }

    #[test]
    fn test_risk_table_dropped_when_never_defined() {
        let dict = make_dict();
        let plan = make_plan(
            CrosstabsRequest {
                statistics: Some(vec!["risk".into()]),
                ..Default::default()
            }
            .with_table(&[&["a"], &["c"]]),
            &dict,
        );
        let entries = make_entries(&[&[1.0, 1.0], &[1.0, 2.0], &[1.0, 3.0], &[2.0, 1.0]]);
        let mut sink = CollectingSink::new();
        output_crosstabulation(&plan, &plan.tables[0], &entries, &mut sink).unwrap();
        assert!(sink.tables_titled(RISK_TITLE).next().is_none());
        assert!(sink.tables_titled("a × c").next().is_some());
    }
}
