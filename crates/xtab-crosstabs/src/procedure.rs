//! The CROSSTABS pass: weight filtering, split groups, accumulation, and
//! output once each group has been read.

use tracing::{debug, error, info};
use xtab_core::{
    Case, Dictionary, Message, OutputSink, WarnOnce, XtabResult, INVALID_WEIGHT_WARNING,
};
use xtab_stream::{CaseGrouper, CaseReader};

use crate::accumulator::FreqTable;
use crate::output::{output_crosstabulation, split_table, summary_table, SummaryRow};
use crate::request::{CountMode, CrosstabsRequest, Mode, Plan, TableSpec};

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Success,
    /// The command itself failed; nothing useful was produced.
    Failure,
    /// The input stream failed part way.  Tables for the data read so far
    /// were still emitted.
    CascadingFailure,
}

/// Plans `request` against `dict` and runs it.  A request that does not plan
/// is reported to `sink` and no case is read.
pub fn crosstabs(
    dict: &Dictionary,
    reader: CaseReader,
    request: &CrosstabsRequest,
    sink: &mut dyn OutputSink,
) -> CommandResult {
    match request.plan(dict) {
        Ok(plan) => run_crosstabs(dict, reader, &plan, sink),
        Err(e) => {
            error!("CROSSTABS: {e}");
            sink.message(Message::error(e.to_string()));
            CommandResult::Failure
        }
    }
}

pub fn run_crosstabs(
    dict: &Dictionary,
    reader: CaseReader,
    plan: &Plan,
    sink: &mut dyn OutputSink,
) -> CommandResult {
    for w in &plan.warnings {
        sink.message(Message::warning(w.as_str()));
    }
    info!(n_tables = plan.tables.len(), "CROSSTABS started");

    let warn_once = WarnOnce::new();
    let reader = reader.filter_weight(dict, &warn_once);
    let mut grouper = CaseGrouper::splits(reader, dict);
    let mut result = Ok(());
    while let Some(group) = grouper.next_group() {
        result = run_group(dict, group, plan, &warn_once, sink);
        if result.is_err() {
            break;
        }
    }

    if warn_once.has_fired() {
        sink.message(Message::warning(INVALID_WEIGHT_WARNING));
    }
    let ok = grouper.finish();
    match result {
        Err(e) => {
            error!("CROSSTABS failed: {e}");
            sink.message(Message::error(e.to_string()));
            CommandResult::Failure
        }
        Ok(()) if !ok => {
            error!("CROSSTABS input stream failed");
            CommandResult::CascadingFailure
        }
        Ok(()) => {
            info!("CROSSTABS finished");
            CommandResult::Success
        }
    }
}

/// Accumulation state for one requested table within a split group.
struct Tabulation<'a> {
    spec: &'a TableSpec,
    freq: FreqTable,
    missing: f64,
}

impl<'a> Tabulation<'a> {
    fn new(spec: &'a TableSpec, mode: Mode) -> Self {
        let indexes = spec.vars.iter().map(|v| v.case_index()).collect();
        Self {
            spec,
            freq: FreqTable::new(indexes, mode == Mode::Integer),
            missing: 0.0,
        }
    }

    /// True if no tabulated value is excluded as missing and, in integer
    /// mode, every value lies inside its range.
    fn should_tabulate(&self, case: &Case, plan: &Plan) -> bool {
        let exclude = plan.exclude();
        self.spec.vars.iter().all(|var| {
            let Some(value) = case.get(var.case_index()) else {
                return false;
            };
            if var.is_value_missing(value, exclude) {
                return false;
            }
            match (plan.range_of(var), value.as_number()) {
                (Some(range), Some(x)) => range.contains(x),
                (Some(_), None) => false,
                (None, _) => true,
            }
        })
    }
}

fn run_group(
    dict: &Dictionary,
    mut group: CaseReader,
    plan: &Plan,
    warn_once: &WarnOnce,
    sink: &mut dyn OutputSink,
) -> XtabResult<()> {
    let splits = dict.splits();
    if !splits.is_empty() {
        if let Some(first) = group.peek(0) {
            sink.submit(split_table(&splits, &first)?);
        }
    }

    let mut tabs: Vec<Tabulation> = plan
        .tables
        .iter()
        .map(|spec| Tabulation::new(spec, plan.mode))
        .collect();
    let mut n_cases = 0usize;
    while let Some(case) = group.read() {
        n_cases += 1;
        let mut weight = dict.case_weight(&case, warn_once);
        if plan.count_mode == CountMode::Case {
            weight = plan.rounding.apply(weight);
            if weight == 0.0 {
                continue;
            }
        }
        for tab in &mut tabs {
            if tab.should_tabulate(&case, plan) {
                tab.freq.accumulate(&case, weight)?;
            } else {
                tab.missing += weight;
            }
        }
    }
    debug!(n_cases, "split group read");

    postcalc(plan, tabs, sink)
}

/// Rounds cells if asked, sorts, and emits the summary followed by each
/// table's output.
fn postcalc(plan: &Plan, tabs: Vec<Tabulation>, sink: &mut dyn OutputSink) -> XtabResult<()> {
    let mut sorted = Vec::with_capacity(tabs.len());
    for mut tab in tabs {
        if plan.count_mode == CountMode::Cell {
            tab.freq.round_cells(plan.rounding);
        }
        let entries = tab.freq.into_sorted_entries(plan.descending);
        sorted.push((tab.spec, entries, tab.missing));
    }

    let rows: Vec<SummaryRow> = sorted
        .iter()
        .map(|(spec, entries, missing)| SummaryRow {
            name: spec.name(),
            valid: entries.iter().map(|e| e.count).sum(),
            missing: *missing,
        })
        .collect();
    sink.submit(summary_table(&rows)?);

    for (spec, entries, _) in &sorted {
        output_crosstabulation(plan, spec, entries, sink)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use xtab_core::{CaseProto, CollectingSink, Severity, Value, Variable, XtabError, SYSMIS};

    use super::*;
    use crate::output::SUMMARY_TITLE;

    fn make_dict() -> Dictionary {
        let mut dict = Dictionary::new();
        dict.add_var(Variable::numeric("a", 0)).unwrap();
        dict.add_var(Variable::numeric("b", 1)).unwrap();
        dict.add_var(Variable::numeric("w", 2)).unwrap();
        dict
    }

    fn make_reader(rows: &[[f64; 3]]) -> CaseReader {
        let cases = rows
            .iter()
            .map(|r| Case::new(r.iter().map(|v| Value::Number(*v)).collect()))
            .collect();
        CaseReader::from_cases(CaseProto::new(vec![0, 0, 0]), cases)
    }

    fn request() -> CrosstabsRequest {
        CrosstabsRequest::default().with_table(&[&["a"], &["b"]])
    }

    #[test]
    fn test_plan_error_is_failure() {
        let dict = make_dict();
        let mut sink = CollectingSink::new();
        let req = CrosstabsRequest::default().with_table(&[&["a"], &["nope"]]);
        let r = crosstabs(&dict, make_reader(&[]), &req, &mut sink);
        assert_eq!(r, CommandResult::Failure);
        assert!(sink.tables.is_empty());
        assert_eq!(sink.messages[0].severity, Severity::Error);
    }

    #[test]
    fn test_summary_counts_missing() {
        let dict = make_dict();
        let mut sink = CollectingSink::new();
        let rows = [
            [1.0, 1.0, 0.0],
            [1.0, SYSMIS, 0.0],
            [2.0, 2.0, 0.0],
        ];
        let r = crosstabs(&dict, make_reader(&rows), &request(), &mut sink);
        assert_eq!(r, CommandResult::Success);
        let summary = sink.tables_titled(SUMMARY_TITLE).next().unwrap();
        assert_eq!(summary.number(&[0, 0, 0]), Some(2.0));
        assert_eq!(summary.number(&[0, 1, 0]), Some(1.0));
        assert_eq!(summary.number(&[0, 2, 0]), Some(3.0));
    }

    #[test]
    fn test_weights_and_invalid_weight_warning() {
        let mut dict = make_dict();
        dict.set_weight(Some("w")).unwrap();
        let mut sink = CollectingSink::new();
        let rows = [[1.0, 1.0, 2.5], [1.0, 1.0, -1.0], [2.0, 1.0, 0.0]];
        let r = crosstabs(&dict, make_reader(&rows), &request(), &mut sink);
        assert_eq!(r, CommandResult::Success);

        let t = sink.tables_titled("a × b").next().unwrap();
        assert_eq!(t.number(&[0, 0, 0]), Some(2.5));
        let warnings: Vec<_> = sink.warnings().map(|m| m.text.as_str()).collect();
        assert_eq!(warnings, vec![INVALID_WEIGHT_WARNING]);
    }

    #[test]
    fn test_case_rounding_skips_zero_weights() {
        let mut dict = make_dict();
        dict.set_weight(Some("w")).unwrap();
        let mut sink = CollectingSink::new();
        let mut req = request();
        req.count.mode = CountMode::Case;
        let rows = [[1.0, 1.0, 0.4], [1.0, 1.0, 1.6], [2.0, 2.0, 1.0]];
        crosstabs(&dict, make_reader(&rows), &req, &mut sink);

        let summary = sink.tables_titled(SUMMARY_TITLE).next().unwrap();
        assert_eq!(summary.number(&[0, 0, 0]), Some(3.0));
        assert_eq!(summary.number(&[0, 1, 0]), Some(0.0));
        let t = sink.tables_titled("a × b").next().unwrap();
        assert_eq!(t.number(&[0, 0, 0]), Some(2.0));
    }

    #[test]
    fn test_integer_mode_range_and_truncation() {
        let dict = make_dict();
        let mut sink = CollectingSink::new();
        let req = CrosstabsRequest::from_toml(
            r#"
            [[variables]]
            names = ["a"]
            min = 1
            max = 3

            [[variables]]
            names = ["b"]
            min = 1
            max = 2

            [[tables]]
            by = [["a"], ["b"]]
            "#,
        )
        .unwrap();
        let rows = [[1.7, 1.0, 0.0], [2.9, 2.2, 0.0], [4.0, 1.0, 0.0], [0.5, 1.0, 0.0]];
        crosstabs(&dict, make_reader(&rows), &req, &mut sink);

        let summary = sink.tables_titled(SUMMARY_TITLE).next().unwrap();
        assert_eq!(summary.number(&[0, 0, 0]), Some(2.0));
        assert_eq!(summary.number(&[0, 1, 0]), Some(2.0));
        let t = sink.tables_titled("a × b").next().unwrap();
        assert_eq!(t.number(&[0, 0, 0]), Some(1.0));
        assert_eq!(t.number(&[0, 1, 1]), Some(1.0));
        // a = 3 has no cases but is part of the declared range.
        assert_eq!(t.number(&[0, 2, 0]), Some(0.0));
        assert_eq!(t.number(&[0, 3, 2]), Some(2.0));
    }

    #[test]
    fn test_split_groups_each_get_output() {
        let mut dict = make_dict();
        dict.set_splits(&["w"]).unwrap();
        let mut sink = CollectingSink::new();
        let rows = [[1.0, 1.0, 1.0], [2.0, 1.0, 1.0], [1.0, 2.0, 2.0]];
        let r = crosstabs(&dict, make_reader(&rows), &request(), &mut sink);
        assert_eq!(r, CommandResult::Success);

        let titles: Vec<_> = sink.tables.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Split File", "Summary", "a × b", "Split File", "Summary", "a × b"]
        );
    }

    #[test]
    fn test_source_error_is_cascading_failure() {
        let dict = make_dict();
        let mut n = 0;
        let reader = CaseReader::from_fn(CaseProto::new(vec![0, 0, 0]), move || {
            n += 1;
            match n {
                1 | 2 => Ok(Some(Case::new(vec![
                    Value::Number(1.0),
                    Value::Number(n as f64),
                    Value::Number(0.0),
                ]))),
                _ => Err(XtabError::Io("disk gone".into())),
            }
        });
        let mut sink = CollectingSink::new();
        let r = crosstabs(&dict, reader, &request(), &mut sink);
        assert_eq!(r, CommandResult::CascadingFailure);
        let summary = sink.tables_titled(SUMMARY_TITLE).next().unwrap();
        assert_eq!(summary.number(&[0, 0, 0]), Some(2.0));
    }

    #[test]
    fn test_report_in_general_mode_warns() {
        let dict = make_dict();
        let mut sink = CollectingSink::new();
        let mut req = request();
        req.missing = crate::request::MissingPolicy::Report;
        crosstabs(&dict, make_reader(&[[1.0, 1.0, 0.0]]), &req, &mut sink);
        let first = sink.warnings().next().unwrap();
        assert!(first.text.starts_with("Missing mode REPORT not allowed"));
    }
}
