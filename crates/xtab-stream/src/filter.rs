use tracing::debug;
use xtab_core::{Case, Dictionary, MvClass, Variable, WarnOnce, XtabResult};

use crate::reader::{CaseReader, CaseSource};

struct FilterSource<P> {
    inner: CaseReader,
    keep: P,
}

impl<P> CaseSource for FilterSource<P>
where
    P: FnMut(&Case) -> bool,
{
    fn read(&mut self) -> XtabResult<Option<Case>> {
        while let Some(case) = self.inner.read() {
            if (self.keep)(&case) {
                return Ok(Some(case));
            }
        }
        Ok(None)
    }
}

impl CaseReader {
    /// Drops cases for which `keep` returns false.  The result shares this
    /// reader's taint.
    pub fn filter_cases<P>(self, keep: P) -> CaseReader
    where
        P: FnMut(&Case) -> bool + 'static,
    {
        let proto = self.proto().clone();
        let taint = self.taint();
        CaseReader::derived(proto, Box::new(FilterSource { inner: self, keep }), taint)
    }

    /// Drops cases whose weight is missing, zero or negative, warning once
    /// through `warn`.  Without a weight variable this is the identity.
    pub fn filter_weight(self, dict: &Dictionary, warn: &WarnOnce) -> CaseReader {
        if dict.weight().is_none() {
            return self;
        }
        let dict = dict.clone();
        let warn = warn.clone();
        self.filter_cases(move |case| dict.case_weight(case, &warn) > 0.0)
    }

    /// Drops cases in which any of `vars` is missing under `class`.
    pub fn filter_missing(self, vars: &[Variable], class: MvClass) -> CaseReader {
        if class == MvClass::Never || vars.is_empty() {
            return self;
        }
        debug!(n_vars = vars.len(), ?class, "filtering missing values");
        let vars = vars.to_vec();
        self.filter_cases(move |case| {
            vars.iter().all(|v| {
                case.get(v.case_index())
                    .is_some_and(|value| !v.is_value_missing(value, class))
            })
        })
    }
}
