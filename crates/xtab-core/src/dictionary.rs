use std::cell::Cell;
use std::rc::Rc;

use tracing::warn;

use crate::case::{Case, CaseProto};
use crate::error::{XtabError, XtabResult};
use crate::variable::{MvClass, Variable};

pub const INVALID_WEIGHT_WARNING: &str = "At least one case in the data had a weight value \
     that was user-missing, system-missing, zero, or negative.  These case(s) were ignored.";

/// A shared "warn at most once" latch.  Clones share the latch, so a warning
/// issued through one stream is not repeated by another stream derived from
/// the same input.
#[derive(Debug, Clone, Default)]
pub struct WarnOnce {
    fired: Rc<Cell<bool>>,
}

impl WarnOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time it is called on this latch.
    pub fn fire(&self) -> bool {
        !self.fired.replace(true)
    }

    pub fn has_fired(&self) -> bool {
        self.fired.get()
    }
}

/// The set of variables describing a case stream.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    vars: Vec<Variable>,
    weight: Option<usize>,
    splits: Vec<usize>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a variable, checking that its name is unique and that its case
    /// index is the next slot.
    pub fn add_var(&mut self, var: Variable) -> XtabResult<()> {
        if self.lookup_var(var.name()).is_some() {
            return Err(XtabError::Config(format!("duplicate variable {}", var.name())));
        }
        if var.case_index() != self.vars.len() {
            return Err(XtabError::Config(format!(
                "variable {} has case index {}, expected {}",
                var.name(),
                var.case_index(),
                self.vars.len()
            )));
        }
        self.vars.push(var);
        Ok(())
    }

    pub fn vars(&self) -> &[Variable] {
        &self.vars
    }

    pub fn var(&self, idx: usize) -> Option<&Variable> {
        self.vars.get(idx)
    }

    /// Case-insensitive lookup by name.
    pub fn lookup_var(&self, name: &str) -> Option<&Variable> {
        self.vars.iter().find(|v| v.name().eq_ignore_ascii_case(name))
    }

    pub fn proto(&self) -> CaseProto {
        CaseProto::new(self.vars.iter().map(Variable::width).collect::<Vec<_>>())
    }

    pub fn set_weight(&mut self, name: Option<&str>) -> XtabResult<()> {
        self.weight = match name {
            None => None,
            Some(n) => {
                let var = self
                    .lookup_var(n)
                    .ok_or_else(|| XtabError::UnknownVariable(n.to_string()))?;
                if !var.is_numeric() {
                    return Err(XtabError::Config(format!(
                        "weight variable {n} must be numeric"
                    )));
                }
                Some(var.case_index())
            }
        };
        Ok(())
    }

    pub fn weight(&self) -> Option<&Variable> {
        self.weight.and_then(|i| self.vars.get(i))
    }

    pub fn set_splits(&mut self, names: &[&str]) -> XtabResult<()> {
        let mut splits = Vec::with_capacity(names.len());
        for n in names {
            let var = self
                .lookup_var(n)
                .ok_or_else(|| XtabError::UnknownVariable(n.to_string()))?;
            splits.push(var.case_index());
        }
        self.splits = splits;
        Ok(())
    }

    pub fn splits(&self) -> Vec<&Variable> {
        self.splits.iter().filter_map(|i| self.vars.get(*i)).collect()
    }

    /// The case's weight: 1.0 without a weight variable.  A weight that is
    /// missing, zero or negative yields 0.0, warning once through `warn_once`.
    pub fn case_weight(&self, case: &Case, warn_once: &WarnOnce) -> f64 {
        let Some(wv) = self.weight() else {
            return 1.0;
        };
        let w = case.num(wv.case_index()).unwrap_or(crate::value::SYSMIS);
        if w <= 0.0 || wv.is_num_missing(w, MvClass::Any) {
            if warn_once.fire() {
                warn!("{INVALID_WEIGHT_WARNING}");
            }
            0.0
        } else {
            w
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn make_dict() -> Dictionary {
        let mut d = Dictionary::new();
        d.add_var(Variable::numeric("a", 0)).unwrap();
        d.add_var(Variable::string("b", 1, 4)).unwrap();
        d.add_var(Variable::numeric("w", 2)).unwrap();
        d
    }

    #[test]
    fn test_lookup_case_insensitive() {
        let d = make_dict();
        assert_eq!(d.lookup_var("B").unwrap().width(), 4);
        assert!(d.lookup_var("zzz").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut d = make_dict();
        assert!(d.add_var(Variable::numeric("A", 3)).is_err());
    }

    #[test]
    fn test_proto() {
        assert_eq!(make_dict().proto().widths(), &[0, 4, 0]);
    }

    #[test]
    fn test_string_weight_rejected() {
        let mut d = make_dict();
        assert!(d.set_weight(Some("b")).is_err());
    }

    #[test]
    fn test_case_weight_warns_once() {
        let mut d = make_dict();
        d.set_weight(Some("w")).unwrap();
        let warn = WarnOnce::new();
        let row = |w: f64| {
            Case::new(vec![Value::Number(1.0), Value::string("x", 4), Value::Number(w)])
        };
        assert_eq!(d.case_weight(&row(2.5), &warn), 2.5);
        assert!(!warn.has_fired());
        assert_eq!(d.case_weight(&row(-1.0), &warn), 0.0);
        assert!(warn.has_fired());
        assert!(!warn.fire());
        assert_eq!(d.case_weight(&row(crate::value::SYSMIS), &warn), 0.0);
    }

    #[test]
    fn test_unweighted_is_one() {
        let d = make_dict();
        let c = Case::new(vec![Value::Number(1.0), Value::string("x", 4), Value::Number(7.0)]);
        assert_eq!(d.case_weight(&c, &WarnOnce::new()), 1.0);
    }
}
