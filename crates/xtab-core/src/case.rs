use std::rc::Rc;

use crate::error::{XtabError, XtabResult};
use crate::value::Value;

// ---------------------------------------------------------------------------
// CaseProto
// ---------------------------------------------------------------------------

/// The shape of a case: one width per slot (0 = numeric, >0 = string bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseProto {
    widths: Rc<[usize]>,
}

impl CaseProto {
    pub fn new(widths: impl Into<Vec<usize>>) -> Self {
        Self {
            widths: widths.into().into(),
        }
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    pub fn width(&self, idx: usize) -> Option<usize> {
        self.widths.get(idx).copied()
    }

    pub fn widths(&self) -> &[usize] {
        &self.widths
    }

    /// True if `values` has this prototype's arity and per-slot widths.
    pub fn conforms(&self, values: &[Value]) -> bool {
        values.len() == self.widths.len()
            && values.iter().zip(self.widths.iter()).all(|(v, w)| v.width() == *w)
    }
}

// ---------------------------------------------------------------------------
// Case
// ---------------------------------------------------------------------------

/// A reference-counted tuple of values.  Cloning shares the data; mutation
/// goes through [`Case::unshare`], which copies when the data is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    values: Rc<Vec<Value>>,
}

impl Case {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values: Rc::new(values),
        }
    }

    /// Builds a case, checking it against `proto`.
    pub fn with_proto(proto: &CaseProto, values: Vec<Value>) -> XtabResult<Self> {
        if !proto.conforms(&values) {
            return Err(XtabError::Internal(format!(
                "case with {} values does not match prototype of {} slots",
                values.len(),
                proto.len()
            )));
        }
        Ok(Self::new(values))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Numeric value at `idx`, or `None` for strings and out-of-range slots.
    pub fn num(&self, idx: usize) -> Option<f64> {
        self.values.get(idx).and_then(Value::as_number)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of live references to this case's data.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.values)
    }

    pub fn is_shared(&self) -> bool {
        self.ref_count() > 1
    }

    /// Exclusive access to the values, copying them first if shared.
    pub fn unshare(&mut self) -> &mut [Value] {
        Rc::make_mut(&mut self.values).as_mut_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares() {
        let a = Case::new(vec![Value::Number(1.0)]);
        let b = a.clone();
        assert!(a.is_shared());
        assert_eq!(b.ref_count(), 2);
    }

    #[test]
    fn test_unshare_copies_on_write() {
        let a = Case::new(vec![Value::Number(1.0), Value::string("x", 2)]);
        let mut b = a.clone();
        b.unshare()[0] = Value::Number(9.0);
        assert_eq!(a.num(0), Some(1.0));
        assert_eq!(b.num(0), Some(9.0));
        assert!(!a.is_shared());
        assert!(!b.is_shared());
    }

    #[test]
    fn test_with_proto_checks_widths() {
        let proto = CaseProto::new(vec![0, 3]);
        assert!(Case::with_proto(&proto, vec![Value::Number(1.0), Value::string("a", 3)]).is_ok());
        assert!(Case::with_proto(&proto, vec![Value::Number(1.0), Value::string("a", 2)]).is_err());
        assert!(Case::with_proto(&proto, vec![Value::Number(1.0)]).is_err());
    }
}
