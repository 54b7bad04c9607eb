//! Partitioning a stream into runs of consecutive cases with equal keys.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;
use xtab_core::{Case, CaseProto, Dictionary, XtabResult};

use crate::reader::{CaseReader, CaseSource};
use crate::taint::Taint;

type SameGroup = Rc<dyn Fn(&Case, &Case) -> bool>;

/// Reads the parent only while the next case belongs to `key`'s group.
struct GroupSource {
    parent: Rc<RefCell<CaseReader>>,
    key: Case,
    same_group: SameGroup,
}

impl CaseSource for GroupSource {
    fn read(&mut self) -> XtabResult<Option<Case>> {
        let mut parent = self.parent.borrow_mut();
        match parent.peek(0) {
            Some(next) if (self.same_group)(&self.key, &next) => Ok(parent.read()),
            _ => Ok(None),
        }
    }
}

/// Splits a reader into groups.  The input must already be ordered so that
/// each group's cases are contiguous.
pub struct CaseGrouper {
    parent: Rc<RefCell<CaseReader>>,
    proto: CaseProto,
    taint: Taint,
    same_group: SameGroup,
    current: Option<Case>,
    n_groups: usize,
}

impl CaseGrouper {
    pub fn new<F>(reader: CaseReader, same_group: F) -> Self
    where
        F: Fn(&Case, &Case) -> bool + 'static,
    {
        Self {
            proto: reader.proto().clone(),
            taint: reader.taint(),
            parent: Rc::new(RefCell::new(reader)),
            same_group: Rc::new(same_group),
            current: None,
            n_groups: 0,
        }
    }

    /// Groups by equal values in the given case slots.  With no slots the
    /// whole stream is one group.
    pub fn by_vars(reader: CaseReader, case_indexes: Vec<usize>) -> Self {
        Self::new(reader, move |a, b| {
            case_indexes.iter().all(|i| a.get(*i) == b.get(*i))
        })
    }

    /// Groups by the dictionary's split variables.
    pub fn splits(reader: CaseReader, dict: &Dictionary) -> Self {
        let indexes = dict.splits().iter().map(|v| v.case_index()).collect();
        Self::by_vars(reader, indexes)
    }

    /// The next group, skipping whatever the caller left unread of the
    /// previous one.
    pub fn next_group(&mut self) -> Option<CaseReader> {
        let mut parent = self.parent.borrow_mut();
        if let Some(prev) = self.current.take() {
            while parent
                .peek(0)
                .is_some_and(|next| (self.same_group)(&prev, &next))
            {
                parent.read();
            }
        }
        let first = parent.peek(0)?;
        self.current = Some(first.clone());
        self.n_groups += 1;
        debug!(group = self.n_groups, "starting case group");
        let source = GroupSource {
            parent: Rc::clone(&self.parent),
            key: first,
            same_group: Rc::clone(&self.same_group),
        };
        Some(CaseReader::derived(
            self.proto.clone(),
            Box::new(source),
            self.taint.clone(),
        ))
    }

    /// Consumes the grouper.  Returns false if the input or any stream
    /// derived from it was tainted.
    pub fn finish(self) -> bool {
        !self.taint.is_tainted()
    }
}
