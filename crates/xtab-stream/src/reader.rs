//! Pull-based case readers.
//!
//! A [`CaseReader`] wraps a [`CaseSource`] and adds lookahead, forking and a
//! shared [`Taint`].  Sources that cannot fork themselves are forked through a
//! shared buffer: every cursor pulls from the same upstream and the buffer only
//! retains cases that some live cursor has not read yet.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use tracing::{debug, error};
use xtab_core::{Case, CaseProto, XtabError, XtabResult};

use crate::taint::Taint;

/// Something that produces cases.  `Ok(None)` means end of stream.
pub trait CaseSource {
    fn read(&mut self) -> XtabResult<Option<Case>>;

    /// An independent cursor at the current position, if the source can
    /// provide one without buffering.
    fn fork(&self) -> Option<Box<dyn CaseSource>> {
        None
    }
}

// ---------------------------------------------------------------------------
// Built-in sources
// ---------------------------------------------------------------------------

struct EmptySource;

impl CaseSource for EmptySource {
    fn read(&mut self) -> XtabResult<Option<Case>> {
        Ok(None)
    }

    fn fork(&self) -> Option<Box<dyn CaseSource>> {
        Some(Box::new(EmptySource))
    }
}

/// Cases held in memory.  Forks share the slice.
struct MemorySource {
    cases: Rc<[Case]>,
    pos: usize,
}

impl CaseSource for MemorySource {
    fn read(&mut self) -> XtabResult<Option<Case>> {
        let case = self.cases.get(self.pos).cloned();
        if case.is_some() {
            self.pos += 1;
        }
        Ok(case)
    }

    fn fork(&self) -> Option<Box<dyn CaseSource>> {
        Some(Box::new(MemorySource {
            cases: Rc::clone(&self.cases),
            pos: self.pos,
        }))
    }
}

struct FnSource<F> {
    next: F,
}

impl<F> CaseSource for FnSource<F>
where
    F: FnMut() -> XtabResult<Option<Case>>,
{
    fn read(&mut self) -> XtabResult<Option<Case>> {
        (self.next)()
    }
}

// ---------------------------------------------------------------------------
// Shared buffer for forking non-clonable sources
// ---------------------------------------------------------------------------

struct SharedBuffer {
    upstream: Box<dyn CaseSource>,
    buffer: VecDeque<Case>,
    /// Absolute stream position of `buffer[0]`.
    offset: usize,
    /// Absolute position of each live cursor, keyed by cursor id.
    cursors: HashMap<usize, usize>,
    next_id: usize,
    eof: bool,
    failure: Option<String>,
}

impl SharedBuffer {
    fn read_at(&mut self, pos: usize) -> XtabResult<Option<Case>> {
        if let Some(case) = pos
            .checked_sub(self.offset)
            .and_then(|rel| self.buffer.get(rel))
        {
            return Ok(Some(case.clone()));
        }
        if let Some(msg) = &self.failure {
            return Err(XtabError::Io(msg.clone()));
        }
        if self.eof {
            return Ok(None);
        }
        match self.upstream.read() {
            Ok(Some(case)) => {
                self.buffer.push_back(case.clone());
                Ok(Some(case))
            }
            Ok(None) => {
                self.eof = true;
                Ok(None)
            }
            Err(e) => {
                self.failure = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Drops buffered cases that every live cursor has passed.
    fn trim(&mut self) {
        match self.cursors.values().min().copied() {
            Some(min) => {
                while self.offset < min && self.buffer.pop_front().is_some() {
                    self.offset += 1;
                }
            }
            None => self.buffer.clear(),
        }
    }

    fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Registers a cursor at `pos` and returns its id.
    fn add_cursor(&mut self, pos: usize) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.cursors.insert(id, pos);
        id
    }
}

struct ShimCursor {
    shared: Rc<RefCell<SharedBuffer>>,
    id: usize,
}

impl ShimCursor {
    /// Wraps `upstream` in a shared buffer and returns two cursors at its
    /// current position.
    fn pair(upstream: Box<dyn CaseSource>) -> (Self, Self) {
        let mut buffer = SharedBuffer {
            upstream,
            buffer: VecDeque::new(),
            offset: 0,
            cursors: HashMap::new(),
            next_id: 0,
            eof: false,
            failure: None,
        };
        let (first, second) = (buffer.add_cursor(0), buffer.add_cursor(0));
        let shared = Rc::new(RefCell::new(buffer));
        (
            Self {
                shared: Rc::clone(&shared),
                id: first,
            },
            Self { shared, id: second },
        )
    }
}

impl CaseSource for ShimCursor {
    fn read(&mut self) -> XtabResult<Option<Case>> {
        let mut shared = self.shared.borrow_mut();
        let pos = shared
            .cursors
            .get(&self.id)
            .copied()
            .ok_or_else(|| XtabError::Internal(format!("stale stream cursor {}", self.id)))?;
        let case = shared.read_at(pos)?;
        if case.is_some() {
            shared.cursors.insert(self.id, pos + 1);
            shared.trim();
        }
        Ok(case)
    }

    fn fork(&self) -> Option<Box<dyn CaseSource>> {
        let mut shared = self.shared.borrow_mut();
        let pos = shared.cursors.get(&self.id).copied()?;
        let id = shared.add_cursor(pos);
        Some(Box::new(ShimCursor {
            shared: Rc::clone(&self.shared),
            id,
        }))
    }
}

impl Drop for ShimCursor {
    fn drop(&mut self) {
        if let Ok(mut shared) = self.shared.try_borrow_mut() {
            shared.cursors.remove(&self.id);
            shared.trim();
        }
    }
}

// ---------------------------------------------------------------------------
// CaseReader
// ---------------------------------------------------------------------------

/// A sequence of cases read one at a time.
///
/// `read` never fails: a source error taints the reader and ends the stream.
/// Poll [`CaseReader::error`] (or a [`Taint`] handle) when done.
pub struct CaseReader {
    proto: CaseProto,
    source: Box<dyn CaseSource>,
    lookahead: VecDeque<Case>,
    taint: Taint,
    exhausted: bool,
    fork_buffer: Option<Rc<RefCell<SharedBuffer>>>,
}

impl CaseReader {
    pub fn new(proto: CaseProto, source: impl CaseSource + 'static) -> Self {
        Self::derived(proto, Box::new(source), Taint::new())
    }

    /// A reader sharing `taint` with the stream it was derived from.
    pub(crate) fn derived(proto: CaseProto, source: Box<dyn CaseSource>, taint: Taint) -> Self {
        Self {
            proto,
            source,
            lookahead: VecDeque::new(),
            taint,
            exhausted: false,
            fork_buffer: None,
        }
    }

    pub fn empty(proto: CaseProto) -> Self {
        Self::new(proto, EmptySource)
    }

    /// A clonable reader over cases already in memory.
    pub fn from_cases(proto: CaseProto, cases: Vec<Case>) -> Self {
        Self::new(
            proto,
            MemorySource {
                cases: cases.into(),
                pos: 0,
            },
        )
    }

    pub(crate) fn from_cases_tainted(proto: CaseProto, cases: Vec<Case>, taint: Taint) -> Self {
        let source = MemorySource {
            cases: cases.into(),
            pos: 0,
        };
        Self::derived(proto, Box::new(source), taint)
    }

    /// A lazy reader driven by `next`.  It cannot fork natively, so forking
    /// it buffers.
    pub fn from_fn<F>(proto: CaseProto, next: F) -> Self
    where
        F: FnMut() -> XtabResult<Option<Case>> + 'static,
    {
        Self::new(proto, FnSource { next })
    }

    pub fn proto(&self) -> &CaseProto {
        &self.proto
    }

    /// A handle on this stream's taint, shared with every derived stream.
    pub fn taint(&self) -> Taint {
        self.taint.clone()
    }

    pub fn error(&self) -> bool {
        self.taint.is_tainted()
    }

    fn pull(&mut self) -> Option<Case> {
        if self.exhausted {
            return None;
        }
        match self.source.read() {
            Ok(Some(case)) => Some(case),
            Ok(None) => {
                self.exhausted = true;
                None
            }
            Err(e) => {
                error!("case source failed: {e}");
                self.taint.set();
                self.exhausted = true;
                None
            }
        }
    }

    /// The next case, or `None` at end of stream or after an error.
    pub fn read(&mut self) -> Option<Case> {
        self.lookahead.pop_front().or_else(|| self.pull())
    }

    /// The case `n` positions ahead, without consuming anything.
    pub fn peek(&mut self, n: usize) -> Option<Case> {
        while self.lookahead.len() <= n {
            let case = self.pull()?;
            self.lookahead.push_back(case);
        }
        self.lookahead.get(n).cloned()
    }

    pub fn is_empty(&mut self) -> bool {
        self.peek(0).is_none()
    }

    /// An independent reader over the rest of this stream.  Neither reader's
    /// position affects the other's; buffered data is freed once every reader
    /// has passed it.
    pub fn fork(&mut self) -> CaseReader {
        let source = match self.source.fork() {
            Some(source) => source,
            None => {
                let upstream = std::mem::replace(&mut self.source, Box::new(EmptySource));
                let (mine, theirs) = ShimCursor::pair(upstream);
                self.fork_buffer = Some(Rc::clone(&mine.shared));
                self.source = Box::new(mine);
                debug!("buffering non-clonable stream for fork");
                Box::new(theirs)
            }
        };
        CaseReader {
            proto: self.proto.clone(),
            source,
            lookahead: self.lookahead.clone(),
            taint: self.taint.clone(),
            exhausted: self.exhausted,
            fork_buffer: self.fork_buffer.clone(),
        }
    }

    /// Number of cases remaining, counted on a fork.
    pub fn count_cases(&mut self) -> usize {
        self.fork().count()
    }

    /// Cases held in this reader's fork buffer, if it has one.
    pub fn buffered_cases(&self) -> usize {
        self.fork_buffer
            .as_ref()
            .map_or(0, |shared| shared.borrow().buffered())
    }

    /// Reads everything that is left.
    pub fn into_cases(mut self) -> Vec<Case> {
        let mut out = Vec::new();
        while let Some(case) = self.read() {
            out.push(case);
        }
        out
    }
}

impl Iterator for CaseReader {
    type Item = Case;

    fn next(&mut self) -> Option<Case> {
        self.read()
    }
}

impl std::fmt::Debug for CaseReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseReader")
            .field("width", &self.proto.len())
            .field("lookahead", &self.lookahead.len())
            .field("exhausted", &self.exhausted)
            .field("tainted", &self.taint.is_tainted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use xtab_core::Value;

    use super::*;

    fn make_case(x: f64) -> Case {
        Case::new(vec![Value::Number(x)])
    }

    fn proto() -> CaseProto {
        CaseProto::new(vec![0])
    }

    fn make_reader(n: usize) -> CaseReader {
        CaseReader::from_cases(proto(), (0..n).map(|i| make_case(i as f64)).collect())
    }

    /// A non-clonable reader over 0..n that counts upstream pulls.
    fn make_lazy(n: usize, pulls: Rc<Cell<usize>>) -> CaseReader {
        let mut i = 0;
        CaseReader::from_fn(proto(), move || {
            if i == n {
                return Ok(None);
            }
            pulls.set(pulls.get() + 1);
            i += 1;
            Ok(Some(make_case((i - 1) as f64)))
        })
    }

    fn nums(r: CaseReader) -> Vec<f64> {
        r.filter_map(|c| c.num(0)).collect()
    }

    #[test]
    fn test_read_in_order() {
        assert_eq!(nums(make_reader(4)), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut r = make_reader(3);
        assert_eq!(r.peek(1).and_then(|c| c.num(0)), Some(1.0));
        assert_eq!(r.peek(0).and_then(|c| c.num(0)), Some(0.0));
        assert!(r.peek(5).is_none());
        assert!(!r.is_empty());
        assert_eq!(nums(r), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_empty() {
        let mut r = CaseReader::empty(proto());
        assert!(r.is_empty());
        assert!(r.read().is_none());
        assert!(!r.error());
    }

    #[test]
    fn test_fork_memory_is_independent() {
        let mut a = make_reader(3);
        a.read();
        let mut b = a.fork();
        assert_eq!(a.read().and_then(|c| c.num(0)), Some(1.0));
        assert_eq!(a.read().and_then(|c| c.num(0)), Some(2.0));
        assert_eq!(nums(b.fork()), vec![1.0, 2.0]);
        assert_eq!(b.read().and_then(|c| c.num(0)), Some(1.0));
        assert_eq!(a.buffered_cases(), 0);
    }

    #[test]
    fn test_fork_lazy_pulls_once() {
        let pulls = Rc::new(Cell::new(0));
        let mut a = make_lazy(4, Rc::clone(&pulls));
        let mut b = a.fork();
        assert_eq!(a.read().and_then(|c| c.num(0)), Some(0.0));
        assert_eq!(a.read().and_then(|c| c.num(0)), Some(1.0));
        assert_eq!(b.read().and_then(|c| c.num(0)), Some(0.0));
        assert_eq!(nums(a), vec![2.0, 3.0]);
        assert_eq!(nums(b), vec![1.0, 2.0, 3.0]);
        assert_eq!(pulls.get(), 4);
    }

    #[test]
    fn test_shared_buffer_trims_consumed_cases() {
        let pulls = Rc::new(Cell::new(0));
        let mut a = make_lazy(5, pulls);
        let mut b = a.fork();
        for _ in 0..3 {
            a.read();
        }
        assert_eq!(a.buffered_cases(), 3);
        b.read();
        b.read();
        assert_eq!(a.buffered_cases(), 1);
        drop(b);
        assert_eq!(a.buffered_cases(), 0);
    }

    #[test]
    fn test_dropped_forks_release_cursors() {
        let mut a = make_lazy(4, Rc::new(Cell::new(0)));
        let b = a.fork();
        for _ in 0..50 {
            let mut c = a.fork();
            c.read();
        }
        let live = |r: &CaseReader| r.fork_buffer.as_ref().map(|s| s.borrow().cursors.len());
        assert_eq!(live(&a), Some(2));
        drop(b);
        assert_eq!(live(&a), Some(1));
        // Case 0 is still unread by `a`.
        assert_eq!(a.buffered_cases(), 1);
        assert_eq!(nums(a), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_fork_keeps_lookahead() {
        let mut a = make_lazy(3, Rc::new(Cell::new(0)));
        a.peek(1);
        let b = a.fork();
        assert_eq!(nums(b), vec![0.0, 1.0, 2.0]);
        assert_eq!(nums(a), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_source_error_taints_and_ends() {
        let mut i = 0;
        let mut r = CaseReader::from_fn(proto(), move || {
            i += 1;
            if i > 2 {
                Err(XtabError::Io("disk gone".into()))
            } else {
                Ok(Some(make_case(i as f64)))
            }
        });
        let taint = r.taint();
        let f = r.fork();
        assert_eq!(r.by_ref().count(), 2);
        assert!(r.read().is_none());
        assert!(taint.is_tainted());
        assert!(f.error());
        assert_eq!(f.count(), 2);
    }

    #[test]
    fn test_count_cases_leaves_position() {
        let mut r = make_lazy(6, Rc::new(Cell::new(0)));
        r.read();
        assert_eq!(r.count_cases(), 5);
        assert_eq!(r.read().and_then(|c| c.num(0)), Some(1.0));
    }
}
