use std::cell::Cell;
use std::rc::Rc;

/// Error flag shared by a stream and everything derived from it.  Reads never
/// fail; callers poll the taint once they are done.
#[derive(Debug, Clone, Default)]
pub struct Taint {
    flag: Rc<Cell<bool>>,
}

impl Taint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.set(true);
    }

    pub fn is_tainted(&self) -> bool {
        self.flag.get()
    }

    /// True if both handles refer to the same flag.
    pub fn same_as(&self, other: &Taint) -> bool {
        Rc::ptr_eq(&self.flag, &other.flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let a = Taint::new();
        let b = a.clone();
        assert!(!b.is_tainted());
        a.set();
        assert!(b.is_tainted());
        assert!(a.same_as(&b));
        assert!(!a.same_as(&Taint::new()));
    }
}
