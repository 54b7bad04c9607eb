//! Cell kinds and statistics that a request can ask for.
//!
//! Each list is declared once; the macro derives the enum, its keyword and
//! label lookups, and a `u32` bit set whose bit `k` is variant `k`.

use xtab_core::ResultClass;

macro_rules! keyword_table {
    (
        $(#[$meta:meta])*
        pub enum $name:ident in $set:ident {
            $attr:ident: $attr_ty:ty;
            $($variant:ident => ($kw:literal, $label:literal, $val:expr)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn keyword(self) -> &'static str {
                match self {
                    $($name::$variant => $kw),+
                }
            }

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn $attr(self) -> $attr_ty {
                match self {
                    $($name::$variant => $val),+
                }
            }

            /// Case-insensitive keyword lookup.
            pub fn from_keyword(keyword: &str) -> Option<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.keyword().eq_ignore_ascii_case(keyword))
            }

            fn bit(self) -> u32 {
                1u32 << (self as u32)
            }
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $set(u32);

        impl $set {
            pub const fn empty() -> Self {
                Self(0)
            }

            pub fn all() -> Self {
                Self::of($name::ALL)
            }

            pub fn of(items: &[$name]) -> Self {
                let mut set = Self::empty();
                for item in items {
                    set.insert(*item);
                }
                set
            }

            pub fn insert(&mut self, item: $name) {
                self.0 |= item.bit();
            }

            pub fn remove(&mut self, item: $name) {
                self.0 &= !item.bit();
            }

            pub fn contains(self, item: $name) -> bool {
                self.0 & item.bit() != 0
            }

            /// True if any of `items` is in the set.
            pub fn contains_any(self, items: &[$name]) -> bool {
                items.iter().any(|i| self.contains(*i))
            }

            pub fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub fn len(self) -> usize {
                self.0.count_ones() as usize
            }

            /// Members in declaration order.
            pub fn iter(self) -> impl Iterator<Item = $name> {
                $name::ALL.iter().copied().filter(move |i| self.contains(*i))
            }
        }

        impl FromIterator<$name> for $set {
            fn from_iter<I: IntoIterator<Item = $name>>(iter: I) -> Self {
                let mut set = Self::empty();
                for item in iter {
                    set.insert(item);
                }
                set
            }
        }
    };
}

/// Which output table a statistic lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatTable {
    ChiSquare,
    Symmetric,
    Risk,
    Directional,
}

keyword_table! {
    /// Kinds of cells in the crosstabulation table.
    pub enum Cell in CellSet {
        result_class: ResultClass;
        Count => ("count", "Count", ResultClass::Count),
        Expected => ("expected", "Expected", ResultClass::Other),
        Row => ("row", "Row %", ResultClass::Percent),
        Column => ("column", "Column %", ResultClass::Percent),
        Total => ("total", "Total %", ResultClass::Percent),
        Residual => ("residual", "Residual", ResultClass::Residual),
        SResidual => ("sresidual", "Std. Residual", ResultClass::Residual),
        AsResidual => ("asresidual", "Adjusted Residual", ResultClass::Residual),
    }
}

keyword_table! {
    /// Statistics that can be requested.
    pub enum Statistic in StatisticSet {
        table: StatTable;
        Chisq => ("chisq", "Chi-Square", StatTable::ChiSquare),
        Phi => ("phi", "Phi and Cramer's V", StatTable::Symmetric),
        Cc => ("cc", "Contingency Coefficient", StatTable::Symmetric),
        Lambda => ("lambda", "Lambda", StatTable::Directional),
        Uc => ("uc", "Uncertainty Coefficient", StatTable::Directional),
        BTau => ("btau", "Kendall's tau-b", StatTable::Symmetric),
        CTau => ("ctau", "Kendall's tau-c", StatTable::Symmetric),
        Risk => ("risk", "Risk", StatTable::Risk),
        Gamma => ("gamma", "Gamma", StatTable::Symmetric),
        D => ("d", "Somers' d", StatTable::Directional),
        Kappa => ("kappa", "Kappa", StatTable::Symmetric),
        Eta => ("eta", "Eta", StatTable::Directional),
        Corr => ("corr", "Correlations", StatTable::Symmetric),
    }
}

impl CellSet {
    /// The set used when a request lists no cell keywords at all.
    pub fn listed_default() -> Self {
        Self::of(&[Cell::Count, Cell::Row, Cell::Column, Cell::Total])
    }
}

impl StatisticSet {
    /// True if any requested statistic is reported in `table`.
    pub fn wants_table(self, table: StatTable) -> bool {
        self.iter().any(|s| s.table() == table)
    }
}
