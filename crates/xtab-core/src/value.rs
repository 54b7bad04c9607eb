use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// The system-missing value.  It compares like any other number (it is the
/// most negative finite double), so callers must test for it explicitly.
pub const SYSMIS: f64 = -f64::MAX;

/// A single datum: a number or a fixed-width, space-padded byte string.
///
/// Equality, hashing and ordering are width-aware: two strings of the same
/// variable always carry the same number of bytes, so comparing the padded
/// bytes ignores trailing spaces.  Numbers compare with `==`, except that NaN
/// equals NaN and `-0.0` equals `0.0`, which keeps `Eq` and `Hash` consistent
/// for use as hash-map keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Number(f64),
    String(Box<[u8]>),
}

impl Value {
    pub fn sysmis() -> Self {
        Self::Number(SYSMIS)
    }

    /// Builds a string value of exactly `width` bytes, truncating or padding
    /// `text` on the right with spaces.
    pub fn string(text: &str, width: usize) -> Self {
        let mut bytes = vec![b' '; width];
        let src = text.as_bytes();
        let n = src.len().min(width);
        bytes[..n].copy_from_slice(&src[..n]);
        Self::String(bytes.into_boxed_slice())
    }

    /// Returns a value of the given width with default contents: SYSMIS for
    /// numbers, all spaces for strings.
    pub fn blank(width: usize) -> Self {
        if width == 0 {
            Self::sysmis()
        } else {
            Self::String(vec![b' '; width].into_boxed_slice())
        }
    }

    /// 0 for numbers, byte width for strings.
    pub fn width(&self) -> usize {
        match self {
            Self::Number(_) => 0,
            Self::String(s) => s.len(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(f) => Some(*f),
            Self::String(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Number(_) => None,
            Self::String(s) => Some(s),
        }
    }

    pub fn is_sysmis(&self) -> bool {
        matches!(self, Self::Number(f) if *f == SYSMIS)
    }

    /// strcmp()-style comparison.  Numbers sort before strings; NaN sorts
    /// after every other number.
    pub fn compare_3way(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => {
                if a < b {
                    Ordering::Less
                } else if a > b {
                    Ordering::Greater
                } else {
                    a.is_nan().cmp(&b.is_nan())
                }
            }
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Number(_), Self::String(_)) => Ordering::Less,
            (Self::String(_), Self::Number(_)) => Ordering::Greater,
        }
    }

    /// Formats the value for labels and titles: strings lose their padding,
    /// SYSMIS prints as `.`, whole numbers print without a fraction.
    pub fn format(&self, decimals: usize) -> String {
        match self {
            Self::String(s) => {
                let end = s.iter().rposition(|b| *b != b' ').map_or(0, |i| i + 1);
                String::from_utf8_lossy(&s[..end]).into_owned()
            }
            Self::Number(f) if *f == SYSMIS => ".".into(),
            Self::Number(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
            Self::Number(f) => format!("{f:.decimals$}"),
        }
    }
}

fn canonical_bits(f: f64) -> u64 {
    if f == 0.0 {
        0
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::String(a), Self::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Number(f) => {
                0u8.hash(state);
                canonical_bits(*f).hash(state);
            }
            Self::String(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare_3way(other)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Number(f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(2))
    }
}
