pub mod case;
pub mod dictionary;
pub mod error;
pub mod pivot;
pub mod sink;
pub mod value;
pub mod variable;

pub use case::{Case, CaseProto};
pub use dictionary::{Dictionary, WarnOnce, INVALID_WEIGHT_WARNING};
pub use error::{XtabError, XtabResult};
pub use pivot::{Axis, Category, Dimension, GroupId, PivotTable, PivotValue, ResultClass};
pub use sink::{CollectingSink, Message, OutputSink, Severity};
pub use value::{Value, SYSMIS};
pub use variable::{MissingKind, MissingValues, MvClass, Variable};
