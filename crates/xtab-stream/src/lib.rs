pub mod filter;
pub mod grouper;
pub mod reader;
pub mod sort;
pub mod taint;
pub mod writer;

pub use grouper::CaseGrouper;
pub use reader::{CaseReader, CaseSource};
pub use sort::{Direction, SortField, SortKey};
pub use taint::Taint;
pub use writer::CaseWriter;
