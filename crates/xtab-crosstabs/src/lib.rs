pub mod accumulator;
pub mod cells;
pub mod domain;
pub mod matrix;
pub mod output;
pub mod procedure;
pub mod request;
pub mod stats;

pub use accumulator::{FreqEntry, FreqTable};
pub use cells::{Cell, CellSet, StatTable, Statistic, StatisticSet};
pub use domain::{subtables, Domain, Subtable};
pub use matrix::Matrix;
pub use output::{output_crosstabulation, summary_table, SummaryRow};
pub use procedure::{crosstabs, run_crosstabs, CommandResult};
pub use request::{
    CountMode, CrosstabsRequest, MissingPolicy, Mode, Order, Plan, Rounding, TableSpec, VarRange,
};
