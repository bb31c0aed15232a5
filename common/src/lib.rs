pub mod aggregate;
pub mod config;
pub mod error;
pub mod line;
pub mod plot;
pub mod probe;
pub mod series;
pub mod util;

pub use aggregate::{AggregateOptions, GroupingMode, RunLogAggregator};
pub use error::{AggregateError, ParseError};
pub use series::{AggregatedSeries, Point};
