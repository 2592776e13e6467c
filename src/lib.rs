//! Financial indicator engine for communal budget records.
//!
//! Raw CSV rows are normalized into [`BudgetRecord`]s, which feed the
//! aggregator, the alert scanner, the benchmark comparator and the trend
//! analyzer. Every analysis is a pure function of the records and the
//! configuration passed to it.

pub mod aggregate;
pub mod alerts;
pub mod benchmark;
pub mod config;
pub mod error;
pub mod filters;
pub mod normalize;
pub mod reference;
pub mod reports;
pub mod trends;
pub mod types;
pub mod util;

pub use aggregate::aggregate;
pub use alerts::scan_alerts;
pub use benchmark::compare_to_benchmarks;
pub use config::{AlertThresholds, AnalysisConfig, BenchmarkKey, Benchmarks, ThresholdKey};
pub use error::{ReportError, Result};
pub use filters::DatasetFilter;
pub use normalize::normalize;
pub use reference::ZoneTable;
pub use trends::analyze_trends;
pub use types::{
    AggregateQuery, AlertRecord, BudgetRecord, BudgetType, ComparisonReport, GroupBy, Indicator,
    IndicatorAggregate, Metric, RawRow, Severity, YearlyIndicatorSet,
};
