pub mod collector;
pub mod summary;

pub use collector::{MetricsCollector, MetricsSample};
pub use summary::{ComparisonRow, MetricsSummary};
