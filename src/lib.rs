pub mod config;
pub mod error;
pub mod join;
pub mod metrics;
pub mod navigation;
pub mod normalize;
pub mod output;
pub mod proxy;
pub mod record;
pub mod renderer;
pub mod runner;
pub mod scheduler;
pub mod selector;
pub mod strategy;
pub mod transport;

pub use config::{ConfigLoader, ScraperConfig};
pub use error::{Error, Result};
pub use metrics::{MetricsCollector, MetricsSummary};
pub use navigation::{NavState, Navigator, PageDriver};
pub use proxy::{ProxyRouter, Route};
pub use record::{MovieRecord, Rating, RunScenario, StrategyKind};
pub use runner::{RunReport, Runner, StrategyRun};
pub use scheduler::{Pacing, Scheduler};
pub use strategy::{Candidate, FetchStrategy};
pub use transport::{Transport, TransportError};
