pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    EndpointConfig, NavigationConfig, OutputConfig, PacingConfig, ProxyConfig, ProxyMode,
    ScraperConfig, TransportConfig, WorkerConfig,
};
