//! # acq-dash - Slack keyword dashboard
//!
//! Collects the messages in one Slack channel that mention a keyword, resolves
//! their authors and serves them as a small web dashboard with a time range
//! control, periodic refresh and CSV export.
//!
//! ## Layout
//!
//! - [`slack`]: Web API client behind the [`slack::SlackApi`] trait
//! - [`fetcher`]: paginated, filtered and retried history collection
//! - [`dashboard`]: snapshot state, time ranges and summary figures
//! - [`server`]: HTTP routes and the rendered page
//! - [`export`]: CSV output
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use acq_dash::{server, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     acq_dash::logging::init();
//!     let config = Arc::new(Config::from_env()?);
//!     server::start(config).await
//! }
//! ```

pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod logging;
pub mod model;
pub mod server;
pub mod slack;

// Re-export main types for library consumers
pub use config::{Config, ConfigError};
pub use dashboard::{Dashboard, RefreshOutcome, TimeRange};
pub use error::RetryPolicy;
pub use fetcher::{FetchError, MessageFetcher};
pub use model::Message;
pub use slack::{SlackApi, SlackClient, SlackError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
