//! # directord
//!
//! The IPVS administration daemon: configuration, logging and metrics
//! bootstrap plus the JSON gateway over the [`director_api`] facade.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::{Config, ConfigError};
pub use metrics::Metrics;
pub use routes::create_router;
pub use state::AppState;
