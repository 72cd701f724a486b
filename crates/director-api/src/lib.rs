//! # director-api
//!
//! Admin RPC facade over the [`director_ipvs`] driver: wire↔domain
//! conversion with validation, a single-writer mutation gate, bounded
//! request fan-out with per-target deduplication, and classification of
//! driver failures into per-item issues versus fatal errors.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod convert;
pub mod error;
pub mod parallel;
pub mod service;

pub use context::CallContext;
pub use error::{ApiError, ApiResult};
pub use service::AdminService;
