//! Canopy Server: the HTTP surface over the compliance engine, the
//! tenant middleware and the scheduled report job.

pub mod config;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;
pub mod tenancy;

pub use config::{ReportJobConfig, ServerConfig};
pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
