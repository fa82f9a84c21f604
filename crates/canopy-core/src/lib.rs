//! Canopy Core: domain models, errors, the per-request tenant context,
//! and repository traits shared by every other crate.

pub mod context;
pub mod error;
pub mod models;
pub mod repository;

pub use context::TenantContext;
pub use error::{CanopyError, CanopyResult};
