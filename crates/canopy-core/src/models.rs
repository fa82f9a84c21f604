//! Domain models for Canopy.
//!
//! `order` is owned by the commerce collaborators; the compliance core only
//! reads it (and transitions status on completion/refund).

pub mod compliance;
pub mod order;
pub mod report;
pub mod tenant;
