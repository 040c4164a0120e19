//! lumen-core
//!
//! Pure domain types for the Lumen observability platform: resource models,
//! platform identifiers, and injected ID/time generators.
//! No service dependencies — this is the shared vocabulary of the Lumen system.

pub mod error;
pub mod ids;
pub mod models;
