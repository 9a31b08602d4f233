//! Domain models for the salon warehouse
//!
//! Re-exports the shared crate so services and handlers import from one place

pub use shared::models::*;
pub use shared::types::*;
