//! Shared types and rules for the salon warehouse
//!
//! This crate holds the stock ledger arithmetic, the document state
//! machines and the pricing rules. It performs no I/O so the backend, the
//! WASM bindings and the tests all run the same code.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
