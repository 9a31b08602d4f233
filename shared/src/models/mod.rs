//! Domain models for the salon warehouse

mod alerts;
mod delivery;
mod ledger;
mod lifecycle;
mod order;
mod product;
mod retail;
mod stocktaking;

pub use alerts::*;
pub use delivery::*;
pub use ledger::*;
pub use lifecycle::*;
pub use order::*;
pub use product::*;
pub use retail::*;
pub use stocktaking::*;
