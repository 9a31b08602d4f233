//! HTTP request handlers

mod deliveries;
mod health;
mod inventory;
mod orders;
mod products;
mod retail;
mod stock_alerts;
mod stocktaking;

pub use deliveries::*;
pub use health::*;
pub use inventory::*;
pub use orders::*;
pub use products::*;
pub use retail::*;
pub use stock_alerts::*;
pub use stocktaking::*;
