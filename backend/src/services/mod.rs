//! Business logic services for the salon warehouse

pub mod deliveries;
pub mod inventory;
pub mod ledger;
pub mod orders;
pub mod products;
pub mod reporting;
pub mod sales;
pub mod stock_alerts;
pub mod stocktaking;
pub mod suppliers;
pub mod usage;
pub mod validators;

pub use deliveries::DeliveryService;
pub use inventory::InventoryService;
pub use ledger::StockLedger;
pub use orders::OrderService;
pub use products::ProductService;
pub use reporting::ReportingService;
pub use sales::SaleService;
pub use stock_alerts::StockAlertService;
pub use stocktaking::StocktakingService;
pub use suppliers::SupplierService;
pub use usage::UsageService;
