//! WebAssembly module for the Salon Warehouse
//!
//! Provides client-side computation for:
//! - Sale line and sale total pricing (net/gross/VAT)
//! - Stocktaking differences
//! - Reorder suggestions and priorities
//! - Offline input validation

use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid {}: {}", field, e))
}

fn price_sale_line(
    unit_price_gross: &str,
    quantity: i32,
    discount_gross: &str,
    vat_rate: &str,
) -> Result<LineBreakdown, String> {
    let unit_price_gross = parse_decimal("unit price", unit_price_gross)?;
    let discount_gross = parse_decimal("discount", discount_gross)?;
    let vat_rate = parse_decimal("VAT rate", vat_rate)?;

    validate_money(unit_price_gross)?;
    validate_money(discount_gross)?;
    validate_vat_rate(vat_rate)?;
    if quantity < 1 {
        return Err("Quantity must be at least 1".to_string());
    }

    LineBreakdown::compute(unit_price_gross, quantity, discount_gross, vat_rate)
        .map_err(|e| e.to_string())
}

fn to_js_error(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

/// Price one sale line. Amounts are decimal strings, the result is the
/// line breakdown as JSON.
#[wasm_bindgen]
pub fn calculate_sale_line(
    unit_price_gross: &str,
    quantity: i32,
    discount_gross: &str,
    vat_rate: &str,
) -> Result<String, JsValue> {
    let line = price_sale_line(unit_price_gross, quantity, discount_gross, vat_rate)
        .map_err(to_js_error)?;
    serde_json::to_string(&line).map_err(to_js_error)
}

/// Sum a JSON array of line breakdowns into sale totals
#[wasm_bindgen]
pub fn calculate_sale_totals(lines_json: &str) -> Result<String, JsValue> {
    let lines: Vec<LineBreakdown> = serde_json::from_str(lines_json)
        .map_err(|e| to_js_error(format!("Invalid lines JSON: {}", e)))?;

    let totals: SaleTotals = lines.iter().collect();
    serde_json::to_string(&totals).map_err(to_js_error)
}

/// Counted minus system quantity
#[wasm_bindgen]
pub fn calculate_count_difference(system_quantity: i32, counted_quantity: i32) -> i32 {
    count_difference(system_quantity, Some(counted_quantity)).unwrap_or(0)
}

fn low_stock_entry(stock: i32, min_quantity: i32) -> LowStockProduct {
    let deficit = stock_deficit(stock, min_quantity);
    LowStockProduct {
        id: Uuid::nil(),
        name: String::new(),
        brand: None,
        sku: None,
        stock,
        min_quantity,
        unit: String::new(),
        deficit,
        deficit_percentage: deficit_percentage(deficit, min_quantity),
        purchase_price: None,
        default_supplier_id: None,
        default_supplier_name: None,
    }
}

/// Units to order for a product below its threshold, 0 otherwise
#[wasm_bindgen]
pub fn suggest_reorder_quantity(stock: i32, min_quantity: i32) -> i32 {
    if min_quantity <= 0 || stock >= min_quantity {
        return 0;
    }
    low_stock_entry(stock, min_quantity).suggested_order_quantity()
}

/// Reorder priority name, or an empty string when stock is sufficient
#[wasm_bindgen]
pub fn classify_reorder_priority(stock: i32, min_quantity: i32) -> String {
    if min_quantity <= 0 || stock >= min_quantity {
        return String::new();
    }
    let priority = match low_stock_entry(stock, min_quantity).priority() {
        ReorderPriority::Critical => "critical",
        ReorderPriority::High => "high",
        ReorderPriority::Medium => "medium",
        ReorderPriority::Low => "low",
    };
    priority.to_string()
}

/// Whether stock sits in the critical band
#[wasm_bindgen]
pub fn check_critical_stock(stock: i32, min_quantity: i32) -> bool {
    is_critical_stock(stock, min_quantity)
}

/// Validate a barcode before sending it to the server
#[wasm_bindgen]
pub fn is_valid_barcode(barcode: &str) -> bool {
    validate_barcode(barcode).is_ok()
}
