//! Validation utilities for the salon warehouse
//!
//! Field-level checks shared by request DTOs (through `validator` custom
//! functions) and by the WASM bindings.

use rust_decimal::Decimal;

// ============================================================================
// Money Validations
// ============================================================================

/// Largest amount a NUMERIC(12, 2) money column holds
pub fn max_money() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// Prices, costs and discounts cannot be negative
pub fn validate_money(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    if amount > max_money() {
        return Err("Amount must be below 10 000 000 000");
    }
    if amount.normalize().scale() > 2 {
        return Err("Amount must have at most two decimal places");
    }
    Ok(())
}

/// VAT rate in percent, 0 to 100
pub fn validate_vat_rate(rate: Decimal) -> Result<(), &'static str> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err("VAT rate must be between 0 and 100");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Product and supplier names must contain something besides whitespace
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name cannot be empty");
    }
    if trimmed.chars().count() > 255 {
        return Err("Name must be at most 255 characters");
    }
    Ok(())
}

/// EAN-8, UPC-A, EAN-13 or GTIN-14 with a valid check digit
pub fn validate_barcode(barcode: &str) -> Result<(), &'static str> {
    if !matches!(barcode.len(), 8 | 12 | 13 | 14) {
        return Err("Barcode must have 8, 12, 13 or 14 digits");
    }
    let digits: Vec<u32> = barcode.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != barcode.len() {
        return Err("Barcode must contain digits only");
    }

    let (body, check) = digits.split_at(digits.len() - 1);
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
        .sum();
    if (10 - sum % 10) % 10 != check[0] {
        return Err("Invalid barcode check digit");
    }
    Ok(())
}
