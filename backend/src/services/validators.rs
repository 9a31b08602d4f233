//! `validator` adapters over the shared field rules

use rust_decimal::Decimal;
use validator::ValidationError;

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

pub fn validate_money(amount: &Decimal) -> Result<(), ValidationError> {
    shared::validate_money(*amount).map_err(|msg| invalid("money", msg))
}

pub fn validate_vat_rate(rate: &Decimal) -> Result<(), ValidationError> {
    shared::validate_vat_rate(*rate).map_err(|msg| invalid("vat_rate", msg))
}

pub fn validate_barcode(barcode: &str) -> Result<(), ValidationError> {
    shared::validate_barcode(barcode).map_err(|msg| invalid("barcode", msg))
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    shared::validate_name(name).map_err(|msg| invalid("name", msg))
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    shared::validate_email(email).map_err(|msg| invalid("email", msg))
}
