//! Retail sale and internal usage models

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{TransitionError, UnknownVariant};
use crate::validation::max_money;

/// Counter sale of retail products
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseSale {
    pub id: Uuid,
    pub sale_number: String,
    pub sold_at: DateTime<Utc>,
    pub client_name: Option<String>,
    pub employee_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub payment_method: Option<String>,
    pub discount_gross: Decimal,
    pub total_net: Decimal,
    pub total_gross: Decimal,
    pub total_vat: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub items: Vec<SaleItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit: String,
    pub unit_price_gross: Decimal,
    pub unit_price_net: Decimal,
    pub vat_rate: Decimal,
    pub discount_gross: Decimal,
    pub total_net: Decimal,
    pub total_gross: Decimal,
    pub total_vat: Decimal,
}

/// Round a money amount to cents, halves away from zero
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Amounts that cannot be priced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount exceeds {}", max_money())]
    Overflow,

    #[error("VAT rate {0} must be between 0 and 100")]
    InvalidVatRate(Decimal),
}

/// Fail with `Overflow` once an amount no longer fits a stored money column
pub(crate) fn bounded(amount: Option<Decimal>) -> Result<Decimal, AmountError> {
    amount
        .filter(|a| a.abs() <= max_money())
        .ok_or(AmountError::Overflow)
}

/// Net/gross/VAT split of one sale line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineBreakdown {
    pub unit_price_gross: Decimal,
    pub unit_price_net: Decimal,
    pub discount_gross: Decimal,
    pub total_gross: Decimal,
    pub total_net: Decimal,
    pub total_vat: Decimal,
}

impl LineBreakdown {
    /// Prices are gross. The discount is a line total, clamped to
    /// `[0, unit_price_gross × quantity]`.
    pub fn compute(
        unit_price_gross: Decimal,
        quantity: i32,
        discount_gross: Decimal,
        vat_rate: Decimal,
    ) -> Result<Self, AmountError> {
        if vat_rate < Decimal::ZERO || vat_rate > Decimal::ONE_HUNDRED {
            return Err(AmountError::InvalidVatRate(vat_rate));
        }
        let unit_price_gross = bounded(Some(unit_price_gross))?;
        let before_discount = bounded(unit_price_gross.checked_mul(Decimal::from(quantity)))?;
        let discount = discount_gross.max(Decimal::ZERO).min(before_discount);
        // 1.00 to 2.00, never zero
        let divider = Decimal::ONE + vat_rate / Decimal::ONE_HUNDRED;

        let total_gross = round_money(before_discount - discount);
        let total_net = round_money(total_gross / divider);

        Ok(Self {
            unit_price_gross: round_money(unit_price_gross),
            unit_price_net: round_money(unit_price_gross / divider),
            discount_gross: round_money(discount),
            total_gross,
            total_net,
            total_vat: total_gross - total_net,
        })
    }
}

/// Sale-level totals accumulated from line breakdowns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub discount_gross: Decimal,
    pub total_net: Decimal,
    pub total_gross: Decimal,
    pub total_vat: Decimal,
}

impl SaleTotals {
    pub fn add(&mut self, line: &LineBreakdown) {
        self.discount_gross += line.discount_gross;
        self.total_net += line.total_net;
        self.total_gross += line.total_gross;
        self.total_vat += line.total_vat;
    }
}

impl<'a> FromIterator<&'a LineBreakdown> for SaleTotals {
    fn from_iter<I: IntoIterator<Item = &'a LineBreakdown>>(iter: I) -> Self {
        let mut totals = SaleTotals::default();
        for line in iter {
            totals.add(line);
        }
        totals
    }
}

/// Reporting window for sales totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesPeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl SalesPeriod {
    /// `to` defaults to `now` and `from` to one day before `to`
    pub fn resolve(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self, &'static str> {
        let to = to.unwrap_or(now);
        let from = from.unwrap_or(to - Duration::days(1));
        if from > to {
            return Err("Period start must not be after its end");
        }
        Ok(Self { from, to })
    }
}

/// Units and revenue sold within a period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesPeriodSummary {
    #[serde(flatten)]
    pub period: SalesPeriod,
    pub sales_count: i64,
    pub units: i64,
    #[serde(flatten)]
    pub totals: SaleTotals,
}

/// Internal consumption of products, usually during a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseUsage {
    pub id: Uuid,
    pub usage_number: String,
    pub scope: UsageScope,
    pub used_at: DateTime<Utc>,
    pub client_name: Option<String>,
    pub employee_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub notes: Option<String>,
    /// Whether the items have already been taken out of stock
    pub stock_deducted: bool,
    pub created_by: Option<Uuid>,
    pub items: Vec<UsageItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageItem {
    pub id: Uuid,
    pub usage_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit: String,
    pub stock_before: i32,
    pub stock_after: i32,
}

/// Whether a usage already happened or is booked for a future visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UsageScope {
    Planned,
    #[default]
    Completed,
}

impl UsageScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageScope::Planned => "planned",
            UsageScope::Completed => "completed",
        }
    }

    /// Planned usage can be confirmed once; confirming twice is a conflict
    pub fn complete(self) -> Result<UsageScope, TransitionError> {
        match self {
            UsageScope::Planned => Ok(UsageScope::Completed),
            UsageScope::Completed => Err(TransitionError::new("usage", "complete", "completed")),
        }
    }
}

impl std::str::FromStr for UsageScope {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(UsageScope::Planned),
            "completed" => Ok(UsageScope::Completed),
            other => Err(UnknownVariant {
                kind: "usage scope",
                value: other.to_string(),
            }),
        }
    }
}

/// Filter for listing usage records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UsageFilter {
    #[default]
    All,
    Planned,
    Completed,
}

impl UsageFilter {
    pub fn scope(&self) -> Option<UsageScope> {
        match self {
            UsageFilter::All => None,
            UsageFilter::Planned => Some(UsageScope::Planned),
            UsageFilter::Completed => Some(UsageScope::Completed),
        }
    }
}

/// When usage records take stock out of the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UsagePolicy {
    pub planned_usage_deducts_stock: bool,
}

impl UsagePolicy {
    pub fn deducts_on_create(&self, scope: UsageScope) -> bool {
        match scope {
            UsageScope::Completed => true,
            UsageScope::Planned => self.planned_usage_deducts_stock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_vat_breakdown_standard_rate() {
        let line = LineBreakdown::compute(dec("100.00"), 3, Decimal::ZERO, dec("23")).unwrap();
        assert_eq!(line.total_gross, dec("300.00"));
        assert_eq!(line.total_net, dec("243.90"));
        assert_eq!(line.total_vat, dec("56.10"));
        assert_eq!(line.unit_price_net, dec("81.30"));
    }

    #[test]
    fn test_discount_is_clamped() {
        let line = LineBreakdown::compute(dec("10.00"), 2, dec("50.00"), dec("23")).unwrap();
        assert_eq!(line.discount_gross, dec("20.00"));
        assert_eq!(line.total_gross, Decimal::ZERO);
        assert_eq!(line.total_vat, Decimal::ZERO);

        let negative = LineBreakdown::compute(dec("10.00"), 2, dec("-5"), dec("23")).unwrap();
        assert_eq!(negative.discount_gross, Decimal::ZERO);
        assert_eq!(negative.total_gross, dec("20.00"));
    }

    #[test]
    fn test_zero_vat() {
        let line = LineBreakdown::compute(dec("12.50"), 4, Decimal::ZERO, Decimal::ZERO).unwrap();
        assert_eq!(line.total_net, line.total_gross);
        assert_eq!(line.total_vat, Decimal::ZERO);
    }

    #[test]
    fn test_sale_totals_sum_lines() {
        let lines = [
            LineBreakdown::compute(dec("100.00"), 3, Decimal::ZERO, dec("23")).unwrap(),
            LineBreakdown::compute(dec("20.00"), 1, dec("5.00"), dec("8")).unwrap(),
        ];
        let totals: SaleTotals = lines.iter().collect();
        assert_eq!(totals.total_gross, dec("315.00"));
        assert_eq!(totals.discount_gross, dec("5.00"));
        assert_eq!(totals.total_net + totals.total_vat, totals.total_gross);
    }

    #[test]
    fn test_out_of_range_amounts_rejected() {
        let huge = dec("79228162514264337593543950335");
        assert_eq!(
            LineBreakdown::compute(huge, 2, Decimal::ZERO, dec("23")),
            Err(AmountError::Overflow)
        );
        // fits on its own, not times the quantity
        assert_eq!(
            LineBreakdown::compute(dec("9999999999.99"), 2, Decimal::ZERO, dec("23")),
            Err(AmountError::Overflow)
        );
        assert_eq!(
            LineBreakdown::compute(dec("10.00"), 1, Decimal::ZERO, dec("-100")),
            Err(AmountError::InvalidVatRate(dec("-100")))
        );
        assert!(LineBreakdown::compute(dec("10.00"), 1, Decimal::ZERO, dec("100.01")).is_err());
    }

    #[test]
    fn test_sales_period_defaults_to_last_day() {
        let now = Utc::now();
        let period = SalesPeriod::resolve(None, None, now).unwrap();
        assert_eq!(period.to, now);
        assert_eq!(period.to - period.from, Duration::days(1));

        let from = now - Duration::days(30);
        assert_eq!(SalesPeriod::resolve(Some(from), None, now).unwrap().from, from);
        assert!(SalesPeriod::resolve(Some(now), Some(from), now).is_err());
    }

    #[test]
    fn test_usage_policy() {
        let deferred = UsagePolicy::default();
        assert!(deferred.deducts_on_create(UsageScope::Completed));
        assert!(!deferred.deducts_on_create(UsageScope::Planned));

        let eager = UsagePolicy {
            planned_usage_deducts_stock: true,
        };
        assert!(eager.deducts_on_create(UsageScope::Planned));
    }

    #[test]
    fn test_usage_completion_once() {
        assert_eq!(UsageScope::Planned.complete(), Ok(UsageScope::Completed));
        assert!(UsageScope::Completed.complete().is_err());
    }
}
