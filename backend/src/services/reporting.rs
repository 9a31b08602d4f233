//! Reporting service for warehouse statistics and data export

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::MovementType;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// Movement totals for one movement type
#[derive(Debug, Serialize)]
pub struct MovementTypeTotal {
    pub movement_type: MovementType,
    pub label: &'static str,
    pub movements: i64,
    pub total_quantity: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatisticsFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Count and quantity per movement type, one entry for every type
    pub async fn movement_statistics(&self, filter: &StatisticsFilter) -> AppResult<Vec<MovementTypeTotal>> {
        let rows = sqlx::query_as::<_, (String, i64, i64)>(
            r#"
            SELECT movement_type, COUNT(*), COALESCE(SUM(quantity), 0)::bigint
            FROM product_movements
            WHERE ($1::date IS NULL OR created_at >= $1)
              AND ($2::date IS NULL OR created_at < $2::date + 1)
            GROUP BY movement_type
            "#,
        )
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.db)
        .await?;

        let totals = MovementType::ALL
            .iter()
            .map(|movement_type| {
                let (movements, total_quantity) = rows
                    .iter()
                    .find(|(t, _, _)| t == movement_type.as_str())
                    .map(|(_, count, sum)| (*count, *sum))
                    .unwrap_or((0, 0));
                MovementTypeTotal {
                    movement_type: *movement_type,
                    label: movement_type.label(),
                    movements,
                    total_quantity,
                }
            })
            .collect();

        Ok(totals)
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    #[derive(Serialize)]
    struct Row {
        product: &'static str,
        quantity: i32,
        at: chrono::DateTime<Utc>,
        order_id: Option<Uuid>,
    }

    #[test]
    fn test_csv_has_header_and_rows() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let csv = ReportingService::export_to_csv(&[
            Row {
                product: "Shampoo, 250 ml",
                quantity: -2,
                at,
                order_id: None,
            },
            Row {
                product: "Developer",
                quantity: 12,
                at,
                order_id: None,
            },
        ])
        .unwrap();

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "product,quantity,at,order_id");
        assert_eq!(lines.len(), 3);
        // embedded commas are quoted
        assert!(lines[1].starts_with("\"Shampoo, 250 ml\",-2,"));
    }

    #[test]
    fn test_csv_of_nothing_is_empty() {
        let rows: [Row; 0] = [];
        assert_eq!(ReportingService::export_to_csv(&rows).unwrap(), "");
    }
}
