//! Supplier service

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::validators::{validate_email, validate_name};
use crate::error::{AppError, AppResult};
use crate::models::Supplier;

#[derive(Clone)]
pub struct SupplierService {
    db: PgPool,
}

/// Local mirror of the shared model so it can derive `FromRow`
#[derive(Debug, sqlx::FromRow)]
struct SupplierRow {
    id: Uuid,
    name: String,
    contact_person: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    tax_id: Option<String>,
    notes: Option<String>,
    is_active: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<SupplierRow> for Supplier {
    fn from(row: SupplierRow) -> Self {
        Supplier {
            id: row.id,
            name: row.name,
            contact_person: row.contact_person,
            email: row.email,
            phone: row.phone,
            address: row.address,
            tax_id: row.tax_id,
            notes: row.notes,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SUPPLIER_COLUMNS: &str = "id, name, contact_person, email, phone, address, tax_id, \
    notes, is_active, created_at, updated_at";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSupplierInput {
    #[validate(custom = "validate_name")]
    pub name: String,
    pub contact_person: Option<String>,
    #[validate(custom = "validate_email")]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 50))]
    pub tax_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSupplierInput {
    #[validate(custom = "validate_name")]
    pub name: Option<String>,
    pub contact_person: Option<String>,
    #[validate(custom = "validate_email")]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub address: Option<String>,
    #[validate(length(max = 50))]
    pub tax_id: Option<String>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

impl SupplierService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_suppliers(&self, active: Option<bool>) -> AppResult<Vec<Supplier>> {
        let rows = sqlx::query_as::<_, SupplierRow>(&format!(
            r#"
            SELECT {SUPPLIER_COLUMNS}
            FROM suppliers
            WHERE ($1::boolean IS NULL OR is_active = $1)
            ORDER BY name
            "#
        ))
        .bind(active)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get_supplier(&self, supplier_id: Uuid) -> AppResult<Supplier> {
        sqlx::query_as::<_, SupplierRow>(&format!(
            "SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1"
        ))
        .bind(supplier_id)
        .fetch_optional(&self.db)
        .await?
        .map(Into::into)
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))
    }

    pub async fn create_supplier(&self, input: CreateSupplierInput) -> AppResult<Supplier> {
        input.validate()?;

        let row = sqlx::query_as::<_, SupplierRow>(&format!(
            r#"
            INSERT INTO suppliers (name, contact_person, email, phone, address, tax_id, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(input.name.trim())
        .bind(&input.contact_person)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.tax_id)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(supplier_id = %row.id, "supplier created");
        Ok(row.into())
    }

    pub async fn update_supplier(
        &self,
        supplier_id: Uuid,
        input: UpdateSupplierInput,
    ) -> AppResult<Supplier> {
        input.validate()?;

        sqlx::query_as::<_, SupplierRow>(&format!(
            r#"
            UPDATE suppliers SET
                name = COALESCE($2, name),
                contact_person = COALESCE($3, contact_person),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                address = COALESCE($6, address),
                tax_id = COALESCE($7, tax_id),
                notes = COALESCE($8, notes),
                is_active = COALESCE($9, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SUPPLIER_COLUMNS}
            "#
        ))
        .bind(supplier_id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.contact_person)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.tax_id)
        .bind(&input.notes)
        .bind(input.is_active)
        .fetch_optional(&self.db)
        .await?
        .map(Into::into)
        .ok_or_else(|| AppError::NotFound("Supplier".to_string()))
    }

    /// Delete a supplier; references on documents and products become NULL
    pub async fn delete_supplier(&self, supplier_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
            .bind(supplier_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Supplier".to_string()));
        }

        tracing::info!(%supplier_id, "supplier deleted");
        Ok(())
    }
}
