//! Entity types and their persistence.
//!
//! Each module owns one table (plus its child tables): the serialized
//! representation, the request payload with its validation, and the queries.
//! Handlers in [`crate::routes`] compose these.

use sqlx::{QueryBuilder, Sqlite, SqliteExecutor};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub mod food;
pub mod food_entry;
pub mod food_plan;
pub mod medical_center;
pub mod provider;
pub mod stock;
pub mod unit;
pub mod user;

/// Tables that can be the target of a reference in a request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Units,
    Foods,
    Providers,
    MedicalCenters,
    FoodPlans,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::Units => "units_of_measurement",
            Table::Foods => "foods",
            Table::Providers => "providers",
            Table::MedicalCenters => "medical_centers",
            Table::FoodPlans => "food_plans",
        }
    }
}

pub async fn row_exists<'e, E: SqliteExecutor<'e>>(ex: E, table: Table, id: Uuid) -> AppResult<bool> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table.name());
    let found: bool = sqlx::query_scalar(&sql).bind(id.to_string()).fetch_one(ex).await?;
    Ok(found)
}

/// Fails with a `400` naming `field` when `id` does not reference a row of `table`.
pub async fn require_reference<'e, E: SqliteExecutor<'e>>(
    ex: E,
    table: Table,
    id: Uuid,
    field: &str,
) -> AppResult<()> {
    if row_exists(ex, table, id).await? {
        Ok(())
    } else {
        Err(AppError::ValidationError {
            field: field.to_string(),
            message: format!("{} does not reference an existing record", id),
        })
    }
}

/// Appends `AND <column> LIKE ?` with backslash escaping.
pub(crate) fn push_like(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, pattern: &Option<String>) {
    if let Some(p) = pattern {
        qb.push(" AND ").push(column).push(" LIKE ").push_bind(p.clone()).push(" ESCAPE '\\'");
    }
}

/// Appends `AND <column> = ?` for an optional id filter.
pub(crate) fn push_id_eq(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, id: Option<Uuid>) {
    if let Some(id) = id {
        qb.push(" AND ").push(column).push(" = ").push_bind(id.to_string());
    }
}
