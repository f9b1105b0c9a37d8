use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::food::{unit_ref_from_row, UnitRef};
use super::push_id_eq;
use crate::error::AppResult;
use crate::types::{parse_id, Paging, RefSummary};

/// On-hand quantity of one food at one medical center.
///
/// Rows are created and adjusted only by [`crate::inventory::reconcile`];
/// there is no direct create or update endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub id: Uuid,
    pub medical_center: RefSummary,
    pub food: RefSummary,
    pub unit_of_measurement: UnitRef,
    pub quantity: f64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockFilter {
    pub medical_center: Option<Uuid>,
    pub food: Option<Uuid>,
}

const SELECT: &str = "SELECT s.id, s.quantity, s.created_at, s.updated_at, \
     s.medical_center_id, mc.name AS medical_center_name, \
     s.food_id, f.name AS food_name, \
     u.id AS unit_id, u.name AS unit_name, u.symbol AS unit_symbol \
     FROM stocks s \
     JOIN medical_centers mc ON mc.id = s.medical_center_id \
     JOIN foods f ON f.id = s.food_id \
     JOIN units_of_measurement u ON u.id = f.unit_id";

fn from_row(row: &SqliteRow) -> AppResult<Stock> {
    Ok(Stock {
        id: parse_id(row.get::<&str, _>("id"))?,
        medical_center: RefSummary {
            id: parse_id(row.get::<&str, _>("medical_center_id"))?,
            name: row.get("medical_center_name"),
        },
        food: RefSummary { id: parse_id(row.get::<&str, _>("food_id"))?, name: row.get("food_name") },
        unit_of_measurement: unit_ref_from_row(row)?,
        quantity: row.get("quantity"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub async fn find(db: &SqlitePool, id: Uuid) -> AppResult<Option<Stock>> {
    let row = sqlx::query(&format!("{} WHERE s.id = ?1", SELECT))
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;
    row.as_ref().map(from_row).transpose()
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, search: &Option<String>, filter: &StockFilter) {
    if let Some(p) = search {
        qb.push(" AND f.name LIKE ").push_bind(p.clone()).push(" ESCAPE '\\'");
    }
    push_id_eq(qb, "s.medical_center_id", filter.medical_center);
    push_id_eq(qb, "s.food_id", filter.food);
}

/// Search matches the food name.
pub async fn list(
    db: &SqlitePool,
    paging: Paging,
    search: Option<String>,
    filter: &StockFilter,
) -> AppResult<(Vec<Stock>, i64)> {
    let mut count = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM stocks s JOIN foods f ON f.id = s.food_id WHERE 1=1",
    );
    push_filters(&mut count, &search, filter);
    let total = count.build_query_scalar::<i64>().fetch_one(db).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(SELECT);
    qb.push(" WHERE 1=1");
    push_filters(&mut qb, &search, filter);
    qb.push(" ORDER BY mc.name COLLATE NOCASE, f.name COLLATE NOCASE LIMIT ")
        .push_bind(paging.limit)
        .push(" OFFSET ")
        .push_bind(paging.offset());
    let rows = qb.build().fetch_all(db).await?;
    let items = rows.iter().map(from_row).collect::<AppResult<Vec<_>>>()?;
    Ok((items, total))
}

/// Every stock row of one center, ordered by food name.
pub async fn list_for_center(db: &SqlitePool, medical_center: Uuid) -> AppResult<Vec<Stock>> {
    let rows = sqlx::query(&format!(
        "{} WHERE s.medical_center_id = ?1 ORDER BY f.name COLLATE NOCASE",
        SELECT
    ))
    .bind(medical_center.to_string())
    .fetch_all(db)
    .await?;
    rows.iter().map(from_row).collect()
}

pub async fn list_for_export(db: &SqlitePool, max_rows: i64) -> AppResult<Vec<Stock>> {
    let rows = sqlx::query(&format!(
        "{} ORDER BY mc.name COLLATE NOCASE, f.name COLLATE NOCASE LIMIT ?1",
        SELECT
    ))
    .bind(max_rows)
    .fetch_all(db)
    .await?;
    rows.iter().map(from_row).collect()
}

/// Removes a stock row. The next entry touching the pair recreates it from zero.
pub async fn delete(db: &SqlitePool, id: Uuid) -> AppResult<bool> {
    let res = sqlx::query("DELETE FROM stocks WHERE id = ?1").bind(id.to_string()).execute(db).await?;
    Ok(res.rows_affected() > 0)
}
