use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::push_like;
use crate::error::{validation, AppResult};
use crate::types::{now_utc, parse_id, Paging};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitOfMeasurement {
    pub id: Uuid,
    pub name: String,
    pub symbol: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitInput {
    pub name: String,
    pub symbol: Option<String>,
}

impl UnitInput {
    pub fn validated(self) -> AppResult<Self> {
        Ok(Self {
            name: validation::required_text(&self.name, "name", 100)?,
            symbol: validation::optional_text(self.symbol.as_deref(), "symbol", 20)?,
        })
    }
}

const SELECT: &str = "SELECT id, name, symbol, created_at, updated_at FROM units_of_measurement";

fn from_row(row: &SqliteRow) -> AppResult<UnitOfMeasurement> {
    Ok(UnitOfMeasurement {
        id: parse_id(row.get::<&str, _>("id"))?,
        name: row.get("name"),
        symbol: row.get("symbol"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub async fn find(db: &SqlitePool, id: Uuid) -> AppResult<Option<UnitOfMeasurement>> {
    let row = sqlx::query(&format!("{} WHERE id = ?1", SELECT))
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn list(
    db: &SqlitePool,
    paging: Paging,
    search: Option<String>,
) -> AppResult<(Vec<UnitOfMeasurement>, i64)> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM units_of_measurement WHERE 1=1");
    push_like(&mut count, "name", &search);
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(db).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(SELECT);
    qb.push(" WHERE 1=1");
    push_like(&mut qb, "name", &search);
    qb.push(" ORDER BY name COLLATE NOCASE LIMIT ").push_bind(paging.limit).push(" OFFSET ").push_bind(paging.offset());
    let rows = qb.build().fetch_all(db).await?;
    let items = rows.iter().map(from_row).collect::<AppResult<Vec<_>>>()?;
    Ok((items, total))
}

pub async fn list_for_export(db: &SqlitePool, max_rows: i64) -> AppResult<Vec<UnitOfMeasurement>> {
    let rows = sqlx::query(&format!("{} ORDER BY name COLLATE NOCASE LIMIT ?1", SELECT))
        .bind(max_rows)
        .fetch_all(db)
        .await?;
    rows.iter().map(from_row).collect()
}

pub async fn insert(db: &SqlitePool, input: &UnitInput) -> AppResult<UnitOfMeasurement> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO units_of_measurement (id, name, symbol) VALUES (?1, ?2, ?3)")
        .bind(id.to_string())
        .bind(&input.name)
        .bind(&input.symbol)
        .execute(db)
        .await?;
    find(db, id).await?.ok_or_else(|| anyhow::anyhow!("unit {} vanished after insert", id).into())
}

pub async fn update(db: &SqlitePool, id: Uuid, input: &UnitInput) -> AppResult<Option<UnitOfMeasurement>> {
    let res = sqlx::query("UPDATE units_of_measurement SET name = ?1, symbol = ?2, updated_at = ?3 WHERE id = ?4")
        .bind(&input.name)
        .bind(&input.symbol)
        .bind(now_utc())
        .bind(id.to_string())
        .execute(db)
        .await?;
    if res.rows_affected() == 0 {
        return Ok(None);
    }
    find(db, id).await
}

pub async fn delete(db: &SqlitePool, id: Uuid) -> AppResult<bool> {
    let res = sqlx::query("DELETE FROM units_of_measurement WHERE id = ?1")
        .bind(id.to_string())
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
