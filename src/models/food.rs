use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{push_id_eq, push_like, require_reference, Table};
use crate::error::{validation, AppResult};
use crate::types::{now_utc, parse_id, Paging};

/// The unit a food is measured in, embedded in food responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRef {
    pub id: Uuid,
    pub name: String,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    pub id: Uuid,
    pub name: String,
    pub unit_of_measurement: UnitRef,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodInput {
    pub name: String,
    pub unit_of_measurement: Uuid,
    pub description: Option<String>,
}

impl FoodInput {
    /// Field checks plus the unit reference lookup.
    pub async fn validated(self, db: &SqlitePool) -> AppResult<Self> {
        let input = Self {
            name: validation::required_text(&self.name, "name", 150)?,
            unit_of_measurement: self.unit_of_measurement,
            description: validation::optional_text(self.description.as_deref(), "description", 1000)?,
        };
        require_reference(db, Table::Units, input.unit_of_measurement, "unitOfMeasurement").await?;
        Ok(input)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodFilter {
    pub unit_of_measurement: Option<Uuid>,
}

const SELECT: &str = "SELECT f.id, f.name, f.description, f.created_at, f.updated_at, \
     u.id AS unit_id, u.name AS unit_name, u.symbol AS unit_symbol \
     FROM foods f JOIN units_of_measurement u ON u.id = f.unit_id";

pub(crate) fn unit_ref_from_row(row: &SqliteRow) -> AppResult<UnitRef> {
    Ok(UnitRef {
        id: parse_id(row.get::<&str, _>("unit_id"))?,
        name: row.get("unit_name"),
        symbol: row.get("unit_symbol"),
    })
}

fn from_row(row: &SqliteRow) -> AppResult<Food> {
    Ok(Food {
        id: parse_id(row.get::<&str, _>("id"))?,
        name: row.get("name"),
        unit_of_measurement: unit_ref_from_row(row)?,
        description: row.get("description"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub async fn find(db: &SqlitePool, id: Uuid) -> AppResult<Option<Food>> {
    let row = sqlx::query(&format!("{} WHERE f.id = ?1", SELECT))
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn list(
    db: &SqlitePool,
    paging: Paging,
    search: Option<String>,
    filter: &FoodFilter,
) -> AppResult<(Vec<Food>, i64)> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM foods f WHERE 1=1");
    push_like(&mut count, "f.name", &search);
    push_id_eq(&mut count, "f.unit_id", filter.unit_of_measurement);
    let total = count.build_query_scalar::<i64>().fetch_one(db).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(SELECT);
    qb.push(" WHERE 1=1");
    push_like(&mut qb, "f.name", &search);
    push_id_eq(&mut qb, "f.unit_id", filter.unit_of_measurement);
    qb.push(" ORDER BY f.name COLLATE NOCASE LIMIT ")
        .push_bind(paging.limit)
        .push(" OFFSET ")
        .push_bind(paging.offset());
    let rows = qb.build().fetch_all(db).await?;
    let items = rows.iter().map(from_row).collect::<AppResult<Vec<_>>>()?;
    Ok((items, total))
}

pub async fn list_for_export(db: &SqlitePool, max_rows: i64) -> AppResult<Vec<Food>> {
    let rows = sqlx::query(&format!("{} ORDER BY f.name COLLATE NOCASE LIMIT ?1", SELECT))
        .bind(max_rows)
        .fetch_all(db)
        .await?;
    rows.iter().map(from_row).collect()
}

pub async fn insert(db: &SqlitePool, input: &FoodInput) -> AppResult<Food> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO foods (id, name, unit_id, description) VALUES (?1, ?2, ?3, ?4)")
        .bind(id.to_string())
        .bind(&input.name)
        .bind(input.unit_of_measurement.to_string())
        .bind(&input.description)
        .execute(db)
        .await?;
    find(db, id).await?.ok_or_else(|| anyhow::anyhow!("food {} vanished after insert", id).into())
}

pub async fn update(db: &SqlitePool, id: Uuid, input: &FoodInput) -> AppResult<Option<Food>> {
    let res = sqlx::query(
        "UPDATE foods SET name = ?1, unit_id = ?2, description = ?3, updated_at = ?4 WHERE id = ?5",
    )
    .bind(&input.name)
    .bind(input.unit_of_measurement.to_string())
    .bind(&input.description)
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
    let res = sqlx::query("DELETE FROM foods WHERE id = ?1").bind(id.to_string()).execute(db).await?;
    Ok(res.rows_affected() > 0)
}
