use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{push_id_eq, require_reference, Table};
use crate::error::{validation, AppError, AppResult};
use crate::types::{now_utc, parse_id, Paging, RefSummary};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnteredFood {
    pub food: RefSummary,
    pub quantity: f64,
}

/// A recorded delivery of foods into a medical center.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodEntry {
    pub id: Uuid,
    pub medical_center: RefSummary,
    pub provider: RefSummary,
    pub food_plan: RefSummary,
    pub entry_date: NaiveDate,
    pub entered_foods: Vec<EnteredFood>,
    pub created_at: String,
    pub updated_at: String,
}

impl FoodEntry {
    pub fn total_quantity(&self) -> f64 {
        self.entered_foods.iter().map(|f| f.quantity).sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnteredFoodInput {
    pub food: Uuid,
    pub quantity: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodEntryInput {
    pub medical_center: Uuid,
    pub provider: Uuid,
    pub food_plan: Uuid,
    pub entry_date: NaiveDate,
    pub entered_foods: Vec<EnteredFoodInput>,
}

impl FoodEntryInput {
    /// Checks quantities and every reference. The plan must belong to the entry's center.
    pub async fn validated(self, db: &SqlitePool) -> AppResult<Self> {
        if self.entered_foods.is_empty() {
            return Err(AppError::ValidationError {
                field: "enteredFoods".to_string(),
                message: "At least one entered food is required".to_string(),
            });
        }
        for (i, item) in self.entered_foods.iter().enumerate() {
            validation::positive_quantity(item.quantity, &format!("enteredFoods[{}].quantity", i))?;
        }

        require_reference(db, Table::MedicalCenters, self.medical_center, "medicalCenter").await?;
        require_reference(db, Table::Providers, self.provider, "provider").await?;

        let plan_center: Option<String> = sqlx::query_scalar("SELECT medical_center_id FROM food_plans WHERE id = ?1")
            .bind(self.food_plan.to_string())
            .fetch_optional(db)
            .await?;
        match plan_center {
            None => {
                return Err(AppError::ValidationError {
                    field: "foodPlan".to_string(),
                    message: format!("{} does not reference an existing record", self.food_plan),
                })
            }
            Some(center) if center != self.medical_center.to_string() => {
                return Err(AppError::ValidationError {
                    field: "foodPlan".to_string(),
                    message: "The food plan belongs to a different medical center".to_string(),
                })
            }
            Some(_) => {}
        }

        for (i, item) in self.entered_foods.iter().enumerate() {
            require_reference(db, Table::Foods, item.food, &format!("enteredFoods[{}].food", i)).await?;
        }
        Ok(self)
    }

    /// `(food, quantity)` pairs in payload order.
    pub fn quantities(&self) -> impl Iterator<Item = (Uuid, f64)> + '_ {
        self.entered_foods.iter().map(|f| (f.food, f.quantity))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodEntryFilter {
    pub medical_center: Option<Uuid>,
    pub food_plan: Option<Uuid>,
    pub provider: Option<Uuid>,
}

/// What an entry currently contributes to stock, as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredQuantities {
    pub medical_center: Uuid,
    pub items: Vec<(Uuid, f64)>,
}

const SELECT: &str = "SELECT e.id, e.entry_date, e.created_at, e.updated_at, \
     e.medical_center_id, mc.name AS medical_center_name, \
     e.provider_id, p.name AS provider_name, \
     e.food_plan_id, fp.name AS food_plan_name \
     FROM food_entries e \
     JOIN medical_centers mc ON mc.id = e.medical_center_id \
     JOIN providers p ON p.id = e.provider_id \
     JOIN food_plans fp ON fp.id = e.food_plan_id";

fn ref_from_row(row: &SqliteRow, id_col: &str, name_col: &str) -> AppResult<RefSummary> {
    Ok(RefSummary { id: parse_id(row.get::<&str, _>(id_col))?, name: row.get(name_col) })
}

fn from_row(row: &SqliteRow) -> AppResult<FoodEntry> {
    Ok(FoodEntry {
        id: parse_id(row.get::<&str, _>("id"))?,
        medical_center: ref_from_row(row, "medical_center_id", "medical_center_name")?,
        provider: ref_from_row(row, "provider_id", "provider_name")?,
        food_plan: ref_from_row(row, "food_plan_id", "food_plan_name")?,
        entry_date: row.get("entry_date"),
        entered_foods: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Loads the entered foods of all `entries` with one query.
async fn attach_items(db: &SqlitePool, entries: &mut [FoodEntry]) -> AppResult<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT i.food_entry_id, i.food_id, f.name AS food_name, i.quantity \
         FROM food_entry_items i JOIN foods f ON f.id = i.food_id WHERE i.food_entry_id IN (",
    );
    let mut ids = qb.separated(", ");
    for e in entries.iter() {
        ids.push_bind(e.id.to_string());
    }
    ids.push_unseparated(") ORDER BY i.food_entry_id, i.position");
    let rows = qb.build().fetch_all(db).await?;

    let mut by_entry: HashMap<Uuid, Vec<EnteredFood>> = HashMap::new();
    for row in &rows {
        let entry_id = parse_id(row.get::<&str, _>("food_entry_id"))?;
        by_entry.entry(entry_id).or_default().push(EnteredFood {
            food: ref_from_row(row, "food_id", "food_name")?,
            quantity: row.get("quantity"),
        });
    }
    for e in entries.iter_mut() {
        e.entered_foods = by_entry.remove(&e.id).unwrap_or_default();
    }
    Ok(())
}

pub async fn find(db: &SqlitePool, id: Uuid) -> AppResult<Option<FoodEntry>> {
    let row = sqlx::query(&format!("{} WHERE e.id = ?1", SELECT))
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut entries = vec![from_row(&row)?];
    attach_items(db, &mut entries).await?;
    Ok(entries.pop())
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &FoodEntryFilter) {
    push_id_eq(qb, "e.medical_center_id", filter.medical_center);
    push_id_eq(qb, "e.food_plan_id", filter.food_plan);
    push_id_eq(qb, "e.provider_id", filter.provider);
}

pub async fn list(db: &SqlitePool, paging: Paging, filter: &FoodEntryFilter) -> AppResult<(Vec<FoodEntry>, i64)> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM food_entries e WHERE 1=1");
    push_filters(&mut count, filter);
    let total = count.build_query_scalar::<i64>().fetch_one(db).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(SELECT);
    qb.push(" WHERE 1=1");
    push_filters(&mut qb, filter);
    qb.push(" ORDER BY e.entry_date DESC, e.created_at DESC LIMIT ")
        .push_bind(paging.limit)
        .push(" OFFSET ")
        .push_bind(paging.offset());
    let rows = qb.build().fetch_all(db).await?;
    let mut items = rows.iter().map(from_row).collect::<AppResult<Vec<_>>>()?;
    attach_items(db, &mut items).await?;
    Ok((items, total))
}

pub async fn list_for_export(db: &SqlitePool, max_rows: i64) -> AppResult<Vec<FoodEntry>> {
    let rows = sqlx::query(&format!("{} ORDER BY e.entry_date DESC, e.created_at DESC LIMIT ?1", SELECT))
        .bind(max_rows)
        .fetch_all(db)
        .await?;
    let mut items = rows.iter().map(from_row).collect::<AppResult<Vec<_>>>()?;
    attach_items(db, &mut items).await?;
    Ok(items)
}

async fn insert_items(conn: &mut SqliteConnection, entry_id: Uuid, input: &FoodEntryInput) -> AppResult<()> {
    for (position, (food, quantity)) in input.quantities().enumerate() {
        sqlx::query("INSERT INTO food_entry_items (food_entry_id, position, food_id, quantity) VALUES (?1, ?2, ?3, ?4)")
            .bind(entry_id.to_string())
            .bind(position as i64)
            .bind(food.to_string())
            .bind(quantity)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Inserts the entry and its items. Stock is not touched here.
pub async fn insert(conn: &mut SqliteConnection, input: &FoodEntryInput) -> AppResult<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO food_entries (id, medical_center_id, provider_id, food_plan_id, entry_date) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(id.to_string())
    .bind(input.medical_center.to_string())
    .bind(input.provider.to_string())
    .bind(input.food_plan.to_string())
    .bind(input.entry_date)
    .execute(&mut *conn)
    .await?;
    insert_items(conn, id, input).await?;
    Ok(id)
}

/// Reads the center and items currently stored for an entry.
pub async fn stored_quantities(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Option<StoredQuantities>> {
    let center: Option<String> = sqlx::query_scalar("SELECT medical_center_id FROM food_entries WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    let Some(center) = center else {
        return Ok(None);
    };
    let rows = sqlx::query("SELECT food_id, quantity FROM food_entry_items WHERE food_entry_id = ?1 ORDER BY position")
        .bind(id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    let items = rows
        .iter()
        .map(|r| -> AppResult<(Uuid, f64)> { Ok((parse_id(r.get::<&str, _>("food_id"))?, r.get("quantity"))) })
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Some(StoredQuantities { medical_center: parse_id(&center)?, items }))
}

/// Overwrites the entry row and replaces its items. Returns `false` if it does not exist.
pub async fn replace(conn: &mut SqliteConnection, id: Uuid, input: &FoodEntryInput) -> AppResult<bool> {
    let res = sqlx::query(
        "UPDATE food_entries SET medical_center_id = ?1, provider_id = ?2, food_plan_id = ?3, entry_date = ?4, \
         updated_at = ?5 WHERE id = ?6",
    )
    .bind(input.medical_center.to_string())
    .bind(input.provider.to_string())
    .bind(input.food_plan.to_string())
    .bind(input.entry_date)
    .bind(now_utc())
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;
    if res.rows_affected() == 0 {
        return Ok(false);
    }
    sqlx::query("DELETE FROM food_entry_items WHERE food_entry_id = ?1")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    insert_items(conn, id, input).await?;
    Ok(true)
}

/// Deletes the entry; items go with it through the cascade.
pub async fn delete(conn: &mut SqliteConnection, id: Uuid) -> AppResult<bool> {
    let res = sqlx::query("DELETE FROM food_entries WHERE id = ?1")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected() > 0)
}
