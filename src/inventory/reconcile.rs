//! Keeps stock rows in step with food entries.
//!
//! Every entry mutation is turned into a set of signed deltas keyed by
//! `(medical center, food)`. The entry write and the deltas share one
//! transaction, so a delta that would drive a stock negative rolls the entry
//! back with it.

use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::food_entry::{self, FoodEntryInput};
use crate::types::{now_utc, parse_id, RefSummary};

/// Net changes smaller than this are treated as no change.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StockKey {
    pub medical_center: Uuid,
    pub food: Uuid,
}

/// Quantity an entry contributes to each stock pair.
pub type Contribution = BTreeMap<StockKey, f64>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StockDelta {
    pub key: StockKey,
    pub delta: f64,
}

/// Folds `(food, quantity)` pairs into a contribution, summing repeated foods.
pub fn contribution<I>(medical_center: Uuid, items: I) -> Contribution
where
    I: IntoIterator<Item = (Uuid, f64)>,
{
    let mut out = Contribution::new();
    for (food, quantity) in items {
        *out.entry(StockKey { medical_center, food }).or_insert(0.0) += quantity;
    }
    out
}

/// Deltas that take stock from reflecting `old` to reflecting `new`.
///
/// Pairs present on both sides produce one merged delta; pairs whose net
/// change is zero are skipped.
pub fn net_deltas(old: &Contribution, new: &Contribution) -> Vec<StockDelta> {
    let mut merged: BTreeMap<StockKey, f64> = BTreeMap::new();
    for (key, q) in old {
        *merged.entry(*key).or_insert(0.0) -= q;
    }
    for (key, q) in new {
        *merged.entry(*key).or_insert(0.0) += q;
    }
    merged
        .into_iter()
        .filter(|(_, delta)| delta.abs() > EPSILON)
        .map(|(key, delta)| StockDelta { key, delta })
        .collect()
}

fn negative_stock(key: &StockKey) -> AppError {
    AppError::ValidationError {
        field: "enteredFoods".to_string(),
        message: format!(
            "Stock of food {} at medical center {} cannot become negative",
            key.food, key.medical_center
        ),
    }
}

fn is_check_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("CHECK constraint failed"))
}

/// Adds `delta` to the stock of one pair, creating the row when it is absent.
///
/// Increments go through an upsert. Decrements are a single `UPDATE`: SQLite
/// evaluates CHECK constraints on the candidate row before resolving an upsert
/// conflict, so a negative candidate would be rejected even when the existing
/// row could absorb it.
pub async fn apply_delta(conn: &mut SqliteConnection, key: StockKey, delta: f64) -> AppResult<()> {
    let now = now_utc();
    if delta >= 0.0 {
        sqlx::query(
            "INSERT INTO stocks (id, medical_center_id, food_id, quantity) VALUES (?1, ?2, ?3, ROUND(?4, 6)) \
             ON CONFLICT(medical_center_id, food_id) \
             DO UPDATE SET quantity = ROUND(stocks.quantity + excluded.quantity, 6), updated_at = ?5",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(key.medical_center.to_string())
        .bind(key.food.to_string())
        .bind(delta)
        .bind(&now)
        .execute(&mut *conn)
        .await?;
    } else {
        let res = sqlx::query(
            "UPDATE stocks SET quantity = ROUND(quantity + ?1, 6), updated_at = ?2 \
             WHERE medical_center_id = ?3 AND food_id = ?4",
        )
        .bind(delta)
        .bind(&now)
        .bind(key.medical_center.to_string())
        .bind(key.food.to_string())
        .execute(&mut *conn)
        .await
        .map_err(|e| if is_check_violation(&e) { negative_stock(&key) } else { e.into() })?;
        if res.rows_affected() == 0 {
            return Err(negative_stock(&key));
        }
    }
    tracing::debug!(center = %key.medical_center, food = %key.food, delta, "stock adjusted");
    Ok(())
}

/// Applies all deltas in order; returns how many were written.
pub async fn apply_deltas(conn: &mut SqliteConnection, deltas: &[StockDelta]) -> AppResult<usize> {
    for d in deltas {
        apply_delta(conn, d.key, d.delta).await?;
    }
    Ok(deltas.len())
}

/// Result of an entry mutation: the entry id and the number of stock rows touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryChange {
    pub id: Uuid,
    pub stock_adjustments: usize,
}

/// Inserts an entry and credits its foods to the center's stock.
pub async fn record_entry(db: &SqlitePool, input: &FoodEntryInput) -> AppResult<EntryChange> {
    let mut tx = db::begin_write(db).await?;
    let id = food_entry::insert(&mut *tx, input).await?;
    let new = contribution(input.medical_center, input.quantities());
    let applied = apply_deltas(&mut *tx, &net_deltas(&Contribution::new(), &new)).await?;
    tx.commit().await?;
    Ok(EntryChange { id, stock_adjustments: applied })
}

/// Replaces an entry and moves stock from its old contribution to the new one.
/// `None` when the entry does not exist.
pub async fn revise_entry(db: &SqlitePool, id: Uuid, input: &FoodEntryInput) -> AppResult<Option<EntryChange>> {
    let mut tx = db::begin_write(db).await?;
    let Some(stored) = food_entry::stored_quantities(&mut *tx, id).await? else {
        return Ok(None);
    };
    let old = contribution(stored.medical_center, stored.items);
    let new = contribution(input.medical_center, input.quantities());
    food_entry::replace(&mut *tx, id, input).await?;
    let applied = apply_deltas(&mut *tx, &net_deltas(&old, &new)).await?;
    tx.commit().await?;
    Ok(Some(EntryChange { id, stock_adjustments: applied }))
}

/// Deletes an entry and debits its foods from stock. `None` when it does not exist.
pub async fn remove_entry(db: &SqlitePool, id: Uuid) -> AppResult<Option<EntryChange>> {
    let mut tx = db::begin_write(db).await?;
    let Some(stored) = food_entry::stored_quantities(&mut *tx, id).await? else {
        return Ok(None);
    };
    let old = contribution(stored.medical_center, stored.items);
    food_entry::delete(&mut *tx, id).await?;
    let applied = apply_deltas(&mut *tx, &net_deltas(&old, &Contribution::new())).await?;
    tx.commit().await?;
    Ok(Some(EntryChange { id, stock_adjustments: applied }))
}

/// A pair whose stored stock differs from what its entries add up to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDrift {
    pub medical_center: RefSummary,
    pub food: RefSummary,
    /// `None` when entries exist but no stock row does.
    pub recorded: Option<f64>,
    pub expected: f64,
    pub difference: f64,
}

/// Lists every pair whose stock row disagrees with the sum of its live entries.
pub async fn detect_drift(conn: &mut SqliteConnection) -> AppResult<Vec<StockDrift>> {
    struct Side {
        center_name: String,
        food_name: String,
        recorded: Option<f64>,
        expected: f64,
    }

    let mut pairs: BTreeMap<StockKey, Side> = BTreeMap::new();

    let expected_rows = sqlx::query(
        "SELECT e.medical_center_id, mc.name AS medical_center_name, i.food_id, f.name AS food_name, \
         SUM(i.quantity) AS expected \
         FROM food_entries e \
         JOIN food_entry_items i ON i.food_entry_id = e.id \
         JOIN medical_centers mc ON mc.id = e.medical_center_id \
         JOIN foods f ON f.id = i.food_id \
         GROUP BY e.medical_center_id, i.food_id",
    )
    .fetch_all(&mut *conn)
    .await?;
    for row in &expected_rows {
        let key = StockKey {
            medical_center: parse_id(row.get::<&str, _>("medical_center_id"))?,
            food: parse_id(row.get::<&str, _>("food_id"))?,
        };
        pairs.insert(
            key,
            Side {
                center_name: row.get("medical_center_name"),
                food_name: row.get("food_name"),
                recorded: None,
                expected: row.get("expected"),
            },
        );
    }

    let stock_rows = sqlx::query(
        "SELECT s.medical_center_id, mc.name AS medical_center_name, s.food_id, f.name AS food_name, s.quantity \
         FROM stocks s \
         JOIN medical_centers mc ON mc.id = s.medical_center_id \
         JOIN foods f ON f.id = s.food_id",
    )
    .fetch_all(&mut *conn)
    .await?;
    for row in &stock_rows {
        let key = StockKey {
            medical_center: parse_id(row.get::<&str, _>("medical_center_id"))?,
            food: parse_id(row.get::<&str, _>("food_id"))?,
        };
        let quantity: f64 = row.get("quantity");
        pairs
            .entry(key)
            .or_insert_with(|| Side {
                center_name: row.get("medical_center_name"),
                food_name: row.get("food_name"),
                recorded: None,
                expected: 0.0,
            })
            .recorded = Some(quantity);
    }

    let drift = pairs
        .into_iter()
        .filter_map(|(key, side)| {
            let difference = side.recorded.unwrap_or(0.0) - side.expected;
            let missing_row = side.recorded.is_none() && side.expected.abs() > 1e-6;
            if difference.abs() > 1e-6 || missing_row {
                Some(StockDrift {
                    medical_center: RefSummary { id: key.medical_center, name: side.center_name },
                    food: RefSummary { id: key.food, name: side.food_name },
                    recorded: side.recorded,
                    expected: side.expected,
                    difference,
                })
            } else {
                None
            }
        })
        .collect();
    Ok(drift)
}

/// Rewrites drifting stock rows to the quantities implied by the entries.
/// Returns the pairs that were corrected.
pub async fn reconcile(db: &SqlitePool) -> AppResult<Vec<StockDrift>> {
    let mut tx = db::begin_write(db).await?;
    let drift = detect_drift(&mut *tx).await?;
    let now = now_utc();
    for d in &drift {
        if d.recorded.is_some() {
            sqlx::query(
                "UPDATE stocks SET quantity = ROUND(?1, 6), updated_at = ?2 \
                 WHERE medical_center_id = ?3 AND food_id = ?4",
            )
            .bind(d.expected)
            .bind(&now)
            .bind(d.medical_center.id.to_string())
            .bind(d.food.id.to_string())
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "INSERT INTO stocks (id, medical_center_id, food_id, quantity) VALUES (?1, ?2, ?3, ROUND(?4, 6))",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(d.medical_center.id.to_string())
            .bind(d.food.id.to_string())
            .bind(d.expected)
            .execute(&mut *tx)
            .await?;
        }
    }
    tx.commit().await?;
    if !drift.is_empty() {
        tracing::info!(corrected = drift.len(), "stock reconciled against entries");
    }
    Ok(drift)
}
