//! Planned-versus-real reporting for food plans.
//!
//! Planned quantities come from the plan's items, real quantities from the
//! entries that reference the plan. Nothing here is stored; every report is
//! computed when it is read.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::food_plan::FoodPlan;
use crate::types::{parse_id, RefSummary};

/// `real / planned * 100` rounded to two decimals; zero when nothing was planned.
pub fn percentage(real: f64, planned: f64) -> f64 {
    if planned <= 0.0 {
        return 0.0;
    }
    (real / planned * 10_000.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanProgress {
    pub planned_total: f64,
    pub real_total: f64,
    pub percentage_completed: f64,
}

impl PlanProgress {
    pub fn new(planned_total: f64, real_total: f64) -> Self {
        Self { planned_total, real_total, percentage_completed: percentage(real_total, planned_total) }
    }
}

/// Sum of entered quantities per plan, for all `plan_ids` in one grouped query.
/// Plans without entries are absent from the map.
pub async fn real_totals(db: &SqlitePool, plan_ids: &[Uuid]) -> AppResult<HashMap<Uuid, f64>> {
    let mut totals = HashMap::new();
    if plan_ids.is_empty() {
        return Ok(totals);
    }
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT e.food_plan_id, SUM(i.quantity) AS total \
         FROM food_entries e JOIN food_entry_items i ON i.food_entry_id = e.id \
         WHERE e.food_plan_id IN (",
    );
    let mut ids = qb.separated(", ");
    for id in plan_ids {
        ids.push_bind(id.to_string());
    }
    ids.push_unseparated(") GROUP BY e.food_plan_id");
    for row in qb.build().fetch_all(db).await? {
        totals.insert(parse_id(row.get::<&str, _>("food_plan_id"))?, row.get::<f64, _>("total"));
    }
    Ok(totals)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodProgress {
    pub food: RefSummary,
    pub planned: f64,
    pub real: f64,
    pub percentage_completed: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealVsPlanned {
    pub food_plan: RefSummary,
    pub foods: Vec<FoodProgress>,
    #[serde(flatten)]
    pub totals: PlanProgress,
}

/// Per-food breakdown of a plan.
///
/// Foods keep the order of the plan's items (quantities from several providers
/// are summed); foods that were delivered but never planned follow, by name.
pub async fn real_vs_planned(db: &SqlitePool, plan: &FoodPlan) -> AppResult<RealVsPlanned> {
    let mut foods: Vec<FoodProgress> = Vec::new();
    for item in &plan.planned_foods {
        match foods.iter_mut().find(|f| f.food.id == item.food.id) {
            Some(f) => f.planned += item.quantity,
            None => foods.push(FoodProgress {
                food: item.food.clone(),
                planned: item.quantity,
                real: 0.0,
                percentage_completed: 0.0,
            }),
        }
    }

    let rows = sqlx::query(
        "SELECT i.food_id, f.name AS food_name, SUM(i.quantity) AS total \
         FROM food_entries e \
         JOIN food_entry_items i ON i.food_entry_id = e.id \
         JOIN foods f ON f.id = i.food_id \
         WHERE e.food_plan_id = ?1 \
         GROUP BY i.food_id, f.name ORDER BY f.name COLLATE NOCASE",
    )
    .bind(plan.id.to_string())
    .fetch_all(db)
    .await?;

    for row in &rows {
        let food_id = parse_id(row.get::<&str, _>("food_id"))?;
        let total: f64 = row.get("total");
        match foods.iter_mut().find(|f| f.food.id == food_id) {
            Some(f) => f.real = total,
            None => foods.push(FoodProgress {
                food: RefSummary { id: food_id, name: row.get("food_name") },
                planned: 0.0,
                real: total,
                percentage_completed: 0.0,
            }),
        }
    }

    for f in &mut foods {
        f.percentage_completed = percentage(f.real, f.planned);
    }
    let planned_total = foods.iter().map(|f| f.planned).sum();
    let real_total = foods.iter().map(|f| f.real).sum();

    Ok(RealVsPlanned {
        food_plan: RefSummary { id: plan.id, name: plan.name.clone() },
        foods,
        totals: PlanProgress::new(planned_total, real_total),
    })
}
