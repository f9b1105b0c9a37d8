use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{push_id_eq, push_like, require_reference, Table};
use crate::error::{validation, AppError, AppResult};
use crate::inventory::completion::{self, PlanProgress};
use crate::types::{now_utc, parse_id, Paging, RefSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Weekly,
    Monthly,
    Annual,
}

impl PlanType {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanType::Weekly => "weekly",
            PlanType::Monthly => "monthly",
            PlanType::Annual => "annual",
        }
    }

    /// Only plans spanning more than a week group other plans.
    pub fn allows_children(self) -> bool {
        !matches!(self, PlanType::Weekly)
    }

    fn from_db(s: &str) -> AppResult<Self> {
        match s {
            "weekly" => Ok(PlanType::Weekly),
            "monthly" => Ok(PlanType::Monthly),
            "annual" => Ok(PlanType::Annual),
            other => Err(AppError::Internal(anyhow::anyhow!("unknown plan type '{}' in database", other))),
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    #[default]
    Active,
    Concluded,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Active => "active",
            PlanStatus::Concluded => "concluded",
        }
    }

    fn from_db(s: &str) -> AppResult<Self> {
        match s {
            "active" => Ok(PlanStatus::Active),
            "concluded" => Ok(PlanStatus::Concluded),
            other => Err(AppError::Internal(anyhow::anyhow!("unknown plan status '{}' in database", other))),
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedFood {
    pub food: RefSummary,
    pub provider: RefSummary,
    pub quantity: f64,
}

/// A budget of foods for one center over a period, with its completion report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodPlan {
    pub id: Uuid,
    pub name: String,
    pub medical_center: RefSummary,
    #[serde(rename = "type")]
    pub plan_type: PlanType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub planned_foods: Vec<PlannedFood>,
    pub status: PlanStatus,
    pub child_plans: Vec<Uuid>,
    #[serde(flatten)]
    pub progress: PlanProgress,
    pub created_at: String,
    pub updated_at: String,
}

impl FoodPlan {
    pub fn planned_total(&self) -> f64 {
        self.planned_foods.iter().map(|p| p.quantity).sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedFoodInput {
    pub food: Uuid,
    pub provider: Uuid,
    pub quantity: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodPlanInput {
    pub name: String,
    pub medical_center: Uuid,
    #[serde(rename = "type")]
    pub plan_type: PlanType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub planned_foods: Vec<PlannedFoodInput>,
    #[serde(default)]
    pub status: Option<PlanStatus>,
    #[serde(default)]
    pub child_plans: Vec<Uuid>,
}

fn invalid(field: &str, message: impl Into<String>) -> AppError {
    AppError::ValidationError { field: field.to_string(), message: message.into() }
}

impl FoodPlanInput {
    /// Field checks, reference lookups and the child plan rules.
    ///
    /// `plan_id` is the plan being updated, `None` on create.
    pub async fn validated(self, db: &SqlitePool, plan_id: Option<Uuid>) -> AppResult<Self> {
        let name = validation::required_text(&self.name, "name", 150)?;
        if self.end_date <= self.start_date {
            return Err(invalid("endDate", "endDate must be after startDate"));
        }
        if self.planned_foods.is_empty() {
            return Err(invalid("plannedFoods", "At least one planned food is required"));
        }
        for (i, item) in self.planned_foods.iter().enumerate() {
            validation::positive_quantity(item.quantity, &format!("plannedFoods[{}].quantity", i))?;
        }

        require_reference(db, Table::MedicalCenters, self.medical_center, "medicalCenter").await?;
        for (i, item) in self.planned_foods.iter().enumerate() {
            require_reference(db, Table::Foods, item.food, &format!("plannedFoods[{}].food", i)).await?;
            require_reference(db, Table::Providers, item.provider, &format!("plannedFoods[{}].provider", i)).await?;
        }

        let mut child_plans = self.child_plans;
        child_plans.sort();
        child_plans.dedup();
        if !child_plans.is_empty() && !self.plan_type.allows_children() {
            return Err(invalid("childPlans", format!("A {} plan cannot have child plans", self.plan_type)));
        }
        for child in &child_plans {
            if Some(*child) == plan_id {
                return Err(invalid("childPlans", "A plan cannot be its own child"));
            }
            let center: Option<String> = sqlx::query_scalar("SELECT medical_center_id FROM food_plans WHERE id = ?1")
                .bind(child.to_string())
                .fetch_optional(db)
                .await?;
            match center {
                None => return Err(invalid("childPlans", format!("{} does not reference an existing record", child))),
                Some(c) if c != self.medical_center.to_string() => {
                    return Err(invalid("childPlans", format!("Child plan {} belongs to a different medical center", child)))
                }
                Some(_) => {}
            }
            if let Some(id) = plan_id {
                if is_descendant(db, *child, id).await? {
                    return Err(invalid("childPlans", format!("Child plan {} already contains this plan", child)));
                }
            }
        }

        Ok(Self {
            name,
            medical_center: self.medical_center,
            plan_type: self.plan_type,
            start_date: self.start_date,
            end_date: self.end_date,
            planned_foods: self.planned_foods,
            status: self.status,
            child_plans,
        })
    }
}

/// Whether `target` is reachable from `root` through child links.
async fn is_descendant(db: &SqlitePool, root: Uuid, target: Uuid) -> AppResult<bool> {
    let found: bool = sqlx::query_scalar(
        "WITH RECURSIVE descendants(id) AS ( \
             SELECT child_id FROM food_plan_children WHERE parent_id = ?1 \
             UNION \
             SELECT c.child_id FROM food_plan_children c JOIN descendants d ON c.parent_id = d.id \
         ) SELECT EXISTS(SELECT 1 FROM descendants WHERE id = ?2)",
    )
    .bind(root.to_string())
    .bind(target.to_string())
    .fetch_one(db)
    .await?;
    Ok(found)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodPlanFilter {
    pub medical_center: Option<Uuid>,
    pub status: Option<PlanStatus>,
    #[serde(rename = "type")]
    pub plan_type: Option<PlanType>,
}

const SELECT: &str = "SELECT p.id, p.name, p.plan_type, p.start_date, p.end_date, p.status, \
     p.created_at, p.updated_at, p.medical_center_id, mc.name AS medical_center_name \
     FROM food_plans p JOIN medical_centers mc ON mc.id = p.medical_center_id";

fn from_row(row: &SqliteRow) -> AppResult<FoodPlan> {
    Ok(FoodPlan {
        id: parse_id(row.get::<&str, _>("id"))?,
        name: row.get("name"),
        medical_center: RefSummary {
            id: parse_id(row.get::<&str, _>("medical_center_id"))?,
            name: row.get("medical_center_name"),
        },
        plan_type: PlanType::from_db(row.get::<&str, _>("plan_type"))?,
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        planned_foods: Vec::new(),
        status: PlanStatus::from_db(row.get::<&str, _>("status"))?,
        child_plans: Vec::new(),
        progress: PlanProgress::default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn push_in_ids(qb: &mut QueryBuilder<'_, Sqlite>, plans: &[FoodPlan]) {
    let mut ids = qb.separated(", ");
    for p in plans {
        ids.push_bind(p.id.to_string());
    }
    ids.push_unseparated(")");
}

/// Fills items, child links and the completion report for a page of plans.
async fn hydrate(db: &SqlitePool, plans: &mut [FoodPlan]) -> AppResult<()> {
    if plans.is_empty() {
        return Ok(());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT i.food_plan_id, i.food_id, f.name AS food_name, i.provider_id, pr.name AS provider_name, i.quantity \
         FROM food_plan_items i \
         JOIN foods f ON f.id = i.food_id \
         JOIN providers pr ON pr.id = i.provider_id \
         WHERE i.food_plan_id IN (",
    );
    push_in_ids(&mut qb, plans);
    qb.push(" ORDER BY i.food_plan_id, i.position");
    let mut items: HashMap<Uuid, Vec<PlannedFood>> = HashMap::new();
    for row in qb.build().fetch_all(db).await? {
        items.entry(parse_id(row.get::<&str, _>("food_plan_id"))?).or_default().push(PlannedFood {
            food: RefSummary { id: parse_id(row.get::<&str, _>("food_id"))?, name: row.get("food_name") },
            provider: RefSummary { id: parse_id(row.get::<&str, _>("provider_id"))?, name: row.get("provider_name") },
            quantity: row.get("quantity"),
        });
    }

    let mut qb = QueryBuilder::<Sqlite>::new("SELECT parent_id, child_id FROM food_plan_children WHERE parent_id IN (");
    push_in_ids(&mut qb, plans);
    qb.push(" ORDER BY parent_id, child_id");
    let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in qb.build().fetch_all(db).await? {
        children
            .entry(parse_id(row.get::<&str, _>("parent_id"))?)
            .or_default()
            .push(parse_id(row.get::<&str, _>("child_id"))?);
    }

    let ids: Vec<Uuid> = plans.iter().map(|p| p.id).collect();
    let real = completion::real_totals(db, &ids).await?;

    for plan in plans.iter_mut() {
        plan.planned_foods = items.remove(&plan.id).unwrap_or_default();
        plan.child_plans = children.remove(&plan.id).unwrap_or_default();
        plan.progress = PlanProgress::new(plan.planned_total(), real.get(&plan.id).copied().unwrap_or(0.0));
    }
    Ok(())
}

pub async fn find(db: &SqlitePool, id: Uuid) -> AppResult<Option<FoodPlan>> {
    let row = sqlx::query(&format!("{} WHERE p.id = ?1", SELECT))
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut plans = vec![from_row(&row)?];
    hydrate(db, &mut plans).await?;
    Ok(plans.pop())
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, search: &Option<String>, filter: &FoodPlanFilter) {
    push_like(qb, "p.name", search);
    push_id_eq(qb, "p.medical_center_id", filter.medical_center);
    if let Some(status) = filter.status {
        qb.push(" AND p.status = ").push_bind(status.as_str());
    }
    if let Some(plan_type) = filter.plan_type {
        qb.push(" AND p.plan_type = ").push_bind(plan_type.as_str());
    }
}

pub async fn list(
    db: &SqlitePool,
    paging: Paging,
    search: Option<String>,
    filter: &FoodPlanFilter,
) -> AppResult<(Vec<FoodPlan>, i64)> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM food_plans p WHERE 1=1");
    push_filters(&mut count, &search, filter);
    let total = count.build_query_scalar::<i64>().fetch_one(db).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(SELECT);
    qb.push(" WHERE 1=1");
    push_filters(&mut qb, &search, filter);
    qb.push(" ORDER BY p.start_date DESC, p.name COLLATE NOCASE LIMIT ")
        .push_bind(paging.limit)
        .push(" OFFSET ")
        .push_bind(paging.offset());
    let rows = qb.build().fetch_all(db).await?;
    let mut plans = rows.iter().map(from_row).collect::<AppResult<Vec<_>>>()?;
    hydrate(db, &mut plans).await?;
    Ok((plans, total))
}

pub async fn list_for_export(db: &SqlitePool, max_rows: i64) -> AppResult<Vec<FoodPlan>> {
    let rows = sqlx::query(&format!("{} ORDER BY p.start_date DESC, p.name COLLATE NOCASE LIMIT ?1", SELECT))
        .bind(max_rows)
        .fetch_all(db)
        .await?;
    let mut plans = rows.iter().map(from_row).collect::<AppResult<Vec<_>>>()?;
    hydrate(db, &mut plans).await?;
    Ok(plans)
}

async fn write_children(conn: &mut SqliteConnection, id: Uuid, input: &FoodPlanInput) -> AppResult<()> {
    for (position, item) in input.planned_foods.iter().enumerate() {
        sqlx::query(
            "INSERT INTO food_plan_items (food_plan_id, position, food_id, provider_id, quantity) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id.to_string())
        .bind(position as i64)
        .bind(item.food.to_string())
        .bind(item.provider.to_string())
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }
    for child in &input.child_plans {
        sqlx::query("INSERT INTO food_plan_children (parent_id, child_id) VALUES (?1, ?2)")
            .bind(id.to_string())
            .bind(child.to_string())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn insert(db: &SqlitePool, input: &FoodPlanInput) -> AppResult<FoodPlan> {
    let id = Uuid::new_v4();
    let mut tx = db.begin().await?;
    sqlx::query(
        "INSERT INTO food_plans (id, name, medical_center_id, plan_type, start_date, end_date, status) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(id.to_string())
    .bind(&input.name)
    .bind(input.medical_center.to_string())
    .bind(input.plan_type.as_str())
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.status.unwrap_or_default().as_str())
    .execute(&mut *tx)
    .await?;
    write_children(&mut *tx, id, input).await?;
    tx.commit().await?;
    find(db, id).await?.ok_or_else(|| anyhow::anyhow!("food plan {} vanished after insert", id).into())
}

/// Replaces the plan, its items and its child links. A missing `status` keeps the stored one.
///
/// The medical center can only change while no food entry and no parent plan
/// references the plan; both must share its center.
pub async fn update(db: &SqlitePool, id: Uuid, input: &FoodPlanInput) -> AppResult<Option<FoodPlan>> {
    let mut tx = crate::db::begin_write(db).await?;
    let current: Option<String> = sqlx::query_scalar("SELECT medical_center_id FROM food_plans WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await?;
    let Some(current) = current else {
        return Ok(None);
    };
    if current != input.medical_center.to_string() {
        ensure_center_movable(&mut *tx, id).await?;
    }

    let res = sqlx::query(
        "UPDATE food_plans SET name = ?1, medical_center_id = ?2, plan_type = ?3, start_date = ?4, end_date = ?5, \
         status = COALESCE(?6, status), updated_at = ?7 WHERE id = ?8",
    )
    .bind(&input.name)
    .bind(input.medical_center.to_string())
    .bind(input.plan_type.as_str())
    .bind(input.start_date)
    .bind(input.end_date)
    .bind(input.status.map(PlanStatus::as_str))
    .bind(now_utc())
    .bind(id.to_string())
    .execute(&mut *tx)
    .await?;
    if res.rows_affected() == 0 {
        return Ok(None);
    }
    sqlx::query("DELETE FROM food_plan_items WHERE food_plan_id = ?1")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM food_plan_children WHERE parent_id = ?1")
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
    write_children(&mut *tx, id, input).await?;
    tx.commit().await?;
    find(db, id).await
}

async fn ensure_center_movable(conn: &mut SqliteConnection, id: Uuid) -> AppResult<()> {
    let (entries, parents): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM food_entries WHERE food_plan_id = ?1), \
                (SELECT COUNT(*) FROM food_plan_children WHERE child_id = ?1)",
    )
    .bind(id.to_string())
    .fetch_one(&mut *conn)
    .await?;
    if entries > 0 {
        return Err(invalid(
            "medicalCenter",
            format!("The plan has {} food entries at its current medical center", entries),
        ));
    }
    if parents > 0 {
        return Err(invalid("medicalCenter", "The plan is a child of a plan at its current medical center"));
    }
    Ok(())
}

/// Items and child links cascade; plans still referenced by entries are kept (409).
pub async fn delete(db: &SqlitePool, id: Uuid) -> AppResult<bool> {
    let res = sqlx::query("DELETE FROM food_plans WHERE id = ?1").bind(id.to_string()).execute(db).await?;
    Ok(res.rows_affected() > 0)
}
