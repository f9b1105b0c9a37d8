use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::push_like;
use crate::error::{validation, AppError, AppResult};
use crate::types::{now_utc, parse_id, Paging};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalCenter {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalCenterInput {
    pub name: String,
    pub address: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

impl MedicalCenterInput {
    /// A center must be reachable: at least one of `email` / `phoneNumber` is required.
    pub fn validated(self) -> AppResult<Self> {
        let email = match self.email.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(e) => Some(validation::email(e, "email")?),
        };
        let phone_number = validation::optional_text(self.phone_number.as_deref(), "phoneNumber", 40)?;
        if email.is_none() && phone_number.is_none() {
            return Err(AppError::ValidationError {
                field: "email".to_string(),
                message: "At least one contact method (email or phoneNumber) is required".to_string(),
            });
        }
        Ok(Self {
            name: validation::required_text(&self.name, "name", 150)?,
            address: validation::required_text(&self.address, "address", 300)?,
            email,
            phone_number,
        })
    }
}

const SELECT: &str = "SELECT id, name, address, email, phone_number, created_at, updated_at FROM medical_centers";

fn from_row(row: &SqliteRow) -> AppResult<MedicalCenter> {
    Ok(MedicalCenter {
        id: parse_id(row.get::<&str, _>("id"))?,
        name: row.get("name"),
        address: row.get("address"),
        email: row.get("email"),
        phone_number: row.get("phone_number"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub async fn find(db: &SqlitePool, id: Uuid) -> AppResult<Option<MedicalCenter>> {
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
) -> AppResult<(Vec<MedicalCenter>, i64)> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM medical_centers WHERE 1=1");
    push_like(&mut count, "name", &search);
    let total = count.build_query_scalar::<i64>().fetch_one(db).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(SELECT);
    qb.push(" WHERE 1=1");
    push_like(&mut qb, "name", &search);
    qb.push(" ORDER BY name COLLATE NOCASE LIMIT ").push_bind(paging.limit).push(" OFFSET ").push_bind(paging.offset());
    let rows = qb.build().fetch_all(db).await?;
    let items = rows.iter().map(from_row).collect::<AppResult<Vec<_>>>()?;
    Ok((items, total))
}

pub async fn list_for_export(db: &SqlitePool, max_rows: i64) -> AppResult<Vec<MedicalCenter>> {
    let rows = sqlx::query(&format!("{} ORDER BY name COLLATE NOCASE LIMIT ?1", SELECT))
        .bind(max_rows)
        .fetch_all(db)
        .await?;
    rows.iter().map(from_row).collect()
}

pub async fn insert(db: &SqlitePool, input: &MedicalCenterInput) -> AppResult<MedicalCenter> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO medical_centers (id, name, address, email, phone_number) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(id.to_string())
    .bind(&input.name)
    .bind(&input.address)
    .bind(&input.email)
    .bind(&input.phone_number)
    .execute(db)
    .await?;
    find(db, id).await?.ok_or_else(|| anyhow::anyhow!("medical center {} vanished after insert", id).into())
}

pub async fn update(db: &SqlitePool, id: Uuid, input: &MedicalCenterInput) -> AppResult<Option<MedicalCenter>> {
    let res = sqlx::query(
        "UPDATE medical_centers SET name = ?1, address = ?2, email = ?3, phone_number = ?4, updated_at = ?5 \
         WHERE id = ?6",
    )
    .bind(&input.name)
    .bind(&input.address)
    .bind(&input.email)
    .bind(&input.phone_number)
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
    let res = sqlx::query("DELETE FROM medical_centers WHERE id = ?1")
        .bind(id.to_string())
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
