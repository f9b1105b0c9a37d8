use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::push_like;
use crate::error::{validation, AppResult};
use crate::types::{now_utc, parse_id, Paging};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInput {
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

impl ProviderInput {
    pub fn validated(self) -> AppResult<Self> {
        let email = match self.email.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(e) => Some(validation::email(e, "email")?),
        };
        Ok(Self {
            name: validation::required_text(&self.name, "name", 150)?,
            contact_person: validation::optional_text(self.contact_person.as_deref(), "contactPerson", 150)?,
            email,
            phone_number: validation::optional_text(self.phone_number.as_deref(), "phoneNumber", 40)?,
            address: validation::optional_text(self.address.as_deref(), "address", 300)?,
        })
    }
}

const SELECT: &str =
    "SELECT id, name, contact_person, email, phone_number, address, created_at, updated_at FROM providers";

fn from_row(row: &SqliteRow) -> AppResult<Provider> {
    Ok(Provider {
        id: parse_id(row.get::<&str, _>("id"))?,
        name: row.get("name"),
        contact_person: row.get("contact_person"),
        email: row.get("email"),
        phone_number: row.get("phone_number"),
        address: row.get("address"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub async fn find(db: &SqlitePool, id: Uuid) -> AppResult<Option<Provider>> {
    let row = sqlx::query(&format!("{} WHERE id = ?1", SELECT))
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;
    row.as_ref().map(from_row).transpose()
}

pub async fn list(db: &SqlitePool, paging: Paging, search: Option<String>) -> AppResult<(Vec<Provider>, i64)> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM providers WHERE 1=1");
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

pub async fn list_for_export(db: &SqlitePool, max_rows: i64) -> AppResult<Vec<Provider>> {
    let rows = sqlx::query(&format!("{} ORDER BY name COLLATE NOCASE LIMIT ?1", SELECT))
        .bind(max_rows)
        .fetch_all(db)
        .await?;
    rows.iter().map(from_row).collect()
}

pub async fn insert(db: &SqlitePool, input: &ProviderInput) -> AppResult<Provider> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO providers (id, name, contact_person, email, phone_number, address) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(id.to_string())
    .bind(&input.name)
    .bind(&input.contact_person)
    .bind(&input.email)
    .bind(&input.phone_number)
    .bind(&input.address)
    .execute(db)
    .await?;
    find(db, id).await?.ok_or_else(|| anyhow::anyhow!("provider {} vanished after insert", id).into())
}

pub async fn update(db: &SqlitePool, id: Uuid, input: &ProviderInput) -> AppResult<Option<Provider>> {
    let res = sqlx::query(
        "UPDATE providers SET name = ?1, contact_person = ?2, email = ?3, phone_number = ?4, address = ?5, \
         updated_at = ?6 WHERE id = ?7",
    )
    .bind(&input.name)
    .bind(&input.contact_person)
    .bind(&input.email)
    .bind(&input.phone_number)
    .bind(&input.address)
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
    let res = sqlx::query("DELETE FROM providers WHERE id = ?1").bind(id.to_string()).execute(db).await?;
    Ok(res.rows_affected() > 0)
}
