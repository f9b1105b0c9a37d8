use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::error::{validation, AppError, AppResult};
use crate::types::{now_utc, parse_id, Paging};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(AppError::Internal(anyhow::anyhow!("unknown role '{}' in database", other))),
        }
    }
}

/// A user as returned by the API. The password hash never leaves this module.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn validated(self) -> AppResult<Self> {
        validation::password(&self.password, "password")?;
        Ok(Self {
            name: validation::required_text(&self.name, "name", 150)?,
            email: validation::email(&self.email, "email")?,
            password: self.password,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

/// Admin-side create (`password` required) and update (`password` optional) payload.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
    pub role: Option<Role>,
}

impl UserInput {
    pub fn validated(self, password_required: bool) -> AppResult<Self> {
        let password = match self.password {
            Some(p) if !p.is_empty() => {
                validation::password(&p, "password")?;
                Some(p)
            }
            _ if password_required => {
                return Err(AppError::ValidationError {
                    field: "password".to_string(),
                    message: "Value is required".to_string(),
                })
            }
            _ => None,
        };
        Ok(Self {
            name: validation::required_text(&self.name, "name", 150)?,
            email: validation::email(&self.email, "email")?,
            password,
            role: self.role,
        })
    }
}

const SELECT: &str = "SELECT id, name, email, role, created_at, updated_at FROM users";

fn from_row(row: &SqliteRow) -> AppResult<User> {
    Ok(User {
        id: parse_id(row.get::<&str, _>("id"))?,
        name: row.get("name"),
        email: row.get("email"),
        role: row.get::<&str, _>("role").parse()?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub async fn find(db: &SqlitePool, id: Uuid) -> AppResult<Option<User>> {
    let row = sqlx::query(&format!("{} WHERE id = ?1", SELECT))
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;
    row.as_ref().map(from_row).transpose()
}

/// Looks a user up by e-mail (case-insensitive) together with the stored hash.
pub async fn find_credentials(db: &SqlitePool, email: &str) -> AppResult<Option<(User, String)>> {
    let row = sqlx::query(
        "SELECT id, name, email, role, created_at, updated_at, password_hash FROM users WHERE email = ?1",
    )
    .bind(email.trim().to_lowercase())
    .fetch_optional(db)
    .await?;
    match row {
        Some(row) => Ok(Some((from_row(&row)?, row.get("password_hash")))),
        None => Ok(None),
    }
}

pub async fn list(db: &SqlitePool, paging: Paging, search: Option<String>) -> AppResult<(Vec<User>, i64)> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM users WHERE 1=1");
    push_search(&mut count, &search);
    let total = count.build_query_scalar::<i64>().fetch_one(db).await?;

    let mut qb = QueryBuilder::<Sqlite>::new(SELECT);
    qb.push(" WHERE 1=1");
    push_search(&mut qb, &search);
    qb.push(" ORDER BY name COLLATE NOCASE LIMIT ").push_bind(paging.limit).push(" OFFSET ").push_bind(paging.offset());
    let rows = qb.build().fetch_all(db).await?;
    let items = rows.iter().map(from_row).collect::<AppResult<Vec<_>>>()?;
    Ok((items, total))
}

fn push_search(qb: &mut QueryBuilder<'_, Sqlite>, search: &Option<String>) {
    if let Some(p) = search {
        qb.push(" AND (name LIKE ")
            .push_bind(p.clone())
            .push(" ESCAPE '\\' OR email LIKE ")
            .push_bind(p.clone())
            .push(" ESCAPE '\\')");
    }
}

pub async fn list_for_export(db: &SqlitePool, max_rows: i64) -> AppResult<Vec<User>> {
    let rows = sqlx::query(&format!("{} ORDER BY name COLLATE NOCASE LIMIT ?1", SELECT))
        .bind(max_rows)
        .fetch_all(db)
        .await?;
    rows.iter().map(from_row).collect()
}

pub async fn insert(db: &SqlitePool, name: &str, email: &str, password_hash: &str, role: Role) -> AppResult<User> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, email, password_hash, role) VALUES (?1, ?2, ?3, ?4, ?5)")
        .bind(id.to_string())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .execute(db)
        .await?;
    find(db, id).await?.ok_or_else(|| anyhow::anyhow!("user {} vanished after insert", id).into())
}

/// Updates profile fields; the hash is only replaced when `password_hash` is given.
pub async fn update(
    db: &SqlitePool,
    id: Uuid,
    name: &str,
    email: &str,
    role: Role,
    password_hash: Option<&str>,
) -> AppResult<Option<User>> {
    let res = sqlx::query(
        "UPDATE users SET name = ?1, email = ?2, role = ?3, password_hash = COALESCE(?4, password_hash), \
         updated_at = ?5 WHERE id = ?6",
    )
    .bind(name)
    .bind(email)
    .bind(role.as_str())
    .bind(password_hash)
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
    let res = sqlx::query("DELETE FROM users WHERE id = ?1").bind(id.to_string()).execute(db).await?;
    Ok(res.rows_affected() > 0)
}
