use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::auth::password;
use crate::config::AuthConfig;

const TABLES: &[(&str, &str)] = &[
    (
        "users",
        r#"CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK (role IN ('admin', 'user')),
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "units_of_measurement",
        r#"CREATE TABLE IF NOT EXISTS units_of_measurement (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            symbol TEXT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "foods",
        r#"CREATE TABLE IF NOT EXISTS foods (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            unit_id TEXT NOT NULL,
            description TEXT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(unit_id) REFERENCES units_of_measurement(id) ON DELETE RESTRICT
        )"#,
    ),
    (
        "providers",
        r#"CREATE TABLE IF NOT EXISTS providers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            contact_person TEXT NULL,
            email TEXT NULL,
            phone_number TEXT NULL,
            address TEXT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "medical_centers",
        r#"CREATE TABLE IF NOT EXISTS medical_centers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            address TEXT NOT NULL,
            email TEXT NULL,
            phone_number TEXT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            CHECK (email IS NOT NULL OR phone_number IS NOT NULL)
        )"#,
    ),
    (
        "food_plans",
        r#"CREATE TABLE IF NOT EXISTS food_plans (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            medical_center_id TEXT NOT NULL,
            plan_type TEXT NOT NULL CHECK (plan_type IN ('weekly', 'monthly', 'annual')),
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'concluded')),
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            CHECK (end_date > start_date),
            FOREIGN KEY(medical_center_id) REFERENCES medical_centers(id) ON DELETE RESTRICT
        )"#,
    ),
    (
        "food_plan_items",
        r#"CREATE TABLE IF NOT EXISTS food_plan_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            food_plan_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            food_id TEXT NOT NULL,
            provider_id TEXT NOT NULL,
            quantity REAL NOT NULL CHECK (quantity > 0),
            FOREIGN KEY(food_plan_id) REFERENCES food_plans(id) ON DELETE CASCADE,
            FOREIGN KEY(food_id) REFERENCES foods(id) ON DELETE RESTRICT,
            FOREIGN KEY(provider_id) REFERENCES providers(id) ON DELETE RESTRICT
        )"#,
    ),
    (
        "food_plan_children",
        r#"CREATE TABLE IF NOT EXISTS food_plan_children (
            parent_id TEXT NOT NULL,
            child_id TEXT NOT NULL,
            PRIMARY KEY (parent_id, child_id),
            CHECK (parent_id <> child_id),
            FOREIGN KEY(parent_id) REFERENCES food_plans(id) ON DELETE CASCADE,
            FOREIGN KEY(child_id) REFERENCES food_plans(id) ON DELETE CASCADE
        )"#,
    ),
    (
        "food_entries",
        r#"CREATE TABLE IF NOT EXISTS food_entries (
            id TEXT PRIMARY KEY,
            medical_center_id TEXT NOT NULL,
            provider_id TEXT NOT NULL,
            food_plan_id TEXT NOT NULL,
            entry_date TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            FOREIGN KEY(medical_center_id) REFERENCES medical_centers(id) ON DELETE RESTRICT,
            FOREIGN KEY(provider_id) REFERENCES providers(id) ON DELETE RESTRICT,
            FOREIGN KEY(food_plan_id) REFERENCES food_plans(id) ON DELETE RESTRICT
        )"#,
    ),
    (
        "food_entry_items",
        r#"CREATE TABLE IF NOT EXISTS food_entry_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            food_entry_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            food_id TEXT NOT NULL,
            quantity REAL NOT NULL CHECK (quantity > 0),
            FOREIGN KEY(food_entry_id) REFERENCES food_entries(id) ON DELETE CASCADE,
            FOREIGN KEY(food_id) REFERENCES foods(id) ON DELETE RESTRICT
        )"#,
    ),
    (
        "stocks",
        r#"CREATE TABLE IF NOT EXISTS stocks (
            id TEXT PRIMARY KEY,
            medical_center_id TEXT NOT NULL,
            food_id TEXT NOT NULL,
            quantity REAL NOT NULL DEFAULT 0 CHECK (quantity >= 0),
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            UNIQUE (medical_center_id, food_id),
            FOREIGN KEY(medical_center_id) REFERENCES medical_centers(id) ON DELETE RESTRICT,
            FOREIGN KEY(food_id) REFERENCES foods(id) ON DELETE RESTRICT
        )"#,
    ),
];

const INDEXES: &[(&str, &str)] = &[
    ("idx_foods_unit", "CREATE INDEX IF NOT EXISTS idx_foods_unit ON foods(unit_id)"),
    ("idx_food_plans_center", "CREATE INDEX IF NOT EXISTS idx_food_plans_center ON food_plans(medical_center_id, status)"),
    ("idx_food_plan_items_plan", "CREATE INDEX IF NOT EXISTS idx_food_plan_items_plan ON food_plan_items(food_plan_id, position)"),
    ("idx_food_plan_children_child", "CREATE INDEX IF NOT EXISTS idx_food_plan_children_child ON food_plan_children(child_id)"),
    ("idx_food_entries_plan", "CREATE INDEX IF NOT EXISTS idx_food_entries_plan ON food_entries(food_plan_id)"),
    ("idx_food_entries_center_date", "CREATE INDEX IF NOT EXISTS idx_food_entries_center_date ON food_entries(medical_center_id, entry_date DESC)"),
    ("idx_food_entry_items_entry", "CREATE INDEX IF NOT EXISTS idx_food_entry_items_entry ON food_entry_items(food_entry_id, position)"),
    ("idx_food_entry_items_food", "CREATE INDEX IF NOT EXISTS idx_food_entry_items_food ON food_entry_items(food_id)"),
    ("idx_stocks_food", "CREATE INDEX IF NOT EXISTS idx_stocks_food ON stocks(food_id)"),
];

/// Opens the pool, creating the database file when it does not exist yet.
pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    if !Sqlite::database_exists(url).await.unwrap_or(false) {
        tracing::info!("Creating SQLite database at {}", url);
        Sqlite::create_database(url).await?;
    }
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys=ON;").execute(&mut *conn).await?;
                let _ = sqlx::query("PRAGMA busy_timeout=10000;").execute(&mut *conn).await;
                let _ = sqlx::query("PRAGMA temp_store=MEMORY;").execute(&mut *conn).await;
                Ok(())
            })
        })
        .connect(url)
        .await?;
    Ok(pool)
}

/// Begins a transaction that holds the write lock from its first statement.
///
/// In WAL mode a deferred transaction that has already read cannot be promoted
/// to a writer after another connection commits; SQLite answers `SQLITE_BUSY`
/// without waiting on the busy timeout. Transactions that read before they write
/// start here so concurrent writers queue on the lock instead.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    // Any write statement takes the lock, even one that matches no rows
    sqlx::query("UPDATE stocks SET quantity = quantity WHERE 0").execute(&mut *tx).await?;
    Ok(tx)
}

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    // Foreign keys carry the reference integrity - fail if this doesn't work
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;
    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }

    for (name, ddl) in TABLES {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("creating table {} failed: {}", name, e))?;
    }

    for (name, query) in INDEXES {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            match &e {
                sqlx::Error::Database(db_err) if db_err.message().to_lowercase().contains("already exists") => {
                    tracing::debug!("Index {} already exists, skipping", name);
                }
                _ => tracing::warn!("Failed to create index {}: {}", name, e),
            }
        }
    }

    Ok(())
}

/// Creates the configured admin account when the database has no admin yet.
///
/// Returns `true` if an account was created.
pub async fn seed_admin(pool: &SqlitePool, auth: &AuthConfig) -> anyhow::Result<bool> {
    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'admin'")
        .fetch_one(pool)
        .await?;
    if admins > 0 {
        return Ok(false);
    }

    let hash = password::hash(&auth.admin_password, auth.bcrypt_cost)
        .await
        .map_err(|e| anyhow::anyhow!("hashing bootstrap admin password failed: {}", e))?;
    let result = sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role) VALUES (?1, ?2, ?3, ?4, 'admin') \
         ON CONFLICT(email) DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&auth.admin_name)
    .bind(auth.admin_email.trim().to_lowercase())
    .bind(hash)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        tracing::warn!(
            "No admin account exists but {} is already taken by a non-admin user; skipping bootstrap",
            auth.admin_email
        );
        return Ok(false);
    }
    tracing::info!("Created bootstrap admin account {}", auth.admin_email);
    Ok(true)
}
