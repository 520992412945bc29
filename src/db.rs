//! SQLite database layer for the restaurant POS.
//!
//! Uses rusqlite with WAL mode. Provides schema migrations, settings helpers,
//! first-run seeding, and the shared connection handle used by every route.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::auth;
use crate::error::AppError;
use crate::models::ProductDraft;

/// Shared state holding the database connection.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

impl DbState {
    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn.lock().map_err(|_| AppError::LockPoisoned)
    }
}

/// Current schema version. Bump when adding new migrations.
const CURRENT_SCHEMA_VERSION: i32 = 3;

/// Open (or create) the database file at `db_path` and run pending migrations.
///
/// Creates the parent directory if needed. A file that cannot be opened or
/// configured is left untouched and the error is returned.
pub fn init(db_path: &Path) -> Result<DbState, AppError> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Config(format!("Failed to create data dir: {e}")))?;
    }

    info!("Opening database at {}", db_path.display());

    let conn = open_and_configure(db_path).inspect_err(|e| {
        error!("Failed to open database at {}: {e}", db_path.display());
    })?;

    run_migrations(&conn)?;

    info!("Database initialized (schema v{CURRENT_SCHEMA_VERSION})");

    Ok(DbState {
        conn: Mutex::new(conn),
        db_path: db_path.to_path_buf(),
    })
}

/// In-memory database with the full schema, for tests and throwaway demos.
pub fn open_in_memory() -> Result<DbState, AppError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )?;
    run_migrations(&conn)?;
    Ok(DbState {
        conn: Mutex::new(conn),
        db_path: PathBuf::from(":memory:"),
    })
}

/// Open the database file and apply pragmas.
fn open_and_configure(path: &Path) -> Result<Connection, AppError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(conn)
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Storage format for every `created_at` column: fixed-width UTC RFC 3339,
/// so `WHERE created_at >= ?` compares correctly as text.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}

// ---------------------------------------------------------------------------
// Migrations
// ---------------------------------------------------------------------------

/// Run all pending migrations up to `CURRENT_SCHEMA_VERSION`.
fn run_migrations(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT (datetime('now'))
        );",
    )?;

    let current: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current >= CURRENT_SCHEMA_VERSION {
        info!("Database schema up to date (v{current})");
        return Ok(());
    }

    info!("Migrating database from v{current} to v{CURRENT_SCHEMA_VERSION}");

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }
    if current < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn apply(conn: &Connection, version: i32, sql: &str) -> Result<(), AppError> {
    conn.execute_batch(sql).map_err(|e| {
        error!("Migration v{version} failed: {e}");
        AppError::Database(e)
    })
}

/// Migration v1: menu, orders and the administrator account.
fn migrate_v1(conn: &Connection) -> Result<(), AppError> {
    apply(
        conn,
        1,
        "
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            price REAL NOT NULL,
            image_url TEXT NOT NULL DEFAULT 'https://via.placeholder.com/200x150?text=食物圖片',
            stock INTEGER NOT NULL DEFAULT 99,
            category TEXT NOT NULL DEFAULT '主餐'
        );

        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_name TEXT NOT NULL,
            customer_phone TEXT,
            order_items TEXT NOT NULL,
            total_price REAL NOT NULL,
            status TEXT NOT NULL DEFAULT '待處理'
                CHECK (status IN ('待處理', '製作中', '完成')),
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS admins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
        CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders(created_at);
        CREATE INDEX IF NOT EXISTS idx_products_category ON products(category);

        INSERT INTO schema_version (version) VALUES (1);
        ",
    )?;

    info!("Applied migration v1");
    Ok(())
}

/// Migration v2: cashier accounts, audit trail and key/value settings.
fn migrate_v2(conn: &Connection) -> Result<(), AppError> {
    apply(
        conn,
        2,
        "
        CREATE TABLE IF NOT EXISTS cashiers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS operation_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_type TEXT NOT NULL CHECK (user_type IN ('admin', 'cashier')),
            user_id INTEGER NOT NULL,
            action TEXT NOT NULL,
            details TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS system_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_operation_logs_created_at ON operation_logs(created_at);
        CREATE INDEX IF NOT EXISTS idx_operation_logs_user ON operation_logs(user_type, user_id);

        INSERT INTO schema_version (version) VALUES (2);
        ",
    )?;

    info!("Applied migration v2 (cashiers, operation_logs, system_settings)");
    Ok(())
}

/// Check whether a column exists on a table.
fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, AppError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .collect::<Vec<_>>();
    Ok(names.iter().any(|n| n == column))
}

/// Migration v3: counter orders, dine-in flag and new-order notification.
fn migrate_v3(conn: &Connection) -> Result<(), AppError> {
    if !column_exists(conn, "orders", "cashier_id")? {
        apply(
            conn,
            3,
            "ALTER TABLE orders ADD COLUMN cashier_id INTEGER REFERENCES cashiers(id) ON DELETE SET NULL;",
        )?;
    }
    if !column_exists(conn, "orders", "dine_in")? {
        apply(
            conn,
            3,
            "ALTER TABLE orders ADD COLUMN dine_in INTEGER NOT NULL DEFAULT 1;",
        )?;
    }
    if !column_exists(conn, "orders", "notified")? {
        apply(
            conn,
            3,
            "ALTER TABLE orders ADD COLUMN notified INTEGER NOT NULL DEFAULT 0;",
        )?;
    }
    apply(
        conn,
        3,
        "
        CREATE INDEX IF NOT EXISTS idx_orders_pending_notified ON orders(status, notified, created_at);
        INSERT INTO schema_version (version) VALUES (3);
        ",
    )?;

    info!("Applied migration v3 (orders.cashier_id, dine_in, notified)");
    Ok(())
}

// ---------------------------------------------------------------------------
// Settings helpers
// ---------------------------------------------------------------------------

/// Get a single setting value.
pub fn get_setting(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row(
        "SELECT value FROM system_settings WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .ok()
}

/// Insert or update a setting.
pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO system_settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// Insert a setting only when the key is not present yet.
pub fn set_setting_if_missing(conn: &Connection, key: &str, value: &str) -> Result<(), AppError> {
    conn.execute(
        "INSERT OR IGNORE INTO system_settings (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

/// All settings, ordered by key.
pub fn get_all_settings(conn: &Connection) -> Result<BTreeMap<String, String>, AppError> {
    let mut stmt = conn.prepare("SELECT key, value FROM system_settings ORDER BY key")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut result = BTreeMap::new();
    for (key, value) in rows.flatten() {
        result.insert(key, value);
    }
    Ok(result)
}

/// Delete a single setting. Returns whether a row was removed.
pub fn delete_setting(conn: &Connection, key: &str) -> Result<bool, AppError> {
    let removed = conn.execute("DELETE FROM system_settings WHERE key = ?1", params![key])?;
    Ok(removed > 0)
}

// ---------------------------------------------------------------------------
// First-run seeding
// ---------------------------------------------------------------------------

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "123456";

const SAMPLE_MENU: &[(&str, f64, &str, &str)] = &[
    ("牛肉漢堡", 120.0, "漢堡", "photo-1568901346375-23c9450c58cd"),
    ("雞肉漢堡", 100.0, "漢堡", "photo-1571091718767-18b5b1457add"),
    ("魚肉漢堡", 110.0, "漢堡", "photo-1553979459-d2229ba7433a"),
    ("薯條", 60.0, "配餐", "photo-1573080496219-bb080dd4f877"),
    ("雞塊", 80.0, "配餐", "photo-1562967914-608f82629710"),
    ("可樂", 30.0, "飲品", "photo-1581636625402-29b2a704ef13"),
    ("咖啡", 50.0, "飲品", "photo-1509042239860-f550ce710b93"),
    ("奶茶", 45.0, "飲品", "photo-1578662996442-48f60103fc96"),
    ("義大利麵", 150.0, "主餐", "photo-1563379091339-03246963d51a"),
    ("炒飯", 90.0, "主餐", "photo-1512058564366-18510be2db19"),
    ("沙拉", 85.0, "輕食", "photo-1512621776951-a57141f2eefd"),
    ("三明治", 75.0, "輕食", "photo-1539252554453-80ab65ce3586"),
    ("比薩", 180.0, "主餐", "photo-1565299624946-b28f40a0ca4b"),
    ("湯品", 40.0, "配餐", "photo-1547592180-85f173990554"),
    ("甜點", 65.0, "甜點", "photo-1551024506-0bccd828d307"),
    ("冰淇淋", 55.0, "甜點", "photo-1567206563064-6f60f40a2b57"),
    ("蛋糕", 85.0, "甜點", "photo-1578985545062-69928b1d9587"),
    ("果汁", 40.0, "飲品", "photo-1613478223719-2ab802602423"),
    ("熱狗", 70.0, "輕食", "photo-1552945382-0ca55e2fe2d9"),
    ("烤雞翅", 95.0, "配餐", "photo-1527477396000-e27163b481c2"),
];

fn sample_image_url(photo: &str) -> String {
    format!("https://images.unsplash.com/{photo}?w=300&h=200&fit=crop")
}

/// Seed the default administrator, the sample menu and default settings.
///
/// Each part is only written when its table is still empty, so running this
/// on every start is safe.
pub fn seed_defaults(conn: &Connection, bcrypt_cost: u32) -> Result<(), AppError> {
    let admin_exists: Option<i64> = conn
        .query_row("SELECT id FROM admins LIMIT 1", [], |row| row.get(0))
        .optional()?;
    if admin_exists.is_none() {
        let hash = auth::hash_password(DEFAULT_ADMIN_PASSWORD, bcrypt_cost)?;
        conn.execute(
            "INSERT INTO admins (username, password_hash) VALUES (?1, ?2)",
            params![DEFAULT_ADMIN_USERNAME, hash],
        )?;
        warn!(
            username = DEFAULT_ADMIN_USERNAME,
            "created default administrator account; change its password"
        );
    }

    let product_exists: Option<i64> = conn
        .query_row("SELECT id FROM products LIMIT 1", [], |row| row.get(0))
        .optional()?;
    if product_exists.is_none() {
        for (name, price, category, photo) in SAMPLE_MENU {
            let draft = ProductDraft::new(*name, *price, *category).with_image(sample_image_url(photo));
            crate::products::insert(conn, &draft)?;
        }
        info!(count = SAMPLE_MENU.len(), "seeded sample menu");
    }

    set_setting_if_missing(conn, crate::settings::STORE_NAME_KEY, crate::settings::DEFAULT_STORE_NAME)?;
    set_setting_if_missing(
        conn,
        crate::settings::POLL_INTERVAL_KEY,
        &crate::settings::DEFAULT_POLL_INTERVAL_SECONDS.to_string(),
    )?;

    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
