//! Cashier account management and administrator password changes.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::auth::{self, validate_new_password};
use crate::db::DbState;
use crate::error::AppError;
use crate::models::{Cashier, CASHIER_COLUMNS};

const MAX_USERNAME_LEN: usize = 80;

pub fn find_cashier(conn: &Connection, id: i64) -> Result<Option<Cashier>, AppError> {
    let sql = format!("SELECT {CASHIER_COLUMNS} FROM cashiers WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id], Cashier::from_row)
        .optional()?)
}

pub fn find_cashier_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<Cashier>, AppError> {
    let sql = format!("SELECT {CASHIER_COLUMNS} FROM cashiers WHERE username = ?1");
    Ok(conn
        .query_row(&sql, params![username], Cashier::from_row)
        .optional()?)
}

pub fn list_cashiers(conn: &Connection) -> Result<Vec<Cashier>, AppError> {
    let sql = format!("SELECT {CASHIER_COLUMNS} FROM cashiers ORDER BY created_at, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], Cashier::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Validation and hashing run with the connection released; the duplicate
/// check is repeated under the lock that performs the insert.
pub fn create_cashier(
    db: &DbState,
    username: &str,
    password: &str,
    bcrypt_cost: u32,
) -> Result<Cashier, AppError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::invalid("帳號不可為空"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::invalid("帳號過長"));
    }
    validate_new_password(password)?;
    if find_cashier_by_username(&*db.lock()?, username)?.is_some() {
        return Err(AppError::Conflict("帳號已存在".into()));
    }

    let hash = auth::hash_password(password, bcrypt_cost)?;

    let conn = db.lock()?;
    if find_cashier_by_username(&conn, username)?.is_some() {
        return Err(AppError::Conflict("帳號已存在".into()));
    }
    conn.execute(
        "INSERT INTO cashiers (username, password_hash, is_active, created_at)
         VALUES (?1, ?2, 1, ?3)",
        params![username, hash, crate::db::now_timestamp()],
    )?;
    let id = conn.last_insert_rowid();
    info!(cashier_id = id, username = %username, "cashier account created");
    find_cashier(&conn, id)?.ok_or(AppError::NotFound("收銀員"))
}

pub fn set_cashier_active(conn: &Connection, id: i64, active: bool) -> Result<(), AppError> {
    let changed = conn.execute(
        "UPDATE cashiers SET is_active = ?1 WHERE id = ?2",
        params![active, id],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound("收銀員"));
    }
    info!(cashier_id = id, active, "cashier activation changed");
    Ok(())
}

pub fn reset_cashier_password(
    db: &DbState,
    id: i64,
    password: &str,
    bcrypt_cost: u32,
) -> Result<(), AppError> {
    validate_new_password(password)?;
    let hash = auth::hash_password(password, bcrypt_cost)?;
    let changed = db.lock()?.execute(
        "UPDATE cashiers SET password_hash = ?1 WHERE id = ?2",
        params![hash, id],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound("收銀員"));
    }
    Ok(())
}

/// Remove a cashier. Orders they rang up keep their data with `cashier_id` cleared.
pub fn delete_cashier(conn: &Connection, id: i64) -> Result<Cashier, AppError> {
    let cashier = find_cashier(conn, id)?.ok_or(AppError::NotFound("收銀員"))?;
    conn.execute("DELETE FROM cashiers WHERE id = ?1", params![id])?;
    info!(cashier_id = id, username = %cashier.username, "cashier account deleted");
    Ok(cashier)
}

pub fn change_admin_password(
    db: &DbState,
    admin_id: i64,
    old_password: &str,
    new_password: &str,
    bcrypt_cost: u32,
) -> Result<(), AppError> {
    let current: String = db
        .lock()?
        .query_row(
            "SELECT password_hash FROM admins WHERE id = ?1",
            params![admin_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(AppError::NotFound("管理員"))?;
    if !auth::verify_password(old_password, &current) {
        return Err(AppError::InvalidCredentials);
    }
    validate_new_password(new_password)?;
    let hash = auth::hash_password(new_password, bcrypt_cost)?;
    db.lock()?.execute(
        "UPDATE admins SET password_hash = ?1 WHERE id = ?2",
        params![hash, admin_id],
    )?;
    info!(admin_id, "admin password changed");
    Ok(())
}
