//! Password-based staff authentication with bcrypt.
//!
//! Administrators and cashiers live in separate tables. A successful login
//! yields a [`StaffIdentity`] that the session layer keeps for the browser;
//! every gated route re-checks it through [`require_admin`] or
//! [`require_staff`]. Cashier accounts can be disabled by an administrator,
//! which takes effect on the cashier's next request.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::DbState;
use crate::error::AppError;
use crate::models::{Admin, StaffRole};

pub const MIN_PASSWORD_LEN: usize = 6;

/// The logged-in staff member attached to a browser session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffIdentity {
    pub role: StaffRole,
    pub user_id: i64,
    pub username: String,
    pub login_time: DateTime<Utc>,
}

impl StaffIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == StaffRole::Admin
    }

    /// Cashier id to stamp on counter orders.
    pub fn cashier_id(&self) -> Option<i64> {
        (self.role == StaffRole::Cashier).then_some(self.user_id)
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, cost)?)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

pub fn validate_new_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::invalid(format!(
            "密碼至少需要 {MIN_PASSWORD_LEN} 個字元"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

fn find_admin(conn: &Connection, username: &str) -> Result<Option<Admin>, AppError> {
    Ok(conn
        .query_row(
            "SELECT id, username, password_hash FROM admins WHERE username = ?1",
            params![username],
            |row| {
                Ok(Admin {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                })
            },
        )
        .optional()?)
}

/// The connection is released before the bcrypt check runs.
pub fn login_admin(db: &DbState, username: &str, password: &str) -> Result<StaffIdentity, AppError> {
    let username = username.trim();
    let admin = {
        let conn = db.lock()?;
        find_admin(&conn, username)?
    };
    match admin {
        Some(admin) if verify_password(password, &admin.password_hash) => {
            info!(username = %admin.username, "admin login successful");
            Ok(StaffIdentity {
                role: StaffRole::Admin,
                user_id: admin.id,
                username: admin.username,
                login_time: Utc::now(),
            })
        }
        _ => {
            warn!(username = %username, "failed admin login attempt");
            Err(AppError::InvalidCredentials)
        }
    }
}

pub fn login_cashier(
    db: &DbState,
    username: &str,
    password: &str,
) -> Result<StaffIdentity, AppError> {
    let username = username.trim();
    let cashier = {
        let conn = db.lock()?;
        crate::staff::find_cashier_by_username(&conn, username)?
    };
    match cashier {
        Some(c) if verify_password(password, &c.password_hash) => {
            if !c.is_active {
                warn!(username = %c.username, "login attempt on disabled cashier account");
                return Err(AppError::AccountDisabled);
            }
            info!(username = %c.username, "cashier login successful");
            Ok(StaffIdentity {
                role: StaffRole::Cashier,
                user_id: c.id,
                username: c.username,
                login_time: Utc::now(),
            })
        }
        _ => {
            warn!(username = %username, "failed cashier login attempt");
            Err(AppError::InvalidCredentials)
        }
    }
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

pub fn require_admin(staff: Option<StaffIdentity>) -> Result<StaffIdentity, AppError> {
    match staff {
        Some(s) if s.is_admin() => Ok(s),
        Some(_) => Err(AppError::Forbidden),
        None => Err(AppError::Unauthorized),
    }
}

/// Admin, or a cashier whose account is still active.
pub fn require_staff(
    conn: &Connection,
    staff: Option<StaffIdentity>,
) -> Result<StaffIdentity, AppError> {
    let staff = staff.ok_or(AppError::Unauthorized)?;
    if staff.role == StaffRole::Cashier {
        let active = crate::staff::find_cashier(conn, staff.user_id)?
            .map(|c| c.is_active)
            .unwrap_or(false);
        if !active {
            return Err(AppError::AccountDisabled);
        }
    }
    Ok(staff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn seeded_with_cost(cost: u32) -> db::DbState {
        let state = db::open_in_memory().expect("open db");
        {
            let conn = state.lock().unwrap();
            let hash = hash_password("123456", cost).unwrap();
            conn.execute(
                "INSERT INTO admins (username, password_hash) VALUES ('admin', ?1)",
                params![hash],
            )
            .unwrap();
        }
        state
    }

    fn seeded() -> db::DbState {
        seeded_with_cost(4)
    }

    #[test]
    fn admin_login_checks_password() {
        let state = seeded();

        let who = login_admin(&state, "admin", "123456").expect("valid login");
        assert!(who.is_admin());
        assert_eq!(who.cashier_id(), None);

        let err = login_admin(&state, "admin", "wrong").unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        assert_eq!(err.to_string(), "帳號或密碼錯誤");

        assert!(login_admin(&state, "nobody", "123456").is_err());
    }

    #[test]
    fn disabled_cashier_cannot_log_in_or_act() {
        let state = seeded();
        let cashier = crate::staff::create_cashier(&state, "amy", "secret1", 4).unwrap();

        let who = login_cashier(&state, "amy", "secret1").expect("active cashier");
        assert_eq!(who.cashier_id(), Some(cashier.id));
        {
            let conn = state.lock().unwrap();
            assert!(require_staff(&conn, Some(who.clone())).is_ok());
        }
        assert!(matches!(
            require_admin(Some(who.clone())),
            Err(AppError::Forbidden)
        ));

        {
            let conn = state.lock().unwrap();
            crate::staff::set_cashier_active(&conn, cashier.id, false).unwrap();
        }
        assert!(matches!(
            login_cashier(&state, "amy", "secret1"),
            Err(AppError::AccountDisabled)
        ));
        let conn = state.lock().unwrap();
        assert!(matches!(
            require_staff(&conn, Some(who)),
            Err(AppError::AccountDisabled)
        ));
    }

    #[test]
    fn database_stays_available_while_password_is_verified() {
        // Default cost keeps the verify running well past the sleep below.
        let state = Arc::new(seeded_with_cost(bcrypt::DEFAULT_COST));
        let login = {
            let state = Arc::clone(&state);
            thread::spawn(move || login_admin(&state, "admin", "123456"))
        };

        thread::sleep(Duration::from_millis(30));
        assert!(
            state.conn.try_lock().is_ok(),
            "connection must not be held during bcrypt verification"
        );
        assert!(login.join().unwrap().is_ok());
    }

    #[test]
    fn gates_reject_anonymous_sessions() {
        let state = seeded();
        let conn = state.lock().unwrap();
        assert!(matches!(require_admin(None), Err(AppError::Unauthorized)));
        assert!(matches!(
            require_staff(&conn, None),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn malformed_hash_is_a_mismatch() {
        assert!(!verify_password("123456", "not-a-bcrypt-hash"));
        assert!(validate_new_password("12345").is_err());
        assert!(validate_new_password("123456").is_ok());
    }
}
