//! Append-only audit trail of staff actions.

use rusqlite::{params, Connection};
use tracing::warn;

use crate::auth::StaffIdentity;
use crate::db;
use crate::error::AppError;
use crate::models::{OperationLog, StaffRole};

pub const DEFAULT_LIST_LIMIT: u32 = 200;

/// Record an action. Audit failures are logged and never fail the request
/// that triggered them.
pub fn record(conn: &Connection, actor: &StaffIdentity, action: &str, details: Option<String>) {
    if let Err(e) = conn.execute(
        "INSERT INTO operation_logs (user_type, user_id, action, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            actor.role.as_str(),
            actor.user_id,
            action,
            details,
            db::now_timestamp()
        ],
    ) {
        warn!(
            user_type = actor.role.as_str(),
            user_id = actor.user_id,
            action,
            error = %e,
            "failed to write operation log"
        );
    }
}

/// Newest first, optionally only one kind of staff.
pub fn list_recent(
    conn: &Connection,
    limit: u32,
    user_type: Option<StaffRole>,
) -> Result<Vec<OperationLog>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_type, user_id, action, details, created_at
         FROM operation_logs
         WHERE (?1 IS NULL OR user_type = ?1)
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(
        params![user_type.map(StaffRole::as_str), i64::from(limit)],
        |row| {
            Ok(OperationLog {
                id: row.get(0)?,
                user_type: row.get(1)?,
                user_id: row.get(2)?,
                action: row.get(3)?,
                details: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn actor(role: StaffRole, id: i64) -> StaffIdentity {
        StaffIdentity {
            role,
            user_id: id,
            username: format!("{}-{id}", role.as_str()),
            login_time: Utc::now(),
        }
    }

    #[test]
    fn records_and_filters_by_user_type() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();

        record(&conn, &actor(StaffRole::Admin, 1), "login", None);
        record(
            &conn,
            &actor(StaffRole::Cashier, 2),
            "update_order_status",
            Some("訂單 #1: 待處理 → 完成".into()),
        );

        let all = list_recent(&conn, DEFAULT_LIST_LIMIT, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].action, "update_order_status");

        let cashier_only = list_recent(&conn, 10, Some(StaffRole::Cashier)).unwrap();
        assert_eq!(cashier_only.len(), 1);
        assert_eq!(cashier_only[0].user_id, 2);
        assert_eq!(
            cashier_only[0].details.as_deref(),
            Some("訂單 #1: 待處理 → 完成")
        );

        assert_eq!(list_recent(&conn, 1, None).unwrap().len(), 1);
    }
}
