//! Endpoints shared by administrators and cashiers: order status changes and
//! the new-order poll.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{body, ok, ApiResult};
use crate::error::AppError;
use crate::models::OrderStatus;
use crate::session::Session;
use crate::{auth, db, oplog, orders, AppState};

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub status: Option<String>,
}

pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult {
    let conn = state.db.lock()?;
    let actor = auth::require_staff(&conn, session.staff())?;
    let req = body(payload)?;
    orders::get(&conn, id)?;
    let status = req
        .status
        .as_deref()
        .ok_or(AppError::InvalidStatus)
        .and_then(OrderStatus::parse)?;
    let previous = orders::update_status(&conn, id, status)?;
    oplog::record(
        &conn,
        &actor,
        "update_order_status",
        Some(format!("訂單 #{id}: {previous} → {status}")),
    );
    Ok(ok("訂單狀態更新成功"))
}

/// Surface at most one not-yet-seen pending order and move this browser's
/// checkpoint to now.
pub async fn check_new_orders(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> ApiResult {
    let now = Utc::now();
    let (order, pending_count) = {
        let conn = state.db.lock()?;
        auth::require_staff(&conn, session.staff())?;
        (
            orders::take_next_unnotified(&conn)?,
            orders::pending_count(&conn)?,
        )
    };
    let previous_check = session.update(|d| d.last_check.replace(now));

    let mut reply = json!({
        "success": true,
        "has_new": order.is_some(),
        "pending_count": pending_count,
        "last_check": db::timestamp(now),
        "previous_check": previous_check.map(db::timestamp),
    });
    if let (Some(order), Value::Object(map)) = (order, &mut reply) {
        map.insert("order".into(), order.to_json());
    }
    Ok(Json(reply))
}
