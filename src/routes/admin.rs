//! Administrator routes: login, back-office pages and management API.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    response::{Html, Redirect},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{blocking, body, ok, ApiResult, PageError, PageResult};
use crate::auth::{self, StaffIdentity};
use crate::error::AppError;
use crate::models::{OrderStatus, StaffRole};
use crate::products::{self, ProductInput};
use crate::session::Session;
use crate::settings::{self, SystemSettings};
use crate::views::{self, StaffChrome};
use crate::{oplog, orders, reports, staff, AppState};

const DASHBOARD_RECENT_ORDERS: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct NewCashierRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ToggleCashierRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<u32>,
    pub user_type: Option<String>,
}

fn admin_for_page(session: &Session) -> Result<StaffIdentity, PageError> {
    auth::require_admin(session.staff()).map_err(|_| PageError::Login("/admin"))
}

fn render_page(
    state: &AppState,
    staff: &StaffIdentity,
    render: impl FnOnce(&StaffChrome<'_>) -> String,
) -> Result<String, AppError> {
    let settings = {
        let conn = state.db.lock()?;
        SystemSettings::load(&conn)?
    };
    let chrome = StaffChrome {
        store_name: settings.store_name(),
        staff,
        poll_interval_seconds: settings.poll_interval_seconds(),
    };
    Ok(render(&chrome))
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

pub async fn login_page(State(state): State<Arc<AppState>>) -> PageResult {
    let settings = {
        let conn = state.db.lock()?;
        SystemSettings::load(&conn)?
    };
    Ok(Html(views::staff_login_page(
        settings.store_name(),
        StaffRole::Admin,
    )))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult {
    let req = body(payload)?;
    let identity = blocking(&state, move |s| {
        let identity = auth::login_admin(&s.db, &req.username, &req.password)?;
        oplog::record(&*s.db.lock()?, &identity, "login", None);
        Ok(identity)
    })
    .await?;
    session.rotate();
    session.update(|d| {
        d.staff = Some(identity);
        d.last_check = None;
    });
    Ok(Json(json!({ "success": true })))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Redirect, PageError> {
    if let Some(staff) = session.update(|d| d.staff.take()) {
        let conn = state.db.lock()?;
        oplog::record(&conn, &staff, "logout", None);
    }
    Ok(Redirect::to("/admin"))
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> PageResult {
    let admin = admin_for_page(&session)?;
    let (stats, recent) = {
        let conn = state.db.lock()?;
        (
            reports::dashboard_stats(&conn, Utc::now())?,
            orders::list_recent(&conn, None, Some(DASHBOARD_RECENT_ORDERS))?,
        )
    };
    let html = render_page(&state, &admin, |chrome| {
        views::admin::dashboard_page(chrome, &stats, &recent)
    })?;
    Ok(Html(html))
}

pub async fn products_page(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> PageResult {
    let admin = admin_for_page(&session)?;
    let list = {
        let conn = state.db.lock()?;
        products::list(&conn)?
    };
    let html = render_page(&state, &admin, |chrome| {
        views::admin::products_page(chrome, &list)
    })?;
    Ok(Html(html))
}

pub async fn orders_page(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(query): Query<OrdersQuery>,
) -> PageResult {
    let admin = admin_for_page(&session)?;
    let filter = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(OrderStatus::parse)
        .transpose()?;
    let list = {
        let conn = state.db.lock()?;
        orders::list_recent(&conn, filter, None)?
    };
    let html = render_page(&state, &admin, |chrome| {
        views::admin::orders_page(chrome, &list, filter)
    })?;
    Ok(Html(html))
}

pub async fn reports_page(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> PageResult {
    let admin = admin_for_page(&session)?;
    let report = {
        let conn = state.db.lock()?;
        reports::sales_report(&conn, Utc::now())?
    };
    let html = render_page(&state, &admin, |chrome| {
        views::admin::reports_page(chrome, &report)
    })?;
    Ok(Html(html))
}

pub async fn cashiers_page(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> PageResult {
    let admin = admin_for_page(&session)?;
    let cashiers = {
        let conn = state.db.lock()?;
        staff::list_cashiers(&conn)?
    };
    let html = render_page(&state, &admin, |chrome| {
        views::admin::cashiers_page(chrome, &cashiers)
    })?;
    Ok(Html(html))
}

pub async fn logs_page(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> PageResult {
    let admin = admin_for_page(&session)?;
    let logs = {
        let conn = state.db.lock()?;
        oplog::list_recent(&conn, oplog::DEFAULT_LIST_LIMIT, None)?
    };
    let html = render_page(&state, &admin, |chrome| views::admin::logs_page(chrome, &logs))?;
    Ok(Html(html))
}

pub async fn settings_page(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> PageResult {
    let admin = admin_for_page(&session)?;
    let settings = {
        let conn = state.db.lock()?;
        SystemSettings::load(&conn)?
    };
    let html = render_page(&state, &admin, |chrome| {
        views::admin::settings_page(chrome, &settings)
    })?;
    Ok(Html(html))
}

// ---------------------------------------------------------------------------
// Products API
// ---------------------------------------------------------------------------

pub async fn add_product(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    payload: Result<Json<ProductInput>, JsonRejection>,
) -> ApiResult {
    let admin = auth::require_admin(session.staff())?;
    let draft = body(payload)?.into_draft()?;
    let conn = state.db.lock()?;
    let product = products::insert(&conn, &draft)?;
    oplog::record(
        &conn,
        &admin,
        "add_product",
        Some(format!("#{} {}", product.id, product.name)),
    );
    Ok(Json(json!({
        "success": true,
        "message": "商品新增成功",
        "product": product,
    })))
}

pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
    payload: Result<Json<ProductInput>, JsonRejection>,
) -> ApiResult {
    let admin = auth::require_admin(session.staff())?;
    let patch = body(payload)?.into_patch()?;
    let conn = state.db.lock()?;
    let product = products::update(&conn, id, patch)?;
    oplog::record(
        &conn,
        &admin,
        "update_product",
        Some(format!("#{} {}", product.id, product.name)),
    );
    Ok(ok("商品更新成功"))
}

pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
) -> ApiResult {
    let admin = auth::require_admin(session.staff())?;
    let conn = state.db.lock()?;
    let product = products::delete(&conn, id)?;
    oplog::record(
        &conn,
        &admin,
        "delete_product",
        Some(format!("#{} {}", product.id, product.name)),
    );
    Ok(ok("商品刪除成功"))
}

// ---------------------------------------------------------------------------
// Cashier accounts API
// ---------------------------------------------------------------------------

pub async fn add_cashier(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    payload: Result<Json<NewCashierRequest>, JsonRejection>,
) -> ApiResult {
    let admin = auth::require_admin(session.staff())?;
    let req = body(payload)?;
    let cashier = blocking(&state, move |s| {
        let cashier =
            staff::create_cashier(&s.db, &req.username, &req.password, s.config.bcrypt_cost)?;
        oplog::record(
            &*s.db.lock()?,
            &admin,
            "add_cashier",
            Some(format!("#{} {}", cashier.id, cashier.username)),
        );
        Ok(cashier)
    })
    .await?;
    Ok(Json(json!({
        "success": true,
        "message": "收銀員新增成功",
        "cashier": cashier,
    })))
}

pub async fn toggle_cashier(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
    payload: Result<Json<ToggleCashierRequest>, JsonRejection>,
) -> ApiResult {
    let admin = auth::require_admin(session.staff())?;
    let active = body(payload)?.is_active;
    let conn = state.db.lock()?;
    staff::set_cashier_active(&conn, id, active)?;
    let (action, message) = if active {
        ("enable_cashier", "收銀員已啟用")
    } else {
        ("disable_cashier", "收銀員已停用")
    };
    oplog::record(&conn, &admin, action, Some(format!("#{id}")));
    Ok(ok(message))
}

pub async fn reset_cashier_password(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> ApiResult {
    let admin = auth::require_admin(session.staff())?;
    let req = body(payload)?;
    blocking(&state, move |s| {
        staff::reset_cashier_password(&s.db, id, &req.password, s.config.bcrypt_cost)?;
        oplog::record(
            &*s.db.lock()?,
            &admin,
            "reset_cashier_password",
            Some(format!("#{id}")),
        );
        Ok(())
    })
    .await?;
    Ok(ok("密碼已重設"))
}

pub async fn delete_cashier(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
) -> ApiResult {
    let admin = auth::require_admin(session.staff())?;
    let conn = state.db.lock()?;
    let cashier = staff::delete_cashier(&conn, id)?;
    oplog::record(
        &conn,
        &admin,
        "delete_cashier",
        Some(format!("#{} {}", cashier.id, cashier.username)),
    );
    Ok(ok("收銀員已刪除"))
}

// ---------------------------------------------------------------------------
// Account and settings API
// ---------------------------------------------------------------------------

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult {
    let admin = auth::require_admin(session.staff())?;
    let req = body(payload)?;
    blocking(&state, move |s| {
        staff::change_admin_password(
            &s.db,
            admin.user_id,
            &req.old_password,
            &req.new_password,
            s.config.bcrypt_cost,
        )?;
        oplog::record(&*s.db.lock()?, &admin, "change_password", None);
        Ok(())
    })
    .await?;
    Ok(ok("密碼變更成功"))
}

fn setting_value(key: &str, value: Value) -> Result<String, AppError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(AppError::invalid(format!("設定值格式錯誤: {key}"))),
    }
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    payload: Result<Json<BTreeMap<String, Value>>, JsonRejection>,
) -> ApiResult {
    let admin = auth::require_admin(session.staff())?;
    let raw = body(payload)?;
    if raw.is_empty() {
        return Err(AppError::invalid("沒有要更新的設定"));
    }
    let values = raw
        .into_iter()
        .map(|(k, v)| setting_value(&k, v).map(|v| (k, v)))
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    let conn = state.db.lock()?;
    settings::update_many(&conn, &values)?;
    let keys: Vec<&str> = values.keys().map(String::as_str).collect();
    oplog::record(&conn, &admin, "update_settings", Some(keys.join(", ")));
    Ok(ok("設定已更新"))
}

pub async fn api_logs(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(query): Query<LogsQuery>,
) -> ApiResult {
    auth::require_admin(session.staff())?;
    let user_type = match query.user_type.as_deref().filter(|s| !s.is_empty()) {
        None => None,
        Some("admin") => Some(StaffRole::Admin),
        Some("cashier") => Some(StaffRole::Cashier),
        Some(other) => return Err(AppError::invalid(format!("無效的使用者類型: {other}"))),
    };
    let limit = query.limit.unwrap_or(oplog::DEFAULT_LIST_LIMIT);
    let conn = state.db.lock()?;
    let logs = oplog::list_recent(&conn, limit, user_type)?;
    Ok(Json(json!({ "success": true, "logs": logs })))
}

pub async fn api_reports(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> ApiResult {
    auth::require_admin(session.staff())?;
    let now = Utc::now();
    let conn = state.db.lock()?;
    let report = reports::sales_report(&conn, now)?;
    let dashboard = reports::dashboard_stats(&conn, now)?;
    Ok(Json(json!({
        "success": true,
        "report": report,
        "dashboard": dashboard,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_values_accept_scalars_only() {
        assert_eq!(setting_value("k", json!("巷口")).unwrap(), "巷口");
        assert_eq!(setting_value("k", json!(15)).unwrap(), "15");
        assert_eq!(setting_value("k", json!(true)).unwrap(), "true");
        assert!(setting_value("k", json!([1])).is_err());
        assert!(setting_value("k", Value::Null).is_err());
    }
}
