//! Cashier routes: login and the counter dashboard.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{Html, Redirect},
    Extension, Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::admin::LoginRequest;
use super::{blocking, body, ApiResult, PageError, PageResult};
use crate::error::AppError;
use crate::models::StaffRole;
use crate::session::Session;
use crate::settings::SystemSettings;
use crate::views::{self, StaffChrome};
use crate::{auth, oplog, orders, products, reports, AppState};

pub async fn login_page(State(state): State<Arc<AppState>>) -> PageResult {
    let settings = {
        let conn = state.db.lock()?;
        SystemSettings::load(&conn)?
    };
    Ok(Html(views::staff_login_page(
        settings.store_name(),
        StaffRole::Cashier,
    )))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult {
    let req = body(payload)?;
    let identity = blocking(&state, move |s| {
        let identity = auth::login_cashier(&s.db, &req.username, &req.password)?;
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
    Ok(Redirect::to("/cashier"))
}

/// Today's orders with status controls plus the menu for counter orders.
/// Administrators may open it too.
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> PageResult {
    let (today, tomorrow) = reports::day_bounds(Utc::now());
    let (staff, settings, today_orders, menu) = {
        let conn = state.db.lock()?;
        let staff = match auth::require_staff(&conn, session.staff()) {
            Ok(staff) => staff,
            Err(AppError::AccountDisabled) => {
                info!("disabled cashier dropped from session");
                session.update(|d| d.staff = None);
                return Err(PageError::Login("/cashier"));
            }
            Err(AppError::Unauthorized) => return Err(PageError::Login("/cashier")),
            Err(e) => return Err(e.into()),
        };
        (
            staff,
            SystemSettings::load(&conn)?,
            orders::list_between(&conn, today, tomorrow)?,
            products::list(&conn)?,
        )
    };
    let groups = products::by_category(&menu);
    let cart = session.read(|d| d.cart.clone());
    let chrome = StaffChrome {
        store_name: settings.store_name(),
        staff: &staff,
        poll_interval_seconds: settings.poll_interval_seconds(),
    };
    Ok(Html(views::cashier::dashboard_page(
        &chrome,
        &today_orders,
        &groups,
        &cart,
    )))
}
