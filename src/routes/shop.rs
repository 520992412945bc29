//! Customer routes: menu, session cart, checkout and order tracking.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::{body, ApiResult, PageError, PageResult};
use crate::error::AppError;
use crate::orders::{self, NewOrder};
use crate::session::Session;
use crate::settings::SystemSettings;
use crate::{oplog, products, value_as_i64, views, AppState, BUILT_AT, GIT_SHA, VERSION};

#[derive(Debug, Deserialize)]
pub struct CartRequest {
    #[serde(default)]
    pub product_id: Option<Value>,
    #[serde(default)]
    pub quantity: Option<Value>,
}

impl CartRequest {
    fn product_id(&self) -> Result<i64, AppError> {
        self.product_id
            .as_ref()
            .and_then(value_as_i64)
            .ok_or_else(|| AppError::invalid("缺少商品編號"))
    }

    fn quantity(&self) -> Result<Option<i64>, AppError> {
        self.quantity
            .as_ref()
            .map(|v| value_as_i64(v).ok_or_else(|| AppError::invalid("數量格式錯誤")))
            .transpose()
    }
}

fn default_dine_in() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SubmitOrderRequest {
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default = "default_dine_in")]
    pub dine_in: bool,
}

fn store_settings(state: &AppState) -> Result<SystemSettings, AppError> {
    let conn = state.db.lock()?;
    SystemSettings::load(&conn)
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

pub async fn index() -> Redirect {
    Redirect::to("/menu")
}

pub async fn menu(State(state): State<Arc<AppState>>, Extension(session): Extension<Session>) -> PageResult {
    let (settings, menu) = {
        let conn = state.db.lock()?;
        (SystemSettings::load(&conn)?, products::list(&conn)?)
    };
    let groups = products::by_category(&menu);
    let flash = session.take_flash();
    let cart_count = session.read(|d| d.cart.item_count());
    Ok(Html(views::shop::menu_page(
        settings.store_name(),
        &flash,
        &groups,
        cart_count,
    )))
}

pub async fn cart(State(state): State<Arc<AppState>>, Extension(session): Extension<Session>) -> PageResult {
    let settings = store_settings(&state)?;
    let flash = session.take_flash();
    let cart = session.read(|d| d.cart.clone());
    Ok(Html(views::shop::cart_page(settings.store_name(), &flash, &cart)))
}

pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Response, PageError> {
    let cart = session.read(|d| d.cart.clone());
    if cart.is_empty() {
        session.flash(AppError::EmptyCart.to_string());
        return Ok(Redirect::to("/menu").into_response());
    }
    let settings = store_settings(&state)?;
    Ok(Html(views::shop::checkout_page(settings.store_name(), &cart)).into_response())
}

pub async fn payment(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> PageResult {
    let (settings, order) = {
        let conn = state.db.lock()?;
        (SystemSettings::load(&conn)?, orders::get(&conn, id)?)
    };
    Ok(Html(views::shop::payment_page(settings.store_name(), &order)))
}

pub async fn order_success(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> PageResult {
    let (settings, order) = {
        let conn = state.db.lock()?;
        (SystemSettings::load(&conn)?, orders::get(&conn, id)?)
    };
    Ok(Html(views::shop::order_success_page(settings.store_name(), &order)))
}

pub async fn order_status(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> PageResult {
    let (settings, order) = {
        let conn = state.db.lock()?;
        (SystemSettings::load(&conn)?, orders::get(&conn, id)?)
    };
    let items = order.items();
    Ok(Html(views::shop::order_status_page(
        settings.store_name(),
        &order,
        &items,
    )))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let db_ok = state
        .db
        .lock()
        .and_then(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
        .is_ok();
    if !db_ok {
        warn!("health check: database unavailable");
    }
    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "version": VERSION,
        "git_sha": GIT_SHA,
        "built_at": BUILT_AT,
    }))
}

// ---------------------------------------------------------------------------
// Cart API
// ---------------------------------------------------------------------------

pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    payload: Result<Json<CartRequest>, JsonRejection>,
) -> ApiResult {
    let req = body(payload)?;
    let product_id = req.product_id()?;
    let quantity = req.quantity()?.unwrap_or(1);
    let product = {
        let conn = state.db.lock()?;
        products::get(&conn, product_id)?
    };
    session.update(|d| d.cart.add(&product, quantity))?;
    Ok(Json(json!({ "success": true, "message": "已加入購物車" })))
}

pub async fn remove_from_cart(
    Extension(session): Extension<Session>,
    payload: Result<Json<CartRequest>, JsonRejection>,
) -> ApiResult {
    let product_id = body(payload)?.product_id()?;
    session.update(|d| d.cart.remove(product_id));
    Ok(Json(json!({ "success": true })))
}

pub async fn update_cart(
    Extension(session): Extension<Session>,
    payload: Result<Json<CartRequest>, JsonRejection>,
) -> ApiResult {
    let req = body(payload)?;
    let product_id = req.product_id()?;
    let quantity = req
        .quantity()?
        .ok_or_else(|| AppError::invalid("缺少數量"))?;
    session.update(|d| d.cart.update(product_id, quantity))?;
    Ok(Json(json!({ "success": true })))
}

pub async fn get_cart(Extension(session): Extension<Session>) -> Json<Value> {
    let (items, total) = session.read(|d| (d.cart.items().to_vec(), d.cart.total()));
    Json(json!({ "cart": items, "total": total }))
}

// ---------------------------------------------------------------------------
// Orders API
// ---------------------------------------------------------------------------

/// Place an order from the session cart. A logged-in cashier ringing up a
/// counter order is stamped on it. The cart is emptied before the insert so
/// a repeated submit finds nothing to order; a failed insert puts it back.
pub async fn submit_order(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    payload: Result<Json<SubmitOrderRequest>, JsonRejection>,
) -> ApiResult {
    let req = body(payload)?;
    let items = session.update(|d| d.cart.take());
    if items.is_empty() {
        return Err(AppError::EmptyCart);
    }
    let staff = session.staff();
    let new_order = NewOrder {
        customer_name: req.customer_name.unwrap_or_default(),
        customer_phone: req.customer_phone,
        items,
        dine_in: req.dine_in,
        cashier_id: staff.as_ref().and_then(|s| s.cashier_id()),
    };

    let created = state.db.lock().and_then(|conn| {
        let order = orders::create(&conn, &new_order)?;
        if let Some(cashier) = staff.as_ref().filter(|s| s.cashier_id().is_some()) {
            oplog::record(
                &conn,
                cashier,
                "create_order",
                Some(format!("訂單 #{} 金額 {}", order.id, order.total_price)),
            );
        }
        Ok(order)
    });

    match created {
        Ok(order) => Ok(Json(json!({ "success": true, "order_id": order.id }))),
        Err(e) => {
            session.update(|d| d.cart.restore(new_order.items));
            Err(e)
        }
    }
}

pub async fn api_order_status(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult {
    let order = {
        let conn = state.db.lock()?;
        orders::get(&conn, id)?
    };
    Ok(Json(json!({ "success": true, "order": order.to_json() })))
}
