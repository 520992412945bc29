//! HTTP surface: customer pages, the back office and the JSON API.

use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    middleware::from_fn_with_state,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::AppError;
use crate::session::session_layer;
use crate::{views, AppState};

pub mod admin;
pub mod cashier;
pub mod shop;
pub mod staff;

pub(crate) type ApiResult = Result<Json<Value>, AppError>;

pub fn router(state: Arc<AppState>) -> Router {
    let customer = Router::new()
        .route("/", get(shop::index))
        .route("/menu", get(shop::menu))
        .route("/cart", get(shop::cart))
        .route("/checkout", get(shop::checkout))
        .route("/payment/{id}", get(shop::payment))
        .route("/order_success/{id}", get(shop::order_success))
        .route("/order_status/{id}", get(shop::order_status))
        .route("/health", get(shop::health))
        .route("/api/add_to_cart", post(shop::add_to_cart))
        .route("/api/remove_from_cart", post(shop::remove_from_cart))
        .route("/api/update_cart", post(shop::update_cart))
        .route("/api/get_cart", get(shop::get_cart))
        .route("/api/submit_order", post(shop::submit_order))
        .route("/api/order_status/{id}", get(shop::api_order_status));

    let back_office = Router::new()
        .route("/admin", get(admin::login_page))
        .route("/api/admin_login", post(admin::login))
        .route("/admin/logout", get(admin::logout))
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/products", get(admin::products_page))
        .route("/admin/orders", get(admin::orders_page))
        .route("/admin/reports", get(admin::reports_page))
        .route("/admin/cashiers", get(admin::cashiers_page))
        .route("/admin/logs", get(admin::logs_page))
        .route("/admin/settings", get(admin::settings_page))
        .route("/api/admin/add_product", post(admin::add_product))
        .route("/api/admin/update_product/{id}", put(admin::update_product))
        .route("/api/admin/delete_product/{id}", delete(admin::delete_product))
        .route("/api/admin/add_cashier", post(admin::add_cashier))
        .route("/api/admin/toggle_cashier/{id}", put(admin::toggle_cashier))
        .route(
            "/api/admin/reset_cashier_password/{id}",
            put(admin::reset_cashier_password),
        )
        .route("/api/admin/delete_cashier/{id}", delete(admin::delete_cashier))
        .route("/api/admin/change_password", post(admin::change_password))
        .route("/api/admin/settings", post(admin::update_settings))
        .route("/api/admin/logs", get(admin::api_logs))
        .route("/api/admin/reports", get(admin::api_reports))
        .route(
            "/api/admin/update_order_status/{id}",
            put(staff::update_order_status),
        )
        .route("/api/check_new_orders", get(staff::check_new_orders))
        .route("/cashier", get(cashier::login_page))
        .route("/api/cashier_login", post(cashier::login))
        .route("/cashier/logout", get(cashier::logout))
        .route("/cashier/dashboard", get(cashier::dashboard));

    customer
        .merge(back_office)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), session_layer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> PageError {
    PageError::App(AppError::NotFound("頁面"))
}

/// Unwrap a JSON body, turning a malformed request into the usual
/// `{success: false}` reply instead of axum's plain-text rejection.
pub(crate) fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| AppError::invalid(format!("請求格式錯誤: {}", e.body_text())))
}

pub(crate) fn ok(message: &str) -> Json<Value> {
    Json(json!({ "success": true, "message": message }))
}

/// Run password hashing and other CPU-heavy work off the async workers.
pub(crate) async fn blocking<T, F>(state: &Arc<AppState>, f: F) -> Result<T, AppError>
where
    F: FnOnce(&AppState) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state)).await?
}

/// Failure of an HTML page handler.
#[derive(Debug)]
pub enum PageError {
    /// Not logged in as the right kind of staff; go to this login page.
    Login(&'static str),
    App(AppError),
}

impl From<AppError> for PageError {
    fn from(e: AppError) -> Self {
        PageError::App(e)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        match self {
            PageError::Login(path) => Redirect::to(path).into_response(),
            PageError::App(e) => {
                let status = e.status();
                if e.is_internal() {
                    error!(error = %e, "page failed");
                }
                let message = if e.is_internal() {
                    "系統發生錯誤，請稍後再試".to_string()
                } else {
                    e.to_string()
                };
                (status, Html(views::error_page(status, &message))).into_response()
            }
        }
    }
}

pub(crate) type PageResult = Result<Html<String>, PageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn page_errors_map_to_status_or_redirect() {
        let resp = PageError::Login("/admin").into_response();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()["location"], "/admin");

        let resp = PageError::App(AppError::NotFound("訂單")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = PageError::App(AppError::LockPoisoned).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
