use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}不存在")]
    NotFound(&'static str),

    #[error("未登入")]
    Unauthorized,

    #[error("權限不足")]
    Forbidden,

    #[error("帳號或密碼錯誤")]
    InvalidCredentials,

    #[error("帳號已停用")]
    AccountDisabled,

    #[error("{0}")]
    InvalidInput(String),

    #[error("購物車是空的")]
    EmptyCart,

    #[error("無效的狀態")]
    InvalidStatus,

    #[error("{0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    /// Status used when the error is rendered as a page rather than JSON.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden | AppError::AccountDisabled => StatusCode::FORBIDDEN,
            AppError::InvalidInput(_) | AppError::EmptyCart | AppError::InvalidStatus => {
                StatusCode::BAD_REQUEST
            }
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Config(_)
            | AppError::LockPoisoned
            | AppError::Database(_)
            | AppError::Hash(_)
            | AppError::Json(_)
            | AppError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// JSON endpoints always answer 200 with `{"success": false, "message": ...}`;
/// browser scripts branch on `success`, not on the status line.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            error!(error = %self, "request failed");
        }
        let body = serde_json::json!({
            "success": false,
            "message": self.to_string(),
        });
        (StatusCode::OK, Json(body)).into_response()
    }
}
