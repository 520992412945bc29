//! Row types shared by the data layer, the JSON API and the page renderers.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;

pub const DEFAULT_IMAGE_URL: &str = "https://via.placeholder.com/200x150?text=食物圖片";
pub const DEFAULT_STOCK: i64 = 99;
pub const DEFAULT_CATEGORY: &str = "主餐";
/// Largest quantity a single cart or order line may hold.
pub const MAX_QUANTITY: i64 = 999;

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

pub(crate) const PRODUCT_COLUMNS: &str = "id, name, price, image_url, stock, category";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub image_url: String,
    pub stock: i64,
    pub category: String,
}

impl Product {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            price: row.get(2)?,
            image_url: row.get(3)?,
            stock: row.get(4)?,
            category: row.get(5)?,
        })
    }
}

/// Values for a new product, after defaults are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub price: f64,
    pub image_url: String,
    pub stock: i64,
    pub category: String,
}

impl ProductDraft {
    pub fn new(name: impl Into<String>, price: f64, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price,
            image_url: DEFAULT_IMAGE_URL.to_string(),
            stock: DEFAULT_STOCK,
            category: category.into(),
        }
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = image_url.into();
        self
    }
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub stock: Option<i64>,
    pub category: Option<String>,
}

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

/// One cart line, frozen verbatim into `orders.order_items` at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub quantity: i64,
    pub image_url: String,
}

impl LineItem {
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            quantity,
            image_url: product.image_url.clone(),
        }
    }

    pub fn subtotal(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

pub fn items_total(items: &[LineItem]) -> f64 {
    items.iter().map(LineItem::subtotal).sum()
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "待處理")]
    Pending,
    #[serde(rename = "製作中")]
    Preparing,
    #[serde(rename = "完成")]
    Completed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Preparing,
        OrderStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "待處理",
            OrderStatus::Preparing => "製作中",
            OrderStatus::Completed => "完成",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == value.trim())
            .ok_or(AppError::InvalidStatus)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for OrderStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for OrderStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        OrderStatus::parse(raw).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

pub(crate) const ORDER_COLUMNS: &str = "id, customer_name, customer_phone, order_items, \
     total_price, status, created_at, cashier_id, dine_in, notified";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: i64,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    /// JSON array of [`LineItem`], exactly as written at checkout.
    pub order_items: String,
    pub total_price: f64,
    pub status: OrderStatus,
    pub created_at: String,
    pub cashier_id: Option<i64>,
    pub dine_in: bool,
    pub notified: bool,
}

impl Order {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            customer_name: row.get(1)?,
            customer_phone: row.get(2)?,
            order_items: row.get(3)?,
            total_price: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
            cashier_id: row.get(7)?,
            dine_in: row.get(8)?,
            notified: row.get(9)?,
        })
    }

    /// Decoded line items; a malformed snapshot reads as an empty order.
    pub fn items(&self) -> Vec<LineItem> {
        match serde_json::from_str::<Vec<LineItem>>(&self.order_items) {
            Ok(items) => items,
            Err(e) => {
                warn!(order_id = self.id, error = %e, "order_items is not a line item array");
                Vec::new()
            }
        }
    }

    /// Order plus decoded items, the shape returned by the JSON endpoints.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "customer_name": self.customer_name,
            "customer_phone": self.customer_phone,
            "order_items": self.items(),
            "total_price": self.total_price,
            "status": self.status,
            "created_at": self.created_at,
            "cashier_id": self.cashier_id,
            "dine_in": self.dine_in,
            "notified": self.notified,
        })
    }
}

// ---------------------------------------------------------------------------
// Staff
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Admin,
    Cashier,
}

impl StaffRole {
    pub fn as_str(self) -> &'static str {
        match self {
            StaffRole::Admin => "admin",
            StaffRole::Cashier => "cashier",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StaffRole::Admin => "管理員",
            StaffRole::Cashier => "收銀員",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

pub(crate) const CASHIER_COLUMNS: &str = "id, username, password_hash, is_active, created_at";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cashier {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: String,
}

impl Cashier {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            is_active: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationLog {
    pub id: i64,
    pub user_type: String,
    pub user_id: i64,
    pub action: String,
    pub details: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_chinese_labels() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(status.as_str()).unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&OrderStatus::Preparing).unwrap(),
            "\"製作中\""
        );
        assert!(matches!(
            OrderStatus::parse("shipped"),
            Err(AppError::InvalidStatus)
        ));
    }

    #[test]
    fn malformed_order_items_read_as_empty() {
        let order = Order {
            id: 7,
            customer_name: "王小明".into(),
            customer_phone: None,
            order_items: "not json".into(),
            total_price: 0.0,
            status: OrderStatus::Pending,
            created_at: "2026-10-18T00:00:00.000Z".into(),
            cashier_id: None,
            dine_in: true,
            notified: false,
        };
        assert!(order.items().is_empty());
    }

    #[test]
    fn line_item_snapshot_copies_product_fields() {
        let product = Product {
            id: 3,
            name: "薯條".into(),
            price: 60.0,
            image_url: "https://img/fries".into(),
            stock: 10,
            category: "配餐".into(),
        };
        let line = LineItem::from_product(&product, 3);
        assert_eq!(line.name, "薯條");
        assert_eq!(line.subtotal(), 180.0);
        assert_eq!(items_total(&[line.clone(), line]), 360.0);
    }
}
