//! Menu product storage.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::AppError;
use crate::models::{
    Product, ProductDraft, ProductPatch, DEFAULT_CATEGORY, DEFAULT_IMAGE_URL, DEFAULT_STOCK,
    PRODUCT_COLUMNS,
};
use crate::{value_as_f64, value_as_i64};

/// Product fields as posted by the back-office forms. Price and stock may be
/// sent as numbers or as numeric strings.
#[derive(Debug, Default, Deserialize)]
pub struct ProductInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: Option<Value>,
    #[serde(default)]
    pub category: Option<String>,
}

fn parse_price(v: &Value) -> Result<f64, AppError> {
    let price = value_as_f64(v).ok_or_else(|| AppError::invalid("價格格式錯誤"))?;
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::invalid("價格不可為負數"));
    }
    Ok(price)
}

fn parse_stock(v: &Value) -> Result<i64, AppError> {
    let stock = value_as_i64(v).ok_or_else(|| AppError::invalid("庫存格式錯誤"))?;
    if stock < 0 {
        return Err(AppError::invalid("庫存不可為負數"));
    }
    Ok(stock)
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ProductInput {
    pub fn into_draft(self) -> Result<ProductDraft, AppError> {
        let name = non_blank(self.name).ok_or_else(|| AppError::invalid("商品名稱不可為空"))?;
        let price = self
            .price
            .as_ref()
            .ok_or_else(|| AppError::invalid("價格不可為空"))
            .and_then(parse_price)?;
        let stock = match self.stock.as_ref() {
            Some(v) => parse_stock(v)?,
            None => DEFAULT_STOCK,
        };
        Ok(ProductDraft {
            name,
            price,
            image_url: non_blank(self.image_url).unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            stock,
            category: non_blank(self.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        })
    }

    pub fn into_patch(self) -> Result<ProductPatch, AppError> {
        if matches!(self.name.as_deref().map(str::trim), Some("")) {
            return Err(AppError::invalid("商品名稱不可為空"));
        }
        Ok(ProductPatch {
            name: non_blank(self.name),
            price: self.price.as_ref().map(parse_price).transpose()?,
            image_url: non_blank(self.image_url),
            stock: self.stock.as_ref().map(parse_stock).transpose()?,
            category: non_blank(self.category),
        })
    }
}

pub fn list(conn: &Connection) -> Result<Vec<Product>, AppError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], Product::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Products grouped by category, categories in first-seen order.
pub fn by_category(products: &[Product]) -> Vec<(String, Vec<&Product>)> {
    let mut groups: Vec<(String, Vec<&Product>)> = Vec::new();
    for product in products {
        match groups.iter_mut().find(|(cat, _)| *cat == product.category) {
            Some((_, items)) => items.push(product),
            None => groups.push((product.category.clone(), vec![product])),
        }
    }
    groups
}

pub fn get(conn: &Connection, id: i64) -> Result<Product, AppError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
    conn.query_row(&sql, params![id], Product::from_row)
        .optional()?
        .ok_or(AppError::NotFound("商品"))
}

pub fn insert(conn: &Connection, draft: &ProductDraft) -> Result<Product, AppError> {
    conn.execute(
        "INSERT INTO products (name, price, image_url, stock, category)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            draft.name,
            draft.price,
            draft.image_url,
            draft.stock,
            draft.category
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(product_id = id, name = %draft.name, "product created");
    get(conn, id)
}

pub fn update(conn: &Connection, id: i64, patch: ProductPatch) -> Result<Product, AppError> {
    let current = get(conn, id)?;
    let updated = Product {
        id,
        name: patch.name.unwrap_or(current.name),
        price: patch.price.unwrap_or(current.price),
        image_url: patch.image_url.unwrap_or(current.image_url),
        stock: patch.stock.unwrap_or(current.stock),
        category: patch.category.unwrap_or(current.category),
    };
    conn.execute(
        "UPDATE products SET name = ?1, price = ?2, image_url = ?3, stock = ?4, category = ?5
         WHERE id = ?6",
        params![
            updated.name,
            updated.price,
            updated.image_url,
            updated.stock,
            updated.category,
            id
        ],
    )?;
    info!(product_id = id, "product updated");
    Ok(updated)
}

/// Delete a product. Past orders are unaffected since they hold their own snapshot.
pub fn delete(conn: &Connection, id: i64) -> Result<Product, AppError> {
    let product = get(conn, id)?;
    conn.execute("DELETE FROM products WHERE id = ?1", params![id])?;
    info!(product_id = id, name = %product.name, "product deleted");
    Ok(product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;

    fn input(v: Value) -> ProductInput {
        serde_json::from_value(v).expect("product input")
    }

    #[test]
    fn draft_applies_defaults_and_coerces_strings() {
        let draft = input(json!({ "name": " 鬆餅 ", "price": "65.5" }))
            .into_draft()
            .unwrap();
        assert_eq!(draft.name, "鬆餅");
        assert_eq!(draft.price, 65.5);
        assert_eq!(draft.stock, DEFAULT_STOCK);
        assert_eq!(draft.category, DEFAULT_CATEGORY);
        assert_eq!(draft.image_url, DEFAULT_IMAGE_URL);

        assert!(input(json!({ "price": 10 })).into_draft().is_err());
        assert!(input(json!({ "name": "x" })).into_draft().is_err());
        assert!(input(json!({ "name": "x", "price": -1 })).into_draft().is_err());
        assert!(input(json!({ "name": "x", "price": "abc" })).into_draft().is_err());
    }

    #[test]
    fn crud_round_trip() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();

        let created = insert(&conn, &ProductDraft::new("炒飯", 90.0, "主餐")).unwrap();
        assert_eq!(get(&conn, created.id).unwrap(), created);

        let patch = input(json!({ "price": 95, "stock": "12" })).into_patch().unwrap();
        let updated = update(&conn, created.id, patch).unwrap();
        assert_eq!(updated.name, "炒飯");
        assert_eq!(updated.price, 95.0);
        assert_eq!(updated.stock, 12);
        assert_eq!(get(&conn, created.id).unwrap(), updated);

        delete(&conn, created.id).unwrap();
        assert!(matches!(get(&conn, created.id), Err(AppError::NotFound(_))));
        assert!(matches!(delete(&conn, created.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn grouping_keeps_first_seen_category_order() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();
        insert(&conn, &ProductDraft::new("可樂", 30.0, "飲品")).unwrap();
        insert(&conn, &ProductDraft::new("炒飯", 90.0, "主餐")).unwrap();
        insert(&conn, &ProductDraft::new("咖啡", 50.0, "飲品")).unwrap();

        let all = list(&conn).unwrap();
        let groups = by_category(&all);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "飲品");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "主餐");
    }
}
