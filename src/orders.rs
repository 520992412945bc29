//! Order placement, status changes and the new-order notification queue.
//!
//! An order freezes the cart lines as a JSON array together with the total
//! computed at write time. Staff clients poll [`take_next_unnotified`] to be
//! told about pending orders one at a time; each order is handed out once.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::db;
use crate::error::AppError;
use crate::models::{items_total, LineItem, Order, OrderStatus, MAX_QUANTITY, ORDER_COLUMNS};

const MAX_NAME_LEN: usize = 100;
const MAX_PHONE_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub items: Vec<LineItem>,
    pub dine_in: bool,
    pub cashier_id: Option<i64>,
}

fn validate(order: &NewOrder) -> Result<(String, Option<String>), AppError> {
    if order.items.is_empty() {
        return Err(AppError::EmptyCart);
    }
    if order.items.iter().any(|i| i.quantity < 1) {
        return Err(AppError::invalid("數量必須大於 0"));
    }
    if order.items.iter().any(|i| i.quantity > MAX_QUANTITY) {
        return Err(AppError::invalid(format!("單項數量不可超過 {MAX_QUANTITY}")));
    }
    let name = order.customer_name.trim();
    if name.is_empty() {
        return Err(AppError::invalid("請填寫顧客姓名"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::invalid("顧客姓名過長"));
    }
    let phone = order
        .customer_phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);
    if phone
        .as_deref()
        .is_some_and(|p| p.chars().count() > MAX_PHONE_LEN)
    {
        return Err(AppError::invalid("電話號碼過長"));
    }
    Ok((name.to_string(), phone))
}

pub fn create(conn: &Connection, order: &NewOrder) -> Result<Order, AppError> {
    create_at(conn, order, Utc::now())
}

/// Persist an order placed at `at`. The total is computed here, once.
pub fn create_at(conn: &Connection, order: &NewOrder, at: DateTime<Utc>) -> Result<Order, AppError> {
    let (name, phone) = validate(order)?;
    let items_json = serde_json::to_string(&order.items)?;
    let total = items_total(&order.items);

    conn.execute(
        "INSERT INTO orders (customer_name, customer_phone, order_items, total_price,
                             status, created_at, cashier_id, dine_in, notified)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
        params![
            name,
            phone,
            items_json,
            total,
            OrderStatus::Pending,
            db::timestamp(at),
            order.cashier_id,
            order.dine_in
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(
        order_id = id,
        total,
        lines = order.items.len(),
        dine_in = order.dine_in,
        cashier_id = ?order.cashier_id,
        "order placed"
    );
    get(conn, id)
}

pub fn get(conn: &Connection, id: i64) -> Result<Order, AppError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
    conn.query_row(&sql, params![id], Order::from_row)
        .optional()?
        .ok_or(AppError::NotFound("訂單"))
}

/// Newest first, optionally filtered by status.
pub fn list_recent(
    conn: &Connection,
    status: Option<OrderStatus>,
    limit: Option<u32>,
) -> Result<Vec<Order>, AppError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY created_at DESC, id DESC
         LIMIT ?2"
    );
    let limit = limit.map(i64::from).unwrap_or(-1);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![status, limit], Order::from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Orders with `from <= created_at < to`, oldest first.
pub fn list_between(
    conn: &Connection,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Order>, AppError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders
         WHERE created_at >= ?1 AND created_at < ?2
         ORDER BY created_at, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![db::timestamp(from), db::timestamp(to)],
        Order::from_row,
    )?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Set any of the three statuses from any other. Returns the previous status.
pub fn update_status(
    conn: &Connection,
    id: i64,
    status: OrderStatus,
) -> Result<OrderStatus, AppError> {
    let previous = get(conn, id)?.status;
    conn.execute(
        "UPDATE orders SET status = ?1 WHERE id = ?2",
        params![status, id],
    )?;
    info!(order_id = id, from = %previous, to = %status, "order status changed");
    Ok(previous)
}

pub fn count_all(conn: &Connection) -> Result<i64, AppError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?)
}

pub fn pending_count(conn: &Connection) -> Result<i64, AppError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM orders WHERE status = ?1",
        params![OrderStatus::Pending],
        |row| row.get(0),
    )?)
}

/// Hand out the oldest pending order that no staff client has seen yet and
/// mark it notified. Returns `None` when there is nothing new.
///
/// The flag only moves false to true under `WHERE notified = 0`, so an order
/// is surfaced to exactly one poll even if several connections race.
pub fn take_next_unnotified(conn: &Connection) -> Result<Option<Order>, AppError> {
    let select = format!(
        "SELECT {ORDER_COLUMNS} FROM orders
         WHERE status = ?1 AND notified = 0
         ORDER BY created_at, id
         LIMIT 1"
    );
    for _ in 0..3 {
        let candidate = conn
            .query_row(&select, params![OrderStatus::Pending], Order::from_row)
            .optional()?;
        let Some(mut order) = candidate else {
            return Ok(None);
        };
        let claimed = conn.execute(
            "UPDATE orders SET notified = 1 WHERE id = ?1 AND notified = 0",
            params![order.id],
        )?;
        if claimed == 1 {
            order.notified = true;
            debug!(order_id = order.id, "new order surfaced to staff");
            return Ok(Some(order));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn line(id: i64, price: f64, quantity: i64) -> LineItem {
        LineItem {
            id,
            name: format!("item-{id}"),
            price,
            quantity,
            image_url: String::new(),
        }
    }

    fn new_order(items: Vec<LineItem>) -> NewOrder {
        NewOrder {
            customer_name: "陳先生".into(),
            customer_phone: Some(" 0912345678 ".into()),
            items,
            dine_in: true,
            cashier_id: None,
        }
    }

    #[test]
    fn total_is_frozen_at_write_time() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();

        let order = create(&conn, &new_order(vec![line(1, 120.0, 2), line(6, 30.0, 3)])).unwrap();
        assert_eq!(order.total_price, 330.0);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.customer_phone.as_deref(), Some("0912345678"));
        assert!(!order.notified);
        assert_eq!(order.items().len(), 2);

        // Tampering with the snapshot does not change the stored total.
        conn.execute(
            "UPDATE orders SET order_items = '[]' WHERE id = ?1",
            params![order.id],
        )
        .unwrap();
        assert_eq!(get(&conn, order.id).unwrap().total_price, 330.0);
    }

    #[test]
    fn rejects_empty_cart_and_blank_name() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();

        assert!(matches!(
            create(&conn, &new_order(vec![])),
            Err(AppError::EmptyCart)
        ));
        let mut blank = new_order(vec![line(1, 10.0, 1)]);
        blank.customer_name = "  ".into();
        assert!(matches!(create(&conn, &blank), Err(AppError::InvalidInput(_))));
        assert_eq!(count_all(&conn).unwrap(), 0);
    }

    #[test]
    fn rejects_line_quantities_above_the_cap() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();

        let huge = new_order(vec![line(1, 10.0, MAX_QUANTITY + 1)]);
        assert!(matches!(create(&conn, &huge), Err(AppError::InvalidInput(_))));
        assert_eq!(count_all(&conn).unwrap(), 0);

        let order = create(&conn, &new_order(vec![line(1, 10.0, MAX_QUANTITY)])).unwrap();
        assert_eq!(order.total_price, 10.0 * MAX_QUANTITY as f64);
    }

    #[test]
    fn any_status_can_follow_any_other() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();
        let order = create(&conn, &new_order(vec![line(1, 10.0, 1)])).unwrap();

        assert_eq!(
            update_status(&conn, order.id, OrderStatus::Completed).unwrap(),
            OrderStatus::Pending
        );
        assert_eq!(
            update_status(&conn, order.id, OrderStatus::Pending).unwrap(),
            OrderStatus::Completed
        );
        update_status(&conn, order.id, OrderStatus::Preparing).unwrap();
        assert_eq!(get(&conn, order.id).unwrap().status, OrderStatus::Preparing);
        assert!(matches!(
            update_status(&conn, 999, OrderStatus::Completed),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn polling_hands_out_each_pending_order_once_oldest_first() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();
        let base = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();

        let second = create_at(&conn, &new_order(vec![line(1, 10.0, 1)]), base + Duration::minutes(5)).unwrap();
        let first = create_at(&conn, &new_order(vec![line(2, 10.0, 1)]), base).unwrap();
        let done = create_at(&conn, &new_order(vec![line(3, 10.0, 1)]), base - Duration::minutes(5)).unwrap();
        update_status(&conn, done.id, OrderStatus::Completed).unwrap();

        let got = take_next_unnotified(&conn).unwrap().expect("first order");
        assert_eq!(got.id, first.id);
        assert!(got.notified);

        let got = take_next_unnotified(&conn).unwrap().expect("second order");
        assert_eq!(got.id, second.id);

        assert!(take_next_unnotified(&conn).unwrap().is_none());

        // Moving an already-notified order back to pending does not re-surface it.
        update_status(&conn, first.id, OrderStatus::Preparing).unwrap();
        update_status(&conn, first.id, OrderStatus::Pending).unwrap();
        assert!(take_next_unnotified(&conn).unwrap().is_none());

        // The completed order was never surfaced and stays unnotified.
        assert!(!get(&conn, done.id).unwrap().notified);
    }

    #[test]
    fn listing_and_ranges() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();
        let day = Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap();

        let a = create_at(&conn, &new_order(vec![line(1, 10.0, 1)]), day + Duration::hours(1)).unwrap();
        let b = create_at(&conn, &new_order(vec![line(1, 10.0, 1)]), day + Duration::hours(25)).unwrap();
        update_status(&conn, b.id, OrderStatus::Completed).unwrap();

        let recent = list_recent(&conn, None, None).unwrap();
        assert_eq!(recent.iter().map(|o| o.id).collect::<Vec<_>>(), vec![b.id, a.id]);
        let pending = list_recent(&conn, Some(OrderStatus::Pending), Some(10)).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending_count(&conn).unwrap(), 1);

        let first_day = list_between(&conn, day, day + Duration::days(1)).unwrap();
        assert_eq!(first_day.len(), 1);
        assert_eq!(first_day[0].id, a.id);
    }
}
