//! Sales aggregation for the back-office dashboard and reports page.
//!
//! All figures are built from orders filtered by `created_at` and summed in
//! memory. Revenue uses each order's stored `total_price`; item rankings use
//! the frozen line items. Day boundaries are UTC calendar days.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

use crate::db;
use crate::error::AppError;
use crate::models::Order;
use crate::orders;

const WEEK_DAYS: i64 = 7;
const TOP_ITEMS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SalesSummary {
    pub orders: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySales {
    pub date: String,
    pub orders: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSales {
    pub name: String,
    pub quantity: i64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub today_orders: usize,
    pub today_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesReport {
    pub today: SalesSummary,
    pub month: SalesSummary,
    /// Last seven days, oldest first, today last.
    pub week: Vec<DailySales>,
    pub top_items: Vec<ItemSales>,
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
}

/// `[start, end)` of the UTC calendar day containing `now`.
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_of_day(now.date_naive());
    (start, start + Duration::days(1))
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap_or(now.date_naive());
    start_of_day(first)
}

pub fn summarize(orders: &[Order]) -> SalesSummary {
    SalesSummary {
        orders: orders.len(),
        revenue: orders.iter().map(|o| o.total_price).sum(),
    }
}

/// Best sellers by quantity, ties broken by name.
pub fn top_items(orders: &[Order], limit: usize) -> Vec<ItemSales> {
    let mut by_name: HashMap<String, (i64, f64)> = HashMap::new();
    for order in orders {
        for item in order.items() {
            let entry = by_name.entry(item.name.clone()).or_insert((0, 0.0));
            entry.0 = entry.0.saturating_add(item.quantity);
            entry.1 += item.subtotal();
        }
    }
    let mut ranked: Vec<ItemSales> = by_name
        .into_iter()
        .map(|(name, (quantity, revenue))| ItemSales {
            name,
            quantity,
            revenue,
        })
        .collect();
    ranked.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(limit);
    ranked
}

pub fn dashboard_stats(conn: &Connection, now: DateTime<Utc>) -> Result<DashboardStats, AppError> {
    let (today, tomorrow) = day_bounds(now);
    let today_orders = orders::list_between(conn, today, tomorrow)?;
    let summary = summarize(&today_orders);
    Ok(DashboardStats {
        total_orders: orders::count_all(conn)?,
        pending_orders: orders::pending_count(conn)?,
        today_orders: summary.orders,
        today_revenue: summary.revenue,
    })
}

pub fn sales_report(conn: &Connection, now: DateTime<Utc>) -> Result<SalesReport, AppError> {
    let (today, tomorrow) = day_bounds(now);

    let month_orders = orders::list_between(conn, start_of_month(now), tomorrow)?;
    let today_orders: Vec<Order> = orders::list_between(conn, today, tomorrow)?;

    let week_start = today - Duration::days(WEEK_DAYS - 1);
    let week_orders = orders::list_between(conn, week_start, tomorrow)?;
    let mut week = Vec::with_capacity(WEEK_DAYS as usize);
    for offset in 0..WEEK_DAYS {
        let day = week_start + Duration::days(offset);
        let from = db::timestamp(day);
        let to = db::timestamp(day + Duration::days(1));
        let day_orders: Vec<Order> = week_orders
            .iter()
            .filter(|o| o.created_at >= from && o.created_at < to)
            .cloned()
            .collect();
        let summary = summarize(&day_orders);
        week.push(DailySales {
            date: day.format("%Y-%m-%d").to_string(),
            orders: summary.orders,
            revenue: summary.revenue,
        });
    }

    Ok(SalesReport {
        today: summarize(&today_orders),
        month: summarize(&month_orders),
        week,
        top_items: top_items(&month_orders, TOP_ITEMS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineItem, OrderStatus};
    use crate::orders::{create_at, update_status, NewOrder};
    use chrono::TimeZone;

    fn order_of(name: &str, price: f64, quantity: i64) -> NewOrder {
        NewOrder {
            customer_name: "客人".into(),
            customer_phone: None,
            items: vec![LineItem {
                id: 1,
                name: name.into(),
                price,
                quantity,
                image_url: String::new(),
            }],
            dine_in: false,
            cashier_id: None,
        }
    }

    #[test]
    fn report_windows_use_utc_calendar_days() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 15, 0, 0).unwrap();

        // Today: two orders.
        create_at(&conn, &order_of("可樂", 30.0, 2), now - Duration::hours(1)).unwrap();
        create_at(&conn, &order_of("炒飯", 90.0, 1), Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap()).unwrap();
        // Yesterday, just before midnight.
        create_at(&conn, &order_of("可樂", 30.0, 5), Utc.with_ymd_and_hms(2026, 10, 17, 23, 59, 59).unwrap()).unwrap();
        // Earlier this month but outside the week.
        create_at(&conn, &order_of("比薩", 180.0, 1), Utc.with_ymd_and_hms(2026, 10, 2, 12, 0, 0).unwrap()).unwrap();
        // Last month.
        create_at(&conn, &order_of("比薩", 180.0, 9), Utc.with_ymd_and_hms(2026, 9, 30, 12, 0, 0).unwrap()).unwrap();

        let report = sales_report(&conn, now).unwrap();
        assert_eq!(report.today, SalesSummary { orders: 2, revenue: 150.0 });
        assert_eq!(report.month, SalesSummary { orders: 4, revenue: 480.0 });

        assert_eq!(report.week.len(), 7);
        assert_eq!(report.week[0].date, "2026-10-12");
        assert_eq!(report.week[6].date, "2026-10-18");
        assert_eq!(report.week[6].orders, 2);
        assert_eq!(report.week[5].orders, 1);
        assert_eq!(report.week[5].revenue, 150.0);
        assert_eq!(report.week[..5].iter().map(|d| d.orders).sum::<usize>(), 0);

        assert_eq!(report.top_items[0].name, "可樂");
        assert_eq!(report.top_items[0].quantity, 7);
        assert_eq!(report.top_items[0].revenue, 210.0);
        assert_eq!(report.top_items.len(), 3);
    }

    #[test]
    fn dashboard_counts_pending_and_today() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();

        let a = create_at(&conn, &order_of("咖啡", 50.0, 1), now).unwrap();
        create_at(&conn, &order_of("咖啡", 50.0, 2), now - Duration::days(2)).unwrap();
        update_status(&conn, a.id, OrderStatus::Completed).unwrap();

        let stats = dashboard_stats(&conn, now).unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.pending_orders, 1);
        assert_eq!(stats.today_orders, 1);
        assert_eq!(stats.today_revenue, 50.0);
    }

    #[test]
    fn oversized_legacy_quantities_do_not_break_the_report() {
        let state = db::open_in_memory().unwrap();
        let conn = state.lock().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
        let items = format!(
            r#"[{{"id":1,"name":"可樂","price":1.0,"quantity":{},"image_url":""}}]"#,
            i64::MAX
        );
        for _ in 0..2 {
            conn.execute(
                "INSERT INTO orders (customer_name, order_items, total_price, created_at)
                 VALUES ('x', ?1, 1, ?2)",
                rusqlite::params![items, db::timestamp(now)],
            )
            .unwrap();
        }

        let report = sales_report(&conn, now).unwrap();
        assert_eq!(report.top_items[0].quantity, i64::MAX);
    }
}
