//! Back-office pages for administrators.

use super::{esc, money, orders_table, short_time, StaffChrome};
use crate::models::{Cashier, OperationLog, Order, OrderStatus, Product};
use crate::reports::{DashboardStats, SalesReport};
use crate::settings::{SystemSettings, POLL_INTERVAL_KEY, STORE_NAME_KEY};

const PRODUCTS_JS: &str = r#"
function productPayload(form) {
  return {
    name: form.name.value,
    price: form.price.value,
    stock: form.stock.value,
    category: form.category.value,
    image_url: form.image_url.value,
  };
}
document.getElementById('add-product').addEventListener('submit', async (ev) => {
  ev.preventDefault();
  const data = await api('POST', '/api/admin/add_product', productPayload(ev.target));
  alert(data.message);
  if (data.success) location.reload();
});
document.querySelectorAll('form.edit-product').forEach((form) => {
  form.addEventListener('submit', async (ev) => {
    ev.preventDefault();
    const data = await api('PUT', '/api/admin/update_product/' + form.dataset.id, productPayload(form));
    alert(data.message);
    if (data.success) location.reload();
  });
});
async function deleteProduct(id) {
  if (!confirm('確定刪除此商品？')) return;
  const data = await api('DELETE', '/api/admin/delete_product/' + id);
  alert(data.message);
  if (data.success) location.reload();
}
"#;

const CASHIERS_JS: &str = r#"
document.getElementById('add-cashier').addEventListener('submit', async (ev) => {
  ev.preventDefault();
  const form = ev.target;
  const data = await api('POST', '/api/admin/add_cashier', {
    username: form.username.value,
    password: form.password.value,
  });
  alert(data.message);
  if (data.success) location.reload();
});
async function toggleCashier(id, active) {
  const data = await api('PUT', '/api/admin/toggle_cashier/' + id, { is_active: active });
  if (!data.success) { alert(data.message); return; }
  location.reload();
}
async function resetCashierPassword(id) {
  const password = prompt('新密碼（至少 6 個字元）');
  if (!password) return;
  const data = await api('PUT', '/api/admin/reset_cashier_password/' + id, { password });
  alert(data.message);
}
async function deleteCashier(id) {
  if (!confirm('確定刪除此收銀員？')) return;
  const data = await api('DELETE', '/api/admin/delete_cashier/' + id);
  alert(data.message);
  if (data.success) location.reload();
}
"#;

const SETTINGS_JS: &str = r#"
document.getElementById('settings-form').addEventListener('submit', async (ev) => {
  ev.preventDefault();
  const payload = {};
  ev.target.querySelectorAll('input[data-key]').forEach((input) => {
    payload[input.dataset.key] = input.value;
  });
  const data = await api('POST', '/api/admin/settings', payload);
  alert(data.message);
  if (data.success) location.reload();
});
document.getElementById('password-form').addEventListener('submit', async (ev) => {
  ev.preventDefault();
  const form = ev.target;
  const data = await api('POST', '/api/admin/change_password', {
    old_password: form.old_password.value,
    new_password: form.new_password.value,
  });
  alert(data.message);
  if (data.success) form.reset();
});
"#;

pub fn dashboard_page(chrome: &StaffChrome<'_>, stats: &DashboardStats, recent: &[Order]) -> String {
    let body = format!(
        r#"<h2>儀表板</h2>
<div class="stats">
<div class="stat">總訂單<strong>{total}</strong></div>
<div class="stat">待處理<strong>{pending}</strong></div>
<div class="stat">今日訂單<strong>{today}</strong></div>
<div class="stat">今日營收<strong>{revenue}</strong></div>
</div>
<h3>最新訂單</h3>
{orders}"#,
        total = stats.total_orders,
        pending = stats.pending_orders,
        today = stats.today_orders,
        revenue = money(stats.today_revenue),
        orders = orders_table(recent, true),
    );
    chrome.render("儀表板", &body, "")
}

pub fn orders_page(chrome: &StaffChrome<'_>, orders: &[Order], filter: Option<OrderStatus>) -> String {
    let mut tabs = String::from("<p>");
    let all_class = if filter.is_none() { "button" } else { "button secondary" };
    tabs.push_str(&format!("<a class=\"{all_class}\" href=\"/admin/orders\">全部</a> "));
    for status in OrderStatus::ALL {
        let class = if filter == Some(status) { "button" } else { "button secondary" };
        tabs.push_str(&format!(
            "<a class=\"{class}\" href=\"/admin/orders?status={s}\">{s}</a> ",
            s = status.as_str()
        ));
    }
    tabs.push_str("</p>");
    let body = format!("<h2>訂單管理</h2>{tabs}{}", orders_table(orders, true));
    chrome.render("訂單管理", &body, "")
}

pub fn products_page(chrome: &StaffChrome<'_>, products: &[Product]) -> String {
    let rows: String = products
        .iter()
        .map(|p| {
            format!(
                r#"<tr><td>#{id}</td><td colspan="5">
<form class="inline edit-product" data-id="{id}">
<input name="name" value="{name}" required/>
<input name="price" value="{price}" size="6"/>
<input name="stock" value="{stock}" size="4"/>
<input name="category" value="{category}" size="6"/>
<input name="image_url" value="{image}"/>
<button type="submit">更新</button>
<button type="button" class="secondary" onclick="deleteProduct({id})">刪除</button>
</form></td></tr>"#,
                id = p.id,
                name = esc(&p.name),
                price = p.price,
                stock = p.stock,
                category = esc(&p.category),
                image = esc(&p.image_url),
            )
        })
        .collect();
    let body = format!(
        r#"<h2>商品管理</h2>
<form id="add-product" class="inline card">
<input name="name" placeholder="名稱" required/>
<input name="price" placeholder="價格" size="6" required/>
<input name="stock" placeholder="庫存" size="4"/>
<input name="category" placeholder="分類" size="6"/>
<input name="image_url" placeholder="圖片網址"/>
<button type="submit">新增商品</button>
</form>
<table><tr><th>編號</th><th colspan="5">名稱 / 價格 / 庫存 / 分類 / 圖片</th></tr>{rows}</table>"#
    );
    chrome.render("商品管理", &body, PRODUCTS_JS)
}

pub fn reports_page(chrome: &StaffChrome<'_>, report: &SalesReport) -> String {
    let week: String = report
        .week
        .iter()
        .map(|d| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                d.date,
                d.orders,
                money(d.revenue)
            )
        })
        .collect();
    let top: String = report
        .top_items
        .iter()
        .map(|i| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                esc(&i.name),
                i.quantity,
                money(i.revenue)
            )
        })
        .collect();
    let body = format!(
        r#"<h2>銷售報表</h2>
<div class="stats">
<div class="stat">今日訂單<strong>{today_orders}</strong></div>
<div class="stat">今日營收<strong>{today_revenue}</strong></div>
<div class="stat">本月訂單<strong>{month_orders}</strong></div>
<div class="stat">本月營收<strong>{month_revenue}</strong></div>
</div>
<h3>最近 7 天</h3>
<table><tr><th>日期</th><th>訂單數</th><th>營收</th></tr>{week}</table>
<h3>本月熱銷</h3>
<table><tr><th>商品</th><th>數量</th><th>營收</th></tr>{top}</table>"#,
        today_orders = report.today.orders,
        today_revenue = money(report.today.revenue),
        month_orders = report.month.orders,
        month_revenue = money(report.month.revenue),
    );
    chrome.render("銷售報表", &body, "")
}

pub fn cashiers_page(chrome: &StaffChrome<'_>, cashiers: &[Cashier]) -> String {
    let rows: String = cashiers
        .iter()
        .map(|c| {
            let (state, toggle_label) = if c.is_active {
                ("啟用", "停用")
            } else {
                ("停用", "啟用")
            };
            format!(
                r#"<tr><td>#{id}</td><td>{name}</td><td>{state}</td><td>{created}</td><td>
<button onclick="toggleCashier({id}, {next})">{toggle_label}</button>
<button class="secondary" onclick="resetCashierPassword({id})">重設密碼</button>
<button class="secondary" onclick="deleteCashier({id})">刪除</button>
</td></tr>"#,
                id = c.id,
                name = esc(&c.username),
                created = short_time(&c.created_at),
                next = !c.is_active,
            )
        })
        .collect();
    let body = format!(
        r#"<h2>收銀員管理</h2>
<form id="add-cashier" class="inline card">
<input name="username" placeholder="帳號" required/>
<input name="password" type="password" placeholder="密碼（至少 6 個字元）" required/>
<button type="submit">新增收銀員</button>
</form>
<table><tr><th>編號</th><th>帳號</th><th>狀態</th><th>建立時間</th><th>操作</th></tr>{rows}</table>"#
    );
    chrome.render("收銀員管理", &body, CASHIERS_JS)
}

pub fn logs_page(chrome: &StaffChrome<'_>, logs: &[OperationLog]) -> String {
    let rows: String = logs
        .iter()
        .map(|l| {
            format!(
                "<tr><td>{}</td><td>{} #{}</td><td>{}</td><td>{}</td></tr>",
                short_time(&l.created_at),
                esc(&l.user_type),
                l.user_id,
                esc(&l.action),
                esc(l.details.as_deref().unwrap_or("")),
            )
        })
        .collect();
    let body = format!(
        "<h2>操作紀錄</h2><table><tr><th>時間</th><th>使用者</th><th>動作</th><th>內容</th></tr>{rows}</table>"
    );
    chrome.render("操作紀錄", &body, "")
}

pub fn settings_page(chrome: &StaffChrome<'_>, settings: &SystemSettings) -> String {
    let known = [
        (STORE_NAME_KEY, "店名", settings.store_name().to_string()),
        (
            POLL_INTERVAL_KEY,
            "新訂單檢查間隔（秒）",
            settings.poll_interval_seconds().to_string(),
        ),
    ];
    let mut fields: String = known
        .iter()
        .map(|(key, label, value)| {
            format!(
                "<p><label>{label} <input data-key=\"{key}\" value=\"{}\"/></label></p>",
                esc(value)
            )
        })
        .collect();
    for (key, value) in settings.all() {
        if key == STORE_NAME_KEY || key == POLL_INTERVAL_KEY {
            continue;
        }
        fields.push_str(&format!(
            "<p><label>{k} <input data-key=\"{k}\" value=\"{v}\"/></label></p>",
            k = esc(key),
            v = esc(value)
        ));
    }
    let body = format!(
        r#"<h2>系統設定</h2>
<form id="settings-form" class="card">{fields}<p><button type="submit">儲存設定</button></p></form>
<h3>變更密碼</h3>
<form id="password-form" class="card">
<p><input name="old_password" type="password" placeholder="目前密碼" required/></p>
<p><input name="new_password" type="password" placeholder="新密碼（至少 6 個字元）" required/></p>
<p><button type="submit">變更密碼</button></p>
</form>"#
    );
    chrome.render("系統設定", &body, SETTINGS_JS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaffIdentity;
    use crate::models::StaffRole;
    use crate::reports::{DailySales, ItemSales, SalesSummary};
    use chrono::Utc;

    fn admin() -> StaffIdentity {
        StaffIdentity {
            role: StaffRole::Admin,
            user_id: 1,
            username: "admin".into(),
            login_time: Utc::now(),
        }
    }

    fn order(id: i64, status: OrderStatus) -> Order {
        Order {
            id,
            customer_name: "林小姐".into(),
            customer_phone: Some("0912".into()),
            order_items: r#"[{"id":1,"name":"薯條","price":60.0,"quantity":2,"image_url":""}]"#
                .into(),
            total_price: 120.0,
            status,
            created_at: "2026-10-18T09:05:00.000Z".into(),
            cashier_id: None,
            dine_in: true,
            notified: false,
        }
    }

    #[test]
    fn orders_page_offers_other_statuses_only() {
        let staff = admin();
        let chrome = StaffChrome {
            store_name: "小館",
            staff: &staff,
            poll_interval_seconds: 10,
        };
        let html = orders_page(&chrome, &[order(3, OrderStatus::Pending)], None);
        assert!(html.contains("updateOrderStatus(3, '製作中')"));
        assert!(html.contains("updateOrderStatus(3, '完成')"));
        assert!(!html.contains("updateOrderStatus(3, '待處理')"));
        assert!(html.contains("薯條 × 2"));
        assert!(html.contains("/admin/cashiers"));
    }

    #[test]
    fn reports_page_lists_week_and_top_items() {
        let staff = admin();
        let chrome = StaffChrome {
            store_name: "小館",
            staff: &staff,
            poll_interval_seconds: 10,
        };
        let report = SalesReport {
            today: SalesSummary { orders: 2, revenue: 150.0 },
            month: SalesSummary { orders: 9, revenue: 990.0 },
            week: vec![DailySales {
                date: "2026-10-18".into(),
                orders: 2,
                revenue: 150.0,
            }],
            top_items: vec![ItemSales {
                name: "可樂".into(),
                quantity: 7,
                revenue: 210.0,
            }],
        };
        let html = reports_page(&chrome, &report);
        assert!(html.contains("2026-10-18"));
        assert!(html.contains("$990"));
        assert!(html.contains("<td>可樂</td><td>7</td>"));
    }

    #[test]
    fn cashier_rows_toggle_to_opposite_state() {
        let staff = admin();
        let chrome = StaffChrome {
            store_name: "小館",
            staff: &staff,
            poll_interval_seconds: 10,
        };
        let cashiers = vec![Cashier {
            id: 4,
            username: "amy".into(),
            password_hash: String::new(),
            is_active: false,
            created_at: "2026-10-01T08:00:00.000Z".into(),
        }];
        let html = cashiers_page(&chrome, &cashiers);
        assert!(html.contains("toggleCashier(4, true)"));
        assert!(!html.contains("password_hash"));
    }
}
