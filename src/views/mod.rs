//! Server-rendered HTML pages.
//!
//! Pages are plain `format!` output wrapped in [`html_shell`]. Every value that
//! came from a user or the database goes through [`esc`]. Browser behaviour is
//! a few `fetch` calls against the JSON API; the scripts live in `const`
//! strings so they need no brace escaping.

use axum::http::StatusCode;

use crate::auth::StaffIdentity;
use crate::models::{Order, OrderStatus, StaffRole};

pub mod admin;
pub mod cashier;
pub mod shop;

const STYLE: &str = r#"
* { box-sizing: border-box; }
body { font-family: "Noto Sans TC", system-ui, sans-serif; margin: 0; background: #f6f4f0; color: #222; }
header { background: #b5452b; color: #fff; padding: 12px 20px; display: flex; align-items: center; gap: 16px; flex-wrap: wrap; }
header a { color: #fff; text-decoration: none; }
header .brand { font-weight: 700; font-size: 1.2em; margin-right: auto; }
main { max-width: 1100px; margin: 0 auto; padding: 20px; }
.flash { background: #fff3cd; border: 1px solid #e0c36b; padding: 8px 12px; margin-bottom: 12px; border-radius: 4px; }
.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(200px, 1fr)); gap: 16px; }
.card { background: #fff; border-radius: 8px; padding: 12px; box-shadow: 0 1px 3px rgba(0,0,0,.12); }
.card img { width: 100%; height: 130px; object-fit: cover; border-radius: 6px; }
.price { color: #b5452b; font-weight: 700; }
.muted { color: #777; font-size: .9em; }
table { width: 100%; border-collapse: collapse; background: #fff; }
th, td { padding: 8px; border-bottom: 1px solid #eee; text-align: left; vertical-align: top; }
button, .button { background: #b5452b; color: #fff; border: 0; border-radius: 4px; padding: 6px 12px; cursor: pointer; text-decoration: none; display: inline-block; }
button.secondary { background: #777; }
input, select { padding: 6px; border: 1px solid #ccc; border-radius: 4px; }
form.inline { display: flex; gap: 8px; flex-wrap: wrap; align-items: center; margin-bottom: 16px; }
.stats { display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap: 12px; margin-bottom: 20px; }
.stat { background: #fff; padding: 16px; border-radius: 8px; }
.stat strong { display: block; font-size: 1.6em; }
.status { padding: 2px 8px; border-radius: 999px; font-size: .85em; }
.status-pending { background: #fde2e1; color: #a12622; }
.status-preparing { background: #fff1c2; color: #8a6100; }
.status-completed { background: #dff3e3; color: #1f6b34; }
#toast { position: fixed; right: 20px; bottom: 20px; background: #222; color: #fff; padding: 14px 18px; border-radius: 8px; display: none; max-width: 320px; }
"#;

const COMMON_JS: &str = r#"
async function api(method, url, body) {
  const opts = { method, headers: { 'Content-Type': 'application/json' } };
  if (body !== undefined) opts.body = JSON.stringify(body);
  const res = await fetch(url, opts);
  return res.json();
}
function showToast(text) {
  const el = document.getElementById('toast');
  if (!el) return;
  el.textContent = text;
  el.style.display = 'block';
  clearTimeout(el._timer);
  el._timer = setTimeout(() => { el.style.display = 'none'; }, 6000);
}
async function updateOrderStatus(id, status) {
  const data = await api('PUT', '/api/admin/update_order_status/' + id, { status });
  if (!data.success) { alert(data.message); return; }
  location.reload();
}
"#;

const STAFF_POLL_JS: &str = r#"
function startOrderPolling(intervalMs) {
  async function poll() {
    try {
      const data = await api('GET', '/api/check_new_orders');
      if (!data.success) return;
      const counter = document.getElementById('pending-count');
      if (counter) counter.textContent = data.pending_count;
      if (data.has_new && data.order) {
        const o = data.order;
        showToast('新訂單 #' + o.id + ' ' + o.customer_name + ' $' + o.total_price);
      }
    } catch (e) { console.warn('poll failed', e); }
  }
  poll();
  setInterval(poll, intervalMs);
}
"#;

pub(crate) fn esc(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

pub(crate) fn money(value: f64) -> String {
    if (value.round() - value).abs() < f64::EPSILON {
        format!("${value:.0}")
    } else {
        format!("${value:.2}")
    }
}

/// `2026-10-18T09:05:00.000Z` as `2026-10-18 09:05`.
pub(crate) fn short_time(ts: &str) -> String {
    ts.get(..16)
        .map(|s| s.replace('T', " "))
        .unwrap_or_else(|| ts.to_string())
}

pub(crate) fn status_badge(status: OrderStatus) -> String {
    let class = match status {
        OrderStatus::Pending => "status-pending",
        OrderStatus::Preparing => "status-preparing",
        OrderStatus::Completed => "status-completed",
    };
    format!("<span class=\"status {class}\">{}</span>", status.as_str())
}

/// Buttons moving an order to each status other than its current one.
pub(crate) fn status_controls(order: &Order) -> String {
    OrderStatus::ALL
        .iter()
        .filter(|s| **s != order.status)
        .map(|s| {
            format!(
                "<button onclick=\"updateOrderStatus({}, '{}')\">{}</button> ",
                order.id,
                s.as_str(),
                s.as_str()
            )
        })
        .collect()
}

pub(crate) fn order_lines(order: &Order) -> String {
    order
        .items()
        .iter()
        .map(|i| format!("{} × {}", esc(&i.name), i.quantity))
        .collect::<Vec<_>>()
        .join("<br/>")
}

/// Order list with an optional column of status buttons.
pub(crate) fn orders_table(orders: &[Order], with_controls: bool) -> String {
    if orders.is_empty() {
        return "<p class=\"muted\">沒有訂單</p>".to_string();
    }
    let rows: String = orders
        .iter()
        .map(|o| {
            let controls = if with_controls {
                format!("<td>{}</td>", status_controls(o))
            } else {
                String::new()
            };
            format!(
                "<tr><td>#{id}</td><td>{time}</td><td>{name}<br/><span class=\"muted\">{phone}</span></td>\
                 <td>{lines}</td><td>{mode}</td><td>{total}</td><td>{badge}</td>{controls}</tr>",
                id = o.id,
                time = short_time(&o.created_at),
                name = esc(&o.customer_name),
                phone = esc(o.customer_phone.as_deref().unwrap_or("")),
                lines = order_lines(o),
                mode = if o.dine_in { "內用" } else { "外帶" },
                total = money(o.total_price),
                badge = status_badge(o.status),
            )
        })
        .collect();
    let controls_head = if with_controls { "<th>操作</th>" } else { "" };
    format!(
        "<table><tr><th>編號</th><th>時間</th><th>顧客</th><th>內容</th><th>用餐</th><th>金額</th><th>狀態</th>{controls_head}</tr>{rows}</table>"
    )
}

pub(crate) fn flash_html(flash: &[String]) -> String {
    flash
        .iter()
        .map(|m| format!("<div class=\"flash\">{}</div>", esc(m)))
        .collect()
}

pub(crate) struct Shell<'a> {
    pub title: &'a str,
    pub store_name: &'a str,
    pub nav: String,
    pub script: String,
}

pub(crate) fn html_shell(shell: &Shell<'_>, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="zh-Hant">
<head>
<meta charset="UTF-8"/>
<meta name="viewport" content="width=device-width, initial-scale=1.0"/>
<title>{title} - {store}</title>
<style>{style}</style>
</head>
<body>
<header><a class="brand" href="/menu">{store}</a>{nav}</header>
<main>{body}</main>
<div id="toast"></div>
<script>{common}</script>
<script>{script}</script>
</body>
</html>"#,
        title = esc(shell.title),
        store = esc(shell.store_name),
        style = STYLE,
        nav = shell.nav,
        body = body,
        common = COMMON_JS,
        script = shell.script,
    )
}

/// Navigation and polling wiring shared by the back-office pages.
pub struct StaffChrome<'a> {
    pub store_name: &'a str,
    pub staff: &'a StaffIdentity,
    pub poll_interval_seconds: u64,
}

impl StaffChrome<'_> {
    fn nav(&self) -> String {
        let links: &[(&str, &str)] = match self.staff.role {
            StaffRole::Admin => &[
                ("/admin/dashboard", "儀表板"),
                ("/admin/orders", "訂單"),
                ("/admin/products", "商品"),
                ("/admin/reports", "報表"),
                ("/admin/cashiers", "收銀員"),
                ("/admin/logs", "操作紀錄"),
                ("/admin/settings", "設定"),
                ("/admin/logout", "登出"),
            ],
            StaffRole::Cashier => &[
                ("/cashier/dashboard", "收銀台"),
                ("/cashier/logout", "登出"),
            ],
        };
        let mut nav: String = links
            .iter()
            .map(|(href, label)| format!("<a href=\"{href}\">{label}</a>"))
            .collect();
        nav.push_str(&format!(
            "<span>待處理 <b id=\"pending-count\">-</b></span><span class=\"muted\">{} {}</span>",
            self.staff.role.label(),
            esc(&self.staff.username)
        ));
        nav
    }

    pub(crate) fn render(&self, title: &str, body: &str, extra_script: &str) -> String {
        let script = format!(
            "{STAFF_POLL_JS}\nstartOrderPolling({});\n{extra_script}",
            self.poll_interval_seconds * 1000
        );
        html_shell(
            &Shell {
                title,
                store_name: self.store_name,
                nav: self.nav(),
                script,
            },
            body,
        )
    }
}

const LOGIN_JS: &str = r#"
document.getElementById('login-form').addEventListener('submit', async (ev) => {
  ev.preventDefault();
  const form = ev.target;
  const data = await api('POST', form.dataset.endpoint, {
    username: form.username.value,
    password: form.password.value,
  });
  if (data.success) { location.href = form.dataset.next; }
  else { document.getElementById('login-error').textContent = data.message; }
});
"#;

pub fn staff_login_page(store_name: &str, role: StaffRole) -> String {
    let (endpoint, next) = match role {
        StaffRole::Admin => ("/api/admin_login", "/admin/dashboard"),
        StaffRole::Cashier => ("/api/cashier_login", "/cashier/dashboard"),
    };
    let title = format!("{}登入", role.label());
    let body = format!(
        r#"<div class="card" style="max-width:360px;margin:40px auto">
<h2>{title}</h2>
<form id="login-form" data-endpoint="{endpoint}" data-next="{next}">
<p><input name="username" placeholder="帳號" required autofocus/></p>
<p><input name="password" type="password" placeholder="密碼" required/></p>
<p><button type="submit">登入</button></p>
<p id="login-error" class="price"></p>
</form>
</div>"#,
        title = esc(&title),
    );
    html_shell(
        &Shell {
            title: &title,
            store_name,
            nav: String::new(),
            script: LOGIN_JS.to_string(),
        },
        &body,
    )
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let title = status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string());
    let body = format!(
        "<div class=\"card\"><h2>{} {}</h2><p>{}</p><p><a class=\"button\" href=\"/menu\">回到菜單</a></p></div>",
        status.as_u16(),
        esc(&title),
        esc(message)
    );
    html_shell(
        &Shell {
            title: &title,
            store_name: crate::settings::DEFAULT_STORE_NAME,
            nav: String::new(),
            script: String::new(),
        },
        &body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn escapes_markup_and_quotes() {
        assert_eq!(
            esc(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn money_drops_needless_decimals() {
        assert_eq!(money(120.0), "$120");
        assert_eq!(money(12.5), "$12.50");
    }

    #[test]
    fn short_time_trims_seconds() {
        assert_eq!(short_time("2026-10-18T09:05:00.000Z"), "2026-10-18 09:05");
        assert_eq!(short_time("bad"), "bad");
    }

    #[test]
    fn staff_pages_poll_at_configured_interval() {
        let staff = StaffIdentity {
            role: StaffRole::Cashier,
            user_id: 1,
            username: "<amy>".into(),
            login_time: Utc::now(),
        };
        let chrome = StaffChrome {
            store_name: "小館",
            staff: &staff,
            poll_interval_seconds: 15,
        };
        let html = chrome.render("收銀台", "<p>hi</p>", "");
        assert!(html.contains("startOrderPolling(15000)"));
        assert!(html.contains("&lt;amy&gt;"));
        assert!(html.contains("/cashier/logout"));
        assert!(!html.contains("/admin/cashiers"));
    }

    #[test]
    fn login_page_posts_to_role_endpoint() {
        let html = staff_login_page("小館", StaffRole::Admin);
        assert!(html.contains("data-endpoint=\"/api/admin_login\""));
        let html = staff_login_page("小館", StaffRole::Cashier);
        assert!(html.contains("data-endpoint=\"/api/cashier_login\""));
    }

    #[test]
    fn error_page_shows_status_and_message() {
        let html = error_page(StatusCode::NOT_FOUND, "訂單不存在");
        assert!(html.contains("404"));
        assert!(html.contains("訂單不存在"));
    }
}
