//! Counter dashboard: today's order queue plus the menu for walk-in orders.

use super::{esc, money, orders_table, StaffChrome};
use crate::cart::Cart;
use crate::models::{Order, Product};

const COUNTER_JS: &str = r#"
async function addToCart(id) {
  const data = await api('POST', '/api/add_to_cart', { product_id: id, quantity: 1 });
  if (!data.success) { alert(data.message); return; }
  location.reload();
}
async function removeItem(id) {
  await api('POST', '/api/remove_from_cart', { product_id: id });
  location.reload();
}
document.getElementById('counter-order').addEventListener('submit', async (ev) => {
  ev.preventDefault();
  const form = ev.target;
  const data = await api('POST', '/api/submit_order', {
    customer_name: form.customer_name.value,
    customer_phone: form.customer_phone.value,
    dine_in: form.dine_in.checked,
  });
  if (!data.success) { alert(data.message); return; }
  showToast('已建立訂單 #' + data.order_id);
  setTimeout(() => location.reload(), 800);
});
"#;

fn counter_menu(groups: &[(String, Vec<&Product>)]) -> String {
    groups
        .iter()
        .map(|(category, products)| {
            let buttons: String = products
                .iter()
                .map(|p| {
                    format!(
                        "<button class=\"secondary\" onclick=\"addToCart({})\">{} {}</button> ",
                        p.id,
                        esc(&p.name),
                        money(p.price)
                    )
                })
                .collect();
            format!("<h4>{}</h4><p>{buttons}</p>", esc(category))
        })
        .collect()
}

fn counter_cart(cart: &Cart) -> String {
    if cart.is_empty() {
        return "<p class=\"muted\">尚未選擇商品</p>".to_string();
    }
    let rows: String = cart
        .items()
        .iter()
        .map(|i| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td><button class=\"secondary\" onclick=\"removeItem({})\">×</button></td></tr>",
                esc(&i.name),
                i.quantity,
                money(i.subtotal()),
                i.id
            )
        })
        .collect();
    format!(
        "<table>{rows}<tr><th colspan=\"2\">總計</th><th colspan=\"2\">{}</th></tr></table>",
        money(cart.total())
    )
}

pub fn dashboard_page(
    chrome: &StaffChrome<'_>,
    today_orders: &[Order],
    groups: &[(String, Vec<&Product>)],
    cart: &Cart,
) -> String {
    let body = format!(
        r#"<h2>今日訂單</h2>
{orders}
<h2>櫃檯點餐</h2>
<div class="stats">
<div class="card">{menu}</div>
<div class="card">
{cart}
<form id="counter-order">
<p><input name="customer_name" placeholder="顧客姓名" required/></p>
<p><input name="customer_phone" placeholder="電話"/></p>
<p><label><input type="checkbox" name="dine_in" checked/> 內用</label></p>
<p><button type="submit">建立訂單</button></p>
</form>
</div>
</div>"#,
        orders = orders_table(today_orders, true),
        menu = counter_menu(groups),
        cart = counter_cart(cart),
    );
    chrome.render("收銀台", &body, COUNTER_JS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaffIdentity;
    use crate::models::StaffRole;
    use chrono::Utc;

    #[test]
    fn dashboard_shows_counter_cart_and_menu() {
        let staff = StaffIdentity {
            role: StaffRole::Cashier,
            user_id: 2,
            username: "amy".into(),
            login_time: Utc::now(),
        };
        let chrome = StaffChrome {
            store_name: "小館",
            staff: &staff,
            poll_interval_seconds: 10,
        };
        let tea = Product {
            id: 8,
            name: "奶茶".into(),
            price: 45.0,
            image_url: String::new(),
            stock: 99,
            category: "飲品".into(),
        };
        let mut cart = Cart::default();
        cart.add(&tea, 2).unwrap();
        let groups = vec![("飲品".to_string(), vec![&tea])];

        let html = dashboard_page(&chrome, &[], &groups, &cart);
        assert!(html.contains("addToCart(8)"));
        assert!(html.contains("$90"));
        assert!(html.contains("沒有訂單"));
        assert!(html.contains("counter-order"));
    }
}
