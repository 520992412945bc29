//! Customer-facing pages: menu, cart, checkout and order tracking.

use super::{esc, flash_html, html_shell, money, short_time, Shell};
use crate::cart::Cart;
use crate::models::{LineItem, Order, Product};

const MENU_JS: &str = r#"
async function addToCart(id) {
  const data = await api('POST', '/api/add_to_cart', { product_id: id, quantity: 1 });
  showToast(data.message || (data.success ? '已加入購物車' : '加入失敗'));
  if (data.success) refreshCartCount();
}
async function refreshCartCount() {
  const data = await api('GET', '/api/get_cart');
  const count = data.cart.reduce((n, i) => n + i.quantity, 0);
  document.getElementById('cart-count').textContent = count;
}
"#;

const CART_JS: &str = r#"
async function setQuantity(id, quantity) {
  const data = await api('POST', '/api/update_cart', { product_id: id, quantity });
  if (!data.success) { alert(data.message); return; }
  location.reload();
}
async function removeItem(id) {
  const data = await api('POST', '/api/remove_from_cart', { product_id: id });
  if (!data.success) { alert(data.message); return; }
  location.reload();
}
"#;

const CHECKOUT_JS: &str = r#"
document.getElementById('checkout-form').addEventListener('submit', async (ev) => {
  ev.preventDefault();
  const form = ev.target;
  const data = await api('POST', '/api/submit_order', {
    customer_name: form.customer_name.value,
    customer_phone: form.customer_phone.value,
    dine_in: form.dine_in.value === 'true',
  });
  if (data.success) { location.href = '/payment/' + data.order_id; }
  else { document.getElementById('checkout-error').textContent = data.message; }
});
"#;

const STATUS_JS: &str = r#"
const statusEl = document.getElementById('order-status');
async function refreshStatus() {
  const data = await api('GET', '/api/order_status/' + statusEl.dataset.orderId);
  if (data.success) statusEl.textContent = data.order.status;
}
setInterval(refreshStatus, 10000);
"#;

fn customer_nav(cart_count: i64) -> String {
    format!(
        "<a href=\"/menu\">菜單</a><a href=\"/cart\">購物車 (<span id=\"cart-count\">{cart_count}</span>)</a>"
    )
}

fn customer_page(store_name: &str, title: &str, cart_count: i64, body: &str, script: &str) -> String {
    html_shell(
        &Shell {
            title,
            store_name,
            nav: customer_nav(cart_count),
            script: script.to_string(),
        },
        body,
    )
}

pub(crate) fn product_card(product: &Product) -> String {
    format!(
        r#"<div class="card">
<img src="{img}" alt="{name}" loading="lazy"/>
<h3>{name}</h3>
<p><span class="price">{price}</span> <span class="muted">庫存 {stock}</span></p>
<button onclick="addToCart({id})">加入購物車</button>
</div>"#,
        img = esc(&product.image_url),
        name = esc(&product.name),
        price = money(product.price),
        stock = product.stock,
        id = product.id,
    )
}

pub(crate) fn menu_sections(groups: &[(String, Vec<&Product>)]) -> String {
    if groups.is_empty() {
        return "<p class=\"muted\">目前沒有商品</p>".to_string();
    }
    groups
        .iter()
        .map(|(category, products)| {
            let cards: String = products.iter().map(|p| product_card(p)).collect();
            format!("<h2>{}</h2><div class=\"grid\">{cards}</div>", esc(category))
        })
        .collect()
}

pub fn menu_page(
    store_name: &str,
    flash: &[String],
    groups: &[(String, Vec<&Product>)],
    cart_count: i64,
) -> String {
    let body = format!("{}{}", flash_html(flash), menu_sections(groups));
    customer_page(store_name, "菜單", cart_count, &body, MENU_JS)
}

fn lines_table(items: &[LineItem], editable: bool) -> String {
    let rows: String = items
        .iter()
        .map(|item| {
            let quantity = if editable {
                format!(
                    "<button class=\"secondary\" onclick=\"setQuantity({id}, {dec})\">-</button> {q} \
                     <button class=\"secondary\" onclick=\"setQuantity({id}, {inc})\">+</button>",
                    id = item.id,
                    q = item.quantity,
                    dec = item.quantity - 1,
                    inc = item.quantity + 1,
                )
            } else {
                item.quantity.to_string()
            };
            let remove = if editable {
                format!("<td><button onclick=\"removeItem({})\">移除</button></td>", item.id)
            } else {
                String::new()
            };
            format!(
                "<tr><td>{}</td><td>{}</td><td>{quantity}</td><td>{}</td>{remove}</tr>",
                esc(&item.name),
                money(item.price),
                money(item.subtotal()),
            )
        })
        .collect();
    let extra_head = if editable { "<th></th>" } else { "" };
    format!(
        "<table><tr><th>商品</th><th>單價</th><th>數量</th><th>小計</th>{extra_head}</tr>{rows}</table>"
    )
}

pub fn cart_page(store_name: &str, flash: &[String], cart: &Cart) -> String {
    let body = if cart.is_empty() {
        format!(
            "{}<div class=\"card\"><p>購物車是空的</p><a class=\"button\" href=\"/menu\">繼續點餐</a></div>",
            flash_html(flash)
        )
    } else {
        format!(
            "{}<h2>購物車</h2>{}<p>總計 <span class=\"price\">{}</span></p>\
             <a class=\"button\" href=\"/menu\">繼續點餐</a> <a class=\"button\" href=\"/checkout\">結帳</a>",
            flash_html(flash),
            lines_table(cart.items(), true),
            money(cart.total())
        )
    };
    customer_page(store_name, "購物車", cart.item_count(), &body, CART_JS)
}

pub fn checkout_page(store_name: &str, cart: &Cart) -> String {
    let body = format!(
        r#"<h2>結帳</h2>
{lines}
<p>總計 <span class="price">{total}</span></p>
<form id="checkout-form" class="card">
<p><input name="customer_name" placeholder="姓名" required/></p>
<p><input name="customer_phone" placeholder="電話"/></p>
<p><label><input type="radio" name="dine_in" value="true" checked/> 內用</label>
<label><input type="radio" name="dine_in" value="false"/> 外帶</label></p>
<p><button type="submit">送出訂單</button></p>
<p id="checkout-error" class="price"></p>
</form>"#,
        lines = lines_table(cart.items(), false),
        total = money(cart.total()),
    );
    customer_page(store_name, "結帳", cart.item_count(), &body, CHECKOUT_JS)
}

pub fn payment_page(store_name: &str, order: &Order) -> String {
    let body = format!(
        r#"<div class="card">
<h2>付款</h2>
<p>訂單編號 #{id}</p>
<p>應付金額 <span class="price">{total}</span></p>
<p class="muted">請至櫃檯付款，或出示此頁面給店員。</p>
<a class="button" href="/order_success/{id}">完成付款</a>
</div>"#,
        id = order.id,
        total = money(order.total_price),
    );
    customer_page(store_name, "付款", 0, &body, "")
}

pub fn order_success_page(store_name: &str, order: &Order) -> String {
    let body = format!(
        r#"<div class="card">
<h2>訂單已送出</h2>
<p>感謝 {name} 的訂購，訂單編號 #{id}。</p>
<p>{mode}</p>
<a class="button" href="/order_status/{id}">查看訂單狀態</a>
<a class="button" href="/menu">回到菜單</a>
</div>"#,
        name = esc(&order.customer_name),
        id = order.id,
        mode = if order.dine_in { "內用" } else { "外帶" },
    );
    customer_page(store_name, "訂單成功", 0, &body, "")
}

pub fn order_status_page(store_name: &str, order: &Order, items: &[LineItem]) -> String {
    let body = format!(
        r#"<div class="card">
<h2>訂單 #{id}</h2>
<p>狀態 <b id="order-status" data-order-id="{id}">{status}</b></p>
<p class="muted">{name} · {created} · {mode}</p>
{lines}
<p>總計 <span class="price">{total}</span></p>
</div>"#,
        id = order.id,
        status = order.status.as_str(),
        name = esc(&order.customer_name),
        created = short_time(&order.created_at),
        mode = if order.dine_in { "內用" } else { "外帶" },
        lines = lines_table(items, false),
        total = money(order.total_price),
    );
    customer_page(store_name, "訂單狀態", 0, &body, STATUS_JS)
}
