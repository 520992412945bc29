//! Session cart: line items keyed by product id.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{items_total, LineItem, Product, MAX_QUANTITY};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> f64 {
        items_total(&self.items)
    }

    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Add `quantity` of `product`. A product already in the cart keeps its
    /// original snapshot and only grows in quantity, up to [`MAX_QUANTITY`].
    pub fn add(&mut self, product: &Product, quantity: i64) -> Result<(), AppError> {
        check_quantity(quantity)?;
        match self.items.iter_mut().find(|i| i.id == product.id) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .filter(|q| *q <= MAX_QUANTITY)
                    .ok_or_else(too_many)?;
            }
            None => self.items.push(LineItem::from_product(product, quantity)),
        }
        Ok(())
    }

    pub fn remove(&mut self, product_id: i64) {
        self.items.retain(|i| i.id != product_id);
    }

    /// Set the quantity of a line; zero or less drops it. Unknown ids are ignored.
    pub fn update(&mut self, product_id: i64, quantity: i64) -> Result<(), AppError> {
        if quantity > MAX_QUANTITY {
            return Err(too_many());
        }
        if let Some(pos) = self.items.iter().position(|i| i.id == product_id) {
            if quantity <= 0 {
                self.items.remove(pos);
            } else {
                self.items[pos].quantity = quantity;
            }
        }
        Ok(())
    }

    /// Empty the cart and hand back its lines for checkout.
    pub fn take(&mut self) -> Vec<LineItem> {
        std::mem::take(&mut self.items)
    }

    /// Put back lines from a checkout that failed. Lines added since the
    /// take are merged in after them.
    pub fn restore(&mut self, lines: Vec<LineItem>) {
        let added = std::mem::replace(&mut self.items, lines);
        for line in added {
            match self.items.iter_mut().find(|i| i.id == line.id) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .saturating_add(line.quantity)
                        .min(MAX_QUANTITY);
                }
                None => self.items.push(line),
            }
        }
    }
}

fn too_many() -> AppError {
    AppError::invalid(format!("單項數量不可超過 {MAX_QUANTITY}"))
}

fn check_quantity(quantity: i64) -> Result<(), AppError> {
    if quantity < 1 {
        return Err(AppError::invalid("數量必須大於 0"));
    }
    if quantity > MAX_QUANTITY {
        return Err(too_many());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64, price: f64) -> Product {
        Product {
            id,
            name: format!("item-{id}"),
            price,
            image_url: String::new(),
            stock: 99,
            category: "主餐".into(),
        }
    }

    #[test]
    fn duplicate_add_merges_quantity() {
        let mut cart = Cart::default();
        cart.add(&product(1, 120.0), 1).unwrap();
        cart.add(&product(2, 30.0), 2).unwrap();
        cart.add(&product(1, 120.0), 2).unwrap();

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.items()[0].quantity, 3);
        assert_eq!(cart.total(), 420.0);
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn merged_line_keeps_first_snapshot_price() {
        let mut cart = Cart::default();
        cart.add(&product(1, 100.0), 1).unwrap();
        cart.add(&product(1, 150.0), 1).unwrap();
        assert_eq!(cart.items()[0].price, 100.0);
        assert_eq!(cart.total(), 200.0);
    }

    #[test]
    fn add_rejects_non_positive_quantity() {
        let mut cart = Cart::default();
        assert!(cart.add(&product(1, 10.0), 0).is_err());
        assert!(cart.is_empty());
    }

    #[test]
    fn quantities_are_capped_per_line() {
        let mut cart = Cart::default();
        assert!(cart.add(&product(1, 10.0), MAX_QUANTITY + 1).is_err());
        assert!(cart.add(&product(1, 10.0), i64::MAX).is_err());
        assert!(cart.is_empty());

        cart.add(&product(1, 10.0), MAX_QUANTITY - 1).unwrap();
        cart.add(&product(1, 10.0), 1).unwrap();
        assert_eq!(cart.items()[0].quantity, MAX_QUANTITY);

        // Merging past the cap is refused and leaves the line as it was.
        assert!(cart.add(&product(1, 10.0), 1).is_err());
        assert_eq!(cart.items()[0].quantity, MAX_QUANTITY);

        assert!(cart.update(1, i64::MAX).is_err());
        assert_eq!(cart.items()[0].quantity, MAX_QUANTITY);
        cart.update(1, 2).unwrap();
        assert_eq!(cart.items()[0].quantity, 2);
    }

    #[test]
    fn update_to_zero_removes_line() {
        let mut cart = Cart::default();
        cart.add(&product(1, 10.0), 1).unwrap();
        cart.add(&product(2, 20.0), 1).unwrap();

        cart.update(1, 4).unwrap();
        assert_eq!(cart.items()[0].quantity, 4);

        cart.update(1, 0).unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].id, 2);

        cart.update(99, 5).unwrap();
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn remove_and_take() {
        let mut cart = Cart::default();
        cart.add(&product(1, 10.0), 1).unwrap();
        cart.add(&product(2, 20.0), 1).unwrap();
        cart.remove(1);
        assert_eq!(cart.items().len(), 1);

        let lines = cart.take();
        assert_eq!(lines.len(), 1);
        assert!(cart.is_empty());
    }

    #[test]
    fn restore_merges_lines_added_during_checkout() {
        let mut cart = Cart::default();
        cart.add(&product(1, 10.0), 2).unwrap();
        cart.add(&product(2, 20.0), 1).unwrap();
        let taken = cart.take();

        cart.add(&product(2, 20.0), 1).unwrap();
        cart.add(&product(3, 5.0), 4).unwrap();
        cart.restore(taken);

        let lines: Vec<(i64, i64)> = cart.items().iter().map(|i| (i.id, i.quantity)).collect();
        assert_eq!(lines, vec![(1, 2), (2, 2), (3, 4)]);
    }

    #[test]
    fn serializes_as_plain_line_list() {
        let mut cart = Cart::default();
        cart.add(&product(5, 45.0), 2).unwrap();
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json[0]["id"], 5);
        assert_eq!(json[0]["quantity"], 2);
    }
}
