use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An item selected before checkout. `id` is the product id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub title: String,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A user's server-side cart mirror
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Add an item; a product appears at most once
    pub fn add(&mut self, item: CartItem) {
        if !self.items.iter().any(|i| i.id == item.id) {
            self.items.push(item);
        }
    }

    pub fn remove(&mut self, product_id: Uuid) {
        self.items.retain(|i| i.id != product_id);
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        self.items.iter().map(|i| i.id).collect()
    }

    /// Display total. Checkout always re-prices from the catalog.
    pub fn total(&self) -> Decimal {
        self.items.iter().map(|i| i.price).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_cart_dedupes_and_totals() {
        let p1 = Uuid::new_v4();
        let mut cart = Cart::default();
        cart.add(CartItem { id: p1, title: "p1".into(), price: dec!(10), image_url: None });
        cart.add(CartItem { id: p1, title: "p1".into(), price: dec!(10), image_url: None });
        cart.add(CartItem { id: Uuid::new_v4(), title: "p2".into(), price: dec!(20), image_url: None });

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.total(), dec!(30));

        cart.remove(p1);
        assert_eq!(cart.product_ids().len(), 1);
    }
}
