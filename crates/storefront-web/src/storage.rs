//! Browser storage: access token, user id and the cart

use crate::api::CartItem;

const TOKEN_KEY: &str = "storefront.access_token";
const USER_KEY: &str = "storefront.user_id";
const CART_KEY: &str = "storefront.cart";

fn local() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

fn get(key: &str) -> Option<String> {
    local().and_then(|s| s.get_item(key).ok().flatten())
}

fn set(key: &str, value: &str) {
    if let Some(storage) = local() {
        let _ = storage.set_item(key, value);
    }
}

pub fn access_token() -> Option<String> {
    get(TOKEN_KEY)
}

pub fn user_id() -> Option<String> {
    get(USER_KEY)
}

/// Remember who signed up on this browser
pub fn save_session(user_id: &str, token: Option<&str>) {
    set(USER_KEY, user_id);
    if let Some(token) = token {
        set(TOKEN_KEY, token);
    }
}

pub fn load_cart() -> Vec<CartItem> {
    get(CART_KEY)
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

pub fn save_cart(items: &[CartItem]) {
    if let Ok(raw) = serde_json::to_string(items) {
        set(CART_KEY, &raw);
    }
}

pub fn clear_cart() {
    save_cart(&[]);
}

/// Add an item unless a line for the same product exists
pub fn add_item(items: &mut Vec<CartItem>, item: CartItem) {
    if !items.iter().any(|i| i.id == item.id) {
        items.push(item);
    }
}

pub fn remove_item(items: &mut Vec<CartItem>, id: &str) {
    items.retain(|i| i.id != id);
}

/// Display total. Authoritative prices come from the server at checkout.
pub fn display_total(items: &[CartItem]) -> String {
    let total: f64 = items.iter().filter_map(|i| i.price.parse::<f64>().ok()).sum();
    format!("{total:.2}")
}
