//! UI Components

use leptos::prelude::*;

use crate::api::{CartItem, Product};

/// Catalog card with an add-to-cart button
#[component]
pub fn ProductCard(product: Product, on_add: Callback<Product>) -> impl IntoView {
    let description = product.description.clone().unwrap_or_default();
    let title = product.title.clone();
    let price = product.price.clone();

    view! {
        <div class="product">
            <h3>{title}</h3>
            <p class="description">{description}</p>
            <div class="price">"$"{price}</div>
            <button class="btn btn-primary" on:click=move |_| on_add.run(product.clone())>
                "Add to cart"
            </button>
        </div>
    }
}

/// One cart line
#[component]
pub fn CartLine(item: CartItem, on_remove: Callback<String>) -> impl IntoView {
    let id = item.id.clone();

    view! {
        <li class="cart-line">
            <span class="title">{item.title}</span>
            <span class="price">"$"{item.price}</span>
            <button class="btn btn-link" on:click=move |_| on_remove.run(id.clone())>"Remove"</button>
        </li>
    }
}
