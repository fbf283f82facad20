//! Home Page: the catalog

use leptos::prelude::*;

use crate::api::{self, CartItem, Product};
use crate::components::ProductCard;
use crate::storage;

#[component]
pub fn HomePage() -> impl IntoView {
    let (products, set_products) = signal(Vec::<Product>::new());
    let (error, set_error) = signal(None::<String>);
    let (cart_count, set_cart_count) = signal(storage::load_cart().len());

    leptos::task::spawn_local(async move {
        match api::list_products().await {
            Ok(list) => set_products.set(list),
            Err(e) => set_error.set(Some(e)),
        }
    });

    let on_add = Callback::new(move |product: Product| {
        let mut items = storage::load_cart();
        storage::add_item(&mut items, CartItem::from(&product));
        storage::save_cart(&items);
        set_cart_count.set(items.len());
    });

    view! {
        <div class="home">
            <header class="hero">
                <h1>"Courses, guides & coaching"</h1>
                <a href="/cart" class="btn">{move || format!("Cart ({})", cart_count.get())}</a>
            </header>

            <Show when=move || error.get().is_some()>
                <p class="error">{move || error.get().unwrap_or_default()}</p>
            </Show>

            <section class="products">
                <For
                    each=move || products.get()
                    key=|p| p.id.clone()
                    children=move |product| view! { <ProductCard product=product on_add=on_add /> }
                />
            </section>
        </div>
    }
}
