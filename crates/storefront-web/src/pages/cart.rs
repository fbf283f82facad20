//! Cart Page

use leptos::prelude::*;

use crate::api;
use crate::components::CartLine;
use crate::storage;

#[component]
pub fn CartPage() -> impl IntoView {
    let (items, set_items) = signal(storage::load_cart());
    let (loading, set_loading) = signal(false);
    let (error, set_error) = signal(None::<String>);

    let on_remove = Callback::new(move |id: String| {
        set_items.update(|items| storage::remove_item(items, &id));
        storage::save_cart(&items.get_untracked());
    });

    let checkout = move |_| {
        if loading.get() || items.get().is_empty() {
            return;
        }
        if storage::access_token().is_none() {
            set_error.set(Some("Please sign up or log in before checking out".into()));
            return;
        }

        set_loading.set(true);
        set_error.set(None);
        let cart = items.get();
        leptos::task::spawn_local(async move {
            match api::checkout_cart(&cart).await {
                Ok(session) => {
                    if let Some(window) = web_sys::window() {
                        let _ = window.location().set_href(&session.checkout_url);
                    }
                }
                Err(e) => {
                    set_error.set(Some(e));
                    set_loading.set(false);
                }
            }
        });
    };

    view! {
        <div class="cart">
            <h1>"Your cart"</h1>

            <Show
                when=move || !items.get().is_empty()
                fallback=|| view! { <p>"Your cart is empty. " <a href="/">"Browse products"</a></p> }
            >
                <ul class="cart-lines">
                    <For
                        each=move || items.get()
                        key=|item| item.id.clone()
                        children=move |item| view! { <CartLine item=item on_remove=on_remove /> }
                    />
                </ul>
                <div class="total">"Total: $"{move || storage::display_total(&items.get())}</div>
                <button class="btn btn-primary" on:click=checkout disabled=move || loading.get()>
                    {move || if loading.get() { "Redirecting..." } else { "Checkout" }}
                </button>
            </Show>

            <Show when=move || error.get().is_some()>
                <p class="error">{move || error.get().unwrap_or_default()}</p>
            </Show>
        </div>
    }
}
