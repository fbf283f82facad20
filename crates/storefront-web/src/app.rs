//! Main App Component

use leptos::prelude::*;
use leptos_router::{components::*, path};

use crate::pages::{CartPage, HomePage, SignUpPage, SuccessPage};

/// Root application component
#[component]
pub fn App() -> impl IntoView {
    view! {
        <Router>
            <nav class="topbar">
                <a href="/" class="brand">"Storefront"</a>
                <a href="/cart">"Cart"</a>
                <a href="/signup">"Sign up"</a>
            </nav>
            <main class="app">
                <Routes fallback=|| view! { <p>"Page not found"</p> }>
                    <Route path=path!("/") view=HomePage />
                    <Route path=path!("/cart") view=CartPage />
                    <Route path=path!("/signup") view=SignUpPage />
                    <Route path=path!("/checkout/success") view=SuccessPage />
                </Routes>
            </main>
        </Router>
    }
}
