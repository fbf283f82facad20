//! Checkout Success Page
//!
//! The processor redirects here with `?session_id=...`. The page keeps asking
//! the server to verify the session so the purchase shows up even when the
//! webhook is late.

use std::time::Duration;

use leptos::prelude::*;
use leptos_router::hooks::use_query_map;

use crate::api;
use crate::poll::{Poller, Step, GIVE_UP_HEADING, GIVE_UP_MESSAGE, POLL_INTERVAL_MS};
use crate::storage;

#[derive(Clone, Debug, PartialEq, Eq)]
enum PageState {
    Verifying(u32),
    Confirmed(String),
    TimedOut,
    MissingSession,
}

fn poll(session_id: String, mut poller: Poller, set_state: WriteSignal<PageState>) {
    leptos::task::spawn_local(async move {
        let result = api::verify_purchase(&session_id).await;
        match poller.record(&result) {
            Step::Settled(status) => {
                storage::clear_cart();
                set_state.set(PageState::Confirmed(status));
            }
            Step::Retry => {
                set_state.set(PageState::Verifying(poller.attempts()));
                set_timeout(
                    move || poll(session_id, poller, set_state),
                    Duration::from_millis(POLL_INTERVAL_MS),
                );
            }
            Step::GiveUp => set_state.set(PageState::TimedOut),
        }
    });
}

#[component]
pub fn SuccessPage() -> impl IntoView {
    let query = use_query_map();
    let (state, set_state) = signal(PageState::Verifying(0));

    match query.get_untracked().get("session_id") {
        Some(session_id) if !session_id.is_empty() => poll(session_id, Poller::default(), set_state),
        _ => set_state.set(PageState::MissingSession),
    }

    view! {
        <div class="success">
            {move || match state.get() {
                PageState::Verifying(attempt) => view! {
                    <h1>"Confirming your purchase..."</h1>
                    <p class="muted">{format!("Check {} of {}", attempt + 1, crate::poll::MAX_ATTEMPTS)}</p>
                }.into_any(),
                PageState::Confirmed(_) => view! {
                    <h1>"Thank you!"</h1>
                    <p>"Your purchase is confirmed and available in your account."</p>
                }.into_any(),
                PageState::TimedOut => view! {
                    <h1>{GIVE_UP_HEADING}</h1>
                    <p>{GIVE_UP_MESSAGE}</p>
                }.into_any(),
                PageState::MissingSession => view! {
                    <h1>"Nothing to confirm"</h1>
                    <p>"No checkout session was found. " <a href="/">"Back to the store"</a></p>
                }.into_any(),
            }}
        </div>
    }
}
