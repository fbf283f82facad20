//! Sign-up Page

use leptos::prelude::*;

use crate::api;
use crate::storage;

#[component]
pub fn SignUpPage() -> impl IntoView {
    let (email, set_email) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (full_name, set_full_name) = signal(String::new());
    let (loading, set_loading) = signal(false);
    let (message, set_message) = signal(None::<Result<String, String>>);

    let submit = move |_| {
        if loading.get() {
            return;
        }
        set_loading.set(true);
        set_message.set(None);

        let (email, password, name) = (email.get(), password.get(), full_name.get());
        leptos::task::spawn_local(async move {
            let name = (!name.trim().is_empty()).then_some(name);
            match api::sign_up(&email, &password, name.as_deref()).await {
                Ok(response) => {
                    storage::save_session(&response.user.id, response.access_token.as_deref());
                    let note = if response.access_token.is_some() {
                        "Account created. You can check out now.".to_string()
                    } else {
                        "Account created. Confirm your email to continue.".to_string()
                    };
                    set_message.set(Some(Ok(note)));
                }
                // Shown exactly as the auth provider phrased it
                Err(e) => set_message.set(Some(Err(e))),
            }
            set_loading.set(false);
        });
    };

    view! {
        <div class="signup">
            <h1>"Create an account"</h1>
            <div class="field">
                <label>"Name"</label>
                <input type="text" prop:value=move || full_name.get()
                    on:input=move |ev| set_full_name.set(event_target_value(&ev)) />
            </div>
            <div class="field">
                <label>"Email"</label>
                <input type="email" prop:value=move || email.get()
                    on:input=move |ev| set_email.set(event_target_value(&ev)) />
            </div>
            <div class="field">
                <label>"Password"</label>
                <input type="password" prop:value=move || password.get()
                    on:input=move |ev| set_password.set(event_target_value(&ev)) />
            </div>
            <button class="btn btn-primary" on:click=submit disabled=move || loading.get()>
                {move || if loading.get() { "..." } else { "Sign up" }}
            </button>

            {move || match message.get() {
                Some(Ok(note)) => view! { <p class="notice">{note}</p> }.into_any(),
                Some(Err(e)) => view! { <p class="error">{e}</p> }.into_any(),
                None => ().into_any(),
            }}
        </div>
    }
}
