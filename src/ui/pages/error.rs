use dioxus::prelude::*;

use crate::ui::components::{Layout, NavEntry};

/// Error page for the HTML routes; the status code is set by the caller.
#[component]
pub fn ErrorPage(devices: Vec<NavEntry>, title: String, message: String) -> Element {
    rsx! {
        Layout { title: title.clone(), devices: devices,
            div { class: "icon", "⚠️" }
            h1 { "{title}" }
            p { class: "error", "{message}" }
            p { a { href: "/", "Home" } }
        }
    }
}
