//! Page shell shared by every HTML route.

use dioxus::prelude::*;

use super::nav::{DeviceNav, NavEntry};

/// dioxus-html 0.7 has no `html` element; extend the element namespace
/// used by `rsx!` in this module with one.
#[allow(non_upper_case_globals, dead_code)]
mod dioxus_elements {
    pub use dioxus::html::*;

    pub mod elements {
        pub use super::html;
        pub use dioxus::html::elements::*;
    }

    pub mod html {
        pub const TAG_NAME: &str = "html";
        pub const NAME_SPACE: Option<&str> = None;
        pub const lang: dioxus::html::AttributeDescription = ("lang", None, false);
    }
}

const STYLES: &str = r#"
body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    display: flex;
    flex-direction: column;
    align-items: center;
    min-height: 100vh;
    margin: 0;
    background: linear-gradient(135deg, #1a1a2e 0%, #16213e 100%);
    color: white;
}
main.container { text-align: center; padding: 2rem; flex: 1; display: flex; flex-direction: column; justify-content: center; }
h1 { font-size: 2rem; margin-bottom: 2rem; }
a { color: #93c5fd; }
.icon { font-size: 4rem; margin-bottom: 1rem; }
.toggle {
    border: none;
    padding: 1rem 3rem;
    font-size: 1.5rem;
    border-radius: 50px;
    cursor: pointer;
    color: white;
    transition: all 0.3s ease;
    box-shadow: 0 4px 15px rgba(0,0,0,0.3);
}
.toggle.on { background: #22c55e; }
.toggle.off { background: #64748b; }
.toggle:hover { transform: scale(1.05); box-shadow: 0 6px 20px rgba(0,0,0,0.4); }
.status { margin-top: 1rem; opacity: 0.7; }
nav.devices { display: flex; gap: 0.5rem; flex-wrap: wrap; justify-content: center; padding: 1rem; }
nav.devices .device { padding: 0.4rem 1rem; border-radius: 999px; background: rgba(255,255,255,0.08); text-decoration: none; color: white; }
nav.devices .device.active { background: #22c55e; }
table { border-collapse: collapse; margin: 1rem auto; }
th, td { padding: 0.4rem 0.8rem; border-bottom: 1px solid rgba(255,255,255,0.15); }
form.inline { display: inline; }
fieldset { border: 1px solid rgba(255,255,255,0.2); border-radius: 8px; margin-top: 1.5rem; }
.error { color: #fca5a5; }
footer { padding: 1rem; opacity: 0.5; }
"#;

#[derive(Props, Clone, PartialEq)]
pub struct LayoutProps {
    /// Shown in the browser tab
    pub title: String,
    pub devices: Vec<NavEntry>,
    /// Selected device, highlighted in the switcher
    #[props(default)]
    pub active: String,
    pub children: Element,
}

#[component]
pub fn Layout(props: LayoutProps) -> Element {
    let version = env!("CARGO_PKG_VERSION");

    rsx! {
        html { lang: "en",
            head {
                meta { charset: "utf-8" }
                meta { name: "viewport", content: "width=device-width, initial-scale=1" }
                title { "{props.title}" }
                style { dangerous_inner_html: STYLES }
            }
            body {
                header {
                    DeviceNav { devices: props.devices.clone(), active: props.active.clone() }
                }
                main { class: "container", {props.children} }
                footer {
                    small { "Unified Home Control v{version}" }
                }
            }
        }
    }
}
