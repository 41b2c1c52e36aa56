//! Server-rendered HTML pages (Dioxus components, rendered with `dioxus-ssr`)

pub mod components;
pub mod pages;

use dioxus::prelude::*;

/// Render a full page element to an HTML document.
pub fn render_page(page: Element) -> String {
    format!("<!DOCTYPE html>{}", dioxus_ssr::render_element(page))
}
