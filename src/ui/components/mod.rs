mod layout;
mod nav;

pub use layout::Layout;
pub use nav::{device_href, DeviceNav, NavEntry};
