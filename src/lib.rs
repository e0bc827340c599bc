//! Display brightness, contrast and color preset control for desktop panels.
//!
//! The [sync::SyncEngine] sits between a user interface and a
//! [external::display::DisplayController]: it takes change requests from
//! sliders without ever blocking, coalesces them into as few device writes
//! as the device can handle, and keeps the shown values up to date by
//! polling the device.

pub mod config;
pub mod external;
pub mod sync;
