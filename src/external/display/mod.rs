/// Control of display backlights and monitor settings
pub mod command;
pub mod ddcutil;
pub mod interface;
pub mod logind;
pub mod mock;

pub use interface::*;
