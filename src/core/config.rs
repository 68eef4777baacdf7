//! Configuration file handling.
//!
//! The file is optional: a missing file yields [`Config::default`]. It holds
//! saved personas and a few connection defaults, never conversation state.

pub mod data;
mod io;

pub use data::{path_display, Config};
pub use io::ConfigError;
