//! Periodic screenshot capture and simple time tracking through a cli/daemon pair.
//! The daemon polls system state at a fixed interval, captures the selected
//! monitors while the session is in use, and aggregates activity into per-day
//! summaries.

pub mod cli;
pub mod daemon;
pub mod fs;
pub mod screen_api;
pub mod system_api;
pub mod utils;
