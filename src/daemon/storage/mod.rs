//! Storage is organized around a single data directory with one folder per
//! UTC day:
//!  - `<data>/<YYYY-MM-DD>/activity.jsonl` stores activity as intervals
//!    (from time a, for duration b, active or not) through
//!    [activity_storage::LocalActivityStorage].
//!  - `<data>/<YYYY-MM-DD>/screenshots/` holds the captured images, with a
//!    `screenshots.jsonl` manifest next to them, through
//!    [image_store::ScreenshotStore].
//!  - `<data>/<YYYY-MM-DD>/reports/` receives the generated day summary.

pub mod activity_storage;
pub mod entities;
pub mod image_store;
pub mod snapshot_event;
