//! Refills a web template's image assets from its hosted demo site.
//!
//! The local template tree mirrors the demo's layout, so each image's path
//! relative to the template root doubles as its URL path on the demo. A scan
//! finds empty and stub image files, and a download pass replaces them while
//! the window reports progress.

pub mod app;
pub mod download;
pub mod fetch;
pub mod remote;
pub mod scan;
pub mod settings;
