//! bookdash: a self-hosted bookmark dashboard backend.
//!
//! Spaces hold categories, categories hold bookmarks. Bookmark icons are
//! resolved from the target site and cached; a user's whole dashboard can be
//! exported to and restored from a ZIP backup.
//!
//! This library crate exposes all modules for use by the binary and integration tests.

pub mod app;
pub mod database;
pub mod managers;
pub mod services;
pub mod rpc_handler;
pub mod types;
