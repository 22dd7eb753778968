// bookdash shared type definitions
// Each submodule defines types used across the application.

pub mod backup;
pub mod bookmark;
pub mod category;
pub mod config;
pub mod errors;
pub mod favicon;
pub mod icon;
pub mod ordering;
pub mod settings;
pub mod space;
