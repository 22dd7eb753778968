// bookdash services
pub mod backup_service;
pub mod config_engine;
pub mod favicon_service;
pub mod icon_store;
