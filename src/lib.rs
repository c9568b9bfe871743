// src/lib.rs

pub mod auth;
pub mod blob;
pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod navigation;
pub mod profile;
pub mod recorder;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
pub mod utils;

// Re-export specific items for convenience if needed
pub use routes::create_router;
