//! Superlists Web Server
//!
//! Serves to-do lists over HTTP: a "start a new list" page at `/` and one
//! canonical page per list at `/lists/<id>/`.

pub mod config;
pub mod render;
pub mod server;

pub use config::WebConfig;
pub use server::{serve, AppError, WebServer};
