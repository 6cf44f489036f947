// server module public api

pub mod app;
pub mod handlers;
pub mod uploads;

pub use app::{create_app, start_server, AppState};
