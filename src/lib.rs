pub mod api;
pub mod auth;
pub mod binder;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod store;
pub mod uploads;
pub mod validation;

pub use api::{app, AppState};
