mod routes;
mod server;
mod telemetry;

pub mod app;
pub mod config;
pub mod pipeline;

pub use app::{build_dispatcher, start_app};
