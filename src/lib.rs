mod routes;

pub mod app;
pub mod classifier;
pub mod config;
pub mod counters;
pub mod decoder;
pub mod error;
pub mod handler;
pub mod server;
pub mod status;
pub mod telemetry;
pub mod validation;

pub use app::start_app;
pub use server::{build_router, AppState};
