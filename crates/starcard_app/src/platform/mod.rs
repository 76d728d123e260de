mod app;
mod config;
mod logging;
mod progress;

pub use app::run_app;
