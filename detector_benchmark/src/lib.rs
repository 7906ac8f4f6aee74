mod app;
mod backends;

pub mod config;
pub mod detection;
pub mod detector;
pub mod labels;
pub mod report;
pub mod runner;
pub mod sampler;
pub mod telemetry;
pub mod visualize;
pub mod yolo;

pub use app::{start_app, AppError};
