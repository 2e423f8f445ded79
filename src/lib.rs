pub mod api;
pub mod app;
pub mod clustering;
pub mod config;
pub mod constants;
pub mod coverage;
pub mod database;
pub mod error;
pub mod geo;
pub mod logging;
pub mod models;
pub mod store;
pub mod video_cache;
pub mod viewport;

#[cfg(test)]
mod test_utils;

pub const VERSION: &str = "0.1.0";
