#![allow(clippy::uninlined_format_args)]

pub mod activity;
pub mod app;
pub mod autoplay;
pub mod cache;
pub mod cli;
pub mod config;
pub mod content;
pub mod data;
pub mod feed;
pub mod player;
pub mod resolve;
pub mod runtime;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
