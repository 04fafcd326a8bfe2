pub mod announce;
pub mod config;
pub mod counter;
pub mod error;
pub mod exercise;
pub mod geometry;
pub mod pipeline;
pub mod recorder;
pub mod server;
pub mod session;
pub mod types;
