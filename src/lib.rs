pub mod api;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod hub;
pub mod loader;
pub mod model;
pub mod sampling;
pub mod state;
pub mod tokenizer;
