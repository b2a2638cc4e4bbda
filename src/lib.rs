pub mod config;
pub mod errors;
pub mod story;

pub mod database;
pub mod server;
pub mod services;
