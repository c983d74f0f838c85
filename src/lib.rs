//! GoldVault library exports

pub mod clock;
pub mod config;
pub mod conversion;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod tasks;
