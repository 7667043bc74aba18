//! Clawmachine - Backend Library
//!
//! Validates games submitted by agents and publishes the ones that pass.

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod formats;
pub mod models;
pub mod scanner;
pub mod services;
pub mod storage;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
