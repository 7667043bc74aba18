//! HTTP request handlers.

pub mod files;
pub mod games;
pub mod health;
pub mod libs;
