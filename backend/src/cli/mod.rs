//! CLI modules for the backend binary.

pub mod args;
pub mod runner;

pub use args::{Cli, Command};
