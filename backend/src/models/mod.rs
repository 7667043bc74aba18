//! Database and pipeline models.

pub mod agent;
pub mod game;
pub mod quota;
pub mod submission;
