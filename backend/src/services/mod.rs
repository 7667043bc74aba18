//! Business logic services.

pub mod auth_service;
pub mod field_validator;
pub mod game_service;
pub mod ledger_service;
pub mod library_registry;
pub mod metrics_service;
pub mod publish_service;
pub mod quota_service;
pub mod submission_service;
