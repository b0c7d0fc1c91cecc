//! Business logic services layer

pub mod user_upsert_service;

pub use user_upsert_service::{SaveOutcome, UserUpsertService};
