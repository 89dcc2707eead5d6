//! Shared domain types for the siren alert engine.
//!
//! The [`types`] module defines the `Alert` aggregate and its enums
//! (severity, status, category) used across the storage, engine, notify
//! and server crates. The [`id`] module provides process-wide Snowflake
//! ID generation.

pub mod id;
pub mod types;
