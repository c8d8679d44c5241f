//! # Request Handlers
//!
//! Handlers grouped by endpoint family.

pub mod health;
pub mod tasks;
