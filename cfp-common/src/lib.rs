//! # CFP Common Library
//!
//! Shared code for the CFP portal services including:
//! - Database initialization and models
//! - Typed stores for proposals, scores and tags
//! - Tag sanitization
//! - Session store and user predicates
//! - Error types and JSON error responses

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod session;
pub mod store;
pub mod tags;
pub mod users;

pub use error::{Error, Result};
