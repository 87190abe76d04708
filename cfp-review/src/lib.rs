//! Reviewer-facing CFP portal service
//!
//! Hosts the assignment selector, the score submission endpoints and the
//! aggregation views (overview, per-track reports, global statistics).

pub mod assign;
pub mod handlers;
pub mod server;
pub mod stats;
