//! Author-facing CFP portal service
//!
//! Hosts draft and final proposal submission, co-author confirmation, and
//! the tag vocabulary endpoint.

pub mod handlers;
pub mod server;
