//! Typed stores for the three append-only collections
//!
//! All SQL for proposals, scores and tags lives here. The stores enforce the
//! at-most-one-live invariants with compare-and-swap supersede transactions
//! instead of leaving them to caller convention.

use crate::Error;

pub mod proposals;
pub mod scores;
pub mod tags;

pub use proposals::ProposalStore;
pub use scores::ScoreStore;
pub use tags::TagStore;

/// Attempts per supersede sequence before surfacing a StaleWrite
pub(crate) const SUPERSEDE_RETRIES: u32 = 3;

/// A SQLITE_BUSY failure inside a supersede transaction is the same
/// condition as a lost compare-and-swap: another writer got there first
pub(crate) fn busy_to_stale(err: Error, key: &str) -> Error {
    if err.is_busy() {
        Error::StaleWrite(format!("{}: database busy during supersede", key))
    } else {
        err
    }
}
