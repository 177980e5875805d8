//! Document store trait abstraction.
//!
//! This crate defines the `DocumentStore` trait that the batching engine
//! writes through. `firestore-sink` implements it against Cloud Firestore;
//! this crate ships two implementations of its own:
//!
//! - [`MemoryStore`] keeps documents in memory and records each commit
//! - [`DryRunStore`] logs what would be written

mod dry_run;
mod memory;
mod traits;

pub use dry_run::DryRunStore;
pub use memory::{CommitRecord, MemoryStore};
pub use traits::{auto_id, DocumentStore, DocumentWrite, WriteError, MAX_BATCH_WRITES};
