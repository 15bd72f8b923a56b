//! Thread reconciliation
//!
//! Turns chat messages into exchange runs under a thread container:
//! - `reconcile` - Pure decision from (message, latest exchange) to a store mutation
//! - `locks` - Per-thread serialization of the read-then-write cycle

mod locks;
mod reconcile;


pub use locks::ThreadLocks;
pub use reconcile::{ChatEvent, ThreadAction, decide, thread_upsert};
