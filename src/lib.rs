//! Seedpool: shared-corpus scheduling for distributed fuzzing sessions.
//!
//! Many independent fuzzing sessions, usually on different physical devices,
//! share one seed corpus through an eventually-consistent remote object
//! store and nothing else: no database, no lock server, no message queue.
//! Coordination rests on atomic rename. A seed belongs to whoever wins the
//! move of its object into the `inuse` tier; losers re-list and pick again.
//! [`Scheduler`] is the entry point, with one fetch operation
//! ([`Scheduler::fetch_seed`]) and one classification operation
//! ([`Scheduler::upload_corpus_out_dir`]) per fuzzing round.

pub mod claim;
mod classify;
pub mod config;
pub mod crash;
pub mod lock;
pub mod mem;
pub mod retry;
pub mod sched;
pub mod stats;
pub mod store;
pub mod tier;

pub use claim::{CorpusItem, CLAIM_ATTEMPTS};
pub use config::{Algorithm, Config};
pub use sched::{Fetched, Scheduler, Session};
pub use stats::Stats;
pub use store::{ObjectStore, StoreError};
pub use tier::{PathScheme, Tier};
