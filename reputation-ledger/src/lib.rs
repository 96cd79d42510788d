//! Reputation Ledger
//!
//! Auditable ledger of reputation-affecting actions and the rank engine that
//! turns them into bounded, reversible changes to a user's rank.
//!
//! # Architecture
//!
//! - **Ledger rows**: one row per `(object, user, trigger, type)` slot, toggled
//!   between active and cancelled, never deleted
//! - **Single Writer**: every operation runs in one transaction holding the
//!   store's writer lock, committed as one RocksDB batch
//! - **Rank Engine**: sole writer of `User.rank`, enforcing the floor and the
//!   daily cap
//! - **Notifications**: published to a bounded queue after commit
//!
//! # Invariants
//!
//! - At most one active row per slot
//! - Ledger replay: a user's rank equals the starting rank plus the sum of
//!   their active rows' recorded rank, unless the floor absorbed a loss
//! - Rank never drops below 1

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod accept;
pub mod activity;
pub mod config;
pub mod content;
pub mod counter;
pub mod error;
pub mod follow;
pub mod history;
pub mod ledger;
pub mod metrics;
pub mod object;
pub mod rank;
pub mod registry;
pub mod rollback;
pub mod storage;
pub mod transaction;
pub mod types;
pub mod vote;

// Re-exports
pub use accept::AcceptRequest;
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use ledger::ReputationLedger;
pub use object::{EncodedIdResolver, ObjectKindResolver};
pub use rank::{RankEngine, RankOutcome, Suppression};
pub use registry::{ActivityRegistry, ActivityResolver, ConfigLookup, StaticRegistry};
pub use storage::Storage;
pub use types::{
    Action, Activity, ActivityId, ActivityKey, ActivityState, ActivityType, ContentRecord, ObjectId,
    ObjectKind, Page, UserId, UserRecord, VoteStatus, VoteTally,
};
pub use vote::Direction;
