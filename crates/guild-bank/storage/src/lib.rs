//! Guild bank persistence contract.
//!
//! The bank engine never talks to a database directly. Every state change
//! is staged as a [`WriteBatch`] of keyed upserts and deletes and handed to
//! a [`WriteQueue`], which commits the whole batch or nothing. In-memory
//! state is mutated only after the commit returns.
//!
//! - [`RecordKey`] names every persisted record of a guild.
//! - [`RecordSource`] reads a guild's records back for restart.
//! - [`memory::InMemoryGuildStore`] is the deterministic reference adapter.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
mod traits;

pub use error::{StorageError, StorageResult};
pub use model::{RecordKey, StoredRecord, WriteBatch, WriteOp};
pub use traits::{GuildStore, RecordSource, WriteQueue};
