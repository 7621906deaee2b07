//! Guild Bank Domain Types
//!
//! This crate defines the domain types for a guild bank: a slot-based
//! item store shared by the members of a guild, guarded by per-rank
//! rights and per-member daily withdrawal quotas, and audited through
//! bounded event logs.
//!
//! # Key Concepts
//!
//! - **Tab / Slot**: the bank is a set of purchased tabs, each a fixed-size
//!   grid of slots holding at most one item stack.
//! - **Rank**: a contiguous ladder of permission levels. Rank 0 is the
//!   guild master and always holds every right with unlimited quotas.
//! - **Endpoint**: either a bank slot or a personal-inventory slot; every
//!   item move runs between two endpoints.
//! - **Rejection**: the typed reason a request was refused before any
//!   state changed.
//!
//! # Architecture
//!
//! This is a pure types crate with no runtime dependencies. Domain types
//! implement `Clone`, `Debug`, `Serialize`, `Deserialize`. String IDs use
//! the newtype pattern and implement `Display`, `generate()`, and `new()`.

#![deny(unsafe_code)]

mod character;
mod config;
mod endpoint;
mod errors;
mod ids;
mod item;
mod limits;
mod log;
mod rank;
mod rights;

pub use character::*;
pub use config::*;
pub use endpoint::*;
pub use errors::*;
pub use ids::*;
pub use item::*;
pub use limits::*;
pub use log::*;
pub use rank::*;
pub use rights::*;
