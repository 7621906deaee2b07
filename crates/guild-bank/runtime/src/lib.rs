//! Guild Bank Runtime
//!
//! The engine behind a guild bank: a grid of purchased tabs shared by the
//! members of a guild, guarded by rank rights and daily withdrawal quotas,
//! and audited through bounded event logs.
//!
//! # Components
//!
//! - [`BankStorage`]: tabs and the item stacks in their slots
//! - [`RightsMatrix`]: guild rights per rank, tab rights and slot quotas per
//!   (rank, tab), money quota per rank
//! - [`WithdrawalQuotaTracker`]: per-member daily usage counters
//! - [`EventLog`]: fixed-capacity logs with wrapping ids
//! - [`MoveOrchestrator`]: validates one item move and stages it as a
//!   single write batch
//! - [`GuildBank`]: the per-guild facade tying them together, plus money,
//!   tab purchase, ranks, roster hooks and queries
//! - [`spawn_guild_bank`]: runs a guild on its own tokio task so that its
//!   operations never interleave
//!
//! Every operation validates first, commits one batch through the
//! [`guild_bank_storage::WriteQueue`], and only then changes memory and
//! notifies subscribers. A rejected or failed operation leaves no trace.

#![deny(unsafe_code)]

pub mod actor;
pub mod administration;
pub mod bank_storage;
pub mod directory;
pub mod errors;
pub mod event_log;
pub mod guild_bank;
pub mod membership;
pub mod money;
pub mod move_orchestrator;
pub mod notifier;
pub mod quota_tracker;
mod records;
pub mod rights_matrix;
pub mod roster;
pub mod telemetry;

pub use actor::{spawn_guild_bank, spawn_quota_rollover, GuildBankHandle};
pub use administration::RankUpdate;
pub use bank_storage::{BankStorage, BankTab};
pub use directory::{ActorDirectory, InMemoryDirectory, MemberSession, OfflineDirectory};
pub use errors::{BankError, BankResult};
pub use event_log::{BankLogBook, EventLog};
pub use guild_bank::{
    GuildBank, LogCategory, LogEntries, MemberPermissions, TabInfo, TabPermission, TabQuery,
    TabSnapshot,
};
pub use move_orchestrator::{MoveContext, MoveOrchestrator, MoveOutcome, StagedMove};
pub use notifier::{BankNotification, BankNotifier, SlotContent, SubscriptionId};
pub use quota_tracker::{QuotaSlot, WithdrawalQuotaTracker, WithdrawalUsage};
pub use rights_matrix::RightsMatrix;
pub use roster::{Member, Roster};
pub use telemetry::init_tracing;
