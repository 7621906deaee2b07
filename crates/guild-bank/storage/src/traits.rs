use crate::{StorageResult, StoredRecord, WriteBatch};
use async_trait::async_trait;
use guild_bank_types::GuildId;

/// Transactional write queue.
///
/// `commit` applies every op of the batch or none of them. Callers mutate
/// their in-memory state only after it returns `Ok`.
#[async_trait]
pub trait WriteQueue: Send + Sync {
    async fn commit(&self, batch: WriteBatch) -> StorageResult<()>;
}

/// Read side used when a guild is loaded at startup.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Every record of one guild, in key order.
    async fn load_guild(&self, guild: &GuildId) -> StorageResult<Vec<StoredRecord>>;
}

/// Convenience super-trait for stores that implement both sides.
pub trait GuildStore: WriteQueue + RecordSource {}

impl<T> GuildStore for T where T: WriteQueue + RecordSource {}
