//! In-memory reference implementation of the guild bank store.
//!
//! Deterministic and test-friendly: records live in one ordered table,
//! every committed batch is kept for inspection, and a one-shot failure
//! can be armed to exercise the engine's commit-failure path.

use crate::traits::{RecordSource, WriteQueue};
use crate::{RecordKey, StorageError, StorageResult, StoredRecord, WriteBatch, WriteOp};
use async_trait::async_trait;
use guild_bank_types::GuildId;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tracing::debug;

/// In-memory guild bank store.
#[derive(Default)]
pub struct InMemoryGuildStore {
    records: RwLock<BTreeMap<(GuildId, RecordKey), Value>>,
    committed: RwLock<Vec<WriteBatch>>,
    fail_next: AtomicBool,
}

impl InMemoryGuildStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` fail with a backend error and write nothing.
    pub fn fail_next_commit(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn get(&self, guild: &GuildId, key: &RecordKey) -> StorageResult<Option<Value>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;
        Ok(guard.get(&(guild.clone(), key.clone())).cloned())
    }

    pub fn keys_for(&self, guild: &GuildId) -> StorageResult<Vec<RecordKey>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;
        Ok(guard
            .keys()
            .filter(|(g, _)| g == guild)
            .map(|(_, key)| key.clone())
            .collect())
    }

    /// Number of batches committed so far
    pub fn commit_count(&self) -> StorageResult<usize> {
        let guard = self
            .committed
            .read()
            .map_err(|_| StorageError::Backend("batch log lock poisoned".to_string()))?;
        Ok(guard.len())
    }

    pub fn last_batch(&self) -> StorageResult<Option<WriteBatch>> {
        let guard = self
            .committed
            .read()
            .map_err(|_| StorageError::Backend("batch log lock poisoned".to_string()))?;
        Ok(guard.last().cloned())
    }
}

#[async_trait]
impl WriteQueue for InMemoryGuildStore {
    async fn commit(&self, batch: WriteBatch) -> StorageResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Backend("injected commit failure".to_string()));
        }

        {
            let mut seen = HashSet::new();
            for op in &batch.ops {
                if !seen.insert(op.key()) {
                    return Err(StorageError::InvariantViolation(format!(
                        "batch writes {:?} more than once",
                        op.key()
                    )));
                }
            }
        }

        let mut guard = self
            .records
            .write()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;
        let mut committed = self
            .committed
            .write()
            .map_err(|_| StorageError::Backend("batch log lock poisoned".to_string()))?;

        for op in &batch.ops {
            match op {
                WriteOp::Put { key, value } => {
                    guard.insert((batch.guild.clone(), key.clone()), value.clone());
                }
                WriteOp::Delete { key } => {
                    guard.remove(&(batch.guild.clone(), key.clone()));
                }
            }
        }

        debug!(guild = %batch.guild, ops = batch.len(), "Batch committed");
        committed.push(batch);
        Ok(())
    }
}

#[async_trait]
impl RecordSource for InMemoryGuildStore {
    async fn load_guild(&self, guild: &GuildId) -> StorageResult<Vec<StoredRecord>> {
        let guard = self
            .records
            .read()
            .map_err(|_| StorageError::Backend("records lock poisoned".to_string()))?;
        Ok(guard
            .iter()
            .filter(|((g, _), _)| g == guild)
            .map(|((_, key), value)| StoredRecord {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }
}
