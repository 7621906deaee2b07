use crate::StorageResult;
use guild_bank_types::{
    BankLogId, ContainerId, GuildId, ItemId, MemberId, RankId, SlotId, TabId,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key of one persisted record, scoped to the batch's guild.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum RecordKey {
    /// Guild header: leader, creation time
    Guild,
    BankMoney,
    BankTab { tab: TabId },
    /// Which item instance occupies a bank slot
    BankItem { tab: TabId, slot: SlotId },
    /// Standalone item instance record
    ItemInstance { item: ItemId },
    /// Which item instance occupies an inventory slot
    InventoryItem {
        member: MemberId,
        container: ContainerId,
        slot: SlotId,
    },
    CharacterMoney { member: MemberId },
    Member { member: MemberId },
    MemberWithdrawals { member: MemberId },
    Rank { rank: RankId },
    TabRights { rank: RankId, tab: TabId },
    GuildEventLog { id: u32 },
    BankEventLog { log: BankLogId, id: u32 },
    /// Last id assigned in the roster event log
    GuildEventLogCursor,
    /// Last id assigned in one bank log
    BankEventLogCursor { log: BankLogId },
}

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteOp {
    Put { key: RecordKey, value: Value },
    Delete { key: RecordKey },
}

impl WriteOp {
    pub fn key(&self) -> &RecordKey {
        match self {
            WriteOp::Put { key, .. } | WriteOp::Delete { key } => key,
        }
    }
}

/// All writes of one engine operation; committed as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch {
    pub guild: GuildId,
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new(guild: GuildId) -> Self {
        Self {
            guild,
            ops: Vec::new(),
        }
    }

    pub fn append(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    /// Stage an upsert of `value` under `key`.
    pub fn put<T: Serialize>(&mut self, key: RecordKey, value: &T) -> StorageResult<()> {
        let value = serde_json::to_value(value)?;
        self.append(WriteOp::Put { key, value });
        Ok(())
    }

    pub fn delete(&mut self, key: RecordKey) {
        self.append(WriteOp::Delete { key });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// A record read back from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: RecordKey,
    pub value: Value,
}

impl StoredRecord {
    pub fn decode<T: DeserializeOwned>(&self) -> StorageResult<T> {
        Ok(serde_json::from_value(self.value.clone())?)
    }
}
