//! Persisted record shapes
//!
//! How engine state maps onto [`RecordKey`]s, both when staging writes and
//! when a guild is read back at startup.

use crate::bank_storage::BankTab;
use crate::quota_tracker::WithdrawalUsage;
use crate::roster::Member;
use chrono::{DateTime, Utc};
use guild_bank_storage::{RecordKey, StorageError, StorageResult, StoredRecord, WriteBatch};
use guild_bank_types::{
    BankEventEntry, BankLogId, ContainerId, GuildEventEntry, GuildRights, Item, ItemId, MemberId,
    RankId, RankInfo, SlotId, TabId, TabRightsAndSlots,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Guild header row
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GuildHeader {
    pub leader: Option<MemberId>,
    pub created_at: DateTime<Utc>,
}

/// Bank tab row; the slots are separate records
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TabRecord {
    pub name: String,
    pub icon: String,
    pub text: String,
}

/// Rank row; the per-tab rights are separate records
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RankRecord {
    pub name: String,
    pub rights: GuildRights,
    pub money_per_day: u64,
}

/// Staging helpers over [`WriteBatch`]
pub(crate) trait BatchExt {
    fn put_bank_slot(&mut self, tab: TabId, slot: SlotId, item: Option<&Item>) -> StorageResult<()>;
    fn put_inventory_slot(
        &mut self,
        member: &MemberId,
        container: ContainerId,
        slot: SlotId,
        item: Option<&Item>,
    ) -> StorageResult<()>;
    fn put_tab(&mut self, tab: &BankTab) -> StorageResult<()>;
    fn put_rank(&mut self, rank: &RankInfo) -> StorageResult<()>;
    fn delete_rank(&mut self, rank: &RankInfo);
    fn put_member(&mut self, member: &Member) -> StorageResult<()>;
    fn put_usage(&mut self, member: &MemberId, usage: &WithdrawalUsage) -> StorageResult<()>;
    fn put_guild_event(&mut self, entry: &GuildEventEntry) -> StorageResult<()>;
    fn put_bank_events(&mut self, events: &[(BankLogId, BankEventEntry)]) -> StorageResult<()>;
}

impl BatchExt for WriteBatch {
    fn put_bank_slot(&mut self, tab: TabId, slot: SlotId, item: Option<&Item>) -> StorageResult<()> {
        let key = RecordKey::BankItem { tab, slot };
        match item {
            Some(item) => {
                self.put(key, &item.id)?;
                self.put(
                    RecordKey::ItemInstance {
                        item: item.id.clone(),
                    },
                    item,
                )
            }
            None => {
                self.delete(key);
                Ok(())
            }
        }
    }

    fn put_inventory_slot(
        &mut self,
        member: &MemberId,
        container: ContainerId,
        slot: SlotId,
        item: Option<&Item>,
    ) -> StorageResult<()> {
        let key = RecordKey::InventoryItem {
            member: member.clone(),
            container,
            slot,
        };
        match item {
            Some(item) => {
                self.put(key, &item.id)?;
                self.put(
                    RecordKey::ItemInstance {
                        item: item.id.clone(),
                    },
                    item,
                )
            }
            None => {
                self.delete(key);
                Ok(())
            }
        }
    }

    fn put_tab(&mut self, tab: &BankTab) -> StorageResult<()> {
        self.put(
            RecordKey::BankTab { tab: tab.id },
            &TabRecord {
                name: tab.name.clone(),
                icon: tab.icon.clone(),
                text: tab.text.clone(),
            },
        )
    }

    fn put_rank(&mut self, rank: &RankInfo) -> StorageResult<()> {
        self.put(
            RecordKey::Rank { rank: rank.id },
            &RankRecord {
                name: rank.name.clone(),
                rights: rank.rights,
                money_per_day: rank.money_per_day,
            },
        )?;
        for (i, entry) in rank.tab_rights.iter().enumerate() {
            self.put(
                RecordKey::TabRights {
                    rank: rank.id,
                    tab: TabId(i as u8),
                },
                entry,
            )?;
        }
        Ok(())
    }

    fn delete_rank(&mut self, rank: &RankInfo) {
        self.delete(RecordKey::Rank { rank: rank.id });
        for i in 0..rank.tab_rights.len() {
            self.delete(RecordKey::TabRights {
                rank: rank.id,
                tab: TabId(i as u8),
            });
        }
    }

    fn put_member(&mut self, member: &Member) -> StorageResult<()> {
        self.put(
            RecordKey::Member {
                member: member.id.clone(),
            },
            member,
        )
    }

    fn put_usage(&mut self, member: &MemberId, usage: &WithdrawalUsage) -> StorageResult<()> {
        self.put(
            RecordKey::MemberWithdrawals {
                member: member.clone(),
            },
            usage,
        )
    }

    fn put_guild_event(&mut self, entry: &GuildEventEntry) -> StorageResult<()> {
        self.put(RecordKey::GuildEventLog { id: entry.id }, entry)?;
        self.put(RecordKey::GuildEventLogCursor, &entry.id)
    }

    /// Entries in append order; one cursor per log, at its last entry.
    fn put_bank_events(&mut self, events: &[(BankLogId, BankEventEntry)]) -> StorageResult<()> {
        let mut cursors = BTreeMap::new();
        for (log, entry) in events {
            self.put(
                RecordKey::BankEventLog {
                    log: *log,
                    id: entry.id,
                },
                entry,
            )?;
            cursors.insert(*log, entry.id);
        }
        for (log, id) in cursors {
            self.put(RecordKey::BankEventLogCursor { log }, &id)?;
        }
        Ok(())
    }
}

/// Everything read back for one guild, grouped by record kind
#[derive(Debug, Default)]
pub(crate) struct LoadedGuild {
    pub header: Option<GuildHeader>,
    pub money: u64,
    pub tabs: BTreeMap<TabId, TabRecord>,
    pub bank_items: BTreeMap<(TabId, SlotId), ItemId>,
    pub items: HashMap<ItemId, Item>,
    pub members: Vec<Member>,
    pub usage: Vec<(MemberId, WithdrawalUsage)>,
    pub ranks: BTreeMap<RankId, RankRecord>,
    pub tab_rights: BTreeMap<(RankId, TabId), TabRightsAndSlots>,
    pub guild_events: Vec<GuildEventEntry>,
    pub guild_cursor: Option<u32>,
    pub bank_events: BTreeMap<BankLogId, Vec<BankEventEntry>>,
    pub bank_cursors: BTreeMap<BankLogId, u32>,
}

impl LoadedGuild {
    pub fn from_records(records: Vec<StoredRecord>) -> StorageResult<Self> {
        let mut loaded = LoadedGuild::default();
        for record in records {
            match &record.key {
                RecordKey::Guild => loaded.header = Some(record.decode()?),
                RecordKey::BankMoney => loaded.money = record.decode()?,
                RecordKey::BankTab { tab } => {
                    loaded.tabs.insert(*tab, record.decode()?);
                }
                RecordKey::BankItem { tab, slot } => {
                    loaded.bank_items.insert((*tab, *slot), record.decode()?);
                }
                RecordKey::ItemInstance { item } => {
                    loaded.items.insert(item.clone(), record.decode()?);
                }
                RecordKey::Member { .. } => loaded.members.push(record.decode()?),
                RecordKey::MemberWithdrawals { member } => {
                    loaded.usage.push((member.clone(), record.decode()?));
                }
                RecordKey::Rank { rank } => {
                    loaded.ranks.insert(*rank, record.decode()?);
                }
                RecordKey::TabRights { rank, tab } => {
                    loaded.tab_rights.insert((*rank, *tab), record.decode()?);
                }
                RecordKey::GuildEventLog { .. } => loaded.guild_events.push(record.decode()?),
                RecordKey::GuildEventLogCursor => loaded.guild_cursor = Some(record.decode()?),
                RecordKey::BankEventLog { log, .. } => {
                    loaded
                        .bank_events
                        .entry(*log)
                        .or_default()
                        .push(record.decode()?);
                }
                RecordKey::BankEventLogCursor { log } => {
                    loaded.bank_cursors.insert(*log, record.decode()?);
                }
                // Character-side records belong to the character store.
                RecordKey::InventoryItem { .. } | RecordKey::CharacterMoney { .. } => {}
            }
        }
        Ok(loaded)
    }

    /// Ranks with their tab rights attached, in id order
    pub fn rank_infos(&self, tabs: u8) -> Vec<RankInfo> {
        self.ranks
            .iter()
            .map(|(id, record)| {
                let mut rank = RankInfo {
                    id: *id,
                    name: record.name.clone(),
                    rights: record.rights,
                    money_per_day: record.money_per_day,
                    tab_rights: Vec::new(),
                };
                rank.ensure_tabs(tabs);
                for tab in 0..tabs {
                    if let Some(entry) = self.tab_rights.get(&(*id, TabId(tab))) {
                        rank.tab_rights[tab as usize] = *entry;
                    }
                }
                rank
            })
            .collect()
    }

    /// The item placed at a bank slot, which must have an instance record
    pub fn bank_item(&self, tab: TabId, slot: SlotId) -> StorageResult<Option<Item>> {
        let Some(id) = self.bank_items.get(&(tab, slot)) else {
            return Ok(None);
        };
        self.items.get(id).cloned().map(Some).ok_or_else(|| {
            StorageError::InvariantViolation(format!("bank slot {}/{} holds unknown item {}", tab, slot, id))
        })
    }
}
