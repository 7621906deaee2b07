//! Guild bank facade
//!
//! [`GuildBank`] owns one guild's complete bank state and is the only way
//! to change it. Every operation follows the same protocol: validate
//! against current state, stage one [`WriteBatch`], commit it, and only
//! then mutate memory and notify observers. A rejected request or a failed
//! commit leaves the bank exactly as it was.
//!
//! `&mut self` serializes operations; [`crate::actor`] puts one bank
//! behind a command queue when several tasks need it.

use crate::bank_storage::{BankStorage, BankTab};
use crate::directory::{ActorDirectory, OfflineDirectory};
use crate::errors::{BankError, BankResult};
use crate::event_log::BankLogBook;
use crate::move_orchestrator::{MoveContext, MoveOrchestrator, MoveOutcome};
use crate::notifier::{BankNotification, BankNotifier, SlotContent};
use crate::quota_tracker::WithdrawalQuotaTracker;
use crate::records::{BatchExt, GuildHeader, LoadedGuild};
use crate::rights_matrix::RightsMatrix;
use crate::roster::{Member, Roster};
use chrono::{DateTime, Utc};
use guild_bank_storage::{GuildStore, RecordKey, StorageError, WriteBatch, WriteQueue};
use guild_bank_types::{
    BankConfig, BankEventEntry, BankEventType, BankLogId, BankTabRights, Character,
    GuildEventEntry, GuildId, GuildRights, MemberId, MoveRequest, RankId,
    Rejection, Remaining, SlotAddress, SlotId, TabId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// What part of a tab to return
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabQuery {
    /// Every occupied slot
    Full,
    /// The named slots, empty ones included
    Slots(Vec<SlotId>),
}

/// Contents of one tab as seen by one member
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub tab: TabId,
    pub money: u64,
    pub full: bool,
    pub slots: Vec<SlotContent>,
    pub withdrawals_remaining: Remaining,
}

/// Name and icon of a purchased tab
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub tab: TabId,
    pub name: String,
    pub icon: String,
}

/// Which log to read
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Guild,
    Bank(TabId),
    Money,
}

/// Log entries, oldest first
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEntries {
    Guild(Vec<GuildEventEntry>),
    Bank(Vec<BankEventEntry>),
}

impl LogEntries {
    pub fn len(&self) -> usize {
        match self {
            LogEntries::Guild(entries) => entries.len(),
            LogEntries::Bank(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One tab's rights for a member
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabPermission {
    pub tab: TabId,
    pub rights: BankTabRights,
    pub slots_per_day: u32,
    pub remaining: Remaining,
}

/// Everything a member may do, with remaining allowances
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPermissions {
    pub rank: RankId,
    pub rights: GuildRights,
    pub money_per_day: u64,
    pub remaining_money: Remaining,
    pub tabs: Vec<TabPermission>,
}

/// One guild's bank
pub struct GuildBank {
    pub(crate) guild: GuildId,
    pub(crate) config: BankConfig,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) money: u64,
    pub(crate) storage: BankStorage,
    pub(crate) rights: RightsMatrix,
    pub(crate) quotas: WithdrawalQuotaTracker,
    pub(crate) logs: BankLogBook,
    pub(crate) roster: Roster,
    pub(crate) store: Arc<dyn WriteQueue>,
    pub(crate) directory: Arc<dyn ActorDirectory>,
    pub(crate) notifier: BankNotifier,
    pub(crate) disbanded: bool,
}

impl GuildBank {
    fn empty(guild: GuildId, config: BankConfig, store: Arc<dyn WriteQueue>) -> Self {
        Self {
            storage: BankStorage::from_config(&config.bank),
            logs: BankLogBook::new(config.logs.event_log_capacity, config.logs.bank_log_capacity),
            guild,
            config,
            created_at: Utc::now(),
            money: 0,
            rights: RightsMatrix::with_default_ranks(),
            quotas: WithdrawalQuotaTracker::new(),
            roster: Roster::new(),
            store,
            directory: Arc::new(OfflineDirectory),
            notifier: BankNotifier::new(),
            disbanded: false,
        }
    }

    /// Found a new guild led by `leader` and persist its initial state.
    pub async fn create(
        guild: GuildId,
        leader: MemberId,
        config: BankConfig,
        store: Arc<dyn WriteQueue>,
    ) -> BankResult<Self> {
        config.validate()?;
        let mut bank = Self::empty(guild, config, store);

        for _ in 0..bank.config.bank.initial_tabs {
            bank.storage.create_tab()?;
        }
        let tabs = bank.storage.purchased_tabs();
        bank.rights.ensure_tabs(tabs);
        bank.logs.ensure_tab_logs(tabs);
        bank.roster.insert(Member::new(leader.clone(), RankId::GUILD_MASTER));
        bank.roster.set_leader(Some(leader.clone()));

        let mut batch = bank.batch();
        batch.put(RecordKey::Guild, &bank.header())?;
        batch.put(RecordKey::BankMoney, &bank.money)?;
        for tab in bank.storage.tabs() {
            batch.put_tab(tab)?;
        }
        for rank in bank.rights.ranks() {
            batch.put_rank(rank)?;
        }
        for member in bank.roster.iter() {
            batch.put_member(member)?;
        }
        bank.commit(batch).await?;

        info!(guild = %bank.guild, leader = %leader, tabs, "Guild bank created");
        Ok(bank)
    }

    /// Rebuild a guild from its persisted records.
    pub async fn load<S>(guild: GuildId, config: BankConfig, store: Arc<S>) -> BankResult<Self>
    where
        S: GuildStore + 'static,
    {
        config.validate()?;
        let records = store.load_guild(&guild).await?;
        let loaded = LoadedGuild::from_records(records)?;
        let header = loaded.header.clone().ok_or_else(|| {
            StorageError::InvariantViolation(format!("guild {} has no header record", guild))
        })?;

        let mut bank = Self::empty(guild, config, store);
        bank.created_at = header.created_at;
        bank.money = loaded.money;

        for (id, record) in &loaded.tabs {
            let mut tab = BankTab::new(*id, bank.storage.slots_per_tab());
            tab.name = record.name.clone();
            tab.icon = record.icon.clone();
            tab.text = record.text.clone();
            bank.storage
                .restore_tab(tab)
                .map_err(|_| corrupt(format!("bank tab {} is out of sequence", id)))?;
            for slot in 0..bank.storage.slots_per_tab() {
                let slot = SlotId(slot as u8);
                if let Some(item) = loaded.bank_item(*id, slot)? {
                    bank.storage.set_item(*id, slot, Some(item))?;
                }
            }
        }
        let tabs = bank.storage.purchased_tabs();

        bank.rights = RightsMatrix::from_ranks(loaded.rank_infos(tabs))
            .map_err(|_| corrupt("rank ids are not contiguous from 0".into()))?;
        bank.rights.ensure_tabs(tabs);

        for member in &loaded.members {
            if !bank.rights.contains(member.rank) {
                return Err(corrupt(format!("member {} holds unknown {}", member.id, member.rank)).into());
            }
            bank.roster.insert(member.clone());
        }
        bank.roster.set_leader(header.leader);
        for (member, usage) in &loaded.usage {
            bank.quotas.restore(member.clone(), usage.clone());
        }

        bank.logs.ensure_tab_logs(tabs);
        if let Some(last_id) = loaded.guild_cursor {
            bank.logs
                .guild_log_mut()
                .restore(last_id, loaded.guild_events.iter().cloned());
        }
        for (log, last_id) in &loaded.bank_cursors {
            let entries = loaded.bank_events.get(log).cloned().unwrap_or_default();
            if let Some(book) = bank.logs.bank_log_mut(*log) {
                book.restore(*last_id, entries);
            }
        }

        info!(
            guild = %bank.guild,
            tabs,
            members = bank.roster.len(),
            money = bank.money,
            "Guild bank loaded"
        );
        Ok(bank)
    }

    /// Use `directory` to reach online members
    pub fn with_directory(mut self, directory: Arc<dyn ActorDirectory>) -> Self {
        self.directory = directory;
        self
    }

    /// Publish through `notifier` (share one notifier between restarts)
    pub fn with_notifier(mut self, notifier: BankNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Move an item between two endpoints, splitting it if requested.
    pub async fn request_move(
        &mut self,
        character: &mut Character,
        request: MoveRequest,
    ) -> BankResult<MoveOutcome> {
        self.ensure_active()?;
        let rank = self.member_rank(&character.member)?;
        let ctx = MoveContext {
            guild: &self.guild,
            actor: &character.member,
            rank,
            storage: &self.storage,
            rights: &self.rights,
            quotas: &self.quotas,
            logs: &self.logs,
            character,
        };
        let staged = MoveOrchestrator::new(ctx).plan(&request).map_err(|reason| {
            debug!(guild = %self.guild, actor = %character.member, %reason, "Move rejected");
            reason
        })?;

        let batch = staged.to_batch(&self.guild, &character.member)?;
        self.commit(batch).await?;

        let actor = character.member.clone();
        let outcome = staged.apply(
            &actor,
            &mut self.storage,
            &mut self.quotas,
            &mut self.logs,
            character,
        )?;
        info!(
            guild = %self.guild,
            actor = %actor,
            touched = outcome.touched.len(),
            swapped = outcome.swapped,
            split = outcome.split,
            "Item moved"
        );

        for tab in outcome.touched_tabs() {
            let slots = tab_slots(&outcome.touched, tab)
                .into_iter()
                .map(|slot| self.slot_content(tab, slot))
                .collect();
            let notification = BankNotification::TabContent { tab, slots };
            self.push_to(&actor, &notification);
            self.notify(notification).await;
        }
        Ok(outcome)
    }

    /// Contents of one tab, for a member allowed to view it.
    pub fn query_tab(
        &self,
        member: &MemberId,
        tab: TabId,
        query: TabQuery,
    ) -> Result<TabSnapshot, Rejection> {
        self.ensure_active()?;
        let rank = self.member_rank(member)?;
        let contents = self.storage.tab(tab).ok_or(Rejection::TabNotPurchased)?;
        if !self.rights.has_right(rank, tab, BankTabRights::VIEW_TAB) {
            return Err(Rejection::PermissionDenied);
        }
        let (full, slots) = match query {
            TabQuery::Full => (
                true,
                contents
                    .items()
                    .map(|(slot, item)| SlotContent {
                        slot,
                        item: Some(item.clone()),
                    })
                    .collect(),
            ),
            TabQuery::Slots(slots) => {
                if slots.iter().any(|s| !self.storage.is_valid_slot(*s)) {
                    return Err(Rejection::InvalidSlot);
                }
                (
                    false,
                    slots
                        .into_iter()
                        .map(|slot| self.slot_content(tab, slot))
                        .collect(),
                )
            }
        };
        Ok(TabSnapshot {
            tab,
            money: self.money,
            full,
            slots,
            withdrawals_remaining: self.quotas.remaining_slots(member, rank, tab, &self.rights),
        })
    }

    pub fn query_tabs_info(&self) -> Vec<TabInfo> {
        self.storage
            .tabs()
            .iter()
            .map(|t| TabInfo {
                tab: t.id,
                name: t.name.clone(),
                icon: t.icon.clone(),
            })
            .collect()
    }

    pub fn tab_text(&self, member: &MemberId, tab: TabId) -> Result<String, Rejection> {
        self.ensure_active()?;
        let rank = self.member_rank(member)?;
        let contents = self.storage.tab(tab).ok_or(Rejection::TabNotPurchased)?;
        if !self.rights.has_right(rank, tab, BankTabRights::VIEW_TAB) {
            return Err(Rejection::PermissionDenied);
        }
        Ok(contents.text.clone())
    }

    /// Entries of one log, oldest first.
    pub fn query_log(&self, member: &MemberId, category: LogCategory) -> Result<LogEntries, Rejection> {
        self.ensure_active()?;
        let rank = self.member_rank(member)?;
        let log = match category {
            LogCategory::Guild => {
                return Ok(LogEntries::Guild(
                    self.logs.guild_log().entries().cloned().collect(),
                ))
            }
            LogCategory::Bank(tab) => {
                if !self.storage.is_purchased(tab) {
                    return Err(Rejection::TabNotPurchased);
                }
                if !self.rights.has_right(rank, tab, BankTabRights::VIEW_TAB) {
                    return Err(Rejection::PermissionDenied);
                }
                BankLogId::Tab(tab)
            }
            LogCategory::Money => BankLogId::Money,
        };
        let entries = self
            .logs
            .bank_log(log)
            .map(|l| l.entries().cloned().collect())
            .unwrap_or_default();
        Ok(LogEntries::Bank(entries))
    }

    pub fn permissions(&self, member: &MemberId) -> Result<MemberPermissions, Rejection> {
        self.ensure_active()?;
        let rank = self.member_rank(member)?;
        let tabs = self
            .storage
            .tabs()
            .iter()
            .map(|t| {
                let entry = self.rights.tab_rights(rank, t.id);
                TabPermission {
                    tab: t.id,
                    rights: entry.rights,
                    slots_per_day: entry.slots_per_day,
                    remaining: self.quotas.remaining_slots(member, rank, t.id, &self.rights),
                }
            })
            .collect();
        Ok(MemberPermissions {
            rank,
            rights: self.rights.guild_rights(rank),
            money_per_day: self.rights.money_per_day(rank),
            remaining_money: self.quotas.remaining_money(member, rank, &self.rights),
            tabs,
        })
    }

    pub fn remaining_money(&self, member: &MemberId) -> Result<Remaining, Rejection> {
        let rank = self.member_rank(member)?;
        Ok(self.quotas.remaining_money(member, rank, &self.rights))
    }

    pub fn remaining_slots(&self, member: &MemberId, tab: TabId) -> Result<Remaining, Rejection> {
        let rank = self.member_rank(member)?;
        Ok(self.quotas.remaining_slots(member, rank, tab, &self.rights))
    }

    pub fn guild_id(&self) -> &GuildId {
        &self.guild
    }

    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Bank balance (copper)
    pub fn money(&self) -> u64 {
        self.money
    }

    pub fn storage(&self) -> &BankStorage {
        &self.storage
    }

    pub fn rights(&self) -> &RightsMatrix {
        &self.rights
    }

    pub fn quotas(&self) -> &WithdrawalQuotaTracker {
        &self.quotas
    }

    pub fn logs(&self) -> &BankLogBook {
        &self.logs
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn leader(&self) -> Option<&MemberId> {
        self.roster.leader()
    }

    pub fn notifier(&self) -> &BankNotifier {
        &self.notifier
    }

    pub fn is_disbanded(&self) -> bool {
        self.disbanded
    }

    pub(crate) fn ensure_active(&self) -> Result<(), Rejection> {
        if self.disbanded {
            return Err(Rejection::NotAMember);
        }
        Ok(())
    }

    pub(crate) fn member_rank(&self, member: &MemberId) -> Result<RankId, Rejection> {
        self.roster
            .get(member)
            .map(|m| m.rank)
            .ok_or(Rejection::NotAMember)
    }

    /// Only the guild leader may proceed
    pub(crate) fn require_leader(&self, actor: &MemberId) -> Result<(), Rejection> {
        self.ensure_active()?;
        self.member_rank(actor)?;
        if !self.roster.is_leader(actor) {
            return Err(Rejection::PermissionDenied);
        }
        Ok(())
    }

    pub(crate) fn header(&self) -> GuildHeader {
        GuildHeader {
            leader: self.roster.leader().cloned(),
            created_at: self.created_at,
        }
    }

    pub(crate) fn batch(&self) -> WriteBatch {
        WriteBatch::new(self.guild.clone())
    }

    /// Commit a staged batch; nothing in memory has changed yet.
    pub(crate) async fn commit(&self, batch: WriteBatch) -> BankResult<()> {
        let ops = batch.len();
        self.store.commit(batch).await.map_err(|e| {
            error!(guild = %self.guild, ops, error = %e, "Commit failed");
            BankError::Commit(e)
        })
    }

    /// A roster event carrying the id the guild log will assign it
    pub(crate) fn stage_guild_event(&self, entry: GuildEventEntry) -> GuildEventEntry {
        GuildEventEntry {
            id: self.logs.guild_log().next_id(),
            ..entry
        }
    }

    /// A money event carrying the id the money log will assign it
    pub(crate) fn stage_money_event(&self, event: BankEventType, actor: &MemberId, amount: u64) -> BankEventEntry {
        let mut entry = BankEventEntry::money(self.guild.clone(), event, actor.clone(), amount);
        if let Some(log) = self.logs.bank_log(BankLogId::Money) {
            entry.id = log.next_id();
        }
        entry
    }

    pub(crate) async fn notify(&self, notification: BankNotification) {
        self.notifier.publish(&notification).await;
    }

    pub(crate) fn push_to(&self, member: &MemberId, notification: &BankNotification) {
        if let Some(session) = self.directory.find(member) {
            session.push_bank_update(notification);
        }
    }

    pub(crate) fn push_rank(&self, member: &MemberId, rank: RankId) {
        if let Some(session) = self.directory.find(member) {
            session.push_rank(rank);
        }
    }

    fn slot_content(&self, tab: TabId, slot: SlotId) -> SlotContent {
        SlotContent {
            slot,
            item: self.storage.get_item(tab, slot).cloned(),
        }
    }

    /// Every key this guild may have persisted
    pub(crate) fn persisted_keys(&self) -> Vec<RecordKey> {
        let mut keys = vec![RecordKey::Guild, RecordKey::BankMoney, RecordKey::GuildEventLogCursor];
        for tab in self.storage.tabs() {
            keys.push(RecordKey::BankTab { tab: tab.id });
            for (slot, item) in tab.items() {
                keys.push(RecordKey::BankItem { tab: tab.id, slot });
                keys.push(RecordKey::ItemInstance {
                    item: item.id.clone(),
                });
            }
        }
        for rank in self.rights.ranks() {
            keys.push(RecordKey::Rank { rank: rank.id });
            for tab in 0..rank.tab_rights.len() {
                keys.push(RecordKey::TabRights {
                    rank: rank.id,
                    tab: TabId(tab as u8),
                });
            }
        }
        for member in self.roster.iter() {
            keys.push(RecordKey::Member {
                member: member.id.clone(),
            });
            keys.push(RecordKey::MemberWithdrawals {
                member: member.id.clone(),
            });
        }
        for entry in self.logs.guild_log().entries() {
            keys.push(RecordKey::GuildEventLog { id: entry.id });
        }
        for log in self.logs.bank_log_ids() {
            keys.push(RecordKey::BankEventLogCursor { log });
            if let Some(book) = self.logs.bank_log(log) {
                for entry in book.entries() {
                    keys.push(RecordKey::BankEventLog { log, id: entry.id });
                }
            }
        }
        keys
    }
}

impl std::fmt::Debug for GuildBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildBank")
            .field("guild", &self.guild)
            .field("money", &self.money)
            .field("tabs", &self.storage.purchased_tabs())
            .field("members", &self.roster.len())
            .field("disbanded", &self.disbanded)
            .finish()
    }
}

fn corrupt(message: String) -> StorageError {
    StorageError::InvariantViolation(message)
}

/// Slot addresses of one tab touched by a move
pub fn tab_slots(touched: &[SlotAddress], tab: TabId) -> Vec<SlotId> {
    touched
        .iter()
        .filter(|addr| addr.tab() == Some(tab))
        .map(SlotAddress::slot)
        .collect()
}
