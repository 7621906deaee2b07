//! Administrative operations: tabs, ranks, quota rollover and disband
//!
//! Rights changes are staged on a copy of the [`RightsMatrix`] which
//! replaces the live one once the batch has committed.

use crate::errors::BankResult;
use crate::guild_bank::GuildBank;
use crate::notifier::BankNotification;
use crate::quota_tracker::WithdrawalUsage;
use crate::records::{BatchExt, TabRecord};
use crate::rights_matrix::RightsMatrix;
use crate::roster::Member;
use guild_bank_storage::RecordKey;
use guild_bank_types::{
    BankTabRights, Character, GuildRights, MemberId, RankId, Rejection, TabId,
    TabRightsAndSlots, MAX_TAB_TEXT_LEN,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Changes to one rank; `None` fields are left as they are
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankUpdate {
    pub name: Option<String>,
    pub rights: Option<GuildRights>,
    pub money_per_day: Option<u64>,
    /// Entries for tabs that are not purchased are ignored
    #[serde(default)]
    pub tab_rights: Vec<(TabId, TabRightsAndSlots)>,
}

impl RankUpdate {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_rights(mut self, rights: GuildRights) -> Self {
        self.rights = Some(rights);
        self
    }

    pub fn with_money_per_day(mut self, amount: u64) -> Self {
        self.money_per_day = Some(amount);
        self
    }

    pub fn with_tab_rights(mut self, tab: TabId, entry: TabRightsAndSlots) -> Self {
        self.tab_rights.push((tab, entry));
        self
    }
}

impl GuildBank {
    /// Buy the next tab with the character's money.
    pub async fn purchase_tab(&mut self, character: &mut Character) -> BankResult<TabId> {
        self.ensure_active()?;
        self.member_rank(&character.member)?;
        let tab = self.storage.next_tab().ok_or(Rejection::AlreadyMaxTabs)?;
        let price = self
            .config
            .tab_price(tab.0)
            .ok_or(Rejection::AlreadyMaxTabs)?;
        if !character.has_enough_money(price) {
            return Err(Rejection::InsufficientFunds.into());
        }

        let purchased = tab.0 + 1;
        let mut rights = self.rights.clone();
        let created = rights.ensure_tabs(purchased);
        let carried = character.money - price;

        let mut batch = self.batch();
        batch.put(
            RecordKey::BankTab { tab },
            &TabRecord {
                name: String::new(),
                icon: String::new(),
                text: String::new(),
            },
        )?;
        for (rank, tab) in created {
            batch.put(RecordKey::TabRights { rank, tab }, &rights.tab_rights(rank, tab))?;
        }
        batch.put(
            RecordKey::CharacterMoney {
                member: character.member.clone(),
            },
            &carried,
        )?;
        self.commit(batch).await?;

        self.storage.create_tab()?;
        self.rights = rights;
        self.logs.ensure_tab_logs(purchased);
        character.money = carried;
        info!(guild = %self.guild, member = %character.member, tab = %tab, price, "Bank tab purchased");
        self.notify(BankNotification::TabPurchased { tab }).await;
        Ok(tab)
    }

    /// Rename a tab and change its icon. Leader only.
    pub async fn set_tab_info(
        &mut self,
        actor: &MemberId,
        tab: TabId,
        name: impl Into<String>,
        icon: impl Into<String>,
    ) -> BankResult<()> {
        self.require_leader(actor)?;
        let current = self.storage.tab(tab).ok_or(Rejection::TabNotPurchased)?;
        let mut updated = current.clone();
        updated.name = name.into();
        updated.icon = icon.into();

        let mut batch = self.batch();
        batch.put_tab(&updated)?;
        self.commit(batch).await?;

        if let Some(live) = self.storage.tab_mut(tab) {
            live.name = updated.name;
            live.icon = updated.icon;
        }
        info!(guild = %self.guild, tab = %tab, "Bank tab info changed");
        self.notify(BankNotification::TabInfoChanged { tab }).await;
        Ok(())
    }

    /// Replace a tab's text, truncated to the maximum length.
    pub async fn set_tab_text(
        &mut self,
        actor: &MemberId,
        tab: TabId,
        text: &str,
    ) -> BankResult<()> {
        self.ensure_active()?;
        let rank = self.member_rank(actor)?;
        let current = self.storage.tab(tab).ok_or(Rejection::TabNotPurchased)?;
        if !self.rights.has_right(rank, tab, BankTabRights::UPDATE_TEXT) {
            warn!(guild = %self.guild, member = %actor, tab = %tab, "Tab text change denied");
            return Err(Rejection::PermissionDenied.into());
        }
        let mut updated = current.clone();
        updated.text = text.chars().take(MAX_TAB_TEXT_LEN).collect();

        let mut batch = self.batch();
        batch.put_tab(&updated)?;
        self.commit(batch).await?;

        if let Some(live) = self.storage.tab_mut(tab) {
            live.text = updated.text;
        }
        self.notify(BankNotification::TabTextChanged { tab }).await;
        Ok(())
    }

    /// Append a rank below the lowest one. Leader only.
    pub async fn add_rank(&mut self, actor: &MemberId, name: impl Into<String>) -> BankResult<RankId> {
        self.require_leader(actor)?;
        let mut rights = self.rights.clone();
        let rank = rights.push_rank(
            name,
            GuildRights::chat(),
            self.storage.purchased_tabs(),
            self.config.ranks.max_ranks,
        )?;

        let mut batch = self.batch();
        if let Some(info) = rights.rank(rank) {
            batch.put_rank(info)?;
        }
        self.commit(batch).await?;

        self.rights = rights;
        info!(guild = %self.guild, rank = %rank, "Rank added");
        self.notify(BankNotification::RankUpdated { rank }).await;
        Ok(rank)
    }

    /// Remove the lowest rank; its members drop to the new lowest rank.
    pub async fn remove_lowest_rank(&mut self, actor: &MemberId) -> BankResult<()> {
        self.require_leader(actor)?;
        let mut rights = self.rights.clone();
        let removed = rights.pop_rank(self.config.ranks.min_ranks)?;
        let lowest = rights.lowest_rank();
        let moved: Vec<Member> = self
            .roster
            .members_of_rank(removed.id)
            .into_iter()
            .filter_map(|id| self.roster.get(&id).cloned())
            .map(|member| Member {
                rank: lowest,
                ..member
            })
            .collect();

        let mut batch = self.batch();
        batch.delete_rank(&removed);
        for member in &moved {
            batch.put_member(member)?;
        }
        self.commit(batch).await?;

        self.rights = rights;
        for member in moved {
            self.push_rank(&member.id, lowest);
            self.roster.insert(member);
        }
        let remaining = self.rights.rank_count();
        info!(guild = %self.guild, rank = %removed.id, remaining, "Rank removed");
        self.notify(BankNotification::RankDeleted { remaining }).await;
        Ok(())
    }

    /// Change a rank's name, rights, money quota and tab rights. Leader only.
    pub async fn set_rank_info(
        &mut self,
        actor: &MemberId,
        rank: RankId,
        update: RankUpdate,
    ) -> BankResult<()> {
        self.require_leader(actor)?;
        let purchased = self.storage.purchased_tabs();
        let mut rights = self.rights.clone();
        if let Some(name) = update.name {
            rights.set_rank_name(rank, name)?;
        }
        if let Some(guild_rights) = update.rights {
            rights.set_guild_rights(rank, guild_rights)?;
        }
        if let Some(amount) = update.money_per_day {
            rights.set_money_quota(rank, amount)?;
        }
        for (tab, entry) in update.tab_rights {
            if tab.0 < purchased {
                rights.set_tab_rights(rank, tab, entry, purchased)?;
            }
        }
        self.commit_rank(rights, rank).await
    }

    /// Set one rank's rights and slot quota on one tab. Leader only.
    pub async fn set_tab_rights(
        &mut self,
        actor: &MemberId,
        rank: RankId,
        tab: TabId,
        entry: TabRightsAndSlots,
    ) -> BankResult<()> {
        self.require_leader(actor)?;
        let mut rights = self.rights.clone();
        rights.set_tab_rights(rank, tab, entry, self.storage.purchased_tabs())?;
        self.commit_rank(rights, rank).await
    }

    async fn commit_rank(&mut self, rights: RightsMatrix, rank: RankId) -> BankResult<()> {
        let info = rights.rank(rank).ok_or(Rejection::RankNotFound)?;
        let mut batch = self.batch();
        batch.put_rank(info)?;
        self.commit(batch).await?;

        self.rights = rights;
        info!(guild = %self.guild, rank = %rank, "Rank updated");
        self.notify(BankNotification::RankUpdated { rank }).await;
        Ok(())
    }

    /// Zero every member's withdrawal counters.
    pub async fn reset_quotas(&mut self) -> BankResult<()> {
        self.ensure_active()?;
        let members = self.quotas.members_with_usage();
        if !members.is_empty() {
            let mut batch = self.batch();
            for member in &members {
                batch.put_usage(member, &WithdrawalUsage::default())?;
            }
            self.commit(batch).await?;
        }
        self.quotas.reset_all();
        info!(guild = %self.guild, members = members.len(), "Withdrawal quotas reset");
        self.notify(BankNotification::QuotasReset).await;
        Ok(())
    }

    /// Destroy the guild: every tab and item, all logs, ranks and members.
    /// Leader only; the bank rejects everything afterwards.
    pub async fn disband(&mut self, actor: &MemberId) -> BankResult<()> {
        self.require_leader(actor)?;
        let keys: BTreeSet<RecordKey> = self.persisted_keys().into_iter().collect();
        let mut batch = self.batch();
        for key in keys {
            batch.delete(key);
        }
        self.commit(batch).await?;

        let destroyed = self.storage.destroy_all();
        self.logs.clear();
        self.roster.clear();
        self.quotas.reset_all();
        self.rights = RightsMatrix::with_default_ranks();
        self.money = 0;
        self.disbanded = true;
        info!(guild = %self.guild, items = destroyed.len(), "Guild disbanded");
        self.notify(BankNotification::Disbanded).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BankError;
    use guild_bank_storage::memory::InMemoryGuildStore;
    use guild_bank_types::{BankConfig, GuildId, Item, SlotId, UNLIMITED_SLOTS};
    use std::sync::Arc;

    fn leader() -> MemberId {
        MemberId::new("leader")
    }

    async fn bank(store: Arc<InMemoryGuildStore>) -> GuildBank {
        GuildBank::create(GuildId::new("g"), leader(), BankConfig::default(), store)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn purchase_tab_charges_and_creates_rights() {
        let store = Arc::new(InMemoryGuildStore::new());
        let mut bank = bank(store.clone()).await;
        let mut character = Character::new(leader()).with_money(3_000_000);

        let tab = bank.purchase_tab(&mut character).await.unwrap();
        assert_eq!(tab, TabId(0));
        assert_eq!(character.money, 2_000_000);
        assert_eq!(bank.storage().purchased_tabs(), 1);
        assert_eq!(
            bank.rights().tab_rights(RankId(0), TabId(0)).slots_per_day,
            UNLIMITED_SLOTS
        );
        assert!(bank.rights().tab_rights(RankId(3), TabId(0)).rights.is_empty());
        assert!(bank.logs().bank_log(guild_bank_types::BankLogId::Tab(TabId(0))).is_some());

        let err = bank.purchase_tab(&mut character).await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::InsufficientFunds));
        assert_eq!(bank.storage().purchased_tabs(), 1);
    }

    #[tokio::test]
    async fn purchase_stops_at_max_tabs() {
        let store = Arc::new(InMemoryGuildStore::new());
        let mut config = BankConfig::default();
        config.bank.max_tabs = 1;
        let mut bank = GuildBank::create(GuildId::new("g"), leader(), config, store)
            .await
            .unwrap();
        let mut character = Character::new(leader()).with_money(u64::from(u32::MAX));
        bank.purchase_tab(&mut character).await.unwrap();
        let err = bank.purchase_tab(&mut character).await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::AlreadyMaxTabs));
    }

    #[tokio::test]
    async fn failed_commit_leaves_purchase_undone() {
        let store = Arc::new(InMemoryGuildStore::new());
        let mut bank = bank(store.clone()).await;
        let mut character = Character::new(leader()).with_money(3_000_000);
        store.fail_next_commit();

        let err = bank.purchase_tab(&mut character).await.unwrap_err();
        assert!(matches!(err, BankError::Commit(_)));
        assert_eq!(character.money, 3_000_000);
        assert_eq!(bank.storage().purchased_tabs(), 0);
        assert_eq!(bank.rights().rank(RankId(1)).unwrap().tab_rights.len(), 0);
    }

    #[tokio::test]
    async fn tab_text_is_truncated_and_guarded() {
        let store = Arc::new(InMemoryGuildStore::new());
        let mut bank = bank(store).await;
        let mut character = Character::new(leader()).with_money(1_000_000);
        bank.purchase_tab(&mut character).await.unwrap();

        let long = "x".repeat(MAX_TAB_TEXT_LEN + 20);
        bank.set_tab_text(&leader(), TabId(0), &long).await.unwrap();
        assert_eq!(
            bank.tab_text(&leader(), TabId(0)).unwrap().len(),
            MAX_TAB_TEXT_LEN
        );

        let member = MemberId::new("member");
        bank.add_member(member.clone(), None).await.unwrap();
        let err = bank.set_tab_text(&member, TabId(0), "hi").await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::PermissionDenied));
        let err = bank
            .set_tab_info(&member, TabId(0), "Loot", "icon")
            .await
            .unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::PermissionDenied));

        bank.set_tab_info(&leader(), TabId(0), "Loot", "icon").await.unwrap();
        assert_eq!(bank.query_tabs_info()[0].name, "Loot");
    }

    #[tokio::test]
    async fn rank_ladder_limits() {
        let store = Arc::new(InMemoryGuildStore::new());
        let mut bank = bank(store).await;

        let err = bank.remove_lowest_rank(&leader()).await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::AlreadyAtRankMinimum));

        for i in 5..10 {
            assert_eq!(bank.add_rank(&leader(), format!("r{i}")).await.unwrap(), RankId(i));
        }
        let err = bank.add_rank(&leader(), "extra").await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::AlreadyAtRankLimit));
        assert_eq!(
            bank.rights().guild_rights(RankId(9)),
            GuildRights::chat()
        );
    }

    #[tokio::test]
    async fn removed_rank_members_move_to_new_lowest() {
        let store = Arc::new(InMemoryGuildStore::new());
        let mut bank = bank(store).await;
        let rank = bank.add_rank(&leader(), "Alt").await.unwrap();
        let alt = MemberId::new("alt");
        bank.add_member(alt.clone(), Some(rank)).await.unwrap();

        bank.remove_lowest_rank(&leader()).await.unwrap();
        assert_eq!(bank.rights().rank_count(), 5);
        assert_eq!(bank.roster().get(&alt).unwrap().rank, RankId(4));
    }

    #[tokio::test]
    async fn rank_zero_stays_unrestricted() {
        let store = Arc::new(InMemoryGuildStore::new());
        let mut bank = bank(store).await;
        let mut character = Character::new(leader()).with_money(1_000_000);
        bank.purchase_tab(&mut character).await.unwrap();

        let update = RankUpdate::default()
            .with_rights(GuildRights::empty())
            .with_money_per_day(5)
            .with_tab_rights(TabId(0), TabRightsAndSlots::none())
            .with_tab_rights(TabId(3), TabRightsAndSlots::unrestricted());
        bank.set_rank_info(&leader(), RankId(0), update).await.unwrap();

        let permissions = bank.permissions(&leader()).unwrap();
        assert!(permissions.rights.contains(GuildRights::ALL));
        assert_eq!(permissions.remaining_money, guild_bank_types::Remaining::Unlimited);
        assert_eq!(permissions.tabs[0].remaining, guild_bank_types::Remaining::Unlimited);
    }

    #[tokio::test]
    async fn tab_rights_on_unpurchased_tab_rejected() {
        let store = Arc::new(InMemoryGuildStore::new());
        let mut bank = bank(store).await;
        let err = bank
            .set_tab_rights(&leader(), RankId(2), TabId(0), TabRightsAndSlots::unrestricted())
            .await
            .unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::TabNotPurchased));
    }

    #[tokio::test]
    async fn disband_deletes_everything() {
        let store = Arc::new(InMemoryGuildStore::new());
        let mut bank = bank(store.clone()).await;
        let mut character = Character::new(leader()).with_money(1_000_000);
        bank.purchase_tab(&mut character).await.unwrap();
        character
            .inventory
            .set(guild_bank_types::BACKPACK, SlotId(0), Some(Item::new(9, 1, 1)))
            .unwrap();
        bank.request_move(
            &mut character,
            guild_bank_types::MoveRequest::new(
                guild_bank_types::MoveEndpoint::inventory(guild_bank_types::BACKPACK, SlotId(0)),
                guild_bank_types::MoveEndpoint::bank_any(TabId(0)),
            ),
        )
        .await
        .unwrap();

        let member = MemberId::new("member");
        bank.add_member(member.clone(), None).await.unwrap();
        let err = bank.disband(&member).await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::PermissionDenied));

        bank.disband(&leader()).await.unwrap();
        assert!(bank.is_disbanded());
        assert_eq!(bank.storage().purchased_tabs(), 0);
        let guild = bank.guild_id().clone();
        // Character-side records outlive the guild.
        let keys: Vec<_> = store
            .keys_for(&guild)
            .unwrap()
            .into_iter()
            .filter(|key| !matches!(key, RecordKey::CharacterMoney { .. } | RecordKey::InventoryItem { .. }))
            .collect();
        assert!(keys.is_empty(), "left behind: {keys:?}");

        let err = bank.reset_quotas().await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::NotAMember));
    }

    #[tokio::test]
    async fn reset_quotas_persists_zeroed_usage() {
        let store = Arc::new(InMemoryGuildStore::new());
        let mut bank = bank(store.clone()).await;
        let mut character = Character::new(leader()).with_money(100);
        bank.deposit_money(&mut character, 100).await.unwrap();
        bank.withdraw_money(&mut character, 40, false).await.unwrap();
        assert_eq!(bank.quotas().usage(&leader()).money, 40);

        bank.reset_quotas().await.unwrap();
        assert!(bank.quotas().usage(&leader()).is_zero());
        let stored = store
            .get(
                bank.guild_id(),
                &RecordKey::MemberWithdrawals { member: leader() },
            )
            .unwrap()
            .unwrap();
        let usage: WithdrawalUsage = serde_json::from_value(stored).unwrap();
        assert!(usage.is_zero());
    }
}
