//! Withdrawal quota tracker: per-member daily usage counters
//!
//! One counter per tab plus one for money. Callers check the remaining
//! allowance before recording usage; counters are zeroed by the periodic
//! rollover job.

use crate::rights_matrix::RightsMatrix;
use guild_bank_types::{BankTabRights, GuildRights, MemberId, RankId, Remaining, TabId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a usage amount counts against
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuotaSlot {
    Tab(TabId),
    Money,
}

/// Usage counters of one member since the last rollover
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalUsage {
    /// Stacks withdrawn per tab, indexed by tab ordinal
    #[serde(default)]
    pub tabs: Vec<u32>,
    /// Money withdrawn (copper)
    #[serde(default)]
    pub money: u64,
}

impl WithdrawalUsage {
    pub fn slots_used(&self, tab: TabId) -> u32 {
        self.tabs.get(tab.index()).copied().unwrap_or(0)
    }

    pub fn record(&mut self, slot: QuotaSlot, amount: u64) {
        match slot {
            QuotaSlot::Tab(tab) => {
                if self.tabs.len() <= tab.index() {
                    self.tabs.resize(tab.index() + 1, 0);
                }
                let used = &mut self.tabs[tab.index()];
                *used = used.saturating_add(u32::try_from(amount).unwrap_or(u32::MAX));
            }
            QuotaSlot::Money => self.money = self.money.saturating_add(amount),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.money == 0 && self.tabs.iter().all(|n| *n == 0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct WithdrawalQuotaTracker {
    usage: HashMap<MemberId, WithdrawalUsage>,
}

impl WithdrawalQuotaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counters of `member` (zero if none recorded)
    pub fn usage(&self, member: &MemberId) -> WithdrawalUsage {
        self.usage.get(member).cloned().unwrap_or_default()
    }

    /// Stacks `member` of `rank` may still take out of `tab` today.
    ///
    /// Rank 0 is unlimited. Other ranks get nothing unless they can view the tab.
    pub fn remaining_slots(
        &self,
        member: &MemberId,
        rank: RankId,
        tab: TabId,
        rights: &RightsMatrix,
    ) -> Remaining {
        if rank.is_guild_master() {
            return Remaining::Unlimited;
        }
        let entry = rights.tab_rights(rank, tab);
        if !entry.rights.contains(BankTabRights::VIEW_TAB) {
            return Remaining::Limited(0);
        }
        let used = self.usage.get(member).map(|u| u.slots_used(tab)).unwrap_or(0);
        Remaining::Limited(u64::from(entry.slots_per_day.saturating_sub(used)))
    }

    /// Money `member` of `rank` may still withdraw today.
    ///
    /// Rank 0 is unlimited. Other ranks get nothing without a withdrawal right.
    pub fn remaining_money(&self, member: &MemberId, rank: RankId, rights: &RightsMatrix) -> Remaining {
        if rank.is_guild_master() {
            return Remaining::Unlimited;
        }
        if !rights
            .guild_rights(rank)
            .intersects(GuildRights::money_withdrawal())
        {
            return Remaining::Limited(0);
        }
        let used = self.usage.get(member).map(|u| u.money).unwrap_or(0);
        Remaining::Limited(rights.money_per_day(rank).saturating_sub(used))
    }

    /// Add `amount` to a counter. Check the remaining allowance first.
    pub fn record_usage(&mut self, member: &MemberId, slot: QuotaSlot, amount: u64) {
        self.usage
            .entry(member.clone())
            .or_default()
            .record(slot, amount);
    }

    /// Counters `member` would have after recording `amount`
    pub fn projected(&self, member: &MemberId, slot: QuotaSlot, amount: u64) -> WithdrawalUsage {
        let mut usage = self.usage(member);
        usage.record(slot, amount);
        usage
    }

    /// Replace the counters of `member`
    pub fn restore(&mut self, member: MemberId, usage: WithdrawalUsage) {
        self.usage.insert(member, usage);
    }

    /// Members with any non-zero counter
    pub fn members_with_usage(&self) -> Vec<MemberId> {
        let mut members: Vec<_> = self
            .usage
            .iter()
            .filter(|(_, u)| !u.is_zero())
            .map(|(m, _)| m.clone())
            .collect();
        members.sort();
        members
    }

    /// Zero every member's counters
    pub fn reset_all(&mut self) {
        self.usage.clear();
    }

    pub fn forget(&mut self, member: &MemberId) {
        self.usage.remove(member);
    }
}
