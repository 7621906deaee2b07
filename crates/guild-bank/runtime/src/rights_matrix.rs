//! Rights matrix: per-rank guild rights, per-(rank, tab) bank rights,
//! slot quotas and per-rank money quotas
//!
//! Rank ids stay contiguous from 0: ranks are only ever appended at the
//! bottom or removed from the bottom.

use guild_bank_types::{
    default_ranks, BankTabRights, GuildRights, RankId, RankInfo, Rejection, TabId,
    TabRightsAndSlots,
};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct RightsMatrix {
    ranks: Vec<RankInfo>,
}

impl RightsMatrix {
    /// Build from a rank list, which must cover ids `0..n` exactly.
    pub fn from_ranks(mut ranks: Vec<RankInfo>) -> Result<Self, Rejection> {
        ranks.sort_by_key(|r| r.id);
        if ranks.is_empty() || ranks.iter().enumerate().any(|(i, r)| r.id.index() != i) {
            return Err(Rejection::RankNotFound);
        }
        for rank in &mut ranks {
            rank.enforce_guild_master();
        }
        Ok(Self { ranks })
    }

    pub fn with_default_ranks() -> Self {
        Self {
            ranks: default_ranks(),
        }
    }

    pub fn rank_count(&self) -> u8 {
        self.ranks.len() as u8
    }

    pub fn lowest_rank(&self) -> RankId {
        RankId(self.rank_count().saturating_sub(1))
    }

    pub fn rank(&self, rank: RankId) -> Option<&RankInfo> {
        self.ranks.get(rank.index())
    }

    pub fn ranks(&self) -> &[RankInfo] {
        &self.ranks
    }

    pub fn contains(&self, rank: RankId) -> bool {
        rank.index() < self.ranks.len()
    }

    /// Whether `rank` holds all of `rights` on `tab`. Rank 0 always does.
    pub fn has_right(&self, rank: RankId, tab: TabId, rights: BankTabRights) -> bool {
        if rank.is_guild_master() {
            return true;
        }
        self.rank(rank)
            .map(|r| r.tab_has(tab, rights))
            .unwrap_or(false)
    }

    pub fn has_guild_right(&self, rank: RankId, rights: GuildRights) -> bool {
        if rank.is_guild_master() {
            return true;
        }
        self.rank(rank)
            .map(|r| r.rights.contains(rights))
            .unwrap_or(false)
    }

    pub fn guild_rights(&self, rank: RankId) -> GuildRights {
        self.rank(rank).map(|r| r.rights).unwrap_or_default()
    }

    pub fn tab_rights(&self, rank: RankId, tab: TabId) -> TabRightsAndSlots {
        self.rank(rank).map(|r| r.tab(tab)).unwrap_or_default()
    }

    pub fn money_per_day(&self, rank: RankId) -> u64 {
        self.rank(rank).map(|r| r.money_per_day).unwrap_or(0)
    }

    /// Set the bank rights and slot quota of `rank` on `tab`.
    ///
    /// Rank 0 writes are coerced to full rights and unlimited slots.
    pub fn set_tab_rights(
        &mut self,
        rank: RankId,
        tab: TabId,
        entry: TabRightsAndSlots,
        purchased_tabs: u8,
    ) -> Result<(), Rejection> {
        if tab.0 >= purchased_tabs {
            return Err(Rejection::TabNotPurchased);
        }
        let info = self
            .ranks
            .get_mut(rank.index())
            .ok_or(Rejection::RankNotFound)?;
        info.ensure_tabs(purchased_tabs);
        info.tab_rights[tab.index()] = entry;
        info.enforce_guild_master();
        debug!(rank = %rank, tab = %tab, rights = ?info.tab(tab).rights, "Tab rights set");
        Ok(())
    }

    /// Set the daily money quota of `rank`; rank 0 is coerced to unlimited.
    pub fn set_money_quota(&mut self, rank: RankId, amount: u64) -> Result<(), Rejection> {
        let info = self
            .ranks
            .get_mut(rank.index())
            .ok_or(Rejection::RankNotFound)?;
        info.money_per_day = amount;
        info.enforce_guild_master();
        Ok(())
    }

    pub fn set_guild_rights(&mut self, rank: RankId, rights: GuildRights) -> Result<(), Rejection> {
        let info = self
            .ranks
            .get_mut(rank.index())
            .ok_or(Rejection::RankNotFound)?;
        info.rights = rights;
        info.enforce_guild_master();
        Ok(())
    }

    pub fn set_rank_name(&mut self, rank: RankId, name: impl Into<String>) -> Result<(), Rejection> {
        let info = self
            .ranks
            .get_mut(rank.index())
            .ok_or(Rejection::RankNotFound)?;
        info.name = name.into();
        Ok(())
    }

    /// Create missing tab entries for every rank; returns what was created.
    pub fn ensure_tabs(&mut self, tabs: u8) -> Vec<(RankId, TabId)> {
        let mut created = Vec::new();
        for rank in &mut self.ranks {
            for tab in rank.ensure_tabs(tabs) {
                created.push((rank.id, tab));
            }
        }
        created
    }

    /// Append a rank below the current lowest.
    pub fn push_rank(
        &mut self,
        name: impl Into<String>,
        rights: GuildRights,
        tabs: u8,
        max_ranks: u8,
    ) -> Result<RankId, Rejection> {
        if self.rank_count() >= max_ranks {
            return Err(Rejection::AlreadyAtRankLimit);
        }
        let id = RankId(self.rank_count());
        let mut rank = RankInfo::new(id, name, rights);
        rank.ensure_tabs(tabs);
        self.ranks.push(rank);
        Ok(id)
    }

    /// Remove the lowest rank.
    pub fn pop_rank(&mut self, min_ranks: u8) -> Result<RankInfo, Rejection> {
        if self.rank_count() <= min_ranks.max(1) {
            return Err(Rejection::AlreadyAtRankMinimum);
        }
        self.ranks.pop().ok_or(Rejection::AlreadyAtRankMinimum)
    }
}

impl Default for RightsMatrix {
    fn default() -> Self {
        Self::with_default_ranks()
    }
}
