//! Ranks and remaining-quota reporting

use crate::{BankTabRights, GuildRights, RankId, TabId, TabRightsAndSlots, UNLIMITED_MONEY};
use serde::{Deserialize, Serialize};

/// One rung of the guild's rank ladder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankInfo {
    pub id: RankId,
    pub name: String,
    pub rights: GuildRights,
    /// Money (copper) a member of this rank may withdraw per day
    pub money_per_day: u64,
    /// Per-tab rights and slot quotas, indexed by tab ordinal
    #[serde(default)]
    pub tab_rights: Vec<TabRightsAndSlots>,
}

impl RankInfo {
    pub fn new(id: RankId, name: impl Into<String>, rights: GuildRights) -> Self {
        let mut rank = Self {
            id,
            name: name.into(),
            rights,
            money_per_day: 0,
            tab_rights: Vec::new(),
        };
        rank.enforce_guild_master();
        rank
    }

    pub fn is_guild_master(&self) -> bool {
        self.id.is_guild_master()
    }

    /// Rank 0 always holds every right with unlimited quotas, whatever was stored.
    pub fn enforce_guild_master(&mut self) {
        if !self.is_guild_master() {
            return;
        }
        self.rights |= GuildRights::ALL;
        self.money_per_day = UNLIMITED_MONEY;
        for tab in &mut self.tab_rights {
            *tab = TabRightsAndSlots::unrestricted();
        }
    }

    pub fn tab(&self, tab: TabId) -> TabRightsAndSlots {
        self.tab_rights.get(tab.index()).copied().unwrap_or_default()
    }

    pub fn tab_has(&self, tab: TabId, rights: BankTabRights) -> bool {
        self.tab(tab).rights.contains(rights)
    }

    /// Make sure an entry exists for every tab below `tabs`.
    ///
    /// Returns the tabs that were created.
    pub fn ensure_tabs(&mut self, tabs: u8) -> Vec<TabId> {
        let mut created = Vec::new();
        while self.tab_rights.len() < tabs as usize {
            let tab = TabId(self.tab_rights.len() as u8);
            self.tab_rights.push(if self.is_guild_master() {
                TabRightsAndSlots::unrestricted()
            } else {
                TabRightsAndSlots::none()
            });
            created.push(tab);
        }
        created
    }
}

/// Names and rights of the ranks every new guild starts with
pub fn default_ranks() -> Vec<RankInfo> {
    let all = GuildRights::ALL;
    let chat = GuildRights::chat();
    [
        ("Guild Master", all),
        ("Officer", all),
        ("Veteran", chat),
        ("Member", chat),
        ("Initiate", chat),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (name, rights))| RankInfo::new(RankId(i as u8), name, rights))
    .collect()
}

/// Remaining daily withdrawal allowance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Remaining {
    Unlimited,
    Limited(u64),
}

impl Remaining {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Remaining::Limited(0))
    }

    /// Whether `amount` fits in what is left
    pub fn allows(&self, amount: u64) -> bool {
        match self {
            Remaining::Unlimited => true,
            Remaining::Limited(left) => amount <= *left,
        }
    }
}

impl std::fmt::Display for Remaining {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Remaining::Unlimited => write!(f, "unlimited"),
            Remaining::Limited(n) => write!(f, "{}", n),
        }
    }
}
