//! Audit log entries
//!
//! Two entry kinds exist: guild events (roster changes) and bank events
//! (item and money movements). Every entry carries an id assigned by the
//! log that holds it; ids wrap modulo that log's capacity.

use crate::{GuildId, MemberId, RankId, TabId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An entry that a bounded log can hold
pub trait LogRecord {
    fn log_id(&self) -> u32;
    fn set_log_id(&mut self, id: u32);
}

/// Roster event kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuildEventType {
    InviteMember = 1,
    JoinGuild = 2,
    PromoteMember = 3,
    DemoteMember = 4,
    UninviteMember = 5,
    LeaveGuild = 6,
}

/// Bank event kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankEventType {
    DepositItem = 1,
    WithdrawItem = 2,
    MoveItem = 3,
    DepositMoney = 4,
    WithdrawMoney = 5,
    RepairMoney = 6,
}

impl BankEventType {
    pub fn is_money_event(self) -> bool {
        matches!(
            self,
            BankEventType::DepositMoney | BankEventType::WithdrawMoney | BankEventType::RepairMoney
        )
    }
}

/// Which bank log an entry belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankLogId {
    Tab(TabId),
    Money,
}

impl std::fmt::Display for BankLogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BankLogId::Tab(tab) => write!(f, "{}", tab),
            BankLogId::Money => write!(f, "money"),
        }
    }
}

/// A roster event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildEventEntry {
    pub guild: GuildId,
    pub id: u32,
    pub timestamp: DateTime<Utc>,
    pub event: GuildEventType,
    /// Member who acted
    pub actor: MemberId,
    /// Member acted upon, when different from the actor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<MemberId>,
    /// Rank after a promotion or demotion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_rank: Option<RankId>,
}

impl GuildEventEntry {
    pub fn new(guild: GuildId, event: GuildEventType, actor: MemberId) -> Self {
        Self {
            guild,
            id: 0,
            timestamp: Utc::now(),
            event,
            actor,
            target: None,
            new_rank: None,
        }
    }

    pub fn with_target(mut self, target: MemberId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_new_rank(mut self, rank: RankId) -> Self {
        self.new_rank = Some(rank);
        self
    }
}

impl LogRecord for GuildEventEntry {
    fn log_id(&self) -> u32 {
        self.id
    }

    fn set_log_id(&mut self, id: u32) {
        self.id = id;
    }
}

/// What moved in a bank event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BankEventPayload {
    Item { entry: u32, count: u32 },
    Money { amount: u64 },
}

/// An item or money event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankEventEntry {
    pub guild: GuildId,
    pub id: u32,
    pub timestamp: DateTime<Utc>,
    pub event: BankEventType,
    pub actor: MemberId,
    pub payload: BankEventPayload,
    /// Destination of a cross-tab move
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_tab: Option<TabId>,
}

impl BankEventEntry {
    pub fn item(
        guild: GuildId,
        event: BankEventType,
        actor: MemberId,
        entry: u32,
        count: u32,
    ) -> Self {
        Self {
            guild,
            id: 0,
            timestamp: Utc::now(),
            event,
            actor,
            payload: BankEventPayload::Item { entry, count },
            dest_tab: None,
        }
    }

    pub fn money(guild: GuildId, event: BankEventType, actor: MemberId, amount: u64) -> Self {
        Self {
            guild,
            id: 0,
            timestamp: Utc::now(),
            event,
            actor,
            payload: BankEventPayload::Money { amount },
            dest_tab: None,
        }
    }

    pub fn with_dest_tab(mut self, tab: TabId) -> Self {
        self.dest_tab = Some(tab);
        self
    }
}

impl LogRecord for BankEventEntry {
    fn log_id(&self) -> u32 {
        self.id
    }

    fn set_log_id(&mut self, id: u32) {
        self.id = id;
    }
}
