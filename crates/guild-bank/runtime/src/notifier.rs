//! Bank notifications
//!
//! Observers subscribe to a guild's bank and receive [`BankNotification`]s
//! after each committed change. Delivery is best effort: a full channel
//! drops the event, a closed one is pruned.

use guild_bank_types::{Item, MemberId, RankId, SlotId, TabId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

/// Per-subscriber channel capacity
const CHANNEL_CAPACITY: usize = 1024;

/// Identifier of one subscription
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub uuid::Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Content of one slot as sent to observers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotContent {
    pub slot: SlotId,
    pub item: Option<Item>,
}

/// A committed change observers may care about
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BankNotification {
    /// Slots of one tab changed
    TabContent { tab: TabId, slots: Vec<SlotContent> },
    MoneyChanged { balance: u64 },
    TabPurchased { tab: TabId },
    TabInfoChanged { tab: TabId },
    TabTextChanged { tab: TabId },
    RankUpdated { rank: RankId },
    RankDeleted { remaining: u8 },
    MemberJoined { member: MemberId },
    MemberLeft { member: MemberId },
    MemberRankChanged { member: MemberId, rank: RankId },
    QuotasReset,
    Disbanded,
}

impl BankNotification {
    /// The tab this notification is scoped to, if any
    pub fn tab(&self) -> Option<TabId> {
        match self {
            BankNotification::TabContent { tab, .. }
            | BankNotification::TabPurchased { tab }
            | BankNotification::TabInfoChanged { tab }
            | BankNotification::TabTextChanged { tab } => Some(*tab),
            _ => None,
        }
    }
}

struct Subscription {
    id: SubscriptionId,
    /// Filter by tab (None = all tabs). Guild-wide notifications always pass.
    tabs: Option<Vec<TabId>>,
    sender: mpsc::Sender<BankNotification>,
}

impl Subscription {
    fn matches(&self, notification: &BankNotification) -> bool {
        match (&self.tabs, notification.tab()) {
            (Some(tabs), Some(tab)) => tabs.contains(&tab),
            _ => true,
        }
    }
}

/// Fans notifications out to subscribers
#[derive(Clone, Default)]
pub struct BankNotifier {
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
}

impl BankNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to notifications, optionally only for some tabs.
    pub async fn subscribe(
        &self,
        tabs: Option<Vec<TabId>>,
    ) -> (SubscriptionId, mpsc::Receiver<BankNotification>) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let id = SubscriptionId::new();
        self.subscriptions.write().await.push(Subscription {
            id: id.clone(),
            tabs,
            sender,
        });
        debug!(subscription_id = ?id.0, "Bank subscription registered");
        (id, receiver)
    }

    /// Deliver to every matching subscriber; returns how many received it.
    pub async fn publish(&self, notification: &BankNotification) -> usize {
        let subs = self.subscriptions.read().await;
        let mut delivered = 0;
        let mut closed_ids = Vec::new();

        for sub in subs.iter().filter(|s| s.matches(notification)) {
            match sub.sender.try_send(notification.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        subscription_id = ?sub.id.0,
                        "Subscriber channel full, dropping bank notification"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed_ids.push(sub.id.clone()),
            }
        }
        drop(subs);

        if !closed_ids.is_empty() {
            let mut subs = self.subscriptions.write().await;
            subs.retain(|s| !closed_ids.contains(&s.id));
            debug!(removed = closed_ids.len(), "Cleaned up closed bank subscriptions");
        }
        delivered
    }

    pub async fn unsubscribe(&self, id: &SubscriptionId) {
        self.subscriptions.write().await.retain(|s| s.id != *id);
        debug!(subscription_id = ?id.0, "Bank subscription removed");
    }

    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}
