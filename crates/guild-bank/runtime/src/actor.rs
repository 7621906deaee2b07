//! Per-guild actor
//!
//! One tokio task owns a guild's [`GuildBank`] and runs the commands it
//! receives one at a time, so no two operations on the same guild ever
//! interleave. Guilds run in separate tasks and proceed in parallel.

use crate::administration::RankUpdate;
use crate::errors::{BankError, BankResult};
use crate::guild_bank::{
    GuildBank, LogCategory, LogEntries, MemberPermissions, TabInfo, TabQuery, TabSnapshot,
};
use crate::move_orchestrator::MoveOutcome;
use crate::notifier::{BankNotification, BankNotifier, SubscriptionId};
use guild_bank_types::{
    Character, GuildId, MemberId, MoveRequest, RankId, Rejection, Remaining, TabId,
    TabRightsAndSlots,
};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Commands queued per guild before senders wait
const COMMAND_QUEUE_CAPACITY: usize = 256;

type Reply<T> = oneshot::Sender<T>;

/// Operations that act on behalf of a character carry it in and back out.
type WithCharacter<T> = (Character, BankResult<T>);

enum Command {
    Move {
        character: Character,
        request: MoveRequest,
        reply: Reply<WithCharacter<MoveOutcome>>,
    },
    DepositMoney {
        character: Character,
        amount: u64,
        reply: Reply<WithCharacter<u64>>,
    },
    WithdrawMoney {
        character: Character,
        amount: u64,
        repair: bool,
        reply: Reply<WithCharacter<u64>>,
    },
    PurchaseTab {
        character: Character,
        reply: Reply<WithCharacter<TabId>>,
    },
    SetTabInfo {
        actor: MemberId,
        tab: TabId,
        name: String,
        icon: String,
        reply: Reply<BankResult<()>>,
    },
    SetTabText {
        actor: MemberId,
        tab: TabId,
        text: String,
        reply: Reply<BankResult<()>>,
    },
    AddRank {
        actor: MemberId,
        name: String,
        reply: Reply<BankResult<RankId>>,
    },
    RemoveLowestRank {
        actor: MemberId,
        reply: Reply<BankResult<()>>,
    },
    SetRankInfo {
        actor: MemberId,
        rank: RankId,
        update: RankUpdate,
        reply: Reply<BankResult<()>>,
    },
    SetTabRights {
        actor: MemberId,
        rank: RankId,
        tab: TabId,
        entry: TabRightsAndSlots,
        reply: Reply<BankResult<()>>,
    },
    AddMember {
        member: MemberId,
        rank: Option<RankId>,
        reply: Reply<BankResult<RankId>>,
    },
    RemoveMember {
        actor: MemberId,
        target: MemberId,
        reply: Reply<BankResult<()>>,
    },
    PromoteMember {
        actor: MemberId,
        target: MemberId,
        reply: Reply<BankResult<RankId>>,
    },
    DemoteMember {
        actor: MemberId,
        target: MemberId,
        reply: Reply<BankResult<RankId>>,
    },
    SetLeader {
        actor: MemberId,
        target: MemberId,
        reply: Reply<BankResult<()>>,
    },
    QueryTab {
        member: MemberId,
        tab: TabId,
        query: TabQuery,
        reply: Reply<Result<TabSnapshot, Rejection>>,
    },
    QueryTabsInfo {
        reply: Reply<Vec<TabInfo>>,
    },
    QueryLog {
        member: MemberId,
        category: LogCategory,
        reply: Reply<Result<LogEntries, Rejection>>,
    },
    Permissions {
        member: MemberId,
        reply: Reply<Result<MemberPermissions, Rejection>>,
    },
    RemainingMoney {
        member: MemberId,
        reply: Reply<Result<Remaining, Rejection>>,
    },
    ResetQuotas {
        reply: Reply<BankResult<()>>,
    },
    Disband {
        actor: MemberId,
        reply: Reply<BankResult<()>>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Move { .. } => "move",
            Command::DepositMoney { .. } => "deposit_money",
            Command::WithdrawMoney { .. } => "withdraw_money",
            Command::PurchaseTab { .. } => "purchase_tab",
            Command::SetTabInfo { .. } => "set_tab_info",
            Command::SetTabText { .. } => "set_tab_text",
            Command::AddRank { .. } => "add_rank",
            Command::RemoveLowestRank { .. } => "remove_lowest_rank",
            Command::SetRankInfo { .. } => "set_rank_info",
            Command::SetTabRights { .. } => "set_tab_rights",
            Command::AddMember { .. } => "add_member",
            Command::RemoveMember { .. } => "remove_member",
            Command::PromoteMember { .. } => "promote_member",
            Command::DemoteMember { .. } => "demote_member",
            Command::SetLeader { .. } => "set_leader",
            Command::QueryTab { .. } => "query_tab",
            Command::QueryTabsInfo { .. } => "query_tabs_info",
            Command::QueryLog { .. } => "query_log",
            Command::Permissions { .. } => "permissions",
            Command::RemainingMoney { .. } => "remaining_money",
            Command::ResetQuotas { .. } => "reset_quotas",
            Command::Disband { .. } => "disband",
        }
    }
}

async fn handle_command(bank: &mut GuildBank, command: Command) {
    // A dropped reply only means the caller stopped waiting.
    match command {
        Command::Move {
            mut character,
            request,
            reply,
        } => {
            let result = bank.request_move(&mut character, request).await;
            let _ = reply.send((character, result));
        }
        Command::DepositMoney {
            mut character,
            amount,
            reply,
        } => {
            let result = bank.deposit_money(&mut character, amount).await;
            let _ = reply.send((character, result));
        }
        Command::WithdrawMoney {
            mut character,
            amount,
            repair,
            reply,
        } => {
            let result = bank.withdraw_money(&mut character, amount, repair).await;
            let _ = reply.send((character, result));
        }
        Command::PurchaseTab {
            mut character,
            reply,
        } => {
            let result = bank.purchase_tab(&mut character).await;
            let _ = reply.send((character, result));
        }
        Command::SetTabInfo {
            actor,
            tab,
            name,
            icon,
            reply,
        } => {
            let _ = reply.send(bank.set_tab_info(&actor, tab, name, icon).await);
        }
        Command::SetTabText {
            actor,
            tab,
            text,
            reply,
        } => {
            let _ = reply.send(bank.set_tab_text(&actor, tab, &text).await);
        }
        Command::AddRank { actor, name, reply } => {
            let _ = reply.send(bank.add_rank(&actor, name).await);
        }
        Command::RemoveLowestRank { actor, reply } => {
            let _ = reply.send(bank.remove_lowest_rank(&actor).await);
        }
        Command::SetRankInfo {
            actor,
            rank,
            update,
            reply,
        } => {
            let _ = reply.send(bank.set_rank_info(&actor, rank, update).await);
        }
        Command::SetTabRights {
            actor,
            rank,
            tab,
            entry,
            reply,
        } => {
            let _ = reply.send(bank.set_tab_rights(&actor, rank, tab, entry).await);
        }
        Command::AddMember {
            member,
            rank,
            reply,
        } => {
            let _ = reply.send(bank.add_member(member, rank).await);
        }
        Command::RemoveMember {
            actor,
            target,
            reply,
        } => {
            let _ = reply.send(bank.remove_member(&actor, &target).await);
        }
        Command::PromoteMember {
            actor,
            target,
            reply,
        } => {
            let _ = reply.send(bank.promote_member(&actor, &target).await);
        }
        Command::DemoteMember {
            actor,
            target,
            reply,
        } => {
            let _ = reply.send(bank.demote_member(&actor, &target).await);
        }
        Command::SetLeader {
            actor,
            target,
            reply,
        } => {
            let _ = reply.send(bank.set_leader(&actor, &target).await);
        }
        Command::QueryTab {
            member,
            tab,
            query,
            reply,
        } => {
            let _ = reply.send(bank.query_tab(&member, tab, query));
        }
        Command::QueryTabsInfo { reply } => {
            let _ = reply.send(bank.query_tabs_info());
        }
        Command::QueryLog {
            member,
            category,
            reply,
        } => {
            let _ = reply.send(bank.query_log(&member, category));
        }
        Command::Permissions { member, reply } => {
            let _ = reply.send(bank.permissions(&member));
        }
        Command::RemainingMoney { member, reply } => {
            let _ = reply.send(bank.remaining_money(&member));
        }
        Command::ResetQuotas { reply } => {
            let _ = reply.send(bank.reset_quotas().await);
        }
        Command::Disband { actor, reply } => {
            let _ = reply.send(bank.disband(&actor).await);
        }
    }
}

/// Start the actor that owns `bank`.
///
/// The task ends once every handle is dropped and hands the bank back
/// through its join handle.
pub fn spawn_guild_bank(bank: GuildBank) -> (GuildBankHandle, JoinHandle<GuildBank>) {
    let (sender, mut receiver) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    let handle = GuildBankHandle {
        guild: bank.guild_id().clone(),
        sender,
        notifier: bank.notifier().clone(),
    };

    let task = tokio::spawn(async move {
        let mut bank = bank;
        info!(guild = %bank.guild_id(), "Guild bank actor started");
        while let Some(command) = receiver.recv().await {
            debug!(guild = %bank.guild_id(), command = command.name(), "Handling command");
            handle_command(&mut bank, command).await;
        }
        info!(guild = %bank.guild_id(), "Guild bank actor stopped");
        bank
    });

    (handle, task)
}

/// Cloneable sender side of a guild's actor
#[derive(Clone)]
pub struct GuildBankHandle {
    guild: GuildId,
    sender: mpsc::Sender<Command>,
    notifier: BankNotifier,
}

impl GuildBankHandle {
    pub fn guild_id(&self) -> &GuildId {
        &self.guild
    }

    /// Whether the actor is still accepting commands
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn call<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> BankResult<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| BankError::Unavailable)?;
        response.await.map_err(|_| BankError::Unavailable)
    }

    async fn call_with_character<T>(
        &self,
        character: &mut Character,
        command: impl FnOnce(Character, Reply<WithCharacter<T>>) -> Command,
    ) -> BankResult<T> {
        let carried = character.clone();
        let (updated, result) = self.call(|reply| command(carried, reply)).await?;
        *character = updated;
        result
    }

    pub async fn request_move(
        &self,
        character: &mut Character,
        request: MoveRequest,
    ) -> BankResult<MoveOutcome> {
        self.call_with_character(character, |character, reply| Command::Move {
            character,
            request,
            reply,
        })
        .await
    }

    pub async fn deposit_money(&self, character: &mut Character, amount: u64) -> BankResult<u64> {
        self.call_with_character(character, |character, reply| Command::DepositMoney {
            character,
            amount,
            reply,
        })
        .await
    }

    pub async fn withdraw_money(
        &self,
        character: &mut Character,
        amount: u64,
        repair: bool,
    ) -> BankResult<u64> {
        self.call_with_character(character, |character, reply| Command::WithdrawMoney {
            character,
            amount,
            repair,
            reply,
        })
        .await
    }

    pub async fn purchase_tab(&self, character: &mut Character) -> BankResult<TabId> {
        self.call_with_character(character, |character, reply| Command::PurchaseTab {
            character,
            reply,
        })
        .await
    }

    pub async fn set_tab_info(
        &self,
        actor: &MemberId,
        tab: TabId,
        name: impl Into<String>,
        icon: impl Into<String>,
    ) -> BankResult<()> {
        let (name, icon) = (name.into(), icon.into());
        self.call(|reply| Command::SetTabInfo {
            actor: actor.clone(),
            tab,
            name,
            icon,
            reply,
        })
        .await?
    }

    pub async fn set_tab_text(&self, actor: &MemberId, tab: TabId, text: impl Into<String>) -> BankResult<()> {
        let text = text.into();
        self.call(|reply| Command::SetTabText {
            actor: actor.clone(),
            tab,
            text,
            reply,
        })
        .await?
    }

    pub async fn add_rank(&self, actor: &MemberId, name: impl Into<String>) -> BankResult<RankId> {
        let name = name.into();
        self.call(|reply| Command::AddRank {
            actor: actor.clone(),
            name,
            reply,
        })
        .await?
    }

    pub async fn remove_lowest_rank(&self, actor: &MemberId) -> BankResult<()> {
        self.call(|reply| Command::RemoveLowestRank {
            actor: actor.clone(),
            reply,
        })
        .await?
    }

    pub async fn set_rank_info(&self, actor: &MemberId, rank: RankId, update: RankUpdate) -> BankResult<()> {
        self.call(|reply| Command::SetRankInfo {
            actor: actor.clone(),
            rank,
            update,
            reply,
        })
        .await?
    }

    pub async fn set_tab_rights(
        &self,
        actor: &MemberId,
        rank: RankId,
        tab: TabId,
        entry: TabRightsAndSlots,
    ) -> BankResult<()> {
        self.call(|reply| Command::SetTabRights {
            actor: actor.clone(),
            rank,
            tab,
            entry,
            reply,
        })
        .await?
    }

    pub async fn add_member(&self, member: MemberId, rank: Option<RankId>) -> BankResult<RankId> {
        self.call(|reply| Command::AddMember { member, rank, reply })
            .await?
    }

    pub async fn remove_member(&self, actor: &MemberId, target: &MemberId) -> BankResult<()> {
        self.call(|reply| Command::RemoveMember {
            actor: actor.clone(),
            target: target.clone(),
            reply,
        })
        .await?
    }

    pub async fn promote_member(&self, actor: &MemberId, target: &MemberId) -> BankResult<RankId> {
        self.call(|reply| Command::PromoteMember {
            actor: actor.clone(),
            target: target.clone(),
            reply,
        })
        .await?
    }

    pub async fn demote_member(&self, actor: &MemberId, target: &MemberId) -> BankResult<RankId> {
        self.call(|reply| Command::DemoteMember {
            actor: actor.clone(),
            target: target.clone(),
            reply,
        })
        .await?
    }

    pub async fn set_leader(&self, actor: &MemberId, target: &MemberId) -> BankResult<()> {
        self.call(|reply| Command::SetLeader {
            actor: actor.clone(),
            target: target.clone(),
            reply,
        })
        .await?
    }

    pub async fn query_tab(&self, member: &MemberId, tab: TabId, query: TabQuery) -> BankResult<TabSnapshot> {
        Ok(self
            .call(|reply| Command::QueryTab {
                member: member.clone(),
                tab,
                query,
                reply,
            })
            .await??)
    }

    pub async fn query_tabs_info(&self) -> BankResult<Vec<TabInfo>> {
        self.call(|reply| Command::QueryTabsInfo { reply }).await
    }

    pub async fn query_log(&self, member: &MemberId, category: LogCategory) -> BankResult<LogEntries> {
        Ok(self
            .call(|reply| Command::QueryLog {
                member: member.clone(),
                category,
                reply,
            })
            .await??)
    }

    pub async fn permissions(&self, member: &MemberId) -> BankResult<MemberPermissions> {
        Ok(self
            .call(|reply| Command::Permissions {
                member: member.clone(),
                reply,
            })
            .await??)
    }

    pub async fn remaining_money(&self, member: &MemberId) -> BankResult<Remaining> {
        Ok(self
            .call(|reply| Command::RemainingMoney {
                member: member.clone(),
                reply,
            })
            .await??)
    }

    pub async fn reset_quotas(&self) -> BankResult<()> {
        self.call(|reply| Command::ResetQuotas { reply }).await?
    }

    pub async fn disband(&self, actor: &MemberId) -> BankResult<()> {
        self.call(|reply| Command::Disband {
            actor: actor.clone(),
            reply,
        })
        .await?
    }

    /// Subscribe to the guild's notifications, optionally only for some tabs.
    pub async fn subscribe(
        &self,
        tabs: Option<Vec<TabId>>,
    ) -> (SubscriptionId, mpsc::Receiver<BankNotification>) {
        self.notifier.subscribe(tabs).await
    }

    pub async fn unsubscribe(&self, id: &SubscriptionId) {
        self.notifier.unsubscribe(id).await
    }
}

/// Reset withdrawal quotas every `period` through the guild's own queue.
///
/// The first reset happens one full period after the call. The job ends
/// once the actor stops or the guild is disbanded.
pub fn spawn_quota_rollover(handle: GuildBankHandle, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match handle.reset_quotas().await {
                Ok(()) => debug!(guild = %handle.guild_id(), "Quota rollover complete"),
                Err(BankError::Unavailable) => break,
                Err(BankError::Rejected(reason)) => {
                    warn!(guild = %handle.guild_id(), %reason, "Quota rollover stopped");
                    break;
                }
                Err(e) => error!(guild = %handle.guild_id(), error = %e, "Quota rollover failed"),
            }
        }
        debug!(guild = %handle.guild_id(), "Quota rollover job ended");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use guild_bank_storage::memory::InMemoryGuildStore;
    use guild_bank_types::BankConfig;
    use std::sync::Arc;

    async fn spawn() -> (GuildBankHandle, JoinHandle<GuildBank>) {
        let store = Arc::new(InMemoryGuildStore::new());
        let bank = GuildBank::create(
            GuildId::new("g"),
            MemberId::new("leader"),
            BankConfig::default(),
            store,
        )
        .await
        .unwrap();
        spawn_guild_bank(bank)
    }

    #[tokio::test]
    async fn commands_run_against_the_owned_bank() {
        let (handle, task) = spawn().await;
        let mut character = Character::new(MemberId::new("leader")).with_money(300);
        assert_eq!(handle.deposit_money(&mut character, 200).await.unwrap(), 200);
        assert_eq!(character.money, 100);

        let err = handle.deposit_money(&mut character, 500).await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::InsufficientFunds));
        assert_eq!(character.money, 100);

        drop(handle);
        let bank = task.await.unwrap();
        assert_eq!(bank.money(), 200);
    }

    #[tokio::test]
    async fn stopped_actor_is_unavailable() {
        let (handle, task) = spawn().await;
        let other = handle.clone();
        task.abort();
        let _ = task.await;
        assert!(!other.is_running());
        let err = other.reset_quotas().await.unwrap_err();
        assert!(matches!(err, BankError::Unavailable));
        drop(handle);
    }

    #[tokio::test]
    async fn subscribers_see_actor_changes() {
        let (handle, _task) = spawn().await;
        let (_id, mut rx) = handle.subscribe(None).await;
        handle.reset_quotas().await.unwrap();
        assert!(matches!(rx.recv().await, Some(BankNotification::QuotasReset)));
    }

    #[tokio::test(start_paused = true)]
    async fn rollover_ends_when_guild_disbands() {
        let (handle, _task) = spawn().await;
        let job = spawn_quota_rollover(handle.clone(), Duration::from_secs(60));
        let (_id, mut rx) = handle.subscribe(None).await;

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(matches!(rx.recv().await, Some(BankNotification::QuotasReset)));

        handle.disband(&MemberId::new("leader")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        job.await.unwrap();
    }
}
