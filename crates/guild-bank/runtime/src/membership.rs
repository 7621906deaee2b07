//! Roster hooks the bank depends on
//!
//! Joining, leaving, rank changes and notes. Each change is logged in the
//! roster event log and committed in the same batch as the member record.

use crate::errors::BankResult;
use crate::guild_bank::GuildBank;
use crate::notifier::BankNotification;
use crate::records::BatchExt;
use crate::roster::Member;
use guild_bank_storage::RecordKey;
use guild_bank_types::{GuildEventEntry, GuildEventType, GuildRights, MemberId, RankId, Rejection};
use tracing::{info, warn};

/// Rank the previous leader takes when leadership moves
const FORMER_LEADER_RANK: RankId = RankId(1);

impl GuildBank {
    /// Add a member at `rank`, or at the lowest rank.
    pub async fn add_member(&mut self, member: MemberId, rank: Option<RankId>) -> BankResult<RankId> {
        self.ensure_active()?;
        if self.roster.contains(&member) {
            return Err(Rejection::AlreadyMember.into());
        }
        let rank = rank.unwrap_or_else(|| self.rights.lowest_rank());
        if !self.rights.contains(rank) {
            return Err(Rejection::RankNotFound.into());
        }
        let becomes_leader = rank.is_guild_master();
        if becomes_leader && self.roster.leader().is_some() {
            return Err(Rejection::RankTooHigh.into());
        }

        let record = Member::new(member.clone(), rank);
        let entry = self.stage_guild_event(GuildEventEntry::new(
            self.guild.clone(),
            GuildEventType::JoinGuild,
            member.clone(),
        ));

        let mut batch = self.batch();
        batch.put_member(&record)?;
        batch.put_guild_event(&entry)?;
        if becomes_leader {
            let mut header = self.header();
            header.leader = Some(member.clone());
            batch.put(RecordKey::Guild, &header)?;
        }
        self.commit(batch).await?;

        self.roster.insert(record);
        if becomes_leader {
            self.roster.set_leader(Some(member.clone()));
        }
        self.logs.guild_log_mut().append(entry);
        info!(guild = %self.guild, member = %member, rank = rank.0, "Member joined");
        self.push_rank(&member, rank);
        self.notify(BankNotification::MemberJoined { member }).await;
        Ok(rank)
    }

    /// Remove `target`: leaving when the actor is the target, uninviting otherwise.
    pub async fn remove_member(&mut self, actor: &MemberId, target: &MemberId) -> BankResult<()> {
        self.ensure_active()?;
        let actor_rank = self.member_rank(actor)?;
        let target_rank = self.member_rank(target)?;

        let entry = if actor == target {
            if self.roster.is_leader(actor) {
                return Err(Rejection::PermissionDenied.into());
            }
            GuildEventEntry::new(self.guild.clone(), GuildEventType::LeaveGuild, actor.clone())
        } else {
            if !self.rights.has_guild_right(actor_rank, GuildRights::REMOVE) {
                warn!(guild = %self.guild, member = %actor, "Remove without right");
                return Err(Rejection::PermissionDenied.into());
            }
            if target_rank.is_guild_master() || target_rank <= actor_rank {
                return Err(Rejection::RankTooHigh.into());
            }
            GuildEventEntry::new(self.guild.clone(), GuildEventType::UninviteMember, actor.clone())
                .with_target(target.clone())
        };
        let entry = self.stage_guild_event(entry);

        let mut batch = self.batch();
        batch.delete(RecordKey::Member {
            member: target.clone(),
        });
        batch.delete(RecordKey::MemberWithdrawals {
            member: target.clone(),
        });
        batch.put_guild_event(&entry)?;
        self.commit(batch).await?;

        self.roster.remove(target);
        self.quotas.forget(target);
        self.logs.guild_log_mut().append(entry);
        info!(guild = %self.guild, actor = %actor, member = %target, "Member left");
        self.notify(BankNotification::MemberLeft {
            member: target.clone(),
        })
        .await;
        Ok(())
    }

    /// Raise `target` one rank. Returns the new rank.
    pub async fn promote_member(&mut self, actor: &MemberId, target: &MemberId) -> BankResult<RankId> {
        self.ensure_active()?;
        let actor_rank = self.member_rank(actor)?;
        if !self.rights.has_guild_right(actor_rank, GuildRights::PROMOTE) {
            warn!(guild = %self.guild, member = %actor, "Promote without right");
            return Err(Rejection::PermissionDenied.into());
        }
        let target_rank = self.member_rank(target)?;
        if actor == target {
            return Err(Rejection::CannotTargetSelf.into());
        }
        // New rank must stay strictly below the actor's own.
        if target_rank.0 <= actor_rank.0 + 1 {
            return Err(Rejection::RankTooHigh.into());
        }
        let rank = RankId(target_rank.0 - 1);
        self.change_rank(actor, target, rank, GuildEventType::PromoteMember)
            .await?;
        Ok(rank)
    }

    /// Lower `target` one rank. Returns the new rank.
    pub async fn demote_member(&mut self, actor: &MemberId, target: &MemberId) -> BankResult<RankId> {
        self.ensure_active()?;
        let actor_rank = self.member_rank(actor)?;
        if !self.rights.has_guild_right(actor_rank, GuildRights::DEMOTE) {
            warn!(guild = %self.guild, member = %actor, "Demote without right");
            return Err(Rejection::PermissionDenied.into());
        }
        let target_rank = self.member_rank(target)?;
        if actor == target {
            return Err(Rejection::CannotTargetSelf.into());
        }
        if target_rank <= actor_rank {
            return Err(Rejection::RankTooHigh.into());
        }
        if target_rank >= self.rights.lowest_rank() {
            return Err(Rejection::RankTooLow.into());
        }
        let rank = RankId(target_rank.0 + 1);
        self.change_rank(actor, target, rank, GuildEventType::DemoteMember)
            .await?;
        Ok(rank)
    }

    async fn change_rank(
        &mut self,
        actor: &MemberId,
        target: &MemberId,
        rank: RankId,
        event: GuildEventType,
    ) -> BankResult<()> {
        let member = self.roster.get(target).cloned().ok_or(Rejection::NotAMember)?;
        let updated = Member { rank, ..member };
        let entry = self.stage_guild_event(
            GuildEventEntry::new(self.guild.clone(), event, actor.clone())
                .with_target(target.clone())
                .with_new_rank(rank),
        );

        let mut batch = self.batch();
        batch.put_member(&updated)?;
        batch.put_guild_event(&entry)?;
        self.commit(batch).await?;

        self.roster.insert(updated);
        self.logs.guild_log_mut().append(entry);
        info!(guild = %self.guild, actor = %actor, member = %target, rank = rank.0, ?event, "Member rank changed");
        self.push_rank(target, rank);
        self.notify(BankNotification::MemberRankChanged {
            member: target.clone(),
            rank,
        })
        .await;
        Ok(())
    }

    /// Put `member` at `rank` directly. Rank 0 hands over leadership.
    pub async fn set_member_rank(&mut self, member: &MemberId, rank: RankId) -> BankResult<()> {
        self.ensure_active()?;
        self.member_rank(member)?;
        if !self.rights.contains(rank) {
            return Err(Rejection::RankNotFound.into());
        }
        if rank.is_guild_master() {
            return self.transfer_leadership(member).await;
        }
        if self.roster.is_leader(member) {
            // The guild would be left without a leader.
            return Err(Rejection::PermissionDenied.into());
        }
        let current = self.roster.get(member).cloned().ok_or(Rejection::NotAMember)?;
        let updated = Member { rank, ..current };

        let mut batch = self.batch();
        batch.put_member(&updated)?;
        self.commit(batch).await?;

        self.roster.insert(updated);
        info!(guild = %self.guild, member = %member, rank = rank.0, "Member rank set");
        self.push_rank(member, rank);
        self.notify(BankNotification::MemberRankChanged {
            member: member.clone(),
            rank,
        })
        .await;
        Ok(())
    }

    /// Hand leadership from `actor` to `target`.
    pub async fn set_leader(&mut self, actor: &MemberId, target: &MemberId) -> BankResult<()> {
        self.require_leader(actor)?;
        self.member_rank(target)?;
        if actor == target {
            return Err(Rejection::CannotTargetSelf.into());
        }
        self.transfer_leadership(target).await
    }

    async fn transfer_leadership(&mut self, target: &MemberId) -> BankResult<()> {
        let new_leader = self.roster.get(target).cloned().ok_or(Rejection::NotAMember)?;
        let new_leader = Member {
            rank: RankId::GUILD_MASTER,
            ..new_leader
        };
        let former = self
            .roster
            .leader()
            .filter(|id| *id != target)
            .and_then(|id| self.roster.get(id))
            .cloned()
            .map(|m| Member {
                rank: FORMER_LEADER_RANK,
                ..m
            });

        let mut header = self.header();
        header.leader = Some(target.clone());
        let mut batch = self.batch();
        batch.put(RecordKey::Guild, &header)?;
        batch.put_member(&new_leader)?;
        if let Some(former) = &former {
            batch.put_member(former)?;
        }
        self.commit(batch).await?;

        self.roster.insert(new_leader);
        self.roster.set_leader(Some(target.clone()));
        self.push_rank(target, RankId::GUILD_MASTER);
        if let Some(former) = former {
            self.push_rank(&former.id, FORMER_LEADER_RANK);
            let id = former.id.clone();
            self.roster.insert(former);
            self.notify(BankNotification::MemberRankChanged {
                member: id,
                rank: FORMER_LEADER_RANK,
            })
            .await;
        }
        info!(guild = %self.guild, leader = %target, "Guild leader changed");
        self.notify(BankNotification::MemberRankChanged {
            member: target.clone(),
            rank: RankId::GUILD_MASTER,
        })
        .await;
        Ok(())
    }

    /// Set a member's public or officer note.
    pub async fn set_member_note(
        &mut self,
        actor: &MemberId,
        target: &MemberId,
        note: &str,
        public: bool,
    ) -> BankResult<()> {
        self.ensure_active()?;
        let actor_rank = self.member_rank(actor)?;
        let current = self.roster.get(target).cloned().ok_or(Rejection::NotAMember)?;
        let allowed = if public {
            actor == target || self.rights.has_guild_right(actor_rank, GuildRights::EDIT_PUBLIC_NOTE)
        } else {
            self.rights
                .has_guild_right(actor_rank, GuildRights::EDIT_OFFICER_NOTE)
        };
        if !allowed {
            return Err(Rejection::PermissionDenied.into());
        }
        let mut updated = current;
        if public {
            updated.public_note = note.to_string();
        } else {
            updated.officer_note = note.to_string();
        }

        let mut batch = self.batch();
        batch.put_member(&updated)?;
        self.commit(batch).await?;
        self.roster.insert(updated);
        Ok(())
    }
}
