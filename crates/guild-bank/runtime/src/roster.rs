//! Guild roster: members, their ranks and notes, and the leader

use chrono::{DateTime, Utc};
use guild_bank_types::{MemberId, RankId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A guild member
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub rank: RankId,
    #[serde(default)]
    pub public_note: String,
    #[serde(default)]
    pub officer_note: String,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    pub fn new(id: MemberId, rank: RankId) -> Self {
        Self {
            id,
            rank,
            public_note: String::new(),
            officer_note: String::new(),
            joined_at: Utc::now(),
        }
    }

    /// Whether this member's rank is at least as high as `rank`
    pub fn is_rank_not_lower(&self, rank: RankId) -> bool {
        self.rank <= rank
    }
}

#[derive(Clone, Debug, Default)]
pub struct Roster {
    members: BTreeMap<MemberId, Member>,
    leader: Option<MemberId>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &MemberId) -> Option<&Member> {
        self.members.get(id)
    }

    pub fn contains(&self, id: &MemberId) -> bool {
        self.members.contains_key(id)
    }

    pub fn insert(&mut self, member: Member) {
        self.members.insert(member.id.clone(), member);
    }

    pub fn remove(&mut self, id: &MemberId) -> Option<Member> {
        if self.leader.as_ref() == Some(id) {
            self.leader = None;
        }
        self.members.remove(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn leader(&self) -> Option<&MemberId> {
        self.leader.as_ref()
    }

    pub fn is_leader(&self, id: &MemberId) -> bool {
        self.leader.as_ref() == Some(id)
    }

    pub fn set_leader(&mut self, id: Option<MemberId>) {
        self.leader = id;
    }

    pub fn members_of_rank(&self, rank: RankId) -> Vec<MemberId> {
        self.members
            .values()
            .filter(|m| m.rank == rank)
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.leader = None;
    }
}
