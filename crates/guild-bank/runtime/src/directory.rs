//! Actor directory
//!
//! Resolves a member to a live session so rank changes and bank updates
//! can be pushed immediately. An offline member is not an error; the
//! change is simply picked up on next login.

use crate::notifier::BankNotification;
use guild_bank_types::{MemberId, RankId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A connected member
pub trait MemberSession: Send + Sync {
    fn push_rank(&self, rank: RankId);
    fn push_bank_update(&self, update: &BankNotification);
}

/// Member to session lookup
pub trait ActorDirectory: Send + Sync {
    /// `None` when the member is offline
    fn find(&self, member: &MemberId) -> Option<Arc<dyn MemberSession>>;
}

/// A directory in which everyone is offline
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineDirectory;

impl ActorDirectory for OfflineDirectory {
    fn find(&self, _member: &MemberId) -> Option<Arc<dyn MemberSession>> {
        None
    }
}

/// Sessions registered in process
#[derive(Default)]
pub struct InMemoryDirectory {
    sessions: RwLock<HashMap<MemberId, Arc<dyn MemberSession>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, member: MemberId, session: Arc<dyn MemberSession>) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(member, session);
        }
    }

    pub fn unregister(&self, member: &MemberId) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(member);
        }
    }
}

impl ActorDirectory for InMemoryDirectory {
    fn find(&self, member: &MemberId) -> Option<Arc<dyn MemberSession>> {
        self.sessions.read().ok()?.get(member).cloned()
    }
}

/// Session that remembers everything pushed to it
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSession {
    ranks: std::sync::Mutex<Vec<RankId>>,
    updates: std::sync::Mutex<Vec<BankNotification>>,
}

#[cfg(test)]
impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ranks(&self) -> Vec<RankId> {
        self.ranks.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn updates(&self) -> Vec<BankNotification> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl MemberSession for RecordingSession {
    fn push_rank(&self, rank: RankId) {
        if let Ok(mut ranks) = self.ranks.lock() {
            ranks.push(rank);
        }
    }

    fn push_bank_update(&self, update: &BankNotification) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update.clone());
        }
    }
}
