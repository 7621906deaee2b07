//! Item stacks
//!
//! An [`Item`] is one stack of identical items occupying one slot. The
//! engine never looks beyond the properties needed to place it: entry,
//! stack size, binding, duration and bag contents.

use crate::{ItemId, MemberId};
use serde::{Deserialize, Serialize};

/// One item stack
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Instance identity; a split creates a new identity
    pub id: ItemId,
    /// Item template entry; stacks merge only on equal entries
    pub entry: u32,
    /// Current stack count
    pub count: u32,
    /// Largest stack the template allows
    pub max_stack: u32,
    /// Bound to its owner; cannot leave the owner's possession
    #[serde(default)]
    pub soulbound: bool,
    /// Fixed lifetime in seconds; zero means permanent
    #[serde(default)]
    pub duration_secs: u32,
    /// Number of items held inside this item when it is a bag
    #[serde(default)]
    pub bag_contents: u32,
    /// Owning character while in a personal inventory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<MemberId>,
}

impl Item {
    pub fn new(entry: u32, count: u32, max_stack: u32) -> Self {
        let max_stack = max_stack.max(1);
        Self {
            id: ItemId::generate(),
            entry,
            count: count.clamp(1, max_stack),
            max_stack,
            soulbound: false,
            duration_secs: 0,
            bag_contents: 0,
            owner: None,
        }
    }

    pub fn with_id(mut self, id: ItemId) -> Self {
        self.id = id;
        self
    }

    pub fn with_soulbound(mut self, soulbound: bool) -> Self {
        self.soulbound = soulbound;
        self
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn with_bag_contents(mut self, contents: u32) -> Self {
        self.bag_contents = contents;
        self
    }

    pub fn with_owner(mut self, owner: MemberId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn is_stackable(&self) -> bool {
        self.max_stack > 1
    }

    pub fn has_duration(&self) -> bool {
        self.duration_secs > 0
    }

    pub fn is_not_empty_bag(&self) -> bool {
        self.bag_contents > 0
    }

    /// Room left in this stack for more of the same entry
    pub fn free_space(&self) -> u32 {
        self.max_stack.saturating_sub(self.count)
    }

    /// Split `count` off into a new stack with a fresh identity.
    ///
    /// The receiver is left untouched; callers reduce its count when the
    /// split is applied.
    pub fn split_off(&self, count: u32) -> Item {
        Item {
            id: ItemId::generate(),
            count,
            owner: None,
            ..self.clone()
        }
    }
}
