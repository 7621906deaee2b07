//! Move endpoints
//!
//! A move runs between two endpoints. The source must name a slot; the
//! destination may leave the slot open and let the bank or inventory
//! choose where the stack lands.

use crate::{ContainerId, SlotId, TabId};
use serde::{Deserialize, Serialize};

/// One end of an item move
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MoveEndpoint {
    Bank { tab: TabId, slot: Option<SlotId> },
    Inventory { container: ContainerId, slot: Option<SlotId> },
}

impl MoveEndpoint {
    pub fn bank(tab: TabId, slot: SlotId) -> Self {
        MoveEndpoint::Bank {
            tab,
            slot: Some(slot),
        }
    }

    /// A bank tab with no preferred slot
    pub fn bank_any(tab: TabId) -> Self {
        MoveEndpoint::Bank { tab, slot: None }
    }

    pub fn inventory(container: ContainerId, slot: SlotId) -> Self {
        MoveEndpoint::Inventory {
            container,
            slot: Some(slot),
        }
    }

    pub fn inventory_any(container: ContainerId) -> Self {
        MoveEndpoint::Inventory {
            container,
            slot: None,
        }
    }

    pub fn is_bank(&self) -> bool {
        matches!(self, MoveEndpoint::Bank { .. })
    }

    pub fn tab(&self) -> Option<TabId> {
        match self {
            MoveEndpoint::Bank { tab, .. } => Some(*tab),
            MoveEndpoint::Inventory { .. } => None,
        }
    }

    pub fn slot(&self) -> Option<SlotId> {
        match self {
            MoveEndpoint::Bank { slot, .. } | MoveEndpoint::Inventory { slot, .. } => *slot,
        }
    }

    /// Both endpoints are slots of the same bank tab
    pub fn same_bank_tab(&self, other: &MoveEndpoint) -> bool {
        match (self.tab(), other.tab()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Concrete address once a slot is known
    pub fn address(&self, slot: SlotId) -> SlotAddress {
        match self {
            MoveEndpoint::Bank { tab, .. } => SlotAddress::Bank(*tab, slot),
            MoveEndpoint::Inventory { container, .. } => SlotAddress::Inventory(*container, slot),
        }
    }

    /// Address of the named slot, if any
    pub fn named_address(&self) -> Option<SlotAddress> {
        self.slot().map(|slot| self.address(slot))
    }
}

/// A concrete slot in the bank or in the acting character's inventory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotAddress {
    Bank(TabId, SlotId),
    Inventory(ContainerId, SlotId),
}

impl SlotAddress {
    pub fn slot(&self) -> SlotId {
        match self {
            SlotAddress::Bank(_, slot) | SlotAddress::Inventory(_, slot) => *slot,
        }
    }

    pub fn tab(&self) -> Option<TabId> {
        match self {
            SlotAddress::Bank(tab, _) => Some(*tab),
            SlotAddress::Inventory(..) => None,
        }
    }
}

impl std::fmt::Display for SlotAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotAddress::Bank(tab, slot) => write!(f, "{}/{}", tab, slot),
            SlotAddress::Inventory(container, slot) => write!(f, "{}/{}", container, slot),
        }
    }
}

/// A request to move an item stack, optionally splitting it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub source: MoveEndpoint,
    pub destination: MoveEndpoint,
    /// Move only this many items off the source stack
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split: Option<u32>,
}

impl MoveRequest {
    pub fn new(source: MoveEndpoint, destination: MoveEndpoint) -> Self {
        Self {
            source,
            destination,
            split: None,
        }
    }

    pub fn with_split(mut self, amount: u32) -> Self {
        self.split = Some(amount);
        self
    }
}
