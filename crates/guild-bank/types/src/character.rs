//! Characters and personal inventories
//!
//! The acting member's side of a move. An [`Inventory`] is a set of
//! containers, each a fixed-size row of slots; like bank tabs, a slot
//! holds at most one stack.

use crate::{ContainerId, Item, MemberId, Rejection, SlotId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Container id of the default backpack
pub const BACKPACK: ContainerId = ContainerId(0);

/// Default backpack size
pub const BACKPACK_SLOTS: u8 = 16;

/// Personal inventory of one character
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Inventory {
    containers: BTreeMap<ContainerId, Vec<Option<Item>>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// An inventory with only the default backpack
    pub fn with_backpack() -> Self {
        Self::new().with_container(BACKPACK, BACKPACK_SLOTS)
    }

    pub fn with_container(mut self, container: ContainerId, slots: u8) -> Self {
        self.containers
            .insert(container, vec![None; slots as usize]);
        self
    }

    pub fn has_container(&self, container: ContainerId) -> bool {
        self.containers.contains_key(&container)
    }

    pub fn container_size(&self, container: ContainerId) -> Option<u8> {
        self.containers.get(&container).map(|c| c.len() as u8)
    }

    pub fn get(&self, container: ContainerId, slot: SlotId) -> Option<&Item> {
        self.containers
            .get(&container)
            .and_then(|c| c.get(slot.index()))
            .and_then(|s| s.as_ref())
    }

    /// Place or clear a slot, returning what was there.
    pub fn set(
        &mut self,
        container: ContainerId,
        slot: SlotId,
        item: Option<Item>,
    ) -> Result<Option<Item>, Rejection> {
        let cell = self
            .containers
            .get_mut(&container)
            .and_then(|c| c.get_mut(slot.index()))
            .ok_or(Rejection::InvalidSlot)?;
        Ok(std::mem::replace(cell, item))
    }

    /// Occupied slots of one container in ascending order
    pub fn items(&self, container: ContainerId) -> impl Iterator<Item = (SlotId, &Item)> {
        self.containers
            .get(&container)
            .into_iter()
            .flat_map(|c| c.iter().enumerate())
            .filter_map(|(i, s)| s.as_ref().map(|item| (SlotId(i as u8), item)))
    }

    pub fn item_count(&self) -> usize {
        self.containers
            .values()
            .flat_map(|c| c.iter())
            .filter(|s| s.is_some())
            .count()
    }
}

/// A guild member's character as seen by the bank
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Character {
    pub member: MemberId,
    /// Carried money (copper)
    pub money: u64,
    pub inventory: Inventory,
}

impl Character {
    pub fn new(member: MemberId) -> Self {
        Self {
            member,
            money: 0,
            inventory: Inventory::with_backpack(),
        }
    }

    pub fn with_money(mut self, money: u64) -> Self {
        self.money = money;
        self
    }

    pub fn with_inventory(mut self, inventory: Inventory) -> Self {
        self.inventory = inventory;
        self
    }

    pub fn has_enough_money(&self, amount: u64) -> bool {
        self.money >= amount
    }
}
