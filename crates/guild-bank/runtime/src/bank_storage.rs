//! Bank storage: the grid of purchased tabs and the items in them
//!
//! Storage knows nothing about rights, quotas or stacking rules. It owns
//! the items placed in it and enforces that a slot holds at most one stack.

use guild_bank_types::{BankSection, Item, Rejection, SlotId, TabId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One purchased tab
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BankTab {
    pub id: TabId,
    pub name: String,
    pub icon: String,
    pub text: String,
    slots: Vec<Option<Item>>,
}

impl BankTab {
    pub fn new(id: TabId, slots: u16) -> Self {
        Self {
            id,
            name: String::new(),
            icon: String::new(),
            text: String::new(),
            slots: vec![None; slots as usize],
        }
    }

    pub fn get(&self, slot: SlotId) -> Option<&Item> {
        self.slots.get(slot.index()).and_then(|s| s.as_ref())
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Occupied slots in ascending order
    pub fn items(&self) -> impl Iterator<Item = (SlotId, &Item)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|item| (SlotId(i as u8), item)))
    }

    pub fn free_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    fn set(&mut self, slot: SlotId, item: Option<Item>) -> Result<Option<Item>, Rejection> {
        let cell = self
            .slots
            .get_mut(slot.index())
            .ok_or(Rejection::InvalidSlot)?;
        Ok(std::mem::replace(cell, item))
    }

    fn take_all(&mut self) -> Vec<Item> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }
}

/// The guild's tabs
#[derive(Clone, Debug)]
pub struct BankStorage {
    tabs: Vec<BankTab>,
    max_tabs: u8,
    slots_per_tab: u16,
}

impl BankStorage {
    pub fn new(max_tabs: u8, slots_per_tab: u16) -> Self {
        Self {
            tabs: Vec::new(),
            max_tabs,
            slots_per_tab,
        }
    }

    pub fn from_config(bank: &BankSection) -> Self {
        Self::new(bank.max_tabs, bank.slots_per_tab)
    }

    pub fn purchased_tabs(&self) -> u8 {
        self.tabs.len() as u8
    }

    pub fn max_tabs(&self) -> u8 {
        self.max_tabs
    }

    pub fn slots_per_tab(&self) -> u16 {
        self.slots_per_tab
    }

    pub fn is_purchased(&self, tab: TabId) -> bool {
        tab.index() < self.tabs.len()
    }

    pub fn is_valid_slot(&self, slot: SlotId) -> bool {
        (slot.0 as u16) < self.slots_per_tab
    }

    pub fn tab(&self, tab: TabId) -> Option<&BankTab> {
        self.tabs.get(tab.index())
    }

    pub(crate) fn tab_mut(&mut self, tab: TabId) -> Option<&mut BankTab> {
        self.tabs.get_mut(tab.index())
    }

    pub fn tabs(&self) -> &[BankTab] {
        &self.tabs
    }

    /// Ordinal the next purchase would get, if any remain
    pub fn next_tab(&self) -> Option<TabId> {
        (self.purchased_tabs() < self.max_tabs).then(|| TabId(self.purchased_tabs()))
    }

    pub fn get_item(&self, tab: TabId, slot: SlotId) -> Option<&Item> {
        self.tab(tab).and_then(|t| t.get(slot))
    }

    /// Place an item into a slot or clear it, returning the previous occupant.
    ///
    /// A placed item is detached from any previous owner; a returned item is
    /// the caller's to dispose of.
    pub fn set_item(
        &mut self,
        tab: TabId,
        slot: SlotId,
        item: Option<Item>,
    ) -> Result<Option<Item>, Rejection> {
        let item = item.map(|mut item| {
            item.owner = None;
            item
        });
        let tab = self.tab_mut(tab).ok_or(Rejection::InvalidSlot)?;
        tab.set(slot, item)
    }

    /// Add the next tab in sequence
    pub fn create_tab(&mut self) -> Result<TabId, Rejection> {
        let id = self.next_tab().ok_or(Rejection::AlreadyMaxTabs)?;
        self.tabs.push(BankTab::new(id, self.slots_per_tab));
        debug!(tab = %id, "Bank tab created");
        Ok(id)
    }

    /// Re-insert a tab read back from storage; tabs must arrive in order.
    pub(crate) fn restore_tab(&mut self, tab: BankTab) -> Result<(), Rejection> {
        if tab.id.index() != self.tabs.len() || self.next_tab().is_none() {
            return Err(Rejection::InvalidSlot);
        }
        self.tabs.push(tab);
        Ok(())
    }

    /// Destroy a tab and every item in it.
    ///
    /// Ordinals are never reused out of order, so only the highest tab can go.
    pub fn destroy_tab(&mut self, tab: TabId) -> Result<Vec<Item>, Rejection> {
        if tab.index() + 1 != self.tabs.len() {
            return Err(Rejection::TabNotPurchased);
        }
        let mut removed = self.tabs.pop().ok_or(Rejection::TabNotPurchased)?;
        let items = removed.take_all();
        debug!(tab = %tab, destroyed = items.len(), "Bank tab destroyed");
        Ok(items)
    }

    /// Destroy every tab, highest first
    pub fn destroy_all(&mut self) -> Vec<Item> {
        let mut items = Vec::new();
        while let Some(last) = self.purchased_tabs().checked_sub(1) {
            match self.destroy_tab(TabId(last)) {
                Ok(mut destroyed) => items.append(&mut destroyed),
                Err(_) => break,
            }
        }
        items
    }
}
