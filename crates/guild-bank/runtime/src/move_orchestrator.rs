//! Move orchestrator: validates and stages one item move
//!
//! A move runs between a source endpoint and a destination endpoint, at
//! least one of which is a bank tab. Planning reads live state through an
//! overlay of staged slot contents and never mutates anything: every check
//! (source, split amount, store and withdraw rights, space reservation, the
//! swap fallback) completes before the first slot is staged. The result is
//! a [`StagedMove`] which the caller commits as one write batch and only
//! then applies to memory.
//!
//! Endpoint capabilities (`init_item`, `can_store`, `has_store_rights`,
//! `has_withdraw_rights`, `remove_item`, `store_item`, `log_event`) are
//! dispatched by matching on [`MoveEndpoint`].

use crate::bank_storage::BankStorage;
use crate::event_log::BankLogBook;
use crate::quota_tracker::{QuotaSlot, WithdrawalQuotaTracker, WithdrawalUsage};
use crate::records::BatchExt;
use crate::rights_matrix::RightsMatrix;
use guild_bank_storage::{RecordKey, StorageResult, WriteBatch};
use guild_bank_types::{
    BankEventEntry, BankEventType, BankLogId, BankTabRights, Character, GuildId, Item, ItemId,
    MemberId, MoveEndpoint, MoveRequest, RankId, Rejection, SlotAddress, SlotId, TabId,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Read-only view of the state a move is planned against
#[derive(Clone, Copy)]
pub struct MoveContext<'a> {
    pub guild: &'a GuildId,
    pub actor: &'a MemberId,
    pub rank: RankId,
    pub storage: &'a BankStorage,
    pub rights: &'a RightsMatrix,
    pub quotas: &'a WithdrawalQuotaTracker,
    pub logs: &'a BankLogBook,
    pub character: &'a Character,
}

/// Space reserved for one stack: slots and how many items each takes
type Reservation = Vec<(SlotAddress, u32)>;

/// Plans a single move request
pub struct MoveOrchestrator<'a> {
    ctx: MoveContext<'a>,
    overlay: BTreeMap<SlotAddress, Option<Item>>,
    destroyed: Vec<ItemId>,
    usage: WithdrawalUsage,
    usage_changed: bool,
    events: Vec<(BankLogId, BankEventEntry)>,
    next_ids: BTreeMap<BankLogId, u32>,
    swapped: bool,
}

impl<'a> MoveOrchestrator<'a> {
    pub fn new(ctx: MoveContext<'a>) -> Self {
        Self {
            usage: ctx.quotas.usage(ctx.actor),
            ctx,
            overlay: BTreeMap::new(),
            destroyed: Vec::new(),
            usage_changed: false,
            events: Vec::new(),
            next_ids: BTreeMap::new(),
            swapped: false,
        }
    }

    /// Validate `request` and stage its effects.
    pub fn plan(mut self, request: &MoveRequest) -> Result<StagedMove, Rejection> {
        let source = request.source;
        let destination = request.destination;

        let source_slot = source.slot().ok_or(Rejection::InvalidSlot)?;
        if !source.is_bank() && !destination.is_bank() {
            return Err(Rejection::InvalidSlot);
        }
        if destination.named_address() == Some(source.address(source_slot)) {
            return Err(Rejection::InvalidSlot);
        }
        self.check_endpoint(&source)?;
        self.check_endpoint(&destination)?;

        let item = self.init_item(&source)?;
        let split = match request.split {
            Some(0) => return Err(Rejection::InvalidSplitAmount),
            Some(n) if n > item.count => return Err(Rejection::InvalidSplitAmount),
            Some(n) if n == item.count => None,
            other => other,
        };

        self.has_store_rights(&destination, &source)?;
        self.has_withdraw_rights(&source, &destination)?;

        if let Some(amount) = split {
            let moving = item.split_off(amount);
            self.do_move(&source, &destination, moving, Some(amount), None)?;
        } else if let Err(merge_error) = self.do_move(&source, &destination, item.clone(), None, None)
        {
            if self.occupant(&destination).is_none() {
                return Err(merge_error);
            }
            let dest_item = self.init_item(&destination)?;
            self.has_store_rights(&source, &destination)?;
            self.has_withdraw_rights(&destination, &source)?;
            self.do_move(&source, &destination, item, None, Some(dest_item))?;
            self.swapped = true;
        }

        debug!(
            guild = %self.ctx.guild,
            actor = %self.ctx.actor,
            slots = self.overlay.len(),
            swapped = self.swapped,
            "Move planned"
        );

        Ok(StagedMove {
            slots: self.overlay,
            destroyed: self.destroyed,
            usage: self.usage_changed.then_some(self.usage),
            events: self.events,
            swapped: self.swapped,
            split: split.is_some(),
        })
    }

    /// Validate, reserve both directions, then stage the exchange.
    ///
    /// Nothing is staged unless every reservation succeeds.
    fn do_move(
        &mut self,
        source: &MoveEndpoint,
        destination: &MoveEndpoint,
        moving: Item,
        split: Option<u32>,
        dest_item: Option<Item>,
    ) -> Result<(), Rejection> {
        let swap = dest_item.is_some();
        let source_addr = self.named(source)?;
        let dest_addr = destination.named_address();

        // A full move frees its source slot; a split leaves the remainder there.
        let dest_exclude = split.map(|_| source_addr);
        let dest_reservation = self.can_store(destination, &moving, swap, dest_exclude)?;
        let source_reservation = match &dest_item {
            Some(item) => Some(self.can_store(source, item, true, dest_addr)?),
            None => None,
        };

        self.log_event(destination, source, &moving, moving.count);
        if let Some(item) = &dest_item {
            self.log_event(source, destination, item, item.count);
        }

        self.remove_item(source, destination, split)?;
        if swap {
            self.remove_item(destination, source, None)?;
        }

        self.store_item(destination, moving, split.is_some(), dest_reservation);
        if let (Some(item), Some(reservation)) = (dest_item, source_reservation) {
            self.store_item(source, item, false, reservation);
        }
        Ok(())
    }

    fn check_endpoint(&self, endpoint: &MoveEndpoint) -> Result<(), Rejection> {
        match endpoint {
            MoveEndpoint::Bank { tab, slot } => {
                if !self.ctx.storage.is_purchased(*tab) {
                    return Err(Rejection::TabNotPurchased);
                }
                if slot.is_some_and(|s| !self.ctx.storage.is_valid_slot(s)) {
                    return Err(Rejection::InvalidSlot);
                }
            }
            MoveEndpoint::Inventory { container, slot } => {
                let size = self
                    .ctx
                    .character
                    .inventory
                    .container_size(*container)
                    .ok_or(Rejection::InvalidSlot)?;
                if slot.is_some_and(|s| s.0 >= size) {
                    return Err(Rejection::InvalidSlot);
                }
            }
        }
        Ok(())
    }

    fn named(&self, endpoint: &MoveEndpoint) -> Result<SlotAddress, Rejection> {
        endpoint.named_address().ok_or(Rejection::InvalidSlot)
    }

    fn slot_count(&self, endpoint: &MoveEndpoint) -> u16 {
        match endpoint {
            MoveEndpoint::Bank { .. } => self.ctx.storage.slots_per_tab(),
            MoveEndpoint::Inventory { container, .. } => self
                .ctx
                .character
                .inventory
                .container_size(*container)
                .map(u16::from)
                .unwrap_or(0),
        }
    }

    /// Current content of a slot, staged changes included
    fn item_at(&self, addr: SlotAddress) -> Option<Item> {
        if let Some(staged) = self.overlay.get(&addr) {
            return staged.clone();
        }
        match addr {
            SlotAddress::Bank(tab, slot) => self.ctx.storage.get_item(tab, slot).cloned(),
            SlotAddress::Inventory(container, slot) => {
                self.ctx.character.inventory.get(container, slot).cloned()
            }
        }
    }

    fn occupant(&self, endpoint: &MoveEndpoint) -> Option<Item> {
        endpoint.named_address().and_then(|addr| self.item_at(addr))
    }

    /// The item at a named endpoint, checked for leaving it
    fn init_item(&self, endpoint: &MoveEndpoint) -> Result<Item, Rejection> {
        let item = self.occupant(endpoint).ok_or(Rejection::ItemNotFound)?;
        if let MoveEndpoint::Inventory { .. } = endpoint {
            if item.is_not_empty_bag() {
                return Err(Rejection::NotEmptyBag);
            }
            if item.soulbound {
                return Err(Rejection::SoulboundItem);
            }
        }
        Ok(item)
    }

    fn has_store_rights(
        &self,
        endpoint: &MoveEndpoint,
        other: &MoveEndpoint,
    ) -> Result<(), Rejection> {
        let MoveEndpoint::Bank { tab, .. } = endpoint else {
            return Ok(());
        };
        if endpoint.same_bank_tab(other)
            || self
                .ctx
                .rights
                .has_right(self.ctx.rank, *tab, BankTabRights::DEPOSIT_ITEM)
        {
            return Ok(());
        }
        Err(Rejection::PermissionDenied)
    }

    fn has_withdraw_rights(
        &self,
        endpoint: &MoveEndpoint,
        other: &MoveEndpoint,
    ) -> Result<(), Rejection> {
        let MoveEndpoint::Bank { tab, .. } = endpoint else {
            return Ok(());
        };
        if endpoint.same_bank_tab(other) {
            return Ok(());
        }
        let remaining =
            self.ctx
                .quotas
                .remaining_slots(self.ctx.actor, self.ctx.rank, *tab, self.ctx.rights);
        if !remaining.is_exhausted() {
            return Ok(());
        }
        if self
            .ctx
            .rights
            .has_right(self.ctx.rank, *tab, BankTabRights::VIEW_TAB)
        {
            Err(Rejection::QuotaExceeded)
        } else {
            Err(Rejection::PermissionDenied)
        }
    }

    /// Reserve room for `item` at `endpoint`.
    ///
    /// A named slot is tried first, then (for stackable items) matching
    /// stacks in ascending order, then empty slots in ascending order.
    /// The slot holding `item` itself counts as empty; `exclude` is never
    /// chosen by the scans.
    fn can_store(
        &self,
        endpoint: &MoveEndpoint,
        item: &Item,
        swap: bool,
        exclude: Option<SlotAddress>,
    ) -> Result<Reservation, Rejection> {
        let full = match endpoint {
            MoveEndpoint::Bank { tab, .. } => {
                if item.soulbound {
                    return Err(Rejection::SoulboundItem);
                }
                if item.has_duration() {
                    return Err(Rejection::DurationLimited);
                }
                if !self.ctx.storage.is_purchased(*tab) {
                    return Err(Rejection::TabNotPurchased);
                }
                Rejection::BankFull
            }
            MoveEndpoint::Inventory { .. } => Rejection::InventoryFull,
        };

        let mut count = item.count;
        let mut reserved = Reservation::new();
        let named = endpoint.named_address();

        if let Some(addr) = named {
            let occupant = self
                .item_at(addr)
                .filter(|dest| !swap && dest.id != item.id);
            if !reserve_space(addr, occupant.as_ref(), item, &mut count, &mut reserved) {
                return Err(Rejection::StackFull);
            }
            if count == 0 {
                return Ok(reserved);
            }
        }

        let candidates: Vec<SlotAddress> = (0..self.slot_count(endpoint))
            .map(|i| endpoint.address(SlotId(i as u8)))
            .filter(|addr| Some(*addr) != named && Some(*addr) != exclude)
            .collect();

        if item.is_stackable() {
            for addr in &candidates {
                let Some(dest) = self.item_at(*addr).filter(|dest| dest.id != item.id) else {
                    continue;
                };
                reserve_space(*addr, Some(&dest), item, &mut count, &mut reserved);
                if count == 0 {
                    return Ok(reserved);
                }
            }
        }

        for addr in &candidates {
            let empty = self.item_at(*addr).map_or(true, |dest| dest.id == item.id);
            if !empty {
                continue;
            }
            reserve_space(*addr, None, item, &mut count, &mut reserved);
            if count == 0 {
                return Ok(reserved);
            }
        }

        Err(full)
    }

    /// Take the item (or `split` of it) off `endpoint`.
    fn remove_item(
        &mut self,
        endpoint: &MoveEndpoint,
        other: &MoveEndpoint,
        split: Option<u32>,
    ) -> Result<(), Rejection> {
        let addr = self.named(endpoint)?;
        let remaining = match split {
            Some(amount) => self.item_at(addr).map(|mut item| {
                item.count -= amount;
                item
            }),
            None => None,
        };
        self.overlay.insert(addr, remaining);

        if let MoveEndpoint::Bank { tab, .. } = endpoint {
            if !endpoint.same_bank_tab(other) {
                self.count_withdrawal(*tab);
            }
        }
        Ok(())
    }

    /// Spend one withdrawal slot; the guild master's withdrawals are not counted.
    fn count_withdrawal(&mut self, tab: TabId) {
        if self.ctx.rank.is_guild_master() {
            return;
        }
        let quota = self.ctx.rights.tab_rights(self.ctx.rank, tab).slots_per_day;
        if self.usage.slots_used(tab) < quota {
            self.usage.record(QuotaSlot::Tab(tab), 1);
            self.usage_changed = true;
        }
    }

    /// Spread `item` over its reservation. Every slot but the last receives
    /// a copy; the last receives the item itself, or absorbs it when merging.
    fn store_item(
        &mut self,
        endpoint: &MoveEndpoint,
        item: Item,
        fresh: bool,
        reservation: Reservation,
    ) {
        let owner = match endpoint {
            MoveEndpoint::Bank { .. } => None,
            MoveEndpoint::Inventory { .. } => Some(self.ctx.actor.clone()),
        };
        let last = reservation.len().saturating_sub(1);
        for (i, (addr, amount)) in reservation.into_iter().enumerate() {
            let placed = match self.item_at(addr) {
                Some(mut existing) => {
                    existing.count += amount;
                    if i == last && !fresh {
                        self.destroyed.push(item.id.clone());
                    }
                    existing
                }
                None if i == last => Item {
                    count: amount,
                    owner: owner.clone(),
                    ..item.clone()
                },
                None => Item {
                    owner: owner.clone(),
                    ..item.split_off(amount)
                },
            };
            debug!(slot = %addr, entry = placed.entry, count = placed.count, "Slot staged");
            self.overlay.insert(addr, Some(placed));
        }
    }

    /// Log `count` of `item` arriving at `endpoint` from `other`.
    fn log_event(&mut self, endpoint: &MoveEndpoint, other: &MoveEndpoint, item: &Item, count: u32) {
        let (log, event, dest_tab) = match (endpoint, other) {
            (MoveEndpoint::Inventory { .. }, MoveEndpoint::Bank { tab, .. }) => {
                (BankLogId::Tab(*tab), BankEventType::WithdrawItem, None)
            }
            (MoveEndpoint::Bank { tab, .. }, MoveEndpoint::Inventory { .. }) => {
                (BankLogId::Tab(*tab), BankEventType::DepositItem, None)
            }
            (MoveEndpoint::Bank { tab, .. }, MoveEndpoint::Bank { tab: from, .. }) if tab != from => {
                (BankLogId::Tab(*from), BankEventType::MoveItem, Some(*tab))
            }
            _ => return,
        };
        let Some(id) = self.take_log_id(log) else {
            return;
        };
        let mut entry = BankEventEntry::item(
            self.ctx.guild.clone(),
            event,
            self.ctx.actor.clone(),
            item.entry,
            count,
        );
        entry.id = id;
        if let Some(tab) = dest_tab {
            entry = entry.with_dest_tab(tab);
        }
        self.events.push((log, entry));
    }

    /// Pre-assign the id the next append to `log` will receive
    fn take_log_id(&mut self, log: BankLogId) -> Option<u32> {
        let book = self.ctx.logs.bank_log(log)?;
        let id = match self.next_ids.get(&log) {
            Some(id) => *id,
            None => book.next_id(),
        };
        self.next_ids.insert(log, book.id_after(id));
        Some(id)
    }
}

/// Reserve as much of `count` as fits at `addr`.
///
/// Fails when `dest` holds a different entry or a full stack.
fn reserve_space(
    addr: SlotAddress,
    dest: Option<&Item>,
    item: &Item,
    count: &mut u32,
    reserved: &mut Reservation,
) -> bool {
    let mut required = item.max_stack;
    if let Some(dest) = dest {
        if dest.entry != item.entry || dest.count >= item.max_stack {
            return false;
        }
        required -= dest.count;
    }
    let required = required.min(*count);
    if !reserved.iter().any(|(a, _)| *a == addr) {
        reserved.push((addr, required));
        *count -= required;
    }
    true
}

/// What a committed move changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveOutcome {
    /// Every slot whose content changed
    pub touched: Vec<SlotAddress>,
    pub swapped: bool,
    pub split: bool,
    pub logged: usize,
}

impl MoveOutcome {
    /// Bank tabs among the touched slots
    pub fn touched_tabs(&self) -> Vec<TabId> {
        self.touched
            .iter()
            .filter_map(SlotAddress::tab)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// A fully validated move, not yet committed
#[derive(Clone, Debug)]
pub struct StagedMove {
    slots: BTreeMap<SlotAddress, Option<Item>>,
    destroyed: Vec<ItemId>,
    usage: Option<WithdrawalUsage>,
    events: Vec<(BankLogId, BankEventEntry)>,
    swapped: bool,
    split: bool,
}

impl StagedMove {
    /// Final content of every touched slot
    pub fn slots(&self) -> &BTreeMap<SlotAddress, Option<Item>> {
        &self.slots
    }

    pub fn events(&self) -> impl Iterator<Item = &BankEventEntry> {
        self.events.iter().map(|(_, entry)| entry)
    }

    pub fn is_swap(&self) -> bool {
        self.swapped
    }

    /// One write per touched record: slots, merged-away items, the actor's
    /// usage counters and the new log entries with their cursors.
    pub fn to_batch(&self, guild: &GuildId, actor: &MemberId) -> StorageResult<WriteBatch> {
        let mut batch = WriteBatch::new(guild.clone());
        for (addr, item) in &self.slots {
            match addr {
                SlotAddress::Bank(tab, slot) => batch.put_bank_slot(*tab, *slot, item.as_ref())?,
                SlotAddress::Inventory(container, slot) => {
                    batch.put_inventory_slot(actor, *container, *slot, item.as_ref())?
                }
            }
        }
        for id in &self.destroyed {
            batch.delete(RecordKey::ItemInstance { item: id.clone() });
        }
        if let Some(usage) = &self.usage {
            batch.put_usage(actor, usage)?;
        }
        batch.put_bank_events(&self.events)?;
        Ok(batch)
    }

    /// Apply to memory. Call only once the batch has committed.
    pub fn apply(
        self,
        actor: &MemberId,
        storage: &mut BankStorage,
        quotas: &mut WithdrawalQuotaTracker,
        logs: &mut BankLogBook,
        character: &mut Character,
    ) -> Result<MoveOutcome, Rejection> {
        let touched: Vec<SlotAddress> = self.slots.keys().copied().collect();
        for (addr, item) in self.slots {
            match addr {
                SlotAddress::Bank(tab, slot) => {
                    storage.set_item(tab, slot, item)?;
                }
                SlotAddress::Inventory(container, slot) => {
                    character.inventory.set(container, slot, item)?;
                }
            }
        }
        if let Some(usage) = self.usage {
            quotas.restore(actor.clone(), usage);
        }
        let logged = self.events.len();
        for (log, entry) in self.events {
            if let Some(book) = logs.bank_log_mut(log) {
                book.append(entry);
            }
        }
        Ok(MoveOutcome {
            touched,
            swapped: self.swapped,
            split: self.split,
            logged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guild_bank_types::{
        BankEventPayload, ContainerId, TabRightsAndSlots, BACKPACK,
    };

    struct Fixture {
        guild: GuildId,
        actor: MemberId,
        rank: RankId,
        storage: BankStorage,
        rights: RightsMatrix,
        quotas: WithdrawalQuotaTracker,
        logs: BankLogBook,
        character: Character,
    }

    impl Fixture {
        fn new(rank: RankId) -> Self {
            let mut storage = BankStorage::new(6, 8);
            storage.create_tab().unwrap();
            storage.create_tab().unwrap();
            let mut rights = RightsMatrix::with_default_ranks();
            rights.ensure_tabs(2);
            let mut logs = BankLogBook::new(10, 10);
            logs.ensure_tab_logs(2);
            let actor = MemberId::new("actor");
            Self {
                guild: GuildId::new("guild"),
                character: Character::new(actor.clone()),
                actor,
                rank,
                storage,
                rights,
                quotas: WithdrawalQuotaTracker::new(),
                logs,
            }
        }

        fn grant(&mut self, tab: u8, rights: BankTabRights, slots: u32) {
            self.rights
                .set_tab_rights(self.rank, TabId(tab), TabRightsAndSlots::new(rights, slots), 2)
                .unwrap();
        }

        fn ctx(&self) -> MoveContext<'_> {
            MoveContext {
                guild: &self.guild,
                actor: &self.actor,
                rank: self.rank,
                storage: &self.storage,
                rights: &self.rights,
                quotas: &self.quotas,
                logs: &self.logs,
                character: &self.character,
            }
        }

        fn plan(&self, request: MoveRequest) -> Result<StagedMove, Rejection> {
            MoveOrchestrator::new(self.ctx()).plan(&request)
        }

        fn run(&mut self, request: MoveRequest) -> Result<MoveOutcome, Rejection> {
            let staged = self.plan(request)?;
            staged.apply(
                &self.actor,
                &mut self.storage,
                &mut self.quotas,
                &mut self.logs,
                &mut self.character,
            )
        }

        fn bank(&mut self, tab: u8, slot: u8, item: Item) {
            self.storage
                .set_item(TabId(tab), SlotId(slot), Some(item))
                .unwrap();
        }

        fn bag(&mut self, slot: u8, item: Item) {
            self.character
                .inventory
                .set(BACKPACK, SlotId(slot), Some(item))
                .unwrap();
        }

        fn count_at(&self, tab: u8, slot: u8) -> Option<u32> {
            self.storage
                .get_item(TabId(tab), SlotId(slot))
                .map(|i| i.count)
        }
    }

    fn deposit(bag_slot: u8, tab: u8) -> MoveRequest {
        MoveRequest::new(
            MoveEndpoint::inventory(BACKPACK, SlotId(bag_slot)),
            MoveEndpoint::bank_any(TabId(tab)),
        )
    }

    #[test]
    fn test_deposit_merges_into_existing_stack() {
        let mut f = Fixture::new(RankId(3));
        f.grant(0, BankTabRights::DEPOSIT_ITEM, 0);
        f.bank(0, 0, Item::new(100, 10, 20));
        f.bag(0, Item::new(100, 5, 20));

        let outcome = f.run(deposit(0, 0)).unwrap();

        assert_eq!(f.count_at(0, 0), Some(15));
        assert_eq!(f.storage.tab(TabId(0)).unwrap().items().count(), 1);
        assert!(f.character.inventory.get(BACKPACK, SlotId(0)).is_none());
        assert_eq!(outcome.logged, 1);
        let log = f.logs.bank_log(BankLogId::Tab(TabId(0))).unwrap();
        let entry = log.newest().unwrap();
        assert_eq!(entry.event, BankEventType::DepositItem);
        assert_eq!(entry.payload, BankEventPayload::Item { entry: 100, count: 5 });
    }

    #[test]
    fn test_merge_overflow_spills_into_empty_slot() {
        let mut f = Fixture::new(RankId(0));
        f.bank(0, 2, Item::new(100, 18, 20));
        let moving = Item::new(100, 5, 20);
        let moving_id = moving.id.clone();
        f.bag(0, moving);

        f.run(deposit(0, 0)).unwrap();

        assert_eq!(f.count_at(0, 2), Some(20));
        let spilled = f.storage.get_item(TabId(0), SlotId(0)).unwrap();
        assert_eq!(spilled.count, 3);
        assert_eq!(spilled.id, moving_id);
        assert!(spilled.owner.is_none());
    }

    #[test]
    fn test_soulbound_deposit_rejected_even_for_guild_master() {
        let mut f = Fixture::new(RankId(0));
        f.bag(0, Item::new(100, 1, 1).with_soulbound(true));
        assert_eq!(f.plan(deposit(0, 0)).unwrap_err(), Rejection::SoulboundItem);
    }

    #[test]
    fn test_duration_limited_rejected() {
        let mut f = Fixture::new(RankId(0));
        f.bag(0, Item::new(100, 1, 1).with_duration(3600));
        assert_eq!(f.plan(deposit(0, 0)).unwrap_err(), Rejection::DurationLimited);
    }

    #[test]
    fn test_non_empty_bag_rejected() {
        let mut f = Fixture::new(RankId(0));
        f.bag(0, Item::new(100, 1, 1).with_bag_contents(2));
        assert_eq!(f.plan(deposit(0, 0)).unwrap_err(), Rejection::NotEmptyBag);
    }

    #[test]
    fn test_deposit_without_rights_denied() {
        let mut f = Fixture::new(RankId(3));
        f.bag(0, Item::new(100, 1, 1));
        assert_eq!(f.plan(deposit(0, 0)).unwrap_err(), Rejection::PermissionDenied);
    }

    #[test]
    fn test_full_tab_rejected_and_unchanged() {
        let mut f = Fixture::new(RankId(0));
        for slot in 0..8 {
            f.bank(0, slot, Item::new(200 + slot as u32, 1, 1));
        }
        f.bag(0, Item::new(100, 1, 1));
        assert_eq!(f.plan(deposit(0, 0)).unwrap_err(), Rejection::BankFull);
        assert!(f.character.inventory.get(BACKPACK, SlotId(0)).is_some());
    }

    #[test]
    fn test_missing_source_item() {
        let f = Fixture::new(RankId(0));
        assert_eq!(f.plan(deposit(0, 0)).unwrap_err(), Rejection::ItemNotFound);
    }

    #[test]
    fn test_invalid_requests() {
        let mut f = Fixture::new(RankId(0));
        f.bank(0, 0, Item::new(100, 1, 1));
        let same = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::bank(TabId(0), SlotId(0)),
        );
        assert_eq!(f.plan(same).unwrap_err(), Rejection::InvalidSlot);

        let out_of_range = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::bank(TabId(0), SlotId(8)),
        );
        assert_eq!(f.plan(out_of_range).unwrap_err(), Rejection::InvalidSlot);

        let unpurchased = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::bank_any(TabId(2)),
        );
        assert_eq!(f.plan(unpurchased).unwrap_err(), Rejection::TabNotPurchased);

        let no_container = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::inventory_any(ContainerId(4)),
        );
        assert_eq!(f.plan(no_container).unwrap_err(), Rejection::InvalidSlot);

        let inventory_only = MoveRequest::new(
            MoveEndpoint::inventory(BACKPACK, SlotId(0)),
            MoveEndpoint::inventory(BACKPACK, SlotId(1)),
        );
        assert_eq!(f.plan(inventory_only).unwrap_err(), Rejection::InvalidSlot);
    }

    #[test]
    fn test_split_creates_new_identity() {
        let mut f = Fixture::new(RankId(0));
        let original = Item::new(100, 10, 20);
        let original_id = original.id.clone();
        f.bank(0, 0, original);

        let request = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::bank(TabId(0), SlotId(5)),
        )
        .with_split(4);
        let outcome = f.run(request).unwrap();

        assert!(outcome.split);
        let source = f.storage.get_item(TabId(0), SlotId(0)).unwrap();
        assert_eq!((source.id.clone(), source.count), (original_id.clone(), 6));
        let split = f.storage.get_item(TabId(0), SlotId(5)).unwrap();
        assert_eq!(split.count, 4);
        assert_ne!(split.id, original_id);
    }

    #[test]
    fn test_split_into_any_slot_skips_source() {
        let mut f = Fixture::new(RankId(0));
        f.bank(0, 0, Item::new(100, 10, 20));
        let request = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::bank_any(TabId(0)),
        )
        .with_split(3);
        f.run(request).unwrap();
        assert_eq!(f.count_at(0, 0), Some(7));
        assert_eq!(f.count_at(0, 1), Some(3));
    }

    #[test]
    fn test_split_of_whole_stack_is_full_move() {
        let mut f = Fixture::new(RankId(0));
        let item = Item::new(100, 10, 20);
        let id = item.id.clone();
        f.bank(0, 0, item);
        let request = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::bank(TabId(0), SlotId(3)),
        )
        .with_split(10);
        let outcome = f.run(request).unwrap();
        assert!(!outcome.split);
        assert!(f.storage.get_item(TabId(0), SlotId(0)).is_none());
        assert_eq!(f.storage.get_item(TabId(0), SlotId(3)).unwrap().id, id);
    }

    #[test]
    fn test_bad_split_amounts() {
        let mut f = Fixture::new(RankId(0));
        f.bank(0, 0, Item::new(100, 10, 20));
        let request = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::bank(TabId(0), SlotId(3)),
        );
        assert_eq!(
            f.plan(request.with_split(0)).unwrap_err(),
            Rejection::InvalidSplitAmount
        );
        assert_eq!(
            f.plan(request.with_split(11)).unwrap_err(),
            Rejection::InvalidSplitAmount
        );
    }

    #[test]
    fn test_split_into_other_entry_is_stack_full() {
        let mut f = Fixture::new(RankId(0));
        f.bank(0, 0, Item::new(100, 10, 20));
        f.bank(0, 1, Item::new(200, 1, 1));
        let request = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::bank(TabId(0), SlotId(1)),
        )
        .with_split(2);
        assert_eq!(f.plan(request).unwrap_err(), Rejection::StackFull);
    }

    #[test]
    fn test_same_tab_swap_is_not_logged_or_counted() {
        let mut f = Fixture::new(RankId(3));
        let a = Item::new(100, 1, 1);
        let b = Item::new(200, 1, 1);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        f.bank(0, 0, a);
        f.bank(0, 1, b);

        let request = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::bank(TabId(0), SlotId(1)),
        );
        let outcome = f.run(request).unwrap();

        assert!(outcome.swapped);
        assert_eq!(outcome.logged, 0);
        assert_eq!(f.storage.get_item(TabId(0), SlotId(0)).unwrap().id, b_id);
        assert_eq!(f.storage.get_item(TabId(0), SlotId(1)).unwrap().id, a_id);
        assert!(f.quotas.usage(&f.actor).is_zero());
    }

    #[test]
    fn test_withdraw_counts_quota_and_logs() {
        let mut f = Fixture::new(RankId(3));
        f.grant(0, BankTabRights::VIEW_TAB, 1);
        f.bank(0, 0, Item::new(100, 3, 20));
        f.bank(0, 1, Item::new(100, 3, 20));

        let withdraw = |slot: u8| {
            MoveRequest::new(
                MoveEndpoint::bank(TabId(0), SlotId(slot)),
                MoveEndpoint::inventory_any(BACKPACK),
            )
        };
        f.run(withdraw(0)).unwrap();
        let taken = f.character.inventory.get(BACKPACK, SlotId(0)).unwrap();
        assert_eq!(taken.owner.as_ref(), Some(&f.actor));
        assert_eq!(f.quotas.usage(&f.actor).slots_used(TabId(0)), 1);
        let entry = f
            .logs
            .bank_log(BankLogId::Tab(TabId(0)))
            .unwrap()
            .newest()
            .unwrap()
            .clone();
        assert_eq!(entry.event, BankEventType::WithdrawItem);

        assert_eq!(f.plan(withdraw(1)).unwrap_err(), Rejection::QuotaExceeded);
    }

    #[test]
    fn test_withdraw_without_view_denied() {
        let mut f = Fixture::new(RankId(3));
        f.bank(0, 0, Item::new(100, 3, 20));
        let request = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::inventory_any(BACKPACK),
        );
        assert_eq!(f.plan(request).unwrap_err(), Rejection::PermissionDenied);
    }

    #[test]
    fn test_cross_tab_move_logs_in_source_tab() {
        let mut f = Fixture::new(RankId(0));
        f.bank(0, 0, Item::new(100, 3, 20));
        let request = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::bank_any(TabId(1)),
        );
        let outcome = f.run(request).unwrap();
        assert_eq!(outcome.touched_tabs(), vec![TabId(0), TabId(1)]);
        let entry = f
            .logs
            .bank_log(BankLogId::Tab(TabId(0)))
            .unwrap()
            .newest()
            .unwrap();
        assert_eq!(entry.event, BankEventType::MoveItem);
        assert_eq!(entry.dest_tab, Some(TabId(1)));
        assert!(f.logs.bank_log(BankLogId::Tab(TabId(1))).unwrap().is_empty());
    }

    #[test]
    fn test_bank_inventory_swap_logs_both_directions_in_one_log() {
        let mut f = Fixture::new(RankId(0));
        f.bank(0, 0, Item::new(100, 1, 1));
        f.bag(3, Item::new(200, 1, 1));
        let request = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::inventory(BACKPACK, SlotId(3)),
        );
        let staged = f.plan(request).unwrap();
        assert!(staged.is_swap());
        let ids: Vec<u32> = staged.events().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 1]);

        let batch = staged.to_batch(&f.guild, &f.actor).unwrap();
        let cursors = batch
            .ops
            .iter()
            .filter(|op| matches!(op.key(), RecordKey::BankEventLogCursor { .. }))
            .count();
        assert_eq!(cursors, 1);

        staged
            .apply(
                &f.actor,
                &mut f.storage,
                &mut f.quotas,
                &mut f.logs,
                &mut f.character,
            )
            .unwrap();
        assert_eq!(f.storage.get_item(TabId(0), SlotId(0)).unwrap().entry, 200);
        assert_eq!(
            f.character.inventory.get(BACKPACK, SlotId(3)).unwrap().entry,
            100
        );
    }

    #[test]
    fn test_swap_with_soulbound_inventory_item_rejected() {
        let mut f = Fixture::new(RankId(0));
        f.bank(0, 0, Item::new(100, 1, 1));
        f.bag(3, Item::new(200, 1, 1).with_soulbound(true));
        let request = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::inventory(BACKPACK, SlotId(3)),
        );
        assert_eq!(f.plan(request).unwrap_err(), Rejection::SoulboundItem);
    }

    fn tab_to_tab_swap() -> MoveRequest {
        MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::bank(TabId(1), SlotId(0)),
        )
    }

    #[test]
    fn test_swap_needs_deposit_right_on_source_tab() {
        let mut f = Fixture::new(RankId(2));
        f.grant(0, BankTabRights::VIEW_TAB, 5);
        f.grant(1, BankTabRights::DEPOSIT_ITEM, 5);
        f.bank(0, 0, Item::new(100, 1, 1));
        f.bank(1, 0, Item::new(200, 1, 1));

        assert_eq!(f.run(tab_to_tab_swap()).unwrap_err(), Rejection::PermissionDenied);
        assert_eq!(f.storage.get_item(TabId(0), SlotId(0)).unwrap().entry, 100);
        assert_eq!(f.storage.get_item(TabId(1), SlotId(0)).unwrap().entry, 200);
        assert!(f.quotas.usage(&f.actor).is_zero());
        assert!(f.logs.bank_log(BankLogId::Tab(TabId(0))).unwrap().is_empty());
    }

    #[test]
    fn test_swap_needs_withdraw_quota_on_destination_tab() {
        let mut f = Fixture::new(RankId(2));
        f.grant(0, BankTabRights::DEPOSIT_ITEM, 5);
        f.grant(1, BankTabRights::DEPOSIT_ITEM, 1);
        let actor = f.actor.clone();
        f.quotas.record_usage(&actor, QuotaSlot::Tab(TabId(1)), 1);
        f.bank(0, 0, Item::new(100, 1, 1));
        f.bank(1, 0, Item::new(200, 1, 1));

        assert_eq!(f.run(tab_to_tab_swap()).unwrap_err(), Rejection::QuotaExceeded);
        assert_eq!(f.storage.get_item(TabId(0), SlotId(0)).unwrap().entry, 100);
        assert_eq!(f.storage.get_item(TabId(1), SlotId(0)).unwrap().entry, 200);
        let usage = f.quotas.usage(&actor);
        assert_eq!(usage.slots_used(TabId(0)), 0);
        assert_eq!(usage.slots_used(TabId(1)), 1);
    }

    #[test]
    fn test_overflowing_merge_refills_freed_source_slot() {
        let mut f = Fixture::new(RankId(0));
        let moving = Item::new(100, 10, 20);
        let moving_id = moving.id.clone();
        f.bank(0, 0, moving);
        f.bank(0, 1, Item::new(100, 15, 20));

        let request = MoveRequest::new(
            MoveEndpoint::bank(TabId(0), SlotId(0)),
            MoveEndpoint::bank(TabId(0), SlotId(1)),
        );
        let outcome = f.run(request).unwrap();

        assert!(!outcome.swapped);
        assert_eq!(f.count_at(0, 1), Some(20));
        let remainder = f.storage.get_item(TabId(0), SlotId(0)).unwrap();
        assert_eq!((remainder.id.clone(), remainder.count), (moving_id, 5));
        assert_eq!(f.count_at(0, 2), None);
    }

    #[test]
    fn test_merge_batch_deletes_absorbed_item() {
        let mut f = Fixture::new(RankId(0));
        f.bank(0, 0, Item::new(100, 10, 20));
        let moving = Item::new(100, 5, 20);
        let moving_id = moving.id.clone();
        f.bag(0, moving);
        let staged = f.plan(deposit(0, 0)).unwrap();
        let batch = staged.to_batch(&f.guild, &f.actor).unwrap();
        assert!(batch.ops.iter().any(|op| matches!(
            op,
            guild_bank_storage::WriteOp::Delete { key: RecordKey::ItemInstance { item } } if *item == moving_id
        )));
    }
}
