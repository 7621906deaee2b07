//! Event log: bounded audit logs with wrapping ids
//!
//! An [`EventLog`] is a fixed-capacity ring: appending to a full log
//! overwrites the oldest entry. Every entry gets the id
//! `(last_id + 1) % capacity`, so the id of a new entry is also the id of
//! the entry it evicts and persisted rows can be overwritten in place.
//! The last assigned id is kept separately and persisted as a cursor, so
//! numbering and order survive a restart.

use guild_bank_types::{BankEventEntry, BankLogId, GuildEventEntry, LogRecord, TabId};
use std::collections::HashMap;

/// Fixed-capacity ring of log entries, oldest first
#[derive(Clone, Debug)]
pub struct EventLog<E> {
    slots: Vec<Option<E>>,
    /// Index of the oldest entry
    head: usize,
    len: usize,
    last_id: Option<u32>,
}

impl<E: LogRecord> EventLog<E> {
    /// A log holding at most `capacity` entries (at least one)
    pub fn new(capacity: u32) -> Self {
        let capacity = capacity.max(1) as usize;
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
            last_id: None,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Id of the most recent append, if any
    pub fn last_id(&self) -> Option<u32> {
        self.last_id
    }

    /// Id the next append will receive
    pub fn next_id(&self) -> u32 {
        self.last_id.map(|id| self.id_after(id)).unwrap_or(0)
    }

    /// Id that follows `id` in this log's numbering
    pub fn id_after(&self, id: u32) -> u32 {
        (id + 1) % self.capacity()
    }

    /// Append an entry, evicting the oldest when full. Returns the assigned id.
    pub fn append(&mut self, mut entry: E) -> u32 {
        let id = self.next_id();
        entry.set_log_id(id);
        let capacity = self.slots.len();
        if self.len == capacity {
            self.slots[self.head] = Some(entry);
            self.head = (self.head + 1) % capacity;
        } else {
            self.slots[(self.head + self.len) % capacity] = Some(entry);
            self.len += 1;
        }
        self.last_id = Some(id);
        id
    }

    /// Rebuild from persisted entries and the persisted last id.
    ///
    /// Entries are ordered by walking the id ring backwards from `last_id`;
    /// ids outside the ring are dropped.
    pub fn restore(&mut self, last_id: u32, entries: impl IntoIterator<Item = E>) {
        self.clear();
        let capacity = self.capacity();
        if last_id >= capacity {
            return;
        }
        let mut by_id: HashMap<u32, E> = entries
            .into_iter()
            .filter(|e| e.log_id() < capacity)
            .map(|e| (e.log_id(), e))
            .collect();
        let mut ordered = Vec::with_capacity(by_id.len());
        for step in 1..=capacity {
            let id = (last_id + step) % capacity;
            if let Some(entry) = by_id.remove(&id) {
                ordered.push(entry);
            }
        }
        for entry in ordered {
            self.slots[self.len] = Some(entry);
            self.len += 1;
        }
        self.last_id = Some(last_id);
    }

    /// Entries oldest first; reverse for newest first
    pub fn entries(&self) -> Iter<'_, E> {
        Iter {
            log: self,
            front: 0,
            back: self.len,
        }
    }

    pub fn newest(&self) -> Option<&E> {
        self.entries().next_back()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
        self.last_id = None;
    }

    fn get(&self, offset: usize) -> Option<&E> {
        if offset >= self.len {
            return None;
        }
        self.slots[(self.head + offset) % self.slots.len()].as_ref()
    }
}

/// Iterator over a log's entries, oldest first
pub struct Iter<'a, E> {
    log: &'a EventLog<E>,
    front: usize,
    back: usize,
}

impl<'a, E: LogRecord> Iterator for Iter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let item = self.log.get(self.front);
        self.front += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.back - self.front;
        (n, Some(n))
    }
}

impl<'a, E: LogRecord> DoubleEndedIterator for Iter<'a, E> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.log.get(self.back)
    }
}

impl<'a, E: LogRecord> ExactSizeIterator for Iter<'a, E> {}

/// All logs of one guild: roster events, one log per tab, and money
#[derive(Clone, Debug)]
pub struct BankLogBook {
    guild: EventLog<GuildEventEntry>,
    tabs: Vec<EventLog<BankEventEntry>>,
    money: EventLog<BankEventEntry>,
    bank_capacity: u32,
}

impl BankLogBook {
    pub fn new(event_capacity: u32, bank_capacity: u32) -> Self {
        Self {
            guild: EventLog::new(event_capacity),
            tabs: Vec::new(),
            money: EventLog::new(bank_capacity),
            bank_capacity,
        }
    }

    pub fn guild_log(&self) -> &EventLog<GuildEventEntry> {
        &self.guild
    }

    pub fn guild_log_mut(&mut self) -> &mut EventLog<GuildEventEntry> {
        &mut self.guild
    }

    pub fn bank_log(&self, log: BankLogId) -> Option<&EventLog<BankEventEntry>> {
        match log {
            BankLogId::Tab(tab) => self.tabs.get(tab.index()),
            BankLogId::Money => Some(&self.money),
        }
    }

    pub fn bank_log_mut(&mut self, log: BankLogId) -> Option<&mut EventLog<BankEventEntry>> {
        match log {
            BankLogId::Tab(tab) => self.tabs.get_mut(tab.index()),
            BankLogId::Money => Some(&mut self.money),
        }
    }

    /// Create logs for every tab below `tabs`
    pub fn ensure_tab_logs(&mut self, tabs: u8) {
        while self.tabs.len() < tabs as usize {
            self.tabs.push(EventLog::new(self.bank_capacity));
        }
    }

    /// Ids of every bank log that exists
    pub fn bank_log_ids(&self) -> Vec<BankLogId> {
        (0..self.tabs.len())
            .map(|i| BankLogId::Tab(TabId(i as u8)))
            .chain(std::iter::once(BankLogId::Money))
            .collect()
    }

    pub fn clear(&mut self) {
        self.guild.clear();
        self.tabs.clear();
        self.money.clear();
    }
}
