//! Fixed limits of the bank model

/// Upper bound of the guild bank balance (copper)
pub const BANK_MONEY_LIMIT: u64 = i64::MAX as u64;

/// Most money a character can carry (copper)
pub const MAX_CHARACTER_MONEY: u64 = i32::MAX as u64;

/// Stored per-day slot quota meaning "no limit"
pub const UNLIMITED_SLOTS: u32 = u32::MAX;

/// Stored per-day money quota meaning "no limit"
pub const UNLIMITED_MONEY: u64 = u64::MAX;

/// Longest tab text kept, in characters
pub const MAX_TAB_TEXT_LEN: usize = 500;

/// Hard ceiling on slots per tab; slot ids are `u8`
pub const MAX_SLOTS_PER_TAB: u16 = 255;
