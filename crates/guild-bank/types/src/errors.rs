//! Rejection reasons
//!
//! Every validation failure is reported as a [`Rejection`] before any
//! state changes; the caller shows the reason and nothing else happens.

/// Why a bank request was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Rejection {
    #[error("Permission denied")]
    PermissionDenied,

    #[error("Item not found")]
    ItemNotFound,

    #[error("Invalid slot")]
    InvalidSlot,

    #[error("Soulbound items cannot be stored in the guild bank")]
    SoulboundItem,

    #[error("Items with a limited duration cannot be stored in the guild bank")]
    DurationLimited,

    #[error("Bank tab not purchased")]
    TabNotPurchased,

    #[error("Item cannot stack in the chosen slot")]
    StackFull,

    #[error("Guild bank is full")]
    BankFull,

    #[error("Daily withdrawal limit reached")]
    QuotaExceeded,

    #[error("Not enough money")]
    InsufficientFunds,

    #[error("Rank limit reached")]
    AlreadyAtRankLimit,

    #[error("Only empty bags can be stored")]
    NotEmptyBag,

    #[error("Inventory is full")]
    InventoryFull,

    #[error("Invalid split amount")]
    InvalidSplitAmount,

    #[error("All bank tabs are already purchased")]
    AlreadyMaxTabs,

    #[error("Money cap exceeded")]
    MoneyCapExceeded,

    #[error("Not a guild member")]
    NotAMember,

    #[error("Rank not found")]
    RankNotFound,

    #[error("Rank minimum reached")]
    AlreadyAtRankMinimum,

    #[error("Already a guild member")]
    AlreadyMember,

    #[error("Cannot target yourself")]
    CannotTargetSelf,

    #[error("Target rank is too high")]
    RankTooHigh,

    #[error("Target rank is too low")]
    RankTooLow,
}
