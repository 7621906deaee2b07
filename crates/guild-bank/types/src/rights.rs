//! Rights bitmasks
//!
//! Guild-wide rights belong to a rank; bank-tab rights belong to a
//! (rank, tab) pair together with that pair's daily slot quota.

use crate::UNLIMITED_SLOTS;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Guild-wide rights held by a rank.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct GuildRights: u32 {
        const GUILD_CHAT_LISTEN   = 0x0000_0001;
        const GUILD_CHAT_SPEAK    = 0x0000_0002;
        const OFFICER_CHAT_LISTEN = 0x0000_0004;
        const OFFICER_CHAT_SPEAK  = 0x0000_0008;
        const INVITE              = 0x0000_0010;
        const REMOVE              = 0x0000_0020;
        /// Placeholder bit carried by freshly created ranks.
        const EMPTY               = 0x0000_0040;
        const PROMOTE             = 0x0000_0080;
        const DEMOTE              = 0x0000_0100;
        const SET_MOTD            = 0x0000_1000;
        const EDIT_PUBLIC_NOTE    = 0x0000_2000;
        const VIEW_OFFICER_NOTE   = 0x0000_4000;
        const EDIT_OFFICER_NOTE   = 0x0000_8000;
        const MODIFY_GUILD_INFO   = 0x0001_0000;
        const WITHDRAW_GOLD_LOCK  = 0x0002_0000;
        const WITHDRAW_REPAIR     = 0x0004_0000;
        const WITHDRAW_GOLD       = 0x0008_0000;
        const CREATE_GUILD_EVENT  = 0x0010_0000;
        const ALL                 = 0x001D_F1FF;
    }
}

impl GuildRights {
    /// Rights granted to ranks created after the defaults
    pub fn chat() -> Self {
        Self::GUILD_CHAT_LISTEN | Self::GUILD_CHAT_SPEAK
    }

    /// Rights that make the money quota meaningful
    pub fn money_withdrawal() -> Self {
        Self::WITHDRAW_GOLD | Self::WITHDRAW_REPAIR
    }
}

bitflags! {
    /// Rights a rank holds on one bank tab.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct BankTabRights: u8 {
        const VIEW_TAB     = 0x01;
        const PUT_ITEM     = 0x02;
        const UPDATE_TEXT  = 0x04;
        const DEPOSIT_ITEM = Self::VIEW_TAB.bits() | Self::PUT_ITEM.bits();
        const FULL         = 0xFF;
    }
}

/// Rights and daily withdrawal quota of one rank on one tab
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabRightsAndSlots {
    pub rights: BankTabRights,
    /// Stacks a member of the rank may take out of the tab per day
    pub slots_per_day: u32,
}

impl TabRightsAndSlots {
    pub fn new(rights: BankTabRights, slots_per_day: u32) -> Self {
        Self {
            rights,
            slots_per_day,
        }
    }

    /// No rights, no withdrawals
    pub fn none() -> Self {
        Self::new(BankTabRights::empty(), 0)
    }

    /// What the guild master always holds
    pub fn unrestricted() -> Self {
        Self::new(BankTabRights::FULL, UNLIMITED_SLOTS)
    }
}

impl Default for TabRightsAndSlots {
    fn default() -> Self {
        Self::none()
    }
}
