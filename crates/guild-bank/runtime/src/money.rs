//! Guild money: deposits and quota-bound withdrawals

use crate::errors::BankResult;
use crate::guild_bank::GuildBank;
use crate::notifier::BankNotification;
use crate::quota_tracker::QuotaSlot;
use crate::records::BatchExt;
use guild_bank_storage::RecordKey;
use guild_bank_types::{
    BankEventType, BankLogId, Character, GuildRights, Rejection, BANK_MONEY_LIMIT,
    MAX_CHARACTER_MONEY,
};
use tracing::{info, warn};

impl GuildBank {
    /// Move `amount` from the character into the bank. Returns the new balance.
    pub async fn deposit_money(&mut self, character: &mut Character, amount: u64) -> BankResult<u64> {
        self.ensure_active()?;
        self.member_rank(&character.member)?;
        if amount == 0 {
            return Ok(self.money);
        }
        if self.money > BANK_MONEY_LIMIT.saturating_sub(amount) {
            return Err(Rejection::MoneyCapExceeded.into());
        }
        if !character.has_enough_money(amount) {
            return Err(Rejection::InsufficientFunds.into());
        }

        let balance = self.money + amount;
        let carried = character.money - amount;
        let entry = self.stage_money_event(BankEventType::DepositMoney, &character.member, amount);

        let mut batch = self.batch();
        batch.put(RecordKey::BankMoney, &balance)?;
        batch.put(
            RecordKey::CharacterMoney {
                member: character.member.clone(),
            },
            &carried,
        )?;
        batch.put_bank_events(&[(BankLogId::Money, entry.clone())])?;
        self.commit(batch).await?;

        self.money = balance;
        character.money = carried;
        if let Some(log) = self.logs.bank_log_mut(BankLogId::Money) {
            log.append(entry);
        }
        info!(guild = %self.guild, member = %character.member, amount, balance, "Money deposited");
        self.notify(BankNotification::MoneyChanged { balance }).await;
        Ok(balance)
    }

    /// Take `amount` out of the bank, counted against the daily money quota.
    ///
    /// A repair withdrawal pays for repairs directly and never reaches the
    /// character. Returns the new balance.
    pub async fn withdraw_money(
        &mut self,
        character: &mut Character,
        amount: u64,
        repair: bool,
    ) -> BankResult<u64> {
        self.ensure_active()?;
        let member = character.member.clone();
        let rank = self.member_rank(&member)?;
        let amount = amount.min(MAX_CHARACTER_MONEY);
        if amount == 0 {
            return Ok(self.money);
        }

        if self.money < amount {
            return Err(Rejection::InsufficientFunds.into());
        }
        if !self
            .quotas
            .remaining_money(&member, rank, &self.rights)
            .allows(amount)
        {
            return Err(Rejection::QuotaExceeded.into());
        }
        if repair && !self.rights.has_guild_right(rank, GuildRights::WITHDRAW_REPAIR) {
            warn!(guild = %self.guild, member = %member, "Repair withdrawal without right");
            return Err(Rejection::PermissionDenied.into());
        }
        let carried = if repair {
            character.money
        } else {
            character
                .money
                .checked_add(amount)
                .filter(|m| *m <= MAX_CHARACTER_MONEY)
                .ok_or(Rejection::MoneyCapExceeded)?
        };

        let balance = self.money - amount;
        let usage = self.quotas.projected(&member, QuotaSlot::Money, amount);
        let event = if repair {
            BankEventType::RepairMoney
        } else {
            BankEventType::WithdrawMoney
        };
        let entry = self.stage_money_event(event, &member, amount);

        let mut batch = self.batch();
        batch.put(RecordKey::BankMoney, &balance)?;
        if !repair {
            batch.put(
                RecordKey::CharacterMoney {
                    member: member.clone(),
                },
                &carried,
            )?;
        }
        batch.put_usage(&member, &usage)?;
        batch.put_bank_events(&[(BankLogId::Money, entry.clone())])?;
        self.commit(batch).await?;

        self.money = balance;
        character.money = carried;
        self.quotas.restore(member.clone(), usage);
        if let Some(log) = self.logs.bank_log_mut(BankLogId::Money) {
            log.append(entry);
        }
        info!(guild = %self.guild, member = %member, amount, repair, balance, "Money withdrawn");
        self.notify(BankNotification::MoneyChanged { balance }).await;
        Ok(balance)
    }
}
