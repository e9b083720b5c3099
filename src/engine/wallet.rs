//! Deposits, withdrawals and transfers between a user's balances.

use super::core::Exchange;
use super::results::ExchangeError;
use crate::types::{Quote, UserId};
use crate::user::BalanceKind;
use crate::validation::validate_amount;
use tracing::{info, warn};

impl Exchange {
    pub fn deposit(&mut self, user_id: UserId, kind: BalanceKind, amount: Quote) -> Result<Quote, ExchangeError> {
        validate_amount("amount", amount.value())?;
        let mut next = self.user(user_id)?.clone();
        next.deposit(kind, amount, self.current_time).map_err(|e| {
            warn!(user = user_id.0, balance = %kind, error = %e, "deposit rejected");
            e
        })?;
        let balance = next.balance(kind);
        self.commit(next)?;

        info!(user = user_id.0, balance = %kind, amount = %amount, "deposit");
        Ok(balance)
    }

    pub fn withdraw(&mut self, user_id: UserId, kind: BalanceKind, amount: Quote) -> Result<Quote, ExchangeError> {
        validate_amount("amount", amount.value())?;
        let mut next = self.user(user_id)?.clone();
        next.withdraw(kind, amount, self.current_time).map_err(|e| {
            warn!(user = user_id.0, balance = %kind, error = %e, "withdrawal rejected");
            e
        })?;
        let balance = next.balance(kind);
        self.commit(next)?;

        info!(user = user_id.0, balance = %kind, amount = %amount, "withdrawal");
        Ok(balance)
    }

    pub fn transfer(
        &mut self,
        user_id: UserId,
        from: BalanceKind,
        to: BalanceKind,
        amount: Quote,
    ) -> Result<(), ExchangeError> {
        validate_amount("amount", amount.value())?;
        let mut next = self.user(user_id)?.clone();
        next.transfer(from, to, amount, self.current_time).map_err(|e| {
            warn!(user = user_id.0, from = %from, to = %to, error = %e, "transfer rejected");
            e
        })?;
        self.commit(next)?;

        info!(user = user_id.0, from = %from, to = %to, amount = %amount, "transfer");
        Ok(())
    }
}
