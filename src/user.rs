//! User ledger record and wallet balances.
//!
//! A user owns three segregated balances: fiat (spot buying power), usdt, and margin
//! (collateral for leveraged positions). Spot lots, positions and the transaction log
//! hang off the same record, which is persisted as one JSON object.

use crate::asset::CryptoAsset;
use crate::position::Position;
use crate::transaction::{Transaction, TransactionKind};
use crate::types::{CoinId, PositionId, Quote, Timestamp, TransactionId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceKind {
    Fiat,
    Usdt,
    Margin,
}

impl fmt::Display for BalanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceKind::Fiat => write!(f, "fiat"),
            BalanceKind::Usdt => write!(f, "usdt"),
            BalanceKind::Margin => write!(f, "margin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub fiat: Quote,
    pub usdt: Quote,
    pub margin: Quote,
}

impl Balances {
    pub fn new(fiat: Quote, usdt: Quote, margin: Quote) -> Self {
        Self { fiat, usdt, margin }
    }

    pub fn zero() -> Self {
        Self::new(Quote::zero(), Quote::zero(), Quote::zero())
    }

    pub fn get(&self, kind: BalanceKind) -> Quote {
        match kind {
            BalanceKind::Fiat => self.fiat,
            BalanceKind::Usdt => self.usdt,
            BalanceKind::Margin => self.margin,
        }
    }

    pub fn get_mut(&mut self, kind: BalanceKind) -> &mut Quote {
        match kind {
            BalanceKind::Fiat => &mut self.fiat,
            BalanceKind::Usdt => &mut self.usdt,
            BalanceKind::Margin => &mut self.margin,
        }
    }

    pub fn total(&self) -> Quote {
        self.fiat.add(self.usdt).add(self.margin)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub balances: Balances,
    #[serde(default)]
    pub assets: Vec<CryptoAsset>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub positions: Vec<Position>,
    pub created_at: Timestamp,
}

impl User {
    pub fn new(id: UserId, email: impl Into<String>, name: impl Into<String>, balances: Balances, timestamp: Timestamp) -> Self {
        Self {
            id,
            email: email.into(),
            name: name.into(),
            role: Role::User,
            balances,
            assets: Vec::new(),
            transactions: Vec::new(),
            positions: Vec::new(),
            created_at: timestamp,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn balance(&self, kind: BalanceKind) -> Quote {
        self.balances.get(kind)
    }

    pub fn next_transaction_id(&self) -> TransactionId {
        let last = self.transactions.iter().map(|t| t.id.0).max().unwrap_or(0);
        TransactionId(last + 1)
    }

    pub fn next_position_id(&self) -> PositionId {
        let last = self.positions.iter().map(|p| p.id.0).max().unwrap_or(0);
        PositionId(last + 1)
    }

    pub fn get_asset(&self, coin_id: &CoinId) -> Option<&CryptoAsset> {
        self.assets.iter().find(|a| &a.coin_id == coin_id)
    }

    pub fn held_amount(&self, coin_id: &CoinId) -> rust_decimal::Decimal {
        self.get_asset(coin_id).map(|a| a.amount).unwrap_or_default()
    }

    pub fn get_position(&self, position_id: PositionId) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == position_id)
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_open)
    }

    pub fn deposit(&mut self, kind: BalanceKind, amount: Quote, timestamp: Timestamp) -> Result<(), UserError> {
        if amount.value() <= rust_decimal::Decimal::ZERO {
            return Err(UserError::InvalidAmount(amount));
        }
        let credited = self.balance(kind).checked_add(amount).ok_or(UserError::InvalidAmount(amount))?;
        *self.balances.get_mut(kind) = credited;

        let tx = Transaction::wallet(self.next_transaction_id(), TransactionKind::Deposit, kind, amount, timestamp);
        self.transactions.push(tx);
        Ok(())
    }

    pub fn withdraw(&mut self, kind: BalanceKind, amount: Quote, timestamp: Timestamp) -> Result<(), UserError> {
        self.debit(kind, amount)?;

        let tx = Transaction::wallet(self.next_transaction_id(), TransactionKind::Withdrawal, kind, amount, timestamp);
        self.transactions.push(tx);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        from: BalanceKind,
        to: BalanceKind,
        amount: Quote,
        timestamp: Timestamp,
    ) -> Result<(), UserError> {
        if from == to {
            return Err(UserError::SameBalance(from));
        }
        // credit computed first so an overflow leaves both balances untouched
        let credited = self.balance(to).checked_add(amount).ok_or(UserError::InvalidAmount(amount))?;
        self.debit(from, amount)?;
        *self.balances.get_mut(to) = credited;

        let tx = Transaction::transfer(self.next_transaction_id(), from, to, amount, timestamp);
        self.transactions.push(tx);
        Ok(())
    }

    // admin override. sets the balance outright and logs the delta
    pub fn adjust_balance(&mut self, kind: BalanceKind, new_balance: Quote, timestamp: Timestamp) -> Result<Quote, UserError> {
        if new_balance.is_negative() {
            return Err(UserError::InvalidAmount(new_balance));
        }
        let delta = new_balance.sub(self.balance(kind));
        *self.balances.get_mut(kind) = new_balance;

        let tx = Transaction::wallet(self.next_transaction_id(), TransactionKind::Adjustment, kind, delta, timestamp);
        self.transactions.push(tx);
        Ok(delta)
    }

    fn debit(&mut self, kind: BalanceKind, amount: Quote) -> Result<(), UserError> {
        if amount.value() <= rust_decimal::Decimal::ZERO {
            return Err(UserError::InvalidAmount(amount));
        }
        let available = self.balance(kind);
        if amount > available {
            return Err(UserError::InsufficientBalance {
                kind,
                requested: amount,
                available,
            });
        }
        *self.balances.get_mut(kind) = available.sub(amount);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UserError {
    #[error("Insufficient {kind} balance: requested {requested}, available {available}")]
    InsufficientBalance {
        kind: BalanceKind,
        requested: Quote,
        available: Quote,
    },

    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Quote),

    #[error("Cannot transfer {0} balance to itself")]
    SameBalance(BalanceKind),
}
