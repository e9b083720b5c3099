// 5.0: every ledger mutation appends a transaction. the log is append only and is
// what the history page renders. TransactionKind lists everything that can happen.

use crate::types::{CoinId, PositionId, Price, Quote, Side, Timestamp, TransactionId};
use crate::user::BalanceKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    // Spot
    Buy,
    Sell,

    // Futures
    OpenPosition,
    ClosePosition,
    Liquidation,

    // Wallet
    Deposit,
    Withdrawal,
    Transfer,

    // Admin
    Adjustment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub coin_id: Option<CoinId>,
    pub symbol: Option<String>,
    pub amount: Decimal,
    pub price: Option<Price>,
    pub total: Quote,
    pub side: Option<Side>,
    pub position_id: Option<PositionId>,
    pub balance: Option<BalanceKind>,
    // Second leg of a transfer
    pub counter_balance: Option<BalanceKind>,
    pub timestamp: Timestamp,
}

impl Transaction {
    fn base(id: TransactionId, kind: TransactionKind, amount: Decimal, total: Quote, timestamp: Timestamp) -> Self {
        Self {
            id,
            kind,
            coin_id: None,
            symbol: None,
            amount,
            price: None,
            total,
            side: None,
            position_id: None,
            balance: None,
            counter_balance: None,
            timestamp,
        }
    }

    pub fn spot(
        id: TransactionId,
        kind: TransactionKind,
        coin_id: CoinId,
        symbol: &str,
        amount: Decimal,
        price: Price,
        timestamp: Timestamp,
    ) -> Self {
        debug_assert!(matches!(kind, TransactionKind::Buy | TransactionKind::Sell));
        let total = Quote::new(amount).mul(price.value());
        Self {
            coin_id: Some(coin_id),
            symbol: Some(symbol.to_string()),
            price: Some(price),
            balance: Some(BalanceKind::Fiat),
            ..Self::base(id, kind, amount, total, timestamp)
        }
    }

    // total is the margin moved for opens and the pnl realized for closes
    #[allow(clippy::too_many_arguments)]
    pub fn futures(
        id: TransactionId,
        kind: TransactionKind,
        position_id: PositionId,
        coin_id: CoinId,
        symbol: &str,
        side: Side,
        size: Decimal,
        price: Price,
        total: Quote,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            coin_id: Some(coin_id),
            symbol: Some(symbol.to_string()),
            price: Some(price),
            side: Some(side),
            position_id: Some(position_id),
            balance: Some(BalanceKind::Margin),
            ..Self::base(id, kind, size, total, timestamp)
        }
    }

    pub fn wallet(
        id: TransactionId,
        kind: TransactionKind,
        balance: BalanceKind,
        amount: Quote,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            balance: Some(balance),
            ..Self::base(id, kind, amount.value(), amount, timestamp)
        }
    }

    pub fn transfer(
        id: TransactionId,
        from: BalanceKind,
        to: BalanceKind,
        amount: Quote,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            balance: Some(from),
            counter_balance: Some(to),
            ..Self::base(id, TransactionKind::Transfer, amount.value(), amount, timestamp)
        }
    }

    pub fn is_trade(&self) -> bool {
        matches!(
            self.kind,
            TransactionKind::Buy
                | TransactionKind::Sell
                | TransactionKind::OpenPosition
                | TransactionKind::ClosePosition
                | TransactionKind::Liquidation
        )
    }
}
