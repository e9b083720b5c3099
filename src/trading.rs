// 3.0: spot buy/sell against the fiat balance. pure: snapshot in, new snapshot out.
// a rejected trade returns an error and the caller keeps the untouched input.

use crate::asset::{merge_lot, reduce_lot, CryptoAsset, DUST_THRESHOLD};
use crate::transaction::{Transaction, TransactionKind};
use crate::types::{CoinId, Leverage, PositionId, Price, Quote, Timestamp};
use crate::user::User;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotOrder {
    pub coin_id: CoinId,
    pub symbol: String,
    pub amount: Decimal,
    pub price: Price,
}

impl SpotOrder {
    pub fn new(coin_id: impl Into<CoinId>, symbol: impl Into<String>, amount: Decimal, price: Price) -> Self {
        Self {
            coin_id: coin_id.into(),
            symbol: symbol.into(),
            amount,
            price,
        }
    }

    /// None when amount times price does not fit in a Decimal.
    pub fn total(&self) -> Option<Quote> {
        Quote::new(self.amount).checked_mul(self.price.value())
    }
}

// 3.1: debit fiat, merge into the lot at weighted average cost
pub fn process_buy_transaction(user: &User, order: &SpotOrder, timestamp: Timestamp) -> Result<User, TradeError> {
    if order.amount <= Decimal::ZERO {
        return Err(TradeError::InvalidAmount(order.amount));
    }

    let cost = order.total().ok_or(TradeError::InvalidAmount(order.amount))?;
    if user.balances.fiat < cost {
        return Err(TradeError::InsufficientFunds {
            required: cost,
            available: user.balances.fiat,
        });
    }

    let mut next = user.clone();
    next.balances.fiat = next.balances.fiat.sub(cost);

    match next.assets.iter_mut().find(|a| a.coin_id == order.coin_id) {
        Some(lot) => {
            *lot = merge_lot(lot, order.amount, order.price).ok_or(TradeError::InvalidAmount(order.amount))?;
        }
        None => next.assets.push(CryptoAsset::new(
            order.coin_id.clone(),
            order.symbol.clone(),
            order.amount,
            order.price,
        )),
    }

    let tx = Transaction::spot(
        next.next_transaction_id(),
        TransactionKind::Buy,
        order.coin_id.clone(),
        &order.symbol,
        order.amount,
        order.price,
        timestamp,
    );
    next.transactions.push(tx);

    Ok(next)
}

// 3.2: reduce or drop the lot, credit fiat at the sale price
pub fn process_sell_transaction(user: &User, order: &SpotOrder, timestamp: Timestamp) -> Result<User, TradeError> {
    process_sell_with_dust(user, order, timestamp, DUST_THRESHOLD)
}

pub fn process_sell_with_dust(
    user: &User,
    order: &SpotOrder,
    timestamp: Timestamp,
    dust_threshold: Decimal,
) -> Result<User, TradeError> {
    if order.amount <= Decimal::ZERO {
        return Err(TradeError::InvalidAmount(order.amount));
    }

    let held = user.held_amount(&order.coin_id);
    if held < order.amount {
        return Err(TradeError::InsufficientAssets {
            coin_id: order.coin_id.clone(),
            requested: order.amount,
            held,
        });
    }

    let mut next = user.clone();
    let index = next
        .assets
        .iter()
        .position(|a| a.coin_id == order.coin_id)
        .ok_or_else(|| TradeError::AssetNotFound(order.coin_id.clone()))?;

    match reduce_lot(&next.assets[index], order.amount, dust_threshold) {
        Some(lot) => next.assets[index] = lot,
        None => {
            next.assets.remove(index);
        }
    }

    let proceeds = order.total().ok_or(TradeError::InvalidAmount(order.amount))?;
    next.balances.fiat = next
        .balances
        .fiat
        .checked_add(proceeds)
        .ok_or(TradeError::InvalidAmount(order.amount))?;

    let tx = Transaction::spot(
        next.next_transaction_id(),
        TransactionKind::Sell,
        order.coin_id.clone(),
        &order.symbol,
        order.amount,
        order.price,
        timestamp,
    );
    next.transactions.push(tx);

    Ok(next)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TradeError {
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Quote, available: Quote },

    #[error("Insufficient {coin_id}: requested {requested}, held {held}")]
    InsufficientAssets {
        coin_id: CoinId,
        requested: Decimal,
        held: Decimal,
    },

    #[error("No holding for {0}")]
    AssetNotFound(CoinId),

    #[error("Insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Quote, available: Quote },

    #[error("Leverage {requested} exceeds maximum {max}")]
    InvalidLeverage { requested: Leverage, max: Leverage },

    #[error("Position {0:?} not found")]
    PositionNotFound(PositionId),

    #[error("Position {0:?} is already closed")]
    PositionAlreadyClosed(PositionId),

    #[error("Position {0:?} has not reached its liquidation price")]
    NotLiquidatable(PositionId),
}
