// 6.0: leveraged positions against the margin balance. same contract as trading.rs:
// borrow a snapshot, hand back a new one or an error.
// 6.1 open, 6.2 close, 6.3 liquidate.

use crate::liquidation::{
    calculate_liquidation_price, is_liquidation_triggered, maintenance_margin, LiquidationParams,
};
use crate::position::{calculate_position_pnl, required_margin, Position};
use crate::trading::TradeError;
use crate::transaction::{Transaction, TransactionKind};
use crate::types::{CoinId, Leverage, PositionId, Price, Quote, Side, Timestamp};
use crate::user::User;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuturesParams {
    pub max_leverage: Leverage,
    pub liquidation: LiquidationParams,
}

impl Default for FuturesParams {
    fn default() -> Self {
        Self {
            max_leverage: Leverage::new_unchecked(dec!(100)),
            liquidation: LiquidationParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesOrder {
    pub coin_id: CoinId,
    pub symbol: String,
    pub side: Side,
    pub leverage: Leverage,
    pub size: Decimal,
    pub entry_price: Price,
}

impl FuturesOrder {
    pub fn new(
        coin_id: impl Into<CoinId>,
        symbol: impl Into<String>,
        side: Side,
        leverage: Leverage,
        size: Decimal,
        entry_price: Price,
    ) -> Self {
        Self {
            coin_id: coin_id.into(),
            symbol: symbol.into(),
            side,
            leverage,
            size,
            entry_price,
        }
    }

    /// None when the margin does not fit in a Decimal.
    pub fn margin(&self) -> Option<Quote> {
        required_margin(self.size, self.entry_price)
    }
}

// 6.1: lock margin, stamp the liquidation price, append an open position
pub fn open_position(
    user: &User,
    order: &FuturesOrder,
    params: &FuturesParams,
    timestamp: Timestamp,
) -> Result<User, TradeError> {
    if order.size <= Decimal::ZERO {
        return Err(TradeError::InvalidAmount(order.size));
    }
    if order.leverage > params.max_leverage {
        return Err(TradeError::InvalidLeverage {
            requested: order.leverage,
            max: params.max_leverage,
        });
    }

    let margin = order.margin().ok_or(TradeError::InvalidAmount(order.size))?;
    if margin > user.balances.margin {
        return Err(TradeError::InsufficientMargin {
            required: margin,
            available: user.balances.margin,
        });
    }

    let liquidation_price = calculate_liquidation_price(
        order.side,
        order.size,
        order.leverage,
        order.entry_price,
        margin,
        params.liquidation.maintenance_margin_ratio,
    );

    let mut next = user.clone();
    next.balances.margin = next.balances.margin.sub(margin);

    let position = Position {
        id: next.next_position_id(),
        coin_id: order.coin_id.clone(),
        symbol: order.symbol.clone(),
        side: order.side,
        leverage: order.leverage,
        size: order.size,
        entry_price: order.entry_price,
        liquidation_price,
        margin,
        pnl: Quote::zero(),
        is_open: true,
        opened_at: timestamp,
        closed_at: None,
        close_price: None,
    };

    let tx = Transaction::futures(
        next.next_transaction_id(),
        TransactionKind::OpenPosition,
        position.id,
        position.coin_id.clone(),
        &position.symbol,
        position.side,
        position.size,
        position.entry_price,
        margin,
        timestamp,
    );

    next.positions.push(position);
    next.transactions.push(tx);

    Ok(next)
}

// 6.2: settle at close_price. the loss is capped at posted margin
pub fn close_position(
    user: &User,
    position_id: PositionId,
    close_price: Price,
    timestamp: Timestamp,
) -> Result<User, TradeError> {
    let position = find_open(user, position_id)?;
    let pnl = calculate_position_pnl(position, close_price);
    settle(user, position_id, close_price, pnl, TransactionKind::ClosePosition, timestamp)
}

// 6.3: forced close at the stamped liquidation price. only the maintenance share comes back
pub fn liquidate_position(
    user: &User,
    position_id: PositionId,
    mark_price: Price,
    params: &LiquidationParams,
    timestamp: Timestamp,
) -> Result<User, TradeError> {
    let position = find_open(user, position_id)?;
    if !is_liquidation_triggered(position.side, position.liquidation_price, mark_price) {
        return Err(TradeError::NotLiquidatable(position_id));
    }

    let maintenance = maintenance_margin(position.margin, params.maintenance_margin_ratio);
    let pnl = maintenance.sub(position.margin);
    settle(
        user,
        position_id,
        position.liquidation_price,
        pnl,
        TransactionKind::Liquidation,
        timestamp,
    )
}

fn find_open(user: &User, position_id: PositionId) -> Result<&Position, TradeError> {
    let position = user
        .get_position(position_id)
        .ok_or(TradeError::PositionNotFound(position_id))?;
    if !position.is_open {
        return Err(TradeError::PositionAlreadyClosed(position_id));
    }
    Ok(position)
}

fn settle(
    user: &User,
    position_id: PositionId,
    exit_price: Price,
    pnl: Quote,
    kind: TransactionKind,
    timestamp: Timestamp,
) -> Result<User, TradeError> {
    let mut next = user.clone();
    let tx_id = next.next_transaction_id();
    let position = next
        .positions
        .iter_mut()
        .find(|p| p.id == position_id)
        .ok_or(TradeError::PositionNotFound(position_id))?;

    let returned = position.margin.add(pnl).max_zero();
    let realized = returned.sub(position.margin);

    position.pnl = realized;
    position.is_open = false;
    position.closed_at = Some(timestamp);
    position.close_price = Some(exit_price);

    let tx = Transaction::futures(
        tx_id,
        kind,
        position.id,
        position.coin_id.clone(),
        &position.symbol,
        position.side,
        position.size,
        exit_price,
        realized,
        timestamp,
    );

    next.balances.margin = next
        .balances
        .margin
        .checked_add(returned)
        .ok_or(TradeError::InvalidAmount(returned.value()))?;
    next.transactions.push(tx);

    Ok(next)
}
