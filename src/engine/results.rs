// 9.0.2: result types and errors for exchange operations.

use crate::config::ConfigError;
use crate::liquidation::LiquidationStatus;
use crate::price_feed::PriceFeedError;
use crate::store::StoreError;
use crate::trading::TradeError;
use crate::types::{CoinId, PositionId, Price, Quote, Side, Timestamp, UserId};
use crate::user::{Balances, Role, User, UserError};
use crate::validation::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationResult {
    pub user_id: UserId,
    pub position_id: PositionId,
    pub coin_id: CoinId,
    pub side: Side,
    pub size: Decimal,
    pub liquidation_price: Price,
    pub mark_price: Price,
    pub margin_lost: Quote,
    pub margin_returned: Quote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionStatus {
    pub position_id: PositionId,
    pub mark_price: Price,
    pub unrealized_pnl: Quote,
    /// unrealized P&L over posted margin
    pub roe: Decimal,
    pub status: LiquidationStatus,
}

/// What the admin listing shows per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub balances: Balances,
    pub holdings: usize,
    pub open_positions: usize,
    pub transactions: usize,
    pub portfolio_value: Quote,
    pub created_at: Timestamp,
}

impl UserSummary {
    pub(super) fn new(user: &User, portfolio_value: Quote) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            balances: user.balances,
            holdings: user.assets.len(),
            open_positions: user.open_positions().count(),
            transactions: user.transactions.len(),
            portfolio_value,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("User {0:?} not found")]
    UserNotFound(UserId),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("User {0:?} is not an admin")]
    Unauthorized(UserId),

    #[error("No price available for {0}")]
    NoPrice(CoinId),

    #[error("Leverage must be at least 1, got {0}")]
    InvalidLeverage(Decimal),

    #[error("Trade rejected: {0}")]
    Trade(#[from] TradeError),

    #[error("Wallet operation rejected: {0}")]
    User(#[from] UserError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Price feed error: {0}")]
    PriceFeed(#[from] PriceFeedError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
