//! Liquidation price and status.
//!
//! A position is liquidated once its loss eats through everything but the maintenance
//! share of its margin. The maintenance margin is a fixed ratio of posted margin
//! (50% by default), so the liquidation price is where
//! `pnl == -(margin - maintenance)`.

use crate::position::Position;
use crate::types::{Leverage, Price, Quote, Side};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Floor for computed liquidation prices.
pub const MIN_LIQUIDATION_PRICE: Decimal = dec!(0.0001);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidationParams {
    /// Share of posted margin that must survive. 0.5 = half the margin.
    pub maintenance_margin_ratio: Decimal,
    /// Distance to the liquidation price (fraction of mark) below which a position is at risk.
    pub at_risk_buffer: Decimal,
}

impl Default for LiquidationParams {
    fn default() -> Self {
        Self {
            maintenance_margin_ratio: dec!(0.5),
            at_risk_buffer: dec!(0.1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiquidationStatus {
    Safe { distance: Decimal },
    AtRisk { distance: Decimal },
    Liquidatable { shortfall: Quote },
}

impl LiquidationStatus {
    pub fn is_liquidatable(&self) -> bool {
        matches!(self, LiquidationStatus::Liquidatable { .. })
    }
}

pub fn maintenance_margin(margin: Quote, maintenance_margin_ratio: Decimal) -> Quote {
    margin.mul(maintenance_margin_ratio)
}

/// Price at which the position's loss equals margin minus maintenance margin.
///
/// long:  entry - (margin - mm) / (size * leverage)
/// short: entry + (margin - mm) / (size * leverage)
pub fn calculate_liquidation_price(
    side: Side,
    size: Decimal,
    leverage: Leverage,
    entry_price: Price,
    margin: Quote,
    maintenance_margin_ratio: Decimal,
) -> Price {
    // an exposure past the Decimal range moves the price by less than its precision
    let Some(exposure) = size.checked_mul(leverage.value()) else {
        return entry_price;
    };
    if exposure <= Decimal::ZERO {
        return entry_price;
    }

    let loss_buffer = margin.value() - maintenance_margin(margin, maintenance_margin_ratio).value();
    let price_move = loss_buffer / exposure;
    let liq_price = entry_price
        .value()
        .checked_sub(side.sign() * price_move)
        .unwrap_or(Decimal::MAX);

    Price::new_unchecked(liq_price.max(MIN_LIQUIDATION_PRICE))
}

/// True once the mark has reached or crossed the liquidation price.
pub fn is_liquidation_triggered(side: Side, liquidation_price: Price, mark_price: Price) -> bool {
    match side {
        Side::Long => mark_price <= liquidation_price,
        Side::Short => mark_price >= liquidation_price,
    }
}

pub fn evaluate_liquidation(position: &Position, mark_price: Price, params: &LiquidationParams) -> LiquidationStatus {
    if is_liquidation_triggered(position.side, position.liquidation_price, mark_price) {
        let maintenance = maintenance_margin(position.margin, params.maintenance_margin_ratio);
        let shortfall = maintenance.sub(position.equity(mark_price)).max_zero();
        return LiquidationStatus::Liquidatable { shortfall };
    }

    let distance = (mark_price.value() - position.liquidation_price.value()).abs() / mark_price.value();
    if distance < params.at_risk_buffer {
        LiquidationStatus::AtRisk { distance }
    } else {
        LiquidationStatus::Safe { distance }
    }
}
