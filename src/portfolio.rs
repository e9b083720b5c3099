//! Portfolio valuation.
//!
//! Total value is spot holdings marked at the book price plus the unrealized P&L of
//! open positions. A coin missing from the book is carried at its average cost and an
//! open position without a quote contributes no P&L.

use crate::asset::CryptoAsset;
use crate::position::{calculate_position_pnl, Position};
use crate::price_feed::PriceBook;
use crate::types::{CoinId, Price, Quote};
use crate::user::{Balances, User};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub fn calculate_portfolio_value(assets: &[CryptoAsset], positions: &[Position], prices: &PriceBook) -> Quote {
    let spot: Quote = assets.iter().map(|a| asset_value(a, prices)).sum();
    let unrealized: Quote = positions.iter().map(|p| position_pnl(p, prices)).sum();
    spot.add(unrealized)
}

fn mark_for(asset: &CryptoAsset, prices: &PriceBook) -> Price {
    prices.price(&asset.coin_id).unwrap_or(asset.average_price)
}

fn asset_value(asset: &CryptoAsset, prices: &PriceBook) -> Quote {
    asset.market_value(mark_for(asset, prices))
}

// margin back to the balance if closed now. no quote means no P&L
fn position_settlement(position: &Position, prices: &PriceBook) -> Quote {
    match prices.price(&position.coin_id) {
        Some(mark) => position.settlement_value(mark),
        None => position.margin,
    }
}

fn position_pnl(position: &Position, prices: &PriceBook) -> Quote {
    if !position.is_open {
        return Quote::zero();
    }
    match prices.price(&position.coin_id) {
        Some(mark) => calculate_position_pnl(position, mark),
        None => Quote::zero(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub coin_id: CoinId,
    pub symbol: String,
    pub amount: Decimal,
    pub price: Price,
    pub value: Quote,
    pub cost_basis: Quote,
    pub unrealized_gain: Quote,
    /// Share of total spot value, 0..=1
    pub allocation: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub balances: Balances,
    pub spot_value: Quote,
    pub unrealized_pnl: Quote,
    /// Margin posted in open positions, no longer in the margin balance.
    pub locked_margin: Quote,
    pub open_positions: usize,
    /// Balances plus spot value plus what each open position would settle for.
    /// A position never counts below zero, so a loss past its margin does not
    /// reduce the rest of the account.
    pub total_equity: Quote,
    pub holdings: Vec<Holding>,
}

pub fn summarize_portfolio(user: &User, prices: &PriceBook) -> PortfolioSummary {
    let spot_value: Quote = user.assets.iter().map(|a| asset_value(a, prices)).sum();
    let unrealized_pnl: Quote = user.positions.iter().map(|p| position_pnl(p, prices)).sum();
    let locked_margin: Quote = user.open_positions().map(|p| p.margin).sum();

    let mut holdings: Vec<Holding> = user
        .assets
        .iter()
        .map(|asset| {
            let price = mark_for(asset, prices);
            let value = asset.market_value(price);
            let allocation = if spot_value.is_zero() {
                Decimal::ZERO
            } else {
                value.value() / spot_value.value()
            };
            Holding {
                coin_id: asset.coin_id.clone(),
                symbol: asset.symbol.clone(),
                amount: asset.amount,
                price,
                value,
                cost_basis: asset.cost_basis(),
                unrealized_gain: asset.unrealized_gain(price),
                allocation,
            }
        })
        .collect();
    holdings.sort_by(|a, b| b.value.cmp(&a.value));

    let settlement: Quote = user.open_positions().map(|p| position_settlement(p, prices)).sum();
    let total_equity = user.balances.total().add(spot_value).add(settlement);

    PortfolioSummary {
        balances: user.balances,
        spot_value,
        unrealized_pnl,
        locked_margin,
        open_positions: user.open_positions().count(),
        total_equity,
        holdings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Leverage, PositionId, Side, Timestamp, UserId};
    use rust_decimal_macros::dec;

    fn book() -> PriceBook {
        let mut book = PriceBook::new();
        book.set_price("bitcoin", "BTC", Price::new_unchecked(dec!(60000)), Timestamp::from_millis(0));
        book.set_price("ethereum", "ETH", Price::new_unchecked(dec!(3000)), Timestamp::from_millis(0));
        book
    }

    fn lot(coin: &str, symbol: &str, amount: Decimal, avg: Decimal) -> CryptoAsset {
        CryptoAsset::new(CoinId::new(coin), symbol, amount, Price::new_unchecked(avg))
    }

    fn position(coin: &str, side: Side, is_open: bool) -> Position {
        Position {
            id: PositionId(1),
            coin_id: CoinId::new(coin),
            symbol: "BTC".to_string(),
            side,
            leverage: Leverage::new(dec!(5)).unwrap(),
            size: dec!(0.1),
            entry_price: Price::new_unchecked(dec!(50000)),
            liquidation_price: Price::new_unchecked(dec!(45000)),
            margin: Quote::new(dec!(5000)),
            pnl: Quote::zero(),
            is_open,
            opened_at: Timestamp::from_millis(0),
            closed_at: None,
            close_price: None,
        }
    }

    #[test]
    fn spot_only_value() {
        let assets = vec![lot("bitcoin", "BTC", dec!(0.5), dec!(40000)), lot("ethereum", "ETH", dec!(2), dec!(2000))];
        let value = calculate_portfolio_value(&assets, &[], &book());
        assert_eq!(value.value(), dec!(36000));
    }

    #[test]
    fn includes_open_position_pnl() {
        let assets = vec![lot("ethereum", "ETH", dec!(1), dec!(2000))];
        let positions = vec![position("bitcoin", Side::Long, true), position("bitcoin", Side::Short, false)];

        // 3000 + (60000 - 50000) * 0.1 * 5
        let value = calculate_portfolio_value(&assets, &positions, &book());
        assert_eq!(value.value(), dec!(8000));
    }

    #[test]
    fn short_position_loses_value() {
        let positions = vec![position("bitcoin", Side::Short, true)];
        let value = calculate_portfolio_value(&[], &positions, &book());
        assert_eq!(value.value(), dec!(-5000));
    }

    #[test]
    fn missing_quote_falls_back() {
        let assets = vec![lot("dogecoin", "DOGE", dec!(1000), dec!(0.1))];
        let positions = vec![position("solana", Side::Long, true)];

        let value = calculate_portfolio_value(&assets, &positions, &book());
        assert_eq!(value.value(), dec!(100));
    }

    #[test]
    fn summary_breakdown() {
        let mut user = User::new(
            UserId(1),
            "a@b.co",
            "A",
            Balances::new(Quote::new(dec!(1000)), Quote::new(dec!(500)), Quote::new(dec!(2000))),
            Timestamp::from_millis(0),
        );
        user.assets = vec![lot("bitcoin", "BTC", dec!(0.1), dec!(50000)), lot("ethereum", "ETH", dec!(2), dec!(3500))];
        user.positions = vec![position("bitcoin", Side::Long, true)];

        let summary = summarize_portfolio(&user, &book());

        assert_eq!(summary.spot_value.value(), dec!(12000));
        assert_eq!(summary.unrealized_pnl.value(), dec!(5000));
        assert_eq!(summary.locked_margin.value(), dec!(5000));
        assert_eq!(summary.open_positions, 1);
        // 3500 cash + 5000 locked + 12000 spot + 5000 pnl
        assert_eq!(summary.total_equity.value(), dec!(25500));

        assert_eq!(summary.holdings.len(), 2);
        assert_eq!(summary.holdings[0].symbol, "BTC");
        assert_eq!(summary.holdings[0].allocation, dec!(0.5));
        assert_eq!(summary.holdings[1].unrealized_gain.value(), dec!(-1000));
    }

    #[test]
    fn underwater_position_counts_as_zero_equity() {
        let mut user = User::new(
            UserId(1),
            "a@b.co",
            "A",
            Balances::new(Quote::new(dec!(1000)), Quote::zero(), Quote::zero()),
            Timestamp::from_millis(0),
        );
        user.positions = vec![position("bitcoin", Side::Long, true)];
        let mut prices = book();
        prices.set_price("bitcoin", "BTC", Price::new_unchecked(dec!(30000)), Timestamp::from_millis(1));

        let summary = summarize_portfolio(&user, &prices);

        // (30000 - 50000) * 0.1 * 5, twice the 5000 margin
        assert_eq!(summary.unrealized_pnl.value(), dec!(-10000));
        assert_eq!(summary.total_equity.value(), dec!(1000));
    }

    #[test]
    fn unquoted_position_counts_at_margin() {
        let mut user = User::new(
            UserId(1),
            "a@b.co",
            "A",
            Balances::new(Quote::zero(), Quote::zero(), Quote::zero()),
            Timestamp::from_millis(0),
        );
        user.positions = vec![position("solana", Side::Short, true)];

        let summary = summarize_portfolio(&user, &book());
        assert!(summary.unrealized_pnl.is_zero());
        assert_eq!(summary.total_equity.value(), dec!(5000));
    }
}
