// 4.0: leveraged position record. pnl = (mark - entry) * size * leverage * sign.
// positions are never removed from a user, only flagged closed with exit data.

use crate::types::{CoinId, Leverage, PositionId, Price, Quote, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub coin_id: CoinId,
    pub symbol: String,
    pub side: Side,
    pub leverage: Leverage,
    pub size: Decimal,
    pub entry_price: Price,
    pub liquidation_price: Price,
    pub margin: Quote,
    pub pnl: Quote,
    pub is_open: bool,
    pub opened_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    pub close_price: Option<Price>,
}

impl Position {
    // 4.1: paper gains/losses at the given price. zero once closed, realized pnl lives in `pnl`
    pub fn unrealized_pnl(&self, mark_price: Price) -> Quote {
        if !self.is_open {
            return Quote::zero();
        }
        calculate_position_pnl(self, mark_price)
    }

    // 4.2: margin + pnl. hitting the maintenance share of margin means liquidation
    pub fn equity(&self, mark_price: Price) -> Quote {
        self.margin.add(self.unrealized_pnl(mark_price))
    }

    /// What closing at `mark_price` would credit back: equity floored at zero.
    pub fn settlement_value(&self, mark_price: Price) -> Quote {
        self.equity(mark_price).max_zero()
    }

    /// Return on posted margin, as a fraction.
    pub fn roe(&self, mark_price: Price) -> Decimal {
        self.unrealized_pnl(mark_price)
            .value()
            .checked_div(self.margin.value())
            .unwrap_or(Decimal::ZERO)
    }
}

// 4.3: the pnl formula. linear in the price delta, sign flips with the side
pub fn calculate_position_pnl(position: &Position, current_price: Price) -> Quote {
    calculate_pnl(
        position.side,
        position.size,
        position.leverage,
        position.entry_price,
        current_price,
    )
}

// saturates at the Decimal range instead of overflowing
pub fn calculate_pnl(side: Side, size: Decimal, leverage: Leverage, entry_price: Price, current_price: Price) -> Quote {
    let delta = current_price.value() - entry_price.value();
    Quote::new(delta * side.sign()).mul(size).mul(leverage.value())
}

// default margin posted for a position: the unlevered notional at entry.
// None when size * entry does not fit in a Decimal
pub fn required_margin(size: Decimal, entry_price: Price) -> Option<Quote> {
    Quote::new(size).checked_mul(entry_price.value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_position(side: Side) -> Position {
        Position {
            id: PositionId(1),
            coin_id: CoinId::new("bitcoin"),
            symbol: "BTC".to_string(),
            side,
            leverage: Leverage::new(dec!(10)).unwrap(),
            size: dec!(0.1),
            entry_price: Price::new_unchecked(dec!(50000)),
            liquidation_price: Price::new_unchecked(dec!(47500)),
            margin: Quote::new(dec!(5000)),
            pnl: Quote::zero(),
            is_open: true,
            opened_at: Timestamp::from_millis(0),
            closed_at: None,
            close_price: None,
        }
    }

    #[test]
    fn pnl_long_profit() {
        let pos = test_position(Side::Long);
        let mark = Price::new_unchecked(dec!(51000));

        // 1000 * 0.1 * 10
        assert_eq!(calculate_position_pnl(&pos, mark).value(), dec!(1000));
    }

    #[test]
    fn pnl_long_loss() {
        let pos = test_position(Side::Long);
        let mark = Price::new_unchecked(dec!(49000));

        assert_eq!(calculate_position_pnl(&pos, mark).value(), dec!(-1000));
    }

    #[test]
    fn pnl_short_mirrors_long() {
        let long = test_position(Side::Long);
        let short = test_position(Side::Short);
        let mark = Price::new_unchecked(dec!(48500));

        let long_pnl = calculate_position_pnl(&long, mark);
        let short_pnl = calculate_position_pnl(&short, mark);
        assert_eq!(short_pnl.value(), dec!(1500));
        assert_eq!(long_pnl, short_pnl.negate());
    }

    #[test]
    fn closed_position_has_no_unrealized_pnl() {
        let mut pos = test_position(Side::Long);
        pos.is_open = false;

        assert_eq!(pos.unrealized_pnl(Price::new_unchecked(dec!(60000))), Quote::zero());
    }

    #[test]
    fn equity_and_roe() {
        let pos = test_position(Side::Long);
        let mark = Price::new_unchecked(dec!(52000));

        assert_eq!(pos.equity(mark).value(), dec!(7000));
        assert_eq!(pos.roe(mark), dec!(0.4));
    }

    #[test]
    fn settlement_value_floors_at_zero() {
        let pos = test_position(Side::Long);
        assert_eq!(pos.settlement_value(Price::new_unchecked(dec!(52000))).value(), dec!(7000));
        assert!(pos.settlement_value(Price::new_unchecked(dec!(1000))).is_zero());
    }

    #[test]
    fn required_margin_is_unlevered_notional() {
        let margin = required_margin(dec!(0.5), Price::new_unchecked(dec!(2000))).unwrap();
        assert_eq!(margin.value(), dec!(1000));
        assert!(required_margin(Decimal::MAX, Price::new_unchecked(dec!(2))).is_none());
    }

    #[test]
    fn pnl_saturates_instead_of_panicking() {
        let pnl = calculate_pnl(
            Side::Short,
            Decimal::MAX,
            Leverage::new(dec!(100)).unwrap(),
            Price::new_unchecked(dec!(1)),
            Price::new_unchecked(dec!(1000)),
        );
        assert_eq!(pnl.value(), Decimal::MIN);
    }
}
