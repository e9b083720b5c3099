// 2.0: spot holdings. one lot per coin, carried at a volume weighted average cost.
// 2.1 merge_lot / reduce_lot are the only ways a lot changes.

use crate::types::{CoinId, Price, Quote};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Remainders below this are treated as an empty lot and removed.
pub const DUST_THRESHOLD: Decimal = dec!(0.000001);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CryptoAsset {
    pub coin_id: CoinId,
    pub symbol: String,
    pub amount: Decimal,
    pub average_price: Price,
}

impl CryptoAsset {
    pub fn new(coin_id: CoinId, symbol: impl Into<String>, amount: Decimal, price: Price) -> Self {
        Self {
            coin_id,
            symbol: symbol.into(),
            amount,
            average_price: price,
        }
    }

    pub fn cost_basis(&self) -> Quote {
        Quote::new(self.amount).mul(self.average_price.value())
    }

    pub fn market_value(&self, price: Price) -> Quote {
        Quote::new(self.amount).mul(price.value())
    }

    pub fn unrealized_gain(&self, price: Price) -> Quote {
        self.market_value(price).sub(self.cost_basis())
    }
}

// 2.1: adds a fill to the lot. (a1*p1 + a2*p2) / (a1 + a2)
// None when the merged amount or cost leaves the Decimal range.
pub fn merge_lot(lot: &CryptoAsset, amount: Decimal, price: Price) -> Option<CryptoAsset> {
    let new_amount = lot.amount.checked_add(amount)?;
    let average_price = if new_amount > Decimal::ZERO {
        let held_cost = lot.amount.checked_mul(lot.average_price.value())?;
        let fill_cost = amount.checked_mul(price.value())?;
        Price::new_unchecked(held_cost.checked_add(fill_cost)?.checked_div(new_amount)?)
    } else {
        price
    };

    Some(CryptoAsset {
        coin_id: lot.coin_id.clone(),
        symbol: lot.symbol.clone(),
        amount: new_amount,
        average_price,
    })
}

// 2.2: takes amount out of the lot. None means the lot is gone (at or under dust).
// cost basis per unit is unchanged by a sale.
pub fn reduce_lot(lot: &CryptoAsset, amount: Decimal, dust_threshold: Decimal) -> Option<CryptoAsset> {
    let remaining = lot.amount - amount;
    if remaining < dust_threshold {
        return None;
    }

    Some(CryptoAsset {
        amount: remaining,
        ..lot.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc_lot() -> CryptoAsset {
        CryptoAsset::new(CoinId::new("bitcoin"), "BTC", dec!(1), Price::new_unchecked(dec!(30000)))
    }

    #[test]
    fn merge_averages_cost() {
        let lot = btc_lot();
        let merged = merge_lot(&lot, dec!(1), Price::new_unchecked(dec!(40000))).unwrap();

        assert_eq!(merged.amount, dec!(2));
        assert_eq!(merged.average_price.value(), dec!(35000));
    }

    #[test]
    fn merge_weights_by_volume() {
        let lot = btc_lot();
        // 1 @ 30000 + 3 @ 34000 = 132000 / 4
        let merged = merge_lot(&lot, dec!(3), Price::new_unchecked(dec!(34000))).unwrap();
        assert_eq!(merged.average_price.value(), dec!(33000));
    }

    #[test]
    fn merge_past_decimal_range_is_none() {
        let lot = btc_lot();
        assert!(merge_lot(&lot, Decimal::MAX, Price::new_unchecked(dec!(1))).is_none());
        assert!(merge_lot(&lot, dec!(1), Price::new_unchecked(Decimal::MAX)).is_none());
    }

    #[test]
    fn reduce_keeps_cost_basis() {
        let lot = btc_lot();
        let reduced = reduce_lot(&lot, dec!(0.25), DUST_THRESHOLD).unwrap();

        assert_eq!(reduced.amount, dec!(0.75));
        assert_eq!(reduced.average_price.value(), dec!(30000));
    }

    #[test]
    fn reduce_below_dust_removes_lot() {
        let lot = btc_lot();
        assert!(reduce_lot(&lot, dec!(1), DUST_THRESHOLD).is_none());
        assert!(reduce_lot(&lot, dec!(0.9999995), DUST_THRESHOLD).is_none());
        assert!(reduce_lot(&lot, dec!(0.999999), DUST_THRESHOLD).is_some());
    }

    #[test]
    fn valuation_helpers() {
        let lot = btc_lot();
        let mark = Price::new_unchecked(dec!(33000));

        assert_eq!(lot.cost_basis().value(), dec!(30000));
        assert_eq!(lot.market_value(mark).value(), dec!(33000));
        assert_eq!(lot.unrealized_gain(mark).value(), dec!(3000));
    }
}
