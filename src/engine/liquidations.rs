//! Liquidation sweep over every user's open positions.

use super::core::Exchange;
use super::results::{ExchangeError, LiquidationResult};
use crate::futures::liquidate_position;
use crate::liquidation::is_liquidation_triggered;
use crate::trading::TradeError;
use crate::types::{PositionId, Price, UserId};
use tracing::{info, warn};

impl Exchange {
    /// Liquidate every open position whose mark has crossed its liquidation price.
    /// Positions without a quote are skipped. A position that fails to settle or
    /// save is logged and left open for the next sweep; the ones already
    /// committed are still returned.
    pub fn check_liquidations(&mut self) -> Vec<LiquidationResult> {
        let mut triggered: Vec<(UserId, PositionId, Price)> = Vec::new();

        for user in &self.users {
            for position in user.open_positions() {
                let Some(mark_price) = self.prices.price(&position.coin_id) else {
                    continue;
                };
                if is_liquidation_triggered(position.side, position.liquidation_price, mark_price) {
                    triggered.push((user.id, position.id, mark_price));
                }
            }
        }

        let mut results = Vec::new();
        for (user_id, position_id, mark_price) in triggered {
            match self.execute_liquidation(user_id, position_id, mark_price) {
                Ok(result) => results.push(result),
                Err(e) => warn!(user = user_id.0, position = position_id.0, error = %e, "liquidation not applied"),
            }
        }

        results
    }

    fn execute_liquidation(
        &mut self,
        user_id: UserId,
        position_id: PositionId,
        mark_price: Price,
    ) -> Result<LiquidationResult, ExchangeError> {
        let params = self.config.futures.liquidation;
        let next = liquidate_position(self.user(user_id)?, position_id, mark_price, &params, self.current_time)?;
        let closed = next
            .get_position(position_id)
            .cloned()
            .ok_or(TradeError::PositionNotFound(position_id))?;
        self.commit(next)?;

        let margin_returned = closed.margin.add(closed.pnl);
        info!(
            user = user_id.0,
            position = position_id.0,
            coin = %closed.coin_id,
            mark = %mark_price,
            liquidation_price = %closed.liquidation_price,
            returned = %margin_returned,
            "position liquidated"
        );

        Ok(LiquidationResult {
            user_id,
            position_id,
            coin_id: closed.coin_id,
            side: closed.side,
            size: closed.size,
            liquidation_price: closed.liquidation_price,
            mark_price,
            margin_lost: closed.pnl.negate(),
            margin_returned,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LedgerConfig;
    use crate::engine::Exchange;
    use crate::store::{FlakyStore, UserStore};
    use crate::types::{CoinId, Price, Side};
    use rust_decimal_macros::dec;

    #[test]
    fn liquidates_only_crossed_positions() {
        let mut ex = Exchange::in_memory(LedgerConfig::default()).unwrap();
        ex.update_price("bitcoin", "BTC", Price::new_unchecked(dec!(40000)));
        let long = ex.register("long@example.com", "password1", "Long").unwrap();
        let short = ex.register("short@example.com", "password1", "Short").unwrap();
        let btc = CoinId::new("bitcoin");

        // long liq 38000, short liq 40000 + 400 / 0.2 = 42000
        let long_pos = ex.open_position(long, &btc, Side::Long, dec!(10), dec!(0.02)).unwrap();
        ex.open_position(short, &btc, Side::Short, dec!(10), dec!(0.02)).unwrap();

        ex.update_price("bitcoin", "BTC", Price::new_unchecked(dec!(39000)));
        assert!(ex.check_liquidations().is_empty());

        ex.update_price("bitcoin", "BTC", Price::new_unchecked(dec!(37000)));
        let results = ex.check_liquidations();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].user_id, long);
        assert_eq!(results[0].position_id, long_pos);
        assert_eq!(results[0].liquidation_price.value(), dec!(38000));
        assert_eq!(results[0].margin_returned.value(), dec!(400));
        assert_eq!(results[0].margin_lost.value(), dec!(400));

        // 200 left over + 400 maintenance share
        assert_eq!(ex.get_user(long).unwrap().balances.margin.value(), dec!(600));
        assert!(ex.check_liquidations().is_empty());
    }

    #[test]
    fn failed_save_leaves_position_for_next_sweep() {
        let store = FlakyStore::default();
        let mut ex = Exchange::new(LedgerConfig::default(), Box::new(store.clone())).unwrap();
        ex.update_price("bitcoin", "BTC", Price::new_unchecked(dec!(40000)));
        let a = ex.register("a@example.com", "password1", "Anna").unwrap();
        let b = ex.register("b@example.com", "password1", "Ben").unwrap();
        let btc = CoinId::new("bitcoin");
        ex.open_position(a, &btc, Side::Long, dec!(10), dec!(0.02)).unwrap();
        ex.open_position(b, &btc, Side::Long, dec!(10), dec!(0.02)).unwrap();

        // first liquidation saves, the second hits a failing store
        store.user_saves_left.set(Some(1));
        ex.update_price("bitcoin", "BTC", Price::new_unchecked(dec!(37000)));
        let results = ex.check_liquidations();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].user_id, a);
        assert_eq!(ex.get_user(a).unwrap().open_positions().count(), 0);
        assert_eq!(ex.get_user(b).unwrap().open_positions().count(), 1);
        assert_eq!(store.inner.borrow().load_users().unwrap(), ex.users().to_vec());

        store.user_saves_left.set(None);
        let results = ex.check_liquidations();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].user_id, b);
        assert_eq!(store.inner.borrow().load_users().unwrap(), ex.users().to_vec());
        assert!(ex.users().iter().all(|u| u.open_positions().next().is_none()));
    }
}
