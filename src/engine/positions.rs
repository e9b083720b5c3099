//! Leveraged position open/close against the margin balance.

use super::core::Exchange;
use super::results::{ExchangeError, PositionStatus};
use crate::futures::{close_position, open_position, FuturesOrder};
use crate::liquidation::evaluate_liquidation;
use crate::position::calculate_position_pnl;
use crate::trading::TradeError;
use crate::types::{CoinId, Leverage, PositionId, Quote, Side, UserId};
use crate::validation::validate_amount;
use rust_decimal::Decimal;
use tracing::{info, warn};

impl Exchange {
    /// Opens a position at the current book price and returns its id.
    pub fn open_position(
        &mut self,
        user_id: UserId,
        coin_id: &CoinId,
        side: Side,
        leverage: Decimal,
        size: Decimal,
    ) -> Result<PositionId, ExchangeError> {
        validate_amount("size", size)?;
        let leverage = Leverage::new(leverage).ok_or(ExchangeError::InvalidLeverage(leverage))?;
        let (price, symbol) = self.price_of(coin_id)?;
        let order = FuturesOrder::new(coin_id.clone(), symbol, side, leverage, size, price);

        let user = self.user(user_id)?;
        let position_id = user.next_position_id();
        let next = open_position(user, &order, &self.config.futures, self.current_time).map_err(|e| {
            warn!(user = user_id.0, coin = %coin_id, error = %e, "open rejected");
            e
        })?;
        self.commit(next)?;

        info!(
            user = user_id.0,
            position = position_id.0,
            coin = %coin_id,
            side = %side,
            leverage = %leverage,
            size = %size,
            entry = %price,
            "position opened"
        );
        Ok(position_id)
    }

    /// Closes at the current book price and returns the realized P&L.
    pub fn close_position(&mut self, user_id: UserId, position_id: PositionId) -> Result<Quote, ExchangeError> {
        let user = self.user(user_id)?;
        let position = user
            .get_position(position_id)
            .ok_or(TradeError::PositionNotFound(position_id))?;
        let (price, _) = self.price_of(&position.coin_id)?;

        let next = close_position(user, position_id, price, self.current_time).map_err(|e| {
            warn!(user = user_id.0, position = position_id.0, error = %e, "close rejected");
            e
        })?;
        let realized = next
            .get_position(position_id)
            .map(|p| p.pnl)
            .unwrap_or_else(Quote::zero);
        self.commit(next)?;

        info!(user = user_id.0, position = position_id.0, exit = %price, pnl = %realized, "position closed");
        Ok(realized)
    }

    pub fn position_status(&self, user_id: UserId, position_id: PositionId) -> Result<PositionStatus, ExchangeError> {
        let position = self
            .user(user_id)?
            .get_position(position_id)
            .ok_or(TradeError::PositionNotFound(position_id))?;
        if !position.is_open {
            return Err(TradeError::PositionAlreadyClosed(position_id).into());
        }
        let (mark_price, _) = self.price_of(&position.coin_id)?;

        Ok(PositionStatus {
            position_id,
            mark_price,
            unrealized_pnl: calculate_position_pnl(position, mark_price),
            roe: position.roe(mark_price),
            status: evaluate_liquidation(position, mark_price, &self.config.futures.liquidation),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LedgerConfig;
    use crate::engine::{Exchange, ExchangeError};
    use crate::liquidation::LiquidationStatus;
    use crate::trading::TradeError;
    use crate::types::{CoinId, Price, Side, UserId};
    use crate::validation::ValidationError;
    use rust_decimal_macros::dec;

    fn setup() -> (Exchange, UserId) {
        let mut ex = Exchange::in_memory(LedgerConfig::default()).unwrap();
        ex.update_price("bitcoin", "BTC", Price::new_unchecked(dec!(40000)));
        let id = ex.register("perps@example.com", "password1", "Perps").unwrap();
        (ex, id)
    }

    #[test]
    fn open_and_close_long() {
        let (mut ex, id) = setup();
        let btc = CoinId::new("bitcoin");

        // margin = 0.02 * 40000 = 800 of the 1000 starting margin
        let pos = ex.open_position(id, &btc, Side::Long, dec!(10), dec!(0.02)).unwrap();
        assert_eq!(ex.get_user(id).unwrap().balances.margin.value(), dec!(200));

        // liquidation price 40000 - 400 / 0.2 = 38000
        ex.update_price("bitcoin", "BTC", Price::new_unchecked(dec!(38500)));
        let status = ex.position_status(id, pos).unwrap();
        assert_eq!(status.unrealized_pnl.value(), dec!(-300));
        assert_eq!(status.roe, dec!(-0.375));
        assert!(matches!(status.status, LiquidationStatus::AtRisk { .. }));

        ex.update_price("bitcoin", "BTC", Price::new_unchecked(dec!(45000)));
        let status = ex.position_status(id, pos).unwrap();
        assert!(matches!(status.status, LiquidationStatus::Safe { .. }));

        let realized = ex.close_position(id, pos).unwrap();
        assert_eq!(realized.value(), dec!(1000));
        assert_eq!(ex.get_user(id).unwrap().balances.margin.value(), dec!(2000));
    }

    #[test]
    fn rejects_leverage_below_one_and_above_cap() {
        let (mut ex, id) = setup();
        let btc = CoinId::new("bitcoin");

        assert!(matches!(
            ex.open_position(id, &btc, Side::Long, dec!(0.5), dec!(0.01)),
            Err(ExchangeError::InvalidLeverage(_))
        ));
        assert!(matches!(
            ex.open_position(id, &btc, Side::Long, dec!(101), dec!(0.01)),
            Err(ExchangeError::Trade(TradeError::InvalidLeverage { .. }))
        ));
    }

    #[test]
    fn rejects_non_positive_size() {
        let (mut ex, id) = setup();
        let result = ex.open_position(id, &CoinId::new("bitcoin"), Side::Long, dec!(5), dec!(0));
        assert!(matches!(result, Err(ExchangeError::Validation(ValidationError::NotPositive("size")))));
        assert!(ex.get_user(id).unwrap().positions.is_empty());
    }

    #[test]
    fn cannot_close_twice() {
        let (mut ex, id) = setup();
        let pos = ex.open_position(id, &CoinId::new("bitcoin"), Side::Short, dec!(2), dec!(0.01)).unwrap();
        ex.close_position(id, pos).unwrap();

        assert!(matches!(
            ex.close_position(id, pos),
            Err(ExchangeError::Trade(TradeError::PositionAlreadyClosed(_)))
        ));
    }
}
