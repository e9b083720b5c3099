//! Spot buy and sell at the book price.

use super::core::Exchange;
use super::results::ExchangeError;
use crate::trading::{process_buy_transaction, process_sell_with_dust, SpotOrder};
use crate::trading::TradeError;
use crate::types::{CoinId, Quote, UserId};
use crate::validation::validate_amount;
use rust_decimal::Decimal;
use tracing::{info, warn};

impl Exchange {
    /// Buy `amount` of `coin_id` with fiat at the current book price.
    pub fn buy(&mut self, user_id: UserId, coin_id: &CoinId, amount: Decimal) -> Result<Quote, ExchangeError> {
        validate_amount("amount", amount)?;
        let (price, symbol) = self.price_of(coin_id)?;
        let order = SpotOrder::new(coin_id.clone(), symbol, amount, price);

        let next = process_buy_transaction(self.user(user_id)?, &order, self.current_time).map_err(|e| {
            warn!(user = user_id.0, coin = %coin_id, error = %e, "buy rejected");
            e
        })?;
        let cost = order.total().ok_or(TradeError::InvalidAmount(amount))?;
        self.commit(next)?;

        info!(user = user_id.0, coin = %coin_id, amount = %amount, price = %price, "buy filled");
        Ok(cost)
    }

    pub fn sell(&mut self, user_id: UserId, coin_id: &CoinId, amount: Decimal) -> Result<Quote, ExchangeError> {
        validate_amount("amount", amount)?;
        let (price, symbol) = self.price_of(coin_id)?;
        let order = SpotOrder::new(coin_id.clone(), symbol, amount, price);

        let next = process_sell_with_dust(self.user(user_id)?, &order, self.current_time, self.config.dust_threshold)
            .map_err(|e| {
                warn!(user = user_id.0, coin = %coin_id, error = %e, "sell rejected");
                e
            })?;
        let proceeds = order.total().ok_or(TradeError::InvalidAmount(amount))?;
        self.commit(next)?;

        info!(user = user_id.0, coin = %coin_id, amount = %amount, price = %price, "sell filled");
        Ok(proceeds)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LedgerConfig;
    use crate::engine::{Exchange, ExchangeError};
    use crate::trading::TradeError;
    use crate::types::{CoinId, Price};
    use crate::validation::ValidationError;
    use rust_decimal_macros::dec;

    fn setup() -> (Exchange, crate::types::UserId) {
        let mut ex = Exchange::in_memory(LedgerConfig::default()).unwrap();
        ex.update_price("bitcoin", "BTC", Price::new_unchecked(dec!(50000)));
        let id = ex.register("trader@example.com", "password1", "Trader").unwrap();
        (ex, id)
    }

    #[test]
    fn buy_then_sell_at_book_price() {
        let (mut ex, id) = setup();
        let btc = CoinId::new("bitcoin");

        let cost = ex.buy(id, &btc, dec!(0.1)).unwrap();
        assert_eq!(cost.value(), dec!(5000));
        assert_eq!(ex.get_user(id).unwrap().balances.fiat.value(), dec!(5000));

        ex.update_price("bitcoin", "BTC", Price::new_unchecked(dec!(60000)));
        let proceeds = ex.sell(id, &btc, dec!(0.1)).unwrap();
        assert_eq!(proceeds.value(), dec!(6000));

        let user = ex.get_user(id).unwrap();
        assert_eq!(user.balances.fiat.value(), dec!(11000));
        assert!(user.assets.is_empty());
        assert_eq!(user.transactions.len(), 2);
    }

    #[test]
    fn buy_without_price_fails() {
        let (mut ex, id) = setup();
        let err = ex.buy(id, &CoinId::new("solana"), dec!(1)).unwrap_err();
        assert!(matches!(err, ExchangeError::NoPrice(_)));
    }

    #[test]
    fn rejected_buy_leaves_user_unchanged() {
        let (mut ex, id) = setup();
        let before = ex.get_user(id).unwrap().clone();

        let err = ex.buy(id, &CoinId::new("bitcoin"), dec!(1)).unwrap_err();
        assert!(matches!(err, ExchangeError::Trade(TradeError::InsufficientFunds { .. })));
        assert_eq!(ex.get_user(id).unwrap(), &before);
    }

    #[test]
    fn non_positive_amounts_fail_validation() {
        let (mut ex, id) = setup();
        let btc = CoinId::new("bitcoin");

        let err = ex.buy(id, &btc, dec!(0)).unwrap_err();
        assert!(matches!(err, ExchangeError::Validation(ValidationError::NotPositive("amount"))));
        let err = ex.sell(id, &btc, dec!(-0.5)).unwrap_err();
        assert!(matches!(err, ExchangeError::Validation(ValidationError::NotPositive("amount"))));
        assert!(ex.get_user(id).unwrap().transactions.is_empty());
    }

    #[test]
    fn buy_past_decimal_range_rejected() {
        let (mut ex, id) = setup();
        let before = ex.get_user(id).unwrap().clone();

        let err = ex.buy(id, &CoinId::new("bitcoin"), rust_decimal::Decimal::MAX).unwrap_err();
        assert!(matches!(err, ExchangeError::Trade(TradeError::InvalidAmount(_))));
        assert_eq!(ex.get_user(id).unwrap(), &before);
    }
}
