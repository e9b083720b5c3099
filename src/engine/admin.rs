//! Admin-only operations. The acting user must hold the admin role.

use super::core::Exchange;
use super::results::{ExchangeError, UserSummary};
use crate::portfolio::calculate_portfolio_value;
use crate::types::{Quote, UserId};
use crate::user::BalanceKind;
use tracing::{info, warn};

impl Exchange {
    fn require_admin(&self, actor: UserId) -> Result<(), ExchangeError> {
        if self.user(actor)?.is_admin() {
            Ok(())
        } else {
            warn!(user = actor.0, "admin action refused");
            Err(ExchangeError::Unauthorized(actor))
        }
    }

    pub fn list_users(&self, actor: UserId) -> Result<Vec<UserSummary>, ExchangeError> {
        self.require_admin(actor)?;
        Ok(self
            .users
            .iter()
            .map(|u| UserSummary::new(u, calculate_portfolio_value(&u.assets, &u.positions, &self.prices)))
            .collect())
    }

    /// Sets a balance outright. Returns the signed change.
    pub fn adjust_balance(
        &mut self,
        actor: UserId,
        user_id: UserId,
        kind: BalanceKind,
        new_balance: Quote,
    ) -> Result<Quote, ExchangeError> {
        self.require_admin(actor)?;
        let mut next = self.user(user_id)?.clone();
        let delta = next.adjust_balance(kind, new_balance, self.current_time)?;
        self.commit(next)?;

        info!(admin = actor.0, user = user_id.0, balance = %kind, delta = %delta, "balance adjusted");
        Ok(delta)
    }

    pub fn delete_user(&mut self, actor: UserId, user_id: UserId) -> Result<(), ExchangeError> {
        self.require_admin(actor)?;
        let removed = self.remove_user(user_id)?;

        info!(admin = actor.0, user = user_id.0, email = %removed.email, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::LedgerConfig;
    use crate::engine::{Exchange, ExchangeError};
    use crate::types::Quote;
    use crate::user::BalanceKind;
    use rust_decimal_macros::dec;

    #[test]
    fn admin_actions_require_role() {
        let mut ex = Exchange::in_memory(LedgerConfig::default()).unwrap();
        let admin = ex.register("admin@freddy.exchange", "password1", "Admin").unwrap();
        let user = ex.register("user@example.com", "password1", "User").unwrap();

        assert!(matches!(ex.list_users(user), Err(ExchangeError::Unauthorized(_))));
        assert_eq!(ex.list_users(admin).unwrap().len(), 2);

        let delta = ex.adjust_balance(admin, user, BalanceKind::Usdt, Quote::new(dec!(250))).unwrap();
        assert_eq!(delta.value(), dec!(250));
        assert_eq!(ex.get_user(user).unwrap().balances.usdt.value(), dec!(250));

        assert!(matches!(ex.delete_user(user, admin), Err(ExchangeError::Unauthorized(_))));
        ex.delete_user(admin, user).unwrap();
        assert!(ex.get_user(user).is_none());
        assert_eq!(ex.users().len(), 1);
    }
}
