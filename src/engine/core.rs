// 9.0 engine/core.rs: the exchange service. holds config, users, price book, session, clock.
// every accepted mutation goes through commit(), which overwrites the stored users array.

use super::results::ExchangeError;
use crate::config::LedgerConfig;
use crate::portfolio::{calculate_portfolio_value, summarize_portfolio, PortfolioSummary};
use crate::price_feed::{PriceBook, PriceQuote};
use crate::store::{MemoryStore, UserStore};
use crate::types::{CoinId, Price, Quote, Timestamp, UserId};
use crate::user::{Role, User};
use crate::validation::{normalize_email, validate_email, validate_name, validate_password, ValidationError};
use tracing::{debug, info, warn};

/** 9.1: main exchange struct. all state lives here */
#[derive(Debug)]
pub struct Exchange {
    pub(super) config: LedgerConfig,
    pub(super) store: Box<dyn UserStore>,
    pub(super) users: Vec<User>,
    pub(super) prices: PriceBook,
    pub(super) session: Option<UserId>,
    pub(super) current_time: Timestamp,
}

impl Exchange {
    /// Loads users and any saved session from `store`.
    pub fn new(config: LedgerConfig, store: Box<dyn UserStore>) -> Result<Self, ExchangeError> {
        config.validate()?;
        let users = store.load_users()?;
        let session = store
            .load_session()?
            .map(|u| u.id)
            .filter(|id| users.iter().any(|u| u.id == *id));

        info!(users = users.len(), session = ?session, "exchange loaded");

        Ok(Self {
            config,
            store,
            users,
            prices: PriceBook::new(),
            session,
            current_time: Timestamp::from_millis(0),
        })
    }

    pub fn in_memory(config: LedgerConfig) -> Result<Self, ExchangeError> {
        Self::new(config, Box::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = self.current_time.plus_millis(millis);
    }

    // 9.2: price book

    pub fn update_price(&mut self, coin_id: impl Into<CoinId>, symbol: impl Into<String>, price: Price) {
        let coin_id = coin_id.into();
        debug!(coin = %coin_id, price = %price, "price updated");
        self.prices.set_price(coin_id, symbol, price, self.current_time);
    }

    pub fn set_quote(&mut self, coin_id: CoinId, quote: PriceQuote) {
        self.prices.set_quote(coin_id, quote);
    }

    pub fn apply_listing(&mut self, json: &str) -> Result<usize, ExchangeError> {
        let applied = self.prices.apply_listing(json, self.current_time)?;
        debug!(applied, "listing applied");
        Ok(applied)
    }

    pub fn prices(&self) -> &PriceBook {
        &self.prices
    }

    pub fn stale_quotes(&self) -> Vec<CoinId> {
        let mut stale: Vec<CoinId> = self
            .prices
            .quotes()
            .filter(|(coin_id, _)| self.prices.is_stale(coin_id, self.current_time, self.config.max_quote_age_ms))
            .map(|(coin_id, _)| coin_id.clone())
            .collect();
        stale.sort();
        stale
    }

    pub(super) fn price_of(&self, coin_id: &CoinId) -> Result<(Price, String), ExchangeError> {
        self.prices
            .quote(coin_id)
            .map(|q| (q.price, q.symbol.clone()))
            .ok_or_else(|| ExchangeError::NoPrice(coin_id.clone()))
    }

    // 9.3: users and session

    pub fn register(&mut self, email: &str, password: &str, name: &str) -> Result<UserId, ExchangeError> {
        validate_email(email)?;
        validate_password(password, self.config.min_password_len)?;
        validate_name(name)?;

        let email = normalize_email(email);
        if self.users.iter().any(|u| u.email == email) {
            warn!(email = %email, "registration rejected, email taken");
            return Err(ValidationError::EmailTaken(email).into());
        }

        let id = UserId(self.users.iter().map(|u| u.id.0).max().unwrap_or(0) + 1);
        let mut user = User::new(id, email, name.trim(), self.config.initial_balances, self.current_time);
        if self.config.is_admin_email(&user.email) {
            user.role = Role::Admin;
        }

        let mut users = self.users.clone();
        users.push(user);
        self.store.save_users(&users)?;
        self.users = users;

        info!(user = id.0, "user registered");
        Ok(id)
    }

    /// Looks the user up by email. The password is only checked for form shape.
    pub fn login(&mut self, email: &str, password: &str) -> Result<UserId, ExchangeError> {
        validate_email(email)?;
        validate_password(password, self.config.min_password_len)?;

        let email = normalize_email(email);
        let user = self
            .users
            .iter()
            .find(|u| u.email == email)
            .ok_or(ExchangeError::InvalidCredentials)?;

        let id = user.id;
        self.store.save_session(Some(user))?;
        self.session = Some(id);

        info!(user = id.0, "logged in");
        Ok(id)
    }

    pub fn logout(&mut self) -> Result<(), ExchangeError> {
        self.store.save_session(None)?;
        if let Some(id) = self.session.take() {
            info!(user = id.0, "logged out");
        }
        Ok(())
    }

    pub fn session(&self) -> Option<UserId> {
        self.session
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.and_then(|id| self.users.iter().find(|u| u.id == id))
    }

    pub(crate) fn require_session(&self) -> Result<UserId, ExchangeError> {
        self.session.ok_or(ExchangeError::NotLoggedIn)
    }

    pub fn get_user(&self, user_id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    pub fn user(&self, user_id: UserId) -> Result<&User, ExchangeError> {
        self.get_user(user_id).ok_or(ExchangeError::UserNotFound(user_id))
    }

    pub fn find_by_email(&self, email: &str) -> Option<&User> {
        let email = normalize_email(email);
        self.users.iter().find(|u| u.email == email)
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    // 9.4: the store sees the new array before memory does. a failed users save changes nothing,
    // and once it succeeds memory follows even if the session snapshot can't be written.
    pub(super) fn commit(&mut self, user: User) -> Result<(), ExchangeError> {
        let index = self
            .users
            .iter()
            .position(|u| u.id == user.id)
            .ok_or(ExchangeError::UserNotFound(user.id))?;

        let mut users = self.users.clone();
        users[index] = user;
        self.store.save_users(&users)?;
        self.users = users;

        // the users array is the record; the session snapshot only carries the id on restore
        let user = &self.users[index];
        if self.session == Some(user.id) {
            if let Err(e) = self.store.save_session(Some(user)) {
                warn!(user = user.id.0, error = %e, "session snapshot not refreshed");
            }
        }
        Ok(())
    }

    pub(super) fn remove_user(&mut self, user_id: UserId) -> Result<User, ExchangeError> {
        let index = self
            .users
            .iter()
            .position(|u| u.id == user_id)
            .ok_or(ExchangeError::UserNotFound(user_id))?;

        let mut users = self.users.clone();
        let removed = users.remove(index);
        self.store.save_users(&users)?;
        self.users = users;

        if self.session == Some(user_id) {
            self.session = None;
            // a stale snapshot of a deleted user is dropped on restore
            if let Err(e) = self.store.save_session(None) {
                warn!(user = user_id.0, error = %e, "session record not cleared");
            }
        }
        Ok(removed)
    }

    // 9.5: valuation

    pub fn portfolio_value(&self, user_id: UserId) -> Result<Quote, ExchangeError> {
        let user = self.user(user_id)?;
        Ok(calculate_portfolio_value(&user.assets, &user.positions, &self.prices))
    }

    pub fn portfolio_summary(&self, user_id: UserId) -> Result<PortfolioSummary, ExchangeError> {
        let user = self.user(user_id)?;
        Ok(summarize_portfolio(user, &self.prices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FlakyStore;
    use crate::user::BalanceKind;
    use rust_decimal_macros::dec;

    fn exchange() -> Exchange {
        Exchange::in_memory(LedgerConfig::default()).unwrap()
    }

    #[test]
    fn register_assigns_ids_and_balances() {
        let mut ex = exchange();
        let alice = ex.register("alice@example.com", "password1", "Alice").unwrap();
        let bob = ex.register("bob@example.com", "password2", "Bob").unwrap();

        assert_eq!(alice, UserId(1));
        assert_eq!(bob, UserId(2));
        assert_eq!(ex.get_user(alice).unwrap().balances, ex.config().initial_balances);
    }

    #[test]
    fn register_rejects_duplicates_case_insensitively() {
        let mut ex = exchange();
        ex.register("alice@example.com", "password1", "Alice").unwrap();

        let err = ex.register("ALICE@example.com", "password1", "Alice 2").unwrap_err();
        assert!(matches!(err, ExchangeError::Validation(ValidationError::EmailTaken(_))));
        assert_eq!(ex.users().len(), 1);
    }

    #[test]
    fn register_validates_form() {
        let mut ex = exchange();
        assert!(matches!(
            ex.register("not-an-email", "password1", "Alice"),
            Err(ExchangeError::Validation(ValidationError::InvalidEmail(_)))
        ));
        assert!(matches!(
            ex.register("a@example.com", "short", "Alice"),
            Err(ExchangeError::Validation(ValidationError::PasswordTooShort { .. }))
        ));
        assert!(ex.users().is_empty());
    }

    #[test]
    fn admin_email_gets_admin_role() {
        let mut ex = exchange();
        let admin = ex.register("admin@freddy.exchange", "password1", "Admin").unwrap();
        assert!(ex.get_user(admin).unwrap().is_admin());
    }

    #[test]
    fn login_logout() {
        let mut ex = exchange();
        let id = ex.register("alice@example.com", "password1", "Alice").unwrap();

        assert!(matches!(ex.login("nobody@example.com", "password1"), Err(ExchangeError::InvalidCredentials)));
        assert_eq!(ex.login(" Alice@Example.com", "whatever1").unwrap(), id);
        assert_eq!(ex.current_user().unwrap().name, "Alice");

        ex.logout().unwrap();
        assert!(ex.current_user().is_none());
    }

    fn flaky_exchange() -> (Exchange, FlakyStore, UserId) {
        let store = FlakyStore::default();
        let mut ex = Exchange::new(LedgerConfig::default(), Box::new(store.clone())).unwrap();
        let id = ex.register("alice@example.com", "password1", "Alice").unwrap();
        ex.login("alice@example.com", "password1").unwrap();
        (ex, store, id)
    }

    #[test]
    fn failed_users_save_changes_nothing() {
        let (mut ex, store, id) = flaky_exchange();
        let before = ex.get_user(id).unwrap().clone();

        store.user_saves_left.set(Some(0));
        let err = ex.deposit(id, BalanceKind::Fiat, Quote::new(dec!(50))).unwrap_err();
        assert!(matches!(err, ExchangeError::Store(_)));

        assert_eq!(ex.get_user(id).unwrap(), &before);
        assert_eq!(store.inner.borrow().load_users().unwrap(), vec![before]);
    }

    #[test]
    fn failed_session_save_keeps_memory_and_store_in_step() {
        let (mut ex, store, id) = flaky_exchange();

        store.fail_session.set(true);
        let balance = ex.deposit(id, BalanceKind::Fiat, Quote::new(dec!(50))).unwrap();
        assert_eq!(balance.value(), dec!(10050));

        let stored = store.inner.borrow().load_users().unwrap();
        assert_eq!(stored, ex.users().to_vec());
        assert_eq!(ex.current_user().unwrap().balances.fiat.value(), dec!(10050));

        // restart resolves the session by id against the stored array
        let restored = Exchange::new(LedgerConfig::default(), Box::new(store.clone())).unwrap();
        assert_eq!(restored.current_user().unwrap().balances.fiat.value(), dec!(10050));
    }

    #[test]
    fn stale_quotes_follow_clock() {
        let mut ex = exchange();
        ex.update_price("bitcoin", "BTC", Price::new_unchecked(dec!(50000)));
        ex.advance_time(30_000);
        ex.update_price("ethereum", "ETH", Price::new_unchecked(dec!(3000)));

        ex.advance_time(30_001);
        assert_eq!(ex.stale_quotes(), vec![CoinId::new("bitcoin")]);
    }
}
