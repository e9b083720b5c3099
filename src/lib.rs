// freddy-core: ledger for a simulated crypto exchange.
// spot trading, leveraged futures, wallet balances, portfolio valuation.
// all ledger math is pure: a user snapshot goes in, a new snapshot or an error comes out.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: UserId, CoinId, Side, Price, Quote, Leverage, Timestamp
//   2.x  asset.rs: spot lots, weighted average cost, dust
//   3.x  trading.rs: spot buy/sell, TradeError
//   4.x  position.rs: position struct, PnL
//   5.x  liquidation.rs: liquidation price and status
//   6.x  futures.rs: open, close, liquidate
//   7.x  validation.rs: form checks
//   8.x  config.rs: balances, leverage cap, margins, env presets
//   9.x  engine/: exchange service: users, session, spot, positions, wallet, admin
//   10.x user.rs: user record + wallet balances
//   11.x transaction.rs: transaction log entries
//   12.x price_feed.rs: price book and listing parser
//   13.x portfolio.rs: valuation and summary
//   14.x store.rs: users array + session persistence
//   15.x api.rs: JSON request/response contract

// ledger modules
pub mod asset;
pub mod futures;
pub mod liquidation;
pub mod portfolio;
pub mod position;
pub mod trading;
pub mod transaction;
pub mod types;
pub mod user;

// service modules
pub mod api;
pub mod config;
pub mod engine;
pub mod price_feed;
pub mod store;
pub mod validation;

// re exports for convenience
pub use asset::*;
pub use engine::*;
pub use futures::*;
pub use liquidation::*;
pub use portfolio::*;
pub use position::*;
pub use trading::*;
pub use transaction::*;
pub use types::*;
pub use user::*;
pub use api::{ApiRequest, ApiResponse, ErrorCode};
pub use config::{ConfigError, Environment, LedgerConfig};
pub use price_feed::{PriceBook, PriceFeedError, PriceQuote};
pub use store::{JsonFileStore, MemoryStore, StoreError, UserStore};
pub use validation::ValidationError;
