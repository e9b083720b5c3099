// 9.0: exchange service. owns the users array, the price book and the session, and
// runs every mutation through the pure helpers before persisting the result.
// single-threaded: callers serialize access through &mut self.

mod admin;
mod core;
mod liquidations;
mod orders;
mod positions;
mod results;
mod wallet;

pub use core::Exchange;
pub use results::{ExchangeError, LiquidationResult, PositionStatus, UserSummary};
