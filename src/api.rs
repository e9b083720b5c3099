//! JSON request/response contract.
//!
//! Requests are tagged by `action` and act on the logged-in user. Every response
//! carries `success` and a human readable `message`; failures add an `error` code.

use crate::engine::{Exchange, ExchangeError};
use crate::trading::TradeError;
use crate::types::{CoinId, PositionId, Quote, Side};
use crate::user::{BalanceKind, UserError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ApiRequest {
    Register { email: String, password: String, name: String },
    Login { email: String, password: String },
    Logout,
    Buy { coin_id: CoinId, amount: Decimal },
    Sell { coin_id: CoinId, amount: Decimal },
    OpenPosition { coin_id: CoinId, side: Side, leverage: Decimal, size: Decimal },
    ClosePosition { position_id: PositionId },
    Deposit { balance: BalanceKind, amount: Decimal },
    Withdraw { balance: BalanceKind, amount: Decimal },
    Transfer { from: BalanceKind, to: BalanceKind, amount: Decimal },
    Portfolio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    InsufficientFunds,
    NotFound,
    Unauthorized,
    Storage,
    InvalidRequest,
}

impl From<&ExchangeError> for ErrorCode {
    fn from(err: &ExchangeError) -> Self {
        match err {
            ExchangeError::Validation(_)
            | ExchangeError::InvalidLeverage(_)
            | ExchangeError::Config(_)
            | ExchangeError::PriceFeed(_) => ErrorCode::Validation,
            ExchangeError::InvalidCredentials | ExchangeError::NotLoggedIn | ExchangeError::Unauthorized(_) => {
                ErrorCode::Unauthorized
            }
            ExchangeError::UserNotFound(_) | ExchangeError::NoPrice(_) => ErrorCode::NotFound,
            ExchangeError::Store(_) => ErrorCode::Storage,
            ExchangeError::User(e) => match e {
                UserError::InsufficientBalance { .. } => ErrorCode::InsufficientFunds,
                UserError::InvalidAmount(_) | UserError::SameBalance(_) => ErrorCode::Validation,
            },
            ExchangeError::Trade(e) => match e {
                TradeError::InsufficientFunds { .. }
                | TradeError::InsufficientAssets { .. }
                | TradeError::InsufficientMargin { .. } => ErrorCode::InsufficientFunds,
                TradeError::InvalidAmount(_) | TradeError::InvalidLeverage { .. } => ErrorCode::Validation,
                TradeError::AssetNotFound(_) | TradeError::PositionNotFound(_) => ErrorCode::NotFound,
                TradeError::PositionAlreadyClosed(_) | TradeError::NotLiquidatable(_) => ErrorCode::InvalidRequest,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            error: None,
        }
    }

    pub fn fail(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            error: Some(code),
        }
    }
}

impl From<ExchangeError> for ApiResponse {
    fn from(err: ExchangeError) -> Self {
        ApiResponse::fail(ErrorCode::from(&err), err.to_string())
    }
}

impl Exchange {
    pub fn handle(&mut self, request: ApiRequest) -> ApiResponse {
        match self.dispatch(request) {
            Ok(response) => response,
            Err(err) => err.into(),
        }
    }

    /// Parses, dispatches and serializes in one step. Malformed input gets an
    /// `invalid_request` response.
    pub fn handle_json(&mut self, raw: &str) -> String {
        let response = match serde_json::from_str::<ApiRequest>(raw) {
            Ok(request) => self.handle(request),
            Err(e) => {
                debug!(error = %e, "unparseable request");
                ApiResponse::fail(ErrorCode::InvalidRequest, format!("Malformed request: {e}"))
            }
        };
        serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"success":false,"message":"Response could not be encoded","error":"invalid_request"}"#.to_string()
        })
    }

    fn dispatch(&mut self, request: ApiRequest) -> Result<ApiResponse, ExchangeError> {
        let response = match request {
            ApiRequest::Register { email, password, name } => {
                let id = self.register(&email, &password, &name)?;
                ApiResponse::ok("Registered", Some(json!({ "user_id": id })))
            }
            ApiRequest::Login { email, password } => {
                let id = self.login(&email, &password)?;
                ApiResponse::ok("Logged in", Some(json!({ "user_id": id })))
            }
            ApiRequest::Logout => {
                self.logout()?;
                ApiResponse::ok("Logged out", None)
            }
            ApiRequest::Buy { coin_id, amount } => {
                let user_id = self.require_session()?;
                let total = self.buy(user_id, &coin_id, amount)?;
                ApiResponse::ok(format!("Bought {amount} {coin_id}"), Some(json!({ "total": total })))
            }
            ApiRequest::Sell { coin_id, amount } => {
                let user_id = self.require_session()?;
                let total = self.sell(user_id, &coin_id, amount)?;
                ApiResponse::ok(format!("Sold {amount} {coin_id}"), Some(json!({ "total": total })))
            }
            ApiRequest::OpenPosition { coin_id, side, leverage, size } => {
                let user_id = self.require_session()?;
                let position_id = self.open_position(user_id, &coin_id, side, leverage, size)?;
                ApiResponse::ok(
                    format!("Opened {side} {size} {coin_id}"),
                    Some(json!({ "position_id": position_id })),
                )
            }
            ApiRequest::ClosePosition { position_id } => {
                let user_id = self.require_session()?;
                let pnl = self.close_position(user_id, position_id)?;
                ApiResponse::ok("Position closed", Some(json!({ "pnl": pnl })))
            }
            ApiRequest::Deposit { balance, amount } => {
                let user_id = self.require_session()?;
                let new_balance = self.deposit(user_id, balance, Quote::new(amount))?;
                ApiResponse::ok(format!("Deposited {amount} to {balance}"), Some(json!({ "balance": new_balance })))
            }
            ApiRequest::Withdraw { balance, amount } => {
                let user_id = self.require_session()?;
                let new_balance = self.withdraw(user_id, balance, Quote::new(amount))?;
                ApiResponse::ok(format!("Withdrew {amount} from {balance}"), Some(json!({ "balance": new_balance })))
            }
            ApiRequest::Transfer { from, to, amount } => {
                let user_id = self.require_session()?;
                self.transfer(user_id, from, to, Quote::new(amount))?;
                ApiResponse::ok(format!("Moved {amount} from {from} to {to}"), None)
            }
            ApiRequest::Portfolio => {
                let user_id = self.require_session()?;
                let summary = self.portfolio_summary(user_id)?;
                ApiResponse::ok("Portfolio", serde_json::to_value(summary).ok())
            }
        };
        Ok(response)
    }
}
