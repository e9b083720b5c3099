// 8.0 config.rs: all ledger settings in one place. starting balances, dust, leverage cap,
// maintenance margin, form rules, quote freshness.
// 8.1 Environment presets, 8.2 env var overrides.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::asset::DUST_THRESHOLD;
use crate::futures::FuturesParams;
use crate::types::{Leverage, Quote};
use crate::user::Balances;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    // Balances every newly registered user starts with
    pub initial_balances: Balances,
    // Lots smaller than this after a sale are removed
    pub dust_threshold: Decimal,
    // Leverage cap and liquidation parameters
    pub futures: FuturesParams,
    // Minimum password length accepted by the forms
    pub min_password_len: usize,
    // Quotes older than this are reported stale
    pub max_quote_age_ms: i64,
    // Directory for the JSON store. None keeps everything in memory
    pub data_dir: Option<PathBuf>,
    // Registrations with these emails get the admin role
    pub admin_emails: Vec<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_balances: Balances::new(Quote::new(dec!(10000)), Quote::zero(), Quote::new(dec!(1000))),
            dust_threshold: DUST_THRESHOLD,
            futures: FuturesParams::default(),
            min_password_len: 8,
            max_quote_age_ms: 60_000,
            data_dir: None,
            admin_emails: vec!["admin@freddy.exchange".to_string()],
        }
    }
}

impl LedgerConfig {
    // Demo accounts get a deep wallet to play with
    pub fn demo() -> Self {
        let mut config = Self::default();
        config.initial_balances = Balances::new(
            Quote::new(dec!(100000)),
            Quote::new(dec!(10000)),
            Quote::new(dec!(25000)),
        );
        config
    }

    // Conservative: low leverage cap, larger maintenance share, no free money
    pub fn strict() -> Self {
        let mut config = Self::default();
        config.initial_balances = Balances::zero();
        config.futures.max_leverage = Leverage::new_unchecked(dec!(20));
        config.futures.liquidation.maintenance_margin_ratio = dec!(0.6);
        config.futures.liquidation.at_risk_buffer = dec!(0.15);
        config.min_password_len = 12;
        config.max_quote_age_ms = 30_000;
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratio = self.futures.liquidation.maintenance_margin_ratio;
        if ratio < Decimal::ZERO || ratio >= Decimal::ONE {
            return Err(ConfigError::InvalidMargin {
                reason: "maintenance margin ratio must be in [0, 1)".to_string(),
            });
        }

        let buffer = self.futures.liquidation.at_risk_buffer;
        if buffer < Decimal::ZERO || buffer >= Decimal::ONE {
            return Err(ConfigError::InvalidMargin {
                reason: "at risk buffer must be in [0, 1)".to_string(),
            });
        }

        if self.dust_threshold < Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                key: "dust_threshold".to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        let b = &self.initial_balances;
        if b.fiat.is_negative() || b.usdt.is_negative() || b.margin.is_negative() {
            return Err(ConfigError::InvalidValue {
                key: "initial_balances".to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        if self.min_password_len == 0 {
            return Err(ConfigError::InvalidValue {
                key: "min_password_len".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.max_quote_age_ms <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_quote_age_ms".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(())
    }

    pub fn max_leverage(&self) -> Decimal {
        self.futures.max_leverage.value()
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|e| e.eq_ignore_ascii_case(email.trim()))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(&std::env::vars().collect())
    }

    // 8.2: FREDDY_ENV picks the preset, the rest override single fields
    pub fn from_env_map(env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let environment = match env.get("FREDDY_ENV") {
            Some(raw) => raw.parse::<Environment>()?,
            None => Environment::Development,
        };
        let mut config = environment.config();

        if let Some(v) = parse_decimal(env, "FREDDY_INITIAL_FIAT")? {
            config.initial_balances.fiat = Quote::new(v);
        }
        if let Some(v) = parse_decimal(env, "FREDDY_INITIAL_USDT")? {
            config.initial_balances.usdt = Quote::new(v);
        }
        if let Some(v) = parse_decimal(env, "FREDDY_INITIAL_MARGIN")? {
            config.initial_balances.margin = Quote::new(v);
        }
        if let Some(v) = parse_decimal(env, "FREDDY_MAX_LEVERAGE")? {
            config.futures.max_leverage = Leverage::new(v).ok_or_else(|| ConfigError::InvalidValue {
                key: "FREDDY_MAX_LEVERAGE".to_string(),
                reason: "must be at least 1".to_string(),
            })?;
        }
        if let Some(v) = parse_decimal(env, "FREDDY_MAINTENANCE_MARGIN_RATIO")? {
            config.futures.liquidation.maintenance_margin_ratio = v;
        }
        if let Some(raw) = env.get("FREDDY_MIN_PASSWORD_LEN") {
            config.min_password_len = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "FREDDY_MIN_PASSWORD_LEN".to_string(),
                reason: "must be a non-negative integer".to_string(),
            })?;
        }
        if let Some(raw) = env.get("FREDDY_ADMIN_EMAILS") {
            config.admin_emails = raw
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(dir) = env.get("FREDDY_DATA_DIR").filter(|d| !d.trim().is_empty()) {
            config.data_dir = Some(PathBuf::from(dir.trim()));
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_decimal(env: &HashMap<String, String>, key: &str) -> Result<Option<Decimal>, ConfigError> {
    env.get(key)
        .map(|raw| {
            Decimal::from_str(raw.trim()).map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: format!("not a number: {raw}"),
            })
        })
        .transpose()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid margin settings: {reason}")]
    InvalidMargin { reason: String },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Unknown environment {0}, expected development, demo or strict")]
    UnknownEnvironment(String),
}

// 8.1: environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Demo,
    Strict,
}

impl Environment {
    pub fn config(&self) -> LedgerConfig {
        match self {
            Environment::Development => LedgerConfig::default(),
            Environment::Demo => LedgerConfig::demo(),
            Environment::Strict => LedgerConfig::strict(),
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "demo" => Ok(Environment::Demo),
            "strict" => Ok(Environment::Strict),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}
