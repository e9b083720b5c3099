// Price Book
//
// Snapshot of the latest quote per coin. The ledger never fetches prices itself;
// callers feed it either single quotes or a whole listing document in the shape the
// CoinMarketCap latest-listings endpoint returns, and valuation reads from here.

use crate::types::{CoinId, Price, Timestamp};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Decimal places kept from float prices in listing documents.
const LISTING_PRICE_DP: u32 = 18;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: Price,
    /// 24h change in percent, e.g. -2.5 for a 2.5% drop
    pub change_24h: Decimal,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceBook {
    quotes: HashMap<CoinId, PriceQuote>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_quote(&mut self, coin_id: CoinId, quote: PriceQuote) {
        self.quotes.insert(coin_id, quote);
    }

    /// Convenience for a bare price with no 24h change.
    pub fn set_price(&mut self, coin_id: impl Into<CoinId>, symbol: impl Into<String>, price: Price, timestamp: Timestamp) {
        self.set_quote(
            coin_id.into(),
            PriceQuote {
                symbol: symbol.into(),
                price,
                change_24h: Decimal::ZERO,
                updated_at: timestamp,
            },
        );
    }

    pub fn quote(&self, coin_id: &CoinId) -> Option<&PriceQuote> {
        self.quotes.get(coin_id)
    }

    pub fn price(&self, coin_id: &CoinId) -> Option<Price> {
        self.quotes.get(coin_id).map(|q| q.price)
    }

    pub fn quotes(&self) -> impl Iterator<Item = (&CoinId, &PriceQuote)> {
        self.quotes.iter()
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn is_stale(&self, coin_id: &CoinId, now: Timestamp, max_age_ms: i64) -> bool {
        match self.quotes.get(coin_id) {
            Some(q) => q.updated_at.elapsed_millis(&now) > max_age_ms,
            None => true,
        }
    }

    /// Merges a listing document into the book. Returns how many quotes were applied.
    /// Entries without a USD quote or with a null price are skipped; a non-positive
    /// price fails the whole batch.
    pub fn apply_listing(&mut self, json: &str, timestamp: Timestamp) -> Result<usize, PriceFeedError> {
        let listing: Listing = serde_json::from_str(json).map_err(|e| PriceFeedError::Parse(e.to_string()))?;

        let mut parsed = Vec::with_capacity(listing.data.len());
        for entry in listing.data {
            let Some(usd) = entry.quote.get("USD") else {
                continue;
            };
            let Some(raw_price) = usd.price else {
                continue;
            };

            let price = Decimal::from_f64(raw_price)
                .map(|p| p.round_dp(LISTING_PRICE_DP))
                .and_then(Price::new)
                .ok_or_else(|| PriceFeedError::InvalidPrice {
                    coin_id: entry.slug.clone(),
                    value: raw_price.to_string(),
                })?;

            let change_24h = usd
                .percent_change_24h
                .and_then(Decimal::from_f64)
                .map(|c| c.round_dp(4))
                .unwrap_or_default();

            parsed.push((
                CoinId::new(entry.slug),
                PriceQuote {
                    symbol: entry.symbol,
                    price,
                    change_24h,
                    updated_at: timestamp,
                },
            ));
        }

        let applied = parsed.len();
        for (coin_id, quote) in parsed {
            self.set_quote(coin_id, quote);
        }
        Ok(applied)
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: Vec<ListingEntry>,
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    symbol: String,
    slug: String,
    quote: HashMap<String, ListingQuote>,
}

#[derive(Debug, Deserialize)]
struct ListingQuote {
    price: Option<f64>,
    percent_change_24h: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceFeedError {
    #[error("Malformed listing: {0}")]
    Parse(String),

    #[error("Invalid price {value} for {coin_id}")]
    InvalidPrice { coin_id: String, value: String },
}
