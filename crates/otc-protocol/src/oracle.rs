use serde::{Deserialize, Serialize};

use crate::config::{BPS_DENOMINATOR, MAX_PRICE_DEVIATION_BPS};
use crate::error::{DeskError, DeskResult};

pub const PRICE_DECIMALS: u32 = 8;

/// $10,000 per token.
pub const MAX_TOKEN_USD_8D: u64 = 1_000_000_000_000;
/// $0.01 .. $100,000 for the native asset.
pub const MIN_NATIVE_USD_8D: u64 = 1_000_000;
pub const MAX_NATIVE_USD_8D: u64 = 10_000_000_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub token_usd_8d: u64,
    pub native_usd_8d: u64,
    pub updated_at: i64,
}

impl PriceQuote {
    pub fn is_stale(&self, max_age_secs: i64, now: i64) -> bool {
        now.saturating_sub(self.updated_at) > max_age_secs
    }
}

/// Prices frozen onto an offer when it is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub token_usd_8d: u64,
    pub native_usd_8d: u64,
}

/// Read side of a token/USD plus native/USD price source. Reads fail fast;
/// callers decide what staleness means for them.
pub trait PriceOracle {
    fn current_quote(&self) -> DeskResult<PriceQuote>;

    fn fresh_quote(&self, max_age_secs: i64, now: i64) -> DeskResult<PriceQuote> {
        let quote = self.current_quote()?;
        if quote.token_usd_8d == 0 || quote.native_usd_8d == 0 {
            return Err(DeskError::NoPrice);
        }
        if quote.is_stale(max_age_secs, now) {
            return Err(DeskError::StalePrice);
        }
        Ok(quote)
    }

    fn snapshot(&self, max_age_secs: i64, now: i64) -> DeskResult<PriceSnapshot> {
        let quote = self.fresh_quote(max_age_secs, now)?;
        Ok(PriceSnapshot { token_usd_8d: quote.token_usd_8d, native_usd_8d: quote.native_usd_8d })
    }
}

impl<O: PriceOracle + ?Sized> PriceOracle for &O {
    fn current_quote(&self) -> DeskResult<PriceQuote> {
        (**self).current_quote()
    }
}

/// Prices pushed onto the desk, either by the owner or from a feed update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPrices {
    pub quote: PriceQuote,
}

impl StoredPrices {
    pub fn set(&mut self, token_usd_8d: u64, native_usd_8d: u64, now: i64) -> DeskResult<()> {
        check_bounds(token_usd_8d, native_usd_8d)?;
        self.quote = PriceQuote { token_usd_8d, native_usd_8d, updated_at: now };
        Ok(())
    }

    /// Applies a feed reading, refusing jumps from the previously stored
    /// prices larger than `max_deviation_bps`. The caller can only tighten
    /// the bound: zero or anything above `MAX_PRICE_DEVIATION_BPS` means
    /// `MAX_PRICE_DEVIATION_BPS`.
    pub fn apply_feed_update(
        &mut self,
        token_usd_8d: u64,
        native_usd_8d: u64,
        now: i64,
        max_deviation_bps: u16,
    ) -> DeskResult<()> {
        let bound = match max_deviation_bps {
            0 => MAX_PRICE_DEVIATION_BPS,
            bps => bps.min(MAX_PRICE_DEVIATION_BPS),
        };
        if self.quote.token_usd_8d > 0 {
            check_deviation(self.quote.token_usd_8d, token_usd_8d, bound)?;
        }
        if self.quote.native_usd_8d > 0 {
            check_deviation(self.quote.native_usd_8d, native_usd_8d, bound)?;
        }
        self.set(token_usd_8d, native_usd_8d, now)
    }
}

impl PriceOracle for StoredPrices {
    fn current_quote(&self) -> DeskResult<PriceQuote> {
        Ok(self.quote)
    }
}

fn check_bounds(token_usd_8d: u64, native_usd_8d: u64) -> DeskResult<()> {
    if token_usd_8d == 0 || token_usd_8d > MAX_TOKEN_USD_8D {
        return Err(DeskError::BadPrice);
    }
    if !(MIN_NATIVE_USD_8D..=MAX_NATIVE_USD_8D).contains(&native_usd_8d) {
        return Err(DeskError::BadPrice);
    }
    Ok(())
}

/// True when `current` is within `max_bps` of `reference`, inclusive.
pub fn within_deviation(reference: u64, current: u64, max_bps: u16) -> bool {
    let diff = reference.abs_diff(current) as u128;
    diff * BPS_DENOMINATOR as u128 <= reference as u128 * max_bps as u128
}

pub fn check_deviation(reference: u64, current: u64, max_bps: u16) -> DeskResult<()> {
    if !within_deviation(reference, current, max_bps) {
        return Err(DeskError::PriceDeviationExceeded);
    }
    Ok(())
}

/// Converts a feed answer `price * 10^exponent` into 8-decimal USD.
pub fn convert_feed_price(price: i64, exponent: i32) -> DeskResult<u64> {
    if price <= 0 {
        return Err(DeskError::BadPrice);
    }
    let exp_diff = exponent
        .checked_add(PRICE_DECIMALS as i32)
        .filter(|d| (-38..=38).contains(d))
        .ok_or(DeskError::BadPrice)?;
    let price = price as u128;
    let scaled = if exp_diff >= 0 {
        price.checked_mul(10u128.pow(exp_diff as u32)).ok_or(DeskError::Overflow)?
    } else {
        price / 10u128.pow((-exp_diff) as u32)
    };
    if scaled == 0 {
        return Err(DeskError::BadPrice);
    }
    u64::try_from(scaled).map_err(|_| DeskError::Overflow)
}
