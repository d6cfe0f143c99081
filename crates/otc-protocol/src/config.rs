use serde::{Deserialize, Serialize};

use crate::error::{DeskError, DeskResult};

pub const BPS_DENOMINATOR: u64 = 10_000;
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Drift allowed between an offer's creation snapshot and the price at approval.
pub const MAX_PRICE_DEVIATION_BPS: u16 = 2_000;
/// Hard ceiling for `Limits::max_lockup_secs`.
pub const MAX_LOCKUP_CEILING_SECS: i64 = 2 * 365 * SECONDS_PER_DAY;
/// Grace period after unlock after which a paid, unclaimed offer may be refunded.
pub const EMERGENCY_UNLOCK_GRACE_SECS: i64 = 30 * SECONDS_PER_DAY;

pub const MAX_BATCH_CLAIM: usize = 50;
pub const MAX_APPROVERS: usize = 32;
pub const MAX_REQUIRED_APPROVALS: u8 = 5;
pub const MAX_ALLOW_LIST: usize = 16;
/// Largest decimals accepted for any asset; keeps `10^decimals` and the
/// default order cap inside u128.
pub const MAX_ASSET_DECIMALS: u8 = 30;
/// Default `Limits::max_token_per_order`, in whole tokens.
pub const DEFAULT_MAX_TOKENS_PER_ORDER: u128 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDecimals {
    pub token: u8,
    pub native: u8,
    pub stable: u8,
}

impl AssetDecimals {
    /// ERC-20 sale token, ETH and USDC.
    pub const EVM: Self = Self { token: 18, native: 18, stable: 6 };

    /// SPL sale token with the mint's decimals, SOL in lamports and USDC.
    pub fn solana(token_decimals: u8) -> Self {
        Self { token: token_decimals, native: 9, stable: 6 }
    }

    pub fn validate(&self) -> DeskResult<()> {
        if [self.token, self.native, self.stable].iter().any(|d| *d > MAX_ASSET_DECIMALS) {
            return Err(DeskError::AmountRange);
        }
        Ok(())
    }

    pub fn token_unit(&self) -> DeskResult<u128> {
        10u128.checked_pow(self.token as u32).ok_or(DeskError::Overflow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub min_usd_amount_8d: u64,
    pub max_token_per_order: u128,
    pub quote_expiry_secs: i64,
    pub default_unlock_delay_secs: i64,
    pub max_lockup_secs: i64,
}

impl Limits {
    pub fn with_defaults(decimals: &AssetDecimals) -> DeskResult<Self> {
        let max_token_per_order = decimals
            .token_unit()?
            .checked_mul(DEFAULT_MAX_TOKENS_PER_ORDER)
            .ok_or(DeskError::Overflow)?;
        Ok(Self::with_max_order(max_token_per_order))
    }

    const fn with_max_order(max_token_per_order: u128) -> Self {
        Self {
            min_usd_amount_8d: 5_00000000,
            max_token_per_order,
            quote_expiry_secs: 30 * 60,
            default_unlock_delay_secs: 0,
            max_lockup_secs: 365 * SECONDS_PER_DAY,
        }
    }

    pub fn validate(&self) -> DeskResult<()> {
        if self.min_usd_amount_8d == 0 || self.max_token_per_order == 0 || self.quote_expiry_secs <= 0 {
            return Err(DeskError::AmountRange);
        }
        if self.max_lockup_secs < 0 {
            return Err(DeskError::AmountRange);
        }
        if self.max_lockup_secs > MAX_LOCKUP_CEILING_SECS {
            return Err(DeskError::LockupTooLong);
        }
        if self.default_unlock_delay_secs < 0 || self.default_unlock_delay_secs > self.max_lockup_secs {
            return Err(DeskError::AmountRange);
        }
        Ok(())
    }
}

/// Deployment parameters for a desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskConfig {
    pub token_id: [u8; 32],
    pub decimals: AssetDecimals,
    pub limits: Limits,
    pub max_price_age_secs: i64,
    pub required_approvals: u8,
    pub emergency_refund_deadline_secs: i64,
    pub required_gas_deposit: u128,
    pub max_open_offers_to_return: usize,
}

impl DeskConfig {
    /// Default parameters for a desk selling a token with `decimals`.
    pub fn new(token_id: [u8; 32], decimals: AssetDecimals) -> DeskResult<Self> {
        decimals.validate()?;
        Ok(Self::with_limits(token_id, decimals, Limits::with_defaults(&decimals)?))
    }

    fn with_limits(token_id: [u8; 32], decimals: AssetDecimals, limits: Limits) -> Self {
        Self {
            token_id,
            decimals,
            limits,
            max_price_age_secs: 3600,
            required_approvals: 1,
            emergency_refund_deadline_secs: 30 * SECONDS_PER_DAY,
            required_gas_deposit: 0,
            max_open_offers_to_return: 100,
        }
    }

    pub fn validate(&self) -> DeskResult<()> {
        self.decimals.validate()?;
        self.limits.validate()?;
        if self.max_price_age_secs < 0 || self.emergency_refund_deadline_secs < 0 {
            return Err(DeskError::AmountRange);
        }
        if self.required_approvals == 0 || self.required_approvals > MAX_REQUIRED_APPROVALS {
            return Err(DeskError::AmountRange);
        }
        if self.max_open_offers_to_return == 0 {
            return Err(DeskError::AmountRange);
        }
        Ok(())
    }
}

impl Default for DeskConfig {
    fn default() -> Self {
        let evm_unit = 1_000_000_000_000_000_000;
        let limits = Limits::with_max_order(DEFAULT_MAX_TOKENS_PER_ORDER * evm_unit);
        Self::with_limits([0u8; 32], AssetDecimals::EVM, limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_are_valid() {
        assert_eq!(DeskConfig::default().validate(), Ok(()));
        let sol = DeskConfig::new([1u8; 32], AssetDecimals::solana(9)).unwrap();
        assert_eq!(sol.limits.max_token_per_order, 10_000_000_000_000);
        assert_eq!(DeskConfig::new([0u8; 32], AssetDecimals::EVM), Ok(DeskConfig::default()));
    }

    #[test]
    fn oversized_decimals_are_rejected() {
        let decimals = |token, native| AssetDecimals { token, native, stable: 6 };
        assert!(DeskConfig::new([0u8; 32], decimals(MAX_ASSET_DECIMALS, 18)).is_ok());
        for token in [31, 36, 40, u8::MAX] {
            assert_eq!(DeskConfig::new([0u8; 32], decimals(token, 18)), Err(DeskError::AmountRange));
            assert_eq!(decimals(token, 18).token_unit().is_err(), token > 38);
        }
        assert_eq!(DeskConfig::new([0u8; 32], decimals(18, 255)), Err(DeskError::AmountRange));
        assert_eq!(Limits::with_defaults(&decimals(36, 18)), Err(DeskError::Overflow));

        let mut config = DeskConfig::default();
        config.decimals.token = 40;
        assert_eq!(config.validate(), Err(DeskError::AmountRange));
    }

    #[test]
    fn lockup_ceiling_is_two_years() {
        let mut limits = Limits::with_defaults(&AssetDecimals::EVM).unwrap();
        limits.max_lockup_secs = MAX_LOCKUP_CEILING_SECS;
        assert_eq!(limits.validate(), Ok(()));
        limits.max_lockup_secs += 1;
        assert_eq!(limits.validate(), Err(DeskError::LockupTooLong));
    }

    #[test]
    fn default_unlock_must_fit_max_lockup() {
        let mut limits = Limits::with_defaults(&AssetDecimals::EVM).unwrap();
        limits.default_unlock_delay_secs = limits.max_lockup_secs + 1;
        assert_eq!(limits.validate(), Err(DeskError::AmountRange));
    }

    #[test]
    fn config_loads_from_json() {
        let json = serde_json::to_string(&DeskConfig::default()).unwrap();
        let back: DeskConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DeskConfig::default());
    }
}
