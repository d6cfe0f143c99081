//! Integer-only pricing of a deal: token amount and snapshot prices in,
//! exact payment due out. USD amounts carry 8 decimals throughout.

use serde::{Deserialize, Serialize};

use crate::config::{AssetDecimals, BPS_DENOMINATOR};
use crate::error::{DeskError, DeskResult};
use crate::oracle::{PriceSnapshot, PRICE_DECIMALS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PaymentCurrency {
    Native = 0,
    Stable = 1,
}

impl TryFrom<u8> for PaymentCurrency {
    type Error = DeskError;

    fn try_from(value: u8) -> DeskResult<Self> {
        match value {
            0 => Ok(PaymentCurrency::Native),
            1 => Ok(PaymentCurrency::Stable),
            _ => Err(DeskError::CurrencyMismatch),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub total_usd_8d: u128,
    pub discounted_usd_8d: u128,
    pub currency: PaymentCurrency,
    pub required: u128,
}

#[derive(Debug, Clone, Copy)]
pub struct SettlementCalculator {
    decimals: AssetDecimals,
}

impl SettlementCalculator {
    pub fn new(decimals: AssetDecimals) -> Self {
        Self { decimals }
    }

    pub fn total_usd_8d(&self, token_amount: u128, price_usd_8d: u64) -> DeskResult<u128> {
        mul_div_floor(token_amount, price_usd_8d as u128, pow10(self.decimals.token as u32)?)
    }

    pub fn discounted_usd_8d(&self, total_usd_8d: u128, discount_bps: u16) -> DeskResult<u128> {
        if discount_bps as u64 > BPS_DENOMINATOR {
            return Err(DeskError::DiscountOutOfRange);
        }
        let keep = (BPS_DENOMINATOR - discount_bps as u64) as u128;
        mul_div_floor(total_usd_8d, keep, BPS_DENOMINATOR as u128)
    }

    /// Native base units owed for `usd_8d`; rounds up.
    pub fn required_native(&self, usd_8d: u128, native_usd_8d: u64) -> DeskResult<u128> {
        if native_usd_8d == 0 {
            return Err(DeskError::NoPrice);
        }
        mul_div_ceil(usd_8d, pow10(self.decimals.native as u32)?, native_usd_8d as u128)
    }

    /// Stable base units owed for `usd_8d`, treating the stable asset as $1; rounds up.
    pub fn required_stable(&self, usd_8d: u128) -> DeskResult<u128> {
        mul_div_ceil(usd_8d, pow10(self.decimals.stable as u32)?, pow10(PRICE_DECIMALS)?)
    }

    pub fn quote(
        &self,
        token_amount: u128,
        discount_bps: u16,
        prices: &PriceSnapshot,
        currency: PaymentCurrency,
    ) -> DeskResult<Quote> {
        let total_usd_8d = self.total_usd_8d(token_amount, prices.token_usd_8d)?;
        let discounted_usd_8d = self.discounted_usd_8d(total_usd_8d, discount_bps)?;
        let required = match currency {
            PaymentCurrency::Native => self.required_native(discounted_usd_8d, prices.native_usd_8d)?,
            PaymentCurrency::Stable => self.required_stable(discounted_usd_8d)?,
        };
        Ok(Quote { total_usd_8d, discounted_usd_8d, currency, required })
    }
}

/// Excess returned to the payer. Underpayment is refused outright.
pub fn refund_excess(sent: u128, required: u128) -> DeskResult<u128> {
    sent.checked_sub(required).ok_or(DeskError::InsufficientPayment)
}

fn pow10(exp: u32) -> DeskResult<u128> {
    10u128.checked_pow(exp).ok_or(DeskError::Overflow)
}

fn mul_div_floor(a: u128, b: u128, d: u128) -> DeskResult<u128> {
    a.checked_mul(b).and_then(|x| x.checked_div(d)).ok_or(DeskError::Overflow)
}

fn mul_div_ceil(a: u128, b: u128, d: u128) -> DeskResult<u128> {
    if d == 0 {
        return Err(DeskError::Overflow);
    }
    let prod = a.checked_mul(b).ok_or(DeskError::Overflow)?;
    let q = prod / d;
    Ok(if prod % d == 0 { q } else { q + 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ETH: u128 = 1_000_000_000_000_000_000;

    fn evm() -> SettlementCalculator {
        SettlementCalculator::new(AssetDecimals::EVM)
    }

    fn snapshot() -> PriceSnapshot {
        // $0.10 token, $3000 ETH
        PriceSnapshot { token_usd_8d: 10_000_000, native_usd_8d: 3000_00000000 }
    }

    #[test]
    fn thousand_tokens_at_ten_cents() {
        let quote = evm().quote(1_000 * ETH, 0, &snapshot(), PaymentCurrency::Stable).unwrap();
        assert_eq!(quote.total_usd_8d, 100_00000000);
        assert_eq!(quote.discounted_usd_8d, 100_00000000);
        assert_eq!(quote.required, 100_000_000); // 100 USDC
    }

    #[test]
    fn discount_applies_before_conversion() {
        let quote = evm().quote(1_000 * ETH, 1_500, &snapshot(), PaymentCurrency::Stable).unwrap();
        assert_eq!(quote.discounted_usd_8d, 85_00000000);
        assert_eq!(quote.required, 85_000_000);
    }

    #[test]
    fn native_payment_rounds_up() {
        // $100 / $3000 = 0.0333.. ETH
        let quote = evm().quote(1_000 * ETH, 0, &snapshot(), PaymentCurrency::Native).unwrap();
        assert_eq!(quote.required, 33_333_333_333_333_334);
    }

    #[test]
    fn stable_rescale_rounds_up_sub_cent_dust() {
        // 1 token-wei worth of USD still costs one stable base unit when non-zero
        let calc = evm();
        assert_eq!(calc.required_stable(1), Ok(1));
        assert_eq!(calc.required_stable(100), Ok(1));
        assert_eq!(calc.required_stable(101), Ok(2));
        assert_eq!(calc.required_stable(0), Ok(0));
    }

    #[test]
    fn solana_decimals() {
        let calc = SettlementCalculator::new(AssetDecimals::solana(9));
        // 1 token at $10, SOL at $100
        let prices = PriceSnapshot { token_usd_8d: 1_000_000_000, native_usd_8d: 100_00000000 };
        let native = calc.quote(1_000_000_000, 0, &prices, PaymentCurrency::Native).unwrap();
        assert_eq!(native.required, 100_000_000); // 0.1 SOL
        let stable = calc.quote(1_000_000_000, 0, &prices, PaymentCurrency::Stable).unwrap();
        assert_eq!(stable.required, 10_000_000);
    }

    #[test]
    fn full_discount_costs_nothing() {
        let quote = evm().quote(ETH, 10_000, &snapshot(), PaymentCurrency::Native).unwrap();
        assert_eq!(quote.required, 0);
        assert_eq!(evm().discounted_usd_8d(1, 10_001), Err(DeskError::DiscountOutOfRange));
    }

    #[test]
    fn refunds() {
        assert_eq!(refund_excess(150, 100), Ok(50));
        assert_eq!(refund_excess(100, 100), Ok(0));
        assert_eq!(refund_excess(99, 100), Err(DeskError::InsufficientPayment));
    }

    #[test]
    fn missing_native_price() {
        let prices = PriceSnapshot { token_usd_8d: 10_000_000, native_usd_8d: 0 };
        assert_eq!(evm().quote(ETH, 0, &prices, PaymentCurrency::Native), Err(DeskError::NoPrice));
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(evm().total_usd_8d(u128::MAX, 2), Err(DeskError::Overflow));
    }

    #[test]
    fn currency_codes() {
        assert_eq!(PaymentCurrency::try_from(0), Ok(PaymentCurrency::Native));
        assert_eq!(PaymentCurrency::try_from(1), Ok(PaymentCurrency::Stable));
        assert_eq!(PaymentCurrency::try_from(2), Err(DeskError::CurrencyMismatch));
    }
}
