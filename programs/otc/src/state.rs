use anchor_lang::prelude::*;
use otc_protocol::config::{MAX_ALLOW_LIST, MAX_APPROVERS, MAX_REQUIRED_APPROVALS};
use otc_protocol::oracle::convert_feed_price;
use otc_protocol::{
    AccessRegistry, AssetDecimals, ConsignmentTerms, DeskState, InventoryLedger, Limits, PaymentCurrency, PriceQuote,
    StoredPrices, Treasury,
};
use pyth_solana_receiver_sdk::price_update::Price;

use crate::error::OtcError;

/// Protocol identity for Solana accounts: the raw pubkey bytes.
pub type Id = [u8; 32];
pub type OfferRecord = otc_protocol::Offer<Id>;
pub type ConsignmentRecord = otc_protocol::Consignment<Id>;

/// Not served by the program; offers are enumerated off-chain.
const OPEN_OFFER_PAGE: usize = 100;

pub fn to_id(pubkey: &Pubkey) -> Id {
    pubkey.to_bytes()
}

pub fn to_pubkey(key: &Id) -> Pubkey {
    Pubkey::new_from_array(*key)
}

pub fn narrow(value: u128) -> Result<u64> {
    u64::try_from(value).map_err(|_| error!(OtcError::Overflow))
}

#[account]
#[derive(Default)]
pub struct Desk {
    pub owner: Pubkey,
    pub agent: Pubkey,
    pub approvers: Vec<Pubkey>,
    pub required_approvals: u8,
    pub token_mint: Pubkey,
    pub usdc_mint: Pubkey,
    pub token_decimals: u8,
    pub token_deposited: u64,
    pub token_reserved: u64,
    pub sol_collected: u64,
    pub usdc_collected: u64,
    pub deposits_held: u64,
    pub min_usd_amount_8d: u64,
    pub max_token_per_order: u64,
    pub quote_expiry_secs: i64,
    pub default_unlock_delay_secs: i64,
    pub max_lockup_secs: i64,
    pub max_price_age_secs: i64,
    pub token_usd_price_8d: u64,
    pub sol_usd_price_8d: u64,
    pub prices_updated_at: i64,
    pub token_price_feed_id: [u8; 32],
    pub sol_price_feed_id: [u8; 32],
    pub restrict_fulfill: bool,
    pub paused: bool,
    pub emergency_refund_enabled: bool,
    pub emergency_refund_deadline_secs: i64,
    pub next_consignment_id: u64,
    pub next_offer_id: u64,
}

impl Desk {
    pub const SIZE: usize = 32+32+(4+32*MAX_APPROVERS)+1+32+32+1+8+8+8+8+8+8+8+8+8+8+8+8+8+8+32+32+1+1+1+8+8+8;

    pub fn to_state(&self) -> Result<DeskState<Id>> {
        let inventory = InventoryLedger::from_parts(self.token_deposited as u128, self.token_reserved as u128)
            .map_err(OtcError::from)?;
        Ok(DeskState {
            access: AccessRegistry {
                owner: to_id(&self.owner),
                agent: to_id(&self.agent),
                approvers: self.approvers.iter().map(to_id).collect(),
                required_approvals: self.required_approvals,
            },
            inventory,
            treasury: Treasury {
                native: self.sol_collected as u128,
                stable: self.usdc_collected as u128,
                deposits: self.deposits_held as u128,
            },
            token_id: to_id(&self.token_mint),
            decimals: AssetDecimals::solana(self.token_decimals),
            limits: Limits {
                min_usd_amount_8d: self.min_usd_amount_8d,
                max_token_per_order: self.max_token_per_order as u128,
                quote_expiry_secs: self.quote_expiry_secs,
                default_unlock_delay_secs: self.default_unlock_delay_secs,
                max_lockup_secs: self.max_lockup_secs,
            },
            max_price_age_secs: self.max_price_age_secs,
            emergency_refunds_enabled: self.emergency_refund_enabled,
            emergency_refund_deadline_secs: self.emergency_refund_deadline_secs,
            restrict_fulfill: self.restrict_fulfill,
            paused: self.paused,
            required_gas_deposit: 0,
            max_open_offers_to_return: OPEN_OFFER_PAGE,
            next_offer_id: self.next_offer_id,
            next_consignment_id: self.next_consignment_id,
        })
    }

    /// Writes back everything a transition may touch. Mints, decimals and feed
    /// ids are fixed outside the protocol.
    pub fn store(&mut self, state: &DeskState<Id>) -> Result<()> {
        let token_deposited = narrow(state.inventory.total())?;
        let token_reserved = narrow(state.inventory.reserved())?;
        let sol_collected = narrow(state.treasury.native)?;
        let usdc_collected = narrow(state.treasury.stable)?;
        let deposits_held = narrow(state.treasury.deposits)?;
        let max_token_per_order = narrow(state.limits.max_token_per_order)?;

        self.owner = to_pubkey(&state.access.owner);
        self.agent = to_pubkey(&state.access.agent);
        self.approvers = state.access.approvers.iter().map(to_pubkey).collect();
        self.required_approvals = state.access.required_approvals;
        self.token_deposited = token_deposited;
        self.token_reserved = token_reserved;
        self.sol_collected = sol_collected;
        self.usdc_collected = usdc_collected;
        self.deposits_held = deposits_held;
        self.min_usd_amount_8d = state.limits.min_usd_amount_8d;
        self.max_token_per_order = max_token_per_order;
        self.quote_expiry_secs = state.limits.quote_expiry_secs;
        self.default_unlock_delay_secs = state.limits.default_unlock_delay_secs;
        self.max_lockup_secs = state.limits.max_lockup_secs;
        self.max_price_age_secs = state.max_price_age_secs;
        self.emergency_refund_enabled = state.emergency_refunds_enabled;
        self.emergency_refund_deadline_secs = state.emergency_refund_deadline_secs;
        self.restrict_fulfill = state.restrict_fulfill;
        self.paused = state.paused;
        self.next_offer_id = state.next_offer_id;
        self.next_consignment_id = state.next_consignment_id;
        Ok(())
    }

    pub fn prices(&self) -> StoredPrices {
        StoredPrices {
            quote: PriceQuote {
                token_usd_8d: self.token_usd_price_8d,
                native_usd_8d: self.sol_usd_price_8d,
                updated_at: self.prices_updated_at,
            },
        }
    }

    pub fn store_prices(&mut self, prices: &StoredPrices) {
        self.token_usd_price_8d = prices.quote.token_usd_8d;
        self.sol_usd_price_8d = prices.quote.native_usd_8d;
        self.prices_updated_at = prices.quote.updated_at;
    }

    /// Applies a pair of Pyth readings. The stored quote is as old as the
    /// older of the two publish times.
    pub fn apply_pyth(&mut self, token: &Price, sol: &Price, max_deviation_bps: u16) -> Result<StoredPrices> {
        let token_usd_8d = convert_feed_price(token.price, token.exponent).map_err(OtcError::from)?;
        let sol_usd_8d = convert_feed_price(sol.price, sol.exponent).map_err(OtcError::from)?;
        let mut prices = self.prices();
        prices
            .apply_feed_update(token_usd_8d, sol_usd_8d, token.publish_time.min(sol.publish_time), max_deviation_bps)
            .map_err(OtcError::from)?;
        self.store_prices(&prices);
        Ok(prices)
    }
}

#[account]
#[derive(Default)]
pub struct Offer {
    pub desk: Pubkey,
    pub id: u64,
    pub consignment_id: u64,
    pub beneficiary: Pubkey,
    pub token_amount: u64,
    pub discount_bps: u16,
    pub created_at: i64,
    pub unlock_time: i64,
    pub price_usd_per_token_8d: u64,
    pub sol_usd_price_8d: u64,
    pub max_price_deviation_bps: u16,
    pub max_time_to_execute_secs: i64,
    pub currency: u8,
    pub approvals: Vec<Pubkey>,
    pub approved: bool,
    pub paid: bool,
    pub fulfilled: bool,
    pub cancelled: bool,
    pub payer: Pubkey,
    pub amount_paid: u64,
}

impl Offer {
    pub const SIZE: usize = 32+8+8+32+8+2+8+8+8+8+2+8+1+(4+32*MAX_REQUIRED_APPROVALS as usize)+1+1+1+1+32+8;

    pub fn to_record(&self) -> Result<OfferRecord> {
        Ok(OfferRecord {
            id: self.id,
            consignment_id: self.consignment_id,
            beneficiary: to_id(&self.beneficiary),
            token_amount: self.token_amount as u128,
            discount_bps: self.discount_bps,
            created_at: self.created_at,
            unlock_time: self.unlock_time,
            price_usd_per_token_8d: self.price_usd_per_token_8d,
            native_usd_price_8d: self.sol_usd_price_8d,
            max_price_deviation_bps: self.max_price_deviation_bps,
            max_time_to_execute_secs: self.max_time_to_execute_secs,
            currency: PaymentCurrency::try_from(self.currency).map_err(OtcError::from)?,
            approvals: self.approvals.iter().map(to_id).collect(),
            approved: self.approved,
            paid: self.paid,
            fulfilled: self.fulfilled,
            cancelled: self.cancelled,
            payer: to_id(&self.payer),
            amount_paid: self.amount_paid as u128,
        })
    }

    pub fn store(&mut self, record: &OfferRecord) -> Result<()> {
        let token_amount = narrow(record.token_amount)?;
        let amount_paid = narrow(record.amount_paid)?;
        self.id = record.id;
        self.consignment_id = record.consignment_id;
        self.beneficiary = to_pubkey(&record.beneficiary);
        self.token_amount = token_amount;
        self.discount_bps = record.discount_bps;
        self.created_at = record.created_at;
        self.unlock_time = record.unlock_time;
        self.price_usd_per_token_8d = record.price_usd_per_token_8d;
        self.sol_usd_price_8d = record.native_usd_price_8d;
        self.max_price_deviation_bps = record.max_price_deviation_bps;
        self.max_time_to_execute_secs = record.max_time_to_execute_secs;
        self.currency = record.currency as u8;
        self.approvals = record.approvals.iter().map(to_pubkey).collect();
        self.approved = record.approved;
        self.paid = record.paid;
        self.fulfilled = record.fulfilled;
        self.cancelled = record.cancelled;
        self.payer = to_pubkey(&record.payer);
        self.amount_paid = amount_paid;
        Ok(())
    }
}

#[account]
#[derive(Default)]
pub struct Consignment {
    pub desk: Pubkey,
    pub id: u64,
    pub token_mint: Pubkey,
    pub consigner: Pubkey,
    pub total_amount: u64,
    pub remaining_amount: u64,
    pub unsold_amount: u64,
    pub is_negotiable: bool,
    pub fixed_discount_bps: u16,
    pub fixed_lockup_days: u32,
    pub min_discount_bps: u16,
    pub max_discount_bps: u16,
    pub min_lockup_days: u32,
    pub max_lockup_days: u32,
    pub min_deal_amount: u64,
    pub max_deal_amount: u64,
    pub is_fractionalized: bool,
    pub is_private: bool,
    pub allow_list: Vec<Pubkey>,
    pub max_price_volatility_bps: u16,
    pub max_time_to_execute_secs: i64,
    pub deposit: u64,
    pub pending_offers: u32,
    pub is_active: bool,
    pub withdrawn: bool,
    pub created_at: i64,
}

impl Consignment {
    pub const SIZE: usize = 32+8+32+32+8+8+8+1+2+4+2+2+4+4+8+8+1+1+(4+32*MAX_ALLOW_LIST)+2+8+8+4+1+1+8;

    pub fn terms(&self) -> ConsignmentTerms {
        if self.is_negotiable {
            ConsignmentTerms::Negotiable {
                min_discount_bps: self.min_discount_bps,
                max_discount_bps: self.max_discount_bps,
                min_lockup_days: self.min_lockup_days,
                max_lockup_days: self.max_lockup_days,
            }
        } else {
            ConsignmentTerms::Fixed { discount_bps: self.fixed_discount_bps, lockup_days: self.fixed_lockup_days }
        }
    }

    pub fn to_record(&self) -> ConsignmentRecord {
        ConsignmentRecord {
            id: self.id,
            consigner: to_id(&self.consigner),
            token_id: to_id(&self.token_mint),
            total_amount: self.total_amount as u128,
            remaining_amount: self.remaining_amount as u128,
            unsold_amount: self.unsold_amount as u128,
            terms: self.terms(),
            min_deal_amount: self.min_deal_amount as u128,
            max_deal_amount: self.max_deal_amount as u128,
            is_fractionalized: self.is_fractionalized,
            is_private: self.is_private,
            allow_list: self.allow_list.iter().map(to_id).collect(),
            max_price_volatility_bps: self.max_price_volatility_bps,
            max_time_to_execute_secs: self.max_time_to_execute_secs,
            deposit: self.deposit as u128,
            pending_offers: self.pending_offers,
            is_active: self.is_active,
            withdrawn: self.withdrawn,
            created_at: self.created_at,
        }
    }

    pub fn store(&mut self, record: &ConsignmentRecord) -> Result<()> {
        let total_amount = narrow(record.total_amount)?;
        let remaining_amount = narrow(record.remaining_amount)?;
        let unsold_amount = narrow(record.unsold_amount)?;
        let min_deal_amount = narrow(record.min_deal_amount)?;
        let max_deal_amount = narrow(record.max_deal_amount)?;
        let deposit = narrow(record.deposit)?;

        self.id = record.id;
        self.token_mint = to_pubkey(&record.token_id);
        self.consigner = to_pubkey(&record.consigner);
        self.total_amount = total_amount;
        self.remaining_amount = remaining_amount;
        self.unsold_amount = unsold_amount;
        match record.terms {
            ConsignmentTerms::Fixed { discount_bps, lockup_days } => {
                self.is_negotiable = false;
                self.fixed_discount_bps = discount_bps;
                self.fixed_lockup_days = lockup_days;
                self.min_discount_bps = 0;
                self.max_discount_bps = 0;
                self.min_lockup_days = 0;
                self.max_lockup_days = 0;
            }
            ConsignmentTerms::Negotiable { min_discount_bps, max_discount_bps, min_lockup_days, max_lockup_days } => {
                self.is_negotiable = true;
                self.fixed_discount_bps = 0;
                self.fixed_lockup_days = 0;
                self.min_discount_bps = min_discount_bps;
                self.max_discount_bps = max_discount_bps;
                self.min_lockup_days = min_lockup_days;
                self.max_lockup_days = max_lockup_days;
            }
        }
        self.min_deal_amount = min_deal_amount;
        self.max_deal_amount = max_deal_amount;
        self.is_fractionalized = record.is_fractionalized;
        self.is_private = record.is_private;
        self.allow_list = record.allow_list.iter().map(to_pubkey).collect();
        self.max_price_volatility_bps = record.max_price_volatility_bps;
        self.max_time_to_execute_secs = record.max_time_to_execute_secs;
        self.deposit = deposit;
        self.pending_offers = record.pending_offers;
        self.is_active = record.is_active;
        self.withdrawn = record.withdrawn;
        self.created_at = record.created_at;
        Ok(())
    }
}
