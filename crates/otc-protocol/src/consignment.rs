use serde::{Deserialize, Serialize};

use crate::config::{BPS_DENOMINATOR, MAX_ALLOW_LIST, MAX_PRICE_DEVIATION_BPS, SECONDS_PER_DAY};
use crate::error::{DeskError, DeskResult};
use crate::identity::{non_zero, Identity};
use crate::offer::{new_offer, Offer, OfferTerms};
use crate::oracle::PriceOracle;
use crate::state::DeskState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsignmentTerms {
    Fixed { discount_bps: u16, lockup_days: u32 },
    Negotiable { min_discount_bps: u16, max_discount_bps: u16, min_lockup_days: u32, max_lockup_days: u32 },
}

impl ConsignmentTerms {
    fn validate(&self) -> DeskResult<()> {
        let (min_discount, max_discount, min_days, max_days) = self.bounds();
        if min_discount > max_discount || max_discount as u64 > BPS_DENOMINATOR {
            return Err(DeskError::DiscountOutOfRange);
        }
        if min_days > max_days {
            return Err(DeskError::LockupOutOfRange);
        }
        Ok(())
    }

    fn bounds(&self) -> (u16, u16, u32, u32) {
        match *self {
            ConsignmentTerms::Fixed { discount_bps, lockup_days } => (discount_bps, discount_bps, lockup_days, lockup_days),
            ConsignmentTerms::Negotiable { min_discount_bps, max_discount_bps, min_lockup_days, max_lockup_days } => {
                (min_discount_bps, max_discount_bps, min_lockup_days, max_lockup_days)
            }
        }
    }

    /// Lockups are matched in whole days.
    pub fn admits(&self, discount_bps: u16, lockup_secs: i64) -> DeskResult<()> {
        let (min_discount, max_discount, min_days, max_days) = self.bounds();
        if !(min_discount..=max_discount).contains(&discount_bps) {
            return Err(DeskError::DiscountOutOfRange);
        }
        let days = lockup_secs / SECONDS_PER_DAY;
        if lockup_secs < 0 || !(min_days as i64..=max_days as i64).contains(&days) {
            return Err(DeskError::LockupOutOfRange);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsignmentParams<I> {
    pub token_id: [u8; 32],
    pub amount: u128,
    pub terms: ConsignmentTerms,
    pub min_deal_amount: u128,
    pub max_deal_amount: u128,
    pub is_fractionalized: bool,
    pub is_private: bool,
    pub allow_list: Vec<I>,
    /// Zero falls back to the desk-wide deviation limit.
    pub max_price_volatility_bps: u16,
    pub max_time_to_execute_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consignment<I> {
    pub id: u64,
    pub consigner: I,
    pub token_id: [u8; 32],
    pub total_amount: u128,
    pub remaining_amount: u128,
    /// Leftover of a single-fill consignment while its one offer is live.
    pub unsold_amount: u128,
    pub terms: ConsignmentTerms,
    pub min_deal_amount: u128,
    pub max_deal_amount: u128,
    pub is_fractionalized: bool,
    pub is_private: bool,
    pub allow_list: Vec<I>,
    pub max_price_volatility_bps: u16,
    pub max_time_to_execute_secs: i64,
    pub deposit: u128,
    /// Linked offers not yet paid, cancelled or refunded.
    pub pending_offers: u32,
    pub is_active: bool,
    pub withdrawn: bool,
    pub created_at: i64,
}

impl<I: Identity> Consignment<I> {
    pub fn visible_to(&self, who: &I) -> bool {
        !self.is_private || *who == self.consigner || self.allow_list.contains(who)
    }

    fn take(&mut self, amount: u128) -> DeskResult<()> {
        if amount > self.remaining_amount {
            return Err(DeskError::InventoryExhausted);
        }
        let rest = self.remaining_amount - amount;
        let pending = self.pending_offers.checked_add(1).ok_or(DeskError::Overflow)?;
        let (remaining, unsold) = if self.is_fractionalized {
            (rest, self.unsold_amount)
        } else {
            (0, self.unsold_amount.checked_add(rest).ok_or(DeskError::Overflow)?)
        };
        self.remaining_amount = remaining;
        self.unsold_amount = unsold;
        self.pending_offers = pending;
        if remaining == 0 {
            self.is_active = false;
        }
        Ok(())
    }

    /// Puts an offer's tokens back on the consignment after cancel or refund.
    pub(crate) fn restore(&mut self, amount: u128, was_pending: bool) -> DeskResult<()> {
        let pending = match was_pending {
            true => self.pending_offers.checked_sub(1).ok_or(DeskError::BadState)?,
            false => self.pending_offers,
        };
        let remaining = amount
            .checked_add(self.unsold_amount)
            .and_then(|returned| returned.checked_add(self.remaining_amount))
            .ok_or(DeskError::Overflow)?;
        self.pending_offers = pending;
        self.unsold_amount = 0;
        self.remaining_amount = remaining;
        if !self.withdrawn {
            self.is_active = true;
        }
        Ok(())
    }

    pub(crate) fn settle_pending(&mut self) -> DeskResult<()> {
        self.pending_offers = self.pending_offers.checked_sub(1).ok_or(DeskError::BadState)?;
        Ok(())
    }

    pub fn deviation_bps(&self) -> u16 {
        match self.max_price_volatility_bps {
            0 => MAX_PRICE_DEVIATION_BPS,
            bps => bps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsignmentWithdrawal<I> {
    pub consignment_id: u64,
    pub consigner: I,
    pub tokens: u128,
    pub deposit: u128,
}

impl<I: Identity> DeskState<I> {
    /// Registers a listing whose tokens the consigner has just transferred in.
    pub fn create_consignment(
        &mut self,
        consigner: I,
        params: ConsignmentParams<I>,
        deposit: u128,
        now: i64,
    ) -> DeskResult<Consignment<I>> {
        self.ensure_active()?;
        non_zero(consigner)?;
        if params.token_id != self.token_id {
            return Err(DeskError::UnsupportedToken);
        }
        if params.amount == 0 || params.min_deal_amount > params.max_deal_amount {
            return Err(DeskError::AmountRange);
        }
        params.terms.validate()?;
        if params.max_price_volatility_bps as u64 > BPS_DENOMINATOR || params.max_time_to_execute_secs < 0 {
            return Err(DeskError::AmountRange);
        }
        if params.allow_list.len() > MAX_ALLOW_LIST {
            return Err(DeskError::AmountRange);
        }
        if deposit < self.required_gas_deposit {
            return Err(DeskError::InsufficientDeposit);
        }
        let (id, next_id) = self.peek_consignment_id()?;
        let mut inventory = self.inventory;
        inventory.deposit(params.amount)?;
        inventory.reserve(params.amount)?;
        let mut treasury = self.treasury;
        treasury.deposits = treasury.deposits.checked_add(deposit).ok_or(DeskError::Overflow)?;

        self.inventory = inventory;
        self.treasury = treasury;
        self.next_consignment_id = next_id;
        Ok(Consignment {
            id,
            consigner,
            token_id: params.token_id,
            total_amount: params.amount,
            remaining_amount: params.amount,
            unsold_amount: 0,
            terms: params.terms,
            min_deal_amount: params.min_deal_amount,
            max_deal_amount: params.max_deal_amount,
            is_fractionalized: params.is_fractionalized,
            is_private: params.is_private,
            allow_list: params.allow_list,
            max_price_volatility_bps: params.max_price_volatility_bps,
            max_time_to_execute_secs: params.max_time_to_execute_secs,
            deposit,
            pending_offers: 0,
            is_active: true,
            withdrawn: false,
            created_at: now,
        })
    }

    pub fn create_offer_from_consignment<O: PriceOracle + ?Sized>(
        &mut self,
        consignment: &mut Consignment<I>,
        beneficiary: I,
        terms: OfferTerms,
        oracle: &O,
        now: i64,
    ) -> DeskResult<Offer<I>> {
        self.ensure_active()?;
        non_zero(beneficiary)?;
        if !consignment.is_active {
            return Err(DeskError::ConsignmentInactive);
        }
        if !consignment.visible_to(&beneficiary) {
            return Err(DeskError::NotOnAllowList);
        }
        if terms.token_amount == 0
            || terms.token_amount < consignment.min_deal_amount
            || terms.token_amount > consignment.max_deal_amount
        {
            return Err(DeskError::AmountRange);
        }
        if terms.token_amount > consignment.remaining_amount {
            return Err(DeskError::InventoryExhausted);
        }
        consignment.terms.admits(terms.discount_bps, terms.lockup_secs)?;
        let unlock_time = self.unlock_time(terms.lockup_secs, now)?;
        let snapshot = oracle.snapshot(self.max_price_age_secs, now)?;
        self.check_min_usd(terms.token_amount, terms.discount_bps, &snapshot)?;
        let (id, next_id) = self.peek_offer_id()?;

        consignment.take(terms.token_amount)?;
        self.next_offer_id = next_id;
        Ok(new_offer(
            id,
            consignment.id,
            beneficiary,
            &terms,
            now,
            unlock_time,
            &snapshot,
            consignment.deviation_bps(),
            consignment.max_time_to_execute_secs,
        ))
    }

    /// Returns unsold tokens and the held deposit to the consigner.
    pub fn withdraw_consignment(
        &mut self,
        consignment: &mut Consignment<I>,
        caller: I,
    ) -> DeskResult<ConsignmentWithdrawal<I>> {
        if caller != consignment.consigner {
            return Err(DeskError::Unauthorized);
        }
        if consignment.pending_offers > 0 {
            return Err(DeskError::ConsignmentHasPendingOffers);
        }
        let tokens = consignment.remaining_amount.checked_add(consignment.unsold_amount).ok_or(DeskError::Overflow)?;
        if tokens == 0 && consignment.deposit == 0 {
            return Err(DeskError::BadState);
        }
        let mut inventory = self.inventory;
        inventory.disburse(tokens)?;
        let mut treasury = self.treasury;
        treasury.deposits = treasury.deposits.checked_sub(consignment.deposit).ok_or(DeskError::TreasuryExhausted)?;

        self.inventory = inventory;
        self.treasury = treasury;
        let deposit = consignment.deposit;
        consignment.remaining_amount = 0;
        consignment.unsold_amount = 0;
        consignment.deposit = 0;
        consignment.is_active = false;
        consignment.withdrawn = true;
        Ok(ConsignmentWithdrawal { consignment_id: consignment.id, consigner: consignment.consigner, tokens, deposit })
    }
}
