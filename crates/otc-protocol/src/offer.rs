//! Offer lifecycle: `Created -> Approved -> Paid -> Fulfilled`, or
//! `Created | Approved -> Cancelled`. Every transition checks all of its
//! guards before it writes anything.

use serde::{Deserialize, Serialize};

use crate::config::{BPS_DENOMINATOR, EMERGENCY_UNLOCK_GRACE_SECS, MAX_PRICE_DEVIATION_BPS};
use crate::consignment::Consignment;
use crate::error::{DeskError, DeskResult};
use crate::identity::{non_zero, Identity};
use crate::oracle::{check_deviation, PriceOracle, PriceSnapshot};
use crate::settlement::{refund_excess, PaymentCurrency, Quote};
use crate::state::DeskState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferTerms {
    pub token_amount: u128,
    pub discount_bps: u16,
    pub currency: PaymentCurrency,
    /// Zero selects the desk's default unlock delay for desk offers.
    pub lockup_secs: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferStatus {
    Created,
    Approved,
    Paid,
    Fulfilled,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer<I> {
    pub id: u64,
    /// Zero for offers against the desk's own inventory.
    pub consignment_id: u64,
    pub beneficiary: I,
    pub token_amount: u128,
    pub discount_bps: u16,
    pub created_at: i64,
    pub unlock_time: i64,
    pub price_usd_per_token_8d: u64,
    pub native_usd_price_8d: u64,
    pub max_price_deviation_bps: u16,
    pub max_time_to_execute_secs: i64,
    pub currency: PaymentCurrency,
    pub approvals: Vec<I>,
    pub approved: bool,
    pub paid: bool,
    pub fulfilled: bool,
    pub cancelled: bool,
    pub payer: I,
    pub amount_paid: u128,
}

impl<I: Identity> Offer<I> {
    pub fn status(&self) -> OfferStatus {
        if self.cancelled {
            OfferStatus::Cancelled
        } else if self.fulfilled {
            OfferStatus::Fulfilled
        } else if self.paid {
            OfferStatus::Paid
        } else if self.approved {
            OfferStatus::Approved
        } else {
            OfferStatus::Created
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.fulfilled || self.cancelled
    }

    /// Still waiting on approval or payment.
    pub fn is_open(&self) -> bool {
        (!self.approved || !self.paid) && !self.cancelled
    }

    pub fn snapshot(&self) -> PriceSnapshot {
        PriceSnapshot { token_usd_8d: self.price_usd_per_token_8d, native_usd_8d: self.native_usd_price_8d }
    }

    /// Last second at which payment is accepted.
    pub fn payment_deadline(&self, quote_expiry_secs: i64) -> DeskResult<i64> {
        let quote_deadline = self.created_at.checked_add(quote_expiry_secs).ok_or(DeskError::Overflow)?;
        if self.max_time_to_execute_secs > 0 {
            let execute_by = self.created_at.checked_add(self.max_time_to_execute_secs).ok_or(DeskError::Overflow)?;
            return Ok(quote_deadline.min(execute_by));
        }
        Ok(quote_deadline)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment<I> {
    pub offer_id: u64,
    pub payer: I,
    pub currency: PaymentCurrency,
    pub required: u128,
    pub refund: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery<I> {
    pub offer_id: u64,
    pub beneficiary: I,
    pub amount: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund<I> {
    pub offer_id: u64,
    pub to: I,
    pub currency: PaymentCurrency,
    /// Zero when the offer had not been paid yet.
    pub amount: u128,
}

/// Checks that the consignment handed in is the one the offer was cut from.
pub(crate) fn linked<'a, I: Identity>(
    offer: &Offer<I>,
    consignment: Option<&'a mut Consignment<I>>,
) -> DeskResult<Option<&'a mut Consignment<I>>> {
    match (offer.consignment_id, consignment) {
        (0, None) => Ok(None),
        (0, Some(_)) => Err(DeskError::BadState),
        (_, None) => Err(DeskError::UnknownConsignment),
        (id, Some(c)) if c.id == id => Ok(Some(c)),
        _ => Err(DeskError::BadState),
    }
}

impl<I: Identity> DeskState<I> {
    pub fn create_offer<O: PriceOracle + ?Sized>(
        &mut self,
        beneficiary: I,
        terms: OfferTerms,
        oracle: &O,
        now: i64,
    ) -> DeskResult<Offer<I>> {
        self.ensure_active()?;
        non_zero(beneficiary)?;
        if terms.token_amount == 0 || terms.token_amount > self.limits.max_token_per_order {
            return Err(DeskError::AmountRange);
        }
        if terms.discount_bps as u64 > BPS_DENOMINATOR {
            return Err(DeskError::DiscountOutOfRange);
        }
        let lockup_secs = match terms.lockup_secs {
            0 => self.limits.default_unlock_delay_secs,
            secs => secs,
        };
        let unlock_time = self.unlock_time(lockup_secs, now)?;
        let snapshot = oracle.snapshot(self.max_price_age_secs, now)?;
        self.check_min_usd(terms.token_amount, terms.discount_bps, &snapshot)?;
        let (id, next_id) = self.peek_offer_id()?;

        self.inventory.reserve(terms.token_amount)?;
        self.next_offer_id = next_id;
        Ok(new_offer(id, 0, beneficiary, &terms, now, unlock_time, &snapshot, MAX_PRICE_DEVIATION_BPS, 0))
    }

    pub(crate) fn unlock_time(&self, lockup_secs: i64, now: i64) -> DeskResult<i64> {
        if lockup_secs < 0 {
            return Err(DeskError::AmountRange);
        }
        if lockup_secs > self.limits.max_lockup_secs {
            return Err(DeskError::LockupTooLong);
        }
        now.checked_add(lockup_secs).ok_or(DeskError::Overflow)
    }

    pub(crate) fn check_min_usd(&self, token_amount: u128, discount_bps: u16, snapshot: &PriceSnapshot) -> DeskResult<()> {
        let calc = self.calculator();
        let total = calc.total_usd_8d(token_amount, snapshot.token_usd_8d)?;
        let discounted = calc.discounted_usd_8d(total, discount_bps)?;
        if discounted < self.limits.min_usd_amount_8d as u128 {
            return Err(DeskError::MinUsdNotMet);
        }
        Ok(())
    }

    /// Records one operator's approval after re-reading the oracle. Returns
    /// whether the offer is now fully approved.
    pub fn approve_offer<O: PriceOracle + ?Sized>(
        &self,
        offer: &mut Offer<I>,
        approver: I,
        oracle: &O,
        now: i64,
    ) -> DeskResult<bool> {
        self.ensure_active()?;
        self.access.only_operator(&approver)?;
        if offer.cancelled || offer.paid || offer.fulfilled {
            return Err(DeskError::BadState);
        }
        if offer.approved || offer.approvals.contains(&approver) {
            return Err(DeskError::ApprovalConflict);
        }
        let quote = oracle.fresh_quote(self.max_price_age_secs, now)?;
        check_deviation(offer.price_usd_per_token_8d, quote.token_usd_8d, offer.max_price_deviation_bps)?;

        offer.approvals.push(approver);
        if offer.approvals.len() >= self.access.required_approvals as usize {
            offer.approved = true;
        }
        Ok(offer.approved)
    }

    pub fn required_payment(&self, offer: &Offer<I>, currency: PaymentCurrency) -> DeskResult<Quote> {
        self.calculator().quote(offer.token_amount, offer.discount_bps, &offer.snapshot(), currency)
    }

    pub fn fulfill_offer(
        &mut self,
        offer: &mut Offer<I>,
        consignment: Option<&mut Consignment<I>>,
        payer: I,
        currency: PaymentCurrency,
        sent: u128,
        now: i64,
    ) -> DeskResult<Payment<I>> {
        self.ensure_active()?;
        if offer.cancelled || offer.paid || offer.fulfilled {
            return Err(DeskError::BadState);
        }
        if !offer.approved {
            return Err(DeskError::NotApproved);
        }
        if offer.currency != currency {
            return Err(DeskError::CurrencyMismatch);
        }
        if now > offer.payment_deadline(self.limits.quote_expiry_secs)? {
            return Err(DeskError::OfferExpired);
        }
        if self.restrict_fulfill && payer != offer.beneficiary && !self.access.roles_of(&payer).is_operator() {
            return Err(DeskError::FulfillRestricted);
        }
        let consignment = linked(offer, consignment)?;
        let required = self.required_payment(offer, currency)?.required;
        let refund = refund_excess(sent, required)?;
        let treasury = self.treasury.credited(currency, required)?;
        if let Some(c) = consignment {
            c.settle_pending()?;
        }

        self.treasury = treasury;
        offer.paid = true;
        offer.payer = payer;
        offer.amount_paid = required;
        Ok(Payment { offer_id: offer.id, payer, currency, required, refund })
    }

    pub fn claim_offer(&mut self, offer: &mut Offer<I>, caller: I, now: i64) -> DeskResult<Delivery<I>> {
        self.ensure_active()?;
        check_deliverable(offer, now)?;
        if caller != offer.beneficiary {
            return Err(DeskError::UnauthorizedClaimant);
        }
        self.settle_delivery(offer)
    }

    /// Claim on the beneficiary's behalf, as run by batch processing.
    pub fn deliver_offer(&mut self, offer: &mut Offer<I>, now: i64) -> DeskResult<Delivery<I>> {
        check_deliverable(offer, now)?;
        self.settle_delivery(offer)
    }

    fn settle_delivery(&mut self, offer: &mut Offer<I>) -> DeskResult<Delivery<I>> {
        self.inventory.disburse(offer.token_amount)?;
        offer.fulfilled = true;
        Ok(Delivery { offer_id: offer.id, beneficiary: offer.beneficiary, amount: offer.token_amount })
    }

    pub fn cancel_offer(
        &mut self,
        offer: &mut Offer<I>,
        consignment: Option<&mut Consignment<I>>,
        caller: I,
        now: i64,
    ) -> DeskResult<()> {
        self.ensure_active()?;
        if offer.paid || offer.fulfilled || offer.cancelled {
            return Err(DeskError::BadState);
        }
        if !self.access.roles_of(&caller).is_operator() {
            if caller != offer.beneficiary {
                return Err(DeskError::Unauthorized);
            }
            let expiry = offer.created_at.checked_add(self.limits.quote_expiry_secs).ok_or(DeskError::Overflow)?;
            if now < expiry {
                return Err(DeskError::QuoteNotExpired);
            }
        }
        let consignment = linked(offer, consignment)?;
        self.return_inventory(offer, consignment, true)?;
        offer.cancelled = true;
        Ok(())
    }

    /// Escape hatch when delivery stalls: cancels the offer and, if it was
    /// paid, hands the payment back to the payer.
    pub fn emergency_refund(
        &mut self,
        offer: &mut Offer<I>,
        consignment: Option<&mut Consignment<I>>,
        caller: I,
        now: i64,
    ) -> DeskResult<Refund<I>> {
        if !self.emergency_refunds_enabled {
            return Err(DeskError::EmergencyRefundsDisabled);
        }
        if offer.fulfilled || offer.cancelled {
            return Err(DeskError::BadState);
        }
        let is_party = caller == offer.beneficiary || (offer.paid && caller == offer.payer);
        if !is_party && !self.access.roles_of(&caller).is_operator() {
            return Err(DeskError::Unauthorized);
        }
        let mut treasury = self.treasury;
        if offer.paid {
            let deadline = offer.created_at.checked_add(self.emergency_refund_deadline_secs).ok_or(DeskError::Overflow)?;
            let unlock_deadline = offer.unlock_time.checked_add(EMERGENCY_UNLOCK_GRACE_SECS).ok_or(DeskError::Overflow)?;
            if now < deadline && now < unlock_deadline {
                return Err(DeskError::TooEarlyForRefund);
            }
            treasury = treasury.debited(offer.currency, offer.amount_paid)?;
        }
        let consignment = linked(offer, consignment)?;
        self.return_inventory(offer, consignment, !offer.paid)?;

        self.treasury = treasury;
        offer.cancelled = true;
        let (to, amount) = if offer.paid { (offer.payer, offer.amount_paid) } else { (offer.beneficiary, 0) };
        Ok(Refund { offer_id: offer.id, to, currency: offer.currency, amount })
    }

    /// Hands an offer's tokens back to where they were reserved from.
    fn return_inventory(
        &mut self,
        offer: &Offer<I>,
        consignment: Option<&mut Consignment<I>>,
        was_pending: bool,
    ) -> DeskResult<()> {
        match consignment {
            Some(c) => c.restore(offer.token_amount, was_pending),
            None => self.inventory.release(offer.token_amount),
        }
    }
}

fn check_deliverable<I: Identity>(offer: &Offer<I>, now: i64) -> DeskResult<()> {
    if !offer.paid || offer.fulfilled || offer.cancelled {
        return Err(DeskError::BadState);
    }
    if now < offer.unlock_time {
        return Err(DeskError::LockupNotElapsed);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn new_offer<I: Identity>(
    id: u64,
    consignment_id: u64,
    beneficiary: I,
    terms: &OfferTerms,
    now: i64,
    unlock_time: i64,
    snapshot: &PriceSnapshot,
    max_price_deviation_bps: u16,
    max_time_to_execute_secs: i64,
) -> Offer<I> {
    Offer {
        id,
        consignment_id,
        beneficiary,
        token_amount: terms.token_amount,
        discount_bps: terms.discount_bps,
        created_at: now,
        unlock_time,
        price_usd_per_token_8d: snapshot.token_usd_8d,
        native_usd_price_8d: snapshot.native_usd_8d,
        max_price_deviation_bps,
        max_time_to_execute_secs,
        currency: terms.currency,
        approvals: Vec::new(),
        approved: false,
        paid: false,
        fulfilled: false,
        cancelled: false,
        payer: I::zero(),
        amount_paid: 0,
    }
}
