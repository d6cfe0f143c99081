//! Arena of offer and consignment records around one [`DeskState`], for
//! hosts that keep every record in a single storage space.

use std::collections::BTreeMap;

use crate::batch::BatchReport;
use crate::config::{DeskConfig, Limits};
use crate::consignment::{Consignment, ConsignmentParams, ConsignmentWithdrawal};
use crate::error::{DeskError, DeskResult};
use crate::events::DeskEvent;
use crate::identity::Identity;
use crate::offer::{Delivery, Offer, OfferTerms, Payment, Refund};
use crate::oracle::{PriceOracle, StoredPrices};
use crate::settlement::PaymentCurrency;
use crate::state::{DeskState, Treasury};

#[derive(Debug, Clone)]
pub struct Desk<I, O = StoredPrices> {
    state: DeskState<I>,
    oracle: O,
    offers: BTreeMap<u64, Offer<I>>,
    consignments: BTreeMap<u64, Consignment<I>>,
    by_beneficiary: BTreeMap<I, Vec<u64>>,
    events: Vec<DeskEvent<I>>,
}

impl<I: Identity, O: PriceOracle> Desk<I, O> {
    pub fn new(owner: I, agent: I, config: &DeskConfig, oracle: O) -> DeskResult<Self> {
        Ok(Self {
            state: DeskState::new(owner, agent, config)?,
            oracle,
            offers: BTreeMap::new(),
            consignments: BTreeMap::new(),
            by_beneficiary: BTreeMap::new(),
            events: Vec::new(),
        })
    }

    pub fn state(&self) -> &DeskState<I> {
        &self.state
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Host access to the price source, e.g. to move a mock feed.
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn take_events(&mut self) -> Vec<DeskEvent<I>> {
        std::mem::take(&mut self.events)
    }

    // ---- reads ----

    pub fn available_token_inventory(&self) -> u128 {
        self.state.inventory.available()
    }

    pub fn treasury(&self) -> Treasury {
        self.state.treasury
    }

    pub fn offer(&self, id: u64) -> Option<&Offer<I>> {
        self.offers.get(&id)
    }

    pub fn consignment(&self, id: u64) -> Option<&Consignment<I>> {
        self.consignments.get(&id)
    }

    /// Ids of offers still awaiting approval or payment, oldest first, capped
    /// at `max_open_offers_to_return`.
    pub fn open_offer_ids(&self, limit: usize) -> Vec<u64> {
        let cap = limit.min(self.state.max_open_offers_to_return);
        self.offers.values().filter(|o| o.is_open()).take(cap).map(|o| o.id).collect()
    }

    pub fn offers_for_beneficiary(&self, who: &I) -> Vec<u64> {
        self.by_beneficiary.get(who).cloned().unwrap_or_default()
    }

    pub fn required_native_amount(&self, id: u64) -> DeskResult<u128> {
        Ok(self.state.required_payment(self.get(id)?, PaymentCurrency::Native)?.required)
    }

    pub fn required_stable_amount(&self, id: u64) -> DeskResult<u128> {
        Ok(self.state.required_payment(self.get(id)?, PaymentCurrency::Stable)?.required)
    }

    pub fn max_open_offers_to_return(&self) -> usize {
        self.state.max_open_offers_to_return
    }

    pub fn emergency_refunds_enabled(&self) -> bool {
        self.state.emergency_refunds_enabled
    }

    pub fn owner(&self) -> I {
        self.state.access.owner
    }

    pub fn agent(&self) -> I {
        self.state.access.agent
    }

    pub fn is_approver(&self, who: &I) -> bool {
        self.state.access.is_approver(who)
    }

    fn get(&self, id: u64) -> DeskResult<&Offer<I>> {
        self.offers.get(&id).ok_or(DeskError::UnknownOffer)
    }

    fn insert_offer(&mut self, offer: Offer<I>) -> u64 {
        let id = offer.id;
        self.events.push(DeskEvent::OfferCreated {
            offer_id: id,
            consignment_id: offer.consignment_id,
            beneficiary: offer.beneficiary,
            token_amount: offer.token_amount,
            discount_bps: offer.discount_bps,
            currency: offer.currency,
        });
        self.by_beneficiary.entry(offer.beneficiary).or_default().push(id);
        self.offers.insert(id, offer);
        id
    }

    // ---- offer flow ----

    pub fn create_offer(&mut self, beneficiary: I, terms: OfferTerms, now: i64) -> DeskResult<u64> {
        let offer = self.state.create_offer(beneficiary, terms, &self.oracle, now)?;
        Ok(self.insert_offer(offer))
    }

    pub fn approve_offer(&mut self, caller: I, id: u64, now: i64) -> DeskResult<bool> {
        let offer = self.offers.get_mut(&id).ok_or(DeskError::UnknownOffer)?;
        let fully_approved = self.state.approve_offer(offer, caller, &self.oracle, now)?;
        self.events.push(DeskEvent::OfferApproved { offer_id: id, approver: caller, fully_approved });
        Ok(fully_approved)
    }

    pub fn fulfill_offer(
        &mut self,
        payer: I,
        id: u64,
        currency: PaymentCurrency,
        sent: u128,
        now: i64,
    ) -> DeskResult<Payment<I>> {
        let (offer, consignment) = Self::split(&mut self.offers, &mut self.consignments, id)?;
        let payment = self.state.fulfill_offer(offer, consignment, payer, currency, sent, now)?;
        self.events.push(DeskEvent::OfferPaid {
            offer_id: id,
            payer,
            currency,
            amount: payment.required,
            refund: payment.refund,
        });
        Ok(payment)
    }

    pub fn claim(&mut self, caller: I, id: u64, now: i64) -> DeskResult<Delivery<I>> {
        let offer = self.offers.get_mut(&id).ok_or(DeskError::UnknownOffer)?;
        let delivery = self.state.claim_offer(offer, caller, now)?;
        self.events.push(DeskEvent::TokensClaimed {
            offer_id: id,
            beneficiary: delivery.beneficiary,
            amount: delivery.amount,
        });
        Ok(delivery)
    }

    pub fn auto_claim(&mut self, caller: I, ids: &[u64], now: i64) -> DeskResult<BatchReport<I>> {
        let report = self.state.auto_claim(&mut self.offers, caller, ids, now)?;
        for d in &report.claimed {
            self.events.push(DeskEvent::TokensClaimed { offer_id: d.offer_id, beneficiary: d.beneficiary, amount: d.amount });
        }
        for &(offer_id, reason) in &report.skipped {
            self.events.push(DeskEvent::ClaimSkipped { offer_id, reason });
        }
        Ok(report)
    }

    pub fn cancel_offer(&mut self, caller: I, id: u64, now: i64) -> DeskResult<()> {
        let (offer, consignment) = Self::split(&mut self.offers, &mut self.consignments, id)?;
        self.state.cancel_offer(offer, consignment, caller, now)?;
        self.events.push(DeskEvent::OfferCancelled { offer_id: id, by: caller });
        Ok(())
    }

    pub fn emergency_refund(&mut self, caller: I, id: u64, now: i64) -> DeskResult<Refund<I>> {
        let (offer, consignment) = Self::split(&mut self.offers, &mut self.consignments, id)?;
        let refund = self.state.emergency_refund(offer, consignment, caller, now)?;
        self.events.push(DeskEvent::EmergencyRefunded {
            offer_id: id,
            to: refund.to,
            currency: refund.currency,
            amount: refund.amount,
        });
        Ok(refund)
    }

    fn split<'a>(
        offers: &'a mut BTreeMap<u64, Offer<I>>,
        consignments: &'a mut BTreeMap<u64, Consignment<I>>,
        id: u64,
    ) -> DeskResult<(&'a mut Offer<I>, Option<&'a mut Consignment<I>>)> {
        let offer = offers.get_mut(&id).ok_or(DeskError::UnknownOffer)?;
        let consignment = match offer.consignment_id {
            0 => None,
            cid => Some(consignments.get_mut(&cid).ok_or(DeskError::UnknownConsignment)?),
        };
        Ok((offer, consignment))
    }

    // ---- consignments ----

    pub fn create_consignment(
        &mut self,
        consigner: I,
        params: ConsignmentParams<I>,
        deposit: u128,
        now: i64,
    ) -> DeskResult<u64> {
        let consignment = self.state.create_consignment(consigner, params, deposit, now)?;
        let id = consignment.id;
        self.events.push(DeskEvent::ConsignmentCreated {
            consignment_id: id,
            consigner,
            amount: consignment.total_amount,
            deposit,
        });
        self.consignments.insert(id, consignment);
        Ok(id)
    }

    pub fn create_offer_from_consignment(
        &mut self,
        beneficiary: I,
        consignment_id: u64,
        terms: OfferTerms,
        now: i64,
    ) -> DeskResult<u64> {
        let consignment = self.consignments.get_mut(&consignment_id).ok_or(DeskError::UnknownConsignment)?;
        let offer = self.state.create_offer_from_consignment(consignment, beneficiary, terms, &self.oracle, now)?;
        Ok(self.insert_offer(offer))
    }

    pub fn withdraw_consignment(&mut self, caller: I, consignment_id: u64) -> DeskResult<ConsignmentWithdrawal<I>> {
        let consignment = self.consignments.get_mut(&consignment_id).ok_or(DeskError::UnknownConsignment)?;
        let out = self.state.withdraw_consignment(consignment, caller)?;
        self.events.push(DeskEvent::ConsignmentWithdrawn {
            consignment_id,
            consigner: out.consigner,
            tokens: out.tokens,
            deposit: out.deposit,
        });
        Ok(out)
    }

    // ---- owner administration ----

    pub fn deposit_tokens(&mut self, caller: I, amount: u128) -> DeskResult<()> {
        self.state.deposit_tokens(&caller, amount)?;
        self.events.push(DeskEvent::TokensDeposited { amount });
        Ok(())
    }

    pub fn withdraw_tokens(&mut self, caller: I, to: I, amount: u128) -> DeskResult<()> {
        self.state.withdraw_tokens(&caller, to, amount)?;
        self.events.push(DeskEvent::TokensWithdrawn { to, amount });
        Ok(())
    }

    pub fn withdraw_treasury(&mut self, caller: I, currency: PaymentCurrency, to: I, amount: u128) -> DeskResult<()> {
        self.state.withdraw_treasury(&caller, currency, to, amount)?;
        self.events.push(DeskEvent::TreasuryWithdrawn { currency, to, amount });
        Ok(())
    }

    pub fn set_limits(&mut self, caller: I, limits: Limits) -> DeskResult<()> {
        self.state.set_limits(&caller, limits)?;
        self.events.push(DeskEvent::LimitsUpdated { limits });
        Ok(())
    }

    pub fn set_agent(&mut self, caller: I, agent: I) -> DeskResult<()> {
        self.state.set_agent(&caller, agent)?;
        self.events.push(DeskEvent::AgentUpdated { agent });
        Ok(())
    }

    pub fn set_approver(&mut self, caller: I, approver: I, allowed: bool) -> DeskResult<()> {
        self.state.set_approver(&caller, approver, allowed)?;
        self.events.push(DeskEvent::ApproverUpdated { approver, allowed });
        Ok(())
    }

    pub fn set_required_approvals(&mut self, caller: I, required: u8) -> DeskResult<()> {
        self.state.set_required_approvals(&caller, required)?;
        self.events.push(DeskEvent::RequiredApprovalsUpdated { required });
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: I, owner: I) -> DeskResult<()> {
        self.state.transfer_ownership(&caller, owner)?;
        self.events.push(DeskEvent::OwnershipTransferred { owner });
        Ok(())
    }

    pub fn set_emergency_refund(&mut self, caller: I, enabled: bool, deadline_secs: i64) -> DeskResult<()> {
        self.state.set_emergency_refund(&caller, enabled, deadline_secs)?;
        self.events.push(DeskEvent::EmergencyRefundUpdated { enabled, deadline_secs });
        Ok(())
    }

    pub fn set_restrict_fulfill(&mut self, caller: I, enabled: bool) -> DeskResult<()> {
        self.state.set_restrict_fulfill(&caller, enabled)?;
        self.events.push(DeskEvent::RestrictFulfillUpdated { enabled });
        Ok(())
    }

    pub fn pause(&mut self, caller: I) -> DeskResult<()> {
        self.state.set_paused(&caller, true)?;
        self.events.push(DeskEvent::Paused { paused: true });
        Ok(())
    }

    pub fn unpause(&mut self, caller: I) -> DeskResult<()> {
        self.state.set_paused(&caller, false)?;
        self.events.push(DeskEvent::Paused { paused: false });
        Ok(())
    }

    pub fn set_max_open_offers_to_return(&mut self, caller: I, max: usize) -> DeskResult<()> {
        self.state.set_max_open_offers_to_return(&caller, max)?;
        self.events.push(DeskEvent::MaxOpenOffersUpdated { max });
        Ok(())
    }

    pub fn set_required_gas_deposit(&mut self, caller: I, amount: u128) -> DeskResult<()> {
        self.state.set_required_gas_deposit(&caller, amount)?;
        self.events.push(DeskEvent::RequiredGasDepositUpdated { amount });
        Ok(())
    }
}

impl<I: Identity> Desk<I, StoredPrices> {
    pub fn set_prices(
        &mut self,
        caller: I,
        token_usd_8d: u64,
        native_usd_8d: u64,
        max_age_secs: i64,
        now: i64,
    ) -> DeskResult<()> {
        self.state.set_prices(&caller, &mut self.oracle, token_usd_8d, native_usd_8d, max_age_secs, now)?;
        self.events.push(DeskEvent::PricesUpdated {
            token_usd_8d,
            native_usd_8d,
            updated_at: now,
            max_age_secs,
        });
        Ok(())
    }

    /// Feed push; anyone may relay it. The relayer's deviation bound is
    /// capped at `MAX_PRICE_DEVIATION_BPS`, so it can tighten the check but
    /// never disable it.
    pub fn apply_feed_update(
        &mut self,
        token_usd_8d: u64,
        native_usd_8d: u64,
        max_deviation_bps: u16,
        now: i64,
    ) -> DeskResult<()> {
        self.oracle.apply_feed_update(token_usd_8d, native_usd_8d, now, max_deviation_bps)?;
        self.events.push(DeskEvent::PricesUpdated {
            token_usd_8d,
            native_usd_8d,
            updated_at: now,
            max_age_secs: self.state.max_price_age_secs,
        });
        Ok(())
    }
}
