//! The OTC desk as an EVM contract: one storage space, `msg.sender` as the
//! caller, ether arriving with the call and ERC-20 pulls through allowances.

use otc_protocol::{
    AssetDecimals, BatchReport, ConsignmentParams, ConsignmentTerms, Desk, DeskConfig, DeskError, DeskEvent, Limits,
    Offer, OfferTerms, PaymentCurrency, PriceOracle,
};

use crate::address::Address;
use crate::erc20::{Erc20, NativeLedger};
use crate::feeds::{AggregatorOracle, MockAggregator};
use crate::revert::{CallResult, Revert};

/// Call context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Msg {
    pub sender: Address,
    pub value: u128,
    pub timestamp: i64,
}

impl Msg {
    pub fn new(sender: Address, timestamp: i64) -> Self {
        Self { sender, value: 0, timestamp }
    }

    pub fn with_value(self, value: u128) -> Self {
        Self { value, ..self }
    }
}

/// Arguments of `createConsignment`, in contract order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsignmentArgs {
    pub token_id: [u8; 32],
    pub amount: u128,
    pub is_negotiable: bool,
    pub fixed_discount_bps: u16,
    pub fixed_lockup_days: u32,
    pub min_discount_bps: u16,
    pub max_discount_bps: u16,
    pub min_lockup_days: u32,
    pub max_lockup_days: u32,
    pub min_deal_amount: u128,
    pub max_deal_amount: u128,
    pub is_fractionalized: bool,
    pub is_private: bool,
    pub max_price_volatility_bps: u16,
    pub max_time_to_execute_secs: i64,
}

impl ConsignmentArgs {
    fn into_params(self, allow_list: Vec<Address>) -> ConsignmentParams<Address> {
        let terms = if self.is_negotiable {
            ConsignmentTerms::Negotiable {
                min_discount_bps: self.min_discount_bps,
                max_discount_bps: self.max_discount_bps,
                min_lockup_days: self.min_lockup_days,
                max_lockup_days: self.max_lockup_days,
            }
        } else {
            ConsignmentTerms::Fixed { discount_bps: self.fixed_discount_bps, lockup_days: self.fixed_lockup_days }
        };
        ConsignmentParams {
            token_id: self.token_id,
            amount: self.amount,
            terms,
            min_deal_amount: self.min_deal_amount,
            max_deal_amount: self.max_deal_amount,
            is_fractionalized: self.is_fractionalized,
            is_private: self.is_private,
            allow_list,
            max_price_volatility_bps: self.max_price_volatility_bps,
            max_time_to_execute_secs: self.max_time_to_execute_secs,
        }
    }
}

/// Contract storage plus the token ledgers it moves balances on.
#[derive(Debug, Clone)]
pub struct OtcContract<A = MockAggregator> {
    pub address: Address,
    pub token: Erc20,
    pub usdc: Erc20,
    pub eth: NativeLedger,
    desk: Desk<Address, AggregatorOracle<A>>,
    logs: Vec<DeskEvent<Address>>,
}

impl<A> OtcContract<A>
where
    A: crate::feeds::Aggregator + Clone,
{
    #[allow(clippy::too_many_arguments)]
    pub fn deploy(
        address: Address,
        owner: Address,
        token: Erc20,
        usdc: Erc20,
        token_usd: A,
        eth_usd: A,
        agent: Address,
        token_id: [u8; 32],
    ) -> CallResult<Self> {
        if agent == Address::ZERO {
            return Err(Revert::ZeroAgent);
        }
        if usdc.decimals != 6 {
            return Err(Revert::BadToken);
        }
        let decimals = AssetDecimals { token: token.decimals, native: 18, stable: usdc.decimals };
        let config = DeskConfig::new(token_id, decimals)?;
        let desk = Desk::new(owner, agent, &config, AggregatorOracle::new(token_usd, eth_usd))?;
        Ok(Self { address, token, usdc, eth: NativeLedger::default(), desk, logs: Vec::new() })
    }

    /// Runs `f` as one transaction: any revert rolls back every balance and
    /// storage write it made.
    fn transact<T>(&mut self, f: impl FnOnce(&mut Self) -> CallResult<T>) -> CallResult<T> {
        let before = self.clone();
        match f(self) {
            Ok(out) => {
                let events = self.desk.take_events();
                self.logs.extend(events);
                Ok(out)
            }
            Err(revert) => {
                *self = before;
                Err(revert)
            }
        }
    }

    /// Moves the call's ether into the contract.
    fn receive_value(&mut self, msg: &Msg) -> CallResult<()> {
        if msg.value > 0 {
            self.eth.transfer(msg.sender, self.address, msg.value)?;
        }
        Ok(())
    }

    fn pay_out(&mut self, currency: PaymentCurrency, to: Address, amount: u128) -> CallResult<()> {
        if amount == 0 {
            return Ok(());
        }
        match currency {
            PaymentCurrency::Native => self.eth.transfer(self.address, to, amount),
            PaymentCurrency::Stable => self.usdc.transfer(self.address, to, amount),
        }
    }

    fn deliver(&mut self, report: &BatchReport<Address>) -> CallResult<()> {
        for d in &report.claimed {
            self.token.transfer(self.address, d.beneficiary, d.amount)?;
        }
        Ok(())
    }

    pub fn take_logs(&mut self) -> Vec<DeskEvent<Address>> {
        std::mem::take(&mut self.logs)
    }

    pub fn token_usd_feed(&mut self) -> &mut A {
        &mut self.desk.oracle_mut().token_usd
    }

    pub fn eth_usd_feed(&mut self) -> &mut A {
        &mut self.desk.oracle_mut().native_usd
    }

    // ---- views ----

    pub fn available_token_inventory(&self) -> u128 {
        self.desk.available_token_inventory()
    }

    pub fn offers(&self, id: u64) -> Option<&Offer<Address>> {
        self.desk.offer(id)
    }

    /// At most `min(limit, max_open_offers_to_return)` ids.
    pub fn get_open_offer_ids(&self, limit: usize) -> Vec<u64> {
        self.desk.open_offer_ids(limit)
    }

    pub fn get_offers_for_beneficiary(&self, who: &Address) -> Vec<u64> {
        self.desk.offers_for_beneficiary(who)
    }

    pub fn required_eth_wei(&self, id: u64) -> CallResult<u128> {
        Ok(self.desk.required_native_amount(id)?)
    }

    pub fn required_usdc_amount(&self, id: u64) -> CallResult<u128> {
        Ok(self.desk.required_stable_amount(id)?)
    }

    pub fn max_open_offers_to_return(&self) -> usize {
        self.desk.max_open_offers_to_return()
    }

    pub fn emergency_refunds_enabled(&self) -> bool {
        self.desk.emergency_refunds_enabled()
    }

    pub fn agent(&self) -> Address {
        self.desk.agent()
    }

    pub fn owner(&self) -> Address {
        self.desk.owner()
    }

    pub fn is_approver(&self, who: &Address) -> bool {
        self.desk.is_approver(who)
    }

    pub fn limits(&self) -> Limits {
        self.desk.state().limits
    }

    pub fn token_usd_price(&self) -> CallResult<u64> {
        Ok(self.desk.oracle().current_quote()?.token_usd_8d)
    }

    // ---- buyer flow ----

    pub fn create_offer(
        &mut self,
        msg: &Msg,
        token_amount: u128,
        discount_bps: u16,
        currency: u8,
        lockup_secs: i64,
    ) -> CallResult<u64> {
        let currency = PaymentCurrency::try_from(currency).map_err(|_| Revert::UnsupportedCurrency)?;
        let terms = OfferTerms { token_amount, discount_bps, currency, lockup_secs };
        self.transact(|c| Ok(c.desk.create_offer(msg.sender, terms, msg.timestamp)?))
    }

    pub fn create_offer_from_consignment(
        &mut self,
        msg: &Msg,
        consignment_id: u64,
        token_amount: u128,
        discount_bps: u16,
        currency: u8,
        lockup_secs: i64,
    ) -> CallResult<u64> {
        let currency = PaymentCurrency::try_from(currency).map_err(|_| Revert::UnsupportedCurrency)?;
        let terms = OfferTerms { token_amount, discount_bps, currency, lockup_secs };
        self.transact(|c| Ok(c.desk.create_offer_from_consignment(msg.sender, consignment_id, terms, msg.timestamp)?))
    }

    pub fn approve_offer(&mut self, msg: &Msg, id: u64) -> CallResult<()> {
        self.transact(|c| {
            c.desk.approve_offer(msg.sender, id, msg.timestamp)?;
            Ok(())
        })
    }

    pub fn cancel_offer(&mut self, msg: &Msg, id: u64) -> CallResult<()> {
        self.transact(|c| Ok(c.desk.cancel_offer(msg.sender, id, msg.timestamp)?))
    }

    /// Pays for an approved offer. Ether offers take `msg.value` and refund the
    /// excess; USDC offers pull exactly the required amount.
    pub fn fulfill_offer(&mut self, msg: &Msg, id: u64) -> CallResult<u128> {
        self.transact(|c| {
            let currency = c.desk.offer(id).ok_or(DeskError::UnknownOffer)?.currency;
            c.receive_value(msg)?;
            let payment = match currency {
                PaymentCurrency::Native => {
                    let payment = c.desk.fulfill_offer(msg.sender, id, currency, msg.value, msg.timestamp)?;
                    c.pay_out(PaymentCurrency::Native, msg.sender, payment.refund)?;
                    payment
                }
                PaymentCurrency::Stable => {
                    let required = c.desk.required_stable_amount(id)?;
                    let payment = c.desk.fulfill_offer(msg.sender, id, currency, required, msg.timestamp)?;
                    let desk = c.address;
                    c.usdc.transfer_from(desk, msg.sender, desk, payment.required)?;
                    c.pay_out(PaymentCurrency::Native, msg.sender, msg.value)?;
                    payment
                }
            };
            Ok(payment.required)
        })
    }

    pub fn claim(&mut self, msg: &Msg, id: u64) -> CallResult<()> {
        self.transact(|c| {
            let delivery = c.desk.claim(msg.sender, id, msg.timestamp)?;
            let desk = c.address;
            c.token.transfer(desk, delivery.beneficiary, delivery.amount)
        })
    }

    pub fn auto_claim(&mut self, msg: &Msg, ids: &[u64]) -> CallResult<BatchReport<Address>> {
        self.transact(|c| {
            let report = c.desk.auto_claim(msg.sender, ids, msg.timestamp)?;
            c.deliver(&report)?;
            Ok(report)
        })
    }

    pub fn emergency_refund(&mut self, msg: &Msg, id: u64) -> CallResult<u128> {
        self.transact(|c| {
            let refund = c.desk.emergency_refund(msg.sender, id, msg.timestamp)?;
            c.pay_out(refund.currency, refund.to, refund.amount)?;
            Ok(refund.amount)
        })
    }

    // ---- consigners ----

    /// `msg.value` is the gas deposit held until withdrawal.
    pub fn create_consignment(&mut self, msg: &Msg, args: ConsignmentArgs, allow_list: Vec<Address>) -> CallResult<u64> {
        self.transact(|c| {
            c.receive_value(msg)?;
            let amount = args.amount;
            let id = c.desk.create_consignment(msg.sender, args.into_params(allow_list), msg.value, msg.timestamp)?;
            let desk = c.address;
            c.token.transfer_from(desk, msg.sender, desk, amount)?;
            Ok(id)
        })
    }

    pub fn withdraw_consignment(&mut self, msg: &Msg, consignment_id: u64) -> CallResult<()> {
        self.transact(|c| {
            let out = c.desk.withdraw_consignment(msg.sender, consignment_id)?;
            let desk = c.address;
            c.token.transfer(desk, out.consigner, out.tokens)?;
            c.pay_out(PaymentCurrency::Native, out.consigner, out.deposit)
        })
    }

    // ---- owner ----

    pub fn deposit_tokens(&mut self, msg: &Msg, amount: u128) -> CallResult<()> {
        self.transact(|c| {
            c.desk.deposit_tokens(msg.sender, amount)?;
            let desk = c.address;
            c.token.transfer_from(desk, msg.sender, desk, amount)
        })
    }

    pub fn withdraw_tokens(&mut self, msg: &Msg, to: Address, amount: u128) -> CallResult<()> {
        self.transact(|c| {
            c.desk.withdraw_tokens(msg.sender, to, amount)?;
            let desk = c.address;
            c.token.transfer(desk, to, amount)
        })
    }

    /// Sweeps collected USDC and ether.
    pub fn withdraw_stable(&mut self, msg: &Msg, to: Address, usdc_amount: u128, eth_amount: u128) -> CallResult<()> {
        self.transact(|c| {
            c.desk.withdraw_treasury(msg.sender, PaymentCurrency::Stable, to, usdc_amount)?;
            c.desk.withdraw_treasury(msg.sender, PaymentCurrency::Native, to, eth_amount)?;
            c.pay_out(PaymentCurrency::Stable, to, usdc_amount)?;
            c.pay_out(PaymentCurrency::Native, to, eth_amount)
        })
    }

    pub fn set_limits(
        &mut self,
        msg: &Msg,
        min_usd_amount_8d: u64,
        max_token_per_order: u128,
        quote_expiry_secs: i64,
        default_unlock_delay_secs: i64,
    ) -> CallResult<()> {
        let limits = Limits {
            min_usd_amount_8d,
            max_token_per_order,
            quote_expiry_secs,
            default_unlock_delay_secs,
            ..self.limits()
        };
        self.transact(|c| Ok(c.desk.set_limits(msg.sender, limits)?))
    }

    pub fn set_max_lockup(&mut self, msg: &Msg, max_lockup_secs: i64) -> CallResult<()> {
        let limits = Limits { max_lockup_secs, ..self.limits() };
        self.transact(|c| Ok(c.desk.set_limits(msg.sender, limits)?))
    }

    pub fn set_agent(&mut self, msg: &Msg, agent: Address) -> CallResult<()> {
        self.transact(|c| match c.desk.set_agent(msg.sender, agent) {
            Err(DeskError::InvalidAddress) => Err(Revert::ZeroAgent),
            other => Ok(other?),
        })
    }

    pub fn set_approver(&mut self, msg: &Msg, who: Address, allowed: bool) -> CallResult<()> {
        self.transact(|c| Ok(c.desk.set_approver(msg.sender, who, allowed)?))
    }

    pub fn set_required_approvals(&mut self, msg: &Msg, required: u8) -> CallResult<()> {
        self.transact(|c| Ok(c.desk.set_required_approvals(msg.sender, required)?))
    }

    pub fn transfer_ownership(&mut self, msg: &Msg, owner: Address) -> CallResult<()> {
        self.transact(|c| Ok(c.desk.transfer_ownership(msg.sender, owner)?))
    }

    pub fn set_emergency_refund(&mut self, msg: &Msg, enabled: bool, deadline_secs: i64) -> CallResult<()> {
        self.transact(|c| Ok(c.desk.set_emergency_refund(msg.sender, enabled, deadline_secs)?))
    }

    pub fn set_restrict_fulfill(&mut self, msg: &Msg, enabled: bool) -> CallResult<()> {
        self.transact(|c| Ok(c.desk.set_restrict_fulfill(msg.sender, enabled)?))
    }

    pub fn set_max_open_offers_to_return(&mut self, msg: &Msg, max: usize) -> CallResult<()> {
        self.transact(|c| Ok(c.desk.set_max_open_offers_to_return(msg.sender, max)?))
    }

    pub fn set_required_gas_deposit(&mut self, msg: &Msg, amount: u128) -> CallResult<()> {
        self.transact(|c| Ok(c.desk.set_required_gas_deposit(msg.sender, amount)?))
    }

    pub fn pause(&mut self, msg: &Msg) -> CallResult<()> {
        self.transact(|c| Ok(c.desk.pause(msg.sender)?))
    }

    pub fn unpause(&mut self, msg: &Msg) -> CallResult<()> {
        self.transact(|c| Ok(c.desk.unpause(msg.sender)?))
    }

    pub fn set_feeds(&mut self, msg: &Msg, token_usd: A, eth_usd: A) -> CallResult<()> {
        self.transact(|c| {
            c.desk.state().access.only_owner(&msg.sender)?;
            *c.desk.oracle_mut() = AggregatorOracle::new(token_usd, eth_usd);
            Ok(())
        })
    }
}
