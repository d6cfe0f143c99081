use serde::{Deserialize, Serialize};

use crate::access::AccessRegistry;
use crate::config::{AssetDecimals, DeskConfig, Limits};
use crate::error::{DeskError, DeskResult};
use crate::identity::{non_zero, Identity};
use crate::inventory::InventoryLedger;
use crate::oracle::StoredPrices;
use crate::settlement::{PaymentCurrency, SettlementCalculator};

/// Payment assets collected by the desk plus consignment deposits it holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    pub native: u128,
    pub stable: u128,
    pub deposits: u128,
}

impl Treasury {
    pub fn balance(&self, currency: PaymentCurrency) -> u128 {
        match currency {
            PaymentCurrency::Native => self.native,
            PaymentCurrency::Stable => self.stable,
        }
    }

    pub(crate) fn credited(&self, currency: PaymentCurrency, amount: u128) -> DeskResult<Self> {
        let mut next = *self;
        let slot = next.slot(currency);
        *slot = slot.checked_add(amount).ok_or(DeskError::Overflow)?;
        Ok(next)
    }

    pub(crate) fn debited(&self, currency: PaymentCurrency, amount: u128) -> DeskResult<Self> {
        let mut next = *self;
        let slot = next.slot(currency);
        *slot = slot.checked_sub(amount).ok_or(DeskError::TreasuryExhausted)?;
        Ok(next)
    }

    fn slot(&mut self, currency: PaymentCurrency) -> &mut u128 {
        match currency {
            PaymentCurrency::Native => &mut self.native,
            PaymentCurrency::Stable => &mut self.stable,
        }
    }
}

/// The desk singleton: roles, custody, limits and id counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskState<I> {
    pub access: AccessRegistry<I>,
    pub inventory: InventoryLedger,
    pub treasury: Treasury,
    pub token_id: [u8; 32],
    pub decimals: AssetDecimals,
    pub limits: Limits,
    pub max_price_age_secs: i64,
    pub emergency_refunds_enabled: bool,
    pub emergency_refund_deadline_secs: i64,
    pub restrict_fulfill: bool,
    pub paused: bool,
    pub required_gas_deposit: u128,
    pub max_open_offers_to_return: usize,
    pub next_offer_id: u64,
    pub next_consignment_id: u64,
}

impl<I: Identity> DeskState<I> {
    pub fn new(owner: I, agent: I, config: &DeskConfig) -> DeskResult<Self> {
        config.validate()?;
        let mut access = AccessRegistry::new(owner, agent)?;
        access.set_required_approvals(config.required_approvals)?;
        Ok(Self {
            access,
            inventory: InventoryLedger::default(),
            treasury: Treasury::default(),
            token_id: config.token_id,
            decimals: config.decimals,
            limits: config.limits,
            max_price_age_secs: config.max_price_age_secs,
            emergency_refunds_enabled: false,
            emergency_refund_deadline_secs: config.emergency_refund_deadline_secs,
            restrict_fulfill: false,
            paused: false,
            required_gas_deposit: config.required_gas_deposit,
            max_open_offers_to_return: config.max_open_offers_to_return,
            next_offer_id: 1,
            next_consignment_id: 1,
        })
    }

    pub fn calculator(&self) -> SettlementCalculator {
        SettlementCalculator::new(self.decimals)
    }

    pub fn ensure_active(&self) -> DeskResult<()> {
        if self.paused {
            return Err(DeskError::Paused);
        }
        Ok(())
    }

    pub(crate) fn peek_offer_id(&self) -> DeskResult<(u64, u64)> {
        let id = self.next_offer_id;
        Ok((id, id.checked_add(1).ok_or(DeskError::Overflow)?))
    }

    pub(crate) fn peek_consignment_id(&self) -> DeskResult<(u64, u64)> {
        let id = self.next_consignment_id;
        Ok((id, id.checked_add(1).ok_or(DeskError::Overflow)?))
    }

    pub fn set_limits(&mut self, caller: &I, limits: Limits) -> DeskResult<()> {
        self.access.only_owner(caller)?;
        limits.validate()?;
        self.limits = limits;
        Ok(())
    }

    /// Owner price push; also sets the max age used for every staleness check.
    pub fn set_prices(
        &mut self,
        caller: &I,
        prices: &mut StoredPrices,
        token_usd_8d: u64,
        native_usd_8d: u64,
        max_age_secs: i64,
        now: i64,
    ) -> DeskResult<()> {
        self.access.only_owner(caller)?;
        if max_age_secs < 0 {
            return Err(DeskError::AmountRange);
        }
        prices.set(token_usd_8d, native_usd_8d, now)?;
        self.max_price_age_secs = max_age_secs;
        Ok(())
    }

    pub fn set_agent(&mut self, caller: &I, agent: I) -> DeskResult<()> {
        self.access.only_owner(caller)?;
        self.access.set_agent(agent)
    }

    pub fn set_approver(&mut self, caller: &I, who: I, allowed: bool) -> DeskResult<()> {
        self.access.only_owner(caller)?;
        self.access.set_approver(who, allowed)
    }

    pub fn set_required_approvals(&mut self, caller: &I, required: u8) -> DeskResult<()> {
        self.access.only_owner(caller)?;
        self.access.set_required_approvals(required)
    }

    pub fn transfer_ownership(&mut self, caller: &I, owner: I) -> DeskResult<()> {
        self.access.only_owner(caller)?;
        self.access.transfer_ownership(owner)
    }

    pub fn set_emergency_refund(&mut self, caller: &I, enabled: bool, deadline_secs: i64) -> DeskResult<()> {
        self.access.only_owner(caller)?;
        if deadline_secs < 0 {
            return Err(DeskError::AmountRange);
        }
        self.emergency_refunds_enabled = enabled;
        self.emergency_refund_deadline_secs = deadline_secs;
        Ok(())
    }

    pub fn set_restrict_fulfill(&mut self, caller: &I, enabled: bool) -> DeskResult<()> {
        self.access.only_owner(caller)?;
        self.restrict_fulfill = enabled;
        Ok(())
    }

    pub fn set_paused(&mut self, caller: &I, paused: bool) -> DeskResult<()> {
        self.access.only_owner(caller)?;
        self.paused = paused;
        Ok(())
    }

    pub fn set_max_open_offers_to_return(&mut self, caller: &I, max: usize) -> DeskResult<()> {
        self.access.only_owner(caller)?;
        if max == 0 {
            return Err(DeskError::AmountRange);
        }
        self.max_open_offers_to_return = max;
        Ok(())
    }

    pub fn set_required_gas_deposit(&mut self, caller: &I, amount: u128) -> DeskResult<()> {
        self.access.only_owner(caller)?;
        self.required_gas_deposit = amount;
        Ok(())
    }

    pub fn deposit_tokens(&mut self, caller: &I, amount: u128) -> DeskResult<()> {
        self.ensure_active()?;
        self.access.only_owner(caller)?;
        self.inventory.deposit(amount)
    }

    pub fn withdraw_tokens(&mut self, caller: &I, to: I, amount: u128) -> DeskResult<()> {
        self.access.only_owner(caller)?;
        non_zero(to)?;
        self.inventory.withdraw(amount)
    }

    pub fn withdraw_treasury(&mut self, caller: &I, currency: PaymentCurrency, to: I, amount: u128) -> DeskResult<()> {
        self.access.only_owner(caller)?;
        non_zero(to)?;
        self.treasury = self.treasury.debited(currency, amount)?;
        Ok(())
    }
}
