#![allow(deprecated)]
use std::collections::BTreeMap;

use anchor_lang::prelude::*;
use anchor_lang::AccountsExit;
use anchor_spl::token::{self, Mint, Token, TokenAccount, Transfer as SplTransfer};
use otc_protocol::{
    AssetDecimals, ConsignmentParams, ConsignmentTerms, DeskConfig, DeskResult, DeskState, Limits, OfferTerms, Payment,
    PaymentCurrency, Refund,
};
use pyth_solana_receiver_sdk::price_update::PriceUpdateV2;

pub mod error;
pub mod events;
pub mod state;

use error::OtcError;
use events::*;
use state::{narrow, to_id, to_pubkey, Consignment, ConsignmentRecord, Desk, Id, Offer};

declare_id!("8X2wDShtcJ5mFrcsJPjK8tQCD16zBqzsUGwhSCM4ggko");

#[program]
pub mod otc {
    use super::*;

    pub fn init_desk(
        ctx: Context<InitDesk>,
        min_usd_amount_8d: u64,
        max_token_per_order: u64,
        quote_expiry_secs: i64,
        default_unlock_delay_secs: i64,
        max_lockup_secs: i64,
        max_price_age_secs: i64,
    ) -> Result<()> {
        require!(ctx.accounts.usdc_mint.decimals == 6, OtcError::UsdcDecimals);
        let token_mint = &ctx.accounts.token_mint;
        let mut config = DeskConfig::new(to_id(&token_mint.key()), AssetDecimals::solana(token_mint.decimals))
            .map_err(OtcError::from)?;
        config.limits = Limits {
            min_usd_amount_8d,
            max_token_per_order: max_token_per_order as u128,
            quote_expiry_secs,
            default_unlock_delay_secs,
            max_lockup_secs,
        };
        config.max_price_age_secs = max_price_age_secs;
        let state = DeskState::new(to_id(&ctx.accounts.owner.key()), to_id(&ctx.accounts.agent.key()), &config)
            .map_err(OtcError::from)?;

        let desk = &mut ctx.accounts.desk;
        desk.token_mint = token_mint.key();
        desk.usdc_mint = ctx.accounts.usdc_mint.key();
        desk.token_decimals = token_mint.decimals;
        desk.store(&state)?;
        Ok(())
    }

    pub fn set_prices(ctx: Context<OnlyOwnerDesk>, token_usd_8d: u64, sol_usd_8d: u64, max_age: i64) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let owner = to_id(&ctx.accounts.owner.key());
        let desk = &mut ctx.accounts.desk;
        let mut state = desk.to_state()?;
        let mut prices = desk.prices();
        state.set_prices(&owner, &mut prices, token_usd_8d, sol_usd_8d, max_age, now).map_err(OtcError::from)?;
        desk.store(&state)?;
        desk.store_prices(&prices);
        emit!(PricesUpdated { token_usd_8d, sol_usd_8d, updated_at: now, max_age });
        Ok(())
    }

    pub fn set_pyth_feeds(ctx: Context<OnlyOwnerDesk>, token_feed_id: [u8; 32], sol_feed_id: [u8; 32]) -> Result<()> {
        let desk = &mut ctx.accounts.desk;
        desk.token_price_feed_id = token_feed_id;
        desk.sol_price_feed_id = sol_feed_id;
        emit!(PythFeedsUpdated { token_feed_id, sol_feed_id });
        Ok(())
    }

    /// Permissionless: anyone may push the configured Pyth feeds onto the desk.
    /// `max_price_deviation_bps` can only narrow the desk's 20% jump cap.
    pub fn update_prices_from_pyth(ctx: Context<UpdatePricesFromPyth>, max_price_deviation_bps: u16) -> Result<()> {
        let desk = &mut ctx.accounts.desk;
        require!(
            desk.token_price_feed_id != [0u8; 32] && desk.sol_price_feed_id != [0u8; 32],
            OtcError::FeedNotConfigured
        );
        let clock = Clock::get()?;
        let max_age = u64::try_from(desk.max_price_age_secs).map_err(|_| OtcError::AmountRange)?;
        let token_price = ctx.accounts.token_price_feed
            .get_price_no_older_than(&clock, max_age, &desk.token_price_feed_id)
            .map_err(|_| OtcError::StalePrice)?;
        let sol_price = ctx.accounts.sol_price_feed
            .get_price_no_older_than(&clock, max_age, &desk.sol_price_feed_id)
            .map_err(|_| OtcError::StalePrice)?;

        let prices = desk.apply_pyth(&token_price, &sol_price, max_price_deviation_bps)?;
        emit!(PricesUpdated {
            token_usd_8d: prices.quote.token_usd_8d,
            sol_usd_8d: prices.quote.native_usd_8d,
            updated_at: prices.quote.updated_at,
            max_age: desk.max_price_age_secs,
        });
        Ok(())
    }

    pub fn set_limits(
        ctx: Context<OnlyOwnerDesk>,
        min_usd_amount_8d: u64,
        max_token_per_order: u64,
        quote_expiry_secs: i64,
        default_unlock_delay_secs: i64,
        max_lockup_secs: i64,
    ) -> Result<()> {
        let limits = Limits {
            min_usd_amount_8d,
            max_token_per_order: max_token_per_order as u128,
            quote_expiry_secs,
            default_unlock_delay_secs,
            max_lockup_secs,
        };
        as_owner(ctx.accounts, |state, owner| state.set_limits(owner, limits))?;
        emit!(LimitsUpdated { min_usd_amount_8d, max_token_per_order, quote_expiry_secs, default_unlock_delay_secs, max_lockup_secs });
        Ok(())
    }

    pub fn set_agent(ctx: Context<OnlyOwnerDesk>, new_agent: Pubkey) -> Result<()> {
        as_owner(ctx.accounts, |state, owner| state.set_agent(owner, to_id(&new_agent)))?;
        emit!(AgentUpdated { agent: new_agent });
        Ok(())
    }

    pub fn set_approver(ctx: Context<OnlyOwnerDesk>, who: Pubkey, allowed: bool) -> Result<()> {
        as_owner(ctx.accounts, |state, owner| state.set_approver(owner, to_id(&who), allowed))?;
        emit!(ApproverUpdated { approver: who, allowed });
        Ok(())
    }

    pub fn set_required_approvals(ctx: Context<OnlyOwnerDesk>, required: u8) -> Result<()> {
        as_owner(ctx.accounts, |state, owner| state.set_required_approvals(owner, required))?;
        emit!(RequiredApprovalsUpdated { required });
        Ok(())
    }

    pub fn transfer_ownership(ctx: Context<OnlyOwnerDesk>, new_owner: Pubkey) -> Result<()> {
        let previous = ctx.accounts.owner.key();
        as_owner(ctx.accounts, |state, owner| state.transfer_ownership(owner, to_id(&new_owner)))?;
        emit!(OwnershipTransferred { previous, owner: new_owner });
        Ok(())
    }

    pub fn set_restrict_fulfill(ctx: Context<OnlyOwnerDesk>, enabled: bool) -> Result<()> {
        as_owner(ctx.accounts, |state, owner| state.set_restrict_fulfill(owner, enabled))?;
        emit!(RestrictFulfillUpdated { enabled });
        Ok(())
    }

    pub fn pause(ctx: Context<OnlyOwnerDesk>) -> Result<()> {
        as_owner(ctx.accounts, |state, owner| state.set_paused(owner, true))?;
        emit!(Paused { paused: true });
        Ok(())
    }

    pub fn unpause(ctx: Context<OnlyOwnerDesk>) -> Result<()> {
        as_owner(ctx.accounts, |state, owner| state.set_paused(owner, false))?;
        emit!(Paused { paused: false });
        Ok(())
    }

    pub fn set_emergency_refund(ctx: Context<OnlyOwnerDesk>, enabled: bool, deadline_secs: i64) -> Result<()> {
        as_owner(ctx.accounts, |state, owner| state.set_emergency_refund(owner, enabled, deadline_secs))?;
        emit!(EmergencyRefundUpdated { enabled, deadline_secs });
        Ok(())
    }

    pub fn deposit_tokens(ctx: Context<DepositTokens>, amount: u64) -> Result<()> {
        let owner = to_id(&ctx.accounts.owner.key());
        let mut state = ctx.accounts.desk.to_state()?;
        state.deposit_tokens(&owner, amount as u128).map_err(OtcError::from)?;
        spl_transfer(
            &ctx.accounts.token_program,
            ctx.accounts.owner_token_ata.to_account_info(),
            ctx.accounts.desk_token_treasury.to_account_info(),
            ctx.accounts.owner.to_account_info(),
            amount,
        )?;
        ctx.accounts.desk.store(&state)?;
        emit!(TokensDeposited { amount });
        Ok(())
    }

    pub fn withdraw_tokens(ctx: Context<WithdrawTokens>, amount: u64) -> Result<()> {
        let owner = to_id(&ctx.accounts.owner.key());
        let to = ctx.accounts.to_token_ata.owner;
        let mut state = ctx.accounts.desk.to_state()?;
        state.withdraw_tokens(&owner, to_id(&to), amount as u128).map_err(OtcError::from)?;
        spl_transfer(
            &ctx.accounts.token_program,
            ctx.accounts.desk_token_treasury.to_account_info(),
            ctx.accounts.to_token_ata.to_account_info(),
            ctx.accounts.desk_signer.to_account_info(),
            amount,
        )?;
        ctx.accounts.desk.store(&state)?;
        emit!(TokensWithdrawn { to, amount });
        Ok(())
    }

    pub fn withdraw_usdc(ctx: Context<WithdrawUsdc>, amount: u64) -> Result<()> {
        let owner = to_id(&ctx.accounts.owner.key());
        let to = ctx.accounts.to_usdc_ata.owner;
        let mut state = ctx.accounts.desk.to_state()?;
        state
            .withdraw_treasury(&owner, PaymentCurrency::Stable, to_id(&to), amount as u128)
            .map_err(OtcError::from)?;
        spl_transfer(
            &ctx.accounts.token_program,
            ctx.accounts.desk_usdc_treasury.to_account_info(),
            ctx.accounts.to_usdc_ata.to_account_info(),
            ctx.accounts.desk_signer.to_account_info(),
            amount,
        )?;
        ctx.accounts.desk.store(&state)?;
        emit!(TreasuryWithdrawn { to, amount, currency: PaymentCurrency::Stable as u8 });
        Ok(())
    }

    pub fn withdraw_sol(ctx: Context<WithdrawSol>, lamports: u64) -> Result<()> {
        let owner = to_id(&ctx.accounts.owner.key());
        let to = ctx.accounts.to.key();
        let mut state = ctx.accounts.desk.to_state()?;
        state
            .withdraw_treasury(&owner, PaymentCurrency::Native, to_id(&to), lamports as u128)
            .map_err(OtcError::from)?;
        // keep rent-exempt minimum
        let min_rent = Rent::get()?.minimum_balance(8 + Desk::SIZE);
        let desk_info = ctx.accounts.desk.to_account_info();
        let after = desk_info.lamports().checked_sub(lamports).ok_or(OtcError::Overflow)?;
        require!(after >= min_rent, OtcError::TreasuryExhausted);
        move_lamports(&desk_info, &ctx.accounts.to.to_account_info(), lamports)?;
        ctx.accounts.desk.store(&state)?;
        emit!(TreasuryWithdrawn { to, amount: lamports, currency: PaymentCurrency::Native as u8 });
        Ok(())
    }

    pub fn create_offer(
        ctx: Context<CreateOffer>,
        token_amount: u64,
        discount_bps: u16,
        currency: u8,
        lockup_secs: i64,
    ) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let desk_key = ctx.accounts.desk.key();
        let beneficiary = ctx.accounts.beneficiary.key();
        let terms = OfferTerms {
            token_amount: token_amount as u128,
            discount_bps,
            currency: PaymentCurrency::try_from(currency).map_err(OtcError::from)?,
            lockup_secs,
        };
        let mut state = ctx.accounts.desk.to_state()?;
        let record = state
            .create_offer(to_id(&beneficiary), terms, &ctx.accounts.desk.prices(), now)
            .map_err(OtcError::from)?;
        ctx.accounts.desk.store(&state)?;

        let offer = &mut ctx.accounts.offer;
        offer.desk = desk_key;
        offer.store(&record)?;
        emit!(OfferCreated {
            desk: desk_key,
            offer: offer.key(),
            offer_id: record.id,
            consignment_id: 0,
            beneficiary,
            token_amount,
            discount_bps,
            currency,
        });
        Ok(())
    }

    pub fn create_offer_from_consignment(
        ctx: Context<CreateOfferFromConsignment>,
        token_amount: u64,
        discount_bps: u16,
        currency: u8,
        lockup_secs: i64,
    ) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let desk_key = ctx.accounts.desk.key();
        let beneficiary = ctx.accounts.beneficiary.key();
        let terms = OfferTerms {
            token_amount: token_amount as u128,
            discount_bps,
            currency: PaymentCurrency::try_from(currency).map_err(OtcError::from)?,
            lockup_secs,
        };
        let mut state = ctx.accounts.desk.to_state()?;
        let mut consignment = ctx.accounts.consignment.to_record();
        let record = state
            .create_offer_from_consignment(&mut consignment, to_id(&beneficiary), terms, &ctx.accounts.desk.prices(), now)
            .map_err(OtcError::from)?;
        ctx.accounts.desk.store(&state)?;
        ctx.accounts.consignment.store(&consignment)?;

        let offer = &mut ctx.accounts.offer;
        offer.desk = desk_key;
        offer.store(&record)?;
        emit!(OfferCreated {
            desk: desk_key,
            offer: offer.key(),
            offer_id: record.id,
            consignment_id: consignment.id,
            beneficiary,
            token_amount,
            discount_bps,
            currency,
        });
        Ok(())
    }

    pub fn create_consignment(
        ctx: Context<CreateConsignment>,
        amount: u64,
        is_negotiable: bool,
        fixed_discount_bps: u16,
        fixed_lockup_days: u32,
        min_discount_bps: u16,
        max_discount_bps: u16,
        min_lockup_days: u32,
        max_lockup_days: u32,
        min_deal_amount: u64,
        max_deal_amount: u64,
        is_fractionalized: bool,
        is_private: bool,
        max_price_volatility_bps: u16,
        max_time_to_execute_secs: i64,
        allow_list: Vec<Pubkey>,
    ) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let desk_key = ctx.accounts.desk.key();
        let consigner = ctx.accounts.consigner.key();
        let terms = if is_negotiable {
            ConsignmentTerms::Negotiable { min_discount_bps, max_discount_bps, min_lockup_days, max_lockup_days }
        } else {
            ConsignmentTerms::Fixed { discount_bps: fixed_discount_bps, lockup_days: fixed_lockup_days }
        };
        let params = ConsignmentParams {
            token_id: to_id(&ctx.accounts.token_mint.key()),
            amount: amount as u128,
            terms,
            min_deal_amount: min_deal_amount as u128,
            max_deal_amount: max_deal_amount as u128,
            is_fractionalized,
            is_private,
            allow_list: allow_list.iter().map(to_id).collect(),
            max_price_volatility_bps,
            max_time_to_execute_secs,
        };
        let mut state = ctx.accounts.desk.to_state()?;
        // no listing deposit is collected on Solana
        let record = state.create_consignment(to_id(&consigner), params, 0, now).map_err(OtcError::from)?;
        spl_transfer(
            &ctx.accounts.token_program,
            ctx.accounts.consigner_token_ata.to_account_info(),
            ctx.accounts.desk_token_treasury.to_account_info(),
            ctx.accounts.consigner.to_account_info(),
            amount,
        )?;
        ctx.accounts.desk.store(&state)?;

        let consignment = &mut ctx.accounts.consignment;
        consignment.desk = desk_key;
        consignment.store(&record)?;
        emit!(ConsignmentCreated {
            desk: desk_key,
            consignment: consignment.key(),
            consignment_id: record.id,
            consigner,
            amount,
        });
        Ok(())
    }

    pub fn withdraw_consignment(ctx: Context<WithdrawConsignment>) -> Result<()> {
        let consigner = ctx.accounts.consigner.key();
        let mut state = ctx.accounts.desk.to_state()?;
        let mut record = ctx.accounts.consignment.to_record();
        let withdrawal = state.withdraw_consignment(&mut record, to_id(&consigner)).map_err(OtcError::from)?;
        let amount = narrow(withdrawal.tokens)?;
        spl_transfer(
            &ctx.accounts.token_program,
            ctx.accounts.desk_token_treasury.to_account_info(),
            ctx.accounts.consigner_token_ata.to_account_info(),
            ctx.accounts.desk_signer.to_account_info(),
            amount,
        )?;
        ctx.accounts.desk.store(&state)?;
        ctx.accounts.consignment.store(&record)?;
        emit!(ConsignmentWithdrawn { consignment: ctx.accounts.consignment.key(), consigner, amount });
        Ok(())
    }

    pub fn approve_offer(ctx: Context<ApproveOffer>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let approver = ctx.accounts.approver.key();
        let state = ctx.accounts.desk.to_state()?;
        let mut record = ctx.accounts.offer.to_record()?;
        let fully_approved = state
            .approve_offer(&mut record, to_id(&approver), &ctx.accounts.desk.prices(), now)
            .map_err(OtcError::from)?;
        ctx.accounts.offer.store(&record)?;
        emit!(OfferApproved { offer: ctx.accounts.offer.key(), approver, fully_approved });
        Ok(())
    }

    pub fn cancel_offer(ctx: Context<CancelOffer>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let caller = ctx.accounts.caller.key();
        let mut state = ctx.accounts.desk.to_state()?;
        let mut record = ctx.accounts.offer.to_record()?;
        let mut consignment = load_linked(&ctx.accounts.consignment);
        state
            .cancel_offer(&mut record, consignment.as_mut(), to_id(&caller), now)
            .map_err(OtcError::from)?;
        ctx.accounts.desk.store(&state)?;
        ctx.accounts.offer.store(&record)?;
        store_linked(&mut ctx.accounts.consignment, consignment.as_ref())?;
        emit!(OfferCancelled { offer: ctx.accounts.offer.key(), by: caller });
        Ok(())
    }

    /// `max_usdc` bounds what the payer is willing to send; only the exact
    /// amount due is pulled.
    pub fn fulfill_offer_usdc(mut ctx: Context<FulfillOfferUsdc>, max_usdc: u64) -> Result<()> {
        let payer = ctx.accounts.payer.key();
        let accounts = &mut ctx.accounts;
        let payment = settle_payment(
            &mut accounts.desk,
            &mut accounts.offer,
            &mut accounts.consignment,
            payer,
            PaymentCurrency::Stable,
            max_usdc,
        )?;
        let amount = narrow(payment.required)?;
        spl_transfer(
            &accounts.token_program,
            accounts.payer_usdc_ata.to_account_info(),
            accounts.desk_usdc_treasury.to_account_info(),
            accounts.payer.to_account_info(),
            amount,
        )?;
        emit!(OfferPaid { offer: accounts.offer.key(), payer, amount, currency: PaymentCurrency::Stable as u8 });
        Ok(())
    }

    pub fn fulfill_offer_sol(mut ctx: Context<FulfillOfferSol>, max_lamports: u64) -> Result<()> {
        let payer = ctx.accounts.payer.key();
        let accounts = &mut ctx.accounts;
        let payment = settle_payment(
            &mut accounts.desk,
            &mut accounts.offer,
            &mut accounts.consignment,
            payer,
            PaymentCurrency::Native,
            max_lamports,
        )?;
        let lamports = narrow(payment.required)?;
        let ix = anchor_lang::solana_program::system_instruction::transfer(&payer, &accounts.desk.key(), lamports);
        anchor_lang::solana_program::program::invoke(&ix, &[
            accounts.payer.to_account_info(),
            accounts.desk.to_account_info(),
            accounts.system_program.to_account_info(),
        ])?;
        emit!(OfferPaid { offer: accounts.offer.key(), payer, amount: lamports, currency: PaymentCurrency::Native as u8 });
        Ok(())
    }

    pub fn claim(ctx: Context<Claim>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let beneficiary = ctx.accounts.beneficiary.key();
        let mut state = ctx.accounts.desk.to_state()?;
        let mut record = ctx.accounts.offer.to_record()?;
        let delivery = state.claim_offer(&mut record, to_id(&beneficiary), now).map_err(OtcError::from)?;
        let amount = narrow(delivery.amount)?;
        spl_transfer(
            &ctx.accounts.token_program,
            ctx.accounts.desk_token_treasury.to_account_info(),
            ctx.accounts.beneficiary_token_ata.to_account_info(),
            ctx.accounts.desk_signer.to_account_info(),
            amount,
        )?;
        ctx.accounts.desk.store(&state)?;
        ctx.accounts.offer.store(&record)?;
        emit!(TokensClaimed { offer: ctx.accounts.offer.key(), beneficiary, amount });
        Ok(())
    }

    /// Remaining accounts come in `(offer, beneficiary token account)` pairs.
    /// Pairs that fail to load are left out, so their ids are skipped as
    /// unknown.
    pub fn auto_claim<'info>(ctx: Context<'_, '_, 'info, 'info, AutoClaim<'info>>, offer_ids: Vec<u64>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let desk_key = ctx.accounts.desk.key();
        let token_mint = ctx.accounts.desk.token_mint;
        let mut state = ctx.accounts.desk.to_state()?;

        let mut loaded: Vec<(Account<'info, Offer>, &'info AccountInfo<'info>)> = Vec::new();
        let mut store = BTreeMap::new();
        for pair in ctx.remaining_accounts.chunks(2) {
            let [offer_info, ata_info] = pair else {
                return err!(OtcError::BadState);
            };
            let Ok(offer) = Account::<Offer>::try_from(offer_info) else {
                msg!("skipping {}: not an offer account", offer_info.key);
                continue;
            };
            if offer.desk != desk_key || !offer_info.is_writable {
                msg!("skipping {}: not a writable offer of this desk", offer_info.key);
                continue;
            }
            let ata_ok = Account::<TokenAccount>::try_from(ata_info)
                .map(|ata| ata.mint == token_mint && ata.owner == offer.beneficiary)
                .unwrap_or(false);
            if !ata_ok || !ata_info.is_writable {
                msg!("skipping {}: bad beneficiary token account", offer_info.key);
                continue;
            }
            let record = offer.to_record()?;
            store.insert(record.id, record);
            loaded.push((offer, ata_info));
        }

        let caller = to_id(&ctx.accounts.approver.key());
        let report = state.auto_claim(&mut store, caller, &offer_ids, now).map_err(OtcError::from)?;
        for (id, reason) in &report.skipped {
            msg!("offer {} skipped: {}", id, reason);
        }

        let treasury = ctx.accounts.desk_token_treasury.to_account_info();
        let signer = ctx.accounts.desk_signer.to_account_info();
        for delivery in &report.claimed {
            let Some((account, ata)) = loaded.iter_mut().find(|(account, _)| account.id == delivery.offer_id) else {
                continue;
            };
            if let Some(record) = store.get(&delivery.offer_id) {
                account.store(record)?;
            }
            let amount = narrow(delivery.amount)?;
            spl_transfer(&ctx.accounts.token_program, treasury.clone(), ata.to_account_info(), signer.clone(), amount)?;
            account.exit(&crate::ID)?;
            emit!(TokensClaimed { offer: account.key(), beneficiary: to_pubkey(&delivery.beneficiary), amount });
        }
        ctx.accounts.desk.store(&state)?;
        Ok(())
    }

    pub fn emergency_refund_sol(mut ctx: Context<EmergencyRefundSol>) -> Result<()> {
        let offer = &ctx.accounts.offer;
        require!(!offer.paid || offer.currency == PaymentCurrency::Native as u8, OtcError::UnsupportedCurrency);
        let caller = ctx.accounts.caller.key();
        let accounts = &mut ctx.accounts;
        let refund = run_emergency_refund(&mut accounts.desk, &mut accounts.offer, &mut accounts.consignment, caller)?;
        let amount = narrow(refund.amount)?;
        if amount > 0 {
            require_keys_eq!(accounts.payer_refund.key(), to_pubkey(&refund.to), OtcError::RecipientMismatch);
            move_lamports(&accounts.desk.to_account_info(), &accounts.payer_refund.to_account_info(), amount)?;
        }
        emit!(EmergencyRefunded {
            offer: accounts.offer.key(),
            to: to_pubkey(&refund.to),
            amount,
            currency: refund.currency as u8,
        });
        Ok(())
    }

    pub fn emergency_refund_usdc(mut ctx: Context<EmergencyRefundUsdc>) -> Result<()> {
        let offer = &ctx.accounts.offer;
        require!(!offer.paid || offer.currency == PaymentCurrency::Stable as u8, OtcError::UnsupportedCurrency);
        let caller = ctx.accounts.caller.key();
        let accounts = &mut ctx.accounts;
        let refund = run_emergency_refund(&mut accounts.desk, &mut accounts.offer, &mut accounts.consignment, caller)?;
        let amount = narrow(refund.amount)?;
        if amount > 0 {
            require_keys_eq!(accounts.payer_usdc_refund.owner, to_pubkey(&refund.to), OtcError::RecipientMismatch);
            spl_transfer(
                &accounts.token_program,
                accounts.desk_usdc_treasury.to_account_info(),
                accounts.payer_usdc_refund.to_account_info(),
                accounts.desk_signer.to_account_info(),
                amount,
            )?;
        }
        emit!(EmergencyRefunded {
            offer: accounts.offer.key(),
            to: to_pubkey(&refund.to),
            amount,
            currency: refund.currency as u8,
        });
        Ok(())
    }
}

#[derive(Accounts)]
pub struct InitDesk<'info> {
    #[account(mut)]
    pub payer: Signer<'info>,
    pub owner: Signer<'info>,
    /// CHECK: only stored as the agent role
    pub agent: UncheckedAccount<'info>,
    pub token_mint: Account<'info, Mint>,
    pub usdc_mint: Account<'info, Mint>,
    pub system_program: Program<'info, System>,
    #[account(init, payer = payer, space = 8 + Desk::SIZE)]
    pub desk: Account<'info, Desk>,
}

#[derive(Accounts)]
pub struct OnlyOwnerDesk<'info> {
    pub owner: Signer<'info>,
    #[account(mut, has_one = owner @ OtcError::Unauthorized)]
    pub desk: Account<'info, Desk>,
}

#[derive(Accounts)]
pub struct UpdatePricesFromPyth<'info> {
    #[account(mut)]
    pub desk: Account<'info, Desk>,
    /// Pyth price feed account for token/USD
    pub token_price_feed: Account<'info, PriceUpdateV2>,
    /// Pyth price feed account for SOL/USD
    pub sol_price_feed: Account<'info, PriceUpdateV2>,
    pub payer: Signer<'info>,
}

#[derive(Accounts)]
pub struct DepositTokens<'info> {
    #[account(mut)]
    pub desk: Account<'info, Desk>,
    #[account(mut)]
    pub owner: Signer<'info>,
    #[account(mut, constraint = owner_token_ata.mint == desk.token_mint, constraint = owner_token_ata.owner == owner.key())]
    pub owner_token_ata: Account<'info, TokenAccount>,
    #[account(mut, constraint = desk_token_treasury.mint == desk.token_mint, constraint = desk_token_treasury.owner == desk.key())]
    pub desk_token_treasury: Account<'info, TokenAccount>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct WithdrawTokens<'info> {
    pub owner: Signer<'info>,
    #[account(mut, has_one = owner @ OtcError::Unauthorized)]
    pub desk: Account<'info, Desk>,
    #[account(address = desk.key() @ OtcError::Unauthorized)]
    pub desk_signer: Signer<'info>,
    #[account(mut, constraint = desk_token_treasury.mint == desk.token_mint, constraint = desk_token_treasury.owner == desk.key())]
    pub desk_token_treasury: Account<'info, TokenAccount>,
    #[account(mut, constraint = to_token_ata.mint == desk.token_mint)]
    pub to_token_ata: Account<'info, TokenAccount>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct WithdrawUsdc<'info> {
    pub owner: Signer<'info>,
    #[account(mut, has_one = owner @ OtcError::Unauthorized)]
    pub desk: Account<'info, Desk>,
    #[account(address = desk.key() @ OtcError::Unauthorized)]
    pub desk_signer: Signer<'info>,
    #[account(mut, constraint = desk_usdc_treasury.mint == desk.usdc_mint, constraint = desk_usdc_treasury.owner == desk.key())]
    pub desk_usdc_treasury: Account<'info, TokenAccount>,
    #[account(mut, constraint = to_usdc_ata.mint == desk.usdc_mint)]
    pub to_usdc_ata: Account<'info, TokenAccount>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct WithdrawSol<'info> {
    pub owner: Signer<'info>,
    #[account(mut, has_one = owner @ OtcError::Unauthorized)]
    pub desk: Account<'info, Desk>,
    /// CHECK: system account
    #[account(mut)]
    pub to: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct CreateOffer<'info> {
    #[account(mut)]
    pub desk: Account<'info, Desk>,
    #[account(mut)]
    pub beneficiary: Signer<'info>,
    #[account(init, payer = beneficiary, space = 8 + Offer::SIZE)]
    pub offer: Account<'info, Offer>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct CreateOfferFromConsignment<'info> {
    #[account(mut)]
    pub desk: Account<'info, Desk>,
    #[account(mut, has_one = desk)]
    pub consignment: Account<'info, Consignment>,
    #[account(mut)]
    pub beneficiary: Signer<'info>,
    #[account(init, payer = beneficiary, space = 8 + Offer::SIZE)]
    pub offer: Account<'info, Offer>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct CreateConsignment<'info> {
    #[account(mut)]
    pub desk: Account<'info, Desk>,
    #[account(mut)]
    pub consigner: Signer<'info>,
    pub token_mint: Account<'info, Mint>,
    #[account(mut, constraint = consigner_token_ata.mint == token_mint.key(), constraint = consigner_token_ata.owner == consigner.key())]
    pub consigner_token_ata: Account<'info, TokenAccount>,
    #[account(mut, constraint = desk_token_treasury.mint == desk.token_mint, constraint = desk_token_treasury.owner == desk.key())]
    pub desk_token_treasury: Account<'info, TokenAccount>,
    #[account(init, payer = consigner, space = 8 + Consignment::SIZE)]
    pub consignment: Account<'info, Consignment>,
    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct WithdrawConsignment<'info> {
    #[account(mut)]
    pub desk: Account<'info, Desk>,
    #[account(address = desk.key() @ OtcError::Unauthorized)]
    pub desk_signer: Signer<'info>,
    #[account(mut, has_one = desk)]
    pub consignment: Account<'info, Consignment>,
    pub consigner: Signer<'info>,
    #[account(mut, constraint = desk_token_treasury.mint == desk.token_mint, constraint = desk_token_treasury.owner == desk.key())]
    pub desk_token_treasury: Account<'info, TokenAccount>,
    #[account(mut, constraint = consigner_token_ata.mint == desk.token_mint, constraint = consigner_token_ata.owner == consigner.key())]
    pub consigner_token_ata: Account<'info, TokenAccount>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct ApproveOffer<'info> {
    pub desk: Account<'info, Desk>,
    #[account(mut, has_one = desk)]
    pub offer: Account<'info, Offer>,
    pub approver: Signer<'info>,
}

#[derive(Accounts)]
pub struct CancelOffer<'info> {
    #[account(mut)]
    pub desk: Account<'info, Desk>,
    #[account(mut, has_one = desk)]
    pub offer: Account<'info, Offer>,
    /// Required when the offer was cut from a consignment.
    #[account(mut, has_one = desk)]
    pub consignment: Option<Account<'info, Consignment>>,
    pub caller: Signer<'info>,
}

#[derive(Accounts)]
pub struct FulfillOfferUsdc<'info> {
    #[account(mut)]
    pub desk: Account<'info, Desk>,
    #[account(mut, has_one = desk)]
    pub offer: Account<'info, Offer>,
    #[account(mut, has_one = desk)]
    pub consignment: Option<Account<'info, Consignment>>,
    #[account(mut, constraint = desk_usdc_treasury.mint == desk.usdc_mint, constraint = desk_usdc_treasury.owner == desk.key())]
    pub desk_usdc_treasury: Account<'info, TokenAccount>,
    #[account(mut, constraint = payer_usdc_ata.mint == desk.usdc_mint, constraint = payer_usdc_ata.owner == payer.key())]
    pub payer_usdc_ata: Account<'info, TokenAccount>,
    #[account(mut)]
    pub payer: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct FulfillOfferSol<'info> {
    #[account(mut)]
    pub desk: Account<'info, Desk>,
    #[account(mut, has_one = desk)]
    pub offer: Account<'info, Offer>,
    #[account(mut, has_one = desk)]
    pub consignment: Option<Account<'info, Consignment>>,
    #[account(mut)]
    pub payer: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct Claim<'info> {
    #[account(mut)]
    pub desk: Account<'info, Desk>,
    #[account(address = desk.key() @ OtcError::Unauthorized)]
    pub desk_signer: Signer<'info>,
    #[account(mut, has_one = desk)]
    pub offer: Account<'info, Offer>,
    #[account(mut, constraint = desk_token_treasury.mint == desk.token_mint, constraint = desk_token_treasury.owner == desk.key())]
    pub desk_token_treasury: Account<'info, TokenAccount>,
    #[account(mut, constraint = beneficiary_token_ata.mint == desk.token_mint, constraint = beneficiary_token_ata.owner == beneficiary.key())]
    pub beneficiary_token_ata: Account<'info, TokenAccount>,
    pub beneficiary: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct AutoClaim<'info> {
    #[account(mut)]
    pub desk: Account<'info, Desk>,
    #[account(address = desk.key() @ OtcError::Unauthorized)]
    pub desk_signer: Signer<'info>,
    pub approver: Signer<'info>,
    #[account(mut, constraint = desk_token_treasury.mint == desk.token_mint, constraint = desk_token_treasury.owner == desk.key())]
    pub desk_token_treasury: Account<'info, TokenAccount>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct EmergencyRefundSol<'info> {
    #[account(mut)]
    pub desk: Account<'info, Desk>,
    #[account(mut, has_one = desk)]
    pub offer: Account<'info, Offer>,
    #[account(mut, has_one = desk)]
    pub consignment: Option<Account<'info, Consignment>>,
    pub caller: Signer<'info>,
    /// CHECK: must match the offer's payer when lamports are returned
    #[account(mut)]
    pub payer_refund: UncheckedAccount<'info>,
}

#[derive(Accounts)]
pub struct EmergencyRefundUsdc<'info> {
    #[account(mut)]
    pub desk: Account<'info, Desk>,
    #[account(address = desk.key() @ OtcError::Unauthorized)]
    pub desk_signer: Signer<'info>,
    #[account(mut, has_one = desk)]
    pub offer: Account<'info, Offer>,
    #[account(mut, has_one = desk)]
    pub consignment: Option<Account<'info, Consignment>>,
    pub caller: Signer<'info>,
    #[account(mut, constraint = desk_usdc_treasury.mint == desk.usdc_mint, constraint = desk_usdc_treasury.owner == desk.key())]
    pub desk_usdc_treasury: Account<'info, TokenAccount>,
    #[account(mut, constraint = payer_usdc_refund.mint == desk.usdc_mint)]
    pub payer_usdc_refund: Account<'info, TokenAccount>,
    pub token_program: Program<'info, Token>,
}

/// Runs an owner-only protocol setter against the desk account.
fn as_owner(
    accounts: &mut OnlyOwnerDesk<'_>,
    apply: impl FnOnce(&mut DeskState<Id>, &Id) -> DeskResult<()>,
) -> Result<()> {
    let owner = to_id(&accounts.owner.key());
    let mut state = accounts.desk.to_state()?;
    apply(&mut state, &owner).map_err(OtcError::from)?;
    accounts.desk.store(&state)
}

fn load_linked(consignment: &Option<Account<'_, Consignment>>) -> Option<ConsignmentRecord> {
    consignment.as_ref().map(|account| account.to_record())
}

fn store_linked(consignment: &mut Option<Account<'_, Consignment>>, record: Option<&ConsignmentRecord>) -> Result<()> {
    if let (Some(account), Some(record)) = (consignment.as_mut(), record) {
        account.store(record)?;
    }
    Ok(())
}

fn settle_payment(
    desk: &mut Account<'_, Desk>,
    offer: &mut Account<'_, Offer>,
    consignment: &mut Option<Account<'_, Consignment>>,
    payer: Pubkey,
    currency: PaymentCurrency,
    sent: u64,
) -> Result<Payment<Id>> {
    let now = Clock::get()?.unix_timestamp;
    let mut state = desk.to_state()?;
    let mut record = offer.to_record()?;
    let mut linked = load_linked(consignment);
    let payment = state
        .fulfill_offer(&mut record, linked.as_mut(), to_id(&payer), currency, sent as u128, now)
        .map_err(OtcError::from)?;
    desk.store(&state)?;
    offer.store(&record)?;
    store_linked(consignment, linked.as_ref())?;
    Ok(payment)
}

fn run_emergency_refund(
    desk: &mut Account<'_, Desk>,
    offer: &mut Account<'_, Offer>,
    consignment: &mut Option<Account<'_, Consignment>>,
    caller: Pubkey,
) -> Result<Refund<Id>> {
    let now = Clock::get()?.unix_timestamp;
    let mut state = desk.to_state()?;
    let mut record = offer.to_record()?;
    let mut linked = load_linked(consignment);
    let refund = state
        .emergency_refund(&mut record, linked.as_mut(), to_id(&caller), now)
        .map_err(OtcError::from)?;
    desk.store(&state)?;
    offer.store(&record)?;
    store_linked(consignment, linked.as_ref())?;
    Ok(refund)
}

fn spl_transfer<'info>(
    token_program: &Program<'info, Token>,
    from: AccountInfo<'info>,
    to: AccountInfo<'info>,
    authority: AccountInfo<'info>,
    amount: u64,
) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }
    let cpi_ctx = CpiContext::new(token_program.to_account_info(), SplTransfer { from, to, authority });
    token::transfer(cpi_ctx, amount)
}

/// Moves lamports out of a program-owned account.
fn move_lamports(from: &AccountInfo, to: &AccountInfo, amount: u64) -> Result<()> {
    let from_balance = from.lamports().checked_sub(amount).ok_or(OtcError::Overflow)?;
    let to_balance = to.lamports().checked_add(amount).ok_or(OtcError::Overflow)?;
    **from.try_borrow_mut_lamports()? = from_balance;
    **to.try_borrow_mut_lamports()? = to_balance;
    Ok(())
}
