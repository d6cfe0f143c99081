use serde::{Deserialize, Serialize};

use crate::config::Limits;
use crate::error::DeskError;
use crate::settlement::PaymentCurrency;

/// Log entry for a successful write. Hosts drain these after each call and
/// publish them in their own format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum DeskEvent<I> {
    OfferCreated { offer_id: u64, consignment_id: u64, beneficiary: I, token_amount: u128, discount_bps: u16, currency: PaymentCurrency },
    OfferApproved { offer_id: u64, approver: I, fully_approved: bool },
    OfferPaid { offer_id: u64, payer: I, currency: PaymentCurrency, amount: u128, refund: u128 },
    TokensClaimed { offer_id: u64, beneficiary: I, amount: u128 },
    ClaimSkipped { offer_id: u64, reason: DeskError },
    OfferCancelled { offer_id: u64, by: I },
    EmergencyRefunded { offer_id: u64, to: I, currency: PaymentCurrency, amount: u128 },
    ConsignmentCreated { consignment_id: u64, consigner: I, amount: u128, deposit: u128 },
    ConsignmentWithdrawn { consignment_id: u64, consigner: I, tokens: u128, deposit: u128 },
    PricesUpdated { token_usd_8d: u64, native_usd_8d: u64, updated_at: i64, max_age_secs: i64 },
    LimitsUpdated { limits: Limits },
    AgentUpdated { agent: I },
    ApproverUpdated { approver: I, allowed: bool },
    RequiredApprovalsUpdated { required: u8 },
    OwnershipTransferred { owner: I },
    Paused { paused: bool },
    RestrictFulfillUpdated { enabled: bool },
    EmergencyRefundUpdated { enabled: bool, deadline_secs: i64 },
    MaxOpenOffersUpdated { max: usize },
    RequiredGasDepositUpdated { amount: u128 },
    TokensDeposited { amount: u128 },
    TokensWithdrawn { to: I, amount: u128 },
    TreasuryWithdrawn { currency: PaymentCurrency, to: I, amount: u128 },
}
