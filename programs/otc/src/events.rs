use anchor_lang::prelude::*;

#[event]
pub struct OfferCreated {
    pub desk: Pubkey,
    pub offer: Pubkey,
    pub offer_id: u64,
    pub consignment_id: u64,
    pub beneficiary: Pubkey,
    pub token_amount: u64,
    pub discount_bps: u16,
    pub currency: u8,
}

#[event]
pub struct OfferApproved { pub offer: Pubkey, pub approver: Pubkey, pub fully_approved: bool }

#[event]
pub struct OfferCancelled { pub offer: Pubkey, pub by: Pubkey }

#[event]
pub struct OfferPaid {
    pub offer: Pubkey,
    pub payer: Pubkey,
    pub amount: u64,
    pub currency: u8,
}

#[event]
pub struct TokensClaimed { pub offer: Pubkey, pub beneficiary: Pubkey, pub amount: u64 }

#[event]
pub struct EmergencyRefunded { pub offer: Pubkey, pub to: Pubkey, pub amount: u64, pub currency: u8 }

#[event]
pub struct ConsignmentCreated {
    pub desk: Pubkey,
    pub consignment: Pubkey,
    pub consignment_id: u64,
    pub consigner: Pubkey,
    pub amount: u64,
}

#[event]
pub struct ConsignmentWithdrawn { pub consignment: Pubkey, pub consigner: Pubkey, pub amount: u64 }

#[event]
pub struct LimitsUpdated {
    pub min_usd_amount_8d: u64,
    pub max_token_per_order: u64,
    pub quote_expiry_secs: i64,
    pub default_unlock_delay_secs: i64,
    pub max_lockup_secs: i64,
}

#[event]
pub struct PricesUpdated { pub token_usd_8d: u64, pub sol_usd_8d: u64, pub updated_at: i64, pub max_age: i64 }

#[event]
pub struct PythFeedsUpdated { pub token_feed_id: [u8; 32], pub sol_feed_id: [u8; 32] }

#[event]
pub struct AgentUpdated { pub agent: Pubkey }

#[event]
pub struct ApproverUpdated { pub approver: Pubkey, pub allowed: bool }

#[event]
pub struct RequiredApprovalsUpdated { pub required: u8 }

#[event]
pub struct OwnershipTransferred { pub previous: Pubkey, pub owner: Pubkey }

#[event]
pub struct RestrictFulfillUpdated { pub enabled: bool }

#[event]
pub struct EmergencyRefundUpdated { pub enabled: bool, pub deadline_secs: i64 }

#[event]
pub struct Paused { pub paused: bool }

#[event]
pub struct TokensDeposited { pub amount: u64 }

#[event]
pub struct TokensWithdrawn { pub to: Pubkey, pub amount: u64 }

#[event]
pub struct TreasuryWithdrawn { pub to: Pubkey, pub amount: u64, pub currency: u8 }
