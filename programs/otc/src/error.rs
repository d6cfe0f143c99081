use anchor_lang::prelude::*;
use otc_protocol::DeskError;

#[error_code]
pub enum OtcError {
    #[msg("Zero address")] InvalidAddress,
    #[msg("Not authorized")] Unauthorized,
    #[msg("Paused")] Paused,
    #[msg("Too many approvers")] TooManyApprovers,
    #[msg("Already approved")] AlreadyApproved,
    #[msg("Not approved")] NotApproved,
    #[msg("Price deviation too large")] PriceDeviationTooLarge,
    #[msg("No price set")] NoPrice,
    #[msg("Price data is stale")] StalePrice,
    #[msg("Bad price from oracle")] BadPrice,
    #[msg("Insufficient token inventory")] InsuffInv,
    #[msg("Withdrawal would dip into reserved inventory")] ReservedInv,
    #[msg("Treasury balance too low")] TreasuryExhausted,
    #[msg("Amount out of range")] AmountRange,
    #[msg("Discount out of range")] Discount,
    #[msg("Lockup too long")] LockupTooLong,
    #[msg("Lockup outside consignment terms")] LockupOutOfRange,
    #[msg("Minimum USD not met")] MinUsd,
    #[msg("Unsupported currency")] UnsupportedCurrency,
    #[msg("Locked")] Locked,
    #[msg("Only the beneficiary may claim")] NotBeneficiary,
    #[msg("Quote expired")] Expired,
    #[msg("Not expired")] NotExpired,
    #[msg("Insufficient payment")] InsufficientPayment,
    #[msg("Fulfill restricted")] FulfillRestricted,
    #[msg("Emergency refunds disabled")] EmergencyRefundDisabled,
    #[msg("Too early for emergency refund")] TooEarlyForRefund,
    #[msg("Too many offers for batch")] TooManyOffers,
    #[msg("Bad state")] BadState,
    #[msg("Unknown offer")] UnknownOffer,
    #[msg("Unknown consignment")] UnknownConsignment,
    #[msg("Consignment inactive")] ConsignmentInactive,
    #[msg("Consignment has pending offers")] PendingOffers,
    #[msg("Buyer not on allow-list")] NotOnAllowList,
    #[msg("Deposit below required amount")] InsufficientDeposit,
    #[msg("Token not sold by this desk")] UnsupportedToken,
    #[msg("Overflow")] Overflow,
    #[msg("USDC must have 6 decimals")] UsdcDecimals,
    #[msg("Oracle feed IDs not configured")] FeedNotConfigured,
    #[msg("Refund recipient does not match")] RecipientMismatch,
}

impl From<DeskError> for OtcError {
    fn from(err: DeskError) -> Self {
        match err {
            DeskError::InvalidAddress => OtcError::InvalidAddress,
            DeskError::Unauthorized => OtcError::Unauthorized,
            DeskError::Paused => OtcError::Paused,
            DeskError::TooManyApprovers => OtcError::TooManyApprovers,
            DeskError::ApprovalConflict => OtcError::AlreadyApproved,
            DeskError::NotApproved => OtcError::NotApproved,
            DeskError::PriceDeviationExceeded => OtcError::PriceDeviationTooLarge,
            DeskError::NoPrice => OtcError::NoPrice,
            DeskError::StalePrice => OtcError::StalePrice,
            DeskError::BadPrice => OtcError::BadPrice,
            DeskError::InventoryExhausted => OtcError::InsuffInv,
            DeskError::ReservedBalanceViolation => OtcError::ReservedInv,
            DeskError::TreasuryExhausted => OtcError::TreasuryExhausted,
            DeskError::AmountRange => OtcError::AmountRange,
            DeskError::DiscountOutOfRange => OtcError::Discount,
            DeskError::LockupTooLong => OtcError::LockupTooLong,
            DeskError::LockupOutOfRange => OtcError::LockupOutOfRange,
            DeskError::MinUsdNotMet => OtcError::MinUsd,
            DeskError::CurrencyMismatch => OtcError::UnsupportedCurrency,
            DeskError::LockupNotElapsed => OtcError::Locked,
            DeskError::UnauthorizedClaimant => OtcError::NotBeneficiary,
            DeskError::OfferExpired => OtcError::Expired,
            DeskError::QuoteNotExpired => OtcError::NotExpired,
            DeskError::InsufficientPayment => OtcError::InsufficientPayment,
            DeskError::FulfillRestricted => OtcError::FulfillRestricted,
            DeskError::EmergencyRefundsDisabled => OtcError::EmergencyRefundDisabled,
            DeskError::TooEarlyForRefund => OtcError::TooEarlyForRefund,
            DeskError::BatchTooLarge => OtcError::TooManyOffers,
            DeskError::BadState => OtcError::BadState,
            DeskError::UnknownOffer => OtcError::UnknownOffer,
            DeskError::UnknownConsignment => OtcError::UnknownConsignment,
            DeskError::ConsignmentInactive => OtcError::ConsignmentInactive,
            DeskError::ConsignmentHasPendingOffers => OtcError::PendingOffers,
            DeskError::NotOnAllowList => OtcError::NotOnAllowList,
            DeskError::InsufficientDeposit => OtcError::InsufficientDeposit,
            DeskError::UnsupportedToken => OtcError::UnsupportedToken,
            DeskError::Overflow => OtcError::Overflow,
        }
    }
}
