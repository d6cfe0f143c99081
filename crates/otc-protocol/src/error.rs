use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every way a desk operation can be refused. Single-item writes surface these
/// unchanged; batch claims record them per item instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DeskError {
    #[error("zero address")]
    InvalidAddress,
    #[error("caller lacks the required role")]
    Unauthorized,
    #[error("paused")]
    Paused,
    #[error("too many approvers")]
    TooManyApprovers,

    #[error("already approved")]
    ApprovalConflict,
    #[error("not approved")]
    NotApproved,
    #[error("price moved too much")]
    PriceDeviationExceeded,
    #[error("no price set")]
    NoPrice,
    #[error("price data is stale")]
    StalePrice,
    #[error("price out of bounds")]
    BadPrice,

    #[error("insufficient token inventory")]
    InventoryExhausted,
    #[error("withdrawal would dip into reserved inventory")]
    ReservedBalanceViolation,
    #[error("treasury balance too low")]
    TreasuryExhausted,

    #[error("amount out of range")]
    AmountRange,
    #[error("discount out of range")]
    DiscountOutOfRange,
    #[error("lockup too long")]
    LockupTooLong,
    #[error("lockup outside consignment terms")]
    LockupOutOfRange,
    #[error("minimum usd not met")]
    MinUsdNotMet,
    #[error("payment currency does not match offer")]
    CurrencyMismatch,

    #[error("locked")]
    LockupNotElapsed,
    #[error("only the beneficiary may claim")]
    UnauthorizedClaimant,
    #[error("quote expired")]
    OfferExpired,
    #[error("quote not expired")]
    QuoteNotExpired,
    #[error("insufficient payment")]
    InsufficientPayment,
    #[error("fulfill restricted")]
    FulfillRestricted,

    #[error("emergency refunds disabled")]
    EmergencyRefundsDisabled,
    #[error("too early for emergency refund")]
    TooEarlyForRefund,

    #[error("batch too large")]
    BatchTooLarge,
    #[error("bad state")]
    BadState,
    #[error("unknown offer")]
    UnknownOffer,

    #[error("unknown consignment")]
    UnknownConsignment,
    #[error("consignment inactive")]
    ConsignmentInactive,
    #[error("consignment has pending offers")]
    ConsignmentHasPendingOffers,
    #[error("buyer not on allow-list")]
    NotOnAllowList,
    #[error("deposit below required amount")]
    InsufficientDeposit,
    #[error("token not sold by this desk")]
    UnsupportedToken,

    #[error("overflow")]
    Overflow,
}

pub type DeskResult<T> = Result<T, DeskError>;
