//! Runtime-agnostic OTC desk protocol.
//!
//! The desk sells one token at a discount for a native or a stable asset.
//! Offers move `Created -> Approved -> Paid -> Fulfilled` (or `Cancelled`),
//! with inventory reserved at creation, prices snapshotted at creation and
//! re-checked at approval, and delivery gated by a lockup.
//!
//! Hosts either drive [`DeskState`] directly with records they load from their
//! own storage (one account per offer on Solana), or keep everything in a
//! [`Desk`] arena (a contract's storage on EVM chains).

pub mod access;
pub mod batch;
pub mod config;
pub mod consignment;
pub mod desk;
pub mod error;
pub mod events;
pub mod identity;
pub mod inventory;
pub mod offer;
pub mod oracle;
pub mod settlement;
pub mod state;

pub use access::{AccessRegistry, Role, RoleSet};
pub use batch::{BatchReport, OfferStore};
pub use config::{AssetDecimals, DeskConfig, Limits};
pub use consignment::{Consignment, ConsignmentParams, ConsignmentTerms, ConsignmentWithdrawal};
pub use desk::Desk;
pub use error::{DeskError, DeskResult};
pub use events::DeskEvent;
pub use identity::Identity;
pub use inventory::InventoryLedger;
pub use offer::{Delivery, Offer, OfferStatus, OfferTerms, Payment, Refund};
pub use oracle::{PriceOracle, PriceQuote, PriceSnapshot, StoredPrices};
pub use settlement::{PaymentCurrency, Quote, SettlementCalculator};
pub use state::{DeskState, Treasury};
