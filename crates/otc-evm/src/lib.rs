//! EVM host for the OTC desk protocol: 20-byte addresses, Chainlink-style
//! price feeds, ERC-20 and ether balance movement, and revert strings.

pub mod address;
pub mod contract;
pub mod erc20;
pub mod feeds;
pub mod revert;

pub use address::Address;
pub use contract::{ConsignmentArgs, Msg, OtcContract};
pub use erc20::{Erc20, NativeLedger};
pub use feeds::{Aggregator, AggregatorOracle, MockAggregator, RoundData};
pub use revert::{CallResult, Revert};
