use otc_protocol::DeskError;
use thiserror::Error;

/// Why a contract call reverted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Revert {
    #[error(transparent)]
    Desk(#[from] DeskError),
    #[error("zero agent")]
    ZeroAgent,
    #[error("ERC20: transfer amount exceeds balance")]
    InsufficientBalance,
    #[error("ERC20: insufficient allowance")]
    InsufficientAllowance,
    #[error("insufficient eth balance")]
    InsufficientNative,
    #[error("balance overflow")]
    BalanceOverflow,
    #[error("unsupported currency")]
    UnsupportedCurrency,
    #[error("bad token")]
    BadToken,
}

impl Revert {
    /// The string a caller sees in the revert data.
    pub fn reason(&self) -> String {
        match self {
            Revert::Desk(DeskError::InvalidAddress) => "zero addr".to_string(),
            other => other.to_string(),
        }
    }
}

pub type CallResult<T> = Result<T, Revert>;
