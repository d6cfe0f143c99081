use core::fmt::Debug;
use core::hash::Hash;

use crate::error::{DeskError, DeskResult};

/// An account identity on the host chain: a `Pubkey` on Solana, a 20-byte
/// address on EVM chains. The zero value is never a valid role holder or
/// withdrawal destination.
pub trait Identity: Copy + Eq + Ord + Hash + Debug {
    fn zero() -> Self;

    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}

impl<const N: usize> Identity for [u8; N] {
    fn zero() -> Self {
        [0u8; N]
    }
}

pub fn non_zero<I: Identity>(who: I) -> DeskResult<I> {
    if who.is_zero() {
        return Err(DeskError::InvalidAddress);
    }
    Ok(who)
}
