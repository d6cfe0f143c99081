use serde::{Deserialize, Serialize};

use crate::error::{DeskError, DeskResult};

/// Custodied sale-token balance and the part of it earmarked for open offers
/// and consignments. `reserved <= total` holds after every call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLedger {
    total: u128,
    reserved: u128,
}

impl InventoryLedger {
    pub fn from_parts(total: u128, reserved: u128) -> DeskResult<Self> {
        if reserved > total {
            return Err(DeskError::BadState);
        }
        Ok(Self { total, reserved })
    }

    pub fn total(&self) -> u128 {
        self.total
    }

    pub fn reserved(&self) -> u128 {
        self.reserved
    }

    pub fn available(&self) -> u128 {
        self.total - self.reserved
    }

    pub fn deposit(&mut self, amount: u128) -> DeskResult<()> {
        if amount == 0 {
            return Err(DeskError::AmountRange);
        }
        self.total = self.total.checked_add(amount).ok_or(DeskError::Overflow)?;
        Ok(())
    }

    pub fn reserve(&mut self, amount: u128) -> DeskResult<()> {
        if self.available() < amount {
            return Err(DeskError::InventoryExhausted);
        }
        self.reserved += amount;
        Ok(())
    }

    pub fn release(&mut self, amount: u128) -> DeskResult<()> {
        self.reserved = self.reserved.checked_sub(amount).ok_or(DeskError::Overflow)?;
        Ok(())
    }

    /// Removes unreserved tokens from custody.
    pub fn withdraw(&mut self, amount: u128) -> DeskResult<()> {
        if self.available() < amount {
            return Err(DeskError::ReservedBalanceViolation);
        }
        self.total -= amount;
        Ok(())
    }

    /// Releases a reservation and sends the same tokens out of custody, as on
    /// claim or consignment withdrawal.
    pub fn disburse(&mut self, amount: u128) -> DeskResult<()> {
        if self.reserved < amount {
            return Err(DeskError::Overflow);
        }
        self.reserved -= amount;
        self.total -= amount;
        Ok(())
    }
}
