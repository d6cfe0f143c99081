use std::collections::BTreeMap;

use crate::address::Address;
use crate::revert::{CallResult, Revert};

/// Balances and allowances of one ERC-20 token.
#[derive(Debug, Clone, Default)]
pub struct Erc20 {
    pub symbol: String,
    pub decimals: u8,
    balances: BTreeMap<Address, u128>,
    allowances: BTreeMap<(Address, Address), u128>,
}

impl Erc20 {
    pub fn new(symbol: &str, decimals: u8) -> Self {
        Self { symbol: symbol.to_string(), decimals, ..Self::default() }
    }

    pub fn mint(&mut self, to: Address, amount: u128) -> CallResult<()> {
        credit(&mut self.balances, to, amount)
    }

    pub fn balance_of(&self, who: &Address) -> u128 {
        self.balances.get(who).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or_default()
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: u128) {
        self.allowances.insert((owner, spender), amount);
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: u128) -> CallResult<()> {
        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(Revert::InsufficientBalance);
        }
        move_balance(&mut self.balances, from, from_balance - amount, to, amount)
    }

    pub fn transfer_from(&mut self, spender: Address, from: Address, to: Address, amount: u128) -> CallResult<()> {
        let allowed = self.allowance(&from, &spender);
        if allowed < amount {
            return Err(Revert::InsufficientAllowance);
        }
        self.transfer(from, to, amount)?;
        self.allowances.insert((from, spender), allowed - amount);
        Ok(())
    }
}

/// Native ether balances.
#[derive(Debug, Clone, Default)]
pub struct NativeLedger {
    balances: BTreeMap<Address, u128>,
}

impl NativeLedger {
    pub fn mint(&mut self, to: Address, amount: u128) -> CallResult<()> {
        credit(&mut self.balances, to, amount)
    }

    pub fn balance_of(&self, who: &Address) -> u128 {
        self.balances.get(who).copied().unwrap_or_default()
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: u128) -> CallResult<()> {
        let from_balance = self.balance_of(&from);
        if from_balance < amount {
            return Err(Revert::InsufficientNative);
        }
        move_balance(&mut self.balances, from, from_balance - amount, to, amount)
    }
}

fn credit(balances: &mut BTreeMap<Address, u128>, to: Address, amount: u128) -> CallResult<()> {
    let balance = balances.get(&to).copied().unwrap_or_default();
    balances.insert(to, balance.checked_add(amount).ok_or(Revert::BalanceOverflow)?);
    Ok(())
}

/// Writes the debited sender balance and credits `to`; nothing changes if the
/// credit would overflow.
fn move_balance(
    balances: &mut BTreeMap<Address, u128>,
    from: Address,
    from_after: u128,
    to: Address,
    amount: u128,
) -> CallResult<()> {
    if from == to {
        return Ok(());
    }
    let to_balance = balances.get(&to).copied().unwrap_or_default();
    let to_after = to_balance.checked_add(amount).ok_or(Revert::BalanceOverflow)?;
    balances.insert(from, from_after);
    balances.insert(to, to_after);
    Ok(())
}
