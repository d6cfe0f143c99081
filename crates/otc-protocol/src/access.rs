use serde::{Deserialize, Serialize};

use crate::config::{MAX_APPROVERS, MAX_REQUIRED_APPROVALS};
use crate::error::{DeskError, DeskResult};
use crate::identity::{non_zero, Identity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Agent,
    Approver,
}

impl Role {
    const fn bit(self) -> u8 {
        match self {
            Role::Owner => 1,
            Role::Agent => 1 << 1,
            Role::Approver => 1 << 2,
        }
    }
}

/// The roles one identity holds, resolved once per call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleSet(u8);

impl RoleSet {
    pub fn with(mut self, role: Role) -> Self {
        self.0 |= role.bit();
        self
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Owner, agent and approvers all operate the desk's offer flow.
    pub fn is_operator(&self) -> bool {
        !self.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRegistry<I> {
    pub owner: I,
    pub agent: I,
    pub approvers: Vec<I>,
    pub required_approvals: u8,
}

impl<I: Identity> AccessRegistry<I> {
    pub fn new(owner: I, agent: I) -> DeskResult<Self> {
        Ok(Self { owner: non_zero(owner)?, agent: non_zero(agent)?, approvers: Vec::new(), required_approvals: 1 })
    }

    pub fn roles_of(&self, who: &I) -> RoleSet {
        let mut roles = RoleSet::default();
        if *who == self.owner {
            roles = roles.with(Role::Owner);
        }
        if *who == self.agent {
            roles = roles.with(Role::Agent);
        }
        if self.is_approver(who) {
            roles = roles.with(Role::Approver);
        }
        roles
    }

    pub fn is_approver(&self, who: &I) -> bool {
        self.approvers.contains(who)
    }

    pub fn only_owner(&self, who: &I) -> DeskResult<()> {
        if *who != self.owner {
            return Err(DeskError::Unauthorized);
        }
        Ok(())
    }

    pub fn only_operator(&self, who: &I) -> DeskResult<RoleSet> {
        let roles = self.roles_of(who);
        if !roles.is_operator() {
            return Err(DeskError::Unauthorized);
        }
        Ok(roles)
    }

    pub fn set_agent(&mut self, agent: I) -> DeskResult<()> {
        self.agent = non_zero(agent)?;
        Ok(())
    }

    pub fn transfer_ownership(&mut self, owner: I) -> DeskResult<()> {
        self.owner = non_zero(owner)?;
        Ok(())
    }

    pub fn set_approver(&mut self, who: I, allowed: bool) -> DeskResult<()> {
        non_zero(who)?;
        if allowed {
            if !self.approvers.contains(&who) {
                if self.approvers.len() >= MAX_APPROVERS {
                    return Err(DeskError::TooManyApprovers);
                }
                self.approvers.push(who);
            }
        } else if let Some(i) = self.approvers.iter().position(|x| *x == who) {
            self.approvers.remove(i);
        }
        Ok(())
    }

    pub fn set_required_approvals(&mut self, required: u8) -> DeskResult<()> {
        if required == 0 || required > MAX_REQUIRED_APPROVALS {
            return Err(DeskError::AmountRange);
        }
        self.required_approvals = required;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: [u8; 20] = [1; 20];
    const AGENT: [u8; 20] = [2; 20];
    const APPROVER: [u8; 20] = [3; 20];
    const STRANGER: [u8; 20] = [4; 20];

    fn registry() -> AccessRegistry<[u8; 20]> {
        let mut access = AccessRegistry::new(OWNER, AGENT).unwrap();
        access.set_approver(APPROVER, true).unwrap();
        access
    }

    #[test]
    fn rejects_zero_roles() {
        assert_eq!(AccessRegistry::new([0u8; 20], AGENT).unwrap_err(), DeskError::InvalidAddress);
        let mut access = registry();
        assert_eq!(access.set_agent([0u8; 20]), Err(DeskError::InvalidAddress));
        assert_eq!(access.transfer_ownership([0u8; 20]), Err(DeskError::InvalidAddress));
        assert_eq!(access.agent, AGENT);
    }

    #[test]
    fn resolves_roles() {
        let access = registry();
        assert!(access.roles_of(&OWNER).contains(Role::Owner));
        assert!(access.roles_of(&AGENT).contains(Role::Agent));
        assert!(access.roles_of(&APPROVER).contains(Role::Approver));
        assert!(access.roles_of(&STRANGER).is_empty());
        assert_eq!(access.only_operator(&STRANGER), Err(DeskError::Unauthorized));
        assert_eq!(access.only_owner(&AGENT), Err(DeskError::Unauthorized));
    }

    #[test]
    fn approver_set_is_idempotent_and_bounded() {
        let mut access = registry();
        access.set_approver(APPROVER, true).unwrap();
        assert_eq!(access.approvers.len(), 1);
        access.set_approver(APPROVER, false).unwrap();
        assert!(!access.is_approver(&APPROVER));

        for i in 0..MAX_APPROVERS {
            access.set_approver([i as u8 + 10; 20], true).unwrap();
        }
        assert_eq!(access.set_approver([200; 20], true), Err(DeskError::TooManyApprovers));
    }
}
