use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::MAX_BATCH_CLAIM;
use crate::error::{DeskError, DeskResult};
use crate::identity::Identity;
use crate::offer::{Delivery, Offer};
use crate::state::DeskState;

/// Offer lookup for batch processing. Hosts back it with whatever holds their
/// loaded offer records.
pub trait OfferStore<I> {
    fn offer_mut(&mut self, id: u64) -> Option<&mut Offer<I>>;
}

impl<I> OfferStore<I> for BTreeMap<u64, Offer<I>> {
    fn offer_mut(&mut self, id: u64) -> Option<&mut Offer<I>> {
        self.get_mut(&id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport<I> {
    pub claimed: Vec<Delivery<I>>,
    pub skipped: Vec<(u64, DeskError)>,
}

impl<I> Default for BatchReport<I> {
    fn default() -> Self {
        Self { claimed: Vec::new(), skipped: Vec::new() }
    }
}

impl<I> BatchReport<I> {
    pub fn claimed_ids(&self) -> Vec<u64> {
        self.claimed.iter().map(|d| d.offer_id).collect()
    }
}

impl<I: Identity> DeskState<I> {
    /// Best-effort delivery of every unlocked, paid offer in `ids`. Only the
    /// batch size, the caller's role and the pause flag fail the whole call;
    /// anything wrong with a single id is recorded in the report and skipped.
    pub fn auto_claim<S: OfferStore<I> + ?Sized>(
        &mut self,
        store: &mut S,
        caller: I,
        ids: &[u64],
        now: i64,
    ) -> DeskResult<BatchReport<I>> {
        self.ensure_active()?;
        self.access.only_operator(&caller)?;
        if ids.len() > MAX_BATCH_CLAIM {
            return Err(DeskError::BatchTooLarge);
        }
        let mut report = BatchReport::default();
        for &id in ids {
            let Some(offer) = store.offer_mut(id) else {
                report.skipped.push((id, DeskError::UnknownOffer));
                continue;
            };
            match self.deliver_offer(offer, now) {
                Ok(delivery) => report.claimed.push(delivery),
                Err(err) => report.skipped.push((id, err)),
            }
        }
        Ok(report)
    }
}
