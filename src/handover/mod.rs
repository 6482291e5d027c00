//! Cash custody chain.
//!
//! Cash from a closed shift moves employee -> manager -> owner -> bank, one
//! [`Handover`] per step. Each step points at the confirmed step before it,
//! so a station's chain is a linked list through `previous_handover_id`
//! whose head is the station's most recently created handover. Every
//! mutating operation re-reads that head under the station lock instead of
//! caching it, so any number of service instances can run side by side.

mod chain;
mod confirm;
mod deposit;
pub mod variance;

pub use chain::OpenHandover;
pub use confirm::Confirmation;
pub use deposit::BankDeposit;
pub use variance::{Variance, VariancePolicy};

use std::sync::Arc;
use uuid::Uuid;

use crate::db::models::{Handover, HandoverType};
use crate::db::store::HandoverStore;
use crate::directory::StationDirectory;
use crate::error::{HandoverError, Result};
use crate::shift::ShiftLedger;

pub struct HandoverService {
    store: Arc<dyn HandoverStore>,
    directory: Arc<dyn StationDirectory>,
    shifts: Arc<dyn ShiftLedger>,
    policy: VariancePolicy,
}

impl HandoverService {
    pub fn new(
        store: Arc<dyn HandoverStore>,
        directory: Arc<dyn StationDirectory>,
        shifts: Arc<dyn ShiftLedger>,
        policy: VariancePolicy,
    ) -> Self {
        Self {
            store,
            directory,
            shifts,
            policy,
        }
    }

    pub fn policy(&self) -> &VariancePolicy {
        &self.policy
    }

    pub async fn get(&self, handover_id: Uuid) -> Result<Handover> {
        self.store
            .get(handover_id)
            .await?
            .ok_or_else(|| HandoverError::NotFound(format!("handover {handover_id}")))
    }

    pub async fn pending_for(&self, user_id: &str) -> Result<Vec<Handover>> {
        self.store.list_pending_for(user_id).await
    }

    pub async fn chain(&self, station_id: &str) -> Result<Vec<Handover>> {
        self.store.chain_for_station(station_id).await
    }

    /// Who receives the cash at this step. Always resolved here, never taken from a request.
    async fn receiver_for(
        &self,
        station_id: &str,
        handover_type: HandoverType,
    ) -> Result<Option<String>> {
        match handover_type {
            HandoverType::ShiftCollection | HandoverType::EmployeeToManager => {
                self.directory.manager_of(station_id).await.map(Some)
            }
            HandoverType::ManagerToOwner => self.directory.owner_of(station_id).await.map(Some),
            HandoverType::DepositToBank => Ok(None),
        }
    }
}
