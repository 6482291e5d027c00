use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{Finalization, Handover, NewHandover};
use crate::error::Result;

/// Persistent home of handover rows.
///
/// Reads go straight to the store and may be slightly stale. Anything that
/// checks the chain and then writes to it must go through [`StationTx`],
/// which serializes work per station.
#[async_trait]
pub trait HandoverStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Handover>>;

    /// Pending handovers waiting on `user_id` to confirm, oldest first.
    async fn list_pending_for(&self, user_id: &str) -> Result<Vec<Handover>>;

    /// The station's most recent chain, root first.
    async fn chain_for_station(&self, station_id: &str) -> Result<Vec<Handover>>;

    async fn count_pending_before(&self, cutoff: DateTime<Utc>) -> Result<i64>;

    /// Start an exclusive unit of work on one station's chain.
    async fn lock_station(&self, station_id: &str) -> Result<Box<dyn StationTx>>;
}

/// Exclusive, all-or-nothing access to one station's handovers.
/// Dropping it without [`StationTx::commit`] discards its writes.
#[async_trait]
pub trait StationTx: Send {
    /// Most recently created handover of the station.
    async fn head(&mut self) -> Result<Option<Handover>>;

    async fn get(&mut self, id: Uuid) -> Result<Option<Handover>>;

    /// Whether a chain has already been opened for this shift.
    async fn shift_collected(&mut self, shift_id: &str) -> Result<bool>;

    async fn insert(&mut self, new: NewHandover) -> Result<Handover>;

    async fn finalize(&mut self, id: Uuid, outcome: Finalization) -> Result<Handover>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
