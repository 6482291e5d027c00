use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::db::models::{Finalization, Handover, HandoverStatus, HandoverType, NewHandover};
use crate::db::store::{HandoverStore, StationTx};
use crate::error::{HandoverError, Result};

/// Process-local store used by tests and by embedders that don't need
/// durability. Rows are kept in creation order, so the last row of a
/// station is its head.
#[derive(Clone, Default)]
pub struct MemoryHandoverStore {
    rows: Arc<RwLock<Vec<Handover>>>,
    station_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryHandoverStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl HandoverStore for MemoryHandoverStore {
    async fn get(&self, id: Uuid) -> Result<Option<Handover>> {
        Ok(self.rows.read().await.iter().find(|h| h.id == id).cloned())
    }

    async fn list_pending_for(&self, user_id: &str) -> Result<Vec<Handover>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|h| h.is_pending() && h.to_user_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn chain_for_station(&self, station_id: &str) -> Result<Vec<Handover>> {
        let rows = self.rows.read().await;
        let by_id: HashMap<Uuid, &Handover> = rows
            .iter()
            .filter(|h| h.station_id == station_id)
            .map(|h| (h.id, h))
            .collect();

        let mut chain = Vec::new();
        let mut cursor = rows.iter().rev().find(|h| h.station_id == station_id);
        while let Some(handover) = cursor {
            chain.push(handover.clone());
            cursor = handover.previous_handover_id.and_then(|id| by_id.get(&id).copied());
        }
        chain.reverse();

        Ok(chain)
    }

    async fn count_pending_before(&self, cutoff: DateTime<Utc>) -> Result<i64> {
        let count = self
            .rows
            .read()
            .await
            .iter()
            .filter(|h| h.is_pending() && h.created_at < cutoff)
            .count();

        Ok(count as i64)
    }

    async fn lock_station(&self, station_id: &str) -> Result<Box<dyn StationTx>> {
        let lock = self
            .station_locks
            .entry(station_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        // the dashmap shard guard is released above, before awaiting the station lock
        let guard = lock.lock_owned().await;

        Ok(Box::new(MemoryStationTx {
            _guard: guard,
            rows: self.rows.clone(),
            station_id: station_id.to_string(),
            inserted: Vec::new(),
            updated: HashMap::new(),
        }))
    }
}

pub struct MemoryStationTx {
    _guard: OwnedMutexGuard<()>,
    rows: Arc<RwLock<Vec<Handover>>>,
    station_id: String,
    inserted: Vec<Handover>,
    updated: HashMap<Uuid, Handover>,
}

impl MemoryStationTx {
    /// Committed rows of this station with this unit of work's writes laid over them.
    async fn view(&self) -> Vec<Handover> {
        let rows = self.rows.read().await;
        rows.iter()
            .filter(|h| h.station_id == self.station_id)
            .map(|h| self.updated.get(&h.id).cloned().unwrap_or_else(|| h.clone()))
            .chain(self.inserted.iter().map(|h| {
                self.updated.get(&h.id).cloned().unwrap_or_else(|| h.clone())
            }))
            .collect()
    }
}

#[async_trait]
impl StationTx for MemoryStationTx {
    async fn head(&mut self) -> Result<Option<Handover>> {
        Ok(self.view().await.pop())
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<Handover>> {
        Ok(self.view().await.into_iter().find(|h| h.id == id))
    }

    async fn shift_collected(&mut self, shift_id: &str) -> Result<bool> {
        let committed = self.rows.read().await.iter().any(|h| {
            h.handover_type == HandoverType::ShiftCollection
                && h.shift_id.as_deref() == Some(shift_id)
        });
        let staged = self
            .inserted
            .iter()
            .any(|h| h.shift_id.as_deref() == Some(shift_id));

        Ok(committed || staged)
    }

    async fn insert(&mut self, new: NewHandover) -> Result<Handover> {
        if new.station_id != self.station_id {
            return Err(HandoverError::Internal(format!(
                "insert for station {} inside lock of station {}",
                new.station_id, self.station_id
            )));
        }

        let now = Utc::now();
        let handover = Handover {
            id: Uuid::new_v4(),
            station_id: new.station_id,
            handover_type: new.handover_type,
            from_user_id: new.from_user_id,
            to_user_id: new.to_user_id,
            previous_handover_id: new.previous_handover_id,
            shift_id: new.shift_id,
            expected_amount: new.expected_amount,
            actual_amount: new.actual_amount,
            confirmed_at: (new.status != HandoverStatus::Pending).then_some(now),
            status: new.status,
            bank_name: new.bank_name,
            deposit_reference: new.deposit_reference,
            notes: new.notes,
            created_at: now,
        };
        self.inserted.push(handover.clone());

        Ok(handover)
    }

    async fn finalize(&mut self, id: Uuid, outcome: Finalization) -> Result<Handover> {
        let mut handover = self
            .get(id)
            .await?
            .filter(Handover::is_pending)
            .ok_or_else(|| HandoverError::AlreadyFinalized(id.to_string()))?;

        handover.actual_amount = Some(outcome.actual_amount);
        handover.status = outcome.status;
        if outcome.notes.is_some() {
            handover.notes = outcome.notes;
        }
        handover.confirmed_at = Some(outcome.confirmed_at);
        self.updated.insert(id, handover.clone());

        Ok(handover)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryStationTx {
            _guard,
            rows,
            inserted,
            mut updated,
            ..
        } = *self;

        let mut rows = rows.write().await;
        for row in rows.iter_mut() {
            if let Some(update) = updated.remove(&row.id) {
                *row = update;
            }
        }
        for row in inserted {
            let row = updated.remove(&row.id).unwrap_or(row);
            rows.push(row);
        }

        Ok(())
    }
}
