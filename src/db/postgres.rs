use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::db::models::{Finalization, Handover, HandoverStatus, NewHandover};
use crate::db::store::{HandoverStore, StationTx};
use crate::error::{HandoverError, Result};

// listing columns explicitly so the internal `seq` ordering column never leaks into the model
const HANDOVER_COLUMNS: &str = "id, station_id, handover_type, from_user_id, to_user_id, \
     previous_handover_id, shift_id, expected_amount, actual_amount, status, bank_name, \
     deposit_reference, notes, created_at, confirmed_at";

pub struct PgHandoverStore {
    pool: PgPool,
    read_pool: PgPool,
}

impl PgHandoverStore {
    /// `read_pool` may point at a replica; it only serves lock-free reads.
    pub fn new(pool: PgPool, read_pool: Option<PgPool>) -> Self {
        let read_pool = read_pool.unwrap_or_else(|| pool.clone());
        Self { pool, read_pool }
    }
}

#[async_trait]
impl HandoverStore for PgHandoverStore {
    async fn get(&self, id: Uuid) -> Result<Option<Handover>> {
        let handover = sqlx::query_as::<_, Handover>(&format!(
            "SELECT {HANDOVER_COLUMNS} FROM public.handovers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.read_pool)
        .await?;

        Ok(handover)
    }

    async fn list_pending_for(&self, user_id: &str) -> Result<Vec<Handover>> {
        let handovers = sqlx::query_as::<_, Handover>(&format!(
            r#"
            SELECT {HANDOVER_COLUMNS} FROM public.handovers
            WHERE to_user_id = $1 AND status = 'pending'
            ORDER BY seq ASC
            LIMIT 100
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.read_pool)
        .await?;

        Ok(handovers)
    }

    async fn chain_for_station(&self, station_id: &str) -> Result<Vec<Handover>> {
        // walking back from the station head along previous_handover_id
        let handovers = sqlx::query_as::<_, Handover>(&format!(
            r#"
            WITH RECURSIVE chain AS (
                SELECT seq, {HANDOVER_COLUMNS} FROM public.handovers
                WHERE id = (
                    SELECT id FROM public.handovers
                    WHERE station_id = $1
                    ORDER BY seq DESC
                    LIMIT 1
                )
                UNION ALL
                SELECT h.seq, h.id, h.station_id, h.handover_type, h.from_user_id, h.to_user_id,
                       h.previous_handover_id, h.shift_id, h.expected_amount, h.actual_amount,
                       h.status, h.bank_name, h.deposit_reference, h.notes, h.created_at,
                       h.confirmed_at
                FROM public.handovers h
                JOIN chain c ON h.id = c.previous_handover_id
            )
            SELECT {HANDOVER_COLUMNS} FROM chain ORDER BY seq ASC
            "#
        ))
        .bind(station_id)
        .fetch_all(&self.read_pool)
        .await?;

        Ok(handovers)
    }

    async fn count_pending_before(&self, cutoff: DateTime<Utc>) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*)::BIGINT AS stale
            FROM public.handovers
            WHERE status = 'pending' AND created_at < $1
            "#,
        )
        .bind(cutoff)
        .fetch_one(&self.read_pool)
        .await?;

        Ok(row.try_get::<i64, _>("stale")?)
    }

    async fn lock_station(&self, station_id: &str) -> Result<Box<dyn StationTx>> {
        let mut tx = self.pool.begin().await?;

        // transaction-scoped advisory lock: released on commit or rollback,
        // and keyed per station so unrelated chains never wait on each other
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(station_id)
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgStationTx {
            tx,
            station_id: station_id.to_string(),
        }))
    }
}

pub struct PgStationTx {
    tx: Transaction<'static, Postgres>,
    station_id: String,
}

#[async_trait]
impl StationTx for PgStationTx {
    async fn head(&mut self) -> Result<Option<Handover>> {
        let head = sqlx::query_as::<_, Handover>(&format!(
            r#"
            SELECT {HANDOVER_COLUMNS} FROM public.handovers
            WHERE station_id = $1
            ORDER BY seq DESC
            LIMIT 1
            "#
        ))
        .bind(&self.station_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(head)
    }

    async fn get(&mut self, id: Uuid) -> Result<Option<Handover>> {
        let handover = sqlx::query_as::<_, Handover>(&format!(
            "SELECT {HANDOVER_COLUMNS} FROM public.handovers WHERE id = $1 AND station_id = $2"
        ))
        .bind(id)
        .bind(&self.station_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(handover)
    }

    async fn shift_collected(&mut self, shift_id: &str) -> Result<bool> {
        let exists = sqlx::query(
            r#"
            SELECT 1 FROM public.handovers
            WHERE shift_id = $1 AND handover_type = 'shift_collection'
            LIMIT 1
            "#,
        )
        .bind(shift_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .is_some();

        Ok(exists)
    }

    async fn insert(&mut self, new: NewHandover) -> Result<Handover> {
        if new.station_id != self.station_id {
            return Err(HandoverError::Internal(format!(
                "insert for station {} inside lock of station {}",
                new.station_id, self.station_id
            )));
        }

        let confirmed_at = (new.status != HandoverStatus::Pending).then(Utc::now);

        let handover = sqlx::query_as::<_, Handover>(&format!(
            r#"
            INSERT INTO public.handovers (
                id,
                station_id,
                handover_type,
                from_user_id,
                to_user_id,
                previous_handover_id,
                shift_id,
                expected_amount,
                actual_amount,
                status,
                bank_name,
                deposit_reference,
                notes,
                confirmed_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
            RETURNING {HANDOVER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.station_id)
        .bind(new.handover_type)
        .bind(&new.from_user_id)
        .bind(&new.to_user_id)
        .bind(new.previous_handover_id)
        .bind(&new.shift_id)
        .bind(new.expected_amount)
        .bind(new.actual_amount)
        .bind(new.status)
        .bind(&new.bank_name)
        .bind(&new.deposit_reference)
        .bind(&new.notes)
        .bind(confirmed_at)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(handover)
    }

    async fn finalize(&mut self, id: Uuid, outcome: Finalization) -> Result<Handover> {
        // the status guard makes a second finalization a no-op instead of an overwrite
        let handover = sqlx::query_as::<_, Handover>(&format!(
            r#"
            UPDATE public.handovers
            SET actual_amount = $2,
                status = $3,
                notes = COALESCE($4, notes),
                confirmed_at = $5
            WHERE id = $1 AND station_id = $6 AND status = 'pending'
            RETURNING {HANDOVER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(outcome.actual_amount)
        .bind(outcome.status)
        .bind(&outcome.notes)
        .bind(outcome.confirmed_at)
        .bind(&self.station_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| HandoverError::AlreadyFinalized(id.to_string()))?;

        Ok(handover)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
