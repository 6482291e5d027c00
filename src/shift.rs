use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::error::{HandoverError, Result};

/// What a finished shift hands to the custody chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShiftClosure {
    pub shift_id: String,
    pub station_id: String,
    pub employee_id: String,
    pub cash_collected: Decimal,
}

#[async_trait]
pub trait ShiftLedger: Send + Sync {
    /// The closure of an ended shift. Shifts still running are `NotFound`.
    async fn closed_shift(&self, shift_id: &str) -> Result<ShiftClosure>;
}

pub struct PgShiftLedger {
    db_pool: PgPool,
}

impl PgShiftLedger {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ShiftLedger for PgShiftLedger {
    async fn closed_shift(&self, shift_id: &str) -> Result<ShiftClosure> {
        let closure = sqlx::query_as::<_, ShiftClosure>(
            r#"
            SELECT id AS shift_id, station_id, employee_id, cash_collected
            FROM public.shifts
            WHERE id = $1 AND ended_at IS NOT NULL
            "#,
        )
        .bind(shift_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| HandoverError::NotFound(format!("ended shift {shift_id}")))?;

        Ok(closure)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticShiftLedger {
    shifts: HashMap<String, ShiftClosure>,
}

impl StaticShiftLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_closed_shift(mut self, closure: ShiftClosure) -> Self {
        self.shifts.insert(closure.shift_id.clone(), closure);
        self
    }
}

#[async_trait]
impl ShiftLedger for StaticShiftLedger {
    async fn closed_shift(&self, shift_id: &str) -> Result<ShiftClosure> {
        self.shifts
            .get(shift_id)
            .cloned()
            .ok_or_else(|| HandoverError::NotFound(format!("ended shift {shift_id}")))
    }
}
