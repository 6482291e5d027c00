use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

use crate::error::HandoverError;

/// Steps of a custody chain, in the only order they may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "handover_type", rename_all = "snake_case")]
pub enum HandoverType {
    ShiftCollection,
    EmployeeToManager,
    ManagerToOwner,
    DepositToBank,
}

impl HandoverType {
    pub const ORDER: [HandoverType; 4] = [
        HandoverType::ShiftCollection,
        HandoverType::EmployeeToManager,
        HandoverType::ManagerToOwner,
        HandoverType::DepositToBank,
    ];

    /// The step that must be confirmed before this one can be opened.
    pub fn predecessor(self) -> Option<HandoverType> {
        match self {
            HandoverType::ShiftCollection => None,
            HandoverType::EmployeeToManager => Some(HandoverType::ShiftCollection),
            HandoverType::ManagerToOwner => Some(HandoverType::EmployeeToManager),
            HandoverType::DepositToBank => Some(HandoverType::ManagerToOwner),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HandoverType::ShiftCollection => "shift_collection",
            HandoverType::EmployeeToManager => "employee_to_manager",
            HandoverType::ManagerToOwner => "manager_to_owner",
            HandoverType::DepositToBank => "deposit_to_bank",
        }
    }
}

impl std::str::FromStr for HandoverType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HandoverType::ORDER
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown handover type: {s}"))
    }
}

impl std::fmt::Display for HandoverType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "handover_status", rename_all = "snake_case")]
pub enum HandoverStatus {
    Pending,
    Confirmed,
    Disputed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Handover {
    pub id: Uuid,
    pub station_id: String,
    pub handover_type: HandoverType,
    pub from_user_id: String,
    // None only for deposit_to_bank
    pub to_user_id: Option<String>,
    pub previous_handover_id: Option<Uuid>,
    pub shift_id: Option<String>,
    pub expected_amount: Decimal,
    pub actual_amount: Option<Decimal>,
    pub status: HandoverStatus,
    pub bank_name: Option<String>,
    pub deposit_reference: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl HandoverStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HandoverStatus::Pending => "pending",
            HandoverStatus::Confirmed => "confirmed",
            HandoverStatus::Disputed => "disputed",
        }
    }
}

impl std::fmt::Display for HandoverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Handover {
    pub fn is_pending(&self) -> bool {
        self.status == HandoverStatus::Pending
    }
}

/// A row about to be inserted. Ids and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewHandover {
    pub station_id: String,
    pub handover_type: HandoverType,
    pub from_user_id: String,
    pub to_user_id: Option<String>,
    pub previous_handover_id: Option<Uuid>,
    pub shift_id: Option<String>,
    pub expected_amount: Decimal,
    pub actual_amount: Option<Decimal>,
    pub status: HandoverStatus,
    pub bank_name: Option<String>,
    pub deposit_reference: Option<String>,
    pub notes: Option<String>,
}

/// Terminal outcome written onto a pending handover.
#[derive(Debug, Clone)]
pub struct Finalization {
    pub actual_amount: Decimal,
    pub status: HandoverStatus,
    pub notes: Option<String>,
    pub confirmed_at: DateTime<Utc>,
}

/// Decimal places kept by the `NUMERIC(14, 2)` amount columns.
pub const AMOUNT_SCALE: u32 = 2;

/// Largest amount the columns hold, 999 999 999 999.99.
pub fn max_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, AMOUNT_SCALE)
}

/// Accepts an amount only if the database would store it unchanged, so the
/// value that gets classified is the value that gets persisted.
pub fn checked_amount(field: &str, amount: Decimal) -> Result<Decimal, HandoverError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(HandoverError::InvalidRequest(format!("{field} {amount} is negative")));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(HandoverError::InvalidRequest(format!(
            "{field} {amount} has more than {AMOUNT_SCALE} decimal places"
        )));
    }
    if amount > max_amount() {
        return Err(HandoverError::InvalidRequest(format!(
            "{field} {amount} exceeds {}",
            max_amount()
        )));
    }
    Ok(amount.abs())
}
