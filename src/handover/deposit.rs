use rust_decimal::Decimal;
use serde::Deserialize;

use super::chain::confirmed_head;
use super::HandoverService;
use crate::db::models::{checked_amount, Handover, HandoverStatus, HandoverType, NewHandover};
use crate::error::{HandoverError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDeposit {
    pub station_id: String,
    pub amount: Decimal,
    pub bank_name: String,
    pub deposit_reference: String,
    pub notes: Option<String>,
}

impl BankDeposit {
    fn validate(&self) -> Result<()> {
        checked_amount("deposit amount", self.amount)?;
        if self.bank_name.trim().is_empty() {
            return Err(HandoverError::InvalidRequest("bankName is required".to_string()));
        }
        if self.deposit_reference.trim().is_empty() {
            return Err(HandoverError::InvalidRequest(
                "depositReference is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl HandoverService {
    /// Closes a station's chain with the bank deposit of the owner's cash.
    ///
    /// Nobody confirms a deposit after the fact, so instead of recording a
    /// disputed row an out-of-tolerance amount is refused and nothing is written.
    pub async fn record_deposit(&self, actor_id: &str, deposit: BankDeposit) -> Result<Handover> {
        deposit.validate()?;

        // an unknown station is NotFound, not an empty chain
        self.directory.owner_of(&deposit.station_id).await?;

        let mut tx = self.store.lock_station(&deposit.station_id).await?;
        let head = tx.head().await?;
        let previous = confirmed_head(
            head,
            HandoverType::DepositToBank,
            HandoverType::ManagerToOwner,
        )?;

        // the deposit is made by whoever holds the cash now
        if previous.to_user_id.as_deref() != Some(actor_id) {
            return Err(HandoverError::NotRecipient(actor_id.to_string()));
        }

        let expected_amount = previous.actual_amount.ok_or_else(|| {
            HandoverError::Internal(format!("confirmed handover {} has no amount", previous.id))
        })?;

        if !self.policy.within_tolerance(expected_amount, deposit.amount) {
            return Err(HandoverError::AmountMismatch {
                expected: expected_amount,
                deposited: deposit.amount,
            });
        }

        let handover = tx
            .insert(NewHandover {
                station_id: deposit.station_id,
                handover_type: HandoverType::DepositToBank,
                from_user_id: actor_id.to_string(),
                to_user_id: None,
                previous_handover_id: Some(previous.id),
                shift_id: previous.shift_id,
                expected_amount,
                actual_amount: Some(deposit.amount),
                status: HandoverStatus::Confirmed,
                bank_name: Some(deposit.bank_name.trim().to_string()),
                deposit_reference: Some(deposit.deposit_reference.trim().to_string()),
                notes: deposit.notes,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            station = %handover.station_id,
            handover = %handover.id,
            amount = %deposit.amount,
            "Recorded bank deposit, chain closed"
        );

        Ok(handover)
    }
}
