use super::HandoverService;
use crate::db::models::{checked_amount, Handover, HandoverStatus, HandoverType, NewHandover};
use crate::error::{HandoverError, Result};
use crate::shift::ShiftClosure;

#[derive(Debug, Clone)]
pub struct OpenHandover {
    pub station_id: String,
    pub handover_type: HandoverType,
    /// Ignored for shift_collection, where the shift's employee hands over.
    pub from_user_id: String,
    /// Required for shift_collection.
    pub shift_id: Option<String>,
    pub notes: Option<String>,
}

impl HandoverService {
    /// Opens the next step of a station's chain as a pending handover.
    pub async fn open_handover(&self, request: OpenHandover) -> Result<Handover> {
        match request.handover_type {
            HandoverType::ShiftCollection => {
                let shift_id = request.shift_id.as_deref().ok_or_else(|| {
                    HandoverError::InvalidRequest(
                        "shiftId is required to open a shift_collection".to_string(),
                    )
                })?;

                let closure = self.shifts.closed_shift(shift_id).await?;
                if closure.station_id != request.station_id {
                    return Err(HandoverError::InvalidRequest(format!(
                        "shift {} belongs to station {}",
                        shift_id, closure.station_id
                    )));
                }

                self.open_from_shift(closure, request.notes).await
            }
            HandoverType::DepositToBank => Err(HandoverError::InvalidRequest(
                "deposit_to_bank is recorded as a bank deposit, not opened".to_string(),
            )),
            HandoverType::EmployeeToManager | HandoverType::ManagerToOwner => {
                self.open_next_step(request).await
            }
        }
    }

    /// Roots a new chain with the cash a shift ended with.
    pub async fn open_from_shift(
        &self,
        closure: ShiftClosure,
        notes: Option<String>,
    ) -> Result<Handover> {
        let expected_amount = checked_amount("shift cash", closure.cash_collected)?;

        let to_user_id = self
            .receiver_for(&closure.station_id, HandoverType::ShiftCollection)
            .await?;

        let mut tx = self.store.lock_station(&closure.station_id).await?;

        if tx.shift_collected(&closure.shift_id).await? {
            return Err(HandoverError::SequenceViolation(format!(
                "shift {} has already been collected",
                closure.shift_id
            )));
        }

        // only one live chain per station; closed or disputed chains don't block
        if let Some(head) = tx.head().await? {
            let closed = head.handover_type == HandoverType::DepositToBank;
            let halted = head.status == HandoverStatus::Disputed;
            if !closed && !halted {
                return Err(HandoverError::SequenceViolation(format!(
                    "station {} has an open chain at {} ({})",
                    closure.station_id, head.handover_type, head.status
                )));
            }
        }

        let handover = tx
            .insert(NewHandover {
                station_id: closure.station_id.clone(),
                handover_type: HandoverType::ShiftCollection,
                from_user_id: closure.employee_id,
                to_user_id,
                previous_handover_id: None,
                shift_id: Some(closure.shift_id),
                expected_amount,
                actual_amount: None,
                status: HandoverStatus::Pending,
                bank_name: None,
                deposit_reference: None,
                notes,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            station = %handover.station_id,
            handover = %handover.id,
            expected = %handover.expected_amount,
            "Opened shift_collection"
        );

        Ok(handover)
    }

    async fn open_next_step(&self, request: OpenHandover) -> Result<Handover> {
        let predecessor = request.handover_type.predecessor().ok_or_else(|| {
            HandoverError::Internal(format!("{} has no predecessor", request.handover_type))
        })?;

        // resolving the receiver first so an unknown station reads as NotFound
        let to_user_id = self
            .receiver_for(&request.station_id, request.handover_type)
            .await?;

        if !self
            .directory
            .is_member(&request.station_id, &request.from_user_id)
            .await?
        {
            return Err(HandoverError::NotStationMember {
                user: request.from_user_id,
                station: request.station_id,
            });
        }

        let mut tx = self.store.lock_station(&request.station_id).await?;
        let head = tx.head().await?;
        let previous = confirmed_head(head, request.handover_type, predecessor)?;

        let holder = cash_holder(&previous, request.handover_type)?;
        if request.from_user_id != holder {
            return Err(HandoverError::NotCashHolder {
                user: request.from_user_id,
                holder: holder.to_string(),
            });
        }

        let expected_amount = previous.actual_amount.ok_or_else(|| {
            HandoverError::Internal(format!("confirmed handover {} has no amount", previous.id))
        })?;

        let handover = tx
            .insert(NewHandover {
                station_id: request.station_id,
                handover_type: request.handover_type,
                from_user_id: request.from_user_id,
                to_user_id,
                previous_handover_id: Some(previous.id),
                shift_id: previous.shift_id,
                expected_amount,
                actual_amount: None,
                status: HandoverStatus::Pending,
                bank_name: None,
                deposit_reference: None,
                notes: request.notes,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            station = %handover.station_id,
            handover = %handover.id,
            previous = %previous.id,
            expected = %handover.expected_amount,
            "Opened {}",
            handover.handover_type
        );

        Ok(handover)
    }
}

/// Who has the cash that `next` hands over. The employee keeps it until
/// employee_to_manager; after that it sits with whoever confirmed the last step.
fn cash_holder(previous: &Handover, next: HandoverType) -> Result<&str> {
    let holder = match next {
        HandoverType::EmployeeToManager => Some(previous.from_user_id.as_str()),
        _ => previous.to_user_id.as_deref(),
    };
    holder.ok_or_else(|| {
        HandoverError::Internal(format!("handover {} has no receiver", previous.id))
    })
}

/// The chain head, provided it is a confirmed `predecessor` that `wanted` may follow.
pub(super) fn confirmed_head(
    head: Option<Handover>,
    wanted: HandoverType,
    predecessor: HandoverType,
) -> Result<Handover> {
    let Some(head) = head else {
        return Err(HandoverError::SequenceViolation(format!(
            "{wanted} requires a confirmed {predecessor}, but the station has no chain"
        )));
    };

    if head.handover_type == wanted {
        return Err(HandoverError::SequenceViolation(format!(
            "{} already exists for this chain ({})",
            wanted, head.id
        )));
    }

    if head.handover_type != predecessor || head.status != HandoverStatus::Confirmed {
        return Err(HandoverError::SequenceViolation(format!(
            "{} requires a confirmed {}, chain is at {} ({})",
            wanted, predecessor, head.handover_type, head.status
        )));
    }

    Ok(head)
}
