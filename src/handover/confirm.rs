use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::HandoverService;
use crate::db::models::{checked_amount, Finalization, Handover, HandoverStatus};
use crate::error::{HandoverError, Result};

/// What the receiving party says they counted.
#[derive(Debug, Clone, Default)]
pub struct Confirmation {
    pub actual_amount: Option<Decimal>,
    pub accept_as_is: bool,
    pub notes: Option<String>,
}

impl Confirmation {
    /// The amount to record, given what the step was expected to carry.
    fn resolve(&self, expected: Decimal) -> Result<Decimal> {
        match (self.actual_amount, self.accept_as_is) {
            (Some(_), true) => Err(HandoverError::InvalidRequest(
                "send either actualAmount or acceptAsIs, not both".to_string(),
            )),
            (Some(amount), false) => checked_amount("actualAmount", amount),
            (None, true) => Ok(expected),
            // never fall back to expected silently
            (None, false) => Err(HandoverError::MissingAmount),
        }
    }
}

impl HandoverService {
    /// Records the recipient's count on a pending handover, confirming it or
    /// marking it disputed. Either way the handover is final afterwards.
    pub async fn confirm(
        &self,
        handover_id: Uuid,
        actor_id: &str,
        confirmation: Confirmation,
    ) -> Result<Handover> {
        // unlocked read only to learn which station to lock
        let located = self.get(handover_id).await?;

        let mut tx = self.store.lock_station(&located.station_id).await?;
        let handover = tx
            .get(handover_id)
            .await?
            .ok_or_else(|| HandoverError::NotFound(format!("handover {handover_id}")))?;

        if !handover.is_pending() {
            return Err(HandoverError::AlreadyFinalized(handover_id.to_string()));
        }

        if handover.to_user_id.as_deref() != Some(actor_id) {
            return Err(HandoverError::NotRecipient(actor_id.to_string()));
        }

        let actual_amount = confirmation.resolve(handover.expected_amount)?;
        let variance = self.policy.assess(handover.expected_amount, actual_amount);

        let confirmed = tx
            .finalize(
                handover_id,
                Finalization {
                    actual_amount,
                    status: variance.status,
                    notes: confirmation.notes,
                    confirmed_at: Utc::now(),
                },
            )
            .await?;
        tx.commit().await?;

        match confirmed.status {
            HandoverStatus::Disputed => tracing::warn!(
                station = %confirmed.station_id,
                handover = %confirmed.id,
                expected = %confirmed.expected_amount,
                actual = %actual_amount,
                difference = %variance.difference,
                "Disputed {}",
                confirmed.handover_type
            ),
            _ => tracing::info!(
                station = %confirmed.station_id,
                handover = %confirmed.id,
                actual = %actual_amount,
                "Confirmed {}",
                confirmed.handover_type
            ),
        }

        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testkit::*;
    use super::*;
    use crate::db::models::HandoverType;
    use rust_decimal_macros::dec;

    async fn pending_collection(cash: Decimal) -> (HandoverService, Handover) {
        let (service, _) = service(cash);
        let handover = service
            .open_from_shift(closure("shift-1", cash), None)
            .await
            .unwrap();
        (service, handover)
    }

    #[tokio::test]
    async fn test_accept_as_is_confirms_expected_amount() {
        let (service, handover) = pending_collection(dec!(1234.56)).await;

        let confirmed = service.confirm(handover.id, MANAGER, accept_as_is()).await.unwrap();

        assert_eq!(confirmed.status, HandoverStatus::Confirmed);
        assert_eq!(confirmed.actual_amount, Some(dec!(1234.56)));
        assert_eq!(confirmed.expected_amount, handover.expected_amount);
        assert!(confirmed.confirmed_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_amount_is_rejected_and_stays_pending() {
        let (service, handover) = pending_collection(dec!(1500)).await;

        let err = service
            .confirm(handover.id, MANAGER, Confirmation::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoverError::MissingAmount));

        let stored = service.get(handover.id).await.unwrap();
        assert!(stored.is_pending());
        assert_eq!(stored.actual_amount, None);
    }

    #[tokio::test]
    async fn test_both_amount_forms_are_rejected() {
        let (service, handover) = pending_collection(dec!(1500)).await;
        let confirmation = Confirmation {
            actual_amount: Some(dec!(1500)),
            accept_as_is: true,
            notes: None,
        };

        let err = service.confirm(handover.id, MANAGER, confirmation).await.unwrap_err();
        assert!(matches!(err, HandoverError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_short_count_is_disputed_not_rejected() {
        let (service, handover) = pending_collection(dec!(1000)).await;
        let confirmation = Confirmation {
            actual_amount: Some(dec!(970)),
            notes: Some("30 short".to_string()),
            ..Default::default()
        };

        let disputed = service.confirm(handover.id, MANAGER, confirmation).await.unwrap();

        assert_eq!(disputed.status, HandoverStatus::Disputed);
        assert_eq!(disputed.actual_amount, Some(dec!(970)));
        assert_eq!(disputed.expected_amount, dec!(1000));
        assert_eq!(disputed.notes.as_deref(), Some("30 short"));
    }

    #[tokio::test]
    async fn test_finalized_handover_cannot_be_confirmed_again() {
        let (service, handover) = pending_collection(dec!(1000)).await;
        let confirmation = Confirmation {
            actual_amount: Some(dec!(500)),
            ..Default::default()
        };
        service.confirm(handover.id, MANAGER, confirmation).await.unwrap();

        let err = service
            .confirm(handover.id, MANAGER, accept_as_is())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoverError::AlreadyFinalized(_)));

        let stored = service.get(handover.id).await.unwrap();
        assert_eq!(stored.status, HandoverStatus::Disputed);
        assert_eq!(stored.actual_amount, Some(dec!(500)));
    }

    #[tokio::test]
    async fn test_only_recipient_confirms() {
        let (service, handover) = pending_collection(dec!(1500)).await;

        let err = service
            .confirm(handover.id, EMPLOYEE, accept_as_is())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoverError::NotRecipient(_)));
    }

    #[tokio::test]
    async fn test_unknown_handover_is_not_found() {
        let (service, _) = service(dec!(1500));
        let err = service
            .confirm(Uuid::new_v4(), MANAGER, accept_as_is())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoverError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_negative_count_is_invalid() {
        let (service, handover) = pending_collection(dec!(1500)).await;
        let confirmation = Confirmation {
            actual_amount: Some(dec!(-1)),
            ..Default::default()
        };

        let err = service.confirm(handover.id, MANAGER, confirmation).await.unwrap_err();
        assert!(matches!(err, HandoverError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_sub_cent_count_is_invalid_and_stays_pending() {
        let (service, handover) = pending_collection(dec!(1000)).await;

        // 1020.004 would be stored as 1020.00, which is a different verdict
        for amount in [dec!(1020.004), dec!(1000000000000)] {
            let confirmation = Confirmation {
                actual_amount: Some(amount),
                ..Default::default()
            };
            let err = service.confirm(handover.id, MANAGER, confirmation).await.unwrap_err();
            assert!(matches!(err, HandoverError::InvalidRequest(_)), "{amount}");
        }

        let stored = service.get(handover.id).await.unwrap();
        assert!(stored.is_pending());
    }

    #[tokio::test]
    async fn test_confirming_does_not_open_next_step() {
        let (service, handover) = pending_collection(dec!(1500)).await;
        service.confirm(handover.id, MANAGER, accept_as_is()).await.unwrap();

        let chain = service.chain(STATION).await.unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].handover_type, HandoverType::ShiftCollection);
        assert!(service.pending_for(MANAGER).await.unwrap().is_empty());
    }
}
