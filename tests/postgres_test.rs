//! Integration tests for the Postgres handover store
//!
//! These tests need a Postgres database reachable through DATABASE_URL.
//! Migrations are applied on connect; every test works on its own station,
//! so they can share one database and run in parallel.

use rust_decimal_macros::dec;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use cash_handover::db::models::{HandoverStatus, HandoverType};
use cash_handover::db::{HandoverStore, PgHandoverStore};
use cash_handover::directory::StaticDirectory;
use cash_handover::error::HandoverError;
use cash_handover::handover::{BankDeposit, Confirmation, HandoverService, OpenHandover, VariancePolicy};
use cash_handover::shift::{ShiftClosure, StaticShiftLedger};

async fn connect() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty())?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("DATABASE_URL is set but the database is unreachable");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

macro_rules! require_database {
    () => {
        match connect().await {
            Some(pool) => pool,
            None => {
                eprintln!("\n⚠️  DATABASE_URL is not set, skipping Postgres test");
                eprintln!("   Run with: DATABASE_URL=postgres://... cargo test --test postgres_test\n");
                return;
            }
        }
    };
}

/// One station with fresh ids, backed by the real store.
struct Station {
    id: String,
    employee: String,
    manager: String,
    owner: String,
    store: Arc<PgHandoverStore>,
    service: Arc<HandoverService>,
}

impl Station {
    fn new(pool: PgPool, shifts: &[(&str, rust_decimal::Decimal)]) -> (Self, Vec<ShiftClosure>) {
        let tag = Uuid::new_v4().simple().to_string();
        let id = format!("st-{tag}");
        let employee = format!("emp-{tag}");
        let manager = format!("mgr-{tag}");
        let owner = format!("own-{tag}");

        let closures: Vec<ShiftClosure> = shifts
            .iter()
            .map(|(name, cash)| ShiftClosure {
                shift_id: format!("{name}-{tag}"),
                station_id: id.clone(),
                employee_id: employee.clone(),
                cash_collected: *cash,
            })
            .collect();

        let directory = StaticDirectory::new()
            .with_station(&id, &manager, &owner)
            .with_member(&id, &employee);
        let ledger = closures
            .iter()
            .cloned()
            .fold(StaticShiftLedger::new(), StaticShiftLedger::with_closed_shift);

        // reads go through the replica pool, which here is the same database
        let store = Arc::new(PgHandoverStore::new(pool.clone(), Some(pool)));
        let service = Arc::new(HandoverService::new(
            store.clone(),
            Arc::new(directory),
            Arc::new(ledger),
            VariancePolicy::default(),
        ));

        (
            Station {
                id,
                employee,
                manager,
                owner,
                store,
                service,
            },
            closures,
        )
    }

    fn open(&self, handover_type: HandoverType, from: &str) -> OpenHandover {
        OpenHandover {
            station_id: self.id.clone(),
            handover_type,
            from_user_id: from.to_string(),
            shift_id: None,
            notes: None,
        }
    }

    fn deposit(&self, amount: rust_decimal::Decimal) -> BankDeposit {
        BankDeposit {
            station_id: self.id.clone(),
            amount,
            bank_name: "State Bank".to_string(),
            deposit_reference: format!("DEP-{}", Uuid::new_v4()),
            notes: None,
        }
    }
}

fn accept_as_is() -> Confirmation {
    Confirmation {
        accept_as_is: true,
        ..Default::default()
    }
}

fn counted(amount: rust_decimal::Decimal) -> Confirmation {
    Confirmation {
        actual_amount: Some(amount),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_chain_end_to_end() {
    let pool = require_database!();
    let (station, mut shifts) = Station::new(pool, &[("shift", dec!(1500))]);
    let service = &station.service;

    let collection = service
        .open_from_shift(shifts.remove(0), None)
        .await
        .expect("Failed to open shift collection");
    assert_eq!(collection.expected_amount, dec!(1500));
    assert_eq!(collection.to_user_id.as_deref(), Some(station.manager.as_str()));

    let pending = service.pending_for(&station.manager).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, collection.id);

    service.confirm(collection.id, &station.manager, accept_as_is()).await.unwrap();

    let to_manager = service
        .open_handover(station.open(HandoverType::EmployeeToManager, &station.employee))
        .await
        .unwrap();
    assert_eq!(to_manager.previous_handover_id, Some(collection.id));
    let confirmed = service
        .confirm(to_manager.id, &station.manager, counted(dec!(1500)))
        .await
        .unwrap();
    assert_eq!(confirmed.status, HandoverStatus::Confirmed);

    let to_owner = service
        .open_handover(station.open(HandoverType::ManagerToOwner, &station.manager))
        .await
        .unwrap();
    assert_eq!(to_owner.to_user_id.as_deref(), Some(station.owner.as_str()));
    service.confirm(to_owner.id, &station.owner, accept_as_is()).await.unwrap();

    let deposit = service
        .record_deposit(&station.owner, station.deposit(dec!(1500)))
        .await
        .unwrap();
    assert_eq!(deposit.status, HandoverStatus::Confirmed);
    assert_eq!(deposit.to_user_id, None);

    let chain = service.chain(&station.id).await.unwrap();
    let types: Vec<_> = chain.iter().map(|h| h.handover_type).collect();
    assert_eq!(types, HandoverType::ORDER.to_vec());
    assert!(chain.iter().all(|h| h.status == HandoverStatus::Confirmed));
    assert!(chain.iter().all(|h| h.actual_amount == Some(dec!(1500))));
    for pair in chain.windows(2) {
        assert_eq!(pair[1].previous_handover_id, Some(pair[0].id));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_opens_allow_exactly_one() {
    let pool = require_database!();
    let (station, mut shifts) = Station::new(pool, &[("shift", dec!(1500))]);
    let collection = station
        .service
        .open_from_shift(shifts.remove(0), None)
        .await
        .unwrap();
    station
        .service
        .confirm(collection.id, &station.manager, accept_as_is())
        .await
        .unwrap();

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let service = station.service.clone();
            let request = station.open(HandoverType::EmployeeToManager, &station.employee);
            tokio::spawn(async move { service.open_handover(request).await })
        })
        .collect();

    let mut opened = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => opened += 1,
            Err(err) => assert!(matches!(err, HandoverError::SequenceViolation(_)), "{err}"),
        }
    }

    assert_eq!(opened, 1);
    assert_eq!(station.service.chain(&station.id).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirms_finalize_once() {
    let pool = require_database!();
    let (station, mut shifts) = Station::new(pool, &[("shift", dec!(1000))]);
    let collection = station
        .service
        .open_from_shift(shifts.remove(0), None)
        .await
        .unwrap();
    let id = collection.id;

    let attempts: Vec<_> = [dec!(1000), dec!(500), dec!(990), dec!(1200)]
        .into_iter()
        .map(|amount| {
            let service = station.service.clone();
            let manager = station.manager.clone();
            tokio::spawn(async move { service.confirm(id, &manager, counted(amount)).await })
        })
        .collect();

    let mut finalized = Vec::new();
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(handover) => finalized.push(handover),
            Err(err) => assert!(matches!(err, HandoverError::AlreadyFinalized(_)), "{err}"),
        }
    }

    assert_eq!(finalized.len(), 1);
    let stored = station.service.get(collection.id).await.unwrap();
    assert_eq!(stored.actual_amount, finalized[0].actual_amount);
    assert_eq!(stored.status, finalized[0].status);
}

#[tokio::test]
async fn test_chain_walk_follows_the_newest_chain() {
    let pool = require_database!();
    let (station, mut shifts) = Station::new(pool, &[("first", dec!(1000)), ("second", dec!(700))]);
    let service = &station.service;
    let second_shift = shifts.remove(1);

    // first chain halts on a disputed count
    let first = service.open_from_shift(shifts.remove(0), None).await.unwrap();
    let disputed = service
        .confirm(first.id, &station.manager, counted(dec!(900)))
        .await
        .unwrap();
    assert_eq!(disputed.status, HandoverStatus::Disputed);

    let err = service
        .open_handover(station.open(HandoverType::EmployeeToManager, &station.employee))
        .await
        .unwrap_err();
    assert!(matches!(err, HandoverError::SequenceViolation(_)));

    let second = service.open_from_shift(second_shift.clone(), None).await.unwrap();
    service.confirm(second.id, &station.manager, accept_as_is()).await.unwrap();
    let to_manager = service
        .open_handover(station.open(HandoverType::EmployeeToManager, &station.employee))
        .await
        .unwrap();

    let chain = service.chain(&station.id).await.unwrap();
    let ids: Vec<_> = chain.iter().map(|h| h.id).collect();
    assert_eq!(ids, vec![second.id, to_manager.id]);

    // the same shift never seeds a second chain
    let err = service.open_from_shift(second_shift, None).await.unwrap_err();
    assert!(matches!(err, HandoverError::SequenceViolation(_)));
}

#[tokio::test]
async fn test_amounts_are_stored_exactly() {
    let pool = require_database!();
    let (station, mut shifts) = Station::new(pool, &[("shift", dec!(1000))]);
    let service = &station.service;
    let collection = service.open_from_shift(shifts.remove(0), None).await.unwrap();

    let err = service
        .confirm(collection.id, &station.manager, counted(dec!(1020.004)))
        .await
        .unwrap_err();
    assert!(matches!(err, HandoverError::InvalidRequest(_)));

    let confirmed = service
        .confirm(collection.id, &station.manager, counted(dec!(1019.99)))
        .await
        .unwrap();
    let stored = station.store.get(collection.id).await.unwrap().unwrap();
    assert_eq!(stored.actual_amount, Some(dec!(1019.99)));
    assert_eq!(stored.status, confirmed.status);
    assert_eq!(
        service.policy().classify(stored.expected_amount, dec!(1019.99)),
        stored.status
    );
}

#[tokio::test]
async fn test_oversized_shift_cash_is_a_client_error() {
    let pool = require_database!();
    let (station, mut shifts) = Station::new(pool, &[("shift", dec!(1000000000000))]);

    let err = station
        .service
        .open_from_shift(shifts.remove(0), None)
        .await
        .unwrap_err();

    assert!(matches!(err, HandoverError::InvalidRequest(_)));
    assert!(station.service.chain(&station.id).await.unwrap().is_empty());
}
