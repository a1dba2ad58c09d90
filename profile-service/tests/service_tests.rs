use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::error::{Error, Result};
use common::model::profile::{BalanceUpdate, CurrencyField, CurrencyOperation, Profile, Projection, UpdateOutcome};
use profile_service::{BalanceService, InMemoryProfileStore, ProfileStore};
use serde_json::json;

/// Store wrapper counting every call that reaches storage
struct RecordingStore {
    inner: InMemoryProfileStore,
    updates: AtomicUsize,
    reads: AtomicUsize,
}

impl RecordingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryProfileStore::new(),
            updates: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.updates.load(Ordering::SeqCst) + self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for RecordingStore {
    async fn create_profile(&self, account_id: &str) -> Result<Profile> {
        self.inner.create_profile(account_id).await
    }

    async fn find_by_account_id(&self, account_id: &str, projection: Projection) -> Result<Option<Profile>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_account_id(account_id, projection).await
    }

    async fn apply_update(
        &self,
        account_id: &str,
        field: CurrencyField,
        update: BalanceUpdate,
    ) -> Result<UpdateOutcome> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.apply_update(account_id, field, update).await
    }
}

/// Store that matches documents but never modifies them
struct StubbornStore;

#[async_trait]
impl ProfileStore for StubbornStore {
    async fn create_profile(&self, account_id: &str) -> Result<Profile> {
        Ok(Profile::new(account_id))
    }

    async fn find_by_account_id(&self, account_id: &str, _projection: Projection) -> Result<Option<Profile>> {
        Ok(Some(Profile::new(account_id)))
    }

    async fn apply_update(
        &self,
        _account_id: &str,
        _field: CurrencyField,
        _update: BalanceUpdate,
    ) -> Result<UpdateOutcome> {
        Ok(UpdateOutcome::matched(0, 0))
    }
}

/// Store whose backend is unreachable
struct BrokenStore;

#[async_trait]
impl ProfileStore for BrokenStore {
    async fn create_profile(&self, _account_id: &str) -> Result<Profile> {
        Err(Error::Database(sqlx::Error::PoolClosed))
    }

    async fn find_by_account_id(&self, _account_id: &str, _projection: Projection) -> Result<Option<Profile>> {
        Err(Error::Database(sqlx::Error::PoolClosed))
    }

    async fn apply_update(
        &self,
        _account_id: &str,
        _field: CurrencyField,
        _update: BalanceUpdate,
    ) -> Result<UpdateOutcome> {
        Err(Error::Database(sqlx::Error::PoolClosed))
    }
}

async fn service_with_profile(account_id: &str) -> BalanceService {
    let service = BalanceService::new();
    service.provision(account_id).await.unwrap();
    service
}

async fn mtx_quantity(service: &BalanceService, account_id: &str) -> i64 {
    service
        .get_profile(account_id)
        .await
        .unwrap()
        .currency(CurrencyField::MtxPurchased)
        .unwrap()
}

#[tokio::test]
async fn test_set_then_read_returns_amount() {
    let service = service_with_profile("player").await;

    for amount in [0, 1, 950, 13_500, i64::MAX] {
        let adjustment = service
            .adjust_legacy_currency("player", "set", &json!(amount))
            .await
            .unwrap();
        assert_eq!(adjustment.amount, amount);
        assert_eq!(mtx_quantity(&service, "player").await, amount);
    }
}

#[tokio::test]
async fn test_set_is_idempotent() {
    let service = service_with_profile("player").await;

    let first = service.adjust_legacy_currency("player", "set", &json!(2800)).await.unwrap();
    let second = service.adjust_legacy_currency("player", "set", &json!(2800)).await.unwrap();

    assert_eq!(first.outcome.modified_count, 1);
    // Matched but unchanged is still a success
    assert_eq!(second.outcome.matched_count, 1);
    assert_eq!(second.outcome.modified_count, 0);
    assert_eq!(mtx_quantity(&service, "player").await, 2800);
}

#[tokio::test]
async fn test_add_and_remove_sum_deltas() {
    let service = service_with_profile("player").await;
    service.adjust_legacy_currency("player", "set", &json!(1000)).await.unwrap();

    service.adjust_legacy_currency("player", "add", &json!(500)).await.unwrap();
    service.adjust_legacy_currency("player", "remove", &json!("300")).await.unwrap();
    let last = service.adjust_legacy_currency("player", "add", &json!(25)).await.unwrap();

    assert_eq!(last.operation, CurrencyOperation::Add);
    assert_eq!(last.outcome.previous, Some(1200));
    assert_eq!(last.outcome.current, Some(1225));
    assert_eq!(mtx_quantity(&service, "player").await, 1225);
}

#[tokio::test]
async fn test_remove_below_zero_is_rejected() {
    let service = service_with_profile("player").await;
    service.adjust_legacy_currency("player", "set", &json!(100)).await.unwrap();

    let result = service.adjust_legacy_currency("player", "remove", &json!(101)).await;

    assert!(matches!(result, Err(Error::InsufficientBalance(_))));
    assert_eq!(mtx_quantity(&service, "player").await, 100);
}

#[tokio::test]
async fn test_set_negative_is_rejected() {
    let service = service_with_profile("player").await;

    let result = service.adjust_legacy_currency("player", "set", &json!(-5)).await;

    assert!(matches!(result, Err(Error::ValidationError(_))));
    assert_eq!(mtx_quantity(&service, "player").await, 0);
}

#[tokio::test]
async fn test_non_numeric_amount_never_reaches_store() {
    let store = Arc::new(RecordingStore::new());
    let service = BalanceService::with_store(store.clone());
    service.provision("player").await.unwrap();

    for amount in [json!("abc"), json!(null), json!({}), json!(1.5)] {
        let result = service.adjust_legacy_currency("player", "add", &amount).await;
        assert!(matches!(result, Err(Error::ValidationError(_))), "amount {} accepted", amount);
    }

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_unknown_operation_never_reaches_store() {
    let store = Arc::new(RecordingStore::new());
    let service = BalanceService::with_store(store.clone());

    let result = service.adjust_legacy_currency("player", "double", &json!(10)).await;

    assert!(matches!(result, Err(Error::ValidationError(_))));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_award_for_kills() {
    let service = service_with_profile("player").await;

    let change = service.award_for_kills("player", Some(3)).await.unwrap();
    assert_eq!(change.delta, 750);
    assert_eq!(service.get_balance("player").await.unwrap(), 750);

    // Zero kills is a matched zero increment, still a success
    let change = service.award_for_kills("player", Some(0)).await.unwrap();
    assert_eq!(change.delta, 0);
    assert_eq!(change.outcome.matched_count, 1);
    assert_eq!(change.outcome.modified_count, 0);

    let change = service.award_for_kills("player", None).await.unwrap();
    assert_eq!(change.delta, 0);
    assert_eq!(service.get_balance("player").await.unwrap(), 750);
}

#[tokio::test]
async fn test_award_for_kills_rejects_bad_counts() {
    let store = Arc::new(RecordingStore::new());
    let service = BalanceService::with_store(store.clone());
    service.provision("player").await.unwrap();

    assert!(matches!(
        service.award_for_kills("player", Some(-1)).await,
        Err(Error::ValidationError(_))
    ));
    assert!(matches!(
        service.award_for_kills("player", Some(i64::MAX)).await,
        Err(Error::ValidationError(_))
    ));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_award_for_win_is_fixed() {
    let service = service_with_profile("player").await;
    service.update_balance("player", Some(12_345)).await.unwrap();

    let change = service.award_for_win("player").await.unwrap();

    assert_eq!(change.delta, 1000);
    assert_eq!(change.outcome.previous, Some(12_345));
    assert_eq!(service.get_balance("player").await.unwrap(), 13_345);
}

#[tokio::test]
async fn test_update_balance() {
    let service = service_with_profile("player").await;

    service.update_balance("player", Some(600)).await.unwrap();
    service.update_balance("player", Some(-250)).await.unwrap();
    let change = service.update_balance("player", None).await.unwrap();

    assert_eq!(change.delta, 0);
    assert_eq!(service.get_balance("player").await.unwrap(), 350);

    let result = service.update_balance("player", Some(-351)).await;
    assert!(matches!(result, Err(Error::InsufficientBalance(_))));
    assert_eq!(service.get_balance("player").await.unwrap(), 350);
}

#[tokio::test]
async fn test_get_balance_missing_profile() {
    let service = BalanceService::new();

    let result = service.get_balance("nobody").await;

    assert!(matches!(result, Err(Error::ProfileNotFound(_))));
}

#[tokio::test]
async fn test_mutations_on_missing_profile() {
    let service = BalanceService::new();

    assert!(matches!(
        service.adjust_legacy_currency("nobody", "add", &json!(5)).await,
        Err(Error::ProfileNotFound(_))
    ));
    assert!(matches!(service.award_for_kills("nobody", Some(0)).await, Err(Error::ProfileNotFound(_))));
    assert!(matches!(service.award_for_win("nobody").await, Err(Error::ProfileNotFound(_))));
    assert!(matches!(service.update_balance("nobody", Some(1)).await, Err(Error::ProfileNotFound(_))));
}

#[tokio::test]
async fn test_unmodified_update_is_mutation_failed() {
    let service = BalanceService::with_store(Arc::new(StubbornStore));

    let result = service.award_for_win("player").await;
    assert!(matches!(result, Err(Error::MutationFailed(_))));

    // Asking for no change is not a failure even when nothing was modified
    assert!(service.award_for_kills("player", Some(0)).await.is_ok());
}

#[tokio::test]
async fn test_store_errors_propagate() {
    let service = BalanceService::with_store(Arc::new(BrokenStore));

    let result = service.award_for_win("player").await;
    assert!(matches!(result, Err(Error::Database(_))));

    let result = service.get_balance("player").await;
    assert!(matches!(result, Err(Error::Database(_))));
}

#[tokio::test]
async fn test_concurrent_increments_commute() {
    let service = Arc::new(service_with_profile("player").await);
    service.update_balance("player", Some(10_000)).await.unwrap();

    let deltas: Vec<i64> = (0..200).map(|i| if i % 3 == 0 { -40 } else { 75 }).collect();
    let expected = 10_000 + deltas.iter().sum::<i64>();

    let tasks = deltas.into_iter().map(|delta| {
        let service = service.clone();
        tokio::spawn(async move { service.update_balance("player", Some(delta)).await })
    });

    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(service.get_balance("player").await.unwrap(), expected);
}

#[tokio::test]
async fn test_concurrent_legacy_adjustments_commute() {
    let service = Arc::new(service_with_profile("player").await);

    let tasks = (0..100).map(|i| {
        let service = service.clone();
        tokio::spawn(async move {
            let operation = if i % 2 == 0 { "add" } else { "remove" };
            let amount = if i % 2 == 0 { 30 } else { 10 };
            service.adjust_legacy_currency("player", operation, &json!(amount)).await
        })
    });

    // Removals may race ahead of additions and hit the zero floor
    let mut expected = 0;
    for (i, result) in futures::future::join_all(tasks).await.into_iter().enumerate() {
        match result.unwrap() {
            Ok(_) => expected += if i % 2 == 0 { 30 } else { -10 },
            Err(Error::InsufficientBalance(_)) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(mtx_quantity(&service, "player").await, expected);
}
