use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use timebank_core::{AppError, AppResult};
use timebank_domain::AggregateViewDefinition;

use super::{
    AggregateRefreshScheduler, AggregateViewState, AggregateViewStore, RefreshFailure,
    RefreshMode,
};

#[derive(Default)]
struct FakeStore {
    failing_concurrent: Mutex<HashSet<String>>,
    failing_exclusive: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<(String, RefreshMode), Duration>>,
    calls: Mutex<Vec<(String, RefreshMode)>>,
}

impl FakeStore {
    fn fail_concurrent(&self, name: &str) {
        self.failing_concurrent.lock().insert(name.to_owned());
    }

    fn fail_exclusive(&self, name: &str) {
        self.failing_exclusive.lock().insert(name.to_owned());
    }

    fn heal(&self, name: &str) {
        self.failing_concurrent.lock().remove(name);
        self.failing_exclusive.lock().remove(name);
    }

    fn delay(&self, name: &str, mode: RefreshMode, delay: Duration) {
        self.delays.lock().insert((name.to_owned(), mode), delay);
    }

    fn calls(&self) -> Vec<(String, RefreshMode)> {
        self.calls.lock().clone()
    }

    fn calls_for(&self, name: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(view, _)| view == name)
            .count()
    }

    async fn refresh(&self, view: &AggregateViewDefinition, mode: RefreshMode) -> AppResult<()> {
        self.calls.lock().push((view.name().to_owned(), mode));

        let delay = self
            .delays
            .lock()
            .get(&(view.name().to_owned(), mode))
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = match mode {
            RefreshMode::Concurrent => self.failing_concurrent.lock().contains(view.name()),
            RefreshMode::Exclusive => self.failing_exclusive.lock().contains(view.name()),
        };
        if failing {
            return Err(AppError::Internal(format!(
                "{} refresh of '{}' failed",
                mode.as_str(),
                view.relation()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl AggregateViewStore for FakeStore {
    async fn refresh_concurrently(&self, view: &AggregateViewDefinition) -> AppResult<()> {
        self.refresh(view, RefreshMode::Concurrent).await
    }

    async fn refresh_exclusively(&self, view: &AggregateViewDefinition) -> AppResult<()> {
        self.refresh(view, RefreshMode::Exclusive).await
    }
}

fn view(name: &str, concurrent: bool) -> AggregateViewDefinition {
    AggregateViewDefinition::named(name, concurrent).unwrap_or_else(|_| unreachable!())
}

fn scheduler_with(
    store: Arc<FakeStore>,
    views: Vec<AggregateViewDefinition>,
) -> AppResult<AggregateRefreshScheduler> {
    let mut scheduler = AggregateRefreshScheduler::new(store);
    scheduler.register_views(views)?;
    Ok(scheduler)
}

#[tokio::test]
async fn concurrent_refresh_is_preferred_when_supported() -> AppResult<()> {
    let store = Arc::new(FakeStore::default());
    let scheduler = scheduler_with(store.clone(), vec![view("mv_user_reputation", true)])?;

    let outcomes = scheduler.refresh_all().await;

    assert_eq!(outcomes.len(), 1);
    let success = outcomes[0].result.as_ref().map_err(|error| {
        AppError::Internal(format!("expected success, got {error}"))
    })?;
    assert_eq!(success.mode, RefreshMode::Concurrent);
    assert!(success.fallback_reason.is_none());
    assert_eq!(
        store.calls(),
        vec![("mv_user_reputation".to_owned(), RefreshMode::Concurrent)]
    );

    let status = &scheduler.view_statuses()[0];
    assert_eq!(status.state, AggregateViewState::Fresh);
    assert!(status.last_refreshed_at.is_some());
    assert!(status.last_error.is_none());
    Ok(())
}

#[tokio::test]
async fn concurrent_failure_falls_back_to_exclusive() -> AppResult<()> {
    let store = Arc::new(FakeStore::default());
    store.fail_concurrent("mv_skill_demand");
    let scheduler = scheduler_with(store.clone(), vec![view("mv_skill_demand", true)])?;

    let outcomes = scheduler.refresh_all().await;

    let success = outcomes[0].result.as_ref().map_err(|error| {
        AppError::Internal(format!("expected fallback success, got {error}"))
    })?;
    assert_eq!(success.mode, RefreshMode::Exclusive);
    assert!(
        success
            .fallback_reason
            .as_deref()
            .is_some_and(|reason| reason.contains("concurrent refresh"))
    );
    assert_eq!(
        store.calls(),
        vec![
            ("mv_skill_demand".to_owned(), RefreshMode::Concurrent),
            ("mv_skill_demand".to_owned(), RefreshMode::Exclusive),
        ]
    );

    let status = &scheduler.view_statuses()[0];
    assert_eq!(status.state, AggregateViewState::Fresh);
    assert!(status.last_fallback_reason.is_some());
    Ok(())
}

#[tokio::test]
async fn views_without_concurrent_support_go_straight_to_exclusive() -> AppResult<()> {
    let store = Arc::new(FakeStore::default());
    let scheduler = scheduler_with(store.clone(), vec![view("mv_exchange_activity", false)])?;

    let outcomes = scheduler.refresh_all().await;

    assert!(outcomes[0].result.is_ok());
    assert_eq!(
        store.calls(),
        vec![("mv_exchange_activity".to_owned(), RefreshMode::Exclusive)]
    );
    Ok(())
}

#[tokio::test]
async fn one_failing_view_does_not_stop_the_others() -> AppResult<()> {
    let store = Arc::new(FakeStore::default());
    store.fail_concurrent("mv_broken");
    store.fail_exclusive("mv_broken");
    let scheduler = scheduler_with(
        store.clone(),
        vec![
            view("mv_broken", true),
            view("mv_healthy", true),
            view("mv_exclusive_only", false),
        ],
    )?;

    let outcomes = scheduler.refresh_all().await;

    assert_eq!(outcomes.len(), 3);
    match &outcomes[0].result {
        Err(RefreshFailure::ConcurrentThenExclusive {
            concurrent_error,
            exclusive_error,
        }) => {
            assert!(concurrent_error.contains("concurrent"));
            assert!(exclusive_error.contains("exclusive"));
        }
        other => panic!("expected both paths to fail, got {other:?}"),
    }
    assert!(outcomes[1].result.is_ok());
    assert!(outcomes[2].result.is_ok());

    let statuses = scheduler.view_statuses();
    assert_eq!(statuses[0].state, AggregateViewState::Failed);
    assert!(statuses[0].last_refreshed_at.is_none());
    assert!(statuses[0].last_error.is_some());
    assert_eq!(statuses[1].state, AggregateViewState::Fresh);
    assert_eq!(statuses[2].state, AggregateViewState::Fresh);
    Ok(())
}

#[tokio::test]
async fn exclusive_only_failure_reports_single_error() -> AppResult<()> {
    let store = Arc::new(FakeStore::default());
    store.fail_exclusive("mv_exchange_activity");
    let scheduler = scheduler_with(store, vec![view("mv_exchange_activity", false)])?;

    let outcomes = scheduler.refresh_all().await;

    match &outcomes[0].result {
        Err(failure @ RefreshFailure::Exclusive { .. }) => {
            assert!(failure.concurrent_error().is_none());
        }
        other => panic!("expected exclusive failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn failed_view_keeps_last_success_and_recovers() -> AppResult<()> {
    let store = Arc::new(FakeStore::default());
    let scheduler = scheduler_with(store.clone(), vec![view("mv_user_reputation", true)])?;

    scheduler.refresh_all().await;
    let first_refresh = scheduler.view_statuses()[0].last_refreshed_at;
    assert!(first_refresh.is_some());

    store.fail_concurrent("mv_user_reputation");
    store.fail_exclusive("mv_user_reputation");
    scheduler.refresh_all().await;

    let failed = &scheduler.view_statuses()[0];
    assert_eq!(failed.state, AggregateViewState::Failed);
    assert_eq!(failed.last_refreshed_at, first_refresh);

    store.heal("mv_user_reputation");
    scheduler.refresh_all().await;

    let recovered = &scheduler.view_statuses()[0];
    assert_eq!(recovered.state, AggregateViewState::Fresh);
    assert!(recovered.last_error.is_none());
    assert!(recovered.last_fallback_reason.is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn slow_concurrent_refresh_times_out_and_falls_back() -> AppResult<()> {
    let store = Arc::new(FakeStore::default());
    store.delay(
        "mv_skill_demand",
        RefreshMode::Concurrent,
        Duration::from_secs(30),
    );
    let scheduler = scheduler_with(store.clone(), vec![view("mv_skill_demand", true)])?
        .with_refresh_timeout(Duration::from_secs(5));

    let outcomes = scheduler.refresh_all().await;

    let success = outcomes[0].result.as_ref().map_err(|error| {
        AppError::Internal(format!("expected fallback success, got {error}"))
    })?;
    assert_eq!(success.mode, RefreshMode::Exclusive);
    assert!(
        success
            .fallback_reason
            .as_deref()
            .is_some_and(|reason| reason.contains("deadline"))
    );
    Ok(())
}

#[test]
fn registry_is_validated_and_registered_once() {
    let store = Arc::new(FakeStore::default());
    let mut scheduler = AggregateRefreshScheduler::new(store);

    assert!(matches!(
        scheduler.register_views(Vec::new()),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        scheduler.register_views(vec![view("mv_a", true), view("mv_a", false)]),
        Err(AppError::Validation(_))
    ));

    assert!(scheduler.register_views(vec![view("mv_a", true)]).is_ok());
    assert!(matches!(
        scheduler.register_views(vec![view("mv_b", true)]),
        Err(AppError::Conflict(_))
    ));

    let statuses = scheduler.view_statuses();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].state, AggregateViewState::Stale);
}

#[tokio::test]
async fn start_rejects_zero_interval_and_empty_registry() -> AppResult<()> {
    let empty = Arc::new(AggregateRefreshScheduler::new(Arc::new(FakeStore::default())));
    assert!(matches!(
        empty.start(Duration::from_secs(60)),
        Err(AppError::Validation(_))
    ));

    let scheduler = Arc::new(scheduler_with(
        Arc::new(FakeStore::default()),
        vec![view("mv_a", true)],
    )?);
    assert!(matches!(
        scheduler.start(Duration::ZERO),
        Err(AppError::Validation(_))
    ));
    assert!(!scheduler.is_running());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn loop_refreshes_immediately_then_every_interval() -> AppResult<()> {
    let store = Arc::new(FakeStore::default());
    let scheduler = Arc::new(scheduler_with(
        store.clone(),
        vec![view("mv_a", true), view("mv_b", false)],
    )?);

    let handle = scheduler.start(Duration::from_secs(60))?;
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert!(scheduler.is_running());
    assert_eq!(store.calls_for("mv_a"), 1);
    assert_eq!(store.calls_for("mv_b"), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(store.calls_for("mv_a"), 2);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(store.calls_for("mv_a"), 4);

    scheduler.stop(&handle).await;
    assert!(!scheduler.is_running());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn second_start_conflicts_until_stopped() -> AppResult<()> {
    let scheduler = Arc::new(scheduler_with(
        Arc::new(FakeStore::default()),
        vec![view("mv_a", true)],
    )?);

    let handle = scheduler.start(Duration::from_secs(60))?;
    assert!(matches!(
        scheduler.start(Duration::from_secs(60)),
        Err(AppError::Conflict(_))
    ));

    scheduler.stop(&handle).await;
    let restarted = scheduler.start(Duration::from_secs(60))?;
    assert!(scheduler.is_running());
    scheduler.stop(&restarted).await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() -> AppResult<()> {
    let store = Arc::new(FakeStore::default());
    let scheduler = Arc::new(scheduler_with(store.clone(), vec![view("mv_a", true)])?);

    let handle = scheduler.start(Duration::from_secs(60))?;
    tokio::time::sleep(Duration::from_millis(1)).await;

    scheduler.stop(&handle).await;
    scheduler.stop(&handle).await;

    assert!(handle.is_cancelled());
    assert!(!scheduler.is_running());

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(store.calls_for("mv_a"), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn stop_lets_the_in_flight_refresh_finish() -> AppResult<()> {
    let store = Arc::new(FakeStore::default());
    store.delay("mv_slow", RefreshMode::Exclusive, Duration::from_secs(10));
    let scheduler = Arc::new(scheduler_with(store.clone(), vec![view("mv_slow", false)])?);

    let handle = scheduler.start(Duration::from_secs(60))?;
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(
        scheduler.view_statuses()[0].state,
        AggregateViewState::Refreshing
    );

    scheduler.stop(&handle).await;

    let status = &scheduler.view_statuses()[0];
    assert_eq!(status.state, AggregateViewState::Fresh);
    assert_eq!(store.calls_for("mv_slow"), 1);
    assert!(!scheduler.is_running());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_the_loop() -> AppResult<()> {
    let store = Arc::new(FakeStore::default());
    let scheduler = Arc::new(scheduler_with(store.clone(), vec![view("mv_a", true)])?);

    let handle = scheduler.start(Duration::from_secs(60))?;
    tokio::time::sleep(Duration::from_millis(1)).await;
    drop(handle);
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert!(!scheduler.is_running());
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(store.calls_for("mv_a"), 1);
    Ok(())
}
