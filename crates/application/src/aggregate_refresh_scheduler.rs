//! Background recomputation of precomputed aggregate views.
//!
//! The scheduler owns a fixed registry of views and one recurring task that
//! refreshes all of them every interval. Each view is refreshed concurrently
//! when it supports that, falling back to an exclusive refresh when the
//! concurrent path fails. One failing view never stops the others or later
//! ticks; it keeps serving its last good contents and records the error.
//!
//! Refreshes run entirely off the request path. Cancellation is cooperative:
//! it is observed only while waiting for the next tick, so an in-flight
//! refresh always finishes.

mod handle;
mod ports;
mod status;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use timebank_core::{AppError, AppResult};
use timebank_domain::AggregateViewDefinition;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

pub use handle::RefreshHandle;
pub use ports::AggregateViewStore;
pub use status::{
    AggregateViewState, AggregateViewStatus, RefreshFailure, RefreshMode, RefreshSuccess,
    ViewRefreshOutcome,
};

#[derive(Debug)]
struct ViewEntry {
    definition: AggregateViewDefinition,
    state: AggregateViewState,
    last_refreshed_at: Option<chrono::DateTime<Utc>>,
    last_error: Option<String>,
    last_fallback_reason: Option<String>,
}

impl ViewEntry {
    fn new(definition: AggregateViewDefinition) -> Self {
        Self {
            definition,
            state: AggregateViewState::Stale,
            last_refreshed_at: None,
            last_error: None,
            last_fallback_reason: None,
        }
    }

    fn status(&self) -> AggregateViewStatus {
        AggregateViewStatus {
            name: self.definition.name().to_owned(),
            relation: self.definition.relation().to_owned(),
            concurrent_refresh_supported: self.definition.concurrent_refresh_supported(),
            state: self.state,
            last_refreshed_at: self.last_refreshed_at,
            last_error: self.last_error.clone(),
            last_fallback_reason: self.last_fallback_reason.clone(),
        }
    }
}

/// Owns the aggregate view registry and its refresh loop.
pub struct AggregateRefreshScheduler {
    store: Arc<dyn AggregateViewStore>,
    views: RwLock<Vec<ViewEntry>>,
    refresh_timeout: Option<Duration>,
    refresh_lock: Mutex<()>,
    running: AtomicBool,
}

impl AggregateRefreshScheduler {
    /// Creates a scheduler with an empty registry and no refresh deadline.
    #[must_use]
    pub fn new(store: Arc<dyn AggregateViewStore>) -> Self {
        Self {
            store,
            views: RwLock::new(Vec::new()),
            refresh_timeout: None,
            refresh_lock: Mutex::new(()),
            running: AtomicBool::new(false),
        }
    }

    /// Bounds every individual store call; an elapsed deadline counts as a failure.
    #[must_use]
    pub fn with_refresh_timeout(mut self, refresh_timeout: Duration) -> Self {
        self.refresh_timeout = Some(refresh_timeout);
        self
    }

    /// Registers the fixed set of views. Allowed once, before the scheduler is shared.
    pub fn register_views(&mut self, views: Vec<AggregateViewDefinition>) -> AppResult<()> {
        let registry = self.views.get_mut();
        if !registry.is_empty() {
            return Err(AppError::Conflict(
                "aggregate views are already registered".to_owned(),
            ));
        }

        if views.is_empty() {
            return Err(AppError::Validation(
                "at least one aggregate view must be registered".to_owned(),
            ));
        }

        let mut seen = HashSet::new();
        for view in &views {
            if !seen.insert(view.name().to_owned()) {
                return Err(AppError::Validation(format!(
                    "aggregate view '{}' is registered more than once",
                    view.name()
                )));
            }
        }

        registry.extend(views.into_iter().map(ViewEntry::new));
        Ok(())
    }

    /// Returns a copy of every view's current status, in registration order.
    #[must_use]
    pub fn view_statuses(&self) -> Vec<AggregateViewStatus> {
        self.views.read().iter().map(ViewEntry::status).collect()
    }

    /// Returns whether the recurring task is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Refreshes every registered view once, continuing past failures.
    pub async fn refresh_all(&self) -> Vec<ViewRefreshOutcome> {
        let _refresh_guard = self.refresh_lock.lock().await;
        let definitions: Vec<AggregateViewDefinition> = self
            .views
            .read()
            .iter()
            .map(|entry| entry.definition.clone())
            .collect();

        let mut outcomes = Vec::with_capacity(definitions.len());
        for definition in definitions {
            self.update_entry(definition.name(), |entry| {
                entry.state = AggregateViewState::Refreshing;
            });

            let result = self.refresh_view(&definition).await;
            self.apply_result(definition.name(), &result);

            match &result {
                Ok(success) => info!(
                    view = %definition.name(),
                    mode = success.mode.as_str(),
                    fell_back = success.fallback_reason.is_some(),
                    "aggregate view refreshed"
                ),
                Err(error) => warn!(
                    view = %definition.name(),
                    error = %error,
                    "aggregate view refresh failed; serving previous contents"
                ),
            }

            outcomes.push(ViewRefreshOutcome {
                view_name: definition.name().to_owned(),
                result,
            });
        }

        outcomes
    }

    /// Launches the recurring refresh task. The first refresh runs immediately.
    pub fn start(self: &Arc<Self>, interval: Duration) -> AppResult<RefreshHandle> {
        if interval.is_zero() {
            return Err(AppError::Validation(
                "aggregate refresh interval must be greater than zero".to_owned(),
            ));
        }

        if self.views.read().is_empty() {
            return Err(AppError::Validation(
                "no aggregate views are registered".to_owned(),
            ));
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::Conflict(
                "aggregate refresh loop is already running".to_owned(),
            ));
        }

        let (shutdown_sender, mut shutdown_receiver) = watch::channel(false);
        let scheduler = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                interval_seconds = interval.as_secs(),
                views = scheduler.views.read().len(),
                "aggregate refresh loop started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_receiver.changed() => break,
                    _ = ticker.tick() => {}
                }

                let outcomes = scheduler.refresh_all().await;
                let failed = outcomes
                    .iter()
                    .filter(|outcome| outcome.result.is_err())
                    .count();
                info!(
                    refreshed = outcomes.len() - failed,
                    failed,
                    "aggregate refresh tick completed"
                );
            }

            scheduler.running.store(false, Ordering::Release);
            info!("aggregate refresh loop stopped");
        });

        Ok(RefreshHandle::new(shutdown_sender, task))
    }

    /// Stops the loop at its next tick boundary and waits for it to exit.
    ///
    /// Stopping an already stopped handle does nothing.
    pub async fn stop(&self, handle: &RefreshHandle) {
        handle.cancel();

        let Some(task) = handle.take_task().await else {
            return;
        };

        if let Err(error) = task.await {
            warn!(error = %error, "aggregate refresh loop terminated abnormally");
            self.running.store(false, Ordering::Release);
        }
    }

    async fn refresh_view(
        &self,
        view: &AggregateViewDefinition,
    ) -> Result<RefreshSuccess, RefreshFailure> {
        let fallback_reason = if view.concurrent_refresh_supported() {
            match self.attempt(view, RefreshMode::Concurrent).await {
                Ok(()) => {
                    return Ok(RefreshSuccess {
                        mode: RefreshMode::Concurrent,
                        fallback_reason: None,
                        refreshed_at: Utc::now(),
                    });
                }
                Err(concurrent_error) => {
                    warn!(
                        view = %view.name(),
                        error = %concurrent_error,
                        "concurrent refresh failed; falling back to exclusive refresh"
                    );
                    Some(concurrent_error)
                }
            }
        } else {
            None
        };

        match self.attempt(view, RefreshMode::Exclusive).await {
            Ok(()) => Ok(RefreshSuccess {
                mode: RefreshMode::Exclusive,
                fallback_reason,
                refreshed_at: Utc::now(),
            }),
            Err(exclusive_error) => Err(match fallback_reason {
                Some(concurrent_error) => RefreshFailure::ConcurrentThenExclusive {
                    concurrent_error,
                    exclusive_error,
                },
                None => RefreshFailure::Exclusive { exclusive_error },
            }),
        }
    }

    async fn attempt(
        &self,
        view: &AggregateViewDefinition,
        mode: RefreshMode,
    ) -> Result<(), String> {
        let call = async {
            match mode {
                RefreshMode::Concurrent => self.store.refresh_concurrently(view).await,
                RefreshMode::Exclusive => self.store.refresh_exclusively(view).await,
            }
        };

        let result = match self.refresh_timeout {
            Some(deadline) => match tokio::time::timeout(deadline, call).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(format!(
                        "{} refresh exceeded deadline of {}ms",
                        mode.as_str(),
                        deadline.as_millis()
                    ));
                }
            },
            None => call.await,
        };

        result.map_err(|error| error.to_string())
    }

    fn apply_result(&self, view_name: &str, result: &Result<RefreshSuccess, RefreshFailure>) {
        self.update_entry(view_name, |entry| match result {
            Ok(success) => {
                entry.state = AggregateViewState::Fresh;
                entry.last_refreshed_at = Some(success.refreshed_at);
                entry.last_error = None;
                entry.last_fallback_reason = success.fallback_reason.clone();
            }
            Err(failure) => {
                entry.state = AggregateViewState::Failed;
                entry.last_error = Some(failure.to_string());
                entry.last_fallback_reason = failure.concurrent_error().map(ToOwned::to_owned);
            }
        });
    }

    fn update_entry(&self, view_name: &str, update: impl FnOnce(&mut ViewEntry)) {
        let mut views = self.views.write();
        if let Some(entry) = views
            .iter_mut()
            .find(|entry| entry.definition.name() == view_name)
        {
            update(entry);
        }
    }
}
