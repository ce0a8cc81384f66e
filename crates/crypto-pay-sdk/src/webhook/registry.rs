//! Subscription registry for application update handlers.
//!
//! Handlers are registered per update type and invoked in registration order.
//! Each invocation runs in its own task and is awaited before the next one
//! starts, so a handler that fails or panics is logged and counted without
//! stopping the handlers after it.
//!
//! # Examples
//!
//! ```rust
//! use crypto_pay_sdk::webhook::{handler_fn, SubscriptionRegistry};
//! use crypto_pay_sdk::UpdateType;
//!
//! # async fn example() {
//! let registry = SubscriptionRegistry::new();
//!
//! let handle = registry
//!     .subscribe(UpdateType::invoice_paid(), handler_fn(|record| async move {
//!         println!("paid: {:?}", record.payload());
//!         Ok(())
//!     }))
//!     .await;
//!
//! assert_eq!(registry.handler_count("invoice_paid").await, 1);
//! registry.unsubscribe(&handle).await;
//! # }
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinError;
use tracing::{debug, error};

use crate::error::{DispatchError, HandlerError};
use crate::webhook::update::{EventRecord, UpdateType};

/// Application-provided update handler.
///
/// # Error Handling
///
/// Handler errors are logged but do not affect the HTTP response to the
/// platform, nor the other handlers registered for the same update.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    /// Handle one delivered update.
    async fn handle(&self, record: &EventRecord) -> Result<(), HandlerError>;
}

/// Adapter turning an async closure into an [`UpdateHandler`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as an [`UpdateHandler`].
///
/// The closure receives an owned copy of the record.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(EventRecord) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> UpdateHandler for FnHandler<F>
where
    F: Fn(EventRecord) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, record: &EventRecord) -> Result<(), HandlerError> {
        (self.f)(record.clone()).await
    }
}

/// Handle identifying one subscription, used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    update_type: UpdateType,
}

impl SubscriptionHandle {
    /// Update type the subscription listens to.
    pub fn update_type(&self) -> &UpdateType {
        &self.update_type
    }
}

/// Outcome of one emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitReport {
    /// Handlers invoked
    pub invoked: usize,

    /// Handlers that returned an error or panicked
    pub failed: usize,
}

impl EmitReport {
    /// Check if every invoked handler succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

struct Subscription {
    id: u64,
    handler: Arc<dyn UpdateHandler>,
    once: bool,
}

#[derive(Default)]
struct RegistryState {
    subscriptions: HashMap<UpdateType, Vec<Subscription>>,
    closed: bool,
}

/// Registry mapping update types to ordered handler lists.
///
/// Cloning yields another handle to the same registry. Safe to subscribe
/// while the endpoint is serving.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    state: Arc<RwLock<RegistryState>>,
    next_id: Arc<AtomicU64>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every delivery of `update_type`.
    pub async fn subscribe(
        &self,
        update_type: impl Into<UpdateType>,
        handler: impl UpdateHandler + 'static,
    ) -> SubscriptionHandle {
        self.insert(update_type.into(), Arc::new(handler), false)
            .await
    }

    /// Register a handler for the next delivery of `update_type` only.
    pub async fn once(
        &self,
        update_type: impl Into<UpdateType>,
        handler: impl UpdateHandler + 'static,
    ) -> SubscriptionHandle {
        self.insert(update_type.into(), Arc::new(handler), true)
            .await
    }

    /// Register a shared handler instance.
    pub async fn subscribe_shared(
        &self,
        update_type: impl Into<UpdateType>,
        handler: Arc<dyn UpdateHandler>,
    ) -> SubscriptionHandle {
        self.insert(update_type.into(), handler, false).await
    }

    async fn insert(
        &self,
        update_type: UpdateType,
        handler: Arc<dyn UpdateHandler>,
        once: bool,
    ) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.write().await;
        state
            .subscriptions
            .entry(update_type.clone())
            .or_default()
            .push(Subscription { id, handler, once });

        debug!(update_type = %update_type, subscription_id = id, once, "Handler subscribed");

        SubscriptionHandle { id, update_type }
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut state = self.state.write().await;
        let Some(subscriptions) = state.subscriptions.get_mut(&handle.update_type) else {
            return false;
        };

        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != handle.id);
        let removed = subscriptions.len() != before;

        if subscriptions.is_empty() {
            state.subscriptions.remove(&handle.update_type);
        }

        removed
    }

    /// Number of handlers registered for an update type.
    pub async fn handler_count(&self, update_type: &str) -> usize {
        let state = self.state.read().await;
        state
            .subscriptions
            .iter()
            .find(|(t, _)| t.as_str() == update_type)
            .map_or(0, |(_, subscriptions)| subscriptions.len())
    }

    /// Remove every subscription.
    pub async fn clear(&self) {
        self.state.write().await.subscriptions.clear();
    }

    /// Tear down the registry: clear subscriptions and refuse further emissions.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        state.subscriptions.clear();
        state.closed = true;
    }

    /// Check if the registry has been closed.
    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }

    /// Deliver a record to every handler registered for its update type.
    ///
    /// Fire-once handlers are removed before any handler runs, so a
    /// concurrent emission never invokes them twice. The ordered handler run
    /// is a detached task: dropping the returned future (a client hanging up
    /// mid-request) does not stop the remaining handlers.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::RegistryClosed` after [`close`](Self::close),
    /// and `DispatchError::Failed` if the emission task itself was cancelled.
    /// Handler failures are reported in the [`EmitReport`], not as errors.
    pub async fn emit(&self, record: EventRecord) -> Result<EmitReport, DispatchError> {
        let handlers = self.take_snapshot(record.update_type()).await?;
        if handlers.is_empty() {
            debug!(update_type = %record.update_type(), "No handlers for update");
            return Ok(EmitReport {
                invoked: 0,
                failed: 0,
            });
        }

        tokio::spawn(run_handlers(handlers, record))
            .await
            .map_err(emission_failed)
    }

    async fn take_snapshot(
        &self,
        update_type: &UpdateType,
    ) -> Result<Vec<(u64, Arc<dyn UpdateHandler>)>, DispatchError> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(DispatchError::RegistryClosed);
        }

        let Some(subscriptions) = state.subscriptions.get_mut(update_type) else {
            return Ok(Vec::new());
        };

        let snapshot: Vec<_> = subscriptions
            .iter()
            .map(|s| (s.id, Arc::clone(&s.handler)))
            .collect();
        subscriptions.retain(|s| !s.once);

        if subscriptions.is_empty() {
            state.subscriptions.remove(update_type);
        }

        Ok(snapshot)
    }
}

/// Run handlers in order, each in its own task so a panic stays contained.
async fn run_handlers(
    handlers: Vec<(u64, Arc<dyn UpdateHandler>)>,
    record: EventRecord,
) -> EmitReport {
    let record = Arc::new(record);
    let mut report = EmitReport {
        invoked: 0,
        failed: 0,
    };

    for (subscription_id, handler) in handlers {
        let task_record = Arc::clone(&record);
        let task = tokio::spawn(async move { handler.handle(&task_record).await });
        report.invoked += 1;

        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                report.failed += 1;
                error!(
                    update_type = %record.update_type(),
                    subscription_id,
                    error = %e,
                    "Update handler failed"
                );
            }
            Err(join_error) => {
                report.failed += 1;
                error!(
                    update_type = %record.update_type(),
                    subscription_id,
                    panicked = join_error.is_panic(),
                    "Update handler did not complete"
                );
            }
        }
    }

    debug!(
        update_type = %record.update_type(),
        invoked = report.invoked,
        failed = report.failed,
        "Update emitted"
    );

    report
}

/// Map a lost emission task (runtime shutdown) to a dispatch failure.
fn emission_failed(join_error: JoinError) -> DispatchError {
    error!(error = %join_error, "Update emission did not complete");
    DispatchError::Failed {
        status: None,
        message: format!("update emission did not complete: {join_error}"),
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
