//! Update dispatching against the recognized update types.
//!
//! The dispatcher decides whether a verified update reaches subscribers.
//! Recognized updates are emitted under their declared type with the
//! `update_type` field stripped; anything else is dropped without error.

use tracing::debug;

use crate::error::DispatchError;
use crate::webhook::registry::{EmitReport, SubscriptionRegistry};
use crate::webhook::update::{ParsedUpdate, RecognizedUpdateTypes, Update};

/// Result of dispatching one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Update type absent or not recognized; no subscriber was invoked.
    Ignored { update_type: Option<String> },

    /// Update emitted to the registry.
    Delivered(EmitReport),
}

impl DispatchOutcome {
    /// Check if the update reached the registry.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Routes parsed updates to the subscription registry.
#[derive(Debug, Clone)]
pub struct UpdateDispatcher {
    recognized: RecognizedUpdateTypes,
    registry: SubscriptionRegistry,
}

impl UpdateDispatcher {
    /// Create a dispatcher over an allow-list and registry.
    pub fn new(recognized: RecognizedUpdateTypes, registry: SubscriptionRegistry) -> Self {
        Self {
            recognized,
            registry,
        }
    }

    /// Recognized update types.
    pub fn recognized(&self) -> &RecognizedUpdateTypes {
        &self.recognized
    }

    /// Registry updates are emitted to.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Dispatch one update.
    ///
    /// # Errors
    ///
    /// Propagates `DispatchError` from the registry. Unrecognized updates
    /// and handler failures are not errors.
    pub async fn handle(&self, update: ParsedUpdate) -> Result<DispatchOutcome, DispatchError> {
        let record = match update.classify(&self.recognized) {
            Update::InvoicePaid(record) | Update::Other(record) => record,
            Update::Unrecognized { update_type } => {
                debug!(update_type = ?update_type, "Ignoring unrecognized update type");
                return Ok(DispatchOutcome::Ignored { update_type });
            }
        };

        let report = self.registry.emit(record).await?;
        Ok(DispatchOutcome::Delivered(report))
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
