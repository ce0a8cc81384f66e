//! Crypto Pay client: the object applications hold on to.
//!
//! [`CryptoPay`] owns the API token, the subscription registry and, when
//! configured, the webhook endpoint settings. Subscribing is done through
//! the client; the endpoint it builds dispatches into the same registry.

use std::future::Future;

use crate::auth::ApiToken;
use crate::error::{ConfigError, DispatchError, ServerError};
use crate::webhook::{
    DispatchOutcome, ParsedUpdate, RecognizedUpdateTypes, SubscriptionHandle,
    SubscriptionRegistry, UpdateDispatcher, UpdateHandler, UpdateType, WebhookConfig,
    WebhookReceiver, WebhookServer,
};

/// Client options.
#[derive(Debug, Clone, Default)]
pub struct CryptoPayOptions {
    /// Webhook endpoint settings; `None` disables the endpoint
    pub webhook: Option<WebhookConfig>,

    /// Update types dispatched to subscribers
    pub recognized_update_types: RecognizedUpdateTypes,
}

impl CryptoPayOptions {
    /// Enable the webhook endpoint.
    pub fn with_webhook(mut self, webhook: WebhookConfig) -> Self {
        self.webhook = Some(webhook);
        self
    }

    /// Replace the recognized update types.
    pub fn with_recognized_update_types(mut self, types: RecognizedUpdateTypes) -> Self {
        self.recognized_update_types = types;
        self
    }
}

/// Crypto Pay client.
///
/// # Examples
///
/// ```rust
/// use crypto_pay_sdk::{CryptoPay, CryptoPayOptions, WebhookConfig};
/// use crypto_pay_sdk::webhook::handler_fn;
///
/// # async fn example() -> Result<(), crypto_pay_sdk::ConfigError> {
/// let options = CryptoPayOptions::default()
///     .with_webhook(WebhookConfig::new("127.0.0.1", "/updates").with_port(8080));
/// let crypto_pay = CryptoPay::new("42:QWERTY", options)?;
///
/// crypto_pay
///     .invoice_paid(handler_fn(|record| async move {
///         println!("{:?}", record.payload());
///         Ok(())
///     }))
///     .await;
///
/// assert_eq!(crypto_pay.registry().handler_count("invoice_paid").await, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CryptoPay {
    token: ApiToken,
    webhook: Option<WebhookConfig>,
    dispatcher: UpdateDispatcher,
}

impl CryptoPay {
    /// Create a client.
    ///
    /// Validates the token and any webhook configuration up front; no
    /// socket is opened here.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for a blank token and any error from
    /// [`WebhookConfig::validate`].
    pub fn new(token: impl Into<ApiToken>, options: CryptoPayOptions) -> Result<Self, ConfigError> {
        let token = token.into();
        if token.is_blank() {
            return Err(ConfigError::Missing {
                key: "token".to_string(),
            });
        }

        if let Some(webhook) = &options.webhook {
            webhook.validate()?;
        }

        let dispatcher = UpdateDispatcher::new(
            options.recognized_update_types,
            SubscriptionRegistry::new(),
        );

        Ok(Self {
            token,
            webhook: options.webhook,
            dispatcher,
        })
    }

    /// API token.
    pub fn token(&self) -> &ApiToken {
        &self.token
    }

    /// Webhook configuration, if the endpoint is enabled.
    pub fn webhook_config(&self) -> Option<&WebhookConfig> {
        self.webhook.as_ref()
    }

    /// Subscription registry updates are emitted to.
    pub fn registry(&self) -> &SubscriptionRegistry {
        self.dispatcher.registry()
    }

    /// Subscribe to every delivery of an update type.
    pub async fn on(
        &self,
        update_type: impl Into<UpdateType>,
        handler: impl UpdateHandler + 'static,
    ) -> SubscriptionHandle {
        self.registry().subscribe(update_type, handler).await
    }

    /// Subscribe to the next delivery of an update type only.
    pub async fn once(
        &self,
        update_type: impl Into<UpdateType>,
        handler: impl UpdateHandler + 'static,
    ) -> SubscriptionHandle {
        self.registry().once(update_type, handler).await
    }

    /// Remove a subscription.
    pub async fn off(&self, handle: &SubscriptionHandle) -> bool {
        self.registry().unsubscribe(handle).await
    }

    /// Subscribe to paid invoices.
    pub async fn invoice_paid(&self, handler: impl UpdateHandler + 'static) -> SubscriptionHandle {
        self.on(UpdateType::invoice_paid(), handler).await
    }

    /// Dispatch an already verified and parsed update.
    ///
    /// Useful when the application receives deliveries through its own
    /// transport and only wants dispatching.
    pub async fn handle_update(&self, update: ParsedUpdate) -> Result<DispatchOutcome, DispatchError> {
        self.dispatcher.handle(update).await
    }

    /// Build the request pipeline for the configured endpoint.
    pub fn webhook_receiver(&self) -> Result<WebhookReceiver, ConfigError> {
        let config = self.require_webhook()?;
        Ok(WebhookReceiver::new(config, &self.token, self.dispatcher.clone()))
    }

    /// Build the axum front end for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing { key: "webhook" }` if no webhook
    /// configuration was given.
    pub fn webhook_server(&self) -> Result<WebhookServer, ConfigError> {
        let config = self.require_webhook()?;
        Ok(WebhookServer::new(config, self.webhook_receiver()?))
    }

    /// Bind the configured endpoint and serve until `shutdown` completes.
    ///
    /// The registry is left open; call [`shutdown`](Self::shutdown) to tear
    /// it down.
    pub async fn listen<F>(&self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let config = self.require_webhook()?;
        let server = WebhookServer::bind(config, self.webhook_receiver()?).await?;
        server.serve(shutdown).await
    }

    /// Close the registry, dropping every subscription.
    ///
    /// Deliveries arriving afterwards are answered with `503`.
    pub async fn shutdown(&self) {
        self.registry().close().await;
    }

    fn require_webhook(&self) -> Result<&WebhookConfig, ConfigError> {
        self.webhook.as_ref().ok_or_else(|| ConfigError::Missing {
            key: "webhook".to_string(),
        })
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
