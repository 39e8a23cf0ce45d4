//! Ordered provider fallback
//!
//! A [`ProviderChain`] invokes its providers strictly one after another. The
//! first success wins and later providers are never called; failures and
//! timeouts are recorded and the next provider is tried. Provider errors never
//! escape the chain: total failure is reported as
//! [`ResolveError::AllProvidersExhausted`].

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderOutcome, ResolveError};

/// One upstream service producing `Out` from `In`
///
/// Implementations must turn every failure, including payloads that parse but
/// lack required fields, into a `ProviderError`. The `cancel` token is
/// cancelled when the call exceeds its timeout; a provider that selects on it
/// gets one more poll to release its resources before it is dropped.
#[async_trait]
pub trait Provider<In: ?Sized + Sync, Out>: Send + Sync {
    /// Returns the short name used in logs and failure reasons
    fn name(&self) -> &str;

    /// Returns the timeout for this provider, overriding the chain default
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn call(&self, input: &In, cancel: &CancellationToken) -> ProviderOutcome<Out>;
}

/// Ordered list of providers for one kind of lookup
pub struct ProviderChain<In: ?Sized + Sync, Out> {
    label: &'static str,
    default_timeout: Duration,
    providers: Vec<Box<dyn Provider<In, Out>>>,
}

impl<In: ?Sized + Sync, Out> ProviderChain<In, Out> {
    /// Creates an empty chain
    ///
    /// # Arguments
    /// * `label` - Lookup kind used in log lines, e.g. "ip-location"
    /// * `default_timeout` - Per-provider timeout unless the provider sets one
    pub fn new(label: &'static str, default_timeout: Duration) -> Self {
        Self {
            label,
            default_timeout,
            providers: Vec::new(),
        }
    }

    /// Appends a provider; it is tried after all previously added ones
    pub fn with_provider<P>(mut self, provider: P) -> Self
    where
        P: Provider<In, Out> + 'static,
    {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn set_default_timeout(&mut self, timeout: Duration) {
        self.default_timeout = timeout;
    }

    pub fn push(&mut self, provider: Box<dyn Provider<In, Out>>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Returns the provider names in the order they will be tried
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Runs the providers in order until one succeeds
    ///
    /// # Returns
    /// * `Ok(Out)` - The first successful provider's result
    /// * `Err(ResolveError::AllProvidersExhausted)` - One reason per provider,
    ///   in the order they were tried
    pub async fn resolve(&self, input: &In) -> Result<Out, ResolveError> {
        let mut reasons = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let limit = provider.timeout().unwrap_or(self.default_timeout);
            debug!(chain = self.label, provider = provider.name(), "trying provider");

            match call_with_timeout(provider.as_ref(), input, limit).await {
                Ok(value) => {
                    info!(chain = self.label, provider = provider.name(), "provider succeeded");
                    return Ok(value);
                }
                Err(err) => {
                    warn!(chain = self.label, provider = provider.name(), error = %err, "provider failed");
                    reasons.push(format!("{}: {}", provider.name(), err));
                }
            }
        }

        warn!(chain = self.label, "all providers failed");
        Err(ResolveError::AllProvidersExhausted(reasons))
    }
}

/// Calls one provider with its own cancellation token and timer
///
/// When `limit` elapses the token is cancelled and the provider is polled once
/// more so it can observe the cancellation and abandon its request. The call
/// then resolves to [`ProviderError::Timeout`] whatever that last poll yields,
/// and a provider that ignores the token is simply dropped.
async fn call_with_timeout<In: ?Sized + Sync, Out>(
    provider: &dyn Provider<In, Out>,
    input: &In,
    limit: Duration,
) -> ProviderOutcome<Out> {
    let cancel = CancellationToken::new();
    let mut call = provider.call(input, &cancel);

    if let Ok(outcome) = tokio::time::timeout(limit, &mut call).await {
        return outcome;
    }

    cancel.cancel();
    // A zero timeout still polls the inner future before checking the deadline
    let _ = tokio::time::timeout(Duration::ZERO, &mut call).await;
    Err(ProviderError::Timeout)
}
