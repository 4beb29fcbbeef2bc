//! The host side of the provider contract.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ProviderError, Result};

/// Out-of-band authentication session mediated by the host.
///
/// The host exposes a callback URL, sends the user to the vendor's
/// authorization page and resolves once the vendor redirected back.
#[async_trait]
pub trait AuthenticationHelper: Send + Sync {
    /// URL the vendor should redirect to after authorization.
    fn callback_url(&self) -> &str;

    /// Send the user to `auth_url` and wait for the callback query values.
    async fn authenticate(&self, auth_url: &str) -> Result<HashMap<String, String>>;
}

/// Services the host hands to providers.
#[async_trait]
pub trait Host: Send + Sync {
    /// Shared HTTP client.
    fn http_client(&self) -> &Client;

    /// Number of configured instances for a provider domain.
    fn instance_count(&self, domain: &str) -> usize {
        let _ = domain;
        1
    }

    /// Run a detached background task.
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }

    /// Open an authentication session for a setup form session.
    async fn auth_session(&self, session_id: &str) -> Result<Arc<dyn AuthenticationHelper>> {
        Err(ProviderError::NotImplemented(format!(
            "authentication sessions are not available (session {})",
            session_id
        )))
    }
}

/// Minimal host used by the CLI and tests.
#[derive(Clone)]
pub struct StandaloneHost {
    client: Client,
    instances: HashMap<String, usize>,
    auth_helper: Option<Arc<dyn AuthenticationHelper>>,
}

impl StandaloneHost {
    /// Create a host with a default HTTP client.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("musicbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Api(format!("Failed to create client: {}", e)))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            instances: HashMap::new(),
            auth_helper: None,
        }
    }

    /// Register how many instances of `domain` exist.
    pub fn with_instances<S: Into<String>>(mut self, domain: S, count: usize) -> Self {
        self.instances.insert(domain.into(), count);
        self
    }

    pub fn with_auth_helper(mut self, helper: Arc<dyn AuthenticationHelper>) -> Self {
        self.auth_helper = Some(helper);
        self
    }
}

impl std::fmt::Debug for StandaloneHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandaloneHost")
            .field("instances", &self.instances)
            .field("auth_helper", &self.auth_helper.is_some())
            .finish()
    }
}

#[async_trait]
impl Host for StandaloneHost {
    fn http_client(&self) -> &Client {
        &self.client
    }

    fn instance_count(&self, domain: &str) -> usize {
        self.instances.get(domain).copied().unwrap_or(1)
    }

    async fn auth_session(&self, session_id: &str) -> Result<Arc<dyn AuthenticationHelper>> {
        self.auth_helper.clone().ok_or_else(|| {
            ProviderError::NotImplemented(format!(
                "no authentication helper configured (session {})",
                session_id
            ))
        })
    }
}
