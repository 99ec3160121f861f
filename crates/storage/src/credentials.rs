//! Credential lifecycle for the S3 backend.
//!
//! A [`CredentialProvider`] owns the current credentials behind a
//! shared/exclusive lock. Data operations hold a read guard for the duration of
//! each object-store round trip, so a refresh waits for in-flight requests and
//! new requests wait for the refresh. A background task sleeps until the
//! credentials expire, then refreshes them, retrying on a fixed backoff until a
//! fetch succeeds.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_credential_types::Credentials;
use aws_credential_types::provider::ProvideCredentials;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{OnceCell, RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delay between failed refresh attempts.
pub const REFRESH_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Where credentials come from.
#[async_trait]
pub trait CredentialSource: Send + Sync + 'static {
    /// Fetch a fresh set of credentials.
    async fn fetch(&self) -> StorageResult<Credentials>;
}

/// Static keys from configuration. They never expire.
#[derive(Debug)]
pub struct StaticSource {
    credentials: Credentials,
}

impl StaticSource {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::new(
                access_key.into(),
                secret_key.into(),
                None,
                None,
                "stowage-config",
            ),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticSource {
    async fn fetch(&self) -> StorageResult<Credentials> {
        Ok(self.credentials.clone())
    }
}

/// The ambient AWS credential chain (environment, profile, instance role).
///
/// The chain is built on first fetch so constructing the source has no side
/// effects.
#[derive(Debug)]
pub struct DefaultChainSource {
    region: String,
    chain: OnceCell<DefaultCredentialsChain>,
}

impl DefaultChainSource {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            chain: OnceCell::new(),
        }
    }
}

#[async_trait]
impl CredentialSource for DefaultChainSource {
    async fn fetch(&self) -> StorageResult<Credentials> {
        let chain = self
            .chain
            .get_or_init(|| async {
                DefaultCredentialsChain::builder()
                    .region(aws_config::Region::new(self.region.clone()))
                    .build()
                    .await
            })
            .await;
        chain
            .provide_credentials()
            .await
            .map_err(|e| StorageError::Credentials(format!("default AWS credential chain: {e}")))
    }
}

/// Lock-guarded credential state with refresh support.
pub struct CredentialProvider {
    source: Arc<dyn CredentialSource>,
    state: RwLock<Credentials>,
    retry_backoff: Duration,
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("retry_backoff", &self.retry_backoff)
            .finish_non_exhaustive()
    }
}

impl CredentialProvider {
    /// Fetch the initial credentials. Failing here fails backend construction.
    pub async fn new(source: Arc<dyn CredentialSource>) -> StorageResult<Self> {
        let initial = source.fetch().await?;
        Ok(Self {
            source,
            state: RwLock::new(initial),
            retry_backoff: REFRESH_RETRY_BACKOFF,
        })
    }

    /// Override the delay between failed refresh attempts.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Shared access to the current credentials.
    ///
    /// Hold the guard for the whole request so a refresh cannot swap the
    /// credentials underneath it.
    pub async fn current(&self) -> RwLockReadGuard<'_, Credentials> {
        self.state.read().await
    }

    /// When the current credentials expire. `None` means never.
    pub async fn expiry(&self) -> Option<SystemTime> {
        self.state.read().await.expiry()
    }

    /// Fetch and install new credentials.
    ///
    /// The exclusive lock is held only while the fetch runs. On failure the
    /// previous credentials stay in place.
    pub async fn refresh(&self) -> StorageResult<()> {
        let mut state = self.state.write().await;
        let fresh = self.source.fetch().await?;
        *state = fresh;
        Ok(())
    }

    /// Refresh until a fetch succeeds.
    async fn refresh_until_success(&self) {
        loop {
            match self.refresh().await {
                Ok(()) => {
                    info!("refreshed S3 credentials");
                    return;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_secs = self.retry_backoff.as_secs_f64(),
                        "failed to refresh S3 credentials"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
            }
        }
    }

    /// Spawn the background refresh task.
    ///
    /// The task holds only a weak reference and exits once the provider is
    /// dropped or the installed credentials never expire. Credentials that are
    /// already expired when installed are refreshed after `retry_backoff`.
    pub fn spawn_refresh_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let provider = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let wait = {
                    let Some(provider) = provider.upgrade() else {
                        return;
                    };
                    let Some(expiry) = provider.expiry().await else {
                        debug!("S3 credentials never expire, refresh loop exiting");
                        return;
                    };
                    match expiry.duration_since(SystemTime::now()) {
                        Ok(remaining) if !remaining.is_zero() => remaining,
                        _ => {
                            warn!(
                                retry_in_secs = provider.retry_backoff.as_secs_f64(),
                                "S3 credentials already expired, delaying refresh"
                            );
                            provider.retry_backoff
                        }
                    }
                };

                tokio::time::sleep(wait).await;

                let Some(provider) = provider.upgrade() else {
                    return;
                };
                provider.refresh_until_success().await;
            }
        })
    }
}
