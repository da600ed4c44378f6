use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use dcp_core::{CoreError, CoreResult};

/// The external auth collaborator a reconnect cycle consults before retrying
/// (spec §4.5: "reauthenticates via the external auth collaborator before
/// retrying"). A no-op implementation is provided for transports (like
/// [`crate::loader`]'s in-process tests) that need no credential refresh.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn reauthenticate(&self) -> CoreResult<()>;
}

pub struct NoopAuthenticator;

#[async_trait]
impl Authenticator for NoopAuthenticator {
    async fn reauthenticate(&self) -> CoreResult<()> {
        Ok(())
    }
}

/// Wraps every transport call: on [`CoreError::TransportFailed`], sleep
/// `reconnect_interval`, reauthenticate, and retry indefinitely. Any other
/// error surfaces immediately as `DELEGATION_FAILED` is the caller's
/// business, not this adapter's (spec §4.5: "Non-connection errors surface
/// as `DELEGATION_FAILED`" — that mapping happens at the call site since
/// this adapter only ever sees the error kind, not the call's meaning).
pub struct ReconnectAdapter {
    authenticator: Arc<dyn Authenticator>,
    reconnect_interval: Duration,
}

impl ReconnectAdapter {
    pub fn new(authenticator: Arc<dyn Authenticator>, reconnect_interval: Duration) -> Self {
        Self {
            authenticator,
            reconnect_interval,
        }
    }

    pub async fn call<T, F, Fut>(&self, mut make_call: F) -> CoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CoreResult<T>>,
    {
        loop {
            match make_call().await {
                Err(CoreError::TransportFailed { .. }) => {
                    tokio::time::sleep(self.reconnect_interval).await;
                    let _ = self.authenticator.reauthenticate().await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn retries_on_transport_failure_until_success() {
        let adapter = ReconnectAdapter::new(Arc::new(NoopAuthenticator), Duration::from_millis(1));
        let attempts = AtomicUsize::new(0);

        let result = adapter
            .call(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(CoreError::TransportFailed { message: "disconnected".into() })
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transport_errors_surface_immediately() {
        let adapter = ReconnectAdapter::new(Arc::new(NoopAuthenticator), Duration::from_millis(1));
        let attempts = AtomicUsize::new(0);

        let result: CoreResult<()> = adapter
            .call(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(CoreError::DelegationFailed { message: "boom".into() }) }
            })
            .await;

        assert!(matches!(result, Err(CoreError::DelegationFailed { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
