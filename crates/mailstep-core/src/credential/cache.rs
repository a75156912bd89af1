//! Credential cache with single-flight refresh.
//!
//! Holds at most one bearer token. A refresh happens lazily when the cached
//! token is missing or within `refresh_margin` of its expiry. While a
//! refresh is in flight every caller awaits the same shared exchange, so a
//! burst of executions never produces more than one token request.
//!
//! The exchange future writes its own result back into the cache. If every
//! waiting caller is cancelled the next caller picks the same flight up
//! again instead of starting a second one.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

use mailstep_types::credential::AccessToken;
use mailstep_types::error::CredentialExchangeError;

use super::exchanger::TokenExchanger;

type TokenResult = Result<Arc<AccessToken>, CredentialExchangeError>;
type TokenFlight = Shared<BoxFuture<'static, TokenResult>>;

enum CacheState {
    Empty,
    Ready(Arc<AccessToken>),
    Refreshing { generation: u64, flight: TokenFlight },
}

struct CacheInner {
    state: CacheState,
    generation: u64,
}

/// Summary of the current token, safe to report outside the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub token_type: String,
    pub expires_in: Duration,
}

/// Owns the OAuth token for one credential set.
pub struct CredentialCache<E> {
    exchanger: Arc<E>,
    refresh_margin: Duration,
    inner: Arc<Mutex<CacheInner>>,
}

impl<E> CredentialCache<E>
where
    E: TokenExchanger + 'static,
{
    pub fn new(exchanger: E, refresh_margin: Duration) -> Self {
        Self {
            exchanger: Arc::new(exchanger),
            refresh_margin,
            inner: Arc::new(Mutex::new(CacheInner {
                state: CacheState::Empty,
                generation: 0,
            })),
        }
    }

    /// Return a token with more than `refresh_margin` of lifetime left,
    /// exchanging credentials first if necessary.
    pub async fn get_token(&self) -> TokenResult {
        let flight = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            match &inner.state {
                CacheState::Ready(token) if token.is_fresh(Instant::now(), self.refresh_margin) => {
                    return Ok(Arc::clone(token));
                }
                CacheState::Refreshing { flight, .. } => flight.clone(),
                _ => self.start_refresh(&mut inner),
            }
        };

        flight.await
    }

    /// Drop the cached token so the next caller exchanges again.
    ///
    /// An exchange already in flight is left alone.
    pub fn invalidate(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(inner.state, CacheState::Ready(_)) {
            tracing::debug!("cached mail API token invalidated");
            inner.state = CacheState::Empty;
        }
    }

    /// Obtain a token and describe it without exposing its value.
    pub async fn status(&self) -> Result<CredentialStatus, CredentialExchangeError> {
        let token = self.get_token().await?;
        Ok(CredentialStatus {
            token_type: token.token_type().to_string(),
            expires_in: token.remaining(Instant::now()),
        })
    }

    fn start_refresh(&self, inner: &mut CacheInner) -> TokenFlight {
        inner.generation += 1;
        let generation = inner.generation;
        let exchanger = Arc::clone(&self.exchanger);
        let cell = Arc::clone(&self.inner);
        let margin = self.refresh_margin;

        let flight = async move {
            // Expiry is counted from before the request so it never outlives
            // the provider's own clock.
            let requested_at = Instant::now();
            let result = match exchanger.exchange().await {
                Ok(grant) if grant.expires_in <= margin => {
                    Err(CredentialExchangeError::LifetimeTooShort {
                        expires_in_secs: grant.expires_in.as_secs(),
                    })
                }
                Ok(grant) => Ok(Arc::new(AccessToken::new(
                    grant.access_token,
                    grant.token_type,
                    requested_at + grant.expires_in,
                ))),
                Err(err) => Err(err),
            };

            let mut inner = cell.lock().unwrap_or_else(PoisonError::into_inner);
            let current = matches!(
                inner.state,
                CacheState::Refreshing { generation: g, .. } if g == generation
            );
            if current {
                inner.state = match &result {
                    Ok(token) => CacheState::Ready(Arc::clone(token)),
                    Err(_) => CacheState::Empty,
                };
            }

            match &result {
                Ok(token) => tracing::info!(
                    expires_in_secs = token.remaining(Instant::now()).as_secs(),
                    "mail API token refreshed"
                ),
                Err(err) => tracing::warn!(error = %err, "mail API token exchange failed"),
            }

            result
        }
        .boxed()
        .shared();

        inner.state = CacheState::Refreshing {
            generation,
            flight: flight.clone(),
        };
        flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::exchanger::TokenGrant;
    use secrecy::{ExposeSecret, SecretString};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Exchanger that hands out numbered tokens, optionally failing first.
    struct MockExchanger {
        calls: Arc<AtomicUsize>,
        expires_in: Duration,
        delay: Duration,
        fail_first: usize,
    }

    impl MockExchanger {
        fn new(calls: Arc<AtomicUsize>) -> Self {
            Self {
                calls,
                expires_in: Duration::from_secs(3_600),
                delay: Duration::from_millis(20),
                fail_first: 0,
            }
        }
    }

    impl TokenExchanger for MockExchanger {
        async fn exchange(&self) -> Result<TokenGrant, CredentialExchangeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if n <= self.fail_first {
                return Err(CredentialExchangeError::Rejected { status: 401 });
            }
            Ok(TokenGrant {
                access_token: SecretString::from(format!("token-{n}")),
                token_type: "Bearer".to_string(),
                expires_in: self.expires_in,
            })
        }
    }

    #[tokio::test]
    async fn test_first_call_exchanges_and_caches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = CredentialCache::new(MockExchanger::new(calls.clone()), Duration::from_secs(60));

        let first = cache.get_token().await.unwrap();
        let second = cache.get_token().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.value().expose_secret(), "token-1");
        assert_eq!(second.value().expose_secret(), "token-1");
        assert_eq!(first.token_type(), "Bearer");
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_exchange() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = CredentialCache::new(MockExchanger::new(calls.clone()), Duration::from_secs(60));

        let (a, b) = tokio::join!(cache.get_token(), cache.get_token());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap().value().expose_secret(), "token-1");
        assert_eq!(b.unwrap().value().expose_secret(), "token-1");
    }

    #[tokio::test]
    async fn test_many_concurrent_callers_share_one_exchange() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(CredentialCache::new(
            MockExchanger::new(calls.clone()),
            Duration::from_secs(60),
        ));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get_token().await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter_and_leaves_cache_empty() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut exchanger = MockExchanger::new(calls.clone());
        exchanger.fail_first = 1;
        let cache = CredentialCache::new(exchanger, Duration::from_secs(60));

        let (a, b) = tokio::join!(cache.get_token(), cache.get_token());
        assert_eq!(a.unwrap_err(), CredentialExchangeError::Rejected { status: 401 });
        assert_eq!(b.unwrap_err(), CredentialExchangeError::Rejected { status: 401 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Next call retries rather than serving the failure
        let token = cache.get_token().await.unwrap();
        assert_eq!(token.value().expose_secret(), "token-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_token_within_margin_is_refreshed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut exchanger = MockExchanger::new(calls.clone());
        exchanger.expires_in = Duration::from_millis(1_150);
        exchanger.delay = Duration::ZERO;
        let cache = CredentialCache::new(exchanger, Duration::from_secs(1));

        let first = cache.get_token().await.unwrap();
        assert_eq!(first.value().expose_secret(), "token-1");

        // Crosses into the refresh margin
        tokio::time::sleep(Duration::from_millis(200)).await;
        let second = cache.get_token().await.unwrap();
        assert_eq!(second.value().expose_secret(), "token-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_lifetime_not_exceeding_margin_is_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut exchanger = MockExchanger::new(calls.clone());
        exchanger.expires_in = Duration::from_secs(30);
        let cache = CredentialCache::new(exchanger, Duration::from_secs(60));

        let err = cache.get_token().await.unwrap_err();
        assert_eq!(err, CredentialExchangeError::LifetimeTooShort { expires_in_secs: 30 });
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_exchange() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = CredentialCache::new(MockExchanger::new(calls.clone()), Duration::from_secs(60));

        cache.get_token().await.unwrap();
        cache.invalidate();
        let token = cache.get_token().await.unwrap();

        assert_eq!(token.value().expose_secret(), "token-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_restart_exchange() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = CredentialCache::new(MockExchanger::new(calls.clone()), Duration::from_secs(60));

        // Give up on the first call before the exchange completes
        let abandoned = tokio::time::timeout(Duration::from_millis(1), cache.get_token()).await;
        assert!(abandoned.is_err());

        let token = cache.get_token().await.unwrap();
        assert_eq!(token.value().expose_secret(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_status_reports_without_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = CredentialCache::new(MockExchanger::new(calls), Duration::from_secs(60));

        let status = cache.status().await.unwrap();
        assert_eq!(status.token_type, "Bearer");
        assert!(status.expires_in <= Duration::from_secs(3_600));
        assert!(status.expires_in > Duration::from_secs(3_500));
    }
}
