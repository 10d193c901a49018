//! Saliency inference abstraction and session memoization
//!
//! The model is opaque: a `SaliencyBackend` turns a `[1, 3, S, S]` tensor into a
//! `[1, 1, H, W]` saliency tensor. Creating a backend is expensive, so a
//! `SessionProvider` loads it once and hands the same session to every caller,
//! including callers that arrive while the first load is still in flight.

use crate::error::{BgRemovalError, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use ndarray::Array4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A loaded saliency model ready for inference
#[async_trait]
pub trait SaliencyBackend: Send + Sync {
    /// Backend name for logs and metadata
    fn name(&self) -> &str;

    /// Square input resolution the model expects
    fn input_size(&self) -> u32;

    /// Run the model on an NCHW input tensor
    ///
    /// # Errors
    /// - Model inference failures
    /// - Malformed output tensor
    async fn infer(&self, input: Array4<f32>) -> Result<Array4<f32>>;
}

/// Creates inference sessions; called at most once per successful load
#[async_trait]
pub trait SessionLoader: Send + Sync {
    /// Load and compile the model
    ///
    /// # Errors
    /// - `ModelLoad` if the artifact is unreachable or incompatible
    async fn load(&self) -> Result<Arc<dyn SaliencyBackend>>;
}

type SharedLoad = Shared<BoxFuture<'static, std::result::Result<Arc<dyn SaliencyBackend>, String>>>;

enum SessionState {
    Uninitialized,
    Initializing(SharedLoad),
    Ready(Arc<dyn SaliencyBackend>),
    Failed(String),
}

/// Observable session state tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// Memoizing provider of the inference session
///
/// Owned by whoever runs the pipeline and passed in explicitly, so there is no
/// process-global session.
pub struct SessionProvider {
    loader: Arc<dyn SessionLoader>,
    state: Mutex<SessionState>,
    retry_after_failure: bool,
    load_attempts: AtomicUsize,
}

impl SessionProvider {
    /// Create a provider; nothing is loaded until the first `session()` call
    #[must_use]
    pub fn new(loader: Arc<dyn SessionLoader>, retry_after_failure: bool) -> Self {
        Self {
            loader,
            state: Mutex::new(SessionState::Uninitialized),
            retry_after_failure,
            load_attempts: AtomicUsize::new(0),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state tag
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        match &*self.lock_state() {
            SessionState::Uninitialized => SessionStatus::Uninitialized,
            SessionState::Initializing(_) => SessionStatus::Initializing,
            SessionState::Ready(_) => SessionStatus::Ready,
            SessionState::Failed(_) => SessionStatus::Failed,
        }
    }

    /// Number of times the loader has been invoked
    #[must_use]
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }

    /// Return the session, starting or joining the load if needed
    ///
    /// # Errors
    /// - `ModelLoad` if the (shared) load fails, or if a previous load failed
    ///   and retries are disabled
    pub async fn session(&self) -> Result<Arc<dyn SaliencyBackend>> {
        let pending = {
            let mut state = self.lock_state();
            match &*state {
                SessionState::Ready(session) => return Ok(Arc::clone(session)),
                SessionState::Failed(msg) if !self.retry_after_failure => {
                    return Err(BgRemovalError::model_load(msg.clone()));
                },
                SessionState::Initializing(load) => load.clone(),
                SessionState::Uninitialized | SessionState::Failed(_) => {
                    let attempt = self.load_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::info!(attempt, "Creating saliency inference session");
                    let loader = Arc::clone(&self.loader);
                    let load = async move {
                        loader.load().await.map_err(|e| match e {
                            BgRemovalError::ModelLoad(msg) => msg,
                            other => other.to_string(),
                        })
                    }
                    .boxed()
                    .shared();
                    *state = SessionState::Initializing(load.clone());
                    load
                },
            }
        };

        let outcome = pending.clone().await;

        // Only waiters of the current load settle the state
        let mut state = self.lock_state();
        let current = matches!(&*state, SessionState::Initializing(load) if load.ptr_eq(&pending));
        match outcome {
            Ok(session) => {
                if current {
                    tracing::info!(backend = session.name(), "Saliency session ready");
                    *state = SessionState::Ready(Arc::clone(&session));
                }
                Ok(session)
            },
            Err(msg) => {
                if current {
                    tracing::warn!(error = %msg, "Saliency session creation failed");
                    *state = SessionState::Failed(msg.clone());
                }
                Err(BgRemovalError::model_load(msg))
            },
        }
    }
}

/// Readiness check for the inference runtime
pub trait RuntimeProbe: Send + Sync {
    fn is_ready(&self) -> bool;
}

impl<F> RuntimeProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_ready(&self) -> bool {
        self()
    }
}

/// Probe for runtimes linked into the binary
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkedRuntime;

impl RuntimeProbe for LinkedRuntime {
    fn is_ready(&self) -> bool {
        true
    }
}

/// Poll `probe` until it reports ready, failing after `timeout`
///
/// # Errors
/// - `RuntimeUnavailable` when the bound is exceeded
pub async fn wait_for_runtime(
    probe: &dyn RuntimeProbe,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let started = tokio::time::Instant::now();
    loop {
        if probe.is_ready() {
            return Ok(());
        }
        if started.elapsed() > timeout {
            return Err(BgRemovalError::runtime_unavailable(format!(
                "inference runtime not ready after {}ms",
                timeout.as_millis()
            )));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockBackend;
    use std::sync::atomic::AtomicBool;

    struct CountingLoader {
        calls: AtomicUsize,
        fail_first: AtomicBool,
        delay: Duration,
    }

    impl CountingLoader {
        fn new(fail_first: bool, delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first: AtomicBool::new(fail_first),
                delay,
            }
        }
    }

    #[async_trait]
    impl SessionLoader for CountingLoader {
        async fn load(&self) -> Result<Arc<dyn SaliencyBackend>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail_first.swap(false, Ordering::SeqCst) {
                return Err(BgRemovalError::model_load("artifact unreachable"));
            }
            Ok(Arc::new(MockBackend::new(320)))
        }
    }

    #[tokio::test]
    async fn test_session_is_memoized() {
        let loader = Arc::new(CountingLoader::new(false, Duration::ZERO));
        let provider = SessionProvider::new(loader.clone(), true);
        assert_eq!(provider.status(), SessionStatus::Uninitialized);

        let first = provider.session().await.unwrap();
        let second = provider.session().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.status(), SessionStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_first_calls_share_one_load() {
        let loader = Arc::new(CountingLoader::new(false, Duration::from_millis(50)));
        let provider = SessionProvider::new(loader.clone(), true);

        let (a, b) = tokio::join!(provider.session(), provider.session());

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.load_attempts(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried_when_enabled() {
        let loader = Arc::new(CountingLoader::new(true, Duration::ZERO));
        let provider = SessionProvider::new(loader.clone(), true);

        let err = provider.session().await.err().unwrap();
        assert!(matches!(err, BgRemovalError::ModelLoad(ref msg) if msg == "artifact unreachable"));
        assert_eq!(provider.status(), SessionStatus::Failed);

        assert!(provider.session().await.is_ok());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_waiter_on_failed_load_keeps_retry_state() {
        let loader = Arc::new(CountingLoader::new(true, Duration::from_millis(50)));
        let provider = SessionProvider::new(loader.clone(), true);

        let retry_after_failure = async {
            while provider.status() != SessionStatus::Failed {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            provider.session().await
        };
        let (a, c, b) = futures::future::join3(
            provider.session(),
            retry_after_failure,
            provider.session(),
        )
        .await;

        assert!(a.is_err());
        assert!(b.is_err());
        assert!(c.is_ok());
        assert_eq!(provider.status(), SessionStatus::Ready);

        assert!(provider.session().await.is_ok());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
        assert_eq!(provider.load_attempts(), 2);
    }

    #[tokio::test]
    async fn test_failed_load_is_sticky_when_retry_disabled() {
        let loader = Arc::new(CountingLoader::new(true, Duration::ZERO));
        let provider = SessionProvider::new(loader.clone(), false);

        assert!(provider.session().await.is_err());
        let err = provider.session().await.err().unwrap();
        assert!(matches!(err, BgRemovalError::ModelLoad(_)));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_runtime_times_out() {
        let err = wait_for_runtime(
            &|| false,
            Duration::from_secs(15),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BgRemovalError::RuntimeUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_runtime_succeeds_once_ready() {
        let ready_at = tokio::time::Instant::now() + Duration::from_millis(350);
        let probe = move || tokio::time::Instant::now() >= ready_at;
        wait_for_runtime(&probe, Duration::from_secs(15), Duration::from_millis(100))
            .await
            .unwrap();
        assert!(LinkedRuntime.is_ready());
    }
}
