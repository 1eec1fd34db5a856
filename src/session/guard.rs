//! Scoped release of session resources.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::Result;

use super::Session;

type ReleaseFn = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Holds a release action that runs at most once.
///
/// [`ReleaseGuard::release`] consumes the guard, so a second call does not
/// compile. A guard dropped without being released hands the action to the
/// current tokio runtime as a best effort; it is lost if that runtime is shut
/// down first. [`with_session`] always releases explicitly.
#[must_use = "dropping a ReleaseGuard without awaiting `release` defers cleanup"]
pub struct ReleaseGuard {
    release: Option<ReleaseFn>,
}

impl ReleaseGuard {
    pub fn new<F, Fut>(release: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            release: Some(Box::new(move || release().boxed())),
        }
    }

    /// A guard with nothing to release.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Run the release action.
    pub async fn release(mut self) {
        if let Some(release) = self.release.take() {
            debug!("Releasing session resources");
            release().await;
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        let Some(release) = self.release.take() else {
            return;
        };
        warn!("Session resources were not released explicitly; releasing in background");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(release());
            }
            Err(_) => warn!("No async runtime available; session resources leaked"),
        }
    }
}

/// Acquire a session, run `body` with it, then release it.
///
/// The release action runs exactly once whether `body` returns `Ok`, returns
/// `Err` or panics; a panic is resumed after the release completes. If `init`
/// fails there is no session and nothing is released.
pub async fn with_session<Init, Body, Fut, T>(init: Init, body: Body) -> Result<T>
where
    Init: Future<Output = Result<Session>>,
    Body: FnOnce(Session) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut session = init.await?;
    let guard = session.take_release();

    let outcome = AssertUnwindSafe(body(session)).catch_unwind().await;
    guard.release().await;
    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
