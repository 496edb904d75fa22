//! Single-flight coordination of access token refreshes.
//!
//! Callers that see an expired access token at the same time converge on one
//! refresh request. The slot is per coordinator; separate clients (or
//! processes) refresh independently.

use std::future::Future;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use super::error::RefreshError;

/// New access token, or the reason the refresh failed.
pub type RefreshOutcome = Result<String, RefreshError>;

type InFlight = Shared<BoxFuture<'static, RefreshOutcome>>;

/// A started or joined refresh.
pub struct RefreshHandle {
    future: InFlight,
    started: bool,
}

impl RefreshHandle {
    /// True for the caller whose `start` closure launched the refresh.
    pub fn started(&self) -> bool {
        self.started
    }

    pub async fn wait(&self) -> RefreshOutcome {
        self.future.clone().await
    }
}

#[derive(Default)]
pub struct RefreshCoordinator {
    in_flight: Mutex<Option<InFlight>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the refresh in flight, or launch one with `start`.
    pub fn acquire_or_join<F, Fut>(&self, start: F) -> RefreshHandle
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome> + Send + 'static,
    {
        let mut slot = self.in_flight.lock();
        if let Some(future) = slot.as_ref() {
            return RefreshHandle {
                future: future.clone(),
                started: false,
            };
        }

        let future = start().boxed().shared();
        *slot = Some(future.clone());
        RefreshHandle {
            future,
            started: true,
        }
    }

    /// Clear the slot if it still holds `handle`'s refresh.
    pub fn release(&self, handle: &RefreshHandle) {
        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|current| current.ptr_eq(&handle.future)) {
            *slot = None;
        }
    }

    /// Acquire or join, wait for the outcome, then release.
    pub async fn run<F, Fut>(&self, start: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome> + Send + 'static,
    {
        let handle = self.acquire_or_join(start);
        if handle.started() {
            tracing::debug!("starting access token refresh");
        } else {
            tracing::debug!("joining in-flight access token refresh");
        }
        let outcome = handle.wait().await;
        self.release(&handle);
        outcome
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.lock().is_some()
    }
}
