//! Cooperative cancellation.

use parking_lot::Mutex;
use std::{
    fmt,
    sync::{Arc, Weak},
    time::Duration,
};

type Observer = Box<dyn FnOnce() + Send>;

/// Handle used to request early termination of pending lookups.
///
/// Clones share the same state: cancelling one cancels them all. Cancellation
/// only stops result delivery; it cannot interrupt a blocking resolver call
/// that is already running on a worker.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Mutex<TokenState>>,
}

#[derive(Default)]
struct TokenState {
    cancelled: bool,
    next_id: u64,
    observers: Vec<(ObserverId, Observer)>,
}

/// Identifies an observer registered with [`CancelToken::on_cancel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that cancels itself once `timeout` has elapsed.
    ///
    /// The timer does not keep the token alive.
    pub fn with_timeout(timeout: Duration) -> Self {
        let token = Self::new();
        let weak = Arc::downgrade(&token.inner);
        let spawned = std::thread::Builder::new()
            .name("resolv-cancel-timer".into())
            .spawn(move || {
                std::thread::sleep(timeout);
                if let Some(inner) = Weak::upgrade(&weak) {
                    CancelToken { inner }.cancel();
                }
            });
        if let Err(_e) = spawned {
            #[cfg(feature = "log")]
            tracing::warn!(error = %_e, "unable to spawn cancellation timer, cancelling now");
            token.cancel();
        }
        token
    }

    /// Cancels the token, running every registered observer once.
    ///
    /// Returns `false` if the token was already cancelled.
    pub fn cancel(&self) -> bool {
        let observers = {
            let mut state = self.inner.lock();
            if state.cancelled {
                return false;
            }
            state.cancelled = true;
            std::mem::take(&mut state.observers)
        };
        for (_, observer) in observers {
            observer();
        }
        true
    }

    /// Returns `true` once the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().cancelled
    }

    /// Registers `observer` to run when the token is cancelled.
    ///
    /// If the token is already cancelled the observer runs immediately, on the
    /// calling thread, and `None` is returned.
    pub fn on_cancel(&self, observer: impl FnOnce() + Send + 'static) -> Option<ObserverId> {
        let mut state = self.inner.lock();
        if state.cancelled {
            drop(state);
            observer();
            return None;
        }
        let id = ObserverId(state.next_id);
        state.next_id += 1;
        state.observers.push((id, Box::new(observer)));
        Some(id)
    }

    /// Detaches an observer so it never runs. Returns `false` if it already ran
    /// or was already detached.
    pub fn remove(&self, id: ObserverId) -> bool {
        let removed = {
            let mut state = self.inner.lock();
            let idx = state.observers.iter().position(|(other, _)| *other == id);
            idx.map(|idx| state.observers.swap_remove(idx))
        };
        // The observer is dropped outside the lock: it may own the last
        // reference to a request
        removed.is_some()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("CancelToken")
            .field("cancelled", &state.cancelled)
            .field("observers", &state.observers.len())
            .finish()
    }
}
