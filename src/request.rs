//! Request lifecycle.
//!
//! A [`Request`] is shared between the backend worker that completes it, the
//! cancellation observer registered on the caller's [`CancelToken`] and the
//! [`Lookup`] handle held by the caller. Whichever of `complete` and `cancel`
//! takes the request lock first decides the outcome; every later attempt is a
//! no-op, so all consumers observe the same single outcome.

use crate::{
    cancel::{CancelToken, ObserverId},
    Error, Query, ResolvedAddress, TargetSet,
};
use futures_util::task::AtomicWaker;
use parking_lot::{Condvar, Mutex};
use std::{
    collections::VecDeque,
    fmt,
    future::Future,
    marker::PhantomData,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

/// Unit of work handed to a [`Dispatch`] implementation.
pub type Task = Box<dyn FnOnce() + Send>;

/// Callback registered with [`Request::subscribe`].
pub type Callback = Box<dyn FnOnce(Result<QueryOutcome, Error>) + Send>;

/// Context completion callbacks are delivered on.
pub trait Dispatch: Send + Sync {
    /// Runs `task` at some later point, never inline.
    fn dispatch(&self, task: Task);
}

/// Successful result of a [`Query`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Result of a name or address query.
    Address(ResolvedAddress),
    /// Result of a service query.
    Targets(TargetSet),
}

/// Conversion from the untyped outcome of a request into the result type of a
/// [`Lookup`].
pub trait FromOutcome: Sized {
    /// Extracts `Self` from `outcome`.
    fn from_outcome(outcome: QueryOutcome) -> Result<Self, Error>;
}

impl FromOutcome for ResolvedAddress {
    fn from_outcome(outcome: QueryOutcome) -> Result<Self, Error> {
        match outcome {
            QueryOutcome::Address(address) => Ok(address),
            QueryOutcome::Targets(_) => Err(Error::internal("expected an address, got targets")),
        }
    }
}

impl FromOutcome for TargetSet {
    fn from_outcome(outcome: QueryOutcome) -> Result<Self, Error> {
        match outcome {
            QueryOutcome::Targets(targets) => Ok(targets),
            QueryOutcome::Address(_) => Err(Error::internal("expected targets, got an address")),
        }
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A pending or completed resolution.
pub struct Request {
    id: u64,
    query: Query,
    state: Mutex<State>,
    completed: Condvar,
    waker: AtomicWaker,
    dispatcher: Arc<dyn Dispatch>,
}

struct State {
    outcome: Option<Result<QueryOutcome, Error>>,
    callbacks: VecDeque<Callback>,
    /// Set while a delivery task is queued or running.
    delivering: bool,
    observer: Option<(CancelToken, ObserverId)>,
}

impl Request {
    /// Creates a pending request. Callbacks are delivered through `dispatcher`.
    pub fn new(query: Query, dispatcher: Arc<dyn Dispatch>) -> Arc<Self> {
        Self::with_outcome(query, None, dispatcher)
    }

    /// Creates a request that is already completed with `outcome`.
    pub fn completed(
        query: Query,
        outcome: Result<QueryOutcome, Error>,
        dispatcher: Arc<dyn Dispatch>,
    ) -> Arc<Self> {
        Self::with_outcome(query, Some(outcome), dispatcher)
    }

    fn with_outcome(
        query: Query,
        outcome: Option<Result<QueryOutcome, Error>>,
        dispatcher: Arc<dyn Dispatch>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            query,
            state: Mutex::new(State {
                outcome,
                callbacks: VecDeque::new(),
                delivering: false,
                observer: None,
            }),
            completed: Condvar::new(),
            waker: AtomicWaker::new(),
            dispatcher,
        })
    }

    /// Gets the process-unique id of the request.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Gets the query being resolved.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Returns `true` once an outcome has been stored.
    pub fn is_completed(&self) -> bool {
        self.state.lock().outcome.is_some()
    }

    /// Stores `outcome` unless the request already completed.
    ///
    /// Returns `true` if this call decided the outcome. An error outcome is a
    /// normal delivery of a failed resolution.
    pub fn complete(self: &Arc<Self>, outcome: Result<QueryOutcome, Error>) -> bool {
        self.finish(outcome)
    }

    /// Completes the request with [`Error::Cancelled`] unless it already
    /// completed. Returns `true` if this call decided the outcome.
    pub fn cancel(self: &Arc<Self>) -> bool {
        let cancelled = self.finish(Err(Error::Cancelled));
        if cancelled {
            #[cfg(feature = "log")]
            tracing::debug!(request = self.id, query = %self.query, "request cancelled");
        }
        cancelled
    }

    fn finish(self: &Arc<Self>, outcome: Result<QueryOutcome, Error>) -> bool {
        let (observer, deliver) = {
            let mut state = self.state.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome);
            let deliver = !state.callbacks.is_empty() && !state.delivering;
            state.delivering |= deliver;
            (state.observer.take(), deliver)
        };

        self.completed.notify_all();
        self.waker.wake();
        if let Some((token, id)) = observer {
            token.remove(id);
        }
        if deliver {
            self.schedule_delivery();
        }
        true
    }

    /// Cancels the request when `token` is cancelled.
    ///
    /// The observer is detached again as soon as the request completes.
    pub fn watch(self: &Arc<Self>, token: &CancelToken) {
        let request = Arc::clone(self);
        let id = match token.on_cancel(move || {
            request.cancel();
        }) {
            Some(id) => id,
            None => return,
        };

        let mut state = self.state.lock();
        if state.outcome.is_none() {
            state.observer = Some((token.clone(), id));
        } else {
            drop(state);
            token.remove(id);
        }
    }

    /// Blocks the calling thread until the request completes.
    pub fn wait(&self) -> Result<QueryOutcome, Error> {
        let mut state = self.state.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return outcome.clone();
            }
            self.completed.wait(&mut state);
        }
    }

    /// Registers `callback` to run once with the outcome.
    ///
    /// The callback always runs on the dispatcher, even when the request has
    /// already completed. Callbacks of one request run one after the other.
    pub fn subscribe(self: &Arc<Self>, callback: Callback) {
        let deliver = {
            let mut state = self.state.lock();
            state.callbacks.push_back(callback);
            let deliver = state.outcome.is_some() && !state.delivering;
            state.delivering |= deliver;
            deliver
        };
        if deliver {
            self.schedule_delivery();
        }
    }

    fn schedule_delivery(self: &Arc<Self>) {
        let request = Arc::clone(self);
        self.dispatcher.dispatch(Box::new(move || request.deliver()));
    }

    fn deliver(&self) {
        loop {
            let (callback, outcome) = {
                let mut state = self.state.lock();
                match (state.outcome.clone(), state.callbacks.pop_front()) {
                    (Some(outcome), Some(callback)) => (callback, outcome),
                    _ => {
                        state.delivering = false;
                        return;
                    }
                }
            };
            callback(outcome);
        }
    }

    fn poll_outcome(&self, cx: &mut Context<'_>) -> Poll<Result<QueryOutcome, Error>> {
        self.waker.register(cx.waker());
        match &self.state.lock().outcome {
            Some(outcome) => Poll::Ready(outcome.clone()),
            None => Poll::Pending,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("query", &self.query)
            .field("completed", &self.is_completed())
            .finish()
    }
}

/// Caller's handle on a submitted lookup.
///
/// A `Lookup` can be awaited, waited on from a blocking context with
/// [`Lookup::wait`], or given a callback with [`Lookup::on_complete`].
/// Dropping it does not cancel the lookup.
#[must_use = "lookups do nothing unless awaited, waited on or given a callback"]
pub struct Lookup<T> {
    request: Arc<Request>,
    _output: PhantomData<fn() -> T>,
}

impl<T: FromOutcome> Lookup<T> {
    /// Wraps a request.
    pub fn new(request: Arc<Request>) -> Self {
        Self {
            request,
            _output: PhantomData,
        }
    }

    /// Gets the id of the underlying request.
    pub fn id(&self) -> u64 {
        self.request.id()
    }

    /// Gets the query being resolved.
    pub fn query(&self) -> &Query {
        self.request.query()
    }

    /// Returns `true` once the lookup has an outcome.
    pub fn is_completed(&self) -> bool {
        self.request.is_completed()
    }

    /// Cancels the lookup. Returns `false` if it had already completed.
    pub fn cancel(&self) -> bool {
        self.request.cancel()
    }

    /// Blocks the calling thread until the lookup completes or is cancelled.
    pub fn wait(self) -> Result<T, Error> {
        self.request.wait().and_then(T::from_outcome)
    }

    /// Runs `callback` once with the result, never on the calling frame.
    pub fn on_complete(self, callback: impl FnOnce(Result<T, Error>) + Send + 'static) {
        self.request.subscribe(Box::new(move |outcome| {
            callback(outcome.and_then(T::from_outcome))
        }));
    }
}

impl<T: FromOutcome> Future for Lookup<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.request
            .poll_outcome(cx)
            .map(|outcome| outcome.and_then(T::from_outcome))
    }
}

impl<T> fmt::Debug for Lookup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Lookup").field(&self.request).finish()
    }
}
