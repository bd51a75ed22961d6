//! Completion callback delivery.

use crate::request::{Dispatch, Task};
use parking_lot::{Condvar, Mutex};
use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};

/// [`Dispatch`] running callbacks in FIFO order on a dedicated thread.
///
/// The thread never runs resolver primitives, so a callback may block on
/// another lookup of the same backend, and a cancellation is delivered while
/// every worker is still busy. It is spawned on demand and exits after sitting
/// idle for a while.
pub struct DeliveryThread {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    available: Condvar,
    idle_timeout: Duration,
}

#[derive(Default)]
struct State {
    tasks: VecDeque<Task>,
    running: bool,
    shutdown: bool,
}

impl DeliveryThread {
    /// Creates a delivery thread exiting after `idle_timeout` without work.
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                available: Condvar::new(),
                idle_timeout,
            }),
        }
    }

    /// Returns `true` while the delivery thread is alive.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Lets the thread exit once the queued callbacks ran.
    pub(crate) fn shutdown(&self) {
        self.shared.state.lock().shutdown = true;
        self.shared.available.notify_all();
    }
}

impl Dispatch for DeliveryThread {
    fn dispatch(&self, task: Task) {
        let spawn = {
            let mut state = self.shared.state.lock();
            state.tasks.push_back(task);
            !std::mem::replace(&mut state.running, true)
        };
        if spawn {
            Shared::spawn(&self.shared);
        } else {
            self.shared.available.notify_one();
        }
    }
}

impl Drop for DeliveryThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn spawn(this: &Arc<Self>) {
        let shared = this.clone();
        let spawned = std::thread::Builder::new()
            .name(String::from("resolv-delivery"))
            .spawn(move || shared.deliver());
        if let Err(_err) = spawned {
            #[cfg(feature = "log")]
            tracing::warn!(error = %_err, "unable to spawn delivery thread, running callbacks inline");
            this.drain();
        }
    }

    /// Runs the queued tasks on the calling thread. Later dispatches retry the
    /// spawn.
    fn drain(&self) {
        loop {
            let task = {
                let mut state = self.state.lock();
                match state.tasks.pop_front() {
                    Some(task) => task,
                    None => {
                        state.running = false;
                        return;
                    }
                }
            };
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                #[cfg(feature = "log")]
                tracing::warn!("completion callback panicked");
            }
        }
    }

    fn deliver(&self) {
        #[cfg(feature = "log")]
        tracing::trace!("delivery thread started");
        while let Some(task) = self.next_task() {
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                #[cfg(feature = "log")]
                tracing::warn!("completion callback panicked");
            }
        }
        #[cfg(feature = "log")]
        tracing::trace!("delivery thread exiting");
    }

    /// Waits for the next task. Returns `None`, having marked the thread as
    /// gone, once shut down or idle for too long.
    fn next_task(&self) -> Option<Task> {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.tasks.pop_front() {
                return Some(task);
            }
            if state.shutdown {
                break;
            }
            let timed_out = self
                .available
                .wait_for(&mut state, self.idle_timeout)
                .timed_out();
            if timed_out && state.tasks.is_empty() {
                break;
            }
        }
        state.running = false;
        None
    }
}
