//! Hosted backends: a monotonic clock over `std::time::Instant` and a
//! worker-thread system timer.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use ctxhub_core::{Nanoseconds, SystemCallback};
use ctxhub_evloop::EventPoster;

use crate::pool::{Clock, SystemTimer};

/// Monotonic clock with its epoch at construction time.
pub struct StdClock {
    epoch: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Nanoseconds {
        Nanoseconds::new(self.epoch.elapsed().as_nanos() as u64)
    }
}

struct TimerState {
    deadline: Option<Nanoseconds>,
    shutdown: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    changed: Condvar,
}

/// System timer backed by a dedicated sleeper thread.
///
/// Holds at most one absolute deadline; when it passes, the thread posts
/// `SystemCallback::TimerExpired` to the inbound queue and goes back to
/// sleep. Dropping the timer shuts the thread down and joins it.
pub struct ThreadTimer {
    shared: Arc<TimerShared>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ThreadTimer {
    pub fn new(poster: EventPoster, clock: Arc<dyn Clock>) -> Self {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                deadline: None,
                shutdown: false,
            }),
            changed: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("ctxhub-timer".into())
            .spawn(move || Self::run(worker_shared, poster, clock))
            .expect("failed to spawn the timer thread");
        Self {
            shared,
            worker: Some(worker),
        }
    }

    fn run(shared: Arc<TimerShared>, poster: EventPoster, clock: Arc<dyn Clock>) {
        let mut state = shared.state.lock().unwrap();
        loop {
            if state.shutdown {
                return;
            }
            match state.deadline {
                None => {
                    state = shared.changed.wait(state).unwrap();
                }
                Some(deadline) => {
                    let now = clock.now();
                    if now >= deadline {
                        state.deadline = None;
                        drop(state);
                        debug!("system timer expired at {now}");
                        if let Err(err) = poster.post_callback(SystemCallback::TimerExpired) {
                            warn!("dropping timer expiry callback: {err}");
                        }
                        state = shared.state.lock().unwrap();
                    } else {
                        let wait = Duration::from_nanos((deadline - now).raw());
                        // A re-arm or shutdown wakes this early; the deadline
                        // is re-read on every pass.
                        let (guard, _timeout) =
                            shared.changed.wait_timeout(state, wait).unwrap();
                        state = guard;
                    }
                }
            }
        }
    }
}

impl SystemTimer for ThreadTimer {
    fn arm(&mut self, deadline: Nanoseconds) {
        let mut state = self.shared.state.lock().unwrap();
        state.deadline = Some(deadline);
        drop(state);
        self.shared.changed.notify_one();
    }

    fn cancel(&mut self) {
        let mut state = self.shared.state.lock().unwrap();
        state.deadline = None;
        drop(state);
        self.shared.changed.notify_one();
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.shutdown = true;
        }
        self.shared.changed.notify_one();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
