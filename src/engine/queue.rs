// Tue Jan 20 2026 - Alex

use crate::engine::job::Job;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

struct QueueState {
    items: VecDeque<Job>,
    shutdown: bool,
}

/// Unbounded FIFO handoff between pipeline loops.
///
/// Producers never block. Consumers block in [`JobQueue::recv`] until a job
/// arrives or [`JobQueue::shutdown`] is called, which wakes every waiter at once.
pub struct JobQueue {
    name: &'static str,
    state: Mutex<QueueState>,
    available: Condvar,
    poll_interval: Duration,
}

impl JobQueue {
    pub fn new(name: &'static str) -> Self {
        Self::with_poll_interval(name, Duration::from_millis(500))
    }

    pub fn with_poll_interval(name: &'static str, poll_interval: Duration) -> Self {
        Self {
            name,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
            poll_interval,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueues even after shutdown so a stage that is finishing can still publish.
    pub fn push(&self, job: Job) {
        let mut state = self.state.lock();
        log::trace!("[{}] push {} (#{})", self.name, job.action(), job.id());
        state.items.push_back(job);
        drop(state);
        self.available.notify_one();
    }

    /// Blocks until a job is available. Returns `None` once shutdown was requested,
    /// even if jobs remain queued.
    pub fn recv(&self) -> Option<Job> {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(job) = state.items.pop_front() {
                return Some(job);
            }
            self.available.wait_for(&mut state, self.poll_interval);
        }
    }

    pub fn try_recv(&self) -> Option<Job> {
        let mut state = self.state.lock();
        if state.shutdown {
            return None;
        }
        state.items.pop_front()
    }

    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.available.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every queued job, mainly for consumers inspecting what was dispatched.
    pub fn drain(&self) -> Vec<Job> {
        self.state.lock().items.drain(..).collect()
    }
}
