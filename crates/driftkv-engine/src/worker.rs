use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

struct WorkerShared {
    stop: Mutex<bool>,
    wake: Condvar,
}

/// A named background thread that runs a closure on a fixed interval.
///
/// The sleep is a condvar wait, so [`stop`](Self::stop) interrupts it
/// immediately and the thread joins in bounded time. The closure returns
/// `false` to end the loop early (e.g. when the store it serves is gone).
pub struct PeriodicWorker {
    shared: Arc<WorkerShared>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicWorker {
    pub fn spawn(
        name: &str,
        interval: Duration,
        mut tick: impl FnMut() -> bool + Send + 'static,
    ) -> Self {
        let shared = Arc::new(WorkerShared {
            stop: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                {
                    let mut stop = thread_shared.stop.lock();
                    if !*stop {
                        thread_shared.wake.wait_for(&mut stop, interval);
                    }
                    if *stop {
                        return;
                    }
                }
                if !tick() {
                    debug!("periodic worker ending early");
                    return;
                }
            })
            .expect("failed to spawn periodic worker");
        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Signal the worker and join it. Idempotent; also runs on drop.
    pub fn stop(&mut self) {
        *self.shared.stop.lock() = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PeriodicWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
