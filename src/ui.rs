//! The engine's single-threaded cooperative UI thread, modelled as an
//! explicit task queue.
//!
//! Every engine API call that is not documented thread-safe must run on this
//! thread, and every engine callback arrives on it. Instead of asserting
//! thread affinity at each call site, operations are submitted as jobs to a
//! [`UiThread`], either fire-and-forget ([`UiThread::post`]) or with
//! future-based completion ([`UiThread::call`]).

use std::sync::Mutex;
use std::thread::{JoinHandle, ThreadId};

use tokio::sync::{mpsc, oneshot};

use crate::errors::BridgeError;

enum Job {
    Run(Box<dyn FnOnce() + Send + 'static>),
    Quit,
}

/// Handle to the dedicated engine UI thread.
pub struct UiThread {
    tx: mpsc::UnboundedSender<Job>,
    thread_id: ThreadId,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl UiThread {
    /// Spawn the queue thread. Jobs run strictly in submission order.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let join = std::thread::Builder::new()
            .name("engine-ui".to_string())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    match job {
                        Job::Run(f) => f(),
                        Job::Quit => break,
                    }
                }
                log::debug!("engine ui thread exiting");
            })
            .expect("failed to spawn engine ui thread");

        let thread_id = join.thread().id();

        Self {
            tx,
            thread_id,
            join: Mutex::new(Some(join)),
        }
    }

    /// True when the caller is already running on the queue thread.
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    /// Submit a job without waiting for it.
    pub fn post(&self, f: impl FnOnce() + Send + 'static) -> Result<(), BridgeError> {
        self.tx
            .send(Job::Run(Box::new(f)))
            .map_err(|_| BridgeError::QueueClosed)
    }

    /// Submit a job and await its result.
    ///
    /// When already on the queue thread (an engine callback re-entering the
    /// bridge) the job runs inline rather than deadlocking on itself.
    pub async fn call<R, F>(&self, f: F) -> Result<R, BridgeError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_current() {
            return Ok(f());
        }

        let (tx, rx) = oneshot::channel();
        self.post(move || {
            let _ = tx.send(f());
        })?;
        rx.await.map_err(|_| BridgeError::QueueClosed)
    }

    /// Stop the queue thread after all previously submitted jobs have run.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Job::Quit);
        if let Some(join) = self.join.lock().unwrap().take() {
            if !self.is_current() {
                let _ = join.join();
            }
        }
    }
}

impl Drop for UiThread {
    fn drop(&mut self) {
        let _ = self.tx.send(Job::Quit);
    }
}
