//! Background task with a log stream
//!
//! A task runs on its own thread and talks to the caller through a channel:
//! zero or more [`TaskEvent::Log`] lines, then exactly one
//! [`TaskEvent::Finished`]. Lines arrive in the order they were emitted.
//! The caller drains the handle as an iterator and may cancel at any time
//! through the shared [`CancellationToken`].
//!
//! ```
//! use shared_utils::worker::{spawn_task, TaskEvent};
//!
//! let handle = spawn_task(|emit, _cancel| {
//!     emit("working".to_string());
//!     42
//! });
//! let events: Vec<_> = handle.collect();
//! assert_eq!(events.len(), 2);
//! assert!(matches!(events[1], TaskEvent::Finished(42)));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Cooperative cancellation flag shared between threads.
///
/// All clones observe the same state; once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent<T> {
    Log(String),
    Finished(T),
}

pub struct TaskHandle<T> {
    events: Receiver<TaskEvent<T>>,
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
    finished: bool,
}

impl<T: Send + 'static> TaskHandle<T> {
    pub fn cancel(&self) {
        tracing::info!("Cancellation requested");
        self.cancel.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain all remaining events and return the final value.
    ///
    /// Log lines are passed to `on_log` in order. Returns `None` only if the
    /// task thread panicked before finishing.
    pub fn wait_with<F: FnMut(&str)>(mut self, mut on_log: F) -> Option<T> {
        let mut result = None;
        for event in self.by_ref() {
            match event {
                TaskEvent::Log(line) => on_log(&line),
                TaskEvent::Finished(value) => result = Some(value),
            }
        }
        result
    }
}

impl<T> Iterator for TaskHandle<T> {
    type Item = TaskEvent<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.events.recv() {
            Ok(event) => {
                if matches!(event, TaskEvent::Finished(_)) {
                    self.finished = true;
                    if let Some(thread) = self.thread.take() {
                        let _ = thread.join();
                    }
                }
                Some(event)
            }
            Err(_) => {
                // Sender gone without a Finished event: the task panicked.
                self.finished = true;
                if let Some(thread) = self.thread.take() {
                    if thread.join().is_err() {
                        tracing::error!("Background task panicked");
                    }
                }
                None
            }
        }
    }
}

/// Run `task` on a new thread.
///
/// `task` receives an emitter for log lines and the cancellation token; its
/// return value becomes the single [`TaskEvent::Finished`] event.
pub fn spawn_task<T, F>(task: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Fn(String), &CancellationToken) -> T + Send + 'static,
{
    spawn_task_with_token(CancellationToken::new(), task)
}

/// Same as [`spawn_task`] with a caller-supplied token, e.g. one already
/// wired to Ctrl-C.
pub fn spawn_task_with_token<T, F>(cancel: CancellationToken, task: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Fn(String), &CancellationToken) -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let task_token = cancel.clone();

    let thread = thread::spawn(move || {
        // Sending after the handle has been dropped is a no-op.
        let emit = |line: String| {
            let _ = tx.send(TaskEvent::Log(line));
        };
        let value = task(&emit, &task_token);
        let _ = tx.send(TaskEvent::Finished(value));
    });

    TaskHandle {
        events: rx,
        cancel,
        thread: Some(thread),
        finished: false,
    }
}
