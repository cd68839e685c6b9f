//! Per-screen controllers publishing the outcome of each operation into an
//! observable [`Slot`].
//!
//! Every slot goes `None -> Pending -> Success | Failure`. A new invocation
//! overwrites whatever the slot held, and a completion belonging to a
//! superseded invocation is dropped instead of published.

use std::{
    future::Future,
    sync::{Mutex, PoisonError},
};

use tokio::{runtime::Handle, sync::watch, task::JoinSet};

use crate::error::ClientError;

mod auth;
mod expense;

pub use auth::AuthOrchestrator;
pub use expense::{ExpenseOrchestrator, WriteOutcome};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationResult<T> {
    Pending,
    Success(T),
    Failure { message: String, code: Option<u16> },
}

impl<T> OperationResult<T> {
    /// Server rejections keep their status code and fall back to `fallback`
    /// when the body carried no message. Every other fault has no code.
    pub fn from_response(result: Result<T, ClientError>, fallback: &str) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(ClientError::Status { status, message }) => Self::Failure {
                message: if message.trim().is_empty() {
                    fallback.to_string()
                } else {
                    message
                },
                code: Some(status),
            },
            Err(err) => {
                tracing::debug!("{fallback}: {err}");
                Self::Failure {
                    message: err.to_string(),
                    code: None,
                }
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// What observers see: `None` means idle, or consumed.
pub type SlotState<T> = Option<OperationResult<T>>;

/// Identifies one invocation into a [`Slot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket(u64);

/// Single-producer, last-value-wins state holder.
#[derive(Debug)]
pub struct Slot<T> {
    state: watch::Sender<SlotState<T>>,
    latest: Mutex<u64>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            latest: Mutex::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SlotState<T>> {
        self.state.subscribe()
    }

    /// Supersedes any in-flight invocation and publishes `Pending`.
    pub fn begin(&self) -> Ticket {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        *latest += 1;
        self.state.send_replace(Some(OperationResult::Pending));
        Ticket(*latest)
    }

    /// Publishes `result` if `ticket` is still the latest invocation.
    pub fn finish(&self, ticket: Ticket, result: OperationResult<T>) -> bool {
        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if ticket.0 != *latest {
            tracing::debug!(
                ticket = ticket.0,
                latest = *latest,
                "dropping result of superseded operation"
            );
            return false;
        }
        self.state.send_replace(Some(result));
        true
    }

    /// Resets to the neutral state so a handled result is not delivered again.
    ///
    /// An invocation still in flight keeps its ticket and publishes when it lands.
    pub fn consume(&self) {
        let _latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        self.state.send_replace(None);
    }

    /// Drops a pending invocation and returns the slot to idle. A settled
    /// result is left as it is.
    pub fn abandon(&self) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let reset = self.state.send_if_modified(|state| {
            if matches!(state, Some(OperationResult::Pending)) {
                *state = None;
                return true;
            }
            false
        });
        if reset {
            *latest += 1;
        }
    }
}

impl<T: Clone> Slot<T> {
    pub fn current(&self) -> SlotState<T> {
        self.state.borrow().clone()
    }
}

/// In-flight tasks owned by one orchestrator. Dropping the scope aborts them.
#[derive(Debug)]
struct Scope {
    runtime: Handle,
    tasks: Mutex<JoinSet<()>>,
}

impl Scope {
    fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.spawn_on(task, &self.runtime);
    }

    fn cancel_all(&self) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .abort_all();
    }

    fn in_flight(&self) -> usize {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }
}
