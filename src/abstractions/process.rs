use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub trait Runnable {
    type Output: 'static + Send;

    /// Spawns the process onto the runtime.
    fn spawn(self) -> JoinHandle<Result<Self::Output, ProcessError>>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("process {process}: protocol invariant violated: {reason}")]
    ProtocolInvariantViolation { process: String, reason: String },

    #[error("process {process} was started before being wired into a ring")]
    NotConnected { process: String },

    #[error("process {process}: {link} link closed while the election was running")]
    LinkClosed { process: String, link: String },
}

/// Run-wide stop flag, shared by every process of one election.
///
/// The winner raises it together with its identifier; the coordinator may
/// raise it without a leader to abort the run. Once set it stays set.
pub struct TerminationSignal<I> {
    token: CancellationToken,
    leader: Arc<OnceLock<I>>,
}

impl<I: Copy> TerminationSignal<I> {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            leader: Arc::new(OnceLock::new()),
        }
    }

    /// Records `id` as the leader and stops the run. Returns `false` if a
    /// leader had already been recorded.
    pub fn declare_leader(&self, id: I) -> bool {
        let first = self.leader.set(id).is_ok();
        self.token.cancel();
        first
    }

    pub fn halt(&self) {
        self.token.cancel();
    }

    pub fn is_set(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn leader(&self) -> Option<I> {
        self.leader.get().copied()
    }

    pub async fn wait(&self) {
        self.token.cancelled().await
    }

    /// Token cancelled with the signal, but which may also be cancelled on
    /// its own to stop a single process.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}

impl<I: Copy> Default for TerminationSignal<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> Clone for TerminationSignal<I> {
    fn clone(&self) -> Self {
        Self {
            token: self.token.clone(),
            leader: self.leader.clone(),
        }
    }
}

/// Monotonic message counter that stays readable after the owning process
/// has been moved into its task.
#[derive(Clone, Debug, Default)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Remote control for a spawned process.
#[derive(Clone, Debug)]
pub struct ProcessHandle<I> {
    id: I,
    stop_token: CancellationToken,
    messages_sent: Counter,
}

impl<I: Copy> ProcessHandle<I> {
    pub fn new(id: I, stop_token: CancellationToken, messages_sent: Counter) -> Self {
        Self {
            id,
            stop_token,
            messages_sent,
        }
    }

    pub fn id(&self) -> I {
        self.id
    }

    /// Asks the process to leave its loop at the next checkpoint.
    pub fn stop(&self) {
        self.stop_token.cancel();
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.get()
    }
}
