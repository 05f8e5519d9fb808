//! Sets up a ring, runs one election and collects the statistics.

use std::future::Future;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::abstractions::communication::ring_topology::RingTopology;
use crate::abstractions::logging::ScopedEventLogger;
use crate::abstractions::process::{ProcessError, ProcessHandle, Runnable, TerminationSignal};
use crate::abstractions::ProcessId;
use crate::algorithms::hirschberg_sinclair::{ElectionProcess, ProcessReport};
use crate::config::SimulationConfig;
use crate::error::ElectionError;

#[derive(Debug, Clone)]
pub struct ElectionReport<I> {
    /// `None` when the run was halted before anyone won.
    pub leader: Option<I>,
    pub leader_phase: Option<u32>,
    pub total_messages_sent: u64,
    pub total_messages_received: u64,
    /// Messages still queued in mailboxes when the run was torn down.
    pub undelivered: u64,
    /// In ring order.
    pub processes: Vec<ProcessReport<I>>,
}

impl<I> ElectionReport<I> {
    /// No message was lost or duplicated: everything sent was either handled
    /// or still waiting in a mailbox.
    pub fn messages_conserved(&self) -> bool {
        self.total_messages_sent == self.total_messages_received + self.undelivered
    }
}

pub struct Coordinator {
    config: SimulationConfig,
}

impl Coordinator {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub async fn run<I: ProcessId>(&self, ids: &[I]) -> Result<ElectionReport<I>, ElectionError> {
        self.run_until(ids, std::future::pending()).await
    }

    /// Runs one election over `ids`, given in ring order. Completing
    /// `shutdown` halts the run early.
    ///
    /// Invalid rings are rejected before any process starts.
    pub async fn run_until<I, F>(
        &self,
        ids: &[I],
        shutdown: F,
    ) -> Result<ElectionReport<I>, ElectionError>
    where
        I: ProcessId,
        F: Future<Output = ()>,
    {
        let signal = TerminationSignal::new();
        let (event_sender, event_receiver) = broadcast::channel(self.config.event_capacity);

        let mut processes: Vec<_> = ids
            .iter()
            .map(|&id| {
                ElectionProcess::new(id, ids.len(), signal.clone())
                    .with_config(self.config.clone())
                    .with_event_sender(event_sender.clone())
            })
            .collect();
        RingTopology::connect(&mut processes)?;
        drop(event_sender);

        let logger_token = CancellationToken::new();
        let logger = ScopedEventLogger::new(event_receiver).start(logger_token.clone());

        info!(ring = ?ids, "starting election");
        let handles: Vec<ProcessHandle<I>> = processes.iter().map(|p| p.handle()).collect();
        let tasks: Vec<_> = processes.into_iter().map(Runnable::spawn).collect();

        tokio::select! {
            _ = signal.wait() => {}
            _ = shutdown => {
                warn!("shutdown requested, halting the election");
                signal.halt();
            }
        }

        for handle in &handles {
            handle.stop();
        }

        let (mut finished, failure) = join_processes(&handles, tasks).await;

        logger_token.cancel();
        let _ = logger.await;

        if let Some(error) = failure {
            return Err(error);
        }

        let undelivered = finished
            .iter_mut()
            .map(|process| process.drain_mailbox() as u64)
            .sum();
        let processes: Vec<_> = finished.iter().map(ElectionProcess::report).collect();
        let leader = signal.leader();

        let report = ElectionReport {
            leader,
            leader_phase: processes
                .iter()
                .find(|p| Some(p.id) == leader)
                .map(|p| p.final_phase),
            total_messages_sent: processes.iter().map(|p| p.messages_sent).sum(),
            total_messages_received: processes.iter().map(|p| p.messages_received).sum(),
            undelivered,
            processes,
        };

        info!(
            leader = ?report.leader,
            phase = ?report.leader_phase,
            sent = report.total_messages_sent,
            "election finished"
        );

        Ok(report)
    }
}

/// Joins every process task, even after one of them failed or panicked.
/// Returns the processes that finished cleanly and the first failure.
async fn join_processes<I: ProcessId>(
    handles: &[ProcessHandle<I>],
    tasks: Vec<JoinHandle<Result<ElectionProcess<I>, ProcessError>>>,
) -> (Vec<ElectionProcess<I>>, Option<ElectionError>) {
    let mut finished = Vec::with_capacity(tasks.len());
    let mut failure: Option<ElectionError> = None;
    for (handle, task) in handles.iter().zip(tasks) {
        match task.await {
            Ok(Ok(process)) => finished.push(process),
            Ok(Err(error)) => {
                warn!(process = ?handle.id(), %error, "process failed");
                failure.get_or_insert(error.into());
            }
            Err(error) => {
                warn!(process = ?handle.id(), %error, "process task did not complete");
                failure.get_or_insert(error.into());
            }
        }
    }
    (finished, failure)
}
