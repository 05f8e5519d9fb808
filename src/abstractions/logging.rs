use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::abstractions::{radius, Event, EventType, ProcessId};

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides
/// `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_thread_names(true)
        .init();
}

/// Renders the protocol events of every process as `tracing` events.
///
/// Phase changes, the election result and message traffic are logged at
/// `info`; kills and confirmations at `debug`.
pub struct ScopedEventLogger<I> {
    event_receiver: Receiver<Event<I>>,
}

impl<I: ProcessId> ScopedEventLogger<I> {
    pub fn new(event_receiver: Receiver<Event<I>>) -> Self {
        Self { event_receiver }
    }

    pub fn start(mut self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    received = self.event_receiver.recv() => {
                        match received {
                            Ok(event) => log_event(&event),
                            Err(RecvError::Lagged(skipped)) => {
                                warn!(skipped, "event logger fell behind, events dropped");
                            }
                            Err(RecvError::Closed) => return,
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        while let Ok(event) = self.event_receiver.try_recv() {
                            log_event(&event);
                        }
                        return;
                    }
                }
            }
        })
    }
}

fn log_event<I: ProcessId>(event: &Event<I>) {
    let process = event.process;
    match (event.event_type, event.message) {
        (EventType::StartPhase, _) => {
            info!(
                ?process,
                phase = event.phase,
                radius = radius(event.phase),
                "START PHASE"
            );
        }
        (EventType::Elected, _) => {
            info!(?process, phase = event.phase, "LEADER ELECTED");
        }
        (event_type @ (EventType::Send | EventType::Receive), Some(message)) => {
            info!(
                ?process,
                origin = ?message.origin,
                direction = %message.direction,
                phase = message.phase,
                distance = message.distance,
                returning = message.returning,
                "{event_type}"
            );
        }
        (event_type, Some(message)) => {
            debug!(
                ?process,
                origin = ?message.origin,
                direction = %message.direction,
                phase = message.phase,
                distance = message.distance,
                returning = message.returning,
                "{event_type}"
            );
        }
        (event_type, None) => {
            debug!(?process, phase = event.phase, "{event_type}");
        }
    }
}
