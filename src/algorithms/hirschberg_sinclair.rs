//! Hirschberg–Sinclair election, one state machine per ring member.
//!
//! In phase `k` a process sends a probe of radius `2^k` in both directions.
//! A probe reaching a process with a larger identifier is dropped (the kill
//! rule); a probe that travels its full radius turns into an echo and walks
//! back to its originator. A process whose two echoes both come home starts
//! the next phase, and once its radius covers the whole ring it is the
//! leader. Processes that lost keep relaying other traffic until the run
//! ends.

use std::fmt;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::abstractions::communication::ring_topology::RingMember;
use crate::abstractions::communication::{LinkError, LinkReceiver, LinkSender, Mailbox, RingLinks};
use crate::abstractions::process::{
    Counter, ProcessError, ProcessHandle, Runnable, TerminationSignal,
};
use crate::abstractions::{radius, Direction, Event, EventType, Message, ProcessId};
use crate::config::SimulationConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    Idle,
    PhaseActive(u32),
    /// Declared itself leader.
    Terminated,
    /// Left its loop because the run ended or it was asked to stop.
    Stopped,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Idle => f.write_str("idle"),
            ProcessState::PhaseActive(phase) => write!(f, "active in phase {phase}"),
            ProcessState::Terminated => f.write_str("leader"),
            ProcessState::Stopped => f.write_str("stopped"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessReport<I> {
    pub id: I,
    pub state: ProcessState,
    pub final_phase: u32,
    pub messages_sent: u64,
    pub messages_received: u64,
}

pub struct ElectionProcess<I> {
    id: I,
    ring_size: usize,
    state: ProcessState,
    phase: u32,
    confirm_left: bool,
    confirm_right: bool,
    links: Option<RingLinks<Message<I>>>,
    mailbox: Option<Mailbox<Message<I>>>,
    signal: TerminationSignal<I>,
    stop_token: CancellationToken,
    messages_sent: Counter,
    messages_received: u64,
    event_sender: Option<broadcast::Sender<Event<I>>>,
    config: SimulationConfig,
}

impl<I: ProcessId> ElectionProcess<I> {
    pub fn new(id: I, ring_size: usize, signal: TerminationSignal<I>) -> Self {
        Self {
            id,
            ring_size,
            state: ProcessState::Idle,
            phase: 0,
            confirm_left: false,
            confirm_right: false,
            links: None,
            mailbox: None,
            stop_token: signal.child_token(),
            signal,
            messages_sent: Counter::default(),
            messages_received: 0,
            event_sender: None,
            config: SimulationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    /// Publishes every protocol event on `event_sender`.
    pub fn with_event_sender(mut self, event_sender: broadcast::Sender<Event<I>>) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    pub fn id(&self) -> I {
        self.id
    }

    pub fn phase(&self) -> u32 {
        self.phase
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn is_leader(&self) -> bool {
        self.state == ProcessState::Terminated
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.get()
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received
    }

    pub fn handle(&self) -> ProcessHandle<I> {
        ProcessHandle::new(self.id, self.stop_token.clone(), self.messages_sent.clone())
    }

    /// Cooperative stop; the loop exits within one poll interval.
    pub fn stop(&self) {
        self.stop_token.cancel();
    }

    pub fn report(&self) -> ProcessReport<I> {
        ProcessReport {
            id: self.id,
            state: self.state,
            final_phase: self.phase,
            messages_sent: self.messages_sent(),
            messages_received: self.messages_received,
        }
    }

    /// Drops whatever is still queued in the mailbox and returns the count.
    pub fn drain_mailbox(&mut self) -> usize {
        self.mailbox.as_mut().map_or(0, Mailbox::drain)
    }

    /// Runs the election until this process wins or is stopped.
    ///
    /// A failing process halts the whole run: the ring cannot recover from
    /// a broken member.
    pub async fn run(&mut self) -> Result<ProcessState, ProcessError> {
        let Some(mut mailbox) = self.mailbox.take() else {
            return Err(self.not_connected());
        };

        let result = self.run_loop(&mut mailbox).await;
        self.mailbox = Some(mailbox);

        if let Err(error) = &result {
            warn!(process = ?self.id, %error, "process failed, halting the election");
            self.signal.halt();
        }
        result
    }

    async fn run_loop(
        &mut self,
        mailbox: &mut Mailbox<Message<I>>,
    ) -> Result<ProcessState, ProcessError> {
        let stop_token = self.stop_token.clone();
        let startup_jitter = self.config.startup_jitter;
        let think_time = self.config.think_time;
        let poll_interval = self.config.poll_interval;

        let stopped_before_start = tokio::select! {
            _ = stop_token.cancelled() => true,
            _ = startup_jitter.delay() => false,
        };
        if stopped_before_start {
            return Ok(self.stopped());
        }

        debug!(process = ?self.id, "process started");
        self.start()?;

        while !stop_token.is_cancelled() {
            let received = tokio::select! {
                biased;
                _ = stop_token.cancelled() => break,
                received = mailbox.recv_timeout(poll_interval) => received,
            };

            match received {
                Ok(Some(message)) => self.handle_message(message)?,
                Ok(None) => {}
                Err(LinkError::Closed) if stop_token.is_cancelled() => break,
                Err(LinkError::Closed) => return Err(self.link_closed("inbound")),
            }

            if self.state == ProcessState::Terminated {
                return Ok(self.state);
            }

            tokio::select! {
                _ = stop_token.cancelled() => {}
                _ = think_time.delay() => {}
            }
        }

        Ok(self.stopped())
    }

    /// Enters phase 0.
    pub fn start(&mut self) -> Result<(), ProcessError> {
        if self.state != ProcessState::Idle {
            return Err(self.violation(format!("start requested while {}", self.state)));
        }
        if self.links.is_none() {
            return Err(self.not_connected());
        }
        self.start_phase(0)
    }

    /// Handles at most one queued message without waiting. Returns whether a
    /// message was handled.
    pub fn step(&mut self) -> Result<bool, ProcessError> {
        let received = match self.mailbox.as_mut() {
            Some(mailbox) => mailbox.try_recv(),
            None => return Err(self.not_connected()),
        };

        match received {
            Ok(Some(message)) => {
                self.handle_message(message)?;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(LinkError::Closed) => Err(self.link_closed("inbound")),
        }
    }

    pub fn handle_message(&mut self, message: Message<I>) -> Result<(), ProcessError> {
        self.messages_received += 1;
        self.emit(EventType::Receive, Some(message));

        if !message.returning && message.origin < self.id {
            self.emit(EventType::Kill, Some(message));
            return Ok(());
        }

        if message.origin == self.id {
            if self.state != ProcessState::PhaseActive(message.phase) {
                return Err(self.violation(format!(
                    "own message from phase {} received while {}",
                    message.phase, self.state
                )));
            }
            if message.returning {
                return self.confirm(message);
            }
            // a probe wider than the ring passes through its originator
        }

        let (link, next) = message.relay();
        self.send(link, next)
    }

    fn start_phase(&mut self, phase: u32) -> Result<(), ProcessError> {
        if self.confirm_left || self.confirm_right {
            return Err(self.violation("phase started with a pending confirmation"));
        }

        self.phase = phase;
        self.state = ProcessState::PhaseActive(phase);
        self.emit(EventType::StartPhase, None);

        self.send(Direction::Left, Message::probe(self.id, Direction::Left, phase))?;
        self.send(Direction::Right, Message::probe(self.id, Direction::Right, phase))
    }

    fn confirm(&mut self, echo: Message<I>) -> Result<(), ProcessError> {
        let already_confirmed = match echo.direction {
            Direction::Left => self.confirm_left,
            Direction::Right => self.confirm_right,
        };
        if already_confirmed {
            return Err(self.violation(format!(
                "{} confirmed twice in phase {}",
                echo.direction, self.phase
            )));
        }

        match echo.direction {
            Direction::Left => self.confirm_left = true,
            Direction::Right => self.confirm_right = true,
        }
        self.emit(EventType::Confirm, Some(echo));

        if !(self.confirm_left && self.confirm_right) {
            return Ok(());
        }

        if radius(self.phase) >= self.ring_size as u64 {
            return self.elect();
        }

        self.confirm_left = false;
        self.confirm_right = false;
        self.start_phase(self.phase + 1)
    }

    fn elect(&mut self) -> Result<(), ProcessError> {
        self.state = ProcessState::Terminated;
        self.emit(EventType::Elected, None);
        info!(leader = ?self.id, phase = self.phase, "radius covers the whole ring");

        if !self.signal.declare_leader(self.id) {
            return Err(self.violation(format!(
                "declared leader but {:?} already was",
                self.signal.leader()
            )));
        }
        Ok(())
    }

    fn send(&self, to: Direction, message: Message<I>) -> Result<(), ProcessError> {
        let Some(links) = self.links.as_ref() else {
            return Err(self.not_connected());
        };

        match links.send(to, message) {
            Ok(()) => {
                self.messages_sent.increment();
                self.emit(EventType::Send, Some(message));
                Ok(())
            }
            // neighbour already shut down; the run is over anyway
            Err(LinkError::Closed) if self.stop_token.is_cancelled() => Ok(()),
            Err(LinkError::Closed) => Err(self.link_closed(&to.to_string())),
        }
    }

    fn stopped(&mut self) -> ProcessState {
        if self.state != ProcessState::Terminated {
            self.state = ProcessState::Stopped;
        }
        debug!(
            process = ?self.id,
            phase = self.phase,
            sent = self.messages_sent(),
            "process stopped"
        );
        self.state
    }

    fn emit(&self, event_type: EventType, message: Option<Message<I>>) {
        if let Some(event_sender) = &self.event_sender {
            let _ = event_sender.send(Event {
                process: self.id,
                event_type,
                phase: self.phase,
                message,
            });
        }
    }

    fn violation(&self, reason: impl Into<String>) -> ProcessError {
        ProcessError::ProtocolInvariantViolation {
            process: format!("{:?}", self.id),
            reason: reason.into(),
        }
    }

    fn not_connected(&self) -> ProcessError {
        ProcessError::NotConnected {
            process: format!("{:?}", self.id),
        }
    }

    fn link_closed(&self, link: &str) -> ProcessError {
        ProcessError::LinkClosed {
            process: format!("{:?}", self.id),
            link: link.to_owned(),
        }
    }
}

impl<I: ProcessId> RingMember for ElectionProcess<I> {
    type Id = I;
    type Message = Message<I>;

    fn id(&self) -> I {
        self.id
    }

    fn ring_size(&self) -> usize {
        self.ring_size
    }

    fn is_connected(&self) -> bool {
        self.links.is_some()
    }

    fn attach(&mut self, links: RingLinks<Message<I>>, mailbox: Mailbox<Message<I>>) {
        self.links = Some(links);
        self.mailbox = Some(mailbox);
    }
}

impl<I: ProcessId> Runnable for ElectionProcess<I> {
    type Output = Self;

    fn spawn(mut self) -> JoinHandle<Result<Self, ProcessError>> {
        tokio::spawn(async move {
            self.run().await?;
            Ok(self)
        })
    }
}
