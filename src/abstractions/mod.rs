use std::fmt::{self, Debug, Display};
use std::hash::Hash;

pub mod communication;
pub mod logging;
pub mod process;

/// Bounds every process identifier must satisfy.
///
/// Identifiers are compared by the kill rule, so they must be totally
/// ordered, and they travel inside messages between tasks.
pub trait ProcessId: 'static + Send + Sync + Copy + Ord + Hash + Debug {}

impl<T> ProcessId for T where T: 'static + Send + Sync + Copy + Ord + Hash + Debug {}

/// One of the two neighbours of a process on the ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => f.write_str("LEFT"),
            Direction::Right => f.write_str("RIGHT"),
        }
    }
}

/// Probe radius for a phase: `2^phase`, saturating.
pub fn radius(phase: u32) -> u64 {
    1u64.checked_shl(phase).unwrap_or(u64::MAX)
}

/// A probe or echo travelling one hop between neighbours.
///
/// Messages are plain values. A relaying process never mutates the message
/// it received; [`Message::relay`] builds the next hop instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message<I> {
    pub origin: I,
    /// Which of the originator's two probes this message belongs to.
    pub direction: Direction,
    pub phase: u32,
    /// Hops left before an outbound probe turns into an echo.
    pub distance: u64,
    pub returning: bool,
}

impl<I: Copy> Message<I> {
    /// Outbound probe sent by `origin` at the start of `phase`.
    pub fn probe(origin: I, direction: Direction, phase: u32) -> Self {
        Self {
            origin,
            direction,
            phase,
            distance: radius(phase),
            returning: false,
        }
    }

    /// Computes the hop a relaying process has to perform.
    ///
    /// Outbound probes lose one unit of distance and turn into an echo when
    /// it reaches zero. Probes keep travelling in their own direction; echoes
    /// travel the opposite way so they retrace the probe's path.
    pub fn relay(self) -> (Direction, Self) {
        let mut next = self;
        if !next.returning {
            next.distance = next.distance.saturating_sub(1);
            if next.distance == 0 {
                next.returning = true;
            }
        }

        let link = if next.returning {
            next.direction.opposite()
        } else {
            next.direction
        };

        (link, next)
    }
}

/// Structured observation published by a process.
#[derive(Clone, Copy, Debug)]
pub struct Event<I> {
    pub process: I,
    pub event_type: EventType,
    /// Phase the process was in when the event happened.
    pub phase: u32,
    pub message: Option<Message<I>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventType {
    StartPhase,
    Send,
    Receive,
    Kill,
    Confirm,
    Elected,
}

impl Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::StartPhase => "START_PHASE",
            EventType::Send => "SEND",
            EventType::Receive => "RECEIVED",
            EventType::Kill => "KILL",
            EventType::Confirm => "CONFIRM",
            EventType::Elected => "ELECTED",
        };
        f.write_str(name)
    }
}
