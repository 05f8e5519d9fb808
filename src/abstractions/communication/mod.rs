use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::abstractions::Direction;

pub mod ring_topology;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    #[error("link is closed")]
    Closed,
}

/// Outbound side of a process's links, addressed by neighbour.
pub trait LinkSender<I, T: 'static + Send> {
    /// Never blocks; the link buffers without bound.
    fn send(&self, to: I, t: T) -> Result<(), LinkError>;
}

pub trait LinkReceiver<T: 'static + Send> {
    /// Waits at most `wait` for the next item. `Ok(None)` means nothing
    /// arrived in time, which is not an error.
    fn recv_timeout(
        &mut self,
        wait: Duration,
    ) -> impl Future<Output = Result<Option<T>, LinkError>> + Send;

    fn try_recv(&mut self) -> Result<Option<T>, LinkError>;
}

/// Creates one inbound mailbox together with the handle neighbours use to
/// feed it. Any number of neighbours may hold a clone of the handle; items
/// from a single holder arrive in the order they were sent.
pub fn local_link<T>() -> (MailboxSender<T>, Mailbox<T>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (MailboxSender { sender }, Mailbox { receiver })
}

pub struct MailboxSender<T> {
    sender: mpsc::UnboundedSender<T>,
}

impl<T> MailboxSender<T> {
    pub fn send(&self, t: T) -> Result<(), LinkError> {
        self.sender.send(t).map_err(|_| LinkError::Closed)
    }

    pub fn same_mailbox(&self, other: &MailboxSender<T>) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

impl<T> Clone for MailboxSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

pub struct Mailbox<T> {
    receiver: mpsc::UnboundedReceiver<T>,
}

impl<T> Mailbox<T> {
    /// Discards everything still queued and returns how many items that was.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.receiver.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}

impl<T: 'static + Send> LinkReceiver<T> for Mailbox<T> {
    async fn recv_timeout(&mut self, wait: Duration) -> Result<Option<T>, LinkError> {
        match tokio::time::timeout(wait, self.receiver.recv()).await {
            Ok(Some(t)) => Ok(Some(t)),
            Ok(None) => Err(LinkError::Closed),
            Err(_elapsed) => Ok(None),
        }
    }

    fn try_recv(&mut self) -> Result<Option<T>, LinkError> {
        match self.receiver.try_recv() {
            Ok(t) => Ok(Some(t)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(LinkError::Closed),
        }
    }
}

/// The two outbound links of a ring member.
pub struct RingLinks<T> {
    left: MailboxSender<T>,
    right: MailboxSender<T>,
}

impl<T> RingLinks<T> {
    pub fn new(left: MailboxSender<T>, right: MailboxSender<T>) -> Self {
        Self { left, right }
    }

    pub fn neighbor(&self, direction: Direction) -> &MailboxSender<T> {
        match direction {
            Direction::Left => &self.left,
            Direction::Right => &self.right,
        }
    }
}

impl<T: 'static + Send> LinkSender<Direction, T> for RingLinks<T> {
    fn send(&self, to: Direction, t: T) -> Result<(), LinkError> {
        self.neighbor(to).send(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mailbox_is_fifo_per_sender() {
        let (sender, mut mailbox) = local_link::<u32>();
        for i in 0..10 {
            sender.send(i).unwrap();
        }

        for i in 0..10 {
            let got = mailbox
                .recv_timeout(Duration::from_millis(10))
                .await
                .unwrap();
            assert_eq!(got, Some(i));
        }
    }

    #[tokio::test]
    async fn empty_mailbox_times_out_without_error() {
        let (_sender, mut mailbox) = local_link::<u32>();
        let got = mailbox.recv_timeout(Duration::from_millis(5)).await;
        assert_eq!(got, Ok(None));
    }

    #[test]
    fn dropped_mailbox_closes_the_link() {
        let (sender, mailbox) = local_link::<u32>();
        drop(mailbox);
        assert_eq!(sender.send(1), Err(LinkError::Closed));
    }

    #[test]
    fn ring_links_route_by_direction() {
        let (left, mut left_mailbox) = local_link::<&str>();
        let (right, mut right_mailbox) = local_link::<&str>();
        let links = RingLinks::new(left, right);

        links.send(Direction::Left, "l").unwrap();
        links.send(Direction::Right, "r").unwrap();

        assert_eq!(left_mailbox.try_recv(), Ok(Some("l")));
        assert_eq!(right_mailbox.try_recv(), Ok(Some("r")));
        assert_eq!(left_mailbox.drain(), 0);
    }
}
