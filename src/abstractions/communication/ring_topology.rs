use crate::abstractions::communication::{local_link, Mailbox, RingLinks};
use crate::abstractions::ProcessId;
use crate::error::ConfigurationError;
use crate::identifiers::{ensure_ring_size, ensure_unique};

/// A process that can be placed on a ring.
pub trait RingMember {
    type Id: ProcessId;
    type Message: 'static + Send;

    fn id(&self) -> Self::Id;

    /// Ring size the process was constructed for.
    fn ring_size(&self) -> usize;

    fn is_connected(&self) -> bool;

    fn attach(&mut self, links: RingLinks<Self::Message>, mailbox: Mailbox<Self::Message>);
}

/// Wires processes into a bidirectional ring.
///
/// Position `i` sends LEFT into the mailbox of `i - 1` and RIGHT into the
/// mailbox of `i + 1`, both modulo the ring size.
pub struct RingTopology;

impl RingTopology {
    pub fn connect<P: RingMember>(processes: &mut [P]) -> Result<(), ConfigurationError> {
        let size = processes.len();
        ensure_ring_size(size)?;

        let ids: Vec<P::Id> = processes.iter().map(|p| p.id()).collect();
        ensure_unique(&ids)?;

        for process in processes.iter() {
            if process.ring_size() != size {
                return Err(ConfigurationError::MismatchedWiring {
                    reason: format!(
                        "process {:?} expects a ring of {} but {} processes were supplied",
                        process.id(),
                        process.ring_size(),
                        size
                    ),
                });
            }
            if process.is_connected() {
                return Err(ConfigurationError::MismatchedWiring {
                    reason: format!("process {:?} is already connected", process.id()),
                });
            }
        }

        let (senders, mailboxes): (Vec<_>, Vec<_>) = (0..size).map(|_| local_link()).unzip();

        for (i, (process, mailbox)) in processes.iter_mut().zip(mailboxes).enumerate() {
            let links = RingLinks::new(
                senders[Self::left_of(i, size)].clone(),
                senders[Self::right_of(i, size)].clone(),
            );
            process.attach(links, mailbox);
        }

        Ok(())
    }

    pub fn left_of(index: usize, size: usize) -> usize {
        (index + size - 1) % size
    }

    pub fn right_of(index: usize, size: usize) -> usize {
        (index + 1) % size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstractions::communication::{LinkReceiver, LinkSender};
    use crate::abstractions::Direction;

    struct Node {
        id: u32,
        ring_size: usize,
        links: Option<RingLinks<u32>>,
        mailbox: Option<Mailbox<u32>>,
    }

    impl Node {
        fn ring(ids: &[u32]) -> Vec<Node> {
            ids.iter()
                .map(|&id| Node {
                    id,
                    ring_size: ids.len(),
                    links: None,
                    mailbox: None,
                })
                .collect()
        }
    }

    impl RingMember for Node {
        type Id = u32;
        type Message = u32;

        fn id(&self) -> u32 {
            self.id
        }

        fn ring_size(&self) -> usize {
            self.ring_size
        }

        fn is_connected(&self) -> bool {
            self.links.is_some()
        }

        fn attach(&mut self, links: RingLinks<u32>, mailbox: Mailbox<u32>) {
            self.links = Some(links);
            self.mailbox = Some(mailbox);
        }
    }

    #[test]
    fn neighbours_wrap_around() {
        assert_eq!(RingTopology::left_of(0, 5), 4);
        assert_eq!(RingTopology::right_of(4, 5), 0);
        assert_eq!(RingTopology::left_of(3, 5), 2);
    }

    #[test]
    fn links_reach_ring_neighbours() {
        let mut nodes = Node::ring(&[3, 7, 1, 9, 2]);
        RingTopology::connect(&mut nodes).unwrap();

        for i in 0..nodes.len() {
            let id = nodes[i].id;
            let links = nodes[i].links.as_ref().unwrap();
            links.send(Direction::Left, id).unwrap();
            links.send(Direction::Right, id).unwrap();
        }

        for i in 0..nodes.len() {
            let left = nodes[RingTopology::left_of(i, 5)].id;
            let right = nodes[RingTopology::right_of(i, 5)].id;
            let mailbox = nodes[i].mailbox.as_mut().unwrap();

            let mut got = vec![
                mailbox.try_recv().unwrap().unwrap(),
                mailbox.try_recv().unwrap().unwrap(),
            ];
            got.sort();
            let mut expected = vec![left, right];
            expected.sort();
            assert_eq!(got, expected);
            assert_eq!(mailbox.try_recv(), Ok(None));
        }
    }

    #[test]
    fn two_process_ring_links_both_ways_to_the_peer() {
        let mut nodes = Node::ring(&[5, 1]);
        RingTopology::connect(&mut nodes).unwrap();

        let links = nodes[0].links.as_ref().unwrap();
        let (left, right) = (links.neighbor(Direction::Left), links.neighbor(Direction::Right));
        assert!(left.same_mailbox(right));
    }

    #[test]
    fn rejects_small_rings() {
        let mut nodes = Node::ring(&[5]);
        assert_eq!(
            RingTopology::connect(&mut nodes),
            Err(ConfigurationError::RingTooSmall { size: 1 })
        );
    }

    #[test]
    fn rejects_duplicates_before_wiring() {
        let mut nodes = Node::ring(&[5, 1, 5]);
        assert_eq!(
            RingTopology::connect(&mut nodes),
            Err(ConfigurationError::DuplicateIdentifier { id: "5".into() })
        );
        assert!(nodes.iter().all(|n| !n.is_connected()));
    }

    #[test]
    fn rejects_mismatched_ring_size() {
        let mut nodes = Node::ring(&[5, 1, 3]);
        nodes[1].ring_size = 4;
        assert!(matches!(
            RingTopology::connect(&mut nodes),
            Err(ConfigurationError::MismatchedWiring { .. })
        ));
    }

    #[test]
    fn rejects_reconnecting() {
        let mut nodes = Node::ring(&[5, 1]);
        RingTopology::connect(&mut nodes).unwrap();
        assert!(matches!(
            RingTopology::connect(&mut nodes),
            Err(ConfigurationError::MismatchedWiring { .. })
        ));
    }
}
