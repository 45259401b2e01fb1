//! The packet send collaborator.

use std::{
    fmt,
    net::Ipv4Addr,
};

/// Where a datagram goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Local broadcast on the attached link.
    Broadcast,
    /// Unicast to a neighbor or next hop.
    Unicast(Ipv4Addr),
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Destination::Broadcast => write!(f, "{}", Ipv4Addr::BROADCAST),
            Destination::Unicast(address) => write!(f, "{}", address),
        }
    }
}

/// A fully encoded datagram handed to the network layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub destination: Destination,
    /// The IP TTL or RFC 5444 hop limit the datagram is sent with.
    pub ttl: u8,
    pub payload: Vec<u8>,
}

/// Sends datagrams on behalf of an engine.
pub trait Network {
    fn send(&mut self, datagram: Datagram);
}

/// A `Network` that queues datagrams for the host to collect.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Vec<Datagram>,
}

impl Outbox {
    pub fn new() -> Self {
        Outbox::default()
    }

    /// Takes every queued datagram, oldest first.
    pub fn drain(&mut self) -> Vec<Datagram> {
        std::mem::replace(&mut self.queue, Vec::new())
    }

    pub fn queued(&self) -> &[Datagram] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Network for Outbox {
    fn send(&mut self, datagram: Datagram) {
        debug!("Queued {} bytes to {} (ttl {})", datagram.payload.len(), datagram.destination, datagram.ttl);
        self.queue.push(datagram);
    }
}
