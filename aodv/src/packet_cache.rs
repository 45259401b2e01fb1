//! Data packets waiting for a route.

use std::net::Ipv4Addr;

use routing_core::{time_before, Error, Time};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPacket {
    pub destination: Ipv4Addr,
    pub payload: Vec<u8>,
    pub expiry: Time,
}

#[derive(Debug)]
pub struct PacketCache {
    packets: Vec<CachedPacket>,
    capacity: usize,
}

impl PacketCache {
    pub fn new(capacity: usize) -> Self {
        PacketCache {
            packets: Vec::new(),
            capacity,
        }
    }

    pub fn push(&mut self, packet: CachedPacket) -> Result<(), Error> {
        if self.packets.len() >= self.capacity {
            return Err(Error::ResourceExhausted(self.capacity));
        }
        self.packets.push(packet);
        Ok(())
    }

    /// Takes the unexpired packets for `destination`, oldest first.
    pub fn take(&mut self, now: Time, destination: Ipv4Addr) -> Vec<CachedPacket> {
        let (taken, kept): (Vec<CachedPacket>, Vec<CachedPacket>) = self
            .packets
            .drain(..)
            .partition(|packet| packet.destination == destination);
        self.packets = kept;
        taken
            .into_iter()
            .filter(|packet| !time_before(packet.expiry, now))
            .collect()
    }

    /// Drops every packet for `destination`.
    pub fn drop_destination(&mut self, destination: Ipv4Addr) -> usize {
        let before = self.packets.len();
        self.packets.retain(|packet| packet.destination != destination);
        before - self.packets.len()
    }

    pub fn purge(&mut self, now: Time) -> usize {
        let before = self.packets.len();
        self.packets.retain(|packet| !time_before(packet.expiry, now));
        before - self.packets.len()
    }

    pub fn count(&self, destination: Ipv4Addr) -> usize {
        self.packets
            .iter()
            .filter(|packet| packet.destination == destination)
            .count()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}
