//! The routing table collaborator.
//!
//! Both route-producing engines push every install, refresh and removal
//! through this interface; what backs it (a kernel table, a simulated
//! forwarding table) is the host's business.

use std::{
    collections::BTreeMap,
    net::Ipv4Addr,
};

/// One forwarding entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub destination: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub next_hop: Ipv4Addr,
    pub interface: u32,
}

pub trait RoutingTable {
    fn add_or_update_route(
        &mut self,
        destination: Ipv4Addr,
        netmask: Ipv4Addr,
        next_hop: Ipv4Addr,
        interface: u32,
    );

    fn delete_route(&mut self, destination: Ipv4Addr, netmask: Ipv4Addr);
}

/// An in-memory forwarding table with longest-prefix lookup.
#[derive(Debug, Default)]
pub struct MemoryRoutingTable {
    entries: BTreeMap<(u32, u32), RouteEntry>,
    changes: usize,
}

impl MemoryRoutingTable {
    pub fn new() -> Self {
        MemoryRoutingTable::default()
    }

    /// The exact entry for a destination prefix.
    pub fn get(&self, destination: Ipv4Addr, netmask: Ipv4Addr) -> Option<&RouteEntry> {
        self.entries.get(&(u32::from(destination), u32::from(netmask)))
    }

    /// The most specific entry covering `address`.
    pub fn lookup(&self, address: Ipv4Addr) -> Option<&RouteEntry> {
        let address = u32::from(address);
        self.entries
            .values()
            .filter(|entry| {
                let mask = u32::from(entry.netmask);
                address & mask == u32::from(entry.destination) & mask
            })
            .max_by_key(|entry| u32::from(entry.netmask).count_ones())
    }

    pub fn entries(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many mutations the table has seen.
    pub fn changes(&self) -> usize {
        self.changes
    }
}

impl RoutingTable for MemoryRoutingTable {
    fn add_or_update_route(
        &mut self,
        destination: Ipv4Addr,
        netmask: Ipv4Addr,
        next_hop: Ipv4Addr,
        interface: u32,
    ) {
        debug!("Route {}/{} via {} on {}", destination, netmask, next_hop, interface);
        self.changes += 1;
        self.entries.insert(
            (u32::from(destination), u32::from(netmask)),
            RouteEntry {
                destination,
                netmask,
                next_hop,
                interface,
            },
        );
    }

    fn delete_route(&mut self, destination: Ipv4Addr, netmask: Ipv4Addr) {
        if self
            .entries
            .remove(&(u32::from(destination), u32::from(netmask)))
            .is_some()
        {
            debug!("Route {}/{} deleted", destination, netmask);
            self.changes += 1;
        }
    }
}
