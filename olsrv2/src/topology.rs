//! The Topology Information Base and the duplicate sets (RFC 7181 §5, §10).
//!
//! Every remote tuple carries the ANSN of the TC it came from. A complete TC
//! flushes the older tuples of its originator.

use std::net::Ipv4Addr;

use routing_core::{seq_greater_u16, time_before, Error, Time};

/// The last ANSN heard from an originator of TCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingRouter {
    pub originator: Ipv4Addr,
    pub seq: u16,
    pub expiry: Time,
}

/// A link between two routers, `from` advertising `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterTopology {
    pub from: Ipv4Addr,
    pub to: Ipv4Addr,
    pub seq: u16,
    pub metric: u32,
    pub expiry: Time,
}

/// An address reachable through a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutableAddress {
    pub from: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub prefix: u8,
    pub seq: u16,
    pub metric: u32,
    pub expiry: Time,
}

/// A network attached to a gateway router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachedNetwork {
    pub network: Ipv4Addr,
    pub prefix: u8,
    pub gateway: Ipv4Addr,
    pub distance: u8,
    pub seq: u16,
    pub metric: u32,
    pub expiry: Time,
}

/// A network attached to this node, advertised in its TCs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalNetwork {
    pub network: Ipv4Addr,
    pub prefix: u8,
    pub distance: u8,
    pub metric: u32,
}

/// A message seen before, identified the way RFC 7181 §10 does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeenMessage {
    pub kind: u8,
    pub originator: Ipv4Addr,
    pub seq: u16,
    pub expiry: Time,
}

#[derive(Debug)]
pub struct DuplicateSet {
    seen: Vec<SeenMessage>,
    capacity: usize,
}

impl DuplicateSet {
    pub fn new(capacity: usize) -> Self {
        DuplicateSet {
            seen: Vec::new(),
            capacity,
        }
    }

    pub fn contains(&self, kind: u8, originator: Ipv4Addr, seq: u16) -> bool {
        self.seen
            .iter()
            .any(|seen| seen.kind == kind && seen.originator == originator && seen.seq == seq)
    }

    pub fn insert(&mut self, kind: u8, originator: Ipv4Addr, seq: u16, expiry: Time) -> Result<(), Error> {
        if self.contains(kind, originator, seq) {
            return Ok(());
        }
        if self.seen.len() >= self.capacity {
            return Err(Error::ResourceExhausted(self.capacity));
        }
        self.seen.push(SeenMessage {
            kind,
            originator,
            seq,
            expiry,
        });
        Ok(())
    }

    pub fn purge(&mut self, now: Time) -> usize {
        let before = self.seen.len();
        self.seen.retain(|seen| !time_before(seen.expiry, now));
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// How a TC relates to what is known about its originator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Newer than anything recorded, or the first one.
    New,
    /// The recorded ANSN again.
    Same,
    Stale,
}

#[derive(Debug)]
pub struct TopologySet {
    advertising: Vec<AdvertisingRouter>,
    routers: Vec<RouterTopology>,
    routable: Vec<RoutableAddress>,
    attached: Vec<AttachedNetwork>,
    local: Vec<LocalNetwork>,
    capacity: usize,
}

impl TopologySet {
    pub fn new(capacity: usize) -> Self {
        TopologySet {
            advertising: Vec::new(),
            routers: Vec::new(),
            routable: Vec::new(),
            attached: Vec::new(),
            local: Vec::new(),
            capacity,
        }
    }

    pub fn freshness(&self, originator: Ipv4Addr, seq: u16) -> Freshness {
        match self.advertising.iter().find(|router| router.originator == originator) {
            None => Freshness::New,
            Some(router) if router.seq == seq => Freshness::Same,
            Some(router) if seq_greater_u16(seq, router.seq) => Freshness::New,
            Some(_) => Freshness::Stale,
        }
    }

    /// Records the ANSN of an accepted TC.
    pub fn advertise(&mut self, originator: Ipv4Addr, seq: u16, expiry: Time) -> Result<(), Error> {
        match self
            .advertising
            .iter_mut()
            .find(|router| router.originator == originator)
        {
            Some(router) => {
                router.seq = seq;
                router.expiry = expiry;
            }
            None => {
                check_capacity(self.advertising.len(), self.capacity)?;
                self.advertising.push(AdvertisingRouter {
                    originator,
                    seq,
                    expiry,
                });
            }
        }
        Ok(())
    }

    /// Extends every tuple of `originator` up to `expiry`.
    pub fn refresh(&mut self, originator: Ipv4Addr, expiry: Time) {
        for router in self.advertising.iter_mut().filter(|router| router.originator == originator) {
            router.expiry = expiry;
        }
        for tuple in self.routers.iter_mut().filter(|tuple| tuple.from == originator) {
            tuple.expiry = expiry;
        }
        for tuple in self.routable.iter_mut().filter(|tuple| tuple.from == originator) {
            tuple.expiry = expiry;
        }
        for tuple in self.attached.iter_mut().filter(|tuple| tuple.gateway == originator) {
            tuple.expiry = expiry;
        }
    }

    pub fn add_router(&mut self, tuple: RouterTopology) -> Result<(), Error> {
        match self
            .routers
            .iter_mut()
            .find(|known| known.from == tuple.from && known.to == tuple.to)
        {
            Some(known) => *known = tuple,
            None => {
                check_capacity(self.routers.len(), self.capacity)?;
                self.routers.push(tuple);
            }
        }
        Ok(())
    }

    pub fn add_routable(&mut self, tuple: RoutableAddress) -> Result<(), Error> {
        match self.routable.iter_mut().find(|known| {
            known.from == tuple.from && known.destination == tuple.destination && known.prefix == tuple.prefix
        }) {
            Some(known) => *known = tuple,
            None => {
                check_capacity(self.routable.len(), self.capacity)?;
                self.routable.push(tuple);
            }
        }
        Ok(())
    }

    pub fn add_attached(&mut self, tuple: AttachedNetwork) -> Result<(), Error> {
        match self.attached.iter_mut().find(|known| {
            known.gateway == tuple.gateway && known.network == tuple.network && known.prefix == tuple.prefix
        }) {
            Some(known) => *known = tuple,
            None => {
                check_capacity(self.attached.len(), self.capacity)?;
                self.attached.push(tuple);
            }
        }
        Ok(())
    }

    /// Drops the tuples of `originator` older than `seq`.
    pub fn flush_older(&mut self, originator: Ipv4Addr, seq: u16) -> usize {
        let before = self.remote_len();
        self.routers
            .retain(|tuple| tuple.from != originator || !seq_greater_u16(seq, tuple.seq));
        self.routable
            .retain(|tuple| tuple.from != originator || !seq_greater_u16(seq, tuple.seq));
        self.attached
            .retain(|tuple| tuple.gateway != originator || !seq_greater_u16(seq, tuple.seq));
        before - self.remote_len()
    }

    /// Drops the expired tuples, returning how many went.
    pub fn purge(&mut self, now: Time) -> usize {
        let before = self.remote_len() + self.advertising.len();
        self.advertising.retain(|tuple| !time_before(tuple.expiry, now));
        self.routers.retain(|tuple| !time_before(tuple.expiry, now));
        self.routable.retain(|tuple| !time_before(tuple.expiry, now));
        self.attached.retain(|tuple| !time_before(tuple.expiry, now));
        before - self.remote_len() - self.advertising.len()
    }

    pub fn add_local(&mut self, network: LocalNetwork) -> Result<(), Error> {
        match self
            .local
            .iter_mut()
            .find(|known| known.network == network.network && known.prefix == network.prefix)
        {
            Some(known) => *known = network,
            None => {
                check_capacity(self.local.len(), self.capacity)?;
                self.local.push(network);
            }
        }
        Ok(())
    }

    pub fn remove_local(&mut self, network: Ipv4Addr, prefix: u8) -> bool {
        let before = self.local.len();
        self.local
            .retain(|known| known.network != network || known.prefix != prefix);
        before != self.local.len()
    }

    pub fn advertising(&self) -> &[AdvertisingRouter] {
        &self.advertising
    }

    pub fn routers(&self) -> &[RouterTopology] {
        &self.routers
    }

    pub fn routable(&self) -> &[RoutableAddress] {
        &self.routable
    }

    pub fn attached(&self) -> &[AttachedNetwork] {
        &self.attached
    }

    pub fn local(&self) -> &[LocalNetwork] {
        &self.local
    }

    fn remote_len(&self) -> usize {
        self.routers.len() + self.routable.len() + self.attached.len()
    }
}

fn check_capacity(len: usize, capacity: usize) -> Result<(), Error> {
    if len >= capacity {
        Err(Error::ResourceExhausted(capacity))
    } else {
        Ok(())
    }
}
