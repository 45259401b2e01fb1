//! The route table.
//!
//! Routes are kept sorted by destination. A lookup walks the table in
//! ascending order and expires every stale entry it passes on the way, so a
//! lookup can invalidate routes; the caller handles the fallout.

use std::{net::Ipv4Addr, time::Duration};

use routing_core::{seq_greater, time_before, Error, Time};

/// A host route.
pub const HOST_NETMASK: Ipv4Addr = Ipv4Addr::BROADCAST;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub destination: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub seq: u32,
    pub seq_valid: bool,
    pub hop_count: u8,
    pub next_hop: Ipv4Addr,
    pub lifetime: Time,
    pub valid: bool,
    /// The node's route to itself. It never expires and is never overwritten.
    pub self_route: bool,
}

impl Route {
    pub fn new(destination: Ipv4Addr, next_hop: Ipv4Addr, hop_count: u8, lifetime: Time) -> Self {
        Route {
            destination,
            netmask: HOST_NETMASK,
            seq: 0,
            seq_valid: false,
            hop_count,
            next_hop,
            lifetime,
            valid: true,
            self_route: false,
        }
    }

    pub fn with_seq(mut self, seq: u32) -> Self {
        self.seq = seq;
        self.seq_valid = true;
        self
    }

    /// The next hop is the destination itself.
    pub fn is_neighbor_route(&self) -> bool {
        self.next_hop == self.destination
    }

    /// Whether fresher information replaces this route (RFC 3561 §6.2).
    ///
    /// A newer sequence number always wins. The same sequence number wins
    /// with a strictly shorter path. Two cases go beyond that rule: a route
    /// without a known sequence number takes any update, and an invalid
    /// route takes the same sequence number at any hop count. An older
    /// sequence number never wins.
    pub fn accepts(&self, seq: u32, hop_count: u8) -> bool {
        if self.self_route {
            return false;
        }
        if !self.seq_valid || seq_greater(seq, self.seq) {
            return true;
        }
        seq == self.seq && (!self.valid || hop_count < self.hop_count)
    }
}

/// The routes of one node.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
    capacity: usize,
    delete_period: Duration,
}

impl RouteTable {
    pub fn new(capacity: usize, delete_period: Duration) -> Self {
        RouteTable {
            routes: Vec::new(),
            capacity,
            delete_period,
        }
    }

    /// Looks a destination up, expiring the stale routes on the way.
    ///
    /// Returns the route, if any, and every route that went from valid to
    /// invalid during the walk. Invalid routes whose delete period has passed
    /// are removed.
    pub fn find(&mut self, now: Time, destination: Ipv4Addr) -> (Option<Route>, Vec<Route>) {
        let key = u32::from(destination);
        let mut expired = Vec::new();
        let mut index = 0;
        while index < self.routes.len() {
            if u32::from(self.routes[index].destination) > key {
                break;
            }
            match self.sweep(now, index) {
                Sweep::Kept => index += 1,
                Sweep::Expired(route) => {
                    expired.push(route);
                    index += 1;
                }
                Sweep::Removed => {}
            }
        }
        (self.get(destination).copied(), expired)
    }

    /// Walks the whole table the way `find` walks a prefix of it.
    pub fn purge(&mut self, now: Time) -> Vec<Route> {
        let mut expired = Vec::new();
        let mut index = 0;
        while index < self.routes.len() {
            match self.sweep(now, index) {
                Sweep::Kept => index += 1,
                Sweep::Expired(route) => {
                    expired.push(route);
                    index += 1;
                }
                Sweep::Removed => {}
            }
        }
        expired
    }

    /// Invalidates a valid route.
    ///
    /// The sequence number is bumped so the loss is news to the neighbors,
    /// and the route lingers for the delete period.
    pub fn expire(&mut self, now: Time, destination: Ipv4Addr) -> Option<Route> {
        let delete_period = self.delete_period;
        let route = self.get_mut(destination)?;
        if !route.valid || route.self_route {
            return None;
        }
        route.valid = false;
        if route.seq_valid {
            route.seq = route.seq.wrapping_add(1);
        }
        route.lifetime = now + delete_period;
        Some(*route)
    }

    /// Inserts or replaces the route to `route.destination`.
    pub fn insert(&mut self, route: Route) -> Result<(), Error> {
        match self.position(route.destination) {
            Ok(index) => self.routes[index] = route,
            Err(index) => {
                if self.routes.len() >= self.capacity {
                    return Err(Error::ResourceExhausted(self.capacity));
                }
                self.routes.insert(index, route);
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, destination: Ipv4Addr) -> Option<Route> {
        let index = self.position(destination).ok()?;
        Some(self.routes.remove(index))
    }

    pub fn get(&self, destination: Ipv4Addr) -> Option<&Route> {
        let index = self.position(destination).ok()?;
        self.routes.get(index)
    }

    pub fn get_mut(&mut self, destination: Ipv4Addr) -> Option<&mut Route> {
        let index = self.position(destination).ok()?;
        self.routes.get_mut(index)
    }

    /// The valid routes forwarding through `next_hop`.
    pub fn via(&self, next_hop: Ipv4Addr) -> Vec<Ipv4Addr> {
        self.routes
            .iter()
            .filter(|route| route.valid && !route.self_route && route.next_hop == next_hop)
            .map(|route| route.destination)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn position(&self, destination: Ipv4Addr) -> Result<usize, usize> {
        let key = u32::from(destination);
        self.routes
            .binary_search_by_key(&key, |route| u32::from(route.destination))
    }

    fn sweep(&mut self, now: Time, index: usize) -> Sweep {
        let route = self.routes[index];
        if route.self_route || !time_before(route.lifetime, now) {
            return Sweep::Kept;
        }
        if route.valid {
            match self.expire(now, route.destination) {
                Some(expired) => Sweep::Expired(expired),
                None => Sweep::Kept,
            }
        } else {
            trace!("Removing the route to {}", route.destination);
            self.routes.remove(index);
            Sweep::Removed
        }
    }
}

enum Sweep {
    Kept,
    Expired(Route),
    Removed,
}
