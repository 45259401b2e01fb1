//! The AODV control plane of one node (RFC 3561 §6).

use std::{net::Ipv4Addr, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};

use routing_core::{seq_greater, Datagram, Destination, Network, RoutingTable, Scheduler, Time};

use crate::{
    config::Config,
    error::Error,
    flood_id::{FloodId, FloodIdCache},
    neighbor::NeighborTable,
    packet::{Packet, Rerr, Rrep, Rreq, Unreachable, MAX_RERR_DESTINATIONS},
    packet_cache::{CachedPacket, PacketCache},
    route::{Route, RouteTable, HOST_NETMASK},
    task::{Task, TaskType},
};

/// What the host does with a data packet it asked a route for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Send it to this next hop now.
    Forward(Ipv4Addr),
    /// The engine keeps the packet until route discovery ends.
    Deferred,
}

/// A cached data packet whose route has been found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deliverable {
    pub destination: Ipv4Addr,
    pub next_hop: Ipv4Addr,
    pub payload: Vec<u8>,
}

/// The engine of one node on one interface.
pub struct Engine<N, R> {
    config: Config,
    address: Ipv4Addr,
    interface: u32,
    network: N,
    routing: R,
    rng: StdRng,
    scheduler: Scheduler<Task>,

    seq: u32,
    rreq_id: u32,
    routes: RouteTable,
    neighbors: NeighborTable,
    flood_ids: FloodIdCache,
    packets: PacketCache,
    deliverable: Vec<Deliverable>,
}

impl<N, R> Engine<N, R>
where
    N: Network,
    R: RoutingTable,
{
    pub fn new(address: Ipv4Addr, interface: u32, config: Config, network: N, routing: R) -> Result<Self, Error> {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut routes = RouteTable::new(config.max_routes, config.delete_period);
        let mut self_route = Route::new(address, address, 0, Time::ZERO).with_seq(0);
        self_route.self_route = true;
        routes.insert(self_route)?;

        Ok(Engine {
            neighbors: NeighborTable::new(config.max_neighbors),
            flood_ids: FloodIdCache::new(config.max_flood_ids),
            packets: PacketCache::new(config.max_cached_packets),
            config,
            address,
            interface,
            network,
            routing,
            rng,
            scheduler: Scheduler::new(),

            seq: 0,
            rreq_id: 0,
            routes,
            deliverable: Vec::new(),
        })
    }

    /// Announces the node and starts the periodic work.
    pub fn start(&mut self, now: Time) -> Result<(), Error> {
        info!("AODV starting on {}", self.address);
        self.scheduler.schedule(now, self.config.cleanup_interval, Task::Cleanup);
        self.send_hello(now)
    }

    /// Feeds a control message received from the neighbor `sender` with the IP TTL `ttl`.
    pub fn handle_message(&mut self, now: Time, sender: Ipv4Addr, ttl: u8, bytes: &[u8]) -> Result<(), Error> {
        if sender == self.address {
            trace!("Ignoring an own message");
            return Ok(());
        }
        let packet = match Packet::from_bytes(bytes) {
            Ok(packet) => packet,
            Err(error) => {
                warn!("Discarding a message from {}: {}", sender, error);
                return Ok(());
            }
        };
        debug!("Received {} from {} (ttl {})", packet, sender, ttl);

        match packet {
            Packet::Rreq(rreq) => self.recv_rreq(now, sender, ttl, rreq),
            Packet::Rrep(rrep) if rrep.is_hello() => self.recv_hello(now, sender, rrep),
            Packet::Rrep(rrep) => self.recv_rrep(now, sender, ttl, rrep),
            Packet::Rerr(rerr) => self.recv_rerr(now, sender, rerr),
        }
    }

    /// Fires every task due at `now`.
    ///
    /// A failing task is logged and does not hold back the others.
    pub fn handle_timers(&mut self, now: Time) -> Result<(), Error> {
        while let Some((ticket, task)) = self.scheduler.pop_due(now) {
            trace!("Firing {:?} ({})", task, ticket);
            let result = match task {
                Task::ResendRreq { destination, retries } => self.resend_rreq(now, destination, retries),
                Task::Hello => self.send_hello(now),
                Task::NeighborExpiry(address) => self.delete_neighbor(now, address),
                Task::Cleanup => self.cleanup(now),
            };
            if let Err(error) = result {
                warn!("{:?} ({}) failed: {}", task, ticket, error);
            }
        }
        Ok(())
    }

    pub fn next_deadline(&mut self) -> Option<Time> {
        self.scheduler.next_deadline()
    }

    /// Routes a data packet for `destination`.
    ///
    /// Without a valid route the packet is cached and a route request goes
    /// out, unless one is already running for the destination.
    pub fn output_handler(&mut self, now: Time, destination: Ipv4Addr, payload: Vec<u8>) -> Result<Output, Error> {
        if let Some(next_hop) = self.route_for(now, destination)? {
            let active_until = now + self.config.active_route_timeout;
            if let Some(route) = self.routes.get_mut(destination) {
                route.lifetime = route.lifetime.max(active_until);
            }
            return Ok(Output::Forward(next_hop));
        }

        let expiry = now + self.config.route_discovery_time();
        self.packets.push(CachedPacket {
            destination,
            payload,
            expiry,
        })?;
        self.gen_rreq(now, destination, self.config.rreq_retries)?;
        Ok(Output::Deferred)
    }

    /// The next hop towards `destination`, if a valid route exists.
    pub fn route_for(&mut self, now: Time, destination: Ipv4Addr) -> Result<Option<Ipv4Addr>, Error> {
        Ok(self
            .find_route(now, destination)?
            .filter(|route| route.valid)
            .map(|route| route.next_hop))
    }

    /// Drops a neighbor and invalidates every route through it.
    ///
    /// The invalidated routes are reported in a single RERR.
    pub fn delete_neighbor(&mut self, now: Time, address: Ipv4Addr) -> Result<(), Error> {
        if self.neighbors.remove(address).is_none() {
            trace!("Neighbor {} is already gone", address);
            return Ok(());
        }
        info!("Lost neighbor {}", address);
        self.scheduler.cancel_key(&(TaskType::NeighborExpiry, address));
        self.gen_rerr(now, address, Vec::new())
    }

    /// Cached packets released by route discovery, oldest first.
    pub fn drain_deliverable(&mut self) -> Vec<Deliverable> {
        std::mem::replace(&mut self.deliverable, Vec::new())
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    pub fn flood_ids(&self) -> &FloodIdCache {
        &self.flood_ids
    }

    pub fn cached_packets(&self, destination: Ipv4Addr) -> usize {
        self.packets.count(destination)
    }

    pub fn is_scheduled(&self, task: TaskType, id: Ipv4Addr) -> bool {
        self.scheduler.find_outstanding(&(task, id)).is_some()
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn routing(&self) -> &R {
        &self.routing
    }

    fn gen_rreq(&mut self, now: Time, destination: Ipv4Addr, retries: u8) -> Result<(), Error> {
        let key = (TaskType::ResendRreq, destination);
        if self.scheduler.find_outstanding(&key).is_some() {
            debug!("Route discovery for {} is already running", destination);
            return Ok(());
        }
        if !self.flood_ids.has_room(now) {
            return Err(Error::ResourceExhausted(self.config.max_flood_ids));
        }

        self.seq = self.seq.wrapping_add(1);
        self.rreq_id = self.rreq_id.wrapping_add(1);
        let rreq_id = self.rreq_id;
        let known_seq = self
            .routes
            .get(destination)
            .filter(|route| route.seq_valid)
            .map(|route| route.seq);
        let rreq = Rreq {
            join: false,
            repair: false,
            gratuitous: false,
            destination_only: false,
            unknown_seq: known_seq.is_none(),
            hop_count: 0,
            rreq_id,
            destination,
            destination_seq: known_seq.unwrap_or(0),
            originator: self.address,
            originator_seq: self.seq,
        };

        self.flood_ids.insert(FloodId {
            source: self.address,
            destination,
            rreq_id,
            lifetime: now + self.config.path_discovery_time(),
        })?;
        info!("Looking for a route to {} (RREQ id {}, {} retries left)", destination, rreq_id, retries);
        self.send(Destination::Broadcast, self.config.net_diameter, Packet::Rreq(rreq))?;

        let attempt = self.config.rreq_retries.saturating_sub(retries).min(31);
        let delay = self.config.net_traversal_time() * (1u32 << attempt);
        self.scheduler.schedule(now, delay, Task::ResendRreq { destination, retries });
        Ok(())
    }

    fn resend_rreq(&mut self, now: Time, destination: Ipv4Addr, retries: u8) -> Result<(), Error> {
        if self.route_for(now, destination)?.is_some() {
            debug!("A route to {} has been found meanwhile", destination);
            return Ok(());
        }
        if retries == 0 {
            let dropped = self.packets.drop_destination(destination);
            warn!("No route to {} found, dropping {} packets", destination, dropped);
            return Ok(());
        }
        self.gen_rreq(now, destination, retries - 1)
    }

    fn recv_rreq(&mut self, now: Time, sender: Ipv4Addr, ttl: u8, mut rreq: Rreq) -> Result<(), Error> {
        if ttl <= 1 {
            debug!("Dropping the RREQ of {}: TTL exhausted", rreq.originator);
            return Ok(());
        }
        if rreq.originator == self.address {
            trace!("Dropping an own RREQ");
            return Ok(());
        }
        if self.flood_ids.contains(now, rreq.originator, rreq.rreq_id) {
            debug!("Dropping a duplicate RREQ {} of {}", rreq.rreq_id, rreq.originator);
            return Ok(());
        }
        if !self.neighbors.is_valid(sender) {
            warn!("Dropping the RREQ of {}: {} is not a neighbor", rreq.originator, sender);
            return Ok(());
        }
        if !self.flood_ids.has_room(now) {
            warn!("Dropping the RREQ of {}: flood id cache full", rreq.originator);
            return Ok(());
        }

        rreq.hop_count = rreq.hop_count.saturating_add(1);
        let reverse_lifetime = (self.config.net_traversal_time() * 2)
            .checked_sub(self.config.node_traversal_time * 2 * u32::from(rreq.hop_count))
            .unwrap_or_default();
        self.update_route(
            now,
            rreq.originator,
            sender,
            rreq.originator_seq,
            rreq.hop_count,
            now + reverse_lifetime,
        )?;
        self.flood_ids.insert(FloodId {
            source: rreq.originator,
            destination: rreq.destination,
            rreq_id: rreq.rreq_id,
            lifetime: now + self.config.path_discovery_time(),
        })?;

        if rreq.destination == self.address {
            if !rreq.unknown_seq && !seq_greater(self.seq, rreq.destination_seq) {
                self.seq = rreq.destination_seq.wrapping_add(1);
            }
            let rrep = Rrep {
                repair: false,
                ack_required: false,
                prefix_size: 0,
                hop_count: 0,
                destination: self.address,
                destination_seq: self.seq,
                originator: rreq.originator,
                lifetime: millis(self.config.my_route_timeout),
            };
            let next_hop = self.reverse_next_hop(rreq.originator).unwrap_or(sender);
            info!("Answering the RREQ of {} through {}", rreq.originator, next_hop);
            return self.send(Destination::Unicast(next_hop), self.config.net_diameter, Packet::Rrep(rrep));
        }

        if let Some(route) = self.find_route(now, rreq.destination)? {
            if route.seq_valid && (rreq.unknown_seq || seq_greater(route.seq, rreq.destination_seq)) {
                rreq.destination_seq = route.seq;
                rreq.unknown_seq = false;
            }
        }
        info!("Forwarding the RREQ of {} for {}", rreq.originator, rreq.destination);
        self.send(Destination::Broadcast, ttl - 1, Packet::Rreq(rreq))
    }

    fn recv_rrep(&mut self, now: Time, sender: Ipv4Addr, ttl: u8, mut rrep: Rrep) -> Result<(), Error> {
        if !self.neighbors.is_valid(sender) {
            warn!("Dropping the RREP of {}: {} is not a neighbor", rrep.destination, sender);
            return Ok(());
        }
        if self
            .scheduler
            .cancel_key(&(TaskType::ResendRreq, rrep.destination))
            > 0
        {
            debug!("Route discovery for {} answered", rrep.destination);
        }

        rrep.hop_count = rrep.hop_count.saturating_add(1);
        let lifetime = now + Duration::from_millis(u64::from(rrep.lifetime));
        self.update_route(
            now,
            rrep.destination,
            sender,
            rrep.destination_seq,
            rrep.hop_count,
            lifetime,
        )?;

        if rrep.originator == self.address {
            info!("Route to {} discovered", rrep.destination);
            return Ok(());
        }

        let next_hop = match self
            .find_route(now, rrep.originator)?
            .filter(|route| route.valid)
        {
            Some(route) => route.next_hop,
            None => {
                warn!("Dropping the RREP of {}: no route back to {}", rrep.destination, rrep.originator);
                return Ok(());
            }
        };
        if ttl <= 1 {
            debug!("Dropping the RREP of {}: TTL exhausted", rrep.destination);
            return Ok(());
        }
        let active_until = now + self.config.active_route_timeout;
        if let Some(route) = self.routes.get_mut(rrep.originator) {
            route.lifetime = route.lifetime.max(active_until);
        }
        info!("Forwarding the RREP of {} to {}", rrep.destination, next_hop);
        self.send(Destination::Unicast(next_hop), ttl - 1, Packet::Rrep(rrep))
    }

    fn recv_hello(&mut self, now: Time, sender: Ipv4Addr, hello: Rrep) -> Result<(), Error> {
        let neighbor = hello.destination;
        if neighbor != sender {
            warn!("Dropping a HELLO of {} relayed by {}", neighbor, sender);
            return Ok(());
        }

        let timeout = self.config.neighbor_timeout();
        if self.neighbors.refresh(neighbor, now + timeout)? {
            info!("New neighbor {}", neighbor);
        }
        self.scheduler.cancel_key(&(TaskType::NeighborExpiry, neighbor));
        self.scheduler.schedule(now, timeout, Task::NeighborExpiry(neighbor));

        let lifetime = now + Duration::from_millis(u64::from(hello.lifetime));
        self.update_route(now, neighbor, neighbor, hello.destination_seq, 1, lifetime)?;
        Ok(())
    }

    fn recv_rerr(&mut self, now: Time, sender: Ipv4Addr, rerr: Rerr) -> Result<(), Error> {
        let mut unreachable = Vec::new();
        for reported in rerr.unreachable {
            match self.routes.get(reported.address) {
                Some(route) if route.valid && route.next_hop == sender => {}
                _ => continue,
            }
            if let Some(mut route) = self.routes.expire(now, reported.address) {
                if seq_greater(reported.seq, route.seq) {
                    if let Some(stored) = self.routes.get_mut(reported.address) {
                        stored.seq = reported.seq;
                    }
                    route.seq = reported.seq;
                }
                info!("Route to {} broken upstream at {}", route.destination, sender);
                self.routing.delete_route(route.destination, route.netmask);
                unreachable.push(Unreachable {
                    address: route.destination,
                    seq: route.seq,
                });
            }
        }
        self.send_rerr(unreachable)
    }

    /// Invalidates the routes through `next_hop` and reports them along with `unreachable`.
    fn gen_rerr(&mut self, now: Time, next_hop: Ipv4Addr, mut unreachable: Vec<Unreachable>) -> Result<(), Error> {
        for destination in self.routes.via(next_hop) {
            if let Some(route) = self.routes.expire(now, destination) {
                info!("Route to {} lost with {}", route.destination, next_hop);
                self.routing.delete_route(route.destination, route.netmask);
                unreachable.push(Unreachable {
                    address: route.destination,
                    seq: route.seq,
                });
            }
        }
        self.send_rerr(unreachable)
    }

    fn send_rerr(&mut self, unreachable: Vec<Unreachable>) -> Result<(), Error> {
        for chunk in unreachable.chunks(MAX_RERR_DESTINATIONS) {
            let rerr = Rerr {
                no_delete: false,
                unreachable: chunk.to_vec(),
            };
            self.send(Destination::Broadcast, 1, Packet::Rerr(rerr))?;
        }
        Ok(())
    }

    fn send_hello(&mut self, now: Time) -> Result<(), Error> {
        let hello = Rrep {
            repair: false,
            ack_required: false,
            prefix_size: 0,
            hop_count: 0,
            destination: self.address,
            destination_seq: self.seq,
            originator: self.address,
            lifetime: millis(self.config.hello_lifetime()),
        };
        let interval = self.config.hello_interval;
        let jitter = Duration::from_millis(self.rng.gen_range(0..=millis(interval) as u64 / 20));
        self.scheduler.schedule(now, interval - jitter, Task::Hello);

        self.send(Destination::Broadcast, 1, Packet::Rrep(hello))
    }

    fn cleanup(&mut self, now: Time) -> Result<(), Error> {
        self.scheduler.schedule(now, self.config.cleanup_interval, Task::Cleanup);
        let forgotten = self.flood_ids.purge(now);
        let dropped = self.packets.purge(now);
        if forgotten > 0 || dropped > 0 {
            trace!("Forgot {} flood ids and {} cached packets", forgotten, dropped);
        }
        for route in self.routes.purge(now) {
            self.route_expired(now, route)?;
        }
        Ok(())
    }

    /// Looks a route up, handling the routes the lookup expires.
    fn find_route(&mut self, now: Time, destination: Ipv4Addr) -> Result<Option<Route>, Error> {
        let (_, expired) = self.routes.find(now, destination);
        for route in expired {
            self.route_expired(now, route)?;
        }
        Ok(self.routes.get(destination).copied())
    }

    /// The fallout of a route whose lifetime ran out.
    fn route_expired(&mut self, now: Time, route: Route) -> Result<(), Error> {
        info!("Route to {} expired", route.destination);
        self.routing.delete_route(route.destination, route.netmask);
        if route.is_neighbor_route() {
            let unreachable = vec![Unreachable {
                address: route.destination,
                seq: route.seq,
            }];
            self.gen_rerr(now, route.destination, unreachable)?;
        }
        Ok(())
    }

    /// Applies a route advertisement unless the known route is at least as good.
    fn update_route(
        &mut self,
        now: Time,
        destination: Ipv4Addr,
        next_hop: Ipv4Addr,
        seq: u32,
        hop_count: u8,
        lifetime: Time,
    ) -> Result<bool, Error> {
        let existing = self.find_route(now, destination)?;
        let lifetime = match existing {
            Some(route) if route.self_route => {
                warn!("Refusing to overwrite the route to self from {}", next_hop);
                return Ok(false);
            }
            Some(route) if !route.accepts(seq, hop_count) => {
                if route.valid && route.next_hop == next_hop && route.seq == seq {
                    if let Some(stored) = self.routes.get_mut(destination) {
                        stored.lifetime = stored.lifetime.max(lifetime);
                    }
                }
                debug!(
                    "Keeping the route to {} via {} (seq {}, {} hops)",
                    destination, route.next_hop, route.seq, route.hop_count
                );
                return Ok(false);
            }
            Some(route) if route.valid => route.lifetime.max(lifetime),
            _ => lifetime,
        };

        self.routes
            .insert(Route::new(destination, next_hop, hop_count, lifetime).with_seq(seq))?;
        self.routing
            .add_or_update_route(destination, HOST_NETMASK, next_hop, self.interface);
        info!("Route to {} via {} ({} hops, seq {})", destination, next_hop, hop_count, seq);
        self.release(now, destination, next_hop);
        Ok(true)
    }

    /// Hands the packets waiting for `destination` back to the host.
    fn release(&mut self, now: Time, destination: Ipv4Addr, next_hop: Ipv4Addr) {
        let packets = self.packets.take(now, destination);
        if packets.is_empty() {
            return;
        }
        info!("Releasing {} packets for {} via {}", packets.len(), destination, next_hop);
        self.deliverable
            .extend(packets.into_iter().map(|packet| Deliverable {
                destination,
                next_hop,
                payload: packet.payload,
            }));
    }

    fn reverse_next_hop(&self, originator: Ipv4Addr) -> Option<Ipv4Addr> {
        self.routes
            .get(originator)
            .filter(|route| route.valid)
            .map(|route| route.next_hop)
    }

    fn send(&mut self, destination: Destination, ttl: u8, packet: Packet) -> Result<(), Error> {
        let payload = packet.to_bytes()?;
        info!("Sending {} to {}", packet, destination);
        self.network.send(Datagram {
            destination,
            ttl,
            payload,
        });
        Ok(())
    }
}

fn millis(duration: Duration) -> u32 {
    duration.as_millis().min(u128::from(u32::max_value())) as u32
}
