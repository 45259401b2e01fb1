//! The OLSRv2 engine of one node (RFC 6130, RFC 7181).

use std::{collections::BTreeMap, net::Ipv4Addr, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};

use routing_core::{time_before, Datagram, Destination, Network, RoutingTable, Scheduler, Time};

use crate::{
    codec,
    config::Config,
    constants::*,
    error::Error,
    hello::{self, Hello},
    link::{is_running, LinkSet, LinkTuple, TwoHopTuple},
    message::Message,
    mpr::{self, Candidate, Coverage},
    neighbor::{LostNeighborSet, NeighborSet},
    routing::{self, RoutingSet},
    task::Task,
    tc::{self, Advertisement, Kind, Tc},
    topology::{
        AttachedNetwork,
        DuplicateSet,
        Freshness,
        LocalNetwork,
        RoutableAddress,
        RouterTopology,
        TopologySet,
    },
};

/// The engine of one node on one interface.
pub struct Engine<N, R> {
    config: Config,
    originator: Ipv4Addr,
    address: Ipv4Addr,
    /// Every address of this node.
    own: Vec<Ipv4Addr>,
    interface: u32,
    network: N,
    routing: R,
    rng: StdRng,
    scheduler: Scheduler<Task>,

    message_seq: u16,
    ansn: u16,
    advertised: Vec<Advertisement>,
    /// TCs go out until then, to withdraw the last advertisement.
    tc_until: Option<Time>,
    links: LinkSet,
    neighbors: NeighborSet,
    lost: LostNeighborSet,
    topology: TopologySet,
    processed: DuplicateSet,
    forwarded: DuplicateSet,
    routes: RoutingSet,
}

impl<N, R> Engine<N, R>
where
    N: Network,
    R: RoutingTable,
{
    /// A node known as `originator`, running on the interface `address`.
    pub fn new(
        originator: Ipv4Addr,
        address: Ipv4Addr,
        interface: u32,
        config: Config,
        network: N,
        routing: R,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut own = vec![originator];
        if address != originator {
            own.push(address);
        }

        Engine {
            links: LinkSet::new(config.max_tuples),
            neighbors: NeighborSet::new(config.max_tuples),
            lost: LostNeighborSet::new(config.max_tuples),
            topology: TopologySet::new(config.max_tuples),
            processed: DuplicateSet::new(config.max_tuples),
            forwarded: DuplicateSet::new(config.max_tuples),
            config,
            originator,
            address,
            own,
            interface,
            network,
            routing,
            rng,
            scheduler: Scheduler::new(),

            message_seq: 0,
            ansn: 0,
            advertised: Vec::new(),
            tc_until: None,
            routes: RoutingSet::new(),
        }
    }

    /// Sends the first HELLO and starts the periodic work.
    pub fn start(&mut self, now: Time) -> Result<(), Error> {
        info!("OLSRv2 starting as {} on {}", self.originator, self.address);
        let delay = self.jittered(self.config.tc_interval, self.config.tc_max_jitter);
        self.scheduler.schedule(now, delay, Task::Tc);
        self.scheduler.schedule(now, self.config.sweep_interval, Task::Sweep);
        self.send_hello(now)
    }

    /// Feeds a packet received from the neighbor interface `sender`.
    pub fn handle_packet(&mut self, now: Time, sender: Ipv4Addr, bytes: &[u8]) -> Result<(), Error> {
        if self.own.contains(&sender) {
            trace!("Ignoring an own packet");
            return Ok(());
        }
        let messages = match codec::decode(bytes) {
            Ok(messages) => messages,
            Err(error) => {
                warn!("Discarding a packet from {}: {}", sender, error);
                return Ok(());
            }
        };

        for message in messages.into_iter() {
            let kind = message.kind;
            match kind {
                MSG_TYPE_HELLO => self.recv_hello(now, sender, &message)?,
                MSG_TYPE_TC => self.recv_tc(now, sender, message)?,
                kind => debug!("Ignoring a message of type {} from {}", kind, sender),
            }
        }
        self.update_mprs(now);
        self.update_routes(now);
        Ok(())
    }

    /// Fires every task due at `now`.
    pub fn handle_timers(&mut self, now: Time) -> Result<(), Error> {
        while let Some((ticket, task)) = self.scheduler.pop_due(now) {
            trace!("Firing {:?} ({})", task, ticket);
            let result = match task {
                Task::Hello => self.send_hello(now),
                Task::Tc => self.send_tc(now),
                Task::Sweep => self.sweep(now),
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

    /// Attaches a network to this node; the next TCs advertise it.
    pub fn add_attached_network(&mut self, network: Ipv4Addr, prefix: u8, distance: u8, metric: u32) -> Result<(), Error> {
        info!("Attaching {}/{} at distance {}", network, prefix, distance);
        self.topology.add_local(LocalNetwork {
            network,
            prefix,
            distance,
            metric,
        })?;
        Ok(())
    }

    pub fn remove_attached_network(&mut self, network: Ipv4Addr, prefix: u8) -> bool {
        self.topology.remove_local(network, prefix)
    }

    pub fn originator(&self) -> Ipv4Addr {
        self.originator
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// The ANSN of the last generated TC.
    pub fn ansn(&self) -> u16 {
        self.ansn
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn links(&self) -> &LinkSet {
        &self.links
    }

    pub fn neighbors(&self) -> &NeighborSet {
        &self.neighbors
    }

    pub fn lost_neighbors(&self) -> &LostNeighborSet {
        &self.lost
    }

    pub fn topology(&self) -> &TopologySet {
        &self.topology
    }

    pub fn processed(&self) -> &DuplicateSet {
        &self.processed
    }

    pub fn forwarded(&self) -> &DuplicateSet {
        &self.forwarded
    }

    pub fn routes(&self) -> &RoutingSet {
        &self.routes
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

    fn recv_hello(&mut self, now: Time, sender: Ipv4Addr, message: &Message) -> Result<(), Error> {
        let hello = match Hello::parse(message, sender, &self.own, self.address) {
            Ok(hello) => hello,
            Err(reason) => {
                warn!("Discarding a HELLO from {}: {}", sender, reason);
                return Ok(());
            }
        };
        debug!("Received {} from {}", message, sender);

        let merge = self.neighbors.merge(&hello.neighbor, hello.originator)?;
        if let Some(neighbor) = self.neighbors.get_mut(merge.index) {
            neighbor.willingness_flooding = hello.willingness_flooding;
            neighbor.willingness_routing = hello.willingness_routing;
        }
        for address in merge.lost.iter() {
            self.lost.insert(*address, now + self.config.n_hold_time)?;
        }
        if !merge.removed.is_empty() {
            self.links.remove_addresses(&merge.removed);
        }

        let matching = self.links.matching(&hello.sending);
        let index = match matching.split_first() {
            None => {
                let link = LinkTuple::new(hello.sending.clone(), now, hello.validity, &self.config);
                info!("New link to {}", hello.originator);
                self.links.insert(link)?
            }
            Some((&first, rest)) => {
                if !rest.is_empty() {
                    info!("{} links match the HELLO from {}, keeping one", matching.len(), sender);
                }
                for &extra in rest.iter().rev() {
                    self.links.remove(extra);
                }
                first
            }
        };

        let config = &self.config;
        let own = &self.own;
        if let Some(link) = self.links.get_mut(index) {
            let before = link.status(now);
            let expiry = now + hello.validity;
            link.addresses = hello.sending.clone();
            match hello.link_status {
                Some(LINK_STATUS_LOST) => {
                    if is_running(link.sym_time, now) {
                        link.sym_time = None;
                        if let Some(heard) = link.heard_time.filter(|heard| !time_before(*heard, now)) {
                            link.time = heard + config.l_hold_time;
                        }
                    }
                }
                Some(LINK_STATUS_SYMMETRIC) | Some(LINK_STATUS_HEARD) => {
                    link.sym_time = Some(expiry);
                    link.time = expiry + config.l_hold_time;
                }
                _ => {}
            }
            let heard = link.sym_time.map_or(expiry, |sym| sym.max(expiry));
            link.heard_time = Some(heard);
            link.time = link.time.max(heard + config.l_hold_time);
            link.hello_interval = hello.interval;
            link.on_receive(now, config);
            link.in_metric = config.default_link_metric;
            if hello.out_metric.is_some() {
                link.out_metric = hello.out_metric;
            }

            if link.is_symmetric(now) {
                for report in hello.two_hop.iter().filter(|report| !own.contains(&report.address)) {
                    if report.symmetric {
                        let tuple = TwoHopTuple {
                            address: report.address,
                            in_metric: report.in_metric,
                            out_metric: report.out_metric,
                            expiry,
                        };
                        link.add_two_hop(tuple, config.max_tuples)?;
                    } else {
                        link.remove_two_hop(report.address);
                    }
                }
            } else {
                link.two_hop.clear();
            }

            let after = link.status(now);
            if before != after {
                info!("Link to {} is now {}", sender, after);
            }
        }

        self.refresh_neighbors(now)?;

        let flooding = matches!(hello.mpr, Some(MPR_FLOODING) | Some(MPR_FLOOD_ROUTE));
        let routing = matches!(hello.mpr, Some(MPR_ROUTING) | Some(MPR_FLOOD_ROUTE));
        if let Some(neighbor) = self
            .neighbors
            .iter_mut()
            .find(|neighbor| neighbor.originator == hello.originator)
        {
            let flooding = flooding && neighbor.symmetric;
            let routing = routing && neighbor.symmetric;
            if (flooding, routing) != (neighbor.flooding_mpr_selector, neighbor.routing_mpr_selector) {
                info!(
                    "{} selects us as flooding MPR: {}, as routing MPR: {}",
                    neighbor.originator, flooding, routing
                );
            }
            neighbor.flooding_mpr_selector = flooding;
            neighbor.routing_mpr_selector = routing;
        }
        Ok(())
    }

    fn recv_tc(&mut self, now: Time, sender: Ipv4Addr, message: Message) -> Result<(), Error> {
        let tc = match Tc::parse(&message, &self.own) {
            Ok(tc) => tc,
            Err(reason) => {
                warn!("Discarding a TC from {}: {}", sender, reason);
                return Ok(());
            }
        };

        if self.processed.contains(MSG_TYPE_TC, tc.originator, tc.seq) {
            debug!("Already processed {}", tc);
        } else {
            debug!("Received {} via {}", tc, sender);
            self.processed
                .insert(MSG_TYPE_TC, tc.originator, tc.seq, now + self.config.p_hold_time)?;
            self.process_tc(now, &tc)?;
        }
        self.forward_tc(now, sender, &tc, message)
    }

    fn process_tc(&mut self, now: Time, tc: &Tc) -> Result<(), Error> {
        let expiry = now + tc.validity;
        match self.topology.freshness(tc.originator, tc.ansn) {
            Freshness::Stale => {
                debug!("Ignoring the stale {}", tc);
                return Ok(());
            }
            Freshness::Same => {
                self.topology.refresh(tc.originator, expiry);
                return Ok(());
            }
            Freshness::New => {}
        }

        info!("Topology from {} is now at ANSN {}", tc.originator, tc.ansn);
        self.topology.advertise(tc.originator, tc.ansn, expiry)?;
        for advertisement in tc.advertisements.iter() {
            if advertisement.is_router() {
                self.topology.add_router(RouterTopology {
                    from: tc.originator,
                    to: advertisement.address,
                    seq: tc.ansn,
                    metric: advertisement.metric,
                    expiry,
                })?;
            }
            if advertisement.is_routable() {
                self.topology.add_routable(RoutableAddress {
                    from: tc.originator,
                    destination: advertisement.address,
                    prefix: advertisement.prefix,
                    seq: tc.ansn,
                    metric: advertisement.metric,
                    expiry,
                })?;
            }
            if let Kind::Gateway(distance) = advertisement.kind {
                self.topology.add_attached(AttachedNetwork {
                    network: advertisement.address,
                    prefix: advertisement.prefix,
                    gateway: tc.originator,
                    distance,
                    seq: tc.ansn,
                    metric: advertisement.metric,
                    expiry,
                })?;
            }
        }
        if tc.complete {
            let flushed = self.topology.flush_older(tc.originator, tc.ansn);
            if flushed > 0 {
                debug!("Flushed {} tuples withdrawn by {}", flushed, tc.originator);
            }
        }
        Ok(())
    }

    /// Relays a TC received from a flooding MPR selector.
    fn forward_tc(&mut self, now: Time, sender: Ipv4Addr, tc: &Tc, mut message: Message) -> Result<(), Error> {
        if tc.hop_limit <= 1 || self.forwarded.contains(MSG_TYPE_TC, tc.originator, tc.seq) {
            return Ok(());
        }
        let selector = self
            .neighbors
            .find(sender)
            .map_or(false, |neighbor| neighbor.symmetric && neighbor.flooding_mpr_selector);
        if !selector {
            trace!("Not relaying {}, {} is no flooding MPR selector", tc, sender);
            return Ok(());
        }

        self.forwarded
            .insert(MSG_TYPE_TC, tc.originator, tc.seq, now + self.config.f_hold_time)?;
        message.hop_limit = Some(tc.hop_limit - 1);
        message.hop_count = Some(message.hop_count.unwrap_or(0).saturating_add(1));
        info!("Relaying {}", tc);
        self.send(vec![message])
    }

    fn send_hello(&mut self, now: Time) -> Result<(), Error> {
        let delay = self.jittered(self.config.hello_interval, self.config.hello_max_jitter);
        self.scheduler.schedule(now, delay, Task::Hello);

        let seq = self.next_seq();
        let message = hello::build(
            now,
            &self.config,
            self.originator,
            self.address,
            seq,
            &self.links,
            &self.neighbors,
            &self.lost,
        );
        self.send(vec![message])
    }

    fn send_tc(&mut self, now: Time) -> Result<(), Error> {
        let delay = self.jittered(self.config.tc_interval, self.config.tc_max_jitter);
        self.scheduler.schedule(now, delay, Task::Tc);

        let advertisements = tc::advertisements(&self.neighbors, self.topology.local());
        if advertisements != self.advertised {
            self.ansn = self.ansn.wrapping_add(1);
            info!("Advertising {} addresses at ANSN {}", advertisements.len(), self.ansn);
            self.advertised = advertisements;
        }
        if !self.advertised.is_empty() {
            self.tc_until = Some(now + self.config.t_hold_time);
        }

        if is_running(self.tc_until, now) {
            let seq = self.next_seq();
            let message = tc::build(&self.config, self.originator, seq, self.ansn, &self.advertised);
            self.send(vec![message])?;
        }
        Ok(())
    }

    fn sweep(&mut self, now: Time) -> Result<(), Error> {
        self.scheduler.schedule(now, self.config.sweep_interval, Task::Sweep);
        if self.links.sweep(now, &self.config) {
            debug!("Link Set changed on the sweep");
        }
        self.refresh_neighbors(now)?;
        let forgotten = self.lost.purge(now)
            + self.topology.purge(now)
            + self.processed.purge(now)
            + self.forwarded.purge(now);
        if forgotten > 0 {
            trace!("Forgot {} expired tuples", forgotten);
        }
        self.update_mprs(now);
        self.update_routes(now);
        Ok(())
    }

    /// Derives the neighbor state from the links.
    ///
    /// A neighbor is symmetric while one of its links is. The addresses of a
    /// neighbor leaving that state are advertised as lost for a while, and
    /// a neighbor without any link left is removed.
    fn refresh_neighbors(&mut self, now: Time) -> Result<(), Error> {
        let links = &self.links;
        let mut lost = Vec::new();
        let mut found = Vec::new();

        for neighbor in self.neighbors.iter_mut() {
            let mut symmetric = false;
            let mut in_metric: Option<u32> = None;
            let mut out_metric: Option<u32> = None;
            for link in links
                .iter()
                .filter(|link| link.addresses.iter().any(|address| neighbor.has_address(*address)))
            {
                if !link.is_symmetric(now) {
                    continue;
                }
                symmetric = true;
                in_metric = Some(in_metric.map_or(link.in_metric, |metric| metric.min(link.in_metric)));
                if let Some(out) = link.out_metric {
                    out_metric = Some(out_metric.map_or(out, |metric| metric.min(out)));
                }
            }

            if neighbor.symmetric && !symmetric {
                info!("Neighbor {} is no longer symmetric", neighbor.originator);
                lost.extend(neighbor.addresses.iter().copied());
                neighbor.flooding_mpr_selector = false;
                neighbor.routing_mpr_selector = false;
            } else if !neighbor.symmetric && symmetric {
                info!("Neighbor {} is symmetric", neighbor.originator);
                found.extend(neighbor.addresses.iter().copied());
            }
            neighbor.symmetric = symmetric;
            neighbor.in_metric = in_metric;
            neighbor.out_metric = out_metric;
        }
        self.neighbors.retain(|neighbor| {
            links
                .iter()
                .any(|link| link.addresses.iter().any(|address| neighbor.has_address(*address)))
        });

        for address in found.into_iter() {
            self.lost.remove(address);
        }
        for address in lost.into_iter() {
            self.lost.insert(address, now + self.config.n_hold_time)?;
        }
        Ok(())
    }

    /// Selects the flooding and routing MPRs among the symmetric neighbors.
    fn update_mprs(&mut self, now: Time) {
        let mut flooding_candidates = Vec::new();
        let mut routing_candidates = Vec::new();
        let mut owners = BTreeMap::new();
        for neighbor in self.neighbors.symmetric() {
            flooding_candidates.push(Candidate {
                id: neighbor.originator,
                willingness: neighbor.willingness_flooding,
                metric: neighbor.out_metric.unwrap_or(MAXIMUM_METRIC),
            });
            let in_metric = neighbor.in_metric.unwrap_or(MAXIMUM_METRIC);
            routing_candidates.push(Candidate {
                id: neighbor.originator,
                willingness: neighbor.willingness_routing,
                metric: in_metric,
            });
            for address in neighbor.addresses.iter() {
                owners.insert(*address, neighbor.originator);
            }
        }

        let mut flooding_coverage = Vec::new();
        let mut routing_coverage = Vec::new();
        for link in self.links.iter().filter(|link| link.is_symmetric(now)) {
            let via = match link
                .addresses
                .first()
                .and_then(|address| self.neighbors.find(*address))
                .filter(|neighbor| neighbor.symmetric)
            {
                Some(neighbor) => neighbor.originator,
                None => continue,
            };
            for two_hop in link.two_hop.iter() {
                if self.own.contains(&two_hop.address) {
                    continue;
                }
                if !owners.contains_key(&two_hop.address) {
                    flooding_coverage.push(Coverage {
                        via,
                        two_hop: two_hop.address,
                        metric: two_hop.out_metric.unwrap_or(MAXIMUM_METRIC),
                    });
                }
                routing_coverage.push(Coverage {
                    via,
                    two_hop: two_hop.address,
                    metric: two_hop.in_metric.unwrap_or(MAXIMUM_METRIC),
                });
            }
        }

        let flooding = mpr::select(
            &flooding_candidates,
            &flooding_coverage,
            self.config.flooding_mpr_criterion,
        );
        let routing = mpr::select_routing(
            &routing_candidates,
            &routing_coverage,
            &owners,
            self.config.routing_mpr_criterion,
        );
        for neighbor in self.neighbors.iter_mut() {
            let is_flooding = neighbor.symmetric && flooding.contains(&neighbor.originator);
            let is_routing = neighbor.symmetric && routing.contains(&neighbor.originator);
            if (is_flooding, is_routing) != (neighbor.flooding_mpr, neighbor.routing_mpr) {
                info!(
                    "{} is now flooding MPR: {}, routing MPR: {}",
                    neighbor.originator, is_flooding, is_routing
                );
            }
            neighbor.flooding_mpr = is_flooding;
            neighbor.routing_mpr = is_routing;
        }
    }

    fn update_routes(&mut self, now: Time) {
        let computed = routing::compute(now, &self.own, &self.links, &self.neighbors, &self.topology);
        let changes = self.routes.apply(computed, &mut self.routing, self.interface);
        if changes > 0 {
            info!("Routing Set updated with {} changes, {} routes", changes, self.routes.len());
        }
    }

    fn send(&mut self, messages: Vec<Message>) -> Result<(), Error> {
        let payload = codec::encode(&messages)?;
        for message in messages.iter() {
            info!("Sending {}", message);
        }
        self.network.send(Datagram {
            destination: Destination::Broadcast,
            ttl: 1,
            payload,
        });
        Ok(())
    }

    fn next_seq(&mut self) -> u16 {
        self.message_seq = self.message_seq.wrapping_add(1);
        self.message_seq
    }

    /// `interval` shortened by a random jitter of at most `max_jitter`.
    fn jittered(&mut self, interval: Duration, max_jitter: Duration) -> Duration {
        let max = max_jitter.min(interval / 2).as_millis() as u64;
        interval - Duration::from_millis(self.rng.gen_range(0..=max))
    }
}
