//! The Routing Set (RFC 7181 §19).
//!
//! Routes are recomputed from scratch with a shortest path search over the
//! routers learned from links and TCs, then diffed into the routing table.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BinaryHeap},
    net::Ipv4Addr,
};

use routing_core::{RoutingTable, Time};

use crate::{
    link::LinkSet,
    neighbor::NeighborSet,
    topology::TopologySet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTuple {
    pub destination: Ipv4Addr,
    pub prefix: u8,
    pub next_hop: Ipv4Addr,
    pub metric: u32,
    pub hops: u8,
}

pub fn netmask(prefix: u8) -> Ipv4Addr {
    match prefix {
        0 => Ipv4Addr::UNSPECIFIED,
        prefix => Ipv4Addr::from(u32::max_value() << (32 - u32::from(prefix.min(32)))),
    }
}

/// The routes of one node, keyed by destination and prefix.
#[derive(Debug, Default)]
pub struct RoutingSet {
    routes: BTreeMap<(u32, u8), RouteTuple>,
}

impl RoutingSet {
    pub fn new() -> Self {
        RoutingSet::default()
    }

    pub fn get(&self, destination: Ipv4Addr, prefix: u8) -> Option<&RouteTuple> {
        self.routes.get(&(u32::from(destination), prefix))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteTuple> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Replaces the routes, installing and deleting the differences.
    ///
    /// Returns the number of routing table changes.
    pub fn apply<R: RoutingTable>(&mut self, computed: RoutingSet, routing: &mut R, interface: u32) -> usize {
        let mut changes = 0;
        for (key, route) in self.routes.iter() {
            if !computed.routes.contains_key(key) {
                debug!("Route to {}/{} withdrawn", route.destination, route.prefix);
                routing.delete_route(route.destination, netmask(route.prefix));
                changes += 1;
            }
        }
        for (key, route) in computed.routes.iter() {
            let known = self.routes.get(key);
            if known.map(|known| known.next_hop) != Some(route.next_hop) {
                debug!(
                    "Route to {}/{} via {} ({} hops, metric {})",
                    route.destination, route.prefix, route.next_hop, route.hops, route.metric
                );
                routing.add_or_update_route(route.destination, netmask(route.prefix), route.next_hop, interface);
                changes += 1;
            }
        }
        self.routes = computed.routes;
        changes
    }

    /// Keeps the route if it is the best seen for its destination.
    fn offer(&mut self, route: RouteTuple) {
        let key = (u32::from(route.destination), route.prefix);
        match self.routes.get(&key) {
            Some(known) if (known.metric, known.hops) <= (route.metric, route.hops) => {}
            _ => {
                self.routes.insert(key, route);
            }
        }
    }
}

/// A router reached by the search.
#[derive(Debug, Clone, Copy)]
struct Reached {
    metric: u32,
    hops: u8,
    next_hop: Ipv4Addr,
}

/// Computes the routes of a node owning `own`.
pub fn compute(
    now: Time,
    own: &[Ipv4Addr],
    links: &LinkSet,
    neighbors: &NeighborSet,
    topology: &TopologySet,
) -> RoutingSet {
    let mut set = RoutingSet::new();
    let mut reached: BTreeMap<Ipv4Addr, Reached> = BTreeMap::new();
    let mut queue = BinaryHeap::new();

    // One hop: every symmetric link with a known outgoing metric.
    for link in links.iter().filter(|link| link.is_symmetric(now)) {
        let (metric, next_hop) = match (link.out_metric, link.addresses.first()) {
            (Some(metric), Some(next_hop)) => (metric, *next_hop),
            _ => continue,
        };
        for &address in link.addresses.iter() {
            set.offer(RouteTuple {
                destination: address,
                prefix: 32,
                next_hop: address,
                metric,
                hops: 1,
            });
        }
        if let Some(neighbor) = neighbors.find(next_hop).filter(|neighbor| neighbor.symmetric) {
            let better = reached
                .get(&neighbor.originator)
                .map_or(true, |known| metric < known.metric);
            if better {
                reached.insert(
                    neighbor.originator,
                    Reached {
                        metric,
                        hops: 1,
                        next_hop,
                    },
                );
                queue.push(Reverse((metric, 1u8, u32::from(neighbor.originator))));
            }
        }

        // Two hops through the same link.
        for two_hop in link.two_hop.iter() {
            if own.contains(&two_hop.address) {
                continue;
            }
            let out = match two_hop.out_metric {
                Some(out) => out,
                None => continue,
            };
            set.offer(RouteTuple {
                destination: two_hop.address,
                prefix: 32,
                next_hop,
                metric: metric.saturating_add(out),
                hops: 2,
            });
        }
    }

    // Further routers through the Router Topology Set.
    while let Some(Reverse((metric, hops, router))) = queue.pop() {
        let router = Ipv4Addr::from(router);
        let via = match reached.get(&router) {
            Some(known) if known.metric == metric && known.hops == hops => known.next_hop,
            _ => continue,
        };
        for edge in topology.routers().iter().filter(|edge| edge.from == router) {
            if own.contains(&edge.to) {
                continue;
            }
            let candidate = Reached {
                metric: metric.saturating_add(edge.metric),
                hops: hops.saturating_add(1),
                next_hop: via,
            };
            let better = reached
                .get(&edge.to)
                .map_or(true, |known| (candidate.metric, candidate.hops) < (known.metric, known.hops));
            if better {
                reached.insert(edge.to, candidate);
                queue.push(Reverse((candidate.metric, candidate.hops, u32::from(edge.to))));
            }
        }
    }

    for (router, route) in reached.iter() {
        if !own.contains(router) {
            set.offer(RouteTuple {
                destination: *router,
                prefix: 32,
                next_hop: route.next_hop,
                metric: route.metric,
                hops: route.hops,
            });
        }
    }
    for tuple in topology.routable().iter() {
        if own.contains(&tuple.destination) {
            continue;
        }
        if let Some(route) = reached.get(&tuple.from) {
            set.offer(RouteTuple {
                destination: tuple.destination,
                prefix: tuple.prefix,
                next_hop: route.next_hop,
                metric: route.metric.saturating_add(tuple.metric),
                hops: route.hops.saturating_add(1),
            });
        }
    }
    for tuple in topology.attached().iter() {
        if let Some(route) = reached.get(&tuple.gateway) {
            set.offer(RouteTuple {
                destination: tuple.network,
                prefix: tuple.prefix,
                next_hop: route.next_hop,
                metric: route.metric.saturating_add(tuple.metric),
                hops: route.hops.saturating_add(tuple.distance),
            });
        }
    }
    set
}
