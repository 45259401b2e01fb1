extern crate aodv;
extern crate routing_core;

use std::net::Ipv4Addr;

use aodv::*;
use routing_core::{Destination, MemoryRoutingTable, Outbox, Time};

const A: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const B: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
const D: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 4);
const X: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 9);

const T0: Time = Time::from_secs(10);

type Node = Engine<Outbox, MemoryRoutingTable>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn node(address: Ipv4Addr) -> Node {
    node_with(address, Config::default())
}

fn node_with(address: Ipv4Addr, config: Config) -> Node {
    init_logger();
    Engine::new(
        address,
        0,
        config.with_rng_seed(7),
        Outbox::new(),
        MemoryRoutingTable::new(),
    )
    .unwrap()
}

fn at(millis: u64) -> Time {
    T0 + std::time::Duration::from_millis(millis)
}

/// Nodes on a shared medium where only linked pairs hear each other.
struct Mesh {
    nodes: Vec<Node>,
    links: Vec<(Ipv4Addr, Ipv4Addr)>,
}

impl Mesh {
    fn chain(addresses: &[Ipv4Addr]) -> Self {
        Mesh {
            nodes: addresses.iter().map(|address| node(*address)).collect(),
            links: addresses.windows(2).map(|pair| (pair[0], pair[1])).collect(),
        }
    }

    fn node(&mut self, address: Ipv4Addr) -> &mut Node {
        self.nodes
            .iter_mut()
            .find(|node| node.address() == address)
            .unwrap()
    }

    fn start(&mut self, now: Time) {
        for node in self.nodes.iter_mut() {
            node.start(now).unwrap();
        }
        self.shuttle(now);
    }

    /// Delivers queued datagrams until every outbox is empty.
    fn shuttle(&mut self, now: Time) {
        let Mesh { nodes, links } = self;
        let linked = |a: Ipv4Addr, b: Ipv4Addr| links.contains(&(a, b)) || links.contains(&(b, a));
        loop {
            let mut moved = false;
            for i in 0..nodes.len() {
                let sender = nodes[i].address();
                for datagram in nodes[i].network_mut().drain() {
                    moved = true;
                    for receiver in nodes.iter_mut() {
                        let address = receiver.address();
                        if address == sender || !linked(sender, address) {
                            continue;
                        }
                        let addressed = match datagram.destination {
                            Destination::Broadcast => true,
                            Destination::Unicast(to) => to == address,
                        };
                        if addressed {
                            receiver
                                .handle_message(now, sender, datagram.ttl, &datagram.payload)
                                .unwrap();
                        }
                    }
                }
            }
            if !moved {
                break;
            }
        }
    }
}

fn sent(node: &mut Node) -> Vec<(Destination, u8, Packet)> {
    node.network_mut()
        .drain()
        .into_iter()
        .map(|datagram| {
            let packet = Packet::from_bytes(&datagram.payload).unwrap();
            (datagram.destination, datagram.ttl, packet)
        })
        .collect()
}

fn rerrs(packets: &[(Destination, u8, Packet)]) -> Vec<Rerr> {
    packets
        .iter()
        .filter_map(|(_, _, packet)| match packet {
            Packet::Rerr(rerr) => Some(rerr.clone()),
            _ => None,
        })
        .collect()
}

fn run_until(node: &mut Node, until: Time) {
    while let Some(deadline) = node.next_deadline() {
        if deadline > until {
            break;
        }
        node.handle_timers(deadline).unwrap();
    }
}

fn rreq(originator: Ipv4Addr, originator_seq: u32, rreq_id: u32, hop_count: u8) -> Vec<u8> {
    Packet::Rreq(Rreq {
        join: false,
        repair: false,
        gratuitous: false,
        destination_only: false,
        unknown_seq: true,
        hop_count,
        rreq_id,
        destination: Ipv4Addr::new(10, 0, 0, 200),
        destination_seq: 0,
        originator,
        originator_seq,
    })
    .to_bytes()
    .unwrap()
}

#[test]
fn hellos_make_neighbors() {
    let mut mesh = Mesh::chain(&[A, B, D]);
    mesh.start(T0);

    let b = mesh.node(B);
    assert_eq!(b.neighbors().len(), 2);
    assert_eq!(b.route_for(T0, A).unwrap(), Some(A));
    assert_eq!(b.route_for(T0, D).unwrap(), Some(D));
    assert!(b.is_scheduled(TaskType::NeighborExpiry, A));
    assert_eq!(b.routing().get(D, HOST_NETMASK).unwrap().next_hop, D);
    assert_eq!(mesh.node(A).route_for(T0, D).unwrap(), None);
}

#[test]
fn route_discovery_releases_the_cached_packet() {
    let mut mesh = Mesh::chain(&[A, B, D]);
    mesh.start(T0);

    let now = at(100);
    let a = mesh.node(A);
    assert_eq!(a.output_handler(now, D, vec![0xab]).unwrap(), Output::Deferred);
    assert_eq!(a.output_handler(now, D, vec![0xcd]).unwrap(), Output::Deferred);
    assert_eq!(a.cached_packets(D), 2);
    assert!(a.is_scheduled(TaskType::ResendRreq, D));
    assert!(a.flood_ids().contains(now, A, 1));

    let queued = a.network().queued();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].destination, Destination::Broadcast);
    assert_eq!(queued[0].ttl, a.config().net_diameter);
    match Packet::from_bytes(&queued[0].payload).unwrap() {
        Packet::Rreq(rreq) => {
            assert_eq!(rreq.rreq_id, 1);
            assert_eq!(rreq.destination, D);
            assert_eq!(rreq.originator, A);
            assert!(rreq.unknown_seq);
        }
        other => panic!("expected a RREQ, got {}", other),
    }

    mesh.shuttle(now);

    let d = mesh.node(D);
    assert_eq!(d.route_for(now, A).unwrap(), Some(B));
    assert_eq!(d.routes().get(A).unwrap().hop_count, 2);

    let a = mesh.node(A);
    assert_eq!(a.route_for(now, D).unwrap(), Some(B));
    assert_eq!(a.routes().get(D).unwrap().hop_count, 2);
    assert!(!a.is_scheduled(TaskType::ResendRreq, D));
    assert_eq!(a.cached_packets(D), 0);
    assert_eq!(
        a.drain_deliverable(),
        vec![
            Deliverable {
                destination: D,
                next_hop: B,
                payload: vec![0xab],
            },
            Deliverable {
                destination: D,
                next_hop: B,
                payload: vec![0xcd],
            },
        ]
    );
    assert_eq!(a.routing().get(D, HOST_NETMASK).unwrap().next_hop, B);
    assert_eq!(a.output_handler(now, D, vec![1]).unwrap(), Output::Forward(B));
}

#[test]
fn duplicate_rreq_is_ignored() {
    let mut mesh = Mesh::chain(&[A, B]);
    mesh.start(T0);
    let b = mesh.node(B);

    b.handle_message(at(1), A, 30, &rreq(X, 5, 1, 3)).unwrap();
    let forwarded = sent(b);
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].1, 29);
    let route = *b.routes().get(X).unwrap();
    assert_eq!(route.hop_count, 4);

    b.handle_message(at(2), A, 30, &rreq(X, 5, 1, 0)).unwrap();
    assert!(b.network().is_empty());
    assert_eq!(*b.routes().get(X).unwrap(), route);
}

#[test]
fn discoveries_for_two_destinations_are_both_forwarded() {
    let first = Ipv4Addr::new(10, 0, 0, 50);
    let second = Ipv4Addr::new(10, 0, 0, 60);
    let mut mesh = Mesh::chain(&[A, B]);
    mesh.start(T0);

    let now = at(100);
    let a = mesh.node(A);
    a.output_handler(now, first, vec![1]).unwrap();
    a.output_handler(now, second, vec![2]).unwrap();
    let rreqs = sent(a);
    let ids: Vec<u32> = rreqs
        .iter()
        .filter_map(|(_, _, packet)| match packet {
            Packet::Rreq(rreq) => Some(rreq.rreq_id),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec![1, 2]);
    assert!(a.flood_ids().contains(now, A, 1));
    assert!(a.flood_ids().contains(now, A, 2));

    let b = mesh.node(B);
    for (_, ttl, packet) in rreqs {
        b.handle_message(now, A, ttl, &packet.to_bytes().unwrap()).unwrap();
    }
    let forwarded: Vec<Ipv4Addr> = sent(b)
        .into_iter()
        .filter_map(|(_, _, packet)| match packet {
            Packet::Rreq(rreq) => Some(rreq.destination),
            _ => None,
        })
        .collect();
    assert_eq!(forwarded, vec![first, second]);
}

#[test]
fn full_flood_id_cache_drops_the_rreq_untouched() {
    let y = Ipv4Addr::new(10, 0, 0, 8);
    let mut mesh = Mesh {
        nodes: vec![node(A), node_with(B, Config::default().with_max_flood_ids(1))],
        links: vec![(A, B)],
    };
    mesh.start(T0);
    let b = mesh.node(B);

    b.handle_message(at(1), A, 30, &rreq(X, 5, 1, 0)).unwrap();
    assert_eq!(sent(b).len(), 1);

    b.handle_message(at(2), A, 30, &rreq(y, 5, 1, 0)).unwrap();
    assert!(b.network().is_empty());
    assert!(b.routes().get(y).is_none());
    assert!(b.routing().get(y, HOST_NETMASK).is_none());
    assert_eq!(b.flood_ids().len(), 1);
}

#[test]
fn failing_timer_keeps_the_periodic_tasks_running() {
    let mut a = node_with(A, Config::default().with_max_flood_ids(1));
    a.start(T0).unwrap();
    a.output_handler(at(100), D, vec![0]).unwrap();
    assert!(a.output_handler(at(100), X, vec![0]).is_err());
    sent(&mut a);

    // The resend for D finds the cache still full.
    run_until(&mut a, at(4500));
    assert!(!a.is_scheduled(TaskType::ResendRreq, D));
    assert!(a.is_scheduled(TaskType::Hello, Ipv4Addr::UNSPECIFIED));
    assert!(a.is_scheduled(TaskType::Cleanup, Ipv4Addr::UNSPECIFIED));
    let hellos = sent(&mut a)
        .into_iter()
        .filter(|(_, _, packet)| match packet {
            Packet::Rrep(rrep) => rrep.is_hello(),
            _ => false,
        })
        .count();
    assert!(hellos >= 4);
}

#[test]
fn worse_or_equal_updates_keep_the_next_hop() {
    let mut mesh = Mesh::chain(&[A, B, D]);
    mesh.start(T0);
    let b = mesh.node(B);

    b.handle_message(at(1), A, 30, &rreq(X, 5, 1, 2)).unwrap();
    assert_eq!(b.routes().get(X).unwrap().next_hop, A);

    b.handle_message(at(2), D, 30, &rreq(X, 5, 2, 2)).unwrap();
    b.handle_message(at(3), D, 30, &rreq(X, 5, 3, 7)).unwrap();
    assert_eq!(b.routes().get(X).unwrap().next_hop, A);

    b.handle_message(at(4), D, 30, &rreq(X, 6, 4, 9)).unwrap();
    let route = b.routes().get(X).unwrap();
    assert_eq!(route.next_hop, D);
    assert_eq!(route.seq, 6);
    assert_eq!(route.hop_count, 10);
}

#[test]
fn rreq_from_a_stranger_or_without_ttl_is_dropped() {
    let mut mesh = Mesh::chain(&[A, B]);
    mesh.start(T0);
    let b = mesh.node(B);

    b.handle_message(at(1), D, 30, &rreq(X, 5, 1, 0)).unwrap();
    b.handle_message(at(1), A, 1, &rreq(X, 5, 2, 0)).unwrap();
    b.handle_message(at(1), A, 30, &[1, 2, 3]).unwrap();
    assert!(b.network().is_empty());
    assert!(b.routes().get(X).is_none());
}

#[test]
fn losing_a_neighbor_sends_one_rerr() {
    let mut mesh = Mesh::chain(&[A, B, D]);
    mesh.start(T0);
    let now = at(100);
    mesh.node(A).output_handler(now, D, vec![0]).unwrap();
    mesh.shuttle(now);

    let a = mesh.node(A);
    let old_seq = a.routes().get(D).unwrap().seq;
    a.delete_neighbor(at(200), B).unwrap();

    let packets = sent(a);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].0, Destination::Broadcast);
    let rerr = &rerrs(&packets)[0];
    assert!(rerr.unreachable.contains(&Unreachable {
        address: D,
        seq: old_seq + 1,
    }));
    assert!(rerr.unreachable.iter().any(|unreachable| unreachable.address == B));

    assert!(!a.routes().get(D).unwrap().valid);
    assert!(a.routing().get(D, HOST_NETMASK).is_none());
    assert!(!a.is_scheduled(TaskType::NeighborExpiry, B));
    assert_eq!(a.route_for(at(200), D).unwrap(), None);
}

#[test]
fn silent_neighbor_times_out() {
    let mut mesh = Mesh::chain(&[A, B]);
    mesh.start(T0);
    let a = mesh.node(A);

    run_until(a, at(3500));
    let rerr = rerrs(&sent(a));
    assert_eq!(rerr.len(), 1);
    assert_eq!(rerr[0].unreachable[0].address, B);
    assert!(a.neighbors().is_empty());
}

#[test]
fn lookup_expires_a_stale_neighbor_route() {
    let mut mesh = Mesh::chain(&[A, B]);
    mesh.start(T0);
    let a = mesh.node(A);
    let hello_lifetime = a.config().hello_lifetime().as_millis() as u64;

    assert_eq!(a.route_for(at(hello_lifetime), B).unwrap(), Some(B));
    assert!(a.network().is_empty());

    assert_eq!(a.route_for(at(hello_lifetime + 50), B).unwrap(), None);
    let rerr = rerrs(&sent(a));
    assert_eq!(rerr.len(), 1);
    assert_eq!(
        rerr[0].unreachable,
        vec![Unreachable {
            address: B,
            seq: 1,
        }]
    );
    assert!(a.routing().get(B, HOST_NETMASK).is_none());
}

#[test]
fn discovery_gives_up_after_the_retries() {
    let mut a = node(A);
    a.start(T0).unwrap();
    a.network_mut().drain();

    a.output_handler(T0, D, vec![0]).unwrap();
    let discovery = a.config().route_discovery_time().as_millis() as u64;
    run_until(&mut a, at(discovery + 500));

    let ids: Vec<u32> = sent(&mut a)
        .into_iter()
        .filter_map(|(_, _, packet)| match packet {
            Packet::Rreq(rreq) => Some(rreq.rreq_id),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(!a.is_scheduled(TaskType::ResendRreq, D));
    assert_eq!(a.cached_packets(D), 0);
    assert_eq!(a.seq(), 3);
}

#[test]
fn rerr_from_the_next_hop_is_propagated() {
    let mut mesh = Mesh::chain(&[A, B, D]);
    mesh.start(T0);
    let now = at(100);
    mesh.node(A).output_handler(now, D, vec![0]).unwrap();
    mesh.shuttle(now);

    let rerr = |seq| {
        Packet::Rerr(Rerr {
            no_delete: false,
            unreachable: vec![Unreachable { address: D, seq }],
        })
        .to_bytes()
        .unwrap()
    };
    let a = mesh.node(A);
    a.handle_message(at(200), D, 1, &rerr(40)).unwrap();
    assert!(a.routes().get(D).unwrap().valid);
    assert!(a.network().is_empty());

    a.handle_message(at(200), B, 1, &rerr(40)).unwrap();
    let route = a.routes().get(D).unwrap();
    assert!(!route.valid);
    assert_eq!(route.seq, 40);
    let forwarded = rerrs(&sent(a));
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].unreachable, vec![Unreachable { address: D, seq: 40 }]);
}

#[test]
fn self_route_is_never_overwritten() {
    let mut mesh = Mesh::chain(&[A, B]);
    mesh.start(T0);
    let b = mesh.node(B);
    let rrep = Packet::Rrep(Rrep {
        repair: false,
        ack_required: false,
        prefix_size: 0,
        hop_count: 3,
        destination: B,
        destination_seq: 99,
        originator: X,
        lifetime: 6000,
    })
    .to_bytes()
    .unwrap();
    b.handle_message(at(1), A, 10, &rrep).unwrap();

    let route = b.routes().get(B).unwrap();
    assert!(route.self_route);
    assert_eq!(route.next_hop, B);
    assert!(b.routing().get(B, HOST_NETMASK).is_none());
}
