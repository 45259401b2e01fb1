extern crate olsrv2;
extern crate routing_core;

use std::{net::Ipv4Addr, time::Duration};

use olsrv2::*;
use routing_core::{MemoryRoutingTable, Outbox, Time};

const A: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const B: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
const C: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 3);
const D: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 4);
const E: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);
const X: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 24);
const Y: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 25);
const Z: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 26);

const T0: Time = Time::from_secs(100);

type Node = Engine<Outbox, MemoryRoutingTable>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn config() -> Config {
    Config::default()
        .with_hello_max_jitter(Duration::from_millis(0))
        .with_tc_max_jitter(Duration::from_millis(0))
        .with_rng_seed(11)
}

fn node_with(address: Ipv4Addr, config: Config) -> Node {
    init_logger();
    Engine::new(address, address, 1, config, Outbox::new(), MemoryRoutingTable::new())
}

fn node(address: Ipv4Addr) -> Node {
    node_with(address, config())
}

fn at(millis: u64) -> Time {
    T0 + Duration::from_millis(millis)
}

/// Nodes on a shared medium where only linked pairs hear each other.
struct Mesh {
    nodes: Vec<Node>,
    links: Vec<(Ipv4Addr, Ipv4Addr)>,
}

impl Mesh {
    fn new(nodes: Vec<Node>, links: &[(Ipv4Addr, Ipv4Addr)]) -> Self {
        Mesh {
            nodes,
            links: links.to_vec(),
        }
    }

    fn chain(addresses: &[Ipv4Addr]) -> Self {
        let links: Vec<_> = addresses.windows(2).map(|pair| (pair[0], pair[1])).collect();
        Mesh::new(addresses.iter().map(|address| node(*address)).collect(), &links)
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

    /// Runs every node's timers in time order up to `until`.
    fn run(&mut self, until: Time) {
        loop {
            let next = self.nodes.iter_mut().filter_map(|node| node.next_deadline()).min();
            match next {
                Some(deadline) if deadline <= until => {
                    for node in self.nodes.iter_mut() {
                        node.handle_timers(deadline).unwrap();
                    }
                    self.shuttle(deadline);
                }
                _ => break,
            }
        }
    }

    /// Delivers queued broadcasts until every outbox is empty.
    fn shuttle(&mut self, now: Time) {
        let Mesh { nodes, links } = self;
        let linked = |a: Ipv4Addr, b: Ipv4Addr| links.contains(&(a, b)) || links.contains(&(b, a));
        loop {
            let mut moved = false;
            for i in 0..nodes.len() {
                let sender = nodes[i].address();
                for datagram in nodes[i].network_mut().drain() {
                    moved = true;
                    assert_eq!(datagram.ttl, 1);
                    for receiver in nodes.iter_mut() {
                        let address = receiver.address();
                        if address != sender && linked(sender, address) {
                            receiver.handle_packet(now, sender, &datagram.payload).unwrap();
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

fn run_until(node: &mut Node, until: Time) {
    while let Some(deadline) = node.next_deadline() {
        if deadline > until {
            break;
        }
        node.handle_timers(deadline).unwrap();
    }
}

fn sent(node: &mut Node) -> Vec<Message> {
    node.network_mut()
        .drain()
        .into_iter()
        .flat_map(|datagram| decode(&datagram.payload).unwrap())
        .collect()
}

fn flooding_mprs(node: &Node) -> Vec<Ipv4Addr> {
    let mut mprs: Vec<_> = node
        .neighbors()
        .iter()
        .filter(|neighbor| neighbor.flooding_mpr)
        .map(|neighbor| neighbor.originator)
        .collect();
    mprs.sort();
    mprs
}

/// A HELLO from B which hears A over a symmetric link.
fn hello_from_b(seq: u16, mpr: Option<u8>) -> Vec<u8> {
    let mut message = Message::new(MSG_TYPE_HELLO);
    message.originator = Some(B);
    message.hop_limit = Some(1);
    message.hop_count = Some(0);
    message.seq = Some(seq);
    message
        .tlvs
        .push(Tlv::new(TLV_VALIDITY_TIME, vec![encode_time(Duration::from_secs(6))]));
    message
        .tlvs
        .push(Tlv::new(TLV_INTERVAL_TIME, vec![encode_time(Duration::from_secs(2))]));
    message.add_address_tlv(B, Tlv::new(TLV_LOCAL_IF, vec![LOCAL_IF_THIS_IF]));
    message.add_address_tlv(A, Tlv::new(TLV_LINK_STATUS, vec![LINK_STATUS_SYMMETRIC]));
    if let Some(mpr) = mpr {
        message.add_address_tlv(A, Tlv::new(TLV_MPR, vec![mpr]));
    }
    encode(&[message]).unwrap()
}

/// A TC of Z advertising the routers `advertised`.
fn tc_from_z(seq: u16, hop_limit: u8, ansn: u16, complete: bool, advertised: &[Ipv4Addr]) -> Vec<u8> {
    let mut message = Message::new(MSG_TYPE_TC);
    message.originator = Some(Z);
    message.hop_limit = Some(hop_limit);
    message.hop_count = Some(0);
    message.seq = Some(seq);
    message
        .tlvs
        .push(Tlv::new(TLV_VALIDITY_TIME, vec![encode_time(Duration::from_secs(15))]));
    let ext = if complete {
        CONT_SEQ_NUM_COMPLETE
    } else {
        CONT_SEQ_NUM_INCOMPLETE
    };
    message
        .tlvs
        .push(Tlv::with_ext(TLV_CONT_SEQ_NUM, ext, vec![(ansn >> 8) as u8, ansn as u8]));
    for &address in advertised.iter() {
        message.add_address_tlv(address, Tlv::new(TLV_NBR_ADDR_TYPE, vec![NBR_ADDR_TYPE_ORIGINATOR]));
        message.add_address_tlv(
            address,
            Tlv::new(TLV_LINK_METRIC, Tlv::link_metric_value(LINK_METRIC_OUTGOING_NEIGHBOR, 1)),
        );
    }
    encode(&[message]).unwrap()
}

fn advertised_by_z(node: &Node) -> Vec<Ipv4Addr> {
    node.topology()
        .routers()
        .iter()
        .filter(|tuple| tuple.from == Z)
        .map(|tuple| tuple.to)
        .collect()
}

#[test]
fn symmetric_hello_makes_the_link_symmetric() {
    let mut a = node(A);
    a.start(T0).unwrap();
    let first = sent(&mut a);
    assert_eq!(first.len(), 1);
    assert!(first[0].entry(B).is_none());

    a.handle_packet(at(100), B, &hello_from_b(1, None)).unwrap();
    let link = a.links().find(B).unwrap();
    assert_eq!(link.status(at(100)), LinkStatus::Symmetric);
    assert!(a.neighbors().find(B).unwrap().symmetric);

    run_until(&mut a, at(2000));
    let hellos: Vec<_> = sent(&mut a)
        .into_iter()
        .filter(|message| message.kind == MSG_TYPE_HELLO)
        .collect();
    assert_eq!(hellos.len(), 1);
    let entry = hellos[0].entry(B).unwrap();
    assert_eq!(entry.value(TLV_LINK_STATUS), Some(LINK_STATUS_SYMMETRIC));
}

#[test]
fn chain_converges_to_shortest_routes() {
    let mut mesh = Mesh::chain(&[A, B, C, D]);
    let network = Ipv4Addr::new(192, 168, 4, 0);
    mesh.node(D).add_attached_network(network, 24, 1, 1).unwrap();
    mesh.start(T0);
    mesh.run(at(30_000));

    let a = mesh.node(A);
    assert_eq!(flooding_mprs(a), vec![B]);
    assert!(a
        .topology()
        .advertising()
        .iter()
        .any(|router| router.originator == C));
    assert!(a.processed().len() > 0);

    let route = a.routes().get(D, 32).unwrap();
    assert_eq!(route.next_hop, B);
    assert_eq!(route.hops, 3);
    assert_eq!(a.routing().lookup(D).unwrap().next_hop, B);
    assert_eq!(a.routing().lookup(C).unwrap().next_hop, B);
    assert_eq!(a.routing().lookup(Ipv4Addr::new(192, 168, 4, 7)).unwrap().next_hop, B);

    let b = mesh.node(B);
    assert!(b.forwarded().len() > 0);
    let mut selectors: Vec<_> = b
        .neighbors()
        .iter()
        .filter(|neighbor| neighbor.flooding_mpr_selector)
        .map(|neighbor| neighbor.originator)
        .collect();
    selectors.sort();
    assert_eq!(selectors, vec![A, C]);

    let d = mesh.node(D);
    assert_eq!(d.routing().lookup(A).unwrap().next_hop, C);
}

#[test]
fn star_selects_sole_covers_then_the_lowest_address() {
    let links = [(A, B), (A, C), (A, E), (B, X), (C, X), (E, Y)];
    let nodes = [A, B, C, E, X, Y].iter().map(|address| node(*address)).collect();
    let mut mesh = Mesh::new(nodes, &links);
    mesh.start(T0);
    mesh.run(at(12_000));
    assert_eq!(flooding_mprs(mesh.node(A)), vec![B, E]);

    let nodes = [A, B, E, X, Y]
        .iter()
        .map(|address| node(*address))
        .chain(std::iter::once(node_with(C, config().with_willingness(WILL_ALWAYS, WILL_ALWAYS))))
        .collect();
    let mut mesh = Mesh::new(nodes, &links);
    mesh.start(T0);
    mesh.run(at(12_000));
    assert_eq!(flooding_mprs(mesh.node(A)), vec![C, E]);
}

#[test]
fn stale_tcs_leave_the_topology_alone() {
    let mut a = node(A);
    a.start(T0).unwrap();

    a.handle_packet(at(100), B, &tc_from_z(1, 1, 5, false, &[X])).unwrap();
    assert_eq!(advertised_by_z(&a), vec![X]);

    a.handle_packet(at(200), B, &tc_from_z(2, 1, 4, false, &[Y])).unwrap();
    assert_eq!(advertised_by_z(&a), vec![X]);
    assert_eq!(a.topology().advertising()[0].seq, 5);

    a.handle_packet(at(300), B, &tc_from_z(3, 1, 5, false, &[Y])).unwrap();
    assert_eq!(advertised_by_z(&a), vec![X]);
    assert_eq!(a.topology().advertising()[0].expiry, at(300) + Duration::from_secs(15));

    a.handle_packet(at(400), B, &tc_from_z(4, 1, 6, true, &[Y])).unwrap();
    assert_eq!(advertised_by_z(&a), vec![Y]);
    assert_eq!(a.topology().advertising()[0].seq, 6);
}

#[test]
fn only_flooding_mpr_selectors_get_their_tcs_relayed() {
    let mut a = node(A);
    a.start(T0).unwrap();
    sent(&mut a);

    a.handle_packet(at(100), B, &hello_from_b(1, None)).unwrap();
    a.handle_packet(at(200), B, &tc_from_z(1, 255, 1, true, &[X])).unwrap();
    assert!(sent(&mut a).is_empty());
    assert_eq!(advertised_by_z(&a), vec![X]);

    a.handle_packet(at(300), B, &hello_from_b(2, Some(MPR_FLOODING))).unwrap();
    assert!(a.neighbors().find(B).unwrap().flooding_mpr_selector);
    a.handle_packet(at(400), B, &tc_from_z(2, 255, 1, true, &[X])).unwrap();
    let relayed = sent(&mut a);
    assert_eq!(relayed.len(), 1);
    assert_eq!(relayed[0].kind, MSG_TYPE_TC);
    assert_eq!(relayed[0].originator, Some(Z));
    assert_eq!(relayed[0].hop_limit, Some(254));
    assert_eq!(relayed[0].hop_count, Some(1));

    a.handle_packet(at(500), B, &tc_from_z(2, 255, 1, true, &[X])).unwrap();
    assert!(sent(&mut a).is_empty());
}

#[test]
fn cut_link_makes_a_lost_neighbor() {
    let mut mesh = Mesh::chain(&[A, B]);
    mesh.start(T0);
    mesh.run(at(10_000));
    assert_eq!(mesh.node(A).routing().lookup(B).unwrap().next_hop, B);

    mesh.links.clear();
    mesh.run(at(17_500));
    let a = mesh.node(A);
    assert!(a.lost_neighbors().contains(B));
    assert!(!a.neighbors().iter().any(|neighbor| neighbor.symmetric));
    assert!(a.routes().get(B, 32).is_none());
    assert!(a.routing().lookup(B).is_none());
}
