//! HELLO messages (RFC 6130 §11, RFC 7181 §15).
//!
//! `Hello::parse` checks a received message and extracts what the
//! information bases need; a message failing any check is discarded whole.
//! `build` turns the local information bases into the next HELLO.

use std::{net::Ipv4Addr, time::Duration};

use routing_core::Time;

use crate::{
    codec,
    config::Config,
    constants::*,
    link::{LinkSet, LinkStatus},
    message::{AddressEntry, Message, Tlv},
    neighbor::{LostNeighborSet, NeighborSet},
};

/// A neighbor of the sender, as the sender sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoHopReport {
    pub address: Ipv4Addr,
    /// The sender has a symmetric link to the address; otherwise it lost it.
    pub symmetric: bool,
    pub in_metric: Option<u32>,
    pub out_metric: Option<u32>,
}

/// A validated HELLO.
#[derive(Debug, Clone, PartialEq)]
pub struct Hello {
    pub originator: Ipv4Addr,
    pub validity: Duration,
    pub interval: Option<Duration>,
    pub willingness_flooding: u8,
    pub willingness_routing: u8,
    /// The addresses of the sending interface.
    pub sending: Vec<Ipv4Addr>,
    /// Every address of the sender.
    pub neighbor: Vec<Ipv4Addr>,
    /// The LINK_STATUS the sender reports for this node.
    pub link_status: Option<u8>,
    /// The sender's incoming metric of the link from this node.
    pub out_metric: Option<u32>,
    /// The MPR TLV the sender attached to this node.
    pub mpr: Option<u8>,
    pub two_hop: Vec<TwoHopReport>,
}

impl Hello {
    /// Checks a HELLO received from `source`.
    ///
    /// `own` holds every address of this node, `interface` the address of
    /// the receiving interface.
    pub fn parse(
        message: &Message,
        source: Ipv4Addr,
        own: &[Ipv4Addr],
        interface: Ipv4Addr,
    ) -> Result<Hello, &'static str> {
        let originator = message.originator.ok_or("HELLO without an originator")?;
        if own.contains(&originator) {
            return Err("own HELLO");
        }
        if message.hop_limit.map_or(false, |limit| limit != 1) {
            return Err("HELLO with a hop limit other than 1");
        }
        if message.hop_count.map_or(false, |count| count != 0) {
            return Err("HELLO with a nonzero hop count");
        }
        if message.count(TLV_VALIDITY_TIME) != 1 {
            return Err("HELLO without exactly one VALIDITY_TIME");
        }
        if message.count(TLV_INTERVAL_TIME) > 1 || message.count(TLV_MPR_WILLING) > 1 {
            return Err("HELLO with repeated message TLVs");
        }
        let validity = message.validity_time().ok_or("malformed VALIDITY_TIME")?;
        let interval = match message.tlv(TLV_INTERVAL_TIME) {
            Some(_) => Some(message.interval_time().ok_or("malformed INTERVAL_TIME")?),
            None => None,
        };
        let (willingness_flooding, willingness_routing) = match message.tlv(TLV_MPR_WILLING) {
            Some(tlv) => {
                let value = tlv.byte().ok_or("malformed MPR_WILLING")?;
                (value >> 4, value & 0x0f)
            }
            None => (WILL_DEFAULT, WILL_DEFAULT),
        };

        for entry in message.addresses.iter() {
            check_address(entry, own)?;
        }

        let mut sending = Vec::new();
        let mut neighbor = Vec::new();
        for entry in message.addresses.iter() {
            match entry.value(TLV_LOCAL_IF) {
                Some(LOCAL_IF_THIS_IF) => {
                    sending.push(entry.address);
                    neighbor.push(entry.address);
                }
                Some(_) => neighbor.push(entry.address),
                None => {}
            }
        }
        if !sending.contains(&source) {
            sending.push(source);
        }
        if !neighbor.contains(&source) {
            neighbor.push(source);
        }

        let mut hello = Hello {
            originator,
            validity,
            interval,
            willingness_flooding,
            willingness_routing,
            sending,
            neighbor,
            link_status: None,
            out_metric: None,
            mpr: None,
            two_hop: Vec::new(),
        };

        for entry in message.addresses.iter() {
            if entry.address == interface {
                hello.link_status = entry.value(TLV_LINK_STATUS);
                hello.out_metric = entry.metric(LINK_METRIC_INCOMING_LINK);
            }
            if own.contains(&entry.address) {
                if let Some(mpr) = entry.value(TLV_MPR) {
                    hello.mpr = Some(mpr);
                }
                continue;
            }
            if hello.neighbor.contains(&entry.address) {
                continue;
            }
            let link_status = entry.value(TLV_LINK_STATUS);
            let other = entry.value(TLV_OTHER_NEIGHB);
            let symmetric = link_status == Some(LINK_STATUS_SYMMETRIC) || other == Some(OTHER_NEIGHB_SYMMETRIC);
            let lost = link_status == Some(LINK_STATUS_LOST) || other == Some(OTHER_NEIGHB_LOST);
            if symmetric || lost {
                hello.two_hop.push(TwoHopReport {
                    address: entry.address,
                    symmetric,
                    in_metric: entry.metric(LINK_METRIC_INCOMING_NEIGHBOR),
                    out_metric: entry.metric(LINK_METRIC_OUTGOING_NEIGHBOR),
                });
            }
        }
        Ok(hello)
    }
}

fn check_address(entry: &AddressEntry, own: &[Ipv4Addr]) -> Result<(), &'static str> {
    for &kind in &[TLV_LOCAL_IF, TLV_LINK_STATUS, TLV_OTHER_NEIGHB, TLV_MPR] {
        if entry.count(kind) > 1 {
            return Err("repeated address TLV");
        }
        if entry.count(kind) == 1 && entry.value(kind).is_none() {
            return Err("malformed address TLV");
        }
    }
    let link_status = entry.value(TLV_LINK_STATUS);
    let other = entry.value(TLV_OTHER_NEIGHB);
    if entry.value(TLV_LOCAL_IF).is_some() {
        if link_status.is_some() || other.is_some() {
            return Err("LOCAL_IF with LINK_STATUS or OTHER_NEIGHB");
        }
        if own.contains(&entry.address) {
            return Err("LOCAL_IF for an own address");
        }
    }
    if entry.count(TLV_LINK_METRIC) > 0 {
        let reported = matches!(link_status, Some(LINK_STATUS_SYMMETRIC) | Some(LINK_STATUS_HEARD))
            || other == Some(OTHER_NEIGHB_SYMMETRIC);
        if !reported {
            return Err("LINK_METRIC without a symmetric or heard status");
        }
        if entry.tlvs(TLV_LINK_METRIC).any(|tlv| tlv.link_metric().is_none()) {
            return Err("malformed LINK_METRIC");
        }
    }
    Ok(())
}

/// Builds the HELLO advertising the local information bases.
pub fn build(
    now: Time,
    config: &Config,
    originator: Ipv4Addr,
    interface: Ipv4Addr,
    seq: u16,
    links: &LinkSet,
    neighbors: &NeighborSet,
    lost: &LostNeighborSet,
) -> Message {
    let mut message = Message::new(MSG_TYPE_HELLO);
    message.originator = Some(originator);
    message.hop_limit = Some(1);
    message.hop_count = Some(0);
    message.seq = Some(seq);
    message
        .tlvs
        .push(Tlv::new(TLV_VALIDITY_TIME, vec![codec::encode_time(config.h_hold_time)]));
    message
        .tlvs
        .push(Tlv::new(TLV_INTERVAL_TIME, vec![codec::encode_time(config.hello_interval)]));
    message.tlvs.push(Tlv::new(
        TLV_MPR_WILLING,
        vec![config.willingness_flooding << 4 | config.willingness_routing & 0x0f],
    ));

    message.add_address_tlv(interface, Tlv::new(TLV_LOCAL_IF, vec![LOCAL_IF_THIS_IF]));

    for link in links.iter() {
        let status = match link.status(now) {
            LinkStatus::Pending => continue,
            LinkStatus::Heard => LINK_STATUS_HEARD,
            LinkStatus::Symmetric => LINK_STATUS_SYMMETRIC,
            LinkStatus::Lost => LINK_STATUS_LOST,
        };
        for &address in link.addresses.iter() {
            message.add_address_tlv(address, Tlv::new(TLV_LINK_STATUS, vec![status]));
            if status == LINK_STATUS_LOST {
                continue;
            }
            match link.out_metric {
                Some(out) if out == link.in_metric => {
                    let flags = LINK_METRIC_INCOMING_LINK
                        | LINK_METRIC_OUTGOING_LINK
                        | LINK_METRIC_INCOMING_NEIGHBOR
                        | LINK_METRIC_OUTGOING_NEIGHBOR;
                    message.add_address_tlv(address, metric_tlv(flags, out));
                }
                out => {
                    let incoming = LINK_METRIC_INCOMING_LINK | LINK_METRIC_INCOMING_NEIGHBOR;
                    message.add_address_tlv(address, metric_tlv(incoming, link.in_metric));
                    if let Some(out) = out {
                        let outgoing = LINK_METRIC_OUTGOING_LINK | LINK_METRIC_OUTGOING_NEIGHBOR;
                        message.add_address_tlv(address, metric_tlv(outgoing, out));
                    }
                }
            }
            if status != LINK_STATUS_SYMMETRIC {
                continue;
            }
            let mpr = neighbors.find(address).and_then(|neighbor| {
                match (neighbor.flooding_mpr, neighbor.routing_mpr) {
                    (true, true) => Some(MPR_FLOOD_ROUTE),
                    (true, false) => Some(MPR_FLOODING),
                    (false, true) => Some(MPR_ROUTING),
                    (false, false) => None,
                }
            });
            if let Some(mpr) = mpr {
                message.add_address_tlv(address, Tlv::new(TLV_MPR, vec![mpr]));
            }
        }
    }

    for neighbor in neighbors.symmetric() {
        for &address in neighbor.addresses.iter() {
            if message.entry(address).is_none() {
                message.add_address_tlv(address, Tlv::new(TLV_OTHER_NEIGHB, vec![OTHER_NEIGHB_SYMMETRIC]));
            }
        }
    }
    for tuple in lost.iter() {
        if message.entry(tuple.address).is_none() {
            message.add_address_tlv(tuple.address, Tlv::new(TLV_OTHER_NEIGHB, vec![OTHER_NEIGHB_LOST]));
        }
    }
    message
}

fn metric_tlv(flags: u8, metric: u32) -> Tlv {
    Tlv::new(TLV_LINK_METRIC, Tlv::link_metric_value(flags, metric))
}
