//! TC messages (RFC 7181 §16).

use std::{fmt, net::Ipv4Addr, time::Duration};

use crate::{
    codec,
    config::Config,
    constants::*,
    message::{AddressEntry, Message, Tlv},
    neighbor::NeighborSet,
    topology::LocalNetwork,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Kind {
    /// A neighbor router, known by its originator address.
    Originator,
    /// An address of a neighbor router.
    Routable,
    /// Both at once.
    RoutableOriginator,
    /// An attached network at the given hop distance.
    Gateway(u8),
}

/// One advertised address of a TC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Advertisement {
    pub address: Ipv4Addr,
    pub prefix: u8,
    pub kind: Kind,
    pub metric: u32,
}

impl Advertisement {
    pub fn is_router(&self) -> bool {
        match self.kind {
            Kind::Originator | Kind::RoutableOriginator => true,
            _ => false,
        }
    }

    pub fn is_routable(&self) -> bool {
        match self.kind {
            Kind::Routable | Kind::RoutableOriginator => true,
            _ => false,
        }
    }
}

/// A validated TC.
#[derive(Debug, Clone, PartialEq)]
pub struct Tc {
    pub originator: Ipv4Addr,
    pub seq: u16,
    pub hop_limit: u8,
    pub ansn: u16,
    /// The TC lists everything its originator advertises.
    pub complete: bool,
    pub validity: Duration,
    pub advertisements: Vec<Advertisement>,
}

impl fmt::Display for Tc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "TC from {} ansn {} with {} advertisements",
            self.originator,
            self.ansn,
            self.advertisements.len()
        )
    }
}

impl Tc {
    /// Checks a TC. `own` holds every address of this node.
    pub fn parse(message: &Message, own: &[Ipv4Addr]) -> Result<Tc, &'static str> {
        let originator = message.originator.ok_or("TC without an originator")?;
        let seq = message.seq.ok_or("TC without a sequence number")?;
        let hop_limit = message.hop_limit.ok_or("TC without a hop limit")?;
        if own.contains(&originator) {
            return Err("own TC");
        }
        if message.count(TLV_VALIDITY_TIME) != 1 {
            return Err("TC without exactly one VALIDITY_TIME");
        }
        if message.count(TLV_CONT_SEQ_NUM) != 1 {
            return Err("TC without exactly one CONT_SEQ_NUM");
        }
        let validity = message.validity_time().ok_or("malformed VALIDITY_TIME")?;
        let (ansn, complete) = message
            .tlv(TLV_CONT_SEQ_NUM)
            .and_then(|tlv| match (tlv.ext, tlv.short()) {
                (CONT_SEQ_NUM_COMPLETE, Some(ansn)) => Some((ansn, true)),
                (CONT_SEQ_NUM_INCOMPLETE, Some(ansn)) => Some((ansn, false)),
                _ => None,
            })
            .ok_or("malformed CONT_SEQ_NUM")?;

        let mut advertisements = Vec::new();
        for entry in message.addresses.iter() {
            if let Some(advertisement) = advertisement(entry)? {
                advertisements.push(advertisement);
            }
        }
        Ok(Tc {
            originator,
            seq,
            hop_limit,
            ansn,
            complete,
            validity,
            advertisements,
        })
    }
}

fn advertisement(entry: &AddressEntry) -> Result<Option<Advertisement>, &'static str> {
    if entry.count(TLV_NBR_ADDR_TYPE) > 1 || entry.count(TLV_GATEWAY) > 1 {
        return Err("repeated address TLV");
    }
    let address_type = entry.tlvs(TLV_NBR_ADDR_TYPE).next();
    let gateway = entry.tlvs(TLV_GATEWAY).next();
    let kind = match (address_type, gateway) {
        (Some(_), Some(_)) => return Err("NBR_ADDR_TYPE with GATEWAY"),
        (Some(tlv), None) => match tlv.byte() {
            Some(NBR_ADDR_TYPE_ORIGINATOR) => Kind::Originator,
            Some(NBR_ADDR_TYPE_ROUTABLE) => Kind::Routable,
            Some(NBR_ADDR_TYPE_ROUTABLE_ORIG) => Kind::RoutableOriginator,
            _ => return Err("malformed NBR_ADDR_TYPE"),
        },
        (None, Some(tlv)) => Kind::Gateway(tlv.byte().ok_or("malformed GATEWAY")?),
        (None, None) => {
            if entry.count(TLV_LINK_METRIC) > 0 {
                return Err("LINK_METRIC without NBR_ADDR_TYPE or GATEWAY");
            }
            return Ok(None);
        }
    };
    if entry.tlvs(TLV_LINK_METRIC).any(|tlv| tlv.link_metric().is_none()) {
        return Err("malformed LINK_METRIC");
    }
    Ok(Some(Advertisement {
        address: entry.address,
        prefix: entry.prefix,
        kind,
        metric: entry
            .metric(LINK_METRIC_OUTGOING_NEIGHBOR)
            .unwrap_or(MAXIMUM_METRIC),
    }))
}

/// What this node advertises: its routing MPR selectors and its attached
/// networks, in a stable order.
pub fn advertisements(neighbors: &NeighborSet, local: &[LocalNetwork]) -> Vec<Advertisement> {
    let mut advertisements = Vec::new();
    for neighbor in neighbors.symmetric().filter(|neighbor| neighbor.routing_mpr_selector) {
        let metric = match neighbor.out_metric {
            Some(metric) => metric,
            None => continue,
        };
        if !neighbor.has_address(neighbor.originator) {
            advertisements.push(Advertisement {
                address: neighbor.originator,
                prefix: 32,
                kind: Kind::Originator,
                metric,
            });
        }
        for &address in neighbor.addresses.iter() {
            let kind = if address == neighbor.originator {
                Kind::RoutableOriginator
            } else {
                Kind::Routable
            };
            advertisements.push(Advertisement {
                address,
                prefix: 32,
                kind,
                metric,
            });
        }
    }
    for network in local.iter() {
        advertisements.push(Advertisement {
            address: network.network,
            prefix: network.prefix,
            kind: Kind::Gateway(network.distance),
            metric: network.metric,
        });
    }
    advertisements.sort();
    advertisements.dedup();
    advertisements
}

/// Builds a complete TC.
pub fn build(config: &Config, originator: Ipv4Addr, seq: u16, ansn: u16, advertisements: &[Advertisement]) -> Message {
    let mut message = Message::new(MSG_TYPE_TC);
    message.originator = Some(originator);
    message.hop_limit = Some(config.tc_hop_limit);
    message.hop_count = Some(0);
    message.seq = Some(seq);
    message
        .tlvs
        .push(Tlv::new(TLV_VALIDITY_TIME, vec![codec::encode_time(config.t_hold_time)]));
    message
        .tlvs
        .push(Tlv::new(TLV_INTERVAL_TIME, vec![codec::encode_time(config.tc_interval)]));
    message.tlvs.push(Tlv::with_ext(
        TLV_CONT_SEQ_NUM,
        CONT_SEQ_NUM_COMPLETE,
        vec![(ansn >> 8) as u8, ansn as u8],
    ));

    for advertisement in advertisements.iter() {
        let entry = message.address_mut(advertisement.address, advertisement.prefix);
        let tlv = match advertisement.kind {
            Kind::Originator => Tlv::new(TLV_NBR_ADDR_TYPE, vec![NBR_ADDR_TYPE_ORIGINATOR]),
            Kind::Routable => Tlv::new(TLV_NBR_ADDR_TYPE, vec![NBR_ADDR_TYPE_ROUTABLE]),
            Kind::RoutableOriginator => Tlv::new(TLV_NBR_ADDR_TYPE, vec![NBR_ADDR_TYPE_ROUTABLE_ORIG]),
            Kind::Gateway(distance) => Tlv::new(TLV_GATEWAY, vec![distance]),
        };
        entry.tlvs.push(tlv);
        entry.tlvs.push(Tlv::new(
            TLV_LINK_METRIC,
            Tlv::link_metric_value(LINK_METRIC_OUTGOING_NEIGHBOR, advertisement.metric),
        ));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    fn advertised() -> Vec<Advertisement> {
        vec![
            Advertisement {
                address: addr(2),
                prefix: 32,
                kind: Kind::RoutableOriginator,
                metric: 1,
            },
            Advertisement {
                address: Ipv4Addr::new(192, 168, 7, 0),
                prefix: 24,
                kind: Kind::Gateway(1),
                metric: 4,
            },
        ]
    }

    #[test]
    fn built_tc_parses_back() {
        let message = build(&Config::default(), addr(3), 9, 4, &advertised());
        let tc = Tc::parse(&message, &[addr(1)]).unwrap();
        assert_eq!(tc.originator, addr(3));
        assert_eq!(tc.ansn, 4);
        assert!(tc.complete);
        assert_eq!(tc.hop_limit, 255);
        assert_eq!(tc.validity, Duration::from_secs(15));
        assert_eq!(tc.advertisements, advertised());
    }

    #[test]
    fn inconsistent_tcs_are_rejected() {
        let own = [addr(1)];
        let good = build(&Config::default(), addr(3), 9, 4, &advertised());

        let mut message = good.clone();
        message.seq = None;
        assert!(Tc::parse(&message, &own).is_err());

        let mut message = good.clone();
        message.tlvs.retain(|tlv| tlv.kind != TLV_CONT_SEQ_NUM);
        assert!(Tc::parse(&message, &own).is_err());

        let mut message = good.clone();
        message.add_address_tlv(addr(2), Tlv::new(TLV_GATEWAY, vec![1]));
        assert!(Tc::parse(&message, &own).is_err());

        let mut message = good.clone();
        message.add_address_tlv(
            addr(5),
            Tlv::new(TLV_LINK_METRIC, Tlv::link_metric_value(LINK_METRIC_OUTGOING_NEIGHBOR, 1)),
        );
        assert!(Tc::parse(&message, &own).is_err());

        assert!(Tc::parse(&good, &[addr(3)]).is_err());
    }
}
