//! The Link Set and the 2-Hop Sets it owns (RFC 6130 §7, RFC 7181 §6).

use std::{fmt, net::Ipv4Addr, time::Duration};

use routing_core::{time_before, Error, Time};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Pending,
    Heard,
    Symmetric,
    Lost,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinkStatus::Pending => write!(f, "PENDING"),
            LinkStatus::Heard => write!(f, "HEARD"),
            LinkStatus::Symmetric => write!(f, "SYMMETRIC"),
            LinkStatus::Lost => write!(f, "LOST"),
        }
    }
}

/// A neighbor's neighbor, as reported over one link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoHopTuple {
    pub address: Ipv4Addr,
    pub in_metric: Option<u32>,
    pub out_metric: Option<u32>,
    pub expiry: Time,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkTuple {
    /// The addresses of the neighbor interface at the other end.
    pub addresses: Vec<Ipv4Addr>,
    /// `None` stands for an expired time.
    pub heard_time: Option<Time>,
    pub sym_time: Option<Time>,
    /// The tuple is removed at this time.
    pub time: Time,
    pub quality: f64,
    pub pending: bool,
    pub lost: bool,
    pub in_metric: u32,
    /// Reported by the neighbor. Unknown until its first LINK_METRIC about us.
    pub out_metric: Option<u32>,
    /// When a HELLO is overdue and the quality decays.
    pub next_loss_check: Option<Time>,
    pub hello_interval: Option<Duration>,
    pub two_hop: Vec<TwoHopTuple>,
}

impl LinkTuple {
    pub fn new(addresses: Vec<Ipv4Addr>, now: Time, validity: Duration, config: &Config) -> Self {
        LinkTuple {
            addresses,
            heard_time: None,
            sym_time: None,
            time: now + validity,
            quality: config.initial_quality,
            pending: config.initial_pending,
            lost: false,
            in_metric: config.default_link_metric,
            out_metric: None,
            next_loss_check: None,
            hello_interval: None,
            two_hop: Vec::new(),
        }
    }

    pub fn status(&self, now: Time) -> LinkStatus {
        if self.pending {
            LinkStatus::Pending
        } else if self.lost {
            LinkStatus::Lost
        } else if is_running(self.sym_time, now) {
            LinkStatus::Symmetric
        } else if is_running(self.heard_time, now) {
            LinkStatus::Heard
        } else {
            LinkStatus::Lost
        }
    }

    pub fn is_symmetric(&self, now: Time) -> bool {
        self.status(now) == LinkStatus::Symmetric
    }

    pub fn has_address(&self, address: Ipv4Addr) -> bool {
        self.addresses.contains(&address)
    }

    /// A HELLO arrived over the link.
    pub fn on_receive(&mut self, now: Time, config: &Config) {
        self.quality = (1.0 - config.hyst_scale) * self.quality + config.hyst_scale;
        if self.quality >= config.hyst_accept {
            self.pending = false;
            self.lost = false;
        }
        if let Some(interval) = self.hello_interval {
            self.next_loss_check = Some(now + interval);
        }
    }

    /// An expected HELLO did not arrive.
    pub fn on_loss(&mut self, now: Time, config: &Config) {
        self.quality *= 1.0 - config.hyst_scale;
        if !self.pending && !self.lost && self.quality < config.hyst_reject {
            debug!("Link to {:?} lost on quality {:.3}", self.addresses, self.quality);
            self.lost = true;
            let hold = now + config.l_hold_time;
            if time_before(hold, self.time) {
                self.time = hold;
            }
        }
    }

    /// Adds or refreshes a 2-hop tuple.
    pub fn add_two_hop(&mut self, tuple: TwoHopTuple, capacity: usize) -> Result<(), Error> {
        match self.two_hop.iter_mut().find(|known| known.address == tuple.address) {
            Some(known) => *known = tuple,
            None => {
                if self.two_hop.len() >= capacity {
                    return Err(Error::ResourceExhausted(capacity));
                }
                self.two_hop.push(tuple);
            }
        }
        Ok(())
    }

    pub fn remove_two_hop(&mut self, address: Ipv4Addr) -> bool {
        let before = self.two_hop.len();
        self.two_hop.retain(|tuple| tuple.address != address);
        before != self.two_hop.len()
    }
}

/// Whether an optional expiry time is still in the future.
pub fn is_running(time: Option<Time>, now: Time) -> bool {
    match time {
        Some(time) => !time_before(time, now),
        None => false,
    }
}

/// The links of the one interface the engine runs on.
#[derive(Debug)]
pub struct LinkSet {
    links: Vec<LinkTuple>,
    capacity: usize,
}

impl LinkSet {
    pub fn new(capacity: usize) -> Self {
        LinkSet {
            links: Vec::new(),
            capacity,
        }
    }

    /// The indexes of the links sharing an address with `addresses`.
    pub fn matching(&self, addresses: &[Ipv4Addr]) -> Vec<usize> {
        self.links
            .iter()
            .enumerate()
            .filter(|(_, link)| link.addresses.iter().any(|address| addresses.contains(address)))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn insert(&mut self, link: LinkTuple) -> Result<usize, Error> {
        if self.links.len() >= self.capacity {
            return Err(Error::ResourceExhausted(self.capacity));
        }
        self.links.push(link);
        Ok(self.links.len() - 1)
    }

    pub fn remove(&mut self, index: usize) -> LinkTuple {
        self.links.remove(index)
    }

    pub fn find(&self, address: Ipv4Addr) -> Option<&LinkTuple> {
        self.links.iter().find(|link| link.has_address(address))
    }

    pub fn get(&self, index: usize) -> Option<&LinkTuple> {
        self.links.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut LinkTuple> {
        self.links.get_mut(index)
    }

    /// Forgets `addresses` and drops the links left without one.
    pub fn remove_addresses(&mut self, addresses: &[Ipv4Addr]) {
        for link in self.links.iter_mut() {
            link.addresses.retain(|address| !addresses.contains(address));
        }
        self.links.retain(|link| !link.addresses.is_empty());
    }

    /// Decays overdue links and drops expired tuples.
    ///
    /// Returns `true` if anything changed.
    pub fn sweep(&mut self, now: Time, config: &Config) -> bool {
        let mut changed = false;
        for link in self.links.iter_mut() {
            while let (Some(check), Some(interval)) = (link.next_loss_check, link.hello_interval) {
                if !time_before(check, now) {
                    break;
                }
                let status = link.status(now);
                link.on_loss(now, config);
                link.next_loss_check = Some(check + interval);
                changed |= status != link.status(now);
            }
            let before = link.two_hop.len();
            link.two_hop.retain(|tuple| !time_before(tuple.expiry, now));
            changed |= before != link.two_hop.len();
        }

        let before = self.links.len();
        self.links.retain(|link| {
            let alive = !time_before(link.time, now);
            if !alive {
                debug!("Link to {:?} expired", link.addresses);
            }
            alive
        });
        changed || before != self.links.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkTuple> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
