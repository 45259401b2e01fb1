//! The Neighbor Set and the Lost Neighbor Set (RFC 6130 §7, RFC 7181 §6).

use std::net::Ipv4Addr;

use routing_core::{time_before, Error, Time};

/// One neighbor router, whatever interfaces it is heard on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborTuple {
    pub addresses: Vec<Ipv4Addr>,
    pub originator: Ipv4Addr,
    pub symmetric: bool,
    pub willingness_flooding: u8,
    pub willingness_routing: u8,
    /// Selected by this node as a flooding MPR.
    pub flooding_mpr: bool,
    /// Selected by this node as a routing MPR.
    pub routing_mpr: bool,
    /// The neighbor selected this node as its flooding MPR.
    pub flooding_mpr_selector: bool,
    /// The neighbor selected this node as its routing MPR, so TCs advertise it.
    pub routing_mpr_selector: bool,
    pub in_metric: Option<u32>,
    pub out_metric: Option<u32>,
}

impl NeighborTuple {
    pub fn new(addresses: Vec<Ipv4Addr>, originator: Ipv4Addr) -> Self {
        NeighborTuple {
            addresses,
            originator,
            symmetric: false,
            willingness_flooding: 0,
            willingness_routing: 0,
            flooding_mpr: false,
            routing_mpr: false,
            flooding_mpr_selector: false,
            routing_mpr_selector: false,
            in_metric: None,
            out_metric: None,
        }
    }

    pub fn has_address(&self, address: Ipv4Addr) -> bool {
        self.addresses.contains(&address)
    }
}

#[derive(Debug)]
pub struct NeighborSet {
    neighbors: Vec<NeighborTuple>,
    capacity: usize,
}

/// The outcome of `NeighborSet::merge`.
#[derive(Debug, Default)]
pub struct Merge {
    pub index: usize,
    /// Addresses of a symmetric neighbor the HELLO no longer lists.
    pub lost: Vec<Ipv4Addr>,
    /// Every address the HELLO no longer lists.
    pub removed: Vec<Ipv4Addr>,
}

impl NeighborSet {
    pub fn new(capacity: usize) -> Self {
        NeighborSet {
            neighbors: Vec::new(),
            capacity,
        }
    }

    /// Makes one tuple hold exactly `addresses`.
    ///
    /// Tuples sharing an address with `addresses` are merged into the first
    /// of them; a new tuple is created if none does.
    pub fn merge(&mut self, addresses: &[Ipv4Addr], originator: Ipv4Addr) -> Result<Merge, Error> {
        let matching: Vec<usize> = self
            .neighbors
            .iter()
            .enumerate()
            .filter(|(_, neighbor)| {
                neighbor.originator == originator
                    || neighbor.addresses.iter().any(|address| addresses.contains(address))
            })
            .map(|(index, _)| index)
            .collect();

        let mut merge = Merge::default();
        for &index in matching.iter() {
            let neighbor = &self.neighbors[index];
            for address in neighbor.addresses.iter() {
                if !addresses.contains(address) && !merge.removed.contains(address) {
                    merge.removed.push(*address);
                    if neighbor.symmetric {
                        merge.lost.push(*address);
                    }
                }
            }
        }

        let mut tuple = match matching.first() {
            Some(&first) => self.neighbors[first].clone(),
            None => {
                if self.neighbors.len() >= self.capacity {
                    return Err(Error::ResourceExhausted(self.capacity));
                }
                NeighborTuple::new(Vec::new(), originator)
            }
        };
        if matching.len() > 1 {
            info!("Merging {} neighbor tuples into {}", matching.len(), originator);
            tuple.symmetric = matching.iter().any(|&index| self.neighbors[index].symmetric);
        }
        tuple.addresses = addresses.to_vec();
        tuple.originator = originator;

        for &index in matching.iter().rev() {
            self.neighbors.remove(index);
        }
        self.neighbors.push(tuple);
        merge.index = self.neighbors.len() - 1;
        Ok(merge)
    }

    pub fn find(&self, address: Ipv4Addr) -> Option<&NeighborTuple> {
        self.neighbors.iter().find(|neighbor| neighbor.has_address(address))
    }

    pub fn by_originator(&self, originator: Ipv4Addr) -> Option<&NeighborTuple> {
        self.neighbors.iter().find(|neighbor| neighbor.originator == originator)
    }

    pub fn get(&self, index: usize) -> Option<&NeighborTuple> {
        self.neighbors.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut NeighborTuple> {
        self.neighbors.get_mut(index)
    }

    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&NeighborTuple) -> bool,
    {
        self.neighbors.retain(keep)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NeighborTuple> {
        self.neighbors.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut NeighborTuple> {
        self.neighbors.iter_mut()
    }

    pub fn symmetric(&self) -> impl Iterator<Item = &NeighborTuple> {
        self.neighbors.iter().filter(|neighbor| neighbor.symmetric)
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

/// A former symmetric neighbor address, advertised as lost for a while.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LostNeighborTuple {
    pub address: Ipv4Addr,
    pub expiry: Time,
}

#[derive(Debug)]
pub struct LostNeighborSet {
    lost: Vec<LostNeighborTuple>,
    capacity: usize,
}

impl LostNeighborSet {
    pub fn new(capacity: usize) -> Self {
        LostNeighborSet {
            lost: Vec::new(),
            capacity,
        }
    }

    pub fn insert(&mut self, address: Ipv4Addr, expiry: Time) -> Result<(), Error> {
        match self.lost.iter_mut().find(|tuple| tuple.address == address) {
            Some(tuple) => tuple.expiry = expiry,
            None => {
                if self.lost.len() >= self.capacity {
                    return Err(Error::ResourceExhausted(self.capacity));
                }
                debug!("Neighbor address {} lost", address);
                self.lost.push(LostNeighborTuple { address, expiry });
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, address: Ipv4Addr) {
        self.lost.retain(|tuple| tuple.address != address);
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        self.lost.iter().any(|tuple| tuple.address == address)
    }

    pub fn purge(&mut self, now: Time) -> usize {
        let before = self.lost.len();
        self.lost.retain(|tuple| !time_before(tuple.expiry, now));
        before - self.lost.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LostNeighborTuple> {
        self.lost.iter()
    }

    pub fn len(&self) -> usize {
        self.lost.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lost.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    #[test]
    fn merge_creates_then_updates() {
        let mut set = NeighborSet::new(4);
        let merge = set.merge(&[addr(2)], addr(2)).unwrap();
        assert_eq!(merge.index, 0);
        assert!(merge.removed.is_empty());

        set.get_mut(0).unwrap().symmetric = true;
        let merge = set.merge(&[addr(2), addr(3)], addr(2)).unwrap();
        assert!(merge.removed.is_empty());
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(merge.index).unwrap().addresses, vec![addr(2), addr(3)]);
        assert!(set.get(merge.index).unwrap().symmetric);
    }

    #[test]
    fn dropped_addresses_of_a_symmetric_neighbor_are_lost() {
        let mut set = NeighborSet::new(4);
        set.merge(&[addr(2), addr(3)], addr(2)).unwrap();
        set.get_mut(0).unwrap().symmetric = true;

        let merge = set.merge(&[addr(2)], addr(2)).unwrap();
        assert_eq!(merge.lost, vec![addr(3)]);
        assert_eq!(merge.removed, vec![addr(3)]);
    }

    #[test]
    fn overlapping_tuples_are_merged() {
        let mut set = NeighborSet::new(4);
        set.merge(&[addr(2)], addr(2)).unwrap();
        set.merge(&[addr(3)], addr(3)).unwrap();
        set.get_mut(1).unwrap().symmetric = true;

        let merge = set.merge(&[addr(2), addr(3)], addr(2)).unwrap();
        assert_eq!(set.len(), 1);
        assert!(merge.removed.is_empty());
        assert!(set.get(merge.index).unwrap().symmetric);
    }

    #[test]
    fn lost_neighbors_expire() {
        let mut lost = LostNeighborSet::new(2);
        lost.insert(addr(2), Time::from_secs(5)).unwrap();
        lost.insert(addr(2), Time::from_secs(6)).unwrap();
        assert_eq!(lost.len(), 1);
        assert_eq!(lost.purge(Time::from_secs(6)), 0);
        assert_eq!(lost.purge(Time::from_secs(7)), 1);
        assert!(!lost.contains(addr(2)));
    }
}
