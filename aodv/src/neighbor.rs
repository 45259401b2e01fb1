//! The neighbor table, fed by HELLO messages.

use std::net::Ipv4Addr;

use routing_core::{Error, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub address: Ipv4Addr,
    pub lifetime: Time,
    /// A HELLO has been heard from the neighbor.
    pub valid_link: bool,
}

#[derive(Debug)]
pub struct NeighborTable {
    neighbors: Vec<Neighbor>,
    capacity: usize,
}

impl NeighborTable {
    pub fn new(capacity: usize) -> Self {
        NeighborTable {
            neighbors: Vec::new(),
            capacity,
        }
    }

    /// Records a HELLO from `address`.
    ///
    /// Returns `true` if the neighbor is new.
    pub fn refresh(&mut self, address: Ipv4Addr, lifetime: Time) -> Result<bool, Error> {
        let key = u32::from(address);
        match self
            .neighbors
            .binary_search_by_key(&key, |neighbor| u32::from(neighbor.address))
        {
            Ok(index) => {
                let neighbor = &mut self.neighbors[index];
                neighbor.lifetime = lifetime;
                neighbor.valid_link = true;
                Ok(false)
            }
            Err(index) => {
                if self.neighbors.len() >= self.capacity {
                    return Err(Error::ResourceExhausted(self.capacity));
                }
                self.neighbors.insert(
                    index,
                    Neighbor {
                        address,
                        lifetime,
                        valid_link: true,
                    },
                );
                Ok(true)
            }
        }
    }

    pub fn get(&self, address: Ipv4Addr) -> Option<&Neighbor> {
        self.neighbors.iter().find(|neighbor| neighbor.address == address)
    }

    pub fn is_valid(&self, address: Ipv4Addr) -> bool {
        self.get(address).map(|neighbor| neighbor.valid_link).unwrap_or(false)
    }

    pub fn remove(&mut self, address: Ipv4Addr) -> Option<Neighbor> {
        let index = self.neighbors.iter().position(|neighbor| neighbor.address == address)?;
        Some(self.neighbors.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.iter()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}
