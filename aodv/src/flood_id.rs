//! Route request duplicate suppression.

use std::net::Ipv4Addr;

use routing_core::{time_before, Error, Time};

/// One route request seen or sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloodId {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub rreq_id: u32,
    pub lifetime: Time,
}

#[derive(Debug)]
pub struct FloodIdCache {
    entries: Vec<FloodId>,
    capacity: usize,
}

impl FloodIdCache {
    pub fn new(capacity: usize) -> Self {
        FloodIdCache {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Whether the request `(source, rreq_id)` has been seen and not yet forgotten.
    pub fn contains(&self, now: Time, source: Ipv4Addr, rreq_id: u32) -> bool {
        self.entries.iter().any(|entry| {
            entry.source == source && entry.rreq_id == rreq_id && !time_before(entry.lifetime, now)
        })
    }

    /// Whether one more request fits, forgetting the expired ones first.
    pub fn has_room(&mut self, now: Time) -> bool {
        if self.entries.len() >= self.capacity {
            self.purge(now);
        }
        self.entries.len() < self.capacity
    }

    pub fn insert(&mut self, entry: FloodId) -> Result<(), Error> {
        if let Some(known) = self
            .entries
            .iter_mut()
            .find(|known| known.source == entry.source && known.rreq_id == entry.rreq_id)
        {
            *known = entry;
            return Ok(());
        }
        if self.entries.len() >= self.capacity {
            return Err(Error::ResourceExhausted(self.capacity));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Forgets the entries whose lifetime has passed.
    pub fn purge(&mut self, now: Time) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !time_before(entry.lifetime, now));
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FloodId> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_forgotten_after_their_lifetime() {
        let mut cache = FloodIdCache::new(4);
        let source = Ipv4Addr::new(10, 0, 0, 1);
        cache
            .insert(FloodId {
                source,
                destination: Ipv4Addr::new(10, 0, 0, 4),
                rreq_id: 1,
                lifetime: Time::from_secs(5),
            })
            .unwrap();
        assert!(cache.contains(Time::from_secs(5), source, 1));
        assert!(!cache.contains(Time::from_secs(5), source, 2));
        assert!(!cache.contains(Time::from_secs(6), source, 1));
        assert_eq!(cache.purge(Time::from_secs(6)), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn room_is_made_from_expired_entries_only() {
        let mut cache = FloodIdCache::new(1);
        let entry = FloodId {
            source: Ipv4Addr::new(10, 0, 0, 1),
            destination: Ipv4Addr::new(10, 0, 0, 4),
            rreq_id: 1,
            lifetime: Time::from_secs(5),
        };
        assert!(cache.has_room(Time::from_secs(1)));
        cache.insert(entry).unwrap();
        assert!(!cache.has_room(Time::from_secs(5)));
        assert_eq!(cache.len(), 1);
        assert!(cache.has_room(Time::from_secs(6)));
        assert!(cache.is_empty());
    }
}
