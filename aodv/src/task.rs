//! The delayed work of the engine.

use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    ResendRreq,
    Hello,
    NeighborExpiry,
    Cleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Repeats a route request unless a reply arrived.
    ResendRreq { destination: Ipv4Addr, retries: u8 },
    Hello,
    /// Fires when a neighbor has been silent for too long.
    NeighborExpiry(Ipv4Addr),
    Cleanup,
}

impl routing_core::Task for Task {
    type Key = (TaskType, Ipv4Addr);

    fn key(&self) -> Self::Key {
        match self {
            Task::ResendRreq { destination, .. } => (TaskType::ResendRreq, *destination),
            Task::Hello => (TaskType::Hello, Ipv4Addr::UNSPECIFIED),
            Task::NeighborExpiry(address) => (TaskType::NeighborExpiry, *address),
            Task::Cleanup => (TaskType::Cleanup, Ipv4Addr::UNSPECIFIED),
        }
    }
}
