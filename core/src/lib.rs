//! Shared plumbing of the DHCP, AODV and OLSRv2 engines.
//!
//! Every engine is a single-threaded, run-to-completion state machine:
//! a handler never blocks and never re-enters another handler. Waiting is
//! expressed by scheduling a task on a `Scheduler` owned by the engine.

pub mod error;
pub mod network;
pub mod routing;
pub mod scheduler;
pub mod seqnum;
pub mod time;

#[macro_use] extern crate log;

pub use self::{
    error::Error,
    network::{
        Datagram,
        Destination,
        Network,
        Outbox,
    },
    routing::{
        MemoryRoutingTable,
        RouteEntry,
        RoutingTable,
    },
    scheduler::{
        Scheduler,
        Task,
        Ticket,
    },
    seqnum::{
        seq_greater,
        seq_greater_u16,
        seq_less_or_equal,
    },
    time::{
        time_after,
        time_before,
        Time,
    },
};
