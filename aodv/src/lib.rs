//! The AODV reactive routing control plane (RFC 3561).
//!
//! Like every engine of the workspace the node never touches a socket or a
//! clock: the host feeds it control messages, data packets in need of a
//! route and the current time, and collects what it sends through a
//! `Network` and what it installs through a `RoutingTable`.

mod config;
mod engine;
mod error;
mod flood_id;
mod neighbor;
mod packet;
mod packet_cache;
mod route;
mod task;

#[macro_use] extern crate log;

pub use self::{
    config::Config,
    engine::{
        Deliverable,
        Engine,
        Output,
    },
    error::Error,
    flood_id::{
        FloodId,
        FloodIdCache,
    },
    neighbor::{
        Neighbor,
        NeighborTable,
    },
    packet::{
        Packet,
        Rerr,
        Rrep,
        Rreq,
        Unreachable,
        MAX_RERR_DESTINATIONS,
        SIZE_RERR_DESTINATION,
        SIZE_RERR_HEADER,
        SIZE_RREP,
        SIZE_RREQ,
        TYPE_RERR,
        TYPE_RREP,
        TYPE_RREQ,
    },
    packet_cache::{
        CachedPacket,
        PacketCache,
    },
    route::{
        Route,
        RouteTable,
        HOST_NETMASK,
    },
    task::{
        Task,
        TaskType,
    },
};
