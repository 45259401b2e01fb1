//! The OLSRv2 proactive routing control plane (RFC 7181 over the RFC 6130
//! neighborhood discovery, with RFC 5444 packets).
//!
//! An `Engine` runs one node on one interface. The host feeds it the
//! packets received on the OLSR port and the current time, and collects
//! what it broadcasts through a `Network` and the routes it computes
//! through a `RoutingTable`.

mod codec;
mod config;
mod constants;
mod engine;
mod error;
mod hello;
mod link;
mod message;
mod mpr;
mod neighbor;
mod routing;
mod task;
mod tc;
mod topology;

#[macro_use] extern crate log;

pub use self::{
    codec::{
        decode,
        decode_metric,
        decode_time,
        encode,
        encode_metric,
        encode_time,
    },
    config::Config,
    constants::*,
    engine::Engine,
    error::Error,
    hello::{
        Hello,
        TwoHopReport,
    },
    link::{
        LinkSet,
        LinkStatus,
        LinkTuple,
        TwoHopTuple,
    },
    message::{
        AddressEntry,
        Message,
        Tlv,
    },
    mpr::{
        select as select_flooding_mprs,
        select_routing as select_routing_mprs,
        Candidate,
        Coverage,
        Criterion,
    },
    neighbor::{
        LostNeighborSet,
        LostNeighborTuple,
        NeighborSet,
        NeighborTuple,
    },
    routing::{
        netmask,
        RouteTuple,
        RoutingSet,
    },
    task::Task,
    tc::{
        Advertisement,
        Kind,
        Tc,
    },
    topology::{
        AdvertisingRouter,
        AttachedNetwork,
        DuplicateSet,
        Freshness,
        LocalNetwork,
        RoutableAddress,
        RouterTopology,
        SeenMessage,
        TopologySet,
    },
};
