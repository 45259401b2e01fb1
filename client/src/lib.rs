//! The DHCP client state machine.
//!
//! The client never touches a socket or a clock: the host feeds it received
//! datagrams and the current time, collects the datagrams it sends through a
//! `Network`, and fires its timers when `next_deadline` passes. The `Time`
//! values the client works with are wall-clock times since the Unix epoch.

#[macro_use]
mod macros;

mod backoff;
mod client;
mod config;
mod env;
mod error;
mod lease;
mod lease_file;
mod message_builder;
mod value;

#[macro_use] extern crate log;

pub use self::{
    client::{
        Client,
        State,
        Task,
    },
    config::Config,
    env::{
        Environment,
        Reason,
        Script,
    },
    error::Error,
    lease::{
        Lease,
        LeaseTimers,
    },
    lease_file::{
        LeaseDatabase,
        LeaseFile,
        MemoryLeaseDatabase,
    },
    message_builder::MessageBuilder,
};
