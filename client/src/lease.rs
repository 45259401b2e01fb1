//! The client-side lease and its timers.

use std::{net::Ipv4Addr, time::Duration};

use rand::Rng;

use dhcp_protocol::{Message, Options};
use routing_core::{time_before, Time};

/// Leases shorter than this are stretched to it.
pub const MINIMAL_LEASE_TIME: u64 = 60;

/// BOOTP leases have no timers of their own.
const BOOTP_EXPIRY: u64 = 12000;
const BOOTP_RENEWAL: u64 = 8000;
const BOOTP_REBIND: u64 = 10000;

/// An address lease offered to or held by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub address: Ipv4Addr,
    pub server_name: String,
    pub boot_filename: String,
    pub options: Options,
    pub expiry: Time,
    pub renewal: Time,
    pub rebind: Time,
    /// Acquired through a BOOTREPLY.
    pub is_bootp: bool,
    /// Configured by the administrator, never recorded.
    pub is_static: bool,
    pub medium: Option<String>,
}

impl Lease {
    /// A lease with the address and options of a reply and no timers yet.
    pub fn from_message(message: &Message) -> Self {
        Lease {
            address: message.your_ip_address,
            server_name: message.server_name(),
            boot_filename: message.boot_filename(),
            options: message.options.clone(),
            expiry: Time::ZERO,
            renewal: Time::ZERO,
            rebind: Time::ZERO,
            is_bootp: message.is_bootp(),
            is_static: false,
            medium: None,
        }
    }

    pub fn server_id(&self) -> Option<Ipv4Addr> {
        self.options.dhcp_server_id()
    }

    pub fn subnet_mask(&self) -> Option<Ipv4Addr> {
        self.options.subnet_mask()
    }

    /// Whether the lease can still be used at `now`.
    pub fn is_valid(&self, now: Time) -> bool {
        time_before(now, self.expiry)
    }

    /// Sets the absolute timers from ones relative to `now`.
    pub fn apply(&mut self, now: Time, timers: LeaseTimers) {
        let now = Time::from_secs(now.as_secs());
        self.expiry = now + Duration::from_secs(timers.expiry);
        self.renewal = now + Duration::from_secs(timers.renewal);
        self.rebind = now + Duration::from_secs(timers.rebind);
    }
}

/// Lease timers in seconds after the reply was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseTimers {
    pub expiry: u64,
    pub renewal: u64,
    pub rebind: u64,
}

impl LeaseTimers {
    /// The timers of a DHCPACK.
    ///
    /// Missing renewal and rebinding times default to `expiry / 2 + 1` and
    /// `expiry * 7 / 8`, the renewal time is then jittered into
    /// `[0.75, 1.25]` of itself. The result always satisfies
    /// `0 < renewal <= rebind <= expiry`.
    pub fn compute<R: Rng>(options: &Options, rng: &mut R) -> Self {
        let expiry = u64::from(options.address_time().unwrap_or(0)).max(MINIMAL_LEASE_TIME);

        let mut renewal = match options.renewal_time() {
            Some(time) if time > 0 => u64::from(time),
            _ => expiry / 2 + 1,
        };
        renewal = (renewal * 3 + 3) / 4 + (rng.gen_range(0..renewal) + 1) / 2;

        let rebind = match options.rebinding_time() {
            Some(time) if time > 0 => u64::from(time),
            _ => expiry * 7 / 8,
        }
        .min(expiry);

        if renewal > rebind {
            renewal = rebind * 3 / 4;
        }

        LeaseTimers {
            expiry,
            renewal: renewal.max(1),
            rebind,
        }
    }

    /// The fixed timers of a BOOTP lease.
    pub fn bootp() -> Self {
        LeaseTimers {
            expiry: BOOTP_EXPIRY,
            renewal: BOOTP_RENEWAL,
            rebind: BOOTP_REBIND,
        }
    }
}
