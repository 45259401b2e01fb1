//! The client configuration.

use std::time::Duration;

use dhcp_protocol::OptionTag;

/// Client timing and identity parameters.
///
/// The defaults are the ones `dhclient.conf(5)` documents.
#[derive(Debug, Clone)]
pub struct Config {
    /// How long to look for a lease before falling back to recorded ones.
    pub timeout: Duration,
    /// The first retransmission interval.
    pub initial_interval: Duration,
    /// Retransmission intervals never grow past this.
    pub backoff_cutoff: Duration,
    /// How long to collect offers before picking one.
    pub select_interval: Duration,
    /// How long INIT-REBOOT and REQUESTING wait for an answer.
    pub reboot_timeout: Duration,
    /// The sleep after every known lease failed.
    pub retry_interval: Duration,
    /// Give up with an error instead of sleeping when no lease is obtained.
    pub one_try: bool,
    pub hostname: Option<String>,
    /// Defaults to the hardware type followed by the hardware address.
    pub client_id: Option<Vec<u8>>,
    pub requested_options: Vec<u8>,
    /// Bound leases are recorded no more often than this.
    pub min_lease_write: Duration,
    /// The database is compacted after this many appended leases.
    pub lease_rewrite_threshold: usize,
    /// Seeds the transaction ids and timer jitter, random when unset.
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timeout: Duration::from_secs(60),
            initial_interval: Duration::from_secs(3),
            backoff_cutoff: Duration::from_secs(15),
            select_interval: Duration::from_secs(0),
            reboot_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_secs(300),
            one_try: false,
            hostname: hostname::get().ok().and_then(|name| name.into_string().ok()),
            client_id: None,
            requested_options: vec![
                OptionTag::SubnetMask as u8,
                OptionTag::BroadcastAddress as u8,
                OptionTag::TimeOffset as u8,
                /*
                RFC 3442
                The Classless Static Routes option code MUST appear in the parameter
                request list prior to both the Router option code and the Static
                Routes option code, if present.
                */
                OptionTag::ClasslessStaticRoutes as u8,
                OptionTag::Routers as u8,
                OptionTag::DomainName as u8,
                OptionTag::DomainNameServers as u8,
                OptionTag::Hostname as u8,
            ],
            min_lease_write: Duration::from_secs(15),
            lease_rewrite_threshold: 20,
            rng_seed: None,
        }
    }
}

impl Config {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_backoff_cutoff(mut self, cutoff: Duration) -> Self {
        self.backoff_cutoff = cutoff;
        self
    }

    pub fn with_select_interval(mut self, interval: Duration) -> Self {
        self.select_interval = interval;
        self
    }

    pub fn with_reboot_timeout(mut self, timeout: Duration) -> Self {
        self.reboot_timeout = timeout;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_one_try(mut self, one_try: bool) -> Self {
        self.one_try = one_try;
        self
    }

    pub fn with_hostname(mut self, hostname: Option<String>) -> Self {
        self.hostname = hostname;
        self
    }

    pub fn with_client_id(mut self, client_id: Vec<u8>) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn with_requested_options(mut self, options: Vec<u8>) -> Self {
        self.requested_options = options;
        self
    }

    pub fn with_min_lease_write(mut self, interval: Duration) -> Self {
        self.min_lease_write = interval;
        self
    }

    pub fn with_lease_rewrite_threshold(mut self, threshold: usize) -> Self {
        self.lease_rewrite_threshold = threshold;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}
