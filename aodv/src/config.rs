//! RFC 3561 §10 protocol constants.

use std::time::Duration;

/// The engine configuration.
///
/// `Default` carries the RFC values.
#[derive(Debug, Clone)]
pub struct Config {
    pub active_route_timeout: Duration,
    pub allowed_hello_loss: u32,
    pub hello_interval: Duration,
    /// The TTL of route requests.
    pub net_diameter: u8,
    pub node_traversal_time: Duration,
    pub rreq_retries: u8,
    /// How long an invalidated route is kept before it is removed.
    pub delete_period: Duration,
    /// The lifetime the destination puts in its route replies.
    pub my_route_timeout: Duration,
    pub cleanup_interval: Duration,
    pub max_routes: usize,
    pub max_neighbors: usize,
    pub max_flood_ids: usize,
    pub max_cached_packets: usize,
    /// Seeds the HELLO jitter, for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            active_route_timeout: Duration::from_millis(3000),
            allowed_hello_loss: 2,
            hello_interval: Duration::from_millis(1000),
            net_diameter: 35,
            node_traversal_time: Duration::from_millis(40),
            rreq_retries: 2,
            // K * max(ACTIVE_ROUTE_TIMEOUT, HELLO_INTERVAL) with K = 5
            delete_period: Duration::from_millis(15_000),
            my_route_timeout: Duration::from_millis(6000),
            cleanup_interval: Duration::from_millis(1000),
            max_routes: 1024,
            max_neighbors: 256,
            max_flood_ids: 4096,
            max_cached_packets: 64,
            rng_seed: None,
        }
    }
}

impl Config {
    pub fn net_traversal_time(&self) -> Duration {
        self.node_traversal_time * 2 * u32::from(self.net_diameter)
    }

    /// How long a flood id is remembered.
    pub fn path_discovery_time(&self) -> Duration {
        self.net_traversal_time() * 2
    }

    /// The time from the first route request until discovery is abandoned.
    pub fn route_discovery_time(&self) -> Duration {
        self.net_traversal_time() * ((1u32 << (u32::from(self.rreq_retries) + 1)) - 1)
    }

    /// A neighbor is lost after this much silence.
    pub fn neighbor_timeout(&self) -> Duration {
        self.hello_interval * (1 + self.allowed_hello_loss) + Duration::from_millis(100)
    }

    /// The lifetime a HELLO advertises.
    pub fn hello_lifetime(&self) -> Duration {
        self.hello_interval * (1 + self.allowed_hello_loss)
    }

    pub fn with_active_route_timeout(mut self, value: Duration) -> Self {
        self.active_route_timeout = value;
        self
    }

    pub fn with_allowed_hello_loss(mut self, value: u32) -> Self {
        self.allowed_hello_loss = value;
        self
    }

    pub fn with_hello_interval(mut self, value: Duration) -> Self {
        self.hello_interval = value;
        self
    }

    pub fn with_net_diameter(mut self, value: u8) -> Self {
        self.net_diameter = value;
        self
    }

    pub fn with_node_traversal_time(mut self, value: Duration) -> Self {
        self.node_traversal_time = value;
        self
    }

    pub fn with_rreq_retries(mut self, value: u8) -> Self {
        self.rreq_retries = value;
        self
    }

    pub fn with_delete_period(mut self, value: Duration) -> Self {
        self.delete_period = value;
        self
    }

    pub fn with_my_route_timeout(mut self, value: Duration) -> Self {
        self.my_route_timeout = value;
        self
    }

    pub fn with_cleanup_interval(mut self, value: Duration) -> Self {
        self.cleanup_interval = value;
        self
    }

    pub fn with_max_routes(mut self, value: usize) -> Self {
        self.max_routes = value;
        self
    }

    pub fn with_max_neighbors(mut self, value: usize) -> Self {
        self.max_neighbors = value;
        self
    }

    pub fn with_max_flood_ids(mut self, value: usize) -> Self {
        self.max_flood_ids = value;
        self
    }

    pub fn with_max_cached_packets(mut self, value: usize) -> Self {
        self.max_cached_packets = value;
        self
    }

    pub fn with_rng_seed(mut self, value: u64) -> Self {
        self.rng_seed = Some(value);
        self
    }
}
