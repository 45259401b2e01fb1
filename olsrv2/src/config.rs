//! RFC 6130 and RFC 7181 protocol parameters.

use std::time::Duration;

use crate::{constants::WILL_DEFAULT, mpr::Criterion};

/// The engine configuration.
///
/// `Default` carries the RFC values. Hysteresis is off by default: a new
/// link is usable on the first HELLO.
#[derive(Debug, Clone)]
pub struct Config {
    pub hello_interval: Duration,
    pub hello_max_jitter: Duration,
    /// The validity time put in HELLO messages.
    pub h_hold_time: Duration,
    /// How long a lost link is still advertised.
    pub l_hold_time: Duration,
    /// How long a lost neighbor is still advertised.
    pub n_hold_time: Duration,
    pub tc_interval: Duration,
    pub tc_max_jitter: Duration,
    /// The validity time put in TC messages.
    pub t_hold_time: Duration,
    /// How long a processed message is remembered.
    pub p_hold_time: Duration,
    /// How long a forwarded message is remembered.
    pub f_hold_time: Duration,
    pub tc_hop_limit: u8,
    pub willingness_flooding: u8,
    pub willingness_routing: u8,
    pub hyst_scale: f64,
    pub hyst_accept: f64,
    pub hyst_reject: f64,
    pub initial_quality: f64,
    pub initial_pending: bool,
    pub flooding_mpr_criterion: Criterion,
    pub routing_mpr_criterion: Criterion,
    /// The incoming metric of every link.
    pub default_link_metric: u32,
    /// The capacity of each information base.
    pub max_tuples: usize,
    pub sweep_interval: Duration,
    /// Seeds the message jitter, for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            hello_interval: Duration::from_secs(2),
            hello_max_jitter: Duration::from_millis(500),
            h_hold_time: Duration::from_secs(6),
            l_hold_time: Duration::from_secs(6),
            n_hold_time: Duration::from_secs(6),
            tc_interval: Duration::from_secs(5),
            tc_max_jitter: Duration::from_millis(1250),
            t_hold_time: Duration::from_secs(15),
            p_hold_time: Duration::from_secs(30),
            f_hold_time: Duration::from_secs(30),
            tc_hop_limit: 255,
            willingness_flooding: WILL_DEFAULT,
            willingness_routing: WILL_DEFAULT,
            hyst_scale: 0.5,
            hyst_accept: 0.8,
            hyst_reject: 0.3,
            initial_quality: 1.0,
            initial_pending: false,
            flooding_mpr_criterion: Criterion::Degree,
            routing_mpr_criterion: Criterion::DegreeOrMetric,
            default_link_metric: 1,
            max_tuples: 1024,
            sweep_interval: Duration::from_secs(1),
            rng_seed: None,
        }
    }
}

impl Config {
    pub fn with_hello_interval(mut self, value: Duration) -> Self {
        self.hello_interval = value;
        self
    }

    pub fn with_hello_max_jitter(mut self, value: Duration) -> Self {
        self.hello_max_jitter = value;
        self
    }

    pub fn with_h_hold_time(mut self, value: Duration) -> Self {
        self.h_hold_time = value;
        self
    }

    pub fn with_l_hold_time(mut self, value: Duration) -> Self {
        self.l_hold_time = value;
        self
    }

    pub fn with_n_hold_time(mut self, value: Duration) -> Self {
        self.n_hold_time = value;
        self
    }

    pub fn with_tc_interval(mut self, value: Duration) -> Self {
        self.tc_interval = value;
        self
    }

    pub fn with_tc_max_jitter(mut self, value: Duration) -> Self {
        self.tc_max_jitter = value;
        self
    }

    pub fn with_t_hold_time(mut self, value: Duration) -> Self {
        self.t_hold_time = value;
        self
    }

    pub fn with_p_hold_time(mut self, value: Duration) -> Self {
        self.p_hold_time = value;
        self
    }

    pub fn with_f_hold_time(mut self, value: Duration) -> Self {
        self.f_hold_time = value;
        self
    }

    pub fn with_tc_hop_limit(mut self, value: u8) -> Self {
        self.tc_hop_limit = value;
        self
    }

    pub fn with_willingness(mut self, flooding: u8, routing: u8) -> Self {
        self.willingness_flooding = flooding;
        self.willingness_routing = routing;
        self
    }

    /// Turns link hysteresis on.
    pub fn with_hysteresis(mut self, scale: f64, accept: f64, reject: f64) -> Self {
        self.hyst_scale = scale;
        self.hyst_accept = accept;
        self.hyst_reject = reject;
        self
    }

    pub fn with_initial_quality(mut self, quality: f64, pending: bool) -> Self {
        self.initial_quality = quality;
        self.initial_pending = pending;
        self
    }

    pub fn with_flooding_mpr_criterion(mut self, value: Criterion) -> Self {
        self.flooding_mpr_criterion = value;
        self
    }

    pub fn with_routing_mpr_criterion(mut self, value: Criterion) -> Self {
        self.routing_mpr_criterion = value;
        self
    }

    pub fn with_default_link_metric(mut self, value: u32) -> Self {
        self.default_link_metric = value;
        self
    }

    pub fn with_max_tuples(mut self, value: usize) -> Self {
        self.max_tuples = value;
        self
    }

    pub fn with_sweep_interval(mut self, value: Duration) -> Self {
        self.sweep_interval = value;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}
