//! The key/value environment handed to the configuration script.

use std::{collections::BTreeMap, fmt, net::Ipv4Addr};

use dhcp_protocol::OptionTag;

use crate::{lease::Lease, value};

/// Why the configuration script runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Preinit,
    Bound,
    Renew,
    Rebind,
    Reboot,
    Expire,
    Fail,
    Timeout,
    Release,
    Stop,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Reason::*;
        match self {
            Preinit => write!(f, "PREINIT"),
            Bound => write!(f, "BOUND"),
            Renew => write!(f, "RENEW"),
            Rebind => write!(f, "REBIND"),
            Reboot => write!(f, "REBOOT"),
            Expire => write!(f, "EXPIRE"),
            Fail => write!(f, "FAIL"),
            Timeout => write!(f, "TIMEOUT"),
            Release => write!(f, "RELEASE"),
            Stop => write!(f, "STOP"),
        }
    }
}

/// Applies lease parameters to the system.
pub trait Script {
    /// Runs the script and returns its exit status, zero meaning success.
    fn run(&mut self, environment: &Environment) -> i32;
}

impl<F> Script for F
where
    F: FnMut(&Environment) -> i32,
{
    fn run(&mut self, environment: &Environment) -> i32 {
        self(environment)
    }
}

/// Script variables, the way `dhclient-script(8)` names them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    reason: Reason,
    variables: BTreeMap<String, String>,
}

impl Environment {
    pub fn new(reason: Reason, interface: &str) -> Self {
        let mut variables = BTreeMap::new();
        variables.insert("reason".to_owned(), reason.to_string());
        variables.insert("interface".to_owned(), interface.to_owned());
        Environment { reason, variables }
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn set(&mut self, key: String, value: String) {
        self.variables.insert(key, value);
    }

    /// Describes a lease under `prefix`, usually `new_` or `old_`.
    pub fn write_params(&mut self, prefix: &str, lease: &Lease) {
        self.set(format!("{}ip_address", prefix), lease.address.to_string());
        if !lease.server_name.is_empty() {
            self.set(format!("{}server_name", prefix), lease.server_name.clone());
        }
        if !lease.boot_filename.is_empty() {
            self.set(format!("{}filename", prefix), lease.boot_filename.clone());
        }
        if let Some(ref medium) = lease.medium {
            self.set(format!("{}medium", prefix), medium.clone());
        }

        if let Some(mask) = lease.subnet_mask() {
            let network = u32::from(lease.address) & u32::from(mask);
            self.set(format!("{}network_number", prefix), Ipv4Addr::from(network).to_string());
            if lease.options.broadcast_address().is_none() {
                let broadcast = network | !u32::from(mask);
                self.set(format!("{}broadcast_address", prefix), Ipv4Addr::from(broadcast).to_string());
            }
        }

        for (code, option) in lease.options.iter() {
            let key = match OptionTag::name(code) {
                Some(name) => format!("{}{}", prefix, name),
                None => format!("{}option_{}", prefix, code),
            };
            self.set(key, value::display(code, option));
        }

        self.set(format!("{}expiry", prefix), lease.expiry.as_secs().to_string());
    }

    /// Flags every option the client asked the server for.
    pub fn write_requested(&mut self, requested: &[u8]) {
        for code in requested {
            let key = match OptionTag::name(*code) {
                Some(name) => format!("requested_{}", name),
                None => format!("requested_option_{}", code),
            };
            self.set(key, "1".to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use dhcp_protocol::Options;
    use routing_core::Time;

    fn lease() -> Lease {
        let mut options = Options::new();
        options.set_subnet_mask(Ipv4Addr::new(255, 255, 255, 0));
        options.set_routers(&[Ipv4Addr::new(10, 0, 0, 1)]);
        options.set_domain_name_servers(&[Ipv4Addr::new(10, 0, 0, 53), Ipv4Addr::new(8, 8, 8, 8)]);
        options.set_domain_name("example.org");
        options.set_address_time(3600);
        options.set(224, vec![0xca, 0xfe]);
        Lease {
            address: Ipv4Addr::new(10, 0, 0, 5),
            server_name: String::new(),
            boot_filename: "pxelinux.0".to_owned(),
            options,
            expiry: Time::from_secs(1_000_003_600),
            renewal: Time::from_secs(1_000_001_800),
            rebind: Time::from_secs(1_000_003_150),
            is_bootp: false,
            is_static: false,
            medium: None,
        }
    }

    #[test]
    fn lease_parameters_are_spelled_out() {
        let mut environment = Environment::new(Reason::Bound, "eth0");
        environment.write_params("new_", &lease());

        assert_eq!(environment.get("reason"), Some("BOUND"));
        assert_eq!(environment.get("interface"), Some("eth0"));
        assert_eq!(environment.get("new_ip_address"), Some("10.0.0.5"));
        assert_eq!(environment.get("new_subnet_mask"), Some("255.255.255.0"));
        assert_eq!(environment.get("new_network_number"), Some("10.0.0.0"));
        assert_eq!(environment.get("new_broadcast_address"), Some("10.0.0.255"));
        assert_eq!(environment.get("new_routers"), Some("10.0.0.1"));
        assert_eq!(environment.get("new_domain_name_servers"), Some("10.0.0.53 8.8.8.8"));
        assert_eq!(environment.get("new_domain_name"), Some("example.org"));
        assert_eq!(environment.get("new_dhcp_lease_time"), Some("3600"));
        assert_eq!(environment.get("new_option_224"), Some("ca:fe"));
        assert_eq!(environment.get("new_filename"), Some("pxelinux.0"));
        assert_eq!(environment.get("new_server_name"), None);
        assert_eq!(environment.get("new_expiry"), Some("1000003600"));
    }

    #[test]
    fn requested_options_are_flagged() {
        let mut environment = Environment::new(Reason::Preinit, "eth0");
        environment.write_requested(&[1, 3, 224]);
        assert_eq!(environment.get("requested_subnet_mask"), Some("1"));
        assert_eq!(environment.get("requested_routers"), Some("1"));
        assert_eq!(environment.get("requested_option_224"), Some("1"));
    }

    #[test]
    fn closures_are_scripts() {
        let mut calls = Vec::new();
        let mut script = |environment: &Environment| {
            calls.push(environment.reason());
            0
        };
        let environment = Environment::new(Reason::Fail, "eth0");
        assert_eq!(script.run(&environment), 0);
        assert_eq!(calls, vec![Reason::Fail]);
    }
}
