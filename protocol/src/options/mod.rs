//! DHCP options module.
//!
//! Options are stored as raw values keyed by their code, so whatever a
//! server sends is kept and re-encoded without loss. Repeated instances
//! of the same code are concatenated (RFC 3396).
//!
//! [RFC 2132](https://tools.ietf.org/html/rfc2132)
//! [RFC 3396](https://tools.ietf.org/html/rfc3396)

mod message_type;
mod option_tag;
mod overload;

pub use self::{message_type::MessageType, option_tag::OptionTag, overload::Overload};

use std::{collections::BTreeMap, mem, net::Ipv4Addr};

/// Generates a getter and a setter for a single `IPv4` address option.
macro_rules! ipv4_option (
    ($get:ident, $set:ident, $tag:expr) => (
        pub fn $get(&self) -> Option<Ipv4Addr> {
            self.get_u32($tag as u8).map(Ipv4Addr::from)
        }

        pub fn $set(&mut self, value: Ipv4Addr) {
            self.set($tag as u8, u32::from(value).to_be_bytes().to_vec());
        }
    );
);

/// Generates a getter and a setter for an `IPv4` address list option.
macro_rules! ipv4_list_option (
    ($get:ident, $set:ident, $tag:expr) => (
        pub fn $get(&self) -> Option<Vec<Ipv4Addr>> {
            let value = self.get($tag as u8)?;
            if value.is_empty() || value.len() % mem::size_of::<u32>() != 0 {
                return None;
            }
            Some(value.chunks(mem::size_of::<u32>()).map(|chunk| Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3])).collect())
        }

        pub fn $set(&mut self, value: &[Ipv4Addr]) {
            let bytes = value.iter().flat_map(|address| address.octets().to_vec()).collect();
            self.set($tag as u8, bytes);
        }
    );
);

/// Generates a getter and a setter for a fixed size integer option.
macro_rules! integer_option (
    ($get:ident, $set:ident, $tag:expr, u32) => (
        pub fn $get(&self) -> Option<u32> {
            self.get_u32($tag as u8)
        }

        pub fn $set(&mut self, value: u32) {
            self.set($tag as u8, value.to_be_bytes().to_vec());
        }
    );
    ($get:ident, $set:ident, $tag:expr, u16) => (
        pub fn $get(&self) -> Option<u16> {
            let value = self.get($tag as u8)?;
            if value.len() != mem::size_of::<u16>() {
                return None;
            }
            Some(u16::from_be_bytes([value[0], value[1]]))
        }

        pub fn $set(&mut self, value: u16) {
            self.set($tag as u8, value.to_be_bytes().to_vec());
        }
    );
);

/// Generates a getter and a setter for a text option.
macro_rules! string_option (
    ($get:ident, $set:ident, $tag:expr) => (
        pub fn $get(&self) -> Option<String> {
            self.get($tag as u8).map(|value| String::from_utf8_lossy(value).into_owned())
        }

        pub fn $set(&mut self, value: &str) {
            self.set($tag as u8, value.as_bytes().to_vec());
        }
    );
);

/// Generates a getter and a setter for an opaque byte string option.
macro_rules! bytes_option (
    ($get:ident, $set:ident, $tag:expr) => (
        pub fn $get(&self) -> Option<&[u8]> {
            self.get($tag as u8)
        }

        pub fn $set(&mut self, value: &[u8]) {
            self.set($tag as u8, value.to_vec());
        }
    );
);

/// DHCP options of one message or lease.
///
/// `Pad` and `End` are framing and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    values: BTreeMap<u8, Vec<u8>>,
}

impl Options {
    pub fn new() -> Self {
        Options::default()
    }

    /// The raw value of an option.
    pub fn get(&self, code: u8) -> Option<&[u8]> {
        self.values.get(&code).map(|value| value.as_slice())
    }

    /// Replaces the value of an option.
    pub fn set(&mut self, code: u8, value: Vec<u8>) {
        self.values.insert(code, value);
    }

    /// Appends a split option instance to the value already collected.
    pub fn append(&mut self, code: u8, value: &[u8]) {
        self.values.entry(code).or_insert_with(Vec::new).extend_from_slice(value);
    }

    pub fn remove(&mut self, code: u8) -> Option<Vec<u8>> {
        self.values.remove(&code)
    }

    pub fn contains(&self, code: u8) -> bool {
        self.values.contains_key(&code)
    }

    /// Options in ascending code order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &[u8])> {
        self.values.iter().map(|(code, value)| (*code, value.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    ipv4_option!(subnet_mask, set_subnet_mask, OptionTag::SubnetMask);
    ipv4_list_option!(routers, set_routers, OptionTag::Routers);
    ipv4_list_option!(domain_name_servers, set_domain_name_servers, OptionTag::DomainNameServers);
    string_option!(hostname, set_hostname, OptionTag::Hostname);
    string_option!(domain_name, set_domain_name, OptionTag::DomainName);
    ipv4_option!(broadcast_address, set_broadcast_address, OptionTag::BroadcastAddress);
    ipv4_option!(address_request, set_address_request, OptionTag::AddressRequest);
    integer_option!(address_time, set_address_time, OptionTag::AddressTime, u32);
    ipv4_option!(dhcp_server_id, set_dhcp_server_id, OptionTag::DhcpServerId);
    bytes_option!(parameter_list, set_parameter_list, OptionTag::ParameterList);
    string_option!(dhcp_message, set_dhcp_message, OptionTag::DhcpMessage);
    integer_option!(dhcp_max_message_size, set_dhcp_max_message_size, OptionTag::DhcpMaxMessageSize, u16);
    integer_option!(renewal_time, set_renewal_time, OptionTag::RenewalTime, u32);
    integer_option!(rebinding_time, set_rebinding_time, OptionTag::RebindingTime, u32);
    bytes_option!(client_id, set_client_id, OptionTag::ClientId);

    pub fn dhcp_message_type(&self) -> Option<MessageType> {
        match self.get(OptionTag::DhcpMessageType as u8) {
            Some(value) if value.len() == mem::size_of::<u8>() => MessageType::from_code(value[0]),
            _ => None,
        }
    }

    pub fn set_dhcp_message_type(&mut self, value: MessageType) {
        self.set(OptionTag::DhcpMessageType as u8, vec![value.code()]);
    }

    pub fn overload(&self) -> Option<Overload> {
        match self.get(OptionTag::Overload as u8) {
            Some(value) if value.len() == mem::size_of::<u8>() => Overload::from_bits(value[0]),
            _ => None,
        }
    }

    fn get_u32(&self, code: u8) -> Option<u32> {
        let value = self.get(code)?;
        if value.len() != mem::size_of::<u32>() {
            return None;
        }
        Some(u32::from_be_bytes([value[0], value[1], value[2], value[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_instances_are_concatenated() {
        let mut options = Options::new();
        options.append(OptionTag::DomainNameServers as u8, &[8, 8, 8, 8]);
        options.append(OptionTag::DomainNameServers as u8, &[1, 1, 1, 1]);
        assert_eq!(
            options.domain_name_servers(),
            Some(vec![Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(1, 1, 1, 1)])
        );
    }

    #[test]
    fn malformed_typed_values_read_as_absent() {
        let mut options = Options::new();
        options.set(OptionTag::AddressTime as u8, vec![0, 1]);
        options.set(OptionTag::Routers as u8, vec![10, 0, 0]);
        assert_eq!(options.address_time(), None);
        assert_eq!(options.routers(), None);
        assert!(options.contains(OptionTag::AddressTime as u8));
    }

    #[test]
    fn typed_setters_produce_wire_values() {
        let mut options = Options::new();
        options.set_address_time(3600);
        options.set_dhcp_message_type(MessageType::DhcpRequest);
        assert_eq!(options.get(OptionTag::AddressTime as u8), Some(&[0, 0, 0x0e, 0x10][..]));
        assert_eq!(options.dhcp_message_type(), Some(MessageType::DhcpRequest));
    }
}
