//! A builder for common DHCP client messages.

use std::net::Ipv4Addr;

use eui48::{MacAddress, EUI48LEN};

use dhcp_protocol::*;

/// Builds common client messages with some parameters.
pub struct MessageBuilder {
    /// Mandatory `MAC-48` address.
    client_hardware_address: MacAddress,
    /// Is set explicitly by user or defaulted to `client_hardware_address` bytes.
    client_id: Vec<u8>,
    /// The optional machine hostname.
    hostname: Option<String>,
    /// The options asked for in every DISCOVER and REQUEST.
    parameter_list: Vec<u8>,
    /// The optional maximum DHCP message size the client will accept.
    max_message_size: Option<u16>,
}

impl MessageBuilder {
    /// Creates a builder with message parameters which will not be changed.
    pub fn new(
        client_hardware_address: MacAddress,
        client_id: Option<Vec<u8>>,
        hostname: Option<String>,
        parameter_list: Vec<u8>,
        max_message_size: Option<u16>,
    ) -> Self {
        let client_id = client_id.unwrap_or_else(|| {
            let mut id = vec![u8::from(HardwareType::Ethernet)];
            id.extend_from_slice(client_hardware_address.as_bytes());
            id
        });

        MessageBuilder {
            client_hardware_address,
            client_id,
            hostname,
            parameter_list,
            max_message_size,
        }
    }

    /// Creates a general `DHCPDISCOVER` message.
    pub fn discover(
        &self,
        transaction_id: u32,
        is_broadcast: bool,
        address_request: Option<Ipv4Addr>,
    ) -> Message {
        let mut options = self.request_options(MessageType::DhcpDiscover);
        if let Some(address) = address_request {
            options.set_address_request(address);
        }
        self.message(transaction_id, is_broadcast, Ipv4Addr::UNSPECIFIED, options)
    }

    /// Creates a `DHCPREQUEST` in `SELECTING` state.
    pub fn request_selecting(
        &self,
        transaction_id: u32,
        is_broadcast: bool,
        address_request: Ipv4Addr,
        dhcp_server_id: Ipv4Addr,
    ) -> Message {
        let mut options = self.request_options(MessageType::DhcpRequest);
        options.set_dhcp_server_id(dhcp_server_id);
        options.set_address_request(address_request);
        self.message(transaction_id, is_broadcast, Ipv4Addr::UNSPECIFIED, options)
    }

    /// Creates a `DHCPREQUEST` in `INIT-REBOOT` state.
    pub fn request_init_reboot(
        &self,
        transaction_id: u32,
        is_broadcast: bool,
        address_request: Ipv4Addr,
    ) -> Message {
        let mut options = self.request_options(MessageType::DhcpRequest);
        options.set_address_request(address_request);
        self.message(transaction_id, is_broadcast, Ipv4Addr::UNSPECIFIED, options)
    }

    /// Creates a `DHCPREQUEST` in `BOUND`, `RENEWING` or `REBINDING` state.
    pub fn request_renew(
        &self,
        transaction_id: u32,
        is_broadcast: bool,
        client_ip_address: Ipv4Addr,
    ) -> Message {
        let options = self.request_options(MessageType::DhcpRequest);
        self.message(transaction_id, is_broadcast, client_ip_address, options)
    }

    /// Creates a general `DHCPRELEASE` message.
    pub fn release(
        &self,
        transaction_id: u32,
        client_ip_address: Ipv4Addr,
        dhcp_server_id: Ipv4Addr,
        dhcp_message: Option<&str>,
    ) -> Message {
        let mut options = self.default_options(MessageType::DhcpRelease);
        options.set_dhcp_server_id(dhcp_server_id);
        if let Some(text) = dhcp_message {
            options.set_dhcp_message(text);
        }
        self.message(transaction_id, false, client_ip_address, options)
    }

    /// Creates a general `DHCPDECLINE` message.
    pub fn decline(
        &self,
        transaction_id: u32,
        requested_address: Ipv4Addr,
        dhcp_server_id: Ipv4Addr,
        dhcp_message: Option<&str>,
    ) -> Message {
        let mut options = self.default_options(MessageType::DhcpDecline);
        options.set_dhcp_server_id(dhcp_server_id);
        options.set_address_request(requested_address);
        if let Some(text) = dhcp_message {
            options.set_dhcp_message(text);
        }
        self.message(transaction_id, false, Ipv4Addr::UNSPECIFIED, options)
    }

    fn message(
        &self,
        transaction_id: u32,
        is_broadcast: bool,
        client_ip_address: Ipv4Addr,
        options: Options,
    ) -> Message {
        Message {
            operation_code: OperationCode::BootRequest,
            hardware_type: HardwareType::Ethernet,
            hardware_address_length: EUI48LEN as u8,
            hardware_options: Default::default(),

            transaction_id,
            seconds: Default::default(),
            is_broadcast,

            client_ip_address,
            your_ip_address: Ipv4Addr::UNSPECIFIED,
            server_ip_address: Ipv4Addr::UNSPECIFIED,
            gateway_ip_address: Ipv4Addr::UNSPECIFIED,

            client_hardware_address: self.client_hardware_address.to_owned(),
            server_name: Default::default(),
            boot_filename: Default::default(),

            options,
        }
    }

    fn request_options(&self, message_type: MessageType) -> Options {
        let mut options = self.default_options(message_type);
        if let Some(size) = self.max_message_size {
            options.set_dhcp_max_message_size(size);
        }
        if !self.parameter_list.is_empty() {
            options.set_parameter_list(&self.parameter_list);
        }
        options
    }

    fn default_options(&self, message_type: MessageType) -> Options {
        let mut options = Options::new();
        options.set_dhcp_message_type(message_type);
        if let Some(ref hostname) = self.hostname {
            options.set_hostname(hostname);
        }
        options.set_client_id(&self.client_id);
        options
    }
}
