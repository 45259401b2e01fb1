//! DHCP option tags module.

/// DHCP options codes the client reads or writes by name.
///
/// Every other code is still carried through `Options` by its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionTag {
    Pad = 0,
    SubnetMask = 1,
    TimeOffset = 2,
    Routers = 3,
    DomainNameServers = 6,
    Hostname = 12,
    DomainName = 15,
    InterfaceMtu = 26,
    BroadcastAddress = 28,
    StaticRoutes = 33,
    NtpServers = 42,
    AddressRequest = 50,
    AddressTime = 51,
    Overload = 52,
    DhcpMessageType = 53,
    DhcpServerId = 54,
    ParameterList = 55,
    DhcpMessage = 56,
    DhcpMaxMessageSize = 57,
    RenewalTime = 58,
    RebindingTime = 59,
    ClassId = 60,
    ClientId = 61,
    ClasslessStaticRoutes = 121,
    End = 255,
}

impl OptionTag {
    /// The conventional script name of a known option.
    pub fn name(code: u8) -> Option<&'static str> {
        let name = match code {
            1 => "subnet_mask",
            2 => "time_offset",
            3 => "routers",
            6 => "domain_name_servers",
            12 => "host_name",
            15 => "domain_name",
            26 => "interface_mtu",
            28 => "broadcast_address",
            33 => "static_routes",
            42 => "ntp_servers",
            50 => "requested_address",
            51 => "dhcp_lease_time",
            52 => "dhcp_option_overload",
            53 => "dhcp_message_type",
            54 => "dhcp_server_identifier",
            55 => "dhcp_parameter_request_list",
            56 => "dhcp_message",
            57 => "dhcp_max_message_size",
            58 => "dhcp_renewal_time",
            59 => "dhcp_rebinding_time",
            60 => "vendor_class_identifier",
            61 => "dhcp_client_identifier",
            121 => "classless_static_routes",
            _ => return None,
        };
        Some(name)
    }

    /// The code of a known option by its script name.
    pub fn code(name: &str) -> Option<u8> {
        (1..=254u8).find(|code| Self::name(*code) == Some(name))
    }
}
