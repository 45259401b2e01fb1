//! Option 53, the DHCP message type.

use std::fmt;

/// The message types of RFC 2131. A message without one is a BOOTP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    DhcpDiscover = 1,
    DhcpOffer,
    DhcpRequest,
    DhcpDecline,
    DhcpAck,
    DhcpNak,
    DhcpRelease,
    DhcpInform,
}

impl MessageType {
    pub fn from_code(code: u8) -> Option<Self> {
        use self::MessageType::*;
        Some(match code {
            1 => DhcpDiscover,
            2 => DhcpOffer,
            3 => DhcpRequest,
            4 => DhcpDecline,
            5 => DhcpAck,
            6 => DhcpNak,
            7 => DhcpRelease,
            8 => DhcpInform,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::MessageType::*;
        let name = match self {
            DhcpDiscover => "DHCPDISCOVER",
            DhcpOffer => "DHCPOFFER",
            DhcpRequest => "DHCPREQUEST",
            DhcpDecline => "DHCPDECLINE",
            DhcpAck => "DHCPACK",
            DhcpNak => "DHCPNAK",
            DhcpRelease => "DHCPRELEASE",
            DhcpInform => "DHCPINFORM",
        };
        f.write_str(name)
    }
}
