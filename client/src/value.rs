//! Textual rendering of option values.
//!
//! Well-formed values of known options are rendered the way configuration
//! scripts expect them, everything else as colon separated hex.

use std::net::Ipv4Addr;

use dhcp_protocol::OptionTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Addresses,
    Text,
    Unsigned32,
    Unsigned16,
    Unsigned8,
    Opaque,
}

fn kind(code: u8) -> Kind {
    use self::OptionTag::*;

    const ADDRESSES: &[OptionTag] = &[
        SubnetMask,
        Routers,
        DomainNameServers,
        BroadcastAddress,
        NtpServers,
        AddressRequest,
        DhcpServerId,
    ];
    const TEXT: &[OptionTag] = &[Hostname, DomainName, DhcpMessage];
    const UNSIGNED32: &[OptionTag] = &[TimeOffset, AddressTime, RenewalTime, RebindingTime];
    const UNSIGNED16: &[OptionTag] = &[InterfaceMtu, DhcpMaxMessageSize];
    const UNSIGNED8: &[OptionTag] = &[Overload, DhcpMessageType];

    let known = |tags: &[OptionTag]| tags.iter().any(|tag| *tag as u8 == code);
    if known(ADDRESSES) {
        Kind::Addresses
    } else if known(TEXT) {
        Kind::Text
    } else if known(UNSIGNED32) {
        Kind::Unsigned32
    } else if known(UNSIGNED16) {
        Kind::Unsigned16
    } else if known(UNSIGNED8) {
        Kind::Unsigned8
    } else {
        Kind::Opaque
    }
}

/// The typed rendering of a value, `None` if the option has no type or
/// the value does not fit it.
pub fn format(code: u8, value: &[u8]) -> Option<String> {
    match kind(code) {
        Kind::Addresses if !value.is_empty() && value.len() % 4 == 0 => Some(
            value
                .chunks(4)
                .map(|chunk| Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]).to_string())
                .collect::<Vec<String>>()
                .join(" "),
        ),
        Kind::Text if value.iter().all(|byte| (0x20..0x7f).contains(byte)) => {
            Some(String::from_utf8_lossy(value).into_owned())
        }
        Kind::Unsigned32 if value.len() == 4 => {
            Some(u32::from_be_bytes([value[0], value[1], value[2], value[3]]).to_string())
        }
        Kind::Unsigned16 if value.len() == 2 => {
            Some(u16::from_be_bytes([value[0], value[1]]).to_string())
        }
        Kind::Unsigned8 if value.len() == 1 => Some(value[0].to_string()),
        _ => None,
    }
}

/// Parses the typed rendering produced by `format`.
pub fn parse(code: u8, text: &str) -> Option<Vec<u8>> {
    match kind(code) {
        Kind::Addresses => {
            let mut value = Vec::new();
            for address in text.split_whitespace() {
                value.extend_from_slice(&address.parse::<Ipv4Addr>().ok()?.octets());
            }
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        }
        Kind::Text => Some(text.as_bytes().to_vec()),
        Kind::Unsigned32 => text.parse::<u32>().ok().map(|number| number.to_be_bytes().to_vec()),
        Kind::Unsigned16 => text.parse::<u16>().ok().map(|number| number.to_be_bytes().to_vec()),
        Kind::Unsigned8 => text.parse::<u8>().ok().map(|number| vec![number]),
        Kind::Opaque => None,
    }
}

/// Renders a value typed if possible, as hex otherwise.
pub fn display(code: u8, value: &[u8]) -> String {
    format(code, value).unwrap_or_else(|| to_hex(value))
}

pub fn to_hex(value: &[u8]) -> String {
    value
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect::<Vec<String>>()
        .join(":")
}

pub fn from_hex(text: &str) -> Option<Vec<u8>> {
    if text.is_empty() {
        return Some(Vec::new());
    }
    text.split(':')
        .map(|byte| {
            if byte.len() == 2 {
                u8::from_str_radix(byte, 16).ok()
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_values_render_readably() {
        assert_eq!(format(3, &[10, 0, 0, 1, 10, 0, 0, 2]), Some("10.0.0.1 10.0.0.2".to_owned()));
        assert_eq!(format(51, &[0, 0, 0x0e, 0x10]), Some("3600".to_owned()));
        assert_eq!(format(15, b"example.org"), Some("example.org".to_owned()));
        assert_eq!(format(51, &[0, 1]), None);
        assert_eq!(format(15, &[0xff]), None);
        assert_eq!(format(224, &[1]), None);
    }

    #[test]
    fn parse_inverts_format() {
        assert_eq!(parse(3, "10.0.0.1 10.0.0.2"), Some(vec![10, 0, 0, 1, 10, 0, 0, 2]));
        assert_eq!(parse(51, "3600"), Some(vec![0, 0, 0x0e, 0x10]));
        assert_eq!(parse(1, "not an address"), None);
    }

    #[test]
    fn hex_is_lossless() {
        assert_eq!(to_hex(&[0x01, 0xab, 0x00]), "01:ab:00");
        assert_eq!(from_hex("01:ab:00"), Some(vec![0x01, 0xab, 0x00]));
        assert_eq!(from_hex(""), Some(Vec::new()));
        assert_eq!(from_hex("1:ab"), None);
        assert_eq!(display(224, &[0xde, 0xad]), "de:ad");
    }
}
