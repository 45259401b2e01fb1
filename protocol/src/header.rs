//! The enumerated fields of the fixed header.
//!
//! Values without a name are carried as they are, so a decoded header
//! re-encodes to the same bytes.

use std::fmt;

/// The `op` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationCode {
    BootRequest,
    BootReply,
    Other(u8),
}

impl From<u8> for OperationCode {
    fn from(value: u8) -> Self {
        match value {
            1 => OperationCode::BootRequest,
            2 => OperationCode::BootReply,
            other => OperationCode::Other(other),
        }
    }
}

impl From<OperationCode> for u8 {
    fn from(value: OperationCode) -> Self {
        match value {
            OperationCode::BootRequest => 1,
            OperationCode::BootReply => 2,
            OperationCode::Other(other) => other,
        }
    }
}

impl fmt::Display for OperationCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OperationCode::BootRequest => write!(f, "BOOTREQUEST"),
            OperationCode::BootReply => write!(f, "BOOTREPLY"),
            OperationCode::Other(other) => write!(f, "OP({})", other),
        }
    }
}

/// The `htype` field (ARP hardware types). Only Ethernet gets a name, the
/// client hardware address being a MAC-48 anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareType {
    Ethernet,
    Other(u8),
}

impl From<u8> for HardwareType {
    fn from(value: u8) -> Self {
        match value {
            1 => HardwareType::Ethernet,
            other => HardwareType::Other(other),
        }
    }
}

impl From<HardwareType> for u8 {
    fn from(value: HardwareType) -> Self {
        match value {
            HardwareType::Ethernet => 1,
            HardwareType::Other(other) => other,
        }
    }
}

impl fmt::Display for HardwareType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HardwareType::Ethernet => write!(f, "Ethernet"),
            HardwareType::Other(other) => write!(f, "HTYPE({})", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnamed_values_survive() {
        for value in 0..=255u8 {
            assert_eq!(u8::from(OperationCode::from(value)), value);
            assert_eq!(u8::from(HardwareType::from(value)), value);
        }
        assert_eq!(OperationCode::from(2), OperationCode::BootReply);
        assert_eq!(HardwareType::from(6).to_string(), "HTYPE(6)");
    }
}
