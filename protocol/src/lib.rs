//! The BOOTP/DHCP message codec.
//!
//! The fixed header is kept byte-for-byte, the options are kept as a
//! lossless code to value map with typed accessors on top.

pub mod constants;
pub mod header;
pub mod options;
pub mod validator;

mod deserializer;
mod serializer;

extern crate bytes;
extern crate eui48;

use std::{fmt, net::Ipv4Addr};

use eui48::MacAddress;

pub use self::{
    constants::*,
    header::{HardwareType, OperationCode},
    options::{MessageType, OptionTag, Options, Overload},
    validator::Error,
};

/// DHCP message.
#[derive(Clone)]
pub struct Message {
    pub operation_code: OperationCode,
    pub hardware_type: HardwareType,
    pub hardware_address_length: u8,
    pub hardware_options: u8,
    pub transaction_id: u32,
    pub seconds: u16,
    pub is_broadcast: bool,
    pub client_ip_address: Ipv4Addr,
    pub your_ip_address: Ipv4Addr,
    pub server_ip_address: Ipv4Addr,
    pub gateway_ip_address: Ipv4Addr,
    pub client_hardware_address: MacAddress,
    pub server_name: Vec<u8>,
    pub boot_filename: Vec<u8>,
    pub options: Options,
}

impl Message {
    /// The `server_name` field without its NUL padding.
    pub fn server_name(&self) -> String {
        Self::trim_nul(&self.server_name)
    }

    /// The `boot_filename` field without its NUL padding.
    pub fn boot_filename(&self) -> String {
        Self::trim_nul(&self.boot_filename)
    }

    fn trim_nul(field: &[u8]) -> String {
        let end = field.iter().position(|byte| *byte == 0).unwrap_or(field.len());
        String::from_utf8_lossy(&field[..end]).into_owned()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}HEADER{}", "_".repeat(30), "_".repeat(39))?;
        writeln!(f, "{:32} | {}", "Operation code", self.operation_code)?;
        writeln!(f, "{:32} | {}", "Hardware type", self.hardware_type)?;
        writeln!(f, "{:32} | {}", "Hardware address length", self.hardware_address_length)?;
        writeln!(f, "{:32} | {}", "Hardware options", self.hardware_options)?;
        writeln!(f, "{:32} | {:#010x}", "Transaction ID", self.transaction_id)?;
        writeln!(f, "{:32} | {}", "Seconds", self.seconds)?;
        writeln!(f, "{:32} | {}", "Broadcast flag", self.is_broadcast)?;
        writeln!(f, "{:32} | {}", "Client IP address", self.client_ip_address)?;
        writeln!(f, "{:32} | {}", "Your IP address", self.your_ip_address)?;
        writeln!(f, "{:32} | {}", "Server IP address", self.server_ip_address)?;
        writeln!(f, "{:32} | {}", "Gateway IP address", self.gateway_ip_address)?;
        writeln!(f, "{:32} | {}", "Client hardware address", self.client_hardware_address)?;
        writeln!(f, "{:32} | {}", "Server name", self.server_name())?;
        writeln!(f, "{:32} | {}", "Boot filename", self.boot_filename())?;

        writeln!(f, "{}OPTIONS{}", "_".repeat(30), "_".repeat(38))?;
        for (code, value) in self.options.iter() {
            let name = OptionTag::name(code).unwrap_or("unknown");
            writeln!(f, "[{:03}] {:27}| {:02x?}", code, name, value)?;
        }
        writeln!(f, "{}", "_".repeat(75))?;
        Ok(())
    }
}
