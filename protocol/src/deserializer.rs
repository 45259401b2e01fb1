//! DHCP message deserialization module.

use std::{io, net::Ipv4Addr};

use bytes::Buf;
use eui48::{MacAddress, EUI48LEN};

use super::{
    constants::*,
    options::{OptionTag, Options, Overload},
    Message,
};

/// Checks if there is enough data left in the buffer to get a value.
macro_rules! check_remaining(
    ($cursor:expr, $length:expr) => (
        if $cursor.remaining() < $length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Buffer is too small or packet has invalid length octets",
            ));
        }
    );
);

/// Splits a fixed size field off the front of the buffer.
macro_rules! take(
    ($cursor:expr, $length:expr) => ({
        let (field, rest) = $cursor.split_at($length);
        $cursor = rest;
        field
    });
);

impl Message {
    /// DHCP message deserialization.
    ///
    /// Option instances sharing a code are concatenated, and the `file` and
    /// `sname` fields are scanned for options when option 52 says so.
    ///
    /// # Errors
    /// `io::Error` if the packet is abrupted, too small or contains invalid length octets.
    pub fn from_bytes(src: &[u8]) -> io::Result<Self> {
        let mut cursor = src;
        check_remaining!(cursor, OFFSET_OPTIONS);

        let operation_code = cursor.get_u8().into();
        let hardware_type = cursor.get_u8().into();
        let hardware_address_length = cursor.get_u8();
        let hardware_options = cursor.get_u8();
        let transaction_id = cursor.get_u32();
        let seconds = cursor.get_u16();
        // https://tools.ietf.org/html/rfc2131#section-2
        // Leftmost bit (0 bit) is most significant
        let is_broadcast = cursor.get_u16() & FLAG_BROADCAST != 0;
        let client_ip_address = Ipv4Addr::from(cursor.get_u32());
        let your_ip_address = Ipv4Addr::from(cursor.get_u32());
        let server_ip_address = Ipv4Addr::from(cursor.get_u32());
        let gateway_ip_address = Ipv4Addr::from(cursor.get_u32());
        let hardware_address = take!(cursor, SIZE_HARDWARE_ADDRESS);
        let client_hardware_address = MacAddress::from_bytes(&hardware_address[..EUI48LEN])
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "client_hardware_address"))?;
        let mut server_name = take!(cursor, SIZE_SERVER_NAME).to_vec();
        let mut boot_filename = take!(cursor, SIZE_BOOT_FILENAME).to_vec();

        if cursor.get_u32() != MAGIC_COOKIE {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "MAGIC_COOKIE"));
        }

        let mut options = Options::new();
        Self::append_options(cursor, &mut options)?;

        // RFC 3396: the options field first, then file, then sname.
        // An overloaded field carries no name, so it is cleared once read.
        let overload = options.overload();
        if overload.map_or(false, Overload::file) {
            Self::append_options(&boot_filename, &mut options)?;
            boot_filename.clear();
        }
        if overload.map_or(false, Overload::sname) {
            Self::append_options(&server_name, &mut options)?;
            server_name.clear();
        }
        if overload.is_some() {
            options.remove(OptionTag::Overload as u8);
        }

        Ok(Message {
            operation_code,
            hardware_type,
            hardware_address_length,
            hardware_options,
            transaction_id,
            seconds,
            is_broadcast,
            client_ip_address,
            your_ip_address,
            server_ip_address,
            gateway_ip_address,
            client_hardware_address,
            server_name,
            boot_filename,
            options,
        })
    }

    fn append_options(mut cursor: &[u8], options: &mut Options) -> io::Result<()> {
        while cursor.remaining() > 0 {
            let code = cursor.get_u8();
            if code == OptionTag::Pad as u8 {
                continue;
            }
            if code == OptionTag::End as u8 {
                break;
            }
            check_remaining!(cursor, 1);
            let length = cursor.get_u8() as usize;
            check_remaining!(cursor, length);
            let value = take!(cursor, length);
            options.append(code, value);
        }
        Ok(())
    }
}
