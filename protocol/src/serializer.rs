//! DHCP message serialization module.

use bytes::BufMut;
use std::io;

use super::{
    constants::*,
    options::OptionTag,
    Message,
};

/// Checks if there is enough space in buffer to put a value.
macro_rules! check_remaining(
    ($cursor:expr, $distance:expr) => (
        if $cursor.remaining_mut() < $distance {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Buffer is too small"));
        }
    )
);

impl Message {
    /// DHCP message serialization.
    ///
    /// The message type goes first, the other options follow in code order.
    /// Values longer than 255 bytes are split into consecutive instances.
    /// The size of `dst` is the largest message the peer accepts.
    ///
    /// # Errors
    /// `io::Error` if the buffer is too small or a header field is too long.
    pub fn to_bytes(&self, dst: &mut [u8]) -> io::Result<usize> {
        if self.server_name.len() > SIZE_SERVER_NAME {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "server_name"));
        }
        if self.boot_filename.len() > SIZE_BOOT_FILENAME {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "boot_filename"));
        }

        let capacity = dst.len();
        let mut cursor = dst;
        check_remaining!(cursor, OFFSET_OPTIONS);
        cursor.put_u8(self.operation_code.into());
        cursor.put_u8(self.hardware_type.into());
        cursor.put_u8(self.hardware_address_length);
        cursor.put_u8(self.hardware_options);
        cursor.put_u32(self.transaction_id);
        cursor.put_u16(self.seconds);
        cursor.put_u16(if self.is_broadcast { FLAG_BROADCAST } else { 0x0000 });
        cursor.put_u32(u32::from(self.client_ip_address));
        cursor.put_u32(u32::from(self.your_ip_address));
        cursor.put_u32(u32::from(self.server_ip_address));
        cursor.put_u32(u32::from(self.gateway_ip_address));
        let hardware_address = self.client_hardware_address.as_bytes();
        cursor.put_slice(hardware_address); // 6 byte MAC-48
        cursor.put_bytes(0, SIZE_HARDWARE_ADDRESS - hardware_address.len()); // 10 byte padding
        cursor.put_slice(&self.server_name);
        cursor.put_bytes(0, SIZE_SERVER_NAME - self.server_name.len());
        cursor.put_slice(&self.boot_filename);
        cursor.put_bytes(0, SIZE_BOOT_FILENAME - self.boot_filename.len());
        cursor.put_u32(MAGIC_COOKIE);

        let message_type = OptionTag::DhcpMessageType as u8;
        if let Some(value) = self.options.get(message_type) {
            Self::put_option(&mut cursor, message_type, value)?;
        }
        for (code, value) in self.options.iter().filter(|(code, _)| *code != message_type) {
            Self::put_option(&mut cursor, code, value)?;
        }

        check_remaining!(cursor, 1);
        cursor.put_u8(OptionTag::End as u8);
        Ok(capacity - cursor.remaining_mut())
    }

    fn put_option(cursor: &mut &mut [u8], code: u8, value: &[u8]) -> io::Result<()> {
        if value.is_empty() {
            check_remaining!(cursor, SIZE_OPTION_PREFIX);
            cursor.put_u8(code);
            cursor.put_u8(0);
            return Ok(());
        }
        for chunk in value.chunks(SIZE_OPTION_MAX) {
            check_remaining!(cursor, SIZE_OPTION_PREFIX + chunk.len());
            cursor.put_u8(code);
            cursor.put_u8(chunk.len() as u8);
            cursor.put_slice(chunk);
        }
        Ok(())
    }
}
