//! RFC 5444 packet framing for IPv4 messages, with the RFC 5497 time and
//! RFC 7181 metric compressions.
//!
//! The encoder writes one address block per message with full addresses and
//! single-index TLVs. The decoder accepts the general format: head and tail
//! compression, prefix lengths, index ranges and multivalue TLVs.

use std::{net::Ipv4Addr, time::Duration};

use bytes::{Buf, BufMut};

use crate::{
    constants::*,
    error::Error,
    message::{AddressEntry, Message, Tlv},
};

const VERSION: u8 = 0;
const PKT_HAS_SEQ_NUM: u8 = 0x8;
const PKT_HAS_TLV: u8 = 0x4;

const MSG_HAS_ORIG: u8 = 0x8;
const MSG_HAS_HOP_LIMIT: u8 = 0x4;
const MSG_HAS_HOP_COUNT: u8 = 0x2;
const MSG_HAS_SEQ_NUM: u8 = 0x1;

const ADDR_HAS_HEAD: u8 = 0x80;
const ADDR_HAS_FULL_TAIL: u8 = 0x40;
const ADDR_HAS_ZERO_TAIL: u8 = 0x20;
const ADDR_HAS_SINGLE_PRE_LEN: u8 = 0x10;
const ADDR_HAS_MULTI_PRE_LEN: u8 = 0x08;

const TLV_HAS_TYPE_EXT: u8 = 0x80;
const TLV_HAS_SINGLE_INDEX: u8 = 0x40;
const TLV_HAS_MULTI_INDEX: u8 = 0x20;
const TLV_HAS_VALUE: u8 = 0x10;
const TLV_HAS_EXT_LEN: u8 = 0x08;
const TLV_IS_MULTIVALUE: u8 = 0x04;

const SIZE_ADDRESS: usize = 4;
const SIZE_MESSAGE_HEADER: usize = 4;

/// Checks if there is enough data left in the buffer to get a value.
macro_rules! check_remaining(
    ($cursor:expr, $length:expr, $what:expr) => (
        if $cursor.remaining() < $length {
            return Err(Error::InvalidMessage($what));
        }
    );
);

/// Encodes messages into one packet.
///
/// # Errors
/// `Error::InvalidMessage` if a message has more than 255 addresses or
/// does not fit the 16-bit size field.
pub fn encode(messages: &[Message]) -> Result<Vec<u8>, Error> {
    let mut dst = Vec::new();
    dst.put_u8(VERSION << 4);
    for message in messages.iter() {
        encode_message(message, &mut dst)?;
    }
    Ok(dst)
}

/// Decodes a packet. Messages with other address lengths are skipped.
///
/// # Errors
/// `Error::InvalidMessage` if the packet is truncated or inconsistent.
pub fn decode(src: &[u8]) -> Result<Vec<Message>, Error> {
    let mut cursor = src;
    check_remaining!(cursor, 1, "empty packet");
    let header = cursor.get_u8();
    if header >> 4 != VERSION {
        return Err(Error::InvalidMessage("unsupported packet version"));
    }
    if header & PKT_HAS_SEQ_NUM != 0 {
        check_remaining!(cursor, 2, "truncated packet sequence number");
        cursor.advance(2);
    }
    if header & PKT_HAS_TLV != 0 {
        decode_tlv_block(&mut cursor, 0)?;
    }

    let mut messages = Vec::new();
    while cursor.has_remaining() {
        check_remaining!(cursor, SIZE_MESSAGE_HEADER, "truncated message header");
        let kind = cursor.get_u8();
        let flags_and_length = cursor.get_u8();
        let size = cursor.get_u16() as usize;
        if size < SIZE_MESSAGE_HEADER {
            return Err(Error::InvalidMessage("message size too small"));
        }
        check_remaining!(cursor, size - SIZE_MESSAGE_HEADER, "truncated message");
        let (body, rest) = cursor.split_at(size - SIZE_MESSAGE_HEADER);
        cursor = rest;

        if (flags_and_length & 0x0f) as usize + 1 != SIZE_ADDRESS {
            trace!("Skipping a message with another address length");
            continue;
        }
        messages.push(decode_message(kind, flags_and_length >> 4, body)?);
    }
    Ok(messages)
}

fn encode_message(message: &Message, dst: &mut Vec<u8>) -> Result<(), Error> {
    let start = dst.len();
    let mut flags = 0;
    if message.originator.is_some() {
        flags |= MSG_HAS_ORIG;
    }
    if message.hop_limit.is_some() {
        flags |= MSG_HAS_HOP_LIMIT;
    }
    if message.hop_count.is_some() {
        flags |= MSG_HAS_HOP_COUNT;
    }
    if message.seq.is_some() {
        flags |= MSG_HAS_SEQ_NUM;
    }

    dst.put_u8(message.kind);
    dst.put_u8(flags << 4 | (SIZE_ADDRESS as u8 - 1));
    dst.put_u16(0);
    if let Some(originator) = message.originator {
        dst.put_u32(u32::from(originator));
    }
    if let Some(hop_limit) = message.hop_limit {
        dst.put_u8(hop_limit);
    }
    if let Some(hop_count) = message.hop_count {
        dst.put_u8(hop_count);
    }
    if let Some(seq) = message.seq {
        dst.put_u16(seq);
    }

    let mut block = Vec::new();
    for tlv in message.tlvs.iter() {
        encode_tlv(tlv, None, &mut block);
    }
    put_block(&block, dst)?;

    if !message.addresses.is_empty() {
        if message.addresses.len() > u8::max_value() as usize {
            return Err(Error::InvalidMessage("too many addresses in a message"));
        }
        let prefixed = message.addresses.iter().any(|entry| entry.prefix != 32);
        dst.put_u8(message.addresses.len() as u8);
        dst.put_u8(if prefixed { ADDR_HAS_MULTI_PRE_LEN } else { 0 });
        for entry in message.addresses.iter() {
            dst.put_u32(u32::from(entry.address));
        }
        if prefixed {
            for entry in message.addresses.iter() {
                dst.put_u8(entry.prefix);
            }
        }

        let mut block = Vec::new();
        for (index, entry) in message.addresses.iter().enumerate() {
            for tlv in entry.tlvs.iter() {
                encode_tlv(tlv, Some(index as u8), &mut block);
            }
        }
        put_block(&block, dst)?;
    }

    let size = dst.len() - start;
    if size > u16::max_value() as usize {
        return Err(Error::InvalidMessage("message too long"));
    }
    dst[start + 2] = (size >> 8) as u8;
    dst[start + 3] = size as u8;
    Ok(())
}

fn put_block(block: &[u8], dst: &mut Vec<u8>) -> Result<(), Error> {
    if block.len() > u16::max_value() as usize {
        return Err(Error::InvalidMessage("TLV block too long"));
    }
    dst.put_u16(block.len() as u16);
    dst.put_slice(block);
    Ok(())
}

fn encode_tlv(tlv: &Tlv, index: Option<u8>, dst: &mut Vec<u8>) {
    let mut flags = 0;
    if tlv.ext != 0 {
        flags |= TLV_HAS_TYPE_EXT;
    }
    if index.is_some() {
        flags |= TLV_HAS_SINGLE_INDEX;
    }
    if !tlv.value.is_empty() {
        flags |= TLV_HAS_VALUE;
        if tlv.value.len() > u8::max_value() as usize {
            flags |= TLV_HAS_EXT_LEN;
        }
    }

    dst.put_u8(tlv.kind);
    dst.put_u8(flags);
    if tlv.ext != 0 {
        dst.put_u8(tlv.ext);
    }
    if let Some(index) = index {
        dst.put_u8(index);
    }
    if flags & TLV_HAS_EXT_LEN != 0 {
        dst.put_u16(tlv.value.len() as u16);
    } else if flags & TLV_HAS_VALUE != 0 {
        dst.put_u8(tlv.value.len() as u8);
    }
    dst.put_slice(&tlv.value);
}

fn decode_message(kind: u8, flags: u8, body: &[u8]) -> Result<Message, Error> {
    let mut cursor = body;
    let mut message = Message::new(kind);
    if flags & MSG_HAS_ORIG != 0 {
        check_remaining!(cursor, SIZE_ADDRESS, "truncated originator");
        message.originator = Some(Ipv4Addr::from(cursor.get_u32()));
    }
    if flags & MSG_HAS_HOP_LIMIT != 0 {
        check_remaining!(cursor, 1, "truncated hop limit");
        message.hop_limit = Some(cursor.get_u8());
    }
    if flags & MSG_HAS_HOP_COUNT != 0 {
        check_remaining!(cursor, 1, "truncated hop count");
        message.hop_count = Some(cursor.get_u8());
    }
    if flags & MSG_HAS_SEQ_NUM != 0 {
        check_remaining!(cursor, 2, "truncated message sequence number");
        message.seq = Some(cursor.get_u16());
    }

    message.tlvs = decode_tlv_block(&mut cursor, 0)?
        .into_iter()
        .map(|(tlv, _)| tlv)
        .collect();

    while cursor.has_remaining() {
        let addresses = decode_address_block(&mut cursor)?;
        let offset = message.addresses.len();
        let count = addresses.len();
        message.addresses.extend(addresses);
        for (tlv, indexes) in decode_tlv_block(&mut cursor, count)? {
            for index in indexes {
                message.addresses[offset + index].tlvs.push(tlv.clone());
            }
        }
    }
    Ok(message)
}

fn decode_address_block(cursor: &mut &[u8]) -> Result<Vec<AddressEntry>, Error> {
    check_remaining!(cursor, 2, "truncated address block");
    let count = cursor.get_u8() as usize;
    let flags = cursor.get_u8();
    if count == 0 {
        return Err(Error::InvalidMessage("empty address block"));
    }

    let mut head = Vec::new();
    if flags & ADDR_HAS_HEAD != 0 {
        check_remaining!(cursor, 1, "truncated address head");
        let length = cursor.get_u8() as usize;
        check_remaining!(cursor, length, "truncated address head");
        head = cursor[..length].to_vec();
        cursor.advance(length);
    }
    let mut tail = Vec::new();
    if flags & ADDR_HAS_FULL_TAIL != 0 {
        check_remaining!(cursor, 1, "truncated address tail");
        let length = cursor.get_u8() as usize;
        check_remaining!(cursor, length, "truncated address tail");
        tail = cursor[..length].to_vec();
        cursor.advance(length);
    } else if flags & ADDR_HAS_ZERO_TAIL != 0 {
        check_remaining!(cursor, 1, "truncated address tail");
        tail = vec![0; cursor.get_u8() as usize];
    }
    if head.len() + tail.len() > SIZE_ADDRESS {
        return Err(Error::InvalidMessage("address head and tail too long"));
    }

    let middle = SIZE_ADDRESS - head.len() - tail.len();
    check_remaining!(cursor, count * middle, "truncated addresses");
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let mut octets = [0u8; SIZE_ADDRESS];
        octets[..head.len()].copy_from_slice(&head);
        octets[head.len()..head.len() + middle].copy_from_slice(&cursor[..middle]);
        octets[SIZE_ADDRESS - tail.len()..].copy_from_slice(&tail);
        cursor.advance(middle);
        entries.push(AddressEntry::new(Ipv4Addr::from(octets)));
    }

    if flags & ADDR_HAS_SINGLE_PRE_LEN != 0 {
        check_remaining!(cursor, 1, "truncated prefix length");
        let prefix = cursor.get_u8();
        for entry in entries.iter_mut() {
            entry.prefix = prefix;
        }
    } else if flags & ADDR_HAS_MULTI_PRE_LEN != 0 {
        check_remaining!(cursor, count, "truncated prefix lengths");
        for entry in entries.iter_mut() {
            entry.prefix = cursor.get_u8();
        }
    }
    if entries.iter().any(|entry| entry.prefix > 32) {
        return Err(Error::InvalidMessage("prefix length too long"));
    }
    Ok(entries)
}

/// Decodes a TLV block whose indexes refer to `count` addresses.
///
/// Every TLV comes with the address indexes it applies to. A multivalue TLV
/// is split into one single-index TLV per address.
fn decode_tlv_block(cursor: &mut &[u8], count: usize) -> Result<Vec<(Tlv, Vec<usize>)>, Error> {
    check_remaining!(cursor, 2, "truncated TLV block");
    let length = cursor.get_u16() as usize;
    check_remaining!(cursor, length, "truncated TLV block");
    let data = *cursor;
    let (mut block, rest) = data.split_at(length);
    *cursor = rest;

    let mut tlvs = Vec::new();
    while block.has_remaining() {
        check_remaining!(block, 2, "truncated TLV");
        let kind = block.get_u8();
        let flags = block.get_u8();
        let mut ext = 0;
        if flags & TLV_HAS_TYPE_EXT != 0 {
            check_remaining!(block, 1, "truncated TLV type extension");
            ext = block.get_u8();
        }

        let (start, stop) = if flags & TLV_HAS_SINGLE_INDEX != 0 {
            check_remaining!(block, 1, "truncated TLV index");
            let index = block.get_u8() as usize;
            (index, index)
        } else if flags & TLV_HAS_MULTI_INDEX != 0 {
            check_remaining!(block, 2, "truncated TLV index");
            (block.get_u8() as usize, block.get_u8() as usize)
        } else {
            (0, count.saturating_sub(1))
        };
        if count == 0 && flags & (TLV_HAS_SINGLE_INDEX | TLV_HAS_MULTI_INDEX) != 0 {
            return Err(Error::InvalidMessage("indexed message TLV"));
        }
        if count > 0 && (start > stop || stop >= count) {
            return Err(Error::InvalidMessage("TLV index out of range"));
        }

        let mut value = Vec::new();
        if flags & TLV_HAS_VALUE != 0 {
            let length = if flags & TLV_HAS_EXT_LEN != 0 {
                check_remaining!(block, 2, "truncated TLV length");
                block.get_u16() as usize
            } else {
                check_remaining!(block, 1, "truncated TLV length");
                block.get_u8() as usize
            };
            check_remaining!(block, length, "truncated TLV value");
            value = block[..length].to_vec();
            block.advance(length);
        }

        let indexes: Vec<usize> = if count == 0 { Vec::new() } else { (start..=stop).collect() };
        if flags & TLV_IS_MULTIVALUE != 0 {
            if indexes.is_empty() || value.len() % indexes.len() != 0 {
                return Err(Error::InvalidMessage("multivalue TLV length mismatch"));
            }
            let width = value.len() / indexes.len();
            for (position, index) in indexes.into_iter().enumerate() {
                let part = value[position * width..(position + 1) * width].to_vec();
                tlvs.push((Tlv::with_ext(kind, ext, part), vec![index]));
            }
        } else {
            tlvs.push((Tlv::with_ext(kind, ext, value), indexes));
        }
    }
    Ok(tlvs)
}

/// RFC 5497 time code: `(1 + a/8) * 2^b` units of 1/1024 s, rounded up.
pub fn encode_time(time: Duration) -> u8 {
    let millis = time.as_millis() as u64;
    let units = (millis * 1024 + 999) / 1000;
    if units == 0 {
        return 0;
    }
    let mut exponent = 63 - units.leading_zeros() as u64;
    let base = 1u64 << exponent;
    let mut mantissa = ((units - base) * 8 + base - 1) / base;
    if mantissa == 8 {
        exponent += 1;
        mantissa = 0;
    }
    if exponent > 31 {
        return u8::max_value();
    }
    (exponent * 8 + mantissa) as u8
}

pub fn decode_time(code: u8) -> Duration {
    let exponent = u64::from(code >> 3);
    let mantissa = u64::from(code & 0x07);
    let units_times_eight = (8 + mantissa) << exponent;
    Duration::from_millis((units_times_eight * 1000 + 8191) / 8192)
}

/// RFC 7181 §6.2 metric code: `(257 + a) * 2^b - 256`, rounded up.
pub fn encode_metric(metric: u32) -> u16 {
    let metric = u64::from(metric.max(MINIMUM_METRIC).min(MAXIMUM_METRIC));
    for exponent in 0..16u64 {
        let scale = 1u64 << exponent;
        let mantissa = ((metric + 256 + scale - 1) / scale).saturating_sub(257);
        if mantissa <= 255 {
            return (exponent << 8 | mantissa) as u16;
        }
    }
    0x0fff
}

pub fn decode_metric(code: u16) -> u32 {
    let exponent = u32::from(code >> 8 & 0x0f);
    let mantissa = u32::from(code & 0xff);
    ((257 + mantissa) << exponent) - 256
}
