//! AODV control messages (RFC 3561 §5).
//!
//! Every multi-byte field is big-endian on the wire.

use std::{fmt, net::Ipv4Addr};

use bytes::{Buf, BufMut};

use crate::error::Error;

pub const TYPE_RREQ: u8 = 1;
pub const TYPE_RREP: u8 = 2;
pub const TYPE_RERR: u8 = 3;

pub const SIZE_RREQ: usize = 24;
pub const SIZE_RREP: usize = 20;
pub const SIZE_RERR_HEADER: usize = 4;
pub const SIZE_RERR_DESTINATION: usize = 8;

/// The destination count of a RERR is a single octet.
pub const MAX_RERR_DESTINATIONS: usize = 255;

const FLAG_RREQ_JOIN: u8 = 0x80;
const FLAG_RREQ_REPAIR: u8 = 0x40;
const FLAG_RREQ_GRATUITOUS: u8 = 0x20;
const FLAG_RREQ_DESTINATION_ONLY: u8 = 0x10;
const FLAG_RREQ_UNKNOWN_SEQ: u8 = 0x08;

const FLAG_RREP_REPAIR: u8 = 0x80;
const FLAG_RREP_ACK_REQUIRED: u8 = 0x40;
const MASK_RREP_PREFIX_SIZE: u8 = 0x1f;

const FLAG_RERR_NO_DELETE: u8 = 0x80;

/// Checks if there is enough data left in the buffer to get a value.
macro_rules! check_remaining(
    ($cursor:expr, $length:expr, $what:expr) => (
        if $cursor.remaining() < $length {
            return Err(Error::Codec($what));
        }
    );
);

/// Route Request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rreq {
    pub join: bool,
    pub repair: bool,
    pub gratuitous: bool,
    pub destination_only: bool,
    pub unknown_seq: bool,
    pub hop_count: u8,
    pub rreq_id: u32,
    pub destination: Ipv4Addr,
    pub destination_seq: u32,
    pub originator: Ipv4Addr,
    pub originator_seq: u32,
}

/// Route Reply.
///
/// A reply whose destination is its originator is a HELLO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rrep {
    pub repair: bool,
    pub ack_required: bool,
    pub prefix_size: u8,
    pub hop_count: u8,
    pub destination: Ipv4Addr,
    pub destination_seq: u32,
    pub originator: Ipv4Addr,
    /// Milliseconds.
    pub lifetime: u32,
}

impl Rrep {
    pub fn is_hello(&self) -> bool {
        self.destination == self.originator
    }
}

/// One destination a RERR reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unreachable {
    pub address: Ipv4Addr,
    pub seq: u32,
}

/// Route Error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rerr {
    pub no_delete: bool,
    pub unreachable: Vec<Unreachable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Rreq(Rreq),
    Rrep(Rrep),
    Rerr(Rerr),
}

impl Packet {
    /// Decodes a control message. Trailing bytes are ignored.
    ///
    /// # Errors
    /// `Error::Codec` if the type is unknown or the message is truncated.
    pub fn from_bytes(src: &[u8]) -> Result<Self, Error> {
        let mut cursor = src;
        check_remaining!(cursor, 1, "empty message");
        match cursor.get_u8() {
            TYPE_RREQ => {
                check_remaining!(cursor, SIZE_RREQ - 1, "truncated RREQ");
                let flags = cursor.get_u8();
                let _reserved = cursor.get_u8();
                Ok(Packet::Rreq(Rreq {
                    join: flags & FLAG_RREQ_JOIN != 0,
                    repair: flags & FLAG_RREQ_REPAIR != 0,
                    gratuitous: flags & FLAG_RREQ_GRATUITOUS != 0,
                    destination_only: flags & FLAG_RREQ_DESTINATION_ONLY != 0,
                    unknown_seq: flags & FLAG_RREQ_UNKNOWN_SEQ != 0,
                    hop_count: cursor.get_u8(),
                    rreq_id: cursor.get_u32(),
                    destination: Ipv4Addr::from(cursor.get_u32()),
                    destination_seq: cursor.get_u32(),
                    originator: Ipv4Addr::from(cursor.get_u32()),
                    originator_seq: cursor.get_u32(),
                }))
            }
            TYPE_RREP => {
                check_remaining!(cursor, SIZE_RREP - 1, "truncated RREP");
                let flags = cursor.get_u8();
                let prefix_size = cursor.get_u8() & MASK_RREP_PREFIX_SIZE;
                Ok(Packet::Rrep(Rrep {
                    repair: flags & FLAG_RREP_REPAIR != 0,
                    ack_required: flags & FLAG_RREP_ACK_REQUIRED != 0,
                    prefix_size,
                    hop_count: cursor.get_u8(),
                    destination: Ipv4Addr::from(cursor.get_u32()),
                    destination_seq: cursor.get_u32(),
                    originator: Ipv4Addr::from(cursor.get_u32()),
                    lifetime: cursor.get_u32(),
                }))
            }
            TYPE_RERR => {
                check_remaining!(cursor, SIZE_RERR_HEADER - 1, "truncated RERR");
                let flags = cursor.get_u8();
                let _reserved = cursor.get_u8();
                let count = cursor.get_u8() as usize;
                if count == 0 {
                    return Err(Error::Codec("RERR without destinations"));
                }
                check_remaining!(cursor, count * SIZE_RERR_DESTINATION, "truncated RERR destinations");
                let unreachable = (0..count)
                    .map(|_| Unreachable {
                        address: Ipv4Addr::from(cursor.get_u32()),
                        seq: cursor.get_u32(),
                    })
                    .collect();
                Ok(Packet::Rerr(Rerr {
                    no_delete: flags & FLAG_RERR_NO_DELETE != 0,
                    unreachable,
                }))
            }
            _ => Err(Error::Codec("unknown message type")),
        }
    }

    /// Encodes the message.
    ///
    /// # Errors
    /// `Error::Codec` if a RERR carries no destinations or more than a count octet holds.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut dst = Vec::with_capacity(SIZE_RREQ);
        match self {
            Packet::Rreq(rreq) => {
                let mut flags = 0;
                if rreq.join {
                    flags |= FLAG_RREQ_JOIN;
                }
                if rreq.repair {
                    flags |= FLAG_RREQ_REPAIR;
                }
                if rreq.gratuitous {
                    flags |= FLAG_RREQ_GRATUITOUS;
                }
                if rreq.destination_only {
                    flags |= FLAG_RREQ_DESTINATION_ONLY;
                }
                if rreq.unknown_seq {
                    flags |= FLAG_RREQ_UNKNOWN_SEQ;
                }
                dst.put_u8(TYPE_RREQ);
                dst.put_u8(flags);
                dst.put_u8(0);
                dst.put_u8(rreq.hop_count);
                dst.put_u32(rreq.rreq_id);
                dst.put_u32(u32::from(rreq.destination));
                dst.put_u32(rreq.destination_seq);
                dst.put_u32(u32::from(rreq.originator));
                dst.put_u32(rreq.originator_seq);
            }
            Packet::Rrep(rrep) => {
                let mut flags = 0;
                if rrep.repair {
                    flags |= FLAG_RREP_REPAIR;
                }
                if rrep.ack_required {
                    flags |= FLAG_RREP_ACK_REQUIRED;
                }
                dst.put_u8(TYPE_RREP);
                dst.put_u8(flags);
                dst.put_u8(rrep.prefix_size & MASK_RREP_PREFIX_SIZE);
                dst.put_u8(rrep.hop_count);
                dst.put_u32(u32::from(rrep.destination));
                dst.put_u32(rrep.destination_seq);
                dst.put_u32(u32::from(rrep.originator));
                dst.put_u32(rrep.lifetime);
            }
            Packet::Rerr(rerr) => {
                if rerr.unreachable.is_empty() {
                    return Err(Error::Codec("RERR without destinations"));
                }
                if rerr.unreachable.len() > MAX_RERR_DESTINATIONS {
                    return Err(Error::Codec("too many RERR destinations"));
                }
                dst.put_u8(TYPE_RERR);
                dst.put_u8(if rerr.no_delete { FLAG_RERR_NO_DELETE } else { 0 });
                dst.put_u8(0);
                dst.put_u8(rerr.unreachable.len() as u8);
                for unreachable in rerr.unreachable.iter() {
                    dst.put_u32(u32::from(unreachable.address));
                    dst.put_u32(unreachable.seq);
                }
            }
        }
        Ok(dst)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Packet::Rreq(rreq) => write!(
                f,
                "RREQ id {} {} (seq {}) -> {} (seq {}{}) hops {}",
                rreq.rreq_id,
                rreq.originator,
                rreq.originator_seq,
                rreq.destination,
                rreq.destination_seq,
                if rreq.unknown_seq { ", unknown" } else { "" },
                rreq.hop_count,
            ),
            Packet::Rrep(rrep) if rrep.is_hello() => {
                write!(f, "HELLO {} (seq {})", rrep.destination, rrep.destination_seq)
            }
            Packet::Rrep(rrep) => write!(
                f,
                "RREP {} (seq {}) for {} hops {} lifetime {}ms",
                rrep.destination, rrep.destination_seq, rrep.originator, rrep.hop_count, rrep.lifetime,
            ),
            Packet::Rerr(rerr) => {
                write!(f, "RERR")?;
                for unreachable in rerr.unreachable.iter() {
                    write!(f, " {} (seq {})", unreachable.address, unreachable.seq)?;
                }
                Ok(())
            }
        }
    }
}
