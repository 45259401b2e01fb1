//! The decoded RFC 5444 message model the engine works on.
//!
//! Address blocks are flattened: every address carries the TLVs that
//! applied to it, whatever block or index range they came from.

use std::{fmt, net::Ipv4Addr, time::Duration};

use crate::{
    codec,
    constants::*,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub kind: u8,
    pub ext: u8,
    pub value: Vec<u8>,
}

impl Tlv {
    pub fn new(kind: u8, value: Vec<u8>) -> Self {
        Tlv { kind, ext: 0, value }
    }

    pub fn with_ext(kind: u8, ext: u8, value: Vec<u8>) -> Self {
        Tlv { kind, ext, value }
    }

    /// A single octet value.
    pub fn byte(&self) -> Option<u8> {
        match self.value.as_slice() {
            [value] => Some(*value),
            _ => None,
        }
    }

    /// A two octet value.
    pub fn short(&self) -> Option<u16> {
        match self.value.as_slice() {
            [high, low] => Some(u16::from(*high) << 8 | u16::from(*low)),
            _ => None,
        }
    }

    /// The direction flags and the metric of a LINK_METRIC value.
    pub fn link_metric(&self) -> Option<(u8, u32)> {
        self.short()
            .map(|value| ((value >> 12) as u8, codec::decode_metric(value & 0x0fff)))
    }

    pub fn link_metric_value(flags: u8, metric: u32) -> Vec<u8> {
        let value = u16::from(flags & 0x0f) << 12 | codec::encode_metric(metric);
        vec![(value >> 8) as u8, value as u8]
    }
}

/// One advertised address and its TLVs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressEntry {
    pub address: Ipv4Addr,
    pub prefix: u8,
    pub tlvs: Vec<Tlv>,
}

impl AddressEntry {
    pub fn new(address: Ipv4Addr) -> Self {
        AddressEntry {
            address,
            prefix: 32,
            tlvs: Vec::new(),
        }
    }

    pub fn tlvs(&self, kind: u8) -> impl Iterator<Item = &Tlv> {
        self.tlvs.iter().filter(move |tlv| tlv.kind == kind)
    }

    pub fn count(&self, kind: u8) -> usize {
        self.tlvs(kind).count()
    }

    /// The single octet value of the first TLV of `kind`.
    pub fn value(&self, kind: u8) -> Option<u8> {
        self.tlvs(kind).next().and_then(Tlv::byte)
    }

    /// The metric of the first LINK_METRIC TLV carrying any of `direction`.
    pub fn metric(&self, direction: u8) -> Option<u32> {
        self.tlvs(TLV_LINK_METRIC)
            .filter_map(Tlv::link_metric)
            .find(|(flags, _)| flags & direction != 0)
            .map(|(_, metric)| metric)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: u8,
    pub originator: Option<Ipv4Addr>,
    pub hop_limit: Option<u8>,
    pub hop_count: Option<u8>,
    pub seq: Option<u16>,
    pub tlvs: Vec<Tlv>,
    pub addresses: Vec<AddressEntry>,
}

impl Message {
    pub fn new(kind: u8) -> Self {
        Message {
            kind,
            originator: None,
            hop_limit: None,
            hop_count: None,
            seq: None,
            tlvs: Vec::new(),
            addresses: Vec::new(),
        }
    }

    pub fn tlv(&self, kind: u8) -> Option<&Tlv> {
        self.tlvs.iter().find(|tlv| tlv.kind == kind)
    }

    pub fn count(&self, kind: u8) -> usize {
        self.tlvs.iter().filter(|tlv| tlv.kind == kind).count()
    }

    pub fn validity_time(&self) -> Option<Duration> {
        self.tlv(TLV_VALIDITY_TIME)
            .and_then(Tlv::byte)
            .map(codec::decode_time)
    }

    pub fn interval_time(&self) -> Option<Duration> {
        self.tlv(TLV_INTERVAL_TIME)
            .and_then(Tlv::byte)
            .map(codec::decode_time)
    }

    /// The entry for `address`, created at the end if absent.
    pub fn address_mut(&mut self, address: Ipv4Addr, prefix: u8) -> &mut AddressEntry {
        let index = match self
            .addresses
            .iter()
            .position(|entry| entry.address == address && entry.prefix == prefix)
        {
            Some(index) => index,
            None => {
                let mut entry = AddressEntry::new(address);
                entry.prefix = prefix;
                self.addresses.push(entry);
                self.addresses.len() - 1
            }
        };
        &mut self.addresses[index]
    }

    pub fn add_address_tlv(&mut self, address: Ipv4Addr, tlv: Tlv) {
        self.address_mut(address, 32).tlvs.push(tlv);
    }

    pub fn entry(&self, address: Ipv4Addr) -> Option<&AddressEntry> {
        self.addresses.iter().find(|entry| entry.address == address)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            MSG_TYPE_HELLO => "HELLO",
            MSG_TYPE_TC => "TC",
            _ => "message",
        };
        write!(f, "{}", kind)?;
        if let Some(originator) = self.originator {
            write!(f, " from {}", originator)?;
        }
        if let Some(seq) = self.seq {
            write!(f, " seq {}", seq)?;
        }
        write!(f, " with {} addresses", self.addresses.len())
    }
}
