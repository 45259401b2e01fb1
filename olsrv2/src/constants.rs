//! RFC 5444, RFC 6130 and RFC 7181 numbers.

pub const MSG_TYPE_HELLO: u8 = 0;
pub const MSG_TYPE_TC: u8 = 1;

pub const TLV_INTERVAL_TIME: u8 = 0;
pub const TLV_VALIDITY_TIME: u8 = 1;
pub const TLV_MPR_WILLING: u8 = 7;
pub const TLV_CONT_SEQ_NUM: u8 = 8;

pub const CONT_SEQ_NUM_COMPLETE: u8 = 0;
pub const CONT_SEQ_NUM_INCOMPLETE: u8 = 1;

pub const TLV_LOCAL_IF: u8 = 2;
pub const TLV_LINK_STATUS: u8 = 3;
pub const TLV_OTHER_NEIGHB: u8 = 4;
pub const TLV_LINK_METRIC: u8 = 7;
pub const TLV_MPR: u8 = 8;
pub const TLV_NBR_ADDR_TYPE: u8 = 9;
pub const TLV_GATEWAY: u8 = 10;

pub const LOCAL_IF_THIS_IF: u8 = 0;
pub const LOCAL_IF_OTHER_IF: u8 = 1;

pub const LINK_STATUS_LOST: u8 = 0;
pub const LINK_STATUS_SYMMETRIC: u8 = 1;
pub const LINK_STATUS_HEARD: u8 = 2;

pub const OTHER_NEIGHB_LOST: u8 = 0;
pub const OTHER_NEIGHB_SYMMETRIC: u8 = 1;

pub const MPR_FLOODING: u8 = 1;
pub const MPR_ROUTING: u8 = 2;
pub const MPR_FLOOD_ROUTE: u8 = 3;

pub const NBR_ADDR_TYPE_ORIGINATOR: u8 = 1;
pub const NBR_ADDR_TYPE_ROUTABLE: u8 = 2;
pub const NBR_ADDR_TYPE_ROUTABLE_ORIG: u8 = 3;

/// The direction flags in the top four bits of a LINK_METRIC value.
pub const LINK_METRIC_INCOMING_LINK: u8 = 0x8;
pub const LINK_METRIC_OUTGOING_LINK: u8 = 0x4;
pub const LINK_METRIC_INCOMING_NEIGHBOR: u8 = 0x2;
pub const LINK_METRIC_OUTGOING_NEIGHBOR: u8 = 0x1;

pub const WILL_NEVER: u8 = 0;
pub const WILL_DEFAULT: u8 = 7;
pub const WILL_ALWAYS: u8 = 15;

pub const MINIMUM_METRIC: u32 = 1;
pub const MAXIMUM_METRIC: u32 = 16_776_960;
