//! Option 52, option overload (RFC 2132 §9.3).

use std::fmt;

/// Which header fields carry options on top of the options field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overload(u8);

impl Overload {
    const FILE: u8 = 0x01;
    const SNAME: u8 = 0x02;

    /// `None` for a value naming neither field.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits & (Self::FILE | Self::SNAME) {
            0 => None,
            bits => Some(Overload(bits)),
        }
    }

    /// The `file` field holds options.
    pub fn file(self) -> bool {
        self.0 & Self::FILE != 0
    }

    /// The `sname` field holds options.
    pub fn sname(self) -> bool {
        self.0 & Self::SNAME != 0
    }
}

impl fmt::Display for Overload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.file(), self.sname()) {
            (true, true) => write!(f, "file and sname"),
            (true, false) => write!(f, "file"),
            _ => write!(f, "sname"),
        }
    }
}
