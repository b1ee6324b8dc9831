//! DOE object header encoding and decoding.
//!
//! Every data object starts with two header dwords:
//! ```text
//! header 1: ┌──────────┬─────────────┬──────────────┐
//!           │ reserved │ object type │  vendor ID   │
//!           │  31:24   │    23:16    │     15:0     │
//!           └──────────┴─────────────┴──────────────┘
//! header 2: ┌──────────────────────┬─────────────────┐
//!           │       reserved       │ length (dwords) │
//!           │        31:18         │      17:0       │
//!           └──────────────────────┴─────────────────┘
//! ```
//!
//! The length counts every dword of the object, both headers included.

use crate::error::{DoeError, Result};

/// Number of header dwords preceding any payload.
pub const HEADER_DWORDS: u32 = 2;

/// Header 1: vendor ID field.
pub const VENDOR_ID_MASK: u32 = 0x0000_FFFF;
/// Header 1: data object type field.
pub const OBJECT_TYPE_MASK: u32 = 0x00FF_0000;
/// Header 2: object length field (dwords).
pub const LENGTH_MASK: u32 = 0x0003_FFFF;

/// Largest length the header can carry.
pub const MAX_OBJECT_DWORDS: u32 = LENGTH_MASK;

/// Extract a bitfield described by a shifted, contiguous `mask`.
#[inline]
pub const fn field_get(mask: u32, reg: u32) -> u32 {
    (reg & mask) >> mask.trailing_zeros()
}

/// Place `value` into the bitfield described by `mask`, dropping excess bits.
#[inline]
pub const fn field_prep(mask: u32, value: u32) -> u32 {
    (value << mask.trailing_zeros()) & mask
}

/// Pack the two header dwords.
///
/// # Example
///
/// ```
/// use cxl_doe::protocol::encode_header;
///
/// assert_eq!(encode_header(0x1e98, 2, 3), (0x0002_1e98, 0x0000_0003));
/// ```
#[inline]
pub fn encode_header(vendor_id: u16, object_type: u8, length: u32) -> (u32, u32) {
    let header1 = field_prep(VENDOR_ID_MASK, u32::from(vendor_id))
        | field_prep(OBJECT_TYPE_MASK, u32::from(object_type));
    let header2 = field_prep(LENGTH_MASK, length);
    (header1, header2)
}

/// Object length in dwords from header dword 2.
#[inline]
pub fn decode_length(dword: u32) -> u32 {
    field_get(LENGTH_MASK, dword)
}

/// Payload dwords carried by an object of `length` dwords.
///
/// Saturates at zero for lengths shorter than the headers.
#[inline]
pub fn payload_length(length: u32) -> u32 {
    length.saturating_sub(HEADER_DWORDS)
}

/// Vendor/type pair identifying a data object protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoeHeader {
    /// Vendor owning the object type (1 = PCI-SIG, 0x1e98 = CXL).
    pub vendor_id: u16,
    /// Protocol-specific object type.
    pub object_type: u8,
}

impl DoeHeader {
    /// Create a new header.
    pub const fn new(vendor_id: u16, object_type: u8) -> Self {
        Self {
            vendor_id,
            object_type,
        }
    }

    /// Encode header dword 1.
    #[inline]
    pub fn encode(&self) -> u32 {
        encode_header(self.vendor_id, self.object_type, 0).0
    }

    /// Decode header dword 1. Reserved bits are ignored.
    #[inline]
    pub fn decode(dword: u32) -> Self {
        Self {
            vendor_id: field_get(VENDOR_ID_MASK, dword) as u16,
            object_type: field_get(OBJECT_TYPE_MASK, dword) as u8,
        }
    }

    /// Encode both header dwords for an object with `payload_dwords` of payload.
    ///
    /// Fails if the total does not fit the length field.
    pub fn encode_with_payload(&self, payload_dwords: usize) -> Result<(u32, u32)> {
        let total = payload_dwords + HEADER_DWORDS as usize;
        if total > MAX_OBJECT_DWORDS as usize {
            return Err(DoeError::RequestTooLong { dwords: total });
        }
        Ok(encode_header(self.vendor_id, self.object_type, total as u32))
    }
}
