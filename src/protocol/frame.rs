//! Request and response data objects.
//!
//! # Example
//!
//! ```
//! use cxl_doe::protocol::DoeRequest;
//!
//! let request = DoeRequest::new(0x0001, 0x00, vec![0]);
//! assert_eq!(request.encode().unwrap(), vec![0x0000_0001, 0x0000_0003, 0]);
//! ```

use serde::Serialize;

use super::wire_format::{payload_length, DoeHeader, HEADER_DWORDS};
use crate::error::Result;

/// A data object to be written into the DOE write mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoeRequest {
    /// Vendor/type of the object.
    pub header: DoeHeader,
    /// Payload dwords following the two headers.
    pub payload: Vec<u32>,
}

impl DoeRequest {
    /// Create a request from its parts.
    pub fn new(vendor_id: u16, object_type: u8, payload: Vec<u32>) -> Self {
        Self {
            header: DoeHeader::new(vendor_id, object_type),
            payload,
        }
    }

    /// Total object length in dwords, headers included.
    #[inline]
    pub fn length(&self) -> usize {
        self.payload.len() + HEADER_DWORDS as usize
    }

    /// Encode the whole object in write order.
    pub fn encode(&self) -> Result<Vec<u32>> {
        let (header1, header2) = self.header.encode_with_payload(self.payload.len())?;
        let mut dwords = Vec::with_capacity(self.length());
        dwords.push(header1);
        dwords.push(header2);
        dwords.extend_from_slice(&self.payload);
        Ok(dwords)
    }
}

/// A fully drained response object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoeResponse {
    /// Vendor ID reported in header 1.
    pub vendor_id: u16,
    /// Object type reported in header 1.
    pub object_type: u8,
    /// Length field from header 2 (dwords, headers included).
    pub length: u32,
    /// Payload dwords.
    pub payload: Vec<u32>,
}

impl DoeResponse {
    /// Decoded header 1.
    #[inline]
    pub fn header(&self) -> DoeHeader {
        DoeHeader::new(self.vendor_id, self.object_type)
    }

    /// Number of payload dwords announced by the length field.
    #[inline]
    pub fn payload_length(&self) -> u32 {
        payload_length(self.length)
    }

    /// Payload dword at `index`, if present.
    #[inline]
    pub fn dword(&self, index: usize) -> Option<u32> {
        self.payload.get(index).copied()
    }
}
