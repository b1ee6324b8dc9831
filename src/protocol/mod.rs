//! Protocol module - DOE object framing.
//!
//! This module implements the frame codec:
//! - two-dword object header encoding/decoding
//! - named bitfield helpers used by every driver
//! - request and response object types

mod frame;
mod wire_format;

pub use frame::{DoeRequest, DoeResponse};
pub use wire_format::{
    decode_length, encode_header, field_get, field_prep, payload_length, DoeHeader,
    HEADER_DWORDS, LENGTH_MASK, MAX_OBJECT_DWORDS, OBJECT_TYPE_MASK, VENDOR_ID_MASK,
};
