//! CDAT table retrieval.
//!
//! The table is read one page per exchange. Each request names an entry
//! handle; each response starts with a dword carrying the handle of the
//! next page, followed by the table dwords of this page. Handle 0 starts the
//! walk and `0xff` marks the last page.
//!
//! # Example
//!
//! ```
//! use cxl_doe::driver::cdat;
//! use cxl_doe::engine::DoeMailbox;
//! use cxl_doe::port::SimDevice;
//!
//! let mut sim = SimDevice::new();
//! sim.push_response(vec![0x0002_1e98, 5, 0xff00_0000, 16, 0x0101_0000]);
//!
//! let mut mailbox = DoeMailbox::new(sim);
//! let table = cdat::read_cdat(&mut mailbox).unwrap();
//! assert_eq!(table.length, Some(16));
//! assert_eq!(table.dwords, vec![16, 0x0101_0000]);
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use super::CXL_VENDOR_ID;
use crate::engine::DoeMailbox;
use crate::error::{DoeError, Result};
use crate::port::RegisterPort;
use crate::protocol::{field_get, field_prep, DoeRequest};

/// Object type of CDAT table access.
pub const CDAT_OBJECT_TYPE: u8 = 2;

/// Entry handle field, in both the request payload and the first response
/// payload dword.
pub const ENTRY_HANDLE_MASK: u32 = 0xFF00_0000;

/// Handle reported with the last page.
pub const CDAT_LAST_ENTRY: u8 = 0xff;

/// Entry handle carried by `dword`.
#[inline]
pub fn entry_handle(dword: u32) -> u8 {
    field_get(ENTRY_HANDLE_MASK, dword) as u8
}

/// Read request for the page at `handle`.
pub fn cdat_request(handle: u8) -> DoeRequest {
    DoeRequest::new(
        CXL_VENDOR_ID,
        CDAT_OBJECT_TYPE,
        vec![field_prep(ENTRY_HANDLE_MASK, u32::from(handle))],
    )
}

/// One page of the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CdatPage {
    /// Handle that was requested.
    pub handle: u8,
    /// Handle of the following page, [`CDAT_LAST_ENTRY`] if none.
    pub next_handle: u8,
    /// Table dwords of this page.
    pub dwords: Vec<u32>,
}

impl CdatPage {
    #[inline]
    pub fn is_last(&self) -> bool {
        self.next_handle == CDAT_LAST_ENTRY
    }
}

/// A complete table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CdatTable {
    /// Table length in bytes, as reported by the first page.
    pub length: Option<u32>,
    /// Concatenated table dwords of all pages.
    pub dwords: Vec<u32>,
    /// Number of pages read.
    pub pages: usize,
}

impl CdatTable {
    /// Table image in little-endian byte order.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.dwords.len() * 4);
        for &dword in &self.dwords {
            buf.put_u32_le(dword);
        }
        buf.freeze()
    }
}

/// Fetch the page at `handle`.
pub fn read_page<P: RegisterPort>(mailbox: &mut DoeMailbox<P>, handle: u8) -> Result<CdatPage> {
    let payload = mailbox.execute(&cdat_request(handle))?.read_payload()?;
    let (&first, dwords) = payload.split_first().ok_or_else(|| {
        DoeError::MalformedResponse(format!("CDAT page {handle:#04x} carries no payload"))
    })?;

    let page = CdatPage {
        handle,
        next_handle: entry_handle(first),
        dwords: dwords.to_vec(),
    };
    tracing::debug!(
        handle,
        next_handle = page.next_handle,
        dwords = page.dwords.len(),
        "CDAT page"
    );
    Ok(page)
}

/// Read the whole table, stopping after the page marked last.
///
/// Gives up with [`DoeError::PaginationExhausted`] after `max_cdat_pages`
/// pages without the last-entry handle.
pub fn read_cdat<P: RegisterPort>(mailbox: &mut DoeMailbox<P>) -> Result<CdatTable> {
    let max_pages = mailbox.config().max_cdat_pages;
    let mut table = CdatTable::default();
    let mut handle = 0u8;

    while table.pages < max_pages {
        let page = read_page(mailbox, handle)?;
        if table.pages == 0 {
            table.length = page.dwords.first().copied();
        }
        table.pages += 1;
        table.dwords.extend_from_slice(&page.dwords);

        if page.is_last() {
            tracing::debug!(pages = table.pages, dwords = table.dwords.len(), "CDAT read complete");
            return Ok(table);
        }
        handle = page.next_handle;
    }

    tracing::warn!(pages = max_pages, "CDAT last entry never reported");
    Err(DoeError::PaginationExhausted { pages: max_pages })
}

/// CDAT length in bytes, from the first page only.
pub fn cdat_length<P: RegisterPort>(mailbox: &mut DoeMailbox<P>) -> Result<u32> {
    let page = read_page(mailbox, 0)?;
    page.dwords.first().copied().ok_or_else(|| {
        DoeError::MalformedResponse("first CDAT page does not report a length".to_string())
    })
}
