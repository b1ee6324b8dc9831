//! DOE discovery.
//!
//! Each request names one index of the device's protocol list; the response
//! reports the protocol at that index and the index to ask for next. A next
//! index of zero ends the list.

use serde::Serialize;

use super::PCI_SIG_VENDOR_ID;
use crate::engine::DoeMailbox;
use crate::error::{DoeError, Result};
use crate::port::RegisterPort;
use crate::protocol::{field_get, field_prep, DoeRequest};

/// Object type of discovery requests.
pub const DISCOVERY_OBJECT_TYPE: u8 = 0;

/// Request payload: index to query.
pub const REQUEST_INDEX_MASK: u32 = 0x0000_00FF;

/// Response payload: vendor ID of the protocol.
pub const RESPONSE_VENDOR_ID_MASK: u32 = 0x0000_FFFF;
/// Response payload: data object type of the protocol.
pub const RESPONSE_PROTOCOL_MASK: u32 = 0x00FF_0000;
/// Response payload: next index, zero when this was the last entry.
pub const RESPONSE_NEXT_INDEX_MASK: u32 = 0xFF00_0000;

/// Upper bound on [`discover_all`] calls; the index field is 8 bits wide.
const MAX_DISCOVERY_ENTRIES: usize = 256;

/// One supported protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscoveryEntry {
    /// Index that was queried.
    pub index: u8,
    pub vendor_id: u16,
    pub protocol: u8,
    pub next_index: u8,
}

impl DiscoveryEntry {
    /// Decode a response payload dword.
    pub fn decode(index: u8, dword: u32) -> Self {
        Self {
            index,
            vendor_id: field_get(RESPONSE_VENDOR_ID_MASK, dword) as u16,
            protocol: field_get(RESPONSE_PROTOCOL_MASK, dword) as u8,
            next_index: field_get(RESPONSE_NEXT_INDEX_MASK, dword) as u8,
        }
    }

    /// Whether the device reported no further entries.
    #[inline]
    pub fn is_last(&self) -> bool {
        self.next_index == 0
    }
}

/// Discovery request for `index`.
pub fn discovery_request(index: u8) -> DoeRequest {
    DoeRequest::new(
        PCI_SIG_VENDOR_ID,
        DISCOVERY_OBJECT_TYPE,
        vec![field_prep(REQUEST_INDEX_MASK, u32::from(index))],
    )
}

/// Query one slot of the protocol list.
pub fn discover<P: RegisterPort>(mailbox: &mut DoeMailbox<P>, index: u8) -> Result<DiscoveryEntry> {
    let payload = mailbox.execute(&discovery_request(index))?.read_payload()?;
    let dword = payload.first().copied().ok_or_else(|| {
        DoeError::MalformedResponse("discovery response carries no payload".to_string())
    })?;
    if payload.len() > 1 {
        tracing::debug!(extra = payload.len() - 1, "Ignoring trailing discovery dwords");
    }

    let entry = DiscoveryEntry::decode(index, dword);
    tracing::debug!(
        index,
        vendor_id = entry.vendor_id,
        protocol = entry.protocol,
        next_index = entry.next_index,
        "Discovery entry"
    );
    Ok(entry)
}

/// Walk the protocol list from index 0 until the device reports the end.
pub fn discover_all<P: RegisterPort>(mailbox: &mut DoeMailbox<P>) -> Result<Vec<DiscoveryEntry>> {
    let mut entries = Vec::new();
    let mut index = 0u8;

    while entries.len() < MAX_DISCOVERY_ENTRIES {
        let entry = discover(mailbox, index)?;
        entries.push(entry);
        if entry.is_last() {
            return Ok(entries);
        }
        index = entry.next_index;
    }

    tracing::warn!("Discovery list did not terminate");
    Err(DoeError::PaginationExhausted {
        pages: MAX_DISCOVERY_ENTRIES,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::port::SimDevice;

    fn mailbox(sim: SimDevice) -> DoeMailbox<SimDevice> {
        DoeMailbox::builder(sim)
            .ready_poll_interval(Duration::ZERO)
            .build()
    }

    #[test]
    fn test_request_for_index_zero() {
        let request = discovery_request(0).encode().unwrap();
        assert_eq!(request, vec![0x0000_0001, 0x0000_0003, 0]);
    }

    #[test]
    fn test_index_fills_low_byte_only() {
        let request = discovery_request(0xff).encode().unwrap();
        assert_eq!(request[2], 0x0000_00ff);
        assert_eq!(request[2] & !REQUEST_INDEX_MASK, 0);
    }

    #[test]
    fn test_decode_entry_fields() {
        let entry = DiscoveryEntry::decode(1, 0x0202_1e98);
        assert_eq!(entry.vendor_id, 0x1e98);
        assert_eq!(entry.protocol, 2);
        assert_eq!(entry.next_index, 2);
        assert!(!entry.is_last());
    }

    #[test]
    fn test_discover_single_slot() {
        let mut sim = SimDevice::new();
        sim.push_response(vec![0x0000_0001, 3, 0x0100_0001]);
        let mut mb = mailbox(sim);

        let entry = discover(&mut mb, 0).unwrap();
        assert_eq!(entry.vendor_id, 1);
        assert_eq!(entry.protocol, 0);
        assert_eq!(entry.next_index, 1);
        assert_eq!(mb.port().requests().len(), 1);
    }

    #[test]
    fn test_empty_payload_is_malformed() {
        let mut sim = SimDevice::new();
        sim.push_response(vec![0x0000_0001, 2]);
        let mut mb = mailbox(sim);
        assert!(matches!(
            discover(&mut mb, 0),
            Err(DoeError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_trailing_dwords_are_drained() {
        let mut sim = SimDevice::new();
        sim.push_response(vec![0x0000_0001, 5, 0x0000_0001, 0xaa, 0xbb]);
        let mut mb = mailbox(sim);
        let entry = discover(&mut mb, 0).unwrap();
        assert!(entry.is_last());
        assert_eq!(mb.port().pending_response(), 0);
    }

    #[test]
    fn test_discover_all_follows_next_index() {
        let sim = SimDevice::with_responder(|request| {
            let table = [0x0100_0001u32, 0x0200_1e98, 0x0002_1e98];
            let index = request[2] as usize;
            Some(vec![0x0000_0001, 3, table[index]])
        });
        let mut mb = mailbox(sim);

        let entries = discover_all(&mut mb).unwrap();
        let indices: Vec<u8> = entries.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(entries[2].protocol, 2);
        assert_eq!(entries[2].vendor_id, 0x1e98);
    }

    #[test]
    fn test_discover_all_is_bounded() {
        let sim = SimDevice::with_responder(|_| Some(vec![0x0000_0001, 3, 0x0100_0001]));
        let mut mb = mailbox(sim);
        assert!(matches!(
            discover_all(&mut mb),
            Err(DoeError::PaginationExhausted { pages: 256 })
        ));
        assert_eq!(mb.port().requests().len(), 256);
    }
}
