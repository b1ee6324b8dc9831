//! Response draining.
//!
//! The read mailbox exposes one dword at a time. Every read is followed by an
//! acknowledgment write that pops it, so reads and acks strictly alternate.
//! Before the final payload dword the status register is checked once more;
//! if data-object-ready has dropped, the exchange is aborted.

use super::mailbox::DoeMailbox;
use crate::error::{DoeError, ReadyStage, Result};
use crate::port::RegisterPort;
use crate::protocol::{decode_length, payload_length, DoeHeader, DoeResponse, HEADER_DWORDS};

/// Streaming view of a response whose headers have been consumed.
///
/// Holds the mailbox exclusively until dropped. Dropping it early leaves the
/// remaining dwords in the device; the next exchange aborts them.
pub struct ResponseReader<'a, P: RegisterPort> {
    mailbox: &'a mut DoeMailbox<P>,
    header: DoeHeader,
    length: u32,
    remaining: u32,
}

impl<'a, P: RegisterPort> ResponseReader<'a, P> {
    /// Consume both response headers.
    pub(crate) fn open(mailbox: &'a mut DoeMailbox<P>) -> Result<Self> {
        let header1 = mailbox.read_acked()?;
        let header2 = mailbox.read_acked()?;

        let length = decode_length(header2);
        if length < HEADER_DWORDS {
            return mailbox.fail(DoeError::MalformedResponse(format!(
                "length field {length} is shorter than the headers"
            )));
        }

        let header = DoeHeader::decode(header1);
        tracing::debug!(
            vendor_id = header.vendor_id,
            object_type = header.object_type,
            length,
            "Response headers received"
        );

        Ok(Self {
            mailbox,
            header,
            length,
            remaining: payload_length(length),
        })
    }

    /// Vendor/type from header 1.
    pub fn header(&self) -> DoeHeader {
        self.header
    }

    /// Length field from header 2.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Payload dwords announced by the length field.
    pub fn payload_length(&self) -> u32 {
        payload_length(self.length)
    }

    /// Payload dwords not yet read.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Read and acknowledge the next payload dword.
    ///
    /// Returns `Ok(None)` once the payload is exhausted.
    pub fn next_dword(&mut self) -> Result<Option<u32>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        if self.remaining == 1 {
            let status = self.mailbox.status().map_err(|e| self.poison(e))?;
            if !status.is_ready() {
                self.remaining = 0;
                return self.mailbox.fail(DoeError::ProtocolNotReady {
                    stage: ReadyStage::BeforeFinalAck,
                    status: status.bits(),
                });
            }
        }

        let dword = self.mailbox.read_acked().map_err(|e| self.poison(e))?;
        self.remaining -= 1;
        Ok(Some(dword))
    }

    /// Read the rest of the payload.
    pub fn read_payload(mut self) -> Result<Vec<u32>> {
        let mut payload = Vec::with_capacity(self.remaining as usize);
        while let Some(dword) = self.next_dword()? {
            payload.push(dword);
        }
        Ok(payload)
    }

    /// Read the rest of the payload into a [`DoeResponse`].
    pub fn into_response(self) -> Result<DoeResponse> {
        let header = self.header;
        let length = self.length;
        let payload = self.read_payload()?;
        Ok(DoeResponse {
            vendor_id: header.vendor_id,
            object_type: header.object_type,
            length,
            payload,
        })
    }

    /// A transport failure leaves the mailbox in an unknown state.
    fn poison(&mut self, err: DoeError) -> DoeError {
        self.remaining = 0;
        err
    }
}

impl<P: RegisterPort> Iterator for ResponseReader<'_, P> {
    type Item = Result<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_dword().transpose()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

impl<P: RegisterPort> Drop for ResponseReader<'_, P> {
    fn drop(&mut self) {
        if self.remaining > 0 {
            tracing::debug!(
                remaining = self.remaining,
                "Response released before it was drained"
            );
        }
    }
}
