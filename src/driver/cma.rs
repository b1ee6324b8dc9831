//! CMA reachability probe.
//!
//! Sends a CMA/SPDM object, reads back whatever the device answers, then
//! aborts the mailbox and samples the status register. The SPDM payload is
//! not interpreted.

use serde::Serialize;

use super::PCI_SIG_VENDOR_ID;
use crate::engine::DoeMailbox;
use crate::error::Result;
use crate::port::RegisterPort;
use crate::protocol::{DoeRequest, DoeResponse};

/// Object type of CMA/SPDM objects.
pub const CMA_OBJECT_TYPE: u8 = 1;

/// Outcome of [`probe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CmaProbe {
    pub response: DoeResponse,
    /// Status register value read after the abort.
    pub status_after_abort: u32,
}

/// CMA request carrying `index` as its only payload dword.
pub fn cma_request(index: u32) -> DoeRequest {
    DoeRequest::new(PCI_SIG_VENDOR_ID, CMA_OBJECT_TYPE, vec![index])
}

/// Run the probe with `index` as the request payload.
pub fn probe<P: RegisterPort>(mailbox: &mut DoeMailbox<P>, index: u32) -> Result<CmaProbe> {
    let response = mailbox.exchange(&cma_request(index))?;
    mailbox.abort()?;
    let status = mailbox.status()?;
    tracing::debug!(
        length = response.length,
        status = status.bits(),
        "CMA probe finished"
    );
    Ok(CmaProbe {
        response,
        status_after_abort: status.bits(),
    })
}
