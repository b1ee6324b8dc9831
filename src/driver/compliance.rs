//! CXL compliance request.

use super::CXL_VENDOR_ID;
use crate::engine::DoeMailbox;
use crate::error::Result;
use crate::port::RegisterPort;
use crate::protocol::DoeRequest;

/// Object type of compliance requests.
pub const COMPLIANCE_OBJECT_TYPE: u8 = 0;

/// Compliance request carrying `request_code`.
pub fn compliance_request(request_code: u32) -> DoeRequest {
    DoeRequest::new(CXL_VENDOR_ID, COMPLIANCE_OBJECT_TYPE, vec![request_code])
}

/// Send `request_code` and return the response payload.
pub fn compliance<P: RegisterPort>(
    mailbox: &mut DoeMailbox<P>,
    request_code: u32,
) -> Result<Vec<u32>> {
    let payload = mailbox.execute(&compliance_request(request_code))?.read_payload()?;
    tracing::debug!(request_code, dwords = payload.len(), "Compliance response");
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::{DoeError, ReadyStage};
    use crate::port::SimDevice;

    #[test]
    fn test_request_layout() {
        let request = compliance_request(0xf).encode().unwrap();
        assert_eq!(request, vec![0x0000_1e98, 0x0000_0003, 0x0000_000f]);
    }

    #[test]
    fn test_two_payload_dwords() {
        let mut sim = SimDevice::new();
        sim.push_response(vec![0x0000_1e98, 4, 0x0000_0f00, 0x0000_0001]);
        let mut mb = DoeMailbox::new(sim);
        assert_eq!(compliance(&mut mb, 0xf).unwrap(), vec![0x0f00, 0x1]);
    }

    #[test]
    fn test_final_readiness_check_applies() {
        let mut sim = SimDevice::new();
        sim.push_response(vec![0x0000_1e98, 4, 1, 2])
            .set_lose_ready_before_last(true);
        let mut mb = DoeMailbox::builder(sim)
            .ready_poll_interval(Duration::ZERO)
            .build();
        assert!(matches!(
            compliance(&mut mb, 0),
            Err(DoeError::ProtocolNotReady {
                stage: ReadyStage::BeforeFinalAck,
                ..
            })
        ));
    }
}
