//! Integration tests for cxl-doe.
//!
//! Every driver runs against the simulated device and the register traffic is
//! checked through the access log.

use std::thread;
use std::time::Duration;

use cxl_doe::driver::{cdat, cma, compliance, discovery};
use cxl_doe::engine::{control, status, DoeRegisters};
use cxl_doe::port::{RegisterAccess, SimDevice};
use cxl_doe::protocol::{decode_length, encode_header, payload_length, DoeRequest};
use cxl_doe::{DoeError, DoeMailbox, ReadyStage, SharedMailbox, ToolConfig};

fn fast(sim: SimDevice) -> DoeMailbox<SimDevice> {
    DoeMailbox::builder(sim)
        .ready_poll_attempts(8)
        .ready_poll_interval(Duration::ZERO)
        .build()
}

/// Every read of the read mailbox is immediately followed by one ack write.
fn assert_ack_discipline(log: &[RegisterAccess], read_mailbox: u32) {
    for (i, access) in log.iter().enumerate() {
        if access.offset == read_mailbox && !access.is_write {
            let next = log.get(i + 1).expect("read mailbox read at end of log");
            assert_eq!(next.offset, read_mailbox, "access {i} not acknowledged");
            assert!(next.is_write, "access {i} followed by another read");
        }
    }
}

/// A device serving a small protocol list and a two-page CDAT.
fn cxl_device() -> SimDevice {
    SimDevice::with_responder(|request| {
        let header1 = request[0];
        let arg = request[2];
        match header1 {
            // Discovery: DOE discovery, CMA, CDAT.
            0x0000_0001 => {
                let list = [0x0100_0001u32, 0x0201_0001, 0x0002_1e98];
                let entry = *list.get(arg as usize)?;
                Some(vec![0x0000_0001, 3, entry])
            }
            // CDAT pages.
            0x0002_1e98 => match cdat::entry_handle(arg) {
                0 => Some(vec![0x0002_1e98, 6, 0x0100_0000, 20, 0x0000_0101, 0xaabb_ccdd]),
                1 => Some(vec![0x0002_1e98, 5, 0xff00_0000, 0x1111_1111, 0x2222_2222]),
                _ => None,
            },
            // Compliance: echo the request code.
            0x0000_1e98 => Some(vec![0x0000_1e98, 4, arg, 0]),
            _ => None,
        }
    })
}

/// Test header length encoding recovers the object length.
#[test]
fn test_header_length_round_trip() {
    let cases = [(1u16, 0u8, 1u32), (0x1e98, 2, 0), (0xffff, 0xff, 1000)];
    for (vendor, object_type, payload_len) in cases {
        let (_, header2) = encode_header(vendor, object_type, payload_len + 2);
        assert_eq!(decode_length(header2), payload_len + 2);
    }
}

/// Test payload length never goes below zero.
#[test]
fn test_payload_length_saturates() {
    assert_eq!(payload_length(0), 0);
    assert_eq!(payload_length(1), 0);
    assert_eq!(payload_length(2), 0);
    assert_eq!(payload_length(5), 3);
}

/// Test discovery request layout and ack discipline.
#[test]
fn test_discovery_request_on_the_wire() {
    let mut mailbox = fast(cxl_device());
    let entry = discovery::discover(&mut mailbox, 0).unwrap();
    assert_eq!(entry.next_index, 1);

    assert_eq!(mailbox.port().requests(), &[vec![0x0000_0001, 0x0000_0003, 0]]);
    assert_ack_discipline(mailbox.port().log(), 0x174);
}

/// Test walking the discovery list until next index 0.
#[test]
fn test_discovery_walk() {
    let mut mailbox = fast(cxl_device());
    let entries = discovery::discover_all(&mut mailbox).unwrap();

    let protocols: Vec<(u16, u8)> = entries
        .iter()
        .map(|e| (e.vendor_id, e.protocol))
        .collect();
    assert_eq!(protocols, vec![(0x0001, 0), (0x0001, 1), (0x1e98, 2)]);
    assert!(entries.last().unwrap().is_last());
}

/// Test multi-page CDAT read stopping at the last-entry handle.
#[test]
fn test_cdat_read_and_sentinel() {
    let mut mailbox = fast(cxl_device());
    let table = cdat::read_cdat(&mut mailbox).unwrap();

    assert_eq!(table.pages, 2);
    assert_eq!(table.length, Some(20));
    assert_eq!(
        table.dwords,
        vec![20, 0x0000_0101, 0xaabb_ccdd, 0x1111_1111, 0x2222_2222]
    );
    assert_eq!(table.to_bytes().len(), 20);

    // No request after the page carrying 0xff.
    let requests = mailbox.port().requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0][0], 0x0002_1e98);
    assert_eq!(requests[1][2], 0x0100_0000);
    assert_ack_discipline(mailbox.port().log(), 0x174);
}

/// Test CDAT length lookup uses a single page.
#[test]
fn test_cdat_length_only() {
    let mut mailbox = fast(cxl_device());
    assert_eq!(cdat::cdat_length(&mut mailbox).unwrap(), 20);
    assert_eq!(mailbox.port().requests().len(), 1);
}

/// Test CDAT read gives up on a device that never ends the table.
#[test]
fn test_cdat_pagination_exhausted() {
    let sim = SimDevice::with_responder(|_| Some(vec![0x0002_1e98, 4, 0x0100_0000, 0]));
    let mut mailbox = DoeMailbox::builder(sim)
        .ready_poll_interval(Duration::ZERO)
        .max_cdat_pages(3)
        .build();

    let err = cdat::read_cdat(&mut mailbox).unwrap_err();
    assert!(matches!(err, DoeError::PaginationExhausted { pages: 3 }));
    assert_eq!(mailbox.port().requests().len(), 3);
}

/// Test compliance request layout and two-dword response.
#[test]
fn test_compliance_exchange() {
    let mut sim = SimDevice::new();
    sim.push_response(vec![0x0000_1e98, 4, 0xaa, 0xbb]);
    let mut mailbox = fast(sim);

    let payload = compliance::compliance(&mut mailbox, 0xf).unwrap();
    assert_eq!(payload, vec![0xaa, 0xbb]);
    assert_eq!(
        mailbox.port().requests(),
        &[vec![0x0000_1e98, 0x0000_0003, 0x0000_000f]]
    );
    assert_ack_discipline(mailbox.port().log(), 0x174);
}

/// Test CMA exchange drains, aborts and samples status.
#[test]
fn test_cma_exchange_then_abort() {
    let mut sim = SimDevice::new();
    sim.push_response(vec![0x0001_0001, 4, 0x1, 0x2]);
    let mut mailbox = fast(sim);

    let outcome = cma::probe(&mut mailbox, 0).unwrap();
    assert_eq!(outcome.response.payload, vec![1, 2]);
    assert_eq!(outcome.status_after_abort & status::DATA_OBJECT_READY, 0);
}

/// Test missing data-object-ready after GO aborts the exchange.
#[test]
fn test_not_ready_after_go() {
    let mut mailbox = fast(SimDevice::new());
    let err = compliance::compliance(&mut mailbox, 0).unwrap_err();
    assert!(matches!(
        err,
        DoeError::ProtocolNotReady {
            stage: ReadyStage::AfterGo,
            ..
        }
    ));
    assert_eq!(
        mailbox.port().log().last(),
        Some(&RegisterAccess::write(0x168, control::ABORT))
    );
}

/// Test ready bit dropping before the final dword aborts the exchange.
#[test]
fn test_not_ready_before_final_ack() {
    let mut sim = SimDevice::new();
    sim.push_response(vec![0x0002_1e98, 4, 0xff00_0000, 8])
        .set_lose_ready_before_last(true);
    let mut mailbox = fast(sim);

    let err = cdat::read_cdat(&mut mailbox).unwrap_err();
    assert!(matches!(
        err,
        DoeError::ProtocolNotReady {
            stage: ReadyStage::BeforeFinalAck,
            ..
        }
    ));
    // The final dword was never read.
    let last_read = mailbox
        .port()
        .log()
        .iter()
        .filter(|a| a.offset == 0x174 && !a.is_write)
        .last()
        .map(|a| a.value);
    assert_eq!(last_read, Some(0xff00_0000));
}

/// Test response length shorter than the headers.
#[test]
fn test_malformed_length() {
    let mut sim = SimDevice::new();
    sim.push_response(vec![0x0000_0001, 0]);
    let mut mailbox = fast(sim);
    assert!(matches!(
        discovery::discover(&mut mailbox, 0),
        Err(DoeError::MalformedResponse(_))
    ));
}

/// Test busy polls within the attempt budget.
#[test]
fn test_slow_device_within_budget() {
    let mut sim = SimDevice::new();
    sim.push_response(vec![0x0000_1e98, 3, 5]).set_ready_delay(6);
    let mut mailbox = fast(sim);
    assert_eq!(compliance::compliance(&mut mailbox, 0).unwrap(), vec![5]);
}

/// Test the mailbox recovers after a device error.
#[test]
fn test_recovery_after_failure() {
    let mut sim = SimDevice::new();
    sim.fail_next_request().push_response(vec![0x0000_1e98, 3, 9]);
    let mut mailbox = fast(sim);

    assert!(matches!(
        compliance::compliance(&mut mailbox, 0),
        Err(DoeError::DeviceError { .. })
    ));
    assert_eq!(compliance::compliance(&mut mailbox, 0).unwrap(), vec![9]);
}

/// Test capability base taken from the JSON config.
#[test]
fn test_relocated_capability_from_config() {
    let json = r#"{ "doe_base": "0x200", "ready_poll_interval_us": 0 }"#;
    let config = ToolConfig::from_json(json).unwrap();
    let registers = DoeRegisters::at_base(0x200);
    let mut sim = SimDevice::with_registers(registers);
    sim.push_response(vec![0x0000_0001, 3, 0x0000_0001]);

    let mut mailbox = DoeMailbox::with_config(sim, config.mailbox_config().unwrap());
    let entry = discovery::discover(&mut mailbox, 0).unwrap();
    assert!(entry.is_last());
    assert!(mailbox.port().log().iter().all(|a| a.offset >= 0x208));
    assert_ack_discipline(mailbox.port().log(), registers.read_mailbox);
}

/// Test concurrent drivers through a shared mailbox.
#[test]
fn test_shared_mailbox_across_threads() {
    let shared = SharedMailbox::new(fast(cxl_device()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || {
                let table = shared.with(|mb| cdat::read_cdat(mb)).unwrap();
                assert_eq!(table.pages, 2);
                let code = shared
                    .with(|mb| compliance::compliance(mb, 0x42))
                    .unwrap();
                assert_eq!(code, vec![0x42, 0]);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mailbox = shared.lock().unwrap();
    assert_eq!(mailbox.port().requests().len(), 4 * 3);
    assert_ack_discipline(mailbox.port().log(), 0x174);
}

/// Test streaming a response through the reader.
#[test]
fn test_raw_exchange_through_reader() {
    let mut sim = SimDevice::new();
    sim.push_response(vec![0x0000_1e98, 5, 1, 2, 3]);
    let mut mailbox = fast(sim);

    let mut reader = mailbox
        .execute(&DoeRequest::new(0x1e98, 0, vec![0]))
        .unwrap();
    assert_eq!(reader.remaining(), 3);
    let first = reader.next().unwrap().unwrap();
    let rest: Result<Vec<u32>, _> = reader.collect();
    assert_eq!(first, 1);
    assert_eq!(rest.unwrap(), vec![2, 3]);
}
