//! # cxl-doe
//!
//! Data Object Exchange (DOE) engine for CXL memory devices.
//!
//! DOE is a mailbox inside PCIe configuration space: a request object is
//! written dword by dword, GO is set, and the response object is popped back
//! one dword at a time. This crate drives that handshake and implements the
//! protocols used on CXL devices on top of it.
//!
//! ## Architecture
//!
//! - **Port**: [`port::RegisterPort`], one configuration-space access per call
//!   (ioctl-backed on Linux, simulated in tests)
//! - **Protocol**: object headers and bitfield helpers
//! - **Engine**: abort, load, GO, bounded ready poll, read/ack draining
//! - **Drivers**: discovery, CDAT retrieval, compliance, CMA probe
//!
//! ## Example
//!
//! ```
//! use cxl_doe::driver::discovery;
//! use cxl_doe::port::SimDevice;
//! use cxl_doe::DoeMailbox;
//!
//! let mut sim = SimDevice::new();
//! sim.push_response(vec![0x0000_0001, 3, 0x0002_1e98]);
//!
//! let mut mailbox = DoeMailbox::new(sim);
//! let entry = discovery::discover(&mut mailbox, 0).unwrap();
//! assert_eq!(entry.vendor_id, 0x1e98);
//! assert_eq!(entry.protocol, 2);
//! assert!(entry.is_last());
//! ```

pub mod command;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod port;
pub mod protocol;

pub use config::{MailboxConfig, ToolConfig};
pub use engine::{DoeMailbox, MailboxBuilder, ResponseReader, SharedMailbox};
pub use error::{DoeError, ReadyStage, Result};
pub use port::{RegisterAccess, RegisterPort};
