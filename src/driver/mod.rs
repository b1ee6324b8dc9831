//! Driver module - protocol exchanges built on the transaction engine.
//!
//! Each driver builds its request object, runs it through a
//! [`DoeMailbox`](crate::engine::DoeMailbox) and decodes the returned dwords:
//! - [`discovery`] - one slot of the DOE protocol list
//! - [`cdat`] - paginated CDAT table retrieval
//! - [`compliance`] - CXL compliance request
//! - [`cma`] - CMA/SPDM reachability probe

pub mod cdat;
pub mod cma;
pub mod compliance;
pub mod discovery;

/// Vendor ID of PCI-SIG defined data objects.
pub const PCI_SIG_VENDOR_ID: u16 = 0x0001;

/// Vendor ID of CXL consortium defined data objects.
pub const CXL_VENDOR_ID: u16 = 0x1e98;

pub use cdat::{cdat_length, read_cdat, read_page, CdatPage, CdatTable};
pub use cma::CmaProbe;
pub use compliance::compliance;
pub use discovery::{discover, discover_all, DiscoveryEntry};
