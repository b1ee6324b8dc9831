//! Port module - register access to the device configuration space.
//!
//! Everything above this layer talks to hardware through [`RegisterPort`],
//! a single blocking read/write primitive:
//! - [`CxlMemDevice`] - ioctl-backed accessor for `/dev/cxl/memN` (Linux)
//! - [`SimDevice`] - in-memory DOE responder with an access log

#[cfg(target_os = "linux")]
mod device;
mod sim;

#[cfg(target_os = "linux")]
pub use device::{CommandInfo, CxlMemDevice};
pub use sim::{Responder, SimDevice};

use serde::Serialize;

use crate::error::Result;

/// One register transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterAccess {
    /// Byte offset in configuration space.
    pub offset: u32,
    /// Value written, or value returned for reads.
    pub value: u32,
    /// Direction of the access.
    pub is_write: bool,
}

impl RegisterAccess {
    /// A read of `offset`.
    #[inline]
    pub const fn read(offset: u32) -> Self {
        Self {
            offset,
            value: 0,
            is_write: false,
        }
    }

    /// A write of `value` to `offset`.
    #[inline]
    pub const fn write(offset: u32, value: u32) -> Self {
        Self {
            offset,
            value,
            is_write: true,
        }
    }
}

/// Blocking 32-bit register access.
///
/// Implementors perform exactly one device transaction per call; there is no
/// batching. Transport failures are returned, never retried.
pub trait RegisterPort {
    /// Perform one access. Returns the value read, or the value written.
    fn transact(&mut self, access: RegisterAccess) -> Result<u32>;

    /// Read the dword at `offset`.
    #[inline]
    fn read32(&mut self, offset: u32) -> Result<u32> {
        self.transact(RegisterAccess::read(offset))
    }

    /// Write `value` to the dword at `offset`.
    #[inline]
    fn write32(&mut self, offset: u32, value: u32) -> Result<()> {
        self.transact(RegisterAccess::write(offset, value)).map(|_| ())
    }
}

impl<P: RegisterPort + ?Sized> RegisterPort for &mut P {
    #[inline]
    fn transact(&mut self, access: RegisterAccess) -> Result<u32> {
        (**self).transact(access)
    }
}

impl<P: RegisterPort + ?Sized> RegisterPort for Box<P> {
    #[inline]
    fn transact(&mut self, access: RegisterAccess) -> Result<u32> {
        (**self).transact(access)
    }
}
