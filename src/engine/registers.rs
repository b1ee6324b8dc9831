//! DOE capability register layout.

use serde::{Deserialize, Serialize};

/// Configuration-space offset of the DOE capability on the devices this tool
/// targets.
pub const DEFAULT_DOE_BASE: u32 = 0x160;

/// Control register bits.
pub mod control {
    /// Abort any transaction in progress.
    pub const ABORT: u32 = 1 << 0;
    /// The request object is complete; start processing it.
    pub const GO: u32 = 1 << 31;
}

/// Status register bits.
pub mod status {
    /// Mailbox is busy with a request.
    pub const BUSY: u32 = 1 << 0;
    /// Interrupt pending.
    pub const INTERRUPT: u32 = 1 << 1;
    /// Device hit an error; cleared by abort.
    pub const ERROR: u32 = 1 << 2;
    /// A response object is available in the read mailbox.
    pub const DATA_OBJECT_READY: u32 = 1 << 31;
}

/// Absolute offsets of the DOE register quartet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoeRegisters {
    pub control: u32,
    pub status: u32,
    pub write_mailbox: u32,
    pub read_mailbox: u32,
}

/// Highest capability base whose registers still fit a 32-bit offset.
pub const MAX_DOE_BASE: u32 = u32::MAX - 0x14;

impl DoeRegisters {
    /// Layout of a DOE capability starting at `base`.
    ///
    /// # Panics
    ///
    /// Panics if `base` is above [`MAX_DOE_BASE`].
    pub const fn at_base(base: u32) -> Self {
        match Self::checked_at_base(base) {
            Some(regs) => regs,
            None => panic!("DOE capability base out of range"),
        }
    }

    /// Layout of a DOE capability starting at `base`, or `None` if the
    /// register offsets would overflow.
    pub const fn checked_at_base(base: u32) -> Option<Self> {
        if base > MAX_DOE_BASE {
            return None;
        }
        Some(Self {
            control: base + 0x08,
            status: base + 0x0c,
            write_mailbox: base + 0x10,
            read_mailbox: base + 0x14,
        })
    }
}

impl Default for DoeRegisters {
    fn default() -> Self {
        Self::at_base(DEFAULT_DOE_BASE)
    }
}

/// Snapshot of the status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoeStatus(pub u32);

impl DoeStatus {
    /// Data-object-ready is set.
    #[inline]
    pub fn is_ready(self) -> bool {
        self.0 & status::DATA_OBJECT_READY != 0
    }

    /// Busy is set.
    #[inline]
    pub fn is_busy(self) -> bool {
        self.0 & status::BUSY != 0
    }

    /// Error is set.
    #[inline]
    pub fn has_error(self) -> bool {
        self.0 & status::ERROR != 0
    }

    /// Raw register value.
    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }
}
