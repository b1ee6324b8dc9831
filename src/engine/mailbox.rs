//! DOE transaction engine.
//!
//! A [`DoeMailbox`] owns a register port and runs one exchange at a time:
//! 1. Abort whatever the mailbox was doing
//! 2. Write both headers and the payload to the write mailbox
//! 3. Set GO
//! 4. Poll status until data-object-ready (bounded)
//! 5. Hand out a [`ResponseReader`] that pops the response dword by dword
//!
//! # Example
//!
//! ```
//! use cxl_doe::engine::DoeMailbox;
//! use cxl_doe::port::SimDevice;
//! use cxl_doe::protocol::DoeRequest;
//!
//! let mut sim = SimDevice::new();
//! sim.push_response(vec![0x0000_1e98, 4, 0xaa, 0xbb]);
//!
//! let mut mailbox = DoeMailbox::new(sim);
//! let response = mailbox.exchange(&DoeRequest::new(0x1e98, 0, vec![0xf])).unwrap();
//! assert_eq!(response.payload, vec![0xaa, 0xbb]);
//! ```

use std::time::Duration;

use super::reader::ResponseReader;
use super::registers::{control, DoeRegisters, DoeStatus};
use crate::config::MailboxConfig;
use crate::error::{DoeError, ReadyStage, Result};
use crate::port::RegisterPort;
use crate::protocol::{DoeRequest, DoeResponse};

/// Transaction engine bound to one DOE register set.
pub struct DoeMailbox<P> {
    port: P,
    config: MailboxConfig,
}

impl<P: RegisterPort> DoeMailbox<P> {
    /// Mailbox with the default configuration.
    pub fn new(port: P) -> Self {
        Self::with_config(port, MailboxConfig::default())
    }

    /// Mailbox with an explicit configuration.
    pub fn with_config(port: P, config: MailboxConfig) -> Self {
        Self { port, config }
    }

    /// Start configuring a mailbox.
    pub fn builder(port: P) -> MailboxBuilder<P> {
        MailboxBuilder::new(port)
    }

    /// Active configuration.
    pub fn config(&self) -> &MailboxConfig {
        &self.config
    }

    /// Register offsets in use.
    #[inline]
    pub fn registers(&self) -> DoeRegisters {
        self.config.registers
    }

    /// Shared access to the port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Direct access to the port, for configuration-space work outside DOE.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Release the port.
    pub fn into_inner(self) -> P {
        self.port
    }

    /// Read the status register.
    pub fn status(&mut self) -> Result<DoeStatus> {
        let status = self.config.registers.status;
        self.port.read32(status).map(DoeStatus)
    }

    /// Abort the transaction in progress, if any.
    pub fn abort(&mut self) -> Result<()> {
        let regs = self.config.registers;
        self.port.write32(regs.control, control::ABORT)
    }

    /// Send `request` and wait for the response to become available.
    ///
    /// The returned reader has already consumed both response headers. It
    /// borrows the mailbox, so no other exchange can start until it is gone.
    pub fn execute(&mut self, request: &DoeRequest) -> Result<ResponseReader<'_, P>> {
        // Encode first so an oversized request never touches the device.
        let dwords = request.encode()?;
        let regs = self.config.registers;

        tracing::debug!(
            vendor_id = request.header.vendor_id,
            object_type = request.header.object_type,
            length = dwords.len(),
            "Sending DOE request"
        );

        self.port.write32(regs.control, control::ABORT)?;
        for &dword in &dwords {
            self.port.write32(regs.write_mailbox, dword)?;
        }
        self.port.write32(regs.control, control::GO)?;

        self.wait_ready()?;
        ResponseReader::open(self)
    }

    /// Send `request` and drain the whole response.
    pub fn exchange(&mut self, request: &DoeRequest) -> Result<DoeResponse> {
        self.execute(request)?.into_response()
    }

    /// Poll for data-object-ready after GO.
    fn wait_ready(&mut self) -> Result<()> {
        let attempts = self.config.ready_poll_attempts.max(1);
        let interval = self.config.ready_poll_interval;
        let mut status = DoeStatus(0);

        for attempt in 1..=attempts {
            status = self.status()?;
            if status.has_error() {
                return self.fail(DoeError::DeviceError {
                    status: status.bits(),
                });
            }
            if status.is_ready() {
                tracing::trace!(attempt, "Data object ready");
                return Ok(());
            }
            if attempt < attempts && interval > Duration::ZERO {
                std::thread::sleep(interval);
            }
        }

        self.fail(DoeError::ProtocolNotReady {
            stage: ReadyStage::AfterGo,
            status: status.bits(),
        })
    }

    /// Pop one dword from the read mailbox.
    pub(crate) fn read_acked(&mut self) -> Result<u32> {
        let regs = self.config.registers;
        let dword = self.port.read32(regs.read_mailbox)?;
        self.port.write32(regs.read_mailbox, self.config.ack_value)?;
        Ok(dword)
    }

    /// Abort on a best-effort basis and return `err`.
    pub(crate) fn fail<T>(&mut self, err: DoeError) -> Result<T> {
        tracing::warn!("Aborting DOE exchange: {}", err);
        if let Err(abort_err) = self.abort() {
            tracing::warn!("Abort after failure did not complete: {}", abort_err);
        }
        Err(err)
    }
}

/// Builder for [`DoeMailbox`].
pub struct MailboxBuilder<P> {
    port: P,
    config: MailboxConfig,
}

impl<P: RegisterPort> MailboxBuilder<P> {
    /// Builder with the default configuration.
    pub fn new(port: P) -> Self {
        Self {
            port,
            config: MailboxConfig::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: MailboxConfig) -> Self {
        self.config = config;
        self
    }

    /// Use explicit register offsets.
    pub fn registers(mut self, registers: DoeRegisters) -> Self {
        self.config.registers = registers;
        self
    }

    /// Place the DOE capability at `base`.
    ///
    /// # Panics
    ///
    /// Panics if `base` is above [`MAX_DOE_BASE`](super::MAX_DOE_BASE).
    pub fn doe_base(mut self, base: u32) -> Self {
        self.config.registers = DoeRegisters::at_base(base);
        self
    }

    /// Set the number of status polls after GO.
    ///
    /// Default: 1000
    pub fn ready_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.ready_poll_attempts = attempts;
        self
    }

    /// Set the pause between status polls.
    ///
    /// Default: 100 µs
    pub fn ready_poll_interval(mut self, interval: Duration) -> Self {
        self.config.ready_poll_interval = interval;
        self
    }

    /// Set the value written to acknowledge each response dword.
    ///
    /// Default: 0
    pub fn ack_value(mut self, value: u32) -> Self {
        self.config.ack_value = value;
        self
    }

    /// Set the CDAT page cap.
    ///
    /// Default: 256
    pub fn max_cdat_pages(mut self, pages: usize) -> Self {
        self.config.max_cdat_pages = pages;
        self
    }

    /// Finish building.
    pub fn build(self) -> DoeMailbox<P> {
        DoeMailbox::with_config(self.port, self.config)
    }
}
