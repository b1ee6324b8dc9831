//! In-memory DOE device.
//!
//! `SimDevice` models the mailbox side of a DOE capability closely enough to
//! drive the transaction engine without hardware:
//! - write-mailbox dwords are collected until GO
//! - GO hands the request to a responder (closure or scripted queue)
//! - the read mailbox presents the response one dword at a time and only
//!   advances on an acknowledgment write
//! - the status register reports data-object-ready while a response is pending
//!
//! Every access is appended to a log so tests can replay the exact register
//! sequence. Offsets outside the DOE quartet behave as plain read/write
//! configuration space.
//!
//! # Example
//!
//! ```
//! use cxl_doe::port::{RegisterPort, SimDevice};
//!
//! let mut sim = SimDevice::new();
//! sim.write32(0x10, 0x00ff_0004).unwrap();
//! assert_eq!(sim.read32(0x10).unwrap(), 0x00ff_0004);
//! ```

use std::collections::{HashMap, VecDeque};

use super::{RegisterAccess, RegisterPort};
use crate::engine::{control, status, DoeRegisters};
use crate::error::Result;

/// Produces the response object for a request, or `None` to stay silent.
pub type Responder = Box<dyn FnMut(&[u32]) -> Option<Vec<u32>> + Send>;

/// Simulated DOE-capable device.
pub struct SimDevice {
    registers: DoeRegisters,
    config_space: HashMap<u32, u32>,
    write_buffer: Vec<u32>,
    response: VecDeque<u32>,
    requests: Vec<Vec<u32>>,
    responder: Option<Responder>,
    scripted: VecDeque<Vec<u32>>,
    ready_delay: u32,
    pending_delay: u32,
    lose_ready_before_last: bool,
    fail_next_request: bool,
    error: bool,
    log: Vec<RegisterAccess>,
}

impl SimDevice {
    /// Device with the default DOE register layout and no responses.
    pub fn new() -> Self {
        Self::with_registers(DoeRegisters::default())
    }

    /// Device with a custom DOE register layout.
    pub fn with_registers(registers: DoeRegisters) -> Self {
        Self {
            registers,
            config_space: HashMap::new(),
            write_buffer: Vec::new(),
            response: VecDeque::new(),
            requests: Vec::new(),
            responder: None,
            scripted: VecDeque::new(),
            ready_delay: 0,
            pending_delay: 0,
            lose_ready_before_last: false,
            fail_next_request: false,
            error: false,
            log: Vec::new(),
        }
    }

    /// Device answering every request through `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&[u32]) -> Option<Vec<u32>> + Send + 'static,
    {
        let mut sim = Self::new();
        sim.responder = Some(Box::new(responder));
        sim
    }

    /// Queue a canned response, used when no responder is installed.
    pub fn push_response(&mut self, response: Vec<u32>) -> &mut Self {
        self.scripted.push_back(response);
        self
    }

    /// Number of status reads after GO before data-object-ready is reported.
    pub fn set_ready_delay(&mut self, polls: u32) -> &mut Self {
        self.ready_delay = polls;
        self
    }

    /// Clear data-object-ready while the last response dword is pending.
    pub fn set_lose_ready_before_last(&mut self, lose: bool) -> &mut Self {
        self.lose_ready_before_last = lose;
        self
    }

    /// Raise the error status bit on the next GO instead of responding.
    pub fn fail_next_request(&mut self) -> &mut Self {
        self.fail_next_request = true;
        self
    }

    /// Preload a configuration-space dword.
    pub fn set_config(&mut self, offset: u32, value: u32) -> &mut Self {
        self.config_space.insert(offset, value);
        self
    }

    /// Requests received so far, each as written (headers included).
    pub fn requests(&self) -> &[Vec<u32>] {
        &self.requests
    }

    /// Every access performed, in order.
    pub fn log(&self) -> &[RegisterAccess] {
        &self.log
    }

    /// Forget the access log.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Response dwords not yet acknowledged.
    pub fn pending_response(&self) -> usize {
        self.response.len()
    }

    /// DOE register layout in use.
    pub fn registers(&self) -> DoeRegisters {
        self.registers
    }

    fn status_value(&mut self) -> u32 {
        let mut value = 0;
        if self.error {
            value |= status::ERROR;
        }
        if self.response.is_empty() {
            return value;
        }
        if self.pending_delay > 0 {
            self.pending_delay -= 1;
            return value | status::BUSY;
        }
        if self.lose_ready_before_last && self.response.len() == 1 {
            return value;
        }
        value | status::DATA_OBJECT_READY
    }

    fn on_control(&mut self, value: u32) {
        if value & control::ABORT != 0 {
            self.write_buffer.clear();
            self.response.clear();
            self.pending_delay = 0;
            self.error = false;
        }
        if value & control::GO != 0 {
            let request = std::mem::take(&mut self.write_buffer);
            self.requests.push(request.clone());

            if self.fail_next_request {
                self.fail_next_request = false;
                self.error = true;
                return;
            }

            let response = match self.responder.as_mut() {
                Some(responder) => responder(&request),
                None => self.scripted.pop_front(),
            };
            if let Some(response) = response {
                self.response = response.into();
                self.pending_delay = self.ready_delay;
            }
        }
    }

    fn read(&mut self, offset: u32) -> u32 {
        let regs = self.registers;
        if offset == regs.status {
            self.status_value()
        } else if offset == regs.read_mailbox {
            self.response.front().copied().unwrap_or(0)
        } else if offset == regs.write_mailbox {
            0
        } else {
            self.config_space.get(&offset).copied().unwrap_or(0)
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        let regs = self.registers;
        if offset == regs.control {
            self.on_control(value);
        } else if offset == regs.write_mailbox {
            self.write_buffer.push(value);
        } else if offset == regs.read_mailbox {
            self.response.pop_front();
        } else if offset != regs.status {
            self.config_space.insert(offset, value);
        }
    }
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterPort for SimDevice {
    fn transact(&mut self, access: RegisterAccess) -> Result<u32> {
        let value = if access.is_write {
            self.write(access.offset, access.value);
            access.value
        } else {
            self.read(access.offset)
        };
        self.log.push(RegisterAccess { value, ..access });
        Ok(value)
    }
}
