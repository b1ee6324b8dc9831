//! CXL memory device node.
//!
//! Talks to the `cxl_mem` driver through three ioctls on `/dev/cxl/memN`:
//! - `CXL_MEM_CONFIG_WR`: one configuration-space dword read or write
//! - `CXL_MEM_QUERY_COMMANDS`: enumerate mailbox commands
//! - `CXL_MEM_SEND_COMMAND`: run one mailbox command
//!
//! # Example
//!
//! ```ignore
//! use cxl_doe::port::{CxlMemDevice, RegisterPort};
//!
//! let mut dev = CxlMemDevice::open("/dev/cxl/mem0")?;
//! let id = dev.read32(0x0)?;
//! ```

use std::fs::{File, OpenOptions};
use std::mem::size_of;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{RegisterAccess, RegisterPort};
use crate::error::{DoeError, Result};

const CXL_MEM_IOCTL_MAGIC: u32 = 0xCE;

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, nr: u32, size: usize) -> u32 {
    (dir << 30) | ((size as u32) << 16) | (CXL_MEM_IOCTL_MAGIC << 8) | nr
}

const CXL_MEM_QUERY_COMMANDS: u32 = ioc(IOC_READ, 1, size_of::<QueryHeader>());
const CXL_MEM_SEND_COMMAND: u32 = ioc(IOC_READ | IOC_WRITE, 2, size_of::<SendCommand>());
const CXL_MEM_CONFIG_WR: u32 = ioc(IOC_READ | IOC_WRITE, 3, size_of::<PdevConfig>());

#[repr(C)]
#[derive(Debug, Default)]
struct PdevConfig {
    offset: u32,
    data: u32,
    is_write: u32,
}

#[repr(C)]
#[derive(Debug, Default)]
struct QueryHeader {
    n_commands: u32,
    rsvd: u32,
}

#[repr(C)]
#[derive(Debug, Default)]
struct SendCommand {
    id: u32,
    flags: u32,
    raw_opcode: u16,
    raw_rsvd: u16,
    retval: u32,
    in_size: i32,
    in_rsvd: u32,
    in_payload: u64,
    out_size: i32,
    out_rsvd: u32,
    out_payload: u64,
}

/// Dwords per `cxl_command_info` record.
const COMMAND_INFO_DWORDS: usize = 4;

/// One entry returned by the command query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandInfo {
    /// Driver command identifier.
    pub id: u32,
    /// Command flags.
    pub flags: u32,
    /// Input payload size in bytes, -1 when variable.
    pub size_in: i32,
    /// Output payload size in bytes, -1 when variable.
    pub size_out: i32,
}

/// An open CXL memory device.
#[derive(Debug)]
pub struct CxlMemDevice {
    file: File,
    path: PathBuf,
}

impl CxlMemDevice {
    /// Open the device node read/write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| DoeError::DeviceOpen {
                path: path.clone(),
                source,
            })?;
        tracing::debug!("Opened {}", path.display());
        Ok(Self { file, path })
    }

    /// Path the device was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Issue `request` with `arg` as the ioctl argument.
    ///
    /// # Safety
    ///
    /// `arg` must point to memory laid out as `request` expects, valid for
    /// the kernel to read and write for the whole call.
    unsafe fn ioctl<T>(&self, request: u32, arg: *mut T) -> Result<()> {
        let rv = libc::ioctl(self.file.as_raw_fd(), request as _, arg);
        if rv < 0 {
            return Err(DoeError::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Enumerate the mailbox commands supported by the driver.
    pub fn query_commands(&self) -> Result<Vec<CommandInfo>> {
        // A zero count asks the driver for the number of commands.
        let mut header = QueryHeader::default();
        unsafe { self.ioctl(CXL_MEM_QUERY_COMMANDS, &mut header as *mut QueryHeader)? };

        let count = header.n_commands as usize;
        let mut buf = vec![0u32; 2 + count * COMMAND_INFO_DWORDS];
        buf[0] = header.n_commands;
        unsafe { self.ioctl(CXL_MEM_QUERY_COMMANDS, buf.as_mut_ptr())? };

        let returned = (buf[0] as usize).min(count);
        let commands = buf[2..]
            .chunks_exact(COMMAND_INFO_DWORDS)
            .take(returned)
            .map(|record| CommandInfo {
                id: record[0],
                flags: record[1],
                size_in: record[2] as i32,
                size_out: record[3] as i32,
            })
            .collect();
        Ok(commands)
    }

    /// Run mailbox command `id` with `input`, returning at most
    /// `out_capacity` bytes of output.
    pub fn send_command(&self, id: u32, input: &[u8], out_capacity: usize) -> Result<Vec<u8>> {
        let mut output = vec![0u8; out_capacity];
        let mut cmd = SendCommand {
            id,
            in_size: input.len() as i32,
            in_payload: input.as_ptr() as u64,
            out_size: out_capacity as i32,
            out_payload: output.as_mut_ptr() as u64,
            ..SendCommand::default()
        };
        unsafe { self.ioctl(CXL_MEM_SEND_COMMAND, &mut cmd as *mut SendCommand)? };

        if cmd.retval != 0 {
            return Err(DoeError::CommandFailed {
                id,
                retval: cmd.retval,
            });
        }
        output.truncate((cmd.out_size.max(0) as usize).min(out_capacity));
        tracing::debug!(id, bytes = output.len(), "Mailbox command completed");
        Ok(output)
    }
}

impl RegisterPort for CxlMemDevice {
    fn transact(&mut self, access: RegisterAccess) -> Result<u32> {
        let mut config = PdevConfig {
            offset: access.offset,
            data: access.value,
            is_write: u32::from(access.is_write),
        };
        unsafe { self.ioctl(CXL_MEM_CONFIG_WR, &mut config as *mut PdevConfig)? };

        tracing::trace!(
            "CONFIG_{} [{:#x}] {:#010x}",
            if access.is_write { "WR" } else { "RD" },
            config.offset,
            config.data
        );
        Ok(config.data)
    }
}
