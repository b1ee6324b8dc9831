//! Mailbox command table of the `cxl_mem` driver.
//!
//! Maps the driver's command identifiers to the mailbox opcode they issue
//! and the payload sizes it enforces. Used to label the output of the command
//! query and to size buffers for `send`.

use serde::Serialize;

/// The command may be sent even when the driver has not enabled it.
pub const FLAG_FORCE_ENABLE: u32 = 1 << 0;

/// One mailbox command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MailboxCommand {
    /// Driver command identifier.
    pub id: u32,
    pub name: &'static str,
    /// Mailbox opcode; zero for raw passthrough.
    pub opcode: u16,
    /// Input payload size in bytes, `None` when variable.
    pub size_in: Option<u32>,
    /// Output payload size in bytes, `None` when variable.
    pub size_out: Option<u32>,
    pub flags: u32,
}

impl MailboxCommand {
    /// Whether [`FLAG_FORCE_ENABLE`] is set.
    #[inline]
    pub fn force_enable(&self) -> bool {
        self.flags & FLAG_FORCE_ENABLE != 0
    }
}

const fn cmd(
    id: u32,
    name: &'static str,
    opcode: u16,
    size_in: Option<u32>,
    size_out: Option<u32>,
    flags: u32,
) -> MailboxCommand {
    MailboxCommand {
        id,
        name,
        opcode,
        size_in,
        size_out,
        flags,
    }
}

/// Every command the driver knows, in identifier order.
pub const COMMANDS: &[MailboxCommand] = &[
    cmd(1, "IDENTIFY", 0x4000, Some(0), Some(0x43), FLAG_FORCE_ENABLE),
    cmd(2, "RAW", 0x0000, None, None, 0),
    cmd(3, "GET_SUPPORTED_LOGS", 0x0400, Some(0), None, FLAG_FORCE_ENABLE),
    cmd(4, "GET_FW_INFO", 0x0200, Some(0), Some(0x50), 0),
    cmd(5, "GET_PARTITION_INFO", 0x4100, Some(0), Some(0x20), 0),
    cmd(6, "GET_LSA", 0x4102, Some(0x8), None, 0),
    cmd(7, "GET_HEALTH_INFO", 0x4200, Some(0), Some(0x12), 0),
    cmd(8, "GET_LOG", 0x0401, Some(0x18), None, FLAG_FORCE_ENABLE),
    cmd(9, "SET_PARTITION_INFO", 0x4101, Some(0x0a), Some(0), 0),
    cmd(10, "SET_LSA", 0x4103, None, Some(0), 0),
    cmd(11, "GET_ALERT_CONFIG", 0x4201, Some(0), Some(0x10), 0),
    cmd(12, "SET_ALERT_CONFIG", 0x4202, Some(0xc), Some(0), 0),
    cmd(13, "GET_SHUTDOWN_STATE", 0x4203, Some(0), Some(0x1), 0),
    cmd(14, "SET_SHUTDOWN_STATE", 0x4204, Some(0x1), Some(0), 0),
    cmd(15, "GET_POISON", 0x4300, Some(0x10), None, 0),
    cmd(16, "INJECT_POISON", 0x4301, Some(0x8), Some(0), 0),
    cmd(17, "CLEAR_POISON", 0x4302, Some(0x48), Some(0), 0),
    cmd(18, "GET_SCAN_MEDIA_CAPS", 0x4303, Some(0x10), Some(0x4), 0),
    cmd(19, "SCAN_MEDIA", 0x4304, Some(0x11), Some(0), 0),
    cmd(20, "GET_SCAN_MEDIA", 0x4305, Some(0), None, 0),
];

/// Look up a command by driver identifier.
pub fn by_id(id: u32) -> Option<&'static MailboxCommand> {
    COMMANDS.iter().find(|c| c.id == id)
}

/// Display name of `id`.
pub fn name(id: u32) -> &'static str {
    match id {
        0 => "INVALID",
        _ => by_id(id).map_or("UNKNOWN", |c| c.name),
    }
}
