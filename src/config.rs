//! Mailbox tunables and the tool's JSON configuration file.
//!
//! [`MailboxConfig`] drives the transaction engine. [`ToolConfig`] is the
//! on-disk form read by the command-line tool; every field is optional.
//!
//! # Example
//!
//! ```
//! use cxl_doe::config::ToolConfig;
//!
//! let config = ToolConfig::from_json(r#"{ "doe_base": "0x200", "max_cdat_pages": 16 }"#).unwrap();
//! let mailbox = config.mailbox_config().unwrap();
//! assert_eq!(mailbox.registers.control, 0x208);
//! assert_eq!(mailbox.max_cdat_pages, 16);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::engine::{DoeRegisters, DEFAULT_DOE_BASE, MAX_DOE_BASE};
use crate::error::{DoeError, Result};

/// Default number of status polls after GO.
pub const DEFAULT_READY_POLL_ATTEMPTS: u32 = 1000;

/// Default pause between status polls.
pub const DEFAULT_READY_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Default acknowledgment value written to the read mailbox.
pub const DEFAULT_ACK_VALUE: u32 = 0;

/// Default cap on CDAT pages per table read (the entry handle is 8 bits).
pub const DEFAULT_MAX_CDAT_PAGES: usize = 256;

/// Device node used by the tool unless configured otherwise.
pub const DEFAULT_DEVICE: &str = "/dev/cxl/mem0";

/// Transaction engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxConfig {
    /// DOE register offsets.
    pub registers: DoeRegisters,
    /// Status polls after GO before giving up.
    pub ready_poll_attempts: u32,
    /// Pause between status polls.
    pub ready_poll_interval: Duration,
    /// Value written to the read mailbox to pop each dword.
    pub ack_value: u32,
    /// Maximum CDAT pages fetched before declaring the table unterminated.
    pub max_cdat_pages: usize,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            registers: DoeRegisters::default(),
            ready_poll_attempts: DEFAULT_READY_POLL_ATTEMPTS,
            ready_poll_interval: DEFAULT_READY_POLL_INTERVAL,
            ack_value: DEFAULT_ACK_VALUE,
            max_cdat_pages: DEFAULT_MAX_CDAT_PAGES,
        }
    }
}

/// Configuration file of the `cxl-doe` tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Memory device node.
    pub device: PathBuf,
    /// Offset of the DOE capability in configuration space.
    #[serde(deserialize_with = "doe_base")]
    pub doe_base: u32,
    pub ready_poll_attempts: u32,
    pub ready_poll_interval_us: u64,
    pub max_cdat_pages: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            doe_base: DEFAULT_DOE_BASE,
            ready_poll_attempts: DEFAULT_READY_POLL_ATTEMPTS,
            ready_poll_interval_us: DEFAULT_READY_POLL_INTERVAL.as_micros() as u64,
            max_cdat_pages: DEFAULT_MAX_CDAT_PAGES,
        }
    }
}

impl ToolConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Engine configuration described by this file.
    pub fn mailbox_config(&self) -> Result<MailboxConfig> {
        let registers = DoeRegisters::checked_at_base(self.doe_base).ok_or_else(|| {
            DoeError::InvalidConfig(format!(
                "doe_base {:#x} is above {MAX_DOE_BASE:#x}",
                self.doe_base
            ))
        })?;
        Ok(MailboxConfig {
            registers,
            ready_poll_attempts: self.ready_poll_attempts,
            ready_poll_interval: Duration::from_micros(self.ready_poll_interval_us),
            ack_value: DEFAULT_ACK_VALUE,
            max_cdat_pages: self.max_cdat_pages,
        })
    }
}

/// Capability base, rejected when its registers would not fit a 32-bit offset.
fn doe_base<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    let base = hex_or_number(deserializer)?;
    if base > MAX_DOE_BASE {
        return Err(serde::de::Error::custom(format!(
            "doe_base {base:#x} is above {MAX_DOE_BASE:#x}"
        )));
    }
    Ok(base)
}

/// Accept either a JSON number or a `"0x..."` string.
fn hex_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => {
            let digits = s.trim_start_matches("0x").trim_start_matches("0X");
            u32::from_str_radix(digits, 16).map_err(serde::de::Error::custom)
        }
    }
}
