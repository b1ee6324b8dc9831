use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cxl-doe")]
#[command(about = "Exercise the DOE mailbox and command interface of a CXL memory device")]
#[command(version)]
pub struct Cli {
    /// Memory device node (default from the config file, else /dev/cxl/mem0).
    #[arg(long, global = true)]
    pub device: Option<PathBuf>,

    /// JSON configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Log more (-v debug, -vv every register access).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// List the mailbox commands supported by the driver.
    Query,

    /// Read one configuration-space dword.
    CfgRead {
        #[arg(value_parser = parse_hex_u32)]
        offset: u32,
    },

    /// Write one configuration-space dword.
    CfgWrite {
        #[arg(value_parser = parse_hex_u32)]
        offset: u32,
        #[arg(value_parser = parse_hex_u32)]
        value: u32,
    },

    /// Query the DOE protocol list.
    Discovery {
        /// Index to query.
        #[arg(value_parser = parse_hex_u8, default_value = "0")]
        index: u8,

        /// Walk the whole list starting at index 0.
        #[arg(long, conflicts_with = "index")]
        all: bool,
    },

    /// Print the CDAT length reported by the first page.
    CdatLength,

    /// Read the whole CDAT.
    Cdat {
        /// Write the raw little-endian table to FILE.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Send a CXL compliance request.
    Compliance {
        #[arg(value_parser = parse_hex_u32)]
        code: u32,
    },

    /// Send a CMA/SPDM probe and abort afterwards.
    Cma {
        #[arg(value_parser = parse_hex_u32)]
        index: u32,
    },

    /// Run a mailbox command through the driver.
    Send {
        /// Command identifier (see `query`).
        #[arg(value_parser = parse_hex_u32)]
        id: u32,

        /// Input payload as hex bytes, e.g. 0a0b0c0d.
        #[arg(long, value_parser = parse_hex_bytes)]
        input: Option<HexBytes>,

        /// Output buffer size in bytes (default: the command's fixed output
        /// size, else 4096).
        #[arg(long)]
        out_size: Option<usize>,
    },
}

/// Byte string given on the command line as hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    u32::from_str_radix(strip_hex_prefix(s), 16)
        .map_err(|e| format!("invalid hex value '{s}': {e}"))
}

pub fn parse_hex_u8(s: &str) -> Result<u8, String> {
    u8::from_str_radix(strip_hex_prefix(s), 16)
        .map_err(|e| format!("invalid hex index '{s}': {e}"))
}

pub fn parse_hex_bytes(s: &str) -> Result<HexBytes, String> {
    let digits = strip_hex_prefix(s);
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{s}'"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid hex byte at position {i} in '{s}'"))
        })
        .collect::<Result<Vec<u8>, String>>()
        .map(HexBytes)
}
