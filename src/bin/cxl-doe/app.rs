use std::path::Path;

use anyhow::{bail, Context, Result};
use cxl_doe::driver::{cdat, cma, compliance, discovery};
use cxl_doe::{DoeMailbox, MailboxConfig, RegisterAccess, RegisterPort, ToolConfig};
use serde::Serialize;

use crate::cli::{Cli, Cmd};

pub fn run(cli: Cli) -> Result<()> {
    let tool = match &cli.config {
        Some(path) => ToolConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ToolConfig::default(),
    };
    let device = cli.device.clone().unwrap_or_else(|| tool.device.clone());
    let out = Output { json: cli.json };
    let config = tool.mailbox_config().context("invalid configuration")?;

    run_on_device(cli.cmd, &device, config, out)
}

#[cfg(target_os = "linux")]
fn run_on_device(cmd: Cmd, device: &Path, config: MailboxConfig, out: Output) -> Result<()> {
    use cxl_doe::port::CxlMemDevice;

    let dev = CxlMemDevice::open(device).context("cannot open the memory device (try sudo)")?;
    match cmd {
        Cmd::Query => query(&dev, out),
        Cmd::Send {
            id,
            input,
            out_size,
        } => {
            let input = input.map(|h| h.0).unwrap_or_default();
            let out_size = out_size.unwrap_or_else(|| default_out_size(id));
            let output = dev
                .send_command(id, &input, out_size)
                .with_context(|| format!("command {} ({})", id, cxl_doe::command::name(id)))?;
            out.emit(&output, || hex_dump(&output))
        }
        cmd => run_doe(cmd, &mut DoeMailbox::with_config(dev, config), out),
    }
}

#[cfg(not(target_os = "linux"))]
fn run_on_device(_cmd: Cmd, device: &Path, _config: MailboxConfig, _out: Output) -> Result<()> {
    bail!(
        "{}: CXL memory devices are only reachable on Linux",
        device.display()
    )
}

#[cfg(target_os = "linux")]
fn query(dev: &cxl_doe::port::CxlMemDevice, out: Output) -> Result<()> {
    #[derive(Serialize)]
    struct Row {
        #[serde(flatten)]
        info: cxl_doe::port::CommandInfo,
        name: &'static str,
        opcode: Option<u16>,
        force_enable: bool,
    }

    let rows: Vec<Row> = dev
        .query_commands()
        .context("querying mailbox commands")?
        .into_iter()
        .map(|info| {
            let known = cxl_doe::command::by_id(info.id);
            Row {
                name: cxl_doe::command::name(info.id),
                opcode: known.map(|c| c.opcode),
                force_enable: known.is_some_and(|c| c.force_enable()),
                info,
            }
        })
        .collect();

    out.emit(&rows, || {
        let mut text = format!("{} commands\n", rows.len());
        for row in &rows {
            let opcode = row.opcode.map_or("-".to_string(), |op| format!("{op:#06x}"));
            text.push_str(&format!(
                "{:>3} {:<20} opcode={} flags={:#x}{} in={} out={}\n",
                row.info.id,
                row.name,
                opcode,
                row.info.flags,
                if row.force_enable { " force" } else { "" },
                size_label(row.info.size_in),
                size_label(row.info.size_out)
            ));
        }
        text
    })
}

/// Commands served through the DOE mailbox (and plain register access).
fn run_doe<P: RegisterPort>(cmd: Cmd, mailbox: &mut DoeMailbox<P>, out: Output) -> Result<()> {
    match cmd {
        Cmd::CfgRead { offset } => {
            let value = mailbox.port_mut().read32(offset)?;
            let access = RegisterAccess {
                offset,
                value,
                is_write: false,
            };
            out.emit(&access, || format_access(&access))
        }
        Cmd::CfgWrite { offset, value } => {
            mailbox.port_mut().write32(offset, value)?;
            let access = RegisterAccess::write(offset, value);
            out.emit(&access, || format_access(&access))
        }
        Cmd::Discovery { index, all } => {
            let entries = if all {
                discovery::discover_all(mailbox).context("walking the discovery list")?
            } else {
                vec![discovery::discover(mailbox, index)
                    .with_context(|| format!("discovery index {index:#x}"))?]
            };
            out.emit(&entries, || {
                entries
                    .iter()
                    .map(|e| {
                        format!(
                            "[{:#04x}] vendor={:#06x} protocol={:#04x} next={:#04x}\n",
                            e.index, e.vendor_id, e.protocol, e.next_index
                        )
                    })
                    .collect()
            })
        }
        Cmd::CdatLength => {
            let length = cdat::cdat_length(mailbox).context("reading the CDAT length")?;
            out.emit(&length, || format!("CDAT length: {length} bytes\n"))
        }
        Cmd::Cdat { output } => {
            let table = cdat::read_cdat(mailbox).context("reading the CDAT")?;
            if let Some(path) = &output {
                std::fs::write(path, table.to_bytes())
                    .with_context(|| format!("writing {}", path.display()))?;
            }
            out.emit(&table, || {
                let mut text = format!(
                    "CDAT: {} pages, {} dwords, length {}\n",
                    table.pages,
                    table.dwords.len(),
                    table.length.map_or("unknown".to_string(), |l| l.to_string())
                );
                text.push_str(&dword_dump(&table.dwords));
                text
            })
        }
        Cmd::Compliance { code } => {
            let payload = compliance::compliance(mailbox, code)
                .with_context(|| format!("compliance request {code:#x}"))?;
            out.emit(&payload, || dword_dump(&payload))
        }
        Cmd::Cma { index } => {
            let probe = cma::probe(mailbox, index).context("CMA probe")?;
            out.emit(&probe, || {
                format!(
                    "response length {} status after abort {:#010x}\n{}",
                    probe.response.length,
                    probe.status_after_abort,
                    dword_dump(&probe.response.payload)
                )
            })
        }
        Cmd::Query | Cmd::Send { .. } => bail!("this command needs the memory device driver"),
    }
}

#[derive(Clone, Copy)]
struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize>(self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            print!("{}", text());
        }
        Ok(())
    }
}

/// Output buffer for commands with a variable or unknown output size.
const DEFAULT_OUT_SIZE: usize = 4096;

fn default_out_size(id: u32) -> usize {
    cxl_doe::command::by_id(id)
        .and_then(|c| c.size_out)
        .map_or(DEFAULT_OUT_SIZE, |size| size as usize)
}

fn size_label(size: i32) -> String {
    if size < 0 {
        "variable".to_string()
    } else {
        size.to_string()
    }
}

fn format_access(access: &RegisterAccess) -> String {
    let bytes: Vec<String> = access
        .value
        .to_le_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    format!(
        "CONFIG_{} [{:#06x}] {:#010x}  {}\n",
        if access.is_write { "WR" } else { "RD" },
        access.offset,
        access.value,
        bytes.join(" ")
    )
}

fn dword_dump(dwords: &[u32]) -> String {
    let mut text = String::new();
    for (i, chunk) in dwords.chunks(4).enumerate() {
        let line: Vec<String> = chunk.iter().map(|d| format!("{d:08x}")).collect();
        text.push_str(&format!("{:04x}: {}\n", i * 16, line.join(" ")));
    }
    text
}

fn hex_dump(bytes: &[u8]) -> String {
    let mut text = String::new();
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let line: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        text.push_str(&format!("{:04x}: {}\n", i * 16, line.join(" ")));
    }
    text
}
