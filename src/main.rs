use std::process::exit;

use anyhow::{bail, Context, Result};
use clap::Parser;

use mcp2221_rs::{config, logging, BridgeConfig, Mcp2221};

#[derive(Parser, Debug)]
#[command(
    name = "mcp2221-probe",
    about = "Write to and/or read from an I2C node through an MCP2221"
)]
struct Args {
    /// 7-bit node address, decimal or 0x-prefixed hex (e.g., 0x18)
    #[arg(value_parser = parse_u8)]
    address: u8,
    /// Bytes to write, decimal or 0x-prefixed hex (e.g., 5 or 0x05)
    #[arg(short, long, num_args = 1.., value_parser = parse_u8)]
    write: Vec<u8>,
    /// Number of bytes to read
    #[arg(short, long)]
    read: Option<usize>,
    /// USB vendor ID (defaults to MCP2221_VID or 0x04D8)
    #[arg(long, value_parser = parse_u16)]
    vid: Option<u16>,
    /// USB product ID (defaults to MCP2221_PID or 0x00DD)
    #[arg(long, value_parser = parse_u16)]
    pid: Option<u16>,
}

fn parse_u8(s: &str) -> std::result::Result<u8, String> {
    config::parse_u8(s)
        .ok_or_else(|| format!("{s:?} is not a byte (decimal or 0x-prefixed hex)"))
}

fn parse_u16(s: &str) -> std::result::Result<u16, String> {
    config::parse_u16(s)
        .ok_or_else(|| format!("{s:?} is not a 16-bit value (decimal or 0x-prefixed hex)"))
}

fn main() {
    logging::init_rust_logging();
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let config = BridgeConfig::from_env().overlay(args.vid, args.pid, None);

    let mut bridge = Mcp2221::open(args.address, config).context("Failed to open MCP2221")?;
    println!("Node {:#04x}", bridge.address().value());

    match (args.write.is_empty(), args.read) {
        (true, None) => bail!("nothing to do: pass --write and/or --read"),
        (false, None) => {
            bridge.write(&args.write).context("write failed")?;
            println!("Wrote {:02X?}", args.write);
        }
        (true, Some(count)) => {
            let data = bridge.read(count).context("read failed")?;
            println!("Read {:02X?}", data);
        }
        (false, Some(count)) => {
            let data = bridge
                .write_and_read(&args.write, count)
                .context("write-then-read failed")?;
            println!("Wrote {:02X?}, read {:02X?}", args.write, data);
        }
    }
    Ok(())
}
