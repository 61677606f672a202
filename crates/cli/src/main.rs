// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use clap::Parser;
use m4sim_config::MachineConfig;
use m4sim_core::{Capabilities, CoreConfig, CortexM, MemoryMap, RunOutcome, StopReason};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn, Level};

const EXIT_PASS: u8 = 0;
const EXIT_FAULT: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

fn parse_u32_addr(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex address '{}': {}", s, e))
    } else {
        s.parse::<u32>()
            .map_err(|e| format!("invalid address '{}': {}", s, e))
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Cortex-M4 Thumb instruction-set simulator",
    long_about = None
)]
struct Cli {
    /// Path to the firmware image (ELF or raw binary)
    #[arg(short, long)]
    firmware: PathBuf,

    /// Machine description (YAML). Defaults to 256 KiB code at 0x0 and 64 KiB data at 0x20000000.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum number of instructions to execute
    #[arg(long, default_value_t = 1_000_000)]
    max_steps: u64,

    /// Override the entry point taken from the vector table
    #[arg(long, value_parser = parse_u32_addr)]
    entry: Option<u32>,

    /// Log every executed instruction
    #[arg(short, long)]
    trace: bool,

    /// Write the final register state as JSON
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.trace { Level::TRACE } else { Level::INFO })
        .init();

    let (mut cpu, mut bus) = match build_machine(&cli) {
        Ok(machine) => machine,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let config = CoreConfig {
        max_steps: cli.max_steps,
        trace_instructions: cli.trace,
        ..CoreConfig::default()
    };
    let outcome = cpu.run(&mut bus, &config);
    report(&cpu, &outcome);

    if let Some(path) = &cli.snapshot {
        if let Err(e) = write_snapshot(&cpu, path) {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    }

    match outcome.reason {
        StopReason::Fault(_) => ExitCode::from(EXIT_FAULT),
        _ => ExitCode::from(EXIT_PASS),
    }
}

fn build_machine(cli: &Cli) -> Result<(CortexM, MemoryMap)> {
    let machine = match &cli.config {
        Some(path) => MachineConfig::from_file(path)?,
        None => MachineConfig::default(),
    };
    let mut bus = MemoryMap::from_config(&machine)?;
    let code_base = bus.code.base_addr;

    let image = m4sim_loader::load_firmware(&cli.firmware, code_base)?;
    bus.load_image(&image)
        .with_context(|| format!("Failed to place {:?} in memory", cli.firmware))?;
    info!(
        "Loaded {} bytes in {} segment(s)",
        image.total_size(),
        image.segments.len()
    );

    let mut cpu = CortexM::with_capabilities(Capabilities::from(&machine.capabilities));
    cpu.vtor = code_base;
    cpu.reset(&bus);

    if cpu.pc() == 0 {
        warn!(
            "Reset vector is empty, starting at image entry {:#x}",
            image.entry_point
        );
        cpu.set_pc(image.entry_point);
    }
    if let Some(sp) = machine.initial_sp {
        cpu.set_sp(sp);
    }
    if let Some(entry) = cli.entry.or(machine.entry) {
        cpu.set_pc(entry);
    }

    Ok((cpu, bus))
}

fn report(cpu: &CortexM, outcome: &RunOutcome) {
    match &outcome.reason {
        StopReason::MaxStepsReached => {
            info!("Stopped after {} steps (step limit)", outcome.steps)
        }
        StopReason::SelfLoop(pc) => {
            info!("Reached self-loop at {:#010x} after {} steps", pc, outcome.steps)
        }
        StopReason::Fault(fault) => {
            error!("Fault after {} steps: {}", outcome.steps, fault)
        }
    }

    let names = cpu.get_register_names();
    for (name, value) in names.iter().zip(cpu.regs.iter()) {
        println!("{:>4} = {:#010x}", name, value);
    }
    println!("xPSR = {:#010x}", cpu.psr.to_xpsr());
}

fn write_snapshot(cpu: &CortexM, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create snapshot {:?}", path))?;
    serde_json::to_writer_pretty(file, &cpu.snapshot())
        .with_context(|| format!("Failed to write snapshot {:?}", path))?;
    info!("Snapshot written to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u32_addr() {
        assert_eq!(parse_u32_addr("0x100"), Ok(0x100));
        assert_eq!(parse_u32_addr("0X20000000"), Ok(0x2000_0000));
        assert_eq!(parse_u32_addr("256"), Ok(256));
        assert!(parse_u32_addr("0xZZ").is_err());
        assert!(parse_u32_addr("0x100000000").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["m4sim", "--firmware", "fw.bin"]);
        assert_eq!(cli.max_steps, 1_000_000);
        assert!(cli.config.is_none());
        assert!(!cli.trace);
        assert_eq!(cli.entry, None);
    }

    #[test]
    fn test_cli_entry_accepts_hex() {
        let cli = Cli::parse_from(["m4sim", "-f", "fw.bin", "--entry", "0x101", "-t"]);
        assert_eq!(cli.entry, Some(0x101));
        assert!(cli.trace);
    }
}
