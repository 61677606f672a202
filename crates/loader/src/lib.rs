// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{anyhow, bail, Context, Result};
use goblin::elf::header::EM_ARM;
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::Elf;
use m4sim_core::memory::ProgramImage;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// Loads `path` as an ELF if it carries the ELF magic, otherwise as a raw
/// image placed at `base`.
pub fn load_firmware(path: &Path, base: u32) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read firmware: {:?}", path))?;
    if buffer.starts_with(ELF_MAGIC) {
        load_elf_bytes(&buffer)
    } else {
        Ok(binary_image(buffer, base))
    }
}

pub fn load_elf(path: &Path) -> Result<ProgramImage> {
    let buffer = fs::read(path).with_context(|| format!("Failed to read ELF file: {:?}", path))?;
    load_elf_bytes(&buffer)
}

pub fn load_elf_bytes(buffer: &[u8]) -> Result<ProgramImage> {
    let elf = Elf::parse(buffer).context("Failed to parse ELF binary")?;

    if elf.header.e_machine != EM_ARM {
        bail!(
            "Unsupported ELF machine type {} (expected ARM)",
            elf.header.e_machine
        );
    }
    info!("ELF Entry Point: {:#x}", elf.entry);

    let entry = u32::try_from(elf.entry).context("ELF entry point exceeds 32 bits")?;
    let mut program_image = ProgramImage::new(entry);

    for ph in elf.program_headers.iter().filter(|ph| ph.p_type == PT_LOAD) {
        // Load address (LMA): initialised data lives in the code image
        let start_addr = u32::try_from(ph.p_paddr).context("Segment address exceeds 32 bits")?;
        let size = ph.p_filesz as usize;
        let offset = ph.p_offset as usize;

        if size == 0 {
            continue;
        }

        debug!(
            "Found Loadable Segment: Addr={:#x}, Size={} bytes, Offset={:#x}",
            start_addr, size, offset
        );

        let segment_data = buffer
            .get(offset..offset + size)
            .ok_or_else(|| anyhow!("Segment out of bounds in ELF file"))?;
        program_image.add_segment(start_addr, segment_data.to_vec());
    }

    if program_image.segments.is_empty() {
        warn!("No loadable segments found in ELF file");
    }

    Ok(program_image)
}

/// Loads a raw image at `base`. The entry point is taken from the reset
/// vector at `base + 4` when the image is long enough.
pub fn load_binary(path: &Path, base: u32) -> Result<ProgramImage> {
    let buffer =
        fs::read(path).with_context(|| format!("Failed to read binary file: {:?}", path))?;
    Ok(binary_image(buffer, base))
}

fn binary_image(buffer: Vec<u8>, base: u32) -> ProgramImage {
    let entry = buffer
        .get(4..8)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .unwrap_or(base);
    info!(
        "Raw image: {} bytes at {:#x}, entry {:#x}",
        buffer.len(),
        base,
        entry
    );
    let mut program_image = ProgramImage::new(entry);
    program_image.add_segment(base, buffer);
    program_image
}

#[cfg(test)]
mod tests {
    use super::*;
    use goblin::elf::header::EM_RISCV;

    /// A single-segment little-endian ELF32 executable.
    fn minimal_elf(machine: u16, entry: u32, paddr: u32, payload: &[u8]) -> Vec<u8> {
        let mut elf = Vec::new();
        elf.extend_from_slice(&[0x7F, b'E', b'L', b'F', 1, 1, 1, 0]);
        elf.extend_from_slice(&[0; 8]);
        elf.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        elf.extend_from_slice(&machine.to_le_bytes());
        elf.extend_from_slice(&1u32.to_le_bytes());
        elf.extend_from_slice(&entry.to_le_bytes());
        elf.extend_from_slice(&52u32.to_le_bytes()); // e_phoff
        elf.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
        elf.extend_from_slice(&0x0500_0000u32.to_le_bytes());
        elf.extend_from_slice(&52u16.to_le_bytes());
        elf.extend_from_slice(&32u16.to_le_bytes());
        elf.extend_from_slice(&1u16.to_le_bytes());
        elf.extend_from_slice(&40u16.to_le_bytes());
        elf.extend_from_slice(&0u16.to_le_bytes());
        elf.extend_from_slice(&0u16.to_le_bytes());

        // PT_LOAD, payload right after the program header
        elf.extend_from_slice(&1u32.to_le_bytes());
        elf.extend_from_slice(&84u32.to_le_bytes());
        elf.extend_from_slice(&paddr.to_le_bytes()); // p_vaddr
        elf.extend_from_slice(&paddr.to_le_bytes()); // p_paddr
        elf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        elf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        elf.extend_from_slice(&5u32.to_le_bytes());
        elf.extend_from_slice(&4u32.to_le_bytes());

        elf.extend_from_slice(payload);
        elf
    }

    #[test]
    fn test_load_elf_bytes_collects_segments() {
        let payload = [0x05, 0x20, 0x03, 0x30];
        let elf = minimal_elf(EM_ARM, 0x101, 0x100, &payload);
        let image = load_elf_bytes(&elf).unwrap();
        assert_eq!(image.entry_point, 0x101);
        assert_eq!(image.segments.len(), 1);
        assert_eq!(image.segments[0].start_addr, 0x100);
        assert_eq!(image.segments[0].data, payload);
    }

    #[test]
    fn test_load_elf_rejects_other_machines() {
        let elf = minimal_elf(EM_RISCV, 0x100, 0x100, &[0; 4]);
        let err = load_elf_bytes(&elf).unwrap_err();
        assert!(err.to_string().contains("expected ARM"));
    }

    #[test]
    fn test_load_elf_rejects_truncated_segment() {
        let mut elf = minimal_elf(EM_ARM, 0x100, 0x100, &[0; 8]);
        elf.truncate(elf.len() - 4);
        assert!(load_elf_bytes(&elf).is_err());
    }

    #[test]
    fn test_load_firmware_detects_raw_image() -> Result<()> {
        let path = std::env::temp_dir().join(format!("m4sim-raw-{}.bin", std::process::id()));
        let mut image = Vec::new();
        image.extend_from_slice(&0x2000_1000u32.to_le_bytes());
        image.extend_from_slice(&0x0000_0009u32.to_le_bytes());
        image.extend_from_slice(&[0x00, 0xBF]);
        fs::write(&path, &image)?;

        let loaded = load_firmware(&path, 0)?;
        fs::remove_file(&path)?;
        assert_eq!(loaded.entry_point, 9);
        assert_eq!(loaded.segments[0].start_addr, 0);
        assert_eq!(loaded.total_size(), 10);
        Ok(())
    }

    #[test]
    fn test_load_elf_from_file() -> Result<()> {
        let path = std::env::temp_dir().join(format!("m4sim-elf-{}.elf", std::process::id()));
        fs::write(&path, minimal_elf(EM_ARM, 0x201, 0x200, &[0xFE, 0xE7]))?;
        let loaded = load_firmware(&path, 0)?;
        let direct = load_elf(&path)?;
        fs::remove_file(&path)?;
        assert_eq!(loaded.entry_point, 0x201);
        assert_eq!(direct.segments[0].data, vec![0xFE, 0xE7]);
        Ok(())
    }

    #[test]
    fn test_short_binary_uses_base_as_entry() {
        let image = binary_image(vec![0x00, 0xBF], 0x800);
        assert_eq!(image.entry_point, 0x800);
    }
}
