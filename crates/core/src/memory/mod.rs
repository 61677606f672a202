// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{check_alignment, Bus, Fault, SimResult};
use anyhow::Context;
use m4sim_config::MachineConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start_addr: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramImage {
    pub entry_point: u32,
    pub segments: Vec<Segment>,
}

impl ProgramImage {
    pub fn new(entry_point: u32) -> Self {
        Self {
            entry_point,
            segments: Vec::new(),
        }
    }

    pub fn add_segment(&mut self, start_addr: u32, data: Vec<u8>) {
        self.segments.push(Segment { start_addr, data });
    }

    pub fn total_size(&self) -> usize {
        self.segments.iter().map(|s| s.data.len()).sum()
    }
}

/// A simple flat memory storage
#[derive(Debug, Clone)]
pub struct LinearMemory {
    pub data: Vec<u8>,
    pub base_addr: u32,
}

impl LinearMemory {
    pub fn new(size: usize, base_addr: u32) -> Self {
        Self {
            data: vec![0; size],
            base_addr,
        }
    }

    pub fn end_addr(&self) -> u64 {
        self.base_addr as u64 + self.data.len() as u64
    }

    /// True if `[addr, addr + len)` lies entirely inside this region.
    pub fn contains(&self, addr: u32, len: usize) -> bool {
        addr >= self.base_addr && addr as u64 + len as u64 <= self.end_addr()
    }

    pub fn slice(&self, addr: u32, len: usize) -> Option<&[u8]> {
        if !self.contains(addr, len) {
            return None;
        }
        let offset = (addr - self.base_addr) as usize;
        Some(&self.data[offset..offset + len])
    }

    pub fn slice_mut(&mut self, addr: u32, len: usize) -> Option<&mut [u8]> {
        if !self.contains(addr, len) {
            return None;
        }
        let offset = (addr - self.base_addr) as usize;
        Some(&mut self.data[offset..offset + len])
    }

    pub fn read_u8(&self, addr: u32) -> Option<u8> {
        self.slice(addr, 1).map(|s| s[0])
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> bool {
        match self.slice_mut(addr, 1) {
            Some(s) => {
                s[0] = value;
                true
            }
            None => false,
        }
    }

    pub fn load_from_segment(&mut self, segment: &Segment) -> bool {
        match self.slice_mut(segment.start_addr, segment.data.len()) {
            Some(dst) => {
                dst.copy_from_slice(&segment.data);
                true
            }
            None => false,
        }
    }
}

/// The two regions the core can reach: read-only code and read-write data.
///
/// Loads resolve against either region, stores only against data, and
/// instruction fetches only against code.
#[derive(Debug, Clone)]
pub struct MemoryMap {
    pub code: LinearMemory,
    pub data: LinearMemory,
}

impl MemoryMap {
    pub fn new(code: LinearMemory, data: LinearMemory) -> Self {
        Self { code, data }
    }

    pub fn from_config(config: &MachineConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let code_size = config.code.size_bytes()? as usize;
        let data_size = config.data.size_bytes()? as usize;
        let code_base = u32::try_from(config.code.base).context("code base exceeds 32 bits")?;
        let data_base = u32::try_from(config.data.base).context("data base exceeds 32 bits")?;

        tracing::info!(
            "Memory map: code {:#010x}+{:#x}, data {:#010x}+{:#x}",
            code_base,
            code_size,
            data_base,
            data_size
        );

        Ok(Self {
            code: LinearMemory::new(code_size, code_base),
            data: LinearMemory::new(data_size, data_base),
        })
    }

    /// Copies every segment of `image` into whichever region contains it.
    /// Fails on the first segment that fits in neither.
    pub fn load_image(&mut self, image: &ProgramImage) -> SimResult<()> {
        for segment in &image.segments {
            if segment.data.is_empty() {
                continue;
            }
            if !self.code.load_from_segment(segment) && !self.data.load_from_segment(segment) {
                tracing::warn!(
                    "Segment at {:#x} ({} bytes) is outside of the memory map",
                    segment.start_addr,
                    segment.data.len()
                );
                return Err(Fault::OutOfBounds {
                    addr: segment.start_addr,
                });
            }
            tracing::debug!(
                "Loaded segment at {:#x} ({} bytes)",
                segment.start_addr,
                segment.data.len()
            );
        }
        Ok(())
    }
}

impl Bus for MemoryMap {
    fn fetch_u16(&self, addr: u32) -> SimResult<u16> {
        check_alignment(addr, 2)?;
        let bytes = self.code.slice(addr, 2).ok_or(Fault::OutOfBounds { addr })?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_bytes(&self, addr: u32, buf: &mut [u8]) -> SimResult<()> {
        let src = self
            .code
            .slice(addr, buf.len())
            .or_else(|| self.data.slice(addr, buf.len()))
            .ok_or(Fault::OutOfBounds { addr })?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write_bytes(&mut self, addr: u32, data: &[u8]) -> SimResult<()> {
        let dst = self
            .data
            .slice_mut(addr, data.len())
            .ok_or(Fault::OutOfBounds { addr })?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn is_executable(&self, addr: u32) -> bool {
        self.code.contains(addr, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_map() -> MemoryMap {
        MemoryMap::new(
            LinearMemory::new(0x100, 0x0000_0000),
            LinearMemory::new(0x100, 0x2000_0000),
        )
    }

    #[test]
    fn test_memory_read_write() {
        let mut mem = LinearMemory::new(1024, 0x1000);

        assert!(mem.write_u8(0x1000, 42));
        assert!(mem.write_u8(0x13FF, 99)); // Last byte

        assert!(!mem.write_u8(0x0FFF, 1));
        assert!(!mem.write_u8(0x1400, 1));

        assert_eq!(mem.read_u8(0x1000), Some(42));
        assert_eq!(mem.read_u8(0x13FF), Some(99));
        assert_eq!(mem.read_u8(0x0FFF), None);
        assert_eq!(mem.read_u8(0x1400), None);
    }

    #[test]
    fn test_region_at_top_of_address_space() {
        let mem = LinearMemory::new(0x10, 0xFFFF_FFF0);
        assert!(mem.contains(0xFFFF_FFFC, 4));
        assert!(!mem.contains(0xFFFF_FFFE, 4));
    }

    #[test]
    fn test_load_from_segment() {
        let mut mem = LinearMemory::new(1024, 0x1000);

        let inside = Segment {
            start_addr: 0x1000,
            data: vec![1, 2, 3],
        };
        assert!(mem.load_from_segment(&inside));
        assert_eq!(mem.read_u8(0x1000), Some(1));

        // 0x13FE..0x1401 crosses the end
        let crossing = Segment {
            start_addr: 0x13FE,
            data: vec![10, 20, 30],
        };
        assert!(!mem.load_from_segment(&crossing));
        assert_eq!(mem.read_u8(0x13FF), Some(0));

        let exact = Segment {
            start_addr: 0x13FE,
            data: vec![0xAA, 0xBB],
        };
        assert!(mem.load_from_segment(&exact));
        assert_eq!(mem.read_u8(0x13FE), Some(0xAA));
        assert_eq!(mem.read_u8(0x13FF), Some(0xBB));
    }

    #[test]
    fn test_word_round_trip_little_endian() {
        let mut map = small_map();
        map.write_u32(0x2000_0010, 0xDEAD_BEEF).unwrap();
        assert_eq!(map.read_u32(0x2000_0010).unwrap(), 0xDEAD_BEEF);
        assert_eq!(map.read_u8(0x2000_0010).unwrap(), 0xEF);
        assert_eq!(map.read_u16(0x2000_0012).unwrap(), 0xDEAD);
    }

    #[test]
    fn test_alignment_is_checked_before_bounds() {
        let mut map = small_map();
        assert_eq!(
            map.read_u32(0x2000_0002),
            Err(Fault::Alignment {
                addr: 0x2000_0002,
                align: 4
            })
        );
        assert_eq!(
            map.write_u16(0x2000_0001, 1),
            Err(Fault::Alignment {
                addr: 0x2000_0001,
                align: 2
            })
        );
        // Byte accesses are never alignment checked
        map.write_u8(0x2000_0003, 7).unwrap();
        assert_eq!(map.read_u8(0x2000_0003).unwrap(), 7);
    }

    #[test]
    fn test_access_crossing_region_end_faults() {
        let mut map = small_map();
        assert_eq!(
            map.read_u32(0x2000_0100),
            Err(Fault::OutOfBounds { addr: 0x2000_0100 })
        );
        assert_eq!(
            map.write_u32(0x2000_00FC, 0x1122_3344),
            Ok(())
        );
        let mut buf = [0u8; 8];
        assert_eq!(
            map.read_bytes(0x2000_00FC, &mut buf),
            Err(Fault::OutOfBounds { addr: 0x2000_00FC })
        );
    }

    #[test]
    fn test_code_region_is_read_only() {
        let mut map = small_map();
        map.code.data[0x10..0x14].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(map.read_u32(0x10).unwrap(), 0x0403_0201);
        assert_eq!(map.write_u32(0x10, 0), Err(Fault::OutOfBounds { addr: 0x10 }));
        assert_eq!(map.read_u32(0x10).unwrap(), 0x0403_0201);
    }

    #[test]
    fn test_fetch_only_from_code() {
        let map = small_map();
        assert!(map.fetch_u16(0x0).is_ok());
        assert_eq!(
            map.fetch_u16(0x2000_0000),
            Err(Fault::OutOfBounds { addr: 0x2000_0000 })
        );
        assert!(map.is_executable(0xFE));
        assert!(!map.is_executable(0x100));
    }

    #[test]
    fn test_load_image_rejects_unmapped_segment() {
        let mut map = small_map();
        let mut image = ProgramImage::new(0x9);
        image.add_segment(0x0, vec![0x00, 0xBF]);
        image.add_segment(0x2000_0000, vec![0xAA; 4]);
        map.load_image(&image).unwrap();
        assert_eq!(map.fetch_u16(0x0).unwrap(), 0xBF00);
        assert_eq!(map.read_u32(0x2000_0000).unwrap(), 0xAAAA_AAAA);

        image.add_segment(0x1000_0000, vec![1]);
        assert_eq!(
            map.load_image(&image),
            Err(Fault::OutOfBounds { addr: 0x1000_0000 })
        );
    }

    #[test]
    fn test_from_config() {
        let map = MemoryMap::from_config(&MachineConfig::default()).unwrap();
        assert_eq!(map.code.data.len(), 256 * 1024);
        assert_eq!(map.data.base_addr, 0x2000_0000);
        assert_eq!(map.data.data.len(), 64 * 1024);
    }
}
