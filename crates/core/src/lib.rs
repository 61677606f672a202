// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod config;
pub mod cpu;
pub mod decoder;
pub mod memory;
pub mod snapshot;


pub use config::CoreConfig;
pub use cpu::{Capabilities, CortexM, Extension, Flow, RunOutcome, StopReason};
pub use memory::{MemoryMap, ProgramImage};

/// Coarse classification of a [`Fault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FaultKind {
    Alignment,
    OutOfBounds,
    Unsupported,
    MalformedOperand,
    Arithmetic,
}

/// Everything that can stop a fetch-execute cycle.
///
/// A faulting cycle never commits architectural state: registers, flags,
/// memory and the program counter are left as they were before the fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    #[error("unaligned access at {addr:#010x} (requires {align}-byte alignment)")]
    Alignment { addr: u32, align: u32 },
    #[error("access outside mapped memory at {addr:#010x}")]
    OutOfBounds { addr: u32 },
    #[error("unsupported execution state at pc {pc:#010x}")]
    UnsupportedMode { pc: u32 },
    #[error("unsupported instruction {opcode:#010x} at pc {pc:#010x}")]
    Unsupported { opcode: u32, pc: u32 },
    #[error("malformed operand in {opcode:#010x} at pc {pc:#010x}: {reason}")]
    Malformed {
        opcode: u32,
        pc: u32,
        reason: &'static str,
    },
    #[error("division by zero in {opcode:#010x} at pc {pc:#010x}")]
    DivideByZero { opcode: u32, pc: u32 },
}

impl Fault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Fault::Alignment { .. } => FaultKind::Alignment,
            Fault::OutOfBounds { .. } => FaultKind::OutOfBounds,
            Fault::UnsupportedMode { .. } | Fault::Unsupported { .. } => FaultKind::Unsupported,
            Fault::Malformed { .. } => FaultKind::MalformedOperand,
            Fault::DivideByZero { .. } => FaultKind::Arithmetic,
        }
    }
}

pub type SimResult<T> = Result<T, Fault>;

/// Fails with [`Fault::Alignment`] unless `addr` is a multiple of `align`.
#[inline]
pub fn check_alignment(addr: u32, align: u32) -> SimResult<()> {
    if addr % align != 0 {
        return Err(Fault::Alignment { addr, align });
    }
    Ok(())
}

/// Trait representing the memory seen by the core.
///
/// Implementors provide range accessors that validate the whole range
/// before touching memory. The typed accessors enforce natural alignment
/// and little-endian byte order.
pub trait Bus {
    /// Instruction fetch; only resolves against executable memory.
    fn fetch_u16(&self, addr: u32) -> SimResult<u16>;
    fn read_bytes(&self, addr: u32, buf: &mut [u8]) -> SimResult<()>;
    fn write_bytes(&mut self, addr: u32, data: &[u8]) -> SimResult<()>;
    /// True if `addr` may be used as a fetch address.
    fn is_executable(&self, addr: u32) -> bool;

    fn read_u8(&self, addr: u32) -> SimResult<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(addr, &mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&self, addr: u32) -> SimResult<u16> {
        check_alignment(addr, 2)?;
        let mut buf = [0u8; 2];
        self.read_bytes(addr, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&self, addr: u32) -> SimResult<u32> {
        check_alignment(addr, 4)?;
        let mut buf = [0u8; 4];
        self.read_bytes(addr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn write_u8(&mut self, addr: u32, value: u8) -> SimResult<()> {
        self.write_bytes(addr, &[value])
    }

    fn write_u16(&mut self, addr: u32, value: u16) -> SimResult<()> {
        check_alignment(addr, 2)?;
        self.write_bytes(addr, &value.to_le_bytes())
    }

    fn write_u32(&mut self, addr: u32, value: u32) -> SimResult<()> {
        check_alignment(addr, 4)?;
        self.write_bytes(addr, &value.to_le_bytes())
    }
}
