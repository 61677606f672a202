// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod compact;
pub mod extended;
pub mod flags;
pub mod psr;

pub use flags::{update_flags, FlagMask, OpKind};
pub use psr::{Condition, Psr};

use crate::config::CoreConfig;
use crate::decoder::{is_32bit, MemOp};
use crate::snapshot::CpuSnapshot;
use crate::{check_alignment, Bus, Fault, SimResult};
use bitflags::bitflags;
use m4sim_config::CapabilityConfig;

pub const SP: u8 = 13;
pub const LR: u8 = 14;
pub const PC: u8 = 15;

/// Exception raised through the hook when the FPU reports an invalid
/// operation (UsageFault).
pub const FP_INVALID_OPERATION_EXCEPTION: u32 = 6;

bitflags! {
    /// Optional execution units present on the core.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capabilities: u8 {
        const FPU = 0x01;
        const DSP = 0x02;
    }
}

impl From<&CapabilityConfig> for Capabilities {
    fn from(config: &CapabilityConfig) -> Self {
        let mut caps = Capabilities::empty();
        caps.set(Capabilities::FPU, config.fpu);
        caps.set(Capabilities::DSP, config.dsp);
        caps
    }
}

/// How an instruction left the program counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Fall through; the loop advances PC by the instruction width.
    Next,
    /// PC already holds the validated target.
    Branch,
}

/// An execution unit the core hands encodings it does not model itself
/// (floating point, packed SIMD and saturating arithmetic).
pub trait Extension: std::fmt::Debug + Send {
    fn name(&self) -> &'static str;
    fn execute(&mut self, cpu: &mut CortexM, bus: &mut dyn Bus, opcode: u32) -> SimResult<Flow>;
}

pub struct ExceptionHook(Box<dyn FnMut(u32) + Send>);

impl std::fmt::Debug for ExceptionHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExceptionHook")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    MaxStepsReached,
    /// The core reached a branch to itself.
    SelfLoop(u32),
    Fault(Fault),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub steps: u64,
    pub reason: StopReason,
}

#[derive(Debug)]
pub struct CortexM {
    /// r0-r12, SP, LR, PC. PC holds the address of the instruction being fetched.
    pub regs: [u32; 16],
    pub psr: Psr,
    /// Last fetched instruction; 32-bit encodings are `hw1 << 16 | hw2`.
    pub opcode: u32,
    /// Sticky fault. Once set the core refuses to execute until `clear_fault`.
    pub error: Option<Fault>,
    pub capabilities: Capabilities,
    pub interrupts_enabled: bool,
    /// Vector table base used by `reset`.
    pub vtor: u32,
    pub(crate) exclusive_monitor: Option<u32>,
    fpu: Option<Box<dyn Extension>>,
    dsp: Option<Box<dyn Extension>>,
    exception_hook: Option<ExceptionHook>,
}

impl Default for CortexM {
    fn default() -> Self {
        Self {
            regs: [0; 16],
            psr: Psr::thumb(),
            opcode: 0,
            error: None,
            capabilities: Capabilities::empty(),
            interrupts_enabled: false,
            vtor: 0,
            exclusive_monitor: None,
            fpu: None,
            dsp: None,
            exception_hook: None,
        }
    }
}

impl CortexM {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    pub fn pc(&self) -> u32 {
        self.regs[PC as usize]
    }

    pub fn set_pc(&mut self, val: u32) {
        self.regs[PC as usize] = val & !1;
    }

    pub fn sp(&self) -> u32 {
        self.regs[SP as usize]
    }

    pub fn set_sp(&mut self, val: u32) {
        self.regs[SP as usize] = val & !3;
    }

    /// Operand read. PC reads as the fetch address plus 4.
    #[inline(always)]
    pub fn reg(&self, n: u8) -> u32 {
        if n == PC {
            self.pc().wrapping_add(4)
        } else {
            self.regs[n as usize]
        }
    }

    #[inline(always)]
    pub fn set_reg(&mut self, n: u8, val: u32) {
        self.regs[n as usize] = val;
    }

    /// `Align(PC, 4)` as seen by literal loads and ADR.
    #[inline(always)]
    pub(crate) fn literal_base(&self) -> u32 {
        self.reg(PC) & !3
    }

    /// Address tagged by the last LDREX, if the monitor is open.
    pub fn exclusive_monitor(&self) -> Option<u32> {
        self.exclusive_monitor
    }

    pub fn clear_fault(&mut self) {
        self.error = None;
    }

    pub fn install_fpu(&mut self, unit: Box<dyn Extension>) {
        self.fpu = Some(unit);
    }

    pub fn install_dsp(&mut self, unit: Box<dyn Extension>) {
        self.dsp = Some(unit);
    }

    pub fn set_exception_hook(&mut self, hook: Box<dyn FnMut(u32) + Send>) {
        self.exception_hook = Some(ExceptionHook(hook));
    }

    /// Called by the FPU unit on an invalid operation. Only reaches the hook
    /// while interrupts are enabled.
    pub fn signal_fp_invalid_operation(&mut self) -> bool {
        if !self.interrupts_enabled {
            return false;
        }
        match self.exception_hook.as_mut() {
            Some(ExceptionHook(hook)) => {
                tracing::debug!(
                    "Raising exception {} from FP invalid operation",
                    FP_INVALID_OPERATION_EXCEPTION
                );
                hook(FP_INVALID_OPERATION_EXCEPTION);
                true
            }
            None => false,
        }
    }

    pub(crate) fn unsupported(&self) -> Fault {
        Fault::Unsupported {
            opcode: self.opcode,
            pc: self.pc(),
        }
    }

    pub(crate) fn malformed(&self, reason: &'static str) -> Fault {
        Fault::Malformed {
            opcode: self.opcode,
            pc: self.pc(),
            reason,
        }
    }

    /// Resets architectural state and loads SP and PC from the vector table.
    pub fn reset(&mut self, bus: &dyn Bus) {
        self.regs = [0; 16];
        self.psr = Psr::thumb();
        self.opcode = 0;
        self.error = None;
        self.exclusive_monitor = None;

        match bus.read_u32(self.vtor) {
            Ok(sp) => self.set_sp(sp),
            Err(e) => tracing::warn!("No initial SP in vector table: {}", e),
        }
        match bus.read_u32(self.vtor.wrapping_add(4)) {
            Ok(pc) => self.set_pc(pc),
            Err(e) => tracing::warn!("No reset vector in vector table: {}", e),
        }
        tracing::info!("Reset: SP={:#010x}, PC={:#010x}", self.sp(), self.pc());
    }

    /// Runs one fetch-execute cycle.
    pub fn step(&mut self, bus: &mut dyn Bus) -> SimResult<()> {
        if let Some(fault) = &self.error {
            return Err(fault.clone());
        }
        match self.cycle(bus) {
            Ok(()) => Ok(()),
            Err(fault) => {
                tracing::warn!(
                    "Fault at PC={:#010x}, opcode={:#010x}: {}",
                    self.pc(),
                    self.opcode,
                    fault
                );
                self.error = Some(fault.clone());
                Err(fault)
            }
        }
    }

    fn cycle(&mut self, bus: &mut dyn Bus) -> SimResult<()> {
        let pc = self.pc();
        check_alignment(pc, 2)?;
        if !bus.is_executable(pc) {
            return Err(Fault::OutOfBounds { addr: pc });
        }
        if !self.psr.t {
            return Err(Fault::UnsupportedMode { pc });
        }

        let hw1 = bus.fetch_u16(pc)?;
        let (opcode, width) = if is_32bit(hw1) {
            let hw2 = bus.fetch_u16(pc.wrapping_add(2))?;
            (((hw1 as u32) << 16) | hw2 as u32, 4)
        } else {
            (hw1 as u32, 2)
        };

        let in_it = self.psr.in_it_block();
        if in_it && !self.psr.condition_passed(self.psr.it_condition()) {
            #[cfg(debug_assertions)]
            tracing::debug!("PC={:#x}, Opcode={:#x} skipped (IT)", pc, opcode);
            self.opcode = opcode;
            self.psr.it_advance();
            self.regs[PC as usize] = pc.wrapping_add(width);
            return Ok(());
        }

        let flow = if width == 4 {
            self.execute_extended(bus, opcode)?
        } else {
            self.execute_compact(bus, hw1)?
        };

        if in_it {
            self.psr.it_advance();
        }
        match flow {
            Flow::Next => self.regs[PC as usize] = pc.wrapping_add(width),
            Flow::Branch => self.psr.it = 0,
        }
        Ok(())
    }

    /// Steps until a fault, a branch-to-self, or `config.max_steps`.
    pub fn run(&mut self, bus: &mut dyn Bus, config: &CoreConfig) -> RunOutcome {
        let mut steps = 0;
        while steps < config.max_steps {
            let pc = self.pc();
            if let Err(fault) = self.step(bus) {
                return RunOutcome {
                    steps,
                    reason: StopReason::Fault(fault),
                };
            }
            steps += 1;
            if config.trace_instructions {
                tracing::trace!("{:#010x}: {:#010x}", pc, self.opcode);
            }
            if config.stop_on_self_loop && self.pc() == pc {
                tracing::info!("Branch to self at {:#010x} after {} steps", pc, steps);
                return RunOutcome {
                    steps,
                    reason: StopReason::SelfLoop(pc),
                };
            }
        }
        RunOutcome {
            steps,
            reason: StopReason::MaxStepsReached,
        }
    }

    /// Validates a branch target and commits it to PC. Bit 0 must already
    /// be stripped by the caller.
    pub(crate) fn branch_to(&mut self, bus: &dyn Bus, target: u32) -> SimResult<Flow> {
        self.check_last_in_it()?;
        self.check_target(bus, target)?;
        self.regs[PC as usize] = target;
        Ok(Flow::Branch)
    }

    /// Any write to PC inside an IT block must come from its last instruction.
    pub(crate) fn check_last_in_it(&self) -> SimResult<()> {
        if self.psr.in_it_block() && !self.psr.last_in_it_block() {
            return Err(self.malformed("branch not last in IT block"));
        }
        Ok(())
    }

    pub(crate) fn check_target(&self, bus: &dyn Bus, target: u32) -> SimResult<()> {
        check_alignment(target, 2)?;
        if !bus.is_executable(target) {
            return Err(Fault::OutOfBounds { addr: target });
        }
        Ok(())
    }

    /// Interworking branch target (BX, BLX): bit 0 selects Thumb state,
    /// which is the only one supported.
    pub(crate) fn interworking_target(&self, target: u32) -> SimResult<u32> {
        if target & 1 == 0 {
            return Err(Fault::UnsupportedMode { pc: self.pc() });
        }
        Ok(target & !1)
    }

    pub(crate) fn load(&self, bus: &dyn Bus, op: MemOp, addr: u32) -> SimResult<u32> {
        Ok(match op {
            MemOp::Ldr => bus.read_u32(addr)?,
            MemOp::Ldrh => bus.read_u16(addr)? as u32,
            MemOp::Ldrsh => bus.read_u16(addr)? as i16 as i32 as u32,
            MemOp::Ldrb => bus.read_u8(addr)? as u32,
            MemOp::Ldrsb => bus.read_u8(addr)? as i8 as i32 as u32,
            MemOp::Str | MemOp::Strh | MemOp::Strb => unreachable!("store op passed to load"),
        })
    }

    pub(crate) fn store(bus: &mut dyn Bus, op: MemOp, addr: u32, value: u32) -> SimResult<()> {
        match op {
            MemOp::Str => bus.write_u32(addr, value),
            MemOp::Strh => bus.write_u16(addr, value as u16),
            MemOp::Strb => bus.write_u8(addr, value as u8),
            _ => unreachable!("load op passed to store"),
        }
    }

    /// Reads `count` consecutive words starting at `addr` as one access.
    pub(crate) fn read_words(bus: &dyn Bus, addr: u32, count: usize) -> SimResult<Vec<u32>> {
        check_alignment(addr, 4)?;
        let mut buf = vec![0u8; count * 4];
        bus.read_bytes(addr, &mut buf)?;
        Ok(buf
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect())
    }

    /// Writes `values` to consecutive words starting at `addr` as one access.
    pub(crate) fn write_words(bus: &mut dyn Bus, addr: u32, values: &[u32]) -> SimResult<()> {
        check_alignment(addr, 4)?;
        let buf: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        bus.write_bytes(addr, &buf)
    }

    /// Loads the registers in `registers` (ascending, lowest address first)
    /// from `start`, then commits them together with the optional base
    /// writeback. A loaded PC becomes a branch with bit 0 cleared.
    pub(crate) fn load_multiple(
        &mut self,
        bus: &dyn Bus,
        start: u32,
        registers: u16,
        writeback: Option<(u8, u32)>,
    ) -> SimResult<Flow> {
        let values = Self::read_words(bus, start, registers.count_ones() as usize)?;
        let loaded: Vec<(u8, u32)> = (0..16u8)
            .filter(|r| registers & (1 << r) != 0)
            .zip(values)
            .collect();

        let new_pc = match loaded.last() {
            Some(&(PC, value)) => {
                self.check_last_in_it()?;
                let target = value & !1;
                self.check_target(bus, target)?;
                Some(target)
            }
            _ => None,
        };

        if let Some((rn, addr)) = writeback {
            self.set_reg(rn, addr);
        }
        for &(r, value) in loaded.iter().filter(|(r, _)| *r != PC) {
            self.set_reg(r, value);
        }
        match new_pc {
            Some(target) => {
                self.regs[PC as usize] = target;
                Ok(Flow::Branch)
            }
            None => Ok(Flow::Next),
        }
    }

    /// Stores the registers in `registers` (ascending, lowest address first)
    /// at `start` in a single checked write.
    pub(crate) fn store_multiple(
        &self,
        bus: &mut dyn Bus,
        start: u32,
        registers: u16,
    ) -> SimResult<()> {
        let values: Vec<u32> = (0..16u8)
            .filter(|r| registers & (1 << r) != 0)
            .map(|r| self.reg(r))
            .collect();
        Self::write_words(bus, start, &values)
    }

    /// Hands `opcode` to an installed extension unit, or faults if the unit
    /// is absent or disabled.
    pub(crate) fn dispatch_extension(
        &mut self,
        bus: &mut dyn Bus,
        unit: Capabilities,
        opcode: u32,
    ) -> SimResult<Flow> {
        if !self.capabilities.contains(unit) {
            return Err(self.unsupported());
        }
        let slot = if unit == Capabilities::FPU {
            self.fpu.take()
        } else {
            self.dsp.take()
        };
        let Some(mut ext) = slot else {
            return Err(self.unsupported());
        };

        tracing::trace!("Dispatching {:#010x} to {}", opcode, ext.name());
        let result = ext.execute(self, bus, opcode);

        if unit == Capabilities::FPU {
            self.fpu = Some(ext);
        } else {
            self.dsp = Some(ext);
        }
        result
    }

    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            registers: self.regs.to_vec(),
            xpsr: self.psr.to_xpsr(),
            opcode: self.opcode,
            fault: self.error.as_ref().map(|f| f.to_string()),
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &CpuSnapshot) {
        for (dst, src) in self.regs.iter_mut().zip(snapshot.registers.iter()) {
            *dst = *src;
        }
        self.regs[PC as usize] &= !1;
        self.psr = Psr::from_xpsr(snapshot.xpsr);
        self.opcode = snapshot.opcode;
    }

    pub fn get_register_names(&self) -> Vec<String> {
        let mut names: Vec<String> = (0..13).map(|i| format!("R{}", i)).collect();
        names.push("SP".to_string());
        names.push("LR".to_string());
        names.push("PC".to_string());
        names
    }
}
