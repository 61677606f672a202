// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! 32-bit instruction execution.

use super::flags::{shift, thumb_expand_imm, update_flags, FlagMask, OpKind};
use super::psr::Condition;
use super::{Capabilities, CortexM, Flow, LR, PC, SP};
use crate::decoder::thumb32::{Addressing, DpOp, ExclusiveSize, LongMulOp};
use crate::decoder::{decode_thumb_32, MemOp, Thumb32};
use crate::{check_alignment, Bus, Fault, SimResult};

/// Second operand of a data-processing op together with how the shifter
/// produced it, for the carry of logical ops.
struct Operand2 {
    value: u32,
    /// `(unshifted, kind, amount)`; `None` leaves C untouched.
    carry_source: Option<(u32, OpKind, u32)>,
}

impl CortexM {
    /// Executes one 32-bit instruction (`hw1 << 16 | hw2`) at the current PC.
    /// Nothing is committed if this returns an error.
    pub fn execute_extended(&mut self, bus: &mut dyn Bus, opcode: u32) -> SimResult<Flow> {
        self.opcode = opcode;
        let instruction = decode_thumb_32((opcode >> 16) as u16, opcode as u16);

        #[cfg(debug_assertions)]
        tracing::debug!(
            "PC={:#x}, Opcode={:#010x}, Instr={:?}",
            self.pc(),
            opcode,
            instruction
        );

        let pc = self.pc();

        match instruction {
            Thumb32::Bl { offset } => {
                let target = self.reg(PC).wrapping_add(offset as u32);
                let flow = self.branch_to(bus, target)?;
                self.set_reg(LR, pc.wrapping_add(4) | 1);
                Ok(flow)
            }
            Thumb32::Branch { offset } => {
                let target = self.reg(PC).wrapping_add(offset as u32);
                self.branch_to(bus, target)
            }
            Thumb32::BranchCond { cond, offset } => {
                if self.psr.in_it_block() {
                    return Err(self.malformed("conditional branch inside IT block"));
                }
                if !self.psr.condition_passed(Condition::from_bits(cond)) {
                    return Ok(Flow::Next);
                }
                let target = self.reg(PC).wrapping_add(offset as u32);
                self.branch_to(bus, target)
            }
            Thumb32::BlxImm => Err(self.unsupported()),
            Thumb32::NopW | Thumb32::Barrier | Thumb32::Preload => Ok(Flow::Next),
            Thumb32::Clrex => {
                self.exclusive_monitor = None;
                Ok(Flow::Next)
            }
            Thumb32::System | Thumb32::Undefined => Err(self.unsupported()),

            Thumb32::LoadMultiple {
                rn,
                registers,
                wback,
                db,
            } => {
                self.check_register_list(rn, registers, wback)?;
                let (start, end) = self.multiple_range(rn, registers, db);
                self.load_multiple(bus, start, registers, wback.then_some((rn, end)))
            }
            Thumb32::StoreMultiple {
                rn,
                registers,
                wback,
                db,
            } => {
                self.check_register_list(rn, registers, wback)?;
                if registers & (1 << PC) != 0 {
                    return Err(self.malformed("PC in store register list"));
                }
                let (start, end) = self.multiple_range(rn, registers, db);
                self.store_multiple(bus, start, registers)?;
                if wback {
                    self.set_reg(rn, end);
                }
                Ok(Flow::Next)
            }
            Thumb32::LoadStoreDual {
                load,
                rt,
                rt2,
                rn,
                imm,
                add,
                index,
                wback,
            } => self.load_store_dual(bus, load, rt, rt2, rn, imm, add, index, wback),
            Thumb32::LoadExclusive { size, rt, rn, imm } => {
                if rt == SP || rt == PC {
                    return Err(self.malformed("LDREX into SP or PC"));
                }
                let addr = self.reg(rn).wrapping_add(imm);
                let (load, _) = exclusive_ops(size);
                let value = self.load(bus, load, addr)?;
                self.set_reg(rt, value);
                self.exclusive_monitor = Some(addr);
                Ok(Flow::Next)
            }
            Thumb32::StoreExclusive {
                size,
                rd,
                rt,
                rn,
                imm,
            } => {
                if rd == rn || rd == rt {
                    return Err(self.malformed("STREX status register overlaps operand"));
                }
                let addr = self.reg(rn).wrapping_add(imm);
                let (load, store) = exclusive_ops(size);
                check_alignment(addr, load.size())?;
                let status = if self.exclusive_monitor == Some(addr) {
                    Self::store(bus, store, addr, self.reg(rt))?;
                    0
                } else {
                    1
                };
                self.exclusive_monitor = None;
                self.set_reg(rd, status);
                Ok(Flow::Next)
            }
            Thumb32::TableBranch { half, rn, rm } => {
                if rm == SP || rm == PC {
                    return Err(self.malformed("table branch index in SP or PC"));
                }
                let base = self.reg(rn);
                let index = self.reg(rm);
                let entry = if half {
                    bus.read_u16(base.wrapping_add(index << 1))? as u32
                } else {
                    bus.read_u8(base.wrapping_add(index))? as u32
                };
                let target = self.reg(PC).wrapping_add(entry << 1);
                self.branch_to(bus, target)
            }

            Thumb32::DataProcShifted {
                op,
                s,
                rd,
                rn,
                rm,
                shift: ty,
                amount,
            } => {
                let value = self.reg(rm);
                let amount = amount as u32;
                let operand = Operand2 {
                    value: shift(value, ty, amount, self.psr.c),
                    carry_source: Some((value, ty.into(), amount)),
                };
                self.data_processing(op, s, rd, rn, operand)
            }
            Thumb32::DataProcImm {
                op,
                s,
                rd,
                rn,
                imm12,
            } => {
                let (value, rotated) = thumb_expand_imm(imm12);
                let operand = Operand2 {
                    value,
                    carry_source: rotated.map(|(unrotated, rotation)| {
                        (unrotated, OpKind::Ror, rotation)
                    }),
                };
                self.data_processing(op, s, rd, rn, operand)
            }
            Thumb32::AddWide { sub, rd, rn, imm12 } => {
                self.check_destination(rd)?;
                let base = if rn == PC {
                    self.literal_base()
                } else {
                    self.reg(rn)
                };
                let result = if sub {
                    base.wrapping_sub(imm12 as u32)
                } else {
                    base.wrapping_add(imm12 as u32)
                };
                self.set_reg(rd, result);
                Ok(Flow::Next)
            }
            Thumb32::MovWide { top, rd, imm16 } => {
                self.check_destination(rd)?;
                let result = if top {
                    (self.reg(rd) & 0xFFFF) | ((imm16 as u32) << 16)
                } else {
                    imm16 as u32
                };
                self.set_reg(rd, result);
                Ok(Flow::Next)
            }
            Thumb32::Saturate {
                unsigned,
                rd,
                rn,
                sat_imm,
                shift: ty,
                amount,
            } => {
                self.check_destination(rd)?;
                let operand = shift(self.reg(rn), ty, amount as u32, self.psr.c);
                let (result, kind) = if unsigned {
                    (unsigned_saturate(operand as i32, sat_imm as u32), OpKind::Usat)
                } else {
                    (signed_saturate(operand as i32, sat_imm as u32 + 1), OpKind::Ssat)
                };
                self.set_reg(rd, result);
                update_flags(&mut self.psr, result, operand, 0, kind, 0, FlagMask::Q);
                Ok(Flow::Next)
            }
            Thumb32::BitfieldExtract {
                signed,
                rd,
                rn,
                lsb,
                widthm1,
            } => {
                let width = widthm1 as u32 + 1;
                let lsb = lsb as u32;
                if lsb + width > 32 {
                    return Err(self.malformed("bitfield extends past bit 31"));
                }
                let value = self.reg(rn) >> lsb;
                let result = if signed {
                    (((value << (32 - width)) as i32) >> (32 - width)) as u32
                } else {
                    value & low_mask(width)
                };
                self.set_reg(rd, result);
                Ok(Flow::Next)
            }
            Thumb32::Bfi { rd, rn, lsb, msb } => {
                let source = self.reg(rn);
                self.insert_bitfield(rd, source, lsb, msb)
            }
            Thumb32::Bfc { rd, lsb, msb } => self.insert_bitfield(rd, 0, lsb, msb),
            Thumb32::ShiftReg { ty, s, rd, rn, rm } => {
                self.check_destination(rd)?;
                let value = self.reg(rn);
                let amount = self.reg(rm) & 0xFF;
                let result = shift(value, ty, amount, self.psr.c);
                self.set_reg(rd, result);
                if s {
                    update_flags(&mut self.psr, result, value, 0, ty.into(), amount, FlagMask::NZC);
                }
                Ok(Flow::Next)
            }
            Thumb32::Extend {
                op,
                rd,
                rn,
                rm,
                rotation,
            } => {
                let mut result = op.apply(self.reg(rm).rotate_right(rotation as u32));
                if rn != PC {
                    result = result.wrapping_add(self.reg(rn));
                }
                self.set_reg(rd, result);
                Ok(Flow::Next)
            }
            Thumb32::Reverse { op, rd, rm } => {
                let result = op.apply(self.reg(rm));
                self.set_reg(rd, result);
                Ok(Flow::Next)
            }

            Thumb32::LoadStore {
                op,
                rt,
                rn,
                addressing,
            } => self.load_store(bus, op, rt, rn, addressing),
            Thumb32::LoadLiteral { op, rt, imm, add } => {
                let base = self.literal_base();
                let addr = if add {
                    base.wrapping_add(imm)
                } else {
                    base.wrapping_sub(imm)
                };
                let value = self.load(bus, op, addr)?;
                if rt == PC {
                    return self.branch_to(bus, value & !1);
                }
                self.set_reg(rt, value);
                Ok(Flow::Next)
            }

            Thumb32::Mul { rd, rn, rm } => {
                let result = self.reg(rn).wrapping_mul(self.reg(rm));
                self.set_reg(rd, result);
                Ok(Flow::Next)
            }
            Thumb32::Mla { rd, rn, rm, ra } => {
                let result = self
                    .reg(rn)
                    .wrapping_mul(self.reg(rm))
                    .wrapping_add(self.reg(ra));
                self.set_reg(rd, result);
                Ok(Flow::Next)
            }
            Thumb32::Mls { rd, rn, rm, ra } => {
                let result = self
                    .reg(ra)
                    .wrapping_sub(self.reg(rn).wrapping_mul(self.reg(rm)));
                self.set_reg(rd, result);
                Ok(Flow::Next)
            }
            Thumb32::LongMultiply {
                op,
                rdlo,
                rdhi,
                rn,
                rm,
            } => {
                if rdlo == rdhi {
                    return Err(self.malformed("RdLo and RdHi are the same register"));
                }
                let (a, b) = (self.reg(rn), self.reg(rm));
                let acc = ((self.reg(rdhi) as u64) << 32) | self.reg(rdlo) as u64;
                let result = match op {
                    LongMulOp::Smull => (a as i32 as i64).wrapping_mul(b as i32 as i64) as u64,
                    LongMulOp::Umull => (a as u64).wrapping_mul(b as u64),
                    LongMulOp::Smlal => (a as i32 as i64)
                        .wrapping_mul(b as i32 as i64)
                        .wrapping_add(acc as i64) as u64,
                    LongMulOp::Umlal => (a as u64).wrapping_mul(b as u64).wrapping_add(acc),
                };
                self.set_reg(rdlo, result as u32);
                self.set_reg(rdhi, (result >> 32) as u32);
                Ok(Flow::Next)
            }
            Thumb32::Divide {
                signed,
                rd,
                rn,
                rm,
            } => {
                let (dividend, divisor) = (self.reg(rn), self.reg(rm));
                if divisor == 0 {
                    return Err(Fault::DivideByZero { opcode, pc });
                }
                let result = if signed {
                    (dividend as i32).wrapping_div(divisor as i32) as u32
                } else {
                    dividend / divisor
                };
                self.set_reg(rd, result);
                Ok(Flow::Next)
            }

            Thumb32::Coprocessor => self.dispatch_extension(bus, Capabilities::FPU, opcode),
            Thumb32::Dsp => self.dispatch_extension(bus, Capabilities::DSP, opcode),
        }
    }

    fn data_processing(
        &mut self,
        op: DpOp,
        s: bool,
        rd: u8,
        rn: u8,
        operand: Operand2,
    ) -> SimResult<Flow> {
        if !op.is_test() {
            self.check_destination(rd)?;
        }
        let a = self.reg(rn);
        let b = operand.value;
        let carry = self.psr.c;

        let (result, kind) = match op {
            DpOp::And | DpOp::Tst => (a & b, OpKind::And),
            DpOp::Bic => (a & !b, OpKind::Bic),
            DpOp::Orr => (a | b, OpKind::Orr),
            DpOp::Mov => (b, OpKind::Mov),
            DpOp::Orn => (a | !b, OpKind::Orn),
            DpOp::Mvn => (!b, OpKind::Mvn),
            DpOp::Eor | DpOp::Teq => (a ^ b, OpKind::Eor),
            DpOp::Add => (a.wrapping_add(b), OpKind::Add),
            DpOp::Cmn => (a.wrapping_add(b), OpKind::Cmn),
            DpOp::Adc => (a.wrapping_add(b).wrapping_add(carry as u32), OpKind::Adc),
            DpOp::Sbc => (a.wrapping_sub(b).wrapping_sub(!carry as u32), OpKind::Sbc),
            DpOp::Sub => (a.wrapping_sub(b), OpKind::Sub),
            DpOp::Cmp => (a.wrapping_sub(b), OpKind::Cmp),
            DpOp::Rsb => (b.wrapping_sub(a), OpKind::Rsb),
        };

        if !op.is_test() {
            self.set_reg(rd, result);
        }
        if s {
            if op.is_logical() {
                if let Some((unshifted, shift_kind, amount)) = operand.carry_source {
                    update_flags(
                        &mut self.psr,
                        result,
                        unshifted,
                        0,
                        shift_kind,
                        amount,
                        FlagMask::C,
                    );
                }
                update_flags(&mut self.psr, result, a, b, kind, 0, FlagMask::NZ);
            } else {
                update_flags(&mut self.psr, result, a, b, kind, 0, FlagMask::NZCV);
            }
        }
        Ok(Flow::Next)
    }

    fn load_store(
        &mut self,
        bus: &mut dyn Bus,
        op: MemOp,
        rt: u8,
        rn: u8,
        addressing: Addressing,
    ) -> SimResult<Flow> {
        let base = self.reg(rn);
        let (addr, writeback) = match addressing {
            Addressing::Immediate {
                imm,
                add,
                index,
                wback,
            } => {
                let offset_addr = if add {
                    base.wrapping_add(imm)
                } else {
                    base.wrapping_sub(imm)
                };
                let addr = if index { offset_addr } else { base };
                (addr, wback.then_some(offset_addr))
            }
            Addressing::Register { rm, shift } => {
                if rm == SP || rm == PC {
                    return Err(self.malformed("offset register is SP or PC"));
                }
                (base.wrapping_add(self.reg(rm) << shift), None)
            }
        };
        if writeback.is_some() && rn == rt {
            return Err(self.malformed("writeback with Rn == Rt"));
        }

        if op.is_load() {
            let value = self.load(bus, op, addr)?;
            if rt == PC {
                let target = value & !1;
                self.check_last_in_it()?;
                self.check_target(bus, target)?;
                if let Some(new_base) = writeback {
                    self.set_reg(rn, new_base);
                }
                self.regs[PC as usize] = target;
                return Ok(Flow::Branch);
            }
            if let Some(new_base) = writeback {
                self.set_reg(rn, new_base);
            }
            self.set_reg(rt, value);
        } else {
            if rt == PC {
                return Err(self.malformed("store of PC"));
            }
            Self::store(bus, op, addr, self.reg(rt))?;
            if let Some(new_base) = writeback {
                self.set_reg(rn, new_base);
            }
        }
        Ok(Flow::Next)
    }

    #[allow(clippy::too_many_arguments)]
    fn load_store_dual(
        &mut self,
        bus: &mut dyn Bus,
        load: bool,
        rt: u8,
        rt2: u8,
        rn: u8,
        imm: u32,
        add: bool,
        index: bool,
        wback: bool,
    ) -> SimResult<Flow> {
        if [rt, rt2].iter().any(|&r| r == SP || r == PC) {
            return Err(self.malformed("LDRD/STRD transfer register is SP or PC"));
        }
        if wback && (rn == rt || rn == rt2 || rn == PC) {
            return Err(self.malformed("writeback base overlaps transfer registers"));
        }
        if load && rt == rt2 {
            return Err(self.malformed("LDRD with Rt == Rt2"));
        }

        let base = if rn == PC {
            self.literal_base()
        } else {
            self.reg(rn)
        };
        let offset_addr = if add {
            base.wrapping_add(imm)
        } else {
            base.wrapping_sub(imm)
        };
        let addr = if index { offset_addr } else { base };

        if load {
            let words = Self::read_words(bus, addr, 2)?;
            self.set_reg(rt, words[0]);
            self.set_reg(rt2, words[1]);
        } else {
            Self::write_words(bus, addr, &[self.reg(rt), self.reg(rt2)])?;
        }
        if wback {
            self.set_reg(rn, offset_addr);
        }
        Ok(Flow::Next)
    }

    fn insert_bitfield(&mut self, rd: u8, source: u32, lsb: u8, msb: u8) -> SimResult<Flow> {
        if msb < lsb {
            return Err(self.malformed("bitfield msb below lsb"));
        }
        let width = (msb - lsb) as u32 + 1;
        let mask = low_mask(width) << lsb;
        let result = (self.reg(rd) & !mask) | ((source << lsb) & mask);
        self.set_reg(rd, result);
        Ok(Flow::Next)
    }

    fn check_register_list(&self, rn: u8, registers: u16, wback: bool) -> SimResult<()> {
        if registers == 0 {
            return Err(self.malformed("empty register list"));
        }
        if registers & (1 << SP) != 0 {
            return Err(self.malformed("SP in register list"));
        }
        if wback && registers & (1 << rn) != 0 {
            return Err(self.malformed("writeback base in register list"));
        }
        Ok(())
    }

    /// `(lowest address, written-back base)` for an LDM/STM.
    fn multiple_range(&self, rn: u8, registers: u16, db: bool) -> (u32, u32) {
        let base = self.reg(rn);
        let size = 4 * registers.count_ones();
        if db {
            let start = base.wrapping_sub(size);
            (start, start)
        } else {
            (base, base.wrapping_add(size))
        }
    }

    fn check_destination(&self, rd: u8) -> SimResult<()> {
        if rd == PC {
            return Err(self.malformed("PC as destination"));
        }
        Ok(())
    }
}

fn exclusive_ops(size: ExclusiveSize) -> (MemOp, MemOp) {
    match size {
        ExclusiveSize::Byte => (MemOp::Ldrb, MemOp::Strb),
        ExclusiveSize::Half => (MemOp::Ldrh, MemOp::Strh),
        ExclusiveSize::Word => (MemOp::Ldr, MemOp::Str),
    }
}

#[inline(always)]
fn low_mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// SignedSatQ to `bits` (1..=32).
fn signed_saturate(value: i32, bits: u32) -> u32 {
    let max = (1i64 << (bits - 1)) - 1;
    let min = -(1i64 << (bits - 1));
    (value as i64).clamp(min, max) as i32 as u32
}

/// UnsignedSatQ to `bits` (0..=31).
fn unsigned_saturate(value: i32, bits: u32) -> u32 {
    let max = (1i64 << bits) - 1;
    (value as i64).clamp(0, max) as u32
}
