// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! 16-bit instruction execution.

use super::flags::{shift, update_flags, FlagMask, OpKind};
use super::psr::Condition;
use super::{CortexM, Flow, LR, PC, SP};
use crate::decoder::thumb16::{AluOp, Hint};
use crate::decoder::{decode_thumb_16, sign_extend, MemOp, ShiftType, Thumb16};
use crate::{Bus, SimResult};

impl CortexM {
    /// Executes one 16-bit instruction at the current PC. Nothing is
    /// committed if this returns an error.
    pub fn execute_compact(&mut self, bus: &mut dyn Bus, opcode: u16) -> SimResult<Flow> {
        self.opcode = opcode as u32;
        let instruction = decode_thumb_16(opcode);

        #[cfg(debug_assertions)]
        tracing::debug!(
            "PC={:#x}, Opcode={:#06x}, Instr={:?}",
            self.pc(),
            opcode,
            instruction
        );

        // Flag-setting encodings leave the flags alone inside an IT block
        let set_flags = !self.psr.in_it_block();
        let pc = self.pc();

        match instruction {
            Thumb16::ShiftImm { ty, rd, rm, imm5 } => {
                let value = self.reg(rm);
                let amount = match (ty, imm5) {
                    (ShiftType::Lsr | ShiftType::Asr, 0) => 32,
                    (_, n) => n as u32,
                };
                let result = shift(value, ty, amount, self.psr.c);
                self.set_reg(rd, result);
                if set_flags {
                    update_flags(&mut self.psr, result, value, 0, ty.into(), amount, FlagMask::NZC);
                }
            }
            Thumb16::AddReg { rd, rn, rm } => {
                let (a, b) = (self.reg(rn), self.reg(rm));
                self.add_sub(rd, a, b, OpKind::Add, set_flags);
            }
            Thumb16::SubReg { rd, rn, rm } => {
                let (a, b) = (self.reg(rn), self.reg(rm));
                self.add_sub(rd, a, b, OpKind::Sub, set_flags);
            }
            Thumb16::AddImm3 { rd, rn, imm3 } => {
                let a = self.reg(rn);
                self.add_sub(rd, a, imm3 as u32, OpKind::Add, set_flags);
            }
            Thumb16::SubImm3 { rd, rn, imm3 } => {
                let a = self.reg(rn);
                self.add_sub(rd, a, imm3 as u32, OpKind::Sub, set_flags);
            }
            Thumb16::MovImm { rd, imm8 } => {
                let result = imm8 as u32;
                self.set_reg(rd, result);
                if set_flags {
                    update_flags(&mut self.psr, result, result, 0, OpKind::Mov, 0, FlagMask::NZ);
                }
            }
            Thumb16::CmpImm { rn, imm8 } => {
                let a = self.reg(rn);
                let b = imm8 as u32;
                update_flags(
                    &mut self.psr,
                    a.wrapping_sub(b),
                    a,
                    b,
                    OpKind::Cmp,
                    0,
                    FlagMask::NZCV,
                );
            }
            Thumb16::AddImm8 { rdn, imm8 } => {
                let a = self.reg(rdn);
                self.add_sub(rdn, a, imm8 as u32, OpKind::Add, set_flags);
            }
            Thumb16::SubImm8 { rdn, imm8 } => {
                let a = self.reg(rdn);
                self.add_sub(rdn, a, imm8 as u32, OpKind::Sub, set_flags);
            }

            Thumb16::Alu { op, rdn, rm } => self.alu(op, rdn, rm, set_flags),

            Thumb16::AddHigh { rdn, rm } => {
                let result = self.reg(rdn).wrapping_add(self.reg(rm));
                if rdn == PC {
                    return self.branch_to(bus, result & !1);
                }
                self.set_reg(rdn, result);
            }
            Thumb16::CmpHigh { rn, rm } => {
                if rn < 8 && rm < 8 {
                    return Err(self.malformed("CMP high form with two low registers"));
                }
                let (a, b) = (self.reg(rn), self.reg(rm));
                update_flags(
                    &mut self.psr,
                    a.wrapping_sub(b),
                    a,
                    b,
                    OpKind::Cmp,
                    0,
                    FlagMask::NZCV,
                );
            }
            Thumb16::MovHigh { rd, rm } => {
                let value = self.reg(rm);
                if rd == PC {
                    return self.branch_to(bus, value & !1);
                }
                self.set_reg(rd, value);
            }
            Thumb16::Bx { rm } => {
                let target = self.interworking_target(self.reg(rm))?;
                return self.branch_to(bus, target);
            }
            Thumb16::Blx { rm } => {
                if rm == PC {
                    return Err(self.malformed("BLX to PC"));
                }
                let target = self.interworking_target(self.reg(rm))?;
                let flow = self.branch_to(bus, target)?;
                self.set_reg(LR, pc.wrapping_add(2) | 1);
                return Ok(flow);
            }

            Thumb16::LdrLiteral { rt, imm8 } => {
                let addr = self.literal_base().wrapping_add((imm8 as u32) << 2);
                let value = bus.read_u32(addr)?;
                self.set_reg(rt, value);
            }
            Thumb16::LoadStoreReg { op, rt, rn, rm } => {
                let addr = self.reg(rn).wrapping_add(self.reg(rm));
                self.transfer(bus, op, rt, addr)?;
            }
            Thumb16::LoadStoreImm { op, rt, rn, offset } => {
                let addr = self.reg(rn).wrapping_add(offset);
                self.transfer(bus, op, rt, addr)?;
            }
            Thumb16::LoadStoreSp { load, rt, imm8 } => {
                let addr = self.sp().wrapping_add((imm8 as u32) << 2);
                let op = if load { MemOp::Ldr } else { MemOp::Str };
                self.transfer(bus, op, rt, addr)?;
            }

            Thumb16::Adr { rd, imm8 } => {
                let value = self.literal_base().wrapping_add((imm8 as u32) << 2);
                self.set_reg(rd, value);
            }
            Thumb16::AddSpImm { rd, imm8 } => {
                let value = self.sp().wrapping_add((imm8 as u32) << 2);
                self.set_reg(rd, value);
            }
            Thumb16::AdjustSp { sub, imm7 } => {
                let offset = (imm7 as u32) << 2;
                let sp = if sub {
                    self.sp().wrapping_sub(offset)
                } else {
                    self.sp().wrapping_add(offset)
                };
                self.set_reg(SP, sp);
            }

            Thumb16::Cbz { nonzero, rn, imm6 } => {
                if self.psr.in_it_block() {
                    return Err(self.malformed("CBZ/CBNZ inside IT block"));
                }
                if (self.reg(rn) != 0) == nonzero {
                    let target = self.reg(PC).wrapping_add((imm6 as u32) << 1);
                    return self.branch_to(bus, target);
                }
            }
            Thumb16::Extend { op, rd, rm } => {
                let value = op.apply(self.reg(rm));
                self.set_reg(rd, value);
            }
            Thumb16::Reverse { op, rd, rm } => {
                let value = op.apply(self.reg(rm));
                self.set_reg(rd, value);
            }
            Thumb16::Push { registers } => {
                if registers == 0 {
                    return Err(self.malformed("empty register list"));
                }
                let start = self
                    .sp()
                    .wrapping_sub(4 * registers.count_ones());
                self.store_multiple(bus, start, registers)?;
                self.set_reg(SP, start);
            }
            Thumb16::Pop { registers } => {
                if registers == 0 {
                    return Err(self.malformed("empty register list"));
                }
                let start = self.sp();
                let end = start.wrapping_add(4 * registers.count_ones());
                return self.load_multiple(bus, start, registers, Some((SP, end)));
            }
            Thumb16::It { firstcond, mask } => {
                if self.psr.in_it_block() {
                    return Err(self.malformed("IT inside IT block"));
                }
                if firstcond == 0xF || (firstcond == 0xE && mask.count_ones() != 1) {
                    return Err(self.malformed("invalid IT condition"));
                }
                self.psr.it = (firstcond << 4) | mask;
            }
            Thumb16::Hint(Hint::Nop) => {}
            Thumb16::Hint(_) | Thumb16::Cps | Thumb16::Bkpt { .. } => {
                return Err(self.unsupported());
            }

            Thumb16::Stm { rn, registers } => {
                if registers == 0 {
                    return Err(self.malformed("empty register list"));
                }
                if registers & (1 << rn) != 0 {
                    return Err(self.malformed("writeback base in register list"));
                }
                let start = self.reg(rn);
                let end = start.wrapping_add(4 * registers.count_ones());
                self.store_multiple(bus, start, registers)?;
                self.set_reg(rn, end);
            }
            Thumb16::Ldm { rn, registers } => {
                if registers == 0 {
                    return Err(self.malformed("empty register list"));
                }
                let start = self.reg(rn);
                let end = start.wrapping_add(4 * registers.count_ones());
                let writeback = if registers & (1 << rn) == 0 {
                    Some((rn, end))
                } else {
                    None
                };
                return self.load_multiple(bus, start, registers, writeback);
            }
            Thumb16::BranchCond { cond, imm8 } => {
                if self.psr.in_it_block() {
                    return Err(self.malformed("conditional branch inside IT block"));
                }
                if self.psr.condition_passed(Condition::from_bits(cond)) {
                    let offset = sign_extend((imm8 as u32) << 1, 9);
                    let target = self.reg(PC).wrapping_add(offset as u32);
                    return self.branch_to(bus, target);
                }
            }
            Thumb16::Udf { .. } => return Err(self.malformed("reserved branch condition")),
            Thumb16::Svc { .. } => return Err(self.unsupported()),
            Thumb16::Branch { imm11 } => {
                let offset = sign_extend((imm11 as u32) << 1, 12);
                let target = self.reg(PC).wrapping_add(offset as u32);
                return self.branch_to(bus, target);
            }
            Thumb16::Undefined(_) => return Err(self.unsupported()),
        }

        Ok(Flow::Next)
    }

    fn add_sub(&mut self, rd: u8, a: u32, b: u32, kind: OpKind, set_flags: bool) {
        let result = if kind == OpKind::Add {
            a.wrapping_add(b)
        } else {
            a.wrapping_sub(b)
        };
        self.set_reg(rd, result);
        if set_flags {
            update_flags(&mut self.psr, result, a, b, kind, 0, FlagMask::NZCV);
        }
    }

    fn alu(&mut self, op: AluOp, rdn: u8, rm: u8, set_flags: bool) {
        let a = self.reg(rdn);
        let b = self.reg(rm);
        let carry = self.psr.c;

        let (result, kind, mask, amount) = match op {
            AluOp::And | AluOp::Tst => (a & b, OpKind::And, FlagMask::NZ, 0),
            AluOp::Eor => (a ^ b, OpKind::Eor, FlagMask::NZ, 0),
            AluOp::Orr => (a | b, OpKind::Orr, FlagMask::NZ, 0),
            AluOp::Bic => (a & !b, OpKind::Bic, FlagMask::NZ, 0),
            AluOp::Mvn => (!b, OpKind::Mvn, FlagMask::NZ, 0),
            AluOp::Mul => (a.wrapping_mul(b), OpKind::Mul, FlagMask::NZ, 0),
            AluOp::Lsl | AluOp::Lsr | AluOp::Asr | AluOp::Ror => {
                let ty = match op {
                    AluOp::Lsl => ShiftType::Lsl,
                    AluOp::Lsr => ShiftType::Lsr,
                    AluOp::Asr => ShiftType::Asr,
                    _ => ShiftType::Ror,
                };
                let amount = b & 0xFF;
                (shift(a, ty, amount, carry), ty.into(), FlagMask::NZC, amount)
            }
            AluOp::Adc => (
                a.wrapping_add(b).wrapping_add(carry as u32),
                OpKind::Adc,
                FlagMask::NZCV,
                0,
            ),
            AluOp::Sbc => (
                a.wrapping_sub(b).wrapping_sub(!carry as u32),
                OpKind::Sbc,
                FlagMask::NZCV,
                0,
            ),
            AluOp::Rsb => (0u32.wrapping_sub(b), OpKind::Rsb, FlagMask::NZCV, 0),
            AluOp::Cmp => (a.wrapping_sub(b), OpKind::Cmp, FlagMask::NZCV, 0),
            AluOp::Cmn => (a.wrapping_add(b), OpKind::Cmn, FlagMask::NZCV, 0),
        };

        // RSB Rd, Rn, #0 reads Rn from the Rm slot
        let (op1, op2) = match op {
            AluOp::Rsb => (b, 0),
            AluOp::Lsl | AluOp::Lsr | AluOp::Asr | AluOp::Ror => (a, 0),
            _ => (a, b),
        };

        if !op.is_test() {
            self.set_reg(rdn, result);
        }
        if set_flags || op.is_test() {
            update_flags(&mut self.psr, result, op1, op2, kind, amount, mask);
        }
    }

    /// Single load or store of `rt` at `addr`.
    fn transfer(&mut self, bus: &mut dyn Bus, op: MemOp, rt: u8, addr: u32) -> SimResult<()> {
        if op.is_load() {
            let value = self.load(bus, op, addr)?;
            self.set_reg(rt, value);
        } else {
            Self::store(bus, op, addr, self.reg(rt))?;
        }
        Ok(())
    }
}
