// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{ExtendOp, MemOp, ReverseOp, ShiftType};

/// Register-register data processing ops of the `010000` group, in encoding order.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AluOp {
    And,
    Eor,
    Lsl,
    Lsr,
    Asr,
    Adc,
    Sbc,
    Ror,
    Tst,
    Rsb,
    Cmp,
    Cmn,
    Orr,
    Mul,
    Bic,
    Mvn,
}

impl AluOp {
    const TABLE: [AluOp; 16] = [
        AluOp::And,
        AluOp::Eor,
        AluOp::Lsl,
        AluOp::Lsr,
        AluOp::Asr,
        AluOp::Adc,
        AluOp::Sbc,
        AluOp::Ror,
        AluOp::Tst,
        AluOp::Rsb,
        AluOp::Cmp,
        AluOp::Cmn,
        AluOp::Orr,
        AluOp::Mul,
        AluOp::Bic,
        AluOp::Mvn,
    ];

    pub fn from_bits(bits: u16) -> Self {
        Self::TABLE[(bits & 0xF) as usize]
    }

    /// TST/CMP/CMN only produce flags.
    pub fn is_test(self) -> bool {
        matches!(self, AluOp::Tst | AluOp::Cmp | AluOp::Cmn)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Hint {
    Nop,
    Yield,
    Wfe,
    Wfi,
    Sev,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Thumb16 {
    // Shift (immediate), add, subtract, move, and compare
    ShiftImm {
        ty: ShiftType,
        rd: u8,
        rm: u8,
        imm5: u8,
    },
    AddReg {
        rd: u8,
        rn: u8,
        rm: u8,
    },
    SubReg {
        rd: u8,
        rn: u8,
        rm: u8,
    },
    AddImm3 {
        rd: u8,
        rn: u8,
        imm3: u8,
    },
    SubImm3 {
        rd: u8,
        rn: u8,
        imm3: u8,
    },
    MovImm {
        rd: u8,
        imm8: u8,
    },
    CmpImm {
        rn: u8,
        imm8: u8,
    },
    AddImm8 {
        rdn: u8,
        imm8: u8,
    },
    SubImm8 {
        rdn: u8,
        imm8: u8,
    },

    // Data processing, special data, branch and exchange
    Alu {
        op: AluOp,
        rdn: u8,
        rm: u8,
    },
    AddHigh {
        rdn: u8,
        rm: u8,
    },
    CmpHigh {
        rn: u8,
        rm: u8,
    },
    MovHigh {
        rd: u8,
        rm: u8,
    },
    Bx {
        rm: u8,
    },
    Blx {
        rm: u8,
    },

    // Loads and stores
    LdrLiteral {
        rt: u8,
        imm8: u8,
    },
    LoadStoreReg {
        op: MemOp,
        rt: u8,
        rn: u8,
        rm: u8,
    },
    /// Immediate offset, already scaled by the access size.
    LoadStoreImm {
        op: MemOp,
        rt: u8,
        rn: u8,
        offset: u32,
    },
    LoadStoreSp {
        load: bool,
        rt: u8,
        imm8: u8,
    },

    // PC/SP relative address generation
    Adr {
        rd: u8,
        imm8: u8,
    },
    AddSpImm {
        rd: u8,
        imm8: u8,
    },
    AdjustSp {
        sub: bool,
        imm7: u8,
    },

    // Miscellaneous
    Cbz {
        nonzero: bool,
        rn: u8,
        imm6: u8,
    },
    Extend {
        op: ExtendOp,
        rd: u8,
        rm: u8,
    },
    Reverse {
        op: ReverseOp,
        rd: u8,
        rm: u8,
    },
    /// Bit 14 of `registers` is LR.
    Push {
        registers: u16,
    },
    /// Bit 15 of `registers` is PC.
    Pop {
        registers: u16,
    },
    It {
        firstcond: u8,
        mask: u8,
    },
    Hint(Hint),
    Cps,
    Bkpt {
        imm8: u8,
    },

    // Multiple, conditional branch, supervisor call, branch
    Stm {
        rn: u8,
        registers: u16,
    },
    Ldm {
        rn: u8,
        registers: u16,
    },
    BranchCond {
        cond: u8,
        imm8: u8,
    },
    Udf {
        imm8: u8,
    },
    Svc {
        imm8: u8,
    },
    Branch {
        imm11: u16,
    },

    Undefined(u16),
}

#[inline(always)]
fn low_reg(opcode: u16, shift: u16) -> u8 {
    ((opcode >> shift) & 0x7) as u8
}

pub fn decode_thumb_16(opcode: u16) -> Thumb16 {
    match opcode >> 13 {
        0b000 => decode_shift_add_sub(opcode),
        0b001 => {
            // 001o oddd iiii iiii
            let rd = low_reg(opcode, 8);
            let imm8 = (opcode & 0xFF) as u8;
            match (opcode >> 11) & 0x3 {
                0 => Thumb16::MovImm { rd, imm8 },
                1 => Thumb16::CmpImm { rn: rd, imm8 },
                2 => Thumb16::AddImm8 { rdn: rd, imm8 },
                _ => Thumb16::SubImm8 { rdn: rd, imm8 },
            }
        }
        0b010 => decode_data_and_load_store_reg(opcode),
        0b011 => {
            // 011B Liii iinn nttt
            let byte = opcode & 0x1000 != 0;
            let load = opcode & 0x0800 != 0;
            let imm5 = ((opcode >> 6) & 0x1F) as u32;
            let (op, offset) = match (byte, load) {
                (false, false) => (MemOp::Str, imm5 << 2),
                (false, true) => (MemOp::Ldr, imm5 << 2),
                (true, false) => (MemOp::Strb, imm5),
                (true, true) => (MemOp::Ldrb, imm5),
            };
            Thumb16::LoadStoreImm {
                op,
                rt: low_reg(opcode, 0),
                rn: low_reg(opcode, 3),
                offset,
            }
        }
        0b100 => {
            let load = opcode & 0x0800 != 0;
            if opcode & 0x1000 == 0 {
                // 1000 Liii iinn nttt: STRH/LDRH
                let imm5 = ((opcode >> 6) & 0x1F) as u32;
                Thumb16::LoadStoreImm {
                    op: if load { MemOp::Ldrh } else { MemOp::Strh },
                    rt: low_reg(opcode, 0),
                    rn: low_reg(opcode, 3),
                    offset: imm5 << 1,
                }
            } else {
                // 1001 Lttt iiii iiii: STR/LDR Rt, [SP, #imm8*4]
                Thumb16::LoadStoreSp {
                    load,
                    rt: low_reg(opcode, 8),
                    imm8: (opcode & 0xFF) as u8,
                }
            }
        }
        0b101 => decode_misc(opcode),
        0b110 => {
            if opcode & 0x1000 == 0 {
                // 1100 Lnnn rrrr rrrr
                let rn = low_reg(opcode, 8);
                let registers = opcode & 0xFF;
                if opcode & 0x0800 == 0 {
                    Thumb16::Stm { rn, registers }
                } else {
                    Thumb16::Ldm { rn, registers }
                }
            } else {
                // 1101 cccc iiii iiii
                let cond = ((opcode >> 8) & 0xF) as u8;
                let imm8 = (opcode & 0xFF) as u8;
                match cond {
                    0xE => Thumb16::Udf { imm8 },
                    0xF => Thumb16::Svc { imm8 },
                    _ => Thumb16::BranchCond { cond, imm8 },
                }
            }
        }
        _ => {
            // 1110 0iii iiii iiii; the 32-bit prefixes never reach here
            if opcode & 0x1800 == 0 {
                Thumb16::Branch {
                    imm11: opcode & 0x7FF,
                }
            } else {
                Thumb16::Undefined(opcode)
            }
        }
    }
}

fn decode_shift_add_sub(opcode: u16) -> Thumb16 {
    let rd = low_reg(opcode, 0);
    let rn = low_reg(opcode, 3);
    match (opcode >> 11) & 0x3 {
        // 000o oiii iimm mddd
        0..=2 => Thumb16::ShiftImm {
            ty: ShiftType::from_bits(opcode >> 11),
            rd,
            rm: rn,
            imm5: ((opcode >> 6) & 0x1F) as u8,
        },
        // 0001 1oom mmnn nddd
        _ => {
            let rm_imm = low_reg(opcode, 6);
            match (opcode >> 9) & 0x3 {
                0 => Thumb16::AddReg { rd, rn, rm: rm_imm },
                1 => Thumb16::SubReg { rd, rn, rm: rm_imm },
                2 => Thumb16::AddImm3 {
                    rd,
                    rn,
                    imm3: rm_imm,
                },
                _ => Thumb16::SubImm3 {
                    rd,
                    rn,
                    imm3: rm_imm,
                },
            }
        }
    }
}

fn decode_data_and_load_store_reg(opcode: u16) -> Thumb16 {
    // 0100 00oo oomm mddd: ALU
    if opcode & 0xFC00 == 0x4000 {
        return Thumb16::Alu {
            op: AluOp::from_bits(opcode >> 6),
            rdn: low_reg(opcode, 0),
            rm: low_reg(opcode, 3),
        };
    }

    // 0100 01oo Dmmm mddd: special data, BX/BLX
    if opcode & 0xFC00 == 0x4400 {
        let rdn = (((opcode >> 4) & 0x8) | (opcode & 0x7)) as u8;
        let rm = ((opcode >> 3) & 0xF) as u8;
        return match (opcode >> 8) & 0x3 {
            0 => Thumb16::AddHigh { rdn, rm },
            1 => Thumb16::CmpHigh { rn: rdn, rm },
            2 => Thumb16::MovHigh { rd: rdn, rm },
            _ => {
                if opcode & 0x0007 != 0 {
                    Thumb16::Undefined(opcode)
                } else if opcode & 0x0080 == 0 {
                    Thumb16::Bx { rm }
                } else {
                    Thumb16::Blx { rm }
                }
            }
        };
    }

    // 0100 1ttt iiii iiii: LDR Rt, [PC, #imm8*4]
    if opcode & 0xF800 == 0x4800 {
        return Thumb16::LdrLiteral {
            rt: low_reg(opcode, 8),
            imm8: (opcode & 0xFF) as u8,
        };
    }

    // 0101 ooom mmnn nttt
    let op = match (opcode >> 9) & 0x7 {
        0 => MemOp::Str,
        1 => MemOp::Strh,
        2 => MemOp::Strb,
        3 => MemOp::Ldrsb,
        4 => MemOp::Ldr,
        5 => MemOp::Ldrh,
        6 => MemOp::Ldrb,
        _ => MemOp::Ldrsh,
    };
    Thumb16::LoadStoreReg {
        op,
        rt: low_reg(opcode, 0),
        rn: low_reg(opcode, 3),
        rm: low_reg(opcode, 6),
    }
}

fn decode_misc(opcode: u16) -> Thumb16 {
    if opcode & 0x1000 == 0 {
        // 1010 Sddd iiii iiii: ADR / ADD Rd, SP, #imm8*4
        let rd = low_reg(opcode, 8);
        let imm8 = (opcode & 0xFF) as u8;
        return if opcode & 0x0800 == 0 {
            Thumb16::Adr { rd, imm8 }
        } else {
            Thumb16::AddSpImm { rd, imm8 }
        };
    }

    let rd = low_reg(opcode, 0);
    let rm = low_reg(opcode, 3);
    match (opcode >> 8) & 0xF {
        // 1011 0000 Siii iiii
        0b0000 => Thumb16::AdjustSp {
            sub: opcode & 0x0080 != 0,
            imm7: (opcode & 0x7F) as u8,
        },
        // 1011 o0i1 iiii innn
        0b0001 | 0b0011 | 0b1001 | 0b1011 => Thumb16::Cbz {
            nonzero: opcode & 0x0800 != 0,
            rn: rd,
            imm6: ((((opcode >> 9) & 0x1) << 5) | ((opcode >> 3) & 0x1F)) as u8,
        },
        // 1011 0010 oomm mddd
        0b0010 => {
            let op = match (opcode >> 6) & 0x3 {
                0 => ExtendOp::Sxth,
                1 => ExtendOp::Sxtb,
                2 => ExtendOp::Uxth,
                _ => ExtendOp::Uxtb,
            };
            Thumb16::Extend { op, rd, rm }
        }
        // 1011 010M rrrr rrrr
        0b0100 | 0b0101 => Thumb16::Push {
            registers: (opcode & 0xFF) | ((opcode & 0x0100) << 6),
        },
        0b0110 => {
            // 1011 0110 011m 0aif
            if opcode & 0x00E8 == 0x0060 {
                Thumb16::Cps
            } else {
                Thumb16::Undefined(opcode)
            }
        }
        // 1011 1010 oomm mddd
        0b1010 => match (opcode >> 6) & 0x3 {
            0 => Thumb16::Reverse {
                op: ReverseOp::Rev,
                rd,
                rm,
            },
            1 => Thumb16::Reverse {
                op: ReverseOp::Rev16,
                rd,
                rm,
            },
            3 => Thumb16::Reverse {
                op: ReverseOp::Revsh,
                rd,
                rm,
            },
            _ => Thumb16::Undefined(opcode),
        },
        // 1011 110P rrrr rrrr
        0b1100 | 0b1101 => Thumb16::Pop {
            registers: (opcode & 0xFF) | ((opcode & 0x0100) << 7),
        },
        0b1110 => Thumb16::Bkpt {
            imm8: (opcode & 0xFF) as u8,
        },
        0b1111 => {
            // 1011 1111 cccc mmmm
            let mask = (opcode & 0xF) as u8;
            let firstcond = ((opcode >> 4) & 0xF) as u8;
            if mask != 0 {
                return Thumb16::It { firstcond, mask };
            }
            let hint = match firstcond {
                1 => Hint::Yield,
                2 => Hint::Wfe,
                3 => Hint::Wfi,
                4 => Hint::Sev,
                // Unallocated hints execute as NOP
                _ => Hint::Nop,
            };
            Thumb16::Hint(hint)
        }
        _ => Thumb16::Undefined(opcode),
    }
}
