// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use super::{decode_imm_shift, sign_extend, ExtendOp, MemOp, ReverseOp, ShiftType};

/// Data processing operations shared by the modified-immediate and
/// shifted-register groups. Flag-only forms get their own variant.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DpOp {
    And,
    Tst,
    Bic,
    Orr,
    Mov,
    Orn,
    Mvn,
    Eor,
    Teq,
    Add,
    Cmn,
    Adc,
    Sbc,
    Sub,
    Cmp,
    Rsb,
}

impl DpOp {
    /// Logical ops take their carry from the shifter or the expanded immediate.
    pub fn is_logical(self) -> bool {
        matches!(
            self,
            DpOp::And
                | DpOp::Tst
                | DpOp::Bic
                | DpOp::Orr
                | DpOp::Mov
                | DpOp::Orn
                | DpOp::Mvn
                | DpOp::Eor
                | DpOp::Teq
        )
    }

    pub fn is_test(self) -> bool {
        matches!(self, DpOp::Tst | DpOp::Teq | DpOp::Cmn | DpOp::Cmp)
    }

    /// Maps the 4-bit op field, folding Rd/Rn == PC into the test and move forms.
    fn decode(op: u16, s: bool, rd: u8, rn: u8) -> Option<Self> {
        let test = s && rd == 15;
        Some(match op {
            0b0000 if test => DpOp::Tst,
            0b0000 => DpOp::And,
            0b0001 => DpOp::Bic,
            0b0010 if rn == 15 => DpOp::Mov,
            0b0010 => DpOp::Orr,
            0b0011 if rn == 15 => DpOp::Mvn,
            0b0011 => DpOp::Orn,
            0b0100 if test => DpOp::Teq,
            0b0100 => DpOp::Eor,
            0b1000 if test => DpOp::Cmn,
            0b1000 => DpOp::Add,
            0b1010 => DpOp::Adc,
            0b1011 => DpOp::Sbc,
            0b1101 if test => DpOp::Cmp,
            0b1101 => DpOp::Sub,
            0b1110 => DpOp::Rsb,
            _ => return None,
        })
    }
}

/// Addressing of a single load/store with a base register.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Addressing {
    /// `[Rn, #+/-imm]{!}` when `index`, otherwise `[Rn], #+/-imm`.
    Immediate {
        imm: u32,
        add: bool,
        index: bool,
        wback: bool,
    },
    /// `[Rn, Rm, LSL #shift]`
    Register { rm: u8, shift: u8 },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExclusiveSize {
    Byte,
    Half,
    Word,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LongMulOp {
    Smull,
    Umull,
    Smlal,
    Umlal,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Thumb32 {
    // Branches and miscellaneous control
    Bl {
        offset: i32,
    },
    /// BLX <imm>: switches to ARM state.
    BlxImm,
    Branch {
        offset: i32,
    },
    BranchCond {
        cond: u8,
        offset: i32,
    },
    NopW,
    Barrier,
    Clrex,
    /// MSR, MRS, CPS, wait-for-event hints and friends.
    System,

    // Load/store multiple, dual, exclusive, table branch
    LoadMultiple {
        rn: u8,
        registers: u16,
        wback: bool,
        db: bool,
    },
    StoreMultiple {
        rn: u8,
        registers: u16,
        wback: bool,
        db: bool,
    },
    LoadStoreDual {
        load: bool,
        rt: u8,
        rt2: u8,
        rn: u8,
        imm: u32,
        add: bool,
        index: bool,
        wback: bool,
    },
    LoadExclusive {
        size: ExclusiveSize,
        rt: u8,
        rn: u8,
        imm: u32,
    },
    StoreExclusive {
        size: ExclusiveSize,
        rd: u8,
        rt: u8,
        rn: u8,
        imm: u32,
    },
    TableBranch {
        half: bool,
        rn: u8,
        rm: u8,
    },

    // Data processing
    DataProcShifted {
        op: DpOp,
        s: bool,
        rd: u8,
        rn: u8,
        rm: u8,
        shift: ShiftType,
        amount: u8,
    },
    /// `imm12` is the raw `i:imm3:imm8` field.
    DataProcImm {
        op: DpOp,
        s: bool,
        rd: u8,
        rn: u8,
        imm12: u16,
    },
    AddWide {
        sub: bool,
        rd: u8,
        rn: u8,
        imm12: u16,
    },
    MovWide {
        top: bool,
        rd: u8,
        imm16: u16,
    },
    Saturate {
        unsigned: bool,
        rd: u8,
        rn: u8,
        sat_imm: u8,
        shift: ShiftType,
        amount: u8,
    },
    BitfieldExtract {
        signed: bool,
        rd: u8,
        rn: u8,
        lsb: u8,
        widthm1: u8,
    },
    Bfi {
        rd: u8,
        rn: u8,
        lsb: u8,
        msb: u8,
    },
    Bfc {
        rd: u8,
        lsb: u8,
        msb: u8,
    },
    ShiftReg {
        ty: ShiftType,
        s: bool,
        rd: u8,
        rn: u8,
        rm: u8,
    },
    /// `rn == 15` means no accumulate.
    Extend {
        op: ExtendOp,
        rd: u8,
        rn: u8,
        rm: u8,
        rotation: u8,
    },
    Reverse {
        op: ReverseOp,
        rd: u8,
        rm: u8,
    },

    // Load/store single
    LoadStore {
        op: MemOp,
        rt: u8,
        rn: u8,
        addressing: Addressing,
    },
    LoadLiteral {
        op: MemOp,
        rt: u8,
        imm: u32,
        add: bool,
    },
    Preload,

    // Multiply and divide
    Mul {
        rd: u8,
        rn: u8,
        rm: u8,
    },
    Mla {
        rd: u8,
        rn: u8,
        rm: u8,
        ra: u8,
    },
    Mls {
        rd: u8,
        rn: u8,
        rm: u8,
        ra: u8,
    },
    LongMultiply {
        op: LongMulOp,
        rdlo: u8,
        rdhi: u8,
        rn: u8,
        rm: u8,
    },
    Divide {
        signed: bool,
        rd: u8,
        rn: u8,
        rm: u8,
    },

    /// Coprocessor / floating-point space.
    Coprocessor,
    /// Packed SIMD, saturating and DSP multiply space.
    Dsp,
    Undefined,
}

#[inline(always)]
fn reg(hw: u16, shift: u16) -> u8 {
    ((hw >> shift) & 0xF) as u8
}

pub fn decode_thumb_32(hw1: u16, hw2: u16) -> Thumb32 {
    let op1 = (hw1 >> 11) & 0x3;
    match op1 {
        0b01 => {
            if hw1 & 0x0400 != 0 {
                Thumb32::Coprocessor
            } else if hw1 & 0x0200 != 0 {
                decode_dp_shifted(hw1, hw2)
            } else if hw1 & 0x0040 == 0 {
                decode_load_store_multiple(hw1, hw2)
            } else {
                decode_dual_exclusive_table(hw1, hw2)
            }
        }
        0b10 => {
            if hw2 & 0x8000 != 0 {
                decode_branch_misc(hw1, hw2)
            } else if hw1 & 0x0200 == 0 {
                decode_dp_modified_imm(hw1, hw2)
            } else {
                decode_dp_plain_imm(hw1, hw2)
            }
        }
        0b11 => {
            if hw1 & 0x0400 != 0 {
                return Thumb32::Coprocessor;
            }
            match (hw1 >> 7) & 0x7 {
                0b000..=0b011 => decode_load_store_single(hw1, hw2),
                0b100 | 0b101 => decode_dp_register(hw1, hw2),
                0b110 => decode_multiply(hw1, hw2),
                _ => decode_long_multiply(hw1, hw2),
            }
        }
        _ => Thumb32::Undefined,
    }
}

// 1110 100P U0WL nnnn | rrrr rrrr rrrr rrrr
fn decode_load_store_multiple(hw1: u16, hw2: u16) -> Thumb32 {
    let rn = reg(hw1, 0);
    let wback = hw1 & 0x0020 != 0;
    let load = hw1 & 0x0010 != 0;
    let db = match (hw1 >> 7) & 0x3 {
        0b01 => false,
        0b10 => true,
        // SRS / RFE
        _ => return Thumb32::System,
    };
    if load {
        Thumb32::LoadMultiple {
            rn,
            registers: hw2,
            wback,
            db,
        }
    } else {
        Thumb32::StoreMultiple {
            rn,
            registers: hw2,
            wback,
            db,
        }
    }
}

// 1110 100P U1WL nnnn | tttt TTTT iiii iiii
fn decode_dual_exclusive_table(hw1: u16, hw2: u16) -> Thumb32 {
    let rn = reg(hw1, 0);
    let rt = reg(hw2, 12);
    let index = hw1 & 0x0100 != 0;
    let wback = hw1 & 0x0020 != 0;
    let load = hw1 & 0x0010 != 0;

    if index || wback {
        return Thumb32::LoadStoreDual {
            load,
            rt,
            rt2: reg(hw2, 8),
            rn,
            imm: ((hw2 & 0xFF) as u32) << 2,
            add: hw1 & 0x0080 != 0,
            index,
            wback,
        };
    }

    let imm = ((hw2 & 0xFF) as u32) << 2;
    match ((hw1 >> 7) & 0x1, load) {
        (0, false) => Thumb32::StoreExclusive {
            size: ExclusiveSize::Word,
            rd: reg(hw2, 8),
            rt,
            rn,
            imm,
        },
        (0, true) => Thumb32::LoadExclusive {
            size: ExclusiveSize::Word,
            rt,
            rn,
            imm,
        },
        (_, false) => {
            let size = match (hw2 >> 4) & 0xF {
                0b0100 => ExclusiveSize::Byte,
                0b0101 => ExclusiveSize::Half,
                _ => return Thumb32::Undefined,
            };
            Thumb32::StoreExclusive {
                size,
                rd: reg(hw2, 0),
                rt,
                rn,
                imm: 0,
            }
        }
        (_, true) => match (hw2 >> 4) & 0xF {
            0b0000 => Thumb32::TableBranch {
                half: false,
                rn,
                rm: reg(hw2, 0),
            },
            0b0001 => Thumb32::TableBranch {
                half: true,
                rn,
                rm: reg(hw2, 0),
            },
            0b0100 => Thumb32::LoadExclusive {
                size: ExclusiveSize::Byte,
                rt,
                rn,
                imm: 0,
            },
            0b0101 => Thumb32::LoadExclusive {
                size: ExclusiveSize::Half,
                rt,
                rn,
                imm: 0,
            },
            _ => Thumb32::Undefined,
        },
    }
}

// 1110 101o oooS nnnn | 0iii dddd iitt mmmm
fn decode_dp_shifted(hw1: u16, hw2: u16) -> Thumb32 {
    let op = (hw1 >> 5) & 0xF;
    let s = hw1 & 0x0010 != 0;
    let rn = reg(hw1, 0);
    let rd = reg(hw2, 8);
    let rm = reg(hw2, 0);
    let imm5 = ((((hw2 >> 12) & 0x7) << 2) | ((hw2 >> 6) & 0x3)) as u8;
    let (shift, amount) = decode_imm_shift((hw2 >> 4) & 0x3, imm5);

    // PKHBT / PKHTB
    if op == 0b0110 {
        return Thumb32::Dsp;
    }
    match DpOp::decode(op, s, rd, rn) {
        Some(op) => Thumb32::DataProcShifted {
            op,
            s,
            rd,
            rn,
            rm,
            shift,
            amount,
        },
        None => Thumb32::Undefined,
    }
}

// 1111 0i0o oooS nnnn | 0iii dddd iiii iiii
fn decode_dp_modified_imm(hw1: u16, hw2: u16) -> Thumb32 {
    let op = (hw1 >> 5) & 0xF;
    let s = hw1 & 0x0010 != 0;
    let rn = reg(hw1, 0);
    let rd = reg(hw2, 8);
    let imm12 = ((hw1 & 0x0400) << 1) | (hw2 & 0x7000) >> 4 | (hw2 & 0xFF);
    match DpOp::decode(op, s, rd, rn) {
        Some(op) => Thumb32::DataProcImm {
            op,
            s,
            rd,
            rn,
            imm12,
        },
        None => Thumb32::Undefined,
    }
}

// 1111 0i1o oooo nnnn | 0iii dddd iiii iiii
fn decode_dp_plain_imm(hw1: u16, hw2: u16) -> Thumb32 {
    let rn = reg(hw1, 0);
    let rd = reg(hw2, 8);
    let imm12 = ((hw1 & 0x0400) << 1) | (hw2 & 0x7000) >> 4 | (hw2 & 0xFF);
    let imm5 = ((((hw2 >> 12) & 0x7) << 2) | ((hw2 >> 6) & 0x3)) as u8;
    let low5 = (hw2 & 0x1F) as u8;

    match (hw1 >> 4) & 0x1F {
        0b00000 => Thumb32::AddWide {
            sub: false,
            rd,
            rn,
            imm12,
        },
        0b01010 => Thumb32::AddWide {
            sub: true,
            rd,
            rn,
            imm12,
        },
        op @ (0b00100 | 0b01100) => Thumb32::MovWide {
            top: op == 0b01100,
            rd,
            imm16: ((hw1 & 0xF) << 12) | imm12,
        },
        op @ (0b10000 | 0b10010 | 0b11000 | 0b11010) => {
            let asr = op & 0b00010 != 0;
            if asr && imm5 == 0 {
                // SSAT16 / USAT16
                return Thumb32::Dsp;
            }
            Thumb32::Saturate {
                unsigned: op & 0b01000 != 0,
                rd,
                rn,
                sat_imm: low5,
                shift: if asr { ShiftType::Asr } else { ShiftType::Lsl },
                amount: imm5,
            }
        }
        op @ (0b10100 | 0b11100) => Thumb32::BitfieldExtract {
            signed: op == 0b10100,
            rd,
            rn,
            lsb: imm5,
            widthm1: low5,
        },
        0b10110 if rn == 15 => Thumb32::Bfc {
            rd,
            lsb: imm5,
            msb: low5,
        },
        0b10110 => Thumb32::Bfi {
            rd,
            rn,
            lsb: imm5,
            msb: low5,
        },
        _ => Thumb32::Undefined,
    }
}

// 1111 0Sii iiii iiii | 1xJx JIII IIII IIII
fn decode_branch_misc(hw1: u16, hw2: u16) -> Thumb32 {
    let s = ((hw1 >> 10) & 1) as u32;
    let j1 = ((hw2 >> 13) & 1) as u32;
    let j2 = ((hw2 >> 11) & 1) as u32;
    let imm11 = (hw2 & 0x7FF) as u32;

    match (hw2 >> 12) & 0x5 {
        // B<c>.W (T3) or miscellaneous control
        0b000 => {
            let cond = ((hw1 >> 6) & 0xF) as u8;
            if cond & 0xE != 0xE {
                let imm6 = (hw1 & 0x3F) as u32;
                let raw = (s << 20) | (j2 << 19) | (j1 << 18) | (imm6 << 12) | (imm11 << 1);
                return Thumb32::BranchCond {
                    cond,
                    offset: sign_extend(raw, 21),
                };
            }
            decode_misc_control(hw1, hw2)
        }
        // B.W (T4), BL, BLX
        _ => {
            let imm10 = (hw1 & 0x3FF) as u32;
            let i1 = !(j1 ^ s) & 1;
            let i2 = !(j2 ^ s) & 1;
            let raw = (s << 24) | (i1 << 23) | (i2 << 22) | (imm10 << 12) | (imm11 << 1);
            let offset = sign_extend(raw, 25);
            match (hw2 >> 12) & 0x5 {
                0b001 => Thumb32::Branch { offset },
                0b101 => Thumb32::Bl { offset },
                _ => Thumb32::BlxImm,
            }
        }
    }
}

fn decode_misc_control(hw1: u16, hw2: u16) -> Thumb32 {
    if hw2 & 0x2000 != 0 {
        // 1111 0111 1111 xxxx | 1010 ...: permanently undefined
        return Thumb32::Undefined;
    }
    match (hw1 >> 4) & 0x7F {
        // Hints
        0b0111010 => match hw2 & 0xFF {
            0 => Thumb32::NopW,
            1..=4 => Thumb32::System,
            // DBG and unallocated hints
            _ => Thumb32::NopW,
        },
        0b0111011 => match (hw2 >> 4) & 0xF {
            0b0010 => Thumb32::Clrex,
            0b0100..=0b0110 => Thumb32::Barrier,
            _ => Thumb32::Undefined,
        },
        _ => Thumb32::System,
    }
}

// 1111 100S UssL nnnn | tttt ....
fn decode_load_store_single(hw1: u16, hw2: u16) -> Thumb32 {
    let signed = hw1 & 0x0100 != 0;
    let imm12_form = hw1 & 0x0080 != 0;
    let load = hw1 & 0x0010 != 0;
    let rn = reg(hw1, 0);
    let rt = reg(hw2, 12);

    let op = match ((hw1 >> 5) & 0x3, load, signed) {
        (0, false, false) => MemOp::Strb,
        (1, false, false) => MemOp::Strh,
        (2, false, false) => MemOp::Str,
        (0, true, false) => MemOp::Ldrb,
        (1, true, false) => MemOp::Ldrh,
        (2, true, false) => MemOp::Ldr,
        (0, true, true) => MemOp::Ldrsb,
        (1, true, true) => MemOp::Ldrsh,
        _ => return Thumb32::Undefined,
    };

    if load && rn == 15 {
        if rt == 15 && op.size() < 4 {
            return Thumb32::Preload;
        }
        return Thumb32::LoadLiteral {
            op,
            rt,
            imm: (hw2 & 0xFFF) as u32,
            add: imm12_form,
        };
    }
    if !load && rn == 15 {
        return Thumb32::Undefined;
    }

    let addressing = if imm12_form {
        Addressing::Immediate {
            imm: (hw2 & 0xFFF) as u32,
            add: true,
            index: true,
            wback: false,
        }
    } else if hw2 & 0x0800 != 0 {
        // 1PUW iiii iiii
        let index = hw2 & 0x0400 != 0;
        let wback = hw2 & 0x0100 != 0;
        if !index && !wback {
            return Thumb32::Undefined;
        }
        Addressing::Immediate {
            imm: (hw2 & 0xFF) as u32,
            add: hw2 & 0x0200 != 0,
            index,
            wback,
        }
    } else if hw2 & 0x0FC0 == 0 {
        // 0000 00ii mmmm
        Addressing::Register {
            rm: reg(hw2, 0),
            shift: ((hw2 >> 4) & 0x3) as u8,
        }
    } else {
        return Thumb32::Undefined;
    };

    // PLD / PLI and unallocated memory hints
    if load && rt == 15 && op.size() < 4 {
        return Thumb32::Preload;
    }

    Thumb32::LoadStore {
        op,
        rt,
        rn,
        addressing,
    }
}

// 1111 1010 oooo nnnn | 1111 dddd oooo mmmm
fn decode_dp_register(hw1: u16, hw2: u16) -> Thumb32 {
    let op1 = (hw1 >> 4) & 0xF;
    let op2 = (hw2 >> 4) & 0xF;
    let rn = reg(hw1, 0);
    let rd = reg(hw2, 8);
    let rm = reg(hw2, 0);

    if hw2 & 0xF000 != 0xF000 {
        return Thumb32::Undefined;
    }

    if op1 & 0x8 == 0 {
        if op2 == 0 {
            return Thumb32::ShiftReg {
                ty: ShiftType::from_bits(op1 >> 1),
                s: op1 & 0x1 != 0,
                rd,
                rn,
                rm,
            };
        }
        if op2 & 0x8 != 0 {
            let rotation = (((hw2 >> 4) & 0x3) * 8) as u8;
            let op = match op1 {
                0b0000 => ExtendOp::Sxth,
                0b0001 => ExtendOp::Uxth,
                0b0100 => ExtendOp::Sxtb,
                0b0101 => ExtendOp::Uxtb,
                // SXTB16 / UXTB16 and their accumulating forms
                0b0010 | 0b0011 => return Thumb32::Dsp,
                _ => return Thumb32::Undefined,
            };
            return Thumb32::Extend {
                op,
                rd,
                rn,
                rm,
                rotation,
            };
        }
        return Thumb32::Undefined;
    }

    // Parallel addition and subtraction
    if op2 & 0x8 == 0 {
        return Thumb32::Dsp;
    }

    if op1 & 0xC == 0x8 && op2 & 0xC == 0x8 {
        return match (op1 & 0x3, op2 & 0x3) {
            // QADD, QDADD, QSUB, QDSUB, SEL
            (0b00, _) | (0b10, 0b00) => Thumb32::Dsp,
            (0b01, 0b00) => Thumb32::Reverse {
                op: ReverseOp::Rev,
                rd,
                rm,
            },
            (0b01, 0b01) => Thumb32::Reverse {
                op: ReverseOp::Rev16,
                rd,
                rm,
            },
            (0b01, 0b10) => Thumb32::Reverse {
                op: ReverseOp::Rbit,
                rd,
                rm,
            },
            (0b01, 0b11) => Thumb32::Reverse {
                op: ReverseOp::Revsh,
                rd,
                rm,
            },
            (0b11, 0b00) => Thumb32::Reverse {
                op: ReverseOp::Clz,
                rd,
                rm,
            },
            _ => Thumb32::Undefined,
        };
    }

    Thumb32::Undefined
}

// 1111 1011 0ooo nnnn | aaaa dddd 00oo mmmm
fn decode_multiply(hw1: u16, hw2: u16) -> Thumb32 {
    let op1 = (hw1 >> 4) & 0x7;
    let op2 = (hw2 >> 4) & 0x3;
    let rn = reg(hw1, 0);
    let ra = reg(hw2, 12);
    let rd = reg(hw2, 8);
    let rm = reg(hw2, 0);

    if hw2 & 0x00C0 != 0 {
        return Thumb32::Undefined;
    }
    match (op1, op2) {
        (0b000, 0b00) if ra == 15 => Thumb32::Mul { rd, rn, rm },
        (0b000, 0b00) => Thumb32::Mla { rd, rn, rm, ra },
        (0b000, 0b01) => Thumb32::Mls { rd, rn, rm, ra },
        (0b000, _) => Thumb32::Undefined,
        // SMLAxy, SMLAD, SMLAW, SMLSD, SMMLA, SMMLS, USAD8
        _ => Thumb32::Dsp,
    }
}

// 1111 1011 1ooo nnnn | llll hhhh oooo mmmm
fn decode_long_multiply(hw1: u16, hw2: u16) -> Thumb32 {
    let op1 = (hw1 >> 4) & 0x7;
    let op2 = (hw2 >> 4) & 0xF;
    let rn = reg(hw1, 0);
    let rdlo = reg(hw2, 12);
    let rdhi = reg(hw2, 8);
    let rm = reg(hw2, 0);

    let long = |op| Thumb32::LongMultiply {
        op,
        rdlo,
        rdhi,
        rn,
        rm,
    };
    match (op1, op2) {
        (0b000, 0b0000) => long(LongMulOp::Smull),
        (0b010, 0b0000) => long(LongMulOp::Umull),
        (0b100, 0b0000) => long(LongMulOp::Smlal),
        (0b110, 0b0000) => long(LongMulOp::Umlal),
        (0b001, 0b1111) | (0b011, 0b1111) => {
            if hw2 & 0xF000 != 0xF000 {
                return Thumb32::Undefined;
            }
            Thumb32::Divide {
                signed: op1 == 0b001,
                rd: rdhi,
                rn,
                rm,
            }
        }
        // SMLALxy, SMLALD, SMLSLD, UMAAL
        (0b100, 0b1000..=0b1101) | (0b101, 0b1100 | 0b1101) | (0b110, 0b0110) => Thumb32::Dsp,
        _ => Thumb32::Undefined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bl() {
        // BL +0x1000: S=0, imm10=0x001, J1=J2=1, imm11=0x000
        assert_eq!(decode_thumb_32(0xF001, 0xF800), Thumb32::Bl { offset: 0x1000 });
        // BL -4: S=1, imm10=0x3FF, J1=J2=1, imm11=0x7FE
        assert_eq!(decode_thumb_32(0xF7FF, 0xFFFE), Thumb32::Bl { offset: -4 });
    }

    #[test]
    fn test_decode_wide_branches() {
        // B.W +8 (T4): 1111 0000 0000 0000 | 1011 1000 0000 0100
        assert_eq!(decode_thumb_32(0xF000, 0xB804), Thumb32::Branch { offset: 8 });
        // BNE.W -2 (T3): S=1 cond=1 imm6=0x3F | J1=1 J2=1 imm11=0x7FF
        assert_eq!(
            decode_thumb_32(0xF47F, 0xAFFF),
            Thumb32::BranchCond {
                cond: 1,
                offset: -2
            }
        );
        // BLX <imm>: bit 12 of hw2 clear
        assert_eq!(decode_thumb_32(0xF000, 0xE800), Thumb32::BlxImm);
    }

    #[test]
    fn test_decode_misc_control() {
        assert_eq!(decode_thumb_32(0xF3AF, 0x8000), Thumb32::NopW);
        assert_eq!(decode_thumb_32(0xF3AF, 0x8003), Thumb32::System); // WFI.W
        assert_eq!(decode_thumb_32(0xF3BF, 0x8F5F), Thumb32::Barrier); // DMB SY
        assert_eq!(decode_thumb_32(0xF3BF, 0x8F2F), Thumb32::Clrex);
        assert_eq!(decode_thumb_32(0xF3EF, 0x8008), Thumb32::System); // MRS R0, MSP
        assert_eq!(decode_thumb_32(0xF7F0, 0xA000), Thumb32::Undefined); // UDF.W
    }

    #[test]
    fn test_decode_modified_immediate() {
        // MOV.W R0, #0x12345678 is not encodable; MOVS.W R1, #0xFF00FF00
        // 1111 0000 0101 1111 | 0010 0001 1111 1111
        assert_eq!(
            decode_thumb_32(0xF05F, 0x21FF),
            Thumb32::DataProcImm {
                op: DpOp::Mov,
                s: true,
                rd: 1,
                rn: 15,
                imm12: 0x2FF
            }
        );
        // CMP.W R2, #1 -> 1111 0001 1011 0010 | 0000 1111 0000 0001
        assert_eq!(
            decode_thumb_32(0xF1B2, 0x0F01),
            Thumb32::DataProcImm {
                op: DpOp::Cmp,
                s: true,
                rd: 15,
                rn: 2,
                imm12: 0x001
            }
        );
    }

    #[test]
    fn test_decode_plain_immediate() {
        // MOVW R0, #0x1234: imm4=1 i=0 imm3=2 imm8=0x34
        assert_eq!(
            decode_thumb_32(0xF241, 0x2034),
            Thumb32::MovWide {
                top: false,
                rd: 0,
                imm16: 0x1234
            }
        );
        // MOVT R0, #0x1234
        assert_eq!(
            decode_thumb_32(0xF2C1, 0x2034),
            Thumb32::MovWide {
                top: true,
                rd: 0,
                imm16: 0x1234
            }
        );
        // BFI R0, R1, #4, #12 -> lsb=4 (imm3=1, imm2=0), msb=15
        assert_eq!(
            decode_thumb_32(0xF361, 0x100F),
            Thumb32::Bfi {
                rd: 0,
                rn: 1,
                lsb: 4,
                msb: 15
            }
        );
        // UBFX R0, R1, #8, #8 -> lsb=8 (imm3=2), widthm1=7
        assert_eq!(
            decode_thumb_32(0xF3C1, 0x2007),
            Thumb32::BitfieldExtract {
                signed: false,
                rd: 0,
                rn: 1,
                lsb: 8,
                widthm1: 7
            }
        );
        // USAT R0, #8, R1
        assert_eq!(
            decode_thumb_32(0xF381, 0x0008),
            Thumb32::Saturate {
                unsigned: true,
                rd: 0,
                rn: 1,
                sat_imm: 8,
                shift: ShiftType::Lsl,
                amount: 0
            }
        );
        // SSAT16 goes to the DSP unit
        assert_eq!(decode_thumb_32(0xF321, 0x0007), Thumb32::Dsp);
    }

    #[test]
    fn test_decode_shifted_register() {
        // ADDS.W R0, R1, R2, LSL #3 -> 1110 1011 0001 0001 | 0000 0000 1100 0010
        assert_eq!(
            decode_thumb_32(0xEB11, 0x00C2),
            Thumb32::DataProcShifted {
                op: DpOp::Add,
                s: true,
                rd: 0,
                rn: 1,
                rm: 2,
                shift: ShiftType::Lsl,
                amount: 3
            }
        );
        // MOV.W R0, R1, RRX -> 1110 1010 0100 1111 | 0000 0000 0011 0001
        assert_eq!(
            decode_thumb_32(0xEA4F, 0x0031),
            Thumb32::DataProcShifted {
                op: DpOp::Mov,
                s: false,
                rd: 0,
                rn: 15,
                rm: 1,
                shift: ShiftType::Rrx,
                amount: 1
            }
        );
        // TST.W R3, R4 -> 1110 1010 0001 0011 | 0000 1111 0000 0100
        assert_eq!(
            decode_thumb_32(0xEA13, 0x0F04),
            Thumb32::DataProcShifted {
                op: DpOp::Tst,
                s: true,
                rd: 15,
                rn: 3,
                rm: 4,
                shift: ShiftType::Lsl,
                amount: 0
            }
        );
    }

    #[test]
    fn test_decode_load_store_multiple() {
        // POP.W {R4-R11, PC} -> LDMIA SP!, {...}
        assert_eq!(
            decode_thumb_32(0xE8BD, 0x8FF0),
            Thumb32::LoadMultiple {
                rn: 13,
                registers: 0x8FF0,
                wback: true,
                db: false
            }
        );
        // PUSH.W {R4-R11, LR} -> STMDB SP!, {...}
        assert_eq!(
            decode_thumb_32(0xE92D, 0x4FF0),
            Thumb32::StoreMultiple {
                rn: 13,
                registers: 0x4FF0,
                wback: true,
                db: true
            }
        );
    }

    #[test]
    fn test_decode_dual_exclusive_table() {
        // LDRD R0, R1, [R2, #8] -> 1110 1001 1101 0010 | 0000 0001 0000 0010
        assert_eq!(
            decode_thumb_32(0xE9D2, 0x0102),
            Thumb32::LoadStoreDual {
                load: true,
                rt: 0,
                rt2: 1,
                rn: 2,
                imm: 8,
                add: true,
                index: true,
                wback: false
            }
        );
        // LDREX R0, [R1] -> 1110 1000 0101 0001 | 0000 1111 0000 0000
        assert_eq!(
            decode_thumb_32(0xE851, 0x0F00),
            Thumb32::LoadExclusive {
                size: ExclusiveSize::Word,
                rt: 0,
                rn: 1,
                imm: 0
            }
        );
        // STREX R2, R0, [R1] -> 1110 1000 0100 0001 | 0000 0010 0000 0000
        assert_eq!(
            decode_thumb_32(0xE841, 0x0200),
            Thumb32::StoreExclusive {
                size: ExclusiveSize::Word,
                rd: 2,
                rt: 0,
                rn: 1,
                imm: 0
            }
        );
        // TBB [PC, R1] -> 1110 1000 1101 1111 | 1111 0000 0000 0001
        assert_eq!(
            decode_thumb_32(0xE8DF, 0xF001),
            Thumb32::TableBranch {
                half: false,
                rn: 15,
                rm: 1
            }
        );
        // TBH [R0, R1, LSL #1]
        assert_eq!(
            decode_thumb_32(0xE8D0, 0xF011),
            Thumb32::TableBranch {
                half: true,
                rn: 0,
                rm: 1
            }
        );
    }

    #[test]
    fn test_decode_load_store_single() {
        // LDR.W R0, [R1, #0x123] -> 1111 1000 1101 0001 | 0000 0001 0010 0011
        assert_eq!(
            decode_thumb_32(0xF8D1, 0x0123),
            Thumb32::LoadStore {
                op: MemOp::Ldr,
                rt: 0,
                rn: 1,
                addressing: Addressing::Immediate {
                    imm: 0x123,
                    add: true,
                    index: true,
                    wback: false
                }
            }
        );
        // STR R0, [R1, #-4]! -> 1111 1000 0100 0001 | 0000 1101 0000 0100
        assert_eq!(
            decode_thumb_32(0xF841, 0x0D04),
            Thumb32::LoadStore {
                op: MemOp::Str,
                rt: 0,
                rn: 1,
                addressing: Addressing::Immediate {
                    imm: 4,
                    add: false,
                    index: true,
                    wback: true
                }
            }
        );
        // LDRSH.W R0, [R1, R2, LSL #1] -> 1111 1001 0011 0001 | 0000 0000 0001 0010
        assert_eq!(
            decode_thumb_32(0xF931, 0x0012),
            Thumb32::LoadStore {
                op: MemOp::Ldrsh,
                rt: 0,
                rn: 1,
                addressing: Addressing::Register { rm: 2, shift: 1 }
            }
        );
        // LDR.W R3, [PC, #-8] -> 1111 1000 0101 1111 | 0011 0000 0000 1000
        assert_eq!(
            decode_thumb_32(0xF85F, 0x3008),
            Thumb32::LoadLiteral {
                op: MemOp::Ldr,
                rt: 3,
                imm: 8,
                add: false
            }
        );
        // PLD [R0, #16] -> 1111 1000 1001 0000 | 1111 0000 0001 0000
        assert_eq!(decode_thumb_32(0xF890, 0xF010), Thumb32::Preload);
    }

    #[test]
    fn test_decode_dp_register() {
        // LSLS.W R0, R1, R2 -> 1111 1010 0001 0001 | 1111 0000 0000 0010
        assert_eq!(
            decode_thumb_32(0xFA11, 0xF002),
            Thumb32::ShiftReg {
                ty: ShiftType::Lsl,
                s: true,
                rd: 0,
                rn: 1,
                rm: 2
            }
        );
        // UXTAB R0, R1, R2, ROR #8 -> 1111 1010 0101 0001 | 1111 0000 1001 0010
        assert_eq!(
            decode_thumb_32(0xFA51, 0xF092),
            Thumb32::Extend {
                op: ExtendOp::Uxtb,
                rd: 0,
                rn: 1,
                rm: 2,
                rotation: 8
            }
        );
        // CLZ R0, R1 -> 1111 1010 1011 0001 | 1111 0000 1000 0001
        assert_eq!(
            decode_thumb_32(0xFAB1, 0xF081),
            Thumb32::Reverse {
                op: ReverseOp::Clz,
                rd: 0,
                rm: 1
            }
        );
        // RBIT R0, R1 -> 1111 1010 1001 0001 | 1111 0000 1010 0001
        assert_eq!(
            decode_thumb_32(0xFA91, 0xF0A1),
            Thumb32::Reverse {
                op: ReverseOp::Rbit,
                rd: 0,
                rm: 1
            }
        );
        // SADD16 R0, R1, R2 -> DSP
        assert_eq!(decode_thumb_32(0xFA91, 0xF002), Thumb32::Dsp);
    }

    #[test]
    fn test_decode_multiply_divide() {
        // MUL R0, R1, R2 -> 1111 1011 0000 0001 | 1111 0000 0000 0010
        assert_eq!(
            decode_thumb_32(0xFB01, 0xF002),
            Thumb32::Mul { rd: 0, rn: 1, rm: 2 }
        );
        // MLS R0, R1, R2, R3
        assert_eq!(
            decode_thumb_32(0xFB01, 0x3012),
            Thumb32::Mls {
                rd: 0,
                rn: 1,
                rm: 2,
                ra: 3
            }
        );
        // UMULL R0, R1, R2, R3 -> 1111 1011 1010 0010 | 0000 0001 0000 0011
        assert_eq!(
            decode_thumb_32(0xFBA2, 0x0103),
            Thumb32::LongMultiply {
                op: LongMulOp::Umull,
                rdlo: 0,
                rdhi: 1,
                rn: 2,
                rm: 3
            }
        );
        // UDIV R0, R1, R2 -> 1111 1011 1011 0001 | 1111 0000 1111 0010
        assert_eq!(
            decode_thumb_32(0xFBB1, 0xF0F2),
            Thumb32::Divide {
                signed: false,
                rd: 0,
                rn: 1,
                rm: 2
            }
        );
    }

    #[test]
    fn test_decode_coprocessor_space() {
        // VADD.F32 S0, S0, S1 -> 1110 1110 0011 0000 | 0000 1010 0010 0000
        assert_eq!(decode_thumb_32(0xEE30, 0x0A20), Thumb32::Coprocessor);
        // VLDR S0, [R0] -> 1110 1101 1001 0000 | 0000 1010 0000 0000
        assert_eq!(decode_thumb_32(0xED90, 0x0A00), Thumb32::Coprocessor);
    }
}
