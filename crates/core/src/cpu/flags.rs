// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Condition flag engine shared by both executors.

use super::psr::Psr;
use crate::decoder::ShiftType;
use bitflags::bitflags;

bitflags! {
    /// Which PSR fields an `update_flags` call may write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FlagMask: u8 {
        const N = 0x01;
        const Z = 0x02;
        const C = 0x04;
        const V = 0x08;
        const Q = 0x10;
        const GE = 0x20;

        const NZ = Self::N.bits() | Self::Z.bits();
        const NZC = Self::NZ.bits() | Self::C.bits();
        const NZCV = Self::NZC.bits() | Self::V.bits();
    }
}

/// The operation that produced a result, which decides how C, V, Q and GE
/// are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Add,
    Adc,
    Sub,
    Sbc,
    /// Reverse subtract: `result = op2 - op1`.
    Rsb,
    Cmp,
    Cmn,
    Lsl,
    Lsr,
    Asr,
    Ror,
    Rrx,
    And,
    Orr,
    Eor,
    Bic,
    Orn,
    Mvn,
    Mov,
    Mul,
    Tst,
    Teq,
    Ssat,
    Usat,
    Sadd16,
    Uadd16,
}

impl From<ShiftType> for OpKind {
    fn from(ty: ShiftType) -> Self {
        match ty {
            ShiftType::Lsl => OpKind::Lsl,
            ShiftType::Lsr => OpKind::Lsr,
            ShiftType::Asr => OpKind::Asr,
            ShiftType::Ror => OpKind::Ror,
            ShiftType::Rrx => OpKind::Rrx,
        }
    }
}

/// Updates the fields of `psr` selected by `mask` for `result`, computed
/// from `op1` and `op2` by `kind`. Shift kinds take the shifted value as
/// `op1` and the amount as `shift_amount`; ADC/SBC read their carry-in
/// from `psr` before it is overwritten.
pub fn update_flags(
    psr: &mut Psr,
    result: u32,
    op1: u32,
    op2: u32,
    kind: OpKind,
    shift_amount: u32,
    mask: FlagMask,
) {
    if mask.contains(FlagMask::N) {
        psr.n = result & 0x8000_0000 != 0;
    }
    if mask.contains(FlagMask::Z) {
        psr.z = result == 0;
    }

    let carry_in = psr.c;
    let (carry, overflow) = match kind {
        OpKind::Add | OpKind::Cmn => (
            op1 as u64 + op2 as u64 > u32::MAX as u64,
            add_overflow(op1, op2, result),
        ),
        OpKind::Adc => (
            op1 as u64 + op2 as u64 + carry_in as u64 > u32::MAX as u64,
            add_overflow(op1, op2, result),
        ),
        OpKind::Sub | OpKind::Cmp => (op1 >= op2, sub_overflow(op1, op2, result)),
        OpKind::Sbc => (
            op1 as u64 >= op2 as u64 + (!carry_in) as u64,
            sub_overflow(op1, op2, result),
        ),
        OpKind::Rsb => (op2 >= op1, sub_overflow(op2, op1, result)),
        OpKind::Lsl | OpKind::Lsr | OpKind::Asr | OpKind::Ror | OpKind::Rrx => {
            (shift_carry(kind, op1, shift_amount, carry_in), psr.v)
        }
        _ => (psr.c, psr.v),
    };

    if mask.contains(FlagMask::C) {
        psr.c = carry;
    }
    if mask.contains(FlagMask::V) {
        psr.v = overflow;
    }

    if mask.contains(FlagMask::Q) && matches!(kind, OpKind::Ssat | OpKind::Usat) && result != op1
    {
        psr.q = true;
    }

    if mask.contains(FlagMask::GE) {
        match kind {
            OpKind::Sadd16 => {
                let lo = (op1 as u16 as i16 as i32) + (op2 as u16 as i16 as i32);
                let hi = ((op1 >> 16) as u16 as i16 as i32) + ((op2 >> 16) as u16 as i16 as i32);
                psr.ge = ge_lanes(lo >= 0, hi >= 0);
            }
            OpKind::Uadd16 => {
                let lo = (op1 & 0xFFFF) + (op2 & 0xFFFF);
                let hi = (op1 >> 16) + (op2 >> 16);
                psr.ge = ge_lanes(lo >= 0x1_0000, hi >= 0x1_0000);
            }
            _ => {}
        }
    }
}

fn ge_lanes(lo: bool, hi: bool) -> u8 {
    (if lo { 0b0011 } else { 0 }) | (if hi { 0b1100 } else { 0 })
}

#[inline(always)]
fn add_overflow(op1: u32, op2: u32, result: u32) -> bool {
    ((op1 ^ result) & (op2 ^ result)) & 0x8000_0000 != 0
}

#[inline(always)]
fn sub_overflow(op1: u32, op2: u32, result: u32) -> bool {
    ((op1 ^ op2) & (op1 ^ result)) & 0x8000_0000 != 0
}

/// Last bit shifted out of `value`. An amount of zero keeps `carry_in`.
fn shift_carry(kind: OpKind, value: u32, amount: u32, carry_in: bool) -> bool {
    if kind == OpKind::Rrx {
        return value & 1 != 0;
    }
    if amount == 0 {
        return carry_in;
    }
    match kind {
        OpKind::Lsl if amount <= 32 => (value >> (32 - amount)) & 1 != 0,
        OpKind::Lsr if amount <= 32 => (value >> (amount - 1)) & 1 != 0,
        OpKind::Lsl | OpKind::Lsr => false,
        OpKind::Asr if amount < 32 => (value >> (amount - 1)) & 1 != 0,
        OpKind::Asr => value & 0x8000_0000 != 0,
        _ => {
            let m = amount % 32;
            if m == 0 {
                value & 0x8000_0000 != 0
            } else {
                (value >> (m - 1)) & 1 != 0
            }
        }
    }
}

/// Shifts `value` without touching flags. Amounts past the register width
/// follow the architectural results (zero or sign fill).
pub fn shift(value: u32, ty: ShiftType, amount: u32, carry_in: bool) -> u32 {
    match ty {
        ShiftType::Lsl if amount < 32 => value << amount,
        ShiftType::Lsr if amount < 32 => value >> amount,
        ShiftType::Lsl | ShiftType::Lsr => 0,
        ShiftType::Asr => ((value as i32) >> amount.min(31)) as u32,
        ShiftType::Ror => value.rotate_right(amount % 32),
        ShiftType::Rrx => ((carry_in as u32) << 31) | (value >> 1),
    }
}

/// ThumbExpandImm: expands the 12-bit `i:imm3:imm8` field.
/// Returns the constant and, for rotated forms, `(unrotated, rotation)` so
/// callers can derive the carry through [`update_flags`] with `OpKind::Ror`.
pub fn thumb_expand_imm(imm12: u16) -> (u32, Option<(u32, u32)>) {
    let imm8 = (imm12 & 0xFF) as u32;
    match (imm12 >> 8) & 0xF {
        0 => (imm8, None),
        1 => ((imm8 << 16) | imm8, None),
        2 => ((imm8 << 24) | (imm8 << 8), None),
        3 => ((imm8 << 24) | (imm8 << 16) | (imm8 << 8) | imm8, None),
        _ => {
            let unrotated = 0x80 | (imm8 & 0x7F);
            let rotation = ((imm12 >> 7) & 0x1F) as u32;
            (unrotated.rotate_right(rotation), Some((unrotated, rotation)))
        }
    }
}
