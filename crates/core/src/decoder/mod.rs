// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod thumb16;
pub mod thumb32;

pub use thumb16::{decode_thumb_16, Thumb16};
pub use thumb32::{decode_thumb_32, Thumb32};

/// True if `hw1` is the first half of a 32-bit instruction
/// (top five bits 0b11101, 0b11110 or 0b11111).
#[inline(always)]
pub fn is_32bit(hw1: u16) -> bool {
    matches!(hw1 >> 11, 0b11101 | 0b11110 | 0b11111)
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ShiftType {
    Lsl,
    Lsr,
    Asr,
    Ror,
    /// Rotate right by one through carry.
    Rrx,
}

impl ShiftType {
    pub fn from_bits(bits: u16) -> Self {
        match bits & 0x3 {
            0 => ShiftType::Lsl,
            1 => ShiftType::Lsr,
            2 => ShiftType::Asr,
            _ => ShiftType::Ror,
        }
    }
}

/// DecodeImmShift: a 2-bit type and 5-bit amount into an effective shift.
/// LSR/ASR #0 mean a shift of 32 and ROR #0 is RRX.
pub fn decode_imm_shift(ty: u16, imm5: u8) -> (ShiftType, u8) {
    match (ShiftType::from_bits(ty), imm5) {
        (ShiftType::Lsr, 0) => (ShiftType::Lsr, 32),
        (ShiftType::Asr, 0) => (ShiftType::Asr, 32),
        (ShiftType::Ror, 0) => (ShiftType::Rrx, 1),
        (t, n) => (t, n),
    }
}

/// Width and signedness of a single load or store.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MemOp {
    Str,
    Strh,
    Strb,
    Ldrsb,
    Ldr,
    Ldrh,
    Ldrb,
    Ldrsh,
}

impl MemOp {
    pub fn is_load(self) -> bool {
        !matches!(self, MemOp::Str | MemOp::Strh | MemOp::Strb)
    }

    /// Access size in bytes, which is also the required alignment.
    pub fn size(self) -> u32 {
        match self {
            MemOp::Str | MemOp::Ldr => 4,
            MemOp::Strh | MemOp::Ldrh | MemOp::Ldrsh => 2,
            MemOp::Strb | MemOp::Ldrb | MemOp::Ldrsb => 1,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExtendOp {
    Sxth,
    Sxtb,
    Uxth,
    Uxtb,
}

impl ExtendOp {
    pub fn apply(self, value: u32) -> u32 {
        match self {
            ExtendOp::Sxth => value as u16 as i16 as i32 as u32,
            ExtendOp::Sxtb => value as u8 as i8 as i32 as u32,
            ExtendOp::Uxth => value & 0xFFFF,
            ExtendOp::Uxtb => value & 0xFF,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ReverseOp {
    Rev,
    Rev16,
    Revsh,
    Rbit,
    Clz,
}

impl ReverseOp {
    pub fn apply(self, value: u32) -> u32 {
        match self {
            ReverseOp::Rev => value.swap_bytes(),
            ReverseOp::Rev16 => ((value & 0xFF00_FF00) >> 8) | ((value & 0x00FF_00FF) << 8),
            ReverseOp::Revsh => (value as u16).swap_bytes() as i16 as i32 as u32,
            ReverseOp::Rbit => value.reverse_bits(),
            ReverseOp::Clz => value.leading_zeros(),
        }
    }
}

/// Sign-extends the low `bits` bits of `value`.
#[inline]
pub fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}
