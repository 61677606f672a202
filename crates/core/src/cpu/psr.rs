// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

// xPSR bit positions
const PSR_N: u32 = 1 << 31;
const PSR_Z: u32 = 1 << 30;
const PSR_C: u32 = 1 << 29;
const PSR_V: u32 = 1 << 28;
const PSR_Q: u32 = 1 << 27;
const PSR_T: u32 = 1 << 24;
const PSR_GE_SHIFT: u32 = 16;

/// Condition codes, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Eq,
    Ne,
    Cs,
    Cc,
    Mi,
    Pl,
    Vs,
    Vc,
    Hi,
    Ls,
    Ge,
    Lt,
    Gt,
    Le,
    Al,
    /// 0b1111; only meaningful as "always" in IT state.
    Nv,
}

impl Condition {
    const TABLE: [Condition; 16] = [
        Condition::Eq,
        Condition::Ne,
        Condition::Cs,
        Condition::Cc,
        Condition::Mi,
        Condition::Pl,
        Condition::Vs,
        Condition::Vc,
        Condition::Hi,
        Condition::Ls,
        Condition::Ge,
        Condition::Lt,
        Condition::Gt,
        Condition::Le,
        Condition::Al,
        Condition::Nv,
    ];

    pub fn from_bits(bits: u8) -> Self {
        Self::TABLE[(bits & 0xF) as usize]
    }
}

/// Program status: the APSR flags, the Thumb bit and the IT state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Psr {
    pub n: bool,
    pub z: bool,
    pub c: bool,
    pub v: bool,
    /// Sticky saturation flag.
    pub q: bool,
    /// Per-byte greater-than-or-equal flags (bits 3:0).
    pub ge: u8,
    /// Thumb execution state. ARMv7-M only executes with this set.
    pub t: bool,
    /// ITSTATE: firstcond[3:1] in bits 7:5, mask in bits 4:0.
    pub it: u8,
}

impl Psr {
    pub fn thumb() -> Self {
        Self {
            t: true,
            ..Self::default()
        }
    }

    pub fn condition_passed(&self, cond: Condition) -> bool {
        let (n, z, c, v) = (self.n, self.z, self.c, self.v);
        match cond {
            Condition::Eq => z,
            Condition::Ne => !z,
            Condition::Cs => c,
            Condition::Cc => !c,
            Condition::Mi => n,
            Condition::Pl => !n,
            Condition::Vs => v,
            Condition::Vc => !v,
            Condition::Hi => c && !z,
            Condition::Ls => !c || z,
            Condition::Ge => n == v,
            Condition::Lt => n != v,
            Condition::Gt => !z && n == v,
            Condition::Le => z || n != v,
            Condition::Al | Condition::Nv => true,
        }
    }

    pub fn in_it_block(&self) -> bool {
        self.it & 0xF != 0
    }

    pub fn it_condition(&self) -> Condition {
        Condition::from_bits(self.it >> 4)
    }

    pub fn last_in_it_block(&self) -> bool {
        self.it & 0xF == 0x8
    }

    /// ITAdvance()
    pub fn it_advance(&mut self) {
        if self.it & 0x7 == 0 {
            self.it = 0;
        } else {
            self.it = (self.it & 0xE0) | ((self.it << 1) & 0x1F);
        }
    }

    pub fn clear_q(&mut self) {
        self.q = false;
    }

    /// Packs into the architectural xPSR layout.
    pub fn to_xpsr(&self) -> u32 {
        let mut xpsr = 0;
        if self.n {
            xpsr |= PSR_N;
        }
        if self.z {
            xpsr |= PSR_Z;
        }
        if self.c {
            xpsr |= PSR_C;
        }
        if self.v {
            xpsr |= PSR_V;
        }
        if self.q {
            xpsr |= PSR_Q;
        }
        if self.t {
            xpsr |= PSR_T;
        }
        let it = self.it as u32;
        xpsr |= (it & 0x3) << 25;
        xpsr |= ((it >> 2) & 0x3F) << 10;
        xpsr |= ((self.ge & 0xF) as u32) << PSR_GE_SHIFT;
        xpsr
    }

    pub fn from_xpsr(xpsr: u32) -> Self {
        let it = (((xpsr >> 25) & 0x3) | (((xpsr >> 10) & 0x3F) << 2)) as u8;
        Self {
            n: xpsr & PSR_N != 0,
            z: xpsr & PSR_Z != 0,
            c: xpsr & PSR_C != 0,
            v: xpsr & PSR_V != 0,
            q: xpsr & PSR_Q != 0,
            ge: ((xpsr >> PSR_GE_SHIFT) & 0xF) as u8,
            t: xpsr & PSR_T != 0,
            it,
        }
    }
}
