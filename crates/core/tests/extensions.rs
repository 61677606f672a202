// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use m4sim_core::cpu::FP_INVALID_OPERATION_EXCEPTION;
use m4sim_core::memory::LinearMemory;
use m4sim_core::{Bus, Capabilities, CortexM, Extension, Fault, Flow, MemoryMap, SimResult};
use std::sync::{Arc, Mutex};

// VADD.F32 S0, S0, S1
const VADD: u32 = 0xEE30_0A20;
// VDIV.F32 S0, S0, S1
const VDIV: u32 = 0xEE80_0A20;
// QADD R0, R2, R1
const QADD: u32 = 0xFA82_F081;

#[derive(Debug, Default)]
struct RecordingUnit {
    seen: Arc<Mutex<Vec<u32>>>,
}

impl Extension for RecordingUnit {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn execute(&mut self, cpu: &mut CortexM, _bus: &mut dyn Bus, opcode: u32) -> SimResult<Flow> {
        self.seen.lock().unwrap().push(opcode);
        if opcode == VDIV {
            cpu.signal_fp_invalid_operation();
        }
        cpu.regs[0] = 0x3F80_0000;
        Ok(Flow::Next)
    }
}

fn machine(opcode: u32) -> (CortexM, MemoryMap) {
    let mut bus = MemoryMap::new(
        LinearMemory::new(0x1000, 0x0000_0000),
        LinearMemory::new(0x1000, 0x2000_0000),
    );
    bus.code.data[0x100..0x102].copy_from_slice(&((opcode >> 16) as u16).to_le_bytes());
    bus.code.data[0x102..0x104].copy_from_slice(&(opcode as u16).to_le_bytes());
    let mut cpu = CortexM::new();
    cpu.set_pc(0x100);
    (cpu, bus)
}

#[test]
fn test_fpu_dispatch_requires_capability() {
    let (mut cpu, mut bus) = machine(VADD);
    let unit = RecordingUnit::default();
    let seen = unit.seen.clone();
    cpu.install_fpu(Box::new(unit));

    assert!(matches!(
        cpu.step(&mut bus),
        Err(Fault::Unsupported { opcode: VADD, pc: 0x100 })
    ));
    assert!(seen.lock().unwrap().is_empty());

    cpu.clear_fault();
    cpu.capabilities = Capabilities::FPU;
    cpu.step(&mut bus).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![VADD]);
    assert_eq!(cpu.regs[0], 0x3F80_0000);
    assert_eq!(cpu.pc(), 0x104);
}

#[test]
fn test_enabled_unit_without_handler_faults() {
    let (mut cpu, mut bus) = machine(QADD);
    cpu.capabilities = Capabilities::DSP;
    assert!(matches!(
        cpu.step(&mut bus),
        Err(Fault::Unsupported { .. })
    ));
}

#[test]
fn test_dsp_space_reaches_dsp_unit() {
    let (mut cpu, mut bus) = machine(QADD);
    let fpu = RecordingUnit::default();
    let dsp = RecordingUnit::default();
    let (fpu_seen, dsp_seen) = (fpu.seen.clone(), dsp.seen.clone());
    cpu.install_fpu(Box::new(fpu));
    cpu.install_dsp(Box::new(dsp));
    cpu.capabilities = Capabilities::FPU | Capabilities::DSP;

    cpu.step(&mut bus).unwrap();
    assert!(fpu_seen.lock().unwrap().is_empty());
    assert_eq!(*dsp_seen.lock().unwrap(), vec![QADD]);
}

#[test]
fn test_invalid_operation_raises_exception_when_enabled() {
    let raised = Arc::new(Mutex::new(Vec::new()));
    let hook_log = raised.clone();

    let (mut cpu, mut bus) = machine(VDIV);
    cpu.capabilities = Capabilities::FPU;
    cpu.install_fpu(Box::new(RecordingUnit::default()));
    cpu.set_exception_hook(Box::new(move |n| hook_log.lock().unwrap().push(n)));

    cpu.step(&mut bus).unwrap();
    assert!(raised.lock().unwrap().is_empty());

    cpu.set_pc(0x100);
    cpu.interrupts_enabled = true;
    cpu.step(&mut bus).unwrap();
    assert_eq!(*raised.lock().unwrap(), vec![FP_INVALID_OPERATION_EXCEPTION]);
}

#[test]
fn test_signal_without_hook_is_ignored() {
    let mut cpu = CortexM::new();
    cpu.interrupts_enabled = true;
    assert!(!cpu.signal_fp_invalid_operation());
}
