// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use m4sim_core::memory::LinearMemory;
use m4sim_core::{CortexM, MemoryMap};
use std::hint::black_box;

const STEPS: u64 = 10_000;

// loop: ADDS R0, #1; EORS R1, R0; LSLS R2, R1, #3; STR R2, [R3, #0];
//       LDR.W R4, [R3, #0]; B loop
const LOOP: [u16; 7] = [0x3001, 0x4041, 0x00CA, 0x601A, 0xF8D3, 0x4000, 0xE7F8];

fn machine() -> (CortexM, MemoryMap) {
    let mut bus = MemoryMap::new(
        LinearMemory::new(0x1000, 0x0000_0000),
        LinearMemory::new(0x1000, 0x2000_0000),
    );
    for (i, hw) in LOOP.iter().enumerate() {
        let offset = 0x100 + i * 2;
        bus.code.data[offset..offset + 2].copy_from_slice(&hw.to_le_bytes());
    }
    let mut cpu = CortexM::new();
    cpu.set_pc(0x100);
    cpu.regs[3] = 0x2000_0000;
    (cpu, bus)
}

fn fetch_ips(c: &mut Criterion) {
    let mut group = c.benchmark_group("fetch_ips");
    group.throughput(Throughput::Elements(STEPS));
    group.bench_function("tight_loop", |b| {
        let (mut cpu, mut bus) = machine();
        b.iter(|| {
            for _ in 0..STEPS {
                if cpu.step(&mut bus).is_err() {
                    break;
                }
            }
            black_box(cpu.regs[4])
        })
    });
    group.finish();
}

criterion_group!(benches, fetch_ips);
criterion_main!(benches);
