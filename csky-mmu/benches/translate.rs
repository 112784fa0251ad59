use criterion::{Criterion, black_box, criterion_group, criterion_main};
use csky_core::{CpuModel, FlatRam, GuestMem, MemCtx, PhysBus, World};
use csky_mmu::regs::{CP0_CCR, CP15_MCIR, CP15_MEH, CP15_MEL0, CP15_MEL1, MCIR_TLBWR};
use csky_mmu::Mmu;

fn sup() -> MemCtx {
    MemCtx::supervisor(World::NonTrust)
}

/// 基准测试: 恒等模式读取 (无翻译开销基线)
fn bench_nommu_read(c: &mut Criterion) {
    let mut mmu = Mmu::new(FlatRam::new(0, 1 << 20), CpuModel::Ck610.features());
    PhysBus::write(&mut mmu.bus, 0x1000, 0x1234_5678, 4).unwrap();

    c.bench_function("nommu_read", |b| {
        b.iter(|| {
            let va = black_box(0x1000u32);
            GuestMem::read(&mut mmu, va, 4, sup()).unwrap()
        })
    });
}

/// 基准测试: 段窗口直通读取
fn bench_msa_window_read(c: &mut Criterion) {
    let mut mmu = Mmu::new(FlatRam::new(0, 1 << 20), CpuModel::Ck610.features());
    PhysBus::write(&mut mmu.bus, 0x2000, 0xdead_beef, 4).unwrap();
    mmu.cp0_write(CP0_CCR, 2);

    c.bench_function("msa_window_read", |b| {
        b.iter(|| {
            let va = black_box(0x8000_2000u32);
            GuestMem::read(&mut mmu, va, 4, sup()).unwrap()
        })
    });
}

/// 基准测试: TLB 命中路径
fn bench_tlb_hit_read(c: &mut Criterion) {
    let mut mmu = Mmu::new(FlatRam::new(0, 1 << 20), CpuModel::Ck610.features());
    PhysBus::write(&mut mmu.bus, 0x3000, 0xcafe_f00d, 4).unwrap();
    mmu.cp0_write(CP0_CCR, 2);

    let w = World::NonTrust;
    mmu.cp15_write(CP15_MEH, 0x0000_2000, w);
    mmu.cp15_write(CP15_MEL0, 0x2000 | 0x6, w);
    mmu.cp15_write(CP15_MEL1, 0x3000 | 0x6, w);
    mmu.cp15_write(CP15_MCIR, MCIR_TLBWR, w);

    c.bench_function("tlb_hit_read", |b| {
        b.iter(|| {
            let va = black_box(0x3000u32);
            GuestMem::read(&mut mmu, va, 4, sup()).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_nommu_read,
    bench_msa_window_read,
    bench_tlb_hit_read
);
criterion_main!(benches);
