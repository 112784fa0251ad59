//! 解码与翻译驱动基准测试
//!
//! 测试内容:
//! 1. 16 位解码表吞吐
//! 2. 32 位解码表吞吐
//! 3. translate_block 按块长聚合的开销

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use csky_core::{CpuModel, CpuState, FlatRam};
use csky_frontend::api::*;
use csky_frontend::{decode16, decode32, translate_block};
use csky_ir::BlockBuilder;

fn benchmark_decode16(c: &mut Criterion) {
    let insns: Vec<u16> = vec![
        encode_movi16(2, 5),
        encode_alu16(0, 3, 2),
        encode_ld16(2, 1, 2, 3),
        encode_st16(2, 1, 2, 3),
        encode_cmp16(1, 4, 5),
        encode_shift16(0, 6, 7),
        encode_lrw16(1, 8),
        encode_br16(32),
    ];

    c.bench_function("decode16_mixed", |b| {
        b.iter(|| {
            for &hw in &insns {
                let mut builder = BlockBuilder::new(0x1000);
                builder.begin_insn(0x1000, 2);
                decode16(&mut builder, black_box(hw), 0x1000);
                black_box(builder.build());
            }
        });
    });
}

fn benchmark_decode32(c: &mut Criterion) {
    let feats = CpuModel::Ck810.features();
    let insns: Vec<u32> = vec![
        encode_alu32(0, 1, 2, 3, 0),
        encode_imm12(0, 2, 1, 100),
        encode_movih32(4, 0x8000),
        encode_ld32(2, 3, 4, 5),
        encode_st32(2, 3, 4, 5),
        encode_ldr32(2, 3, 4, 5, 2),
        encode_bez32(5, 0x40),
        encode_fpu32(0, 1, 2, 3, false),
        encode_dsp32(0, 1, 2, 3, 0),
        encode_bsr32(0x1000),
    ];

    c.bench_function("decode32_mixed", |b| {
        b.iter(|| {
            for &raw in &insns {
                let mut builder = BlockBuilder::new(0x1000);
                builder.begin_insn(0x1000, 4);
                decode32(&mut builder, black_box(raw), 0x1000, feats, true);
                black_box(builder.build());
            }
        });
    });
}

fn benchmark_translate_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate_block");

    for icount in [4usize, 16, 64] {
        let mut image = Vec::new();
        for i in 0..icount {
            image.extend_from_slice(&encode_movi16(1, (i & 0x7f) as u8).to_le_bytes());
        }
        let mut cpu = CpuState::new(CpuModel::Ck810);
        cpu.reset(0x1000);
        let mut ram = FlatRam::new(0, 0x10000);
        ram.load(0x1000, &image);

        group.bench_with_input(BenchmarkId::from_parameter(icount), &icount, |b, &n| {
            b.iter(|| {
                let blk = translate_block(&cpu, &mut ram, n).unwrap();
                black_box(blk);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_decode16,
    benchmark_decode32,
    benchmark_translate_block
);
criterion_main!(benches);
