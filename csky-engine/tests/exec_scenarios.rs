//! 端到端执行场景。
//!
//! 每个用例把一段客户机程序（含向量表与处理程序）装入平坦内存，
//! 跑完整的 vcpu 循环，检验：
//! - 陷阱/故障的分发与 rte 返回路径
//! - 除零、对齐、特权违例的向量号与返回地址
//! - 自动向量与向量模式中断、快速中断影子对
//! - idly/sce 窗口对中断与谓词的作用
//! - 指令跟踪、守卫访存、常量池调用、push/pop 调用栈、快照恢复

use csky_core::exception::excp;
use csky_core::psr::{PSR_FE, PSR_TM_SHIFT, PSR_TP, PSR_VEC_MASK, PSR_VEC_SHIFT};
use csky_core::{CoreConfig, CpuModel, CpuState, Features, FlatRam};
use csky_engine::{ExitReason, Vcpu};
use csky_frontend::api::*;
use csky_ir::WaitKind;

fn push16(img: &mut Vec<u8>, hw: u16) {
    img.extend_from_slice(&hw.to_le_bytes());
}

fn push32(img: &mut Vec<u8>, w: u32) {
    push16(img, (w >> 16) as u16);
    push16(img, w as u16);
}

/// 数据字按小端整字存放（区别于指令的高半字在前）。
fn push_data(img: &mut Vec<u8>, w: u32) {
    img.extend_from_slice(&w.to_le_bytes());
}

/// 组一台 32 KiB 平坦内存的机器，把各段代码/数据装到指定地址。
/// 复位后 VBR=0，向量表表项即物理地址 `vec * 4`。
fn boot(cfg: &CoreConfig, regions: &[(u32, &[u8])]) -> Vcpu<FlatRam> {
    let mut ram = FlatRam::new(0, 0x8000);
    for (addr, bytes) in regions {
        ram.load(*addr, bytes);
    }
    Vcpu::new(cfg, ram)
}

fn vec_entry(vec: u32, target: u32) -> (u32, Vec<u8>) {
    (vec * 4, target.to_le_bytes().to_vec())
}

fn entry_cfg(entry: u32) -> CoreConfig {
    CoreConfig {
        entry,
        ..Default::default()
    }
}

fn vec_field(cpu: &CpuState) -> u32 {
    (cpu.psr_read() & PSR_VEC_MASK) >> PSR_VEC_SHIFT
}

#[test]
fn test_trap_dispatch_and_rte_roundtrip() {
    // 主流程：r2=1; trap 0; r3=9; wait
    let mut main = Vec::new();
    push16(&mut main, encode_movi16(2, 1));
    push32(&mut main, encode_sys32(6, 0)); // trap 0
    push16(&mut main, encode_movi16(3, 9));
    push32(&mut main, encode_sys32(3, 0)); // wait
    // 处理程序：r4=5; rte
    let mut handler = Vec::new();
    push16(&mut handler, encode_movi16(4, 5));
    push32(&mut handler, encode_sys32(0, 0)); // rte
    let (va, vb) = vec_entry(excp::TRAP0, 0x200);

    let mut vcpu = boot(
        &entry_cfg(0x100),
        &[(0x100, &main), (0x200, &handler), (va, &vb)],
    );
    // 断点放在处理程序入口，借机观察分发后的机器状态
    vcpu.cpu.debug.add_breakpoint(0x200);

    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Breakpoint);
    assert_eq!(vcpu.cpu.pc, 0x200);
    assert_eq!(vec_field(&vcpu.cpu), excp::TRAP0);
    // 陷阱返回到下一条指令
    assert_eq!(vcpu.cpu.epc(), 0x106);
    assert!(vcpu.cpu.supervisor());
    assert_eq!(vcpu.cpu.regs[2], 1);
    assert_eq!(vcpu.cpu.regs[4], 0, "handler not entered yet");

    // 从断点恢复：处理程序执行、rte 回主流程、跑到停机
    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[4], 5);
    assert_eq!(vcpu.cpu.regs[3], 9);
    assert_eq!(vcpu.cpu.stats.exceptions, 1);
    assert_eq!(vcpu.cpu.stats.interrupts, 0);
}

#[test]
fn test_zero_divide_vectors_with_faulting_pc() {
    let mut main = Vec::new();
    push16(&mut main, encode_movi16(1, 10));
    push16(&mut main, encode_movi16(2, 0));
    push32(&mut main, encode_alu32(19, 1, 2, 3, 0)); // divu r3, r1, r2
    push32(&mut main, encode_sys32(3, 0));
    let mut handler = Vec::new();
    push32(&mut handler, encode_sys32(3, 0)); // wait
    let (va, vb) = vec_entry(excp::ZERODIV, 0x300);

    let mut vcpu = boot(
        &entry_cfg(0x100),
        &[(0x100, &main), (0x300, &handler), (va, &vb)],
    );
    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vec_field(&vcpu.cpu), excp::ZERODIV);
    // 同步故障指回出错指令本身
    assert_eq!(vcpu.cpu.epc(), 0x104);
    assert_eq!(vcpu.cpu.regs[3], 0, "quotient not written");
    assert_eq!(vcpu.cpu.stats.exceptions, 1);
}

#[test]
fn test_unaligned_word_load_faults_unless_supported() {
    let mut main = Vec::new();
    push16(&mut main, encode_movi16(1, 0x81));
    push32(&mut main, encode_ld32(2, 2, 1, 0)); // ld.w r2, (r1, 0)
    push32(&mut main, encode_sys32(3, 0));
    let mut handler = Vec::new();
    push32(&mut handler, encode_sys32(3, 0));
    let (va, vb) = vec_entry(excp::ALIGN, 0x300);
    let regions: &[(u32, &[u8])] = &[(0x100, &main), (0x300, &handler), (va, &vb)];

    // CK810 不允许非对齐访问
    let mut vcpu = boot(&entry_cfg(0x100), regions);
    vcpu.run(1000).unwrap();
    assert_eq!(vec_field(&vcpu.cpu), excp::ALIGN);
    assert_eq!(vcpu.cpu.epc(), 0x102);
    assert_eq!(vcpu.cpu.stats.loads, 0);
    assert_eq!(vcpu.cpu.regs[2], 0);

    // CK860 有硬件非对齐支持，同一程序直接跑通
    let cfg = CoreConfig {
        entry: 0x100,
        model: CpuModel::Ck860,
        ..Default::default()
    };
    let mut vcpu = boot(&cfg, regions);
    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.stats.exceptions, 0);
    assert_eq!(vcpu.cpu.stats.loads, 1);
}

#[test]
fn test_guarded_access_honors_guard_register() {
    // vbr=0x400; r3=0x80; 守卫装载; r6=1; wait。守卫打开时 0x80 处
    // 应读到预置数据；守卫关闭时跳到向量基址前一个字的停机指令。
    let mut main = Vec::new();
    push32(&mut main, encode_movi32(1, 0x400));
    push32(&mut main, encode_mtcr32(1, 0, 1)); // mtcr r1, cr<1,0>
    push16(&mut main, encode_movi16(3, 0x80));
    push32(&mut main, encode_guarded32(2, 2, 3, 0)); // 守卫 ld.w r2, (r3, 0)
    push16(&mut main, encode_movi16(6, 1));
    push32(&mut main, encode_sys32(3, 0));
    let mut cell = Vec::new();
    push32(&mut cell, encode_sys32(3, 0)); // 0x3fc：守卫跳转着陆点
    let mut data = Vec::new();
    push_data(&mut data, 0xdead_beef);
    let regions: &[(u32, &[u8])] = &[(0x100, &main), (0x3fc, &cell), (0x80, &data)];

    // 守卫关闭（gcr 复位为 0）：访存被跳过，r15 收下一条指令地址
    let mut vcpu = boot(&entry_cfg(0x100), regions);
    vcpu.cpu.features = vcpu.cpu.features.with(Features::BCTM);
    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.pc, 0x400);
    assert_eq!(vcpu.cpu.regs[15], 0x10e);
    assert_eq!(vcpu.cpu.regs[2], 0);
    assert_eq!(vcpu.cpu.regs[6], 0, "fall-through path not taken");
    assert_eq!(vcpu.cpu.stats.loads, 0);

    // 守卫打开：正常装载并继续
    let mut vcpu = boot(&entry_cfg(0x100), regions);
    vcpu.cpu.features = vcpu.cpu.features.with(Features::BCTM);
    vcpu.cpu.gcr = 1;
    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[2], 0xdead_beef);
    assert_eq!(vcpu.cpu.regs[6], 1);
    assert_eq!(vcpu.cpu.stats.loads, 1);
}

#[test]
fn test_autovector_interrupt_enters_handler() {
    // psrset ie 之后的同步点立即看到挂起的中断线
    let mut main = Vec::new();
    push32(&mut main, encode_psrset32(0x04)); // IE
    push16(&mut main, encode_movi16(3, 3));
    push32(&mut main, encode_sys32(3, 0));
    let mut handler = Vec::new();
    push16(&mut handler, encode_movi16(7, 1));
    push32(&mut handler, encode_sys32(3, 0));
    let (va, vb) = vec_entry(excp::INT, 0x500);

    let mut vcpu = boot(
        &entry_cfg(0x100),
        &[(0x100, &main), (0x500, &handler), (va, &vb)],
    );
    vcpu.intc.raise_irq(0);

    let exit = vcpu.run(1000).unwrap();
    // 分发清 IE，处理程序停机后电平线叫不醒它
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[7], 1);
    assert_eq!(vcpu.cpu.regs[3], 0, "preempted before movi");
    assert_eq!(vcpu.cpu.epc(), 0x104);
    assert_eq!(vcpu.cpu.stats.interrupts, 1);
    assert_eq!(vcpu.cpu.stats.exceptions, 1);
}

#[test]
fn test_vectored_fiq_uses_shadow_pair() {
    let mut main = Vec::new();
    push32(&mut main, encode_psrset32(0x02)); // FE
    push32(&mut main, encode_sys32(3, 0));
    let mut handler = Vec::new();
    push16(&mut handler, encode_movi16(7, 2));
    push32(&mut handler, encode_sys32(3, 0));
    let (va, vb) = vec_entry(excp::VECTORED_BASE + 3, 0x500);

    let cfg = CoreConfig {
        entry: 0x100,
        vectored_irq: true,
        ..Default::default()
    };
    let mut vcpu = boot(&cfg, &[(0x100, &main), (0x500, &handler), (va, &vb)]);
    vcpu.intc.raise_fiq(3);

    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[7], 2);
    assert_eq!(vec_field(&vcpu.cpu), excp::VECTORED_BASE + 3);
    // 快速中断走 FPC/FPSR，普通对不动
    assert_eq!(vcpu.cpu.fpc, 0x104);
    assert_ne!(vcpu.cpu.fpsr & PSR_FE, 0, "saved psr keeps FE");
    assert_eq!(vcpu.cpu.psr_read() & PSR_FE, 0);
    assert_eq!(vcpu.cpu.epc(), 0);
    assert_eq!(vcpu.cpu.stats.interrupts, 1);
}

#[test]
fn test_idly_window_defers_pending_interrupt() {
    // idly 4 的窗口盖住 psrset 与三条 movi：中断在窗口关闭后才进来
    let mut main = Vec::new();
    push32(&mut main, encode_sys32(8, 4)); // idly 4
    push32(&mut main, encode_psrset32(0x04)); // 窗口第 1 条
    push16(&mut main, encode_movi16(1, 1)); // 第 2 条
    push16(&mut main, encode_movi16(2, 2)); // 第 3 条
    push16(&mut main, encode_movi16(3, 3)); // 第 4 条
    push16(&mut main, encode_movi16(4, 4)); // 窗口外
    push32(&mut main, encode_sys32(3, 0));
    let mut handler = Vec::new();
    push16(&mut handler, encode_movi16(7, 1));
    push32(&mut handler, encode_sys32(3, 0));
    let (va, vb) = vec_entry(excp::INT, 0x500);
    let regions: &[(u32, &[u8])] = &[(0x100, &main), (0x500, &handler), (va, &vb)];

    let mut vcpu = boot(&entry_cfg(0x100), regions);
    vcpu.intc.raise_irq(0);
    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[1], 1);
    assert_eq!(vcpu.cpu.regs[2], 2);
    assert_eq!(vcpu.cpu.regs[3], 3);
    assert_eq!(vcpu.cpu.regs[4], 0, "interrupted right after the window");
    assert_eq!(vcpu.cpu.regs[7], 1);
    assert_eq!(vcpu.cpu.epc(), 0x10e);

    // 对照：没有窗口时 psrset 一落地中断就抢进来
    let mut main = Vec::new();
    push32(&mut main, encode_psrset32(0x04));
    push16(&mut main, encode_movi16(1, 1));
    push32(&mut main, encode_sys32(3, 0));
    let mut vcpu = boot(
        &entry_cfg(0x100),
        &[(0x100, &main), (0x500, &handler), (va, &vb)],
    );
    vcpu.intc.raise_irq(0);
    vcpu.run(1000).unwrap();
    assert_eq!(vcpu.cpu.regs[1], 0);
    assert_eq!(vcpu.cpu.epc(), 0x104);
}

#[test]
fn test_sce_window_predicates_follow_c() {
    // cmpne r1, r1 清 C；掩码 0101：第 1/3 条要求 C=1 被跳过，
    // 第 2/4 条要求 C=0 执行
    let mut main = Vec::new();
    push16(&mut main, encode_cmp16(2, 1, 1));
    push32(&mut main, encode_sys32(7, 0b0101)); // sce
    push16(&mut main, encode_movi16(1, 1));
    push16(&mut main, encode_movi16(2, 2));
    push16(&mut main, encode_movi16(3, 3));
    push16(&mut main, encode_movi16(4, 4));
    push32(&mut main, encode_sys32(3, 0));

    let mut vcpu = boot(&entry_cfg(0x100), &[(0x100, &main)]);
    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[1], 0);
    assert_eq!(vcpu.cpu.regs[2], 2);
    assert_eq!(vcpu.cpu.regs[3], 0);
    assert_eq!(vcpu.cpu.regs[4], 4);
    assert_eq!(vcpu.cpu.sce, None, "window fully consumed");
    // 跳过的指令照常退休
    assert_eq!(vcpu.cpu.stats.insns, 7);
}

#[test]
fn test_insn_trace_raises_after_each_insn() {
    // TM=01：每条主流程指令后补挂跟踪异常，处理程序给 r9 计数
    let mut main = Vec::new();
    push16(&mut main, encode_movi16(1, 5));
    push16(&mut main, encode_movi16(2, 6));
    push32(&mut main, encode_sys32(3, 0));
    let mut handler = Vec::new();
    push32(&mut handler, encode_imm12(0, 9, 9, 1)); // addi r9, r9, 1
    push32(&mut handler, encode_sys32(0, 0)); // rte
    let (va, vb) = vec_entry(excp::TRACE, 0x600);

    let mut vcpu = boot(
        &entry_cfg(0x100),
        &[(0x100, &main), (0x600, &handler), (va, &vb)],
    );
    vcpu.cpu.psr_write(vcpu.cpu.psr_read() | (1 << PSR_TM_SHIFT));

    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[1], 5);
    assert_eq!(vcpu.cpu.regs[2], 6);
    // 两条 movi 各跟踪一次；处理程序自身与停机指令不跟踪
    assert_eq!(vcpu.cpu.regs[9], 2);
    assert_eq!(vcpu.cpu.stats.exceptions, 2);
}

#[test]
fn test_rte_with_restored_tp_retraces_immediately() {
    // 陷阱处理程序往 EPSR 里塞 TP 再 rte：跟踪异常先于返回点的
    // 任何指令分发
    let mut main = Vec::new();
    push16(&mut main, encode_movi16(1, 1));
    push32(&mut main, encode_sys32(6, 0)); // trap 0
    push16(&mut main, encode_movi16(2, 2));
    push32(&mut main, encode_sys32(3, 0));
    let mut trap = Vec::new();
    push32(&mut trap, encode_mfcr32(8, 0, 2)); // mfcr r8, cr<2,0>
    push32(&mut trap, encode_movi32(9, PSR_TP));
    push16(&mut trap, encode_alu16(3, 8, 9)); // or r8, r9
    push32(&mut trap, encode_mtcr32(8, 0, 2)); // mtcr r8, cr<2,0>
    push32(&mut trap, encode_sys32(0, 0)); // rte
    let mut trace = Vec::new();
    push16(&mut trace, encode_movi16(10, 1));
    push32(&mut trace, encode_sys32(3, 0));
    let (ta, tb) = vec_entry(excp::TRAP0, 0x200);
    let (ra, rb) = vec_entry(excp::TRACE, 0x600);

    let mut vcpu = boot(
        &entry_cfg(0x100),
        &[(0x100, &main), (0x200, &trap), (0x600, &trace), (ta, &tb), (ra, &rb)],
    );
    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[1], 1);
    assert_eq!(vcpu.cpu.regs[10], 1);
    assert_eq!(vcpu.cpu.regs[2], 0, "trace preempts the return point");
    assert_eq!(vec_field(&vcpu.cpu), excp::TRACE);
    assert_eq!(vcpu.cpu.epc(), 0x106);
    assert_eq!(vcpu.cpu.stats.exceptions, 2);
    assert_eq!(vcpu.cpu.psr_read() & PSR_TP, 0);
}

#[test]
fn test_privilege_violation_from_user_mode() {
    // 监督态装好 EPSR(S=0)/EPC 后 rte 降到用户态；用户代码碰
    // mtcr 触发特权违例，回到监督态处理
    let mut main = Vec::new();
    push16(&mut main, encode_movi16(1, 0));
    push32(&mut main, encode_mtcr32(1, 0, 2)); // epsr = 0
    push32(&mut main, encode_movi32(2, 0x300));
    push32(&mut main, encode_mtcr32(2, 0, 4)); // epc = 0x300
    push32(&mut main, encode_sys32(0, 0)); // rte
    let mut user = Vec::new();
    push32(&mut user, encode_mtcr32(1, 0, 1));
    let mut handler = Vec::new();
    push16(&mut handler, encode_movi16(8, 1));
    push32(&mut handler, encode_sys32(3, 0));
    let (va, vb) = vec_entry(excp::PRIV, 0x700);

    let mut vcpu = boot(
        &entry_cfg(0x100),
        &[(0x100, &main), (0x300, &user), (0x700, &handler), (va, &vb)],
    );
    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[8], 1);
    assert_eq!(vec_field(&vcpu.cpu), excp::PRIV);
    assert_eq!(vcpu.cpu.epc(), 0x300);
    assert!(vcpu.cpu.supervisor());
}

#[test]
fn test_jmpix_scaled_table_dispatch() {
    // vbr=0x800，步长 24（次操作码 1）：r2=2 应落到 0x830
    let mut main = Vec::new();
    push32(&mut main, encode_movi32(1, 0x800));
    push32(&mut main, encode_mtcr32(1, 0, 1)); // vbr
    push16(&mut main, encode_movi16(2, 2));
    push32(&mut main, encode_jmpix32(2, 1));
    let mut slot = Vec::new();
    push16(&mut slot, encode_movi16(6, 9));
    push32(&mut slot, encode_sys32(3, 0));

    let mut vcpu = boot(&entry_cfg(0x100), &[(0x100, &main), (0x830, &slot)]);
    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[6], 9);
    assert_eq!(vcpu.cpu.pc, 0x836);
}

#[test]
fn test_literal_pool_load_and_pool_call() {
    // lrw 从常量池取数；jsri 经池内表项调用，jmp r15 返回
    let mut main = Vec::new();
    push16(&mut main, encode_lrw16(3, 4)); // 池 0x110
    push32(&mut main, encode_jsri32(4)); // 池 0x114
    push16(&mut main, encode_movi16(5, 1));
    push32(&mut main, encode_sys32(3, 0));
    let mut pool = Vec::new();
    push_data(&mut pool, 0x1234_5678);
    push_data(&mut pool, 0x400);
    let mut func = Vec::new();
    push16(&mut func, encode_movi16(4, 7));
    push16(&mut func, encode_jmp16(15));

    let mut vcpu = boot(
        &entry_cfg(0x100),
        &[(0x100, &main), (0x110, &pool), (0x400, &func)],
    );
    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[3], 0x1234_5678);
    assert_eq!(vcpu.cpu.regs[4], 7, "callee ran");
    assert_eq!(vcpu.cpu.regs[5], 1, "returned past the call");
    assert_eq!(vcpu.cpu.regs[15], 0x106);
}

#[test]
fn test_push_pop_call_roundtrip() {
    // bsr 调用子程序；子程序 push {r4, r15}、干活、pop {r4, r15} 返回
    let mut main = Vec::new();
    push32(&mut main, encode_bsr32(0x100)); // 0x100 -> 0x200
    push16(&mut main, encode_movi16(6, 1)); // 0x104
    push32(&mut main, encode_sys32(3, 0)); // wait
    let mut func = Vec::new();
    push16(&mut func, encode_push16(1, true));
    push16(&mut func, encode_movi16(4, 9)); // 覆盖被保存的 r4
    push16(&mut func, encode_movi16(5, 3));
    push16(&mut func, encode_pop16(1, true));

    let mut vcpu = boot(&entry_cfg(0x100), &[(0x100, &main), (0x200, &func)]);
    vcpu.cpu.regs[4] = 0x2a;
    vcpu.cpu.regs[14] = 0x4000;

    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[5], 3, "function body ran");
    assert_eq!(vcpu.cpu.regs[4], 0x2a, "saved register restored");
    assert_eq!(vcpu.cpu.regs[6], 1, "execution resumed after return");
    assert_eq!(vcpu.cpu.regs[14], 0x4000, "stack balanced");
    assert_eq!(vcpu.cpu.regs[15], 0x104);
    assert_eq!(vcpu.cpu.stats.stores, 2);
    assert_eq!(vcpu.cpu.stats.loads, 2);
}

#[test]
fn test_halted_vcpu_wakes_on_later_irq() {
    let mut main = Vec::new();
    push32(&mut main, encode_psrset32(0x04)); // IE
    push32(&mut main, encode_sys32(3, 0)); // wait
    push16(&mut main, encode_movi16(6, 1));
    push32(&mut main, encode_sys32(3, 0));
    let mut handler = Vec::new();
    push16(&mut handler, encode_movi16(7, 3));
    push32(&mut handler, encode_sys32(3, 0));
    let (va, vb) = vec_entry(excp::INT, 0x500);

    let mut vcpu = boot(
        &entry_cfg(0x100),
        &[(0x100, &main), (0x500, &handler), (va, &vb)],
    );
    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[7], 0);
    assert_eq!(vcpu.cpu.pc, 0x108);

    // 线起来后再进 run：从停机点地址登记返回上下文并分发
    vcpu.intc.raise_irq(2);
    let exit = vcpu.run(1000).unwrap();
    assert_eq!(exit, ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs[7], 3);
    assert_eq!(vcpu.cpu.epc(), 0x108);
    assert_eq!(vcpu.cpu.stats.interrupts, 1);
}

#[test]
fn test_snapshot_roundtrip_resumes_identically() {
    let mut main = Vec::new();
    push16(&mut main, encode_movi16(1, 3));
    push16(&mut main, encode_movi16(2, 4));
    push16(&mut main, encode_alu16(0, 2, 1)); // addu r2, r1
    push32(&mut main, encode_sys32(3, 0));
    let regions: &[(u32, &[u8])] = &[(0x100, &main)];

    let mut vcpu = boot(&entry_cfg(0x100), regions);
    vcpu.cpu.debug.add_breakpoint(0x104);
    assert_eq!(vcpu.run(1000).unwrap(), ExitReason::Breakpoint);
    assert_eq!(vcpu.cpu.pc, 0x104);

    // 断点处快照，恢复到新机器上接着跑
    let snap = serde_json::to_string(&vcpu.cpu).unwrap();
    let mut restored = boot(&entry_cfg(0x100), regions);
    restored.cpu = serde_json::from_str(&snap).unwrap();
    assert_eq!(restored.run(1000).unwrap(), ExitReason::Halted(WaitKind::Wait));
    assert_eq!(restored.cpu.regs[2], 7);

    // 原机器继续跑，两边架构状态一致
    assert_eq!(vcpu.run(1000).unwrap(), ExitReason::Halted(WaitKind::Wait));
    assert_eq!(vcpu.cpu.regs, restored.cpu.regs);
    assert_eq!(vcpu.cpu.pc, restored.cpu.pc);
}
