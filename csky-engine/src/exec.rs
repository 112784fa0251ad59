//! 语义动作解释器。
//!
//! [`exec_block`] 按序执行一个翻译块：先按条件执行谓词裁决整块，再
//! 逐指令消费语义动作，最后落实结束符。块中途的访存/除零/浮点故障
//! 登记为挂起异常并停在出错指令上，其后的动作不再执行。所有客户机
//! 可见算术都是环绕语义，窄于 32 位的运算显式截断。

use csky_core::{CpuState, Features, GuestMem, MemCtx, PhysBus, SceState, excp, exception};
use csky_dsp as dsp;
use csky_fpu::{self as fpu, FpStatus};
use csky_ir::{
    BrCond, FcvtKind, FpCmp, FpOp, FpUnOp, IROp, InsnMark, Lane, MemKind, RegId, Sat, Terminator,
    TransBlock, VLane, WaitKind,
};
use csky_mmu::Mmu;
use csky_mmu::regs::{CP0_CCR, CP0_PRSR};

/// FCR 低五位是异常陷阱使能，与 FESR 粘滞位同构。
const FCR_TRAP_MASK: u32 = 0x1f;

/// 块执行完毕后对外层循环的指示。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockExit {
    /// 静态出口，可与下一块链式执行
    Chain,
    /// 翻译环境可能已变化（间接跳转/同步点/谓词跳过），回外层重新同步
    Resync,
    /// 某条指令触发了客户机异常，已登记为挂起
    Fault,
    /// 低功耗停机指令
    Halt(WaitKind),
}

/// 单个语义动作的结局。
enum OpOutcome {
    Done,
    /// 异常已登记，块立即结束
    Fault,
    /// 门禁寄存器为零：访问被跳过，r15 与 PC 已按门禁语义改写
    GuardSkip,
}

/// 解释执行一个翻译块。PC 在返回前已指向下一执行点。
pub fn exec_block<B: PhysBus>(
    cpu: &mut CpuState,
    mmu: &mut Mmu<B>,
    blk: &TransBlock,
) -> BlockExit {
    cpu.stats.blocks += 1;

    if let Some(want) = blk.pred {
        consume_sce(cpu);
        if cpu.c() != want {
            // 被谓词跳过的指令照常退休，PC 前进
            cpu.stats.insns += blk.icount as u64;
            cpu.pc = blk.end_pc();
            return BlockExit::Resync;
        }
    }

    for (i, mark) in blk.insn_marks.iter().enumerate() {
        let end = blk
            .insn_marks
            .get(i + 1)
            .map_or(blk.ops.len(), |m| m.op_start as usize);
        let was_idly = cpu.idly_left;
        for op in &blk.ops[mark.op_start as usize..end] {
            match exec_op(cpu, mmu, *op, *mark) {
                OpOutcome::Done => {}
                OpOutcome::Fault => return BlockExit::Fault,
                OpOutcome::GuardSkip => {
                    cpu.stats.insns += 1;
                    return BlockExit::Resync;
                }
            }
        }
        cpu.stats.insns += 1;
        // 中断延迟窗口按退休指令递减；设定窗口的那条自身不计
        if was_idly > 0 {
            cpu.idly_left = was_idly - 1;
        }
    }

    resolve_term(cpu, mmu, blk)
}

#[inline]
fn reg(cpu: &CpuState, r: RegId) -> u32 {
    cpu.regs[r as usize & 31]
}

#[inline]
fn set_reg(cpu: &mut CpuState, r: RegId, v: u32) {
    cpu.regs[r as usize & 31] = v;
}

// 标量浮点按 16 个 64 位寄存器建模：单精度值在第 2n 槽，
// fmtvr.h/fmfvr.h 存取第 2n+1 槽。
#[inline]
fn freg_s(cpu: &CpuState, v: u8) -> u32 {
    cpu.vreg_s(v as usize * 2)
}

#[inline]
fn set_freg_s(cpu: &mut CpuState, v: u8, x: u32) {
    cpu.set_vreg_s(v as usize * 2, x);
}

fn access_ctx(cpu: &CpuState) -> MemCtx {
    MemCtx {
        sup: cpu.supervisor(),
        world: cpu.world(),
    }
}

fn aligned(cpu: &CpuState, va: u32, size: u8) -> bool {
    size <= 1 || cpu.features.has(Features::UNALIGNED) || va & (size as u32 - 1) == 0
}

/// 数据读。对齐或翻译失败时登记异常并返回 None。
fn mem_read<B: PhysBus>(
    cpu: &mut CpuState,
    mmu: &mut Mmu<B>,
    va: u32,
    size: u8,
    mark: InsnMark,
) -> Option<u64> {
    if !aligned(cpu, va, size) {
        cpu.raise(excp::ALIGN, mark.pc);
        return None;
    }
    match mmu.read(va, size, access_ctx(cpu)) {
        Ok(v) => {
            cpu.stats.loads += 1;
            Some(v)
        }
        Err(f) => {
            cpu.raise(f.vec, mark.pc);
            None
        }
    }
}

/// 数据写。失败路径与 [`mem_read`] 对称。
fn mem_write<B: PhysBus>(
    cpu: &mut CpuState,
    mmu: &mut Mmu<B>,
    va: u32,
    val: u64,
    size: u8,
    mark: InsnMark,
) -> Option<()> {
    if !aligned(cpu, va, size) {
        cpu.raise(excp::ALIGN, mark.pc);
        return None;
    }
    match mmu.write(va, val, size, access_ctx(cpu)) {
        Ok(()) => {
            cpu.stats.stores += 1;
            Some(())
        }
        Err(f) => {
            cpu.raise(f.vec, mark.pc);
            None
        }
    }
}

fn consume_sce(cpu: &mut CpuState) {
    if let Some(s) = cpu.sce.as_mut() {
        s.mask >>= 1;
        s.left = s.left.saturating_sub(1);
        if s.left == 0 {
            cpu.sce = None;
        }
    }
}

fn bitmask(w: u32) -> u32 {
    if w >= 32 { u32::MAX } else { (1u32 << w) - 1 }
}

fn lane_bits(lane: Lane) -> u32 {
    match lane {
        Lane::B4 => 8,
        Lane::H2 => 16,
    }
}

fn vlane_bits(lane: VLane) -> u32 {
    match lane {
        VLane::B16 => 8,
        VLane::H8 => 16,
        VLane::W4 => 32,
    }
}

fn mul64(x: u32, y: u32, signed: bool) -> u64 {
    if signed {
        (x as i32 as i64).wrapping_mul(y as i32 as i64) as u64
    } else {
        (x as u64).wrapping_mul(y as u64)
    }
}

/// 浮点粘滞标志落入 FESR；命中 FCR 使能位时改派浮点异常。
fn fp_flags(cpu: &mut CpuState, mut st: FpStatus, mark: InsnMark) -> bool {
    let flags = st.take_flags();
    cpu.fesr |= flags;
    if flags & cpu.fcr & FCR_TRAP_MASK != 0 {
        cpu.raise(excp::FLOAT, mark.pc);
        return true;
    }
    false
}

fn exec_op<B: PhysBus>(
    cpu: &mut CpuState,
    mmu: &mut Mmu<B>,
    op: IROp,
    mark: InsnMark,
) -> OpOutcome {
    match op {
        // ---- 移动与条件移动 ----
        IROp::MovImm { rz, imm } => set_reg(cpu, rz, imm),
        IROp::Mov { rz, rx } => set_reg(cpu, rz, reg(cpu, rx)),
        IROp::Movih { rz, imm } => set_reg(cpu, rz, (imm as u32) << 16),
        IROp::MvC { rz } => set_reg(cpu, rz, cpu.flag_c),
        IROp::MvCv { rz } => set_reg(cpu, rz, cpu.flag_c ^ 1),
        IROp::MovT { rz, rx } => {
            if cpu.c() {
                set_reg(cpu, rz, reg(cpu, rx));
            }
        }
        IROp::MovF { rz, rx } => {
            if !cpu.c() {
                set_reg(cpu, rz, reg(cpu, rx));
            }
        }
        IROp::Clrt { rz } => {
            if cpu.c() {
                set_reg(cpu, rz, 0);
            }
        }
        IROp::Clrf { rz } => {
            if !cpu.c() {
                set_reg(cpu, rz, 0);
            }
        }
        IROp::IncT { rz, rx, imm } => {
            if cpu.c() {
                set_reg(cpu, rz, reg(cpu, rx).wrapping_add(imm as u32));
            }
        }
        IROp::IncF { rz, rx, imm } => {
            if !cpu.c() {
                set_reg(cpu, rz, reg(cpu, rx).wrapping_add(imm as u32));
            }
        }
        IROp::DecT { rz, rx, imm } => {
            if cpu.c() {
                set_reg(cpu, rz, reg(cpu, rx).wrapping_sub(imm as u32));
            }
        }
        IROp::DecF { rz, rx, imm } => {
            if !cpu.c() {
                set_reg(cpu, rz, reg(cpu, rx).wrapping_sub(imm as u32));
            }
        }
        IROp::DecGt { rz, rx, imm } => {
            let v = reg(cpu, rx).wrapping_sub(imm as u32);
            set_reg(cpu, rz, v);
            cpu.set_c((v as i32) > 0);
        }
        IROp::DecLt { rz, rx, imm } => {
            let v = reg(cpu, rx).wrapping_sub(imm as u32);
            set_reg(cpu, rz, v);
            cpu.set_c((v as i32) < 0);
        }
        IROp::DecNe { rz, rx, imm } => {
            let v = reg(cpu, rx).wrapping_sub(imm as u32);
            set_reg(cpu, rz, v);
            cpu.set_c(v != 0);
        }

        // ---- 算术逻辑 ----
        IROp::Add { rz, rx, ry } => set_reg(cpu, rz, reg(cpu, rx).wrapping_add(reg(cpu, ry))),
        IROp::AddImm { rz, rx, imm } => set_reg(cpu, rz, reg(cpu, rx).wrapping_add(imm)),
        IROp::Sub { rz, rx, ry } => set_reg(cpu, rz, reg(cpu, rx).wrapping_sub(reg(cpu, ry))),
        IROp::SubImm { rz, rx, imm } => set_reg(cpu, rz, reg(cpu, rx).wrapping_sub(imm)),
        IROp::Rsub { rz, rx, ry } => set_reg(cpu, rz, reg(cpu, ry).wrapping_sub(reg(cpu, rx))),
        IROp::RsubImm { rz, rx, imm } => set_reg(cpu, rz, imm.wrapping_sub(reg(cpu, rx))),
        IROp::Addc { rz, rx, ry } => {
            let t = reg(cpu, rx) as u64 + reg(cpu, ry) as u64 + cpu.flag_c as u64;
            set_reg(cpu, rz, t as u32);
            cpu.set_c(t >> 32 != 0);
        }
        IROp::Subc { rz, rx, ry } => {
            // rx - ry - !C == rx + !ry + C，进位出即无借位
            let t = reg(cpu, rx) as u64 + (!reg(cpu, ry)) as u64 + cpu.flag_c as u64;
            set_reg(cpu, rz, t as u32);
            cpu.set_c(t >> 32 != 0);
        }
        IROp::And { rz, rx, ry } => set_reg(cpu, rz, reg(cpu, rx) & reg(cpu, ry)),
        IROp::AndImm { rz, rx, imm } => set_reg(cpu, rz, reg(cpu, rx) & imm),
        IROp::Andn { rz, rx, ry } => set_reg(cpu, rz, reg(cpu, rx) & !reg(cpu, ry)),
        IROp::AndnImm { rz, rx, imm } => set_reg(cpu, rz, reg(cpu, rx) & !imm),
        IROp::Or { rz, rx, ry } => set_reg(cpu, rz, reg(cpu, rx) | reg(cpu, ry)),
        IROp::OrImm { rz, rx, imm } => set_reg(cpu, rz, reg(cpu, rx) | imm),
        IROp::Xor { rz, rx, ry } => set_reg(cpu, rz, reg(cpu, rx) ^ reg(cpu, ry)),
        IROp::XorImm { rz, rx, imm } => set_reg(cpu, rz, reg(cpu, rx) ^ imm),
        IROp::Nor { rz, rx, ry } => set_reg(cpu, rz, !(reg(cpu, rx) | reg(cpu, ry))),
        IROp::Ixh { rz, rx, ry } => {
            set_reg(cpu, rz, reg(cpu, rx).wrapping_add(reg(cpu, ry) << 1));
        }
        IROp::Ixw { rz, rx, ry } => {
            set_reg(cpu, rz, reg(cpu, rx).wrapping_add(reg(cpu, ry) << 2));
        }
        IROp::Ixd { rz, rx, ry } => {
            set_reg(cpu, rz, reg(cpu, rx).wrapping_add(reg(cpu, ry) << 3));
        }
        IROp::Abs { rz, rx } => set_reg(cpu, rz, (reg(cpu, rx) as i32).wrapping_abs() as u32),

        // ---- 移位 ----
        IROp::Lsl { rz, rx, ry } => {
            let amt = reg(cpu, ry) & 0x3f;
            set_reg(cpu, rz, if amt >= 32 { 0 } else { reg(cpu, rx) << amt });
        }
        IROp::Lsr { rz, rx, ry } => {
            let amt = reg(cpu, ry) & 0x3f;
            set_reg(cpu, rz, if amt >= 32 { 0 } else { reg(cpu, rx) >> amt });
        }
        IROp::Asr { rz, rx, ry } => {
            let amt = (reg(cpu, ry) & 0x3f).min(31);
            set_reg(cpu, rz, ((reg(cpu, rx) as i32) >> amt) as u32);
        }
        IROp::Rotl { rz, rx, ry } => {
            set_reg(cpu, rz, reg(cpu, rx).rotate_left(reg(cpu, ry) & 0x1f));
        }
        IROp::LslImm { rz, rx, imm } => set_reg(cpu, rz, reg(cpu, rx) << (imm as u32 & 31)),
        IROp::LsrImm { rz, rx, imm } => set_reg(cpu, rz, reg(cpu, rx) >> (imm as u32 & 31)),
        IROp::AsrImm { rz, rx, imm } => {
            set_reg(cpu, rz, ((reg(cpu, rx) as i32) >> (imm as u32 & 31)) as u32);
        }
        IROp::RotlImm { rz, rx, imm } => {
            set_reg(cpu, rz, reg(cpu, rx).rotate_left(imm as u32 & 31));
        }
        IROp::LslC { rz, rx, imm } => {
            let x = reg(cpu, rx);
            let n = (imm as u32).clamp(1, 32);
            cpu.set_c(x >> (32 - n) & 1 != 0);
            set_reg(cpu, rz, if n == 32 { 0 } else { x << n });
        }
        IROp::LsrC { rz, rx, imm } => {
            let x = reg(cpu, rx);
            let n = (imm as u32).clamp(1, 32);
            cpu.set_c(x >> (n - 1) & 1 != 0);
            set_reg(cpu, rz, if n == 32 { 0 } else { x >> n });
        }
        IROp::AsrC { rz, rx, imm } => {
            let x = reg(cpu, rx);
            let n = (imm as u32).clamp(1, 32);
            cpu.set_c(x >> (n - 1) & 1 != 0);
            set_reg(cpu, rz, ((x as i32) >> n.min(31)) as u32);
        }
        IROp::Xsr { rz, rx, imm } => {
            let n = (imm as u32).clamp(1, 32);
            let wide = ((cpu.flag_c as u64) << 32) | reg(cpu, rx) as u64;
            let rot = ((wide >> n) | (wide << (33 - n))) & 0x1_ffff_ffff;
            cpu.set_c(rot >> 32 != 0);
            set_reg(cpu, rz, rot as u32);
        }

        // ---- 比较与测试 ----
        IROp::CmpHs { rx, ry } => cpu.set_c(reg(cpu, rx) >= reg(cpu, ry)),
        IROp::CmpLt { rx, ry } => cpu.set_c((reg(cpu, rx) as i32) < (reg(cpu, ry) as i32)),
        IROp::CmpNe { rx, ry } => cpu.set_c(reg(cpu, rx) != reg(cpu, ry)),
        IROp::CmpHsImm { rx, imm } => cpu.set_c(reg(cpu, rx) >= imm),
        IROp::CmpLtImm { rx, imm } => cpu.set_c((reg(cpu, rx) as i32) < (imm as i32)),
        IROp::CmpNeImm { rx, imm } => cpu.set_c(reg(cpu, rx) != imm),
        IROp::Tst { rx, ry } => cpu.set_c(reg(cpu, rx) & reg(cpu, ry) != 0),
        IROp::Tstnbz { rx } => {
            let x = reg(cpu, rx);
            cpu.set_c(
                x & 0xff != 0 && x & 0xff00 != 0 && x & 0xff_0000 != 0 && x & 0xff00_0000 != 0,
            );
        }

        // ---- 位操作 ----
        IROp::Bclri { rz, rx, imm } => set_reg(cpu, rz, reg(cpu, rx) & !(1 << (imm as u32 & 31))),
        IROp::Bseti { rz, rx, imm } => set_reg(cpu, rz, reg(cpu, rx) | (1 << (imm as u32 & 31))),
        IROp::Btsti { rx, imm } => cpu.set_c(reg(cpu, rx) >> (imm as u32 & 31) & 1 != 0),
        IROp::Bmaski { rz, imm } => {
            let w = imm as u32;
            set_reg(cpu, rz, if w == 0 || w >= 32 { u32::MAX } else { (1 << w) - 1 });
        }
        IROp::Bgenr { rz, rx } => {
            let x = reg(cpu, rx);
            set_reg(cpu, rz, if x & 0x20 != 0 { 0 } else { 1 << (x & 0x1f) });
        }
        IROp::Ff0 { rz, rx } => set_reg(cpu, rz, reg(cpu, rx).leading_ones()),
        IROp::Ff1 { rz, rx } => set_reg(cpu, rz, reg(cpu, rx).leading_zeros()),
        IROp::Revb { rz, rx } => set_reg(cpu, rz, reg(cpu, rx).swap_bytes()),
        IROp::Revh { rz, rx } => {
            let x = reg(cpu, rx);
            set_reg(cpu, rz, ((x & 0x00ff_00ff) << 8) | ((x >> 8) & 0x00ff_00ff));
        }
        IROp::Brev { rz, rx } => set_reg(cpu, rz, reg(cpu, rx).reverse_bits()),
        IROp::Xtrb { rz, rx, n } => {
            set_reg(cpu, rz, reg(cpu, rx) >> (8 * (n as u32 & 3)) & 0xff);
        }
        IROp::Sext { rz, rx, lsb, msb } => {
            if msb < lsb {
                set_reg(cpu, rz, 0);
            } else {
                let w = (msb - lsb + 1) as u32;
                let v = (reg(cpu, rx) >> (lsb as u32 & 31)) & bitmask(w);
                let sh = 32 - w;
                set_reg(cpu, rz, (((v << sh) as i32) >> sh) as u32);
            }
        }
        IROp::Zext { rz, rx, lsb, msb } => {
            if msb < lsb {
                set_reg(cpu, rz, 0);
            } else {
                let w = (msb - lsb + 1) as u32;
                set_reg(cpu, rz, (reg(cpu, rx) >> (lsb as u32 & 31)) & bitmask(w));
            }
        }
        IROp::Ins { rz, rx, msb, lsb } => {
            if msb >= lsb {
                let w = (msb - lsb + 1) as u32;
                let m = bitmask(w) << (lsb as u32 & 31);
                let v = (reg(cpu, rz) & !m) | ((reg(cpu, rx) << (lsb as u32 & 31)) & m);
                set_reg(cpu, rz, v);
            }
        }

        // ---- 乘除 ----
        IROp::Mult { rz, rx, ry } => set_reg(cpu, rz, reg(cpu, rx).wrapping_mul(reg(cpu, ry))),
        IROp::DivU { rz, rx, ry } => {
            let d = reg(cpu, ry);
            if d == 0 {
                cpu.raise(excp::ZERODIV, mark.pc);
                return OpOutcome::Fault;
            }
            set_reg(cpu, rz, reg(cpu, rx) / d);
        }
        IROp::DivS { rz, rx, ry } => {
            let d = reg(cpu, ry) as i32;
            if d == 0 {
                cpu.raise(excp::ZERODIV, mark.pc);
                return OpOutcome::Fault;
            }
            set_reg(cpu, rz, (reg(cpu, rx) as i32).wrapping_div(d) as u32);
        }

        // ---- DSP ----
        IROp::AddSat32 { rz, rx, ry, signed } => {
            let (v, sat) = if signed {
                dsp::add_sat_s32(reg(cpu, rx), reg(cpu, ry))
            } else {
                dsp::add_sat_u32(reg(cpu, rx), reg(cpu, ry))
            };
            set_reg(cpu, rz, v);
            if sat {
                cpu.flag_v = 1;
            }
        }
        IROp::SubSat32 { rz, rx, ry, signed } => {
            let (v, sat) = if signed {
                dsp::sub_sat_s32(reg(cpu, rx), reg(cpu, ry))
            } else {
                dsp::sub_sat_u32(reg(cpu, rx), reg(cpu, ry))
            };
            set_reg(cpu, rz, v);
            if sat {
                cpu.flag_v = 1;
            }
        }
        IROp::AddSat64 { rz, rx, ry, signed } => {
            let (v, sat) = if signed {
                dsp::add_sat_s64(cpu.reg_pair(rx), cpu.reg_pair(ry))
            } else {
                dsp::add_sat_u64(cpu.reg_pair(rx), cpu.reg_pair(ry))
            };
            cpu.set_reg_pair(rz, v);
            if sat {
                cpu.flag_v = 1;
            }
        }
        IROp::SubSat64 { rz, rx, ry, signed } => {
            let (v, sat) = if signed {
                dsp::sub_sat_s64(cpu.reg_pair(rx), cpu.reg_pair(ry))
            } else {
                dsp::sub_sat_u64(cpu.reg_pair(rx), cpu.reg_pair(ry))
            };
            cpu.set_reg_pair(rz, v);
            if sat {
                cpu.flag_v = 1;
            }
        }
        IROp::PkAdd { rz, rx, ry, lane, sat } => {
            let (a, b, bits) = (reg(cpu, rx), reg(cpu, ry), lane_bits(lane));
            let v = match sat {
                Sat::None => dsp::pk_add(a, b, bits),
                Sat::Signed => {
                    let (v, s) = dsp::pk_add_sat_s(a, b, bits);
                    if s {
                        cpu.flag_v = 1;
                    }
                    v
                }
                Sat::Unsigned => {
                    let (v, s) = dsp::pk_add_sat_u(a, b, bits);
                    if s {
                        cpu.flag_v = 1;
                    }
                    v
                }
            };
            set_reg(cpu, rz, v);
        }
        IROp::PkSub { rz, rx, ry, lane, sat } => {
            let (a, b, bits) = (reg(cpu, rx), reg(cpu, ry), lane_bits(lane));
            let v = match sat {
                Sat::None => dsp::pk_sub(a, b, bits),
                Sat::Signed => {
                    let (v, s) = dsp::pk_sub_sat_s(a, b, bits);
                    if s {
                        cpu.flag_v = 1;
                    }
                    v
                }
                Sat::Unsigned => {
                    let (v, s) = dsp::pk_sub_sat_u(a, b, bits);
                    if s {
                        cpu.flag_v = 1;
                    }
                    v
                }
            };
            set_reg(cpu, rz, v);
        }
        IROp::PkAbs { rz, rx, lane } => {
            set_reg(cpu, rz, dsp::pk_abs(reg(cpu, rx), lane_bits(lane)));
        }
        IROp::PkMin { rz, rx, ry, lane, signed } => {
            set_reg(cpu, rz, dsp::pk_min(reg(cpu, rx), reg(cpu, ry), lane_bits(lane), signed));
        }
        IROp::PkMax { rz, rx, ry, lane, signed } => {
            set_reg(cpu, rz, dsp::pk_max(reg(cpu, rx), reg(cpu, ry), lane_bits(lane), signed));
        }
        IROp::PkCmpEq { rz, rx, ry, lane } => {
            set_reg(cpu, rz, dsp::pk_cmp_eq(reg(cpu, rx), reg(cpu, ry), lane_bits(lane)));
        }
        IROp::Clip { rz, rx, bits, signed } => {
            let (v, s) = if signed {
                dsp::clip_s(reg(cpu, rx), bits as u32)
            } else {
                dsp::clip_u(reg(cpu, rx), bits as u32)
            };
            set_reg(cpu, rz, v);
            if s {
                cpu.flag_v = 1;
            }
        }
        IROp::RoundShr { rz, rx, imm, signed } => {
            let v = if signed {
                dsp::round_shr_s(reg(cpu, rx), imm as u32)
            } else {
                dsp::round_shr_u(reg(cpu, rx), imm as u32)
            };
            set_reg(cpu, rz, v);
        }
        IROp::SatShl { rz, rx, imm, signed } => {
            let (v, s) = if signed {
                dsp::sat_shl_s(reg(cpu, rx), imm as u32)
            } else {
                dsp::sat_shl_u(reg(cpu, rx), imm as u32)
            };
            set_reg(cpu, rz, v);
            if s {
                cpu.flag_v = 1;
            }
        }
        IROp::MulWide { rz, rx, ry, signed } => {
            let p = mul64(reg(cpu, rx), reg(cpu, ry), signed);
            cpu.set_reg_pair(rz, p);
        }
        IROp::MulAcc { rz, rx, ry, signed, sub } => {
            let v = if signed {
                dsp::mac_s64(cpu.reg_pair(rz), reg(cpu, rx), reg(cpu, ry), sub)
            } else {
                dsp::mac_u64(cpu.reg_pair(rz), reg(cpu, rx), reg(cpu, ry), sub)
            };
            cpu.set_reg_pair(rz, v);
        }
        IROp::MulAccV { rz, rx, ry, sub } => {
            let (v, ovf) = dsp::mac_guard_v(cpu.reg_pair(rz), reg(cpu, rx), reg(cpu, ry), sub);
            cpu.set_reg_pair(rz, v);
            if ovf {
                cpu.flag_v = 1;
            }
        }
        IROp::MultHiLo { rx, ry, signed } => {
            let p = mul64(reg(cpu, rx), reg(cpu, ry), signed);
            cpu.set_hilo(p);
        }
        IROp::MacHiLo { rx, ry, signed, sub } => {
            let v = if signed {
                dsp::mac_s64(cpu.hilo(), reg(cpu, rx), reg(cpu, ry), sub)
            } else {
                dsp::mac_u64(cpu.hilo(), reg(cpu, rx), reg(cpu, ry), sub)
            };
            cpu.set_hilo(v);
        }
        IROp::MvFromHi { rz } => set_reg(cpu, rz, cpu.hi),
        IROp::MvFromLo { rz } => set_reg(cpu, rz, cpu.lo),
        IROp::MvFromHiS { rz } => set_reg(cpu, rz, cpu.hi_shadow),
        IROp::MvFromLoS { rz } => set_reg(cpu, rz, cpu.lo_shadow),
        IROp::MvToHi { rx } => {
            let v = reg(cpu, rx);
            cpu.set_hi(v);
        }
        IROp::MvToLo { rx } => {
            let v = reg(cpu, rx);
            cpu.set_lo(v);
        }
        IROp::CFromV => cpu.flag_c = cpu.flag_v,

        // ---- 浮点 ----
        IROp::FArith { op, vz, vx, vy, dword } => {
            let mut st = FpStatus::from_fcr(cpu.fcr);
            if dword {
                let a = cpu.vreg_d(vx as usize);
                let b = cpu.vreg_d(vy as usize);
                let v = match op {
                    FpOp::Add => fpu::add64(a, b, &mut st),
                    FpOp::Sub => fpu::sub64(a, b, &mut st),
                    FpOp::Mul => fpu::mul64(a, b, &mut st),
                    FpOp::Div => fpu::div64(a, b, &mut st),
                    FpOp::Min => fpu::min64(a, b, &mut st),
                    FpOp::Max => fpu::max64(a, b, &mut st),
                };
                if fp_flags(cpu, st, mark) {
                    return OpOutcome::Fault;
                }
                cpu.set_vreg_d(vz as usize, v);
            } else {
                let a = freg_s(cpu, vx);
                let b = freg_s(cpu, vy);
                let v = match op {
                    FpOp::Add => fpu::add32(a, b, &mut st),
                    FpOp::Sub => fpu::sub32(a, b, &mut st),
                    FpOp::Mul => fpu::mul32(a, b, &mut st),
                    FpOp::Div => fpu::div32(a, b, &mut st),
                    FpOp::Min => fpu::min32(a, b, &mut st),
                    FpOp::Max => fpu::max32(a, b, &mut st),
                };
                if fp_flags(cpu, st, mark) {
                    return OpOutcome::Fault;
                }
                set_freg_s(cpu, vz, v);
            }
        }
        IROp::FUnary { op, vz, vx, dword } => {
            let mut st = FpStatus::from_fcr(cpu.fcr);
            if dword {
                let a = cpu.vreg_d(vx as usize);
                let v = match op {
                    FpUnOp::Neg => fpu::neg64(a),
                    FpUnOp::Abs => fpu::abs64(a),
                    FpUnOp::Sqrt => fpu::sqrt64(a, &mut st),
                    FpUnOp::Mov => a,
                };
                if fp_flags(cpu, st, mark) {
                    return OpOutcome::Fault;
                }
                cpu.set_vreg_d(vz as usize, v);
            } else {
                let a = freg_s(cpu, vx);
                let v = match op {
                    FpUnOp::Neg => fpu::neg32(a),
                    FpUnOp::Abs => fpu::abs32(a),
                    FpUnOp::Sqrt => fpu::sqrt32(a, &mut st),
                    FpUnOp::Mov => a,
                };
                if fp_flags(cpu, st, mark) {
                    return OpOutcome::Fault;
                }
                set_freg_s(cpu, vz, v);
            }
        }
        IROp::FCmpOp { cond, vx, vy, dword } => {
            let ord = if dword {
                let a = cpu.vreg_d(vx as usize);
                let b = if vy == 255 { 0 } else { cpu.vreg_d(vy as usize) };
                fpu::cmp64(a, b)
            } else {
                let a = freg_s(cpu, vx);
                let b = if vy == 255 { 0 } else { freg_s(cpu, vy) };
                fpu::cmp32(a, b)
            };
            cpu.set_c(match cond {
                FpCmp::Ne => ord != fpu::FpOrd::Equal,
                FpCmp::Hs => matches!(ord, fpu::FpOrd::Greater | fpu::FpOrd::Equal),
                FpCmp::Lt => ord == fpu::FpOrd::Less,
                FpCmp::Uo => ord == fpu::FpOrd::Unordered,
            });
        }
        IROp::FMac { vz, vx, vy, dword, negate, sub } => {
            let mut st = FpStatus::from_fcr(cpu.fcr);
            if dword {
                let v = fpu::fmac64(
                    cpu.vreg_d(vx as usize),
                    cpu.vreg_d(vy as usize),
                    cpu.vreg_d(vz as usize),
                    negate,
                    sub,
                    &mut st,
                );
                if fp_flags(cpu, st, mark) {
                    return OpOutcome::Fault;
                }
                cpu.set_vreg_d(vz as usize, v);
            } else {
                let v = fpu::fmac32(
                    freg_s(cpu, vx),
                    freg_s(cpu, vy),
                    freg_s(cpu, vz),
                    negate,
                    sub,
                    &mut st,
                );
                if fp_flags(cpu, st, mark) {
                    return OpOutcome::Fault;
                }
                set_freg_s(cpu, vz, v);
            }
        }
        IROp::FCvt { kind, vz, vx } => {
            let mut st = FpStatus::from_fcr(cpu.fcr);
            // 转整型固定向零舍入，其余转换跟随 FCR 舍入模式
            if matches!(
                kind,
                FcvtKind::S2Si | FcvtKind::S2Ui | FcvtKind::D2Si | FcvtKind::D2Ui
            ) {
                st.rm = fpu::Round::Zero;
            }
            match kind {
                FcvtKind::S2D => {
                    let v = fpu::f32_to_f64(freg_s(cpu, vx));
                    cpu.set_vreg_d(vz as usize, v);
                }
                FcvtKind::D2S => {
                    let v = fpu::f64_to_f32(cpu.vreg_d(vx as usize), &mut st);
                    if fp_flags(cpu, st, mark) {
                        return OpOutcome::Fault;
                    }
                    set_freg_s(cpu, vz, v);
                }
                FcvtKind::S2Si => {
                    let v = fpu::f32_to_i32(freg_s(cpu, vx), &mut st);
                    if fp_flags(cpu, st, mark) {
                        return OpOutcome::Fault;
                    }
                    set_freg_s(cpu, vz, v);
                }
                FcvtKind::S2Ui => {
                    let v = fpu::f32_to_u32(freg_s(cpu, vx), &mut st);
                    if fp_flags(cpu, st, mark) {
                        return OpOutcome::Fault;
                    }
                    set_freg_s(cpu, vz, v);
                }
                FcvtKind::D2Si => {
                    let v = fpu::f64_to_i32(cpu.vreg_d(vx as usize), &mut st);
                    if fp_flags(cpu, st, mark) {
                        return OpOutcome::Fault;
                    }
                    set_freg_s(cpu, vz, v);
                }
                FcvtKind::D2Ui => {
                    let v = fpu::f64_to_u32(cpu.vreg_d(vx as usize), &mut st);
                    if fp_flags(cpu, st, mark) {
                        return OpOutcome::Fault;
                    }
                    set_freg_s(cpu, vz, v);
                }
                FcvtKind::Si2S => {
                    let v = fpu::i32_to_f32(freg_s(cpu, vx), &mut st);
                    if fp_flags(cpu, st, mark) {
                        return OpOutcome::Fault;
                    }
                    set_freg_s(cpu, vz, v);
                }
                FcvtKind::Ui2S => {
                    let v = fpu::u32_to_f32(freg_s(cpu, vx), &mut st);
                    if fp_flags(cpu, st, mark) {
                        return OpOutcome::Fault;
                    }
                    set_freg_s(cpu, vz, v);
                }
                FcvtKind::Si2D => {
                    let v = fpu::i32_to_f64(freg_s(cpu, vx));
                    cpu.set_vreg_d(vz as usize, v);
                }
                FcvtKind::Ui2D => {
                    let v = fpu::u32_to_f64(freg_s(cpu, vx));
                    cpu.set_vreg_d(vz as usize, v);
                }
            }
        }
        IROp::FMovToFpu { vz, rx, high } => {
            let v = reg(cpu, rx);
            cpu.set_vreg_s(vz as usize * 2 + high as usize, v);
        }
        IROp::FMovToGpr { rz, vx, high } => {
            let v = cpu.vreg_s(vx as usize * 2 + high as usize);
            set_reg(cpu, rz, v);
        }
        IROp::FLoad { vz, rx, disp, dword } => {
            let va = reg(cpu, rx).wrapping_add(disp);
            if dword {
                let Some(v) = mem_read(cpu, mmu, va, 8, mark) else {
                    return OpOutcome::Fault;
                };
                cpu.set_vreg_d(vz as usize, v);
            } else {
                let Some(v) = mem_read(cpu, mmu, va, 4, mark) else {
                    return OpOutcome::Fault;
                };
                set_freg_s(cpu, vz, v as u32);
            }
        }
        IROp::FStore { vz, rx, disp, dword } => {
            let va = reg(cpu, rx).wrapping_add(disp);
            let (val, size) = if dword {
                (cpu.vreg_d(vz as usize), 8)
            } else {
                (freg_s(cpu, vz) as u64, 4)
            };
            if mem_write(cpu, mmu, va, val, size, mark).is_none() {
                return OpOutcome::Fault;
            }
        }
        IROp::FLoadIdx { vz, rx, ry, shift, dword } => {
            let va = reg(cpu, rx).wrapping_add(reg(cpu, ry).wrapping_shl(shift as u32));
            if dword {
                let Some(v) = mem_read(cpu, mmu, va, 8, mark) else {
                    return OpOutcome::Fault;
                };
                cpu.set_vreg_d(vz as usize, v);
            } else {
                let Some(v) = mem_read(cpu, mmu, va, 4, mark) else {
                    return OpOutcome::Fault;
                };
                set_freg_s(cpu, vz, v as u32);
            }
        }
        IROp::FStoreIdx { vz, rx, ry, shift, dword } => {
            let va = reg(cpu, rx).wrapping_add(reg(cpu, ry).wrapping_shl(shift as u32));
            let (val, size) = if dword {
                (cpu.vreg_d(vz as usize), 8)
            } else {
                (freg_s(cpu, vz) as u64, 4)
            };
            if mem_write(cpu, mmu, va, val, size, mark).is_none() {
                return OpOutcome::Fault;
            }
        }

        // ---- 128 位向量 ----
        IROp::VLoad { vq, rx, disp } => {
            let va = reg(cpu, rx).wrapping_add(disp);
            let mut w = [0u32; 4];
            for (k, slot) in w.iter_mut().enumerate() {
                let Some(v) = mem_read(cpu, mmu, va.wrapping_add(4 * k as u32), 4, mark) else {
                    return OpOutcome::Fault;
                };
                *slot = v as u32;
            }
            cpu.set_vreg_q(vq as usize, w);
        }
        IROp::VStore { vq, rx, disp } => {
            let va = reg(cpu, rx).wrapping_add(disp);
            let w = cpu.vreg_q(vq as usize);
            for (k, slot) in w.iter().enumerate() {
                if mem_write(cpu, mmu, va.wrapping_add(4 * k as u32), *slot as u64, 4, mark)
                    .is_none()
                {
                    return OpOutcome::Fault;
                }
            }
        }
        IROp::VAdd { vq_z, vq_x, vq_y, lane, sat } => {
            let a = cpu.vreg_q(vq_x as usize);
            let b = cpu.vreg_q(vq_y as usize);
            let mut o = [0u32; 4];
            for k in 0..4 {
                o[k] = vlane_add(a[k], b[k], lane, sat);
            }
            cpu.set_vreg_q(vq_z as usize, o);
        }
        IROp::VSub { vq_z, vq_x, vq_y, lane, sat } => {
            let a = cpu.vreg_q(vq_x as usize);
            let b = cpu.vreg_q(vq_y as usize);
            let mut o = [0u32; 4];
            for k in 0..4 {
                o[k] = vlane_sub(a[k], b[k], lane, sat);
            }
            cpu.set_vreg_q(vq_z as usize, o);
        }
        IROp::VAnd { vq_z, vq_x, vq_y } => {
            let a = cpu.vreg_q(vq_x as usize);
            let b = cpu.vreg_q(vq_y as usize);
            cpu.set_vreg_q(vq_z as usize, [a[0] & b[0], a[1] & b[1], a[2] & b[2], a[3] & b[3]]);
        }
        IROp::VOr { vq_z, vq_x, vq_y } => {
            let a = cpu.vreg_q(vq_x as usize);
            let b = cpu.vreg_q(vq_y as usize);
            cpu.set_vreg_q(vq_z as usize, [a[0] | b[0], a[1] | b[1], a[2] | b[2], a[3] | b[3]]);
        }
        IROp::VXor { vq_z, vq_x, vq_y } => {
            let a = cpu.vreg_q(vq_x as usize);
            let b = cpu.vreg_q(vq_y as usize);
            cpu.set_vreg_q(vq_z as usize, [a[0] ^ b[0], a[1] ^ b[1], a[2] ^ b[2], a[3] ^ b[3]]);
        }
        IROp::VShlImm { vq_z, vq_x, lane, imm } => {
            let a = cpu.vreg_q(vq_x as usize);
            let bits = vlane_bits(lane);
            let mut o = [0u32; 4];
            for k in 0..4 {
                o[k] = vshl_word(a[k], bits, imm as u32);
            }
            cpu.set_vreg_q(vq_z as usize, o);
        }
        IROp::VShrImm { vq_z, vq_x, lane, imm, signed } => {
            let a = cpu.vreg_q(vq_x as usize);
            let bits = vlane_bits(lane);
            let mut o = [0u32; 4];
            for k in 0..4 {
                o[k] = vshr_word(a[k], bits, imm as u32, signed);
            }
            cpu.set_vreg_q(vq_z as usize, o);
        }
        IROp::VMov { vq_z, vq_x } => {
            let a = cpu.vreg_q(vq_x as usize);
            cpu.set_vreg_q(vq_z as usize, a);
        }
        IROp::VDupG { vq_z, rx, lane } => {
            let v = reg(cpu, rx);
            let word = match lane {
                VLane::B16 => (v & 0xff) * 0x0101_0101,
                VLane::H8 => (v & 0xffff) * 0x0001_0001,
                VLane::W4 => v,
            };
            cpu.set_vreg_q(vq_z as usize, [word; 4]);
        }
        IROp::VMovToGpr { rz, vq_x, idx } => {
            let w = cpu.vreg_q(vq_x as usize);
            set_reg(cpu, rz, w[idx as usize & 3]);
        }

        // ---- 访存 ----
        IROp::Load { rz, rx, disp, kind, guarded } => {
            if guarded && cpu.gcr == 0 {
                guard_skip(cpu, mark);
                return OpOutcome::GuardSkip;
            }
            let va = reg(cpu, rx).wrapping_add(disp);
            return load_into(cpu, mmu, rz, va, kind, mark);
        }
        IROp::Store { rz, rx, disp, kind, guarded } => {
            if guarded && cpu.gcr == 0 {
                guard_skip(cpu, mark);
                return OpOutcome::GuardSkip;
            }
            let va = reg(cpu, rx).wrapping_add(disp);
            return store_from(cpu, mmu, rz, va, kind, mark);
        }
        IROp::LoadIdx { rz, rx, ry, shift, kind } => {
            let va = reg(cpu, rx).wrapping_add(reg(cpu, ry).wrapping_shl(shift as u32));
            return load_into(cpu, mmu, rz, va, kind, mark);
        }
        IROp::StoreIdx { rz, rx, ry, shift, kind } => {
            let va = reg(cpu, rx).wrapping_add(reg(cpu, ry).wrapping_shl(shift as u32));
            return store_from(cpu, mmu, rz, va, kind, mark);
        }
        IROp::LoadAbs { rz, addr } => {
            let Some(v) = mem_read(cpu, mmu, addr, 4, mark) else {
                return OpOutcome::Fault;
            };
            set_reg(cpu, rz, v as u32);
        }
        IROp::LoadMulti { rf, count, rx } => {
            let base = reg(cpu, rx);
            for k in 0..count {
                let Some(v) = mem_read(cpu, mmu, base.wrapping_add(4 * k as u32), 4, mark) else {
                    return OpOutcome::Fault;
                };
                set_reg(cpu, rf.wrapping_add(k), v as u32);
            }
        }
        IROp::StoreMulti { rf, count, rx } => {
            let base = reg(cpu, rx);
            for k in 0..count {
                let v = reg(cpu, rf.wrapping_add(k));
                if mem_write(cpu, mmu, base.wrapping_add(4 * k as u32), v as u64, 4, mark)
                    .is_none()
                {
                    return OpOutcome::Fault;
                }
            }
        }
        IROp::Push { cnt1, r15, cnt2 } => {
            let total = cnt1 as u32 + r15 as u32 + cnt2 as u32;
            let base = reg(cpu, 14).wrapping_sub(4 * total);
            let mut va = base;
            for k in 0..cnt1 {
                let v = reg(cpu, 4 + k);
                if mem_write(cpu, mmu, va, v as u64, 4, mark).is_none() {
                    return OpOutcome::Fault;
                }
                va = va.wrapping_add(4);
            }
            if r15 {
                let v = reg(cpu, 15);
                if mem_write(cpu, mmu, va, v as u64, 4, mark).is_none() {
                    return OpOutcome::Fault;
                }
                va = va.wrapping_add(4);
            }
            for k in 0..cnt2 {
                let v = reg(cpu, 16 + k);
                if mem_write(cpu, mmu, va, v as u64, 4, mark).is_none() {
                    return OpOutcome::Fault;
                }
                va = va.wrapping_add(4);
            }
            // 栈指针在全部存储成功后才落地
            set_reg(cpu, 14, base);
        }
        IROp::Pop { cnt1, r15, cnt2 } => {
            let total = (cnt1 as usize) + (r15 as usize) + (cnt2 as usize);
            let base = reg(cpu, 14);
            let mut vals = [0u32; 32];
            for (k, slot) in vals.iter_mut().take(total).enumerate() {
                let Some(v) = mem_read(cpu, mmu, base.wrapping_add(4 * k as u32), 4, mark)
                else {
                    return OpOutcome::Fault;
                };
                *slot = v as u32;
            }
            let mut n = 0;
            for k in 0..cnt1 {
                set_reg(cpu, 4 + k, vals[n]);
                n += 1;
            }
            if r15 {
                set_reg(cpu, 15, vals[n]);
                n += 1;
            }
            for k in 0..cnt2 {
                set_reg(cpu, 16 + k, vals[n]);
                n += 1;
            }
            set_reg(cpu, 14, base.wrapping_add(4 * total as u32));
        }

        // ---- 系统 ----
        IROp::Mfcr { rz, sel, idx } => {
            let v = creg_read(cpu, mmu, sel, idx);
            set_reg(cpu, rz, v);
        }
        IROp::Mtcr { rx, sel, idx } => {
            let v = reg(cpu, rx);
            creg_write(cpu, mmu, sel, idx, v);
        }
        IROp::PsrSet { bits } => cpu.psr_set_bits(bits),
        IROp::PsrClr { bits } => cpu.psr_clear_bits(bits),
        IROp::Idly { n } => cpu.idly_left = n,
        IROp::Sce { mask } => cpu.sce = Some(SceState { mask, left: 4 }),
    }
    OpOutcome::Done
}

/// 门禁跳过：r15 收下一指令地址，PC 指向监督向量基址前一个字。
fn guard_skip(cpu: &mut CpuState, mark: InsnMark) {
    set_reg(cpu, 15, mark.pc.wrapping_add(mark.len as u32));
    cpu.pc = cpu.vbr().wrapping_sub(4);
}

fn load_into<B: PhysBus>(
    cpu: &mut CpuState,
    mmu: &mut Mmu<B>,
    rz: RegId,
    va: u32,
    kind: MemKind,
    mark: InsnMark,
) -> OpOutcome {
    let Some(v) = mem_read(cpu, mmu, va, kind.size(), mark) else {
        return OpOutcome::Fault;
    };
    match kind {
        MemKind::B | MemKind::H | MemKind::W => set_reg(cpu, rz, v as u32),
        MemKind::Bs => set_reg(cpu, rz, v as u8 as i8 as i32 as u32),
        MemKind::Hs => set_reg(cpu, rz, v as u16 as i16 as i32 as u32),
        MemKind::D => cpu.set_reg_pair(rz, v),
    }
    OpOutcome::Done
}

fn store_from<B: PhysBus>(
    cpu: &mut CpuState,
    mmu: &mut Mmu<B>,
    rz: RegId,
    va: u32,
    kind: MemKind,
    mark: InsnMark,
) -> OpOutcome {
    let val = match kind {
        MemKind::D => cpu.reg_pair(rz),
        _ => reg(cpu, rz) as u64,
    };
    match mem_write(cpu, mmu, va, val, kind.size(), mark) {
        Some(()) => OpOutcome::Done,
        None => OpOutcome::Fault,
    }
}

/// 控制寄存器读通路：选择子 0 在 MMU 段（cr18-cr21）与核内寄存器间
/// 分流，1 是浮点标识/控制/状态，15 是 MMU 专用组。
fn creg_read<B: PhysBus>(cpu: &mut CpuState, mmu: &Mmu<B>, sel: u8, idx: u8) -> u32 {
    match sel {
        0 => match idx as u32 {
            i @ CP0_CCR..=CP0_PRSR => mmu.cp0_read(i),
            i => cpu.cr_read(i),
        },
        1 => match idx {
            0 => cpu.fid,
            1 => cpu.fcr,
            2 => cpu.fesr,
            _ => {
                log::debug!("CPU: read of unimplemented cr<{idx}, 1>");
                0
            }
        },
        15 => mmu.cp15_read(idx as u32),
        _ => {
            log::debug!("CPU: read of unimplemented cr<{idx}, {sel}>");
            0
        }
    }
}

fn creg_write<B: PhysBus>(cpu: &mut CpuState, mmu: &mut Mmu<B>, sel: u8, idx: u8, v: u32) {
    match sel {
        0 => match idx as u32 {
            i @ CP0_CCR..=CP0_PRSR => mmu.cp0_write(i, v),
            i => cpu.cr_write(i, v),
        },
        1 => match idx {
            // 浮点标识只读
            0 => {}
            1 => cpu.fcr = v,
            2 => cpu.fesr = v,
            _ => log::debug!("CPU: write of unimplemented cr<{idx}, 1> = {v:#010x}"),
        },
        15 => {
            let w = cpu.world();
            mmu.cp15_write(idx as u32, v, w);
        }
        _ => log::debug!("CPU: write of unimplemented cr<{idx}, {sel}> = {v:#010x}"),
    }
}

fn branch_cond(cpu: &CpuState, cond: BrCond, rx: RegId) -> bool {
    let v = reg(cpu, rx);
    match cond {
        BrCond::CTrue => cpu.c(),
        BrCond::CFalse => !cpu.c(),
        BrCond::EqZ => v == 0,
        BrCond::NeZ => v != 0,
        BrCond::GtZ => (v as i32) > 0,
        BrCond::LeZ => (v as i32) <= 0,
        BrCond::LtZ => (v as i32) < 0,
        BrCond::GeZ => (v as i32) >= 0,
    }
}

fn last_mark(blk: &TransBlock) -> InsnMark {
    blk.insn_marks.last().copied().unwrap_or(InsnMark {
        op_start: 0,
        pc: blk.start_pc,
        len: 0,
    })
}

fn resolve_term<B: PhysBus>(
    cpu: &mut CpuState,
    mmu: &mut Mmu<B>,
    blk: &TransBlock,
) -> BlockExit {
    match blk.term {
        Terminator::Fallthrough { next } => {
            cpu.pc = next;
            BlockExit::Chain
        }
        Terminator::Branch { target } => {
            cpu.stats.branches_taken += 1;
            cpu.pc = target;
            BlockExit::Chain
        }
        Terminator::BranchCond { cond, rx, target, next } => {
            if branch_cond(cpu, cond, rx) {
                cpu.stats.branches_taken += 1;
                cpu.pc = target;
            } else {
                cpu.pc = next;
            }
            BlockExit::Chain
        }
        Terminator::BranchLink { target, ret } => {
            set_reg(cpu, 15, ret);
            cpu.stats.branches_taken += 1;
            cpu.pc = target;
            BlockExit::Chain
        }
        Terminator::IndirectJmp { rx, link } => {
            // 目标先于连接寄存器读出，jsr r15 才能拿到旧值
            let target = reg(cpu, rx) & !1;
            if let Some(ret) = link {
                set_reg(cpu, 15, ret);
            }
            cpu.stats.branches_taken += 1;
            cpu.pc = target;
            BlockExit::Resync
        }
        Terminator::IndirectLoad { addr, link } => {
            let mark = last_mark(blk);
            let Some(v) = mem_read(cpu, mmu, addr, 4, mark) else {
                return BlockExit::Fault;
            };
            if let Some(ret) = link {
                set_reg(cpu, 15, ret);
            }
            cpu.stats.branches_taken += 1;
            cpu.pc = (v as u32) & !1;
            BlockExit::Resync
        }
        Terminator::IndirectTable { rx, scale } => {
            cpu.stats.branches_taken += 1;
            cpu.pc = cpu.vbr().wrapping_add(reg(cpu, rx).wrapping_mul(scale as u32));
            BlockExit::Resync
        }
        Terminator::Rte { fast } => {
            exception::return_from_exception(cpu, fast);
            BlockExit::Resync
        }
        Terminator::Exception { vec } => {
            let mark = last_mark(blk);
            // 陷阱指令返回到下一条，其余同步异常重新执行本条
            let ret = if (excp::TRAP0..=excp::TRAP3).contains(&vec) {
                blk.end_pc()
            } else {
                mark.pc
            };
            cpu.pc = mark.pc;
            cpu.raise(vec, ret);
            BlockExit::Fault
        }
        Terminator::Wait { kind, next } => {
            cpu.pc = next;
            BlockExit::Halt(kind)
        }
        Terminator::Sync { next } => {
            cpu.pc = next;
            BlockExit::Resync
        }
    }
}

// ---- 向量分道原语 ----

fn vlane_add(a: u32, b: u32, lane: VLane, sat: Sat) -> u32 {
    match (lane, sat) {
        (VLane::W4, Sat::None) => a.wrapping_add(b),
        (VLane::W4, Sat::Signed) => dsp::add_sat_s32(a, b).0,
        (VLane::W4, Sat::Unsigned) => dsp::add_sat_u32(a, b).0,
        (l, Sat::None) => dsp::pk_add(a, b, vlane_bits(l)),
        (l, Sat::Signed) => dsp::pk_add_sat_s(a, b, vlane_bits(l)).0,
        (l, Sat::Unsigned) => dsp::pk_add_sat_u(a, b, vlane_bits(l)).0,
    }
}

fn vlane_sub(a: u32, b: u32, lane: VLane, sat: Sat) -> u32 {
    match (lane, sat) {
        (VLane::W4, Sat::None) => a.wrapping_sub(b),
        (VLane::W4, Sat::Signed) => dsp::sub_sat_s32(a, b).0,
        (VLane::W4, Sat::Unsigned) => dsp::sub_sat_u32(a, b).0,
        (l, Sat::None) => dsp::pk_sub(a, b, vlane_bits(l)),
        (l, Sat::Signed) => dsp::pk_sub_sat_s(a, b, vlane_bits(l)).0,
        (l, Sat::Unsigned) => dsp::pk_sub_sat_u(a, b, vlane_bits(l)).0,
    }
}

fn vshl_word(a: u32, bits: u32, sh: u32) -> u32 {
    let sh = sh & (bits - 1);
    if bits == 32 {
        return a << sh;
    }
    let m = bitmask(bits);
    let mut out = 0u32;
    let mut off = 0;
    while off < 32 {
        let lane = (a >> off) & m;
        out |= ((lane << sh) & m) << off;
        off += bits;
    }
    out
}

fn vshr_word(a: u32, bits: u32, sh: u32, signed: bool) -> u32 {
    let sh = sh & (bits - 1);
    if bits == 32 {
        return if signed { ((a as i32) >> sh) as u32 } else { a >> sh };
    }
    let m = bitmask(bits);
    let ext = 32 - bits;
    let mut out = 0u32;
    let mut off = 0;
    while off < 32 {
        let lane = (a >> off) & m;
        let r = if signed {
            ((((lane << ext) as i32) >> ext >> sh) as u32) & m
        } else {
            lane >> sh
        };
        out |= r << off;
        off += bits;
    }
    out
}
