//! 异常与中断分发。
//!
//! 分发是一个四阶段状态机：Idle →（raise）Asserted →（dispatch）
//! Dispatching →（向量表取数、写 PC）Vectored → Idle。过程中保存
//! 返回上下文到 EPC/EPSR（快速中断用 FPC/FPSR），清 TP/EE/IE/TM、
//! 置 S、写 VEC 字段，必要时切换 TEE 世界与 ABIV1 备用寄存器组。
//!
//! 向量表取数本身可能再次出错：第一次出错升级为不可恢复异常
//! （向量 8）重试，再次出错则放弃并向嵌入方返回硬错误。

use crate::bus::{GuestMem, MemCtx};
use crate::error::CoreError;
use crate::features::Features;
use crate::psr::*;
use crate::state::CpuState;
use crate::GuestAddr;
use serde::{Deserialize, Serialize};

/// 异常向量号。32 起为外部向量中断。
pub mod excp {
    pub const RESET: u32 = 0;
    pub const ALIGN: u32 = 1;
    pub const ACCESS: u32 = 2;
    pub const ZERODIV: u32 = 3;
    pub const ILLEGAL: u32 = 4;
    pub const PRIV: u32 = 5;
    pub const TRACE: u32 = 6;
    pub const BKPT: u32 = 7;
    pub const UNRECOVER: u32 = 8;
    pub const SOFT_RESET: u32 = 9;
    /// 自动向量普通中断
    pub const INT: u32 = 10;
    /// 自动向量快速中断
    pub const FINT: u32 = 11;
    pub const FLOAT: u32 = 13;
    /// TLB 全相联查找无匹配（需要回填）
    pub const TLB_UNMATCH: u32 = 14;
    /// 写命中但 D 位为 0
    pub const TLB_MODIFIED: u32 = 15;
    pub const TRAP0: u32 = 16;
    pub const TRAP1: u32 = 17;
    pub const TRAP2: u32 = 18;
    pub const TRAP3: u32 = 19;
    /// 读命中但 V 位为 0
    pub const TLB_READ_INVALID: u32 = 20;
    /// 写命中但 V 位为 0
    pub const TLB_WRITE_INVALID: u32 = 21;
    /// 外部向量中断起始号
    pub const VECTORED_BASE: u32 = 32;
}

/// 分发状态机阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DispatchPhase {
    #[default]
    Idle,
    /// 已登记挂起异常，尚未开始分发
    Asserted,
    /// 正在保存上下文/取向量
    Dispatching,
    /// 已写入新 PC
    Vectored,
}

/// 挂起的异常。`ret_pc` 是 rte 应返回的地址：同步故障为出错指令
/// 本身，中断与陷阱为下一条指令。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingExc {
    pub vec: u32,
    pub ret_pc: GuestAddr,
    /// 走 FPC/FPSR 影子对并额外清 FE
    pub fast: bool,
}

impl CpuState {
    /// 登记一个挂起异常。已有挂起项时保持先到者，后到的记录日志丢弃
    /// （电平触发的中断线会在下一轮轮询中再次出现）。
    pub fn raise(&mut self, vec: u32, ret_pc: GuestAddr) {
        self.raise_full(PendingExc {
            vec,
            ret_pc,
            fast: false,
        });
    }

    /// 登记快速中断（FPC/FPSR 影子对）。
    pub fn raise_fast(&mut self, vec: u32, ret_pc: GuestAddr) {
        self.raise_full(PendingExc {
            vec,
            ret_pc,
            fast: true,
        });
    }

    fn raise_full(&mut self, p: PendingExc) {
        if let Some(cur) = self.pending {
            log::debug!(
                "EXC: vector {} dropped, vector {} already pending",
                p.vec,
                cur.vec
            );
            return;
        }
        self.pending = Some(p);
        self.phase = DispatchPhase::Asserted;
    }
}

/// 分发挂起异常（若有）。返回是否发生了分发。
///
/// 向量表表项经由客户机内存读出，因此本身可能故障；故障按深度
/// 升级：第 1 次改挂不可恢复异常重试，第 2 次返回 [`CoreError::DoubleFault`]。
/// 成功分发把深度清零。
pub fn dispatch(cpu: &mut CpuState, mem: &mut dyn GuestMem) -> Result<bool, CoreError> {
    if cpu.pending.is_none() {
        return Ok(false);
    }
    while let Some(p) = cpu.pending.take() {
        match dispatch_one(cpu, mem, &p) {
            Ok(()) => {
                cpu.exc_depth = 0;
                cpu.phase = DispatchPhase::Idle;
                cpu.stats.exceptions += 1;
                if p.vec == excp::INT || p.vec == excp::FINT || p.vec >= excp::VECTORED_BASE {
                    cpu.stats.interrupts += 1;
                }
                return Ok(true);
            }
            Err(fault) => {
                cpu.exc_depth = cpu.exc_depth.saturating_add(1);
                log::warn!(
                    "EXC: vector table fetch fault at {:#010x} dispatching vector {} (depth {})",
                    fault.vaddr,
                    p.vec,
                    cpu.exc_depth
                );
                if cpu.exc_depth >= 2 {
                    cpu.phase = DispatchPhase::Idle;
                    return Err(CoreError::DoubleFault {
                        vec: p.vec,
                        pc: p.ret_pc,
                    });
                }
                cpu.pending = Some(PendingExc {
                    vec: excp::UNRECOVER,
                    ret_pc: p.ret_pc,
                    fast: false,
                });
            }
        }
    }
    Ok(true)
}

fn dispatch_one(
    cpu: &mut CpuState,
    mem: &mut dyn GuestMem,
    p: &PendingExc,
) -> Result<(), crate::bus::MemFault> {
    cpu.phase = DispatchPhase::Dispatching;
    let old_psr = cpu.psr_read();

    // TEE：配置为安全路由的外部向量中断先切入信任世界，
    // 返回上下文因此落在信任世界的影子组里。
    if p.vec >= excp::VECTORED_BASE
        && cpu.tee_secure_irq
        && cpu.features.has(Features::TEE)
        && cpu.world() == crate::World::NonTrust
    {
        cpu.enter_trust_world();
    }

    if p.fast {
        cpu.fpsr = old_psr;
        cpu.fpc = p.ret_pc;
    } else {
        cpu.set_epsr(old_psr);
        cpu.set_epc(p.ret_pc);
    }

    let mut new_psr = cpu.psr_read() & !PSR_DISPATCH_CLEAR;
    if p.fast {
        new_psr &= !PSR_FE;
    }
    new_psr |= PSR_S;
    new_psr = (new_psr & !PSR_VEC_MASK) | ((p.vec & 0xff) << PSR_VEC_SHIFT);
    cpu.psr_write(new_psr);

    let ctx = MemCtx::supervisor(cpu.world());
    let slot = cpu.vbr().wrapping_add(p.vec.wrapping_mul(4));
    let entry = mem.fetch(slot, 4, ctx)?;

    cpu.pc = cpu.apply_vector_entry(entry);
    cpu.phase = DispatchPhase::Vectored;
    log::trace!(
        "EXC: vector {} dispatched, pc {:#010x}, ret {:#010x}",
        p.vec,
        cpu.pc,
        p.ret_pc
    );
    Ok(())
}

/// 从异常返回（rte/rfi）。恢复 PC 与 PSR；恢复出的 PSR 带 TP 位时
/// 立即补挂跟踪异常，使其先于任何客户机指令分发。
pub fn return_from_exception(cpu: &mut CpuState, fast: bool) {
    let (pc, psr) = if fast {
        (cpu.fpc, cpu.fpsr)
    } else {
        (cpu.epc(), cpu.epsr())
    };
    cpu.psr_write(psr);
    cpu.pc = pc & !1;
    if cpu.psr_read() & PSR_TP != 0 {
        cpu.raise(excp::TRACE, cpu.pc);
    }
}
