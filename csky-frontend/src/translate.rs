//! 翻译驱动：把连续指令聚成语义动作块。
//!
//! 停块条件：
//! - 解码出控制流结束符（转移/异常/同步/等待）
//! - 达到块长上限
//! - 下一条指令越过 4K 页边界（页重映射后旧块按页失效）
//! - 下一条指令落在宿主断点上（断点所在指令归下一个块）
//! - 单步、指令跟踪、条件执行窗口或中断延迟窗口生效时，每块只收一条指令
//!
//! 取指失败时：首条指令即失败则整块失败，由上层走异常派发；
//! 已收到指令则提前封块，故障推迟到下个块的首次取指再现。

use csky_core::{CpuState, GuestMem, MemCtx, MemFault};
use csky_ir::{BlockBuilder, TransBlock};

use crate::decode16::decode16;
use crate::decode32::decode32;
use crate::insn_len;

/// 从 `cpu.pc` 开始翻译一个语义动作块。
///
/// 翻译用的特权级、世界与特性位取自当前处理器状态，调用方据此
/// 组缓存键。`max_insns` 是块内指令数上限。
pub fn translate_block<M: GuestMem>(
    cpu: &CpuState,
    mem: &mut M,
    max_insns: usize,
) -> Result<TransBlock, MemFault> {
    let ctx = MemCtx {
        sup: cpu.supervisor(),
        world: cpu.world(),
    };
    let feats = cpu.features;
    let sup = cpu.supervisor();
    // 条件执行与中断延迟窗口按条计数；单步来自调试开关，指令跟踪
    // （TM=01）要求每条指令后补挂跟踪异常，同样退化为单指令块
    let single = cpu.sce.is_some()
        || cpu.idly_left > 0
        || cpu.debug.single_step
        || cpu.trace_mode() == 1;

    let start = cpu.pc;
    let mut b = BlockBuilder::new(start);
    if let Some(sce) = cpu.sce {
        b.set_pred(sce.mask & 1 != 0);
    }

    let mut pc = start;
    loop {
        if b.icount() > 0 && cpu.debug.has_breakpoint(pc) {
            break;
        }
        let hw0 = match mem.fetch(pc, 2, ctx) {
            Ok(v) => v as u16,
            Err(fault) => {
                if b.icount() == 0 {
                    return Err(fault);
                }
                break;
            }
        };
        let len = insn_len(hw0);
        if len == 2 {
            b.begin_insn(pc, 2);
            decode16(&mut b, hw0, pc);
        } else {
            let hw1 = match mem.fetch(pc.wrapping_add(2), 2, ctx) {
                Ok(v) => v as u16,
                Err(fault) => {
                    if b.icount() == 0 {
                        return Err(fault);
                    }
                    break;
                }
            };
            b.begin_insn(pc, 4);
            let raw = ((hw0 as u32) << 16) | hw1 as u32;
            decode32(&mut b, raw, pc, feats, sup);
        }
        pc = pc.wrapping_add(len as u32);

        if b.has_term() || single {
            break;
        }
        if b.icount() as usize >= max_insns {
            break;
        }
        if (pc ^ start) & !0xfff != 0 {
            break;
        }
    }
    Ok(b.build())
}
