//! 虚拟处理器执行循环。
//!
//! [`Vcpu`] 把前端翻译、块缓存、解释执行与异常/中断分发串成
//! 取块-执行-同步的主循环。静态出口的块在预算内链式连跑；间接
//! 跳转、异常与翻译环境变化回到同步点重新裁决，同步点先排空挂起
//! 异常、再轮询中断线。

use std::sync::Arc;

use csky_core::psr::{PSR_FE, PSR_IE};
use csky_core::{
    CoreConfig, CoreError, CpuState, InterruptController, PendingIrq, PhysBus, excp, exception,
};
use csky_frontend::translate_block;
use csky_ir::cache::{BlockCache, BlockKey};
use csky_ir::{Terminator, WaitKind};
use csky_mmu::{FlushReq, Mmu};

use crate::exec::{BlockExit, exec_block};

/// 连续链式执行多少个块后强制回同步点轮询中断。
const CHAIN_LIMIT: u32 = 16;

/// 块缓存容量（块数）。
const CACHE_CAP: usize = 4096;

/// [`Vcpu::run`] 交还控制权的原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// wait/doze 停机且无可唤醒的中断
    Halted(WaitKind),
    /// stop：彻底关停
    Shutdown,
    /// PC 落在调试断点上（尚未执行该指令）
    Breakpoint,
    /// 单步模式执行了一条指令
    SingleStep,
    /// 指令预算用尽（按块粒度结算）
    InsnLimit,
}

/// 单核虚拟处理器：寄存器状态、MMU、中断控制器与翻译块缓存。
pub struct Vcpu<B: PhysBus> {
    pub cpu: CpuState,
    pub mmu: Mmu<B>,
    pub intc: InterruptController,
    cache: BlockCache,
    cfg: CoreConfig,
}

impl<B: PhysBus> Vcpu<B> {
    pub fn new(cfg: &CoreConfig, bus: B) -> Self {
        let mut cpu = CpuState::new(cfg.model);
        cpu.reset(cfg.entry);
        cpu.tee_secure_irq = cfg.tee_secure_irq;
        cpu.debug.single_step = cfg.single_step;
        let mmu = Mmu::new(bus, cpu.features);
        Vcpu {
            cpu,
            mmu,
            intc: InterruptController::new(cfg.vectored_irq),
            cache: BlockCache::new(CACHE_CAP),
            cfg: cfg.clone(),
        }
    }

    /// 回到复位入口。体系结构状态、MMU 与翻译缓存全部重来，
    /// 断点表与统计保留。
    pub fn reset(&mut self) {
        self.cpu.reset(self.cfg.entry);
        self.cpu.debug.single_step = self.cfg.single_step;
        self.mmu.reset();
        self.cache.invalidate_all();
    }

    /// 当前缓存的翻译块数。
    pub fn cached_blocks(&self) -> usize {
        self.cache.len()
    }

    /// 执行至多 `budget` 条客户机指令。
    ///
    /// 预算按块粒度结算：跨过预算线的那个块会完整执行。断点在
    /// 进入块之前检查；PC 停在断点上调用 run 会先执行该块再停下，
    /// 否则无法从断点恢复。
    pub fn run(&mut self, budget: u64) -> Result<ExitReason, CoreError> {
        let start_insns = self.cpu.stats.insns;
        let mut chained = 0u32;
        let mut sync_point = true;
        let mut first_block = true;

        loop {
            if sync_point {
                // 先排空挂起异常：向量取指本身可能再故障，由
                // dispatch 内部升级处理
                while exception::dispatch(&mut self.cpu, &mut self.mmu)? {}
                if let Some(irq) = self.poll_irq() {
                    if irq.fast {
                        self.cpu.raise_fast(irq.vec, self.cpu.pc);
                    } else {
                        self.cpu.raise(irq.vec, self.cpu.pc);
                    }
                    continue;
                }
                chained = 0;
                sync_point = false;
            }

            if self.cpu.stats.insns.wrapping_sub(start_insns) >= budget {
                return Ok(ExitReason::InsnLimit);
            }
            if !first_block && self.cpu.debug.has_breakpoint(self.cpu.pc) {
                return Ok(ExitReason::Breakpoint);
            }
            first_block = false;

            let blk = match self.fetch_block() {
                Some(b) => b,
                None => {
                    // 取指故障已登记，回同步点分发
                    sync_point = true;
                    continue;
                }
            };

            let tm = self.cpu.trace_mode();
            let taken_before = self.cpu.stats.branches_taken;
            let is_rte = matches!(blk.term, Terminator::Rte { .. });

            let exit = exec_block(&mut self.cpu, &mut self.mmu, &blk);
            self.apply_flush();

            // 跟踪异常：TM=01 每条指令后补挂，TM=10 只在执行了跳转
            // 的块后。rte 的补挂由异常返回路径自己处理。
            if tm != 0
                && !is_rte
                && self.cpu.pending.is_none()
                && !matches!(exit, BlockExit::Fault | BlockExit::Halt(_))
            {
                let taken = self.cpu.stats.branches_taken > taken_before;
                if tm == 1 || (tm == 2 && taken) {
                    self.cpu.raise(excp::TRACE, self.cpu.pc);
                }
            }

            match exit {
                BlockExit::Chain => {
                    chained += 1;
                    if chained >= CHAIN_LIMIT
                        || self.cpu.pending.is_some()
                        || self.intc.any_pending()
                    {
                        sync_point = true;
                    }
                }
                BlockExit::Resync | BlockExit::Fault => sync_point = true,
                BlockExit::Halt(WaitKind::Stop) => return Ok(ExitReason::Shutdown),
                BlockExit::Halt(kind) => {
                    if self.cpu.pending.is_some() || self.poll_irq().is_some() {
                        // 有可唤醒事件，立即从 next 继续
                        sync_point = true;
                    } else {
                        return Ok(ExitReason::Halted(kind));
                    }
                }
            }

            if self.cpu.debug.single_step {
                // 挂起的异常先分发完，让单步停在处理程序入口
                while exception::dispatch(&mut self.cpu, &mut self.mmu)? {}
                return Ok(ExitReason::SingleStep);
            }
        }
    }

    /// 取当前 PC 的翻译块。条件执行/中断延迟窗口、单步与指令跟踪
    /// 都要求逐条重译，这些块不进缓存。取指故障时登记异常并返回
    /// None。
    fn fetch_block(&mut self) -> Option<Arc<csky_ir::TransBlock>> {
        let bypass = self.cpu.sce.is_some()
            || self.cpu.idly_left > 0
            || self.cpu.debug.single_step
            || self.cpu.trace_mode() == 1;
        if bypass {
            return match translate_block(&self.cpu, &mut self.mmu, self.cfg.max_block_insns) {
                Ok(b) => Some(Arc::new(b)),
                Err(f) => {
                    self.cpu.raise(f.vec, self.cpu.pc);
                    None
                }
            };
        }

        let key = BlockKey {
            pc: self.cpu.pc,
            world: self.cpu.world(),
            asid: self.mmu.regs.asid(),
            sup: self.cpu.supervisor(),
        };
        if let Some(b) = self.cache.get(&key) {
            self.cpu.stats.block_cache_hits += 1;
            return Some(b);
        }
        match translate_block(&self.cpu, &mut self.mmu, self.cfg.max_block_insns) {
            Ok(b) => {
                self.cpu.stats.translations += 1;
                let b = Arc::new(b);
                self.cache.insert(key, b.clone());
                Some(b)
            }
            Err(f) => {
                self.cpu.raise(f.vec, self.cpu.pc);
                None
            }
        }
    }

    /// 中断线轮询。条件执行与中断延迟窗口内一律屏蔽。
    fn poll_irq(&self) -> Option<PendingIrq> {
        if self.cpu.sce.is_some() || self.cpu.idly_left > 0 {
            return None;
        }
        let psr = self.cpu.psr_read();
        self.intc.poll(psr & PSR_IE != 0, psr & PSR_FE != 0)
    }

    /// MMU 侧的翻译失效请求同步到块缓存。
    fn apply_flush(&mut self) {
        match self.mmu.take_flush() {
            FlushReq::None => {}
            FlushReq::Asid(asid) => self.cache.invalidate_asid(asid),
            FlushReq::All => self.cache.invalidate_all(),
        }
    }
}
