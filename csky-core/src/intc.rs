//! 中断控制器。
//!
//! 外围系统（定时器线程、设备模型）通过克隆出的句柄在任意线程
//! 登记/撤销中断线；vcpu 循环在指令边界轮询。线是电平触发的：
//! 分发后不自动清除，由客户机的处理程序驱动外设撤销。

use crate::exception::excp;
use parking_lot::Mutex;
use std::sync::Arc;

/// 轮询结果：应分发的向量号与是否走快速中断影子对。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingIrq {
    pub vec: u32,
    pub fast: bool,
}

#[derive(Debug, Default)]
struct Lines {
    irq: u64,
    fiq: u64,
}

/// 线程安全的中断线集合。克隆共享同一组线。
#[derive(Debug, Clone)]
pub struct InterruptController {
    lines: Arc<Mutex<Lines>>,
    /// 向量模式：向量号为 32+line；否则自动向量 10/11
    vectored: bool,
}

impl InterruptController {
    pub fn new(vectored: bool) -> Self {
        InterruptController {
            lines: Arc::new(Mutex::new(Lines::default())),
            vectored,
        }
    }

    pub fn raise_irq(&self, line: u8) {
        let mut l = self.lines.lock();
        l.irq |= 1u64 << (line & 63);
        log::debug!("INTC: irq line {} raised", line & 63);
    }

    pub fn clear_irq(&self, line: u8) {
        let mut l = self.lines.lock();
        l.irq &= !(1u64 << (line & 63));
        log::debug!("INTC: irq line {} cleared", line & 63);
    }

    pub fn raise_fiq(&self, line: u8) {
        let mut l = self.lines.lock();
        l.fiq |= 1u64 << (line & 63);
        log::debug!("INTC: fiq line {} raised", line & 63);
    }

    pub fn clear_fiq(&self, line: u8) {
        let mut l = self.lines.lock();
        l.fiq &= !(1u64 << (line & 63));
    }

    /// 是否有任何线挂起（不考虑使能位）。
    pub fn any_pending(&self) -> bool {
        let l = self.lines.lock();
        l.irq != 0 || l.fiq != 0
    }

    /// 按使能位轮询最高优先级挂起线。快速中断优先；同类中
    /// 低编号线优先。
    pub fn poll(&self, ie: bool, fe: bool) -> Option<PendingIrq> {
        let l = self.lines.lock();
        if fe && l.fiq != 0 {
            let line = l.fiq.trailing_zeros();
            return Some(PendingIrq {
                vec: if self.vectored {
                    excp::VECTORED_BASE + line
                } else {
                    excp::FINT
                },
                fast: true,
            });
        }
        if ie && l.irq != 0 {
            let line = l.irq.trailing_zeros();
            return Some(PendingIrq {
                vec: if self.vectored {
                    excp::VECTORED_BASE + line
                } else {
                    excp::INT
                },
                fast: false,
            });
        }
        None
    }
}

impl Default for InterruptController {
    fn default() -> Self {
        InterruptController::new(false)
    }
}
