//! 调试控制：断点表与单步标志。

use crate::GuestAddr;
use serde::{Deserialize, Serialize};

/// vcpu 的调试状态。断点所在地址总是一个块的起点，执行循环在
/// 进入该块前交还嵌入方。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugCtl {
    /// 单步模式（翻译驱动退化为单指令块）
    pub single_step: bool,
    breakpoints: Vec<GuestAddr>,
}

impl DebugCtl {
    pub fn add_breakpoint(&mut self, addr: GuestAddr) {
        if !self.breakpoints.contains(&addr) {
            self.breakpoints.push(addr);
        }
    }

    pub fn remove_breakpoint(&mut self, addr: GuestAddr) {
        self.breakpoints.retain(|&a| a != addr);
    }

    pub fn has_breakpoint(&self, addr: GuestAddr) -> bool {
        self.breakpoints.contains(&addr)
    }

    pub fn breakpoints(&self) -> &[GuestAddr] {
        &self.breakpoints
    }

    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakpoint_set() {
        let mut d = DebugCtl::default();
        d.add_breakpoint(0x100);
        d.add_breakpoint(0x100);
        d.add_breakpoint(0x200);
        assert_eq!(d.breakpoints().len(), 2);
        assert!(d.has_breakpoint(0x100));
        d.remove_breakpoint(0x100);
        assert!(!d.has_breakpoint(0x100));
    }
}
