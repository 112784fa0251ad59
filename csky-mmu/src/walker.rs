//! 硬件重填的两级页表遍历。
//!
//! 表布局由操作系统约定:MPGD 指向 1024 项的页目录,目录项的高 20 位
//! 是二级表物理基址;二级表按 4K 页组织,重填一次取回偶/奇两个页表项。
//! 遍历只读物理总线,不解释有效位,拿回什么就合成什么(无效半页留给
//! 重试后的查找去报)。

use csky_core::PhysBus;

/// 取回的一对描述字,MEL 格式。
#[derive(Debug, Clone, Copy)]
pub struct WalkResult {
    pub mel0: u32,
    pub mel1: u32,
}

/// 从 `mpgd` 出发为 `va` 走表。任何一级总线失败都返回 `None`,
/// 调用方保持未命中语义。
pub fn walk<B: PhysBus>(bus: &mut B, mpgd: u32, va: u32) -> Option<WalkResult> {
    let l1_addr = (mpgd & !0xfff).wrapping_add((va >> 22) << 2);
    let pde = bus.read(l1_addr, 4).ok()? as u32;

    // 偶数项起步,一次合成一个页对。
    let l2_index = (va >> 12) & 0x3fe;
    let l2_addr = (pde & !0xfff).wrapping_add(l2_index << 2);
    let mel0 = bus.read(l2_addr, 4).ok()? as u32;
    let mel1 = bus.read(l2_addr.wrapping_add(4), 4).ok()? as u32;
    Some(WalkResult { mel0, mel1 })
}
