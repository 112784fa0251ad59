//! 执行统计。
//!
//! 统计随 vcpu 实例走，不使用全局可变状态；嵌入方通过值拷贝读取。

use serde::{Deserialize, Serialize};

/// 单个 vcpu 的累计执行统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreStats {
    /// 已执行指令数
    pub insns: u64,
    /// 已执行翻译块数
    pub blocks: u64,
    /// 发生的跳转次数（含条件跳转命中）
    pub branches_taken: u64,
    /// 数据装载次数
    pub loads: u64,
    /// 数据存储次数
    pub stores: u64,
    /// 分发的异常次数（含中断）
    pub exceptions: u64,
    /// 其中外部中断次数
    pub interrupts: u64,
    /// 翻译块缓存命中次数
    pub block_cache_hits: u64,
    /// 翻译（解码）次数
    pub translations: u64,
}

impl CoreStats {
    /// 把另一份统计累加进来。
    pub fn merge(&mut self, other: &CoreStats) {
        self.insns += other.insns;
        self.blocks += other.blocks;
        self.branches_taken += other.branches_taken;
        self.loads += other.loads;
        self.stores += other.stores;
        self.exceptions += other.exceptions;
        self.interrupts += other.interrupts;
        self.block_cache_hits += other.block_cache_hits;
        self.translations += other.translations;
    }
}
