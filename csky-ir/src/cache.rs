//! 翻译块缓存。
//!
//! 以 (PC, 世界, ASID, 特权级) 为键缓存已翻译的块，LRU 时钟驱逐。
//! 世界与 ASID 进键是因为 TLB 语境变化后同一 PC 的翻译结果可能
//! 不同；特权级进键是因为特权检查在解码期完成，同一 PC 在用户态
//! 必须重新翻译。TLB 维护操作通过失效接口把受影响的块清掉。

use crate::TransBlock;
use csky_core::World;
use std::collections::HashMap;
use std::sync::Arc;

/// 缓存键。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKey {
    pub pc: u32,
    pub world: World,
    pub asid: u8,
    /// 翻译时的特权级（PSR.S）
    pub sup: bool,
}

#[derive(Debug)]
struct CacheEntry {
    block: Arc<TransBlock>,
    access_time: u64,
}

/// 容量受限的翻译块缓存。
#[derive(Debug)]
pub struct BlockCache {
    map: HashMap<BlockKey, CacheEntry>,
    capacity: usize,
    clock: u64,
    hits: u64,
    misses: u64,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        BlockCache {
            map: HashMap::with_capacity(capacity),
            capacity: capacity.max(1),
            clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// 查找。命中时刷新访问时间。
    pub fn get(&mut self, key: &BlockKey) -> Option<Arc<TransBlock>> {
        self.clock += 1;
        let clock = self.clock;
        match self.map.get_mut(key) {
            Some(e) => {
                e.access_time = clock;
                self.hits += 1;
                Some(Arc::clone(&e.block))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// 插入。容量满时驱逐最久未访问的条目。
    pub fn insert(&mut self, key: BlockKey, block: Arc<TransBlock>) {
        if self.map.len() >= self.capacity && !self.map.contains_key(&key) {
            if let Some(victim) = self
                .map
                .iter()
                .min_by_key(|(_, e)| e.access_time)
                .map(|(k, _)| *k)
            {
                self.map.remove(&victim);
            }
        }
        self.clock += 1;
        self.map.insert(
            key,
            CacheEntry {
                block,
                access_time: self.clock,
            },
        );
    }

    /// 全部失效。
    pub fn invalidate_all(&mut self) {
        self.map.clear();
    }

    /// 失效指定 ASID 的所有块。
    pub fn invalidate_asid(&mut self, asid: u8) {
        self.map.retain(|k, _| k.asid != asid);
    }

    /// 失效覆盖了给定地址的所有块（自修改代码/单页失效用，保守实现）。
    pub fn invalidate_addr(&mut self, addr: u32) {
        self.map
            .retain(|k, e| !(k.pc <= addr && addr < k.pc.wrapping_add(e.block.byte_len)));
    }
}
