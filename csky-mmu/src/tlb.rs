//! 软件管理 TLB。
//!
//! 每个世界一张 128 项的表,按索引组织:虚拟地址经当前页大小散列出
//! 0..64 的组号 `i`,候选槽位是 `i` 与 `i+64` 两代;组内下一次自动插入
//! 用每组一位的轮转位选择。一个表项覆盖相邻的偶/奇两页。

use serde::{Deserialize, Serialize};

/// 页对中的一半(偶页或奇页)。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageHalf {
    /// 物理帧号(4K 粒度)
    pub pfn: u32,
    /// 有效位
    pub v: bool,
    /// 脏位,写访问要求置位
    pub d: bool,
    /// 缓存属性,模型只保存不解释
    pub c: u8,
}

impl PageHalf {
    /// 从 MEL 格式(PFN[31:12] | C[5:3] | D[2] | V[1] | G[0])解出一半。
    pub fn from_mel(mel: u32) -> Self {
        PageHalf {
            pfn: mel >> 12,
            v: mel & 0x2 != 0,
            d: mel & 0x4 != 0,
            c: ((mel >> 3) & 0x7) as u8,
        }
    }

    /// 回写成 MEL 格式,全局位由表项级的 G 补上。
    pub fn to_mel(self, g: bool) -> u32 {
        (self.pfn << 12)
            | ((self.c as u32 & 0x7) << 3)
            | ((self.d as u32) << 2)
            | ((self.v as u32) << 1)
            | g as u32
    }
}

/// 一个 TLB 表项:一对页的标签与两半。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlbEntry {
    /// 虚拟页对号,MEH[31:13]
    pub vpn: u32,
    /// 地址空间号,MEH[7:0]
    pub asid: u8,
    /// 全局位(两半 MEL 的 G 相与),置位时忽略 ASID
    pub g: bool,
    /// 页大小掩码(MPR 格式,0 为 4K)
    pub mask: u32,
    /// 偶页与奇页
    pub pages: [PageHalf; 2],
}

impl Default for TlbEntry {
    /// 空槽的 VPN 取全 1,任何真实地址(VPN ≤ 19 位)都不会与之匹配,
    /// 探测无效槽也不会误报命中。
    fn default() -> Self {
        TlbEntry {
            vpn: u32::MAX,
            asid: 0,
            g: false,
            mask: 0,
            pages: [PageHalf::default(); 2],
        }
    }
}

impl TlbEntry {
    pub fn from_regs(meh: u32, mel0: u32, mel1: u32, mask: u32) -> Self {
        TlbEntry {
            vpn: meh >> 13,
            asid: (meh & 0xff) as u8,
            g: mel0 & mel1 & 1 != 0,
            mask,
            pages: [PageHalf::from_mel(mel0), PageHalf::from_mel(mel1)],
        }
    }

    /// 还原为 (MEH, MEL0, MEL1, MPR) 四元组。
    pub fn to_regs(&self) -> (u32, u32, u32, u32) {
        (
            (self.vpn << 13) | self.asid as u32,
            self.pages[0].to_mel(self.g),
            self.pages[1].to_mel(self.g),
            self.mask,
        )
    }

    /// 本表项的页内偏移位数(由自身 mask 决定)。
    pub fn page_shift(&self) -> u32 {
        12 + (self.mask >> 13).count_ones()
    }

    /// 标签比较:VPN 按本表项的页大小截断,ASID 受全局位豁免。
    pub fn matches(&self, va: u32, asid: u8) -> bool {
        let tag_mask = !(self.mask >> 13);
        (va >> 13) & tag_mask == self.vpn & tag_mask && (self.g || self.asid == asid)
    }

    /// 任一半有效即认为该槽被占用(用于替换时的冲刷判断)。
    pub fn live(&self) -> bool {
        self.pages[0].v || self.pages[1].v
    }
}

/// 翻译结果。四种失败形态各自独立,由调用方映射到异常号,互不降级。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlbRet {
    Ok { paddr: u32 },
    /// 访问被保护区域或窗口拒绝
    BadAddr,
    /// 标签命中但所在半页无效
    Invalid,
    /// 写命中但脏位未置
    Modified,
    /// 两个候选槽都未命中
    NoMatch,
}

/// 命中率统计,随快照一起丢弃。
#[derive(Debug, Clone, Default)]
pub struct TlbStats {
    pub hits: u64,
    pub misses: u64,
    pub refills: u64,
    pub flushes: u64,
}

impl TlbStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub const TLB_ENTRIES: usize = 128;
const TLB_SETS: usize = TLB_ENTRIES / 2;

/// 单个世界的 TLB 数组。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tlb {
    entries: Vec<TlbEntry>,
    /// 每组一位的轮转替换位,位 i 选择组 i 的下一个自动插入槽
    rr: u64,
    #[serde(skip)]
    pub stats: TlbStats,
}

impl Default for Tlb {
    fn default() -> Self {
        Self::new()
    }
}

/// 组号:虚拟地址去掉页内偏移与偶/奇位后的低 6 位。
fn set_of(va: u32, cur_shift: u32) -> usize {
    ((va >> (cur_shift + 1)) & 0x3f) as usize
}

impl Tlb {
    pub fn new() -> Self {
        Tlb {
            entries: vec![TlbEntry::default(); TLB_ENTRIES],
            rr: 0,
            stats: TlbStats::default(),
        }
    }

    pub fn entry(&self, idx: usize) -> TlbEntry {
        self.entries[idx & (TLB_ENTRIES - 1)]
    }

    /// 查找翻译。`cur_shift` 是当前 MPR 决定的页内位数,只参与组号计算;
    /// 标签比较用表项自己的 mask。首个标签命中的槽定结果,无效半页
    /// 报 [`TlbRet::Invalid`] 而不是继续探测,杜绝陈旧翻译。
    pub fn lookup(&mut self, va: u32, asid: u8, is_write: bool, cur_shift: u32) -> TlbRet {
        let set = set_of(va, cur_shift);
        for slot in [set, set + TLB_SETS] {
            let e = &self.entries[slot];
            if !e.matches(va, asid) {
                continue;
            }
            let shift = e.page_shift();
            let half = e.pages[((va >> shift) & 1) as usize];
            if !half.v {
                self.stats.misses += 1;
                return TlbRet::Invalid;
            }
            if is_write && !half.d {
                self.stats.misses += 1;
                return TlbRet::Modified;
            }
            self.stats.hits += 1;
            let offset = va & ((1u32 << shift) - 1);
            return TlbRet::Ok {
                paddr: (half.pfn << 12) | offset,
            };
        }
        self.stats.misses += 1;
        TlbRet::NoMatch
    }

    /// TLBP:按 MEH 的标签探测,命中返回槽号。
    pub fn probe(&self, meh: u32, cur_shift: u32) -> Option<usize> {
        let va = meh & 0xffff_e000;
        let asid = (meh & 0xff) as u8;
        let set = set_of(va, cur_shift);
        [set, set + TLB_SETS]
            .into_iter()
            .find(|&slot| self.entries[slot].matches(va, asid))
    }

    /// TLBWI:写显式槽号,不动轮转位。
    pub fn write_indexed(&mut self, idx: usize, entry: TlbEntry) -> TlbEntry {
        let slot = idx & (TLB_ENTRIES - 1);
        std::mem::replace(&mut self.entries[slot], entry)
    }

    /// TLBWR/重填:写表项标签所在组的轮转槽并翻转该组的轮转位。
    /// 返回被换出的旧表项,调用方据此决定冲刷范围。
    pub fn write_random(&mut self, entry: TlbEntry, cur_shift: u32) -> TlbEntry {
        let set = set_of(entry.vpn << 13, cur_shift);
        let slot = if self.rr >> set & 1 == 0 {
            set
        } else {
            set + TLB_SETS
        };
        self.rr ^= 1 << set;
        std::mem::replace(&mut self.entries[slot], entry)
    }

    pub fn invalidate_all(&mut self) {
        self.entries.fill(TlbEntry::default());
        self.rr = 0;
        self.stats.flushes += 1;
    }

    /// 失效指定 ASID 的所有非全局表项,全局表项保留。
    pub fn invalidate_asid(&mut self, asid: u8) {
        for e in &mut self.entries {
            if !e.g && e.asid == asid {
                *e = TlbEntry::default();
            }
        }
        self.stats.flushes += 1;
    }
}
