//! 存储管理相关的控制寄存器。
//!
//! cp0 侧是保护/模式寄存器(CCR/CAPR/PACR/PRSR),cp15 侧是 TLB 管理
//! 寄存器(MIR/MEL/MEH/MPR/MCIR/MPGD/MSA)。[`MmuRegs`] 只负责存取与
//! 字段解释,带副作用的 MCIR 命令由外层的 [`crate::Mmu`] 解码执行。

use serde::{Deserialize, Serialize};

/// cp0 寄存器号。
pub const CP0_CCR: u32 = 18;
pub const CP0_CAPR: u32 = 19;
pub const CP0_PACR: u32 = 20;
pub const CP0_PRSR: u32 = 21;

/// cp15 寄存器号。
pub const CP15_MIR: u32 = 0;
pub const CP15_MEL0: u32 = 2;
pub const CP15_MEL1: u32 = 3;
pub const CP15_MEH: u32 = 4;
pub const CP15_MCR: u32 = 5;
pub const CP15_MPR: u32 = 6;
pub const CP15_MWR: u32 = 7;
pub const CP15_MCIR: u32 = 8;
pub const CP15_MPGD: u32 = 29;
pub const CP15_MSA0: u32 = 30;
pub const CP15_MSA1: u32 = 31;

/// MIR 的探测失败位。
pub const MIR_P: u32 = 1 << 31;

/// MCIR 命令位,高位在前依次处理。
pub const MCIR_TLBP: u32 = 1 << 31;
pub const MCIR_TLBR: u32 = 1 << 30;
pub const MCIR_TLBWI: u32 = 1 << 29;
pub const MCIR_TLBWR: u32 = 1 << 28;
pub const MCIR_INV_ALL: u32 = 1 << 27;
pub const MCIR_INV_ASID: u32 = 1 << 26;

/// MSA 段窗口字段:bit0 使能,bit1 可写,bit2 缓存属性(不解释),
/// [31:29] 物理基址高三位。
pub const MSA_EN: u32 = 1 << 0;
pub const MSA_WR: u32 = 1 << 1;

/// 合法的 MPR 页掩码位于 [24:13],且低位起成对连续。
/// 返回页内偏移位数,非法掩码返回 `None`。
pub fn page_shift_of(mask: u32) -> Option<u32> {
    if mask & !0x01ff_e000 != 0 {
        return None;
    }
    let m = mask >> 13;
    if m & (m + 1) != 0 {
        return None;
    }
    let ones = m.count_ones();
    if ones % 2 != 0 {
        return None;
    }
    Some(12 + ones)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MmuRegs {
    /// 缓存/模式配置,[1:0] 选择翻译模式
    pub ccr: u32,
    /// MGU 各区域的 2 位访问许可,区域 i 在 [2i+1:2i]
    pub capr: u32,
    /// MGU 区域选择,[2:0] 决定 PACR 当前映射到哪个区域
    pub prsr: u32,
    /// 八个保护区域描述字
    pub pacr: [u32; 8],
    /// TLB 索引寄存器,[6:0] 槽号,bit31 探测失败
    pub mir: u32,
    pub mel0: u32,
    pub mel1: u32,
    /// TLB 标签:VPN[31:13] | ASID[7:0]
    pub meh: u32,
    pub mcr: u32,
    /// 页大小掩码(原样保存,含非法值)
    pub mpr: u32,
    pub mwr: u32,
    /// 页目录基址,低 12 位忽略
    pub mpgd: u32,
    pub msa0: u32,
    pub msa1: u32,
    /// MPR 解释出的有效页内位数,非法掩码时退回 12(4K)
    pub mpr_shift: u32,
}

impl Default for MmuRegs {
    fn default() -> Self {
        MmuRegs {
            ccr: 0,
            capr: 0,
            prsr: 0,
            pacr: [0; 8],
            mir: 0,
            mel0: 0,
            mel1: 0,
            meh: 0,
            mcr: 0,
            mpr: 0,
            mwr: 0,
            mpgd: 0,
            // 复位时两个窗口都指向物理 0 且可写,内核凭此在开启分页前落地。
            msa0: MSA_EN | MSA_WR,
            msa1: MSA_EN | MSA_WR,
            mpr_shift: 12,
        }
    }
}

impl MmuRegs {
    pub fn asid(&self) -> u8 {
        (self.meh & 0xff) as u8
    }

    /// MPR 写入口:原值照存,非法掩码发警告并退回 4K 解释。
    pub fn set_mpr(&mut self, v: u32) {
        self.mpr = v;
        match page_shift_of(v) {
            Some(s) => self.mpr_shift = s,
            None => {
                log::warn!("MMU: malformed page mask {v:#010x}, treating as 4K");
                self.mpr_shift = 12;
            }
        }
    }

    /// PACR 经 PRSR 选择区域,写非法的尺寸编码立即警告(区域按未使能处理)。
    pub fn set_pacr(&mut self, v: u32) {
        let i = (self.prsr & 0x7) as usize;
        if v & MSA_EN != 0 && (v >> 1) & 0x1f < 11 {
            log::warn!("MGU: region {i} size code below 4K, region disabled");
        }
        self.pacr[i] = v;
    }

    pub fn cp0_read(&self, idx: u32) -> u32 {
        match idx {
            CP0_CCR => self.ccr,
            CP0_CAPR => self.capr,
            CP0_PACR => self.pacr[(self.prsr & 0x7) as usize],
            CP0_PRSR => self.prsr,
            _ => {
                log::debug!("MMU: read of unknown cp0 register {idx}");
                0
            }
        }
    }

    pub fn cp15_read(&self, sel: u32) -> u32 {
        match sel {
            CP15_MIR => self.mir,
            CP15_MEL0 => self.mel0,
            CP15_MEL1 => self.mel1,
            CP15_MEH => self.meh,
            CP15_MCR => self.mcr,
            CP15_MPR => self.mpr,
            CP15_MWR => self.mwr,
            // MCIR 只写
            CP15_MCIR => 0,
            CP15_MPGD => self.mpgd,
            CP15_MSA0 => self.msa0,
            CP15_MSA1 => self.msa1,
            _ => {
                log::debug!("MMU: read of unknown cp15 register {sel}");
                0
            }
        }
    }
}
