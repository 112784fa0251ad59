//! CSKY 架构状态。
//!
//! [`CpuState`] 持有通用寄存器、PC、PSR 及其缓存字段、影子/备用
//! 寄存器组、浮点/向量寄存器文件和控制寄存器。所有跨字段一致性
//! （PSR 缓存位、栈指针分组、备用寄存器组）都经由访问函数维护，
//! 外部不直接拼/拆位。

use crate::debug::DebugCtl;
use crate::exception::{DispatchPhase, PendingExc};
use crate::features::{CpuModel, Features};
use crate::psr::*;
use crate::stats::CoreStats;
use crate::{GuestAddr, World};
use serde::{Deserialize, Serialize};

/// 条件执行（sce）窗口状态：剩余谓词掩码与剩余指令数。
///
/// 掩码按 LSB 在前消耗：第 i 条后续指令对应第 i 位。位为 1 表示
/// 该指令在 C==1 时执行，为 0 表示在 C==0 时执行；不执行时 PC 照常前进。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceState {
    pub mask: u8,
    pub left: u8,
}

/// 每个世界独立的控制寄存器组（TEE 选择器模型：按世界索引，不做拷贝）。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct WorldCtl {
    vbr: u32,
    epsr: u32,
    epc: u32,
}

/// CSKY 处理器架构状态。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuState {
    /// 通用寄存器（活动组）
    pub regs: [u32; 32],
    /// 程序计数器
    pub pc: GuestAddr,

    // PSR 拆分存放：高频位缓存为独立字段，其余打包在 psr_rest。
    psr_rest: u32,
    /// C 标志（0 或 1）
    pub flag_c: u32,
    /// DSP 粘滞溢出标志（0 或 1），不属于 PSR
    pub flag_v: u32,
    psr_s: bool,
    psr_t: bool,
    psr_tm: u8,

    /// DSP 累加器对与影子副本。写入活动对时旧值滚入影子。
    pub hi: u32,
    pub lo: u32,
    pub hi_shadow: u32,
    pub lo_shadow: u32,

    /// ABIV1 备用寄存器组（与 regs[0..16] 互换）
    regs_alt: [u32; 16],
    /// 世界相关控制寄存器（VBR/EPSR/EPC），按 PSR.T 选择
    world_regs: [WorldCtl; 2],
    /// 栈指针槽位 [world][priv]，r14 始终持有活动槽
    sp_bank: [[u32; 2]; 2],

    /// 快速中断影子对（单份，不分世界）
    pub fpsr: u32,
    pub fpc: u32,

    /// 暂存寄存器 SS0-SS4
    pub ss: [u32; 5],
    pub gcr: u32,
    pub gsr: u32,
    pub dcsr: u32,
    cpuidr: u32,

    /// 浮点/向量寄存器文件：32 个单精度槽，叠放出双精度与 128 位视图
    vregs: [u32; 32],
    /// 浮点控制（舍入模式、陷阱使能）
    pub fcr: u32,
    /// 浮点异常粘滞标志
    pub fesr: u32,
    /// 浮点实现标识
    pub fid: u32,

    /// 挂起异常
    pub pending: Option<PendingExc>,
    /// 分发状态机阶段
    pub phase: DispatchPhase,
    /// 分发期间故障递归深度
    pub exc_depth: u8,

    /// 中断延迟窗口剩余指令数（idly4）
    pub idly_left: u8,
    /// 条件执行窗口
    pub sce: Option<SceState>,

    pub features: Features,
    pub model: CpuModel,
    /// 向量中断路由到信任世界（随配置设定）
    pub tee_secure_irq: bool,

    #[serde(skip)]
    pub stats: CoreStats,
    #[serde(skip)]
    pub debug: DebugCtl,
}

impl CpuState {
    /// 按机型创建复位状态。
    pub fn new(model: CpuModel) -> Self {
        let mut cpu = CpuState {
            regs: [0; 32],
            pc: 0,
            psr_rest: 0,
            flag_c: 0,
            flag_v: 0,
            psr_s: true,
            psr_t: false,
            psr_tm: 0,
            hi: 0,
            lo: 0,
            hi_shadow: 0,
            lo_shadow: 0,
            regs_alt: [0; 16],
            world_regs: [WorldCtl::default(); 2],
            sp_bank: [[0; 2]; 2],
            fpsr: 0,
            fpc: 0,
            ss: [0; 5],
            gcr: 0,
            gsr: 0,
            dcsr: 0,
            cpuidr: cpuid_for(model),
            vregs: [0; 32],
            fcr: 0,
            fesr: 0,
            fid: 0,
            pending: None,
            phase: DispatchPhase::Idle,
            exc_depth: 0,
            idly_left: 0,
            sce: None,
            features: model.features(),
            model,
            tee_secure_irq: false,
            stats: CoreStats::default(),
            debug: DebugCtl::default(),
        };
        cpu.reset(0);
        cpu
    }

    /// 复位：PC 置为入口，PSR 仅置 S，各影子组清零。
    pub fn reset(&mut self, entry: GuestAddr) {
        self.regs = [0; 32];
        self.regs_alt = [0; 16];
        self.pc = entry;
        self.psr_rest = 0;
        self.flag_c = 0;
        self.flag_v = 0;
        self.psr_s = true;
        self.psr_t = false;
        self.psr_tm = 0;
        self.hi = 0;
        self.lo = 0;
        self.hi_shadow = 0;
        self.lo_shadow = 0;
        self.world_regs = [WorldCtl::default(); 2];
        self.sp_bank = [[0; 2]; 2];
        self.fpsr = 0;
        self.fpc = 0;
        self.ss = [0; 5];
        self.fesr = 0;
        self.pending = None;
        self.phase = DispatchPhase::Idle;
        self.exc_depth = 0;
        self.idly_left = 0;
        self.sce = None;
    }

    // ------------------------------------------------------------------
    // PSR
    // ------------------------------------------------------------------

    /// 组合出完整 PSR 值。
    pub fn psr_read(&self) -> u32 {
        self.psr_rest
            | self.flag_c
            | if self.psr_s { PSR_S } else { 0 }
            | if self.psr_t { PSR_T } else { 0 }
            | ((self.psr_tm as u32) << PSR_TM_SHIFT)
    }

    /// 写入 PSR 并执行全部联动：缓存字段更新、栈指针换组、
    /// 备用寄存器组切换。未实现特性对应的位被屏蔽。
    pub fn psr_write(&mut self, v: u32) {
        let v = self.mask_psr(v);
        let old_s = self.psr_s;
        let old_t = self.psr_t;
        let old_af = self.psr_rest & PSR_AF != 0;

        self.flag_c = v & PSR_C;
        self.psr_s = v & PSR_S != 0;
        self.psr_t = v & PSR_T != 0;
        self.psr_tm = ((v & PSR_TM_MASK) >> PSR_TM_SHIFT) as u8;
        self.psr_rest = v & !(PSR_C | PSR_S | PSR_T | PSR_TM_MASK);

        let new_af = self.psr_rest & PSR_AF != 0;
        if new_af != old_af {
            self.swap_frames();
        }
        if (old_s != self.psr_s || old_t != self.psr_t)
            && self.features.has(Features::SEPARATE_SP)
        {
            self.rebank_sp(old_s, old_t);
        }
    }

    fn mask_psr(&self, v: u32) -> u32 {
        let mut m = PSR_WRITABLE;
        if !self.features.has(Features::TEE) {
            m &= !PSR_T;
        }
        if !self.features.has(Features::ABIV1_AF) {
            m &= !PSR_AF;
        }
        v & m
    }

    pub fn supervisor(&self) -> bool {
        self.psr_s
    }

    pub fn world(&self) -> World {
        if self.psr_t {
            World::Trust
        } else {
            World::NonTrust
        }
    }

    /// 跟踪模式字段（0 关闭，1 指令跟踪，2 跳转跟踪）。
    pub fn trace_mode(&self) -> u8 {
        self.psr_tm
    }

    pub fn c(&self) -> bool {
        self.flag_c != 0
    }

    pub fn set_c(&mut self, v: bool) {
        self.flag_c = v as u32;
    }

    /// 置位 PSR 中给定位（psrset 语义）。
    pub fn psr_set_bits(&mut self, bits: u32) {
        self.psr_write(self.psr_read() | bits);
    }

    /// 清除 PSR 中给定位（psrclr 语义）。
    pub fn psr_clear_bits(&mut self, bits: u32) {
        self.psr_write(self.psr_read() & !bits);
    }

    // ------------------------------------------------------------------
    // 世界相关控制寄存器与影子组
    // ------------------------------------------------------------------

    pub fn vbr(&self) -> u32 {
        self.world_regs[self.psr_t as usize].vbr
    }

    pub fn set_vbr(&mut self, v: u32) {
        // 向量基址 1KB 对齐
        self.world_regs[self.psr_t as usize].vbr = v & !0x3ff;
    }

    pub fn epsr(&self) -> u32 {
        self.world_regs[self.psr_t as usize].epsr
    }

    pub fn set_epsr(&mut self, v: u32) {
        self.world_regs[self.psr_t as usize].epsr = v;
    }

    pub fn epc(&self) -> u32 {
        self.world_regs[self.psr_t as usize].epc
    }

    pub fn set_epc(&mut self, v: u32) {
        self.world_regs[self.psr_t as usize].epc = v;
    }

    /// 切入信任世界（异常分发用）。通过 PSR 写入走完整联动。
    pub(crate) fn enter_trust_world(&mut self) {
        self.psr_write(self.psr_read() | PSR_T);
    }

    fn swap_frames(&mut self) {
        for i in 0..16 {
            std::mem::swap(&mut self.regs[i], &mut self.regs_alt[i]);
        }
    }

    fn rebank_sp(&mut self, old_s: bool, old_t: bool) {
        self.sp_bank[old_t as usize][old_s as usize] = self.regs[14];
        self.regs[14] = self.sp_bank[self.psr_t as usize][self.psr_s as usize];
    }

    /// 套用向量表表项：ABIV1 下低位决定备用寄存器组，返回去除
    /// 低位后的入口地址。
    pub fn apply_vector_entry(&mut self, entry: u32) -> u32 {
        if self.features.has(Features::ABIV1_AF) {
            let want_alt = entry & 1 != 0;
            let cur_alt = self.psr_rest & PSR_AF != 0;
            if want_alt != cur_alt {
                self.swap_frames();
                self.psr_rest ^= PSR_AF;
            }
        }
        entry & !1
    }

    // ------------------------------------------------------------------
    // HI/LO 累加器
    // ------------------------------------------------------------------

    /// 写 HI:LO 对；旧值滚入影子副本（mfhis/mflos 可读取）。
    pub fn set_hilo(&mut self, v: u64) {
        self.hi_shadow = self.hi;
        self.lo_shadow = self.lo;
        self.hi = (v >> 32) as u32;
        self.lo = v as u32;
    }

    pub fn hilo(&self) -> u64 {
        ((self.hi as u64) << 32) | self.lo as u64
    }

    pub fn set_hi(&mut self, v: u32) {
        self.hi_shadow = self.hi;
        self.hi = v;
    }

    pub fn set_lo(&mut self, v: u32) {
        self.lo_shadow = self.lo;
        self.lo = v;
    }

    // ------------------------------------------------------------------
    // 寄存器对与浮点/向量视图
    // ------------------------------------------------------------------

    /// 读 64 位寄存器对：低 32 位在 r，高 32 位在 (r+1) mod 32。
    pub fn reg_pair(&self, r: u8) -> u64 {
        let lo = self.regs[r as usize & 31] as u64;
        let hi = self.regs[(r as usize + 1) & 31] as u64;
        lo | (hi << 32)
    }

    pub fn set_reg_pair(&mut self, r: u8, v: u64) {
        self.regs[r as usize & 31] = v as u32;
        self.regs[(r as usize + 1) & 31] = (v >> 32) as u32;
    }

    /// 单精度槽读取（索引按 32 取模）。
    pub fn vreg_s(&self, i: usize) -> u32 {
        self.vregs[i & 31]
    }

    pub fn set_vreg_s(&mut self, i: usize, v: u32) {
        self.vregs[i & 31] = v;
    }

    /// 双精度视图：第 i 对（低字在偶数槽）。
    pub fn vreg_d(&self, i: usize) -> u64 {
        let base = (i & 15) * 2;
        (self.vregs[base] as u64) | ((self.vregs[base + 1] as u64) << 32)
    }

    pub fn set_vreg_d(&mut self, i: usize, v: u64) {
        let base = (i & 15) * 2;
        self.vregs[base] = v as u32;
        self.vregs[base + 1] = (v >> 32) as u32;
    }

    /// 128 位视图：第 i 个四元组，字从低到高排列。
    pub fn vreg_q(&self, i: usize) -> [u32; 4] {
        let base = (i & 7) * 4;
        [
            self.vregs[base],
            self.vregs[base + 1],
            self.vregs[base + 2],
            self.vregs[base + 3],
        ]
    }

    pub fn set_vreg_q(&mut self, i: usize, v: [u32; 4]) {
        let base = (i & 7) * 4;
        self.vregs[base..base + 4].copy_from_slice(&v);
    }

    // ------------------------------------------------------------------
    // 控制寄存器（选择子 0，非 MMU/MGU 部分）
    // ------------------------------------------------------------------

    /// 读 cr<idx, 0>。未实现的索引读出 0 并记录日志。
    pub fn cr_read(&self, idx: u32) -> u32 {
        match idx {
            0 => self.psr_read(),
            1 => self.vbr(),
            2 => self.epsr(),
            3 => self.fpsr,
            4 => self.epc(),
            5 => self.fpc,
            6..=10 => self.ss[(idx - 6) as usize],
            11 => self.gcr,
            12 => self.gsr,
            13 => self.cpuidr,
            14 => self.dcsr,
            _ => {
                log::debug!("CPU: read of unimplemented cr<{idx}, 0>");
                0
            }
        }
    }

    /// 写 cr<idx, 0>。CPUIDR 只读；未实现的索引忽略并记录日志。
    pub fn cr_write(&mut self, idx: u32, v: u32) {
        match idx {
            0 => self.psr_write(v),
            1 => self.set_vbr(v),
            2 => self.set_epsr(v),
            3 => self.fpsr = v,
            4 => self.set_epc(v & !1),
            5 => self.fpc = v & !1,
            6..=10 => self.ss[(idx - 6) as usize] = v,
            11 => self.gcr = v,
            12 => self.gsr = v,
            13 => {}
            14 => self.dcsr = v,
            _ => {
                log::debug!("CPU: write of unimplemented cr<{idx}, 0> = {v:#010x}");
            }
        }
    }
}

fn cpuid_for(model: CpuModel) -> u32 {
    match model {
        CpuModel::Ck610 => 0x0461_0001,
        CpuModel::Ck803 => 0x0480_3003,
        CpuModel::Ck807 => 0x0480_7002,
        CpuModel::Ck810 => 0x0481_0002,
        CpuModel::Ck860 => 0x0486_0001,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_psr_roundtrip() {
        let mut cpu = CpuState::new(CpuModel::Ck810);
        let v = PSR_S | PSR_EE | PSR_IE | PSR_C | (0x12 << PSR_VEC_SHIFT) | (1 << PSR_TM_SHIFT);
        cpu.psr_write(v);
        assert_eq!(cpu.psr_read(), v);
        assert!(cpu.supervisor());
        assert!(cpu.c());
        assert_eq!(cpu.trace_mode(), 1);
    }

    #[test]
    fn test_psr_reserved_bits_ignored() {
        let mut cpu = CpuState::new(CpuModel::Ck810);
        cpu.psr_write(0xffff_ffff);
        // 保留位不落地；CK810 无 TEE/AF，对应位也被屏蔽
        let v = cpu.psr_read();
        assert_eq!(v & PSR_T, 0);
        assert_eq!(v & PSR_AF, 0);
        assert_eq!(v & (1 << 2), 0);
    }

    #[test]
    fn test_sp_rebank_on_mode_change() {
        let mut cpu = CpuState::new(CpuModel::Ck810);
        cpu.regs[14] = 0x9000_0000; // 超级用户栈
        cpu.psr_write(cpu.psr_read() & !PSR_S); // 降到用户态
        assert_eq!(cpu.regs[14], 0);
        cpu.regs[14] = 0x7000_0000; // 用户栈
        cpu.psr_write(cpu.psr_read() | PSR_S);
        assert_eq!(cpu.regs[14], 0x9000_0000);
        cpu.psr_write(cpu.psr_read() & !PSR_S);
        assert_eq!(cpu.regs[14], 0x7000_0000);
    }

    #[test]
    fn test_frame_swap_via_vector_entry() {
        let mut cpu = CpuState::new(CpuModel::Ck610);
        cpu.regs[3] = 0xaaaa;
        let entry = cpu.apply_vector_entry(0x2000_0001);
        assert_eq!(entry, 0x2000_0000);
        assert_eq!(cpu.psr_read() & PSR_AF, PSR_AF);
        assert_eq!(cpu.regs[3], 0, "alternate frame starts zeroed");
        // 回到主组
        let entry = cpu.apply_vector_entry(0x2000_0000);
        assert_eq!(entry, 0x2000_0000);
        assert_eq!(cpu.regs[3], 0xaaaa);
    }

    #[test]
    fn test_world_banked_vbr() {
        let mut cpu = CpuState::new(CpuModel::Ck803);
        cpu.set_vbr(0x4000_0000);
        cpu.psr_write(cpu.psr_read() | PSR_T);
        assert_eq!(cpu.vbr(), 0, "trust world has its own vbr");
        cpu.set_vbr(0x5000_0000);
        cpu.psr_write(cpu.psr_read() & !PSR_T);
        assert_eq!(cpu.vbr(), 0x4000_0000);
    }

    #[test]
    fn test_vbr_alignment() {
        let mut cpu = CpuState::new(CpuModel::Ck810);
        cpu.set_vbr(0x2000_03ff);
        assert_eq!(cpu.vbr(), 0x2000_0000);
    }

    #[test]
    fn test_reg_pair_wraps() {
        let mut cpu = CpuState::new(CpuModel::Ck810);
        cpu.set_reg_pair(31, 0x1122_3344_5566_7788);
        assert_eq!(cpu.regs[31], 0x5566_7788);
        assert_eq!(cpu.regs[0], 0x1122_3344);
        assert_eq!(cpu.reg_pair(31), 0x1122_3344_5566_7788);
    }

    #[test]
    fn test_vreg_views_overlay() {
        let mut cpu = CpuState::new(CpuModel::Ck810);
        cpu.set_vreg_d(1, 0xdead_beef_cafe_f00d);
        assert_eq!(cpu.vreg_s(2), 0xcafe_f00d);
        assert_eq!(cpu.vreg_s(3), 0xdead_beef);
        let q = cpu.vreg_q(0);
        assert_eq!(q[2], 0xcafe_f00d);
        assert_eq!(q[3], 0xdead_beef);
    }

    #[test]
    fn test_hilo_shadow_rolls() {
        let mut cpu = CpuState::new(CpuModel::Ck810);
        cpu.set_hilo(0x1111_2222_3333_4444);
        cpu.set_hilo(0x5555_6666_7777_8888);
        assert_eq!(cpu.hi, 0x5555_6666);
        assert_eq!(cpu.lo, 0x7777_8888);
        assert_eq!(cpu.hi_shadow, 0x1111_2222);
        assert_eq!(cpu.lo_shadow, 0x3333_4444);
    }

    #[test]
    fn test_cr_unimplemented_reads_zero() {
        let cpu = CpuState::new(CpuModel::Ck810);
        assert_eq!(cpu.cr_read(27), 0);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut cpu = CpuState::new(CpuModel::Ck860);
        cpu.regs[7] = 0x1234;
        cpu.set_vbr(0x8000_0000);
        cpu.pc = 0x100;
        let json = serde_json::to_string(&cpu).unwrap();
        let back: CpuState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.regs[7], 0x1234);
        assert_eq!(back.vbr(), 0x8000_0000);
        assert_eq!(back.pc, 0x100);
    }
}
