//! CSKY 存储管理:TLB、段窗口与区域保护。
//!
//! [`Mmu`] 把一条物理总线包装成按虚拟地址访问的 [`GuestMem`]。翻译
//! 模式是控制寄存器状态的纯函数,只在 CCR 写入时重算,三种模式互斥:
//!
//! - 恒等(无 MMU):虚拟地址原样下发;
//! - MGU:八个 2 的幂区域做粗粒度读写保护,地址不变;
//! - 分页:0x8000_0000 起的两个 512M 段窗口供超级用户直通,其余地址
//!   走双世界软件 TLB,未命中触发两级页表硬件重填。
//!
//! 改变地址含义的操作都会在 [`Mmu`] 里累积一个 [`FlushReq`],由执行层
//! 取走并作废相应的已翻译块。

pub mod mgu;
pub mod regs;
pub mod tlb;
pub mod walker;

use csky_core::{Features, GuestAddr, GuestMem, MemCtx, MemFault, PhysBus, World, excp};

use crate::regs::{
    CP0_CAPR, CP0_CCR, CP0_PACR, CP0_PRSR, CP15_MCIR, CP15_MCR, CP15_MEH, CP15_MEL0, CP15_MEL1,
    CP15_MIR, CP15_MPGD, CP15_MPR, CP15_MSA0, CP15_MSA1, CP15_MWR, MCIR_INV_ALL, MCIR_INV_ASID,
    MCIR_TLBP, MCIR_TLBR, MCIR_TLBWI, MCIR_TLBWR, MIR_P, MSA_EN, MSA_WR,
};
pub use crate::regs::MmuRegs;
pub use crate::tlb::{PageHalf, TLB_ENTRIES, Tlb, TlbEntry, TlbRet, TlbStats};

/// 当前生效的翻译模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransMode {
    #[default]
    NoMmu,
    Mgu,
    PagedMmu,
}

impl TransMode {
    /// 从 CCR[1:0] 解出模式,硬件不具备的模式退回恒等映射。
    pub fn from_ccr(ccr: u32, feats: Features) -> TransMode {
        match ccr & 0x3 {
            0 => TransMode::NoMmu,
            1 if feats.has(Features::MGU) => TransMode::Mgu,
            2 if feats.has(Features::MMU_PAGED) => TransMode::PagedMmu,
            m => {
                log::warn!("MMU: CCR mode {m} unavailable on this model, staying unmapped");
                TransMode::NoMmu
            }
        }
    }
}

/// 向执行层传递的翻译失效范围。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlushReq {
    #[default]
    None,
    /// 只有这个地址空间的翻译失效
    Asid(u8),
    All,
}

impl FlushReq {
    pub fn merge(&mut self, other: FlushReq) {
        *self = match (*self, other) {
            (FlushReq::All, _) | (_, FlushReq::All) => FlushReq::All,
            (FlushReq::None, o) => o,
            (s, FlushReq::None) => s,
            (FlushReq::Asid(a), FlushReq::Asid(b)) if a == b => FlushReq::Asid(a),
            _ => FlushReq::All,
        };
    }
}

/// MMU 外观:物理总线 + 寄存器组 + 双世界 TLB。
pub struct Mmu<B> {
    pub bus: B,
    pub regs: MmuRegs,
    tlb: [Tlb; 2],
    mode: TransMode,
    feats: Features,
    pending: FlushReq,
}

impl<B: PhysBus> Mmu<B> {
    pub fn new(bus: B, feats: Features) -> Self {
        Mmu {
            bus,
            regs: MmuRegs::default(),
            tlb: [Tlb::new(), Tlb::new()],
            mode: TransMode::NoMmu,
            feats,
            pending: FlushReq::None,
        }
    }

    pub fn reset(&mut self) {
        self.regs = MmuRegs::default();
        self.tlb = [Tlb::new(), Tlb::new()];
        self.mode = TransMode::NoMmu;
        self.pending = FlushReq::None;
    }

    pub fn mode(&self) -> TransMode {
        self.mode
    }

    pub fn tlb(&self, world: World) -> &Tlb {
        &self.tlb[world as usize]
    }

    pub fn tlb_mut(&mut self, world: World) -> &mut Tlb {
        &mut self.tlb[world as usize]
    }

    /// 取走累积的失效请求并清零。
    pub fn take_flush(&mut self) -> FlushReq {
        std::mem::take(&mut self.pending)
    }

    pub fn cp0_read(&self, idx: u32) -> u32 {
        self.regs.cp0_read(idx)
    }

    pub fn cp0_write(&mut self, idx: u32, v: u32) {
        match idx {
            CP0_CCR => {
                self.regs.ccr = v;
                let mode = TransMode::from_ccr(v, self.feats);
                if mode != self.mode {
                    self.mode = mode;
                    self.pending.merge(FlushReq::All);
                }
            }
            CP0_CAPR => {
                self.regs.capr = v;
                self.pending.merge(FlushReq::All);
            }
            CP0_PACR => {
                self.regs.set_pacr(v);
                self.pending.merge(FlushReq::All);
            }
            CP0_PRSR => self.regs.prsr = v & 0x7,
            _ => log::debug!("MMU: write to unknown cp0 register {idx}"),
        }
    }

    pub fn cp15_read(&self, sel: u32) -> u32 {
        self.regs.cp15_read(sel)
    }

    /// cp15 写。MCIR 是命令寄存器,在当前世界的 TLB 上执行;
    /// 其余是普通存取,改动映射含义的顺带累积失效请求。
    pub fn cp15_write(&mut self, sel: u32, v: u32, world: World) {
        match sel {
            CP15_MIR => self.regs.mir = v & (MIR_P | 0x7f),
            CP15_MEL0 => self.regs.mel0 = v,
            CP15_MEL1 => self.regs.mel1 = v,
            CP15_MEH => self.regs.meh = v & 0xffff_e0ff,
            CP15_MCR => self.regs.mcr = v,
            CP15_MPR => {
                let changed = self.regs.mpr != v;
                self.regs.set_mpr(v);
                if changed {
                    self.pending.merge(FlushReq::All);
                }
            }
            CP15_MWR => self.regs.mwr = v,
            CP15_MCIR => self.run_mcir(v, world),
            CP15_MPGD => {
                if self.regs.mpgd != v {
                    self.pending.merge(FlushReq::All);
                }
                self.regs.mpgd = v;
            }
            CP15_MSA0 => {
                if self.regs.msa0 != v {
                    self.pending.merge(FlushReq::All);
                }
                self.regs.msa0 = v;
            }
            CP15_MSA1 => {
                if self.regs.msa1 != v {
                    self.pending.merge(FlushReq::All);
                }
                self.regs.msa1 = v;
            }
            _ => log::debug!("MMU: write to unknown cp15 register {sel}"),
        }
    }

    /// 组装寄存器组当前描述的表项,非法 MPR 退化为 4K。
    fn entry_from_regs(&self) -> TlbEntry {
        let mask = if self.regs.mpr_shift > 12 {
            self.regs.mpr
        } else {
            0
        };
        TlbEntry::from_regs(self.regs.meh, self.regs.mel0, self.regs.mel1, mask)
    }

    fn run_mcir(&mut self, cmd: u32, world: World) {
        let w = world as usize;
        let shift = self.regs.mpr_shift;
        if cmd & MCIR_TLBP != 0 {
            self.regs.mir = match self.tlb[w].probe(self.regs.meh, shift) {
                Some(slot) => slot as u32,
                None => MIR_P,
            };
        }
        if cmd & MCIR_TLBR != 0 {
            let e = self.tlb[w].entry(self.regs.mir as usize);
            let (meh, mel0, mel1, mpr) = e.to_regs();
            self.regs.meh = meh;
            self.regs.mel0 = mel0;
            self.regs.mel1 = mel1;
            self.regs.set_mpr(mpr);
        }
        if cmd & MCIR_TLBWI != 0 {
            let e = self.entry_from_regs();
            self.tlb[w].write_indexed(self.regs.mir as usize, e);
            self.pending.merge(FlushReq::All);
        }
        if cmd & MCIR_TLBWR != 0 {
            let e = self.entry_from_regs();
            self.tlb[w].write_random(e, shift);
            self.pending.merge(FlushReq::All);
        }
        if cmd & MCIR_INV_ALL != 0 {
            // 两个世界一起清,与世界切换解耦。
            self.tlb[0].invalidate_all();
            self.tlb[1].invalidate_all();
            self.pending.merge(FlushReq::All);
        }
        if cmd & MCIR_INV_ASID != 0 {
            let asid = self.regs.asid();
            self.tlb[w].invalidate_asid(asid);
            self.pending.merge(FlushReq::Asid(asid));
        }
    }

    /// 出错时把故障地址的 VPN 锁存进 MEH,ASID 保持当前值。
    fn fault(&mut self, vec: u32, va: u32) -> MemFault {
        self.regs.meh = (va & 0xffff_e000) | (self.regs.meh & 0xff);
        MemFault { vec, vaddr: va }
    }

    fn msa_window(&mut self, va: u32, is_write: bool, ctx: MemCtx) -> Result<u32, MemFault> {
        if !ctx.sup {
            return Err(self.fault(excp::ACCESS, va));
        }
        let msa = if va < 0xa000_0000 {
            self.regs.msa0
        } else {
            self.regs.msa1
        };
        if msa & MSA_EN == 0 || (is_write && msa & MSA_WR == 0) {
            return Err(self.fault(excp::ACCESS, va));
        }
        Ok((msa & 0xe000_0000) | (va & 0x1fff_ffff))
    }

    /// TLB 查找,未命中时做一次硬件重填再查。重填本身失败(走表读
    /// 物理总线出错)不升级,维持未命中语义。
    fn tlb_translate(&mut self, va: u32, is_write: bool, world: World) -> TlbRet {
        let w = world as usize;
        let asid = self.regs.asid();
        let shift = self.regs.mpr_shift;
        let first = self.tlb[w].lookup(va, asid, is_write, shift);
        if !matches!(first, TlbRet::NoMatch) {
            return first;
        }

        let Some(fetched) = walker::walk(&mut self.bus, self.regs.mpgd, va) else {
            return TlbRet::NoMatch;
        };
        // 重填顺带刷新管理寄存器组,与硬件行为一致。
        self.regs.meh = (va & 0xffff_e000) | asid as u32;
        self.regs.mel0 = fetched.mel0;
        self.regs.mel1 = fetched.mel1;
        let entry = TlbEntry::from_regs(self.regs.meh, fetched.mel0, fetched.mel1, 0);
        let evicted = self.tlb[w].write_random(entry, shift);
        if evicted.live() {
            let req = if evicted.g {
                FlushReq::All
            } else {
                FlushReq::Asid(evicted.asid)
            };
            self.pending.merge(req);
        }
        self.tlb[w].stats.refills += 1;
        self.tlb[w].lookup(va, asid, is_write, shift)
    }

    fn translate(&mut self, va: u32, is_write: bool, ctx: MemCtx) -> Result<u32, MemFault> {
        match self.mode {
            TransMode::NoMmu => Ok(va),
            TransMode::Mgu => {
                let perms = mgu::check(self.regs.capr, &self.regs.pacr, va, ctx.sup);
                if perms.is_some_and(|p| if is_write { p.w } else { p.r }) {
                    Ok(va)
                } else {
                    Err(self.fault(excp::ACCESS, va))
                }
            }
            TransMode::PagedMmu => {
                if (0x8000_0000..0xc000_0000).contains(&va) {
                    return self.msa_window(va, is_write, ctx);
                }
                match self.tlb_translate(va, is_write, ctx.world) {
                    TlbRet::Ok { paddr } => Ok(paddr),
                    TlbRet::BadAddr => Err(self.fault(excp::ACCESS, va)),
                    TlbRet::Invalid => {
                        let vec = if is_write {
                            excp::TLB_WRITE_INVALID
                        } else {
                            excp::TLB_READ_INVALID
                        };
                        Err(self.fault(vec, va))
                    }
                    TlbRet::Modified => Err(self.fault(excp::TLB_MODIFIED, va)),
                    TlbRet::NoMatch => Err(self.fault(excp::TLB_UNMATCH, va)),
                }
            }
        }
    }
}

impl<B: PhysBus> GuestMem for Mmu<B> {
    fn read(&mut self, va: GuestAddr, size: u8, ctx: MemCtx) -> Result<u64, MemFault> {
        let pa = self.translate(va, false, ctx)?;
        self.bus.read(pa, size).map_err(|_| MemFault {
            vec: excp::ACCESS,
            vaddr: va,
        })
    }

    fn write(&mut self, va: GuestAddr, val: u64, size: u8, ctx: MemCtx) -> Result<(), MemFault> {
        let pa = self.translate(va, true, ctx)?;
        self.bus.write(pa, val, size).map_err(|_| MemFault {
            vec: excp::ACCESS,
            vaddr: va,
        })
    }

    fn fetch(&mut self, va: GuestAddr, size: u8, ctx: MemCtx) -> Result<u32, MemFault> {
        let pa = self.translate(va, false, ctx)?;
        self.bus
            .read(pa, size)
            .map(|v| v as u32)
            .map_err(|_| MemFault {
                vec: excp::ACCESS,
                vaddr: va,
            })
    }
}
