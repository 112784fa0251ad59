//! # csky-ir - 语义动作中间表示
//!
//! 解码器把客户机指令翻译成 [`IROp`] 序列加一个块结束符
//! [`Terminator`]，组成 [`TransBlock`]；执行引擎按序消费。
//! 操作数一律是架构寄存器编号（[`RegId`]），不引入虚拟寄存器，
//! 代码生成后端不在本库范围内。
//!
//! 变体携带完整语义参数（宽度、符号、饱和与否），同一编码族的
//! 不同形式共享一个变体。未在此列出的行为（TLB 维护、缓存指令）
//! 通过 [`IROp::Mtcr`] 的副作用表达。

use serde::{Deserialize, Serialize};

pub mod cache;

pub use cache::{BlockCache, BlockKey};

/// 架构寄存器编号（r0-r31）。
pub type RegId = u8;

/// 访存宽度与符号扩展方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemKind {
    /// 字节，零扩展
    B,
    /// 字节，符号扩展
    Bs,
    /// 半字，零扩展
    H,
    /// 半字，符号扩展
    Hs,
    /// 字
    W,
    /// 双字（寄存器对，低字在 rz）
    D,
}

impl MemKind {
    pub fn size(&self) -> u8 {
        match self {
            MemKind::B | MemKind::Bs => 1,
            MemKind::H | MemKind::Hs => 2,
            MemKind::W => 4,
            MemKind::D => 8,
        }
    }

    pub fn signed(&self) -> bool {
        matches!(self, MemKind::Bs | MemKind::Hs)
    }
}

/// 紧缩运算的分道方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lane {
    /// 4 × 8 位
    B4,
    /// 2 × 16 位
    H2,
}

/// 饱和方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sat {
    None,
    Signed,
    Unsigned,
}

/// 浮点标量运算宽度由 `dword` 区分；这里是二元算术操作符。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FpOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FpUnOp {
    Neg,
    Abs,
    Sqrt,
    Mov,
}

/// 浮点比较条件，结果写入 C 标志。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FpCmp {
    /// 无序或相等之外（fcmpne）
    Ne,
    /// 大于等于（fcmphs）
    Hs,
    /// 小于（fcmplt）
    Lt,
    /// 无序（fcmpuo）
    Uo,
}

/// 浮点与整数/精度转换种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FcvtKind {
    S2D,
    D2S,
    /// 单精度转有符号整型（向零舍入）
    S2Si,
    S2Ui,
    D2Si,
    D2Ui,
    Si2S,
    Ui2S,
    Si2D,
    Ui2D,
}

/// 128 位向量分道。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VLane {
    B16,
    H8,
    W4,
}

/// 语义动作。寄存器编号均为架构编号；溢出置 V 标志的变体在文档
/// 里注明。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IROp {
    // ---- 移动与条件移动 ----
    MovImm { rz: RegId, imm: u32 },
    Mov { rz: RegId, rx: RegId },
    /// rz = imm << 16
    Movih { rz: RegId, imm: u16 },
    /// rz = C
    MvC { rz: RegId },
    /// rz = !C
    MvCv { rz: RegId },
    MovT { rz: RegId, rx: RegId },
    MovF { rz: RegId, rx: RegId },
    Clrt { rz: RegId },
    Clrf { rz: RegId },
    IncT { rz: RegId, rx: RegId, imm: u8 },
    IncF { rz: RegId, rx: RegId, imm: u8 },
    DecT { rz: RegId, rx: RegId, imm: u8 },
    DecF { rz: RegId, rx: RegId, imm: u8 },
    /// rz = rx - imm；C = 结果 > 0（有符号）
    DecGt { rz: RegId, rx: RegId, imm: u8 },
    /// C = 结果 < 0
    DecLt { rz: RegId, rx: RegId, imm: u8 },
    /// C = 结果 != 0
    DecNe { rz: RegId, rx: RegId, imm: u8 },

    // ---- 算术逻辑 ----
    Add { rz: RegId, rx: RegId, ry: RegId },
    AddImm { rz: RegId, rx: RegId, imm: u32 },
    Sub { rz: RegId, rx: RegId, ry: RegId },
    SubImm { rz: RegId, rx: RegId, imm: u32 },
    /// rz = ry - rx
    Rsub { rz: RegId, rx: RegId, ry: RegId },
    /// rz = imm - rx
    RsubImm { rz: RegId, rx: RegId, imm: u32 },
    /// rz = rx + ry + C；C = 进位
    Addc { rz: RegId, rx: RegId, ry: RegId },
    /// rz = rx - ry - !C；C = 无借位
    Subc { rz: RegId, rx: RegId, ry: RegId },
    And { rz: RegId, rx: RegId, ry: RegId },
    AndImm { rz: RegId, rx: RegId, imm: u32 },
    /// rz = rx & !ry
    Andn { rz: RegId, rx: RegId, ry: RegId },
    AndnImm { rz: RegId, rx: RegId, imm: u32 },
    Or { rz: RegId, rx: RegId, ry: RegId },
    OrImm { rz: RegId, rx: RegId, imm: u32 },
    Xor { rz: RegId, rx: RegId, ry: RegId },
    XorImm { rz: RegId, rx: RegId, imm: u32 },
    Nor { rz: RegId, rx: RegId, ry: RegId },
    /// rz = rx + (ry << 1)
    Ixh { rz: RegId, rx: RegId, ry: RegId },
    /// rz = rx + (ry << 2)
    Ixw { rz: RegId, rx: RegId, ry: RegId },
    /// rz = rx + (ry << 3)
    Ixd { rz: RegId, rx: RegId, ry: RegId },
    Abs { rz: RegId, rx: RegId },

    // ---- 移位。寄存器形式按 [0,63] 取量，超出 31 按零值/符号填充 ----
    Lsl { rz: RegId, rx: RegId, ry: RegId },
    Lsr { rz: RegId, rx: RegId, ry: RegId },
    Asr { rz: RegId, rx: RegId, ry: RegId },
    /// 循环左移按低 5 位取量
    Rotl { rz: RegId, rx: RegId, ry: RegId },
    LslImm { rz: RegId, rx: RegId, imm: u8 },
    LsrImm { rz: RegId, rx: RegId, imm: u8 },
    AsrImm { rz: RegId, rx: RegId, imm: u8 },
    RotlImm { rz: RegId, rx: RegId, imm: u8 },
    /// 移出的最后一位进 C；移位量为真实值 1..=32
    LslC { rz: RegId, rx: RegId, imm: u8 },
    LsrC { rz: RegId, rx: RegId, imm: u8 },
    AsrC { rz: RegId, rx: RegId, imm: u8 },
    /// 33 位（含 C）循环右移，移位量 1..=32
    Xsr { rz: RegId, rx: RegId, imm: u8 },

    // ---- 比较与测试（写 C）----
    CmpHs { rx: RegId, ry: RegId },
    CmpLt { rx: RegId, ry: RegId },
    CmpNe { rx: RegId, ry: RegId },
    CmpHsImm { rx: RegId, imm: u32 },
    CmpLtImm { rx: RegId, imm: u32 },
    CmpNeImm { rx: RegId, imm: u32 },
    Tst { rx: RegId, ry: RegId },
    /// C = rx 的四个字节均非零
    Tstnbz { rx: RegId },

    // ---- 位操作 ----
    Bclri { rz: RegId, rx: RegId, imm: u8 },
    Bseti { rz: RegId, rx: RegId, imm: u8 },
    /// C = rx 的第 imm 位
    Btsti { rx: RegId, imm: u8 },
    /// rz = (1 << imm) - 1；imm == 0 时为全 1
    Bmaski { rz: RegId, imm: u8 },
    /// rz = 1 << rx[4:0]；rx[5] 置位时结果为 0
    Bgenr { rz: RegId, rx: RegId },
    /// 从最高位找第一个 0 位的位置
    Ff0 { rz: RegId, rx: RegId },
    /// 从最高位找第一个 1 位的位置
    Ff1 { rz: RegId, rx: RegId },
    /// 字内字节序反转
    Revb { rz: RegId, rx: RegId },
    /// 各半字内字节反转
    Revh { rz: RegId, rx: RegId },
    /// 位反转
    Brev { rz: RegId, rx: RegId },
    /// 取第 n 字节零扩展
    Xtrb { rz: RegId, rx: RegId, n: u8 },
    /// 位域符号扩展 rx[msb:lsb]
    Sext { rz: RegId, rx: RegId, lsb: u8, msb: u8 },
    Zext { rz: RegId, rx: RegId, lsb: u8, msb: u8 },
    /// 把 rx[msb-lsb:0] 插入 rz[msb:lsb]
    Ins { rz: RegId, rx: RegId, msb: u8, lsb: u8 },

    // ---- 乘除 ----
    Mult { rz: RegId, rx: RegId, ry: RegId },
    /// 除零在执行时转为异常
    DivU { rz: RegId, rx: RegId, ry: RegId },
    DivS { rz: RegId, rx: RegId, ry: RegId },

    // ---- DSP：饱和/紧缩/宽乘累加。溢出类均置 V ----
    AddSat32 { rz: RegId, rx: RegId, ry: RegId, signed: bool },
    SubSat32 { rz: RegId, rx: RegId, ry: RegId, signed: bool },
    /// 64 位饱和加：三个操作数都是寄存器对
    AddSat64 { rz: RegId, rx: RegId, ry: RegId, signed: bool },
    SubSat64 { rz: RegId, rx: RegId, ry: RegId, signed: bool },
    PkAdd { rz: RegId, rx: RegId, ry: RegId, lane: Lane, sat: Sat },
    PkSub { rz: RegId, rx: RegId, ry: RegId, lane: Lane, sat: Sat },
    PkAbs { rz: RegId, rx: RegId, lane: Lane },
    PkMin { rz: RegId, rx: RegId, ry: RegId, lane: Lane, signed: bool },
    PkMax { rz: RegId, rx: RegId, ry: RegId, lane: Lane, signed: bool },
    /// 相等分道写全 1 掩码
    PkCmpEq { rz: RegId, rx: RegId, ry: RegId, lane: Lane },
    /// 饱和到 bits 位宽，溢出置 V
    Clip { rz: RegId, rx: RegId, bits: u8, signed: bool },
    /// 舍入右移：移位前加半个 ULP
    RoundShr { rz: RegId, rx: RegId, imm: u8, signed: bool },
    /// 饱和左移，溢出置 V
    SatShl { rz: RegId, rx: RegId, imm: u8, signed: bool },
    /// rz 对 = rx * ry（64 位宽乘）
    MulWide { rz: RegId, rx: RegId, ry: RegId, signed: bool },
    /// rz 对 ±= rx * ry（环绕，不设标志）
    MulAcc { rz: RegId, rx: RegId, ry: RegId, signed: bool, sub: bool },
    /// rz 对 ±= rx * ry，33 位保护位判溢出置 V
    MulAccV { rz: RegId, rx: RegId, ry: RegId, sub: bool },
    /// HI:LO = rx * ry
    MultHiLo { rx: RegId, ry: RegId, signed: bool },
    /// HI:LO ±= rx * ry
    MacHiLo { rx: RegId, ry: RegId, signed: bool, sub: bool },
    MvFromHi { rz: RegId },
    MvFromLo { rz: RegId },
    MvFromHiS { rz: RegId },
    MvFromLoS { rz: RegId },
    MvToHi { rx: RegId },
    MvToLo { rx: RegId },
    /// C = V（DSP 溢出标志搬运）
    CFromV,

    // ---- 浮点 ----
    FArith { op: FpOp, vz: u8, vx: u8, vy: u8, dword: bool },
    FUnary { op: FpUnOp, vz: u8, vx: u8, dword: bool },
    /// 与零比较时 vy 取 255
    FCmpOp { cond: FpCmp, vx: u8, vy: u8, dword: bool },
    /// vz ±= vx * vy；negate 在累加前对乘积取负
    FMac { vz: u8, vx: u8, vy: u8, dword: bool, negate: bool, sub: bool },
    FCvt { kind: FcvtKind, vz: u8, vx: u8 },
    /// 通用寄存器 → 浮点槽（high 选高字）
    FMovToFpu { vz: u8, rx: RegId, high: bool },
    FMovToGpr { rz: RegId, vx: u8, high: bool },
    FLoad { vz: u8, rx: RegId, disp: u32, dword: bool },
    FStore { vz: u8, rx: RegId, disp: u32, dword: bool },
    FLoadIdx { vz: u8, rx: RegId, ry: RegId, shift: u8, dword: bool },
    FStoreIdx { vz: u8, rx: RegId, ry: RegId, shift: u8, dword: bool },

    // ---- 128 位向量 ----
    VLoad { vq: u8, rx: RegId, disp: u32 },
    VStore { vq: u8, rx: RegId, disp: u32 },
    VAdd { vq_z: u8, vq_x: u8, vq_y: u8, lane: VLane, sat: Sat },
    VSub { vq_z: u8, vq_x: u8, vq_y: u8, lane: VLane, sat: Sat },
    VAnd { vq_z: u8, vq_x: u8, vq_y: u8 },
    VOr { vq_z: u8, vq_x: u8, vq_y: u8 },
    VXor { vq_z: u8, vq_x: u8, vq_y: u8 },
    VShlImm { vq_z: u8, vq_x: u8, lane: VLane, imm: u8 },
    VShrImm { vq_z: u8, vq_x: u8, lane: VLane, imm: u8, signed: bool },
    VMov { vq_z: u8, vq_x: u8 },
    /// 通用寄存器广播到各分道
    VDupG { vq_z: u8, rx: RegId, lane: VLane },
    /// 取第 idx 个 32 位字到通用寄存器
    VMovToGpr { rz: RegId, vq_x: u8, idx: u8 },

    // ---- 访存 ----
    Load { rz: RegId, rx: RegId, disp: u32, kind: MemKind, guarded: bool },
    Store { rz: RegId, rx: RegId, disp: u32, kind: MemKind, guarded: bool },
    LoadIdx { rz: RegId, rx: RegId, ry: RegId, shift: u8, kind: MemKind },
    StoreIdx { rz: RegId, rx: RegId, ry: RegId, shift: u8, kind: MemKind },
    /// 常量池装载（lrw）：地址在解码时算出
    LoadAbs { rz: RegId, addr: u32 },
    /// 连续多寄存器装载，寄存器号按 32 回绕
    LoadMulti { rf: RegId, count: u8, rx: RegId },
    StoreMulti { rf: RegId, count: u8, rx: RegId },
    /// 压栈：r4 起 cnt1 个、可选 r15、r16 起 cnt2 个
    Push { cnt1: u8, r15: bool, cnt2: u8 },
    Pop { cnt1: u8, r15: bool, cnt2: u8 },

    // ---- 系统 ----
    Mfcr { rz: RegId, sel: u8, idx: u8 },
    Mtcr { rx: RegId, sel: u8, idx: u8 },
    PsrSet { bits: u32 },
    PsrClr { bits: u32 },
    /// 设定中断延迟窗口
    Idly { n: u8 },
    /// 打开条件执行窗口
    Sce { mask: u8 },
}

/// 条件跳转的判别方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrCond {
    /// C == 1
    CTrue,
    /// C == 0
    CFalse,
    EqZ,
    NeZ,
    /// 有符号 > 0
    GtZ,
    /// 有符号 <= 0
    LeZ,
    LtZ,
    GeZ,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitKind {
    Stop,
    Wait,
    Doze,
}

/// 块结束符。静态目标（Fallthrough/Branch/BranchLink 与条件跳转的
/// 两个出口）允许链式执行；其余都要求回到外层循环重新同步。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminator {
    Fallthrough { next: u32 },
    Branch { target: u32 },
    BranchCond { cond: BrCond, rx: RegId, target: u32, next: u32 },
    BranchLink { target: u32, ret: u32 },
    /// 寄存器间接跳转；link 为返回地址时写 r15
    IndirectJmp { rx: RegId, link: Option<u32> },
    /// 常量池间接跳转（jmpi/jsri）：先从 addr 读出目标
    IndirectLoad { addr: u32, link: Option<u32> },
    /// 查表跳转（jmpix）：目标 = 监督向量基址 + rx * scale
    IndirectTable { rx: RegId, scale: u8 },
    Rte { fast: bool },
    /// 解码期确定的异常（非法指令、特权违例、陷阱、断点）
    Exception { vec: u32 },
    Wait { kind: WaitKind, next: u32 },
    /// 已执行改变翻译环境的操作，必须完全重新同步
    Sync { next: u32 },
}

/// 指令标记：块内每条指令的 op 起始下标、PC 与字节长度。
/// 执行引擎据此把块中途的故障归属到正确的指令。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsnMark {
    pub op_start: u32,
    pub pc: u32,
    pub len: u8,
}

/// 一个翻译块。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransBlock {
    pub start_pc: u32,
    /// 指令条数
    pub icount: u32,
    /// 覆盖的字节数
    pub byte_len: u32,
    pub ops: Vec<IROp>,
    pub term: Terminator,
    pub insn_marks: Vec<InsnMark>,
    /// 条件执行谓词：Some(期望的 C 值) 时整块按谓词裁决
    pub pred: Option<bool>,
}

impl TransBlock {
    /// 按 op 下标找所属指令的 PC 与长度。
    pub fn insn_at(&self, op_idx: usize) -> Option<InsnMark> {
        let mut found = None;
        for m in &self.insn_marks {
            if m.op_start as usize <= op_idx {
                found = Some(*m);
            } else {
                break;
            }
        }
        found
    }

    /// 块结束后的顺序下一地址。
    pub fn end_pc(&self) -> u32 {
        self.start_pc.wrapping_add(self.byte_len)
    }
}

/// 翻译块构造器。
///
/// 解码每条指令前调用 [`BlockBuilder::begin_insn`]，其后 `push` 的
/// 操作都归属该指令。
#[derive(Debug)]
pub struct BlockBuilder {
    start_pc: u32,
    end_pc: u32,
    icount: u32,
    ops: Vec<IROp>,
    marks: Vec<InsnMark>,
    term: Option<Terminator>,
    pred: Option<bool>,
}

impl BlockBuilder {
    pub fn new(start_pc: u32) -> Self {
        BlockBuilder {
            start_pc,
            end_pc: start_pc,
            icount: 0,
            ops: Vec::new(),
            marks: Vec::new(),
            term: None,
            pred: None,
        }
    }

    /// 登记一条新指令。
    pub fn begin_insn(&mut self, pc: u32, len: u8) {
        self.marks.push(InsnMark {
            op_start: self.ops.len() as u32,
            pc,
            len,
        });
        self.icount += 1;
        self.end_pc = pc.wrapping_add(len as u32);
    }

    pub fn push(&mut self, op: IROp) {
        self.ops.push(op);
    }

    pub fn set_term(&mut self, term: Terminator) {
        self.term = Some(term);
    }

    pub fn set_pred(&mut self, expected_c: bool) {
        self.pred = Some(expected_c);
    }

    pub fn icount(&self) -> u32 {
        self.icount
    }

    pub fn end_pc(&self) -> u32 {
        self.end_pc
    }

    pub fn has_term(&self) -> bool {
        self.term.is_some()
    }

    /// 结束构造。未显式设置结束符时按顺序落入下一地址。
    pub fn build(self) -> TransBlock {
        let term = self.term.unwrap_or(Terminator::Fallthrough { next: self.end_pc });
        TransBlock {
            start_pc: self.start_pc,
            icount: self.icount,
            byte_len: self.end_pc.wrapping_sub(self.start_pc),
            ops: self.ops,
            term,
            insn_marks: self.marks,
            pred: self.pred,
        }
    }
}
