//! 32 位指令解码。
//!
//! 主操作码取 [29:26]，共 16 组：
//!
//! | 组 | 内容 |
//! |----|------|
//! | 0  | 寄存器算术/位操作/移位（次操作码 [15:10]，立即数 [9:5]）|
//! | 1  | 守卫访存（bctm 变体特性，未启用时非法）|
//! | 2  | 12 位立即数算术 |
//! | 3  | 宽立即数 movi/movih/lrw |
//! | 4,5| 位移寻址装载/存储（位移按宽度缩放）|
//! | 6  | 变址装载/存储与多寄存器搬移 |
//! | 7  | 条件/无条件转移、常量池与查表跳转 |
//! | 8  | bsr（26 位位移）|
//! | 9  | 系统操作（rte/rfi/stop/wait/doze/sync/trap/sce/idly）|
//! | A  | 控制寄存器访问与 PSR 置位/清位 |
//! | B  | DSP（基础组 DSP 位、宽乘与 HI/LO 组 EDSP 位）|
//! | C  | 浮点运算（双精度形式另看 FPU_DP 位）|
//! | D  | 浮点/向量访存 |
//! | E  | 128 位向量运算（VDSP 位）|
//! | F  | 保留，恒为非法 |
//!
//! 特权指令在用户态解码为特权违例。

use csky_core::Features;
use csky_core::exception::excp;
use csky_core::psr::{PSR_AF, PSR_EE, PSR_FE, PSR_IE, PSR_TP};
use csky_ir::{
    BlockBuilder, BrCond, FcvtKind, FpCmp, FpOp, FpUnOp, IROp, Lane, MemKind, Sat, Terminator,
    VLane, WaitKind,
};

fn illegal(b: &mut BlockBuilder) {
    b.set_term(Terminator::Exception { vec: excp::ILLEGAL });
}

fn privileged(b: &mut BlockBuilder) {
    b.set_term(Terminator::Exception { vec: excp::PRIV });
}

/// 特性未启用的编码按非法处理。返回是否放行。
fn feature_gate(b: &mut BlockBuilder, feats: Features, need: Features) -> bool {
    if feats.has(need) {
        true
    } else {
        illegal(b);
        false
    }
}

fn rx_of(raw: u32) -> u8 {
    ((raw >> 21) & 0x1f) as u8
}

fn ry_of(raw: u32) -> u8 {
    ((raw >> 16) & 0x1f) as u8
}

fn rz_of(raw: u32) -> u8 {
    (raw & 0x1f) as u8
}

fn imm5_of(raw: u32) -> u8 {
    ((raw >> 5) & 0x1f) as u8
}

fn sub6_of(raw: u32) -> u32 {
    (raw >> 10) & 0x3f
}

fn sext16x2(disp16: u32) -> i32 {
    ((disp16 as u16 as i16) as i32) << 1
}

/// 常量池地址：pc+4 向下取齐后加字位移。
fn pool_addr(pc: u32, disp16: u32) -> u32 {
    (pc.wrapping_add(4) & !3).wrapping_add(disp16 << 2)
}

fn ld_kind(sub: u32) -> Option<MemKind> {
    match sub {
        0 => Some(MemKind::B),
        1 => Some(MemKind::H),
        2 => Some(MemKind::W),
        3 => Some(MemKind::D),
        4 => Some(MemKind::Bs),
        5 => Some(MemKind::Hs),
        _ => None,
    }
}

fn st_kind(sub: u32) -> Option<MemKind> {
    match sub {
        0 => Some(MemKind::B),
        1 => Some(MemKind::H),
        2 => Some(MemKind::W),
        3 => Some(MemKind::D),
        _ => None,
    }
}

fn disp_shift(kind: MemKind) -> u32 {
    match kind.size() {
        1 => 0,
        2 => 1,
        4 => 2,
        _ => 3,
    }
}

/// psrset/psrclr 立即数的位清单：AF/FE/IE/EE/TP。
fn psr_imm_bits(imm5: u8) -> u32 {
    let mut bits = 0;
    if imm5 & 0x01 != 0 {
        bits |= PSR_AF;
    }
    if imm5 & 0x02 != 0 {
        bits |= PSR_FE;
    }
    if imm5 & 0x04 != 0 {
        bits |= PSR_IE;
    }
    if imm5 & 0x08 != 0 {
        bits |= PSR_EE;
    }
    if imm5 & 0x10 != 0 {
        bits |= PSR_TP;
    }
    bits
}

/// 解码一条 32 位指令。调用前须已 `begin_insn`。
pub fn decode32(b: &mut BlockBuilder, raw: u32, pc: u32, feats: Features, sup: bool) {
    match (raw >> 26) & 0xf {
        0x0 => decode32_alu(b, raw, feats),
        0x1 => decode32_guarded(b, raw, feats),
        0x2 => decode32_imm12(b, raw),
        0x3 => decode32_wide_imm(b, raw, pc),
        0x4 => decode32_load(b, raw),
        0x5 => decode32_store(b, raw),
        0x6 => decode32_indexed(b, raw),
        0x7 => decode32_branch(b, raw, pc, feats),
        0x8 => {
            let off = (((raw & 0x3ff_ffff) as i32) << 6 >> 6) << 1;
            b.set_term(Terminator::BranchLink {
                target: pc.wrapping_add_signed(off),
                ret: pc.wrapping_add(4),
            });
        }
        0x9 => decode32_system(b, raw, pc, sup),
        0xa => decode32_creg(b, raw, pc, sup),
        0xb => decode32_dsp(b, raw, feats),
        0xc => decode32_fpu(b, raw, feats),
        0xd => decode32_fls(b, raw, feats),
        0xe => decode32_vector(b, raw, feats),
        _ => illegal(b),
    }
}

fn decode32_alu(b: &mut BlockBuilder, raw: u32, feats: Features) {
    let rx = rx_of(raw);
    let ry = ry_of(raw);
    let rz = rz_of(raw);
    let imm = imm5_of(raw);
    match sub6_of(raw) {
        0 => b.push(IROp::Add { rz, rx, ry }),
        1 => b.push(IROp::Sub { rz, rx, ry }),
        2 => b.push(IROp::Rsub { rz, rx, ry }),
        3 => b.push(IROp::Addc { rz, rx, ry }),
        4 => b.push(IROp::Subc { rz, rx, ry }),
        5 => b.push(IROp::And { rz, rx, ry }),
        6 => b.push(IROp::Andn { rz, rx, ry }),
        7 => b.push(IROp::Or { rz, rx, ry }),
        8 => b.push(IROp::Xor { rz, rx, ry }),
        9 => b.push(IROp::Nor { rz, rx, ry }),
        10 => b.push(IROp::Mov { rz, rx }),
        11 => b.push(IROp::Lsl { rz, rx, ry }),
        12 => b.push(IROp::Lsr { rz, rx, ry }),
        13 => b.push(IROp::Asr { rz, rx, ry }),
        14 => b.push(IROp::Rotl { rz, rx, ry }),
        15 => b.push(IROp::Ixh { rz, rx, ry }),
        16 => b.push(IROp::Ixw { rz, rx, ry }),
        17 => b.push(IROp::Ixd { rz, rx, ry }),
        18 => b.push(IROp::Mult { rz, rx, ry }),
        19 => {
            if feature_gate(b, feats, Features::DIV) {
                b.push(IROp::DivU { rz, rx, ry });
            }
        }
        20 => {
            if feature_gate(b, feats, Features::DIV) {
                b.push(IROp::DivS { rz, rx, ry });
            }
        }
        21 => b.push(IROp::CmpHs { rx, ry }),
        22 => b.push(IROp::CmpLt { rx, ry }),
        23 => b.push(IROp::CmpNe { rx, ry }),
        24 => b.push(IROp::Tst { rx, ry }),
        25 => b.push(IROp::Tstnbz { rx }),
        26 => b.push(IROp::MovT { rz, rx }),
        27 => b.push(IROp::MovF { rz, rx }),
        28 => b.push(IROp::Clrt { rz }),
        29 => b.push(IROp::Clrf { rz }),
        30 => b.push(IROp::Abs { rz, rx }),
        31 => b.push(IROp::Ff0 { rz, rx }),
        32 => b.push(IROp::Ff1 { rz, rx }),
        33 => b.push(IROp::Revb { rz, rx }),
        34 => b.push(IROp::Revh { rz, rx }),
        35 => b.push(IROp::Brev { rz, rx }),
        36 => b.push(IROp::Xtrb { rz, rx, n: imm & 3 }),
        37 => b.push(IROp::Bgenr { rz, rx }),
        38 => b.push(IROp::MvC { rz }),
        39 => b.push(IROp::MvCv { rz }),
        40 => b.push(IROp::Bclri { rz, rx, imm }),
        41 => b.push(IROp::Bseti { rz, rx, imm }),
        42 => b.push(IROp::Btsti { rx, imm }),
        43 => b.push(IROp::Bmaski { rz, imm }),
        // 进位移位族的编码字段是移位量减一，IR 里放回真实量 1..=32
        44 => b.push(IROp::LslC { rz, rx, imm: imm + 1 }),
        45 => b.push(IROp::LsrC { rz, rx, imm: imm + 1 }),
        46 => b.push(IROp::AsrC { rz, rx, imm: imm + 1 }),
        47 => b.push(IROp::Xsr { rz, rx, imm: imm + 1 }),
        48 => b.push(IROp::LslImm { rz, rx, imm }),
        49 => b.push(IROp::LsrImm { rz, rx, imm }),
        50 => b.push(IROp::AsrImm { rz, rx, imm }),
        51 => b.push(IROp::RotlImm { rz, rx, imm }),
        52 => b.push(IROp::Sext {
            rz,
            rx,
            lsb: imm,
            msb: ry & 0x1f,
        }),
        53 => b.push(IROp::Zext {
            rz,
            rx,
            lsb: imm,
            msb: ry & 0x1f,
        }),
        54 => b.push(IROp::Ins {
            rz,
            rx,
            msb: ry & 0x1f,
            lsb: imm,
        }),
        55 => b.push(IROp::CFromV),
        56 => b.push(IROp::IncT { rz, rx, imm }),
        57 => b.push(IROp::IncF { rz, rx, imm }),
        58 => b.push(IROp::DecT { rz, rx, imm }),
        59 => b.push(IROp::DecF { rz, rx, imm }),
        60 => b.push(IROp::DecGt { rz, rx, imm }),
        61 => b.push(IROp::DecLt { rz, rx, imm }),
        62 => b.push(IROp::DecNe { rz, rx, imm }),
        _ => illegal(b),
    }
}

fn decode32_guarded(b: &mut BlockBuilder, raw: u32, feats: Features) {
    if !feature_gate(b, feats, Features::BCTM) {
        return;
    }
    let rx = rx_of(raw);
    let rz = ry_of(raw);
    let sub = (raw >> 12) & 0xf;
    let disp12 = raw & 0xfff;
    if sub < 8 {
        let Some(kind) = ld_kind(sub) else {
            illegal(b);
            return;
        };
        b.push(IROp::Load {
            rz,
            rx,
            disp: disp12 << disp_shift(kind),
            kind,
            guarded: true,
        });
    } else {
        let Some(kind) = st_kind(sub - 8) else {
            illegal(b);
            return;
        };
        b.push(IROp::Store {
            rz,
            rx,
            disp: disp12 << disp_shift(kind),
            kind,
            guarded: true,
        });
    }
}

fn decode32_imm12(b: &mut BlockBuilder, raw: u32) {
    let rx = rx_of(raw);
    let rz = ry_of(raw);
    let imm = raw & 0xfff;
    match (raw >> 12) & 0xf {
        0 => b.push(IROp::AddImm { rz, rx, imm }),
        1 => b.push(IROp::SubImm { rz, rx, imm }),
        2 => b.push(IROp::AndImm { rz, rx, imm }),
        3 => b.push(IROp::OrImm { rz, rx, imm }),
        4 => b.push(IROp::XorImm { rz, rx, imm }),
        5 => b.push(IROp::AndnImm { rz, rx, imm }),
        6 => b.push(IROp::RsubImm { rz, rx, imm }),
        7 => b.push(IROp::CmpHsImm { rx, imm }),
        8 => b.push(IROp::CmpLtImm { rx, imm }),
        9 => b.push(IROp::CmpNeImm { rx, imm }),
        _ => illegal(b),
    }
}

fn decode32_wide_imm(b: &mut BlockBuilder, raw: u32, pc: u32) {
    let rz = rx_of(raw);
    let imm16 = raw & 0xffff;
    match (raw >> 16) & 0x1f {
        0 => b.push(IROp::MovImm { rz, imm: imm16 }),
        1 => b.push(IROp::Movih {
            rz,
            imm: imm16 as u16,
        }),
        2 => b.push(IROp::LoadAbs {
            rz,
            addr: pool_addr(pc, imm16),
        }),
        _ => illegal(b),
    }
}

fn decode32_load(b: &mut BlockBuilder, raw: u32) {
    let Some(kind) = ld_kind((raw >> 12) & 0xf) else {
        illegal(b);
        return;
    };
    b.push(IROp::Load {
        rz: ry_of(raw),
        rx: rx_of(raw),
        disp: (raw & 0xfff) << disp_shift(kind),
        kind,
        guarded: false,
    });
}

fn decode32_store(b: &mut BlockBuilder, raw: u32) {
    let Some(kind) = st_kind((raw >> 12) & 0xf) else {
        illegal(b);
        return;
    };
    b.push(IROp::Store {
        rz: ry_of(raw),
        rx: rx_of(raw),
        disp: (raw & 0xfff) << disp_shift(kind),
        kind,
        guarded: false,
    });
}

fn decode32_indexed(b: &mut BlockBuilder, raw: u32) {
    let rx = rx_of(raw);
    let rz = ry_of(raw);
    let ry = imm5_of(raw);
    let shift = ((raw >> 10) & 3) as u8;
    match (raw >> 12) & 0xf {
        0 => b.push(IROp::LoadIdx { rz, rx, ry, shift, kind: MemKind::B }),
        1 => b.push(IROp::LoadIdx { rz, rx, ry, shift, kind: MemKind::H }),
        2 => b.push(IROp::LoadIdx { rz, rx, ry, shift, kind: MemKind::W }),
        3 => b.push(IROp::LoadIdx { rz, rx, ry, shift, kind: MemKind::Bs }),
        4 => b.push(IROp::LoadIdx { rz, rx, ry, shift, kind: MemKind::Hs }),
        5 => b.push(IROp::StoreIdx { rz, rx, ry, shift, kind: MemKind::B }),
        6 => b.push(IROp::StoreIdx { rz, rx, ry, shift, kind: MemKind::H }),
        7 => b.push(IROp::StoreIdx { rz, rx, ry, shift, kind: MemKind::W }),
        8 => b.push(IROp::LoadMulti {
            rf: rz,
            count: ry.wrapping_add(1),
            rx,
        }),
        9 => b.push(IROp::StoreMulti {
            rf: rz,
            count: ry.wrapping_add(1),
            rx,
        }),
        _ => illegal(b),
    }
}

fn decode32_branch(b: &mut BlockBuilder, raw: u32, pc: u32, feats: Features) {
    let rx = rx_of(raw);
    let disp16 = raw & 0xffff;
    let target = pc.wrapping_add_signed(sext16x2(disp16));
    let next = pc.wrapping_add(4);
    let cond = |b: &mut BlockBuilder, cond| {
        b.set_term(Terminator::BranchCond {
            cond,
            rx,
            target,
            next,
        });
    };
    match (raw >> 16) & 0x1f {
        0 => b.set_term(Terminator::Branch { target }),
        1 => cond(b, BrCond::CTrue),
        2 => cond(b, BrCond::CFalse),
        3 => cond(b, BrCond::EqZ),
        4 => cond(b, BrCond::NeZ),
        5 => cond(b, BrCond::GtZ),
        6 => cond(b, BrCond::LeZ),
        7 => cond(b, BrCond::LtZ),
        8 => cond(b, BrCond::GeZ),
        9 => {
            if feature_gate(b, feats, Features::ELRW) {
                b.set_term(Terminator::IndirectLoad {
                    addr: pool_addr(pc, disp16),
                    link: None,
                });
            }
        }
        10 => {
            if feature_gate(b, feats, Features::ELRW) {
                b.set_term(Terminator::IndirectLoad {
                    addr: pool_addr(pc, disp16),
                    link: Some(next),
                });
            }
        }
        11 => b.set_term(Terminator::IndirectJmp { rx, link: None }),
        12 => b.set_term(Terminator::IndirectJmp {
            rx,
            link: Some(next),
        }),
        13 => b.set_term(Terminator::IndirectTable {
            rx,
            scale: 16 + 8 * (disp16 & 3) as u8,
        }),
        _ => illegal(b),
    }
}

fn decode32_system(b: &mut BlockBuilder, raw: u32, pc: u32, sup: bool) {
    let next = pc.wrapping_add(4);
    let imm = imm5_of(raw);
    let sub = sub6_of(raw);
    // rte/rfi 与低功耗指令仅限超级用户
    if sub <= 4 && !sup {
        privileged(b);
        return;
    }
    match sub {
        0 => b.set_term(Terminator::Rte { fast: false }),
        1 => b.set_term(Terminator::Rte { fast: true }),
        2 => b.set_term(Terminator::Wait {
            kind: WaitKind::Stop,
            next,
        }),
        3 => b.set_term(Terminator::Wait {
            kind: WaitKind::Wait,
            next,
        }),
        4 => b.set_term(Terminator::Wait {
            kind: WaitKind::Doze,
            next,
        }),
        5 => b.set_term(Terminator::Sync { next }),
        6 => b.set_term(Terminator::Exception {
            vec: excp::TRAP0 + (imm & 3) as u32,
        }),
        7 => {
            b.push(IROp::Sce { mask: imm & 0xf });
            b.set_term(Terminator::Sync { next });
        }
        8 => {
            b.push(IROp::Idly { n: imm });
            b.set_term(Terminator::Sync { next });
        }
        _ => illegal(b),
    }
}

fn decode32_creg(b: &mut BlockBuilder, raw: u32, pc: u32, sup: bool) {
    if !sup {
        privileged(b);
        return;
    }
    let idx = rx_of(raw);
    let sel = imm5_of(raw);
    let next = pc.wrapping_add(4);
    match sub6_of(raw) {
        0 => b.push(IROp::Mfcr {
            rz: rz_of(raw),
            sel,
            idx,
        }),
        // 控制寄存器写入可能改变翻译环境，块到此为止
        1 => {
            b.push(IROp::Mtcr {
                rx: ry_of(raw),
                sel,
                idx,
            });
            b.set_term(Terminator::Sync { next });
        }
        2 => {
            b.push(IROp::PsrSet {
                bits: psr_imm_bits(imm5_of(raw)),
            });
            b.set_term(Terminator::Sync { next });
        }
        3 => {
            b.push(IROp::PsrClr {
                bits: psr_imm_bits(imm5_of(raw)),
            });
            b.set_term(Terminator::Sync { next });
        }
        _ => illegal(b),
    }
}

fn decode32_dsp(b: &mut BlockBuilder, raw: u32, feats: Features) {
    let sub = sub6_of(raw);
    let need = if sub < 38 { Features::DSP } else { Features::EDSP };
    if !feature_gate(b, feats, need) {
        return;
    }
    let rx = rx_of(raw);
    let ry = ry_of(raw);
    let rz = rz_of(raw);
    let imm = imm5_of(raw);
    // 紧缩加减：次操作码内先按分道再按饱和排列
    let pk_lane = |i: u32| if i < 3 { Lane::B4 } else { Lane::H2 };
    let pk_sat = |i: u32| match i % 3 {
        0 => Sat::None,
        1 => Sat::Signed,
        _ => Sat::Unsigned,
    };
    match sub {
        0 => b.push(IROp::AddSat32 { rz, rx, ry, signed: true }),
        1 => b.push(IROp::AddSat32 { rz, rx, ry, signed: false }),
        2 => b.push(IROp::SubSat32 { rz, rx, ry, signed: true }),
        3 => b.push(IROp::SubSat32 { rz, rx, ry, signed: false }),
        4 => b.push(IROp::AddSat64 { rz, rx, ry, signed: true }),
        5 => b.push(IROp::AddSat64 { rz, rx, ry, signed: false }),
        6 => b.push(IROp::SubSat64 { rz, rx, ry, signed: true }),
        7 => b.push(IROp::SubSat64 { rz, rx, ry, signed: false }),
        8..=13 => b.push(IROp::PkAdd {
            rz,
            rx,
            ry,
            lane: pk_lane(sub - 8),
            sat: pk_sat(sub - 8),
        }),
        14..=19 => b.push(IROp::PkSub {
            rz,
            rx,
            ry,
            lane: pk_lane(sub - 14),
            sat: pk_sat(sub - 14),
        }),
        20 => b.push(IROp::PkAbs { rz, rx, lane: Lane::B4 }),
        21 => b.push(IROp::PkAbs { rz, rx, lane: Lane::H2 }),
        22 => b.push(IROp::PkMin { rz, rx, ry, lane: Lane::B4, signed: true }),
        23 => b.push(IROp::PkMin { rz, rx, ry, lane: Lane::B4, signed: false }),
        24 => b.push(IROp::PkMin { rz, rx, ry, lane: Lane::H2, signed: true }),
        25 => b.push(IROp::PkMin { rz, rx, ry, lane: Lane::H2, signed: false }),
        26 => b.push(IROp::PkMax { rz, rx, ry, lane: Lane::B4, signed: true }),
        27 => b.push(IROp::PkMax { rz, rx, ry, lane: Lane::B4, signed: false }),
        28 => b.push(IROp::PkMax { rz, rx, ry, lane: Lane::H2, signed: true }),
        29 => b.push(IROp::PkMax { rz, rx, ry, lane: Lane::H2, signed: false }),
        30 => b.push(IROp::PkCmpEq { rz, rx, ry, lane: Lane::B4 }),
        31 => b.push(IROp::PkCmpEq { rz, rx, ry, lane: Lane::H2 }),
        32 => b.push(IROp::Clip { rz, rx, bits: imm, signed: true }),
        33 => b.push(IROp::Clip { rz, rx, bits: imm, signed: false }),
        34 => b.push(IROp::RoundShr { rz, rx, imm, signed: true }),
        35 => b.push(IROp::RoundShr { rz, rx, imm, signed: false }),
        36 => b.push(IROp::SatShl { rz, rx, imm, signed: true }),
        37 => b.push(IROp::SatShl { rz, rx, imm, signed: false }),
        38 => b.push(IROp::MulWide { rz, rx, ry, signed: true }),
        39 => b.push(IROp::MulWide { rz, rx, ry, signed: false }),
        40 => b.push(IROp::MulAcc { rz, rx, ry, signed: true, sub: false }),
        41 => b.push(IROp::MulAcc { rz, rx, ry, signed: false, sub: false }),
        42 => b.push(IROp::MulAcc { rz, rx, ry, signed: true, sub: true }),
        43 => b.push(IROp::MulAcc { rz, rx, ry, signed: false, sub: true }),
        44 => b.push(IROp::MulAccV { rz, rx, ry, sub: false }),
        45 => b.push(IROp::MulAccV { rz, rx, ry, sub: true }),
        46 => b.push(IROp::MultHiLo { rx, ry, signed: true }),
        47 => b.push(IROp::MultHiLo { rx, ry, signed: false }),
        48 => b.push(IROp::MacHiLo { rx, ry, signed: true, sub: false }),
        49 => b.push(IROp::MacHiLo { rx, ry, signed: false, sub: false }),
        50 => b.push(IROp::MacHiLo { rx, ry, signed: true, sub: true }),
        51 => b.push(IROp::MacHiLo { rx, ry, signed: false, sub: true }),
        52 => b.push(IROp::MvFromHi { rz }),
        53 => b.push(IROp::MvFromLo { rz }),
        54 => b.push(IROp::MvFromHiS { rz }),
        55 => b.push(IROp::MvFromLoS { rz }),
        56 => b.push(IROp::MvToHi { rx }),
        57 => b.push(IROp::MvToLo { rx }),
        _ => illegal(b),
    }
}

fn decode32_fpu(b: &mut BlockBuilder, raw: u32, feats: Features) {
    if !feature_gate(b, feats, Features::FPU) {
        return;
    }
    let vx = rx_of(raw);
    let vy = ry_of(raw);
    let vz = rz_of(raw);
    let dword = raw & (1 << 9) != 0;
    if dword && !feature_gate(b, feats, Features::FPU_DP) {
        return;
    }
    let sub = sub6_of(raw);
    let arith = |b: &mut BlockBuilder, op| {
        b.push(IROp::FArith { op, vz, vx, vy, dword });
    };
    let unary = |b: &mut BlockBuilder, op| {
        b.push(IROp::FUnary { op, vz, vx, dword });
    };
    let cmp = |b: &mut BlockBuilder, cond, vy| {
        b.push(IROp::FCmpOp { cond, vx, vy, dword });
    };
    match sub {
        0 => arith(b, FpOp::Add),
        1 => arith(b, FpOp::Sub),
        2 => arith(b, FpOp::Mul),
        3 => arith(b, FpOp::Div),
        4 => arith(b, FpOp::Min),
        5 => arith(b, FpOp::Max),
        6 => unary(b, FpUnOp::Neg),
        7 => unary(b, FpUnOp::Abs),
        8 => unary(b, FpUnOp::Sqrt),
        9 => unary(b, FpUnOp::Mov),
        10 => cmp(b, FpCmp::Ne, vy),
        11 => cmp(b, FpCmp::Hs, vy),
        12 => cmp(b, FpCmp::Lt, vy),
        13 => cmp(b, FpCmp::Uo, vy),
        // 与零比较的形式
        14 => cmp(b, FpCmp::Ne, 255),
        15 => cmp(b, FpCmp::Hs, 255),
        16 => cmp(b, FpCmp::Lt, 255),
        17 => cmp(b, FpCmp::Uo, 255),
        18..=21 => b.push(IROp::FMac {
            vz,
            vx,
            vy,
            dword,
            negate: sub >= 20,
            sub: sub & 1 != 0,
        }),
        22..=31 => {
            let kind = match sub {
                22 => FcvtKind::S2D,
                23 => FcvtKind::D2S,
                24 => FcvtKind::S2Si,
                25 => FcvtKind::S2Ui,
                26 => FcvtKind::D2Si,
                27 => FcvtKind::D2Ui,
                28 => FcvtKind::Si2S,
                29 => FcvtKind::Ui2S,
                30 => FcvtKind::Si2D,
                _ => FcvtKind::Ui2D,
            };
            let needs_dp = matches!(
                kind,
                FcvtKind::S2D
                    | FcvtKind::D2S
                    | FcvtKind::D2Si
                    | FcvtKind::D2Ui
                    | FcvtKind::Si2D
                    | FcvtKind::Ui2D
            );
            if needs_dp && !feature_gate(b, feats, Features::FPU_DP) {
                return;
            }
            b.push(IROp::FCvt { kind, vz, vx });
        }
        32 => b.push(IROp::FMovToGpr {
            rz: vz,
            vx,
            high: false,
        }),
        33 => b.push(IROp::FMovToGpr {
            rz: vz,
            vx,
            high: true,
        }),
        34 => b.push(IROp::FMovToFpu {
            vz,
            rx: vx,
            high: false,
        }),
        35 => b.push(IROp::FMovToFpu {
            vz,
            rx: vx,
            high: true,
        }),
        _ => illegal(b),
    }
}

fn decode32_fls(b: &mut BlockBuilder, raw: u32, feats: Features) {
    let rx = rx_of(raw);
    let vz = ry_of(raw);
    let ry = imm5_of(raw);
    let shift = ((raw >> 10) & 3) as u8;
    let disp8 = raw & 0xff;
    let sub = (raw >> 12) & 0xf;
    let need = match sub {
        1 | 3 | 5 | 7 => Features::FPU_DP,
        8 | 9 => Features::VDSP,
        _ => Features::FPU,
    };
    if !feature_gate(b, feats, need) {
        return;
    }
    match sub {
        0 => b.push(IROp::FLoad { vz, rx, disp: disp8 << 2, dword: false }),
        1 => b.push(IROp::FLoad { vz, rx, disp: disp8 << 3, dword: true }),
        2 => b.push(IROp::FStore { vz, rx, disp: disp8 << 2, dword: false }),
        3 => b.push(IROp::FStore { vz, rx, disp: disp8 << 3, dword: true }),
        4 => b.push(IROp::FLoadIdx { vz, rx, ry, shift, dword: false }),
        5 => b.push(IROp::FLoadIdx { vz, rx, ry, shift, dword: true }),
        6 => b.push(IROp::FStoreIdx { vz, rx, ry, shift, dword: false }),
        7 => b.push(IROp::FStoreIdx { vz, rx, ry, shift, dword: true }),
        8 => b.push(IROp::VLoad { vq: vz, rx, disp: disp8 << 4 }),
        9 => b.push(IROp::VStore { vq: vz, rx, disp: disp8 << 4 }),
        _ => illegal(b),
    }
}

fn decode32_vector(b: &mut BlockBuilder, raw: u32, feats: Features) {
    if !feature_gate(b, feats, Features::VDSP) {
        return;
    }
    let vq_x = rx_of(raw);
    let vq_y = ry_of(raw);
    let vq_z = rz_of(raw);
    let imm = imm5_of(raw);
    let lane3 = |i: u32| match i {
        0 => VLane::B16,
        1 => VLane::H8,
        _ => VLane::W4,
    };
    let sat3 = |i: u32| match i {
        0 => Sat::None,
        1 => Sat::Signed,
        _ => Sat::Unsigned,
    };
    let sub = sub6_of(raw);
    match sub {
        0..=8 => b.push(IROp::VAdd {
            vq_z,
            vq_x,
            vq_y,
            lane: lane3(sub / 3),
            sat: sat3(sub % 3),
        }),
        9..=17 => b.push(IROp::VSub {
            vq_z,
            vq_x,
            vq_y,
            lane: lane3((sub - 9) / 3),
            sat: sat3((sub - 9) % 3),
        }),
        18 => b.push(IROp::VAnd { vq_z, vq_x, vq_y }),
        19 => b.push(IROp::VOr { vq_z, vq_x, vq_y }),
        20 => b.push(IROp::VXor { vq_z, vq_x, vq_y }),
        21..=23 => b.push(IROp::VShlImm {
            vq_z,
            vq_x,
            lane: lane3(sub - 21),
            imm,
        }),
        24..=29 => b.push(IROp::VShrImm {
            vq_z,
            vq_x,
            lane: lane3((sub - 24) / 2),
            imm,
            signed: (sub - 24) % 2 == 0,
        }),
        30 => b.push(IROp::VMov { vq_z, vq_x }),
        31..=33 => b.push(IROp::VDupG {
            vq_z,
            rx: rx_of(raw),
            lane: lane3(sub - 31),
        }),
        34 => b.push(IROp::VMovToGpr {
            rz: vq_z,
            vq_x,
            idx: imm & 3,
        }),
        _ => illegal(b),
    }
}

// ----------------------------------------------------------------------
// 编码辅助
// ----------------------------------------------------------------------

const OP32: u32 = 0xc000_0000;

fn major(m: u32) -> u32 {
    OP32 | (m << 26)
}

fn regs(rx: u8, ry: u8, rz: u8) -> u32 {
    ((rx as u32 & 0x1f) << 21) | ((ry as u32 & 0x1f) << 16) | (rz as u32 & 0x1f)
}

fn clamp_disp16(mut disp: i32) -> u32 {
    disp &= !1;
    let min = -(1 << 16);
    let max = (1 << 16) - 2;
    if disp < min {
        disp = min;
    }
    if disp > max {
        disp = max;
    }
    ((disp >> 1) as u32) & 0xffff
}

pub fn encode_alu32(sub6: u32, rx: u8, ry: u8, rz: u8, imm5: u8) -> u32 {
    major(0x0) | regs(rx, ry, rz) | ((sub6 & 0x3f) << 10) | ((imm5 as u32 & 0x1f) << 5)
}

/// sub: 0 addi / 1 subi / 2 andi / 3 ori / 4 xori / 5 andni / 6 rsubi /
/// 7 cmphsi / 8 cmplti / 9 cmpnei
pub fn encode_imm12(sub: u32, rz: u8, rx: u8, imm12: u32) -> u32 {
    major(0x2) | regs(rx, rz, 0) | ((sub & 0xf) << 12) | (imm12 & 0xfff)
}

pub fn encode_movi32(rz: u8, imm16: u32) -> u32 {
    major(0x3) | regs(rz, 0, 0) | (imm16 & 0xffff)
}

pub fn encode_movih32(rz: u8, imm16: u32) -> u32 {
    major(0x3) | regs(rz, 1, 0) | (imm16 & 0xffff)
}

pub fn encode_lrw32(rz: u8, disp16: u32) -> u32 {
    major(0x3) | regs(rz, 2, 0) | (disp16 & 0xffff)
}

/// sub: 0 b / 1 h / 2 w / 3 d / 4 bs / 5 hs；disp 为未缩放槽号
pub fn encode_ld32(sub: u32, rz: u8, rx: u8, disp12: u32) -> u32 {
    major(0x4) | regs(rx, rz, 0) | ((sub & 0xf) << 12) | (disp12 & 0xfff)
}

pub fn encode_st32(sub: u32, rz: u8, rx: u8, disp12: u32) -> u32 {
    major(0x5) | regs(rx, rz, 0) | ((sub & 0xf) << 12) | (disp12 & 0xfff)
}

/// 守卫访存编码：布局与位移寻址相同，load sub 0-5、store sub 8-11。
pub fn encode_guarded32(sub: u32, rz: u8, rx: u8, disp12: u32) -> u32 {
    major(0x1) | regs(rx, rz, 0) | ((sub & 0xf) << 12) | (disp12 & 0xfff)
}

/// sub: 0-4 变址装载 b/h/w/bs/hs，5-7 变址存储 b/h/w
pub fn encode_ldr32(sub: u32, rz: u8, rx: u8, ry: u8, shift: u8) -> u32 {
    major(0x6)
        | regs(rx, rz, 0)
        | ((sub & 0xf) << 12)
        | ((shift as u32 & 3) << 10)
        | ((ry as u32 & 0x1f) << 5)
}

pub fn encode_str32(sub: u32, rz: u8, rx: u8, ry: u8, shift: u8) -> u32 {
    encode_ldr32(sub, rz, rx, ry, shift)
}

pub fn encode_ldm32(rf: u8, count: u8, rx: u8) -> u32 {
    major(0x6) | regs(rx, rf, 0) | (8 << 12) | (((count.wrapping_sub(1)) as u32 & 0x1f) << 5)
}

pub fn encode_stm32(rf: u8, count: u8, rx: u8) -> u32 {
    major(0x6) | regs(rx, rf, 0) | (9 << 12) | (((count.wrapping_sub(1)) as u32 & 0x1f) << 5)
}

fn branch32(sub: u32, rx: u8, disp: i32) -> u32 {
    major(0x7) | regs(rx, 0, 0) | ((sub & 0x1f) << 16) | clamp_disp16(disp)
}

pub fn encode_br32(disp: i32) -> u32 {
    branch32(0, 0, disp)
}

pub fn encode_bez32(rx: u8, disp: i32) -> u32 {
    branch32(3, rx, disp)
}

pub fn encode_bnez32(rx: u8, disp: i32) -> u32 {
    branch32(4, rx, disp)
}

pub fn encode_jmpi32(disp16: u32) -> u32 {
    major(0x7) | (9 << 16) | (disp16 & 0xffff)
}

pub fn encode_jsri32(disp16: u32) -> u32 {
    major(0x7) | (10 << 16) | (disp16 & 0xffff)
}

pub fn encode_jmp32(rx: u8) -> u32 {
    major(0x7) | regs(rx, 0, 0) | (11 << 16)
}

pub fn encode_jsr32(rx: u8) -> u32 {
    major(0x7) | regs(rx, 0, 0) | (12 << 16)
}

/// idx2 选择表项宽（0-3 对应 16/24/32/40 字节）
pub fn encode_jmpix32(rx: u8, idx2: u32) -> u32 {
    major(0x7) | regs(rx, 0, 0) | (13 << 16) | (idx2 & 3)
}

pub fn encode_bsr32(disp: i32) -> u32 {
    let mut d = disp & !1;
    let min = -(1 << 26);
    let max = (1 << 26) - 2;
    if d < min {
        d = min;
    }
    if d > max {
        d = max;
    }
    major(0x8) | (((d >> 1) as u32) & 0x3ff_ffff)
}

/// sub: 0 rte / 1 rfi / 2 stop / 3 wait / 4 doze / 5 sync / 6 trap /
/// 7 sce / 8 idly
pub fn encode_sys32(sub6: u32, imm5: u8) -> u32 {
    major(0x9) | ((sub6 & 0x3f) << 10) | ((imm5 as u32 & 0x1f) << 5)
}

pub fn encode_mfcr32(rz: u8, sel: u8, idx: u8) -> u32 {
    major(0xa) | regs(idx, 0, rz) | ((sel as u32 & 0x1f) << 5)
}

pub fn encode_mtcr32(rx: u8, sel: u8, idx: u8) -> u32 {
    major(0xa) | regs(idx, rx, 0) | (1 << 10) | ((sel as u32 & 0x1f) << 5)
}

pub fn encode_psrset32(imm5: u8) -> u32 {
    major(0xa) | (2 << 10) | ((imm5 as u32 & 0x1f) << 5)
}

pub fn encode_psrclr32(imm5: u8) -> u32 {
    major(0xa) | (3 << 10) | ((imm5 as u32 & 0x1f) << 5)
}

pub fn encode_dsp32(sub6: u32, rx: u8, ry: u8, rz: u8, imm5: u8) -> u32 {
    major(0xb) | regs(rx, ry, rz) | ((sub6 & 0x3f) << 10) | ((imm5 as u32 & 0x1f) << 5)
}

pub fn encode_fpu32(sub6: u32, vx: u8, vy: u8, vz: u8, dword: bool) -> u32 {
    major(0xc) | regs(vx, vy, vz) | ((sub6 & 0x3f) << 10) | ((dword as u32) << 9)
}

/// sub: 0-3 位移形式 flds/fldd/fsts/fstd，8/9 vldq/vstq
pub fn encode_fls32(sub: u32, vz: u8, rx: u8, disp8: u32) -> u32 {
    major(0xd) | regs(rx, vz, 0) | ((sub & 0xf) << 12) | (disp8 & 0xff)
}

pub fn encode_vop32(sub6: u32, vx: u8, vy: u8, vz: u8, imm5: u8) -> u32 {
    major(0xe) | regs(vx, vy, vz) | ((sub6 & 0x3f) << 10) | ((imm5 as u32 & 0x1f) << 5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use csky_core::CpuModel;

    fn decode_with(raw: u32, pc: u32, feats: Features, sup: bool) -> csky_ir::TransBlock {
        let mut b = BlockBuilder::new(pc);
        b.begin_insn(pc, 4);
        decode32(&mut b, raw, pc, feats, sup);
        b.build()
    }

    fn decode_sup(raw: u32, pc: u32, model: CpuModel) -> csky_ir::TransBlock {
        decode_with(raw, pc, model.features(), true)
    }

    #[test]
    fn test_alu32_three_address() {
        let blk = decode_sup(encode_alu32(0, 1, 2, 3, 0), 0, CpuModel::Ck810);
        assert_eq!(blk.ops, vec![IROp::Add { rz: 3, rx: 1, ry: 2 }]);
        let blk = decode_sup(encode_alu32(2, 1, 2, 3, 0), 0, CpuModel::Ck810);
        assert_eq!(blk.ops, vec![IROp::Rsub { rz: 3, rx: 1, ry: 2 }]);
    }

    #[test]
    fn test_alu32_imm_forms() {
        let blk = decode_sup(encode_alu32(40, 4, 0, 5, 12), 0, CpuModel::Ck810);
        assert_eq!(blk.ops, vec![IROp::Bclri { rz: 5, rx: 4, imm: 12 }]);
        let blk = decode_sup(encode_alu32(50, 4, 0, 5, 31), 0, CpuModel::Ck810);
        assert_eq!(blk.ops, vec![IROp::AsrImm { rz: 5, rx: 4, imm: 31 }]);
    }

    #[test]
    fn test_sext_field_bounds() {
        // lsb 在立即数槽，msb 借用 ry 槽
        let blk = decode_sup(encode_alu32(52, 2, 15, 3, 8), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::Sext {
                rz: 3,
                rx: 2,
                lsb: 8,
                msb: 15,
            }]
        );
    }

    #[test]
    fn test_div_feature_gate() {
        let raw = encode_alu32(19, 1, 2, 3, 0);
        let blk = decode_sup(raw, 0, CpuModel::Ck810);
        assert_eq!(blk.ops, vec![IROp::DivU { rz: 3, rx: 1, ry: 2 }]);
        // CK807 无硬件除法
        let blk = decode_sup(raw, 0, CpuModel::Ck807);
        assert_eq!(blk.term, Terminator::Exception { vec: excp::ILLEGAL });
    }

    #[test]
    fn test_imm12_ops() {
        let blk = decode_sup(encode_imm12(0, 2, 1, 100), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::AddImm {
                rz: 2,
                rx: 1,
                imm: 100,
            }]
        );
        let blk = decode_sup(encode_imm12(7, 0, 1, 0xfff), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::CmpHsImm {
                rx: 1,
                imm: 0xfff,
            }]
        );
        let blk = decode_sup(encode_imm12(12, 0, 1, 0), 0, CpuModel::Ck810);
        assert_eq!(blk.term, Terminator::Exception { vec: excp::ILLEGAL });
    }

    #[test]
    fn test_wide_imm_and_pool() {
        let blk = decode_sup(encode_movi32(7, 0xabcd), 0, CpuModel::Ck810);
        assert_eq!(blk.ops, vec![IROp::MovImm { rz: 7, imm: 0xabcd }]);
        let blk = decode_sup(encode_movih32(7, 0x1234), 0, CpuModel::Ck810);
        assert_eq!(blk.ops, vec![IROp::Movih { rz: 7, imm: 0x1234 }]);
        // 池基址 pc+4 向下取齐
        let blk = decode_sup(encode_lrw32(7, 2), 0x1002, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::LoadAbs {
                rz: 7,
                addr: 0x100c,
            }]
        );
    }

    #[test]
    fn test_load_store_scaling() {
        let blk = decode_sup(encode_ld32(2, 3, 4, 5), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::Load {
                rz: 3,
                rx: 4,
                disp: 20,
                kind: MemKind::W,
                guarded: false,
            }]
        );
        let blk = decode_sup(encode_st32(3, 6, 4, 1), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::Store {
                rz: 6,
                rx: 4,
                disp: 8,
                kind: MemKind::D,
                guarded: false,
            }]
        );
        let blk = decode_sup(encode_ld32(4, 3, 4, 9), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::Load {
                rz: 3,
                rx: 4,
                disp: 9,
                kind: MemKind::Bs,
                guarded: false,
            }]
        );
    }

    #[test]
    fn test_guarded_forms_gated_by_feature() {
        let raw = encode_guarded32(2, 3, 4, 5);
        let blk = decode_sup(raw, 0, CpuModel::Ck810);
        assert_eq!(blk.term, Terminator::Exception { vec: excp::ILLEGAL });

        let feats = CpuModel::Ck810.features().with(Features::BCTM);
        let blk = decode_with(raw, 0, feats, true);
        assert_eq!(
            blk.ops,
            vec![IROp::Load {
                rz: 3,
                rx: 4,
                disp: 20,
                kind: MemKind::W,
                guarded: true,
            }]
        );
        let blk = decode_with(encode_guarded32(10, 3, 4, 5), 0, feats, true);
        assert_eq!(
            blk.ops,
            vec![IROp::Store {
                rz: 3,
                rx: 4,
                disp: 20,
                kind: MemKind::W,
                guarded: true,
            }]
        );
    }

    #[test]
    fn test_indexed_and_multi() {
        let blk = decode_sup(encode_ldr32(2, 3, 4, 5, 2), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::LoadIdx {
                rz: 3,
                rx: 4,
                ry: 5,
                shift: 2,
                kind: MemKind::W,
            }]
        );
        let blk = decode_sup(encode_ldm32(4, 8, 1), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::LoadMulti {
                rf: 4,
                count: 8,
                rx: 1,
            }]
        );
        let blk = decode_sup(encode_stm32(16, 4, 14), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::StoreMulti {
                rf: 16,
                count: 4,
                rx: 14,
            }]
        );
    }

    #[test]
    fn test_branch_family() {
        let blk = decode_sup(encode_br32(-8), 0x1000, CpuModel::Ck810);
        assert_eq!(blk.term, Terminator::Branch { target: 0xff8 });
        let blk = decode_sup(encode_bez32(5, 0x20), 0x1000, CpuModel::Ck810);
        assert_eq!(
            blk.term,
            Terminator::BranchCond {
                cond: BrCond::EqZ,
                rx: 5,
                target: 0x1020,
                next: 0x1004,
            }
        );
        let blk = decode_sup(encode_bnez32(5, 0x20), 0x1000, CpuModel::Ck810);
        assert!(matches!(
            blk.term,
            Terminator::BranchCond {
                cond: BrCond::NeZ,
                ..
            }
        ));
    }

    #[test]
    fn test_bsr_long_range() {
        let blk = decode_sup(encode_bsr32(0x100_0000), 0x8000, CpuModel::Ck810);
        assert_eq!(
            blk.term,
            Terminator::BranchLink {
                target: 0x100_8000,
                ret: 0x8004,
            }
        );
        let blk = decode_sup(encode_bsr32(-0x40), 0x8000, CpuModel::Ck810);
        assert_eq!(
            blk.term,
            Terminator::BranchLink {
                target: 0x7fc0,
                ret: 0x8004,
            }
        );
    }

    #[test]
    fn test_pool_jumps_gated_by_elrw() {
        let blk = decode_sup(encode_jmpi32(4), 0x1000, CpuModel::Ck810);
        assert_eq!(
            blk.term,
            Terminator::IndirectLoad {
                addr: 0x1014,
                link: None,
            }
        );
        let blk = decode_sup(encode_jsri32(4), 0x1000, CpuModel::Ck810);
        assert_eq!(
            blk.term,
            Terminator::IndirectLoad {
                addr: 0x1014,
                link: Some(0x1004),
            }
        );
        // CK803 无常量池跳转
        let blk = decode_sup(encode_jmpi32(4), 0x1000, CpuModel::Ck803);
        assert_eq!(blk.term, Terminator::Exception { vec: excp::ILLEGAL });
    }

    #[test]
    fn test_register_jumps() {
        let blk = decode_sup(encode_jmp32(3), 0x100, CpuModel::Ck810);
        assert_eq!(blk.term, Terminator::IndirectJmp { rx: 3, link: None });
        let blk = decode_sup(encode_jsr32(3), 0x100, CpuModel::Ck810);
        assert_eq!(
            blk.term,
            Terminator::IndirectJmp {
                rx: 3,
                link: Some(0x104),
            }
        );
    }

    #[test]
    fn test_jmpix_scale_selection() {
        for (idx2, scale) in [(0u32, 16u8), (1, 24), (2, 32), (3, 40)] {
            let blk = decode_sup(encode_jmpix32(6, idx2), 0, CpuModel::Ck810);
            assert_eq!(blk.term, Terminator::IndirectTable { rx: 6, scale });
        }
    }

    #[test]
    fn test_system_ops() {
        let blk = decode_sup(encode_sys32(0, 0), 0, CpuModel::Ck810);
        assert_eq!(blk.term, Terminator::Rte { fast: false });
        let blk = decode_sup(encode_sys32(1, 0), 0, CpuModel::Ck810);
        assert_eq!(blk.term, Terminator::Rte { fast: true });
        let blk = decode_sup(encode_sys32(3, 0), 0x40, CpuModel::Ck810);
        assert_eq!(
            blk.term,
            Terminator::Wait {
                kind: WaitKind::Wait,
                next: 0x44,
            }
        );
        let blk = decode_sup(encode_sys32(6, 2), 0, CpuModel::Ck810);
        assert_eq!(
            blk.term,
            Terminator::Exception {
                vec: excp::TRAP2,
            }
        );
    }

    #[test]
    fn test_privileged_ops_in_user_mode() {
        let feats = CpuModel::Ck810.features();
        for raw in [
            encode_sys32(0, 0),
            encode_sys32(2, 0),
            encode_mfcr32(1, 0, 0),
            encode_mtcr32(1, 0, 0),
            encode_psrset32(0xc),
        ] {
            let blk = decode_with(raw, 0, feats, false);
            assert_eq!(
                blk.term,
                Terminator::Exception { vec: excp::PRIV },
                "raw {raw:#010x} should fault in user mode"
            );
        }
        // trap 在用户态可用
        let blk = decode_with(encode_sys32(6, 0), 0, feats, false);
        assert_eq!(blk.term, Terminator::Exception { vec: excp::TRAP0 });
    }

    #[test]
    fn test_sce_idly_end_block() {
        let blk = decode_sup(encode_sys32(7, 0b1010), 0x10, CpuModel::Ck810);
        assert_eq!(blk.ops, vec![IROp::Sce { mask: 0b1010 }]);
        assert_eq!(blk.term, Terminator::Sync { next: 0x14 });
        let blk = decode_sup(encode_sys32(8, 4), 0x10, CpuModel::Ck810);
        assert_eq!(blk.ops, vec![IROp::Idly { n: 4 }]);
        assert_eq!(blk.term, Terminator::Sync { next: 0x14 });
    }

    #[test]
    fn test_creg_access() {
        let blk = decode_sup(encode_mfcr32(3, 15, 4), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::Mfcr {
                rz: 3,
                sel: 15,
                idx: 4,
            }]
        );
        assert_eq!(blk.term, Terminator::Fallthrough { next: 4 });
        let blk = decode_sup(encode_mtcr32(3, 15, 4), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::Mtcr {
                rx: 3,
                sel: 15,
                idx: 4,
            }]
        );
        assert_eq!(blk.term, Terminator::Sync { next: 4 });
    }

    #[test]
    fn test_psrset_bit_mapping() {
        let blk = decode_sup(encode_psrset32(0b01100), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::PsrSet {
                bits: PSR_IE | PSR_EE,
            }]
        );
        let blk = decode_sup(encode_psrclr32(0b00010), 0, CpuModel::Ck810);
        assert_eq!(blk.ops, vec![IROp::PsrClr { bits: PSR_FE }]);
    }

    #[test]
    fn test_dsp_gates() {
        let sat = encode_dsp32(0, 1, 2, 3, 0);
        let blk = decode_sup(sat, 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::AddSat32 {
                rz: 3,
                rx: 1,
                ry: 2,
                signed: true,
            }]
        );
        // CK860 无基础 DSP 组
        let blk = decode_sup(sat, 0, CpuModel::Ck860);
        assert_eq!(blk.term, Terminator::Exception { vec: excp::ILLEGAL });
        // CK610 有 DSP 但无增强组
        let wide = encode_dsp32(38, 1, 2, 4, 0);
        let blk = decode_sup(wide, 0, CpuModel::Ck610);
        assert_eq!(blk.term, Terminator::Exception { vec: excp::ILLEGAL });
        let blk = decode_sup(wide, 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::MulWide {
                rz: 4,
                rx: 1,
                ry: 2,
                signed: true,
            }]
        );
    }

    #[test]
    fn test_dsp_packed_layout() {
        let blk = decode_sup(encode_dsp32(12, 1, 2, 3, 0), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::PkAdd {
                rz: 3,
                rx: 1,
                ry: 2,
                lane: Lane::H2,
                sat: Sat::Signed,
            }]
        );
        let blk = decode_sup(encode_dsp32(16, 1, 2, 3, 0), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::PkSub {
                rz: 3,
                rx: 1,
                ry: 2,
                lane: Lane::B4,
                sat: Sat::Unsigned,
            }]
        );
    }

    #[test]
    fn test_hilo_moves() {
        let blk = decode_sup(encode_dsp32(52, 0, 0, 9, 0), 0, CpuModel::Ck810);
        assert_eq!(blk.ops, vec![IROp::MvFromHi { rz: 9 }]);
        let blk = decode_sup(encode_dsp32(56, 9, 0, 0, 0), 0, CpuModel::Ck810);
        assert_eq!(blk.ops, vec![IROp::MvToHi { rx: 9 }]);
    }

    #[test]
    fn test_fpu_arith_and_gates() {
        let fadd = encode_fpu32(0, 1, 2, 3, false);
        let blk = decode_sup(fadd, 0, CpuModel::Ck807);
        assert_eq!(
            blk.ops,
            vec![IROp::FArith {
                op: FpOp::Add,
                vz: 3,
                vx: 1,
                vy: 2,
                dword: false,
            }]
        );
        // CK803 无浮点
        let blk = decode_sup(fadd, 0, CpuModel::Ck803);
        assert_eq!(blk.term, Terminator::Exception { vec: excp::ILLEGAL });
        // 仅单精度的特性组合下，双字形式非法
        let blk = decode_with(
            encode_fpu32(0, 1, 2, 3, true),
            0,
            Features::empty().with(Features::FPU),
            true,
        );
        assert_eq!(blk.term, Terminator::Exception { vec: excp::ILLEGAL });
    }

    #[test]
    fn test_fpu_zero_compare() {
        let blk = decode_sup(encode_fpu32(16, 4, 0, 0, false), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::FCmpOp {
                cond: FpCmp::Lt,
                vx: 4,
                vy: 255,
                dword: false,
            }]
        );
    }

    #[test]
    fn test_fmac_variants() {
        for (sub, negate, isub) in [(18u32, false, false), (19, false, true), (20, true, false), (21, true, true)] {
            let blk = decode_sup(encode_fpu32(sub, 1, 2, 3, false), 0, CpuModel::Ck810);
            assert_eq!(
                blk.ops,
                vec![IROp::FMac {
                    vz: 3,
                    vx: 1,
                    vy: 2,
                    dword: false,
                    negate,
                    sub: isub,
                }]
            );
        }
    }

    #[test]
    fn test_fcvt_dp_gate() {
        let s2si = encode_fpu32(24, 1, 0, 2, false);
        let blk = decode_with(s2si, 0, Features::empty().with(Features::FPU), true);
        assert_eq!(
            blk.ops,
            vec![IROp::FCvt {
                kind: FcvtKind::S2Si,
                vz: 2,
                vx: 1,
            }]
        );
        // 单转双需要双精度特性
        let s2d = encode_fpu32(22, 1, 0, 2, false);
        let blk = decode_with(s2d, 0, Features::empty().with(Features::FPU), true);
        assert_eq!(blk.term, Terminator::Exception { vec: excp::ILLEGAL });
        let blk = decode_sup(s2d, 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::FCvt {
                kind: FcvtKind::S2D,
                vz: 2,
                vx: 1,
            }]
        );
    }

    #[test]
    fn test_fp_load_store_scaling() {
        let blk = decode_sup(encode_fls32(0, 2, 3, 4), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::FLoad {
                vz: 2,
                rx: 3,
                disp: 16,
                dword: false,
            }]
        );
        let blk = decode_sup(encode_fls32(3, 2, 3, 4), 0, CpuModel::Ck810);
        assert_eq!(
            blk.ops,
            vec![IROp::FStore {
                vz: 2,
                rx: 3,
                disp: 32,
                dword: true,
            }]
        );
    }

    #[test]
    fn test_vector_ops_and_gate() {
        let vadd = encode_vop32(4, 1, 2, 3, 0);
        let blk = decode_sup(vadd, 0, CpuModel::Ck860);
        assert_eq!(
            blk.ops,
            vec![IROp::VAdd {
                vq_z: 3,
                vq_x: 1,
                vq_y: 2,
                lane: VLane::H8,
                sat: Sat::Signed,
            }]
        );
        let blk = decode_sup(vadd, 0, CpuModel::Ck810);
        assert_eq!(blk.term, Terminator::Exception { vec: excp::ILLEGAL });
        let blk = decode_sup(encode_vop32(25, 1, 0, 3, 7), 0, CpuModel::Ck860);
        assert_eq!(
            blk.ops,
            vec![IROp::VShrImm {
                vq_z: 3,
                vq_x: 1,
                lane: VLane::B16,
                imm: 7,
                signed: false,
            }]
        );
        let blk = decode_sup(encode_fls32(8, 2, 3, 1), 0, CpuModel::Ck860);
        assert_eq!(
            blk.ops,
            vec![IROp::VLoad {
                vq: 2,
                rx: 3,
                disp: 16,
            }]
        );
    }

    #[test]
    fn test_reserved_major_is_illegal() {
        let blk = decode_sup(0xfc00_0000, 0, CpuModel::Ck810);
        assert_eq!(blk.term, Terminator::Exception { vec: excp::ILLEGAL });
        let blk = decode_sup(encode_alu32(63, 0, 0, 0, 0), 0, CpuModel::Ck810);
        assert_eq!(blk.term, Terminator::Exception { vec: excp::ILLEGAL });
        let blk = decode_sup(encode_sys32(20, 0), 0, CpuModel::Ck810);
        assert_eq!(blk.term, Terminator::Exception { vec: excp::ILLEGAL });
    }
}
