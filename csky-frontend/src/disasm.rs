//! 面向执行跟踪的反汇编。
//!
//! 复用两张解码表：按全特性、超级用户环境解码一条指令，再把
//! 语义动作渲染成助记符。未分配的编码渲染成 `.short`/`.long`
//! 数据伪指令，凑不齐第二半字的 32 位指令同样按数据渲染。

use csky_core::Features;
use csky_core::exception::excp;
use csky_core::psr::{PSR_AF, PSR_EE, PSR_FE, PSR_IE, PSR_TP};
use csky_ir::{BlockBuilder, BrCond, FcvtKind, FpCmp, FpOp, FpUnOp, IROp, Lane, MemKind, Sat,
    Terminator, VLane, WaitKind};

use crate::decode16::decode16;
use crate::decode32::decode32;
use crate::insn_len;

fn all_features() -> Features {
    Features::DSP
        | Features::EDSP
        | Features::VDSP
        | Features::FPU
        | Features::FPU_DP
        | Features::DIV
        | Features::ELRW
        | Features::BCTM
}

/// 反汇编一条指令。`hw1` 仅在首半字指示 32 位时被使用。
pub fn disasm(hw0: u16, hw1: Option<u16>, pc: u32) -> String {
    let mut b = BlockBuilder::new(pc);
    let raw;
    if insn_len(hw0) == 2 {
        raw = hw0 as u32;
        b.begin_insn(pc, 2);
        decode16(&mut b, hw0, pc);
    } else {
        let Some(hw1) = hw1 else {
            return format!(".short {hw0:#06x}");
        };
        raw = ((hw0 as u32) << 16) | hw1 as u32;
        b.begin_insn(pc, 4);
        decode32(&mut b, raw, pc, all_features(), true);
    }
    let blk = b.build();
    if let Some(op) = blk.ops.first() {
        return render_op(op);
    }
    render_term(&blk.term, raw)
}

fn mem_suffix(kind: MemKind) -> &'static str {
    match kind {
        MemKind::B => "b",
        MemKind::Bs => "bs",
        MemKind::H => "h",
        MemKind::Hs => "hs",
        MemKind::W => "w",
        MemKind::D => "d",
    }
}

fn lane_suffix(lane: Lane) -> &'static str {
    match lane {
        Lane::B4 => "8",
        Lane::H2 => "16",
    }
}

fn vlane_suffix(lane: VLane) -> &'static str {
    match lane {
        VLane::B16 => "8",
        VLane::H8 => "16",
        VLane::W4 => "32",
    }
}

fn sat_suffix(sat: Sat) -> &'static str {
    match sat {
        Sat::None => "",
        Sat::Signed => ".s",
        Sat::Unsigned => ".u",
    }
}

fn su(signed: bool) -> &'static str {
    if signed { "s" } else { "u" }
}

fn fp_suffix(dword: bool) -> &'static str {
    if dword { "d" } else { "s" }
}

fn psr_bit_names(bits: u32) -> String {
    let mut names = Vec::new();
    for (bit, name) in [
        (PSR_AF, "af"),
        (PSR_FE, "fe"),
        (PSR_IE, "ie"),
        (PSR_EE, "ee"),
        (PSR_TP, "tp"),
    ] {
        if bits & bit != 0 {
            names.push(name);
        }
    }
    names.join(", ")
}

fn reg_range(first: u8, count: u8) -> String {
    if count <= 1 {
        format!("r{first}")
    } else {
        format!("r{first}-r{}", first as u32 + count as u32 - 1)
    }
}

fn render_push(mnem: &str, cnt1: u8, r15: bool, cnt2: u8) -> String {
    let mut parts = Vec::new();
    if cnt1 > 0 {
        parts.push(reg_range(4, cnt1));
    }
    if r15 {
        parts.push("r15".to_string());
    }
    if cnt2 > 0 {
        parts.push(reg_range(16, cnt2));
    }
    if parts.is_empty() {
        mnem.to_string()
    } else {
        format!("{mnem} {}", parts.join(", "))
    }
}

fn render_op(op: &IROp) -> String {
    match *op {
        IROp::MovImm { rz, imm } => format!("movi r{rz}, {imm}"),
        IROp::Mov { rz, rx } => format!("mov r{rz}, r{rx}"),
        IROp::Movih { rz, imm } => format!("movih r{rz}, {imm:#x}"),
        IROp::MvC { rz } => format!("mvc r{rz}"),
        IROp::MvCv { rz } => format!("mvcv r{rz}"),
        IROp::MovT { rz, rx } => format!("movt r{rz}, r{rx}"),
        IROp::MovF { rz, rx } => format!("movf r{rz}, r{rx}"),
        IROp::Clrt { rz } => format!("clrt r{rz}"),
        IROp::Clrf { rz } => format!("clrf r{rz}"),
        IROp::IncT { rz, rx, imm } => format!("inct r{rz}, r{rx}, {imm}"),
        IROp::IncF { rz, rx, imm } => format!("incf r{rz}, r{rx}, {imm}"),
        IROp::DecT { rz, rx, imm } => format!("dect r{rz}, r{rx}, {imm}"),
        IROp::DecF { rz, rx, imm } => format!("decf r{rz}, r{rx}, {imm}"),
        IROp::DecGt { rz, rx, imm } => format!("decgt r{rz}, r{rx}, {imm}"),
        IROp::DecLt { rz, rx, imm } => format!("declt r{rz}, r{rx}, {imm}"),
        IROp::DecNe { rz, rx, imm } => format!("decne r{rz}, r{rx}, {imm}"),
        IROp::Add { rz, rx, ry } => format!("addu r{rz}, r{rx}, r{ry}"),
        IROp::Sub { rz, rx, ry } => format!("subu r{rz}, r{rx}, r{ry}"),
        IROp::Rsub { rz, rx, ry } => format!("rsub r{rz}, r{rx}, r{ry}"),
        IROp::Addc { rz, rx, ry } => format!("addc r{rz}, r{rx}, r{ry}"),
        IROp::Subc { rz, rx, ry } => format!("subc r{rz}, r{rx}, r{ry}"),
        IROp::And { rz, rx, ry } => format!("and r{rz}, r{rx}, r{ry}"),
        IROp::Andn { rz, rx, ry } => format!("andn r{rz}, r{rx}, r{ry}"),
        IROp::Or { rz, rx, ry } => format!("or r{rz}, r{rx}, r{ry}"),
        IROp::Xor { rz, rx, ry } => format!("xor r{rz}, r{rx}, r{ry}"),
        IROp::Nor { rz, rx, ry } => format!("nor r{rz}, r{rx}, r{ry}"),
        IROp::Ixh { rz, rx, ry } => format!("ixh r{rz}, r{rx}, r{ry}"),
        IROp::Ixw { rz, rx, ry } => format!("ixw r{rz}, r{rx}, r{ry}"),
        IROp::Ixd { rz, rx, ry } => format!("ixd r{rz}, r{rx}, r{ry}"),
        IROp::AddImm { rz, rx, imm } => format!("addi r{rz}, r{rx}, {imm}"),
        IROp::SubImm { rz, rx, imm } => format!("subi r{rz}, r{rx}, {imm}"),
        IROp::RsubImm { rz, rx, imm } => format!("rsubi r{rz}, r{rx}, {imm}"),
        IROp::AndImm { rz, rx, imm } => format!("andi r{rz}, r{rx}, {imm}"),
        IROp::AndnImm { rz, rx, imm } => format!("andni r{rz}, r{rx}, {imm}"),
        IROp::OrImm { rz, rx, imm } => format!("ori r{rz}, r{rx}, {imm:#x}"),
        IROp::XorImm { rz, rx, imm } => format!("xori r{rz}, r{rx}, {imm:#x}"),
        IROp::Abs { rz, rx } => format!("abs r{rz}, r{rx}"),
        IROp::Lsl { rz, rx, ry } => format!("lsl r{rz}, r{rx}, r{ry}"),
        IROp::Lsr { rz, rx, ry } => format!("lsr r{rz}, r{rx}, r{ry}"),
        IROp::Asr { rz, rx, ry } => format!("asr r{rz}, r{rx}, r{ry}"),
        IROp::Rotl { rz, rx, ry } => format!("rotl r{rz}, r{rx}, r{ry}"),
        IROp::LslImm { rz, rx, imm } => format!("lsli r{rz}, r{rx}, {imm}"),
        IROp::LsrImm { rz, rx, imm } => format!("lsri r{rz}, r{rx}, {imm}"),
        IROp::AsrImm { rz, rx, imm } => format!("asri r{rz}, r{rx}, {imm}"),
        IROp::RotlImm { rz, rx, imm } => format!("rotli r{rz}, r{rx}, {imm}"),
        IROp::LslC { rz, rx, imm } => format!("lslc r{rz}, r{rx}, {imm}"),
        IROp::LsrC { rz, rx, imm } => format!("lsrc r{rz}, r{rx}, {imm}"),
        IROp::AsrC { rz, rx, imm } => format!("asrc r{rz}, r{rx}, {imm}"),
        IROp::Xsr { rz, rx, imm } => format!("xsr r{rz}, r{rx}, {imm}"),
        IROp::CmpHs { rx, ry } => format!("cmphs r{rx}, r{ry}"),
        IROp::CmpLt { rx, ry } => format!("cmplt r{rx}, r{ry}"),
        IROp::CmpNe { rx, ry } => format!("cmpne r{rx}, r{ry}"),
        IROp::CmpHsImm { rx, imm } => format!("cmphsi r{rx}, {imm}"),
        IROp::CmpLtImm { rx, imm } => format!("cmplti r{rx}, {imm}"),
        IROp::CmpNeImm { rx, imm } => format!("cmpnei r{rx}, {imm}"),
        IROp::Tst { rx, ry } => format!("tst r{rx}, r{ry}"),
        IROp::Tstnbz { rx } => format!("tstnbz r{rx}"),
        IROp::Bclri { rz, rx, imm } => format!("bclri r{rz}, r{rx}, {imm}"),
        IROp::Bseti { rz, rx, imm } => format!("bseti r{rz}, r{rx}, {imm}"),
        IROp::Btsti { rx, imm } => format!("btsti r{rx}, {imm}"),
        IROp::Bmaski { rz, imm } => format!("bmaski r{rz}, {imm}"),
        IROp::Bgenr { rz, rx } => format!("bgenr r{rz}, r{rx}"),
        IROp::Ff0 { rz, rx } => format!("ff0 r{rz}, r{rx}"),
        IROp::Ff1 { rz, rx } => format!("ff1 r{rz}, r{rx}"),
        IROp::Revb { rz, rx } => format!("revb r{rz}, r{rx}"),
        IROp::Revh { rz, rx } => format!("revh r{rz}, r{rx}"),
        IROp::Brev { rz, rx } => format!("brev r{rz}, r{rx}"),
        IROp::Xtrb { rz, rx, n } => format!("xtrb{n} r{rz}, r{rx}"),
        IROp::Sext { rz, rx, lsb, msb } => format!("sext r{rz}, r{rx}, {msb}, {lsb}"),
        IROp::Zext { rz, rx, lsb, msb } => format!("zext r{rz}, r{rx}, {msb}, {lsb}"),
        IROp::Ins { rz, rx, msb, lsb } => format!("ins r{rz}, r{rx}, {msb}, {lsb}"),
        IROp::Mult { rz, rx, ry } => format!("mult r{rz}, r{rx}, r{ry}"),
        IROp::DivU { rz, rx, ry } => format!("divu r{rz}, r{rx}, r{ry}"),
        IROp::DivS { rz, rx, ry } => format!("divs r{rz}, r{rx}, r{ry}"),
        IROp::AddSat32 { rz, rx, ry, signed } => {
            format!("add.{}32 r{rz}, r{rx}, r{ry}", su(signed))
        }
        IROp::SubSat32 { rz, rx, ry, signed } => {
            format!("sub.{}32 r{rz}, r{rx}, r{ry}", su(signed))
        }
        IROp::AddSat64 { rz, rx, ry, signed } => {
            format!("add.{}64 r{rz}, r{rx}, r{ry}", su(signed))
        }
        IROp::SubSat64 { rz, rx, ry, signed } => {
            format!("sub.{}64 r{rz}, r{rx}, r{ry}", su(signed))
        }
        IROp::PkAdd { rz, rx, ry, lane, sat } => format!(
            "padd.{}{} r{rz}, r{rx}, r{ry}",
            lane_suffix(lane),
            sat_suffix(sat)
        ),
        IROp::PkSub { rz, rx, ry, lane, sat } => format!(
            "psub.{}{} r{rz}, r{rx}, r{ry}",
            lane_suffix(lane),
            sat_suffix(sat)
        ),
        IROp::PkAbs { rz, rx, lane } => format!("pabs.{} r{rz}, r{rx}", lane_suffix(lane)),
        IROp::PkMin { rz, rx, ry, lane, signed } => format!(
            "pmin.{}{} r{rz}, r{rx}, r{ry}",
            su(signed),
            lane_suffix(lane)
        ),
        IROp::PkMax { rz, rx, ry, lane, signed } => format!(
            "pmax.{}{} r{rz}, r{rx}, r{ry}",
            su(signed),
            lane_suffix(lane)
        ),
        IROp::PkCmpEq { rz, rx, ry, lane } => {
            format!("pcmpeq.{} r{rz}, r{rx}, r{ry}", lane_suffix(lane))
        }
        IROp::Clip { rz, rx, bits, signed } => {
            format!("clip{} r{rz}, r{rx}, {bits}", su(signed))
        }
        IROp::RoundShr { rz, rx, imm, signed } => {
            format!("rshri.{} r{rz}, r{rx}, {imm}", su(signed))
        }
        IROp::SatShl { rz, rx, imm, signed } => {
            format!("sshli.{} r{rz}, r{rx}, {imm}", su(signed))
        }
        IROp::MulWide { rz, rx, ry, signed } => {
            format!("mul.{}32 r{rz}, r{rx}, r{ry}", su(signed))
        }
        IROp::MulAcc { rz, rx, ry, signed, sub } => format!(
            "mul{}.{}32 r{rz}, r{rx}, r{ry}",
            if sub { "s" } else { "a" },
            su(signed)
        ),
        IROp::MulAccV { rz, rx, ry, sub } => format!(
            "mul{}v r{rz}, r{rx}, r{ry}",
            if sub { "s" } else { "a" }
        ),
        IROp::MultHiLo { rx, ry, signed } => format!("mult.{}.hilo r{rx}, r{ry}", su(signed)),
        IROp::MacHiLo { rx, ry, signed, sub } => format!(
            "{}.{}.hilo r{rx}, r{ry}",
            if sub { "msu" } else { "mac" },
            su(signed)
        ),
        IROp::MvFromHi { rz } => format!("mfhi r{rz}"),
        IROp::MvFromLo { rz } => format!("mflo r{rz}"),
        IROp::MvFromHiS { rz } => format!("mfhis r{rz}"),
        IROp::MvFromLoS { rz } => format!("mflos r{rz}"),
        IROp::MvToHi { rx } => format!("mthi r{rx}"),
        IROp::MvToLo { rx } => format!("mtlo r{rx}"),
        IROp::CFromV => "mvtc".to_string(),
        IROp::FArith { op, vz, vx, vy, dword } => {
            let m = match op {
                FpOp::Add => "fadd",
                FpOp::Sub => "fsub",
                FpOp::Mul => "fmul",
                FpOp::Div => "fdiv",
                FpOp::Min => "fmin",
                FpOp::Max => "fmax",
            };
            format!("{m}{} vr{vz}, vr{vx}, vr{vy}", fp_suffix(dword))
        }
        IROp::FUnary { op, vz, vx, dword } => {
            let m = match op {
                FpUnOp::Neg => "fneg",
                FpUnOp::Abs => "fabs",
                FpUnOp::Sqrt => "fsqrt",
                FpUnOp::Mov => "fmov",
            };
            format!("{m}{} vr{vz}, vr{vx}", fp_suffix(dword))
        }
        IROp::FCmpOp { cond, vx, vy, dword } => {
            let m = match cond {
                FpCmp::Ne => "ne",
                FpCmp::Hs => "hs",
                FpCmp::Lt => "lt",
                FpCmp::Uo => "uo",
            };
            if vy == 255 {
                format!("fcmpz{m}{} vr{vx}", fp_suffix(dword))
            } else {
                format!("fcmp{m}{} vr{vx}, vr{vy}", fp_suffix(dword))
            }
        }
        IROp::FMac { vz, vx, vy, dword, negate, sub } => {
            let m = match (negate, sub) {
                (false, false) => "fmac",
                (false, true) => "fmsc",
                (true, false) => "fnmac",
                (true, true) => "fnmsc",
            };
            format!("{m}{} vr{vz}, vr{vx}, vr{vy}", fp_suffix(dword))
        }
        IROp::FCvt { kind, vz, vx } => {
            let m = match kind {
                FcvtKind::S2D => "fstod",
                FcvtKind::D2S => "fdtos",
                FcvtKind::S2Si => "fstosi",
                FcvtKind::S2Ui => "fstoui",
                FcvtKind::D2Si => "fdtosi",
                FcvtKind::D2Ui => "fdtoui",
                FcvtKind::Si2S => "fsitos",
                FcvtKind::Ui2S => "fuitos",
                FcvtKind::Si2D => "fsitod",
                FcvtKind::Ui2D => "fuitod",
            };
            format!("{m} vr{vz}, vr{vx}")
        }
        IROp::FMovToFpu { vz, rx, high } => {
            format!("fmtvr.{} vr{vz}, r{rx}", if high { "h" } else { "l" })
        }
        IROp::FMovToGpr { rz, vx, high } => {
            format!("fmfvr.{} r{rz}, vr{vx}", if high { "h" } else { "l" })
        }
        IROp::FLoad { vz, rx, disp, dword } => {
            format!("fld.{} vr{vz}, (r{rx}, {disp})", fp_suffix(dword))
        }
        IROp::FStore { vz, rx, disp, dword } => {
            format!("fst.{} vr{vz}, (r{rx}, {disp})", fp_suffix(dword))
        }
        IROp::FLoadIdx { vz, rx, ry, shift, dword } => format!(
            "fldr.{} vr{vz}, (r{rx}, r{ry} << {shift})",
            fp_suffix(dword)
        ),
        IROp::FStoreIdx { vz, rx, ry, shift, dword } => format!(
            "fstr.{} vr{vz}, (r{rx}, r{ry} << {shift})",
            fp_suffix(dword)
        ),
        IROp::VLoad { vq, rx, disp } => format!("vldq vr{vq}, (r{rx}, {disp})"),
        IROp::VStore { vq, rx, disp } => format!("vstq vr{vq}, (r{rx}, {disp})"),
        IROp::VAdd { vq_z, vq_x, vq_y, lane, sat } => format!(
            "vadd.{}{} vr{vq_z}, vr{vq_x}, vr{vq_y}",
            vlane_suffix(lane),
            sat_suffix(sat)
        ),
        IROp::VSub { vq_z, vq_x, vq_y, lane, sat } => format!(
            "vsub.{}{} vr{vq_z}, vr{vq_x}, vr{vq_y}",
            vlane_suffix(lane),
            sat_suffix(sat)
        ),
        IROp::VAnd { vq_z, vq_x, vq_y } => format!("vand vr{vq_z}, vr{vq_x}, vr{vq_y}"),
        IROp::VOr { vq_z, vq_x, vq_y } => format!("vor vr{vq_z}, vr{vq_x}, vr{vq_y}"),
        IROp::VXor { vq_z, vq_x, vq_y } => format!("vxor vr{vq_z}, vr{vq_x}, vr{vq_y}"),
        IROp::VShlImm { vq_z, vq_x, lane, imm } => {
            format!("vshli.{} vr{vq_z}, vr{vq_x}, {imm}", vlane_suffix(lane))
        }
        IROp::VShrImm { vq_z, vq_x, lane, imm, signed } => format!(
            "vshri.{}{} vr{vq_z}, vr{vq_x}, {imm}",
            su(signed),
            vlane_suffix(lane)
        ),
        IROp::VMov { vq_z, vq_x } => format!("vmov vr{vq_z}, vr{vq_x}"),
        IROp::VDupG { vq_z, rx, lane } => {
            format!("vdup.{} vr{vq_z}, r{rx}", vlane_suffix(lane))
        }
        IROp::VMovToGpr { rz, vq_x, idx } => format!("vmfvr r{rz}, vr{vq_x}[{idx}]"),
        IROp::Load { rz, rx, disp, kind, guarded } => format!(
            "{}ld.{} r{rz}, (r{rx}, {disp})",
            if guarded { "g" } else { "" },
            mem_suffix(kind)
        ),
        IROp::Store { rz, rx, disp, kind, guarded } => format!(
            "{}st.{} r{rz}, (r{rx}, {disp})",
            if guarded { "g" } else { "" },
            mem_suffix(kind)
        ),
        IROp::LoadIdx { rz, rx, ry, shift, kind } => format!(
            "ldr.{} r{rz}, (r{rx}, r{ry} << {shift})",
            mem_suffix(kind)
        ),
        IROp::StoreIdx { rz, rx, ry, shift, kind } => format!(
            "str.{} r{rz}, (r{rx}, r{ry} << {shift})",
            mem_suffix(kind)
        ),
        IROp::LoadAbs { rz, addr } => format!("lrw r{rz}, [{addr:#x}]"),
        IROp::LoadMulti { rf, count, rx } => {
            format!("ldm {}, (r{rx})", reg_range(rf, count))
        }
        IROp::StoreMulti { rf, count, rx } => {
            format!("stm {}, (r{rx})", reg_range(rf, count))
        }
        IROp::Push { cnt1, r15, cnt2 } => render_push("push", cnt1, r15, cnt2),
        IROp::Pop { cnt1, r15, cnt2 } => render_push("pop", cnt1, r15, cnt2),
        IROp::Mfcr { rz, sel, idx } => format!("mfcr r{rz}, cr<{idx}, {sel}>"),
        IROp::Mtcr { rx, sel, idx } => format!("mtcr r{rx}, cr<{idx}, {sel}>"),
        IROp::PsrSet { bits } => format!("psrset {}", psr_bit_names(bits)),
        IROp::PsrClr { bits } => format!("psrclr {}", psr_bit_names(bits)),
        IROp::Idly { n } => format!("idly {n}"),
        IROp::Sce { mask } => format!("sce {mask:#06b}"),
    }
}

fn render_term(term: &Terminator, raw: u32) -> String {
    match *term {
        Terminator::Branch { target } => format!("br {target:#x}"),
        Terminator::BranchCond { cond, rx, target, .. } => match cond {
            BrCond::CTrue => format!("bt {target:#x}"),
            BrCond::CFalse => format!("bf {target:#x}"),
            BrCond::EqZ => format!("bez r{rx}, {target:#x}"),
            BrCond::NeZ => format!("bnez r{rx}, {target:#x}"),
            BrCond::GtZ => format!("bhz r{rx}, {target:#x}"),
            BrCond::LeZ => format!("blsz r{rx}, {target:#x}"),
            BrCond::LtZ => format!("blz r{rx}, {target:#x}"),
            BrCond::GeZ => format!("bhsz r{rx}, {target:#x}"),
        },
        Terminator::BranchLink { target, .. } => format!("bsr {target:#x}"),
        Terminator::IndirectJmp { rx, link: None } => format!("jmp r{rx}"),
        Terminator::IndirectJmp { rx, link: Some(_) } => format!("jsr r{rx}"),
        Terminator::IndirectLoad { addr, link: None } => format!("jmpi [{addr:#x}]"),
        Terminator::IndirectLoad { addr, link: Some(_) } => format!("jsri [{addr:#x}]"),
        Terminator::IndirectTable { rx, scale } => format!("jmpix r{rx}, {scale}"),
        Terminator::Rte { fast: false } => "rte".to_string(),
        Terminator::Rte { fast: true } => "rfi".to_string(),
        Terminator::Wait { kind: WaitKind::Stop, .. } => "stop".to_string(),
        Terminator::Wait { kind: WaitKind::Wait, .. } => "wait".to_string(),
        Terminator::Wait { kind: WaitKind::Doze, .. } => "doze".to_string(),
        Terminator::Sync { .. } => "sync".to_string(),
        Terminator::Exception { vec } if vec == excp::BKPT => "bkpt".to_string(),
        Terminator::Exception { vec } if (excp::TRAP0..=excp::TRAP3).contains(&vec) => {
            format!("trap {}", vec - excp::TRAP0)
        }
        Terminator::Exception { .. } | Terminator::Fallthrough { .. } => {
            if raw <= 0xffff {
                format!(".short {raw:#06x}")
            } else {
                format!(".long {raw:#010x}")
            }
        }
    }
}
