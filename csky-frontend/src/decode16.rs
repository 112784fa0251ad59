//! 16 位压缩指令解码。
//!
//! 编码族按 [15:11] 分组：跳转/测试单操作数组与压栈在 0x0000 段，
//! 无条件与条件转移占 0x1000-0x27FF，立即数算术占 0x2800-0x3FFF，
//! 寄存器算术占 0x4000 段，比较与移位立即数在 0x6000 段，常量池
//! 装载在 0x7000 段，装载/存储各占 0x8000/0xA000 段。所有未分配
//! 的编码落到非法指令。

use csky_core::exception::excp;
use csky_ir::{BlockBuilder, BrCond, IROp, MemKind, Terminator};

fn illegal(b: &mut BlockBuilder) {
    b.set_term(Terminator::Exception { vec: excp::ILLEGAL });
}

fn sext11(x: u16) -> i32 {
    (((x & 0x7ff) as i32) << 21) >> 21
}

/// 解码一条 16 位指令，语义动作推入 `b`。调用前须已 `begin_insn`。
pub fn decode16(b: &mut BlockBuilder, hw: u16, pc: u32) {
    let next = pc.wrapping_add(2);
    match hw >> 11 {
        // 0x0000-0x07FF：单操作数组 + push16
        0b00000 => {
            if hw == 0 {
                b.set_term(Terminator::Exception { vec: excp::BKPT });
                return;
            }
            if hw & 0xfc00 == 0x0400 {
                b.push(IROp::Push {
                    cnt1: (hw & 0xf) as u8,
                    r15: hw & 0x10 != 0,
                    cnt2: 0,
                });
                return;
            }
            let r = (hw & 0x1f) as u8;
            match hw & 0xffe0 {
                0x0020 => b.set_term(Terminator::IndirectJmp { rx: r, link: None }),
                0x0040 => b.set_term(Terminator::IndirectJmp {
                    rx: r,
                    link: Some(next),
                }),
                0x0060 => b.push(IROp::Tstnbz { rx: r }),
                0x0080 => b.push(IROp::MvCv { rz: r }),
                // 原地字节序反转
                0x00a0 => b.push(IROp::Revb { rz: r, rx: r }),
                _ => illegal(b),
            }
        }
        // 0x0800-0x0FFF：pop16
        0b00001 => {
            if hw & 0xfc00 == 0x0800 {
                let r15 = hw & 0x10 != 0;
                b.push(IROp::Pop {
                    cnt1: (hw & 0xf) as u8,
                    r15,
                    cnt2: 0,
                });
                // 列表含 r15 时弹出即返回
                if r15 {
                    b.set_term(Terminator::IndirectJmp { rx: 15, link: None });
                }
            } else {
                illegal(b);
            }
        }
        0b00010 => {
            let target = pc.wrapping_add_signed(sext11(hw) << 1);
            b.set_term(Terminator::Branch { target });
        }
        0b00011 => {
            let target = pc.wrapping_add_signed(sext11(hw) << 1);
            b.set_term(Terminator::BranchCond {
                cond: BrCond::CTrue,
                rx: 0,
                target,
                next,
            });
        }
        0b00100 => {
            let target = pc.wrapping_add_signed(sext11(hw) << 1);
            b.set_term(Terminator::BranchCond {
                cond: BrCond::CFalse,
                rx: 0,
                target,
                next,
            });
        }
        0b00101 => {
            let rz = ((hw >> 8) & 7) as u8;
            b.push(IROp::MovImm {
                rz,
                imm: (hw & 0xff) as u32,
            });
        }
        0b00110 => {
            let rz = ((hw >> 8) & 7) as u8;
            b.push(IROp::AddImm {
                rz,
                rx: rz,
                imm: (hw & 0xff) as u32,
            });
        }
        0b00111 => {
            let rz = ((hw >> 8) & 7) as u8;
            b.push(IROp::SubImm {
                rz,
                rx: rz,
                imm: (hw & 0xff) as u32,
            });
        }
        // 0x4000-0x5FFF：双寄存器算术，目的寄存器原地更新
        0b01000..=0b01011 => {
            let rz = ((hw >> 5) & 0x1f) as u8;
            let ry = (hw & 0x1f) as u8;
            match (hw >> 10) & 7 {
                0 => b.push(IROp::Add { rz, rx: rz, ry }),
                1 => b.push(IROp::Sub { rz, rx: rz, ry }),
                2 => b.push(IROp::And { rz, rx: rz, ry }),
                3 => b.push(IROp::Or { rz, rx: rz, ry }),
                4 => b.push(IROp::Xor { rz, rx: rz, ry }),
                5 => b.push(IROp::Mov { rz, rx: ry }),
                6 => b.push(IROp::Lsl { rz, rx: rz, ry }),
                _ => b.push(IROp::Lsr { rz, rx: rz, ry }),
            }
        }
        // 0x6000-0x67FF：比较（4 位寄存器号）
        0b01100 => {
            let rx = ((hw >> 4) & 0xf) as u8;
            let ry = (hw & 0xf) as u8;
            match (hw >> 8) & 7 {
                0 => b.push(IROp::CmpHs { rx, ry }),
                1 => b.push(IROp::CmpLt { rx, ry }),
                2 => b.push(IROp::CmpNe { rx, ry }),
                3 => b.push(IROp::Tst { rx, ry }),
                _ => illegal(b),
            }
        }
        // 0x6800-0x6FFF：移位立即数（4 位寄存器号，原地）
        0b01101 => {
            let rz = ((hw >> 5) & 0xf) as u8;
            let imm = (hw & 0x1f) as u8;
            match (hw >> 9) & 3 {
                0 => b.push(IROp::LslImm { rz, rx: rz, imm }),
                1 => b.push(IROp::LsrImm { rz, rx: rz, imm }),
                2 => b.push(IROp::AsrImm { rz, rx: rz, imm }),
                _ => illegal(b),
            }
        }
        // 0x7000-0x7FFF：常量池装载，地址解码期算定
        0b01110 | 0b01111 => {
            let rz = ((hw >> 8) & 0xf) as u8;
            let addr = (next & !3).wrapping_add(((hw & 0xff) as u32) << 2);
            b.push(IROp::LoadAbs { rz, addr });
        }
        // 0x8000-0xBFFF：装载/存储，位移按访问宽度缩放
        0b10000..=0b10111 => {
            let sz = (hw >> 11) & 3;
            let kind = match sz {
                0 => MemKind::B,
                1 => MemKind::H,
                2 => MemKind::W,
                _ => {
                    illegal(b);
                    return;
                }
            };
            let rz = ((hw >> 8) & 7) as u8;
            let rx = ((hw >> 5) & 7) as u8;
            let disp = ((hw & 0x1f) as u32) << sz;
            if hw & 0x2000 == 0 {
                b.push(IROp::Load {
                    rz,
                    rx,
                    disp,
                    kind,
                    guarded: false,
                });
            } else {
                b.push(IROp::Store {
                    rz,
                    rx,
                    disp,
                    kind,
                    guarded: false,
                });
            }
        }
        _ => illegal(b),
    }
}

// ----------------------------------------------------------------------
// 编码辅助
// ----------------------------------------------------------------------

fn clamp_disp11(mut disp: i32) -> u16 {
    disp &= !1;
    let min = -(1 << 11);
    let max = (1 << 11) - 2;
    if disp < min {
        disp = min;
    }
    if disp > max {
        disp = max;
    }
    ((disp >> 1) as u16) & 0x7ff
}

pub fn encode_bkpt16() -> u16 {
    0x0000
}

pub fn encode_jmp16(rx: u8) -> u16 {
    0x0020 | (rx as u16 & 0x1f)
}

pub fn encode_jsr16(rx: u8) -> u16 {
    0x0040 | (rx as u16 & 0x1f)
}

pub fn encode_push16(cnt1: u8, r15: bool) -> u16 {
    0x0400 | ((r15 as u16) << 4) | (cnt1 as u16 & 0xf)
}

pub fn encode_pop16(cnt1: u8, r15: bool) -> u16 {
    0x0800 | ((r15 as u16) << 4) | (cnt1 as u16 & 0xf)
}

pub fn encode_br16(disp: i32) -> u16 {
    0x1000 | clamp_disp11(disp)
}

pub fn encode_bt16(disp: i32) -> u16 {
    0x1800 | clamp_disp11(disp)
}

pub fn encode_bf16(disp: i32) -> u16 {
    0x2000 | clamp_disp11(disp)
}

pub fn encode_movi16(rz: u8, imm: u8) -> u16 {
    0x2800 | ((rz as u16 & 7) << 8) | imm as u16
}

/// op: 0 addu / 1 subu / 2 and / 3 or / 4 xor / 5 mov / 6 lsl / 7 lsr
pub fn encode_alu16(op: u8, rz: u8, ry: u8) -> u16 {
    0x4000 | ((op as u16 & 7) << 10) | ((rz as u16 & 0x1f) << 5) | (ry as u16 & 0x1f)
}

/// sub: 0 cmphs / 1 cmplt / 2 cmpne / 3 tst
pub fn encode_cmp16(sub: u8, rx: u8, ry: u8) -> u16 {
    0x6000 | ((sub as u16 & 7) << 8) | ((rx as u16 & 0xf) << 4) | (ry as u16 & 0xf)
}

/// sub: 0 lsli / 1 lsri / 2 asri
pub fn encode_shift16(sub: u8, rz: u8, imm5: u8) -> u16 {
    0x6800 | ((sub as u16 & 3) << 9) | ((rz as u16 & 0xf) << 5) | (imm5 as u16 & 0x1f)
}

pub fn encode_lrw16(rz: u8, disp8: u8) -> u16 {
    0x7000 | ((rz as u16 & 0xf) << 8) | disp8 as u16
}

/// sz: 0 字节 / 1 半字 / 2 字；disp 为未缩放的槽号
pub fn encode_ld16(sz: u8, rz: u8, rx: u8, disp5: u8) -> u16 {
    0x8000
        | ((sz as u16 & 3) << 11)
        | ((rz as u16 & 7) << 8)
        | ((rx as u16 & 7) << 5)
        | (disp5 as u16 & 0x1f)
}

pub fn encode_st16(sz: u8, rz: u8, rx: u8, disp5: u8) -> u16 {
    encode_ld16(sz, rz, rx, disp5) | 0x2000
}
