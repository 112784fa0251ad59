//! 区域式内存保护(MGU)。
//!
//! 八个 2 的幂对齐区域,PACR 描述基址/尺寸/使能,CAPR 给出每区域的
//! 2 位访问许可。重叠时编号大的区域优先。

use crate::regs::MSA_EN;

/// 一次访问在匹配区域下的读写许可。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MguPerms {
    pub r: bool,
    pub w: bool,
}

/// AP 两位按特权级展开:
/// 00 全拒绝;01 仅超级用户读写;10 超级用户读写、用户只读;11 都可读写。
pub fn ap_perms(ap: u32, sup: bool) -> MguPerms {
    match ap & 0x3 {
        0 => MguPerms { r: false, w: false },
        1 => MguPerms { r: sup, w: sup },
        2 => MguPerms { r: true, w: sup },
        _ => MguPerms { r: true, w: true },
    }
}

/// 区域描述字:bit0 使能,[5:1] 尺寸编码(区域字节数 2^(code+1),
/// 编码 < 11 即小于 4K,按未使能处理),[31:12] 基址(按尺寸对齐)。
fn region_contains(pacr: u32, va: u32) -> bool {
    if pacr & MSA_EN == 0 {
        return false;
    }
    let code = (pacr >> 1) & 0x1f;
    if code < 11 {
        return false;
    }
    let size = 1u64 << (code + 1);
    let base = (pacr & 0xffff_f000) as u64 & !(size - 1);
    (va as u64) >= base && (va as u64) < base + size
}

/// 找到许可:编号从高到低,首个包含 va 的区域生效;无区域返回 `None`。
pub fn check(capr: u32, pacr: &[u32; 8], va: u32, sup: bool) -> Option<MguPerms> {
    (0..8).rev().find(|&i| region_contains(pacr[i], va)).map(|i| {
        let ap = capr >> (2 * i) & 0x3;
        ap_perms(ap, sup)
    })
}
