//! csky-dsp - DSP 定点运算辅助库
//!
//! 为执行引擎提供饱和、紧缩（packed）与宽乘累加的纯函数实现。
//!
//! ## 约定
//! - 饱和运算一律箝位到边界值，绝不回绕；返回值里的 bool 表示
//!   是否发生了箝位（调用方把它并入 V 标志）。
//! - 紧缩运算各分道完全独立，分道间不传递进位。
//! - 舍入变体在移位前加半个 ULP。
//! - 宽乘累加按 64 位补码对待寄存器对，低寄存器持低 32 位。

/// 把 64 位中间值箝位到 bits 位有符号范围。
pub fn sat_s(v: i64, bits: u32) -> (i64, bool) {
    let max = (1i64 << (bits - 1)) - 1;
    let min = -(1i64 << (bits - 1));
    if v > max {
        (max, true)
    } else if v < min {
        (min, true)
    } else {
        (v, false)
    }
}

/// 把 64 位中间值箝位到 bits 位无符号范围。
pub fn sat_u(v: i64, bits: u32) -> (i64, bool) {
    let max = if bits >= 64 { i64::MAX } else { (1i64 << bits) - 1 };
    if v > max {
        (max, true)
    } else if v < 0 {
        (0, true)
    } else {
        (v, false)
    }
}

/// 32 位有符号饱和加。
pub fn add_sat_s32(a: u32, b: u32) -> (u32, bool) {
    let (r, ov) = sat_s(a as i32 as i64 + b as i32 as i64, 32);
    (r as u32, ov)
}

/// 32 位有符号饱和减。
pub fn sub_sat_s32(a: u32, b: u32) -> (u32, bool) {
    let (r, ov) = sat_s(a as i32 as i64 - b as i32 as i64, 32);
    (r as u32, ov)
}

/// 32 位无符号饱和加。
pub fn add_sat_u32(a: u32, b: u32) -> (u32, bool) {
    let (r, ov) = sat_u(a as i64 + b as i64, 32);
    (r as u32, ov)
}

/// 32 位无符号饱和减。
pub fn sub_sat_u32(a: u32, b: u32) -> (u32, bool) {
    let (r, ov) = sat_u(a as i64 - b as i64, 32);
    (r as u32, ov)
}

/// 64 位有符号饱和加。
pub fn add_sat_s64(a: u64, b: u64) -> (u64, bool) {
    let r = (a as i64 as i128) + (b as i64 as i128);
    if r > i64::MAX as i128 {
        (i64::MAX as u64, true)
    } else if r < i64::MIN as i128 {
        (i64::MIN as u64, true)
    } else {
        (r as i64 as u64, false)
    }
}

/// 64 位有符号饱和减。
pub fn sub_sat_s64(a: u64, b: u64) -> (u64, bool) {
    let r = (a as i64 as i128) - (b as i64 as i128);
    if r > i64::MAX as i128 {
        (i64::MAX as u64, true)
    } else if r < i64::MIN as i128 {
        (i64::MIN as u64, true)
    } else {
        (r as i64 as u64, false)
    }
}

/// 64 位无符号饱和加。
pub fn add_sat_u64(a: u64, b: u64) -> (u64, bool) {
    match a.checked_add(b) {
        Some(r) => (r, false),
        None => (u64::MAX, true),
    }
}

/// 64 位无符号饱和减。
pub fn sub_sat_u64(a: u64, b: u64) -> (u64, bool) {
    match a.checked_sub(b) {
        Some(r) => (r, false),
        None => (0, true),
    }
}

#[inline]
fn lane_ext_s(v: u32, shift: u32, mask: u32, sign_bit: u32) -> i64 {
    let lv = (v >> shift) & mask;
    if lv & sign_bit != 0 {
        (lv | !mask) as i32 as i64
    } else {
        lv as i64
    }
}

#[inline]
fn lane_ext_u(v: u32, shift: u32, mask: u32) -> i64 {
    ((v >> shift) & mask) as i64
}

/// 对 32 位 packed 值逐分道做二元运算。`lane_bits` 取 8 或 16。
fn pk_binop(a: u32, b: u32, lane_bits: u32, f: impl Fn(i64, i64) -> i64) -> u32 {
    let lanes = 32 / lane_bits;
    let mask = u32_mask(lane_bits);
    let sign_bit = 1u32 << (lane_bits - 1);
    let mut acc = 0u32;
    for i in 0..lanes {
        let shift = i * lane_bits;
        let av = lane_ext_s(a, shift, mask, sign_bit);
        let bv = lane_ext_s(b, shift, mask, sign_bit);
        acc |= ((f(av, bv) as u32) & mask) << shift;
    }
    acc
}

/// 逐分道环绕加。
pub fn pk_add(a: u32, b: u32, lane_bits: u32) -> u32 {
    pk_binop(a, b, lane_bits, |x, y| x.wrapping_add(y))
}

/// 逐分道环绕减。
pub fn pk_sub(a: u32, b: u32, lane_bits: u32) -> u32 {
    pk_binop(a, b, lane_bits, |x, y| x.wrapping_sub(y))
}

/// 逐分道有符号饱和加。
pub fn pk_add_sat_s(a: u32, b: u32, lane_bits: u32) -> (u32, bool) {
    pk_sat_binop_s(a, b, lane_bits, |x, y| x + y)
}

/// 逐分道有符号饱和减。
pub fn pk_sub_sat_s(a: u32, b: u32, lane_bits: u32) -> (u32, bool) {
    pk_sat_binop_s(a, b, lane_bits, |x, y| x - y)
}

fn pk_sat_binop_s(a: u32, b: u32, lane_bits: u32, f: impl Fn(i64, i64) -> i64) -> (u32, bool) {
    let lanes = 32 / lane_bits;
    let mask = u32_mask(lane_bits);
    let sign_bit = 1u32 << (lane_bits - 1);
    let mut acc = 0u32;
    let mut any = false;
    for i in 0..lanes {
        let shift = i * lane_bits;
        let av = lane_ext_s(a, shift, mask, sign_bit);
        let bv = lane_ext_s(b, shift, mask, sign_bit);
        let (r, ov) = sat_s(f(av, bv), lane_bits);
        any |= ov;
        acc |= ((r as u32) & mask) << shift;
    }
    (acc, any)
}

/// 逐分道无符号饱和加。
pub fn pk_add_sat_u(a: u32, b: u32, lane_bits: u32) -> (u32, bool) {
    pk_sat_binop_u(a, b, lane_bits, |x, y| x + y)
}

/// 逐分道无符号饱和减。
pub fn pk_sub_sat_u(a: u32, b: u32, lane_bits: u32) -> (u32, bool) {
    pk_sat_binop_u(a, b, lane_bits, |x, y| x - y)
}

fn pk_sat_binop_u(a: u32, b: u32, lane_bits: u32, f: impl Fn(i64, i64) -> i64) -> (u32, bool) {
    let lanes = 32 / lane_bits;
    let mask = u32_mask(lane_bits);
    let mut acc = 0u32;
    let mut any = false;
    for i in 0..lanes {
        let shift = i * lane_bits;
        let av = lane_ext_u(a, shift, mask);
        let bv = lane_ext_u(b, shift, mask);
        let (r, ov) = sat_u(f(av, bv), lane_bits);
        any |= ov;
        acc |= ((r as u32) & mask) << shift;
    }
    (acc, any)
}

/// 逐分道绝对值（有符号，最小值饱和到最大值）。
pub fn pk_abs(a: u32, lane_bits: u32) -> u32 {
    let lanes = 32 / lane_bits;
    let mask = u32_mask(lane_bits);
    let sign_bit = 1u32 << (lane_bits - 1);
    let mut acc = 0u32;
    for i in 0..lanes {
        let shift = i * lane_bits;
        let av = lane_ext_s(a, shift, mask, sign_bit);
        let (r, _) = sat_s(av.abs(), lane_bits);
        acc |= ((r as u32) & mask) << shift;
    }
    acc
}

/// 逐分道最小值。
pub fn pk_min(a: u32, b: u32, lane_bits: u32, signed: bool) -> u32 {
    pk_select(a, b, lane_bits, signed, |x, y| x <= y)
}

/// 逐分道最大值。
pub fn pk_max(a: u32, b: u32, lane_bits: u32, signed: bool) -> u32 {
    pk_select(a, b, lane_bits, signed, |x, y| x >= y)
}

fn pk_select(a: u32, b: u32, lane_bits: u32, signed: bool, keep_a: impl Fn(i64, i64) -> bool) -> u32 {
    let lanes = 32 / lane_bits;
    let mask = u32_mask(lane_bits);
    let sign_bit = 1u32 << (lane_bits - 1);
    let mut acc = 0u32;
    for i in 0..lanes {
        let shift = i * lane_bits;
        let (av, bv) = if signed {
            (
                lane_ext_s(a, shift, mask, sign_bit),
                lane_ext_s(b, shift, mask, sign_bit),
            )
        } else {
            (lane_ext_u(a, shift, mask), lane_ext_u(b, shift, mask))
        };
        let r = if keep_a(av, bv) { (a >> shift) & mask } else { (b >> shift) & mask };
        acc |= r << shift;
    }
    acc
}

/// 逐分道相等比较：相等分道写全 1，不等写全 0。
pub fn pk_cmp_eq(a: u32, b: u32, lane_bits: u32) -> u32 {
    let lanes = 32 / lane_bits;
    let mask = u32_mask(lane_bits);
    let mut acc = 0u32;
    for i in 0..lanes {
        let shift = i * lane_bits;
        if (a >> shift) & mask == (b >> shift) & mask {
            acc |= mask << shift;
        }
    }
    acc
}

/// 有符号舍入右移：移位前加 2^(sh-1)。sh == 0 时原样返回。
pub fn round_shr_s(a: u32, sh: u32) -> u32 {
    if sh == 0 {
        return a;
    }
    let sh = sh.min(31);
    let v = (a as i32 as i64) + (1i64 << (sh - 1));
    (v >> sh) as u32
}

/// 无符号舍入右移。
pub fn round_shr_u(a: u32, sh: u32) -> u32 {
    if sh == 0 {
        return a;
    }
    let sh = sh.min(31);
    let v = (a as u64) + (1u64 << (sh - 1));
    (v >> sh) as u32
}

/// 有符号饱和左移。
pub fn sat_shl_s(a: u32, sh: u32) -> (u32, bool) {
    let sh = sh.min(32);
    let v = (a as i32 as i128) << sh;
    if v > i32::MAX as i128 {
        (i32::MAX as u32, true)
    } else if v < i32::MIN as i128 {
        (i32::MIN as u32, true)
    } else {
        (v as i32 as u32, false)
    }
}

/// 无符号饱和左移。
pub fn sat_shl_u(a: u32, sh: u32) -> (u32, bool) {
    let sh = sh.min(32);
    let v = (a as u64 as u128) << sh;
    if v > u32::MAX as u128 {
        (u32::MAX, true)
    } else {
        (v as u32, false)
    }
}

/// 箝位到 bits 位有符号范围（输入按有符号解释）。
pub fn clip_s(a: u32, bits: u32) -> (u32, bool) {
    let (r, ov) = sat_s(a as i32 as i64, bits);
    (r as u32 & u32_mask(bits), ov)
}

/// 箝位到 bits 位无符号范围（输入按有符号解释，负值箝到 0）。
pub fn clip_u(a: u32, bits: u32) -> (u32, bool) {
    let (r, ov) = sat_u(a as i32 as i64, bits);
    (r as u32, ov)
}

fn u32_mask(bits: u32) -> u32 {
    if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 }
}

/// 64 位宽乘累加（有符号，环绕）。`sub` 为真时做累减。
pub fn mac_s64(acc: u64, x: u32, y: u32, sub: bool) -> u64 {
    let p = (x as i32 as i64).wrapping_mul(y as i32 as i64);
    let r = if sub {
        (acc as i64).wrapping_sub(p)
    } else {
        (acc as i64).wrapping_add(p)
    };
    r as u64
}

/// 64 位宽乘累加（无符号，环绕）。
pub fn mac_u64(acc: u64, x: u32, y: u32, sub: bool) -> u64 {
    let p = (x as u64).wrapping_mul(y as u64);
    if sub {
        acc.wrapping_sub(p)
    } else {
        acc.wrapping_add(p)
    }
}

/// 带溢出保护位的 64 位累加：结果的第 63..31 位构成 33 位保护值，
/// 全 0 或全 1（即结果可表示为 32 位补码）视为在界内，两个边界
/// 模式本身不算溢出。
pub fn mac_guard_v(acc: u64, x: u32, y: u32, sub: bool) -> (u64, bool) {
    let r = mac_s64(acc, x, y, sub) as i64;
    let guard = r >> 31;
    (r as u64, guard != 0 && guard != -1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sat_s32_clamps() {
        assert_eq!(add_sat_s32(0x7fff_ffff, 1), (0x7fff_ffff, true));
        assert_eq!(add_sat_s32(0x8000_0000, 0xffff_ffff), (0x8000_0000, true));
        assert_eq!(add_sat_s32(5, 7), (12, false));
        assert_eq!(sub_sat_s32(0x8000_0000, 1), (0x8000_0000, true));
    }

    #[test]
    fn test_sat_u32_clamps() {
        assert_eq!(add_sat_u32(u32::MAX, 1), (u32::MAX, true));
        assert_eq!(sub_sat_u32(0, 1), (0, true));
        assert_eq!(sub_sat_u32(9, 4), (5, false));
    }

    #[test]
    fn test_sat_s64() {
        assert_eq!(add_sat_s64(i64::MAX as u64, 1), (i64::MAX as u64, true));
        assert_eq!(sub_sat_s64(i64::MIN as u64, 1), (i64::MIN as u64, true));
        assert_eq!(add_sat_s64(10, (-3i64) as u64), (7, false));
    }

    #[test]
    fn test_pk_lane_independence() {
        // 字节 0 溢出不得波及字节 1
        let a = 0x0000_01ff;
        let b = 0x0000_0001;
        assert_eq!(pk_add(a, b, 8), 0x0000_0100);
        let (r, ov) = pk_add_sat_u(a, b, 8);
        assert_eq!(r, 0x0000_01ff);
        assert!(ov);
    }

    #[test]
    fn test_pk_add_sat_s_halves() {
        let a = 0x7fff_8000u32; // +32767 | -32768
        let (r, ov) = pk_add_sat_s(a, 0x0001_ffff, 16);
        assert!(ov);
        assert_eq!(r, 0x7fff_8000);
    }

    #[test]
    fn test_pk_abs_saturates_min() {
        assert_eq!(pk_abs(0x8000_0080, 8), 0x7f00_007f);
        assert_eq!(pk_abs(0x8000_0001, 16), 0x7fff_0001);
    }

    #[test]
    fn test_pk_min_max() {
        let a = 0x01ff_0005;
        let b = 0x0002_0004;
        assert_eq!(pk_min(a, b, 16, false), 0x0002_0004);
        // 有符号时 0x01ff > 0x0002，但 0xff..? 每分道看符号
        assert_eq!(pk_max(0x8000_0001, 0x7fff_0002, 16, true), 0x7fff_0002);
        assert_eq!(pk_max(0x8000_0001, 0x7fff_0002, 16, false), 0x8000_0002);
    }

    #[test]
    fn test_pk_cmp_eq_mask() {
        assert_eq!(pk_cmp_eq(0x1122_3344, 0x1122_0044, 16), 0xffff_0000);
        assert_eq!(pk_cmp_eq(0x1122_3344, 0x1122_0044, 8), 0xffff_00ff);
    }

    #[test]
    fn test_round_shr() {
        // 7 >> 2 = 1，舍入后 (7+2)>>2 = 2
        assert_eq!(round_shr_s(7, 2), 2);
        assert_eq!(round_shr_u(7, 2), 2);
        // -7 的舍入右移：(-7+2)>>2 = -2
        assert_eq!(round_shr_s((-7i32) as u32, 2), (-2i32) as u32);
        assert_eq!(round_shr_s(5, 0), 5);
    }

    #[test]
    fn test_sat_shl() {
        assert_eq!(sat_shl_s(0x4000_0000, 1), (0x7fff_ffff, true));
        assert_eq!(sat_shl_s(0x2000_0000, 1), (0x4000_0000, false));
        assert_eq!(sat_shl_s(0x8000_0000, 1), (0x8000_0000, true));
        assert_eq!(sat_shl_u(0x8000_0000, 1), (u32::MAX, true));
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip_s(0x100, 8), (0x7f, true));
        assert_eq!(clip_s((-200i32) as u32, 8), (0x80, true));
        assert_eq!(clip_s(5, 8), (5, false));
        assert_eq!(clip_u((-1i32) as u32, 8), (0, true));
        assert_eq!(clip_u(300, 8), (255, true));
    }

    #[test]
    fn test_mac_guard_inclusive_bounds() {
        // 结果恰为 i32::MAX / i32::MIN：保护值为全 0 / 全 1，不算溢出
        let (r, ov) = mac_guard_v(0, 0x7fff_ffff, 1, false);
        assert_eq!(r, 0x7fff_ffff);
        assert!(!ov);
        let (r, ov) = mac_guard_v(0, 0x8000_0000, 1, false);
        assert_eq!(r as i64, i32::MIN as i64);
        assert!(!ov);
        // 一步越界即溢出
        let (_, ov) = mac_guard_v(1, 0x7fff_ffff, 1, false);
        assert!(ov);
        let (_, ov) = mac_guard_v((-1i64) as u64, 0x8000_0000, 1, false);
        assert!(ov);
    }

    #[test]
    fn test_mac_s64_directions() {
        assert_eq!(mac_s64(100, 3, 4, false), 112);
        assert_eq!(mac_s64(100, 3, 4, true), 88);
        // 有符号乘：(-2) * 3 = -6
        assert_eq!(mac_s64(0, 0xffff_fffe, 3, false) as i64, -6);
        assert_eq!(mac_u64(0, 0xffff_fffe, 3, false), 0xffff_fffe_u64 * 3);
    }
}
