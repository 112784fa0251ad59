//! CSKY FPU 运算辅助库(FPUv2 语义)。
//!
//! 所有运算以位型式(`u32`/`u64`)进出,内部借助宿主浮点完成计算,
//! 并在 [`FpStatus`] 中合成 IEEE 异常标志(无效、除零、上溢、下溢、不精确)。
//! 舍入模式取自 FCR 的 RM 域:算术运算按宿主默认(最近偶数)执行,
//! 数值转换则完整遵循 RM。

use std::cmp::Ordering;

/// 无效运算(0/0、inf-inf、NaN 转整数等)。
pub const FE_INVALID: u32 = 1 << 0;
/// 有限数除以零。
pub const FE_DIVZERO: u32 = 1 << 1;
/// 结果上溢为无穷。
pub const FE_OVERFLOW: u32 = 1 << 2;
/// 结果下溢为次正规数。
pub const FE_UNDERFLOW: u32 = 1 << 3;
/// 结果经过舍入。
pub const FE_INEXACT: u32 = 1 << 4;

/// 舍入模式,对应 FCR[25:24]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Round {
    /// 最近偶数(RM=00)。
    #[default]
    Nearest,
    /// 向零(RM=01)。
    Zero,
    /// 向正无穷(RM=10)。
    Up,
    /// 向负无穷(RM=11)。
    Down,
}

impl Round {
    pub fn from_fcr(fcr: u32) -> Self {
        match (fcr >> 24) & 0x3 {
            0 => Round::Nearest,
            1 => Round::Zero,
            2 => Round::Up,
            _ => Round::Down,
        }
    }
}

/// 单次浮点运算的状态:舍入模式输入,异常标志输出。
///
/// 调用方在运算结束后把 `flags` 累加进 FESR,并据 FCR 的使能位
/// 决定是否触发浮点异常。
#[derive(Debug, Clone, Copy, Default)]
pub struct FpStatus {
    pub rm: Round,
    pub flags: u32,
}

impl FpStatus {
    pub fn new(rm: Round) -> Self {
        FpStatus { rm, flags: 0 }
    }

    /// 按当前 FCR 内容构造。
    pub fn from_fcr(fcr: u32) -> Self {
        Self::new(Round::from_fcr(fcr))
    }

    pub fn set(&mut self, flags: u32) {
        self.flags |= flags;
    }

    /// 取走累计标志并清零。
    pub fn take_flags(&mut self) -> u32 {
        std::mem::take(&mut self.flags)
    }
}

/// 浮点比较结果,由执行层映射到 C 标志。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpOrd {
    Less,
    Equal,
    Greater,
    /// 至少一个操作数为 NaN。
    Unordered,
}

// ---------------------------------------------------------------------------
// 标志合成
// ---------------------------------------------------------------------------

fn synth32(inputs_nan: bool, r: f32, st: &mut FpStatus) -> u32 {
    if r.is_nan() && !inputs_nan {
        st.set(FE_INVALID);
    }
    if r.is_infinite() {
        // 输入里本来就有无穷时结果无穷不算上溢,由调用处过滤。
        st.set(FE_OVERFLOW | FE_INEXACT);
    }
    if r != 0.0 && r.is_subnormal() {
        st.set(FE_UNDERFLOW | FE_INEXACT);
    }
    r.to_bits()
}

fn synth64(inputs_nan: bool, r: f64, st: &mut FpStatus) -> u64 {
    if r.is_nan() && !inputs_nan {
        st.set(FE_INVALID);
    }
    if r.is_infinite() {
        st.set(FE_OVERFLOW | FE_INEXACT);
    }
    if r != 0.0 && r.is_subnormal() {
        st.set(FE_UNDERFLOW | FE_INEXACT);
    }
    r.to_bits()
}

fn bin32(a: u32, b: u32, st: &mut FpStatus, f: impl Fn(f32, f32) -> f32) -> u32 {
    let (x, y) = (f32::from_bits(a), f32::from_bits(b));
    let r = f(x, y);
    if r.is_infinite() && (x.is_infinite() || y.is_infinite()) {
        // 无穷入无穷出不是上溢,直接返回。
        return r.to_bits();
    }
    synth32(x.is_nan() || y.is_nan(), r, st)
}

fn bin64(a: u64, b: u64, st: &mut FpStatus, f: impl Fn(f64, f64) -> f64) -> u64 {
    let (x, y) = (f64::from_bits(a), f64::from_bits(b));
    let r = f(x, y);
    if r.is_infinite() && (x.is_infinite() || y.is_infinite()) {
        return r.to_bits();
    }
    synth64(x.is_nan() || y.is_nan(), r, st)
}

// ---------------------------------------------------------------------------
// 单精度算术
// ---------------------------------------------------------------------------

pub fn add32(a: u32, b: u32, st: &mut FpStatus) -> u32 {
    bin32(a, b, st, |x, y| x + y)
}

pub fn sub32(a: u32, b: u32, st: &mut FpStatus) -> u32 {
    bin32(a, b, st, |x, y| x - y)
}

pub fn mul32(a: u32, b: u32, st: &mut FpStatus) -> u32 {
    bin32(a, b, st, |x, y| x * y)
}

pub fn div32(a: u32, b: u32, st: &mut FpStatus) -> u32 {
    let (x, y) = (f32::from_bits(a), f32::from_bits(b));
    if y == 0.0 && x.is_finite() && x != 0.0 {
        st.set(FE_DIVZERO);
        // 符号由两操作数符号位异或决定。
        let sign = (a ^ b) & 0x8000_0000;
        return sign | f32::INFINITY.to_bits();
    }
    bin32(a, b, st, |x, y| x / y)
}

/// IEEE minNum:单侧 NaN 时返回另一侧。
pub fn min32(a: u32, b: u32, _st: &mut FpStatus) -> u32 {
    f32::from_bits(a).min(f32::from_bits(b)).to_bits()
}

pub fn max32(a: u32, b: u32, _st: &mut FpStatus) -> u32 {
    f32::from_bits(a).max(f32::from_bits(b)).to_bits()
}

pub fn sqrt32(a: u32, st: &mut FpStatus) -> u32 {
    let x = f32::from_bits(a);
    synth32(x.is_nan(), x.sqrt(), st)
}

/// 取负只翻符号位,不产生任何异常。
pub fn neg32(a: u32) -> u32 {
    a ^ 0x8000_0000
}

pub fn abs32(a: u32) -> u32 {
    a & 0x7fff_ffff
}

// ---------------------------------------------------------------------------
// 双精度算术
// ---------------------------------------------------------------------------

pub fn add64(a: u64, b: u64, st: &mut FpStatus) -> u64 {
    bin64(a, b, st, |x, y| x + y)
}

pub fn sub64(a: u64, b: u64, st: &mut FpStatus) -> u64 {
    bin64(a, b, st, |x, y| x - y)
}

pub fn mul64(a: u64, b: u64, st: &mut FpStatus) -> u64 {
    bin64(a, b, st, |x, y| x * y)
}

pub fn div64(a: u64, b: u64, st: &mut FpStatus) -> u64 {
    let (x, y) = (f64::from_bits(a), f64::from_bits(b));
    if y == 0.0 && x.is_finite() && x != 0.0 {
        st.set(FE_DIVZERO);
        let sign = (a ^ b) & 0x8000_0000_0000_0000;
        return sign | f64::INFINITY.to_bits();
    }
    bin64(a, b, st, |x, y| x / y)
}

pub fn min64(a: u64, b: u64, _st: &mut FpStatus) -> u64 {
    f64::from_bits(a).min(f64::from_bits(b)).to_bits()
}

pub fn max64(a: u64, b: u64, _st: &mut FpStatus) -> u64 {
    f64::from_bits(a).max(f64::from_bits(b)).to_bits()
}

pub fn sqrt64(a: u64, st: &mut FpStatus) -> u64 {
    let x = f64::from_bits(a);
    synth64(x.is_nan(), x.sqrt(), st)
}

pub fn neg64(a: u64) -> u64 {
    a ^ 0x8000_0000_0000_0000
}

pub fn abs64(a: u64) -> u64 {
    a & 0x7fff_ffff_ffff_ffff
}

// ---------------------------------------------------------------------------
// 融合乘加
// ---------------------------------------------------------------------------

/// fmac/fmsc/fnmac/fnmsc 族,乘积只舍入一次。
///
/// `negate` 翻转乘积符号,`sub` 翻转累加数符号:
/// fmac = x*y + acc,fmsc = x*y - acc,fnmac = acc - x*y,fnmsc = -x*y - acc。
pub fn fmac32(x: u32, y: u32, acc: u32, negate: bool, sub: bool, st: &mut FpStatus) -> u32 {
    let xf = f32::from_bits(if negate { neg32(x) } else { x });
    let yf = f32::from_bits(y);
    let af = f32::from_bits(if sub { neg32(acc) } else { acc });
    let r = xf.mul_add(yf, af);
    if r.is_infinite() && (xf.is_infinite() || yf.is_infinite() || af.is_infinite()) {
        return r.to_bits();
    }
    synth32(xf.is_nan() || yf.is_nan() || af.is_nan(), r, st)
}

pub fn fmac64(x: u64, y: u64, acc: u64, negate: bool, sub: bool, st: &mut FpStatus) -> u64 {
    let xf = f64::from_bits(if negate { neg64(x) } else { x });
    let yf = f64::from_bits(y);
    let af = f64::from_bits(if sub { neg64(acc) } else { acc });
    let r = xf.mul_add(yf, af);
    if r.is_infinite() && (xf.is_infinite() || yf.is_infinite() || af.is_infinite()) {
        return r.to_bits();
    }
    synth64(xf.is_nan() || yf.is_nan() || af.is_nan(), r, st)
}

// ---------------------------------------------------------------------------
// 比较
// ---------------------------------------------------------------------------

pub fn cmp32(a: u32, b: u32) -> FpOrd {
    match f32::from_bits(a).partial_cmp(&f32::from_bits(b)) {
        Some(Ordering::Less) => FpOrd::Less,
        Some(Ordering::Equal) => FpOrd::Equal,
        Some(Ordering::Greater) => FpOrd::Greater,
        None => FpOrd::Unordered,
    }
}

pub fn cmp64(a: u64, b: u64) -> FpOrd {
    match f64::from_bits(a).partial_cmp(&f64::from_bits(b)) {
        Some(Ordering::Less) => FpOrd::Less,
        Some(Ordering::Equal) => FpOrd::Equal,
        Some(Ordering::Greater) => FpOrd::Greater,
        None => FpOrd::Unordered,
    }
}

// ---------------------------------------------------------------------------
// 转换
// ---------------------------------------------------------------------------

/// 按舍入模式把实数取整(以 f64 为中间精度)。
fn round_to_int(v: f64, rm: Round) -> f64 {
    match rm {
        Round::Nearest => v.round_ties_even(),
        Round::Zero => v.trunc(),
        Round::Up => v.ceil(),
        Round::Down => v.floor(),
    }
}

fn to_i32(v: f64, st: &mut FpStatus) -> u32 {
    if v.is_nan() {
        st.set(FE_INVALID);
        return 0;
    }
    let r = round_to_int(v, st.rm);
    if r > i32::MAX as f64 {
        st.set(FE_INVALID);
        return i32::MAX as u32;
    }
    if r < i32::MIN as f64 {
        st.set(FE_INVALID);
        return i32::MIN as u32;
    }
    if r != v {
        st.set(FE_INEXACT);
    }
    r as i32 as u32
}

fn to_u32(v: f64, st: &mut FpStatus) -> u32 {
    if v.is_nan() {
        st.set(FE_INVALID);
        return 0;
    }
    let r = round_to_int(v, st.rm);
    if r > u32::MAX as f64 {
        st.set(FE_INVALID);
        return u32::MAX;
    }
    if r < 0.0 {
        st.set(FE_INVALID);
        return 0;
    }
    if r != v {
        st.set(FE_INEXACT);
    }
    r as u32
}

pub fn f32_to_i32(a: u32, st: &mut FpStatus) -> u32 {
    to_i32(f32::from_bits(a) as f64, st)
}

pub fn f32_to_u32(a: u32, st: &mut FpStatus) -> u32 {
    to_u32(f32::from_bits(a) as f64, st)
}

pub fn f64_to_i32(a: u64, st: &mut FpStatus) -> u32 {
    to_i32(f64::from_bits(a), st)
}

pub fn f64_to_u32(a: u64, st: &mut FpStatus) -> u32 {
    to_u32(f64::from_bits(a), st)
}

pub fn i32_to_f32(v: u32, st: &mut FpStatus) -> u32 {
    narrow_to_f32(v as i32 as f64, st)
}

pub fn u32_to_f32(v: u32, st: &mut FpStatus) -> u32 {
    narrow_to_f32(v as f64, st)
}

/// 32 位整数在 f64 中总能精确表示,转双精度无任何标志。
pub fn i32_to_f64(v: u32) -> u64 {
    (v as i32 as f64).to_bits()
}

pub fn u32_to_f64(v: u32) -> u64 {
    (v as f64).to_bits()
}

/// 单精度升双精度是精确的。
pub fn f32_to_f64(a: u32) -> u64 {
    (f32::from_bits(a) as f64).to_bits()
}

pub fn f64_to_f32(a: u64, st: &mut FpStatus) -> u32 {
    let v = f64::from_bits(a);
    if v.is_nan() || v.is_infinite() {
        return (v as f32).to_bits();
    }
    narrow_to_f32(v, st)
}

/// f64 → f32,按 RM 修正宿主的最近偶数结果。
fn narrow_to_f32(v: f64, st: &mut FpStatus) -> u32 {
    let near = v as f32;
    if near as f64 == v {
        return near.to_bits();
    }
    st.set(FE_INEXACT);
    let r = match st.rm {
        Round::Nearest => near,
        Round::Zero => {
            if (near as f64).abs() > v.abs() {
                toward_zero(near)
            } else {
                near
            }
        }
        Round::Up => {
            if (near as f64) < v {
                near.next_up()
            } else {
                near
            }
        }
        Round::Down => {
            if (near as f64) > v {
                near.next_down()
            } else {
                near
            }
        }
    };
    if r.is_infinite() {
        st.set(FE_OVERFLOW);
    } else if r != 0.0 && r.is_subnormal() {
        st.set(FE_UNDERFLOW);
    }
    r.to_bits()
}

fn toward_zero(v: f32) -> f32 {
    if v > 0.0 { v.next_down() } else { v.next_up() }
}
