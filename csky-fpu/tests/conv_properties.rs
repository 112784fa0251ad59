//! 浮点转换的性质测试:与宿主 `as` 转换的饱和语义交叉验证。

use csky_fpu::{FpOrd, FpStatus, Round, cmp32, f32_to_i32, f32_to_u32, f64_to_i32, i32_to_f64};
use proptest::prelude::*;

proptest! {
    /// 向零舍入下的浮点转整数与 Rust 的 `as` 饱和转换逐位一致
    /// (NaN 给 0,越界截到边界)。
    #[test]
    fn prop_f32_to_i32_matches_saturating_cast(bits in any::<u32>()) {
        let f = f32::from_bits(bits);
        let mut st = FpStatus::new(Round::Zero);
        prop_assert_eq!(f32_to_i32(bits, &mut st), (f as i32) as u32);
        let mut st = FpStatus::new(Round::Zero);
        prop_assert_eq!(f32_to_u32(bits, &mut st), f as u32);
    }

    /// i32 在 f64 中精确可表示,来回转换恒等且不置任何标志。
    #[test]
    fn prop_i32_f64_round_trip(v in any::<i32>()) {
        let wide = i32_to_f64(v as u32);
        let mut st = FpStatus::new(Round::Nearest);
        prop_assert_eq!(f64_to_i32(wide, &mut st) as i32, v);
        prop_assert_eq!(st.flags, 0);
    }

    /// 有限操作数上比较是反对称的。
    #[test]
    fn prop_cmp32_antisymmetric(a in any::<i32>(), b in any::<i32>()) {
        let (x, y) = ((a as f32).to_bits(), (b as f32).to_bits());
        let fwd = cmp32(x, y);
        let rev = cmp32(y, x);
        match fwd {
            FpOrd::Less => prop_assert_eq!(rev, FpOrd::Greater),
            FpOrd::Greater => prop_assert_eq!(rev, FpOrd::Less),
            FpOrd::Equal => prop_assert_eq!(rev, FpOrd::Equal),
            FpOrd::Unordered => prop_assert!(false, "finite inputs cannot be unordered"),
        }
    }
}
