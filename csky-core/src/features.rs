//! 处理器特性位与机型目录。
//!
//! 解码器和翻译驱动按特性位决定指令组的可用性；机型目录给出
//! 各系列的出厂组合。未启用特性对应的编码一律按非法指令处理。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 特性位集合。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Features(u32);

impl Features {
    /// 基础 DSP 指令组（饱和/紧缩运算）
    pub const DSP: Features = Features(1 << 0);
    /// 增强 DSP（宽乘累加、HI/LO 对）
    pub const EDSP: Features = Features(1 << 1);
    /// 128 位向量 DSP
    pub const VDSP: Features = Features(1 << 2);
    /// 单精度浮点
    pub const FPU: Features = Features(1 << 3);
    /// 双精度浮点（含 FPUV2 指令组）
    pub const FPU_DP: Features = Features(1 << 4);
    /// 分页 MMU（128 项 TLB + 两级页表回填）
    pub const MMU_PAGED: Features = Features(1 << 5);
    /// 内存保护单元（8 区域守护）
    pub const MGU: Features = Features(1 << 6);
    /// 信任执行环境（双世界寄存器组）
    pub const TEE: Features = Features(1 << 7);
    /// ABIV1 备用寄存器组（向量表表项低位选择）
    pub const ABIV1_AF: Features = Features(1 << 8);
    /// 按特权级/世界分组的栈指针
    pub const SEPARATE_SP: Features = Features(1 << 9);
    /// 硬件整数除法
    pub const DIV: Features = Features(1 << 10);
    /// 允许非对齐访问（否则触发对齐异常）
    pub const UNALIGNED: Features = Features(1 << 11);
    /// 扩展 lrw/jmpi 常量池寻址
    pub const ELRW: Features = Features(1 << 12);
    /// 守卫访存（bctm 变体）：守卫寄存器为零时访存被跳过并转入
    /// 监督向量基址前一槽
    pub const BCTM: Features = Features(1 << 13);

    /// 空集合
    pub const fn empty() -> Self {
        Features(0)
    }

    /// 是否包含给定特性位（全部）。
    pub const fn has(&self, other: Features) -> bool {
        self.0 & other.0 == other.0
    }

    /// 并集
    pub const fn with(self, other: Features) -> Self {
        Features(self.0 | other.0)
    }

    /// 差集
    pub const fn without(self, other: Features) -> Self {
        Features(self.0 & !other.0)
    }

    /// 原始位值
    pub const fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for Features {
    type Output = Features;
    fn bitor(self, rhs: Features) -> Features {
        Features(self.0 | rhs.0)
    }
}

/// 处理器机型。型号决定默认特性组合。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuModel {
    /// CK610：ABIV1 系列，分页 MMU，备用寄存器组
    Ck610,
    /// CK803S：MGU + TEE + 增强 DSP
    Ck803,
    /// CK807：分页 MMU + 双精度浮点 + DSP
    Ck807,
    /// CK810：分页 MMU + 双精度浮点 + DSP + 硬件除法
    Ck810,
    /// CK860：分页 MMU + 向量 DSP + 非对齐访问
    Ck860,
}

impl CpuModel {
    /// 机型的出厂特性集合。
    pub fn features(&self) -> Features {
        match self {
            CpuModel::Ck610 => Features::MMU_PAGED | Features::ABIV1_AF | Features::DSP,
            CpuModel::Ck803 => {
                Features::MGU
                    | Features::TEE
                    | Features::SEPARATE_SP
                    | Features::DSP
                    | Features::EDSP
                    | Features::DIV
            }
            CpuModel::Ck807 => {
                Features::MMU_PAGED
                    | Features::SEPARATE_SP
                    | Features::FPU
                    | Features::FPU_DP
                    | Features::DSP
                    | Features::EDSP
                    | Features::ELRW
            }
            CpuModel::Ck810 => {
                Features::MMU_PAGED
                    | Features::SEPARATE_SP
                    | Features::FPU
                    | Features::FPU_DP
                    | Features::DSP
                    | Features::EDSP
                    | Features::DIV
                    | Features::ELRW
            }
            CpuModel::Ck860 => {
                Features::MMU_PAGED
                    | Features::SEPARATE_SP
                    | Features::FPU
                    | Features::FPU_DP
                    | Features::VDSP
                    | Features::DIV
                    | Features::UNALIGNED
                    | Features::ELRW
            }
        }
    }
}

impl fmt::Display for CpuModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CpuModel::Ck610 => "ck610",
            CpuModel::Ck803 => "ck803",
            CpuModel::Ck807 => "ck807",
            CpuModel::Ck810 => "ck810",
            CpuModel::Ck860 => "ck860",
        };
        f.write_str(name)
    }
}

impl FromStr for CpuModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ck610" => Ok(CpuModel::Ck610),
            "ck803" | "ck803s" => Ok(CpuModel::Ck803),
            "ck807" => Ok(CpuModel::Ck807),
            "ck810" => Ok(CpuModel::Ck810),
            "ck860" => Ok(CpuModel::Ck860),
            other => Err(format!("unknown cpu model: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_ops() {
        let f = Features::DSP | Features::FPU;
        assert!(f.has(Features::DSP));
        assert!(f.has(Features::FPU));
        assert!(!f.has(Features::VDSP));
        assert!(!f.without(Features::DSP).has(Features::DSP));
    }

    #[test]
    fn test_model_parse() {
        assert_eq!("ck810".parse::<CpuModel>().unwrap(), CpuModel::Ck810);
        assert_eq!("CK860".parse::<CpuModel>().unwrap(), CpuModel::Ck860);
        assert!("ck9000".parse::<CpuModel>().is_err());
    }

    #[test]
    fn test_model_feature_exclusivity() {
        // 分页 MMU 与 MGU 不应同时出现在一个机型上
        for m in [
            CpuModel::Ck610,
            CpuModel::Ck803,
            CpuModel::Ck807,
            CpuModel::Ck810,
            CpuModel::Ck860,
        ] {
            let f = m.features();
            assert!(
                !(f.has(Features::MMU_PAGED) && f.has(Features::MGU)),
                "{m} has both paged mmu and mgu"
            );
        }
    }
}
