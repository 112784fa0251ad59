//! PSR（处理器状态寄存器）位域定义。
//!
//! 布局：S=31, T=30, VEC=[23:16], TM=[15:14], TP=13, EE=8, IC=7,
//! IE=6, FE=4, AF=1, C=0。其余位保留，写入被忽略。

/// 超级用户模式位
pub const PSR_S: u32 = 1 << 31;
/// 信任世界位（TEE）
pub const PSR_T: u32 = 1 << 30;
/// 异常向量号字段
pub const PSR_VEC_MASK: u32 = 0xff << 16;
pub const PSR_VEC_SHIFT: u32 = 16;
/// 跟踪模式字段（00 关闭 / 01 指令跟踪 / 10 跳转跟踪）
pub const PSR_TM_MASK: u32 = 0x3 << 14;
pub const PSR_TM_SHIFT: u32 = 14;
/// 跟踪挂起位
pub const PSR_TP: u32 = 1 << 13;
/// 异常使能位
pub const PSR_EE: u32 = 1 << 8;
/// 中断控制位
pub const PSR_IC: u32 = 1 << 7;
/// 普通中断使能位
pub const PSR_IE: u32 = 1 << 6;
/// 快速中断使能位
pub const PSR_FE: u32 = 1 << 4;
/// 备用寄存器组选择位（ABIV1）
pub const PSR_AF: u32 = 1 << 1;
/// 条件/进位标志位
pub const PSR_C: u32 = 1 << 0;

/// 异常分发时需要清除的位集合（快速中断额外清 FE）。
pub const PSR_DISPATCH_CLEAR: u32 = PSR_TP | PSR_EE | PSR_IE | PSR_TM_MASK;

/// 架构定义的全部可写位。保留位写入无效。
pub const PSR_WRITABLE: u32 = PSR_S
    | PSR_T
    | PSR_VEC_MASK
    | PSR_TM_MASK
    | PSR_TP
    | PSR_EE
    | PSR_IC
    | PSR_IE
    | PSR_FE
    | PSR_AF
    | PSR_C;
