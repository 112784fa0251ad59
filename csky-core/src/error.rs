//! 面向嵌入方的错误类型。
//!
//! 客户机可见的故障（TLB 缺失、非法指令等）不是 Rust 错误，它们走
//! 异常分发路径；这里只定义模拟器本身无法继续时上报的错误。

use crate::bus::BusFault;
use crate::GuestAddr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// 异常分发期间向量表取数再次出错，且已超出重试深度
    #[error("unrecoverable double fault dispatching vector {vec} (pc {pc:#010x})")]
    DoubleFault { vec: u32, pc: GuestAddr },

    /// 物理总线错误直接上报（仅在无法转换为客户机异常的路径上出现）
    #[error(transparent)]
    Bus(#[from] BusFault),

    /// 配置错误
    #[error("invalid configuration: {0}")]
    Config(String),
}
