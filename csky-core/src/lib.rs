//! # csky-core - CSKY 处理器核心库
//!
//! 提供 CSKY 架构状态、异常分发与中断控制的核心类型定义。
//!
//! ## 主要组件
//!
//! - **类型定义**: [`GuestAddr`], [`World`] 等基础类型
//! - **架构状态**: [`CpuState`] 寄存器文件、PSR 缓存字段、影子寄存器组
//! - **特性目录**: [`Features`], [`CpuModel`] 决定解码与翻译路径的可用性
//! - **异常分发**: [`exception`] 模块实现四阶段分发状态机
//! - **中断控制**: [`InterruptController`] 线程安全的中断线登记与轮询
//! - **访存抽象**: [`PhysBus`] / [`GuestMem`] trait 由外层内存子系统实现

use serde::{Deserialize, Serialize};

pub mod bus;
pub mod debug;
pub mod error;
pub mod exception;
pub mod features;
pub mod intc;
pub mod psr;
pub mod state;
pub mod stats;

pub use bus::{BusFault, FlatRam, GuestMem, MemCtx, MemFault, PhysBus};
pub use debug::DebugCtl;
pub use error::CoreError;
pub use exception::{excp, DispatchPhase, PendingExc};
pub use features::{CpuModel, Features};
pub use intc::{InterruptController, PendingIrq};
pub use state::{CpuState, SceState};
pub use stats::CoreStats;

/// 客户机虚拟/物理地址。CSKY 为 32 位架构，两类地址同宽。
pub type GuestAddr = u32;

/// 安全世界标识（TEE 扩展）。无 TEE 特性的机型恒为非信任世界。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum World {
    /// 非信任世界
    #[default]
    NonTrust = 0,
    /// 信任世界
    Trust = 1,
}

/// 核心运行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// 处理器型号（决定特性集）
    pub model: CpuModel,
    /// 复位入口地址
    pub entry: GuestAddr,
    /// 外部中断是否采用向量模式（向量号 32+n），否则自动向量 10/11
    pub vectored_irq: bool,
    /// 向量中断是否路由到信任世界（仅 TEE 机型有效）
    pub tee_secure_irq: bool,
    /// 单个翻译块的最大指令数
    pub max_block_insns: usize,
    /// 单步模式：每个块一条指令，执行后交还控制权
    pub single_step: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            model: CpuModel::Ck810,
            entry: 0,
            vectored_irq: false,
            tee_secure_irq: false,
            max_block_insns: 64,
            single_step: false,
        }
    }
}
