//! CSKY 执行引擎:块解释器与虚拟处理器循环。
//!
//! [`exec_block`] 逐条解释一个翻译块的 IR 并给出块级退出原因;
//! [`Vcpu`] 在其上叠加块缓存、链式执行、异常/中断同步点与
//! 调试控制(断点、单步、跟踪),对外提供 [`Vcpu::run`] 一个入口。
//!
//! 客户机状态(通用/控制寄存器、PSR、FPU)全部存放在
//! `csky_core::CpuState` 中,本 crate 只负责驱动它。

pub mod exec;
pub mod vcpu;

pub use exec::{exec_block, BlockExit};
pub use vcpu::{ExitReason, Vcpu};
