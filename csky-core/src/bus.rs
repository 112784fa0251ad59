//! 物理总线与客户机访存抽象。
//!
//! [`PhysBus`] 面向物理地址空间，由嵌入方（设备模型、平台内存）实现；
//! [`GuestMem`] 面向虚拟地址，由上层的 MMU 外观实现，失败时携带应
//! 上报的异常号。[`FlatRam`] 是测试与 CLI 使用的平坦内存后端。

use crate::exception::excp;
use crate::{GuestAddr, World};
use thiserror::Error;

/// 一次访问的上下文：特权级与所属世界。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemCtx {
    /// 超级用户模式
    pub sup: bool,
    /// 当前世界（决定 TLB 数组选择）
    pub world: World,
}

impl MemCtx {
    pub fn supervisor(world: World) -> Self {
        MemCtx { sup: true, world }
    }

    pub fn user(world: World) -> Self {
        MemCtx { sup: false, world }
    }
}

/// 物理总线访问失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("bus fault at {paddr:#010x} (size {size}, write {is_write})")]
pub struct BusFault {
    pub paddr: GuestAddr,
    pub size: u8,
    pub is_write: bool,
}

/// 虚拟地址访问失败：携带异常号与出错虚拟地址，由调用方转为挂起异常。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemFault {
    /// 映射后的异常向量号
    pub vec: u32,
    /// 出错的虚拟地址
    pub vaddr: GuestAddr,
}

/// 物理地址空间接口。小端字节序，size 取 1/2/4/8。
pub trait PhysBus {
    fn read(&mut self, paddr: GuestAddr, size: u8) -> Result<u64, BusFault>;
    fn write(&mut self, paddr: GuestAddr, val: u64, size: u8) -> Result<(), BusFault>;
}

/// 虚拟地址空间接口。取指与数据访问分开，便于按访问类型检查权限。
pub trait GuestMem {
    fn read(&mut self, va: GuestAddr, size: u8, ctx: MemCtx) -> Result<u64, MemFault>;
    fn write(&mut self, va: GuestAddr, val: u64, size: u8, ctx: MemCtx) -> Result<(), MemFault>;
    fn fetch(&mut self, va: GuestAddr, size: u8, ctx: MemCtx) -> Result<u32, MemFault>;
}

/// 平坦 RAM：从 `base` 起的一段连续内存。
#[derive(Debug, Clone)]
pub struct FlatRam {
    base: GuestAddr,
    data: Vec<u8>,
}

impl FlatRam {
    pub fn new(base: GuestAddr, size: usize) -> Self {
        FlatRam {
            base,
            data: vec![0; size],
        }
    }

    pub fn base(&self) -> GuestAddr {
        self.base
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 把一段镜像写入给定物理地址处，越界部分截断。
    pub fn load(&mut self, paddr: GuestAddr, image: &[u8]) {
        let Some(start) = paddr.checked_sub(self.base) else {
            return;
        };
        let start = start as usize;
        if start >= self.data.len() {
            return;
        }
        let end = (start + image.len()).min(self.data.len());
        self.data[start..end].copy_from_slice(&image[..end - start]);
    }

    fn offset(&self, paddr: GuestAddr, size: u8) -> Option<usize> {
        let off = paddr.checked_sub(self.base)? as usize;
        if off + size as usize <= self.data.len() {
            Some(off)
        } else {
            None
        }
    }
}

impl PhysBus for FlatRam {
    fn read(&mut self, paddr: GuestAddr, size: u8) -> Result<u64, BusFault> {
        let off = self.offset(paddr, size).ok_or(BusFault {
            paddr,
            size,
            is_write: false,
        })?;
        let mut v = 0u64;
        for i in 0..size as usize {
            v |= (self.data[off + i] as u64) << (8 * i);
        }
        Ok(v)
    }

    fn write(&mut self, paddr: GuestAddr, val: u64, size: u8) -> Result<(), BusFault> {
        let off = self.offset(paddr, size).ok_or(BusFault {
            paddr,
            size,
            is_write: true,
        })?;
        for i in 0..size as usize {
            self.data[off + i] = (val >> (8 * i)) as u8;
        }
        Ok(())
    }
}

// 恒等映射的 GuestMem 实现，供核内单元测试直接使用。
impl GuestMem for FlatRam {
    fn read(&mut self, va: GuestAddr, size: u8, _ctx: MemCtx) -> Result<u64, MemFault> {
        PhysBus::read(self, va, size).map_err(|_| MemFault {
            vec: excp::ACCESS,
            vaddr: va,
        })
    }

    fn write(&mut self, va: GuestAddr, val: u64, size: u8, _ctx: MemCtx) -> Result<(), MemFault> {
        PhysBus::write(self, va, val, size).map_err(|_| MemFault {
            vec: excp::ACCESS,
            vaddr: va,
        })
    }

    fn fetch(&mut self, va: GuestAddr, size: u8, _ctx: MemCtx) -> Result<u32, MemFault> {
        PhysBus::read(self, va, size)
            .map(|v| v as u32)
            .map_err(|_| MemFault {
                vec: excp::ACCESS,
                vaddr: va,
            })
    }
}
