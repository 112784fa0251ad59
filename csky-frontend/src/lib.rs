//! # csky-frontend - 指令解码与翻译驱动
//!
//! 把 CSKY 机器码翻译成 csky-ir 的语义动作块。[`translate_block`]
//! 是引擎使用的入口：按停块规则（控制流结束符、块长上限、4K 页
//! 边界、断点、单步、条件执行与中断延迟窗口）把连续指令聚成一个
//! [`csky_ir::TransBlock`]。
//!
//! 长度规则：首半字最高两位全 1 为 32 位指令，否则 16 位。两张
//! 解码表都用嵌套 match 组织，每一层的未命中路径都显式落到非法
//! 指令结束符；特性位未启用的指令组同样按非法处理，特权指令在
//! 用户态解码为特权违例（特权级参与翻译块缓存键，不会串台）。

pub mod decode16;
pub mod decode32;
pub mod disasm;
pub mod translate;

pub use decode16::decode16;
pub use decode32::decode32;
pub use disasm::disasm;
pub use translate::translate_block;

/// 按首半字判定指令字节长度（2 或 4）。
pub fn insn_len(first_hw: u16) -> u8 {
    if first_hw & 0xc000 == 0xc000 { 4 } else { 2 }
}

/// 指令编码辅助函数总览，测试与引导代码生成共用。
pub mod api {
    pub use crate::decode16::{
        encode_alu16, encode_bf16, encode_bkpt16, encode_br16, encode_bt16, encode_cmp16,
        encode_jmp16, encode_jsr16, encode_ld16, encode_lrw16, encode_movi16, encode_pop16,
        encode_push16, encode_shift16, encode_st16,
    };
    pub use crate::decode32::{
        encode_alu32, encode_bez32, encode_bnez32, encode_br32, encode_bsr32, encode_dsp32,
        encode_fls32, encode_fpu32, encode_guarded32, encode_imm12, encode_jmp32, encode_jmpi32,
        encode_jmpix32, encode_jsr32, encode_jsri32, encode_ld32, encode_ldm32, encode_ldr32,
        encode_lrw32, encode_mfcr32, encode_movi32, encode_movih32, encode_mtcr32,
        encode_psrclr32, encode_psrset32, encode_st32, encode_stm32, encode_str32, encode_sys32,
        encode_vop32,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insn_len_rule() {
        assert_eq!(insn_len(0x0000), 2);
        assert_eq!(insn_len(0x2a05), 2);
        assert_eq!(insn_len(0xbfff), 2);
        assert_eq!(insn_len(0xc000), 4);
        assert_eq!(insn_len(0xffff), 4);
    }
}
