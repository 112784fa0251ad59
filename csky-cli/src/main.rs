//! CSKY 平坦镜像运行器
//!
//! 把平坦二进制镜像装入客户机内存，从入口地址解释执行到停机或
//! 预算用尽，随后打印运行摘要与寄存器现场。不带 `--kernel` 时
//! 运行内置自检程序。

use std::fs;
use std::process;
use std::time::Instant;

use clap::{Arg, ArgAction, Command};
use log::{debug, error, info};

use csky_core::{CoreConfig, CoreError, CpuModel, CpuState, FlatRam, GuestMem, MemCtx};
use csky_engine::{ExitReason, Vcpu};
use csky_frontend::api::{encode_alu16, encode_movi16, encode_sys32};
use csky_frontend::{disasm, insn_len};

/// 解析十进制或 0x 前缀十六进制的地址/大小参数。
fn parse_u32(s: &str) -> Result<u32, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

/// 内置自检程序：r2 = 5，r3 = 7，r3 += r2，wait 停机。
fn self_test_image() -> Vec<u8> {
    let mut img = Vec::new();
    for hw in [
        encode_movi16(2, 5),
        encode_movi16(3, 7),
        encode_alu16(0, 3, 2),
    ] {
        img.extend_from_slice(&hw.to_le_bytes());
    }
    let wait = encode_sys32(3, 0);
    img.extend_from_slice(&((wait >> 16) as u16).to_le_bytes());
    img.extend_from_slice(&(wait as u16).to_le_bytes());
    img
}

/// 取当前 PC 处的指令并按 debug 级别打印反汇编。取指走 MMU，
/// 失败时留给执行路径上报异常，这里直接略过。
fn trace_insn(vcpu: &mut Vcpu<FlatRam>) {
    let pc = vcpu.cpu.pc;
    let ctx = if vcpu.cpu.supervisor() {
        MemCtx::supervisor(vcpu.cpu.world())
    } else {
        MemCtx::user(vcpu.cpu.world())
    };
    let Ok(hw0) = vcpu.mmu.fetch(pc, 2, ctx) else {
        return;
    };
    let hw0 = hw0 as u16;
    let hw1 = if insn_len(hw0) == 4 {
        vcpu.mmu
            .fetch(pc.wrapping_add(2), 2, ctx)
            .ok()
            .map(|v| v as u16)
    } else {
        None
    };
    debug!("{pc:#010x}  {}", disasm(hw0, hw1, pc));
}

/// 单步驱动：每步之前可选打印反汇编，直到停机、关停或预算用尽。
fn run_stepping(
    vcpu: &mut Vcpu<FlatRam>,
    budget: u64,
    trace: bool,
) -> Result<ExitReason, CoreError> {
    loop {
        if vcpu.cpu.stats.insns >= budget {
            return Ok(ExitReason::InsnLimit);
        }
        if trace {
            trace_insn(vcpu);
        }
        let exit = vcpu.run(1)?;
        if exit != ExitReason::SingleStep {
            return Ok(exit);
        }
    }
}

/// 退出原因的中文摘要。
fn exit_text(exit: ExitReason) -> String {
    match exit {
        ExitReason::Halted(kind) => format!("{kind:?} 停机"),
        ExitReason::Shutdown => "stop 关停".into(),
        ExitReason::Breakpoint => "断点".into(),
        ExitReason::SingleStep => "单步".into(),
        ExitReason::InsnLimit => "指令预算用尽".into(),
    }
}

/// 打印通用寄存器与关键控制寄存器现场。
fn dump_regs(cpu: &CpuState) {
    println!("\n==== 寄存器现场 ====");
    for row in 0..8 {
        let mut line = String::new();
        for col in 0..4 {
            let i = row * 4 + col;
            line.push_str(&format!("r{i:<2} {:08x}  ", cpu.regs[i]));
        }
        println!("{}", line.trim_end());
    }
    println!(
        "pc  {:08x}  psr {:08x}  vbr {:08x}  epc {:08x}",
        cpu.pc,
        cpu.psr_read(),
        cpu.vbr(),
        cpu.epc()
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("csky-cli")
        .version("0.1.0")
        .about("CSKY 平坦镜像运行器")
        .arg(
            Arg::new("kernel")
                .long("kernel")
                .short('k')
                .value_name("FILE")
                .help("客户机镜像（平坦二进制），缺省运行内置自检程序"),
        )
        .arg(
            Arg::new("base")
                .long("base")
                .value_name("ADDR")
                .help("镜像装载地址（支持 0x 前缀）")
                .default_value("0x0"),
        )
        .arg(
            Arg::new("entry")
                .long("entry")
                .value_name("ADDR")
                .help("复位入口地址（缺省与 --base 相同）"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .short('M')
                .value_name("NAME")
                .help("处理器型号 (ck610, ck803, ck807, ck810, ck860)")
                .default_value("ck810"),
        )
        .arg(
            Arg::new("mem-size")
                .long("mem-size")
                .short('m')
                .value_name("BYTES")
                .help("客户机内存大小（支持 0x 前缀）")
                .default_value("0x400000"),
        )
        .arg(
            Arg::new("max-insns")
                .long("max-insns")
                .short('n')
                .value_name("COUNT")
                .help("指令预算，0 表示不限")
                .default_value("0"),
        )
        .arg(
            Arg::new("step")
                .long("step")
                .action(ArgAction::SetTrue)
                .help("单步模式，每条指令回到主循环一次"),
        )
        .arg(
            Arg::new("trace")
                .long("trace")
                .short('t')
                .action(ArgAction::SetTrue)
                .help("逐条打印反汇编（debug 日志级别，隐含 --step）"),
        )
        .arg(
            Arg::new("vectored")
                .long("vectored")
                .action(ArgAction::SetTrue)
                .help("外部中断使用向量模式（向量号 32+n）"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("提高日志级别（-v 调试，-vv 跟踪）"),
        )
        .get_matches();

    let step = matches.get_flag("step");
    let trace = matches.get_flag("trace");
    let verbose = matches.get_count("verbose");
    let default_level = if verbose >= 2 {
        "trace"
    } else if verbose == 1 || trace {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", default_level))
        .init();

    let model_arg = matches.get_one::<String>("model").unwrap();
    let model = match model_arg.parse::<CpuModel>() {
        Ok(m) => m,
        Err(_) => {
            eprintln!("未知的处理器型号: {model_arg}");
            eprintln!("支持的型号: ck610, ck803, ck807, ck810, ck860");
            process::exit(1);
        }
    };

    let base = parse_u32(matches.get_one::<String>("base").unwrap())?;
    let entry = match matches.get_one::<String>("entry") {
        Some(s) => parse_u32(s)?,
        None => base,
    };
    let mem_size = parse_u32(matches.get_one::<String>("mem-size").unwrap())? as usize;
    let max_insns: u64 = matches.get_one::<String>("max-insns").unwrap().parse()?;
    let budget = if max_insns == 0 { u64::MAX } else { max_insns };

    let kernel = matches.get_one::<String>("kernel");
    let image = match kernel {
        Some(path) => match fs::read(path) {
            Ok(img) => img,
            Err(e) => {
                error!("读取镜像 {path} 失败: {e}");
                process::exit(1);
            }
        },
        None => {
            info!("未指定镜像，运行内置自检程序");
            self_test_image()
        }
    };
    if base as u64 + image.len() as u64 > mem_size as u64 {
        error!(
            "镜像超出内存范围: 装载 {:#x}+{:#x}，内存 {:#x}",
            base,
            image.len(),
            mem_size
        );
        process::exit(1);
    }

    info!("=== CSKY 虚拟处理器 ===");
    info!("型号: {model}");
    info!("内存: {} KiB", mem_size / 1024);
    info!(
        "装载: {:#010x}（{} 字节），入口 {:#010x}",
        base,
        image.len(),
        entry
    );

    let cfg = CoreConfig {
        model,
        entry,
        vectored_irq: matches.get_flag("vectored"),
        single_step: step || trace,
        ..Default::default()
    };
    let mut ram = FlatRam::new(0, mem_size);
    ram.load(base, &image);
    let mut vcpu = Vcpu::new(&cfg, ram);

    let start = Instant::now();
    let result = if cfg.single_step {
        run_stepping(&mut vcpu, budget, trace)
    } else {
        vcpu.run(budget)
    };
    let elapsed = start.elapsed();

    let exit = match result {
        Ok(e) => e,
        Err(e) => {
            error!("运行中止: {e}");
            process::exit(1);
        }
    };

    let stats = &vcpu.cpu.stats;
    println!("\n==== 运行摘要 ====");
    println!("退出原因: {}", exit_text(exit));
    println!("执行时间: {} ms", elapsed.as_millis());
    println!(
        "指令数: {} ({:.2} MIPS)",
        stats.insns,
        stats.insns as f64 / elapsed.as_secs_f64() / 1_000_000.0
    );
    println!(
        "翻译块: 执行 {} / 翻译 {} / 缓存命中 {}",
        stats.blocks, stats.translations, stats.block_cache_hits
    );
    println!("访存: 装载 {} / 存储 {}", stats.loads, stats.stores);
    println!("异常: {}（其中外部中断 {}）", stats.exceptions, stats.interrupts);
    dump_regs(&vcpu.cpu);

    if kernel.is_none() {
        info!("自检结果:");
        info!("  r2 = {} (期望 5)", vcpu.cpu.regs[2]);
        info!("  r3 = {} (期望 12)", vcpu.cpu.regs[3]);
    }

    // 预算用尽以独立退出码上报，便于脚本区分自然停机与失控
    if exit == ExitReason::InsnLimit {
        process::exit(2);
    }
    Ok(())
}
