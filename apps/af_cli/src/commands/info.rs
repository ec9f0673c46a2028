// apps/af_cli/src/commands/info.rs

//! 检查点巡检命令
//!
//! 打印检查点文件的主头部和逐组件统计，不加载粒子负载。

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use af_core::Precision;
use af_io::format::{component_block_size, MasterHeader};

/// 巡检参数
#[derive(Args)]
pub struct InfoArgs {
    /// 检查点或 dump 文件路径
    pub file: PathBuf,

    /// 文件使用的浮点精度（须与写方一致）
    #[arg(long, value_enum, default_value = "double")]
    pub precision: PrecisionArg,
}

/// 精度选项
#[derive(Clone, Copy, clap::ValueEnum)]
pub enum PrecisionArg {
    /// 单精度 (real4)
    Single,
    /// 双精度
    Double,
}

impl From<PrecisionArg> for Precision {
    fn from(arg: PrecisionArg) -> Self {
        match arg {
            PrecisionArg::Single => Precision::Single,
            PrecisionArg::Double => Precision::Double,
        }
    }
}

/// 执行巡检命令
pub fn execute(args: InfoArgs) -> Result<()> {
    let precision: Precision = args.precision.into();
    let (header, components) = af_io::read_summary(&args.file, precision)
        .with_context(|| format!("reading {}", args.file.display()))?;

    println!("file      : {}", args.file.display());
    println!("time      : {}", header.time);
    println!("ntot      : {}", header.ntot);
    println!("ncomp     : {}", header.ncomp);
    println!("precision : {precision}");
    println!();

    let mut offset = MasterHeader::SIZE as u64;
    for comp in &components {
        let block = component_block_size(comp.nbod, comp.niatr, comp.ndatr, precision);
        println!(
            "  [{:<20}] nbod={:<10} niatr={} ndatr={} block={} bytes @ offset {}",
            comp.name, comp.nbod, comp.niatr, comp.ndatr, block, offset
        );
        offset += block;
    }

    Ok(())
}
