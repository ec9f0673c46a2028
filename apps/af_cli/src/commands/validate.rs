// apps/af_cli/src/commands/validate.rs

//! 配置校验命令

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use af_core::RunConfig;

/// 校验参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 运行配置 (JSON) 路径
    pub config: PathBuf,
}

/// 执行校验命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    let config = RunConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    info!("configuration OK");
    info!("  runtag    : {}", config.runtag);
    info!("  outdir    : {}", config.outdir.display());
    info!("  nthreads  : {}", config.nthreads);
    info!("  rank      : {}/{}", config.rank, config.nprocs);
    info!("  multistep : {}", config.multistep);
    info!(
        "  checkpoint: nint={} nbeg={} precision={} nagg={}",
        config.checkpoint.nint,
        config.checkpoint.nbeg,
        config.checkpoint.precision,
        config.checkpoint.nagg
    );

    Ok(())
}
