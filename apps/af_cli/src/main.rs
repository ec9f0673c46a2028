// apps/af_cli/src/main.rs

//! AstroFlow 命令行界面
//!
//! 检查点文件巡检与运行配置校验的命令行工具。
//!
//! # 架构层级
//!
//! 本模块属于 **Layer 5: Application**：只消费 `af_core` 的配置
//! 类型和 `af_io` 的读取接口，不触碰引擎内部。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// AstroFlow 检查点工具
#[derive(Parser)]
#[command(name = "af_cli")]
#[command(author = "AstroFlow Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AstroFlow particle-simulation checkpoint tools", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 显示检查点文件的头部与组件统计
    Info(commands::info::InfoArgs),
    /// 校验运行配置
    Validate(commands::validate::ValidateArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 执行命令
    match cli.command {
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    }
}
