use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use classloading_stats::cli::{self, Command};

/// JVM ClassLoader Statistics
///
/// 从 ClassLoader 快照统计每类加载器的实例数、加载类数量与 package 列表
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 日志级别 (RUST_LOG 优先)
    #[arg(long, default_value = "info", global = true, value_parser = cli::parse_log_level)]
    log_level: Level,

    /// 输出 JSON 格式 (默认输出人类可读的表格)
    #[arg(long, global = true)]
    json: bool,

    /// 配置文件 (默认 ./classloading-stats.yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志 (stdout 留给报告)
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level).into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    cli::handle_command(args.command, args.json, args.config.as_deref())
}
