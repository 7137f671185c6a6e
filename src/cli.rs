//! CLI 模式处理器
//!
//! 提供命令行接口，默认输出人类可读格式
//! 使用 --json 参数可输出 JSON 格式

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::{json, Value};
use tracing::Level;

use crate::aggregate::{aggregate, aggregate_parallel};
use crate::builder::{build, LoaderNode};
use crate::config::{Config, SortOrder, DEFAULT_REFLECTION_LOADERS};
use crate::filter::FilterChain;
use crate::render;
use crate::snapshot::Snapshot;

/// Snapshot selection and loader exclusion, shared by `report` and `loaders`
#[derive(Args, Debug, Clone, Default)]
pub struct SnapshotArgs {
    /// 快照文件 (.json / .yml)
    #[arg(short, long)]
    pub snapshot: PathBuf,

    /// 排除反射委托加载器 (DelegatingClassLoader)
    #[arg(long)]
    pub exclude_reflection: bool,

    /// 排除指定实现类的加载器 (可重复)
    #[arg(long = "exclude", value_name = "CLASS")]
    pub exclude: Vec<String>,

    /// 排除实现类名匹配正则的加载器 (可重复)
    #[arg(long = "exclude-pattern", value_name = "REGEX")]
    pub exclude_patterns: Vec<String>,
}

/// CLI Commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// 📊 ClassLoader 家族统计
    Report {
        #[command(flatten)]
        source: SnapshotArgs,

        /// 排序方式
        #[arg(long, value_enum)]
        sort: Option<SortOrder>,

        /// 不输出 package 列表
        #[arg(long)]
        no_namespaces: bool,

        /// 使用 Rayon 并行聚合
        #[arg(long)]
        parallel: bool,
    },

    /// 🔍 列出每个 ClassLoader 实例
    Loaders {
        #[command(flatten)]
        source: SnapshotArgs,
    },

    /// ℹ️ 状态
    Status,
}

/// 处理 CLI 命令
///
/// json_output: 是否输出 JSON 格式（默认 false，输出人类可读格式）
pub fn handle_command(cmd: Command, json_output: bool, config_path: Option<&Path>) -> Result<()> {
    let result = Config::load(config_path).and_then(|config| match cmd {
        Command::Report {
            source,
            sort,
            no_namespaces,
            parallel,
        } => {
            let config = apply_overrides(config, &source, sort, no_namespaces);
            run_report(&source.snapshot, &config, parallel, json_output)
        }

        Command::Loaders { source } => {
            let config = apply_overrides(config, &source, None, false);
            run_loaders(&source.snapshot, &config, json_output)
        }

        Command::Status => Ok(status(&config, json_output)),
    });

    // 输出结果
    match result {
        Ok(value) => {
            if json_output {
                let output = json!({
                    "success": true,
                    "data": value
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print_value(&value);
            }
        }
        Err(e) => {
            if json_output {
                let output = json!({
                    "success": false,
                    "error": format!("{e:#}")
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                // 不经过 tracing: 日志级别过滤不能吞掉错误
                eprintln!("{}", error_message(&e));
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

/// `--log-level` 解析: 只接受 trace/debug/info/warn/error (或 1-5)
pub fn parse_log_level(value: &str) -> Result<Level, String> {
    Level::from_str(value).map_err(|_| {
        format!("unknown log level '{value}' (expected trace, debug, info, warn or error)")
    })
}

/// Text-mode error line, with the full context chain
pub fn error_message(e: &anyhow::Error) -> String {
    format!("Error: {e:#}")
}

/// CLI flags win over the config file; exclusion lists are appended
pub fn apply_overrides(
    mut config: Config,
    source: &SnapshotArgs,
    sort: Option<SortOrder>,
    no_namespaces: bool,
) -> Config {
    if source.exclude_reflection {
        config.filters.exclude_reflection = true;
    }
    config.filters.exclude.extend(source.exclude.iter().cloned());
    config
        .filters
        .exclude_patterns
        .extend(source.exclude_patterns.iter().cloned());

    if let Some(sort) = sort {
        config.output.sort = sort;
    }
    if no_namespaces {
        config.output.show_namespaces = false;
    }
    config
}

/// snapshot -> loader nodes
pub fn collect_loaders(snapshot: &Snapshot, config: &Config) -> Result<Vec<LoaderNode>> {
    let filters = FilterChain::from_config(&config.filters)?;
    Ok(build(snapshot, &filters))
}

fn run_report(path: &Path, config: &Config, parallel: bool, json_output: bool) -> Result<Value> {
    let snapshot = Snapshot::load(path)?;
    let nodes = collect_loaders(&snapshot, config)?;
    let report = if parallel {
        aggregate_parallel(&nodes)
    } else {
        aggregate(&nodes)
    };

    if json_output {
        Ok(render::report_json(&report, &snapshot))
    } else {
        Ok(json!(render::render_table(&report, &config.output)))
    }
}

fn run_loaders(path: &Path, config: &Config, json_output: bool) -> Result<Value> {
    let snapshot = Snapshot::load(path)?;
    let nodes = collect_loaders(&snapshot, config)?;

    if json_output {
        Ok(serde_json::to_value(&nodes)?)
    } else {
        Ok(json!(render::render_loaders(&nodes)))
    }
}

fn status(config: &Config, json_output: bool) -> Value {
    let version = env!("CARGO_PKG_VERSION");
    if json_output {
        json!({
            "version": version,
            "defaultReflectionLoaders": DEFAULT_REFLECTION_LOADERS,
            "config": config,
        })
    } else {
        json!(format!(
            "ClassLoading Stats v{}\n\
            Default reflection loaders: {}\n\
            Reflection filter: {} | Sort: {:?} | Namespaces: {}",
            version,
            DEFAULT_REFLECTION_LOADERS.join(", "),
            if config.filters.exclude_reflection { "on" } else { "off" },
            config.output.sort,
            if config.output.show_namespaces { "shown" } else { "hidden" }
        ))
    }
}

/// 打印 Value，智能处理字符串和其他类型
fn print_value(value: &Value) {
    match value {
        Value::String(s) => println!("{}", s.trim_end()),
        _ => println!("{}", serde_json::to_string_pretty(value).unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_overrides_extend_config() {
        let mut config = Config::default();
        config.filters.exclude.push("FromFile".to_string());

        let source = SnapshotArgs {
            snapshot: PathBuf::from("s.json"),
            exclude_reflection: true,
            exclude: vec!["FromCli".to_string()],
            exclude_patterns: vec!["^groovy".to_string()],
        };
        let config = apply_overrides(config, &source, Some(SortOrder::Name), true);

        assert!(config.filters.exclude_reflection);
        assert_eq!(config.filters.exclude, vec!["FromFile", "FromCli"]);
        assert_eq!(config.filters.exclude_patterns, vec!["^groovy"]);
        assert_eq!(config.output.sort, SortOrder::Name);
        assert!(!config.output.show_namespaces);
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let config = Config::default();
        let source = SnapshotArgs {
            snapshot: PathBuf::from("s.json"),
            ..SnapshotArgs::default()
        };
        assert_eq!(apply_overrides(config.clone(), &source, None, false), config);
    }

    #[test]
    fn test_run_report_text() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"loaders": [{{"id": 1, "implementation": "PluginLoader"}}],
                "classes": [{{"name": "x.y.Z", "loader": 1}}, {{"name": "a.b.C"}}]}}"#
        )
        .unwrap();

        let value = run_report(file.path(), &Config::default(), false, false).unwrap();
        let text = value.as_str().unwrap();
        assert!(text.contains("PluginLoader"));
        assert!(text.contains("package list loaded by BootstrapClassLoader\na.b\n"));
    }

    #[test]
    fn test_run_loaders_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"loaders": [{{"id": 1, "implementation": "PluginLoader"}}],
                "classes": [{{"name": "x.y.Z", "loader": 1}}]}}"#
        )
        .unwrap();

        let value = run_loaders(file.path(), &Config::default(), true).unwrap();
        let nodes = value.as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["identity"], "bootstrap");
        assert_eq!(nodes[1]["implementationName"], "PluginLoader");
        assert_eq!(nodes[1]["definedCount"], 1);
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("warn"), Ok(Level::WARN));
        assert_eq!(parse_log_level("DEBUG"), Ok(Level::DEBUG));
        assert_eq!(parse_log_level("info"), Ok(Level::INFO));
    }

    #[test]
    fn test_parse_log_level_rejects_unknown() {
        let err = parse_log_level("verbose").unwrap_err();
        assert!(err.contains("verbose"));
        assert!(parse_log_level("").is_err());
    }

    #[test]
    fn test_error_message_carries_context() {
        let err = run_report(Path::new("/nonexistent/nope.json"), &Config::default(), false, false)
            .unwrap_err();
        let message = error_message(&err);
        assert!(message.starts_with("Error: "));
        assert!(message.contains("Failed to read snapshot: /nonexistent/nope.json"));
    }

    #[test]
    fn test_status_json() {
        let value = status(&Config::default(), true);
        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(value["defaultReflectionLoaders"].as_array().map(|a| a.len()), Some(2));
    }
}
