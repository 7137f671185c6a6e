//! 配置模块
//!
//! 可选的 YAML 配置文件 (`classloading-stats.yml`)，CLI 参数可覆盖其中的值。
//!
//! ```yaml
//! filters:
//!   exclude_reflection: true
//!   reflection_loaders:
//!     - jdk.internal.reflect.DelegatingClassLoader
//!   exclude: []
//!   exclude_patterns: ["^groovy\\.lang\\."]
//! output:
//!   sort: loaded
//!   show_namespaces: true
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "classloading-stats.yml";

/// Loader implementations the JDK uses to define reflection accessor classes.
///
/// The name moved between JDK 8 (`sun.reflect`) and 9+ (`jdk.internal.reflect`),
/// so this is only a default: `filters.reflection_loaders` replaces it.
pub const DEFAULT_REFLECTION_LOADERS: &[&str] = &[
    "sun.reflect.DelegatingClassLoader",
    "jdk.internal.reflect.DelegatingClassLoader",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub filters: FilterConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Drop classes defined by reflection-delegate loaders
    pub exclude_reflection: bool,
    pub reflection_loaders: Vec<String>,
    /// Exact implementation names to drop
    pub exclude: Vec<String>,
    /// Regexes matched against implementation names
    pub exclude_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude_reflection: false,
            reflection_loaders: DEFAULT_REFLECTION_LOADERS.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub sort: SortOrder,
    pub show_namespaces: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sort: SortOrder::Loaded,
            show_namespaces: true,
        }
    }
}

/// Row order of the family table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Loaded class count, descending
    #[default]
    Loaded,
    /// Instance count, descending
    Instances,
    /// Implementation name, ascending
    Name,
}

impl Config {
    /// Resolve the effective configuration
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // 空文件视为默认配置
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.filters.exclude_reflection);
        assert_eq!(config.filters.reflection_loaders.len(), 2);
        assert_eq!(config.output.sort, SortOrder::Loaded);
        assert!(config.output.show_namespaces);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("filters:\n  exclude_reflection: true\n").unwrap();
        assert!(config.filters.exclude_reflection);
        assert_eq!(
            config.filters.reflection_loaders,
            vec![
                "sun.reflect.DelegatingClassLoader".to_string(),
                "jdk.internal.reflect.DelegatingClassLoader".to_string()
            ]
        );
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
filters:
  exclude_reflection: true
  reflection_loaders: [com.acme.AccessorLoader]
  exclude: [groovy.lang.GroovyClassLoader$InnerLoader]
  exclude_patterns: ["^org\\.codehaus\\."]
output:
  sort: name
  show_namespaces: false
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.filters.reflection_loaders, vec!["com.acme.AccessorLoader"]);
        assert_eq!(config.filters.exclude, vec!["groovy.lang.GroovyClassLoader$InnerLoader"]);
        assert_eq!(config.filters.exclude_patterns, vec![r"^org\.codehaus\."]);
        assert_eq!(config.output.sort, SortOrder::Name);
        assert!(!config.output.show_namespaces);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(Config::from_yaml("filters:\n  exclude_reflecton: true\n").is_err());
        assert!(Config::from_yaml("output:\n  sort: random\n").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/cfg.yml"))).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "output:\n  sort: instances").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.output.sort, SortOrder::Instances);
    }
}
