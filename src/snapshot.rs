// ============================================================================
// 快照模块 - ClassLoader 快照加载与校验
// ============================================================================
//
// A snapshot is the frozen view of a JVM handed over by the capture agent:
// every loaded class with its defining loader, plus the loader table
// (implementation class + parent) needed to rebuild the hierarchy.
//
// Everything that can be wrong with a snapshot is rejected here, so the
// builder and aggregator never have to deal with dangling ids or cycles.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque loader identity as assigned by the capture agent
/// (typically the identity hash of the `ClassLoader` object).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoaderId(pub u64);

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{:x}", self.0)
    }
}

/// One non-bootstrap class loader referenced by the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderInfo {
    pub id: LoaderId,
    /// Concrete loader class, e.g. "org.apache.catalina.loader.ParallelWebappClassLoader"
    pub implementation: String,
    /// `None` means the parent is the bootstrap loader
    #[serde(default)]
    pub parent: Option<LoaderId>,
}

impl LoaderInfo {
    pub fn new(id: u64, implementation: &str, parent: Option<u64>) -> Self {
        Self {
            id: LoaderId(id),
            implementation: implementation.to_string(),
            parent: parent.map(LoaderId),
        }
    }
}

/// (class name, defining loader) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassEntry {
    /// Binary class name as returned by `Class.getName()`
    pub name: String,
    /// `None` for classes defined by the bootstrap loader
    #[serde(default)]
    pub loader: Option<LoaderId>,
}

impl ClassEntry {
    pub fn new(name: &str, loader: Option<u64>) -> Self {
        Self {
            name: name.to_string(),
            loader: loader.map(LoaderId),
        }
    }
}

/// On-disk layout, before validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawSnapshot {
    #[serde(default)]
    pid: Option<u32>,
    #[serde(default)]
    captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    loaders: Vec<LoaderInfo>,
    #[serde(default)]
    classes: Vec<ClassEntry>,
}

/// Snapshot file encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Yaml,
}

impl SnapshotFormat {
    /// Pick the format from the file extension; anything unknown is read as JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml") => {
                SnapshotFormat::Yaml
            }
            _ => SnapshotFormat::Json,
        }
    }
}

/// Validated, immutable snapshot
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub pid: Option<u32>,
    pub captured_at: Option<DateTime<Utc>>,
    classes: Vec<ClassEntry>,
    loaders: BTreeMap<LoaderId, LoaderInfo>,
}

impl Snapshot {
    /// Build a snapshot from its parts, validating the loader table
    ///
    /// Rejects:
    /// - duplicate loader ids
    /// - classes or parents that reference an undeclared loader
    /// - cyclic parent chains
    pub fn new(loaders: Vec<LoaderInfo>, classes: Vec<ClassEntry>) -> Result<Self> {
        let mut table = BTreeMap::new();
        for loader in loaders {
            let id = loader.id;
            if table.insert(id, loader).is_some() {
                bail!("duplicate loader id {id}");
            }
        }

        for loader in table.values() {
            if let Some(parent) = loader.parent {
                if !table.contains_key(&parent) {
                    bail!(
                        "loader {} ({}) references undeclared parent {parent}",
                        loader.id,
                        loader.implementation
                    );
                }
            }
        }

        for class in &classes {
            if let Some(id) = class.loader {
                if !table.contains_key(&id) {
                    bail!("class {} references undeclared loader {id}", class.name);
                }
            }
        }

        check_acyclic(&table)?;

        Ok(Self {
            pid: None,
            captured_at: None,
            classes,
            loaders: table,
        })
    }

    /// Read and validate a snapshot file (JSON or YAML, by extension)
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
        let snapshot = Self::parse(&content, SnapshotFormat::from_path(path))
            .with_context(|| format!("Invalid snapshot: {}", path.display()))?;

        tracing::info!(
            "Loaded snapshot {}: {} classes, {} loaders",
            path.display(),
            snapshot.class_count(),
            snapshot.loader_count()
        );
        Ok(snapshot)
    }

    pub fn parse(content: &str, format: SnapshotFormat) -> Result<Self> {
        let raw: RawSnapshot = match format {
            SnapshotFormat::Json => serde_json::from_str(content)?,
            SnapshotFormat::Yaml => serde_yaml::from_str(content)?,
        };

        let mut snapshot = Self::new(raw.loaders, raw.classes)?;
        snapshot.pid = raw.pid;
        snapshot.captured_at = raw.captured_at;
        Ok(snapshot)
    }

    pub fn classes(&self) -> &[ClassEntry] {
        &self.classes
    }

    pub fn loader(&self, id: LoaderId) -> Option<&LoaderInfo> {
        self.loaders.get(&id)
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn loader_count(&self) -> usize {
        self.loaders.len()
    }
}

/// Every parent chain must terminate at the bootstrap loader.
///
/// Chains already proven to terminate are remembered, so the whole table is
/// checked in O(loaders).
fn check_acyclic(loaders: &BTreeMap<LoaderId, LoaderInfo>) -> Result<()> {
    let mut terminated: HashSet<LoaderId> = HashSet::new();

    for &start in loaders.keys() {
        let mut path = Vec::new();
        let mut on_path = HashSet::new();
        let mut current = Some(start);

        while let Some(id) = current {
            if terminated.contains(&id) {
                break;
            }
            if !on_path.insert(id) {
                bail!("parent chain of loader {start} is cyclic (revisits {id})");
            }
            path.push(id);
            current = loaders.get(&id).and_then(|l| l.parent);
        }

        terminated.extend(path);
    }

    Ok(())
}
