// ============================================================================
// ClassLoader 家族构建 - 从 (类, 定义加载器) 列表重建加载器层级
// ============================================================================
//
// The snapshot only says which loader defined which class. The loader tree is
// rebuilt on demand: the first time a defining loader is seen, its parent chain
// is walked up to the bootstrap loader and every missing ancestor gets a node
// with zero defined classes.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::filter::FilterChain;
use crate::snapshot::{ClassEntry, LoaderId, LoaderInfo, Snapshot};

/// Implementation name reported for the bootstrap (null) loader
pub const BOOTSTRAP_LOADER_NAME: &str = "BootstrapClassLoader";

/// Identity of a loader node
///
/// The bootstrap loader is a distinct sentinel, never reached by following
/// `parent` links (a `None` parent ends the walk).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoaderIdentity {
    Bootstrap,
    Loader(LoaderId),
}

/// One loader instance with the classes it defined
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderNode {
    pub identity: LoaderIdentity,
    pub implementation_name: String,
    pub parent: Option<LoaderId>,
    pub defined_count: usize,
    pub namespaces: BTreeSet<String>,
}

impl LoaderNode {
    fn bootstrap() -> Self {
        Self {
            identity: LoaderIdentity::Bootstrap,
            implementation_name: BOOTSTRAP_LOADER_NAME.to_string(),
            parent: None,
            defined_count: 0,
            namespaces: BTreeSet::new(),
        }
    }

    fn for_loader(info: &LoaderInfo) -> Self {
        Self {
            identity: LoaderIdentity::Loader(info.id),
            implementation_name: info.implementation.clone(),
            parent: info.parent,
            defined_count: 0,
            namespaces: BTreeSet::new(),
        }
    }

    fn record_class(&mut self, class_name: &str) {
        self.defined_count += 1;
        if let Some(namespace) = namespace_of(class_name) {
            self.namespaces.insert(namespace.to_string());
        }
    }

    pub fn is_bootstrap(&self) -> bool {
        self.identity == LoaderIdentity::Bootstrap
    }
}

/// Top-level namespace of a class: its first two name segments
///
/// - `java.lang.String` -> `java.lang`
/// - `Foo` -> `Foo` (fewer than two segments: the whole name)
/// - `[Ljava.lang.String;` -> `None` (array classes carry no package)
pub fn namespace_of(class_name: &str) -> Option<&str> {
    if class_name.starts_with('[') {
        return None;
    }
    match class_name.match_indices('.').nth(1) {
        Some((second_dot, _)) => Some(&class_name[..second_dot]),
        None => Some(class_name),
    }
}

/// Per-snapshot working state; dropped once `build` returns
struct LoaderFamilyBuilder<'a> {
    snapshot: &'a Snapshot,
    filters: &'a FilterChain,
    bootstrap: LoaderNode,
    nodes: HashMap<LoaderId, LoaderNode>,
    skipped: usize,
}

impl<'a> LoaderFamilyBuilder<'a> {
    fn new(snapshot: &'a Snapshot, filters: &'a FilterChain) -> Self {
        Self {
            snapshot,
            filters,
            bootstrap: LoaderNode::bootstrap(),
            nodes: HashMap::new(),
            skipped: 0,
        }
    }

    fn process(&mut self, entry: &ClassEntry) {
        let Some(loader_id) = entry.loader else {
            self.bootstrap.record_class(&entry.name);
            return;
        };

        // Snapshot::new guarantees every referenced loader is declared
        let snapshot = self.snapshot;
        let Some(info) = snapshot.loader(loader_id) else {
            tracing::warn!("Class {} references unknown loader {loader_id}", entry.name);
            self.skipped += 1;
            return;
        };

        if !self.filters.accept(info) {
            self.skipped += 1;
            return;
        }

        if !self.nodes.contains_key(&loader_id) {
            self.nodes.insert(loader_id, LoaderNode::for_loader(info));
            self.register_ancestors(info);
        }
        if let Some(node) = self.nodes.get_mut(&loader_id) {
            node.record_class(&entry.name);
        }
    }

    /// Create empty nodes for every ancestor not yet present.
    ///
    /// A present ancestor already has its whole chain registered, so the walk
    /// stops there.
    fn register_ancestors(&mut self, loader: &LoaderInfo) {
        let snapshot = self.snapshot;
        let mut parent = loader.parent;
        while let Some(parent_id) = parent {
            if self.nodes.contains_key(&parent_id) {
                break;
            }
            let Some(parent_info) = snapshot.loader(parent_id) else {
                tracing::warn!("Loader {} has unknown parent {parent_id}", loader.id);
                break;
            };
            self.nodes.insert(parent_id, LoaderNode::for_loader(parent_info));
            parent = parent_info.parent;
        }
    }

    fn finish(self) -> Vec<LoaderNode> {
        if self.skipped > 0 {
            tracing::debug!("Skipped {} classes from filtered loaders", self.skipped);
        }

        let mut loaders: Vec<LoaderNode> = self.nodes.into_values().collect();
        loaders.sort_by_key(|node| node.identity);

        let mut result = Vec::with_capacity(loaders.len() + 1);
        result.push(self.bootstrap);
        result.extend(loaders);
        result
    }
}

/// Build one node per loader instance referenced by the snapshot
///
/// The bootstrap node is always first; the rest follow in loader id order.
/// Classes whose defining loader is rejected by `filters` are skipped
/// entirely. Such a loader still appears (with its own classes uncounted) if
/// it is an ancestor of an accepted loader.
pub fn build(snapshot: &Snapshot, filters: &FilterChain) -> Vec<LoaderNode> {
    let mut builder = LoaderFamilyBuilder::new(snapshot, filters);
    for entry in snapshot.classes() {
        builder.process(entry);
    }

    let nodes = builder.finish();
    tracing::info!(
        "Built {} loader nodes from {} classes",
        nodes.len(),
        snapshot.class_count()
    );
    nodes
}
