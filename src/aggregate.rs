// ============================================================================
// 家族聚合 - 按 ClassLoader 实现类汇总
// ============================================================================
//
// Loader nodes are grouped by implementation name, not identity: 300 instances
// of `ParallelWebappClassLoader` collapse into one family with
// instance_count = 300, which is exactly the signal a redeploy leak leaves.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::builder::LoaderNode;

/// Totals for every loader sharing one implementation class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyStat {
    pub loaded_count: usize,
    pub instance_count: usize,
    pub namespaces: BTreeSet<String>,
}

impl FamilyStat {
    /// Contribution of a single loader instance
    pub fn from_node(node: &LoaderNode) -> Self {
        Self {
            loaded_count: node.defined_count,
            instance_count: 1,
            namespaces: node.namespaces.clone(),
        }
    }

    pub fn merge(&mut self, other: FamilyStat) {
        self.loaded_count += other.loaded_count;
        self.instance_count += other.instance_count;
        self.namespaces.extend(other.namespaces);
    }
}

/// Implementation name -> family totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FamilyReport {
    families: BTreeMap<String, FamilyStat>,
}

impl FamilyReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: &LoaderNode) {
        self.add(&node.implementation_name, FamilyStat::from_node(node));
    }

    fn add(&mut self, name: &str, stat: FamilyStat) {
        match self.families.get_mut(name) {
            Some(existing) => existing.merge(stat),
            None => {
                self.families.insert(name.to_string(), stat);
            }
        }
    }

    /// 合并另一个部分报告 (用于 Rayon 并行 reduce)
    pub fn merge(&mut self, other: FamilyReport) {
        for (name, stat) in other.families {
            self.add(&name, stat);
        }
    }

    pub fn get(&self, name: &str) -> Option<&FamilyStat> {
        self.families.get(name)
    }

    /// Families ordered by implementation name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FamilyStat)> {
        self.families.iter().map(|(name, stat)| (name.as_str(), stat))
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn total_loaded(&self) -> usize {
        self.families.values().map(|s| s.loaded_count).sum()
    }

    pub fn total_instances(&self) -> usize {
        self.families.values().map(|s| s.instance_count).sum()
    }
}

/// Group loader nodes into families
pub fn aggregate(nodes: &[LoaderNode]) -> FamilyReport {
    let mut report = FamilyReport::new();
    for node in nodes {
        report.add_node(node);
    }
    tracing::info!("Aggregated {} loaders into {} families", nodes.len(), report.len());
    report
}

/// Same result as [`aggregate`], computed as a rayon fold/reduce over
/// partial reports
pub fn aggregate_parallel(nodes: &[LoaderNode]) -> FamilyReport {
    let report = nodes
        .par_iter()
        .fold(FamilyReport::new, |mut partial, node| {
            partial.add_node(node);
            partial
        })
        .reduce(FamilyReport::new, |mut left, right| {
            left.merge(right);
            left
        });
    tracing::info!(
        "Aggregated {} loaders into {} families (parallel)",
        nodes.len(),
        report.len()
    );
    report
}
