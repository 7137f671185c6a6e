//! 报告输出
//!
//! 人类可读的表格 (默认) 与 `--json` 使用的结构化输出。

use std::fmt::Write;

use chrono::Utc;
use serde_json::{json, Value};

use crate::aggregate::{FamilyReport, FamilyStat};
use crate::builder::{LoaderIdentity, LoaderNode};
use crate::config::{OutputConfig, SortOrder};
use crate::snapshot::Snapshot;

const RULE_WIDTH: usize = 94;

/// Families in display order; ties are broken by name
pub fn sorted_families(report: &FamilyReport, sort: SortOrder) -> Vec<(&str, &FamilyStat)> {
    let mut families: Vec<(&str, &FamilyStat)> = report.iter().collect();
    match sort {
        SortOrder::Loaded => families.sort_by(|a, b| {
            b.1.loaded_count.cmp(&a.1.loaded_count).then_with(|| a.0.cmp(b.0))
        }),
        SortOrder::Instances => families.sort_by(|a, b| {
            b.1.instance_count.cmp(&a.1.instance_count).then_with(|| a.0.cmp(b.0))
        }),
        // report.iter() is already name-ordered
        SortOrder::Name => {}
    }
    families
}

/// Family table followed by per-family package lists
pub fn render_table(report: &FamilyReport, options: &OutputConfig) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    let families = sorted_families(report, options.sort);
    let mut out = String::new();

    // writeln! into a String cannot fail
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "{}",
        format!("{:<60} {:<20} {:<20}", "classloaderName", "instanceCount", "loadedCount").trim_end()
    );
    for (name, stat) in &families {
        let row = format!("{:<60} {:<20} {:<20}", name, stat.instance_count, stat.loaded_count);
        let _ = writeln!(out, "{}", row.trim_end());
    }
    let _ = writeln!(out, "{rule}");

    if options.show_namespaces {
        for (name, stat) in &families {
            let _ = writeln!(out);
            let _ = writeln!(out, ">>>>>>>>>>>>>>>>>>>> package list loaded by {name}");
            for namespace in &stat.namespaces {
                let _ = writeln!(out, "{namespace}");
            }
        }
    }

    out
}

/// Per-instance view: one row per loader node
pub fn render_loaders(nodes: &[LoaderNode]) -> String {
    let rule = "-".repeat(RULE_WIDTH);
    let mut sorted: Vec<&LoaderNode> = nodes.iter().collect();
    sorted.sort_by(|a, b| {
        b.defined_count
            .cmp(&a.defined_count)
            .then_with(|| a.identity.cmp(&b.identity))
    });

    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "{}",
        format!("{:<18} {:<60} {:<18} {}", "loader", "implementation", "parent", "definedCount").trim_end()
    );
    for node in sorted {
        let row = format!(
            "{:<18} {:<60} {:<18} {}",
            identity_label(node.identity),
            node.implementation_name,
            node.parent.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            node.defined_count
        );
        let _ = writeln!(out, "{}", row.trim_end());
    }
    let _ = writeln!(out, "{rule}");
    out
}

fn identity_label(identity: LoaderIdentity) -> String {
    match identity {
        LoaderIdentity::Bootstrap => "bootstrap".to_string(),
        LoaderIdentity::Loader(id) => id.to_string(),
    }
}

/// Structured report for `--json`
pub fn report_json(report: &FamilyReport, snapshot: &Snapshot) -> Value {
    json!({
        "generatedAt": Utc::now().to_rfc3339(),
        "snapshot": {
            "pid": snapshot.pid,
            "capturedAt": snapshot.captured_at.map(|t| t.to_rfc3339()),
            "classes": snapshot.class_count(),
            "loaders": snapshot.loader_count(),
        },
        "families": report,
        "totals": {
            "families": report.len(),
            "instances": report.total_instances(),
            "classes": report.total_loaded(),
        }
    })
}
