//! Shared proptest strategies for the builder/aggregator property tests

use proptest::prelude::*;

use crate::snapshot::{ClassEntry, LoaderInfo, Snapshot};

pub const IMPLEMENTATIONS: &[&str] = &[
    "jdk.internal.loader.ClassLoaders$PlatformClassLoader",
    "jdk.internal.loader.ClassLoaders$AppClassLoader",
    "org.apache.catalina.loader.ParallelWebappClassLoader",
    "com.acme.plugin.PluginClassLoader",
    "jdk.internal.reflect.DelegatingClassLoader",
];

/// Loader ids start here so they never look like indices
pub const FIRST_LOADER_ID: u64 = 100;

fn class_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => (prop::collection::vec("[a-z]{1,6}", 1..=4), "[A-Z][a-zA-Z0-9]{0,8}")
            .prop_map(|(pkg, class)| format!("{}.{}", pkg.join("."), class)),
        1 => "[A-Z][a-zA-Z0-9]{0,8}",
        1 => "\\[L[a-z]{1,4}\\.[a-z]{1,4}\\.[A-Z][a-z]{0,4};",
    ]
}

/// Random acyclic snapshot: loader `i` may only have a parent with a smaller index
pub fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    (0usize..8).prop_flat_map(|loader_count| {
        let parents: Vec<BoxedStrategy<Option<usize>>> = (0..loader_count)
            .map(|i| {
                if i == 0 {
                    Just(None).boxed()
                } else {
                    prop::option::of(0..i).boxed()
                }
            })
            .collect();
        let implementations =
            prop::collection::vec(prop::sample::select(IMPLEMENTATIONS.to_vec()), loader_count);
        let classes = prop::collection::vec(
            (class_name_strategy(), prop::option::of(0..loader_count.max(1))),
            0..40,
        );

        (parents, implementations, classes).prop_map(move |(parents, implementations, classes)| {
            let loaders = parents
                .iter()
                .zip(implementations.iter())
                .enumerate()
                .map(|(i, (parent, implementation))| {
                    LoaderInfo::new(
                        FIRST_LOADER_ID + i as u64,
                        implementation,
                        parent.map(|p| FIRST_LOADER_ID + p as u64),
                    )
                })
                .collect();
            let classes = classes
                .iter()
                .map(|(name, loader)| {
                    let loader = loader
                        .filter(|&i| i < loader_count)
                        .map(|i| FIRST_LOADER_ID + i as u64);
                    ClassEntry::new(name, loader)
                })
                .collect();

            Snapshot::new(loaders, classes).expect("generated snapshot is acyclic")
        })
    })
}
