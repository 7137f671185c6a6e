// ============================================================================
// 过滤器模块 - 排除不关心的 ClassLoader
// ============================================================================
//
// Filters only decide whether a *defining* loader's classes are counted.
// The bootstrap loader and loaders discovered while walking a parent chain
// are never filtered.

use std::collections::HashSet;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::{FilterConfig, DEFAULT_REFLECTION_LOADERS};
use crate::snapshot::LoaderInfo;

/// Predicate over a defining loader
pub trait LoaderFilter: Send + Sync {
    /// `false` drops every class this loader defined
    fn accept(&self, loader: &LoaderInfo) -> bool;

    /// Short label used in logs
    fn describe(&self) -> String;
}

/// Rejects an explicit set of implementation names
#[derive(Debug, Clone)]
pub struct ImplementationFilter {
    excluded: HashSet<String>,
}

impl ImplementationFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Rejects reflection-delegate loaders (`DelegatingClassLoader`)
    ///
    /// The JVM creates one of these per inflated reflective accessor. A busy
    /// process can hold thousands of them, each defining a single
    /// `GeneratedMethodAccessorN` class.
    pub fn reflection_loaders() -> Self {
        Self::new(DEFAULT_REFLECTION_LOADERS.iter().copied())
    }
}

impl LoaderFilter for ImplementationFilter {
    fn accept(&self, loader: &LoaderInfo) -> bool {
        !self.excluded.contains(&loader.implementation)
    }

    fn describe(&self) -> String {
        format!("excluded implementations ({})", self.excluded.len())
    }
}

/// Rejects implementation names matching any pattern
#[derive(Debug, Clone)]
pub struct PatternFilter {
    patterns: Vec<Regex>,
}

impl PatternFilter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("Invalid exclude pattern: {p}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }
}

impl LoaderFilter for PatternFilter {
    fn accept(&self, loader: &LoaderInfo) -> bool {
        !self.patterns.iter().any(|re| re.is_match(&loader.implementation))
    }

    fn describe(&self) -> String {
        let patterns: Vec<&str> = self.patterns.iter().map(|re| re.as_str()).collect();
        format!("patterns [{}]", patterns.join(", "))
    }
}

/// Conjunction of filters: a loader is accepted only if every filter accepts it.
/// An empty chain accepts everything.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn LoaderFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: impl LoaderFilter + 'static) -> Self {
        self.push(filter);
        self
    }

    pub fn push(&mut self, filter: impl LoaderFilter + 'static) {
        self.filters.push(Box::new(filter));
    }

    /// Build the chain described by the configuration
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        let mut chain = Self::new();

        if config.exclude_reflection {
            chain.push(ImplementationFilter::new(config.reflection_loaders.iter().cloned()));
        }
        if !config.exclude.is_empty() {
            chain.push(ImplementationFilter::new(config.exclude.iter().cloned()));
        }
        if !config.exclude_patterns.is_empty() {
            chain.push(PatternFilter::new(&config.exclude_patterns)?);
        }

        for filter in &chain.filters {
            tracing::debug!("Loader filter enabled: {}", filter.describe());
        }
        Ok(chain)
    }

    pub fn accept(&self, loader: &LoaderInfo) -> bool {
        self.filters.iter().all(|f| f.accept(loader))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.describe()))
            .finish()
    }
}
