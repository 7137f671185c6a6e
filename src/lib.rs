// ============================================================================
// JVM ClassLoader Statistics - Library Interface
// ============================================================================
//
// snapshot -> builder (loader nodes) -> aggregate (families) -> render
//
// The main binary (main.rs) drives these through the cli module.

pub mod aggregate;
pub mod builder;
pub mod cli;
pub mod config;
pub mod filter;
pub mod render;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing;
