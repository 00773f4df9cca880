//! Mirror a source tree into an output tree, transforming scripts on the way
//! and recompiling files whose declared dependencies change.

pub mod compile;
pub mod config;
pub mod deps;
pub mod error;
pub mod ignore_rules;
pub mod parser;
pub mod paths;
pub mod session;
pub mod supervisor;
pub mod transform;
pub mod walker;
pub mod watcher;
