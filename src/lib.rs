//! Session and project aggregation over an agent's on-disk task tree.
//!
//! Reads `<root>/tasks/<session>/*.json` task records, enriches them with
//! metadata from `<root>/projects/<encoded-path>/`, and offers cleanup and
//! note-append operations on top.

pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;
