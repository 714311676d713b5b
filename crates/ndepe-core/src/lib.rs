#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Materializes a pruned, deployable `node_modules` from a file trace.

pub mod config;
pub mod emit;
pub mod error;
pub mod pkg;
pub mod trace;
pub mod version;

pub use config::{load_config, CacheOptions, NdepeConfig};
pub use emit::{emit_dependencies, find_entry_files, EmitOptions, EmitReport};
pub use error::Error;
pub use pkg::{pkg_codes, PkgError};
pub use trace::{JsonTraceFile, StaticTracer, TraceGraph, TraceRequest, Tracer};
pub use version::{version_string, SCHEMA_VERSION, VERSION};
