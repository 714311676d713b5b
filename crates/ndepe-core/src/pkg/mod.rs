//! Package-level building blocks for the emit pipeline.
//!
//! Provides utilities for:
//! - Parsing package locations out of `node_modules` paths
//! - Reading and rewriting `package.json` manifests
//! - Loose version comparison
//! - Creating symlinks/junctions inside the output `node_modules`

pub mod error;
pub mod link;
pub mod location;
pub mod manifest;
pub mod version;

pub use error::{codes as pkg_codes, PkgError};
pub use link::{is_link, link_package, LinkOutcome, LinkRecord};
pub use location::{
    is_path_segment, is_valid_package_name, isolated_node_modules, isolated_package_dir,
    PackageId, PackageLocation, ISOLATED_DIR, NODE_MODULES,
};
pub use manifest::{
    apply_publish_exports, manifest_name, manifest_version, read_manifest, read_manifest_async,
    stand_in_manifest, ManifestError, FALLBACK_VERSION, PACKAGE_JSON,
};
pub use version::compare_loose;
