//! Registry tool: format-preserving edits for an aqua package registry
//!
//! Registry files are hand-maintained YAML. Every command here reads a
//! file, decides what to change on a typed view, and writes the change
//! back through a lossless document model so comments, quoting, key order
//! and indentation outside the edited nodes survive byte for byte.
//!
//! # Commands
//!
//! - [`policy::move_package`]: rename a package directory and patch both files
//! - [`policy::patch_checksum`]: infer checksum configs from release assets
//! - [`policy::prune_files`]: drop legacy checksum parser fields
//! - [`policy::check_redirect`]: detect transferred repositories
//! - [`policy::plan_insert`]: add an import to a configuration file
//! - [`policy::generate_registry`]: rebuild the root `registry.yaml`, laid
//!   out afresh from every package's file
//!
//! # Safety
//!
//! - Writes verify the file still holds the text that was read
//! - Atomic file writes (tempfile + fsync + rename)
//! - Package paths stay under `pkgs/`
//! - UTF-8 validation
//! - Re-running a command on its own output is a no-op
//!
//! # Example
//!
//! ```
//! use registry_tool::yaml::{rename_scalar, Document};
//!
//! let mut doc = Document::parse("# cli\nname: cli/cli # id\n").unwrap();
//! let name = doc.root_mapping_mut().unwrap().get_mut("name").unwrap();
//! assert!(rename_scalar(name, "cli/gh").unwrap());
//! assert_eq!(doc.render(), "# cli\nname: cli/gh # id\n");
//! ```

pub mod config;
pub mod edit;
pub mod github;
pub mod logging;
pub mod policy;
pub mod registry;
pub mod safety;
pub mod yaml;

// Re-exports
pub use config::{discover, load_from_path, load_from_str, ConfigError, ToolConfig};
pub use edit::{EditError, EditResult, FilePlan, Fingerprint, Rewrite};
pub use policy::PolicyError;
pub use safety::{RegistryLayout, SafetyError};
pub use yaml::{Document, YamlError};
