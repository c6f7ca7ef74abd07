//! Appending `- import: <path>` to an aggregate configuration file.

use std::path::Path;

use serde_yaml::{Mapping as YamlMapping, Value};

use super::PolicyError;
use crate::edit::{self, FilePlan};
use crate::yaml::{merge, Document, YamlError};

/// Adds `{import: <import_path>}` to the document's `packages`.
///
/// `packages: null` is replaced by a one-item list; a list is appended to.
pub fn insert_import(document: &mut Document, import_path: &str) -> Result<(), YamlError> {
    if document.has_trailing_documents() {
        return Err(YamlError::Unsupported {
            message: "the configuration file must hold exactly one document".to_string(),
        });
    }
    let fragment = document.fragment();
    let slot = document
        .root_mapping_mut()?
        .slot_mut("packages")
        .ok_or_else(|| YamlError::not_found("packages"))?;

    let mut import = YamlMapping::new();
    import.insert(Value::from("import"), Value::from(import_path));
    merge(slot, &Value::Sequence(vec![Value::Mapping(import)]), &fragment)
}

pub fn plan_insert(config_path: &Path, import_path: &str) -> Result<FilePlan, PolicyError> {
    let text = edit::read_text(config_path)?;
    let mut document = Document::parse(&text).map_err(PolicyError::yaml(config_path))?;
    insert_import(&mut document, import_path).map_err(PolicyError::yaml(config_path))?;
    Ok(FilePlan::from_texts(
        config_path,
        &text,
        document.render(),
        "nothing to insert",
    ))
}
