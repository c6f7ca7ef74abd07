//! Structural edits on the lossless tree.
//!
//! Each mutator validates before it touches anything, so a failed call
//! leaves the tree as it was.

use crate::yaml::errors::YamlError;
use crate::yaml::node::{Entry, Item, Layout, Mapping, Node, Sequence, Slot};
use crate::yaml::render::{self, Fragment};
use serde_yaml::Value;

/// Where a new mapping entry goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Right after the entry at this index.
    After(usize),
    AtEnd,
}

impl Placement {
    /// `After(index)` when an anchor is known, otherwise `AtEnd`.
    pub fn after_or_end(anchor: Option<usize>) -> Self {
        anchor.map_or(Placement::AtEnd, Placement::After)
    }
}

/// Sets the text of a scalar node, keeping its quoting or block style.
/// Returns whether anything changed.
pub fn rename_scalar(node: &mut Node, value: &str) -> Result<bool, YamlError> {
    let Node::Scalar(scalar) = node else {
        return Err(YamlError::shape(format!(
            "expected a scalar, found {}",
            node.kind()
        )));
    };
    if scalar.value() == value {
        return Ok(false);
    }
    scalar.set_value(value);
    Ok(true)
}

/// Inserts `key: value` into `mapping` and returns the new entry's index.
pub fn insert_entry(
    mapping: &mut Mapping,
    placement: Placement,
    key: &str,
    value: &Value,
    fragment: &Fragment,
) -> Result<usize, YamlError> {
    if mapping.contains_key(key) {
        return Err(YamlError::DuplicateKey {
            key: key.to_string(),
        });
    }
    let position = match placement {
        Placement::After(index) if index < mapping.entries.len() => index + 1,
        Placement::After(index) => {
            return Err(YamlError::not_found(format!(
                "entry #{index} of a mapping with {} entries",
                mapping.entries.len()
            )))
        }
        Placement::AtEnd => mapping.entries.len(),
    };

    let entry = match &mapping.layout {
        Layout::Block { indent, .. } => fragment.entry(key, value, *indent)?,
        Layout::Flow { .. } => flow_entry(key, value)?,
    };
    if mapping.is_block() && position > 0 {
        mapping.entries[position - 1].slot.ensure_newline();
    }
    mapping.entries.insert(position, entry);
    Ok(position)
}

/// Appends `values` to the end of `sequence`.
pub fn append_items(sequence: &mut Sequence, values: &[Value], fragment: &Fragment) -> Result<(), YamlError> {
    let items = match &sequence.layout {
        Layout::Block { indent, .. } => fragment.items(values, *indent)?,
        Layout::Flow { .. } => values
            .iter()
            .map(|value| {
                Ok(Item {
                    leading: String::new(),
                    prefix: String::new(),
                    slot: flow_slot(render::flow_node(value, None)?),
                })
            })
            .collect::<Result<Vec<_>, YamlError>>()?,
    };
    if sequence.is_block() {
        if let Some(last) = sequence.items.last_mut() {
            last.slot.ensure_newline();
        }
    }
    sequence.items.extend(items);
    Ok(())
}

/// Appends the entries of `patch` to `mapping`. Keys already present are
/// rejected before anything is inserted.
pub fn merge_mapping(mapping: &mut Mapping, patch: &serde_yaml::Mapping, fragment: &Fragment) -> Result<(), YamlError> {
    let mut keys = Vec::with_capacity(patch.len());
    for (key, _) in patch {
        let key = key
            .as_str()
            .ok_or_else(|| YamlError::shape("mapping keys must be strings"))?;
        if mapping.contains_key(key) || keys.contains(&key) {
            return Err(YamlError::DuplicateKey {
                key: key.to_string(),
            });
        }
        keys.push(key);
    }
    for (key, value) in keys.into_iter().zip(patch.values()) {
        insert_entry(mapping, Placement::AtEnd, key, value, fragment)?;
    }
    Ok(())
}

/// Merges `patch` into the value held by `slot`.
///
/// A null value is replaced outright, sequences get the patch items
/// appended and mappings get the patch entries appended. Any other pairing
/// of shapes is an error.
pub fn merge(slot: &mut Slot, patch: &Value, fragment: &Fragment) -> Result<(), YamlError> {
    if slot.value.is_null() {
        let fresh = fragment.slot(slot.indicator(), patch, slot.indent)?;
        slot.replace_with(fresh);
        return Ok(());
    }
    match (&mut slot.value, patch) {
        (Node::Sequence(sequence), Value::Sequence(values)) => append_items(sequence, values, fragment),
        (Node::Mapping(mapping), Value::Mapping(entries)) => merge_mapping(mapping, entries, fragment),
        (node, patch) => Err(YamlError::shape(format!(
            "incompatible shapes for merge: cannot merge a {} into a {}",
            value_kind(patch),
            node.kind()
        ))),
    }
}

/// Removes every entry whose key is in `fields` and returns how many went.
pub fn prune_fields<S: AsRef<str>>(mapping: &mut Mapping, fields: &[S]) -> usize {
    let doomed = |entry: &Entry| fields.iter().any(|field| field.as_ref() == entry.key());
    if !mapping.entries.iter().any(doomed) {
        return 0;
    }
    let first_removed = mapping.entries.first().is_some_and(doomed);
    let before = mapping.entries.len();
    mapping.entries.retain(|entry| !doomed(entry));
    if mapping.is_compact() && first_removed {
        // The surviving first entry now shares the line with the dash.
        if let Some(first) = mapping.entries.first_mut() {
            first.leading.clear();
            first.prefix.clear();
        }
    }
    before - mapping.entries.len()
}

/// Prunes `fields` from every mapping held as the value of a mapping entry,
/// at any depth. Collections emptied this way become `{}`.
pub fn prune_tree<S: AsRef<str>>(node: &mut Node, fields: &[S]) -> usize {
    let mut removed = 0;
    match node {
        Node::Mapping(mapping) => {
            for entry in &mut mapping.entries {
                removed += prune_slot(&mut entry.slot, fields);
                removed += prune_tree(&mut entry.slot.value, fields);
            }
        }
        Node::Sequence(sequence) => {
            for item in &mut sequence.items {
                removed += prune_tree(&mut item.slot.value, fields);
            }
        }
        Node::Null(_) | Node::Scalar(_) => {}
    }
    removed
}

/// Prunes the mapping held by `slot`, if it holds one.
pub fn prune_slot<S: AsRef<str>>(slot: &mut Slot, fields: &[S]) -> usize {
    let removed = match &mut slot.value {
        Node::Mapping(mapping) => prune_fields(mapping, fields),
        _ => 0,
    };
    if removed > 0 {
        slot.collapse_empty();
    }
    removed
}

fn flow_entry(key: &str, value: &Value) -> Result<Entry, YamlError> {
    let Node::Scalar(key) = render::flow_node(&Value::String(key.to_string()), None)? else {
        return Err(YamlError::emit("flow key did not lay out as a scalar"));
    };
    Ok(Entry {
        leading: String::new(),
        prefix: String::new(),
        key,
        slot: flow_slot(render::flow_node(value, None)?),
    })
}

fn flow_slot(value: Node) -> Slot {
    Slot {
        sep: String::new(),
        value,
        tail: String::new(),
        indent: 0,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        _ => "scalar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yaml::Document;

    fn value(src: &str) -> Value {
        serde_yaml::from_str(src).unwrap()
    }

    fn package_mapping(document: &mut Document) -> &mut Mapping {
        document
            .root_mapping_mut()
            .unwrap()
            .get_mut("packages")
            .and_then(Node::as_sequence_mut)
            .and_then(|sequence| sequence.get_mut(0))
            .and_then(Node::as_mapping_mut)
            .unwrap()
    }

    #[test]
    fn rename_keeps_style_and_reports_changes() {
        let mut document = Document::parse("name: 'a/b' # keep\n").unwrap();
        let node = document.root_mapping_mut().unwrap().get_mut("name").unwrap();
        assert!(rename_scalar(node, "c/d").unwrap());
        assert!(!rename_scalar(node, "c/d").unwrap());
        assert_eq!(document.render(), "name: 'c/d' # keep\n");
    }

    #[test]
    fn rename_rejects_collections() {
        let mut document = Document::parse("name:\n  a: 1\n").unwrap();
        let node = document.root_mapping_mut().unwrap().get_mut("name").unwrap();
        assert!(matches!(rename_scalar(node, "x"), Err(YamlError::Shape { .. })));
    }

    #[test]
    fn insert_after_anchor_in_compact_mapping() {
        let mut document = Document::parse("packages:\n  - name: a/b\n    type: github_release\n").unwrap();
        let fragment = document.fragment();
        let mapping = package_mapping(&mut document);
        let index = insert_entry(mapping, Placement::After(0), "aliases", &value("- name: x/y"), &fragment).unwrap();
        assert_eq!(index, 1);
        assert_eq!(
            document.render(),
            "packages:\n  - name: a/b\n    aliases:\n      - name: x/y\n    type: github_release\n"
        );
    }

    #[test]
    fn insert_at_end_without_trailing_newline() {
        let mut document = Document::parse("a: 1").unwrap();
        let fragment = document.fragment();
        let root = document.root_mapping_mut().unwrap();
        insert_entry(root, Placement::AtEnd, "b", &value("2"), &fragment).unwrap();
        assert_eq!(document.render(), "a: 1\nb: 2\n");
    }

    #[test]
    fn insert_rejects_duplicates_and_bad_anchor() {
        let mut document = Document::parse("a: 1\n").unwrap();
        let fragment = document.fragment();
        let root = document.root_mapping_mut().unwrap();
        assert!(matches!(
            insert_entry(root, Placement::AtEnd, "a", &value("2"), &fragment),
            Err(YamlError::DuplicateKey { .. })
        ));
        assert!(insert_entry(root, Placement::After(5), "b", &value("2"), &fragment).is_err());
        assert_eq!(document.render(), "a: 1\n");
    }

    #[test]
    fn merge_replaces_null_and_keeps_comment() {
        let mut document = Document::parse("packages: # none yet\nother: 1\n").unwrap();
        let fragment = document.fragment();
        let slot = document.root_mapping_mut().unwrap().slot_mut("packages").unwrap();
        merge(slot, &value("- import: pkgs/a/b/pkg.yaml"), &fragment).unwrap();
        assert_eq!(
            document.render(),
            "packages: # none yet\n  - import: pkgs/a/b/pkg.yaml\nother: 1\n"
        );
    }

    #[test]
    fn merge_appends_to_sequences() {
        let mut document = Document::parse("packages:\n- import: a\n# tail comment\n").unwrap();
        let fragment = document.fragment();
        let slot = document.root_mapping_mut().unwrap().slot_mut("packages").unwrap();
        merge(slot, &value("- import: b"), &fragment).unwrap();
        assert_eq!(document.render(), "packages:\n- import: a\n- import: b\n# tail comment\n");
    }

    #[test]
    fn merge_appends_to_flow_sequences() {
        let mut document = Document::parse("aliases: [{name: a}] # flow\n").unwrap();
        let fragment = document.fragment();
        let slot = document.root_mapping_mut().unwrap().slot_mut("aliases").unwrap();
        merge(slot, &value("- name: b"), &fragment).unwrap();
        assert_eq!(document.render(), "aliases: [{name: a}, {name: b}] # flow\n");
    }

    #[test]
    fn merge_rejects_mismatched_shapes() {
        let mut document = Document::parse("a: text\n").unwrap();
        let fragment = document.fragment();
        let slot = document.root_mapping_mut().unwrap().slot_mut("a").unwrap();
        let err = merge(slot, &value("[1]"), &fragment).unwrap_err();
        assert!(err.to_string().contains("incompatible shapes for merge"));
    }

    #[test]
    fn merge_mapping_is_all_or_nothing() {
        let mut document = Document::parse("checksum:\n  type: github_release\n").unwrap();
        let fragment = document.fragment();
        let slot = document.root_mapping_mut().unwrap().slot_mut("checksum").unwrap();
        let err = merge(slot, &value("{path: x, type: y}"), &fragment).unwrap_err();
        assert!(matches!(err, YamlError::DuplicateKey { .. }));
        assert_eq!(document.render(), "checksum:\n  type: github_release\n");
    }

    #[test]
    fn prune_first_entry_of_compact_mapping() {
        let mut document = Document::parse("- pattern: x\n  # why\n  type: a\n- b\n").unwrap();
        let Node::Sequence(sequence) = document.root_mut() else { panic!("sequence expected") };
        let mapping = sequence.get_mut(0).and_then(Node::as_mapping_mut).unwrap();
        assert_eq!(prune_fields(mapping, &["pattern"]), 1);
        assert_eq!(document.render(), "- type: a\n- b\n");
    }

    #[test]
    fn prune_tree_collapses_emptied_mappings() {
        let src = "checksum:\n  file_format: regexp # old\n  pattern:\n    checksum: x\nkeep: 1\n";
        let mut document = Document::parse(src).unwrap();
        assert_eq!(prune_tree(document.root_mut(), &["file_format", "pattern"]), 2);
        assert_eq!(document.render(), "checksum: {}\nkeep: 1\n");
    }

    #[test]
    fn prune_tree_leaves_sequence_elements_alone() {
        let src = "items:\n  - pattern: keep\n    nested:\n      pattern: drop\n      other: 1\n";
        let mut document = Document::parse(src).unwrap();
        assert_eq!(prune_tree(document.root_mut(), &["pattern"]), 1);
        assert_eq!(
            document.render(),
            "items:\n  - pattern: keep\n    nested:\n      other: 1\n"
        );
    }
}
