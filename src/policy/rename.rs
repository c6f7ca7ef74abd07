//! Package rename (`mv`).

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping as YamlMapping, Value};

use super::{packages_mut, PolicyError, RegistryFile};
use crate::edit::{Fingerprint, Rewrite};
use crate::registry::PackageInfo;
use crate::safety::RegistryLayout;
use crate::yaml::{
    insert_entry, merge, rename_scalar, Document, Mapping, MappingCursor, Node, Placement,
    YamlError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    pub pkg_file: PathBuf,
    pub registry_file: PathBuf,
    /// Whether a package name in `pkg.yaml` was rewritten.
    pub pkg_updated: bool,
}

/// Moves `pkgs/<old>` to `pkgs/<new>` and rewrites both files.
///
/// Both edits are planned against the old files before anything moves, so
/// a document that cannot be patched leaves the tree untouched.
pub fn move_package(
    layout: &RegistryLayout,
    old: &str,
    new: &str,
) -> Result<MoveReport, PolicyError> {
    if old == new {
        return Err(PolicyError::InvalidArgument(format!(
            "the new package name is the same as the old one: {old}"
        )));
    }
    let old_pkg = layout.validate_path(layout.pkg_file(old)?)?;
    let old_registry = layout.validate_path(layout.registry_file(old)?)?;
    let new_dir = layout.package_dir(new)?;
    let new_pkg = layout.pkg_file(new)?;
    let new_registry = layout.registry_file(new)?;
    for target in [&new_pkg, &new_registry] {
        if target.exists() {
            return Err(PolicyError::InvalidArgument(format!(
                "{} already exists",
                target.display()
            )));
        }
    }

    let mut registry = RegistryFile::read(&old_registry)?;
    let package = registry
        .config
        .find(old)
        .map(|(_, package)| package.clone())
        .ok_or_else(|| PolicyError::NotFound {
            what: format!("package {old}"),
            path: old_registry.clone(),
            suggestion: registry.config.closest_name(old),
        })?;
    rename_registry_document(&mut registry.document, &package, old, new)
        .map_err(PolicyError::yaml(&old_registry))?;

    let mut pkg = RegistryFile::read(&old_pkg)?;
    let pkg_updated = rename_package_document(&mut pkg.document, old, new)
        .map_err(PolicyError::yaml(&old_pkg))?;

    fs::create_dir_all(&new_dir).map_err(|source| PolicyError::Io {
        path: new_dir.clone(),
        source,
    })?;
    let moves = [
        Relocation::new(&registry, new_registry.clone()),
        Relocation::new(&pkg, new_pkg.clone()),
    ];
    if let Err(err) = relocate(&moves) {
        if fs::remove_dir(&new_dir).is_ok() {
            tracing::debug!(dir = %new_dir.display(), "remove the new package directory");
        }
        return Err(err);
    }
    if let Some(old_dir) = old_pkg.parent() {
        if fs::remove_dir(old_dir).is_ok() {
            tracing::debug!(dir = %old_dir.display(), "remove the empty package directory");
        }
    }

    Ok(MoveReport {
        pkg_file: new_pkg,
        registry_file: new_registry,
        pkg_updated,
    })
}

/// One file of a package move: where it is, what it held when it was
/// read, and the edited text that goes to its new path.
#[derive(Debug, Clone)]
struct Relocation {
    from: PathBuf,
    read: Fingerprint,
    to: PathBuf,
    text: String,
}

impl Relocation {
    fn new(file: &RegistryFile, to: PathBuf) -> Self {
        Self {
            from: file.path.clone(),
            read: Fingerprint::of(&file.text),
            to,
            text: file.document.render(),
        }
    }
}

/// Writes every new file, then removes the old ones.
///
/// An old file that changed since it was read, or a failed write, removes
/// the new files written so far and leaves the old ones in place.
fn relocate(moves: &[Relocation]) -> Result<(), PolicyError> {
    let mut written: Vec<&Path> = Vec::new();
    for relocation in moves {
        let result = relocation
            .read
            .verify(&relocation.from)
            .and_then(|_| Rewrite::new(&relocation.to, "", relocation.text.as_str()).apply());
        match result {
            Ok(_) => written.push(&relocation.to),
            Err(err) => {
                for path in written {
                    if let Err(error) = fs::remove_file(path) {
                        tracing::warn!(file_path = %path.display(), %error, "roll back a moved file");
                    }
                }
                return Err(err.into());
            }
        }
    }
    for relocation in moves {
        fs::remove_file(&relocation.from).map_err(|source| PolicyError::Io {
            path: relocation.from.clone(),
            source,
        })?;
        tracing::info!(
            from = %relocation.from.display(),
            to = %relocation.to.display(),
            "move a file"
        );
    }
    Ok(())
}

/// Renames `package` inside a `registry.yaml`.
///
/// `name` becomes `new`, `repo_owner`/`repo_name` take the first two
/// segments of `new`, and `old` is recorded as an alias: appended to an
/// existing `aliases` list, otherwise inserted as a new list right after
/// the field that held the identity.
pub fn rename_registry_document(
    document: &mut Document,
    package: &PackageInfo,
    old: &str,
    new: &str,
) -> Result<(), YamlError> {
    let fragment = document.fragment();
    let sequence = packages_mut(document)?
        .ok_or_else(|| YamlError::shape("packages must be a sequence"))?;

    let position = package.position;
    let node = sequence
        .get_mut(position)
        .ok_or_else(|| YamlError::not_found(format!("packages[{position}]")))?;
    let kind = node.kind();
    let mapping = node.as_mapping_mut().ok_or_else(|| {
        YamlError::shape(format!(
            "packages[{position}] is written as a {kind}, not a mapping, and can't be edited in place"
        ))
    })?;

    if let Some(node) = mapping.get_mut("name") {
        if node.as_str() == Some(old) {
            rename_scalar(node, new).map_err(|_| YamlError::shape("name must be a string"))?;
        }
    }
    let (new_owner, new_repo) = match new.split_once('/') {
        Some((owner, rest)) => (owner, rest.split('/').next()),
        None => (new, None),
    };
    rename_field(mapping, "repo_owner", Some(new_owner))?;
    rename_field(mapping, "repo_name", new_repo)?;

    let alias = Value::Sequence(vec![alias_value(old)]);
    if let Some(slot) = mapping.slot_mut("aliases") {
        return merge(slot, &alias, &fragment);
    }
    let anchor = if package.name.as_deref().is_some_and(|name| !name.is_empty()) {
        mapping.position("name")
    } else {
        mapping.position("repo_name")
    };
    insert_entry(
        mapping,
        Placement::after_or_end(anchor),
        "aliases",
        &alias,
        &fragment,
    )?;
    Ok(())
}

fn rename_field(mapping: &mut Mapping, key: &str, value: Option<&str>) -> Result<(), YamlError> {
    let (Some(node), Some(value)) = (mapping.get_mut(key), value) else {
        return Ok(());
    };
    rename_scalar(node, value).map_err(|_| YamlError::shape(format!("{key} must be a string")))?;
    Ok(())
}

fn alias_value(name: &str) -> Value {
    let mut alias = YamlMapping::new();
    alias.insert(Value::from("name"), Value::from(name));
    Value::Mapping(alias)
}

/// Renames the first package of a `pkg.yaml` whose `name` is `old` or
/// `old@<version>`, keeping the version. Returns whether one matched.
pub fn rename_package_document(
    document: &mut Document,
    old: &str,
    new: &str,
) -> Result<bool, YamlError> {
    let Some(sequence) = packages_mut(document)? else {
        return Ok(false);
    };
    let mut cursor = MappingCursor::new();
    while let Some(position) = cursor.next_index(sequence) {
        let Some(node) = sequence
            .get_mut(position)
            .and_then(Node::as_mapping_mut)
            .and_then(|mapping| mapping.get_mut("name"))
        else {
            continue;
        };
        let current = node
            .as_str()
            .ok_or_else(|| YamlError::shape("name must be a string"))?;
        let renamed = match current.split_once('@') {
            Some((name, version)) if name == old => format!("{new}@{version}"),
            None if current == old => new.to_string(),
            _ => continue,
        };
        rename_scalar(node, &renamed)?;
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryConfig;

    fn rename_registry(source: &str, old: &str, new: &str) -> String {
        let config = RegistryConfig::from_yaml(source).unwrap();
        let (_, package) = config.find(old).unwrap();
        let mut document = Document::parse(source).unwrap();
        rename_registry_document(&mut document, package, old, new).unwrap();
        document.render()
    }

    #[test]
    fn registry_alias_goes_after_repo_name() {
        let source = "packages:\n  - type: github_release\n    repo_owner: foo # owner\n    repo_name: bar\n    description: a tool\n";
        assert_eq!(
            rename_registry(source, "foo/bar", "foo/baz"),
            "packages:\n  - type: github_release\n    repo_owner: foo # owner\n    repo_name: baz\n    aliases:\n      - name: foo/bar\n    description: a tool\n"
        );
    }

    #[test]
    fn registry_alias_goes_after_name() {
        let source = "packages:\n  - name: foo/bar/cli\n    repo_owner: foo\n    repo_name: bar\n";
        assert_eq!(
            rename_registry(source, "foo/bar/cli", "qux/bar/cli"),
            "packages:\n  - name: qux/bar/cli\n    aliases:\n      - name: foo/bar/cli\n    repo_owner: qux\n    repo_name: bar\n"
        );
    }

    #[test]
    fn registry_appends_to_existing_aliases() {
        let source = "packages:\n  - type: github_release\n    repo_owner: foo\n    repo_name: bar\n    aliases:\n      - name: old/bar\n    files:\n      - name: bar\n";
        assert_eq!(
            rename_registry(source, "foo/bar", "new/bar"),
            "packages:\n  - type: github_release\n    repo_owner: new\n    repo_name: bar\n    aliases:\n      - name: old/bar\n      - name: foo/bar\n    files:\n      - name: bar\n"
        );
    }

    #[test]
    fn registry_fills_null_aliases() {
        let source = "packages:\n  - repo_owner: foo\n    repo_name: bar\n    aliases:\n";
        assert_eq!(
            rename_registry(source, "foo/bar", "foo/baz"),
            "packages:\n  - repo_owner: foo\n    repo_name: baz\n    aliases:\n      - name: foo/bar\n"
        );
    }

    #[test]
    fn registry_uses_typed_index_past_placeholders() {
        let source = "packages:\n  - just-a-string\n  - repo_owner: a\n    repo_name: one\n  - repo_owner: b\n    repo_name: two\n";
        assert_eq!(
            rename_registry(source, "b/two", "b/three"),
            "packages:\n  - just-a-string\n  - repo_owner: a\n    repo_name: one\n  - repo_owner: b\n    repo_name: three\n    aliases:\n      - name: b/two\n"
        );
    }

    #[test]
    fn single_segment_name_only_touches_owner() {
        let source = "packages:\n  - repo_owner: foo\n    repo_name: bar\n";
        assert_eq!(
            rename_registry(source, "foo/bar", "solo"),
            "packages:\n  - repo_owner: solo\n    repo_name: bar\n    aliases:\n      - name: foo/bar\n"
        );
    }

    #[test]
    fn registry_rejects_non_scalar_owner() {
        let source = "packages:\n  - name: foo/bar\n    repo_owner: [foo]\n";
        let config = RegistryConfig::from_yaml("packages:\n  - name: foo/bar\n").unwrap();
        let (_, package) = config.find("foo/bar").unwrap();
        let mut document = Document::parse(source).unwrap();
        let err = rename_registry_document(&mut document, package, "foo/bar", "x/y")
            .unwrap_err();
        assert!(err.to_string().contains("repo_owner must be a string"));
    }

    #[test]
    fn registry_skips_tagged_elements_by_position() {
        let source = "packages:\n  - !custom {type: http, url: x}\n  - repo_owner: b\n    repo_name: two\n";
        assert_eq!(
            rename_registry(source, "b/two", "b/three"),
            "packages:\n  - !custom {type: http, url: x}\n  - repo_owner: b\n    repo_name: three\n    aliases:\n      - name: b/two\n"
        );
    }

    #[test]
    fn registry_alias_element_is_a_clean_error() {
        let source = "base: &base\n  repo_owner: foo\n  repo_name: bar\npackages:\n  - *base\n";
        let config = RegistryConfig::from_yaml(source).unwrap();
        let (_, package) = config.find("foo/bar").unwrap();
        let mut document = Document::parse(source).unwrap();
        let err = rename_registry_document(&mut document, package, "foo/bar", "foo/baz")
            .unwrap_err();
        assert!(matches!(err, YamlError::Shape { .. }));
        assert!(err.to_string().contains("packages[0] is written as a scalar"));
        assert_eq!(document.render(), source);
    }

    #[test]
    fn relocate_rolls_back_when_an_old_file_changed() {
        let dir = tempfile::tempdir().unwrap();
        let old_registry = dir.path().join("old/registry.yaml");
        let old_pkg = dir.path().join("old/pkg.yaml");
        fs::create_dir_all(dir.path().join("old")).unwrap();
        fs::create_dir_all(dir.path().join("new")).unwrap();
        fs::write(&old_registry, "packages: []\n").unwrap();
        fs::write(&old_pkg, "packages:\n  - name: edited/elsewhere\n").unwrap();

        let moves = [
            Relocation {
                from: old_registry.clone(),
                read: Fingerprint::of("packages: []\n"),
                to: dir.path().join("new/registry.yaml"),
                text: "packages: [a]\n".to_string(),
            },
            Relocation {
                from: old_pkg.clone(),
                read: Fingerprint::of("packages:\n"),
                to: dir.path().join("new/pkg.yaml"),
                text: "packages: [b]\n".to_string(),
            },
        ];
        let err = relocate(&moves).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::Edit(crate::edit::EditError::ConcurrentModification { .. })
        ));
        assert!(!dir.path().join("new/registry.yaml").exists());
        assert!(!dir.path().join("new/pkg.yaml").exists());
        assert_eq!(fs::read_to_string(&old_registry).unwrap(), "packages: []\n");
        assert_eq!(
            fs::read_to_string(&old_pkg).unwrap(),
            "packages:\n  - name: edited/elsewhere\n"
        );
    }

    #[test]
    fn relocate_moves_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.yaml");
        let to = dir.path().join("b.yaml");
        fs::write(&from, "x: 1\n").unwrap();

        relocate(&[Relocation {
            from: from.clone(),
            read: Fingerprint::of("x: 1\n"),
            to: to.clone(),
            text: "x: 2\n".to_string(),
        }])
        .unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "x: 2\n");
    }

    #[test]
    fn package_document_keeps_version_suffix() {
        let mut document = Document::parse(
            "packages:\n  # pinned\n  - name: foo/bar@v1.2.3\n  - name: foo/bar\n",
        )
        .unwrap();
        assert!(rename_package_document(&mut document, "foo/bar", "foo/baz").unwrap());
        assert_eq!(
            document.render(),
            "packages:\n  # pinned\n  - name: foo/baz@v1.2.3\n  - name: foo/bar\n"
        );
    }

    #[test]
    fn package_document_without_match_is_untouched() {
        let source = "packages:\n  - name: other/pkg@v1\n  - import: x.yaml\n";
        let mut document = Document::parse(source).unwrap();
        assert!(!rename_package_document(&mut document, "foo/bar", "foo/baz").unwrap());
        assert_eq!(document.render(), source);
    }

    #[test]
    fn package_document_skips_prefix_lookalikes() {
        let mut document =
            Document::parse("packages:\n  - name: foo/barista@v1\n  - name: 'foo/bar'\n").unwrap();
        assert!(rename_package_document(&mut document, "foo/bar", "foo/baz").unwrap());
        assert_eq!(
            document.render(),
            "packages:\n  - name: foo/barista@v1\n  - name: 'foo/baz'\n"
        );
    }
}
