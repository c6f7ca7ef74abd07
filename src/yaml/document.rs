use crate::yaml::errors::YamlError;
use crate::yaml::node::{Layout, Mapping, Node};
use crate::yaml::parser;
use crate::yaml::render::{self, Fragment};

/// A parsed YAML file.
///
/// Only the first document is modelled. Leading comments, directives and
/// the `---` marker live in `head`; trailing comments and any later
/// documents live in `rest`, both kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub(crate) head: String,
    pub(crate) root: Node,
    pub(crate) rest: String,
}

impl Document {
    pub fn parse(source: &str) -> Result<Self, YamlError> {
        parser::parse_document(source)
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.head.len() + self.rest.len() + 256);
        out.push_str(&self.head);
        render::render_node(&self.root, &mut out);
        out.push_str(&self.rest);
        out
    }

    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    pub fn root_mapping(&self) -> Result<&Mapping, YamlError> {
        match &self.root {
            Node::Mapping(mapping) => Ok(mapping),
            other => Err(YamlError::shape(format!(
                "document body must be a mapping, found {}",
                other.kind()
            ))),
        }
    }

    pub fn root_mapping_mut(&mut self) -> Result<&mut Mapping, YamlError> {
        match &mut self.root {
            Node::Mapping(mapping) => Ok(mapping),
            other => Err(YamlError::shape(format!(
                "document body must be a mapping, found {}",
                other.kind()
            ))),
        }
    }

    /// The `# yaml-language-server: $schema=...` line, if the file has one.
    pub fn schema_comment(&self) -> Option<&str> {
        self.head
            .lines()
            .map(|line| line.trim_start_matches('\u{feff}').trim())
            .find(|line| line.starts_with('#') && line.contains("$schema="))
    }

    /// Whether more YAML documents follow the first one.
    pub fn has_trailing_documents(&self) -> bool {
        self.rest.lines().any(|line| {
            let line = line.trim_end();
            line == "---" || line.starts_with("--- ")
        })
    }

    /// Layout settings for new subtrees, inferred from the existing block
    /// sequences.
    pub fn fragment(&self) -> Fragment {
        sequence_offset(&self.root)
            .map(Fragment::new)
            .unwrap_or_default()
    }
}

fn sequence_offset(node: &Node) -> Option<usize> {
    match node {
        Node::Mapping(mapping) => mapping.entries().iter().find_map(|entry| {
            if let Node::Sequence(sequence) = entry.value() {
                if let Layout::Block {
                    indent,
                    compact: false,
                    ..
                } = sequence.layout()
                {
                    return indent.checked_sub(entry.slot().indent());
                }
            }
            sequence_offset(entry.value())
        }),
        Node::Sequence(sequence) => sequence
            .items()
            .iter()
            .find_map(|item| sequence_offset(item.value())),
        _ => None,
    }
}
