//! Tree model for format-preserving YAML documents.
//!
//! Every byte of a parsed source belongs to exactly one piece of the tree:
//! a leading run of comment and blank lines, an indentation prefix, a key,
//! a separator, a scalar, a collection header or a tail. Rendering
//! concatenates the pieces in order, so a document nobody touched renders
//! back to its exact input.

use crate::yaml::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Null(Null),
    Scalar(Scalar),
    Mapping(Mapping),
    Sequence(Sequence),
}

/// An explicit (`~`, `null`) or implicit (nothing at all) null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Null {
    pub(crate) raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    pub(crate) value: String,
    pub(crate) style: ScalarStyle,
    pub(crate) raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Block collection whose children start at column `indent`.
    ///
    /// `head` is the rest of the line that opened the collection (spacing,
    /// comment and newline after the `:` or `-`). A compact collection
    /// starts on its parent's `- ` line and has an empty head.
    Block {
        indent: usize,
        head: String,
        compact: bool,
    },
    /// Flow collection. `raw` is the source text it was parsed from and is
    /// rendered as long as the children still mean the same thing.
    Flow { raw: String },
}

/// The value half of a mapping entry or sequence item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// Indicator (`:` or `-`) with the spacing around it.
    pub(crate) sep: String,
    pub(crate) value: Node,
    /// Trailing spaces, comment and newline after an inline value.
    pub(crate) tail: String,
    /// Column of the owning key or dash.
    pub(crate) indent: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub(crate) leading: String,
    pub(crate) prefix: String,
    pub(crate) key: Scalar,
    pub(crate) slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub(crate) leading: String,
    pub(crate) prefix: String,
    pub(crate) slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub(crate) layout: Layout,
    pub(crate) entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    pub(crate) layout: Layout,
    pub(crate) items: Vec<Item>,
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Null(_) => "null",
            Node::Scalar(_) => "scalar",
            Node::Mapping(_) => "mapping",
            Node::Sequence(_) => "sequence",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(scalar) => Some(&scalar.value),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Node::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Node::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Sequence> {
        match self {
            Node::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    /// Renders the node as it appears in the source.
    pub fn to_yaml_string(&self) -> String {
        let mut out = String::new();
        render::render_node(self, &mut out);
        out
    }

    /// Block collections span whole lines and own their header line.
    pub(crate) fn is_block_collection(&self) -> bool {
        match self {
            Node::Mapping(mapping) => mapping.is_block(),
            Node::Sequence(sequence) => sequence.is_block(),
            _ => false,
        }
    }

    fn head_mut(&mut self) -> Option<&mut String> {
        match self {
            Node::Mapping(Mapping {
                layout: Layout::Block { head, .. },
                ..
            })
            | Node::Sequence(Sequence {
                layout: Layout::Block { head, .. },
                ..
            }) => Some(head),
            _ => None,
        }
    }

    fn last_slot_mut(&mut self) -> Option<&mut Slot> {
        match self {
            Node::Mapping(mapping) if mapping.is_block() => {
                mapping.entries.last_mut().map(|entry| &mut entry.slot)
            }
            Node::Sequence(sequence) if sequence.is_block() => {
                sequence.items.last_mut().map(|item| &mut item.slot)
            }
            _ => None,
        }
    }
}

impl Scalar {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn style(&self) -> ScalarStyle {
        self.style
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Replaces the value while keeping the quoting or block style where the
    /// new text allows it.
    pub(crate) fn set_value(&mut self, value: &str) {
        let (raw, style) = render::restyle_scalar(value, self.style, &self.raw);
        self.value = value.to_string();
        self.raw = raw;
        self.style = style;
    }
}

impl Null {
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl Slot {
    pub fn value(&self) -> &Node {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut Node {
        &mut self.value
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    pub(crate) fn indicator(&self) -> char {
        self.sep.trim_start().chars().next().unwrap_or(':')
    }

    pub(crate) fn ends_with_newline(&self) -> bool {
        let mut out = String::new();
        render::render_slot(self, &mut out);
        out.ends_with('\n')
    }

    /// Makes sure whatever follows this slot starts on a fresh line.
    pub(crate) fn ensure_newline(&mut self) {
        if self.ends_with_newline() {
            return;
        }
        if !self.tail.is_empty() || !self.value.is_block_collection() {
            self.tail.push('\n');
            return;
        }
        if let Some(last) = self.value.last_slot_mut() {
            last.ensure_newline();
        } else if let Some(head) = self.value.head_mut() {
            head.push('\n');
        }
    }

    /// Swaps in a freshly laid out slot, carrying over a comment that
    /// trailed the old inline value.
    pub(crate) fn replace_with(&mut self, fresh: Slot) {
        let old_tail = std::mem::take(&mut self.tail);
        let lead_len = self.sep.len() - self.sep.trim_start().len();
        let lead = self.sep[..lead_len].to_string();
        *self = fresh;
        self.sep.insert_str(0, &lead);
        if old_tail.trim().is_empty() {
            if !old_tail.ends_with('\n') && self.tail.ends_with('\n') {
                self.tail.pop();
            }
            return;
        }
        if let Some(head) = self.value.head_mut() {
            if head.ends_with('\n') && old_tail.ends_with('\n') {
                *head = old_tail;
            }
        } else {
            self.tail = old_tail;
        }
    }

    /// Turns a block collection emptied by removals into `{}` or `[]` so the
    /// value keeps its type.
    pub(crate) fn collapse_empty(&mut self) {
        let empty = match &self.value {
            Node::Mapping(mapping) => mapping.is_block() && mapping.entries.is_empty(),
            Node::Sequence(sequence) => sequence.is_block() && sequence.items.is_empty(),
            _ => false,
        };
        if !empty {
            return;
        }
        let head = self.value.head_mut().map(std::mem::take).unwrap_or_default();
        let (flow, raw) = match self.value {
            Node::Sequence(_) => (true, "[]"),
            _ => (false, "{}"),
        };
        self.value = if flow {
            Node::Sequence(Sequence {
                layout: Layout::Flow {
                    raw: raw.to_string(),
                },
                items: Vec::new(),
            })
        } else {
            Node::Mapping(Mapping {
                layout: Layout::Flow {
                    raw: raw.to_string(),
                },
                entries: Vec::new(),
            })
        };
        let indicator = self.indicator();
        let lead_len = self.sep.len() - self.sep.trim_start().len();
        self.sep = format!("{}{} ", &self.sep[..lead_len], indicator);
        self.tail = if head.is_empty() {
            "\n".to_string()
        } else {
            head.trim_start_matches([' ', '\t']).to_string()
        };
        if self.tail.starts_with('#') {
            self.tail.insert(0, ' ');
        }
    }
}

impl Entry {
    pub fn key(&self) -> &str {
        &self.key.value
    }

    pub fn key_scalar(&self) -> &Scalar {
        &self.key
    }

    pub fn value(&self) -> &Node {
        &self.slot.value
    }

    pub fn value_mut(&mut self) -> &mut Node {
        &mut self.slot.value
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    pub fn slot_mut(&mut self) -> &mut Slot {
        &mut self.slot
    }
}

impl Item {
    pub fn value(&self) -> &Node {
        &self.slot.value
    }

    pub fn value_mut(&mut self) -> &mut Node {
        &mut self.slot.value
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    pub fn slot_mut(&mut self) -> &mut Slot {
        &mut self.slot
    }
}

impl Mapping {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_block(&self) -> bool {
        matches!(self.layout, Layout::Block { .. })
    }

    pub fn is_compact(&self) -> bool {
        matches!(self.layout, Layout::Block { compact: true, .. })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Entry::key)
    }

    /// First entry whose key equals `key`, with its position.
    pub fn find(&self, key: &str) -> Option<(usize, &Entry)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.key() == key)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.find(key).map(|(index, _)| index)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.find(key).map(|(_, entry)| entry.value())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|entry| entry.key() == key)
            .map(Entry::value_mut)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Node::as_str)
    }

    pub fn entry_mut(&mut self, index: usize) -> Option<&mut Entry> {
        self.entries.get_mut(index)
    }

    pub fn slot_mut(&mut self, key: &str) -> Option<&mut Slot> {
        self.entries
            .iter_mut()
            .find(|entry| entry.key() == key)
            .map(Entry::slot_mut)
    }
}

impl Sequence {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_block(&self) -> bool {
        matches!(self.layout, Layout::Block { .. })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [Item] {
        &mut self.items
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.items.get(index).map(Item::value)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.items.get_mut(index).map(Item::value_mut)
    }

    /// First element at or after `start` that is a mapping.
    pub fn nth_mapping(&self, start: usize) -> Option<(usize, &Mapping)> {
        self.items
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(index, item)| item.value().as_mapping().map(|m| (index, m)))
    }
}
