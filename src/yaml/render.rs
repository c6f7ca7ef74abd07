//! Rendering of parsed trees and layout of freshly built subtrees.
//!
//! Parsed pieces render verbatim. New content is laid out as YAML text at
//! the target indentation and parsed back with the document parser, so
//! inserted subtrees have exactly the same shape as parsed ones.

use crate::yaml::errors::YamlError;
use crate::yaml::node::{Entry, Item, Layout, Mapping, Node, Null, Scalar, ScalarStyle, Sequence, Slot};
use crate::yaml::parser;
use serde_yaml::Value;

pub(crate) fn render_node(node: &Node, out: &mut String) {
    match node {
        Node::Null(null) => out.push_str(&null.raw),
        Node::Scalar(scalar) => out.push_str(&scalar.raw),
        Node::Mapping(mapping) => render_mapping(mapping, out),
        Node::Sequence(sequence) => render_sequence(sequence, out),
    }
}

pub(crate) fn render_slot(slot: &Slot, out: &mut String) {
    out.push_str(&slot.sep);
    render_node(&slot.value, out);
    out.push_str(&slot.tail);
}

fn render_mapping(mapping: &Mapping, out: &mut String) {
    match &mapping.layout {
        Layout::Block { head, .. } => {
            out.push_str(head);
            for entry in &mapping.entries {
                out.push_str(&entry.leading);
                out.push_str(&entry.prefix);
                out.push_str(&entry.key.raw);
                render_slot(&entry.slot, out);
            }
        }
        Layout::Flow { raw } => {
            let mut fresh = String::from("{");
            for (index, entry) in mapping.entries.iter().enumerate() {
                if index > 0 {
                    fresh.push_str(", ");
                }
                fresh.push_str(&entry.key.raw);
                fresh.push_str(": ");
                render_node(&entry.slot.value, &mut fresh);
            }
            fresh.push('}');
            out.push_str(pick_flow(raw, &fresh));
        }
    }
}

fn render_sequence(sequence: &Sequence, out: &mut String) {
    match &sequence.layout {
        Layout::Block { head, .. } => {
            out.push_str(head);
            for item in &sequence.items {
                out.push_str(&item.leading);
                out.push_str(&item.prefix);
                render_slot(&item.slot, out);
            }
        }
        Layout::Flow { raw } => {
            let mut fresh = String::from("[");
            for (index, item) in sequence.items.iter().enumerate() {
                if index > 0 {
                    fresh.push_str(", ");
                }
                render_node(&item.slot.value, &mut fresh);
            }
            fresh.push(']');
            out.push_str(pick_flow(raw, &fresh));
        }
    }
}

/// Keeps the original flow text while the children still decode to the same
/// value.
fn pick_flow<'a>(raw: &'a str, fresh: &'a str) -> &'a str {
    if raw.is_empty() || raw == fresh {
        return fresh;
    }
    match (
        serde_yaml::from_str::<Value>(raw),
        serde_yaml::from_str::<Value>(fresh),
    ) {
        (Ok(before), Ok(after)) if before == after => raw,
        _ => fresh,
    }
}

/// New source text for a scalar whose value changes to `value`.
pub(crate) fn restyle_scalar(value: &str, style: ScalarStyle, old_raw: &str) -> (String, ScalarStyle) {
    match style {
        ScalarStyle::Plain if is_plain_safe(value, true) => (value.to_string(), ScalarStyle::Plain),
        ScalarStyle::SingleQuoted if !value.contains(['\n', '\r']) => (
            format!("'{}'", value.replace('\'', "''")),
            ScalarStyle::SingleQuoted,
        ),
        ScalarStyle::Literal | ScalarStyle::Folded => (reblock(value, old_raw), style),
        _ => (double_quote(value), ScalarStyle::DoubleQuoted),
    }
}

fn reblock(value: &str, old_raw: &str) -> String {
    let mut lines = old_raw.split_inclusive('\n');
    let mut out = lines.next().unwrap_or("|").to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    let indent = lines
        .find(|line| !line.trim().is_empty())
        .map(|line| &line[..line.len() - line.trim_start().len()])
        .filter(|indent| !indent.is_empty())
        .unwrap_or("  ")
        .to_string();
    let body = value.strip_suffix('\n').unwrap_or(value);
    for line in body.split('\n') {
        if !line.is_empty() {
            out.push_str(&indent);
            out.push_str(line);
        }
        out.push('\n');
    }
    if !old_raw.ends_with('\n') {
        out.pop();
    }
    out
}

pub(crate) fn double_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch.is_control() => out.push_str(&format!("\\u{:04x}", ch as u32)),
            ch => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Whether `value` can be written without quotes and still read back as the
/// same string.
pub(crate) fn is_plain_safe(value: &str, flow: bool) -> bool {
    if value.is_empty() || value != value.trim() {
        return false;
    }
    if value.contains(['\n', '\r', '\t']) {
        return false;
    }
    if value.starts_with([
        '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%',
        '@', '`',
    ]) {
        return false;
    }
    if value.contains(": ") || value.contains(" #") || value.ends_with(':') {
        return false;
    }
    if flow && value.contains([',', '[', ']', '{', '}']) {
        return false;
    }
    matches!(serde_yaml::from_str::<Value>(value), Ok(Value::String(parsed)) if parsed == value)
}

pub(crate) fn emit_scalar(value: &Value, flow: bool) -> Result<String, YamlError> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::String(text) if is_plain_safe(text, flow) => Ok(text.clone()),
        Value::String(text) => Ok(double_quote(text)),
        Value::Tagged(_) => Err(YamlError::Unsupported {
            message: "tagged values cannot be inserted".to_string(),
        }),
        Value::Sequence(_) | Value::Mapping(_) => {
            Err(YamlError::emit("expected a scalar, found a collection"))
        }
    }
}

pub(crate) fn emit_flow(value: &Value) -> Result<String, YamlError> {
    match value {
        Value::Sequence(items) => {
            let parts = items.iter().map(emit_flow).collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}]", parts.join(", ")))
        }
        Value::Mapping(map) => {
            let parts = map
                .iter()
                .map(|(key, value)| Ok(format!("{}: {}", emit_scalar(key, true)?, emit_flow(value)?)))
                .collect::<Result<Vec<_>, YamlError>>()?;
            Ok(format!("{{{}}}", parts.join(", ")))
        }
        scalar => emit_scalar(scalar, true),
    }
}

/// A value that fits on its key's line in block context.
fn emit_inline(value: &Value) -> Result<String, YamlError> {
    match value {
        Value::Sequence(_) | Value::Mapping(_) => emit_flow(value),
        scalar => emit_scalar(scalar, false),
    }
}

/// Lays out new subtrees to match the surrounding document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    seq_offset: usize,
}

impl Default for Fragment {
    fn default() -> Self {
        Self { seq_offset: 2 }
    }
}

impl Fragment {
    /// `seq_offset` is how far a block sequence's dashes sit to the right
    /// of the key that owns it.
    pub fn new(seq_offset: usize) -> Self {
        Self { seq_offset }
    }

    pub fn seq_offset(&self) -> usize {
        self.seq_offset
    }

    /// A block mapping entry `key: value` whose key starts at column `indent`.
    pub fn entry(&self, key: &str, value: &Value, indent: usize) -> Result<Entry, YamlError> {
        let key_text = emit_scalar(&Value::String(key.to_string()), false)?;
        let mut text = String::new();
        self.emit_entry(&mut text, &key_text, value, indent)?;
        let document = parser::parse_document(&text)?;
        match document.root {
            Node::Mapping(mapping) if mapping.entries.len() == 1 => mapping
                .entries
                .into_iter()
                .next()
                .ok_or_else(|| YamlError::emit("laid out entry is missing")),
            other => Err(YamlError::emit(format!(
                "laid out entry parsed as a {}",
                other.kind()
            ))),
        }
    }

    /// Block sequence items whose dashes sit at column `indent`.
    pub fn items(&self, values: &[Value], indent: usize) -> Result<Vec<Item>, YamlError> {
        let mut text = String::new();
        for value in values {
            self.emit_item(&mut text, value, indent)?;
        }
        let document = parser::parse_document(&text)?;
        match document.root {
            Node::Sequence(sequence) if sequence.items.len() == values.len() => Ok(sequence.items),
            other => Err(YamlError::emit(format!(
                "laid out items parsed as a {}",
                other.kind()
            ))),
        }
    }

    /// A slot holding `value` under an existing key or dash.
    pub(crate) fn slot(&self, indicator: char, value: &Value, indent: usize) -> Result<Slot, YamlError> {
        if indicator == '-' {
            let item = self
                .items(std::slice::from_ref(value), indent)?
                .into_iter()
                .next()
                .ok_or_else(|| YamlError::emit("laid out item is missing"))?;
            Ok(item.slot)
        } else {
            Ok(self.entry("_", value, indent)?.slot)
        }
    }

    fn emit_entry(&self, out: &mut String, key: &str, value: &Value, indent: usize) -> Result<(), YamlError> {
        let pad = " ".repeat(indent);
        match value {
            Value::Mapping(map) if !map.is_empty() => {
                out.push_str(&format!("{pad}{key}:\n"));
                for (child_key, child) in map {
                    self.emit_entry(out, &emit_scalar(child_key, false)?, child, indent + 2)?;
                }
            }
            Value::Sequence(items) if !items.is_empty() => {
                out.push_str(&format!("{pad}{key}:\n"));
                for child in items {
                    self.emit_item(out, child, indent + self.seq_offset)?;
                }
            }
            Value::Null => out.push_str(&format!("{pad}{key}:\n")),
            other => out.push_str(&format!("{pad}{key}: {}\n", emit_inline(other)?)),
        }
        Ok(())
    }

    fn emit_item(&self, out: &mut String, value: &Value, indent: usize) -> Result<(), YamlError> {
        let pad = " ".repeat(indent);
        match value {
            Value::Mapping(map) if !map.is_empty() => {
                let mut body = String::new();
                for (child_key, child) in map {
                    self.emit_entry(&mut body, &emit_scalar(child_key, false)?, child, indent + 2)?;
                }
                out.push_str(&pad);
                out.push_str("- ");
                out.push_str(&body[indent + 2..]);
            }
            Value::Sequence(items) if !items.is_empty() => {
                out.push_str(&format!("{pad}-\n"));
                for child in items {
                    self.emit_item(out, child, indent + 2)?;
                }
            }
            Value::Null => out.push_str(&format!("{pad}-\n")),
            other => out.push_str(&format!("{pad}- {}\n", emit_inline(other)?)),
        }
        Ok(())
    }
}

/// Builds a flow node from a decoded value. Only the outermost collection
/// carries the source text.
pub(crate) fn flow_node(value: &Value, raw: Option<&str>) -> Result<Node, YamlError> {
    let raw = raw.unwrap_or_default().to_string();
    Ok(match value {
        Value::Null => Node::Null(Null {
            raw: if raw.is_empty() { "null".to_string() } else { raw },
        }),
        Value::Sequence(values) => Node::Sequence(Sequence {
            layout: Layout::Flow { raw },
            items: values
                .iter()
                .map(|value| {
                    Ok(Item {
                        leading: String::new(),
                        prefix: String::new(),
                        slot: flow_slot(flow_node(value, None)?),
                    })
                })
                .collect::<Result<_, YamlError>>()?,
        }),
        Value::Mapping(map) => Node::Mapping(Mapping {
            layout: Layout::Flow { raw },
            entries: map
                .iter()
                .map(|(key, value)| {
                    Ok(Entry {
                        leading: String::new(),
                        prefix: String::new(),
                        key: flow_scalar(key)?,
                        slot: flow_slot(flow_node(value, None)?),
                    })
                })
                .collect::<Result<_, YamlError>>()?,
        }),
        Value::Tagged(tagged) => flow_node(&tagged.value, Some(raw.as_str()))?,
        scalar => Node::Scalar(flow_scalar(scalar)?),
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

fn flow_scalar(value: &Value) -> Result<Scalar, YamlError> {
    let raw = emit_scalar(value, true)?;
    let text = match value {
        Value::String(text) => text.clone(),
        _ => raw.clone(),
    };
    let style = if raw.starts_with('"') {
        ScalarStyle::DoubleQuoted
    } else {
        ScalarStyle::Plain
    };
    Ok(Scalar {
        value: text,
        style,
        raw,
    })
}
