//! Line-oriented parser producing the lossless tree.
//!
//! Block structure is recovered from indentation. Flow collections and
//! quoted scalars are decoded with `serde_yaml`, but their source text is
//! still kept byte for byte.

use crate::yaml::document::Document;
use crate::yaml::errors::YamlError;
use crate::yaml::node::{Entry, Item, Layout, Mapping, Node, Null, Scalar, ScalarStyle, Sequence, Slot};
use crate::yaml::render::flow_node;

#[derive(Debug, Clone, Copy)]
struct Line {
    start: usize,
    content: usize,
    end: usize,
    next: usize,
}

impl Line {
    fn indent(&self) -> usize {
        self.content - self.start
    }
}

struct Parser<'a> {
    src: &'a str,
    lines: Vec<Line>,
    line: usize,
}

const BOM: char = '\u{feff}';

/// Parses `source`. A leading byte order mark is kept in the head so it
/// renders back, but never becomes part of the first key.
pub(crate) fn parse_document(source: &str) -> Result<Document, YamlError> {
    let (bom, src) = match source.strip_prefix(BOM) {
        Some(body) => (&source[..BOM.len_utf8()], body),
        None => ("", source),
    };
    let mut parser = Parser::new(src);

    while !parser.eof() {
        let idx = parser.line;
        let text = parser.text(idx);
        if parser.is_trivia(idx) || text.starts_with('%') {
            parser.line += 1;
            continue;
        }
        if parser.is_document_marker(idx) && text.starts_with("---") {
            let rest = text[3..].trim_start();
            if !rest.is_empty() && !rest.starts_with('#') {
                return Err(YamlError::Unsupported {
                    message: "content on the document start line".to_string(),
                });
            }
            parser.line += 1;
            continue;
        }
        break;
    }
    let head_end = parser.offset();

    let root = match parser.next_content(parser.line) {
        Some(idx) if !parser.is_document_marker(idx) => parser.parse_root(idx)?,
        _ => Node::Null(Null { raw: String::new() }),
    };

    let rest_start = parser.offset();
    if let Some(idx) = parser.next_content(parser.line) {
        if !parser.is_document_marker(idx) {
            return Err(parser.error(idx, "unexpected content after the document root"));
        }
    }

    Ok(Document {
        head: format!("{bom}{}", &src[..head_end]),
        root,
        rest: src[rest_start..].to_string(),
    })
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            lines: scan_lines(src),
            line: 0,
        }
    }

    fn eof(&self) -> bool {
        self.line >= self.lines.len()
    }

    fn offset(&self) -> usize {
        self.lines
            .get(self.line)
            .map_or(self.src.len(), |line| line.start)
    }

    fn text(&self, idx: usize) -> &'a str {
        let line = self.lines[idx];
        &self.src[line.content..line.end]
    }

    fn is_trivia(&self, idx: usize) -> bool {
        let text = self.text(idx).trim_start();
        text.is_empty() || text.starts_with('#')
    }

    fn is_document_marker(&self, idx: usize) -> bool {
        let line = self.lines[idx];
        if line.indent() != 0 {
            return false;
        }
        let text = self.text(idx);
        ["---", "..."].iter().any(|marker| {
            text == *marker
                || text
                    .strip_prefix(*marker)
                    .is_some_and(|rest| rest.starts_with([' ', '\t']))
        })
    }

    fn next_content(&self, from: usize) -> Option<usize> {
        (from..self.lines.len()).find(|&idx| !self.is_trivia(idx))
    }

    fn line_of(&self, offset: usize) -> usize {
        self.lines
            .partition_point(|line| line.start <= offset)
            .saturating_sub(1)
    }

    fn error(&self, idx: usize, message: &str) -> YamlError {
        YamlError::InvalidYamlSyntax {
            line: idx + 1,
            message: message.to_string(),
        }
    }

    fn parse_root(&mut self, idx: usize) -> Result<Node, YamlError> {
        self.line = idx;
        let indent = self.lines[idx].indent();
        let text = self.text(idx);
        if is_dash(text) {
            return Ok(Node::Sequence(self.parse_sequence(indent, String::new(), None)?));
        }
        if key_colon(text).is_some() {
            return Ok(Node::Mapping(self.parse_mapping(indent, String::new(), None)?));
        }
        Err(YamlError::Unsupported {
            message: "document root must be a mapping or a sequence".to_string(),
        })
    }

    /// Parses block mapping entries at column `indent`. With `compact`, the
    /// first key starts at that offset on the current line.
    fn parse_mapping(&mut self, indent: usize, head: String, compact: Option<usize>) -> Result<Mapping, YamlError> {
        let mut entries = Vec::new();
        if let Some(key_at) = compact {
            entries.push(self.parse_entry(String::new(), String::new(), key_at, indent)?);
        }
        while let Some(idx) = self.next_content(self.line) {
            let line = self.lines[idx];
            if self.is_document_marker(idx) || line.indent() < indent {
                break;
            }
            if line.indent() > indent {
                return Err(self.error(idx, "unexpected indentation"));
            }
            if is_dash(self.text(idx)) {
                break;
            }
            let leading = self.src[self.offset()..line.start].to_string();
            let prefix = self.src[line.start..line.content].to_string();
            self.line = idx;
            entries.push(self.parse_entry(leading, prefix, line.content, indent)?);
        }
        Ok(Mapping {
            layout: Layout::Block {
                indent,
                head,
                compact: compact.is_some(),
            },
            entries,
        })
    }

    fn parse_sequence(&mut self, indent: usize, head: String, compact: Option<usize>) -> Result<Sequence, YamlError> {
        let mut items = Vec::new();
        if let Some(dash_at) = compact {
            items.push(self.parse_item(String::new(), String::new(), dash_at, indent)?);
        }
        while let Some(idx) = self.next_content(self.line) {
            let line = self.lines[idx];
            if self.is_document_marker(idx) || line.indent() < indent {
                break;
            }
            if line.indent() > indent {
                return Err(self.error(idx, "unexpected indentation"));
            }
            if !is_dash(self.text(idx)) {
                break;
            }
            let leading = self.src[self.offset()..line.start].to_string();
            let prefix = self.src[line.start..line.content].to_string();
            self.line = idx;
            items.push(self.parse_item(leading, prefix, line.content, indent)?);
        }
        Ok(Sequence {
            layout: Layout::Block {
                indent,
                head,
                compact: compact.is_some(),
            },
            items,
        })
    }

    fn parse_entry(&mut self, leading: String, prefix: String, key_at: usize, indent: usize) -> Result<Entry, YamlError> {
        let src = self.src;
        let idx = self.line;
        let line = self.lines[idx];
        let text = &src[key_at..line.end];
        let colon = key_colon(text).ok_or_else(|| self.error(idx, "could not find expected ':'"))?;
        let key_raw = text[..colon].trim_end();
        let key = decode_key(key_raw).map_err(|message| self.error(idx, &message))?;
        let slot = self.parse_slot(key_at + key_raw.len(), key_at + colon + 1, indent, false)?;
        Ok(Entry {
            leading,
            prefix,
            key,
            slot,
        })
    }

    fn parse_item(&mut self, leading: String, prefix: String, dash_at: usize, indent: usize) -> Result<Item, YamlError> {
        let src = self.src;
        let idx = self.line;
        let line = self.lines[idx];
        let val_at = skip_blanks(src, dash_at + 1, line.end);
        let rest = &src[val_at..line.end];
        let column = val_at - line.start;

        if is_dash(rest) {
            let sequence = self.parse_sequence(column, String::new(), Some(val_at))?;
            return Ok(Item {
                leading,
                prefix,
                slot: Slot {
                    sep: self.src[dash_at..val_at].to_string(),
                    value: Node::Sequence(sequence),
                    tail: String::new(),
                    indent,
                },
            });
        }
        if key_colon(rest).is_some() {
            let mapping = self.parse_mapping(column, String::new(), Some(val_at))?;
            return Ok(Item {
                leading,
                prefix,
                slot: Slot {
                    sep: self.src[dash_at..val_at].to_string(),
                    value: Node::Mapping(mapping),
                    tail: String::new(),
                    indent,
                },
            });
        }

        let slot = self.parse_slot(dash_at, dash_at + 1, indent, true)?;
        Ok(Item {
            leading,
            prefix,
            slot,
        })
    }

    /// Parses whatever follows an indicator. `sep_start..indicator_end`
    /// covers the indicator itself.
    fn parse_slot(&mut self, sep_start: usize, indicator_end: usize, indent: usize, in_sequence: bool) -> Result<Slot, YamlError> {
        let src = self.src;
        let idx = self.line;
        let line = self.lines[idx];
        let val_at = skip_blanks(src, indicator_end, line.end);
        let rest = &src[val_at..line.end];
        let props = properties_len(rest);
        let after_props = &rest[props..];

        if after_props.is_empty() || after_props.starts_with('#') {
            if let Some(next) = self.next_content(idx + 1) {
                let next_line = self.lines[next];
                let next_text = self.text(next);
                let nested = !self.is_document_marker(next)
                    && (next_line.indent() > indent
                        || (!in_sequence && next_line.indent() == indent && is_dash(next_text)));
                if nested && (is_dash(next_text) || key_colon(next_text).is_some()) {
                    let head = self.src[indicator_end..line.next].to_string();
                    self.line = idx + 1;
                    let value = if is_dash(next_text) {
                        Node::Sequence(self.parse_sequence(next_line.indent(), head, None)?)
                    } else {
                        Node::Mapping(self.parse_mapping(next_line.indent(), head, None)?)
                    };
                    return Ok(Slot {
                        sep: self.src[sep_start..indicator_end].to_string(),
                        value,
                        tail: String::new(),
                        indent,
                    });
                }
                if nested && props == 0 {
                    let sep = self.src[sep_start..next_line.content].to_string();
                    self.line = next;
                    let (value, tail) = self.parse_inline(next_line.content, indent)?;
                    return Ok(Slot {
                        sep,
                        value,
                        tail,
                        indent,
                    });
                }
            }
            self.line = idx + 1;
            if props == 0 {
                return Ok(Slot {
                    sep: self.src[sep_start..indicator_end].to_string(),
                    value: Node::Null(Null { raw: String::new() }),
                    tail: self.src[indicator_end..line.next].to_string(),
                    indent,
                });
            }
            let raw = rest[..props].trim_end();
            return Ok(Slot {
                sep: self.src[sep_start..val_at].to_string(),
                value: Node::Null(Null {
                    raw: raw.to_string(),
                }),
                tail: self.src[val_at + raw.len()..line.next].to_string(),
                indent,
            });
        }

        let value_at = val_at + props;
        let (value, tail) = self.parse_inline(value_at, indent)?;
        Ok(Slot {
            sep: self.src[sep_start..value_at].to_string(),
            value,
            tail,
            indent,
        })
    }

    /// Parses a value starting at `at` on the current line. Continuation
    /// lines must be indented deeper than `indent`.
    fn parse_inline(&mut self, at: usize, indent: usize) -> Result<(Node, String), YamlError> {
        match self.src.as_bytes().get(at) {
            Some(b'|') | Some(b'>') => self.parse_block_scalar(at, indent),
            Some(b'[') | Some(b'{') => self.parse_flow(at),
            Some(b'"') | Some(b'\'') => self.parse_quoted(at),
            _ => self.parse_plain(at, indent),
        }
    }

    fn parse_block_scalar(&mut self, at: usize, indent: usize) -> Result<(Node, String), YamlError> {
        let idx = self.line;
        let mut last = idx;
        for next in idx + 1..self.lines.len() {
            let line = self.lines[next];
            if self.src[line.start..line.end].trim().is_empty() {
                continue;
            }
            if line.indent() <= indent {
                break;
            }
            last = next;
        }
        let src = self.src;
        let end = self.lines[last].next;
        let raw = &src[at..end];
        let style = if raw.starts_with('|') {
            ScalarStyle::Literal
        } else {
            ScalarStyle::Folded
        };
        self.line = last + 1;
        Ok((
            Node::Scalar(Scalar {
                value: decode_block_scalar(raw),
                style,
                raw: raw.to_string(),
            }),
            String::new(),
        ))
    }

    fn parse_flow(&mut self, at: usize) -> Result<(Node, String), YamlError> {
        let src = self.src;
        let idx = self.line;
        let end = find_flow_end(src, at)
            .ok_or_else(|| self.error(idx, "unterminated flow collection"))?;
        let raw = &src[at..end];
        let value: serde_yaml::Value = serde_yaml::from_str(raw).map_err(|err| self.error(idx, &err.to_string()))?;
        let node = flow_node(&value, Some(raw))?;
        let tail = self.finish_value(end)?;
        Ok((node, tail))
    }

    fn parse_quoted(&mut self, at: usize) -> Result<(Node, String), YamlError> {
        let src = self.src;
        let idx = self.line;
        let close = closing_quote(src, at).ok_or_else(|| self.error(idx, "unterminated quoted scalar"))?;
        let raw = &src[at..=close];
        let value: String = serde_yaml::from_str(raw).map_err(|err| self.error(idx, &err.to_string()))?;
        let style = if raw.starts_with('"') {
            ScalarStyle::DoubleQuoted
        } else {
            ScalarStyle::SingleQuoted
        };
        let tail = self.finish_value(close + 1)?;
        Ok((
            Node::Scalar(Scalar {
                value,
                style,
                raw: raw.to_string(),
            }),
            tail,
        ))
    }

    /// Takes the rest of the line holding `end` as the value's tail.
    fn finish_value(&mut self, end: usize) -> Result<String, YamlError> {
        let idx = self.line_of(end.saturating_sub(1));
        let tail = &self.src[end..self.lines[idx].next];
        let trimmed = tail.trim();
        if !trimmed.is_empty() && !tail.trim_start().starts_with('#') {
            return Err(self.error(idx, "unexpected characters after value"));
        }
        self.line = idx + 1;
        Ok(tail.to_string())
    }

    fn parse_plain(&mut self, at: usize, indent: usize) -> Result<(Node, String), YamlError> {
        let idx = self.line;
        let line = self.lines[idx];
        let (len, mut commented) = plain_extent(&self.src[at..line.end]);
        let mut end = at + len;
        let mut last = idx;
        let mut next = idx + 1;
        while !commented && next < self.lines.len() {
            let candidate = self.lines[next];
            let text = self.text(next);
            if text.trim().is_empty() {
                next += 1;
                continue;
            }
            if candidate.indent() <= indent
                || text.starts_with('#')
                || self.is_document_marker(next)
                || key_colon(text).is_some()
            {
                break;
            }
            let (len, comment) = plain_extent(text);
            end = candidate.content + len;
            last = next;
            commented = comment;
            next += 1;
        }

        let src = self.src;
        let raw = &src[at..end];
        let tail = src[end..self.lines[last].next].to_string();
        self.line = last + 1;
        let node = if matches!(raw, "~" | "null" | "Null" | "NULL") {
            Node::Null(Null {
                raw: raw.to_string(),
            })
        } else {
            Node::Scalar(Scalar {
                value: fold_plain(raw),
                style: ScalarStyle::Plain,
                raw: raw.to_string(),
            })
        };
        Ok((node, tail))
    }
}

fn scan_lines(src: &str) -> Vec<Line> {
    let bytes = src.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    while start < src.len() {
        let (end, next) = match src[start..].find('\n') {
            Some(pos) => {
                let newline = start + pos;
                let end = if newline > start && bytes[newline - 1] == b'\r' {
                    newline - 1
                } else {
                    newline
                };
                (end, newline + 1)
            }
            None => (src.len(), src.len()),
        };
        let mut content = start;
        while content < end && bytes[content] == b' ' {
            content += 1;
        }
        lines.push(Line {
            start,
            content,
            end,
            next,
        });
        start = next;
    }
    lines
}

fn skip_blanks(src: &str, mut at: usize, end: usize) -> usize {
    let bytes = src.as_bytes();
    while at < end && matches!(bytes[at], b' ' | b'\t') {
        at += 1;
    }
    at
}

pub(crate) fn is_dash(text: &str) -> bool {
    text == "-" || text.starts_with("- ") || text.starts_with("-\t")
}

fn is_separator(byte: Option<&u8>) -> bool {
    matches!(byte, None | Some(b' ') | Some(b'\t'))
}

/// Byte index of the `:` that ends a mapping key at the start of `text`.
pub(crate) fn key_colon(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    match bytes.first()? {
        b'"' | b'\'' => {
            let mut at = closing_quote(text, 0)? + 1;
            while at < bytes.len() && matches!(bytes[at], b' ' | b'\t') {
                at += 1;
            }
            if bytes.get(at) == Some(&b':') && is_separator(bytes.get(at + 1)) {
                return Some(at);
            }
            return None;
        }
        b'[' | b'{' | b'#' | b'?' | b'|' | b'>' | b'!' | b'&' | b'*' | b'%' | b'@' | b'`' => return None,
        _ => {}
    }
    for at in 0..bytes.len() {
        match bytes[at] {
            b':' if is_separator(bytes.get(at + 1)) => return Some(at),
            b'#' if at > 0 && matches!(bytes[at - 1], b' ' | b'\t') => return None,
            _ => {}
        }
    }
    None
}

/// Offset of the quote closing the quoted scalar that opens at `open`.
fn closing_quote(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let quote = *bytes.get(open)?;
    let mut at = open + 1;
    while at < bytes.len() {
        match bytes[at] {
            b'\\' if quote == b'"' => at += 2,
            b'\'' if quote == b'\'' && bytes.get(at + 1) == Some(&b'\'') => at += 2,
            byte if byte == quote => return Some(at),
            _ => at += 1,
        }
    }
    None
}

/// Offset just past the bracket closing the flow collection opening at `open`.
fn find_flow_end(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut at = open;
    while at < bytes.len() {
        match bytes[at] {
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(at + 1);
                }
            }
            b'"' | b'\'' => at = closing_quote(src, at)?,
            b'#' if at > open && matches!(bytes[at - 1], b' ' | b'\t' | b'\n') => {
                while at < bytes.len() && bytes[at] != b'\n' {
                    at += 1;
                }
            }
            _ => {}
        }
        at += 1;
    }
    None
}

/// Length of the anchor and tag properties at the start of `text`,
/// including the blanks after them.
fn properties_len(text: &str) -> usize {
    let mut len = 0;
    let mut rest = text;
    while rest.starts_with(['&', '!']) {
        let token = rest.find([' ', '\t']).unwrap_or(rest.len());
        let blanks = rest[token..].len() - rest[token..].trim_start_matches([' ', '\t']).len();
        len += token + blanks;
        rest = &text[len..];
    }
    len
}

/// Length of a plain scalar's text on one line and whether a comment follows.
fn plain_extent(text: &str) -> (usize, bool) {
    let bytes = text.as_bytes();
    for at in 1..bytes.len() {
        if bytes[at] == b'#' && matches!(bytes[at - 1], b' ' | b'\t') {
            return (text[..at].trim_end().len(), true);
        }
    }
    (text.trim_end().len(), false)
}

fn fold_plain(raw: &str) -> String {
    let mut out = String::new();
    let mut breaks = 0;
    for line in raw.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            breaks += 1;
            continue;
        }
        if !out.is_empty() {
            if breaks == 0 {
                out.push(' ');
            }
            for _ in 0..breaks {
                out.push('\n');
            }
        }
        out.push_str(line);
        breaks = 0;
    }
    out
}

fn decode_key(raw: &str) -> Result<Scalar, String> {
    let (value, style) = match raw.as_bytes().first() {
        Some(b'"') => (
            serde_yaml::from_str::<String>(raw).map_err(|err| err.to_string())?,
            ScalarStyle::DoubleQuoted,
        ),
        Some(b'\'') => (
            serde_yaml::from_str::<String>(raw).map_err(|err| err.to_string())?,
            ScalarStyle::SingleQuoted,
        ),
        _ => (raw.to_string(), ScalarStyle::Plain),
    };
    Ok(Scalar {
        value,
        style,
        raw: raw.to_string(),
    })
}

fn decode_block_scalar(raw: &str) -> String {
    let mut lines = raw.split('\n');
    let header = lines.next().unwrap_or_default();
    let indicators = header.split('#').next().unwrap_or_default().trim();
    let folded = indicators.starts_with('>');
    let chomp = indicators.chars().find(|c| matches!(c, '-' | '+'));

    let body: Vec<&str> = lines.map(|line| line.strip_suffix('\r').unwrap_or(line)).collect();
    let indent = body
        .iter()
        .find(|line| !line.trim().is_empty())
        .map_or(0, |line| line.len() - line.trim_start_matches(' ').len());
    let mut content: Vec<&str> = body
        .iter()
        .map(|line| line.get(indent..).unwrap_or(""))
        .collect();
    while content.last().is_some_and(|line| line.is_empty()) {
        content.pop();
    }

    let mut text = if folded {
        fold_plain(&content.join("\n"))
    } else {
        content.join("\n")
    };
    if !text.is_empty() && chomp != Some('-') {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(src: &str) -> Document {
        let document = parse_document(src).unwrap();
        assert_eq!(document.render(), src);
        document
    }

    #[test]
    fn empty_and_comment_only_documents() {
        let document = roundtrip("");
        assert!(document.root().is_null());
        let document = roundtrip("# just a comment\n\n");
        assert!(document.root().is_null());
    }

    #[test]
    fn nested_mapping_and_sequence() {
        let src = "# yaml-language-server: $schema=../../../json-schema/registry.json\npackages:\n  - type: github_release\n    repo_owner: cli # owner\n    repo_name: cli\n\n    files:\n      - name: gh\n        src: gh_{{trimV .Version}}/bin/gh\n";
        let document = roundtrip(src);
        let packages = document.root().as_mapping().unwrap().get("packages").unwrap();
        let package = packages.as_sequence().unwrap().get(0).unwrap().as_mapping().unwrap();
        assert_eq!(package.get_str("repo_owner"), Some("cli"));
        assert_eq!(package.keys().collect::<Vec<_>>(), vec!["type", "repo_owner", "repo_name", "files"]);
    }

    #[test]
    fn unindented_sequence_under_key() {
        let src = "packages:\n- name: a\n- name: b\nother: 1\n";
        let document = roundtrip(src);
        let root = document.root().as_mapping().unwrap();
        assert_eq!(root.get("packages").unwrap().as_sequence().unwrap().len(), 2);
        assert_eq!(root.get_str("other"), Some("1"));
    }

    #[test]
    fn block_scalars_keep_their_lines() {
        let src = "description: |\n  line one\n\n  line two\nfolded: >-\n  a\n  b\nnext: x\n";
        let document = roundtrip(src);
        let root = document.root().as_mapping().unwrap();
        assert_eq!(root.get_str("description"), Some("line one\n\nline two\n"));
        assert_eq!(root.get_str("folded"), Some("a b"));
        assert_eq!(root.get_str("next"), Some("x"));
    }

    #[test]
    fn quoted_and_flow_values() {
        let src = "a: \"x: y\" # note\nb: 'it''s'\nc: [1, \"two\", {k: v}]\nd: {}\n\"quoted key\": 1\n";
        let document = roundtrip(src);
        let root = document.root().as_mapping().unwrap();
        assert_eq!(root.get_str("a"), Some("x: y"));
        assert_eq!(root.get_str("b"), Some("it's"));
        assert_eq!(root.get("c").unwrap().as_sequence().unwrap().len(), 3);
        assert!(root.get("d").unwrap().as_mapping().unwrap().is_empty());
        assert_eq!(root.get_str("quoted key"), Some("1"));
    }

    #[test]
    fn nulls_and_multiline_plain() {
        let src = "a:\nb: ~\nc: some long\n  folded text\nd: # nothing\n";
        let document = roundtrip(src);
        let root = document.root().as_mapping().unwrap();
        assert!(root.get("a").unwrap().is_null());
        assert!(root.get("b").unwrap().is_null());
        assert_eq!(root.get_str("c"), Some("some long folded text"));
        assert!(root.get("d").unwrap().is_null());
    }

    #[test]
    fn missing_trailing_newline_and_crlf() {
        roundtrip("a: 1\nb: 2");
        roundtrip("a: 1\r\nb:\r\n  - x\r\n");
    }

    #[test]
    fn byte_order_mark_stays_in_the_head() {
        let document = roundtrip("\u{feff}packages:\n  - import: a\n");
        assert_eq!(document.head(), "\u{feff}");
        let root = document.root().as_mapping().unwrap();
        assert_eq!(root.keys().collect::<Vec<_>>(), vec!["packages"]);

        let document = roundtrip("\u{feff}# comment\n---\na: 1\n");
        assert_eq!(document.head(), "\u{feff}# comment\n---\n");
        assert_eq!(document.root().as_mapping().unwrap().get_str("a"), Some("1"));
    }

    #[test]
    fn later_documents_are_kept_verbatim() {
        let document = roundtrip("---\na: 1\n---\nb: 2\n");
        assert_eq!(document.root().as_mapping().unwrap().len(), 1);
    }

    #[test]
    fn compact_nested_sequences() {
        let src = "matrix:\n  - - a\n    - b\n  - - c\n";
        let document = roundtrip(src);
        let matrix = document.root().as_mapping().unwrap().get("matrix").unwrap();
        assert_eq!(matrix.as_sequence().unwrap().len(), 2);
    }

    #[test]
    fn bad_indentation_is_an_error() {
        let err = parse_document("a: 1\n   b: 2\n").unwrap_err();
        assert!(matches!(err, YamlError::InvalidYamlSyntax { line: 2, .. }));
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(parse_document("a: \"open\n").is_err());
    }

    #[test]
    fn key_detection() {
        assert_eq!(key_colon("name: x"), Some(4));
        assert_eq!(key_colon("url: http://example.com"), Some(3));
        assert_eq!(key_colon("http://example.com"), None);
        assert_eq!(key_colon("\"a: b\": c"), Some(6));
        assert_eq!(key_colon("value # a: b"), None);
        assert_eq!(key_colon("key:"), Some(3));
    }
}
