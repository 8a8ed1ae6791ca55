//! Styled YAML emitter.
//!
//! Walks a value tree, orders every mapping by entry rank and renders block
//! YAML with a two-space indent. Strings that a YAML 1.1 or 1.2 parser would
//! read back as something other than a string are always double-quoted.
//! Callers can force a style for whole subtrees by key.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::OnceLock;

use chrono::SecondsFormat;
use regex::RegexSet;
use tracing::{error, info};

use crate::error::GenerateError;
use crate::value::{Mapping, Scalar, Value};

const INDENT: usize = 2;

/// Scalar style forced onto every string under a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    DoubleQuoted,
    SingleQuoted,
    Literal,
}

#[derive(Debug, Clone, Default)]
pub struct Saver {
    styles: HashMap<String, Style>,
}

impl Saver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Style overrides are keyed by a bare mapping key, which matches at any
    /// depth, or by a dotted path of keys from the document root.
    pub fn with_style<I, K>(styles: I) -> Self
    where
        I: IntoIterator<Item = (K, Style)>,
        K: Into<String>,
    {
        Self {
            styles: styles.into_iter().map(|(k, s)| (k.into(), s)).collect(),
        }
    }

    pub fn render(&self, value: &Value) -> String {
        let mut emitter = Emitter {
            styles: &self.styles,
            out: String::new(),
            path: Vec::new(),
        };
        emitter.document(value);
        emitter.out
    }

    /// Renders `value` and writes it to `filename`, refusing to replace an
    /// existing file unless `force` is set.
    pub fn save_as_yaml(
        &self,
        value: &Value,
        filename: &Path,
        force: bool,
    ) -> Result<(), GenerateError> {
        match std::fs::metadata(filename) {
            Ok(meta) if meta.is_dir() => {
                error!(path = %filename.display(), "Config file path is a directory");
                return Err(GenerateError::IsDirectory(filename.to_path_buf()));
            }
            Ok(_) if !force => {
                error!(path = %filename.display(), "Config file already exists");
                return Err(GenerateError::AlreadyExists(filename.to_path_buf()));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(GenerateError::io(filename)(e)),
        }

        if let Some(parent) = filename.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(GenerateError::io(parent))?;
        }
        let text = self.render(value);
        std::fs::write(filename, &text).map_err(GenerateError::io(filename))?;
        info!(path = %filename.display(), bytes = text.len(), "Saved YAML");
        Ok(())
    }
}

struct Emitter<'s> {
    styles: &'s HashMap<String, Style>,
    out: String,
    path: Vec<String>,
}

impl Emitter<'_> {
    fn document(&mut self, value: &Value) {
        match value {
            Value::Mapping(m) if !m.is_empty() => self.mapping(m, 0, None, false),
            Value::Sequence(s) if !s.is_empty() => self.sequence(s, 0, None, false),
            other => self.inline(other, INDENT, None),
        }
    }

    fn style_for(&self, key: &str) -> Option<Style> {
        if let Some(style) = self.styles.get(key) {
            return Some(*style);
        }
        if self.path.is_empty() {
            return None;
        }
        let dotted = format!("{}.{}", self.path.join("."), key);
        self.styles.get(&dotted).copied()
    }

    /// Writes mapping entries at `indent`. With `inline_first` the first entry
    /// continues the current line, as after a sequence dash.
    fn mapping(&mut self, mapping: &Mapping, indent: usize, inherited: Option<Style>, inline_first: bool) {
        for (i, (key, entry)) in mapping.sorted_entries().into_iter().enumerate() {
            if i > 0 || !inline_first {
                self.pad(indent);
            }
            let key_text = render_key(key, inherited);
            self.out.push_str(&key_text);
            self.out.push(':');

            let style = inherited.or_else(|| self.style_for(key));
            self.path.push(key.to_string());
            match &entry.value {
                Value::Mapping(m) if !m.is_empty() => {
                    self.out.push('\n');
                    self.mapping(m, indent + INDENT, style, false);
                }
                Value::Sequence(s) if !s.is_empty() => {
                    self.out.push('\n');
                    self.sequence(s, indent + INDENT, style, false);
                }
                other => {
                    self.out.push(' ');
                    self.inline(other, indent + INDENT, style);
                }
            }
            self.path.pop();
        }
    }

    fn sequence(&mut self, items: &[Value], indent: usize, style: Option<Style>, inline_first: bool) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 || !inline_first {
                self.pad(indent);
            }
            self.out.push_str("- ");
            match item {
                Value::Mapping(m) if !m.is_empty() => self.mapping(m, indent + INDENT, style, true),
                Value::Sequence(s) if !s.is_empty() => self.sequence(s, indent + INDENT, style, true),
                other => self.inline(other, indent + INDENT, style),
            }
        }
    }

    /// Writes a scalar or empty collection followed by a newline. Block
    /// scalars put their content lines at `block_indent`.
    fn inline(&mut self, value: &Value, block_indent: usize, style: Option<Style>) {
        match value {
            Value::Nil => self.out.push_str("null"),
            Value::Mapping(_) => self.out.push_str("{}"),
            Value::Sequence(_) => self.out.push_str("[]"),
            Value::Scalar(Scalar::Bool(b)) => self.out.push_str(if *b { "true" } else { "false" }),
            Value::Scalar(Scalar::Int(i)) => {
                let _ = write!(self.out, "{i}");
            }
            Value::Scalar(Scalar::Float(f)) => self.out.push_str(&render_float(*f)),
            Value::Scalar(Scalar::Timestamp(t)) => {
                self.out.push_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Scalar(Scalar::String(s)) => {
                if let Some(block) = literal_block(s, style) {
                    self.out.push_str(block.header);
                    self.out.push('\n');
                    for line in block.lines {
                        if !line.is_empty() {
                            self.pad(block_indent);
                            self.out.push_str(line);
                        }
                        self.out.push('\n');
                    }
                    for _ in 0..block.extra_newlines {
                        self.out.push('\n');
                    }
                    return;
                }
                self.out.push_str(&render_string(s, style));
            }
        }
        self.out.push('\n');
    }

    fn pad(&mut self, width: usize) {
        self.out.extend(std::iter::repeat(' ').take(width));
    }
}

fn render_key(key: &str, style: Option<Style>) -> String {
    match style {
        Some(Style::DoubleQuoted) => double_quoted(key),
        Some(Style::SingleQuoted) => single_quoted(key),
        _ if needs_quotes(key) => double_quoted(key),
        _ => key.to_string(),
    }
}

fn render_string(s: &str, style: Option<Style>) -> String {
    match style {
        Some(Style::DoubleQuoted) => double_quoted(s),
        Some(Style::SingleQuoted) => single_quoted(s),
        _ if needs_quotes(s) => double_quoted(s),
        _ => s.to_string(),
    }
}

fn render_float(f: f64) -> String {
    if f.is_nan() {
        return ".nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { ".inf" } else { "-.inf" }.to_string();
    }
    let text = f.to_string();
    // Keep a fraction so the number reads back as a float.
    if text.contains(['.', 'e', 'E']) {
        text
    } else {
        format!("{text}.0")
    }
}

struct LiteralBlock<'a> {
    header: &'static str,
    lines: Vec<&'a str>,
    extra_newlines: usize,
}

/// Returns the literal block form of `s` when it is multi-line (or a literal
/// style was requested) and can be represented without escapes.
fn literal_block(s: &str, style: Option<Style>) -> Option<LiteralBlock<'_>> {
    let wanted = match style {
        Some(Style::Literal) => true,
        None => s.contains('\n'),
        Some(_) => false,
    };
    if !wanted || s.is_empty() {
        return None;
    }
    if s.chars().any(|c| (c.is_control() && c != '\n' && c != '\t') || is_unicode_break(c)) {
        return None;
    }
    let body = s.trim_end_matches('\n');
    let trailing = s.len() - body.len();
    // A leading blank or indented first line would need an indentation indicator.
    if body.is_empty() || body.starts_with([' ', '\t', '\n']) {
        return None;
    }
    let header = match trailing {
        0 => "|-",
        1 => "|",
        _ => "|+",
    };
    Some(LiteralBlock {
        header,
        lines: body.split('\n').collect(),
        extra_newlines: trailing.saturating_sub(1),
    })
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\u{2028}' => out.push_str("\\L"),
            '\u{2029}' => out.push_str("\\P"),
            c if c.is_control() => {
                let code = c as u32;
                if code <= 0xff {
                    let _ = write!(out, "\\x{code:02X}");
                } else {
                    let _ = write!(out, "\\u{code:04X}");
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn single_quoted(s: &str) -> String {
    if s.chars().any(|c| c.is_control() || is_unicode_break(c)) {
        return double_quoted(s);
    }
    format!("'{}'", s.replace('\'', "''"))
}

/// LINE SEPARATOR and PARAGRAPH SEPARATOR, which YAML reads as line breaks.
fn is_unicode_break(c: char) -> bool {
    matches!(c, '\u{2028}' | '\u{2029}')
}

/// Reports whether `s` cannot be written as a plain scalar and read back as
/// the same string.
pub(crate) fn needs_quotes(s: &str) -> bool {
    if s.is_empty() || s.trim() != s {
        return true;
    }
    if s.starts_with([
        '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@',
        '`',
    ]) || s.starts_with("...")
    {
        return true;
    }
    if s.contains(": ") || s.contains(" #") || s.ends_with(':') {
        return true;
    }
    if s.chars().any(|c| c.is_control() || is_unicode_break(c) || c == '\u{feff}') {
        return true;
    }
    resolves_to_non_string(s)
}

/// Plain scalars that YAML 1.1 or the 1.2 core schema resolve to null,
/// booleans, integers, floats or timestamps.
fn resolves_to_non_string(s: &str) -> bool {
    static IMPLICIT: OnceLock<RegexSet> = OnceLock::new();
    IMPLICIT
        .get_or_init(|| {
            RegexSet::new([
                r"^(~|null|Null|NULL)$",
                r"^(y|Y|yes|Yes|YES|n|N|no|No|NO|true|True|TRUE|false|False|FALSE|on|On|ON|off|Off|OFF)$",
                r"^[-+]?(0b[01_]+|0o[0-7_]+|0x[0-9a-fA-F_]+|[0-9][0-9_]*)$",
                r"^[-+]?[1-9][0-9_]*(:[0-5]?[0-9])+(\.[0-9_]*)?$",
                r"^[-+]?(\.[0-9]+|[0-9][0-9_]*(\.[0-9_]*)?)([eE][-+]?[0-9]+)?$",
                r"^[-+]?\.(inf|Inf|INF)$",
                r"^\.(nan|NaN|NAN)$",
                r"^[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}",
                r"^(=|<<)$",
            ])
            .expect("implicit scalar patterns are valid")
        })
        .is_match(s)
}
