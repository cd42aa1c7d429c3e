//! Source map v3 output for development stylesheets.
//!
//! The Sass compiler does not hand back a source map, so the map is
//! reconstructed at line granularity: every generated line that opens a rule
//! or holds a declaration is mapped to the first source line, scanning
//! forward from the previous match, that starts with the same selector or
//! property. That is enough for devtools to jump from a rule to the Sass
//! line it came from; lines with no counterpart (nested selectors, output of
//! mixins) stay unmapped.

use serde::Serialize;

/// A source map in the v3 format.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    pub version: u8,
    pub file: String,
    pub sources: Vec<String>,
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Captures a stylesheet source before compilation and produces its map
/// once the compiled output is known.
#[derive(Debug, Clone)]
pub struct SourceMapBuilder {
    source_name: String,
    source: String,
}

impl SourceMapBuilder {
    /// Start tracking `source`, referred to in the map as `source_name`.
    pub fn begin(source_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            source: source.into(),
        }
    }

    /// Build the map for the compiled `css`, written out as `file`.
    pub fn finish(&self, file: &str, css: &str) -> SourceMap {
        SourceMap {
            version: 3,
            file: file.to_string(),
            sources: vec![self.source_name.clone()],
            sources_content: vec![self.source.clone()],
            names: Vec::new(),
            mappings: self.mappings(css),
        }
    }

    fn mappings(&self, css: &str) -> String {
        let source_lines: Vec<&str> = self.source.lines().collect();
        let mut cursor = 0usize;
        // Source line/column of the previous segment; deltas are relative to it.
        let mut prev_line = 0i64;
        let mut prev_col = 0i64;
        let mut out = String::new();

        for (i, line) in css.lines().enumerate() {
            if i > 0 {
                out.push(';');
            }
            let Some(key) = match_key(line) else {
                continue;
            };
            let Some((src_line, src_col)) = find_source_line(&source_lines, key, cursor) else {
                continue;
            };
            cursor = src_line;
            let gen_col = indentation(line) as i64;
            encode_vlq(gen_col, &mut out);
            encode_vlq(0, &mut out);
            encode_vlq(src_line as i64 - prev_line, &mut out);
            encode_vlq(src_col as i64 - prev_col, &mut out);
            prev_line = src_line as i64;
            prev_col = src_col as i64;
        }
        out
    }
}

/// The text a generated line should be matched on: a rule's selector or a
/// declaration's `property:` prefix.
fn match_key(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if let Some(selector) = trimmed.strip_suffix('{') {
        let selector = selector.trim_end();
        return (!selector.is_empty()).then_some(selector);
    }
    if trimmed.ends_with(';') {
        let colon = trimmed.find(':')?;
        return Some(&trimmed[..=colon]);
    }
    None
}

/// First line at or after `from` starting with `key`, wrapping around once.
fn find_source_line(lines: &[&str], key: &str, from: usize) -> Option<(usize, usize)> {
    let matches = |idx: &usize| lines[*idx].trim_start().starts_with(key);
    (from..lines.len())
        .chain(0..from.min(lines.len()))
        .find(matches)
        .map(|idx| (idx, indentation(lines[idx])))
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Append `value` as a base64 VLQ.
fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = (vlq & 0b1_1111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b10_0000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}
