//! Position mappings between generated and original text.
//!
//! A [`TokenMap`] is a flat, sorted list of mapping tokens. It is the common
//! currency between the TypeScript transpile step, the code generator and the
//! minifier: each stage produces one and they are composed back to the
//! original sources before serialization.

use oxc_sourcemap::{SourceMap, SourceMapBuilder};

/// Fast line/column lookup using pre-calculated line offsets.
///
/// Lines are 0-indexed and columns count UTF-16 code units, as source maps do.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// (line, column) for a byte offset into `source`.
    pub fn line_column(&self, offset: u32, source: &str) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(0) => 0,
            Err(idx) => idx - 1,
        };
        let line_start = self.line_starts[line_idx] as usize;
        let end = (offset as usize).min(source.len());
        let column = source
            .get(line_start..end)
            .map(|text| text.encode_utf16().count() as u32)
            .unwrap_or(0);
        (line_idx as u32, column)
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// One mapping token: a generated position and the original position it
/// came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub dst_line: u32,
    pub dst_col: u32,
    /// Index into the owning map's source list.
    pub source: u32,
    pub src_line: u32,
    pub src_col: u32,
}

/// Sorted mapping tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenMap {
    tokens: Vec<Mapping>,
}

/// A source listed in a serialized map.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub name: String,
    pub content: String,
}

impl TokenMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from tokens in any order.
    pub fn from_tokens(mut tokens: Vec<Mapping>) -> Self {
        tokens.sort_by_key(|t| (t.dst_line, t.dst_col));
        tokens.dedup_by_key(|t| (t.dst_line, t.dst_col));
        Self { tokens }
    }

    /// Import the tokens of a map produced by OXC's code generator.
    pub fn from_source_map(map: &SourceMap) -> Self {
        let tokens = map
            .get_tokens()
            .filter_map(|token| {
                let source = token.get_source_id()?;
                Some(Mapping {
                    dst_line: token.get_dst_line(),
                    dst_col: token.get_dst_col(),
                    source,
                    src_line: token.get_src_line(),
                    src_col: token.get_src_col(),
                })
            })
            .collect();
        Self::from_tokens(tokens)
    }

    pub fn tokens(&self) -> &[Mapping] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// The token covering a generated position: the last token on `line`
    /// starting at or before `col`.
    pub fn lookup(&self, line: u32, col: u32) -> Option<&Mapping> {
        let idx = self
            .tokens
            .partition_point(|t| (t.dst_line, t.dst_col) <= (line, col));
        let token = self.tokens.get(idx.checked_sub(1)?)?;
        (token.dst_line == line).then_some(token)
    }

    /// Move every generated position down by `lines` (a prepended prologue).
    pub fn shift_lines(&mut self, lines: u32) {
        for token in &mut self.tokens {
            token.dst_line += lines;
        }
    }

    /// Trace positions of `self` (generated → intermediate) through `inner`
    /// (intermediate → original). Tokens that land outside `inner`'s coverage
    /// are dropped.
    pub fn compose(&self, inner: &TokenMap) -> TokenMap {
        let tokens = self
            .tokens
            .iter()
            .filter_map(|outer| {
                let hit = inner.lookup(outer.src_line, outer.src_col)?;
                Some(Mapping {
                    dst_line: outer.dst_line,
                    dst_col: outer.dst_col,
                    source: hit.source,
                    src_line: hit.src_line,
                    src_col: hit.src_col + (outer.src_col - hit.dst_col),
                })
            })
            .collect();
        Self::from_tokens(tokens)
    }

    /// Serialize against `sources` (indexed by [`Mapping::source`]).
    pub fn to_source_map(&self, file: Option<&str>, sources: &[SourceEntry]) -> SourceMap {
        let mut builder = SourceMapBuilder::default();
        if let Some(file) = file {
            builder.set_file(file);
        }
        let ids: Vec<u32> = sources
            .iter()
            .map(|s| builder.add_source_and_content(&s.name, &s.content))
            .collect();
        for token in &self.tokens {
            let Some(&source_id) = ids.get(token.source as usize) else {
                continue;
            };
            builder.add_token(
                token.dst_line,
                token.dst_col,
                token.src_line,
                token.src_col,
                Some(source_id),
                None,
            );
        }
        builder.into_sourcemap()
    }
}
